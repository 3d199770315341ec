//! Channel type definitions for inter-task communication

use tokio::sync::{mpsc, watch};

use super::types::{ConnectionState, PriceUpdate};

/// Default buffer size for the price update channel
pub const DEFAULT_CHANNEL_SIZE: usize = 1000;

/// Create a new price update channel with the default buffer size
pub fn create_price_channel() -> (mpsc::Sender<PriceUpdate>, mpsc::Receiver<PriceUpdate>) {
    mpsc::channel(DEFAULT_CHANNEL_SIZE)
}

/// Create a new price update channel with a custom buffer size
pub fn create_price_channel_with_size(
    size: usize,
) -> (mpsc::Sender<PriceUpdate>, mpsc::Receiver<PriceUpdate>) {
    mpsc::channel(size)
}

/// Create the connection-state channel
///
/// A watch channel holds only the latest transition, which is exactly the
/// "most recent state" contract observers rely on.
pub fn create_state_channel() -> (
    watch::Sender<ConnectionState>,
    watch::Receiver<ConnectionState>,
) {
    watch::channel(ConnectionState::Disconnected)
}
