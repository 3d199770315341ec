//! Volume-weighted average price over a bar interval

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::common::errors::Result;
use crate::common::traits::TradingApi;
use crate::common::types::Bar;

/// Bar timeframe requested for VWAP computation
const VWAP_TIMEFRAME: &str = "1Min";

/// Reduce a set of bars to one volume-weighted price
///
/// Uses each bar's own volume-weighted price when present, its close
/// otherwise. Returns `None` when there are no bars or total volume is zero.
/// The result does not depend on bar ordering.
pub fn vwap(bars: &[Bar]) -> Option<Decimal> {
    if bars.is_empty() {
        return None;
    }

    let mut weighted_sum = Decimal::ZERO;
    let mut total_volume = Decimal::ZERO;
    for bar in bars {
        let volume = Decimal::from(bar.volume);
        weighted_sum += bar.weighted_price() * volume;
        total_volume += volume;
    }

    if total_volume.is_zero() {
        None
    } else {
        Some(weighted_sum / total_volume)
    }
}

/// Fetch bars covering `[start, end]` and compute their VWAP
///
/// Network failures surface as `Err`; an interval with no bars is `Ok(None)`.
pub async fn fetch_vwap(
    api: &dyn TradingApi,
    symbol: &str,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Result<Option<Decimal>> {
    let bars = api.get_bars(symbol, VWAP_TIMEFRAME, start, end).await?;
    Ok(vwap(&bars))
}
