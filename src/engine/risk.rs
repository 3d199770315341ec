//! Drawdown risk guard
//!
//! Tracks the running equity high-water-mark and latches a single
//! pause-and-alert action per breach crossing. The guard is owned by the
//! decision engine and reset at trading-session boundaries.

use rust_decimal::Decimal;

/// A drawdown breach event, emitted once per crossing
#[derive(Debug, Clone, PartialEq)]
pub struct DrawdownBreach {
    pub drawdown_percent: Decimal,
    pub high_water_mark: Decimal,
    pub equity: Decimal,
}

/// Equity high-water-mark tracker with a latched breach threshold
#[derive(Debug, Clone)]
pub struct RiskGuard {
    threshold_percent: Decimal,
    high_water_mark: Option<Decimal>,
    breached: bool,
}

impl RiskGuard {
    /// Create a guard that trips above the given drawdown percentage
    pub fn new(threshold_percent: Decimal) -> Self {
        Self {
            threshold_percent,
            high_water_mark: None,
            breached: false,
        }
    }

    /// Record an equity observation
    ///
    /// The high-water-mark is seeded from the first observation and never
    /// decreases. Returns a breach exactly once per crossing of the
    /// threshold; while still in breach, further observations return `None`.
    pub fn observe(&mut self, equity: Decimal) -> Option<DrawdownBreach> {
        let hwm = match self.high_water_mark {
            Some(current) if equity <= current => current,
            _ => {
                self.high_water_mark = Some(equity);
                equity
            }
        };

        if hwm <= Decimal::ZERO {
            return None;
        }

        let drawdown_percent = (hwm - equity) / hwm * Decimal::from(100);
        if drawdown_percent > self.threshold_percent && !self.breached {
            self.breached = true;
            return Some(DrawdownBreach {
                drawdown_percent,
                high_water_mark: hwm,
                equity,
            });
        }
        None
    }

    /// Current drawdown for an equity value, always ≥ 0
    pub fn drawdown_percent(&self, equity: Decimal) -> Decimal {
        match self.high_water_mark {
            Some(hwm) if hwm > Decimal::ZERO && equity < hwm => {
                (hwm - equity) / hwm * Decimal::from(100)
            }
            _ => Decimal::ZERO,
        }
    }

    /// The current high-water-mark, if any observation has been made
    pub fn high_water_mark(&self) -> Option<Decimal> {
        self.high_water_mark
    }

    /// Whether the guard is currently latched in breach
    pub fn is_breached(&self) -> bool {
        self.breached
    }

    /// Start a new trading session: clear the mark and the latch
    pub fn reset(&mut self) {
        self.high_water_mark = None;
        self.breached = false;
    }

    /// Clear the breach latch without touching the high-water-mark
    ///
    /// Called on explicit unpause so the guard can fire again.
    pub fn rearm(&mut self) {
        self.breached = false;
    }
}
