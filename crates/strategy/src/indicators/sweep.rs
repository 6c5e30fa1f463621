use common::Bar;

/// Liquidity-sweep detector.
///
/// Compares the last bar against the low/high boundaries of the `lookback`
/// bars immediately before it. A sweep-down takes out the window low and
/// closes back above it; a sweep-up takes out the window high and closes
/// back below it.
#[derive(Debug, Clone)]
pub struct SweepDetector {
    pub lookback: usize,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SweepReading {
    /// Lowest low of the lookback window.
    pub floor: f64,
    /// Highest high of the lookback window.
    pub ceiling: f64,
    pub down: bool,
    pub up: bool,
}

impl SweepDetector {
    pub fn new(lookback: usize) -> Self {
        assert!(lookback >= 1, "sweep lookback must be >= 1");
        Self { lookback }
    }

    /// Read the sweep state of the last bar in `bars` (oldest first).
    /// Returns `None` if there are fewer than `lookback + 1` bars.
    pub fn compute(&self, bars: &[Bar]) -> Option<SweepReading> {
        let (last, rest) = bars.split_last()?;
        if rest.len() < self.lookback {
            return None;
        }
        let window = &rest[rest.len() - self.lookback..];

        let floor = window.iter().map(|b| b.low).fold(f64::INFINITY, f64::min);
        let ceiling = window.iter().map(|b| b.high).fold(f64::NEG_INFINITY, f64::max);

        Some(SweepReading {
            floor,
            ceiling,
            down: last.low < floor && last.close > floor,
            up: last.high > ceiling && last.close < ceiling,
        })
    }
}
