use common::Bar;

/// Wick-dominance filter.
///
/// Comparisons are `wick > multiplier * body`, never a ratio, so a zero-body
/// bar dominates whenever the wick is non-zero.
#[derive(Debug, Clone)]
pub struct WickFilter {
    pub multiplier: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WickReading {
    /// Whole high-low range dominates the body.
    pub range: bool,
    /// Lower wick dominates the body.
    pub lower: bool,
    /// Upper wick dominates the body.
    pub upper: bool,
}

impl WickFilter {
    pub fn new(multiplier: f64) -> Self {
        assert!(multiplier > 0.0, "wick multiplier must be positive");
        Self { multiplier }
    }

    pub fn compute(&self, bar: &Bar) -> WickReading {
        let threshold = self.multiplier * bar.body();
        WickReading {
            range: bar.range() > threshold,
            lower: bar.lower_wick() > threshold,
            upper: bar.upper_wick() > threshold,
        }
    }
}
