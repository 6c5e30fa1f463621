use common::Bar;

/// Volume confirmation: the last bar trades more than `multiplier` times the
/// mean volume of the `window` bars before it.
#[derive(Debug, Clone)]
pub struct VolumeFilter {
    pub window: usize,
    pub multiplier: f64,
}

impl VolumeFilter {
    pub fn new(window: usize, multiplier: f64) -> Self {
        assert!(window >= 1, "volume window must be >= 1");
        Self { window, multiplier }
    }

    /// Mean volume of the `window` bars preceding the last one.
    /// Returns `None` if there are fewer than `window + 1` bars.
    pub fn rolling_mean(&self, bars: &[Bar]) -> Option<f64> {
        let (_, rest) = bars.split_last()?;
        if rest.len() < self.window {
            return None;
        }
        let window = &rest[rest.len() - self.window..];
        Some(window.iter().map(|b| b.volume).sum::<f64>() / self.window as f64)
    }

    pub fn compute(&self, bars: &[Bar]) -> Option<bool> {
        let mean = self.rolling_mean(bars)?;
        let last = bars.last()?;
        Some(last.volume > self.multiplier * mean)
    }
}
