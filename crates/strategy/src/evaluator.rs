use tracing::trace;

use common::{Bar, BarSeries, Direction, SignalDecision};

use crate::config::SignalParams;
use crate::indicators::{SweepDetector, SweepReading, VolumeFilter, WickFilter, WickReading};
use crate::Evaluator;

/// Sweep + wick + volume rule set, directional form.
///
/// Long: the last bar sweeps the lookback low and closes back above it, its
/// lower wick dominates the body, and volume beats the rolling mean.
/// Short: the mirror image on the high side.
///
/// A bar that qualifies on both sides at once is ambiguous and yields no
/// decision. There is no close-versus-previous-close tie-break.
#[derive(Debug, Clone)]
pub struct SweepWickVolume {
    params: SignalParams,
    sweep: SweepDetector,
    wick: WickFilter,
    volume: VolumeFilter,
}

/// Every predicate the rule set computed for one bar.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Evaluation {
    pub sweep: SweepReading,
    pub wick: WickReading,
    pub volume_confirmed: bool,
}

impl Evaluation {
    pub fn long(&self) -> bool {
        self.sweep.down && self.wick.lower && self.volume_confirmed
    }

    pub fn short(&self) -> bool {
        self.sweep.up && self.wick.upper && self.volume_confirmed
    }

    pub fn direction(&self) -> Option<Direction> {
        match (self.long(), self.short()) {
            (true, false) => Some(Direction::Long),
            (false, true) => Some(Direction::Short),
            _ => None,
        }
    }
}

impl SweepWickVolume {
    pub fn new(params: SignalParams) -> Self {
        Self {
            sweep: SweepDetector::new(params.sweep_lookback),
            wick: WickFilter::new(params.wick_multiplier),
            volume: VolumeFilter::new(params.volume_window, params.volume_multiplier),
            params,
        }
    }

    /// Compute every predicate for the last bar of `bars` (oldest first).
    /// Returns `None` if either window is not yet filled.
    pub fn inspect(&self, bars: &[Bar]) -> Option<Evaluation> {
        if bars.len() < self.params.min_bars() {
            return None;
        }
        let last = bars.last()?;
        Some(Evaluation {
            sweep: self.sweep.compute(bars)?,
            wick: self.wick.compute(last),
            volume_confirmed: self.volume.compute(bars)?,
        })
    }
}

impl Evaluator for SweepWickVolume {
    fn name(&self) -> &str {
        "sweep-wick-volume"
    }

    fn min_bars(&self) -> usize {
        self.params.min_bars()
    }

    fn evaluate(&self, series: &BarSeries) -> Option<SignalDecision> {
        let evaluation = self.inspect(series.bars())?;
        let last = series.last()?;
        trace!(
            bar_time = %last.open_time,
            sweep_down = evaluation.sweep.down,
            sweep_up = evaluation.sweep.up,
            lower_wick = evaluation.wick.lower,
            upper_wick = evaluation.wick.upper,
            volume = evaluation.volume_confirmed,
            "Evaluated bar"
        );

        evaluation.direction().map(|direction| SignalDecision {
            direction,
            bar_time: last.open_time,
            price: last.close,
        })
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────
