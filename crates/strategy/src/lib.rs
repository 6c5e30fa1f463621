pub mod config;
pub mod evaluator;
pub mod indicators;

pub use config::{AlertConfig, ConfigError, SignalParams, WatchGroup, WatchlistConfig};
pub use evaluator::{Evaluation, SweepWickVolume};

use common::{BarSeries, SignalDecision};

/// A rule set that inspects a bar series and decides whether a directional
/// signal holds at its most recent bar.
///
/// Implementations must be pure: no I/O, no interior state, same input
/// gives the same output. The scheduler calls `evaluate` on heavily
/// overlapping windows every cycle.
pub trait Evaluator: Send + Sync {
    /// Human-readable name used in logs.
    fn name(&self) -> &str;

    /// Fewest bars `evaluate` needs before it can return a decision.
    fn min_bars(&self) -> usize;

    /// Returns `None` when the series is too short or no rule set is satisfied.
    fn evaluate(&self, series: &BarSeries) -> Option<SignalDecision>;
}
