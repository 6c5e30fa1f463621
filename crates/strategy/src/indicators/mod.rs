pub mod sweep;
pub mod volume;
pub mod wick;

pub use sweep::{SweepDetector, SweepReading};
pub use volume::VolumeFilter;
pub use wick::{WickFilter, WickReading};
