pub mod alert;
pub mod mexc;
pub mod normalizer;
pub mod scheduler;

pub use alert::format_alert;
pub use mexc::MexcClient;
pub use normalizer::{normalize, NormalizeError};
pub use scheduler::{CycleReport, Scheduler, SchedulerSettings};
