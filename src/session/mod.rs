// Session management core
// Admission/eviction decisions at login time and background expiry sweeping

pub mod limiter;
pub mod sweeper;
pub mod types;

pub use limiter::{LimiterError, SessionLimiter};
pub use sweeper::{SessionSweeper, SweepConfig, SweepOutcome, SweepReport};
pub use types::{DenyReason, SessionRecord, Verdict};
