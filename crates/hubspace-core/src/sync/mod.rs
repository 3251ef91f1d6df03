// ── State synchronization ──

mod coordinator;
mod diff;
mod events;

pub use coordinator::{MIN_POLL_INTERVAL, PollOutcome, StateSyncCoordinator, SyncConfig};
pub use diff::PollReport;
pub use events::{Availability, PollPhase, SyncEvent, SyncEventStream};
