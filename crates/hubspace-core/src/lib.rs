//! Device catalog and state synchronization for Hubspace accounts.
//!
//! This crate sits between `hubspace-api` and whatever presents devices
//! to a user (home-automation adapters, scripts):
//!
//! - **[`Session`]**: Facade owning one account's components.
//!   [`connect()`](Session::connect) logs in (or resumes from a refresh
//!   token), resolves the account and loads the catalog;
//!   [`start()`](Session::start) spawns the poll loop.
//!
//! - **[`DeviceCatalog`]**: The current [`CatalogSnapshot`] behind an
//!   `ArcSwap`: id lookups, exact (function class, instance) state reads,
//!   rooms, and a function index. Polls replace the snapshot wholesale.
//!
//! - **[`DiscoveryFilter`]**: Picks the leaf devices to expose from
//!   friendly-name and room allow-lists.
//!
//! - **[`StateSyncCoordinator`]**: Fixed-interval poller that diffs each
//!   cycle against the last and broadcasts [`SyncEvent`]s.
//!
//! - **[`CommandDispatcher`]**: Optimistic state writes, confirmed or
//!   rolled back from the provider's response.
//!
//! - **[`Anonymizer`]**: Redaction of raw dumps for bug reports.

pub mod anonymize;
pub mod command;
pub mod config;
pub mod convert;
pub mod discovery;
pub mod error;
pub mod model;
pub mod session;
pub mod store;
pub mod sync;

// ── Primary re-exports ──────────────────────────────────────────────
pub use anonymize::{Anonymizer, redact};
pub use command::CommandDispatcher;
pub use config::{SessionConfig, SessionCredentials};
pub use discovery::{DiscoveryFilter, select};
pub use error::CoreError;
pub use session::{Session, SessionState};
pub use store::{CatalogSnapshot, DeviceCatalog};
pub use sync::{
    Availability, MIN_POLL_INTERVAL, PollOutcome, PollPhase, PollReport, StateSyncCoordinator,
    SyncConfig, SyncEvent, SyncEventStream,
};

pub use model::{Capability, FunctionDescriptor, MetaDevice, Room, StateKey, StateValue};
