// ── Domain model ──
//
// Canonical types built from the provider's metadevice list. These are
// what collaborators read; wire records never leave `convert`.

pub mod capability;
pub mod device;
pub mod room;
pub mod state;

pub use capability::Capability;
pub use device::{FunctionDescriptor, MetaDevice};
pub use room::Room;
pub use state::{StateKey, StateValue};
