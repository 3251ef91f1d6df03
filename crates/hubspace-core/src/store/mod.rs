// ── Catalog storage ──

mod catalog;
mod snapshot;

pub use catalog::DeviceCatalog;
pub use snapshot::CatalogSnapshot;
