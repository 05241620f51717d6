pub mod catalog;
pub mod memory;
pub mod persistence;
pub mod table;

pub use catalog::Catalog;
pub use memory::InMemoryStorage;
pub use persistence::{DatabaseSnapshot, DurabilityMode, SnapshotManager};
pub use table::{Table, TableSchema};
