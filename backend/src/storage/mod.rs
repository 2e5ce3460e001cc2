//! Persistence layer: the storage trait, the in-memory document store and
//! the read-path TTL cache.

pub mod cache;
pub mod memory;
pub mod traits;

pub use cache::TtlCache;
pub use memory::MemoryFamilyStore;
pub use traits::{AllowanceSettings, FamilyStorage};
