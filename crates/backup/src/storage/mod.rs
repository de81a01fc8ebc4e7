//! Storage for fetched records and per-account key membership
//!
//! The object store is injected into each sync as a shared handle: a fresh
//! store per account keeps exports private, while one store handed to many
//! accounts deduplicates records they have in common.

mod key_store;
mod memory;
mod traits;

pub use key_store::UserKeyStore;
pub use memory::InMemoryObjectStore;
pub use traits::{ObjectStore, SharedObjectStore};
