//! In-process metadata store.

pub mod store;

pub use store::MemoryMetadataStore;
