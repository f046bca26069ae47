//! # vaultdrive-database
//!
//! Metadata store traits plus their implementations: PostgreSQL-backed
//! stores (every multi-row mutation wrapped in one transaction) and an
//! in-process memory store used by tests and embedded deployments.

pub mod connection;
pub mod memory;
pub mod postgres;
pub mod store;

pub use connection::DatabasePool;
pub use memory::MemoryMetadataStore;
pub use store::{FileStore, FolderStore, NewFileContent, UserStore};
