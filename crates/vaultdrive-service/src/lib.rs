//! # vaultdrive-service
//!
//! Business services coordinating the metadata store and the physical
//! storage backend: uploads with version archiving and quota enforcement,
//! folder hierarchy management, and the trash lifecycle.

pub mod file;
pub mod folder;
pub mod quota;
pub mod trash;

pub use file::FileService;
pub use folder::{FolderContents, FolderService};
pub use quota::QuotaService;
pub use trash::TrashService;
