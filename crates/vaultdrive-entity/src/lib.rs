//! # vaultdrive-entity
//!
//! Domain entity models for VaultDrive: users with quota counters, files
//! with version history, folders with materialized paths, and trash views.

pub mod file;
pub mod folder;
pub mod trash;
pub mod user;
pub mod version;

pub use file::{CreateFile, File};
pub use folder::{CreateFolder, Folder};
pub use trash::{PurgeReport, TrashItemKind, TrashedItem};
pub use user::{QuotaUsage, User};
pub use version::FileVersion;
