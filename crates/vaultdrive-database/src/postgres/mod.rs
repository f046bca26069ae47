//! PostgreSQL implementations of the metadata store traits.

pub mod file;
pub mod folder;
pub mod user;

pub use file::PgFileStore;
pub use folder::PgFolderStore;
pub use user::PgUserStore;
