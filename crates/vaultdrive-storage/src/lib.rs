//! # vaultdrive-storage
//!
//! Physical storage backends for VaultDrive. Each backend implements
//! [`StorageBackend`](vaultdrive_core::traits::storage::StorageBackend);
//! the active one is chosen from configuration at startup via
//! [`factory::create_backend`].

pub mod backends;
pub mod factory;

pub use backends::local::LocalStorageBackend;
pub use factory::create_backend;

#[cfg(feature = "s3")]
pub use backends::s3::S3StorageBackend;

#[cfg(feature = "drive")]
pub use backends::drive::RemoteDriveBackend;
