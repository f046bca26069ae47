//! # vaultdrive-core
//!
//! Core crate for VaultDrive. Contains the storage backend trait,
//! configuration schemas, and the unified error system.
//!
//! This crate has **no** internal dependencies on other VaultDrive crates.

pub mod config;
pub mod error;
pub mod result;
pub mod traits;

pub use error::AppError;
pub use result::AppResult;
