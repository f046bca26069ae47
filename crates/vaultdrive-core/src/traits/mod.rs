//! Trait seams defined in `vaultdrive-core` and implemented elsewhere.

pub mod storage;
