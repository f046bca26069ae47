//! Storage backend implementations.

pub mod local;

#[cfg(feature = "s3")]
pub mod s3;

#[cfg(feature = "drive")]
pub mod drive;

use uuid::Uuid;

/// Generate a fresh storage key for an object, keeping the original file
/// extension so served content keeps a usable suffix. Keys never collide
/// with logical names; the mapping lives in the metadata store.
pub(crate) fn object_key(name: &str) -> String {
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => {
            format!("{}.{}", Uuid::new_v4(), ext.to_lowercase())
        }
        _ => Uuid::new_v4().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_key_keeps_extension() {
        let key = object_key("Report.PDF");
        assert!(key.ends_with(".pdf"));

        let bare = object_key("README");
        assert!(!bare.contains('.'));

        // A leading dot is a hidden file, not an extension.
        let hidden = object_key(".env");
        assert!(!hidden.ends_with(".env"));
    }
}
