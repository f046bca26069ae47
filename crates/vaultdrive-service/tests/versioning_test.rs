//! File versioning integration tests.

mod common;

use bytes::Bytes;
use common::TestEnv;
use futures::StreamExt;
use vaultdrive_core::traits::storage::ByteRange;

#[tokio::test]
async fn test_overwrite_archives_previous_content() {
    let env = TestEnv::new().await;
    let user = env.user(1000).await;

    let v1 = env
        .files
        .upload_bytes(user.id, None, "doc.txt", None, Bytes::from("first"))
        .await
        .unwrap();
    assert_eq!(v1.current_version, 1);

    let v2 = env
        .files
        .upload_bytes(user.id, None, "doc.txt", None, Bytes::from("second!"))
        .await
        .unwrap();
    assert_eq!(v2.id, v1.id);
    assert_eq!(v2.current_version, 2);
    assert_eq!(v2.size_bytes, 7);

    let (file, versions) = env.files.versions(user.id, v1.id).await.unwrap();
    assert_eq!(file.current_version, 2);
    assert_eq!(versions.len(), 1);
    assert_eq!(versions[0].version_number, 1);
    assert_eq!(versions[0].size_bytes, 5);

    // Both generations of bytes still exist.
    let (_, data) = env.files.download(user.id, v1.id).await.unwrap();
    assert_eq!(data, Bytes::from("second!"));
    let archived = env
        .backend
        .read_bytes(&versions[0].storage_key)
        .await
        .unwrap();
    assert_eq!(archived, Bytes::from("first"));
}

#[tokio::test]
async fn test_version_numbers_strictly_increase() {
    let env = TestEnv::new().await;
    let user = env.user(1000).await;

    let mut file = env
        .files
        .upload_bytes(user.id, None, "doc.txt", None, Bytes::from("v1"))
        .await
        .unwrap();
    for content in ["v2", "v3", "v4"] {
        file = env
            .files
            .upload_bytes(user.id, None, "doc.txt", None, Bytes::from(content))
            .await
            .unwrap();
    }
    assert_eq!(file.current_version, 4);

    let (_, versions) = env.files.versions(user.id, file.id).await.unwrap();
    let numbers: Vec<i32> = versions.iter().map(|v| v.version_number).collect();
    assert_eq!(numbers, vec![3, 2, 1]);
}

#[tokio::test]
async fn test_restore_version_round_trip() {
    let env = TestEnv::new().await;
    let user = env.user(1000).await;

    let file = env
        .files
        .upload_bytes(user.id, None, "doc.txt", None, Bytes::from("original"))
        .await
        .unwrap();
    env.files
        .upload_bytes(user.id, None, "doc.txt", None, Bytes::from("changed"))
        .await
        .unwrap();

    let restored = env.files.restore_version(user.id, file.id, 1).await.unwrap();
    // Restoring archives the replaced content too; the number never reuses.
    assert_eq!(restored.current_version, 3);
    assert_eq!(restored.size_bytes, 8);

    let (_, data) = env.files.download(user.id, file.id).await.unwrap();
    assert_eq!(data, Bytes::from("original"));

    let (_, versions) = env.files.versions(user.id, file.id).await.unwrap();
    let numbers: Vec<i32> = versions.iter().map(|v| v.version_number).collect();
    assert_eq!(numbers, vec![2, 1]);
}

#[tokio::test]
async fn test_restore_version_with_missing_bytes_fails_cleanly() {
    let env = TestEnv::new().await;
    let user = env.user(1000).await;

    let file = env
        .files
        .upload_bytes(user.id, None, "doc.txt", None, Bytes::from("original"))
        .await
        .unwrap();
    env.files
        .upload_bytes(user.id, None, "doc.txt", None, Bytes::from("changed"))
        .await
        .unwrap();

    // Simulate out-of-band loss of the archived object.
    let (_, versions) = env.files.versions(user.id, file.id).await.unwrap();
    env.backend.delete(&versions[0].storage_key).await.unwrap();

    let err = env
        .files
        .restore_version(user.id, file.id, 1)
        .await
        .unwrap_err();
    assert!(err.is_not_found());

    // The file is untouched.
    let (current, _) = env.files.versions(user.id, file.id).await.unwrap();
    assert_eq!(current.current_version, 2);
    let (_, data) = env.files.download(user.id, file.id).await.unwrap();
    assert_eq!(data, Bytes::from("changed"));
}

#[tokio::test]
async fn test_restore_missing_version_number() {
    let env = TestEnv::new().await;
    let user = env.user(1000).await;

    let file = env
        .files
        .upload_bytes(user.id, None, "doc.txt", None, Bytes::from("only"))
        .await
        .unwrap();

    let err = env
        .files
        .restore_version(user.id, file.id, 7)
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_download_stream_with_range() {
    let env = TestEnv::new().await;
    let user = env.user(1000).await;

    let file = env
        .files
        .upload_bytes(user.id, None, "video.bin", None, Bytes::from("0123456789"))
        .await
        .unwrap();

    let (_, mut stream) = env
        .files
        .download_stream(
            user.id,
            file.id,
            Some(ByteRange {
                start: 3,
                end: Some(6),
            }),
        )
        .await
        .unwrap();

    let mut collected = Vec::new();
    while let Some(chunk) = stream.next().await {
        collected.extend_from_slice(&chunk.unwrap());
    }
    assert_eq!(collected, b"3456");
}
