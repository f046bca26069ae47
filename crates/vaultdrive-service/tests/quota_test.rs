//! Quota ledger integration tests.

mod common;

use bytes::Bytes;
use common::TestEnv;
use vaultdrive_core::error::ErrorKind;
use vaultdrive_database::UserStore;

#[tokio::test]
async fn test_upload_enforces_quota_and_overwrite_charges_delta_only() {
    let env = TestEnv::new().await;
    let user = env.user(100).await;

    // 60 bytes fit under the 100-byte quota.
    env.files
        .upload_bytes(user.id, None, "a.txt", None, Bytes::from(vec![b'a'; 60]))
        .await
        .unwrap();
    assert_eq!(env.quota.usage(user.id).await.unwrap().used_bytes, 60);

    // Overwriting with the same size charges a delta of zero, not another
    // 60 bytes on top.
    let file = env
        .files
        .upload_bytes(user.id, None, "a.txt", None, Bytes::from(vec![b'b'; 60]))
        .await
        .unwrap();
    assert_eq!(file.current_version, 2);
    assert_eq!(env.quota.usage(user.id).await.unwrap().used_bytes, 60);

    // 50 more bytes would hit 110 > 100.
    let err = env
        .files
        .upload_bytes(user.id, None, "b.txt", None, Bytes::from(vec![b'c'; 50]))
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::QuotaExceeded);
    assert_eq!(env.quota.usage(user.id).await.unwrap().used_bytes, 60);

    // The rejected upload's bytes were cleaned up; only the current
    // content and the archived version remain.
    assert_eq!(env.object_count(), 2);
}

#[tokio::test]
async fn test_soft_delete_frees_quota_and_restore_reaccounts() {
    let env = TestEnv::new().await;
    let user = env.user(100).await;

    let file = env
        .files
        .upload_bytes(user.id, None, "a.txt", None, Bytes::from(vec![0u8; 40]))
        .await
        .unwrap();
    assert_eq!(env.quota.usage(user.id).await.unwrap().used_bytes, 40);

    env.files.delete(user.id, file.id).await.unwrap();
    assert_eq!(env.quota.usage(user.id).await.unwrap().used_bytes, 0);

    env.trash.restore_file(user.id, file.id).await.unwrap();
    assert_eq!(env.quota.usage(user.id).await.unwrap().used_bytes, 40);
}

#[tokio::test]
async fn test_lowering_quota_below_usage_blocks_new_uploads() {
    let env = TestEnv::new().await;
    let user = env.user(1000).await;

    env.files
        .upload_bytes(user.id, None, "a.txt", None, Bytes::from(vec![0u8; 500]))
        .await
        .unwrap();

    // Existing bytes stay; only additions are blocked.
    env.quota.set_quota(user.id, 100).await.unwrap();
    let usage = env.quota.usage(user.id).await.unwrap();
    assert_eq!(usage.used_bytes, 500);
    assert_eq!(usage.available_bytes, 0);

    let err = env
        .files
        .upload_bytes(user.id, None, "b.txt", None, Bytes::from("x"))
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::QuotaExceeded);
}

#[tokio::test]
async fn test_recalculate_corrects_ledger_drift() {
    let env = TestEnv::new().await;
    let user = env.user(1000).await;

    env.files
        .upload_bytes(user.id, None, "a.txt", None, Bytes::from(vec![0u8; 30]))
        .await
        .unwrap();
    env.files
        .upload_bytes(user.id, None, "b.txt", None, Bytes::from(vec![0u8; 20]))
        .await
        .unwrap();

    // Inject drift directly into the counter.
    env.store.adjust_used_bytes(user.id, 17).await.unwrap();
    assert_eq!(env.quota.usage(user.id).await.unwrap().used_bytes, 67);

    let corrected = env.quota.recalculate(user.id).await.unwrap();
    assert_eq!(corrected, 50);
    assert_eq!(env.quota.usage(user.id).await.unwrap().used_bytes, 50);
}

#[tokio::test]
async fn test_usage_percent_snapshot() {
    let env = TestEnv::new().await;
    let user = env.user(200).await;

    env.files
        .upload_bytes(user.id, None, "a.txt", None, Bytes::from(vec![0u8; 50]))
        .await
        .unwrap();

    let usage = env.quota.usage(user.id).await.unwrap();
    assert_eq!(usage.quota_bytes, 200);
    assert_eq!(usage.available_bytes, 150);
    assert!((usage.usage_percent - 25.0).abs() < f64::EPSILON);
}
