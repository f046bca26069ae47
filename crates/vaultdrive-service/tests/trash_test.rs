//! Trash lifecycle integration tests.

mod common;

use bytes::Bytes;
use common::TestEnv;
use vaultdrive_core::config::TrashConfig;
use vaultdrive_core::error::ErrorKind;
use vaultdrive_entity::TrashItemKind;

#[tokio::test]
async fn test_folder_trash_cascade_and_restore() {
    let env = TestEnv::new().await;
    let user = env.user(1000).await;

    let parent = env.folders.create(user.id, None, "parent").await.unwrap();
    let child = env
        .folders
        .create(user.id, Some(parent.id), "child")
        .await
        .unwrap();
    let top_file = env
        .files
        .upload_bytes(user.id, Some(parent.id), "top.txt", None, Bytes::from("12345"))
        .await
        .unwrap();
    let deep_file = env
        .files
        .upload_bytes(user.id, Some(child.id), "deep.txt", None, Bytes::from("123"))
        .await
        .unwrap();
    assert_eq!(env.quota.usage(user.id).await.unwrap().used_bytes, 8);

    env.folders.delete(user.id, parent.id).await.unwrap();

    // Everything in the subtree is trashed and the quota released.
    assert_eq!(env.quota.usage(user.id).await.unwrap().used_bytes, 0);
    assert!(env
        .files
        .get_file(user.id, deep_file.id)
        .await
        .unwrap_err()
        .is_not_found());

    // Only the subtree top shows in the trash listing.
    let items = env.trash.list_trash(user.id).await.unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].kind, TrashItemKind::Folder);
    assert_eq!(items[0].id, parent.id);

    env.trash.restore_folder(user.id, parent.id).await.unwrap();

    assert_eq!(env.quota.usage(user.id).await.unwrap().used_bytes, 8);
    env.files.get_file(user.id, top_file.id).await.unwrap();
    env.files.get_file(user.id, deep_file.id).await.unwrap();
    env.folders.get_folder(user.id, child.id).await.unwrap();
    assert!(env.trash.list_trash(user.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_restore_folder_keeps_previously_trashed_items_in_trash() {
    let env = TestEnv::new().await;
    let user = env.user(1000).await;

    let folder = env.folders.create(user.id, None, "folder").await.unwrap();
    let early = env
        .files
        .upload_bytes(user.id, Some(folder.id), "early.txt", None, Bytes::from("aa"))
        .await
        .unwrap();
    let late = env
        .files
        .upload_bytes(user.id, Some(folder.id), "late.txt", None, Bytes::from("bb"))
        .await
        .unwrap();

    // Trashed on its own, before the folder cascade.
    env.files.delete(user.id, early.id).await.unwrap();
    env.folders.delete(user.id, folder.id).await.unwrap();

    env.trash.restore_folder(user.id, folder.id).await.unwrap();

    env.files.get_file(user.id, late.id).await.unwrap();
    assert!(env
        .files
        .get_file(user.id, early.id)
        .await
        .unwrap_err()
        .is_not_found());

    // Only the cascade-trashed file's bytes were re-accounted.
    assert_eq!(env.quota.usage(user.id).await.unwrap().used_bytes, 2);
}

#[tokio::test]
async fn test_permanent_delete_file_removes_bytes_and_versions() {
    let env = TestEnv::new().await;
    let user = env.user(1000).await;

    let file = env
        .files
        .upload_bytes(user.id, None, "doc.txt", None, Bytes::from("one"))
        .await
        .unwrap();
    env.files
        .upload_bytes(user.id, None, "doc.txt", None, Bytes::from("two"))
        .await
        .unwrap();
    assert_eq!(env.object_count(), 2);

    // Live files cannot be purged directly.
    let err = env
        .trash
        .permanent_delete_file(user.id, file.id)
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::InvalidOperation);

    env.files.delete(user.id, file.id).await.unwrap();
    env.trash
        .permanent_delete_file(user.id, file.id)
        .await
        .unwrap();

    assert_eq!(env.object_count(), 0);
    assert!(env.store_has_no_file(file.id).await);
}

#[tokio::test]
async fn test_permanent_delete_folder_with_mixed_trash_states() {
    let env = TestEnv::new().await;
    let user = env.user(1000).await;

    let folder = env.folders.create(user.id, None, "folder").await.unwrap();
    env.files
        .upload_bytes(user.id, Some(folder.id), "live.txt", None, Bytes::from("xxxx"))
        .await
        .unwrap();
    let pre_trashed = env
        .files
        .upload_bytes(user.id, Some(folder.id), "old.txt", None, Bytes::from("yy"))
        .await
        .unwrap();
    env.files.delete(user.id, pre_trashed.id).await.unwrap();

    env.folders.delete(user.id, folder.id).await.unwrap();
    assert_eq!(env.quota.usage(user.id).await.unwrap().used_bytes, 0);

    let report = env
        .trash
        .permanent_delete_folder(user.id, folder.id)
        .await
        .unwrap();
    assert_eq!(report.purged_files, 2);
    assert_eq!(report.purged_folders, 1);

    // Both files' bytes are gone and the ledger is still balanced.
    assert_eq!(env.object_count(), 0);
    assert_eq!(env.quota.usage(user.id).await.unwrap().used_bytes, 0);
}

#[tokio::test]
async fn test_empty_trash() {
    let env = TestEnv::new().await;
    let user = env.user(1000).await;

    let loose = env
        .files
        .upload_bytes(user.id, None, "loose.txt", None, Bytes::from("a"))
        .await
        .unwrap();
    let folder = env.folders.create(user.id, None, "folder").await.unwrap();
    env.files
        .upload_bytes(user.id, Some(folder.id), "inner.txt", None, Bytes::from("bb"))
        .await
        .unwrap();
    let survivor = env
        .files
        .upload_bytes(user.id, None, "keep.txt", None, Bytes::from("ccc"))
        .await
        .unwrap();

    env.files.delete(user.id, loose.id).await.unwrap();
    env.folders.delete(user.id, folder.id).await.unwrap();

    let report = env.trash.empty_trash(user.id).await.unwrap();
    assert_eq!(report.purged_files, 2);
    assert_eq!(report.purged_folders, 1);

    assert!(env.trash.list_trash(user.id).await.unwrap().is_empty());
    env.files.get_file(user.id, survivor.id).await.unwrap();
    assert_eq!(env.object_count(), 1);
    assert_eq!(env.quota.usage(user.id).await.unwrap().used_bytes, 3);
}

#[tokio::test]
async fn test_auto_purge_respects_retention_window() {
    // Zero retention purges everything already in the trash; the default
    // 30-day window purges nothing trashed just now.
    let env = TestEnv::with_retention(&TrashConfig { retention_days: 0 }).await;
    let user = env.user(1000).await;

    let file = env
        .files
        .upload_bytes(user.id, None, "a.txt", None, Bytes::from("a"))
        .await
        .unwrap();
    env.files.delete(user.id, file.id).await.unwrap();

    let report = env.trash.auto_purge().await.unwrap();
    assert_eq!(report.purged_files, 1);
    assert!(env.trash.list_trash(user.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_auto_purge_keeps_recent_items() {
    let env = TestEnv::new().await;
    let user = env.user(1000).await;

    let file = env
        .files
        .upload_bytes(user.id, None, "a.txt", None, Bytes::from("a"))
        .await
        .unwrap();
    env.files.delete(user.id, file.id).await.unwrap();

    let report = env.trash.auto_purge().await.unwrap();
    assert_eq!(report.purged_files, 0);
    assert_eq!(env.trash.list_trash(user.id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_restore_live_file_is_rejected() {
    let env = TestEnv::new().await;
    let user = env.user(1000).await;

    let file = env
        .files
        .upload_bytes(user.id, None, "a.txt", None, Bytes::from("a"))
        .await
        .unwrap();

    let err = env.trash.restore_file(user.id, file.id).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::InvalidOperation);
}
