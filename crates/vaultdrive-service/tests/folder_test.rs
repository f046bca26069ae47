//! Folder hierarchy integration tests.

mod common;

use bytes::Bytes;
use common::TestEnv;
use vaultdrive_core::error::ErrorKind;

#[tokio::test]
async fn test_materialized_paths_follow_nesting() {
    let env = TestEnv::new().await;
    let user = env.user(1000).await;

    let docs = env.folders.create(user.id, None, "Documents").await.unwrap();
    assert_eq!(docs.path, format!("/{}", docs.id));
    assert_eq!(docs.depth, 0);

    let work = env
        .folders
        .create(user.id, Some(docs.id), "Work")
        .await
        .unwrap();
    assert_eq!(work.path, format!("/{}/{}", docs.id, work.id));
    assert_eq!(work.depth, 1);
}

#[tokio::test]
async fn test_duplicate_sibling_names_conflict() {
    let env = TestEnv::new().await;
    let user = env.user(1000).await;

    env.folders.create(user.id, None, "Photos").await.unwrap();
    let err = env
        .folders
        .create(user.id, None, "Photos")
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Conflict);

    // The same name under a different parent is fine.
    let other = env.folders.create(user.id, None, "Other").await.unwrap();
    env.folders
        .create(user.id, Some(other.id), "Photos")
        .await
        .unwrap();
}

#[tokio::test]
async fn test_rename_keeps_paths() {
    let env = TestEnv::new().await;
    let user = env.user(1000).await;

    let parent = env.folders.create(user.id, None, "Old").await.unwrap();
    let child = env
        .folders
        .create(user.id, Some(parent.id), "Child")
        .await
        .unwrap();

    let renamed = env
        .folders
        .rename(user.id, parent.id, "New")
        .await
        .unwrap();
    assert_eq!(renamed.name, "New");
    assert_eq!(renamed.path, parent.path);

    let child_after = env
        .folders
        .get_folder(user.id, child.id)
        .await
        .unwrap();
    assert_eq!(child_after.path, child.path);
}

#[tokio::test]
async fn test_move_folder_rewrites_subtree_paths() {
    let env = TestEnv::new().await;
    let user = env.user(1000).await;

    let a = env.folders.create(user.id, None, "a").await.unwrap();
    let b = env.folders.create(user.id, Some(a.id), "b").await.unwrap();
    let c = env.folders.create(user.id, Some(b.id), "c").await.unwrap();
    let target = env.folders.create(user.id, None, "target").await.unwrap();

    env.folders
        .move_folder(user.id, a.id, Some(target.id))
        .await
        .unwrap();

    let a_after = env.folders.get_folder(user.id, a.id).await.unwrap();
    assert_eq!(a_after.path, format!("/{}/{}", target.id, a.id));
    assert_eq!(a_after.depth, 1);

    let c_after = env.folders.get_folder(user.id, c.id).await.unwrap();
    assert_eq!(
        c_after.path,
        format!("/{}/{}/{}/{}", target.id, a.id, b.id, c.id)
    );
    assert_eq!(c_after.depth, 3);
}

#[tokio::test]
async fn test_move_folder_rejects_cycles() {
    let env = TestEnv::new().await;
    let user = env.user(1000).await;

    let a = env.folders.create(user.id, None, "a").await.unwrap();
    let b = env.folders.create(user.id, Some(a.id), "b").await.unwrap();

    let err = env
        .folders
        .move_folder(user.id, a.id, Some(a.id))
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::InvalidOperation);

    let err = env
        .folders
        .move_folder(user.id, a.id, Some(b.id))
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::InvalidOperation);

    // Rejected moves leave the whole hierarchy untouched.
    let a_after = env.folders.get_folder(user.id, a.id).await.unwrap();
    assert_eq!(a_after.parent_id, None);
    assert_eq!(a_after.path, format!("/{}", a.id));
    assert_eq!(a_after.depth, 0);
    let b_after = env.folders.get_folder(user.id, b.id).await.unwrap();
    assert_eq!(b_after.parent_id, Some(a.id));
    assert_eq!(b_after.path, format!("/{}/{}", a.id, b.id));
    assert_eq!(b_after.depth, 1);

    // Moving to the root level is always structurally fine.
    env.folders.move_folder(user.id, b.id, None).await.unwrap();
    let b_after = env.folders.get_folder(user.id, b.id).await.unwrap();
    assert_eq!(b_after.path, format!("/{}", b.id));
    assert_eq!(b_after.depth, 0);
}

#[tokio::test]
async fn test_contents_lists_live_children_only() {
    let env = TestEnv::new().await;
    let user = env.user(1000).await;

    let root_folder = env.folders.create(user.id, None, "stuff").await.unwrap();
    env.files
        .upload_bytes(
            user.id,
            Some(root_folder.id),
            "keep.txt",
            None,
            Bytes::from("keep"),
        )
        .await
        .unwrap();
    let doomed = env
        .files
        .upload_bytes(
            user.id,
            Some(root_folder.id),
            "gone.txt",
            None,
            Bytes::from("gone"),
        )
        .await
        .unwrap();
    env.folders
        .create(user.id, Some(root_folder.id), "sub")
        .await
        .unwrap();

    env.files.delete(user.id, doomed.id).await.unwrap();

    let contents = env
        .folders
        .contents(user.id, Some(root_folder.id))
        .await
        .unwrap();
    assert_eq!(contents.folders.len(), 1);
    assert_eq!(contents.files.len(), 1);
    assert_eq!(contents.files[0].name, "keep.txt");
}

#[tokio::test]
async fn test_move_file_conflict_in_target() {
    let env = TestEnv::new().await;
    let user = env.user(1000).await;

    let folder = env.folders.create(user.id, None, "dst").await.unwrap();
    env.files
        .upload_bytes(user.id, Some(folder.id), "a.txt", None, Bytes::from("x"))
        .await
        .unwrap();
    let rootside = env
        .files
        .upload_bytes(user.id, None, "a.txt", None, Bytes::from("y"))
        .await
        .unwrap();

    let err = env
        .files
        .move_file(user.id, rootside.id, Some(folder.id))
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Conflict);
}

#[tokio::test]
async fn test_operations_on_foreign_folders_are_not_found() {
    let env = TestEnv::new().await;
    let owner = env.user(1000).await;
    let stranger = env.user(1000).await;

    let folder = env.folders.create(owner.id, None, "private").await.unwrap();

    let err = env
        .folders
        .get_folder(stranger.id, folder.id)
        .await
        .unwrap_err();
    assert!(err.is_not_found());

    let err = env
        .folders
        .delete(stranger.id, folder.id)
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}
