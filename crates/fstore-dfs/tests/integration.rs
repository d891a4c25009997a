//! End-to-end tests of the gateway against the in-memory filesystem.
//!
//! These cover session acquisition under impersonation, the documented
//! path-operation edge cases and the quota, policy and metadata calls.

mod common;

use std::fs;
use std::sync::Arc;
use std::thread;

use common::{p, TestFs, SUPERUSER, URI};
use fstore_dfs::{
    AclEntry, DfsError, FileSystemConnector, FsAction, FsPermission, MemoryConnector,
    MemoryNamespace, MetaStatus, SessionFactory, StoragePolicy, UserIdentity, QUOTA_RESET,
};
use tempfile::TempDir;

#[test]
fn test_mkdirs_touch_exists_remove() {
    let t = TestFs::new();
    let s = t.session("alice");
    s.mkdirs(&p("/fs/a/b"), FsPermission::dir_default()).unwrap();
    s.touch(&p("/fs/a/b/f")).unwrap();
    assert!(s.exists(&p("/fs/a/b/f")).unwrap());
    assert!(s.remove(&p("/fs/a/b"), true).unwrap());
    assert!(!s.exists(&p("/fs/a/b")).unwrap());
    s.close();
}

#[test]
fn test_set_space_quota_resets_file_count_quota() {
    let t = TestFs::new();
    let admin = t.admin();
    admin.mkdirs(&p("/fs/project"), FsPermission::dir_default()).unwrap();
    admin.set_quota(&p("/fs/project"), 100, 1_000_000).unwrap();
    admin.set_space_quota(&p("/fs/project"), 2_000_000).unwrap();
    let usage = admin.get_quota_usage(&p("/fs/project")).unwrap();
    assert_eq!(usage.namespace_quota, QUOTA_RESET);
    assert_eq!(usage.space_quota, 2_000_000);
}

#[test]
fn test_glob_copy_into_file_fails_before_copying() {
    let t = TestFs::new();
    let s = t.session("alice");
    for name in ["x1", "x2", "x3"] {
        s.create_with_content(&p(&format!("/fs/src/{}", name)), name).unwrap();
    }
    s.create_with_content(&p("/fs/target"), "keep").unwrap();
    let inodes = t.ns.inode_count();

    let err = s.copy_within_remote(&p("/fs/src/x*"), &p("/fs/target")).unwrap_err();
    assert!(matches!(err, DfsError::MultipleSourcesNeedDirectory { count: 3, .. }));
    assert_eq!(t.ns.inode_count(), inodes);
    assert_eq!(s.cat(&p("/fs/target")).unwrap(), "keep");
}

#[test]
fn test_glob_copy_single_match_into_new_file() {
    let t = TestFs::new();
    let s = t.session("alice");
    s.create_with_content(&p("/fs/src/only.csv"), "1").unwrap();
    assert_eq!(s.copy_within_remote(&p("/fs/src/*.csv"), &p("/fs/copy.csv")).unwrap(), 1);
    assert_eq!(s.cat(&p("/fs/copy.csv")).unwrap(), "1");
}

#[test]
fn test_recursive_copy_within_remote() {
    let t = TestFs::new();
    let s = t.session("alice");
    s.create_with_content(&p("/fs/tree/a/1.txt"), "one").unwrap();
    s.create_with_content(&p("/fs/tree/b/2.txt"), "two").unwrap();
    s.mkdir_default(&p("/fs/backup")).unwrap();

    s.copy_within_remote(&p("/fs/tree"), &p("/fs/backup")).unwrap();
    assert_eq!(s.cat(&p("/fs/backup/tree/a/1.txt")).unwrap(), "one");
    assert_eq!(s.cat(&p("/fs/backup/tree/b/2.txt")).unwrap(), "two");
    assert!(s
        .copy_within_remote(&p("/fs/tree"), &p("/fs/tree/a"))
        .unwrap_err()
        .is_invalid_argument());
}

#[test]
fn test_copy_within_remote_never_merges_directories() {
    let t = TestFs::new();
    let s = t.session("alice");
    s.create_with_content(&p("/fs/src/new.txt"), "new").unwrap();
    s.create_with_content(&p("/fs/dst/src/old.txt"), "old").unwrap();

    let err = s.copy_within_remote(&p("/fs/src"), &p("/fs/dst")).unwrap_err();
    assert!(matches!(err, DfsError::IsADirectory { .. }));
    assert!(!s.exists(&p("/fs/dst/src/new.txt")).unwrap());
    assert_eq!(s.cat(&p("/fs/dst/src/old.txt")).unwrap(), "old");
}

#[test]
fn test_get_parent_permission_matches_parent_status() {
    let t = TestFs::new();
    let s = t.session("alice");
    s.mkdirs(&p("/fs/perm"), FsPermission::from_mode(0o751)).unwrap();
    s.touch(&p("/fs/perm/file")).unwrap();
    assert_eq!(
        s.get_parent_permission(&p("/fs/perm/file")).unwrap(),
        s.get_status(&p("/fs/perm")).unwrap().permission
    );
    assert_eq!(
        s.get_parent_permission(&p("/fs/perm/no/such/file")).unwrap(),
        FsPermission::from_mode(0o751)
    );
}

#[test]
fn test_local_tree_round_trip() {
    let t = TestFs::new();
    let s = t.session("alice");
    let tmp = TempDir::new().unwrap();
    let src = tmp.path().join("dataset");
    fs::create_dir_all(src.join("part")).unwrap();
    fs::write(src.join("meta.json"), "{}").unwrap();
    fs::write(src.join("part").join("0.csv"), "a,b").unwrap();

    s.copy_to_remote_from_local(false, &src, &p("/fs/ds/v1/dataset")).unwrap();
    assert_eq!(s.cat(&p("/fs/ds/v1/dataset/part/0.csv")).unwrap(), "a,b");

    let out = tmp.path().join("out");
    s.copy_remote_to_local(&p("/fs/ds/v1/dataset"), &out).unwrap();
    assert_eq!(fs::read_to_string(out.join("meta.json")).unwrap(), "{}");
    assert_eq!(fs::read_to_string(out.join("part").join("0.csv")).unwrap(), "a,b");
}

#[test]
fn test_operations_run_as_effective_user() {
    let t = TestFs::new();
    let alice = t.session("alice");
    alice.mkdirs(&p("/fs/private"), FsPermission::from_mode(0o700)).unwrap();
    alice.create_with_content(&p("/fs/private/key"), "k").unwrap();
    assert_eq!(alice.get_status(&p("/fs/private/key")).unwrap().owner, "alice");

    let bob = t.session("bob");
    assert!(matches!(
        bob.cat(&p("/fs/private/key")),
        Err(DfsError::PermissionDenied { .. })
    ));
    assert!(matches!(
        bob.touch(&p("/fs/private/other")),
        Err(DfsError::PermissionDenied { .. })
    ));

    // the thread identity at call time does not matter once bound
    let result = UserIdentity::new("alice")
        .unwrap()
        .do_as(|| bob.cat(&p("/fs/private/key")));
    assert!(result.is_err());
}

#[test]
fn test_proxy_user_session() {
    let t = TestFs::new();
    let service = UserIdentity::new("serving").unwrap();
    let proxy = UserIdentity::create_proxy_user("alice", &service).unwrap();
    let s = t.factory.open(&proxy, t.config()).unwrap();
    s.touch(&p("/fs/proxied")).unwrap();
    assert_eq!(s.get_status(&p("/fs/proxied")).unwrap().owner, "alice");
    assert!(s.effective_user().is_proxy());
}

#[test]
fn test_sessions_per_thread() {
    let t = Arc::new(TestFs::new());
    let handles: Vec<_> = ["u1", "u2", "u3", "u4"]
        .into_iter()
        .map(|user| {
            let t = Arc::clone(&t);
            thread::spawn(move || {
                let s = t.session(user);
                let path = p(&format!("/fs/{}/data", user));
                s.create_with_content(&path, user).unwrap();
                assert_eq!(s.get_status(&path).unwrap().owner, user);
                s.cat(&path).unwrap()
            })
        })
        .collect();
    let mut contents: Vec<String> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    contents.sort();
    assert_eq!(contents, vec!["u1", "u2", "u3", "u4"]);
}

#[test]
fn test_unregistered_user_cannot_acquire_handle() {
    let ns = Arc::new(
        MemoryNamespace::new(URI, SUPERUSER)
            .unwrap()
            .registered_users_only(true),
    );
    let connector = MemoryConnector::with_namespace(Arc::clone(&ns));
    let factory = SessionFactory::new(Arc::new(connector));
    let config = fstore_dfs::DfsConfig {
        default_fs: URI.to_string(),
        ..Default::default()
    };

    let err = factory
        .open(&UserIdentity::new("mallory").unwrap(), config.clone())
        .unwrap_err();
    match err {
        DfsError::HandleAcquisition { user, uri, .. } => {
            assert_eq!(user, "mallory");
            assert_eq!(uri, URI);
        }
        other => panic!("expected HandleAcquisition, got {:?}", other),
    }

    let admin = factory
        .open(&UserIdentity::new(SUPERUSER).unwrap(), config.clone())
        .unwrap();
    admin.add_user("mallory").unwrap();
    assert!(factory
        .open(&UserIdentity::new("mallory").unwrap(), config)
        .is_ok());
}

#[test]
fn test_connector_uses_thread_identity() {
    let t = TestFs::new();
    let connector = MemoryConnector::with_namespace(Arc::clone(&t.ns));
    let uri = url::Url::parse(URI).unwrap();
    let handle = UserIdentity::new("carol")
        .unwrap()
        .do_as(|| connector.connect(&uri, &t.config()))
        .unwrap();
    assert_eq!(handle.user(), "carol");
    handle.close().unwrap();
    assert!(matches!(handle.close(), Ok(())));
    assert!(matches!(handle.exists(&p("/fs")), Err(DfsError::Closed)));
}

#[test]
fn test_close_is_best_effort() {
    let t = TestFs::new();
    let s = t.session("alice");
    t.ns.set_fail_on_close(true);
    s.close();
    t.ns.set_fail_on_close(false);
}

#[test]
fn test_acl_and_storage_policy_and_meta_status() {
    let t = TestFs::new();
    let alice = t.session("alice");
    alice.mkdirs(&p("/fs/fg/sales_1"), FsPermission::from_mode(0o750)).unwrap();
    alice
        .set_acl(&p("/fs/fg"), &[AclEntry::user("bob", FsAction::READ_EXECUTE)])
        .unwrap();
    alice
        .set_storage_policy(&p("/fs/fg"), StoragePolicy::SmallFiles)
        .unwrap();
    alice
        .set_meta_status(&p("/fs/fg"), MetaStatus::MinProvEnabled)
        .unwrap();

    let bob = t.session("bob");
    assert_eq!(
        bob.get_storage_policy(&p("/fs/fg/sales_1")).unwrap(),
        StoragePolicy::SmallFiles
    );
    assert_eq!(
        bob.get_meta_status(&p("/fs/fg/sales_1")).unwrap(),
        MetaStatus::MinProvEnabled
    );
}
