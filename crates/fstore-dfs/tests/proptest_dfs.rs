//! Property-based tests for fstore-dfs using proptest.

mod common;

use common::{p, TestFs};
use fstore_dfs::{DfsPath, FsPermission, StoragePolicy};
use proptest::prelude::*;

/// A single path segment without glob metacharacters.
fn segment() -> impl Strategy<Value = String> {
    "[a-z0-9_][a-z0-9_.-]{0,11}".prop_filter("relative segment", |s| s != "." && s != "..")
}

fn absolute_path() -> impl Strategy<Value = String> {
    proptest::collection::vec(segment(), 1..5).prop_map(|segs| format!("/{}", segs.join("/")))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Removing a missing path always succeeds, recursive or not.
    #[test]
    fn test_remove_missing_is_idempotent(path in absolute_path(), recursive in any::<bool>()) {
        let t = TestFs::new();
        let s = t.session("alice");
        let target = p(&format!("/fs{}", path));
        prop_assert!(s.remove(&target, recursive).unwrap());
        prop_assert!(s.remove(&target, recursive).unwrap());
        prop_assert!(!s.exists(&target).unwrap());
    }

    /// Text written with `create_with_content` reads back unchanged.
    #[test]
    fn test_create_then_cat_round_trip(path in absolute_path(), content in "\\PC{0,300}") {
        let t = TestFs::new();
        let s = t.session("alice");
        let target = p(&format!("/fs{}", path));
        s.create_with_content(&target, &content).unwrap();
        prop_assert_eq!(s.cat(&target).unwrap(), content);
    }

    /// Display of a parsed path parses back to the same path.
    #[test]
    fn test_path_display_reparses(path in absolute_path(), qualified in any::<bool>()) {
        let input = if qualified {
            format!("hopsfs://namenode:8020{}", path)
        } else {
            path
        };
        let parsed = DfsPath::parse(&input).unwrap();
        prop_assert_eq!(DfsPath::parse(&parsed.to_string()).unwrap(), parsed);
    }

    /// A parent of an existing path reports the parent's own permission.
    #[test]
    fn test_parent_permission_of_existing_path(mode in 0o700u16..=0o777u16, name in segment()) {
        let t = TestFs::new();
        let s = t.session("alice");
        let dir = p("/fs/dir");
        s.mkdirs(&dir, FsPermission::from_mode(mode)).unwrap();
        s.touch(&dir.join(&name).unwrap()).unwrap();
        prop_assert_eq!(
            s.get_parent_permission(&dir.join(&name).unwrap()).unwrap(),
            FsPermission::from_mode(mode)
        );
    }
}

#[test]
fn test_storage_policy_names_round_trip() {
    for policy in StoragePolicy::ALL {
        assert_eq!(StoragePolicy::from_policy_name(policy.policy_name()).unwrap(), policy);
    }
    assert!(StoragePolicy::from_policy_name("WARM").is_err());
}
