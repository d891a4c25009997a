//! Quotas and storage policies.

use tracing::debug;

use crate::error::DfsResult;
use crate::path::DfsPath;
use crate::policy::StoragePolicy;
use crate::quota::{validate_namespace_quota, validate_space_quota, QuotaUsage, QUOTA_RESET};
use crate::session::DfsSession;

impl DfsSession {
    /// Sets the space quota and resets the namespace quota.
    ///
    /// This overwrites both dimensions; it does not merge with an existing
    /// namespace quota.
    pub fn set_space_quota(&self, path: &DfsPath, bytes: i64) -> DfsResult<()> {
        self.set_quota(path, QUOTA_RESET, bytes)
    }

    /// Sets the namespace (inode count) and space (bytes) quotas of a
    /// directory. Values are validated before the filesystem is called.
    pub fn set_quota(&self, path: &DfsPath, max_files: i64, max_bytes: i64) -> DfsResult<()> {
        validate_namespace_quota(max_files)?;
        validate_space_quota(max_bytes)?;
        let path = self.resolve(path)?;
        self.fs()?.set_quota(&path, max_files, max_bytes)?;
        debug!(path = %path, max_files, max_bytes, "quota set");
        Ok(())
    }

    /// Quotas and consumption of a directory subtree.
    pub fn get_quota_usage(&self, path: &DfsPath) -> DfsResult<QuotaUsage> {
        let path = self.resolve(path)?;
        self.fs()?.get_quota_usage(&path)
    }

    /// Assigns a storage policy to a subtree.
    pub fn set_storage_policy(&self, path: &DfsPath, policy: StoragePolicy) -> DfsResult<()> {
        let path = self.resolve(path)?;
        self.fs()?.set_storage_policy(&path, policy.policy_name())?;
        debug!(path = %path, policy = %policy, "storage policy set");
        Ok(())
    }

    /// The effective storage policy. A name the enumeration does not know
    /// is an error.
    pub fn get_storage_policy(&self, path: &DfsPath) -> DfsResult<StoragePolicy> {
        let path = self.resolve(path)?;
        let name = self.fs()?.get_storage_policy(&path)?;
        StoragePolicy::from_policy_name(&name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DfsError;
    use crate::permission::FsPermission;
    use crate::quota::QUOTA_DONT_SET;
    use crate::session::fixtures::{namespace, p, session_as, SUPERUSER};

    #[test]
    fn test_set_space_quota_resets_namespace_quota() {
        let (_ns, factory) = namespace();
        let admin = session_as(&factory, SUPERUSER);
        admin.mkdirs(&p("/fs/proj"), FsPermission::dir_default()).unwrap();
        admin.set_quota(&p("/fs/proj"), 100, 1_000_000).unwrap();
        admin.set_space_quota(&p("/fs/proj"), 2_000_000).unwrap();
        let usage = admin.get_quota_usage(&p("/fs/proj")).unwrap();
        assert_eq!(usage.namespace_quota, QUOTA_RESET);
        assert_eq!(usage.space_quota, 2_000_000);
        assert!(!usage.has_namespace_quota());
    }

    #[test]
    fn test_quota_dont_set_keeps_value() {
        let (_ns, factory) = namespace();
        let admin = session_as(&factory, SUPERUSER);
        admin.mkdirs(&p("/fs/proj"), FsPermission::dir_default()).unwrap();
        admin.set_quota(&p("/fs/proj"), 100, 1_000).unwrap();
        admin.set_quota(&p("/fs/proj"), QUOTA_DONT_SET, 5_000).unwrap();
        let usage = admin.get_quota_usage(&p("/fs/proj")).unwrap();
        assert_eq!((usage.namespace_quota, usage.space_quota), (100, 5_000));
    }

    #[test]
    fn test_invalid_quota_rejected_before_remote_call() {
        let (_ns, factory) = namespace();
        let alice = session_as(&factory, "alice");
        // alice is not the superuser, so a remote call would be denied instead
        assert!(alice.set_quota(&p("/fs"), 0, 10).unwrap_err().is_invalid_argument());
        assert!(alice.set_quota(&p("/fs"), 10, -7).unwrap_err().is_invalid_argument());
        assert!(alice.set_space_quota(&p("/fs"), -3).unwrap_err().is_invalid_argument());
    }

    #[test]
    fn test_set_quota_requires_superuser() {
        let (_ns, factory) = namespace();
        let alice = session_as(&factory, "alice");
        alice.mkdir_default(&p("/fs/mine")).unwrap();
        assert!(matches!(
            alice.set_quota(&p("/fs/mine"), 10, 10),
            Err(DfsError::PermissionDenied { .. })
        ));
    }

    #[test]
    fn test_namespace_quota_enforced() {
        let (_ns, factory) = namespace();
        let admin = session_as(&factory, SUPERUSER);
        admin.mkdirs(&p("/fs/small"), FsPermission::from_mode(0o777)).unwrap();
        admin.set_quota(&p("/fs/small"), 3, QUOTA_RESET).unwrap();

        let alice = session_as(&factory, "alice");
        alice.touch(&p("/fs/small/a")).unwrap();
        alice.touch(&p("/fs/small/b")).unwrap();
        assert!(matches!(
            alice.touch(&p("/fs/small/c")),
            Err(DfsError::QuotaExceeded { kind: "namespace", .. })
        ));
        let usage = alice.get_quota_usage(&p("/fs/small")).unwrap();
        assert_eq!(usage.file_and_directory_count, 3);
    }

    #[test]
    fn test_space_quota_enforced() {
        let (_ns, factory) = namespace();
        let admin = session_as(&factory, SUPERUSER);
        admin.mkdirs(&p("/fs/tiny"), FsPermission::from_mode(0o777)).unwrap();
        admin.set_space_quota(&p("/fs/tiny"), 8).unwrap();

        let alice = session_as(&factory, "alice");
        alice.create_with_content(&p("/fs/tiny/ok"), "1234").unwrap();
        assert!(matches!(
            alice.create_with_content(&p("/fs/tiny/big"), "123456789"),
            Err(DfsError::QuotaExceeded { kind: "space", .. })
        ));
        assert_eq!(alice.get_quota_usage(&p("/fs/tiny")).unwrap().space_consumed, 4);
    }

    #[test]
    fn test_storage_policy_inherited() {
        let (_ns, factory) = namespace();
        let alice = session_as(&factory, "alice");
        alice.mkdirs(&p("/fs/tiered/sub"), FsPermission::dir_default()).unwrap();
        assert_eq!(
            alice.get_storage_policy(&p("/fs/tiered/sub")).unwrap(),
            StoragePolicy::Default
        );
        alice
            .set_storage_policy(&p("/fs/tiered"), StoragePolicy::Cloud)
            .unwrap();
        assert_eq!(
            alice.get_storage_policy(&p("/fs/tiered/sub")).unwrap(),
            StoragePolicy::Cloud
        );
        alice
            .set_storage_policy(&p("/fs/tiered/sub"), StoragePolicy::SmallFiles)
            .unwrap();
        assert_eq!(
            alice.get_storage_policy(&p("/fs/tiered/sub")).unwrap(),
            StoragePolicy::SmallFiles
        );
    }
}
