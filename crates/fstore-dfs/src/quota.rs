//! Namespace and space quota values.
//!
//! Namespace quotas count inodes (the directory itself included), space
//! quotas count bytes. Two sentinels are accepted wherever a quota value is:
//! [`QUOTA_RESET`] clears the limit and [`QUOTA_DONT_SET`] leaves the
//! current limit untouched.

use serde::{Deserialize, Serialize};

use crate::error::{DfsError, DfsResult};

/// Clears a quota (no limit).
pub const QUOTA_RESET: i64 = -1;

/// Leaves a quota unchanged.
pub const QUOTA_DONT_SET: i64 = i64::MAX;

/// Quota limits and consumption of a directory subtree.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaUsage {
    /// Inode limit, or [`QUOTA_RESET`] when unset.
    pub namespace_quota: i64,
    /// Inodes in the subtree, the directory included.
    pub file_and_directory_count: i64,
    /// Byte limit, or [`QUOTA_RESET`] when unset.
    pub space_quota: i64,
    /// Bytes stored in the subtree.
    pub space_consumed: i64,
}

impl QuotaUsage {
    /// Returns true if a namespace limit is set.
    pub fn has_namespace_quota(&self) -> bool {
        self.namespace_quota != QUOTA_RESET
    }

    /// Returns true if a space limit is set.
    pub fn has_space_quota(&self) -> bool {
        self.space_quota != QUOTA_RESET
    }
}

/// Validates a namespace quota argument: positive, or one of the sentinels.
pub fn validate_namespace_quota(value: i64) -> DfsResult<()> {
    if value > 0 || value == QUOTA_RESET {
        Ok(())
    } else {
        Err(DfsError::InvalidArgument(format!(
            "invalid namespace quota {}: must be positive, QUOTA_RESET or QUOTA_DONT_SET",
            value
        )))
    }
}

/// Validates a space quota argument: non-negative, or one of the sentinels.
pub fn validate_space_quota(value: i64) -> DfsResult<()> {
    if value >= 0 || value == QUOTA_RESET {
        Ok(())
    } else {
        Err(DfsError::InvalidArgument(format!(
            "invalid space quota {}: must be non-negative, QUOTA_RESET or QUOTA_DONT_SET",
            value
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_namespace_quota_validation() {
        assert!(validate_namespace_quota(1).is_ok());
        assert!(validate_namespace_quota(QUOTA_RESET).is_ok());
        assert!(validate_namespace_quota(QUOTA_DONT_SET).is_ok());
        assert!(validate_namespace_quota(0).is_err());
        assert!(validate_namespace_quota(-5).is_err());
    }

    #[test]
    fn test_space_quota_validation() {
        assert!(validate_space_quota(0).is_ok());
        assert!(validate_space_quota(1_000_000).is_ok());
        assert!(validate_space_quota(QUOTA_RESET).is_ok());
        assert!(validate_space_quota(QUOTA_DONT_SET).is_ok());
        assert!(validate_space_quota(-2).is_err());
    }

    #[test]
    fn test_usage_flags() {
        let usage = QuotaUsage {
            namespace_quota: QUOTA_RESET,
            file_and_directory_count: 3,
            space_quota: 1024,
            space_consumed: 10,
        };
        assert!(!usage.has_namespace_quota());
        assert!(usage.has_space_quota());
    }
}
