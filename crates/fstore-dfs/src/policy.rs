//! Storage tier policies and metadata/provenance status flags.
//!
//! Both enumerations map onto names understood by the filesystem. The
//! mappings are total `match` expressions without a wildcard arm, so adding
//! a variant without a mapping fails to compile, and unknown names coming
//! back from the filesystem are rejected instead of defaulted.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{DfsError, DfsResult};

/// Placement tier for file data under a subtree.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StoragePolicy {
    /// Data is kept in the cloud object tier.
    Cloud,
    /// Small files are stored inline in the metadata database.
    SmallFiles,
    /// Regular hot disk tier.
    Default,
}

impl StoragePolicy {
    /// Every policy, in declaration order.
    pub const ALL: [StoragePolicy; 3] = [
        StoragePolicy::Cloud,
        StoragePolicy::SmallFiles,
        StoragePolicy::Default,
    ];

    /// The filesystem's name for this policy.
    pub fn policy_name(&self) -> &'static str {
        match self {
            StoragePolicy::Cloud => "CLOUD",
            StoragePolicy::SmallFiles => "DB",
            StoragePolicy::Default => "HOT",
        }
    }

    /// Resolves a filesystem policy name.
    pub fn from_policy_name(name: &str) -> DfsResult<Self> {
        match name {
            "CLOUD" => Ok(StoragePolicy::Cloud),
            "DB" => Ok(StoragePolicy::SmallFiles),
            "HOT" => Ok(StoragePolicy::Default),
            _ => Err(DfsError::UnknownStoragePolicy(name.to_string())),
        }
    }
}

impl fmt::Display for StoragePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.policy_name())
    }
}

impl FromStr for StoragePolicy {
    type Err = DfsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        StoragePolicy::from_policy_name(s)
    }
}

/// How much change tracking the filesystem performs under a subtree.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MetaStatus {
    /// No metadata or provenance logging.
    Disabled,
    /// Metadata (xattr) changes are logged.
    MetaEnabled,
    /// Metadata plus minimal provenance (create/delete) is logged.
    MinProvEnabled,
    /// Metadata plus full provenance (every access) is logged.
    FullProvEnabled,
}

/// Provenance capture level implied by a [`MetaStatus`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum ProvenanceLevel {
    /// Nothing is captured.
    None,
    /// Create and delete operations.
    Minimal,
    /// Every operation.
    Full,
}

impl MetaStatus {
    /// Every status, in declaration order.
    pub const ALL: [MetaStatus; 4] = [
        MetaStatus::Disabled,
        MetaStatus::MetaEnabled,
        MetaStatus::MinProvEnabled,
        MetaStatus::FullProvEnabled,
    ];

    /// Name used on the wire.
    pub fn name(&self) -> &'static str {
        match self {
            MetaStatus::Disabled => "DISABLED",
            MetaStatus::MetaEnabled => "META_ENABLED",
            MetaStatus::MinProvEnabled => "MIN_PROV_ENABLED",
            MetaStatus::FullProvEnabled => "FULL_PROV_ENABLED",
        }
    }

    /// Numeric code stored on the inode.
    pub fn code(&self) -> u8 {
        match self {
            MetaStatus::Disabled => 0,
            MetaStatus::MetaEnabled => 1,
            MetaStatus::MinProvEnabled => 2,
            MetaStatus::FullProvEnabled => 3,
        }
    }

    /// Resolves a numeric code.
    pub fn from_code(code: u8) -> DfsResult<Self> {
        match code {
            0 => Ok(MetaStatus::Disabled),
            1 => Ok(MetaStatus::MetaEnabled),
            2 => Ok(MetaStatus::MinProvEnabled),
            3 => Ok(MetaStatus::FullProvEnabled),
            _ => Err(DfsError::UnknownMetaStatus(code.to_string())),
        }
    }

    /// Returns true if xattr changes are logged.
    pub fn is_meta_enabled(&self) -> bool {
        match self {
            MetaStatus::Disabled => false,
            MetaStatus::MetaEnabled => true,
            MetaStatus::MinProvEnabled => true,
            MetaStatus::FullProvEnabled => true,
        }
    }

    /// The provenance capture level.
    pub fn provenance(&self) -> ProvenanceLevel {
        match self {
            MetaStatus::Disabled => ProvenanceLevel::None,
            MetaStatus::MetaEnabled => ProvenanceLevel::None,
            MetaStatus::MinProvEnabled => ProvenanceLevel::Minimal,
            MetaStatus::FullProvEnabled => ProvenanceLevel::Full,
        }
    }
}

impl fmt::Display for MetaStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for MetaStatus {
    type Err = DfsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "DISABLED" => Ok(MetaStatus::Disabled),
            "META_ENABLED" => Ok(MetaStatus::MetaEnabled),
            "MIN_PROV_ENABLED" => Ok(MetaStatus::MinProvEnabled),
            "FULL_PROV_ENABLED" => Ok(MetaStatus::FullProvEnabled),
            _ => Err(DfsError::UnknownMetaStatus(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_policy_roundtrip() {
        for policy in StoragePolicy::ALL {
            assert_eq!(StoragePolicy::from_policy_name(policy.policy_name()).unwrap(), policy);
        }
    }

    #[test]
    fn test_storage_policy_names() {
        assert_eq!(StoragePolicy::Cloud.to_string(), "CLOUD");
        assert_eq!(StoragePolicy::SmallFiles.to_string(), "DB");
        assert_eq!(StoragePolicy::Default.to_string(), "HOT");
    }

    #[test]
    fn test_storage_policy_unknown_name() {
        for name in ["WARM", "hot", "", "SMALL_FILES"] {
            match StoragePolicy::from_policy_name(name) {
                Err(DfsError::UnknownStoragePolicy(n)) => assert_eq!(n, name),
                other => panic!("expected UnknownStoragePolicy, got {:?}", other),
            }
        }
    }

    #[test]
    fn test_meta_status_code_roundtrip() {
        for status in MetaStatus::ALL {
            assert_eq!(MetaStatus::from_code(status.code()).unwrap(), status);
            assert_eq!(status.name().parse::<MetaStatus>().unwrap(), status);
        }
        assert!(MetaStatus::from_code(4).is_err());
        assert!("PROV".parse::<MetaStatus>().is_err());
    }

    #[test]
    fn test_meta_status_levels() {
        assert!(!MetaStatus::Disabled.is_meta_enabled());
        assert!(MetaStatus::MetaEnabled.is_meta_enabled());
        assert_eq!(MetaStatus::MetaEnabled.provenance(), ProvenanceLevel::None);
        assert_eq!(MetaStatus::MinProvEnabled.provenance(), ProvenanceLevel::Minimal);
        assert_eq!(MetaStatus::FullProvEnabled.provenance(), ProvenanceLevel::Full);
        assert!(ProvenanceLevel::Full > ProvenanceLevel::Minimal);
    }
}
