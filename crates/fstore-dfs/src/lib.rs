#![warn(missing_docs)]

//! fstore filesystem gateway: impersonated sessions over a distributed
//! filesystem with path operations, ACLs, quotas, storage policies and
//! extended attributes.

pub mod access;
pub mod cli;
pub mod client;
pub mod config;
mod copy;
pub mod error;
pub mod glob;
pub mod identity;
pub mod memory;
pub mod path;
pub mod permission;
pub mod policy;
pub mod quota;
pub mod session;
pub mod status;

mod acl_ops;
mod meta_ops;
mod path_ops;
mod quota_ops;

pub use client::{DistributedFileSystem, FileSystemConnector, InputStream, OutputStream};
pub use config::DfsConfig;
pub use error::{DfsError, DfsResult};
pub use identity::UserIdentity;
pub use memory::{MemoryConnector, MemoryFileSystem, MemoryNamespace};
pub use path::{DfsPath, HOPSFS_SCHEME};
pub use path_ops::CAT_CHUNK_SIZE;
pub use permission::{AclEntry, AclEntryScope, AclEntryType, AclStatus, FsAction, FsPermission};
pub use policy::{MetaStatus, ProvenanceLevel, StoragePolicy};
pub use quota::{QuotaUsage, QUOTA_DONT_SET, QUOTA_RESET};
pub use session::{DfsSession, SessionFactory};
pub use status::{FileKind, FileStatus};
