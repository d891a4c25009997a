//! Client-handle contract toward the distributed filesystem.
//!
//! A `DistributedFileSystem` is a stateful handle bound, at acquisition, to
//! one effective user and one filesystem URI. Handles are `Send` but not
//! `Sync`: one handle serves one caller at a time. A `FileSystemConnector`
//! acquires handles for the identity that is current on the calling thread.

use std::collections::HashMap;
use std::io::{Read, Write};

use url::Url;

use crate::config::DfsConfig;
use crate::error::DfsResult;
use crate::path::DfsPath;
use crate::permission::{AclEntry, AclStatus, FsPermission};
use crate::policy::MetaStatus;
use crate::quota::QuotaUsage;
use crate::status::FileStatus;

/// Readable stream over a remote file.
pub type InputStream = Box<dyn Read + Send>;

/// Writable stream into a remote file.
///
/// Bytes written are committed on `flush`. `close` flushes and releases the
/// stream; a stream dropped without `close` commits what it can and logs
/// failures.
pub trait OutputStream: Write + Send {
    /// Flushes outstanding bytes and releases the stream.
    fn close(self: Box<Self>) -> DfsResult<()>;
}

/// Stateful client handle to one filesystem, bound to one user.
///
/// Paths handed to a handle are unqualified and already validated.
pub trait DistributedFileSystem: Send {
    /// URI of the filesystem this handle talks to.
    fn uri(&self) -> &Url;

    /// The user every call on this handle runs as.
    fn user(&self) -> &str;

    /// Opens a file for reading.
    fn open(&self, path: &DfsPath) -> DfsResult<InputStream>;

    /// Creates a file; the parent directory must exist.
    fn create(
        &self,
        path: &DfsPath,
        permission: FsPermission,
        overwrite: bool,
    ) -> DfsResult<Box<dyn OutputStream>>;

    /// Opens an existing file for appending.
    fn append(&self, path: &DfsPath) -> DfsResult<Box<dyn OutputStream>>;

    /// Creates one directory level; the parent must exist.
    fn mkdir(&self, path: &DfsPath, permission: FsPermission) -> DfsResult<bool>;

    /// Creates a directory and every missing ancestor.
    fn mkdirs(&self, path: &DfsPath, permission: FsPermission) -> DfsResult<bool>;

    /// Status of a node; `NotFound` if it does not exist.
    fn get_file_status(&self, path: &DfsPath) -> DfsResult<FileStatus>;

    /// Statuses of the direct children of a directory, or of the file itself.
    fn list_status(&self, path: &DfsPath) -> DfsResult<Vec<FileStatus>>;

    /// Returns true if the node exists.
    fn exists(&self, path: &DfsPath) -> DfsResult<bool> {
        match self.get_file_status(path) {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Deletes a node; `false` if it did not exist.
    fn delete(&self, path: &DfsPath, recursive: bool) -> DfsResult<bool>;

    /// Moves a node within this filesystem.
    fn rename(&self, src: &DfsPath, dst: &DfsPath) -> DfsResult<bool>;

    /// Replaces the permission bits.
    fn set_permission(&self, path: &DfsPath, permission: FsPermission) -> DfsResult<()>;

    /// Replaces the ACL.
    fn set_acl(&self, path: &DfsPath, entries: &[AclEntry]) -> DfsResult<()>;

    /// Reads ownership, permission and ACL.
    fn get_acl_status(&self, path: &DfsPath) -> DfsResult<AclStatus>;

    /// Changes owning user and group.
    fn set_owner(&self, path: &DfsPath, user: &str, group: &str) -> DfsResult<()>;

    /// Sets namespace and space quotas of a directory.
    fn set_quota(&self, path: &DfsPath, namespace_quota: i64, space_quota: i64)
        -> DfsResult<()>;

    /// Reads quotas and consumption of a directory.
    fn get_quota_usage(&self, path: &DfsPath) -> DfsResult<QuotaUsage>;

    /// Assigns a storage policy by name.
    fn set_storage_policy(&self, path: &DfsPath, policy_name: &str) -> DfsResult<()>;

    /// Name of the effective storage policy.
    fn get_storage_policy(&self, path: &DfsPath) -> DfsResult<String>;

    /// Sets the metadata/provenance status of a directory subtree.
    fn set_meta_status(&self, path: &DfsPath, status: MetaStatus) -> DfsResult<()>;

    /// Reads the metadata/provenance status.
    fn get_meta_status(&self, path: &DfsPath) -> DfsResult<MetaStatus>;

    /// Sets an extended attribute.
    fn set_xattr(&self, path: &DfsPath, name: &str, value: &[u8]) -> DfsResult<()>;

    /// Reads an extended attribute; `None` if unset.
    fn get_xattr(&self, path: &DfsPath, name: &str) -> DfsResult<Option<Vec<u8>>>;

    /// Reads all extended attributes.
    fn get_xattrs(&self, path: &DfsPath) -> DfsResult<HashMap<String, Vec<u8>>>;

    /// Removes an extended attribute.
    fn remove_xattr(&self, path: &DfsPath, name: &str) -> DfsResult<()>;

    /// Registers a user.
    fn add_user(&self, user: &str) -> DfsResult<()>;

    /// Unregisters a user.
    fn remove_user(&self, user: &str) -> DfsResult<()>;

    /// Registers a group.
    fn add_group(&self, group: &str) -> DfsResult<()>;

    /// Unregisters a group.
    fn remove_group(&self, group: &str) -> DfsResult<()>;

    /// Adds a user to a group.
    fn add_user_to_group(&self, user: &str, group: &str) -> DfsResult<()>;

    /// Removes a user from a group.
    fn remove_user_from_group(&self, user: &str, group: &str) -> DfsResult<()>;

    /// Releases the handle. Calls after close fail with `Closed`.
    fn close(&self) -> DfsResult<()>;
}

/// Acquires client handles.
pub trait FileSystemConnector: Send + Sync {
    /// Returns a handle to the filesystem at `uri`, bound to the thread's
    /// current identity.
    fn connect(&self, uri: &Url, config: &DfsConfig) -> DfsResult<Box<dyn DistributedFileSystem>>;
}
