//! Node status snapshots.

use serde::{Deserialize, Serialize};

use crate::path::DfsPath;
use crate::permission::FsPermission;

/// Kind of filesystem node.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileKind {
    /// Regular file.
    File,
    /// Directory.
    Directory,
}

/// Immutable snapshot of a node's attributes, re-fetched on demand.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileStatus {
    /// Location of the node.
    pub path: DfsPath,
    /// File or directory.
    pub kind: FileKind,
    /// Length in bytes (0 for directories).
    pub len: u64,
    /// Permission bits.
    pub permission: FsPermission,
    /// Owning user.
    pub owner: String,
    /// Owning group.
    pub group: String,
    /// Modification time, epoch milliseconds.
    pub modification_time: u64,
    /// Access time, epoch milliseconds.
    pub access_time: u64,
    /// Replication factor (0 for directories).
    pub replication: u16,
    /// Block size in bytes (0 for directories).
    pub block_size: u64,
}

impl FileStatus {
    /// Returns true for directories.
    pub fn is_dir(&self) -> bool {
        self.kind == FileKind::Directory
    }

    /// Returns true for regular files.
    pub fn is_file(&self) -> bool {
        self.kind == FileKind::File
    }
}
