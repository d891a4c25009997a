//! Extended attributes and metadata status.

use std::collections::HashMap;

use tracing::debug;

use crate::error::DfsResult;
use crate::path::DfsPath;
use crate::policy::MetaStatus;
use crate::session::DfsSession;

impl DfsSession {
    /// Sets an extended attribute. Names carry a namespace prefix such as
    /// `user.` or `provenance.`.
    pub fn set_xattr(&self, path: &DfsPath, name: &str, value: &[u8]) -> DfsResult<()> {
        let path = self.resolve(path)?;
        self.fs()?.set_xattr(&path, name, value)?;
        debug!(path = %path, name, len = value.len(), "xattr set");
        Ok(())
    }

    /// Reads an extended attribute; `None` when it is not set.
    pub fn get_xattr(&self, path: &DfsPath, name: &str) -> DfsResult<Option<Vec<u8>>> {
        let path = self.resolve(path)?;
        self.fs()?.get_xattr(&path, name)
    }

    /// Every extended attribute visible to the session's user.
    pub fn get_xattrs(&self, path: &DfsPath) -> DfsResult<HashMap<String, Vec<u8>>> {
        let path = self.resolve(path)?;
        self.fs()?.get_xattrs(&path)
    }

    /// Removes an extended attribute; fails with `XAttrNotFound` when unset.
    pub fn remove_xattr(&self, path: &DfsPath, name: &str) -> DfsResult<()> {
        let path = self.resolve(path)?;
        self.fs()?.remove_xattr(&path, name)?;
        debug!(path = %path, name, "xattr removed");
        Ok(())
    }

    /// Sets how much metadata and provenance the filesystem records under
    /// a directory.
    pub fn set_meta_status(&self, path: &DfsPath, status: MetaStatus) -> DfsResult<()> {
        let path = self.resolve(path)?;
        self.fs()?.set_meta_status(&path, status)?;
        debug!(
            path = %path,
            status = %status,
            provenance = ?status.provenance(),
            "meta status set"
        );
        Ok(())
    }

    /// The metadata status of a node.
    pub fn get_meta_status(&self, path: &DfsPath) -> DfsResult<MetaStatus> {
        let path = self.resolve(path)?;
        self.fs()?.get_meta_status(&path)
    }
}
