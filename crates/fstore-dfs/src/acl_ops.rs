//! Permissions, ACLs, ownership and the user/group directory.
//!
//! The identity-directory calls are passthroughs: the session adds no
//! validation of its own, the filesystem decides.

use tracing::debug;

use crate::error::DfsResult;
use crate::path::DfsPath;
use crate::permission::{AclEntry, AclStatus, FsPermission};
use crate::session::DfsSession;

impl DfsSession {
    /// Replaces the permission bits of a node.
    pub fn set_permission(&self, path: &DfsPath, permission: FsPermission) -> DfsResult<()> {
        let path = self.resolve(path)?;
        self.fs()?.set_permission(&path, permission)?;
        debug!(path = %path, permission = %permission, "permission set");
        Ok(())
    }

    /// Replaces the ACL of a node.
    pub fn set_acl(&self, path: &DfsPath, entries: &[AclEntry]) -> DfsResult<()> {
        let path = self.resolve(path)?;
        self.fs()?.set_acl(&path, entries)?;
        debug!(path = %path, entries = entries.len(), "acl set");
        Ok(())
    }

    /// Applies `permission` to each path in turn.
    ///
    /// Not atomic: the first failure is returned and every path before it
    /// keeps its new permission. All paths are validated up front.
    pub fn set_permission_many<'a, I>(&self, paths: I, permission: FsPermission) -> DfsResult<()>
    where
        I: IntoIterator<Item = &'a DfsPath>,
    {
        let resolved = paths
            .into_iter()
            .map(|path| self.resolve(path))
            .collect::<DfsResult<Vec<_>>>()?;
        for path in &resolved {
            self.set_permission(path, permission)?;
        }
        Ok(())
    }

    /// Changes owning user and group. An empty string leaves that part as is.
    pub fn set_owner(&self, path: &DfsPath, user: &str, group: &str) -> DfsResult<()> {
        let path = self.resolve(path)?;
        self.fs()?.set_owner(&path, user, group)?;
        debug!(path = %path, user, group, "owner set");
        Ok(())
    }

    /// Owner, group, permission bits and ACL entries of a node.
    pub fn get_acl_status(&self, path: &DfsPath) -> DfsResult<AclStatus> {
        let path = self.resolve(path)?;
        self.fs()?.get_acl_status(&path)
    }

    /// Registers a user with the filesystem.
    pub fn add_user(&self, user: &str) -> DfsResult<()> {
        self.fs()?.add_user(user)
    }

    /// Unregisters a user.
    pub fn remove_user(&self, user: &str) -> DfsResult<()> {
        self.fs()?.remove_user(user)
    }

    /// Registers a group.
    pub fn add_group(&self, group: &str) -> DfsResult<()> {
        self.fs()?.add_group(group)
    }

    /// Unregisters a group.
    pub fn remove_group(&self, group: &str) -> DfsResult<()> {
        self.fs()?.remove_group(group)
    }

    /// Adds a user to a group.
    pub fn add_user_to_group(&self, user: &str, group: &str) -> DfsResult<()> {
        self.fs()?.add_user_to_group(user, group)
    }

    /// Removes a user from a group.
    pub fn remove_user_from_group(&self, user: &str, group: &str) -> DfsResult<()> {
        self.fs()?.remove_user_from_group(user, group)
    }
}
