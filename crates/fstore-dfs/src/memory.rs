//! In-memory reference namespace.
//!
//! `MemoryNamespace` keeps a whole filesystem tree in a `BTreeMap` keyed by
//! absolute path, guarded by one `RwLock`. It enforces the observable rules
//! the gateway relies on: POSIX bits and ACLs, the superuser, sticky
//! directories, namespace and space quotas, xattr namespaces, storage
//! policies, metadata status and the user/group directory. Nothing of
//! replication or block placement is modelled.
//!
//! `MemoryConnector` resolves `hopsfs://authority` URIs to registered
//! namespaces and binds each handle to the identity current on the calling
//! thread.

use std::cell::Cell;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::io::{self, Cursor, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use parking_lot::RwLock;
use tracing::{debug, warn};
use url::Url;

use crate::access::{check_access, check_sticky_bit, NodeAccess, Principal};
use crate::client::{DistributedFileSystem, FileSystemConnector, InputStream, OutputStream};
use crate::config::DfsConfig;
use crate::error::{DfsError, DfsResult};
use crate::identity::{validate_principal, UserIdentity};
use crate::path::{uri_authority, DfsPath, HOPSFS_SCHEME};
use crate::permission::{
    AclEntry, AclEntryScope, AclEntryType, AclStatus, FsAction, FsPermission,
};
use crate::policy::{MetaStatus, StoragePolicy};
use crate::quota::{
    validate_namespace_quota, validate_space_quota, QuotaUsage, QUOTA_DONT_SET, QUOTA_RESET,
};
use crate::status::{FileKind, FileStatus};

const ROOT: &str = "/";
const DEFAULT_SUPERGROUP: &str = "supergroup";
const DEFAULT_REPLICATION: u16 = 3;
const DEFAULT_BLOCK_SIZE: u64 = 128 * 1024 * 1024;

/// Maximum xattr name length in bytes.
pub const MAX_XATTR_NAME_LEN: usize = 255;

/// Maximum xattr value length in bytes.
pub const MAX_XATTR_VALUE_LEN: usize = 65536;

/// Accepted xattr name prefixes.
pub const XATTR_NAMESPACES: [&str; 6] = [
    "user.",
    "trusted.",
    "security.",
    "system.",
    "raw.",
    "provenance.",
];

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

fn denied(principal: &Principal, access: impl fmt::Display, path: impl fmt::Display) -> DfsError {
    DfsError::PermissionDenied {
        user: principal.user.clone(),
        access: access.to_string(),
        path: path.to_string(),
    }
}

fn directory_error(op: &'static str, name: &str, reason: &str) -> DfsError {
    DfsError::Remote {
        op,
        path: name.to_string(),
        reason: reason.to_string(),
    }
}

/// Keys of every strict ancestor of `path`, root first.
fn ancestor_keys(path: &str) -> Vec<String> {
    if path == ROOT {
        return Vec::new();
    }
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    let mut keys = vec![ROOT.to_string()];
    let mut current = String::new();
    for segment in &segments[..segments.len().saturating_sub(1)] {
        current.push('/');
        current.push_str(segment);
        keys.push(current.clone());
    }
    keys
}

fn child_prefix(key: &str) -> String {
    if key == ROOT {
        ROOT.to_string()
    } else {
        format!("{}/", key)
    }
}

/// Validates an xattr name: a known namespace prefix, a non-empty suffix and
/// at most [`MAX_XATTR_NAME_LEN`] bytes.
pub fn validate_xattr_name(name: &str) -> DfsResult<()> {
    if name.len() > MAX_XATTR_NAME_LEN {
        return Err(DfsError::InvalidArgument(format!(
            "xattr name '{}' exceeds {} bytes",
            name, MAX_XATTR_NAME_LEN
        )));
    }
    match XATTR_NAMESPACES.iter().find(|prefix| name.starts_with(*prefix)) {
        Some(prefix) if name.len() > prefix.len() => Ok(()),
        Some(_) => Err(DfsError::InvalidArgument(format!(
            "xattr name '{}' has an empty suffix",
            name
        ))),
        None => Err(DfsError::InvalidArgument(format!(
            "xattr name '{}' must start with one of {}",
            name,
            XATTR_NAMESPACES.join(" ")
        ))),
    }
}

fn is_privileged_xattr(name: &str) -> bool {
    name.starts_with("trusted.")
}

#[derive(Clone, Debug)]
struct Inode {
    kind: FileKind,
    permission: FsPermission,
    owner: String,
    group: String,
    modification_time: u64,
    access_time: u64,
    data: Vec<u8>,
    acl: Vec<AclEntry>,
    xattrs: BTreeMap<String, Vec<u8>>,
    storage_policy: Option<String>,
    meta_status: MetaStatus,
    namespace_quota: i64,
    space_quota: i64,
}

impl Inode {
    fn new(kind: FileKind, permission: FsPermission, owner: &str, group: &str) -> Self {
        let now = now_millis();
        Self {
            kind,
            permission,
            owner: owner.to_string(),
            group: group.to_string(),
            modification_time: now,
            access_time: now,
            data: Vec::new(),
            acl: Vec::new(),
            xattrs: BTreeMap::new(),
            storage_policy: None,
            meta_status: MetaStatus::Disabled,
            namespace_quota: QUOTA_RESET,
            space_quota: QUOTA_RESET,
        }
    }

    /// A node created inside `parent`: owning group, default ACL and
    /// metadata status are inherited.
    fn child_of(parent: &Inode, kind: FileKind, permission: FsPermission, owner: &str) -> Self {
        let mut inode = Self::new(kind, permission, owner, &parent.group);
        let defaults: Vec<&AclEntry> = parent
            .acl
            .iter()
            .filter(|e| e.scope == AclEntryScope::Default)
            .collect();
        for entry in &defaults {
            if entry.is_named() || entry.entry_type == AclEntryType::Mask {
                inode.acl.push(AclEntry {
                    scope: AclEntryScope::Access,
                    ..(*entry).clone()
                });
            }
        }
        if kind == FileKind::Directory {
            inode.acl.extend(defaults.into_iter().cloned());
        }
        inode.meta_status = parent.meta_status;
        inode
    }

    fn is_dir(&self) -> bool {
        self.kind == FileKind::Directory
    }

    fn access(&self) -> NodeAccess<'_> {
        NodeAccess {
            owner: &self.owner,
            group: &self.group,
            permission: self.permission,
            acl: &self.acl,
        }
    }
}

struct NamespaceState {
    prefix: String,
    superuser: String,
    supergroup: String,
    nodes: BTreeMap<String, Inode>,
    users: BTreeSet<String>,
    groups: BTreeMap<String, BTreeSet<String>>,
}

impl NamespaceState {
    fn new(prefix: String, superuser: &str, supergroup: &str) -> Self {
        let mut nodes = BTreeMap::new();
        nodes.insert(
            ROOT.to_string(),
            Inode::new(
                FileKind::Directory,
                FsPermission::from_mode(0o755),
                superuser,
                supergroup,
            ),
        );
        let mut groups = BTreeMap::new();
        groups.insert(
            supergroup.to_string(),
            BTreeSet::from([superuser.to_string()]),
        );
        Self {
            prefix,
            superuser: superuser.to_string(),
            supergroup: supergroup.to_string(),
            nodes,
            users: BTreeSet::from([superuser.to_string()]),
            groups,
        }
    }

    fn principal(&self, user: &str, extra_groups: &[String]) -> Principal {
        let mut groups: BTreeSet<String> = extra_groups.iter().cloned().collect();
        for (group, members) in &self.groups {
            if members.contains(user) {
                groups.insert(group.clone());
            }
        }
        let is_superuser = user == self.superuser || groups.contains(&self.supergroup);
        Principal {
            user: user.to_string(),
            groups,
            is_superuser,
        }
    }

    fn node(&self, path: &DfsPath) -> DfsResult<&Inode> {
        self.nodes
            .get(path.as_str())
            .ok_or_else(|| DfsError::not_found(path))
    }

    fn node_mut(&mut self, path: &DfsPath) -> DfsResult<&mut Inode> {
        self.nodes
            .get_mut(path.as_str())
            .ok_or_else(|| DfsError::not_found(path))
    }

    fn descendant_keys(&self, key: &str) -> Vec<String> {
        let prefix = child_prefix(key);
        self.nodes
            .range(prefix.clone()..)
            .take_while(|(k, _)| k.starts_with(&prefix))
            .filter(|(k, _)| k.len() > prefix.len())
            .map(|(k, _)| k.clone())
            .collect()
    }

    fn children(&self, key: &str) -> Vec<(&String, &Inode)> {
        let prefix = child_prefix(key);
        self.nodes
            .range(prefix.clone()..)
            .take_while(|(k, _)| k.starts_with(&prefix))
            .filter(|(k, _)| k.len() > prefix.len() && !k[prefix.len()..].contains('/'))
            .collect()
    }

    /// Inode count and bytes of the subtree rooted at `key`, itself included.
    fn usage(&self, key: &str) -> (i64, i64) {
        let mut count = 0;
        let mut bytes = 0;
        if let Some(inode) = self.nodes.get(key) {
            count += 1;
            bytes += inode.data.len() as i64;
        }
        for child in self.descendant_keys(key) {
            if let Some(inode) = self.nodes.get(&child) {
                count += 1;
                bytes += inode.data.len() as i64;
            }
        }
        (count, bytes)
    }

    fn status(&self, key: &str, inode: &Inode) -> DfsResult<FileStatus> {
        let path = DfsPath::parse(&format!("{}{}", self.prefix, key))?;
        let is_file = inode.kind == FileKind::File;
        Ok(FileStatus {
            path,
            kind: inode.kind,
            len: if is_file { inode.data.len() as u64 } else { 0 },
            permission: inode.permission,
            owner: inode.owner.clone(),
            group: inode.group.clone(),
            modification_time: inode.modification_time,
            access_time: inode.access_time,
            replication: if is_file { DEFAULT_REPLICATION } else { 0 },
            block_size: if is_file { DEFAULT_BLOCK_SIZE } else { 0 },
        })
    }

    fn check(
        &self,
        path: &DfsPath,
        inode: &Inode,
        principal: &Principal,
        action: FsAction,
    ) -> DfsResult<()> {
        if check_access(&inode.access(), principal, action) {
            Ok(())
        } else {
            Err(denied(principal, action, path))
        }
    }

    fn check_owner(&self, path: &DfsPath, inode: &Inode, principal: &Principal) -> DfsResult<()> {
        if principal.is_superuser || inode.owner == principal.user {
            Ok(())
        } else {
            Err(denied(principal, "OWNER", path))
        }
    }

    fn check_superuser(&self, target: &str, principal: &Principal) -> DfsResult<()> {
        if principal.is_superuser {
            Ok(())
        } else {
            Err(denied(principal, "SUPERUSER", target))
        }
    }

    /// Every strict ancestor must exist, be a directory and grant EXECUTE.
    fn check_traverse(&self, path: &DfsPath, principal: &Principal) -> DfsResult<()> {
        for key in ancestor_keys(path.as_str()) {
            let inode = match self.nodes.get(&key) {
                Some(inode) if inode.is_dir() => inode,
                _ => return Err(DfsError::not_found(path)),
            };
            if !check_access(&inode.access(), principal, FsAction::EXECUTE) {
                return Err(denied(principal, FsAction::EXECUTE, &key));
            }
        }
        Ok(())
    }

    fn check_namespace_quota(&self, path: &DfsPath, added: i64) -> DfsResult<()> {
        for key in ancestor_keys(path.as_str()) {
            let Some(inode) = self.nodes.get(&key) else {
                continue;
            };
            if inode.namespace_quota == QUOTA_RESET {
                continue;
            }
            let (count, _) = self.usage(&key);
            if count + added > inode.namespace_quota {
                return Err(DfsError::QuotaExceeded {
                    kind: "namespace",
                    dir: key,
                    quota: inode.namespace_quota,
                    consumed: count + added,
                });
            }
        }
        Ok(())
    }

    fn check_space_quota(&self, path: &DfsPath, added: i64) -> DfsResult<()> {
        if added <= 0 {
            return Ok(());
        }
        for key in ancestor_keys(path.as_str()) {
            let Some(inode) = self.nodes.get(&key) else {
                continue;
            };
            if inode.space_quota == QUOTA_RESET {
                continue;
            }
            let (_, bytes) = self.usage(&key);
            if bytes + added > inode.space_quota {
                return Err(DfsError::QuotaExceeded {
                    kind: "space",
                    dir: key,
                    quota: inode.space_quota,
                    consumed: bytes + added,
                });
            }
        }
        Ok(())
    }

    fn touch_modified(&mut self, key: &str) {
        if let Some(inode) = self.nodes.get_mut(key) {
            inode.modification_time = now_millis();
        }
    }

    fn parent_dir<'a>(&'a self, path: &DfsPath) -> DfsResult<(DfsPath, &'a Inode)> {
        let parent_path = path.parent().ok_or_else(|| DfsError::AlreadyExists {
            path: path.to_string(),
        })?;
        let parent = self.node(&parent_path)?;
        if !parent.is_dir() {
            return Err(DfsError::NotADirectory {
                path: parent_path.to_string(),
            });
        }
        Ok((parent_path, parent))
    }

    fn get_file_status(&self, path: &DfsPath, principal: &Principal) -> DfsResult<FileStatus> {
        self.check_traverse(path, principal)?;
        let inode = self.node(path)?;
        self.status(path.as_str(), inode)
    }

    fn list_status(&self, path: &DfsPath, principal: &Principal) -> DfsResult<Vec<FileStatus>> {
        self.check_traverse(path, principal)?;
        let inode = self.node(path)?;
        if !inode.is_dir() {
            return Ok(vec![self.status(path.as_str(), inode)?]);
        }
        self.check(path, inode, principal, FsAction::READ_EXECUTE)?;
        self.children(path.as_str())
            .into_iter()
            .map(|(key, child)| self.status(key, child))
            .collect()
    }

    fn mkdir(
        &mut self,
        path: &DfsPath,
        permission: FsPermission,
        principal: &Principal,
    ) -> DfsResult<bool> {
        if let Some(existing) = self.nodes.get(path.as_str()) {
            return if existing.is_dir() {
                Ok(true)
            } else {
                Err(DfsError::AlreadyExists {
                    path: path.to_string(),
                })
            };
        }
        let (parent_path, parent) = self.parent_dir(path)?;
        self.check_traverse(&parent_path, principal)?;
        self.check(&parent_path, parent, principal, FsAction::WRITE_EXECUTE)?;
        self.check_namespace_quota(path, 1)?;
        let inode = Inode::child_of(parent, FileKind::Directory, permission, &principal.user);
        self.nodes.insert(path.as_str().to_string(), inode);
        self.touch_modified(parent_path.as_str());
        Ok(true)
    }

    fn mkdirs(
        &mut self,
        path: &DfsPath,
        permission: FsPermission,
        principal: &Principal,
    ) -> DfsResult<bool> {
        let mut keys = ancestor_keys(path.as_str());
        keys.push(path.as_str().to_string());

        let mut first_missing = None;
        for (idx, key) in keys.iter().enumerate() {
            match self.nodes.get(key) {
                Some(inode) if inode.is_dir() => {}
                Some(_) if idx + 1 == keys.len() => {
                    return Err(DfsError::AlreadyExists { path: key.clone() })
                }
                Some(_) => return Err(DfsError::NotADirectory { path: key.clone() }),
                None => {
                    first_missing = Some(idx);
                    break;
                }
            }
        }
        let first = match first_missing {
            Some(idx) if idx > 0 => idx,
            _ => return Ok(true),
        };

        let parent_path = DfsPath::parse(&keys[first - 1])?;
        let parent = self.node(&parent_path)?;
        self.check_traverse(&parent_path, principal)?;
        self.check(&parent_path, parent, principal, FsAction::WRITE_EXECUTE)?;
        self.check_namespace_quota(
            &DfsPath::parse(&keys[first])?,
            (keys.len() - first) as i64,
        )?;

        for idx in first..keys.len() {
            let parent = self
                .nodes
                .get(&keys[idx - 1])
                .ok_or_else(|| DfsError::not_found(&keys[idx - 1]))?;
            let inode = Inode::child_of(parent, FileKind::Directory, permission, &principal.user);
            self.nodes.insert(keys[idx].clone(), inode);
        }
        self.touch_modified(parent_path.as_str());
        Ok(true)
    }

    fn create(
        &mut self,
        path: &DfsPath,
        permission: FsPermission,
        overwrite: bool,
        principal: &Principal,
    ) -> DfsResult<()> {
        if path.is_root() {
            return Err(DfsError::IsADirectory {
                path: path.to_string(),
            });
        }
        let (parent_path, parent) = self.parent_dir(path)?;
        self.check_traverse(&parent_path, principal)?;
        self.check(&parent_path, parent, principal, FsAction::WRITE_EXECUTE)?;
        match self.nodes.get(path.as_str()) {
            Some(existing) if existing.is_dir() => {
                return Err(DfsError::IsADirectory {
                    path: path.to_string(),
                })
            }
            Some(_) if !overwrite => {
                return Err(DfsError::AlreadyExists {
                    path: path.to_string(),
                })
            }
            Some(_) => {}
            None => self.check_namespace_quota(path, 1)?,
        }
        let inode = Inode::child_of(parent, FileKind::File, permission, &principal.user);
        self.nodes.insert(path.as_str().to_string(), inode);
        self.touch_modified(parent_path.as_str());
        Ok(())
    }

    fn check_append(&self, path: &DfsPath, principal: &Principal) -> DfsResult<()> {
        self.check_traverse(path, principal)?;
        let inode = self.node(path)?;
        if inode.is_dir() {
            return Err(DfsError::IsADirectory {
                path: path.to_string(),
            });
        }
        self.check(path, inode, principal, FsAction::WRITE)
    }

    fn commit(&mut self, path: &DfsPath, bytes: &[u8]) -> DfsResult<()> {
        match self.nodes.get(path.as_str()) {
            Some(inode) if !inode.is_dir() => {}
            _ => return Err(DfsError::not_found(path)),
        }
        self.check_space_quota(path, bytes.len() as i64)?;
        let inode = self.node_mut(path)?;
        inode.data.extend_from_slice(bytes);
        inode.modification_time = now_millis();
        Ok(())
    }

    fn open(&mut self, path: &DfsPath, principal: &Principal) -> DfsResult<Vec<u8>> {
        self.check_traverse(path, principal)?;
        let inode = self.node(path)?;
        if inode.is_dir() {
            return Err(DfsError::IsADirectory {
                path: path.to_string(),
            });
        }
        self.check(path, inode, principal, FsAction::READ)?;
        let inode = self.node_mut(path)?;
        inode.access_time = now_millis();
        Ok(inode.data.clone())
    }

    fn delete(
        &mut self,
        path: &DfsPath,
        recursive: bool,
        principal: &Principal,
    ) -> DfsResult<bool> {
        let Some(parent_path) = path.parent() else {
            return Err(DfsError::InvalidArgument(
                "cannot delete the root directory".to_string(),
            ));
        };
        match self.check_traverse(path, principal) {
            Err(e) if e.is_not_found() => return Ok(false),
            other => other?,
        }
        let Some(inode) = self.nodes.get(path.as_str()) else {
            return Ok(false);
        };
        let parent = self.node(&parent_path)?;
        self.check(&parent_path, parent, principal, FsAction::WRITE_EXECUTE)?;
        if !check_sticky_bit(&parent.access(), &inode.owner, principal) {
            return Err(denied(principal, "STICKY", path));
        }

        let descendants = self.descendant_keys(path.as_str());
        if !descendants.is_empty() {
            if !recursive {
                return Err(DfsError::DirectoryNotEmpty {
                    path: path.to_string(),
                });
            }
            let subtree =
                std::iter::once(path.as_str().to_string()).chain(descendants.iter().cloned());
            for key in subtree {
                if let Some(node) = self.nodes.get(&key).filter(|n| n.is_dir()) {
                    if !check_access(&node.access(), principal, FsAction::ALL) {
                        return Err(denied(principal, FsAction::ALL, &key));
                    }
                }
            }
        }

        for key in descendants {
            self.nodes.remove(&key);
        }
        self.nodes.remove(path.as_str());
        self.touch_modified(parent_path.as_str());
        Ok(true)
    }

    fn rename(&mut self, src: &DfsPath, dst: &DfsPath, principal: &Principal) -> DfsResult<bool> {
        let Some(src_parent) = src.parent() else {
            return Err(DfsError::InvalidArgument(
                "cannot rename the root directory".to_string(),
            ));
        };
        match self.check_traverse(src, principal) {
            Err(e) if e.is_not_found() => return Ok(false),
            other => other?,
        }
        let Some(src_node) = self.nodes.get(src.as_str()) else {
            return Ok(false);
        };
        if src == dst {
            return Ok(true);
        }

        let target = match self.nodes.get(dst.as_str()) {
            Some(existing) if existing.is_dir() => dst.join(src.name())?,
            Some(_) => return Ok(false),
            None => dst.clone(),
        };
        if src.is_ancestor_of(&target) {
            return Err(DfsError::InvalidArgument(format!(
                "cannot move {} into its own subtree {}",
                src, target
            )));
        }
        if self.nodes.contains_key(target.as_str()) {
            return Ok(false);
        }
        let Some(target_parent) = target.parent() else {
            return Ok(false);
        };
        match self.nodes.get(target_parent.as_str()) {
            Some(node) if node.is_dir() => {}
            _ => return Ok(false),
        }

        self.check_traverse(&target_parent, principal)?;
        let dst_dir = self.node(&target_parent)?;
        self.check(&target_parent, dst_dir, principal, FsAction::WRITE_EXECUTE)?;
        let src_dir = self.node(&src_parent)?;
        self.check(&src_parent, src_dir, principal, FsAction::WRITE_EXECUTE)?;
        if !check_sticky_bit(&src_dir.access(), &src_node.owner, principal) {
            return Err(denied(principal, "STICKY", src));
        }

        let (count, bytes) = self.usage(src.as_str());
        for key in ancestor_keys(target.as_str()) {
            let shared = key == ROOT || src.as_str().starts_with(&child_prefix(&key));
            if shared {
                continue;
            }
            let Some(dir) = self.nodes.get(&key) else {
                continue;
            };
            let (dir_count, dir_bytes) = self.usage(&key);
            if dir.namespace_quota != QUOTA_RESET && dir_count + count > dir.namespace_quota {
                return Err(DfsError::QuotaExceeded {
                    kind: "namespace",
                    dir: key,
                    quota: dir.namespace_quota,
                    consumed: dir_count + count,
                });
            }
            if dir.space_quota != QUOTA_RESET && dir_bytes + bytes > dir.space_quota {
                return Err(DfsError::QuotaExceeded {
                    kind: "space",
                    dir: key,
                    quota: dir.space_quota,
                    consumed: dir_bytes + bytes,
                });
            }
        }

        let mut moved = vec![src.as_str().to_string()];
        moved.extend(self.descendant_keys(src.as_str()));
        let src_len = src.as_str().len();
        for key in moved {
            if let Some(inode) = self.nodes.remove(&key) {
                let new_key = format!("{}{}", target.as_str(), &key[src_len..]);
                self.nodes.insert(new_key, inode);
            }
        }
        self.touch_modified(src_parent.as_str());
        self.touch_modified(target_parent.as_str());
        Ok(true)
    }

    fn set_permission(
        &mut self,
        path: &DfsPath,
        permission: FsPermission,
        principal: &Principal,
    ) -> DfsResult<()> {
        self.check_traverse(path, principal)?;
        let inode = self.node(path)?;
        self.check_owner(path, inode, principal)?;
        self.node_mut(path)?.permission = permission;
        Ok(())
    }

    fn set_acl(
        &mut self,
        path: &DfsPath,
        entries: &[AclEntry],
        principal: &Principal,
    ) -> DfsResult<()> {
        self.check_traverse(path, principal)?;
        let inode = self.node(path)?;
        self.check_owner(path, inode, principal)?;

        let mut seen = BTreeSet::new();
        for entry in entries {
            if !seen.insert((entry.scope as u8, entry.entry_type as u8, entry.name.clone())) {
                return Err(DfsError::InvalidArgument(format!("duplicate ACL entry {}", entry)));
            }
            if entry.is_named()
                && matches!(entry.entry_type, AclEntryType::Mask | AclEntryType::Other)
            {
                return Err(DfsError::InvalidArgument(format!(
                    "ACL entry {} cannot be named",
                    entry
                )));
            }
            if let Some(name) = &entry.name {
                validate_principal(name)?;
            }
            if entry.scope == AclEntryScope::Default && !inode.is_dir() {
                return Err(DfsError::InvalidArgument(format!(
                    "default ACL entries are only valid on directories: {}",
                    path
                )));
            }
        }

        let mut permission = inode.permission;
        let mut acl = Vec::new();
        for entry in entries {
            match (entry.scope, entry.entry_type, entry.is_named()) {
                (AclEntryScope::Access, AclEntryType::User, false) => {
                    permission = FsPermission::new(
                        entry.permission,
                        permission.group_action(),
                        permission.other_action(),
                    )
                    .with_sticky(permission.sticky());
                }
                (AclEntryScope::Access, AclEntryType::Group, false) => {
                    permission = permission.with_group_action(entry.permission);
                }
                (AclEntryScope::Access, AclEntryType::Other, _) => {
                    permission = FsPermission::new(
                        permission.user_action(),
                        permission.group_action(),
                        entry.permission,
                    )
                    .with_sticky(permission.sticky());
                }
                _ => acl.push(entry.clone()),
            }
        }
        add_missing_mask(&mut acl, AclEntryScope::Access, permission.group_action());
        let default_group = acl
            .iter()
            .find(|e| {
                e.scope == AclEntryScope::Default
                    && e.entry_type == AclEntryType::Group
                    && !e.is_named()
            })
            .map(|e| e.permission)
            .unwrap_or(FsAction::NONE);
        add_missing_mask(&mut acl, AclEntryScope::Default, default_group);

        let inode = self.node_mut(path)?;
        inode.permission = permission;
        inode.acl = acl;
        Ok(())
    }

    fn get_acl_status(&self, path: &DfsPath, principal: &Principal) -> DfsResult<AclStatus> {
        self.check_traverse(path, principal)?;
        let inode = self.node(path)?;
        Ok(AclStatus {
            owner: inode.owner.clone(),
            group: inode.group.clone(),
            permission: inode.permission,
            entries: inode.acl.clone(),
        })
    }

    fn set_owner(
        &mut self,
        path: &DfsPath,
        user: &str,
        group: &str,
        principal: &Principal,
    ) -> DfsResult<()> {
        let new_user = if user.is_empty() { None } else { Some(user) };
        let new_group = if group.is_empty() { None } else { Some(group) };
        if new_user.is_none() && new_group.is_none() {
            return Err(DfsError::InvalidArgument(
                "set_owner needs a user or a group".to_string(),
            ));
        }
        for name in new_user.iter().chain(new_group.iter()) {
            validate_principal(name)?;
        }

        self.check_traverse(path, principal)?;
        let inode = self.node(path)?;
        if !principal.is_superuser {
            if new_user.is_some_and(|u| u != inode.owner) {
                return Err(denied(principal, "SUPERUSER", path));
            }
            if let Some(g) = new_group {
                if inode.owner != principal.user || !principal.in_group(g) {
                    return Err(denied(principal, "OWNER", path));
                }
            }
        }

        let inode = self.node_mut(path)?;
        if let Some(u) = new_user {
            inode.owner = u.to_string();
        }
        if let Some(g) = new_group {
            inode.group = g.to_string();
        }
        Ok(())
    }

    fn set_quota(
        &mut self,
        path: &DfsPath,
        namespace_quota: i64,
        space_quota: i64,
        principal: &Principal,
    ) -> DfsResult<()> {
        validate_namespace_quota(namespace_quota)?;
        validate_space_quota(space_quota)?;
        self.check_superuser(path.as_str(), principal)?;
        let inode = self.node_mut(path)?;
        if !inode.is_dir() {
            return Err(DfsError::NotADirectory {
                path: path.to_string(),
            });
        }
        if namespace_quota != QUOTA_DONT_SET {
            inode.namespace_quota = namespace_quota;
        }
        if space_quota != QUOTA_DONT_SET {
            inode.space_quota = space_quota;
        }
        Ok(())
    }

    fn get_quota_usage(&self, path: &DfsPath, principal: &Principal) -> DfsResult<QuotaUsage> {
        self.check_traverse(path, principal)?;
        let inode = self.node(path)?;
        let (count, bytes) = self.usage(path.as_str());
        Ok(QuotaUsage {
            namespace_quota: inode.namespace_quota,
            file_and_directory_count: count,
            space_quota: inode.space_quota,
            space_consumed: bytes,
        })
    }

    fn set_storage_policy(
        &mut self,
        path: &DfsPath,
        policy_name: &str,
        principal: &Principal,
    ) -> DfsResult<()> {
        StoragePolicy::from_policy_name(policy_name)?;
        self.check_traverse(path, principal)?;
        let inode = self.node(path)?;
        self.check(path, inode, principal, FsAction::WRITE)?;
        self.node_mut(path)?.storage_policy = Some(policy_name.to_string());
        Ok(())
    }

    fn get_storage_policy(&self, path: &DfsPath, principal: &Principal) -> DfsResult<String> {
        self.check_traverse(path, principal)?;
        self.node(path)?;
        let mut keys = ancestor_keys(path.as_str());
        keys.push(path.as_str().to_string());
        let effective = keys
            .iter()
            .rev()
            .filter_map(|key| self.nodes.get(key))
            .find_map(|inode| inode.storage_policy.clone());
        Ok(effective.unwrap_or_else(|| StoragePolicy::Default.policy_name().to_string()))
    }

    fn set_meta_status(
        &mut self,
        path: &DfsPath,
        status: MetaStatus,
        principal: &Principal,
    ) -> DfsResult<()> {
        self.check_traverse(path, principal)?;
        let inode = self.node(path)?;
        if !inode.is_dir() {
            return Err(DfsError::NotADirectory {
                path: path.to_string(),
            });
        }
        self.check_owner(path, inode, principal)?;
        let mut subtree = vec![path.as_str().to_string()];
        subtree.extend(self.descendant_keys(path.as_str()));
        for key in subtree {
            if let Some(node) = self.nodes.get_mut(&key) {
                node.meta_status = status;
            }
        }
        Ok(())
    }

    fn get_meta_status(&self, path: &DfsPath, principal: &Principal) -> DfsResult<MetaStatus> {
        self.check_traverse(path, principal)?;
        Ok(self.node(path)?.meta_status)
    }

    fn check_xattr_access(
        &self,
        path: &DfsPath,
        name: &str,
        action: FsAction,
        principal: &Principal,
    ) -> DfsResult<()> {
        self.check_traverse(path, principal)?;
        let inode = self.node(path)?;
        if is_privileged_xattr(name) {
            return self.check_superuser(path.as_str(), principal);
        }
        self.check(path, inode, principal, action)
    }

    fn set_xattr(
        &mut self,
        path: &DfsPath,
        name: &str,
        value: &[u8],
        principal: &Principal,
    ) -> DfsResult<()> {
        validate_xattr_name(name)?;
        if value.len() > MAX_XATTR_VALUE_LEN {
            return Err(DfsError::InvalidArgument(format!(
                "xattr value of {} bytes exceeds {} bytes",
                value.len(),
                MAX_XATTR_VALUE_LEN
            )));
        }
        self.check_xattr_access(path, name, FsAction::WRITE, principal)?;
        self.node_mut(path)?
            .xattrs
            .insert(name.to_string(), value.to_vec());
        Ok(())
    }

    fn get_xattr(
        &self,
        path: &DfsPath,
        name: &str,
        principal: &Principal,
    ) -> DfsResult<Option<Vec<u8>>> {
        validate_xattr_name(name)?;
        self.check_xattr_access(path, name, FsAction::READ, principal)?;
        Ok(self.node(path)?.xattrs.get(name).cloned())
    }

    fn get_xattrs(
        &self,
        path: &DfsPath,
        principal: &Principal,
    ) -> DfsResult<HashMap<String, Vec<u8>>> {
        self.check_traverse(path, principal)?;
        let inode = self.node(path)?;
        self.check(path, inode, principal, FsAction::READ)?;
        Ok(inode
            .xattrs
            .iter()
            .filter(|(name, _)| principal.is_superuser || !is_privileged_xattr(name))
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect())
    }

    fn remove_xattr(&mut self, path: &DfsPath, name: &str, principal: &Principal) -> DfsResult<()> {
        validate_xattr_name(name)?;
        self.check_xattr_access(path, name, FsAction::WRITE, principal)?;
        match self.node_mut(path)?.xattrs.remove(name) {
            Some(_) => Ok(()),
            None => Err(DfsError::XAttrNotFound {
                path: path.to_string(),
                name: name.to_string(),
            }),
        }
    }

    fn add_user(&mut self, user: &str, principal: &Principal) -> DfsResult<()> {
        self.check_superuser(ROOT, principal)?;
        validate_principal(user)?;
        if !self.users.insert(user.to_string()) {
            return Err(directory_error("add_user", user, "user already exists"));
        }
        Ok(())
    }

    fn remove_user(&mut self, user: &str, principal: &Principal) -> DfsResult<()> {
        self.check_superuser(ROOT, principal)?;
        if user == self.superuser {
            return Err(directory_error("remove_user", user, "cannot remove the superuser"));
        }
        if !self.users.remove(user) {
            return Err(directory_error("remove_user", user, "no such user"));
        }
        for members in self.groups.values_mut() {
            members.remove(user);
        }
        Ok(())
    }

    fn add_group(&mut self, group: &str, principal: &Principal) -> DfsResult<()> {
        self.check_superuser(ROOT, principal)?;
        validate_principal(group)?;
        if self.groups.contains_key(group) {
            return Err(directory_error("add_group", group, "group already exists"));
        }
        self.groups.insert(group.to_string(), BTreeSet::new());
        Ok(())
    }

    fn remove_group(&mut self, group: &str, principal: &Principal) -> DfsResult<()> {
        self.check_superuser(ROOT, principal)?;
        if group == self.supergroup {
            return Err(directory_error("remove_group", group, "cannot remove the supergroup"));
        }
        if self.groups.remove(group).is_none() {
            return Err(directory_error("remove_group", group, "no such group"));
        }
        Ok(())
    }

    fn add_user_to_group(
        &mut self,
        user: &str,
        group: &str,
        principal: &Principal,
    ) -> DfsResult<()> {
        self.check_superuser(ROOT, principal)?;
        if !self.users.contains(user) {
            return Err(directory_error("add_user_to_group", user, "no such user"));
        }
        let members = self
            .groups
            .get_mut(group)
            .ok_or_else(|| directory_error("add_user_to_group", group, "no such group"))?;
        members.insert(user.to_string());
        Ok(())
    }

    fn remove_user_from_group(
        &mut self,
        user: &str,
        group: &str,
        principal: &Principal,
    ) -> DfsResult<()> {
        self.check_superuser(ROOT, principal)?;
        let members = self
            .groups
            .get_mut(group)
            .ok_or_else(|| directory_error("remove_user_from_group", group, "no such group"))?;
        if !members.remove(user) {
            return Err(directory_error(
                "remove_user_from_group",
                user,
                "user is not a member of the group",
            ));
        }
        Ok(())
    }
}

/// Adds a mask entry to `scope` when named entries exist there without one.
fn add_missing_mask(acl: &mut Vec<AclEntry>, scope: AclEntryScope, group_action: FsAction) {
    let in_scope = |e: &&AclEntry| e.scope == scope;
    if acl
        .iter()
        .filter(in_scope)
        .any(|e| e.entry_type == AclEntryType::Mask)
    {
        return;
    }
    let named: Vec<FsAction> = acl
        .iter()
        .filter(in_scope)
        .filter(|e| e.is_named())
        .map(|e| e.permission)
        .collect();
    if named.is_empty() {
        return;
    }
    let mask = named.into_iter().fold(group_action, |acc, p| acc.or(p));
    acl.push(AclEntry {
        scope,
        entry_type: AclEntryType::Mask,
        name: None,
        permission: mask,
    });
}

/// A whole filesystem held in memory.
pub struct MemoryNamespace {
    uri: Url,
    authority: String,
    superuser: String,
    registered_users_only: bool,
    fail_on_close: AtomicBool,
    state: RwLock<NamespaceState>,
}

impl MemoryNamespace {
    /// Creates an empty namespace at `uri` whose root is owned by `superuser`.
    pub fn new(uri: &str, superuser: &str) -> DfsResult<Self> {
        let uri = Url::parse(uri)
            .map_err(|e| DfsError::InvalidArgument(format!("invalid URI '{}': {}", uri, e)))?;
        if uri.scheme() != HOPSFS_SCHEME {
            return Err(DfsError::InvalidArgument(format!(
                "unsupported scheme '{}', expected '{}'",
                uri.scheme(),
                HOPSFS_SCHEME
            )));
        }
        validate_principal(superuser)?;
        let authority = uri_authority(&uri)?;
        let prefix = format!("{}://{}", HOPSFS_SCHEME, authority);
        Ok(Self {
            uri,
            authority,
            superuser: superuser.to_string(),
            registered_users_only: false,
            fail_on_close: AtomicBool::new(false),
            state: RwLock::new(NamespaceState::new(prefix, superuser, DEFAULT_SUPERGROUP)),
        })
    }

    /// Rejects handles for users missing from the user directory.
    pub fn registered_users_only(mut self, enabled: bool) -> Self {
        self.registered_users_only = enabled;
        self
    }

    /// URI of the namespace.
    pub fn uri(&self) -> &Url {
        &self.uri
    }

    /// `host[:port]` the namespace is registered under.
    pub fn authority(&self) -> &str {
        &self.authority
    }

    /// Owner of the root directory.
    pub fn superuser(&self) -> &str {
        &self.superuser
    }

    /// Makes every subsequent handle close fail, as a lost namenode
    /// connection would.
    pub fn set_fail_on_close(&self, fail: bool) {
        self.fail_on_close.store(fail, Ordering::SeqCst);
    }

    /// Total number of inodes, the root included.
    pub fn inode_count(&self) -> usize {
        self.state.read().nodes.len()
    }

    /// Acquires a handle bound to `identity`.
    pub fn connect_as(ns: &Arc<Self>, identity: &UserIdentity) -> DfsResult<MemoryFileSystem> {
        let user = identity.short_user_name().to_string();
        let registered = ns.state.read().users.contains(&user);
        if ns.registered_users_only && user != ns.superuser && !registered {
            return Err(DfsError::PermissionDenied {
                user,
                access: "CONNECT".to_string(),
                path: ns.uri.to_string(),
            });
        }
        debug!(user = %identity, uri = %ns.uri, "handle acquired");
        Ok(MemoryFileSystem {
            ns: Arc::clone(ns),
            user,
            groups: identity.groups().to_vec(),
            closed: Cell::new(false),
        })
    }
}

/// Client handle onto a [`MemoryNamespace`].
pub struct MemoryFileSystem {
    ns: Arc<MemoryNamespace>,
    user: String,
    groups: Vec<String>,
    closed: Cell<bool>,
}

impl MemoryFileSystem {
    fn ensure_open(&self) -> DfsResult<()> {
        if self.closed.get() {
            Err(DfsError::Closed)
        } else {
            Ok(())
        }
    }

    fn read<T>(
        &self,
        op: impl FnOnce(&NamespaceState, &Principal) -> DfsResult<T>,
    ) -> DfsResult<T> {
        self.ensure_open()?;
        let state = self.ns.state.read();
        let principal = state.principal(&self.user, &self.groups);
        op(&*state, &principal)
    }

    fn write<T>(
        &self,
        op: impl FnOnce(&mut NamespaceState, &Principal) -> DfsResult<T>,
    ) -> DfsResult<T> {
        self.ensure_open()?;
        let mut state = self.ns.state.write();
        let principal = state.principal(&self.user, &self.groups);
        op(&mut *state, &principal)
    }

    fn stream(&self, path: &DfsPath) -> Box<dyn OutputStream> {
        Box::new(MemoryOutputStream {
            ns: Arc::clone(&self.ns),
            path: path.clone(),
            pending: Vec::new(),
            closed: false,
        })
    }
}

impl DistributedFileSystem for MemoryFileSystem {
    fn uri(&self) -> &Url {
        &self.ns.uri
    }

    fn user(&self) -> &str {
        &self.user
    }

    fn open(&self, path: &DfsPath) -> DfsResult<InputStream> {
        let data = self.write(|s, p| s.open(path, p))?;
        Ok(Box::new(Cursor::new(data)))
    }

    fn create(
        &self,
        path: &DfsPath,
        permission: FsPermission,
        overwrite: bool,
    ) -> DfsResult<Box<dyn OutputStream>> {
        self.write(|s, p| s.create(path, permission, overwrite, p))?;
        debug!(path = %path, user = %self.user, "file created");
        Ok(self.stream(path))
    }

    fn append(&self, path: &DfsPath) -> DfsResult<Box<dyn OutputStream>> {
        self.read(|s, p| s.check_append(path, p))?;
        Ok(self.stream(path))
    }

    fn mkdir(&self, path: &DfsPath, permission: FsPermission) -> DfsResult<bool> {
        self.write(|s, p| s.mkdir(path, permission, p))
    }

    fn mkdirs(&self, path: &DfsPath, permission: FsPermission) -> DfsResult<bool> {
        self.write(|s, p| s.mkdirs(path, permission, p))
    }

    fn get_file_status(&self, path: &DfsPath) -> DfsResult<FileStatus> {
        self.read(|s, p| s.get_file_status(path, p))
    }

    fn list_status(&self, path: &DfsPath) -> DfsResult<Vec<FileStatus>> {
        self.read(|s, p| s.list_status(path, p))
    }

    fn delete(&self, path: &DfsPath, recursive: bool) -> DfsResult<bool> {
        self.write(|s, p| s.delete(path, recursive, p))
    }

    fn rename(&self, src: &DfsPath, dst: &DfsPath) -> DfsResult<bool> {
        self.write(|s, p| s.rename(src, dst, p))
    }

    fn set_permission(&self, path: &DfsPath, permission: FsPermission) -> DfsResult<()> {
        self.write(|s, p| s.set_permission(path, permission, p))
    }

    fn set_acl(&self, path: &DfsPath, entries: &[AclEntry]) -> DfsResult<()> {
        self.write(|s, p| s.set_acl(path, entries, p))
    }

    fn get_acl_status(&self, path: &DfsPath) -> DfsResult<AclStatus> {
        self.read(|s, p| s.get_acl_status(path, p))
    }

    fn set_owner(&self, path: &DfsPath, user: &str, group: &str) -> DfsResult<()> {
        self.write(|s, p| s.set_owner(path, user, group, p))
    }

    fn set_quota(&self, path: &DfsPath, namespace_quota: i64, space_quota: i64) -> DfsResult<()> {
        self.write(|s, p| s.set_quota(path, namespace_quota, space_quota, p))
    }

    fn get_quota_usage(&self, path: &DfsPath) -> DfsResult<QuotaUsage> {
        self.read(|s, p| s.get_quota_usage(path, p))
    }

    fn set_storage_policy(&self, path: &DfsPath, policy_name: &str) -> DfsResult<()> {
        self.write(|s, p| s.set_storage_policy(path, policy_name, p))
    }

    fn get_storage_policy(&self, path: &DfsPath) -> DfsResult<String> {
        self.read(|s, p| s.get_storage_policy(path, p))
    }

    fn set_meta_status(&self, path: &DfsPath, status: MetaStatus) -> DfsResult<()> {
        self.write(|s, p| s.set_meta_status(path, status, p))
    }

    fn get_meta_status(&self, path: &DfsPath) -> DfsResult<MetaStatus> {
        self.read(|s, p| s.get_meta_status(path, p))
    }

    fn set_xattr(&self, path: &DfsPath, name: &str, value: &[u8]) -> DfsResult<()> {
        self.write(|s, p| s.set_xattr(path, name, value, p))
    }

    fn get_xattr(&self, path: &DfsPath, name: &str) -> DfsResult<Option<Vec<u8>>> {
        self.read(|s, p| s.get_xattr(path, name, p))
    }

    fn get_xattrs(&self, path: &DfsPath) -> DfsResult<HashMap<String, Vec<u8>>> {
        self.read(|s, p| s.get_xattrs(path, p))
    }

    fn remove_xattr(&self, path: &DfsPath, name: &str) -> DfsResult<()> {
        self.write(|s, p| s.remove_xattr(path, name, p))
    }

    fn add_user(&self, user: &str) -> DfsResult<()> {
        self.write(|s, p| s.add_user(user, p))
    }

    fn remove_user(&self, user: &str) -> DfsResult<()> {
        self.write(|s, p| s.remove_user(user, p))
    }

    fn add_group(&self, group: &str) -> DfsResult<()> {
        self.write(|s, p| s.add_group(group, p))
    }

    fn remove_group(&self, group: &str) -> DfsResult<()> {
        self.write(|s, p| s.remove_group(group, p))
    }

    fn add_user_to_group(&self, user: &str, group: &str) -> DfsResult<()> {
        self.write(|s, p| s.add_user_to_group(user, group, p))
    }

    fn remove_user_from_group(&self, user: &str, group: &str) -> DfsResult<()> {
        self.write(|s, p| s.remove_user_from_group(user, group, p))
    }

    fn close(&self) -> DfsResult<()> {
        if self.closed.replace(true) {
            return Ok(());
        }
        if self.ns.fail_on_close.load(Ordering::SeqCst) {
            return Err(DfsError::Remote {
                op: "close",
                path: self.ns.uri.to_string(),
                reason: "connection to namenode lost".to_string(),
            });
        }
        debug!(user = %self.user, uri = %self.ns.uri, "handle closed");
        Ok(())
    }
}

struct MemoryOutputStream {
    ns: Arc<MemoryNamespace>,
    path: DfsPath,
    pending: Vec<u8>,
    closed: bool,
}

impl MemoryOutputStream {
    fn commit(&mut self) -> DfsResult<()> {
        if self.pending.is_empty() {
            return Ok(());
        }
        let bytes = std::mem::take(&mut self.pending);
        self.ns.state.write().commit(&self.path, &bytes)
    }
}

impl Write for MemoryOutputStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.closed {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "stream is closed"));
        }
        self.pending.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.commit().map_err(io::Error::other)
    }
}

impl OutputStream for MemoryOutputStream {
    fn close(mut self: Box<Self>) -> DfsResult<()> {
        let result = self.commit();
        self.closed = true;
        result
    }
}

impl Drop for MemoryOutputStream {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        if let Err(e) = self.commit() {
            warn!(path = %self.path, error = %e, "unflushed bytes lost when stream was dropped");
        }
    }
}

/// Resolves `hopsfs://authority` URIs to registered in-memory namespaces.
#[derive(Default)]
pub struct MemoryConnector {
    namespaces: RwLock<HashMap<String, Arc<MemoryNamespace>>>,
}

impl MemoryConnector {
    /// Creates a connector with no namespaces.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a connector serving one namespace.
    pub fn with_namespace(ns: Arc<MemoryNamespace>) -> Self {
        let connector = Self::new();
        connector.register(ns);
        connector
    }

    /// Makes `ns` reachable under its authority, replacing any previous one.
    pub fn register(&self, ns: Arc<MemoryNamespace>) {
        self.namespaces
            .write()
            .insert(ns.authority().to_string(), ns);
    }
}

impl FileSystemConnector for MemoryConnector {
    fn connect(&self, uri: &Url, _config: &DfsConfig) -> DfsResult<Box<dyn DistributedFileSystem>> {
        if uri.scheme() != HOPSFS_SCHEME {
            return Err(DfsError::InvalidArgument(format!(
                "unsupported scheme '{}', expected '{}'",
                uri.scheme(),
                HOPSFS_SCHEME
            )));
        }
        let authority = uri_authority(uri)?;
        let ns = self
            .namespaces
            .read()
            .get(&authority)
            .cloned()
            .ok_or_else(|| DfsError::Remote {
                op: "connect",
                path: uri.to_string(),
                reason: format!("no namenode at {}", authority),
            })?;
        let identity = UserIdentity::current();
        let handle = MemoryNamespace::connect_as(&ns, &identity)?;
        Ok(Box::new(handle))
    }
}
