//! POSIX permission and ACL evaluation.
//!
//! Used by the in-memory namespace to decide whether a handle's user may
//! perform an access: the superuser bypasses all checks, then the owner
//! bits, named-user entries, owning-group and named-group entries (both
//! limited by the mask), and finally the other bits.

use std::collections::BTreeSet;

use crate::permission::{AclEntry, AclEntryScope, AclEntryType, FsAction, FsPermission};

/// The user a check runs for.
#[derive(Clone, Debug)]
pub struct Principal {
    /// Short user name.
    pub user: String,
    /// Every group the user belongs to.
    pub groups: BTreeSet<String>,
    /// True for the filesystem superuser or members of the supergroup.
    pub is_superuser: bool,
}

impl Principal {
    /// Returns true if the user belongs to `group`.
    pub fn in_group(&self, group: &str) -> bool {
        self.groups.contains(group)
    }
}

/// Ownership and access rules of a node.
#[derive(Clone, Copy, Debug)]
pub struct NodeAccess<'a> {
    /// Owning user.
    pub owner: &'a str,
    /// Owning group.
    pub group: &'a str,
    /// Permission bits.
    pub permission: FsPermission,
    /// Extended ACL entries (both scopes).
    pub acl: &'a [AclEntry],
}

impl NodeAccess<'_> {
    fn mask(&self) -> Option<FsAction> {
        self.acl
            .iter()
            .find(|e| e.scope == AclEntryScope::Access && e.entry_type == AclEntryType::Mask)
            .map(|e| e.permission)
    }

    fn masked(&self, action: FsAction) -> FsAction {
        match self.mask() {
            Some(mask) => action.and(mask),
            None => action,
        }
    }
}

/// Returns true if `principal` is granted `requested` on the node.
pub fn check_access(node: &NodeAccess<'_>, principal: &Principal, requested: FsAction) -> bool {
    if principal.is_superuser {
        return true;
    }

    if node.owner == principal.user {
        return node.permission.user_action().implies(requested);
    }

    let access_entries = || {
        node.acl
            .iter()
            .filter(|e| e.scope == AclEntryScope::Access)
    };

    for entry in access_entries() {
        if entry.entry_type == AclEntryType::User
            && entry.name.as_deref() == Some(&principal.user)
        {
            return node.masked(entry.permission).implies(requested);
        }
    }

    let mut group_matched = false;
    if principal.in_group(node.group) {
        group_matched = true;
        if node.masked(node.permission.group_action()).implies(requested) {
            return true;
        }
    }
    for entry in access_entries() {
        if entry.entry_type != AclEntryType::Group {
            continue;
        }
        if let Some(name) = entry.name.as_deref() {
            if principal.in_group(name) {
                group_matched = true;
                if node.masked(entry.permission).implies(requested) {
                    return true;
                }
            }
        }
    }
    if group_matched {
        return false;
    }

    node.permission.other_action().implies(requested)
}

/// Sticky-bit rule: in a sticky directory only the child's owner, the
/// directory's owner or the superuser may remove or rename a child.
pub fn check_sticky_bit(parent: &NodeAccess<'_>, child_owner: &str, principal: &Principal) -> bool {
    if principal.is_superuser || !parent.permission.sticky() {
        return true;
    }
    child_owner == principal.user || parent.owner == principal.user
}
