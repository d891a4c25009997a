//! POSIX permission bits and ACL entries.
//!
//! `FsPermission` carries the owner/group/other `FsAction` triplets plus the
//! sticky bit. `AclEntry` supplements the triplets with named principals and
//! a mask, in either the access or the default scope.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{DfsError, DfsResult};

/// A read/write/execute subset.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct FsAction(u8);

impl FsAction {
    /// No access.
    pub const NONE: FsAction = FsAction(0);
    /// Execute only.
    pub const EXECUTE: FsAction = FsAction(1);
    /// Write only.
    pub const WRITE: FsAction = FsAction(2);
    /// Write and execute.
    pub const WRITE_EXECUTE: FsAction = FsAction(3);
    /// Read only.
    pub const READ: FsAction = FsAction(4);
    /// Read and execute.
    pub const READ_EXECUTE: FsAction = FsAction(5);
    /// Read and write.
    pub const READ_WRITE: FsAction = FsAction(6);
    /// Full access.
    pub const ALL: FsAction = FsAction(7);

    /// Builds an action from the low three bits.
    pub fn from_bits(bits: u8) -> Self {
        FsAction(bits & 0o7)
    }

    /// The action as `rwx` bits.
    pub fn bits(&self) -> u8 {
        self.0
    }

    /// Returns true if every bit of `other` is granted by `self`.
    pub fn implies(&self, other: FsAction) -> bool {
        self.0 & other.0 == other.0
    }

    /// Intersection of two actions.
    pub fn and(&self, other: FsAction) -> FsAction {
        FsAction(self.0 & other.0)
    }

    /// Union of two actions.
    pub fn or(&self, other: FsAction) -> FsAction {
        FsAction(self.0 | other.0)
    }

    /// Parses `rwx`, `r-x`, `---` and friends.
    pub fn parse_symbolic(s: &str) -> DfsResult<Self> {
        let bytes = s.as_bytes();
        if bytes.len() != 3 {
            return Err(DfsError::InvalidArgument(format!(
                "invalid action '{}': expected three characters",
                s
            )));
        }
        let mut bits = 0u8;
        for (i, (&c, expected)) in bytes.iter().zip([b'r', b'w', b'x']).enumerate() {
            if c == expected {
                bits |= 4 >> i;
            } else if c != b'-' {
                return Err(DfsError::InvalidArgument(format!(
                    "invalid action '{}': unexpected '{}'",
                    s, c as char
                )));
            }
        }
        Ok(FsAction(bits))
    }
}

impl fmt::Display for FsAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let r = if self.0 & 4 != 0 { 'r' } else { '-' };
        let w = if self.0 & 2 != 0 { 'w' } else { '-' };
        let x = if self.0 & 1 != 0 { 'x' } else { '-' };
        write!(f, "{}{}{}", r, w, x)
    }
}

/// Owner/group/other permission triplets plus the sticky bit.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FsPermission {
    user: FsAction,
    group: FsAction,
    other: FsAction,
    sticky: bool,
}

impl FsPermission {
    /// Builds a permission from its triplets.
    pub fn new(user: FsAction, group: FsAction, other: FsAction) -> Self {
        Self {
            user,
            group,
            other,
            sticky: false,
        }
    }

    /// Builds a permission from an octal mode (`0o1777` max).
    pub fn from_mode(mode: u16) -> Self {
        Self {
            user: FsAction::from_bits((mode >> 6) as u8),
            group: FsAction::from_bits((mode >> 3) as u8),
            other: FsAction::from_bits(mode as u8),
            sticky: mode & 0o1000 != 0,
        }
    }

    /// Default permission for new directories before the umask (0o777).
    pub fn dir_default() -> Self {
        Self::from_mode(0o777)
    }

    /// Default permission for new files before the umask (0o666).
    pub fn file_default() -> Self {
        Self::from_mode(0o666)
    }

    /// The octal mode.
    pub fn to_mode(&self) -> u16 {
        let sticky = if self.sticky { 0o1000 } else { 0 };
        sticky
            | (self.user.bits() as u16) << 6
            | (self.group.bits() as u16) << 3
            | self.other.bits() as u16
    }

    /// Owner triplet.
    pub fn user_action(&self) -> FsAction {
        self.user
    }

    /// Group triplet.
    pub fn group_action(&self) -> FsAction {
        self.group
    }

    /// Other triplet.
    pub fn other_action(&self) -> FsAction {
        self.other
    }

    /// Returns true if the sticky bit is set.
    pub fn sticky(&self) -> bool {
        self.sticky
    }

    /// Returns a copy with the sticky bit set or cleared.
    pub fn with_sticky(mut self, sticky: bool) -> Self {
        self.sticky = sticky;
        self
    }

    /// Returns a copy with the group triplet replaced.
    pub fn with_group_action(mut self, group: FsAction) -> Self {
        self.group = group;
        self
    }

    /// Clears the bits present in `umask`.
    pub fn apply_umask(&self, umask: u16) -> Self {
        Self::from_mode(self.to_mode() & !(umask & 0o777))
    }
}

impl Default for FsPermission {
    fn default() -> Self {
        Self::dir_default()
    }
}

impl fmt::Display for FsPermission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let other = self.other.to_string();
        let other = if self.sticky {
            let mut chars: Vec<char> = other.chars().collect();
            chars[2] = if self.other.implies(FsAction::EXECUTE) { 't' } else { 'T' };
            chars.into_iter().collect()
        } else {
            other
        };
        write!(f, "{}{}{}", self.user, self.group, other)
    }
}

impl FromStr for FsPermission {
    type Err = DfsError;

    /// Accepts an octal mode such as `750` or `1777`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mode = u16::from_str_radix(s, 8)
            .map_err(|_| DfsError::InvalidArgument(format!("invalid octal mode '{}'", s)))?;
        if mode > 0o1777 {
            return Err(DfsError::InvalidArgument(format!("mode '{}' out of range", s)));
        }
        Ok(Self::from_mode(mode))
    }
}

/// Whether an ACL entry governs access or is inherited by new children.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AclEntryScope {
    /// Checked when the node itself is accessed.
    Access,
    /// Copied onto children created inside a directory.
    Default,
}

/// The principal class an ACL entry applies to.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AclEntryType {
    /// The owner (unnamed) or a named user.
    User,
    /// The owning group (unnamed) or a named group.
    Group,
    /// Upper bound for named entries and the owning group.
    Mask,
    /// Everyone else.
    Other,
}

impl AclEntryType {
    fn as_str(&self) -> &'static str {
        match self {
            AclEntryType::User => "user",
            AclEntryType::Group => "group",
            AclEntryType::Mask => "mask",
            AclEntryType::Other => "other",
        }
    }
}

/// A single ACL rule.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AclEntry {
    /// Access or default scope.
    pub scope: AclEntryScope,
    /// Principal class.
    pub entry_type: AclEntryType,
    /// Named principal; `None` for owner, owning group, mask and other.
    pub name: Option<String>,
    /// Granted subset.
    pub permission: FsAction,
}

impl AclEntry {
    /// Access-scope entry for a named user.
    pub fn user(name: &str, permission: FsAction) -> Self {
        Self {
            scope: AclEntryScope::Access,
            entry_type: AclEntryType::User,
            name: Some(name.to_string()),
            permission,
        }
    }

    /// Access-scope entry for a named group.
    pub fn group(name: &str, permission: FsAction) -> Self {
        Self {
            scope: AclEntryScope::Access,
            entry_type: AclEntryType::Group,
            name: Some(name.to_string()),
            permission,
        }
    }

    /// Unnamed access-scope entry of the given type.
    pub fn unnamed(entry_type: AclEntryType, permission: FsAction) -> Self {
        Self {
            scope: AclEntryScope::Access,
            entry_type,
            name: None,
            permission,
        }
    }

    /// Returns the same entry in the default scope.
    pub fn into_default(mut self) -> Self {
        self.scope = AclEntryScope::Default;
        self
    }

    /// Returns true for entries naming a specific user or group.
    pub fn is_named(&self) -> bool {
        self.name.is_some()
    }

    /// Parses `[default:]type:[name]:perms`, e.g. `user:alice:r-x`.
    pub fn parse(entry: &str) -> DfsResult<Self> {
        let invalid = |reason: &str| {
            DfsError::InvalidArgument(format!("invalid ACL entry '{}': {}", entry, reason))
        };
        let mut parts: Vec<&str> = entry.split(':').collect();
        let scope = if parts.first() == Some(&"default") {
            parts.remove(0);
            AclEntryScope::Default
        } else {
            AclEntryScope::Access
        };
        let (kind, name, perms) = match parts.as_slice() {
            [kind, name, perms] => (*kind, *name, *perms),
            [kind, perms] => (*kind, "", *perms),
            _ => return Err(invalid("expected type:name:perms")),
        };
        let entry_type = match kind {
            "user" => AclEntryType::User,
            "group" => AclEntryType::Group,
            "mask" => AclEntryType::Mask,
            "other" => AclEntryType::Other,
            _ => return Err(invalid("unknown entry type")),
        };
        let name = if name.is_empty() {
            None
        } else {
            if matches!(entry_type, AclEntryType::Mask | AclEntryType::Other) {
                return Err(invalid("mask and other entries cannot be named"));
            }
            Some(name.to_string())
        };
        Ok(Self {
            scope,
            entry_type,
            name,
            permission: FsAction::parse_symbolic(perms)?,
        })
    }
}

impl fmt::Display for AclEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.scope == AclEntryScope::Default {
            f.write_str("default:")?;
        }
        write!(
            f,
            "{}:{}:{}",
            self.entry_type.as_str(),
            self.name.as_deref().unwrap_or(""),
            self.permission
        )
    }
}

/// Ownership, permission and extended ACL of a node.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AclStatus {
    /// Owning user.
    pub owner: String,
    /// Owning group.
    pub group: String,
    /// Permission bits.
    pub permission: FsPermission,
    /// Named, mask and default entries; base entries are folded into `permission`.
    pub entries: Vec<AclEntry>,
}
