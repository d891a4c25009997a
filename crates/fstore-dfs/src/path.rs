//! Filesystem path locator.
//!
//! A `DfsPath` is an optional `scheme://authority` prefix followed by an
//! absolute, slash-separated list of segments. Parsing normalises repeated
//! and trailing slashes and rejects anything that cannot name a node, so a
//! constructed `DfsPath` is always well formed.

use std::fmt;
use std::str::FromStr;

use url::Url;

use crate::error::{DfsError, DfsResult};

/// URI scheme of the distributed filesystem.
pub const HOPSFS_SCHEME: &str = "hopsfs";

const SEPARATOR: char = '/';
const GLOB_CHARS: &[char] = &['*', '?', '['];

/// An absolute, normalised filesystem path.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DfsPath {
    scheme: Option<String>,
    authority: Option<String>,
    path: String,
}

impl DfsPath {
    /// Parses and validates a path string.
    pub fn parse(input: &str) -> DfsResult<Self> {
        let invalid = |reason: &str| DfsError::InvalidPath {
            input: input.to_string(),
            reason: reason.to_string(),
        };

        if input.is_empty() {
            return Err(invalid("path is empty"));
        }
        if input.contains('\0') {
            return Err(invalid("path contains a NUL byte"));
        }

        let (scheme, authority, rest) = match input.find("://") {
            Some(idx) => {
                let scheme = &input[..idx];
                if !valid_scheme(scheme) {
                    return Err(invalid("malformed scheme"));
                }
                let after = &input[idx + 3..];
                let (authority, rest) = match after.find(SEPARATOR) {
                    Some(slash) => (&after[..slash], &after[slash..]),
                    None => (after, "/"),
                };
                (
                    Some(scheme.to_ascii_lowercase()),
                    Some(authority.to_string()),
                    rest,
                )
            }
            None => {
                if !input.starts_with(SEPARATOR) {
                    let head = input.split(SEPARATOR).next().unwrap_or_default();
                    if head.contains(':') {
                        return Err(invalid("scheme must be followed by '://'"));
                    }
                    return Err(invalid("path must be absolute"));
                }
                (None, None, input)
            }
        };

        let mut normalised = String::with_capacity(rest.len());
        for segment in rest.split(SEPARATOR).filter(|s| !s.is_empty()) {
            if segment == "." || segment == ".." {
                return Err(invalid("relative segments are not allowed"));
            }
            normalised.push(SEPARATOR);
            normalised.push_str(segment);
        }
        if normalised.is_empty() {
            normalised.push(SEPARATOR);
        }

        Ok(Self {
            scheme,
            authority,
            path: normalised,
        })
    }

    /// The filesystem root, unqualified.
    pub fn root() -> Self {
        Self {
            scheme: None,
            authority: None,
            path: SEPARATOR.to_string(),
        }
    }

    /// URI scheme, if the path is qualified.
    pub fn scheme(&self) -> Option<&str> {
        self.scheme.as_deref()
    }

    /// URI authority (`host:port`), if the path is qualified.
    pub fn authority(&self) -> Option<&str> {
        self.authority.as_deref()
    }

    /// Returns true if the path carries a scheme.
    pub fn is_qualified(&self) -> bool {
        self.scheme.is_some()
    }

    /// The absolute path component, always starting with `/`.
    pub fn as_str(&self) -> &str {
        &self.path
    }

    /// Returns true for `/`.
    pub fn is_root(&self) -> bool {
        self.path.len() == 1
    }

    /// The last segment, empty for the root.
    pub fn name(&self) -> &str {
        match self.path.rfind(SEPARATOR) {
            Some(idx) => &self.path[idx + 1..],
            None => "",
        }
    }

    /// Iterates over the segments from the root downwards.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.path.split(SEPARATOR).filter(|s| !s.is_empty())
    }

    /// Number of segments below the root.
    pub fn depth(&self) -> usize {
        self.segments().count()
    }

    /// The parent path, `None` for the root. Qualification is preserved.
    pub fn parent(&self) -> Option<DfsPath> {
        if self.is_root() {
            return None;
        }
        let idx = self.path.rfind(SEPARATOR)?;
        let parent = if idx == 0 {
            SEPARATOR.to_string()
        } else {
            self.path[..idx].to_string()
        };
        Some(Self {
            scheme: self.scheme.clone(),
            authority: self.authority.clone(),
            path: parent,
        })
    }

    /// Appends a single segment.
    pub fn join(&self, name: &str) -> DfsResult<DfsPath> {
        if name.is_empty() || name.contains(SEPARATOR) || name == "." || name == ".." {
            return Err(DfsError::InvalidPath {
                input: format!("{}/{}", self, name),
                reason: "child name must be a single non-relative segment".to_string(),
            });
        }
        let mut path = self.path.clone();
        if !self.is_root() {
            path.push(SEPARATOR);
        }
        path.push_str(name);
        Ok(Self {
            scheme: self.scheme.clone(),
            authority: self.authority.clone(),
            path,
        })
    }

    /// Returns true if `self` is a strict ancestor of `other` (path component only).
    pub fn is_ancestor_of(&self, other: &DfsPath) -> bool {
        if self.is_root() {
            return !other.is_root();
        }
        other.path.len() > self.path.len()
            && other.path.starts_with(&self.path)
            && other.path.as_bytes()[self.path.len()] == b'/'
    }

    /// The same path with scheme and authority stripped.
    pub fn unqualified(&self) -> DfsPath {
        Self {
            scheme: None,
            authority: None,
            path: self.path.clone(),
        }
    }

    /// Returns true if any segment contains a glob metacharacter.
    pub fn has_glob(&self) -> bool {
        self.path.contains(GLOB_CHARS)
    }
}

/// `host[:port]` of a filesystem URI, the form path authorities use.
pub fn uri_authority(uri: &Url) -> DfsResult<String> {
    let host = uri
        .host_str()
        .filter(|h| !h.is_empty())
        .ok_or_else(|| DfsError::InvalidArgument(format!("URI '{}' has no authority", uri)))?;
    Ok(match uri.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    })
}

fn valid_scheme(scheme: &str) -> bool {
    let mut chars = scheme.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '+' || c == '-' || c == '.')
}

impl fmt::Display for DfsPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.scheme, &self.authority) {
            (Some(scheme), Some(authority)) => write!(f, "{}://{}{}", scheme, authority, self.path),
            _ => f.write_str(&self.path),
        }
    }
}

impl FromStr for DfsPath {
    type Err = DfsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DfsPath::parse(s)
    }
}

impl TryFrom<&str> for DfsPath {
    type Error = DfsError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        DfsPath::parse(value)
    }
}
