//! Error types for the filesystem gateway.

use thiserror::Error;

/// Result type alias for gateway operations.
pub type DfsResult<T> = Result<T, DfsError>;

/// Error variants for gateway and client-handle operations.
#[derive(Debug, Error)]
pub enum DfsError {
    /// Local or transport I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The remote filesystem rejected or failed a call.
    #[error("remote call {op} failed on {path}: {reason}")]
    Remote {
        /// Name of the remote operation.
        op: &'static str,
        /// Path the operation targeted.
        path: String,
        /// Failure description from the filesystem.
        reason: String,
    },

    /// The path does not exist.
    #[error("path not found: {path}")]
    NotFound {
        /// The missing path.
        path: String,
    },

    /// The named extended attribute is not set on the path.
    #[error("xattr '{name}' not found on {path}")]
    XAttrNotFound {
        /// Path carrying the attribute.
        path: String,
        /// Attribute name.
        name: String,
    },

    /// The path string is malformed.
    #[error("invalid path '{input}': {reason}")]
    InvalidPath {
        /// The rejected input.
        input: String,
        /// Why it was rejected.
        reason: String,
    },

    /// An argument failed validation at the call boundary.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A qualified path names a different filesystem than the session's.
    #[error("wrong filesystem: {path}, expected {expected}")]
    WrongFileSystem {
        /// The offending path.
        path: String,
        /// URI of the session's filesystem.
        expected: String,
    },

    /// A glob copy expanded to several sources but the target is not a directory.
    #[error("when copying {count} sources, destination {dst} should be a directory")]
    MultipleSourcesNeedDirectory {
        /// Number of expanded sources.
        count: usize,
        /// The destination path.
        dst: String,
    },

    /// A storage policy name has no enumerated counterpart.
    #[error("unknown storage policy: {0}")]
    UnknownStoragePolicy(String),

    /// A metadata status name or code has no enumerated counterpart.
    #[error("unknown meta status: {0}")]
    UnknownMetaStatus(String),

    /// File contents are not valid UTF-8.
    #[error("contents of {path} are not valid UTF-8")]
    InvalidUtf8 {
        /// The file that was read.
        path: String,
    },

    /// The target already exists.
    #[error("path already exists: {path}")]
    AlreadyExists {
        /// The existing path.
        path: String,
    },

    /// A directory was required.
    #[error("not a directory: {path}")]
    NotADirectory {
        /// The offending path.
        path: String,
    },

    /// A file was required.
    #[error("is a directory: {path}")]
    IsADirectory {
        /// The offending path.
        path: String,
    },

    /// Non-recursive delete of a directory with children.
    #[error("directory is not empty: {path}")]
    DirectoryNotEmpty {
        /// The directory.
        path: String,
    },

    /// The effective user lacks the required access.
    #[error("permission denied: user={user}, access={access}, path={path}")]
    PermissionDenied {
        /// Effective user of the handle.
        user: String,
        /// Requested access, e.g. `WRITE` or `SUPERUSER`.
        access: String,
        /// Path the check ran against.
        path: String,
    },

    /// A namespace or space quota would be exceeded.
    #[error("{kind} quota of {dir} exceeded: quota={quota}, would consume={consumed}")]
    QuotaExceeded {
        /// `namespace` or `space`.
        kind: &'static str,
        /// Directory carrying the quota.
        dir: String,
        /// The configured limit.
        quota: i64,
        /// Consumption after the rejected change.
        consumed: i64,
    },

    /// The filesystem handle could not be obtained for the identity.
    #[error("unable to obtain filesystem handle for user {user} at {uri}: {reason}")]
    HandleAcquisition {
        /// Impersonated user.
        user: String,
        /// Requested filesystem URI.
        uri: String,
        /// Underlying failure.
        reason: String,
    },

    /// The handle has been closed.
    #[error("filesystem closed")]
    Closed,
}

impl DfsError {
    /// Shorthand for a `NotFound` error on a displayable path.
    pub fn not_found(path: impl ToString) -> Self {
        DfsError::NotFound {
            path: path.to_string(),
        }
    }

    /// Returns true for errors that mean "the path does not exist".
    pub fn is_not_found(&self) -> bool {
        matches!(self, DfsError::NotFound { .. })
    }

    /// Returns true for boundary validation failures (raised before any remote call).
    pub fn is_invalid_argument(&self) -> bool {
        matches!(
            self,
            DfsError::InvalidPath { .. }
                | DfsError::InvalidArgument(_)
                | DfsError::WrongFileSystem { .. }
                | DfsError::MultipleSourcesNeedDirectory { .. }
                | DfsError::UnknownStoragePolicy(_)
                | DfsError::UnknownMetaStatus(_)
        )
    }
}
