//! Session factory and session lifecycle.
//!
//! A [`DfsSession`] owns exactly one client handle, acquired under an
//! explicit [`UserIdentity`] by [`SessionFactory`]. The identity is fixed
//! for the life of the session. Closing releases the handle once and never
//! fails; dropping an open session closes it the same way.

use std::fmt;
use std::sync::Arc;

use tracing::{error, info, warn};
use url::Url;

use crate::client::{DistributedFileSystem, FileSystemConnector};
use crate::config::DfsConfig;
use crate::error::{DfsError, DfsResult};
use crate::identity::UserIdentity;
use crate::path::{uri_authority, DfsPath};

/// Opens sessions through a connector.
#[derive(Clone)]
pub struct SessionFactory {
    connector: Arc<dyn FileSystemConnector>,
}

impl SessionFactory {
    /// Creates a factory that acquires handles from `connector`.
    pub fn new(connector: Arc<dyn FileSystemConnector>) -> Self {
        Self { connector }
    }

    /// Opens a session on `config.default_fs` as `identity`.
    pub fn open(&self, identity: &UserIdentity, config: DfsConfig) -> DfsResult<DfsSession> {
        self.acquire(identity, config, None)
    }

    /// Opens a session on the filesystem at `uri` as `identity`.
    pub fn open_at(
        &self,
        identity: &UserIdentity,
        config: DfsConfig,
        uri: &str,
    ) -> DfsResult<DfsSession> {
        self.acquire(identity, config, Some(uri))
    }

    fn acquire(
        &self,
        identity: &UserIdentity,
        config: DfsConfig,
        endpoint: Option<&str>,
    ) -> DfsResult<DfsSession> {
        let raw = endpoint.unwrap_or(&config.default_fs).to_string();
        let failure = |reason: String| DfsError::HandleAcquisition {
            user: identity.to_string(),
            uri: raw.clone(),
            reason,
        };

        config.validate().map_err(|e| failure(e.to_string()))?;
        let uri = Url::parse(&raw).map_err(|e| failure(e.to_string()))?;
        let authority = uri_authority(&uri).map_err(|e| failure(e.to_string()))?;
        let handle = identity
            .do_as(|| self.connector.connect(&uri, &config))
            .map_err(|e| failure(e.to_string()))?;

        info!(user = %identity, uri = %uri, "filesystem session opened");
        Ok(DfsSession {
            effective_user: identity.clone(),
            endpoint: endpoint.map(|_| uri.clone()),
            fs_uri: uri,
            authority,
            config,
            handle: Some(handle),
        })
    }
}

impl fmt::Debug for SessionFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionFactory").finish_non_exhaustive()
    }
}

/// A filesystem session bound to one effective user.
pub struct DfsSession {
    effective_user: UserIdentity,
    endpoint: Option<Url>,
    fs_uri: Url,
    authority: String,
    config: DfsConfig,
    handle: Option<Box<dyn DistributedFileSystem>>,
}

impl DfsSession {
    /// The identity every operation runs as.
    pub fn effective_user(&self) -> &UserIdentity {
        &self.effective_user
    }

    /// The endpoint requested at open time, if any.
    pub fn endpoint(&self) -> Option<&Url> {
        self.endpoint.as_ref()
    }

    /// URI of the filesystem the session talks to.
    pub fn filesystem_uri(&self) -> &Url {
        &self.fs_uri
    }

    /// Current configuration.
    pub fn config(&self) -> &DfsConfig {
        &self.config
    }

    /// Replaces the configuration used by subsequent operations.
    pub fn set_config(&mut self, config: DfsConfig) -> DfsResult<()> {
        config.validate()?;
        self.config = config;
        Ok(())
    }

    /// The fully qualified form of `path` on this session's filesystem.
    pub fn qualify(&self, path: &DfsPath) -> DfsResult<DfsPath> {
        let path = self.resolve(path)?;
        DfsPath::parse(&format!(
            "{}://{}{}",
            self.fs_uri.scheme(),
            self.authority,
            path.as_str()
        ))
    }

    /// Rejects paths on another filesystem and strips the qualification.
    pub(crate) fn resolve(&self, path: &DfsPath) -> DfsResult<DfsPath> {
        if path.is_qualified() {
            let same_scheme = path.scheme() == Some(self.fs_uri.scheme());
            let same_authority = path.authority() == Some(self.authority.as_str());
            if !same_scheme || !same_authority {
                return Err(DfsError::WrongFileSystem {
                    path: path.to_string(),
                    expected: self.fs_uri.to_string(),
                });
            }
        }
        Ok(path.unqualified())
    }

    pub(crate) fn fs(&self) -> DfsResult<&dyn DistributedFileSystem> {
        self.handle.as_deref().ok_or(DfsError::Closed)
    }

    /// Releases the handle. Close failures are logged, never returned.
    pub fn close(mut self) {
        self.release();
    }

    fn release(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };
        match handle.close() {
            Ok(()) => {
                info!(user = %self.effective_user, uri = %self.fs_uri, "filesystem session closed")
            }
            Err(e) => error!(
                user = %self.effective_user,
                uri = %self.fs_uri,
                error = %e,
                "error while closing filesystem"
            ),
        }
    }
}

impl Drop for DfsSession {
    fn drop(&mut self) {
        if self.handle.is_some() {
            warn!(user = %self.effective_user, "session dropped without close");
        }
        self.release();
    }
}

impl fmt::Debug for DfsSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DfsSession")
            .field("effective_user", &self.effective_user)
            .field("filesystem", &self.fs_uri.as_str())
            .field("open", &self.handle.is_some())
            .finish()
    }
}

/// Sessions over a fresh in-memory namespace for unit tests.
#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use crate::memory::{MemoryConnector, MemoryNamespace};
    use crate::permission::FsPermission;

    pub const URI: &str = "hopsfs://namenode:8020";
    pub const SUPERUSER: &str = "hdfs";

    pub fn p(s: &str) -> DfsPath {
        DfsPath::parse(s).unwrap()
    }

    pub fn config() -> DfsConfig {
        DfsConfig {
            default_fs: URI.to_string(),
            ..Default::default()
        }
    }

    /// A namespace with a world-writable `/fs`, and a factory serving it.
    pub fn namespace() -> (Arc<MemoryNamespace>, SessionFactory) {
        let ns = Arc::new(MemoryNamespace::new(URI, SUPERUSER).unwrap());
        let connector = MemoryConnector::with_namespace(Arc::clone(&ns));
        let factory = SessionFactory::new(Arc::new(connector));
        let superuser = UserIdentity::new(SUPERUSER).unwrap();
        let admin = MemoryNamespace::connect_as(&ns, &superuser).unwrap();
        admin.mkdirs(&p("/fs"), FsPermission::from_mode(0o777)).unwrap();
        (ns, factory)
    }

    pub fn session_as(factory: &SessionFactory, user: &str) -> DfsSession {
        factory
            .open(&UserIdentity::new(user).unwrap(), config())
            .unwrap()
    }
}
