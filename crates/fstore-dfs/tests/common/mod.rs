//! Common test utilities and fixtures for integration tests.

#![allow(dead_code)]

use std::sync::{Arc, Once};

use fstore_dfs::{
    DfsConfig, DfsPath, DfsSession, FsPermission, MemoryConnector, MemoryNamespace,
    SessionFactory, UserIdentity,
};

pub const URI: &str = "hopsfs://namenode.test:8020";
pub const SUPERUSER: &str = "hdfs";

static TRACING: Once = Once::new();

/// Installs a test-writer subscriber once per test binary.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

pub fn p(s: &str) -> DfsPath {
    DfsPath::parse(s).unwrap()
}

/// One in-memory filesystem with a factory in front of it.
pub struct TestFs {
    pub ns: Arc<MemoryNamespace>,
    pub factory: SessionFactory,
}

impl TestFs {
    /// Fresh namespace with a world-writable `/fs`.
    pub fn new() -> Self {
        init_tracing();
        let ns = Arc::new(MemoryNamespace::new(URI, SUPERUSER).unwrap());
        let connector = MemoryConnector::with_namespace(Arc::clone(&ns));
        let factory = SessionFactory::new(Arc::new(connector));
        let fs = Self { ns, factory };
        let admin = fs.session(SUPERUSER);
        admin
            .mkdirs(&p("/fs"), FsPermission::from_mode(0o777))
            .unwrap();
        admin.close();
        fs
    }

    pub fn config(&self) -> DfsConfig {
        DfsConfig {
            default_fs: URI.to_string(),
            ..Default::default()
        }
    }

    pub fn session(&self, user: &str) -> DfsSession {
        self.factory
            .open(&UserIdentity::new(user).unwrap(), self.config())
            .unwrap()
    }

    pub fn admin(&self) -> DfsSession {
        self.session(SUPERUSER)
    }
}
