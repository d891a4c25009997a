//! Command line front end of the `fstore-dfs` binary.
//!
//! Every invocation builds a fresh in-memory namespace, so commands are
//! self-contained scripts rather than a client for a running cluster.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use crate::config::DfsConfig;
use crate::identity::UserIdentity;
use crate::memory::{MemoryConnector, MemoryNamespace};
use crate::path::DfsPath;
use crate::permission::FsPermission;
use crate::session::{DfsSession, SessionFactory};
use crate::status::FileStatus;

/// Parsed command line.
#[derive(Parser)]
#[command(name = "fstore-dfs")]
#[command(about = "fstore filesystem gateway smoke tool", long_about = None)]
pub struct Cli {
    /// Config file (`.toml` or `.json`); defaults are used when absent.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// User the session impersonates.
    #[arg(short, long, default_value = "fstore")]
    pub user: String,

    /// What to run.
    #[command(subcommand)]
    pub command: Command,
}

/// Subcommands.
#[derive(Subcommand)]
pub enum Command {
    /// Runs mkdirs, touch, put, cat, ls and rm under a scratch directory.
    Smoke {
        /// Scratch directory, created world-writable by the superuser.
        #[arg(default_value = "/fs/smoke")]
        root: String,
    },
    /// Uploads a local file, then prints its listing and contents.
    Put {
        /// Local source file.
        local: PathBuf,
        /// Remote destination; missing parents inherit their ancestor's permission.
        remote: String,
    },
    /// Prints the effective configuration.
    Config,
}

impl Cli {
    /// Runs the selected command.
    pub fn run(self) -> Result<()> {
        let config = load_config(self.config.as_deref())?;
        match &self.command {
            Command::Config => {
                println!("{}", toml::to_string_pretty(&config)?);
                Ok(())
            }
            Command::Smoke { root } => {
                let root = DfsPath::parse(root)?;
                let session = self.open(config, &root)?;
                smoke(&session, &root)?;
                session.close();
                Ok(())
            }
            Command::Put { local, remote } => {
                let remote = DfsPath::parse(remote)?;
                let scratch = match remote.segments().next() {
                    Some(top) if remote.depth() > 1 => DfsPath::root().join(top)?,
                    _ => DfsPath::root(),
                };
                let session = self.open(config, &scratch)?;
                session
                    .copy_to_remote_from_local(false, local, &remote)
                    .with_context(|| format!("uploading {}", local.display()))?;
                print_status(&session.get_status(&remote)?);
                println!("{}", session.cat(&remote)?);
                session.close();
                Ok(())
            }
        }
    }

    /// Builds the namespace, prepares `scratch` as the superuser and opens
    /// a session for the requested user.
    fn open(&self, config: DfsConfig, scratch: &DfsPath) -> Result<DfsSession> {
        let ns = Arc::new(MemoryNamespace::new(&config.default_fs, &config.superuser)?);
        let factory = SessionFactory::new(Arc::new(MemoryConnector::with_namespace(ns)));

        if !scratch.is_root() {
            let admin = factory.open(&UserIdentity::new(&config.superuser)?, config.clone())?;
            admin.mkdirs(scratch, FsPermission::from_mode(0o777))?;
            admin.close();
        }

        let identity = UserIdentity::new(&self.user)?;
        Ok(factory.open(&identity, config)?)
    }
}

fn load_config(path: Option<&Path>) -> Result<DfsConfig> {
    match path {
        Some(path) if path.exists() => DfsConfig::from_file(path),
        Some(path) => {
            tracing::warn!("Config file not found, using defaults: {}", path.display());
            Ok(DfsConfig::default())
        }
        None => Ok(DfsConfig::default()),
    }
}

fn smoke(session: &DfsSession, root: &DfsPath) -> Result<()> {
    let dir = root.join("a")?.join("b")?;
    let empty = dir.join("empty")?;
    let note = dir.join("note.txt")?;

    println!("mkdirs {} -> {}", dir, session.mkdirs(&dir, FsPermission::dir_default())?);
    session.touch(&empty)?;
    println!("touch {}", empty);
    session.create_with_content(&note, "hello from fstore\n")?;
    println!("put {}", note);
    print!("cat {}\n{}", note, session.cat(&note)?);

    println!("ls {}", dir);
    let mut listing = session.list_status(&dir)?;
    listing.sort_by(|a, b| a.path.cmp(&b.path));
    for status in &listing {
        print_status(status);
    }

    let top = root.join("a")?;
    println!("rm -r {} -> {}", top, session.remove(&top, true)?);
    println!("exists {} -> {}", top, session.exists(&top)?);
    Ok(())
}

fn print_status(status: &FileStatus) {
    println!(
        "{}{} {:<10} {:<12} {:>10} {}",
        if status.is_dir() { "d" } else { "-" },
        status.permission,
        status.owner,
        status.group,
        status.len,
        status.path
    );
}
