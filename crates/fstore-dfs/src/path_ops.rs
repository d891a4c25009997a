//! File and directory operations of a session.

use std::io::{Read, Write};
use std::path::Path;

use tracing::{debug, info};

use crate::client::{DistributedFileSystem, InputStream, OutputStream};
use crate::copy::{self, CopyOptions, Local, Remote};
use crate::error::{DfsError, DfsResult};
use crate::glob;
use crate::path::DfsPath;
use crate::permission::FsPermission;
use crate::session::DfsSession;
use crate::status::FileStatus;

/// Chunk size used by [`DfsSession::cat`].
pub const CAT_CHUNK_SIZE: usize = 64 * 1024;

impl DfsSession {
    fn remote(&self) -> DfsResult<Remote<'_>> {
        Ok(Remote {
            fs: self.fs()?,
            umask: self.config().umask,
        })
    }

    fn copy_options(&self, overwrite: bool, delete_source: bool) -> CopyOptions {
        CopyOptions {
            overwrite,
            delete_source,
            buffer_size: self.config().io_buffer_size,
        }
    }

    /// Creates the missing parent chain of `path` with the umasked
    /// directory default.
    fn ensure_parent(&self, fs: &dyn DistributedFileSystem, path: &DfsPath) -> DfsResult<()> {
        if let Some(parent) = path.parent() {
            if !fs.exists(&parent)? {
                let permission = FsPermission::dir_default().apply_umask(self.config().umask);
                fs.mkdirs(&parent, permission)?;
            }
        }
        Ok(())
    }

    /// Reads a whole file as UTF-8 text.
    ///
    /// The file is materialized in memory; do not use it on large files.
    pub fn cat(&self, path: &DfsPath) -> DfsResult<String> {
        let path = self.resolve(path)?;
        let mut stream = self.fs()?.open(&path)?;
        let mut contents = Vec::new();
        let mut chunk = vec![0u8; CAT_CHUNK_SIZE];
        loop {
            let n = stream.read(&mut chunk)?;
            if n == 0 {
                break;
            }
            contents.extend_from_slice(&chunk[..n]);
        }
        String::from_utf8(contents).map_err(|_| DfsError::InvalidUtf8 {
            path: path.to_string(),
        })
    }

    /// Creates one directory level; the parent must exist.
    pub fn mkdir(&self, path: &DfsPath, permission: FsPermission) -> DfsResult<bool> {
        let path = self.resolve(path)?;
        self.fs()?.mkdir(&path, permission)
    }

    /// Creates one directory level with the default directory permission.
    pub fn mkdir_default(&self, path: &DfsPath) -> DfsResult<bool> {
        let permission = FsPermission::dir_default().apply_umask(self.config().umask);
        self.mkdir(path, permission)
    }

    /// Creates a directory and every missing ancestor.
    pub fn mkdirs(&self, path: &DfsPath, permission: FsPermission) -> DfsResult<bool> {
        let path = self.resolve(path)?;
        self.fs()?.mkdirs(&path, permission)
    }

    /// Creates an empty file, replacing an existing one.
    pub fn touch(&self, path: &DfsPath) -> DfsResult<()> {
        self.create(path)?.close()
    }

    /// Statuses of the direct children of a directory. Order is unspecified.
    pub fn list_status(&self, path: &DfsPath) -> DfsResult<Vec<FileStatus>> {
        let path = self.resolve(path)?;
        self.fs()?.list_status(&path)
    }

    /// Status of a node; fails with `NotFound` if it does not exist.
    pub fn get_status(&self, path: &DfsPath) -> DfsResult<FileStatus> {
        let path = self.resolve(path)?;
        self.fs()?.get_file_status(&path)
    }

    /// Returns true if the node exists.
    pub fn exists(&self, path: &DfsPath) -> DfsResult<bool> {
        let path = self.resolve(path)?;
        self.fs()?.exists(&path)
    }

    /// Returns true if the node exists and is a directory.
    pub fn is_dir(&self, path: &DfsPath) -> DfsResult<bool> {
        let path = self.resolve(path)?;
        match self.fs()?.get_file_status(&path) {
            Ok(status) => Ok(status.is_dir()),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Deletes a node. A missing node counts as removed.
    pub fn remove(&self, path: &DfsPath, recursive: bool) -> DfsResult<bool> {
        let path = self.resolve(path)?;
        if self.fs()?.delete(&path, recursive)? {
            info!(path = %path, recursive, user = %self.effective_user(), "removed");
        } else {
            debug!(path = %path, "nothing to remove");
        }
        Ok(true)
    }

    /// Copies a local file or directory tree to the remote filesystem,
    /// overwriting existing files.
    pub fn copy_local_to_remote(
        &self,
        delete_source: bool,
        src: &Path,
        dst: &DfsPath,
    ) -> DfsResult<()> {
        let dst = self.resolve(dst)?;
        let options = self.copy_options(true, delete_source);
        copy::copy(&Local, &src.to_path_buf(), &self.remote()?, &dst, &options)?;
        Ok(())
    }

    /// Copies a remote file or directory tree to the local disk,
    /// overwriting existing files.
    pub fn copy_remote_to_local(&self, src: &DfsPath, dst: &Path) -> DfsResult<()> {
        let src = self.resolve(src)?;
        let options = self.copy_options(true, false);
        copy::copy(&self.remote()?, &src, &Local, &dst.to_path_buf(), &options)?;
        Ok(())
    }

    /// Like [`copy_local_to_remote`](Self::copy_local_to_remote), but first
    /// creates the missing parent chain of `dst` with the permission of its
    /// nearest existing ancestor.
    pub fn copy_to_remote_from_local(
        &self,
        delete_source: bool,
        src: &Path,
        dst: &DfsPath,
    ) -> DfsResult<()> {
        let dst = self.resolve(dst)?;
        if let Some(parent) = dst.parent() {
            let fs = self.fs()?;
            if !fs.exists(&parent)? {
                let permission = self.get_parent_permission(&parent)?;
                debug!(parent = %parent, permission = %permission, "creating destination parent");
                fs.mkdirs(&parent, permission)?;
            }
        }
        self.copy_local_to_remote(delete_source, src, &dst)
    }

    /// Copies within the remote filesystem. `src` may be a glob; when it
    /// matches several nodes `dst` must be an existing directory. Existing
    /// destination files are never overwritten.
    ///
    /// Returns the number of sources copied.
    pub fn copy_within_remote(&self, src: &DfsPath, dst: &DfsPath) -> DfsResult<usize> {
        let src = self.resolve(src)?;
        let dst = self.resolve(dst)?;
        let remote = self.remote()?;
        let sources = glob::expand(remote.fs, &src)?;
        if sources.len() > 1 && !self.is_dir(&dst)? {
            return Err(DfsError::MultipleSourcesNeedDirectory {
                count: sources.len(),
                dst: dst.to_string(),
            });
        }
        let options = self.copy_options(false, false);
        for source in &sources {
            copy::copy_within(&remote, source, &dst, &options)?;
        }
        Ok(sources.len())
    }

    /// Moves a node within the filesystem.
    pub fn rename(&self, src: &DfsPath, dst: &DfsPath) -> DfsResult<bool> {
        let src = self.resolve(src)?;
        let dst = self.resolve(dst)?;
        self.fs()?.rename(&src, &dst)
    }

    /// Creates (or truncates) a file, creating missing parents first.
    pub fn create(&self, path: &DfsPath) -> DfsResult<Box<dyn OutputStream>> {
        let path = self.resolve(path)?;
        let fs = self.fs()?;
        self.ensure_parent(fs, &path)?;
        let permission = FsPermission::file_default().apply_umask(self.config().umask);
        fs.create(&path, permission, true)
    }

    /// Opens a file for appending, creating it when missing.
    pub fn append(&self, path: &DfsPath) -> DfsResult<Box<dyn OutputStream>> {
        let path = self.resolve(path)?;
        if self.fs()?.exists(&path)? {
            self.fs()?.append(&path)
        } else {
            self.create(&path)
        }
    }

    /// Writes `content` to a new file.
    pub fn create_with_content(&self, path: &DfsPath, content: &str) -> DfsResult<()> {
        self.create_with_bytes(path, content.as_bytes())
    }

    /// Writes `content` to a new file. The stream is flushed and closed
    /// whether or not the write succeeds; a write error takes precedence
    /// over a close error.
    pub fn create_with_bytes(&self, path: &DfsPath, content: &[u8]) -> DfsResult<()> {
        let mut out = self.create(path)?;
        let written = out.write_all(content);
        let closed = out.close();
        written?;
        closed
    }

    /// Opens a file for streaming reads.
    pub fn open(&self, path: &DfsPath) -> DfsResult<InputStream> {
        let path = self.resolve(path)?;
        self.fs()?.open(&path)
    }

    /// Permission of the nearest existing ancestor of `path`.
    ///
    /// The walk starts at the parent, so for an existing `path` this is the
    /// permission of its parent, not of `path` itself. The root has no
    /// ancestor and is rejected.
    pub fn get_parent_permission(&self, path: &DfsPath) -> DfsResult<FsPermission> {
        let path = self.resolve(path)?;
        let fs = self.fs()?;
        let mut location = path.parent();
        while let Some(current) = location {
            match fs.get_file_status(&current) {
                Ok(status) => return Ok(status.permission),
                Err(e) if e.is_not_found() => location = current.parent(),
                Err(e) => return Err(e),
            }
        }
        Err(DfsError::InvalidArgument(format!(
            "{} has no parent to inherit a permission from",
            path
        )))
    }
}
