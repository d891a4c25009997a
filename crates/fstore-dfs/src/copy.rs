//! Recursive copies between the remote filesystem and the local disk.
//!
//! Both sides implement [`Endpoint`]; one generic walk serves remote to
//! remote, local to remote and remote to local. A destination that is an
//! existing directory receives the source under its own name; that name must
//! not already be a directory. File bytes move through a buffer of the
//! configured size.

use std::fs::{self, File};
use std::io::{self, ErrorKind, Read, Write};
use std::path::PathBuf;

use tracing::{debug, warn};

use crate::client::DistributedFileSystem;
use crate::error::{DfsError, DfsResult};
use crate::path::DfsPath;
use crate::permission::FsPermission;
use crate::status::FileKind;

/// Knobs of one copy.
#[derive(Clone, Copy, Debug)]
pub(crate) struct CopyOptions {
    /// Replace existing destination files.
    pub overwrite: bool,
    /// Remove the source once everything was copied.
    pub delete_source: bool,
    /// Size of the transfer buffer.
    pub buffer_size: usize,
}

/// One side of a copy.
pub(crate) trait Endpoint {
    type Path: Clone;

    /// Printable form of a path.
    fn describe(path: &Self::Path) -> String;

    /// Kind of the node, `None` if it does not exist.
    fn kind(&self, path: &Self::Path) -> DfsResult<Option<FileKind>>;

    /// Last segment of the path.
    fn name(&self, path: &Self::Path) -> DfsResult<String>;

    /// Direct children of a directory with their kinds.
    fn children(&self, path: &Self::Path) -> DfsResult<Vec<(Self::Path, FileKind)>>;

    /// Path of a child.
    fn join(&self, path: &Self::Path, name: &str) -> DfsResult<Self::Path>;

    /// Opens a file for reading.
    fn open(&self, path: &Self::Path) -> DfsResult<Box<dyn Read>>;

    /// Creates a directory and its missing ancestors.
    fn mkdirs(&self, path: &Self::Path) -> DfsResult<()>;

    /// Creates or truncates a file and fills it from `reader`.
    fn write_file(
        &self,
        path: &Self::Path,
        reader: &mut dyn Read,
        buffer_size: usize,
    ) -> DfsResult<u64>;

    /// Removes a node and everything below it.
    fn delete(&self, path: &Self::Path) -> DfsResult<()>;
}

/// The remote filesystem behind a client handle.
pub(crate) struct Remote<'a> {
    pub fs: &'a dyn DistributedFileSystem,
    pub umask: u16,
}

impl Endpoint for Remote<'_> {
    type Path = DfsPath;

    fn describe(path: &DfsPath) -> String {
        path.to_string()
    }

    fn kind(&self, path: &DfsPath) -> DfsResult<Option<FileKind>> {
        match self.fs.get_file_status(path) {
            Ok(status) => Ok(Some(status.kind)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn name(&self, path: &DfsPath) -> DfsResult<String> {
        Ok(path.name().to_string())
    }

    fn children(&self, path: &DfsPath) -> DfsResult<Vec<(DfsPath, FileKind)>> {
        self.fs
            .list_status(path)?
            .into_iter()
            .map(|status| Ok((path.join(status.path.name())?, status.kind)))
            .collect()
    }

    fn join(&self, path: &DfsPath, name: &str) -> DfsResult<DfsPath> {
        path.join(name)
    }

    fn open(&self, path: &DfsPath) -> DfsResult<Box<dyn Read>> {
        let stream: Box<dyn Read> = self.fs.open(path)?;
        Ok(stream)
    }

    fn mkdirs(&self, path: &DfsPath) -> DfsResult<()> {
        let permission = FsPermission::dir_default().apply_umask(self.umask);
        self.fs.mkdirs(path, permission).map(|_| ())
    }

    fn write_file(
        &self,
        path: &DfsPath,
        reader: &mut dyn Read,
        buffer_size: usize,
    ) -> DfsResult<u64> {
        if let Some(parent) = path.parent() {
            self.mkdirs(&parent)?;
        }
        let permission = FsPermission::file_default().apply_umask(self.umask);
        let mut out = self.fs.create(path, permission, true)?;
        match copy_bytes(reader, &mut out, buffer_size) {
            Ok(copied) => {
                out.close()?;
                Ok(copied)
            }
            Err(e) => {
                if let Err(close_err) = out.close() {
                    warn!(
                        path = %path,
                        error = %close_err,
                        "closing partially copied file failed"
                    );
                }
                Err(e.into())
            }
        }
    }

    fn delete(&self, path: &DfsPath) -> DfsResult<()> {
        self.fs.delete(path, true).map(|_| ())
    }
}

/// The local disk.
pub(crate) struct Local;

impl Endpoint for Local {
    type Path = PathBuf;

    fn describe(path: &PathBuf) -> String {
        path.display().to_string()
    }

    fn kind(&self, path: &PathBuf) -> DfsResult<Option<FileKind>> {
        match fs::metadata(path) {
            Ok(meta) if meta.is_dir() => Ok(Some(FileKind::Directory)),
            Ok(_) => Ok(Some(FileKind::File)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn name(&self, path: &PathBuf) -> DfsResult<String> {
        path.file_name()
            .and_then(|n| n.to_str())
            .map(str::to_string)
            .ok_or_else(|| {
                DfsError::InvalidArgument(format!(
                    "local path {} has no UTF-8 file name",
                    path.display()
                ))
            })
    }

    fn children(&self, path: &PathBuf) -> DfsResult<Vec<(PathBuf, FileKind)>> {
        let mut children = Vec::new();
        for entry in fs::read_dir(path)? {
            let entry = entry?;
            let kind = if entry.file_type()?.is_dir() {
                FileKind::Directory
            } else {
                FileKind::File
            };
            children.push((entry.path(), kind));
        }
        children.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(children)
    }

    fn join(&self, path: &PathBuf, name: &str) -> DfsResult<PathBuf> {
        Ok(path.join(name))
    }

    fn open(&self, path: &PathBuf) -> DfsResult<Box<dyn Read>> {
        Ok(Box::new(File::open(path)?))
    }

    fn mkdirs(&self, path: &PathBuf) -> DfsResult<()> {
        fs::create_dir_all(path)?;
        Ok(())
    }

    fn write_file(
        &self,
        path: &PathBuf,
        reader: &mut dyn Read,
        buffer_size: usize,
    ) -> DfsResult<u64> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = File::create(path)?;
        let copied = copy_bytes(reader, &mut file, buffer_size)?;
        file.flush()?;
        Ok(copied)
    }

    fn delete(&self, path: &PathBuf) -> DfsResult<()> {
        if path.is_dir() {
            fs::remove_dir_all(path)?;
        } else {
            fs::remove_file(path)?;
        }
        Ok(())
    }
}

fn copy_bytes(
    reader: &mut dyn Read,
    writer: &mut dyn Write,
    buffer_size: usize,
) -> io::Result<u64> {
    let mut buf = vec![0u8; buffer_size.max(1)];
    let mut total = 0u64;
    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        writer.write_all(&buf[..n])?;
        total += n as u64;
    }
    Ok(total)
}

/// Final destination: inside `dst` when it is a directory, `dst` otherwise.
///
/// The source name is appended one level only. A resolved target that is an
/// existing directory is rejected, so trees are never merged.
fn resolve_destination<D: Endpoint>(
    src_name: &str,
    dst_ep: &D,
    dst: &D::Path,
    overwrite: bool,
) -> DfsResult<D::Path> {
    let already_exists = |path: &D::Path| DfsError::AlreadyExists {
        path: D::describe(path),
    };
    match dst_ep.kind(dst)? {
        Some(FileKind::Directory) => {
            if src_name.is_empty() {
                return Err(DfsError::InvalidArgument(
                    "cannot copy the root directory".to_string(),
                ));
            }
            let nested = dst_ep.join(dst, src_name)?;
            match dst_ep.kind(&nested)? {
                Some(FileKind::Directory) => Err(DfsError::IsADirectory {
                    path: D::describe(&nested),
                }),
                Some(FileKind::File) if !overwrite => Err(already_exists(&nested)),
                _ => Ok(nested),
            }
        }
        Some(FileKind::File) if !overwrite => Err(already_exists(dst)),
        _ => Ok(dst.clone()),
    }
}

fn copy_resolved<S: Endpoint, D: Endpoint>(
    src_ep: &S,
    src: &S::Path,
    kind: FileKind,
    dst_ep: &D,
    target: &D::Path,
    options: &CopyOptions,
) -> DfsResult<u64> {
    match kind {
        FileKind::Directory => {
            match dst_ep.kind(target)? {
                Some(FileKind::Directory) => {
                    return Err(DfsError::IsADirectory {
                        path: D::describe(target),
                    })
                }
                Some(FileKind::File) => {
                    return Err(DfsError::NotADirectory {
                        path: D::describe(target),
                    })
                }
                None => dst_ep.mkdirs(target)?,
            }
            let mut total = 0;
            for (child, child_kind) in src_ep.children(src)? {
                let child_target = dst_ep.join(target, &src_ep.name(&child)?)?;
                if child_kind == FileKind::File
                    && !options.overwrite
                    && dst_ep.kind(&child_target)?.is_some()
                {
                    return Err(DfsError::AlreadyExists {
                        path: D::describe(&child_target),
                    });
                }
                total +=
                    copy_resolved(src_ep, &child, child_kind, dst_ep, &child_target, options)?;
            }
            Ok(total)
        }
        FileKind::File => {
            if dst_ep.kind(target)? == Some(FileKind::Directory) {
                return Err(DfsError::IsADirectory {
                    path: D::describe(target),
                });
            }
            let mut reader = src_ep.open(src)?;
            dst_ep.write_file(target, &mut *reader, options.buffer_size)
        }
    }
}

fn source_kind<S: Endpoint>(src_ep: &S, src: &S::Path) -> DfsResult<FileKind> {
    src_ep
        .kind(src)?
        .ok_or_else(|| DfsError::not_found(S::describe(src)))
}

/// Copies `src` from one endpoint to another.
pub(crate) fn copy<S: Endpoint, D: Endpoint>(
    src_ep: &S,
    src: &S::Path,
    dst_ep: &D,
    dst: &D::Path,
    options: &CopyOptions,
) -> DfsResult<u64> {
    let kind = source_kind(src_ep, src)?;
    let target = resolve_destination(&src_ep.name(src)?, dst_ep, dst, options.overwrite)?;
    let copied = copy_resolved(src_ep, src, kind, dst_ep, &target, options)?;
    if options.delete_source {
        src_ep.delete(src)?;
    }
    debug!(
        src = %S::describe(src),
        dst = %D::describe(&target),
        bytes = copied,
        "copy finished"
    );
    Ok(copied)
}

/// Copies within one remote filesystem, refusing to copy a directory into
/// its own subtree.
pub(crate) fn copy_within(
    remote: &Remote<'_>,
    src: &DfsPath,
    dst: &DfsPath,
    options: &CopyOptions,
) -> DfsResult<u64> {
    let kind = source_kind(remote, src)?;
    let target = resolve_destination(src.name(), remote, dst, options.overwrite)?;
    if kind == FileKind::Directory && (*src == target || src.is_ancestor_of(&target)) {
        return Err(DfsError::InvalidArgument(format!(
            "cannot copy {} into itself ({})",
            src, target
        )));
    }
    let copied = copy_resolved(remote, src, kind, remote, &target, options)?;
    debug!(src = %src, dst = %target, bytes = copied, "remote copy finished");
    Ok(copied)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use tempfile::TempDir;

    use crate::identity::UserIdentity;
    use crate::memory::{MemoryFileSystem, MemoryNamespace};

    fn p(s: &str) -> DfsPath {
        DfsPath::parse(s).unwrap()
    }

    fn handle() -> MemoryFileSystem {
        let ns = Arc::new(MemoryNamespace::new("hopsfs://nn:8020", "hdfs").unwrap());
        MemoryNamespace::connect_as(&ns, &UserIdentity::new("hdfs").unwrap()).unwrap()
    }

    fn options(overwrite: bool) -> CopyOptions {
        CopyOptions {
            overwrite,
            delete_source: false,
            buffer_size: 3,
        }
    }

    fn put(fs: &MemoryFileSystem, path: &str, content: &[u8]) {
        let remote = Remote { fs, umask: 0o022 };
        remote.write_file(&p(path), &mut &content[..], 16).unwrap();
    }

    fn get(fs: &MemoryFileSystem, path: &str) -> Vec<u8> {
        let mut buf = Vec::new();
        fs.open(&p(path)).unwrap().read_to_end(&mut buf).unwrap();
        buf
    }

    #[test]
    fn test_copy_bytes_small_buffer() {
        let mut out = Vec::new();
        let n = copy_bytes(&mut &b"abcdefgh"[..], &mut out, 3).unwrap();
        assert_eq!(n, 8);
        assert_eq!(out, b"abcdefgh");
    }

    #[test]
    fn test_remote_write_creates_parents_with_umask() {
        let fs = handle();
        put(&fs, "/a/b/f", b"data");
        let dir = fs.get_file_status(&p("/a/b")).unwrap();
        assert_eq!(dir.permission.to_mode(), 0o755);
        let file = fs.get_file_status(&p("/a/b/f")).unwrap();
        assert_eq!(file.permission.to_mode(), 0o644);
    }

    #[test]
    fn test_copy_within_file_to_new_path() {
        let fs = handle();
        put(&fs, "/src/f", b"payload");
        let remote = Remote { fs: &fs, umask: 0o022 };
        copy_within(&remote, &p("/src/f"), &p("/dst/g"), &options(false)).unwrap();
        assert_eq!(get(&fs, "/dst/g"), b"payload");
    }

    #[test]
    fn test_copy_within_into_directory() {
        let fs = handle();
        put(&fs, "/src/f", b"payload");
        fs.mkdirs(&p("/dst"), FsPermission::dir_default()).unwrap();
        let remote = Remote { fs: &fs, umask: 0o022 };
        copy_within(&remote, &p("/src/f"), &p("/dst"), &options(false)).unwrap();
        assert_eq!(get(&fs, "/dst/f"), b"payload");
    }

    #[test]
    fn test_copy_within_refuses_overwrite() {
        let fs = handle();
        put(&fs, "/src/f", b"new");
        put(&fs, "/dst/f", b"old");
        let remote = Remote { fs: &fs, umask: 0o022 };
        let err = copy_within(&remote, &p("/src/f"), &p("/dst"), &options(false)).unwrap_err();
        assert!(matches!(err, DfsError::AlreadyExists { .. }));
        assert_eq!(get(&fs, "/dst/f"), b"old");
    }

    #[test]
    fn test_copy_within_directory_recursive() {
        let fs = handle();
        put(&fs, "/src/a", b"1");
        put(&fs, "/src/sub/b", b"22");
        let remote = Remote { fs: &fs, umask: 0o022 };
        let copied = copy_within(&remote, &p("/src"), &p("/backup"), &options(false)).unwrap();
        assert_eq!(copied, 3);
        assert_eq!(get(&fs, "/backup/a"), b"1");
        assert_eq!(get(&fs, "/backup/sub/b"), b"22");
        assert!(fs.exists(&p("/src/sub/b")).unwrap());
    }

    #[test]
    fn test_copy_within_rejects_existing_directory_of_same_name() {
        let fs = handle();
        put(&fs, "/src/new.txt", b"new");
        put(&fs, "/dst/src/old.txt", b"old");
        let remote = Remote { fs: &fs, umask: 0o022 };
        for overwrite in [false, true] {
            let err =
                copy_within(&remote, &p("/src"), &p("/dst"), &options(overwrite)).unwrap_err();
            assert!(matches!(err, DfsError::IsADirectory { ref path } if path == "/dst/src"));
        }
        assert!(!fs.exists(&p("/dst/src/new.txt")).unwrap());
        assert_eq!(get(&fs, "/dst/src/old.txt"), b"old");
    }

    #[test]
    fn test_local_directory_into_existing_remote_directory_of_same_name() {
        let fs = handle();
        put(&fs, "/upload/in/keep.txt", b"keep");
        let tmp = TempDir::new().unwrap();
        let local_src = tmp.path().join("in");
        fs::create_dir_all(&local_src).unwrap();
        fs::write(local_src.join("one.txt"), b"one").unwrap();

        let remote = Remote { fs: &fs, umask: 0o022 };
        let err = copy(&Local, &local_src, &remote, &p("/upload"), &options(true)).unwrap_err();
        assert!(matches!(err, DfsError::IsADirectory { .. }));
        assert!(!fs.exists(&p("/upload/in/one.txt")).unwrap());
    }

    #[test]
    fn test_copy_within_into_itself() {
        let fs = handle();
        put(&fs, "/src/a", b"1");
        let remote = Remote { fs: &fs, umask: 0o022 };
        let err = copy_within(&remote, &p("/src"), &p("/src"), &options(false)).unwrap_err();
        assert!(err.is_invalid_argument());
    }

    #[test]
    fn test_copy_missing_source() {
        let fs = handle();
        let remote = Remote { fs: &fs, umask: 0o022 };
        let err = copy_within(&remote, &p("/nope"), &p("/dst"), &options(false)).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_local_to_remote_and_back() {
        let fs = handle();
        let tmp = TempDir::new().unwrap();
        let local_src = tmp.path().join("in");
        fs::create_dir_all(local_src.join("nested")).unwrap();
        fs::write(local_src.join("one.txt"), b"one").unwrap();
        fs::write(local_src.join("nested/two.txt"), b"two").unwrap();

        let remote = Remote { fs: &fs, umask: 0o022 };
        copy(&Local, &local_src, &remote, &p("/upload"), &options(true)).unwrap();
        assert_eq!(get(&fs, "/upload/one.txt"), b"one");
        assert_eq!(get(&fs, "/upload/nested/two.txt"), b"two");

        let local_dst = tmp.path().join("out");
        copy(&remote, &p("/upload"), &Local, &local_dst, &options(true)).unwrap();
        assert_eq!(fs::read(local_dst.join("nested/two.txt")).unwrap(), b"two");
    }

    #[test]
    fn test_local_to_remote_delete_source() {
        let fs = handle();
        let tmp = TempDir::new().unwrap();
        let local_src = tmp.path().join("file.csv");
        fs::write(&local_src, b"a,b").unwrap();

        let remote = Remote { fs: &fs, umask: 0o022 };
        let opts = CopyOptions {
            delete_source: true,
            ..options(true)
        };
        copy(&Local, &local_src, &remote, &p("/in/file.csv"), &opts).unwrap();
        assert_eq!(get(&fs, "/in/file.csv"), b"a,b");
        assert!(!local_src.exists());
    }
}
