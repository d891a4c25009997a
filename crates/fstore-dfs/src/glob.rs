//! Glob expansion of remote paths.
//!
//! Each segment is matched on its own, so `*` never crosses a `/`. A path
//! without metacharacters expands to itself whether or not it exists.

use glob::Pattern;
use tracing::debug;

use crate::client::DistributedFileSystem;
use crate::error::{DfsError, DfsResult};
use crate::path::DfsPath;

fn is_glob_segment(segment: &str) -> bool {
    segment.contains(['*', '?', '['])
}

/// Expands `pattern` against `fs`; the result is sorted and unqualified.
pub fn expand(fs: &dyn DistributedFileSystem, pattern: &DfsPath) -> DfsResult<Vec<DfsPath>> {
    let pattern = pattern.unqualified();
    if !pattern.has_glob() {
        return Ok(vec![pattern]);
    }

    let segments: Vec<&str> = pattern.segments().collect();
    let mut candidates = vec![DfsPath::root()];
    for (idx, segment) in segments.iter().enumerate() {
        let last = idx + 1 == segments.len();
        let mut next = Vec::new();

        if is_glob_segment(segment) {
            let matcher = Pattern::new(segment).map_err(|e| {
                DfsError::InvalidArgument(format!("invalid glob pattern '{}': {}", segment, e))
            })?;
            for dir in &candidates {
                for status in fs.list_status(dir)? {
                    if !last && !status.is_dir() {
                        continue;
                    }
                    let name = status.path.name();
                    if matcher.matches(name) {
                        next.push(dir.join(name)?);
                    }
                }
            }
        } else {
            for dir in &candidates {
                let child = dir.join(segment)?;
                match fs.get_file_status(&child) {
                    Ok(status) if last || status.is_dir() => next.push(child),
                    Ok(_) => {}
                    Err(e) if e.is_not_found() => {}
                    Err(e) => return Err(e),
                }
            }
        }

        candidates = next;
        if candidates.is_empty() {
            break;
        }
    }

    candidates.sort();
    candidates.dedup();
    debug!(pattern = %pattern, matches = candidates.len(), "glob expanded");
    Ok(candidates)
}
