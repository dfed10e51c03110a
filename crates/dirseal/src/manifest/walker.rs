//! Recursive enumeration of the regular files under a container root.

use crate::{Error, Result};
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use walkdir::WalkDir;

/// A regular file found under the walk root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalkedFile {
    pub absolute_path: PathBuf,
    /// Root-relative path with `/` separators.
    pub relative_path: String,
}

/// Enumerate every regular file under `root`, recursing into subdirectories.
///
/// Symbolic links are not followed. A symlink, device node, socket or FIFO
/// fails the walk, as does a name that is not valid UTF-8. Nothing is
/// silently skipped.
///
/// Order is whatever the file system yields; callers that need a stable order
/// must sort.
///
/// # Errors
///
/// - [`Error::RootNotFound`] if `root` does not exist or is not a directory
/// - [`Error::FileUnreadable`] if a directory cannot be listed
/// - [`Error::UnsupportedEntry`] for non-regular files and non-UTF-8 names
pub fn walk(root: &Path) -> Result<Vec<WalkedFile>> {
    let is_dir = fs::metadata(root).map(|m| m.is_dir()).unwrap_or(false);
    if !is_dir {
        return Err(Error::RootNotFound {
            path: root.to_path_buf(),
        });
    }

    let mut files = Vec::new();

    for entry in WalkDir::new(root).follow_links(false).min_depth(1) {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(root).to_path_buf();
            Error::FileUnreadable {
                path,
                source: io::Error::from(e),
            }
        })?;

        let file_type = entry.file_type();
        if file_type.is_dir() {
            continue;
        }

        let path = entry.path();
        if file_type.is_symlink() {
            return Err(Error::UnsupportedEntry {
                path: path.to_path_buf(),
                reason: "symbolic links are not supported",
            });
        }
        if !file_type.is_file() {
            return Err(Error::UnsupportedEntry {
                path: path.to_path_buf(),
                reason: "not a regular file",
            });
        }

        files.push(WalkedFile {
            absolute_path: path.to_path_buf(),
            relative_path: relative_path(root, path)?,
        });
    }

    Ok(files)
}

/// Strip `root` from `path` and join the remaining components with `/`.
pub(crate) fn relative_path(root: &Path, path: &Path) -> Result<String> {
    let relative = path.strip_prefix(root).map_err(|_| Error::UnsupportedEntry {
        path: path.to_path_buf(),
        reason: "path is outside the walk root",
    })?;

    let mut parts = Vec::new();
    for component in relative.components() {
        match component {
            Component::Normal(name) => {
                let name = name.to_str().ok_or_else(|| Error::UnsupportedEntry {
                    path: path.to_path_buf(),
                    reason: "file name is not valid UTF-8",
                })?;
                parts.push(name);
            }
            _ => {
                return Err(Error::UnsupportedEntry {
                    path: path.to_path_buf(),
                    reason: "path has a non-normal component",
                })
            }
        }
    }

    Ok(parts.join("/"))
}
