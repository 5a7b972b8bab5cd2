use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{info, warn};
use walkdir::WalkDir;

use crate::error::Error;

/// Creates a copy of a directory before anything inside it is rewritten.
pub trait BackupManager {
    /// Copies `parent/name` and returns the location of the copy.
    fn create_backup(&self, parent: &Path, name: &str, recursive: bool) -> Result<PathBuf, Error>;
}

/// Keeps numbered sibling copies `<name>.1` (newest) to `<name>.<retention>`.
#[derive(Debug, Clone)]
pub struct VersionedBackup {
    retention: usize,
}

impl VersionedBackup {
    pub fn new(retention: usize) -> Self {
        Self {
            retention: retention.max(1),
        }
    }

    pub fn retention(&self) -> usize {
        self.retention
    }

    /// Shifts `<name>.N` to `<name>.N+1`, dropping the copy that would fall
    /// beyond the retention limit.
    fn rotate(&self, parent: &Path, name: &str) -> Result<(), Error> {
        let oldest = backup_path(parent, name, self.retention);
        if oldest.exists() {
            fs::remove_dir_all(&oldest).map_err(|e| Error::io(&oldest, e))?;
        }
        for version in (1..self.retention).rev() {
            let from = backup_path(parent, name, version);
            if from.exists() {
                let to = backup_path(parent, name, version + 1);
                fs::rename(&from, &to).map_err(|e| Error::io(&from, e))?;
            }
        }
        Ok(())
    }
}

impl BackupManager for VersionedBackup {
    fn create_backup(&self, parent: &Path, name: &str, recursive: bool) -> Result<PathBuf, Error> {
        let source = parent.join(name);
        if !source.is_dir() {
            return Err(Error::io(
                &source,
                io::Error::new(io::ErrorKind::NotFound, "directory to back up does not exist"),
            ));
        }

        // Existing copies are only rotated once the new one is complete.
        let staging = staging_path(parent, name);
        if staging.is_dir() {
            fs::remove_dir_all(&staging).map_err(|e| Error::io(&staging, e))?;
        }

        let files = match copy_tree(&source, &staging, recursive) {
            Ok(files) => files,
            Err(err) => {
                if staging.is_dir() {
                    if let Err(cleanup) = fs::remove_dir_all(&staging) {
                        warn!(
                            "Could not remove incomplete backup {}: {}",
                            staging.display(),
                            cleanup
                        );
                    }
                }
                return Err(err);
            }
        };

        self.rotate(parent, name)?;

        let target = backup_path(parent, name, 1);
        fs::rename(&staging, &target).map_err(|e| Error::io(&staging, e))?;
        info!("Backed up {} files to {}", files, target.display());
        Ok(target)
    }
}

pub fn backup_path(parent: &Path, name: &str, version: usize) -> PathBuf {
    parent.join(format!("{}.{}", name, version))
}

/// Where a copy is assembled before it becomes `<name>.1`.
pub fn staging_path(parent: &Path, name: &str) -> PathBuf {
    parent.join(format!("{}.tmp", name))
}

/// Copies `source` into `target`, returning the number of files copied.
/// Symlinks are skipped.
fn copy_tree(source: &Path, target: &Path, recursive: bool) -> Result<usize, Error> {
    let max_depth = if recursive { usize::MAX } else { 1 };
    let mut copied = 0;

    for entry in WalkDir::new(source).max_depth(max_depth) {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(source).to_path_buf();
            Error::backup(path, e.to_string())
        })?;

        let relative = entry
            .path()
            .strip_prefix(source)
            .map_err(|e| Error::backup(entry.path(), e.to_string()))?;
        let destination = target.join(relative);
        let file_type = entry.file_type();

        if file_type.is_dir() {
            if entry.depth() > 0 && !recursive {
                continue;
            }
            fs::create_dir_all(&destination).map_err(|e| Error::io(&destination, e))?;
        } else if file_type.is_file() {
            fs::copy(entry.path(), &destination).map_err(|e| Error::io(entry.path(), e))?;
            copied += 1;
        } else {
            warn!("Skipping {} in backup", entry.path().display());
        }
    }

    Ok(copied)
}
