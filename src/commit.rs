//! Atomic commit of validated configuration
//!
//! Bytes go to a hidden temp file next to the destination, are synced, and
//! the temp file is renamed over the destination. Readers see the old file or
//! the new one, never a partial write.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::config::BuiltinDefaults;

#[derive(Debug, Error)]
pub enum CommitError {
    #[error("invalid destination: {}", .0.display())]
    InvalidDestination(PathBuf),

    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

fn io_err(path: &Path) -> impl FnOnce(io::Error) -> CommitError + '_ {
    move |source| CommitError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// What was written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitReceipt {
    pub path: PathBuf,
    pub len: u64,
    pub sha256: String,
    pub committed_at: DateTime<Utc>,
}

/// Compute SHA-256 of bytes and return hex string
pub fn compute_sha256(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Writes whole files via temp-and-rename.
#[derive(Debug, Clone, Copy)]
pub struct AtomicCommitter {
    file_mode: u32,
}

impl Default for AtomicCommitter {
    fn default() -> Self {
        Self::new(BuiltinDefaults::default().file_mode)
    }
}

impl AtomicCommitter {
    pub fn new(file_mode: u32) -> Self {
        Self { file_mode }
    }

    pub fn file_mode(&self) -> u32 {
        self.file_mode
    }

    pub fn commit(&self, dest: &Path, bytes: &[u8]) -> Result<CommitReceipt, CommitError> {
        let file_name = dest
            .file_name()
            .and_then(|n| n.to_str())
            .filter(|n| !n.is_empty())
            .ok_or_else(|| CommitError::InvalidDestination(dest.to_path_buf()))?;
        if dest.is_dir() {
            return Err(CommitError::InvalidDestination(dest.to_path_buf()));
        }
        let dir = match dest.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };

        let temp_path = dir.join(format!(
            ".{}.{}.tmp",
            file_name,
            uuid::Uuid::new_v4().simple()
        ));
        let guard = TempGuard::new(temp_path.clone());

        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&temp_path)
            .map_err(io_err(&temp_path))?;
        file.write_all(bytes).map_err(io_err(&temp_path))?;
        file.sync_all().map_err(io_err(&temp_path))?;
        self.set_mode(&file, &temp_path)?;
        drop(file);

        fs::rename(&temp_path, dest).map_err(io_err(dest))?;
        guard.disarm();
        sync_dir(&dir);

        tracing::debug!(path = %dest.display(), bytes = bytes.len(), "committed");

        Ok(CommitReceipt {
            path: dest.to_path_buf(),
            len: bytes.len() as u64,
            sha256: compute_sha256(bytes),
            committed_at: Utc::now(),
        })
    }

    #[cfg(unix)]
    fn set_mode(&self, file: &File, path: &Path) -> Result<(), CommitError> {
        use std::os::unix::fs::PermissionsExt;
        file.set_permissions(fs::Permissions::from_mode(self.file_mode))
            .map_err(io_err(path))
    }

    #[cfg(not(unix))]
    fn set_mode(&self, _file: &File, _path: &Path) -> Result<(), CommitError> {
        Ok(())
    }
}

/// Removes the temp file unless the rename went through.
struct TempGuard {
    path: Option<PathBuf>,
}

impl TempGuard {
    fn new(path: PathBuf) -> Self {
        Self { path: Some(path) }
    }

    fn disarm(mut self) {
        self.path = None;
    }
}

impl Drop for TempGuard {
    fn drop(&mut self) {
        if let Some(path) = self.path.take() {
            if let Err(e) = fs::remove_file(&path) {
                if e.kind() != io::ErrorKind::NotFound {
                    tracing::warn!(path = %path.display(), error = %e, "failed to remove temp file");
                }
            }
        }
    }
}

// Best effort; some filesystems refuse to open directories.
#[cfg(unix)]
fn sync_dir(dir: &Path) {
    if let Ok(handle) = File::open(dir) {
        let _ = handle.sync_all();
    }
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) {}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn leftovers(dir: &Path) -> Vec<String> {
        fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .filter(|n| n.ends_with(".tmp"))
            .collect()
    }

    #[test]
    fn test_commit_new_file() {
        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("config.json");

        let receipt = AtomicCommitter::default().commit(&dest, b"{}").unwrap();
        assert_eq!(fs::read(&dest).unwrap(), b"{}");
        assert_eq!(receipt.len, 2);
        assert_eq!(receipt.sha256, compute_sha256(b"{}"));
        assert!(leftovers(dir.path()).is_empty());
    }

    #[test]
    fn test_commit_replaces_existing() {
        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("config.json");
        fs::write(&dest, b"old").unwrap();

        AtomicCommitter::default().commit(&dest, b"new content").unwrap();
        assert_eq!(fs::read(&dest).unwrap(), b"new content");
        assert!(leftovers(dir.path()).is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn test_commit_sets_mode() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("config.json");
        AtomicCommitter::new(0o600).commit(&dest, b"{}").unwrap();
        let mode = fs::metadata(&dest).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn test_missing_parent_directory() {
        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("missing").join("config.json");
        let err = AtomicCommitter::default().commit(&dest, b"{}").unwrap_err();
        assert!(matches!(err, CommitError::Io { .. }));
        assert!(!dest.exists());
    }

    #[test]
    fn test_directory_destination_rejected() {
        let dir = TempDir::new().unwrap();
        let err = AtomicCommitter::default().commit(dir.path(), b"{}").unwrap_err();
        assert!(matches!(err, CommitError::InvalidDestination(_)));
        assert!(leftovers(dir.path()).is_empty());
    }

    #[test]
    fn test_compute_sha256() {
        assert_eq!(
            compute_sha256(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }
}
