//! File locking and atomic writes for the task store
//!
//! - Advisory file locks (fs2/flock) on `<file>.lock` siblings
//! - Atomic write pattern (temp file in the same directory + rename)
//! - Lock timeout with a fixed retry interval

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use fs2::FileExt;
use tempfile::NamedTempFile;

use crate::error::{Error, Result};

/// Default lock timeout in milliseconds
pub const DEFAULT_LOCK_TIMEOUT_MS: u64 = 5000;

const LOCK_RETRY_INTERVAL_MS: u64 = 50;

fn is_lock_contended(err: &io::Error) -> bool {
    if err.kind() == io::ErrorKind::WouldBlock {
        return true;
    }

    // Windows reports sharing/lock violations as raw OS errors.
    #[cfg(windows)]
    {
        matches!(err.raw_os_error(), Some(32) | Some(33))
    }
    #[cfg(not(windows))]
    {
        false
    }
}

/// A file lock guard that releases the lock when dropped
#[derive(Debug)]
pub struct FileLock {
    file: File,
    path: PathBuf,
}

impl FileLock {
    /// Acquire an exclusive lock on `path`, creating it if needed.
    ///
    /// Fails with [`Error::LockFailed`] once `timeout_ms` elapses.
    pub fn acquire(path: impl AsRef<Path>, timeout_ms: u64) -> Result<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;

        let start = Instant::now();
        let timeout = Duration::from_millis(timeout_ms);
        let retry_interval = Duration::from_millis(LOCK_RETRY_INTERVAL_MS);

        loop {
            match file.try_lock_exclusive() {
                Ok(()) => {
                    return Ok(FileLock {
                        file,
                        path: path.to_path_buf(),
                    });
                }
                Err(e) if is_lock_contended(&e) => {
                    if start.elapsed() >= timeout {
                        return Err(Error::LockFailed(path.to_path_buf()));
                    }
                    std::thread::sleep(retry_interval);
                }
                Err(e) => return Err(Error::Io(e)),
            }
        }
    }

    /// Get the path to the locked file
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}

/// Sibling lock file guarding `path`
pub fn lock_path_for(path: &Path) -> PathBuf {
    PathBuf::from(format!("{}.lock", path.display()))
}

/// Atomically replace the contents of `path`.
///
/// Readers see either the old contents or the new ones, never a mix.
/// Does not lock; see [`write_atomic_locked`].
pub fn write_atomic(path: impl AsRef<Path>, data: &[u8]) -> Result<()> {
    let path = path.as_ref();
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&parent)?;

    let mut temp = NamedTempFile::new_in(&parent)?;
    temp.write_all(data)?;
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|err| Error::Io(err.error))?;

    Ok(())
}

/// Write atomically while holding `<path>.lock`.
pub fn write_atomic_locked(path: impl AsRef<Path>, data: &[u8], timeout_ms: u64) -> Result<()> {
    let path = path.as_ref();
    let _lock = FileLock::acquire(lock_path_for(path), timeout_ms)?;
    write_atomic(path, data)
}

/// Read a UTF-8 file while holding `<path>.lock`.
pub fn read_locked_str(path: impl AsRef<Path>, timeout_ms: u64) -> Result<String> {
    let path = path.as_ref();
    let _lock = FileLock::acquire(lock_path_for(path), timeout_ms)?;
    read_str(path)
}

/// Read a UTF-8 file without locking; the caller holds `<path>.lock`.
pub fn read_str(path: impl AsRef<Path>) -> Result<String> {
    let data = fs::read(path.as_ref())?;
    String::from_utf8(data).map_err(|e| Error::OperationFailed(format!("Invalid UTF-8: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lock_is_exclusive_until_dropped() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("todos.json.lock");

        let first = FileLock::acquire(&path, 100).expect("first lock");
        assert_eq!(first.path(), path.as_path());
        let err = FileLock::acquire(&path, 100).err().expect("second lock should time out");
        assert!(matches!(err, Error::LockFailed(_)));

        drop(first);
        FileLock::acquire(&path, 100).expect("lock after release");
    }

    #[test]
    fn atomic_write_replaces_contents() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("todos.json");

        write_atomic(&path, b"[]").expect("first write");
        write_atomic(&path, b"[1]").expect("second write");
        assert_eq!(fs::read_to_string(&path).expect("read"), "[1]");

        let leftovers: Vec<_> = fs::read_dir(path.parent().unwrap())
            .expect("list")
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_name() != "todos.json")
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn locked_round_trip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("todos.json");
        write_atomic_locked(&path, "héllo".as_bytes(), DEFAULT_LOCK_TIMEOUT_MS).expect("write");
        assert_eq!(
            read_locked_str(&path, DEFAULT_LOCK_TIMEOUT_MS).expect("read"),
            "héllo"
        );
        assert!(dir.path().join("todos.json.lock").exists());
    }
}
