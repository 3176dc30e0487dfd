//! Atomic JSON file operations.
//!
//! One JSON document per file. Writes go through a temporary sibling file,
//! `fsync` and rename; read-modify-write cycles hold an exclusive lock file.

use serde::{Serialize, de::DeserializeOwned};
use std::fs::{self, File, OpenOptions};
use std::io::Write as IoWrite;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AtomicJsonError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("JSON error in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("Lock error on {path}: {message}")]
    Lock { path: PathBuf, message: String },
}

/// A handle to a JSON file with atomic replace semantics.
///
/// - **Atomicity**: tmp file + rename, so readers see the old or the new
///   document, never a torn one
/// - **Isolation**: `update`, `create_new` and `remove` serialise on an
///   exclusive `fs2` lock
/// - **Durability**: explicit fsync before rename
pub struct AtomicJsonFile<T> {
    path: PathBuf,
    _phantom: PhantomData<T>,
}

impl<T> AtomicJsonFile<T>
where
    T: Serialize + DeserializeOwned,
{
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            _phantom: PhantomData,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the document; `None` when the file is missing or empty.
    pub fn load(&self) -> Result<Option<T>, AtomicJsonError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(self.io_error(e)),
        };

        if content.trim().is_empty() {
            return Ok(None);
        }

        serde_json::from_str(&content)
            .map(Some)
            .map_err(|source| AtomicJsonError::Json {
                path: self.path.clone(),
                source,
            })
    }

    /// Replaces the document unconditionally.
    pub fn save(&self, data: &T) -> Result<(), AtomicJsonError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| self.io_error(e))?;
        }

        let json = serde_json::to_string_pretty(data).map_err(|source| AtomicJsonError::Json {
            path: self.path.clone(),
            source,
        })?;

        let tmp_path = self.temp_path();
        let mut tmp_file = File::create(&tmp_path).map_err(|e| self.io_error(e))?;
        tmp_file
            .write_all(json.as_bytes())
            .and_then(|_| tmp_file.sync_all())
            .map_err(|e| self.io_error(e))?;
        drop(tmp_file);

        fs::rename(&tmp_path, &self.path).map_err(|e| self.io_error(e))
    }

    /// Writes `data` only if no document exists yet. Returns whether it was
    /// written.
    pub fn create_new(&self, data: &T) -> Result<bool, AtomicJsonError> {
        let _lock = self.acquire_lock()?;
        if self.load()?.is_some() {
            return Ok(false);
        }
        self.save(data)?;
        Ok(true)
    }

    /// Read-modify-write of an existing document under the lock.
    ///
    /// Returns `Ok(false)` without calling `f` when there is no document. An
    /// error from `f` aborts the write.
    pub fn update<F, E>(&self, f: F) -> Result<bool, E>
    where
        F: FnOnce(&mut T) -> Result<(), E>,
        E: From<AtomicJsonError>,
    {
        let _lock = self.acquire_lock()?;
        let Some(mut data) = self.load()? else {
            return Ok(false);
        };
        f(&mut data)?;
        self.save(&data)?;
        Ok(true)
    }

    /// Deletes the document. Returns whether it existed.
    ///
    /// The lock file is left in place; a waiter still blocked on it must keep
    /// contending with later writers of the same path.
    pub fn remove(&self) -> Result<bool, AtomicJsonError> {
        let _lock = self.acquire_lock()?;
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(self.io_error(e)),
        }
    }

    fn temp_path(&self) -> PathBuf {
        self.sibling("tmp")
    }

    fn sibling(&self, suffix: &str) -> PathBuf {
        let name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.path.with_file_name(format!(".{name}.{suffix}"))
    }

    fn acquire_lock(&self) -> Result<FileLock, AtomicJsonError> {
        FileLock::acquire(self.sibling("lock"))
    }

    fn io_error(&self, source: std::io::Error) -> AtomicJsonError {
        AtomicJsonError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

/// Exclusive lock held for the guard's lifetime.
///
/// Lock files are never deleted, so every locker of a path contends on the
/// same inode.
struct FileLock {
    file: File,
}

impl FileLock {
    fn acquire(lock_path: PathBuf) -> Result<Self, AtomicJsonError> {
        if let Some(parent) = lock_path.parent() {
            fs::create_dir_all(parent).map_err(|source| AtomicJsonError::Io {
                path: lock_path.clone(),
                source,
            })?;
        }

        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)
            .map_err(|source| AtomicJsonError::Io {
                path: lock_path.clone(),
                source,
            })?;

        fs2::FileExt::lock_exclusive(&file).map_err(|e| AtomicJsonError::Lock {
            path: lock_path.clone(),
            message: e.to_string(),
        })?;

        Ok(FileLock { file })
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        let _ = fs2::FileExt::unlock(&self.file);
    }
}
