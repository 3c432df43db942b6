//! Byte-level read/write primitive behind the bridge.
//!
//! - [`FsStore`]: direct filesystem access for `file://` handles and plain paths
//! - [`MemoryStore`]: in-process map, for hosts that route bytes elsewhere and for tests
//!
//! Document-provider handles (`content://`) are served by the Tauri platform,
//! which goes through tauri-plugin-fs instead.

use std::collections::HashMap;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tempfile::NamedTempFile;

use crate::types::ResourceHandle;

/// Blocking byte I/O. The bridge calls it from `spawn_blocking`, never from
/// the task that owns the pending calls.
pub trait ByteStore: Send + Sync {
    /// Replace the contents behind `handle` with `bytes`
    fn write(&self, handle: &ResourceHandle, bytes: &[u8]) -> io::Result<()>;

    /// Read the whole file at `path`
    fn read(&self, path: &str) -> io::Result<Vec<u8>>;
}

/// Store handle shared between the bridge task and its blocking I/O jobs
pub type SharedStore = Arc<dyn ByteStore>;

/// Resolve a handle to a local path. Only `file://` and plain paths qualify.
pub fn local_path(handle: &ResourceHandle) -> io::Result<PathBuf> {
    let raw = handle.as_str();
    if raw.starts_with("file://") || !raw.contains("://") {
        Ok(PathBuf::from(handle.path()))
    } else {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            format!("not a local file handle: {}", raw),
        ))
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct FsStore;

impl ByteStore for FsStore {
    fn write(&self, handle: &ResourceHandle, bytes: &[u8]) -> io::Result<()> {
        let path = local_path(handle)?;
        write_atomic(&path, bytes)
    }

    fn read(&self, path: &str) -> io::Result<Vec<u8>> {
        std::fs::read(path)
    }
}

/// Write to a uniquely named temp file next to the target, then rename over it.
/// The destination is user-chosen, so the temp name must never collide with a
/// sibling file. Rename can fail on Windows when the file is locked; fall back
/// to a direct write.
fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut temp = NamedTempFile::new_in(dir)?;
    temp.write_all(bytes)?;
    temp.as_file().sync_all()?;

    if let Err(e) = temp.persist(path) {
        tracing::debug!(path = %path.display(), error = %e.error, "rename failed, writing in place");
        // Dropping the returned temp file removes it
        drop(e.file);
        std::fs::write(path, bytes)?;
    }
    Ok(())
}

/// Shared in-memory store keyed by handle string.
///
/// Clones share the same map, so a host (or a test) can keep one clone and
/// inspect what the bridge wrote.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    files: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    fail_writes: Arc<Mutex<bool>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, key: impl Into<String>, bytes: impl Into<Vec<u8>>) {
        if let Ok(mut files) = self.files.lock() {
            files.insert(key.into(), bytes.into());
        }
    }

    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.files.lock().ok().and_then(|files| files.get(key).cloned())
    }

    /// Make every following write fail, to simulate a revoked document
    pub fn set_fail_writes(&self, fail: bool) {
        if let Ok(mut flag) = self.fail_writes.lock() {
            *flag = fail;
        }
    }

    fn lock_files(&self) -> io::Result<std::sync::MutexGuard<'_, HashMap<String, Vec<u8>>>> {
        self.files
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "memory store poisoned"))
    }
}

impl ByteStore for MemoryStore {
    fn write(&self, handle: &ResourceHandle, bytes: &[u8]) -> io::Result<()> {
        if self.fail_writes.lock().map(|flag| *flag).unwrap_or(false) {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                "Failed to open output stream",
            ));
        }
        self.lock_files()?.insert(handle.as_str().to_string(), bytes.to_vec());
        Ok(())
    }

    fn read(&self, path: &str) -> io::Result<Vec<u8>> {
        self.lock_files()?
            .get(path)
            .cloned()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, format!("{} not found", path)))
    }
}
