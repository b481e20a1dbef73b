//! Filesystem-backed [`Cache`]: one regular file per key.
//!
//! ```text
//! <dir>/
//! ├── 3f1c…e9   (raw HTTP/1.1 response dump)
//! └── a07b…41
//! ```
//!
//! There is no locking and no atomic replace. Two concurrent `set` calls for
//! the same key race at the OS level and the last writer wins. A `get` that
//! runs during a write can see a partially written file. Such a torn entry
//! normally fails to parse, and the caller sees the parse error.

use std::fs;
use std::io::Write;
use std::path::{Component, Path, PathBuf};

use bytes::Bytes;
use serde::Deserialize;
use tracing::{debug, warn};

use super::Cache;

/// Directory name used under the system temp dir when no `dir` is configured.
pub const DEFAULT_DIR_NAME: &str = "httpcache";

/// Permission bits for created directories when `dir_mode` is `0`.
pub const DEFAULT_DIR_MODE: u32 = 0o777;

/// Permission bits for created entry files when `file_mode` is `0`.
pub const DEFAULT_FILE_MODE: u32 = 0o666;

/// Configuration for [`DiskCache`].
///
/// Every field has a zero value that maps to a documented fallback:
///
/// | Field       | Zero value | Fallback                             |
/// |-------------|------------|--------------------------------------|
/// | `dir`       | `None`     | `<temp dir>/httpcache`               |
/// | `dir_mode`  | `0`        | [`DEFAULT_DIR_MODE`] (`0o777`)       |
/// | `file_mode` | `0`        | [`DEFAULT_FILE_MODE`] (`0o666`)      |
///
/// Modes only apply on Unix, and the process umask still masks them.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DiskCacheOptions {
    pub dir: Option<PathBuf>,
    pub dir_mode: u32,
    pub file_mode: u32,
}

impl DiskCacheOptions {
    pub fn dir(&self) -> PathBuf {
        self.dir
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join(DEFAULT_DIR_NAME))
    }

    pub fn dir_mode(&self) -> u32 {
        match self.dir_mode {
            0 => DEFAULT_DIR_MODE,
            mode => mode,
        }
    }

    pub fn file_mode(&self) -> u32 {
        match self.file_mode {
            0 => DEFAULT_FILE_MODE,
            mode => mode,
        }
    }
}

/// Stores each entry as a file named by its key inside one directory.
///
/// The directory is created lazily on the first `set`, including parents.
///
/// # Examples
///
/// ```
/// use bytes::Bytes;
/// use rttp_cache::cache::{Cache, DiskCache};
///
/// let dir = tempfile::tempdir().unwrap();
/// let cache = DiskCache::new(dir.path().join("responses"));
///
/// cache.set("abc", Bytes::from_static(b"HTTP/1.1 200 OK\r\n\r\n"));
/// assert!(cache.get("abc").is_some());
/// assert!(cache.get("missing-key").is_none());
/// ```
#[derive(Debug, Clone)]
pub struct DiskCache {
    dir: PathBuf,
    dir_mode: u32,
    file_mode: u32,
}

impl DiskCache {
    /// Creates a store rooted at `dir` with default permissions.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self::with_options(DiskCacheOptions {
            dir: Some(dir.into()),
            ..DiskCacheOptions::default()
        })
    }

    pub fn with_options(options: DiskCacheOptions) -> Self {
        Self {
            dir: options.dir(),
            dir_mode: options.dir_mode(),
            file_mode: options.file_mode(),
        }
    }

    /// Returns the root directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    // Keys must name a file directly inside `dir`.
    fn entry_path(&self, key: &str) -> Option<PathBuf> {
        let mut components = Path::new(key).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(_)), None) => Some(self.dir.join(key)),
            _ => None,
        }
    }

    fn ensure_dir(&self) -> std::io::Result<()> {
        if fs::metadata(&self.dir).is_ok() {
            return Ok(());
        }
        let mut builder = fs::DirBuilder::new();
        builder.recursive(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::DirBuilderExt;
            builder.mode(self.dir_mode);
        }
        builder.create(&self.dir)
    }

    fn write_entry(&self, path: &Path, value: &[u8]) -> std::io::Result<()> {
        let mut options = fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(self.file_mode);
        }
        let mut file = options.open(path)?;
        file.write_all(value)
    }
}

impl Default for DiskCache {
    fn default() -> Self {
        Self::with_options(DiskCacheOptions::default())
    }
}

impl Cache for DiskCache {
    fn get(&self, key: &str) -> Option<Bytes> {
        let path = self.entry_path(key)?;
        match fs::read(&path) {
            Ok(contents) => Some(Bytes::from(contents)),
            Err(e) => {
                debug!(path = %path.display(), error = %e, "cache file unreadable");
                None
            }
        }
    }

    fn set(&self, key: &str, value: Bytes) {
        let Some(path) = self.entry_path(key) else {
            warn!(key, "refusing to store cache entry under a non-file key");
            return;
        };

        if let Err(e) = self.ensure_dir() {
            warn!(dir = %self.dir.display(), error = %e, "failed to create cache directory");
            return;
        }

        if let Err(e) = self.write_entry(&path, &value) {
            warn!(path = %path.display(), error = %e, "failed to write cache entry");
        }
    }
}
