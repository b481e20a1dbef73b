//! Cache stores — key to bytes mappings that hold dumped responses.
//!
//! A store is anything implementing [`Cache`]. Two backends ship with the
//! crate:
//!
//! - [`MemoryCache`] — a process-local map, mostly useful for tests and
//!   short-lived tools.
//! - [`DiskCache`] — one file per key inside a directory.
//!
//! Keys come from [`cache_key`], which looks at the request URL and nothing
//! else.

use std::collections::HashMap;
use std::sync::RwLock;

use bytes::Bytes;
use sha2::{Digest, Sha256};
use url::{Position, Url};

pub mod disk;

pub use disk::{DiskCache, DiskCacheOptions};

/// Storage for dumped responses, keyed by [`cache_key`].
///
/// # Contract
///
/// - `get` signals absence with `None`, never with an error. Any failure to
///   read counts as a miss.
/// - `set` is best-effort. A failed write may be dropped silently, and the
///   caller has no way to observe it. Writes to an existing key overwrite.
/// - Implementations **must** be `Send + Sync`; a single store is shared by
///   every concurrent request.
pub trait Cache: Send + Sync {
    /// Returns the entry stored under `key`, if there is one.
    fn get(&self, key: &str) -> Option<Bytes>;

    /// Stores `value` under `key`, replacing any previous entry.
    fn set(&self, key: &str, value: Bytes);
}

/// Derives the cache key for a request URL.
///
/// The key is the lowercase hex SHA-256 of the serialized URL up to and
/// including the query, always 64 characters, which also makes it a safe file
/// name. The fragment is left out: it never goes on the wire, so `/a#x` and
/// `/a#y` fetch the same response and share one entry.
///
/// Method, headers and body are deliberately not part of the key: a `POST`
/// and a `GET` to the same URL share an entry, and so do requests that differ
/// only in `Authorization`.
///
/// # Examples
///
/// ```
/// use rttp_cache::cache::cache_key;
/// use url::Url;
///
/// let a = cache_key(&Url::parse("http://example.com/a?x=1").unwrap());
/// let b = cache_key(&Url::parse("http://example.com/a?x=2").unwrap());
/// assert_eq!(a.len(), 64);
/// assert_ne!(a, b);
/// ```
pub fn cache_key(url: &Url) -> String {
    let mut hasher = Sha256::new();
    hasher.update(url[..Position::AfterQuery].as_bytes());
    format!("{:x}", hasher.finalize())
}

/// An in-process [`Cache`] backed by a `HashMap`.
///
/// A poisoned lock is treated like any other storage failure: reads miss and
/// writes are dropped.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: RwLock<HashMap<String, Bytes>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored entries.
    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Cache for MemoryCache {
    fn get(&self, key: &str) -> Option<Bytes> {
        self.entries.read().ok()?.get(key).cloned()
    }

    fn set(&self, key: &str, value: Bytes) {
        if let Ok(mut entries) = self.entries.write() {
            entries.insert(key.to_owned(), value);
        }
    }
}
