//! HTTP header map with case-insensitive name lookup.
//!
//! HTTP headers are order-preserving and case-insensitive per [RFC 9110 §5].
//! Order, original spelling and the raw value bytes are kept exactly, because
//! a cached response is expected to come back byte-for-byte as it was stored.
//! Values may carry obs-text (bytes `0x80..=0xFF`), so they are stored as
//! bytes; the `&str` accessors only see values that happen to be UTF-8.

use thiserror::Error;

/// A header that cannot be written to the wire as-is.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidHeader {
    #[error("invalid header name: {name:?}")]
    Name { name: String },

    #[error("header {name} has a value containing CR, LF or NUL")]
    Value { name: String },
}

/// A case-insensitive, multi-value HTTP header map.
///
/// Preserves insertion order and allows multiple values per header name,
/// matching the semantics of HTTP/1.1 header fields (RFC 9110 §5.3).
/// Two maps compare equal when they hold the same `(name, value)` pairs in the
/// same order.
///
/// # Examples
///
/// ```
/// use rttp_cache::http::Headers;
///
/// let mut headers = Headers::new();
/// headers.insert("Content-Type", "text/plain");
/// headers.insert("Set-Cookie", "a=1");
/// headers.insert("Set-Cookie", "b=2");
/// headers.insert("Content-Disposition", &b"attachment; filename=\"caf\xe9.txt\""[..]);
///
/// assert_eq!(headers.get("content-type"), Some("text/plain"));
/// let all: Vec<_> = headers.get_all("set-cookie").collect();
/// assert_eq!(all, vec!["a=1", "b=2"]);
///
/// // Latin-1 bytes are kept, just not visible through the `&str` view.
/// assert_eq!(headers.get("content-disposition"), None);
/// assert!(headers.get_bytes("content-disposition").unwrap().ends_with(b"caf\xe9.txt\""));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    inner: Vec<(String, Vec<u8>)>,
}

impl Headers {
    /// Creates an empty header map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a header map with pre-allocated capacity for `capacity` entries.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: Vec::with_capacity(capacity),
        }
    }

    /// Appends a header entry. Multiple values for the same name are preserved.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Vec<u8>>) {
        self.inner.push((name.into(), value.into()));
    }

    /// Replaces every value of `name` with a single entry.
    ///
    /// The new entry takes the position of the first removed one, or goes to
    /// the end if the header was absent.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Vec<u8>>) {
        let name = name.into();
        let value = value.into();
        match self
            .inner
            .iter()
            .position(|(k, _)| k.eq_ignore_ascii_case(&name))
        {
            Some(pos) => {
                self.inner[pos] = (name.clone(), value);
                let mut index = 0;
                self.inner.retain(|(k, _)| {
                    let keep = index <= pos || !k.eq_ignore_ascii_case(&name);
                    index += 1;
                    keep
                });
            }
            None => self.inner.push((name, value)),
        }
    }

    /// Returns the first value for `name` (case-insensitive) as text.
    ///
    /// `None` if the header is absent or its first value is not valid UTF-8;
    /// use [`get_bytes`](Self::get_bytes) for the raw value.
    pub fn get(&self, name: &str) -> Option<&str> {
        std::str::from_utf8(self.get_bytes(name)?).ok()
    }

    /// Returns the raw bytes of the first value for `name` (case-insensitive).
    pub fn get_bytes(&self, name: &str) -> Option<&[u8]> {
        self.inner
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_slice())
    }

    /// Returns an iterator over the UTF-8 values for `name` (case-insensitive).
    pub fn get_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.inner
            .iter()
            .filter(move |(k, _)| k.eq_ignore_ascii_case(name))
            .filter_map(|(_, v)| std::str::from_utf8(v).ok())
    }

    /// Removes all entries with the given header name (case-insensitive).
    ///
    /// Returns `true` if any entries were removed.
    pub fn remove(&mut self, name: &str) -> bool {
        let before = self.inner.len();
        self.inner.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
        self.inner.len() < before
    }

    /// Returns `true` if the map contains at least one entry with the given name.
    pub fn contains(&self, name: &str) -> bool {
        self.inner.iter().any(|(k, _)| k.eq_ignore_ascii_case(name))
    }

    /// Returns the total number of header entries (not unique names).
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Returns `true` if there are no header entries.
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Returns an iterator over all `(name, raw value)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[u8])> {
        self.inner.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    /// Parses the `Content-Length` header, if present and well-formed.
    pub fn content_length(&self) -> Option<usize> {
        self.get("content-length")?.trim().parse().ok()
    }

    /// Checks that every entry can be written as a header line.
    ///
    /// Names must be RFC 9110 tokens. Values must not contain CR, LF or NUL;
    /// otherwise a value could end its own line and start another.
    pub fn validate(&self) -> Result<(), InvalidHeader> {
        for (name, value) in &self.inner {
            if !is_token(name) {
                return Err(InvalidHeader::Name { name: name.clone() });
            }
            if value.iter().any(|b| matches!(b, b'\r' | b'\n' | b'\0')) {
                return Err(InvalidHeader::Value { name: name.clone() });
            }
        }
        Ok(())
    }
}

impl<K, V> FromIterator<(K, V)> for Headers
where
    K: Into<String>,
    V: Into<Vec<u8>>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            inner: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// Returns `true` if `s` is a non-empty RFC 9110 §5.6.2 token.
pub(crate) fn is_token(s: &str) -> bool {
    !s.is_empty()
        && s
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b"!#$%&'*+-.^_`|~".contains(&b))
}
