//! The caching decorator: a [`Transport`] that answers from a [`Cache`] when
//! it can and otherwise delegates and remembers.
//!
//! ## Protocol
//!
//! For every request:
//!
//! 1. If a filter is configured and returns `true`, the request goes straight
//!    to the delegate. The cache is neither read nor written.
//! 2. The key is [`cache_key`] of the request URL.
//! 3. **Hit**: the stored dump is parsed and returned. The delegate is not
//!    called. A dump that fails to parse is an error, not a miss. A `HEAD`
//!    request served from an entry gets the stored head with an empty body.
//! 4. **Miss**: the delegate runs. Transport errors and non-2xx responses are
//!    returned as they are and nothing is stored. A 2xx response is dumped,
//!    parsed back from the dump, stored (best-effort), and the parsed copy is
//!    returned.
//!
//! Some 2xx responses are returned as they are without being stored, because
//! their dump would not stand for the response a later `GET` should receive:
//!
//! - answers to `HEAD`, whose `Content-Length` describes a body they lack;
//! - responses whose `Content-Length` disagrees with the body they carry, or
//!   that have a body although their status (`204`) forbids one.
//!
//! Concurrent misses for the same key each run the delegate and each write the
//! entry. Nothing coalesces them.

use std::fmt;
use std::sync::Arc;

use thiserror::Error;
use tracing::debug;

use crate::cache::{Cache, cache_key};
use crate::http::{
    Method, Request, Response,
    response::{ResponseError, SerializeError},
};
use crate::transport::{BoxFuture, HttpTransport, Transport, TransportError};

/// Errors surfaced by [`CachingTransport::execute`].
///
/// Storage failures never show up here: a response that could not be stored
/// is still returned successfully.
#[derive(Debug, Error)]
pub enum CachingError {
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: TransportError,
    },

    #[error("failed to serialize response from {url}: {source}")]
    Serialize {
        url: String,
        #[source]
        source: SerializeError,
    },

    #[error("failed to parse cached response {key}: {source}")]
    Deserialize {
        key: String,
        #[source]
        source: ResponseError,
    },
}

/// Caller-supplied predicate; `true` means "do not use the cache for this request".
pub type Filter = Arc<dyn Fn(&Request) -> bool + Send + Sync>;

/// A [`Transport`] that serves repeated requests from a [`Cache`].
///
/// # Examples
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use rttp_cache::{CachingTransport, DiskCache, Request};
///
/// # async fn run() -> Result<(), Box<dyn std::error::Error>> {
/// let client = CachingTransport::new(Arc::new(DiskCache::new("/tmp/httpcache")))
///     .with_filter(|req: &Request| req.url().path().starts_with("/live/"));
///
/// let request = Request::get("http://example.com/a?x=1")?;
/// let first = client.execute(&request).await?;   // goes to the network
/// let second = client.execute(&request).await?;  // served from disk
/// assert_eq!(first.body(), second.body());
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct CachingTransport {
    transport: Arc<dyn Transport>,
    cache: Arc<dyn Cache>,
    filter: Option<Filter>,
}

impl CachingTransport {
    /// Wraps a default [`HttpTransport`] with `cache`.
    pub fn new(cache: Arc<dyn Cache>) -> Self {
        Self {
            transport: Arc::new(HttpTransport::default()),
            cache,
            filter: None,
        }
    }

    /// Replaces the delegate that performs real exchanges on a miss.
    #[must_use]
    pub fn with_transport<T>(mut self, transport: T) -> Self
    where
        T: Transport + 'static,
    {
        self.transport = Arc::new(transport);
        self
    }

    /// Same as [`with_transport`](Self::with_transport) for an already shared delegate.
    #[must_use]
    pub fn with_shared_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = transport;
        self
    }

    /// Installs a predicate that excludes matching requests from caching.
    #[must_use]
    pub fn with_filter<F>(mut self, filter: F) -> Self
    where
        F: Fn(&Request) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Arc::new(filter));
        self
    }

    /// Executes `request`, consulting and populating the cache.
    ///
    /// # Errors
    ///
    /// - [`CachingError::Transport`] — the delegate produced no response.
    /// - [`CachingError::Serialize`] — a 2xx response could not be dumped.
    /// - [`CachingError::Deserialize`] — a stored or fresh dump did not parse.
    pub async fn execute(&self, request: &Request) -> Result<Response, CachingError> {
        let url = request.url();

        if self.filter.as_ref().is_some_and(|filter| filter(request)) {
            debug!(url = %url, "cache bypassed by filter");
            return self.delegate(request).await;
        }

        let key = cache_key(url);

        if let Some(dump) = self.cache.get(&key) {
            debug!(url = %url, %key, "cache hit");
            let response = Response::parse_for(&dump, request.method())
                .map_err(|source| CachingError::Deserialize { key, source })?;
            return Ok(response.with_url(url.clone()));
        }

        debug!(url = %url, %key, "cache miss");
        let response = self.delegate(request).await?;

        if !response.status().is_success() {
            debug!(
                url = %url,
                status = response.status().as_u16(),
                "response not cacheable"
            );
            return Ok(response);
        }
        if *request.method() == Method::Head {
            debug!(url = %url, "HEAD response not cached");
            return Ok(response);
        }
        if !framing_matches_body(&response) {
            debug!(
                url = %url,
                status = response.status().as_u16(),
                body_len = response.body().len(),
                "response framing disagrees with its body, not cached"
            );
            return Ok(response);
        }

        let dump = response
            .to_bytes()
            .map_err(|source| CachingError::Serialize {
                url: url.to_string(),
                source,
            })?;
        let parsed = Response::parse(&dump).map_err(|source| CachingError::Deserialize {
            key: key.clone(),
            source,
        })?;

        debug!(url = %url, %key, bytes = dump.len(), "response stored");
        self.cache.set(&key, dump);
        Ok(parsed.with_url(url.clone()))
    }

    async fn delegate(&self, request: &Request) -> Result<Response, CachingError> {
        self.transport
            .round_trip(request)
            .await
            .map_err(|source| CachingError::Transport {
                url: request.url().to_string(),
                source,
            })
    }
}

/// Whether the head of `response` describes exactly the body it carries, so
/// that its dump parses back to the same response.
fn framing_matches_body(response: &Response) -> bool {
    if response.status().is_bodyless() {
        return response.body().is_empty();
    }
    match response.headers().get_bytes("content-length") {
        Some(_) => response.headers().content_length() == Some(response.body().len()),
        None => true,
    }
}

impl Transport for CachingTransport {
    fn round_trip<'a>(
        &'a self,
        request: &'a Request,
    ) -> BoxFuture<'a, Result<Response, TransportError>> {
        Box::pin(async move {
            self.execute(request).await.map_err(|e| match e {
                CachingError::Transport { source, .. } => source,
                other => TransportError::Other(Box::new(other)),
            })
        })
    }
}

impl fmt::Debug for CachingTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CachingTransport")
            .field("filter", &self.filter.is_some())
            .finish_non_exhaustive()
    }
}
