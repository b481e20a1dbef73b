//! # rttp-cache
//!
//! A transparent, content-addressed response cache for outbound HTTP/1.1
//! requests.
//!
//! [`CachingTransport`] wraps any [`Transport`] and exposes the same shape, so
//! it drops in wherever a plain executor is expected. Successful (2xx)
//! responses are dumped in wire format and stored in a [`Cache`] under a key
//! derived from the request URL. Repeated requests are answered from the
//! store without touching the network.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use rttp_cache::{CachingTransport, DiskCache, Request};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = CachingTransport::new(Arc::new(DiskCache::default()));
//!     let response = client.execute(&Request::get("http://example.com/")?).await?;
//!     println!("{} ({} bytes)", response.status(), response.body().len());
//!     Ok(())
//! }
//! ```
//!
//! ## What is not here
//!
//! There is no expiry, no eviction, and no request coalescing. Entries live
//! until something outside this crate deletes them.

pub mod cache;
pub mod caching;
pub mod http;
pub mod transport;

// ── Convenience re-exports ────────────────────────────────────────────────────
pub use cache::{Cache, DiskCache, DiskCacheOptions, MemoryCache, cache_key};
pub use caching::{CachingError, CachingTransport};
pub use http::{Headers, Method, Request, Response, StatusCode};
pub use transport::{HttpTransport, HttpTransportOptions, Transport, TransportError};
