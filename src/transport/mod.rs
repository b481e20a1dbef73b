//! Request execution — the "perform one HTTP exchange" capability.
//!
//! [`Transport`] is the seam every executor plugs into: the default
//! [`HttpTransport`], test doubles, and the caching decorator
//! [`CachingTransport`](crate::caching::CachingTransport), which wraps another
//! transport and exposes the same shape.
//!
//! Any `Fn(&Request) -> Result<Response, TransportError>` closure is a
//! transport too, which keeps stubs in tests short:
//!
//! ```
//! use rttp_cache::http::{Request, Response, StatusCode};
//! use rttp_cache::transport::{Transport, TransportError};
//!
//! let stub = |_req: &Request| -> Result<Response, TransportError> {
//!     Ok(Response::new(StatusCode::OK).with_body("stubbed"))
//! };
//!
//! # tokio_test_block_on(async {
//! let req = Request::get("http://example.com/").unwrap();
//! let resp = stub.round_trip(&req).await.unwrap();
//! assert_eq!(resp.body().as_ref(), b"stubbed");
//! # });
//! # fn tokio_test_block_on<F: std::future::Future>(f: F) -> F::Output {
//! #     tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(f)
//! # }
//! ```

use std::future::Future;
use std::pin::Pin;

use thiserror::Error;

use crate::http::{Request, Response, request::RequestError, response::ResponseError};

pub mod http;

pub use http::{HttpTransport, HttpTransportOptions};

/// A heap-allocated, `Send` future borrowed for `'a`.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Errors produced while executing a request.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("timed out connecting to {addr}")]
    Timeout { addr: String },

    #[error("unsupported URL scheme: {scheme}")]
    UnsupportedScheme { scheme: String },

    #[error("invalid request: {0}")]
    InvalidRequest(#[from] RequestError),

    #[error("invalid response: {0}")]
    InvalidResponse(#[from] ResponseError),

    #[error("response exceeds maximum allowed size of {max_bytes} bytes")]
    ResponseTooLarge { max_bytes: usize },

    /// A failure raised by a layer wrapping the transport, such as the cache.
    #[error(transparent)]
    Other(Box<dyn std::error::Error + Send + Sync>),
}

/// Executes a single request/response exchange.
///
/// # Contract
///
/// - Implementations **must** be `Send + Sync`; one transport is shared by
///   every caller, usually behind an `Arc<dyn Transport>`.
/// - A returned `Ok` carries whatever status the peer sent, including 4xx and
///   5xx. `Err` is reserved for exchanges that produced no response at all.
pub trait Transport: Send + Sync {
    /// Perform the exchange described by `request`.
    fn round_trip<'a>(&'a self, request: &'a Request)
    -> BoxFuture<'a, Result<Response, TransportError>>;
}

impl<F> Transport for F
where
    F: Fn(&Request) -> Result<Response, TransportError> + Send + Sync,
{
    fn round_trip<'a>(
        &'a self,
        request: &'a Request,
    ) -> BoxFuture<'a, Result<Response, TransportError>> {
        Box::pin(std::future::ready((self)(request)))
    }
}
