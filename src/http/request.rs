//! Outbound HTTP/1.1 request descriptor.

use bytes::{BufMut, Bytes, BytesMut};
use thiserror::Error;
use url::Url;

use super::headers::{InvalidHeader, is_token};
use super::{Headers, Method};

/// Errors that can occur while building a [`Request`].
#[derive(Debug, Error)]
pub enum RequestError {
    #[error("invalid request URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("request URL has no host: {url}")]
    MissingHost { url: String },

    #[error("invalid request method: {method:?}")]
    InvalidMethod { method: String },

    #[error(transparent)]
    Header(#[from] InvalidHeader),
}

/// A request to be executed by a [`Transport`](crate::transport::Transport).
///
/// The target is always a fully-qualified [`Url`] (scheme, host, path and
/// query), which is also the sole input to cache key derivation.
///
/// # Examples
///
/// ```
/// use rttp_cache::http::{Method, Request};
///
/// let request = Request::get("http://example.com/a?x=1")
///     .unwrap()
///     .header("Accept", "text/plain");
///
/// assert_eq!(request.method(), &Method::Get);
/// assert_eq!(request.url().as_str(), "http://example.com/a?x=1");
/// assert_eq!(request.headers().get("accept"), Some("text/plain"));
/// ```
#[derive(Debug, Clone)]
pub struct Request {
    method: Method,
    url: Url,
    headers: Headers,
    body: Bytes,
}

impl Request {
    /// Creates a request with no headers and an empty body.
    ///
    /// # Errors
    ///
    /// - [`RequestError::InvalidUrl`] if `url` is not an absolute URL.
    /// - [`RequestError::MissingHost`] if the URL has no host (e.g. `data:`).
    pub fn new(method: Method, url: &str) -> Result<Self, RequestError> {
        let url = Url::parse(url)?;
        Self::from_url(method, url)
    }

    /// Shorthand for `Request::new(Method::Get, url)`.
    pub fn get(url: &str) -> Result<Self, RequestError> {
        Self::new(Method::Get, url)
    }

    /// Creates a request from an already-parsed URL.
    pub fn from_url(method: Method, url: Url) -> Result<Self, RequestError> {
        if url.host_str().is_none() {
            return Err(RequestError::MissingHost { url: url.into() });
        }
        Ok(Self {
            method,
            url,
            headers: Headers::new(),
            body: Bytes::new(),
        })
    }

    /// Appends a request header. Multiple calls with the same name are additive.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<Vec<u8>>) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Sets the request body.
    #[must_use]
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Returns the HTTP method.
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Returns the fully-qualified target URL.
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Returns the request headers.
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Returns a mutable reference to the request headers.
    pub fn headers_mut(&mut self) -> &mut Headers {
        &mut self.headers
    }

    /// Returns the request body bytes.
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Returns the `Host` header value derived from the URL (`host[:port]`).
    pub fn authority(&self) -> String {
        let host = self.url.host_str().unwrap_or_default();
        match self.url.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_owned(),
        }
    }

    /// Serializes the request into origin-form HTTP/1.1 wire format.
    ///
    /// Automatically adds:
    /// - `Host` if the caller did not set one.
    /// - `Content-Length` if the body is non-empty and no length was set.
    ///
    /// # Errors
    ///
    /// - [`RequestError::InvalidMethod`] if a custom method is not a token.
    /// - [`RequestError::Header`] if a header name is not a token or a value
    ///   contains CR, LF or NUL. Nothing is written in either case.
    pub fn to_bytes(&self) -> Result<BytesMut, RequestError> {
        if !is_token(self.method.as_str()) {
            return Err(RequestError::InvalidMethod {
                method: self.method.as_str().to_owned(),
            });
        }
        self.headers.validate()?;

        let mut target = self.url.path().to_owned();
        if let Some(query) = self.url.query() {
            target.push('?');
            target.push_str(query);
        }

        let estimated_size = 128 + self.headers.len() * 64 + self.body.len();
        let mut buf = BytesMut::with_capacity(estimated_size);

        buf.put(format!("{} {} HTTP/1.1\r\n", self.method, target).as_bytes());

        if !self.headers.contains("host") {
            buf.put(format!("Host: {}\r\n", self.authority()).as_bytes());
        }
        for (name, value) in self.headers.iter() {
            buf.put(name.as_bytes());
            buf.put(&b": "[..]);
            buf.put(value);
            buf.put(&b"\r\n"[..]);
        }
        if !self.body.is_empty() && !self.headers.contains("content-length") {
            buf.put(format!("Content-Length: {}\r\n", self.body.len()).as_bytes());
        }

        buf.put(&b"\r\n"[..]);
        buf.put(self.body.as_ref());
        Ok(buf)
    }
}
