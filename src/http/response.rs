//! HTTP/1.1 response type and its wire dump.
//!
//! A [`Response`] can be serialized with [`Response::to_bytes`] and read back
//! with [`Response::parse`]. The pair is lossless: status, reason phrase,
//! header list and body survive the round trip unchanged. That dump is exactly
//! what a cache entry contains.

use bytes::{BufMut, Bytes, BytesMut};
use thiserror::Error;
use url::Url;

use super::headers::InvalidHeader;
use super::{Headers, InvalidStatusCode, Method, StatusCode};

/// Maximum number of headers accepted when parsing a response head.
const MAX_HEADERS: usize = 128;

/// Errors that can occur while parsing an HTTP/1.1 response.
#[derive(Debug, Error)]
pub enum ResponseError {
    #[error("response is incomplete — more data needed")]
    Incomplete,

    #[error("HTTP parse error: {0}")]
    Parse(#[from] httparse::Error),

    #[error("missing required field: {field}")]
    MissingField { field: &'static str },

    #[error(transparent)]
    Status(#[from] InvalidStatusCode),

    #[error("body truncated: Content-Length is {expected} but only {actual} bytes are present")]
    Truncated { expected: usize, actual: usize },

    #[error("invalid chunked transfer coding")]
    InvalidChunk,

    #[error("connection closed before the response was complete")]
    UnexpectedEof,
}

/// Errors that can occur while dumping a response to wire format.
#[derive(Debug, Error)]
pub enum SerializeError {
    #[error(transparent)]
    Header(#[from] InvalidHeader),

    #[error("reason phrase contains CR or LF")]
    InvalidReason,
}

/// The head of a response: status line and headers, without the body.
#[derive(Debug)]
pub(crate) struct ResponseHead {
    pub(crate) status: StatusCode,
    pub(crate) reason: String,
    pub(crate) headers: Headers,
}

impl ResponseHead {
    /// Parses a status line and headers from the front of `buf`.
    ///
    /// Returns the head and the byte offset at which the body begins.
    ///
    /// # Errors
    ///
    /// - [`ResponseError::Incomplete`] — more data is needed to complete the head.
    /// - [`ResponseError::Parse`] — the data is malformed and cannot be parsed.
    pub(crate) fn parse(buf: &[u8]) -> Result<(Self, usize), ResponseError> {
        let mut headers = [httparse::EMPTY_HEADER; MAX_HEADERS];
        let mut raw = httparse::Response::new(&mut headers);

        let body_offset = match raw.parse(buf)? {
            httparse::Status::Complete(offset) => offset,
            httparse::Status::Partial => return Err(ResponseError::Incomplete),
        };

        let code = raw
            .code
            .ok_or(ResponseError::MissingField { field: "status" })?;
        let status = StatusCode::from_u16(code)?;
        let reason = raw.reason.unwrap_or_default().to_owned();

        let mut header_map = Headers::with_capacity(raw.headers.len());
        for header in raw.headers.iter() {
            header_map.insert(header.name, header.value);
        }

        Ok((
            Self {
                status,
                reason,
                headers: header_map,
            },
            body_offset,
        ))
    }
}

/// A complete HTTP/1.1 response with a fully buffered body.
///
/// # Examples
///
/// ```
/// use rttp_cache::http::{Response, StatusCode};
///
/// let response = Response::new(StatusCode::OK)
///     .header("Content-Type", "text/plain")
///     .with_body("hello");
///
/// let dumped = response.to_bytes().unwrap();
/// assert!(dumped.starts_with(b"HTTP/1.1 200 OK\r\n"));
///
/// let parsed = Response::parse(&dumped).unwrap();
/// assert_eq!(parsed.status(), StatusCode::OK);
/// assert_eq!(parsed.body().as_ref(), b"hello");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    status: StatusCode,
    reason: String,
    headers: Headers,
    body: Bytes,
    url: Option<Url>,
}

impl Response {
    /// Creates a new response with the given status, its canonical reason
    /// phrase, and an empty body.
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            reason: status.canonical_reason().unwrap_or_default().to_owned(),
            headers: Headers::new(),
            body: Bytes::new(),
            url: None,
        }
    }

    pub(crate) fn from_parts(head: ResponseHead, body: Bytes) -> Self {
        Self {
            status: head.status,
            reason: head.reason,
            headers: head.headers,
            body,
            url: None,
        }
    }

    /// Appends a response header. Multiple calls with the same name are additive.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<Vec<u8>>) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Overrides the reason phrase written on the status line.
    #[must_use]
    pub fn reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = reason.into();
        self
    }

    /// Sets the response body.
    ///
    /// No `Content-Length` header is added; [`to_bytes`](Self::to_bytes)
    /// writes headers exactly as they are.
    #[must_use]
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Associates the response with the URL of the request it answers.
    #[must_use]
    pub fn with_url(mut self, url: Url) -> Self {
        self.url = Some(url);
        self
    }

    /// Returns the status code of this response.
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Returns the reason phrase from the status line.
    pub fn reason_phrase(&self) -> &str {
        &self.reason
    }

    /// Returns the response headers.
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Returns a mutable reference to the response headers.
    pub fn headers_mut(&mut self) -> &mut Headers {
        &mut self.headers
    }

    /// Returns the response body bytes.
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Consumes the response and returns its body.
    pub fn into_body(self) -> Bytes {
        self.body
    }

    /// Returns the body as UTF-8 text.
    pub fn text(&self) -> Result<&str, std::str::Utf8Error> {
        std::str::from_utf8(&self.body)
    }

    /// Returns the URL of the request this response answers, if known.
    pub fn url(&self) -> Option<&Url> {
        self.url.as_ref()
    }

    /// Dumps the response in HTTP/1.1 wire format.
    ///
    /// Writes the status line, every header verbatim and in order, a blank
    /// line, then the body. Nothing is added or normalized. Header values are
    /// written as raw bytes, so non-UTF-8 values come back unchanged.
    ///
    /// # Errors
    ///
    /// Returns a [`SerializeError`] if a header fails
    /// [`Headers::validate`], or if the reason phrase contains CR or LF.
    /// Writing such a response would produce bytes that parse back differently.
    pub fn to_bytes(&self) -> Result<Bytes, SerializeError> {
        if self.reason.bytes().any(|b| b == b'\r' || b == b'\n') {
            return Err(SerializeError::InvalidReason);
        }
        self.headers.validate()?;

        let estimated_size = 64 + self.headers.len() * 64 + self.body.len();
        let mut buf = BytesMut::with_capacity(estimated_size);

        buf.put(format!("HTTP/1.1 {} {}\r\n", self.status.as_u16(), self.reason).as_bytes());

        for (name, value) in self.headers.iter() {
            buf.put(name.as_bytes());
            buf.put(&b": "[..]);
            buf.put(value);
            buf.put(&b"\r\n"[..]);
        }

        buf.put(&b"\r\n"[..]);
        buf.put(self.body.as_ref());

        Ok(buf.freeze())
    }

    /// Parses a response previously written by [`to_bytes`](Self::to_bytes).
    ///
    /// When a `Content-Length` header is present the body is exactly that
    /// many bytes and anything after it is ignored. Otherwise the body is the
    /// rest of the buffer. A `1xx`, `204` or `304` status has no body, whatever
    /// its headers say.
    ///
    /// # Errors
    ///
    /// - [`ResponseError::Incomplete`] — the head is cut off.
    /// - [`ResponseError::Truncated`] — fewer body bytes than `Content-Length` announces.
    /// - [`ResponseError::Parse`] / [`ResponseError::Status`] — malformed status line or headers.
    pub fn parse(buf: &[u8]) -> Result<Self, ResponseError> {
        Self::parse_for(buf, &Method::Get)
    }

    /// Parses a response as the answer to a `method` request.
    ///
    /// Same as [`parse`](Self::parse), except that a response to `HEAD` has no
    /// body either: its `Content-Length` describes the body a `GET` would
    /// have returned, and any bytes after the head are ignored.
    pub fn parse_for(buf: &[u8], method: &Method) -> Result<Self, ResponseError> {
        let (head, body_offset) = ResponseHead::parse(buf)?;
        if *method == Method::Head || head.status.is_bodyless() {
            return Ok(Self::from_parts(head, Bytes::new()));
        }
        let rest = &buf[body_offset..];

        let body = match head.headers.content_length() {
            Some(expected) if rest.len() < expected => {
                return Err(ResponseError::Truncated {
                    expected,
                    actual: rest.len(),
                });
            }
            Some(expected) => &rest[..expected],
            None => rest,
        };

        Ok(Self::from_parts(head, Bytes::copy_from_slice(body)))
    }
}

impl Default for Response {
    fn default() -> Self {
        Self::new(StatusCode::OK)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Response {
        Response::new(StatusCode::OK)
            .header("Content-Type", "text/plain")
            .header("Set-Cookie", "a=1")
            .header("Set-Cookie", "b=2")
            .header("Content-Length", "5")
            .with_body("hello")
    }

    #[test]
    fn dump_is_verbatim() {
        let bytes = sample().to_bytes().unwrap();
        assert_eq!(
            bytes.as_ref(),
            b"HTTP/1.1 200 OK\r\n\
              Content-Type: text/plain\r\n\
              Set-Cookie: a=1\r\n\
              Set-Cookie: b=2\r\n\
              Content-Length: 5\r\n\
              \r\n\
              hello"
        );
    }

    #[test]
    fn round_trip_preserves_status_headers_and_body() {
        let original = sample();
        let parsed = Response::parse(&original.to_bytes().unwrap()).unwrap();
        assert_eq!(parsed.status(), original.status());
        assert_eq!(parsed.reason_phrase(), "OK");
        assert_eq!(parsed.headers(), original.headers());
        assert_eq!(parsed.body(), original.body());
    }

    #[test]
    fn round_trip_without_content_length_keeps_binary_body() {
        let body: Vec<u8> = (0u8..=255).collect();
        let original = Response::new(StatusCode::CREATED).with_body(body.clone());
        let parsed = Response::parse(&original.to_bytes().unwrap()).unwrap();
        assert_eq!(parsed.body().as_ref(), body.as_slice());
        assert!(parsed.headers().is_empty());
    }

    #[test]
    fn unknown_status_keeps_custom_reason() {
        let original = Response::new(StatusCode::from_u16(299).unwrap()).reason("Whatever");
        let parsed = Response::parse(&original.to_bytes().unwrap()).unwrap();
        assert_eq!(parsed.status().as_u16(), 299);
        assert_eq!(parsed.reason_phrase(), "Whatever");
    }

    #[test]
    fn torn_body_is_truncated_error() {
        let bytes = sample().to_bytes().unwrap();
        let torn = &bytes[..bytes.len() - 2];
        assert!(matches!(
            Response::parse(torn),
            Err(ResponseError::Truncated {
                expected: 5,
                actual: 3
            })
        ));
    }

    #[test]
    fn torn_head_is_incomplete() {
        assert!(matches!(
            Response::parse(b"HTTP/1.1 200 OK\r\nContent-Ty"),
            Err(ResponseError::Incomplete)
        ));
    }

    #[test]
    fn garbage_is_parse_error() {
        assert!(matches!(
            Response::parse(b"not an http response\r\n\r\n"),
            Err(ResponseError::Parse(_))
        ));
    }

    #[test]
    fn header_injection_rejected() {
        let r = Response::new(StatusCode::OK).header("X-Evil", "a\r\nInjected: yes");
        assert!(matches!(
            r.to_bytes(),
            Err(SerializeError::Header(InvalidHeader::Value { .. }))
        ));

        let r = Response::new(StatusCode::OK).header("Bad Name", "x");
        assert!(matches!(
            r.to_bytes(),
            Err(SerializeError::Header(InvalidHeader::Name { .. }))
        ));

        let r = Response::new(StatusCode::OK).reason("OK\r\nX-Injected: yes");
        assert!(matches!(r.to_bytes(), Err(SerializeError::InvalidReason)));
    }

    #[test]
    fn latin1_header_value_survives_byte_for_byte() {
        let wire: &[u8] = b"HTTP/1.1 200 OK\r\n\
            Content-Disposition: attachment; filename=\"caf\xe9.txt\"\r\n\
            Content-Length: 2\r\n\
            \r\n\
            ok";
        let parsed = Response::parse(wire).unwrap();
        assert_eq!(
            parsed.headers().get_bytes("content-disposition"),
            Some(&b"attachment; filename=\"caf\xe9.txt\""[..])
        );
        assert_eq!(parsed.to_bytes().unwrap().as_ref(), wire);
    }

    #[test]
    fn head_answer_ignores_content_length() {
        let dump = Response::new(StatusCode::OK)
            .header("Content-Length", "5")
            .to_bytes()
            .unwrap();
        assert!(matches!(
            Response::parse(&dump),
            Err(ResponseError::Truncated { expected: 5, actual: 0 })
        ));

        let parsed = Response::parse_for(&dump, &Method::Head).unwrap();
        assert!(parsed.body().is_empty());
        assert_eq!(parsed.headers().content_length(), Some(5));
    }

    #[test]
    fn bodyless_status_ignores_trailing_bytes() {
        let wire = b"HTTP/1.1 304 Not Modified\r\nContent-Length: 5\r\n\r\n";
        let parsed = Response::parse(wire).unwrap();
        assert_eq!(parsed.status(), StatusCode::NOT_MODIFIED);
        assert!(parsed.body().is_empty());

        let wire = b"HTTP/1.1 204 No Content\r\n\r\nstray";
        assert!(Response::parse(wire).unwrap().body().is_empty());
    }
}
