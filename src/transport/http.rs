//! Plain HTTP/1.1 client transport over Tokio TCP.
//!
//! One connection per request: the request goes out with `Connection: close`,
//! and the response is read until its framing says it is complete. The framing
//! is `Content-Length`, chunked transfer coding, or end of stream.

use std::time::Duration;

use bytes::{BufMut, Bytes, BytesMut};
use serde::Deserialize;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::debug;

use super::{BoxFuture, Transport, TransportError};
use crate::http::{
    Headers, Method, Request, Response,
    response::{ResponseError, ResponseHead},
};

/// Default connect timeout (10 seconds).
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 10_000;

/// Default maximum size of a buffered response (64 MiB).
pub const DEFAULT_MAX_RESPONSE_BYTES: usize = 64 * 1024 * 1024;

/// Initial read buffer capacity per connection.
const INITIAL_BUF_SIZE: usize = 4096;

/// Tunables for [`HttpTransport`].
///
/// Zero values fall back to the documented defaults, so a partially filled
/// config file behaves the same as an empty one.
///
/// ```
/// use rttp_cache::transport::HttpTransportOptions;
///
/// let opts: HttpTransportOptions =
///     serde_json::from_str(r#"{ "connect_timeout_ms": 500 }"#).unwrap();
/// assert_eq!(opts.connect_timeout().as_millis(), 500);
/// assert_eq!(opts.max_response_bytes(), 64 * 1024 * 1024);
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct HttpTransportOptions {
    /// Connect timeout in milliseconds. `0` means [`DEFAULT_CONNECT_TIMEOUT_MS`].
    pub connect_timeout_ms: u64,
    /// Largest response accepted, in bytes. `0` means [`DEFAULT_MAX_RESPONSE_BYTES`].
    pub max_response_bytes: usize,
}

impl HttpTransportOptions {
    pub fn connect_timeout(&self) -> Duration {
        match self.connect_timeout_ms {
            0 => Duration::from_millis(DEFAULT_CONNECT_TIMEOUT_MS),
            ms => Duration::from_millis(ms),
        }
    }

    pub fn max_response_bytes(&self) -> usize {
        match self.max_response_bytes {
            0 => DEFAULT_MAX_RESPONSE_BYTES,
            n => n,
        }
    }
}

/// The default [`Transport`]: plain-text HTTP/1.1 over TCP.
///
/// Only `http://` URLs are supported; anything else fails with
/// [`TransportError::UnsupportedScheme`].
#[derive(Debug, Clone, Default)]
pub struct HttpTransport {
    options: HttpTransportOptions,
}

impl HttpTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: HttpTransportOptions) -> Self {
        Self { options }
    }

    async fn execute(&self, request: &Request) -> Result<Response, TransportError> {
        let url = request.url();
        if url.scheme() != "http" {
            return Err(TransportError::UnsupportedScheme {
                scheme: url.scheme().to_owned(),
            });
        }

        // An invalid request must fail before any connection is opened.
        let mut outbound = request.clone();
        outbound.headers_mut().set("Connection", "close");
        let wire = outbound.to_bytes()?;

        let host = url.host_str().unwrap_or_default();
        let port = url.port_or_known_default().unwrap_or(80);
        let addr = format!("{host}:{port}");

        let mut stream = match timeout(
            self.options.connect_timeout(),
            TcpStream::connect(addr.as_str()),
        )
        .await
        {
            Ok(Ok(stream)) => stream,
            Ok(Err(source)) => return Err(TransportError::Connect { addr, source }),
            Err(_) => return Err(TransportError::Timeout { addr }),
        };
        debug!(%addr, method = %request.method(), url = %url, "connected");

        stream.write_all(&wire).await?;
        stream.flush().await?;

        let head_only = *request.method() == Method::Head;
        let response = read_response(&mut stream, head_only, self.options.max_response_bytes())
            .await?
            .with_url(url.clone());

        debug!(
            url = %url,
            status = response.status().as_u16(),
            body_len = response.body().len(),
            "response received"
        );
        Ok(response)
    }
}

impl Transport for HttpTransport {
    fn round_trip<'a>(
        &'a self,
        request: &'a Request,
    ) -> BoxFuture<'a, Result<Response, TransportError>> {
        Box::pin(self.execute(request))
    }
}

/// Reads one complete response from `stream`.
///
/// A chunked body is decoded, and the head is rewritten to describe the
/// decoded body: `chunked` is dropped from `Transfer-Encoding` and
/// `Content-Length` is set. Any other codings stay, since the body still
/// carries them.
async fn read_response<S>(
    stream: &mut S,
    head_only: bool,
    max_bytes: usize,
) -> Result<Response, TransportError>
where
    S: AsyncRead + Unpin,
{
    let mut buf = BytesMut::with_capacity(INITIAL_BUF_SIZE);

    let (mut head, body_offset) = loop {
        match ResponseHead::parse(&buf) {
            Ok(pair) => break pair,
            Err(ResponseError::Incomplete) => read_more(stream, &mut buf, max_bytes).await?,
            Err(e) => return Err(e.into()),
        }
    };
    let _ = buf.split_to(body_offset);

    let body = if head_only || head.status.is_bodyless() {
        Bytes::new()
    } else if is_chunked(&head) {
        let body = read_chunked(stream, buf, max_bytes).await?;
        drop_chunked_coding(&mut head.headers);
        head.headers.set("Content-Length", body.len().to_string());
        body
    } else if let Some(len) = head.headers.content_length() {
        if len > max_bytes {
            return Err(TransportError::ResponseTooLarge { max_bytes });
        }
        while buf.len() < len {
            read_more(stream, &mut buf, max_bytes).await?;
        }
        buf.split_to(len).freeze()
    } else {
        loop {
            if buf.len() > max_bytes {
                return Err(TransportError::ResponseTooLarge { max_bytes });
            }
            if stream.read_buf(&mut buf).await? == 0 {
                break;
            }
        }
        buf.freeze()
    };

    Ok(Response::from_parts(head, body))
}

fn is_chunked(head: &ResponseHead) -> bool {
    head.headers
        .get_all("transfer-encoding")
        .flat_map(|v| v.split(','))
        .last()
        .is_some_and(|coding| coding.trim().eq_ignore_ascii_case("chunked"))
}

// `chunked` is always the last coding when present.
fn drop_chunked_coding(headers: &mut Headers) {
    let mut codings: Vec<String> = headers
        .get_all("transfer-encoding")
        .flat_map(|v| v.split(','))
        .map(str::trim)
        .filter(|coding| !coding.is_empty())
        .map(str::to_owned)
        .collect();
    codings.pop();

    if codings.is_empty() {
        headers.remove("transfer-encoding");
    } else {
        headers.set("Transfer-Encoding", codings.join(", "));
    }
}

/// Decodes a chunked body. `buf` holds whatever followed the head.
///
/// Trailer fields after the last chunk are not read; the connection is
/// closed right after this response anyway.
async fn read_chunked<S>(
    stream: &mut S,
    mut buf: BytesMut,
    max_bytes: usize,
) -> Result<Bytes, TransportError>
where
    S: AsyncRead + Unpin,
{
    let mut body = BytesMut::new();

    loop {
        let (consumed, size) = loop {
            match httparse::parse_chunk_size(&buf) {
                Ok(httparse::Status::Complete(pair)) => break pair,
                Ok(httparse::Status::Partial) => read_more(stream, &mut buf, max_bytes).await?,
                Err(_) => return Err(ResponseError::InvalidChunk.into()),
            }
        };
        let _ = buf.split_to(consumed);

        if size == 0 {
            return Ok(body.freeze());
        }

        let size = usize::try_from(size)
            .ok()
            .filter(|size| body.len().saturating_add(*size) <= max_bytes)
            .ok_or(TransportError::ResponseTooLarge { max_bytes })?;

        while buf.len() < size + 2 {
            read_more(stream, &mut buf, max_bytes).await?;
        }
        body.put(buf.split_to(size));

        if &buf[..2] != b"\r\n" {
            return Err(ResponseError::InvalidChunk.into());
        }
        let _ = buf.split_to(2);
    }
}

async fn read_more<S>(
    stream: &mut S,
    buf: &mut BytesMut,
    max_bytes: usize,
) -> Result<(), TransportError>
where
    S: AsyncRead + Unpin,
{
    if buf.len() > max_bytes {
        return Err(TransportError::ResponseTooLarge { max_bytes });
    }
    if stream.read_buf(buf).await? == 0 {
        return Err(ResponseError::UnexpectedEof.into());
    }
    Ok(())
}
