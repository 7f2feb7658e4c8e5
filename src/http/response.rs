//! HTTP response: status line, headers and a length-enforced body stream.

use crate::http::types::{slice_to_usize, Headers, StatusCode};
use std::{fmt, io, io::Write as _};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::{trace, warn};

pub(crate) type ConnWriter = Box<dyn AsyncWrite + Send + Sync + Unpin>;

/// HTTP response written back to the client.
///
/// Handed to the [`Handler`](crate::Handler) through the
/// [`Context`](crate::Context). The status line and headers are buffered
/// until the first body write (or until the handler returns), then sent
/// exactly once:
///
/// ```text
/// [PROTOCOL] SP [STATUS CODE] SP [REASON PHRASE] CRLF
/// ([NAME] ": " [VALUE] CRLF)*
/// CRLF
/// [BODY]
/// ```
///
/// `[PROTOCOL]` is copied verbatim from the request line.
///
/// # Content-Length
///
/// If a `Content-Length` header is set when the head goes out, the body is
/// capped at that many bytes across all [`write_body`](Response::write_body)
/// calls. Extra bytes are dropped, missing bytes are not padded.
///
/// # Examples
/// ```
/// use nimble_http::{Response, StatusCode};
///
/// async fn not_found(resp: &mut Response) -> std::io::Result<()> {
///     resp.status(StatusCode::NotFound)
///         .header("Content-Type", "text/plain")
///         .header("Content-Length", 9);
///
///     resp.write_body("Not Found").await?;
///     Ok(())
/// }
/// ```
///
/// # Panics
/// Changing the status or headers after the head was sent panics in `debug`
/// mode. In `release` mode the change is ignored.
pub struct Response {
    protocol: String,
    status_code: u16,
    reason_phrase: String,
    headers: Headers,

    writer: ConnWriter,
    state: ResponseState,
    // encoded head, drained by `write_head`
    head: Vec<u8>,
    head_written: usize,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum ResponseState {
    Pending,
    HeadSent { remaining: Option<usize> },
}

impl Response {
    #[inline]
    pub(crate) fn new(writer: ConnWriter, protocol: String) -> Self {
        Self {
            protocol,
            status_code: StatusCode::Ok.as_u16(),
            reason_phrase: StatusCode::Ok.reason().to_owned(),
            headers: Headers::new(),

            writer,
            state: ResponseState::Pending,
            head: Vec::new(),
            head_written: 0,
        }
    }
}

// Public API
impl Response {
    /// Protocol version echoed from the request, e.g. `HTTP/1.1`.
    #[inline(always)]
    pub fn protocol(&self) -> &str {
        &self.protocol
    }

    /// Status code (default: `200`).
    #[inline(always)]
    pub fn status_code(&self) -> u16 {
        self.status_code
    }

    /// Reason phrase (default: `OK`).
    #[inline(always)]
    pub fn reason_phrase(&self) -> &str {
        &self.reason_phrase
    }

    #[inline(always)]
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// `true` once the status line and headers are frozen and their write
    /// has started.
    #[inline(always)]
    pub fn head_sent(&self) -> bool {
        self.state != ResponseState::Pending
    }

    /// Sets the status code and its canonical reason phrase.
    ///
    /// # Examples
    /// ```
    /// # fn f(resp: &mut nimble_http::Response) {
    /// use nimble_http::StatusCode;
    ///
    /// resp.status(StatusCode::NotFound);
    ///
    /// assert_eq!(resp.status_code(), 404);
    /// assert_eq!(resp.reason_phrase(), "Not Found");
    /// # }
    /// ```
    #[inline]
    #[track_caller]
    pub fn status(&mut self, status: StatusCode) -> &mut Self {
        self.set_status_code(status.as_u16())
            .set_reason_phrase(status.reason())
    }

    #[inline]
    #[track_caller]
    pub fn set_status_code(&mut self, code: u16) -> &mut Self {
        if self.check_pending("status code") {
            self.status_code = code;
        }
        self
    }

    #[inline]
    #[track_caller]
    pub fn set_reason_phrase<R: Into<String>>(&mut self, reason: R) -> &mut Self {
        if self.check_pending("reason phrase") {
            self.reason_phrase = reason.into();
        }
        self
    }

    /// Sets a header. A header with the same name (any case) is replaced.
    ///
    /// # Examples
    /// ```
    /// # fn f(resp: &mut nimble_http::Response) {
    /// resp.header("Content-Type", "text/plain")
    ///     .header("Content-Length", 10)
    ///     .header("content-type", "text/html");
    ///
    /// assert_eq!(resp.headers().get("Content-Type"), Some("text/html"));
    /// assert_eq!(resp.headers().len(), 2);
    /// # }
    /// ```
    #[inline]
    #[track_caller]
    pub fn header<N, V>(&mut self, name: N, value: V) -> &mut Self
    where
        N: Into<String>,
        V: fmt::Display,
    {
        if self.check_pending("headers") {
            self.headers.insert(name, value.to_string());
        }
        self
    }

    /// Writes body bytes, sending the status line and headers first if they
    /// have not been sent yet.
    ///
    /// Returns how many bytes of `data` went on the wire, which is less than
    /// `data.len()` once a declared `Content-Length` is used up.
    ///
    /// # Examples
    /// ```
    /// # async fn f(resp: &mut nimble_http::Response) -> std::io::Result<()> {
    /// resp.header("Content-Length", 10);
    ///
    /// assert_eq!(resp.write_body("0123456789abcdefghij").await?, 10);
    /// assert_eq!(resp.write_body("more").await?, 0);
    /// # Ok(())
    /// # }
    /// ```
    pub async fn write_body<T: AsRef<[u8]>>(&mut self, data: T) -> io::Result<usize> {
        if self.state == ResponseState::Pending {
            self.commit_head();
        }
        self.write_head().await?;

        let data = data.as_ref();
        let len = match self.state {
            ResponseState::HeadSent {
                remaining: Some(remaining),
            } => remaining.min(data.len()),
            _ => data.len(),
        };

        if len < data.len() {
            trace!(dropped = data.len() - len, "body truncated to Content-Length");
        }

        // charged per chunk, a dropped future keeps the count exact
        let mut written = 0;
        while written < len {
            let n = self.writer.write(&data[written..len]).await?;
            if n == 0 {
                return Err(io::ErrorKind::WriteZero.into());
            }

            written += n;
            if let ResponseState::HeadSent {
                remaining: Some(remaining),
            } = &mut self.state
            {
                *remaining -= n;
            }
        }

        Ok(len)
    }
}

impl Response {
    /// Sends the head if no body was written, then flushes the stream.
    ///
    /// Consumes the response, so it can only happen once.
    ///
    /// A head whose write was interrupted is resumed, never restarted.
    pub(crate) async fn finish(mut self) -> io::Result<()> {
        if self.state == ResponseState::Pending {
            self.commit_head();
        }
        self.write_head().await?;

        self.writer.flush().await
    }

    /// Freezes status and headers. Nothing is written yet.
    fn commit_head(&mut self) {
        self.head = self.encode_head();
        self.head_written = 0;
        self.state = ResponseState::HeadSent {
            remaining: self.content_length(),
        };
    }

    /// Writes whatever part of the committed head is not on the wire yet.
    async fn write_head(&mut self) -> io::Result<()> {
        if self.head_written == self.head.len() {
            return Ok(());
        }

        while self.head_written < self.head.len() {
            let n = self.writer.write(&self.head[self.head_written..]).await?;
            if n == 0 {
                return Err(io::ErrorKind::WriteZero.into());
            }
            self.head_written += n;
        }

        self.head = Vec::new();
        self.head_written = 0;

        trace!(status = self.status_code, "response head sent");
        Ok(())
    }

    fn encode_head(&self) -> Vec<u8> {
        let mut buffer = Vec::with_capacity(64 + self.headers.len() * 32);

        // Writing into a Vec cannot fail
        let _ = write!(
            buffer,
            "{} {} {}\r\n",
            self.protocol, self.status_code, self.reason_phrase
        );
        for header in &self.headers {
            let _ = write!(buffer, "{}: {}\r\n", header.name(), header.value());
        }
        buffer.extend_from_slice(b"\r\n");

        buffer
    }

    fn content_length(&self) -> Option<usize> {
        let value = self.headers.get("Content-Length")?;

        let len = slice_to_usize(value.trim().as_bytes());
        if len.is_none() {
            warn!(value, "unparsable Content-Length, body is not truncated");
        }
        len
    }

    #[inline]
    #[track_caller]
    fn check_pending(&self, what: &str) -> bool {
        debug_assert!(
            self.state == ResponseState::Pending,
            "Cannot change {what} after the body was written"
        );

        self.state == ResponseState::Pending
    }
}

impl fmt::Debug for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Response")
            .field("protocol", &self.protocol)
            .field("status_code", &self.status_code)
            .field("reason_phrase", &self.reason_phrase)
            .field("headers", &self.headers)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}



#[cfg(test)]
mod content_length_tests {
    use super::{tools::*, *};

    #[tokio::test]
    async fn truncation() {
        #[rustfmt::skip]
        let cases = [
            ("10", vec!["0123456789abcdefghij"],           "0123456789"),
            ("10", vec!["01234"],                          "01234"),
            ("10", vec!["0123", "4567", "89ab", "cdef"],   "0123456789"),
            ("0",  vec!["anything"],                       ""),
            (" 4 ", vec!["abcdef"],                        "abcd"),
            ("abc", vec!["not truncated"],                 "not truncated"),
            ("-1", vec!["not truncated"],                  "not truncated"),
        ];

        for (length, writes, body) in cases {
            let (mut resp, client) = response("HTTP/1.1");
            resp.header("Content-Length", length);

            let mut sent = 0;
            for data in &writes {
                sent += resp.write_body(data).await.unwrap();
            }
            resp.finish().await.unwrap();

            assert_eq!(sent, body.len());
            assert_eq!(
                read_all(client).await,
                format!("HTTP/1.1 200 OK\r\nContent-Length: {length}\r\n\r\n{body}"),
                "{length:?} {writes:?}"
            );
        }
    }

    #[tokio::test]
    async fn counts_bytes() {
        let (mut resp, client) = response("HTTP/1.1");
        resp.header("content-length", 4);

        // "ж" is two bytes in UTF-8
        assert_eq!(resp.write_body("жжж").await.unwrap(), 4);
        resp.finish().await.unwrap();

        assert_eq!(
            read_all(client).await,
            "HTTP/1.1 200 OK\r\ncontent-length: 4\r\n\r\nжж"
        );
    }

    #[tokio::test]
    async fn unlimited_without_header() {
        let body = "x".repeat(10_000);

        let (mut resp, client) = response("HTTP/1.1");
        assert_eq!(resp.write_body(&body).await.unwrap(), body.len());
        resp.finish().await.unwrap();

        assert_eq!(read_all(client).await, format!("HTTP/1.1 200 OK\r\n\r\n{body}"));
    }
}
