use crate::{errors::Error, http::types::Headers};
use memchr::{memchr, memchr_iter};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt};
use tracing::trace;

/// Longest accepted line, request line or header, including the line ending.
pub(crate) const MAX_LINE_SIZE: usize = 8 * 1024;
/// Most header lines read before the blank line, skipped ones included.
pub(crate) const MAX_HEADER_LINES: usize = 100;

/// Parsed HTTP request head.
///
/// Built by the connection before the [`Handler`](crate::Handler) runs and
/// read-only afterwards. The request body, if the client sent one, is left
/// unread on the socket.
///
/// # Input format
///
/// #### General designations
/// - `SP`: ASCII space (0x20)
/// - `EOL`: `LF`, optionally preceded by `CR` (the `CR` is stripped)
///
/// ## First line
///
/// ```text
/// [METHOD] SP [TARGET] SP [VERSION] EOL
/// ```
///
/// Exactly three non-empty fields separated by single spaces. Everything
/// else (two fields, four fields, double spaces, invalid UTF-8, or a
/// connection closed before the first line) is rejected and the connection
/// is closed without a response.
///
/// The fields are kept verbatim: the method is not checked against a list
/// and the version string is echoed into the response status line as is.
///
/// ## Header
///
/// ```text
/// [NAME] ":" [VALUE] EOL
/// ```
///
/// Split on the first colon, both sides trimmed of surrounding whitespace:
/// ```text
/// Host: localhost          // ("Host", "localhost")
///   X-Pad  :   value  \r\n // ("X-Pad", "value")
/// Time: 12:30              // ("Time", "12:30")
/// no colon here            // skipped
/// : no name                // skipped
/// ```
///
/// Headers end at the first blank (empty or whitespace-only) line, or when
/// the client stops sending.
///
/// ## Size
///
/// A line may not exceed 8 KiB (line ending included) and at most 100
/// header lines are read. Anything larger closes the
/// connection without a response.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    method: String,
    path: String,
    protocol: String,
    headers: Headers,
}

// Public API
impl Request {
    /// Request method, e.g. `GET`.
    #[inline(always)]
    pub fn method(&self) -> &str {
        &self.method
    }

    /// Request target exactly as sent, e.g. `/users?id=1`.
    #[inline(always)]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Protocol version string, e.g. `HTTP/1.1`.
    #[inline(always)]
    pub fn protocol(&self) -> &str {
        &self.protocol
    }

    #[inline(always)]
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Returns the header value with case-insensitive name matching.
    #[inline(always)]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }
}

impl Request {
    /// Reads the request line and the header block from `reader`.
    pub(crate) async fn parse<R>(reader: &mut R) -> Result<Self, Error>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut line = Vec::with_capacity(256);

        if read_line(reader, &mut line).await? == 0 {
            return Err(Error::MalformedRequestLine);
        }

        let mut request = Self::from_request_line(trim_eol(&line))?;

        let mut header_lines = 0;
        loop {
            line.clear();

            if read_line(reader, &mut line).await? == 0 {
                trace!("stream ended inside header block");
                break;
            }

            let line = trim_eol(&line);
            if line.iter().all(u8::is_ascii_whitespace) {
                break;
            }

            header_lines += 1;
            if header_lines > MAX_HEADER_LINES {
                return Err(Error::RequestHeadTooLarge);
            }

            request.parse_header(line);
        }

        Ok(request)
    }

    // Parse first line
    fn from_request_line(line: &[u8]) -> Result<Self, Error> {
        let line = simdutf8::basic::from_utf8(line).map_err(|_| Error::MalformedRequestLine)?;

        let mut spaces = memchr_iter(b' ', line.as_bytes());
        let (Some(first), Some(second), None) = (spaces.next(), spaces.next(), spaces.next())
        else {
            return Err(Error::MalformedRequestLine);
        };

        let method = &line[..first];
        let path = &line[first + 1..second];
        let protocol = &line[second + 1..];

        if method.is_empty() || path.is_empty() || protocol.is_empty() {
            return Err(Error::MalformedRequestLine);
        }

        Ok(Request {
            method: method.to_owned(),
            path: path.to_owned(),
            protocol: protocol.to_owned(),
            headers: Headers::new(),
        })
    }

    // Parse headers
    fn parse_header(&mut self, line: &[u8]) {
        let Some(colon) = memchr(b':', line) else {
            trace!(line = %String::from_utf8_lossy(line), "header line without colon skipped");
            return;
        };

        let (Ok(name), Ok(value)) = (
            simdutf8::basic::from_utf8(&line[..colon]),
            simdutf8::basic::from_utf8(&line[colon + 1..]),
        ) else {
            trace!("header line with invalid UTF-8 skipped");
            return;
        };

        let name = name.trim();
        if name.is_empty() {
            trace!("header line with empty name skipped");
            return;
        }

        if let Some(previous) = self.headers.insert(name, value.trim()) {
            trace!(name, previous = %previous, "repeated header, last value kept");
        }
    }
}

#[inline]
async fn read_line<R>(reader: &mut R, line: &mut Vec<u8>) -> Result<usize, Error>
where
    R: AsyncBufRead + Unpin,
{
    let read = (&mut *reader)
        .take(MAX_LINE_SIZE as u64)
        .read_until(b'\n', line)
        .await?;

    if read == MAX_LINE_SIZE && !line.ends_with(b"\n") {
        return Err(Error::RequestHeadTooLarge);
    }

    Ok(read)
}

#[inline]
fn trim_eol(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

#[cfg(test)]
mod request_line_tests {
    use super::*;

    #[test]
    fn parse() {
        #[rustfmt::skip]
        let cases = [
            ("GET / HTTP/1.1",              Some(("GET", "/", "HTTP/1.1"))),
            ("POST /api/users HTTP/1.0",    Some(("POST", "/api/users", "HTTP/1.0"))),
            ("get /q?a=1&b=2 HTTP/1.1",     Some(("get", "/q?a=1&b=2", "HTTP/1.1"))),
            ("BREW /pot HTCPCP/1.0",        Some(("BREW", "/pot", "HTCPCP/1.0"))),
            ("GET * HTTP/2",                Some(("GET", "*", "HTTP/2"))),

            ("GET HTTP/1.1",                None),
            ("GET",                         None),
            ("",                            None),
            ("GET / HTTP/1.1 extra",        None),
            ("GET  / HTTP/1.1",             None),
            (" / HTTP/1.1",                 None),
            ("GET / ",                      None),
            ("GET\t/\tHTTP/1.1",            None),
        ];

        for (line, expected) in cases {
            let result = Request::from_request_line(line.as_bytes());

            match expected {
                Some((method, path, protocol)) => {
                    let request = result.unwrap();

                    assert_eq!(request.method(), method);
                    assert_eq!(request.path(), path);
                    assert_eq!(request.protocol(), protocol);
                    assert!(request.headers().is_empty());
                }
                None => assert!(
                    matches!(result, Err(Error::MalformedRequestLine)),
                    "{line:?}"
                ),
            }
        }
    }

    #[test]
    fn invalid_utf8() {
        let result = Request::from_request_line(b"GET /\xff\xfe HTTP/1.1");
        assert!(matches!(result, Err(Error::MalformedRequestLine)));
    }

    #[test]
    fn eol() {
        #[rustfmt::skip]
        let cases: [(&[u8], &[u8]); 6] = [
            (b"GET / HTTP/1.1\r\n", b"GET / HTTP/1.1"),
            (b"GET / HTTP/1.1\n",   b"GET / HTTP/1.1"),
            (b"GET / HTTP/1.1",     b"GET / HTTP/1.1"),
            (b"\r\n",               b""),
            (b"\n",                 b""),
            (b"a\r\r\n",            b"a\r"),
        ];

        for (line, expected) in cases {
            assert_eq!(trim_eol(line), expected);
        }
    }
}
