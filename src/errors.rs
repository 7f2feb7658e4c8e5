use std::io;
use thiserror::Error;

/// Errors produced by the server and by individual connections.
///
/// Connection-level variants never leave the connection task: they are
/// logged and the connection is closed. Only [`Error::Bind`] is returned
/// to the caller of [`Server::start`](crate::Server::start).
#[derive(Debug, Error)]
pub enum Error {
    /// The request line was missing, not UTF-8, or did not split into
    /// exactly three non-empty fields. The connection is closed without
    /// sending a single byte.
    #[error("malformed request line")]
    MalformedRequestLine,

    /// A request line or header line was too long, or there were too many
    /// header lines. Handled like a malformed request.
    #[error("request head too large")]
    RequestHeadTooLarge,

    /// The process-wide cancellation signal fired while the connection
    /// was suspended.
    #[error("connection cancelled")]
    Cancelled,

    /// The registered [`Handler`](crate::Handler) returned an error.
    /// No response is flushed.
    #[error("handler failed: {0}")]
    Handler(#[source] io::Error),

    /// The listening socket could not be set up.
    #[error("failed to bind 127.0.0.1:{port}: {source}")]
    Bind {
        port: u16,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl Error {
    /// `true` for errors caused by the peer rather than by the server.
    #[inline]
    pub(crate) fn is_client_fault(&self) -> bool {
        match self {
            Error::MalformedRequestLine | Error::RequestHeadTooLarge => true,
            Error::Io(err) => matches!(
                err.kind(),
                io::ErrorKind::ConnectionReset
                    | io::ErrorKind::ConnectionAborted
                    | io::ErrorKind::BrokenPipe
                    | io::ErrorKind::UnexpectedEof
            ),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display() {
        #[rustfmt::skip]
        let cases = [
            (Error::MalformedRequestLine, "malformed request line"),
            (Error::RequestHeadTooLarge,  "request head too large"),
            (Error::Cancelled,            "connection cancelled"),
            (
                Error::Handler(io::Error::new(io::ErrorKind::Other, "boom")),
                "handler failed: boom",
            ),
            (
                Error::Bind { port: 80, source: io::Error::new(io::ErrorKind::AddrInUse, "in use") },
                "failed to bind 127.0.0.1:80: in use",
            ),
        ];

        for (err, expected) in cases {
            assert_eq!(err.to_string(), expected);
        }
    }

    #[test]
    fn client_fault() {
        assert!(Error::MalformedRequestLine.is_client_fault());
        assert!(Error::RequestHeadTooLarge.is_client_fault());
        assert!(Error::from(io::Error::from(io::ErrorKind::ConnectionReset)).is_client_fault());
        assert!(!Error::from(io::Error::from(io::ErrorKind::PermissionDenied)).is_client_fault());
        assert!(!Error::Cancelled.is_client_fault());
    }
}
