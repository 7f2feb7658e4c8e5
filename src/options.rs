//! Server configuration
//!
//! The only knob is the TCP port. The server always binds to the loopback
//! interface (`127.0.0.1`), so it is never reachable from another host.
//!
//! # Examples
//!
//! ```no_run
//! # nimble_http::impt_default_handler!{MyHandler}
//! use nimble_http::{Server, ServerOptions};
//!
//! #[tokio::main]
//! async fn main() {
//!     let handle = Server::new(MyHandler)
//!         .start(ServerOptions { port: 2603, ..ServerOptions::default() })
//!         .unwrap();
//!
//!     println!("listening on {}", handle.local_addr());
//! #   handle.stop().await;
//! }
//! ```

use std::net::{Ipv4Addr, SocketAddr};

/// Options accepted by [`Server::start`](crate::Server::start).
#[derive(Debug, Clone)]
pub struct ServerOptions {
    /// TCP port to listen on (default: `8080`).
    ///
    /// `0` lets the operating system pick a free port; read it back with
    /// [`ServerHandle::local_addr`](crate::ServerHandle::local_addr).
    pub port: u16,

    #[doc(hidden)]
    #[allow(dead_code)]
    pub _priv: (),
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            port: 8080,
            _priv: (),
        }
    }
}

impl ServerOptions {
    /// Shorthand for `ServerOptions { port, ..Default::default() }`.
    #[inline]
    pub fn with_port(port: u16) -> Self {
        Self {
            port,
            ..Self::default()
        }
    }

    #[inline]
    pub(crate) fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(Ipv4Addr::LOCALHOST.into(), self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loopback_only() {
        for port in [0, 80, 2603, u16::MAX] {
            let addr = ServerOptions::with_port(port).bind_addr();

            assert!(addr.ip().is_loopback());
            assert_eq!(addr.port(), port);
        }
    }

    #[test]
    fn default_port() {
        assert_eq!(ServerOptions::default().port, 8080);
    }
}
