//! nimble_http - Minimal HTTP/1.1 server engine
//!
//! One request per connection: the server parses the request line and
//! headers, hands them to your [`Handler`] together with a [`Response`],
//! flushes the response and closes the socket.
//!
//! # Protocol Support
//!
//! - **Request line and headers** - `CRLF` or bare `LF` line endings
//! - **Response framing** - the body never exceeds the `Content-Length`
//!   header set by the handler; extra bytes are silently dropped
//! - **No keep-alive, no chunked encoding, no request bodies** - the
//!   connection is always closed after one response
//!
//! The listener binds to `127.0.0.1` only.
//!
//! # Examples
//!
//! Quick start:
//! ```no_run
//! use nimble_http::{Cancellation, Context, Handler, Server, ServerOptions, StatusCode};
//!
//! struct MyHandler;
//!
//! impl Handler for MyHandler {
//!     async fn handle(&self, ctx: &mut Context, _: &Cancellation) -> std::io::Result<()> {
//!         ctx.response()
//!             .status(StatusCode::Ok)
//!             .header("Content-Length", 12);
//!         ctx.response().write_body("Hello World!").await?;
//!         Ok(())
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() {
//!     let handle = Server::new(MyHandler)
//!         .start(ServerOptions::default())
//!         .unwrap();
//!
//!     tokio::signal::ctrl_c().await.unwrap();
//!     handle.stop().await;
//! }
//! ```
//! Routing on method and path:
//! ```no_run
//! use nimble_http::{Cancellation, Context, Handler, Server, ServerOptions, StatusCode};
//! use std::time::Duration;
//!
//! struct MyHandler;
//!
//! impl Handler for MyHandler {
//!     async fn handle(&self, ctx: &mut Context, _: &Cancellation) -> std::io::Result<()> {
//!         let (req, resp) = ctx.parts();
//!
//!         match (req.method(), req.path()) {
//!             ("GET", "/") => {
//!                 resp.status(StatusCode::Ok);
//!             }
//!             ("GET", "/agent") => {
//!                 let agent = req.header("User-Agent").unwrap_or("unknown").to_owned();
//!                 resp.header("Content-Length", agent.len());
//!                 resp.write_body(agent).await?;
//!             }
//!             _ => {
//!                 resp.status(StatusCode::NotFound);
//!             }
//!         }
//!         Ok(())
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() {
//!     let handle = Server::new(MyHandler)
//!         .start(ServerOptions::with_port(2603))
//!         .unwrap();
//!
//!     tokio::signal::ctrl_c().await.unwrap();
//!
//!     // let running requests finish, then cancel the rest
//!     if !handle.shutdown(Duration::from_secs(5)).await {
//!         eprintln!("some connections were cancelled");
//!     }
//! }
//! ```
//!
//! # Logging
//!
//! The crate emits [`tracing`](https://docs.rs/tracing) events: server start
//! and stop at `INFO`, per-connection outcomes at `DEBUG` (inside a
//! `connection` span carrying the peer address), parser details at `TRACE`
//! and unexpected I/O or handler failures at `WARN`. Install any subscriber
//! to see them.

pub(crate) mod http {
    pub(crate) mod context;
    pub(crate) mod request;
    pub(crate) mod response;
    pub(crate) mod types;
}
pub(crate) mod server {
    pub(crate) mod connection;
    pub(crate) mod server_impl;
    pub(crate) mod shutdown;
}
pub(crate) mod errors;
pub mod options;

pub use crate::{
    errors::Error,
    http::{
        context::Context,
        request::Request,
        response::Response,
        types::{Header, Headers, StatusCode},
    },
    options::ServerOptions,
    server::{
        server_impl::{Handler, Server, ServerHandle},
        shutdown::Cancellation,
    },
};

#[doc(hidden)]
#[macro_export]
macro_rules! impt_default_handler {
    ($name:ident) => {
        use nimble_http::{Cancellation, Context, Handler, StatusCode};
        struct $name;

        impl Handler for $name {
            async fn handle(&self, ctx: &mut Context, _: &Cancellation) -> std::io::Result<()> {
                ctx.response()
                    .status(StatusCode::Ok)
                    .header("Content-Length", 12);
                ctx.response().write_body("Hello world!").await?;
                Ok(())
            }
        }
    };
}
