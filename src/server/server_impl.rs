use crate::{
    errors::Error,
    http::context::Context,
    options::ServerOptions,
    server::{
        connection::HttpConnection,
        shutdown::{Cancellation, Tracker, Trigger},
    },
};
use socket2::{Domain, Protocol, Socket, Type};
use std::{future::Future, io, net::SocketAddr, sync::Arc, time::Duration};
use tokio::{
    net::TcpListener,
    task::JoinHandle,
    time::{sleep, timeout},
};
use tracing::{debug, debug_span, info, info_span, warn, Instrument};

const LISTEN_BACKLOG: i32 = 1024;
/// Pause after an accept error that is not about a single connection.
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(50);

/// A trait for handling HTTP requests.
///
/// The handler is the only place application logic lives: it reads the
/// request, sets the status and headers, and writes the body. One handler
/// instance serves every connection, so `&self` holds shared, read-only
/// state (a router table, a database pool, ...).
///
/// # Examples
///
/// ```
/// use nimble_http::{Cancellation, Context, Handler, StatusCode};
/// use std::io;
///
/// struct MyHandler;
///
/// impl Handler for MyHandler {
///     async fn handle(&self, ctx: &mut Context, _: &Cancellation) -> io::Result<()> {
///         let (req, resp) = ctx.parts();
///
///         if req.method() == "GET" && req.path() == "/" {
///             resp.status(StatusCode::Ok);
///             return Ok(());
///         }
///
///         resp.status(StatusCode::NotFound)
///             .header("Content-Type", "text/plain")
///             .header("Content-Length", 9);
///         resp.write_body("Not Found").await?;
///         Ok(())
///     }
/// }
/// ```
pub trait Handler
where
    Self: Sync + Send + 'static,
{
    /// Processes one request.
    ///
    /// # Parameters
    ///
    /// - `ctx`: the parsed request and the response under construction
    /// - `cancel`: fires when the server is stopped; long-running handlers
    ///   should check it
    ///
    /// # Returns
    ///
    /// `Ok(())` and the server flushes the response (status line and headers
    /// are sent if no body was written). `Err(_)` and the connection is closed
    /// without flushing; bytes already written stay written.
    ///
    /// If `cancel` fires while the handler is suspended, the handler future
    /// is dropped and the response is flushed as it stands.
    fn handle(
        &self,
        ctx: &mut Context,
        cancel: &Cancellation,
    ) -> impl Future<Output = io::Result<()>> + Send;
}

/// An HTTP/1.1 server serving one request per connection.
///
/// Every accepted connection gets its own task: parse the request head,
/// run the [`Handler`], flush the response, close. There is no limit on
/// concurrent connections and no keep-alive.
///
/// # Examples
///
/// ```no_run
/// use nimble_http::{Cancellation, Context, Handler, Server, ServerOptions};
///
/// struct Hello;
///
/// impl Handler for Hello {
///     async fn handle(&self, ctx: &mut Context, _: &Cancellation) -> std::io::Result<()> {
///         ctx.response().header("Content-Length", 5);
///         ctx.response().write_body("Hello").await?;
///         Ok(())
///     }
/// }
///
/// #[tokio::main]
/// async fn main() {
///     let handle = Server::new(Hello)
///         .start(ServerOptions::with_port(8080))
///         .unwrap();
///
///     tokio::signal::ctrl_c().await.unwrap();
///     handle.stop().await;
/// }
/// ```
pub struct Server<H: Handler> {
    handler: Arc<H>,
}

impl<H: Handler> Server<H> {
    /// Creates a server around its handler.
    #[inline]
    pub fn new(handler: H) -> Self {
        Self {
            handler: Arc::new(handler),
        }
    }

    /// Binds `127.0.0.1:{port}` and starts accepting connections in the
    /// background.
    ///
    /// # Errors
    ///
    /// [`Error::Bind`] if the socket cannot be created or bound (port in use,
    /// no permission).
    ///
    /// # Panics
    ///
    /// When called outside of a Tokio runtime.
    pub fn start(&self, options: ServerOptions) -> Result<ServerHandle, Error> {
        let listener = bind(options.bind_addr()).map_err(|source| Error::Bind {
            port: options.port,
            source,
        })?;
        let local_addr = listener.local_addr()?;

        let stop_accepting = Trigger::new();
        let cancel = Trigger::new();
        let tracker = Tracker::default();

        let task = tokio::spawn(
            accept_loop(
                listener,
                self.handler.clone(),
                stop_accepting.subscribe(),
                cancel.subscribe(),
                tracker.clone(),
            )
            .instrument(info_span!("server", address = %local_addr)),
        );

        info!(address = %local_addr, "server started");

        Ok(ServerHandle {
            local_addr,
            stop_accepting,
            cancel,
            tracker,
            task,
        })
    }
}

/// Control handle of a running [`Server`].
///
/// Dropping the handle without calling [`stop`](Self::stop) or
/// [`shutdown`](Self::shutdown) leaves the server running until the Tokio
/// runtime shuts down.
#[derive(Debug)]
pub struct ServerHandle {
    local_addr: SocketAddr,
    stop_accepting: Trigger,
    cancel: Trigger,
    tracker: Tracker,
    task: JoinHandle<()>,
}

impl ServerHandle {
    /// Address the listener is bound to. Useful with port `0`.
    #[inline]
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Number of connections currently being served.
    #[inline]
    pub fn active_connections(&self) -> usize {
        self.tracker.active()
    }

    /// Fires the cancellation signal and closes the listening socket.
    ///
    /// Returns once the accept loop has exited. In-flight connections are
    /// not awaited: they observe the signal at their next suspension point
    /// and close on their own.
    pub async fn stop(self) {
        self.cancel.fire();
        self.stop_accepting.fire();

        join_accept_loop(self.task).await;

        info!(
            address = %self.local_addr,
            abandoned = self.tracker.active(),
            "server stopped"
        );
    }

    /// Stops accepting, then gives in-flight connections up to `grace` to
    /// finish before firing the cancellation signal.
    ///
    /// Returns `true` if every connection finished within `grace`.
    pub async fn shutdown(self, grace: Duration) -> bool {
        self.stop_accepting.fire();
        join_accept_loop(self.task).await;

        let drained = timeout(grace, self.tracker.drained()).await.is_ok();
        if !drained {
            warn!(
                remaining = self.tracker.active(),
                "drain timed out, cancelling connections"
            );
        }

        self.cancel.fire();

        info!(address = %self.local_addr, drained, "server stopped");
        drained
    }
}

async fn accept_loop<H: Handler>(
    listener: TcpListener,
    handler: Arc<H>,
    stop_accepting: Cancellation,
    cancel: Cancellation,
    tracker: Tracker,
) {
    loop {
        let (stream, peer) = tokio::select! {
            biased;

            _ = stop_accepting.cancelled() => break,
            accepted = listener.accept() => match accepted {
                Ok(value) => value,
                Err(err) => {
                    warn!(%err, "accept failed");
                    if !is_connection_error(&err) {
                        sleep(ACCEPT_ERROR_BACKOFF).await;
                    }
                    continue;
                }
            },
        };

        debug!(%peer, "connection accepted");

        let conn = HttpConnection::new(handler.clone(), cancel.clone());
        let guard = tracker.track();

        tokio::spawn(
            conn.serve(stream, guard)
                .instrument(debug_span!("connection", %peer)),
        );
    }

    debug!("accept loop stopped");
}

/// Returns `false` if the accept loop panicked or was aborted.
async fn join_accept_loop(task: JoinHandle<()>) -> bool {
    match task.await {
        Ok(()) => true,
        Err(err) => {
            warn!(%err, "accept loop ended abnormally");
            false
        }
    }
}

/// Errors that only concern the connection being accepted. Anything else
/// (for example running out of file descriptors) will repeat immediately.
fn is_connection_error(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::ConnectionRefused
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::ConnectionReset
    )
}

fn bind(addr: SocketAddr) -> io::Result<TcpListener> {
    let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))?;

    socket.set_reuse_address(true)?;
    socket.set_nonblocking(true)?;
    socket.bind(&addr.into())?;
    socket.listen(LISTEN_BACKLOG)?;

    TcpListener::from_std(socket.into())
}
