use crate::{
    errors::Error,
    http::{context::Context, request::Request, response::Response},
    server::{
        server_impl::Handler,
        shutdown::{Cancellation, ConnectionGuard},
    },
};
use std::{sync::Arc, time::Duration};
use tokio::{
    io::{AsyncRead, AsyncWrite, BufReader},
    net::TcpStream,
    time::sleep,
};
use tracing::{debug, trace, warn};

/// How long a response may keep flushing after cancellation fired.
const CANCELLED_FLUSH_GRACE: Duration = Duration::from_secs(1);

/// Serves exactly one request on one connection.
pub(crate) struct HttpConnection<H: Handler> {
    handler: Arc<H>,
    cancel: Cancellation,
}

impl<H: Handler> HttpConnection<H> {
    #[inline]
    pub(crate) fn new(handler: Arc<H>, cancel: Cancellation) -> Self {
        Self { handler, cancel }
    }

    /// Runs the connection to completion and closes the socket.
    ///
    /// Failures are logged here and never reach the accept loop.
    pub(crate) async fn serve(self, stream: TcpStream, _guard: ConnectionGuard) {
        // head and body go out as separate writes
        if let Err(err) = stream.set_nodelay(true) {
            trace!(%err, "TCP_NODELAY not set");
        }

        let (read_half, write_half) = stream.into_split();

        match self.run(read_half, write_half).await {
            Ok(()) => trace!("connection closed"),
            Err(Error::Cancelled) => debug!("connection cancelled"),
            Err(err) if err.is_client_fault() => debug!(%err, "connection dropped"),
            Err(err) => warn!(%err, "connection failed"),
        }
    }

    pub(crate) async fn run<R, W>(&self, reader: R, writer: W) -> Result<(), Error>
    where
        R: AsyncRead + Unpin + Send,
        W: AsyncWrite + Send + Sync + Unpin + 'static,
    {
        let mut reader = BufReader::new(reader);

        let request = tokio::select! {
            biased;

            _ = self.cancel.cancelled() => return Err(Error::Cancelled),
            parsed = Request::parse(&mut reader) => parsed?,
        };

        trace!(
            method = request.method(),
            path = request.path(),
            protocol = request.protocol(),
            headers = request.headers().len(),
            "request parsed"
        );

        if self.cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let response = Response::new(Box::new(writer), request.protocol().to_owned());
        let mut ctx = Context::new(request, response);

        let handled = tokio::select! {
            biased;

            _ = self.cancel.cancelled() => {
                debug!("handler cancelled");
                Ok(())
            }
            result = self.handler.handle(&mut ctx, &self.cancel) => result,
        };
        handled.map_err(Error::Handler)?;

        let response = ctx.into_response();
        trace!(
            status = response.status_code(),
            head_sent = response.head_sent(),
            "handler finished"
        );

        tokio::select! {
            biased;

            finished = response.finish() => finished?,
            _ = self.flush_deadline() => {
                debug!("response flush abandoned after cancellation");
                return Err(Error::Cancelled);
            }
        }

        Ok(())
    }

    async fn flush_deadline(&self) {
        self.cancel.cancelled().await;
        sleep(CANCELLED_FLUSH_GRACE).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{server::shutdown::Trigger, StatusCode};
    use std::{io, time::Duration};
    use tokio::io::{duplex, split, AsyncReadExt, AsyncWriteExt, DuplexStream};

    struct TestHandler;

    impl Handler for TestHandler {
        async fn handle(&self, ctx: &mut Context, cancel: &Cancellation) -> io::Result<()> {
            let (req, resp) = ctx.parts();

            match req.path() {
                "/" => {
                    resp.status(StatusCode::Ok);
                }
                "/body" => {
                    resp.header("Content-Length", 5);
                    resp.write_body("hello world").await?;
                }
                "/fail" => {
                    return Err(io::Error::new(io::ErrorKind::Other, "boom"));
                }
                "/big" => {
                    resp.header("X-Big", "a".repeat(100));
                    resp.write_body("body").await?;
                }
                "/slow" => {
                    resp.status(StatusCode::Accepted);
                    cancel.cancelled().await;
                    resp.status(StatusCode::Ok);
                }
                _ => {
                    resp.status(StatusCode::NotFound);
                }
            }

            Ok(())
        }
    }

    fn connection(trigger: &Trigger) -> HttpConnection<TestHandler> {
        HttpConnection::new(Arc::new(TestHandler), trigger.subscribe())
    }

    async fn exchange(input: &str) -> (Result<(), Error>, String) {
        let trigger = Trigger::new();
        let (mut client, server) = duplex(4096);
        client.write_all(input.as_bytes()).await.unwrap();
        client.shutdown().await.unwrap();

        let (reader, writer) = split(server);
        let result = connection(&trigger).run(reader, writer).await;

        (result, read_all(client).await)
    }

    async fn read_all(mut client: DuplexStream) -> String {
        let mut output = String::new();
        client.read_to_string(&mut output).await.unwrap();
        output
    }

    #[tokio::test]
    async fn default_response() {
        let (result, output) = exchange("GET / HTTP/1.1\r\nHost: localhost\r\n\r\n").await;

        assert!(result.is_ok());
        assert_eq!(output, "HTTP/1.1 200 OK\r\n\r\n");
    }

    #[tokio::test]
    async fn body_truncated() {
        let (result, output) = exchange("GET /body HTTP/1.0\r\n\r\n").await;

        assert!(result.is_ok());
        assert_eq!(output, "HTTP/1.0 200 OK\r\nContent-Length: 5\r\n\r\nhello");
    }

    #[tokio::test]
    async fn malformed_request_line() {
        let (result, output) = exchange("GET HTTP/1.1\r\n\r\n").await;

        assert!(matches!(result, Err(Error::MalformedRequestLine)));
        assert_eq!(output, "");
    }

    #[tokio::test]
    async fn oversized_head() {
        let headers: String = (0..200).map(|i| format!("H{i}: v\r\n")).collect();
        let (result, output) = exchange(&format!("GET / HTTP/1.1\r\n{headers}\r\n")).await;

        assert!(matches!(result, Err(Error::RequestHeadTooLarge)));
        assert_eq!(output, "");
    }

    #[tokio::test]
    async fn empty_connection() {
        let (result, output) = exchange("").await;

        assert!(matches!(result, Err(Error::MalformedRequestLine)));
        assert_eq!(output, "");
    }

    #[tokio::test]
    async fn handler_error_skips_flush() {
        let (result, output) = exchange("GET /fail HTTP/1.1\r\n\r\n").await;

        assert!(matches!(result, Err(Error::Handler(_))));
        assert_eq!(output, "");
    }

    #[tokio::test]
    async fn cancelled_handler_flushes_once() {
        let trigger = Trigger::new();
        let (mut client, server) = duplex(4096);
        client.write_all(b"GET /slow HTTP/1.1\r\n\r\n").await.unwrap();

        let (reader, writer) = split(server);
        let conn = connection(&trigger);
        let task = tokio::spawn(async move { conn.run(reader, writer).await });

        tokio::time::sleep(Duration::from_millis(20)).await;
        trigger.fire();

        assert!(task.await.unwrap().is_ok());
        assert_eq!(read_all(client).await, "HTTP/1.1 202 Accepted\r\n\r\n");
    }

    #[tokio::test]
    async fn cancelled_head_write_sends_one_head() {
        let trigger = Trigger::new();
        let (mut client, server) = duplex(32);
        client.write_all(b"GET /big HTTP/1.1\r\n\r\n").await.unwrap();

        let (reader, writer) = split(server);
        let conn = connection(&trigger);
        let task = tokio::spawn(async move { conn.run(reader, writer).await });

        // head write stalls on the full pipe
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.fire();

        let output = read_all(client).await;
        assert!(task.await.unwrap().is_ok());
        assert_eq!(
            output,
            format!("HTTP/1.1 200 OK\r\nX-Big: {}\r\n\r\n", "a".repeat(100))
        );
        assert_eq!(output.matches("HTTP/1.1").count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_flush_gives_up() {
        let trigger = Trigger::new();
        let (mut client, server) = duplex(32);
        client.write_all(b"GET /big HTTP/1.1\r\n\r\n").await.unwrap();

        let (reader, writer) = split(server);
        let conn = connection(&trigger);
        let task = tokio::spawn(async move { conn.run(reader, writer).await });

        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.fire();

        // the client never reads
        let result = tokio::time::timeout(Duration::from_secs(10), task).await;
        assert!(matches!(result, Ok(Ok(Err(Error::Cancelled)))));
        drop(client);
    }

    #[tokio::test]
    async fn cancelled_while_waiting() {
        let trigger = Trigger::new();
        let (client, server) = duplex(4096);

        let (reader, writer) = split(server);
        let conn = connection(&trigger);
        let task = tokio::spawn(async move { conn.run(reader, writer).await });

        tokio::time::sleep(Duration::from_millis(20)).await;
        trigger.fire();

        assert!(matches!(task.await.unwrap(), Err(Error::Cancelled)));
        assert_eq!(read_all(client).await, "");
    }
}
