//! Try it:
//! ```text
//! curl -i http://127.0.0.1:8080/
//! curl -i http://127.0.0.1:8080/content-length
//! curl -i -H "Custom-Header: hi" http://127.0.0.1:8080/custom-header
//! curl -i http://127.0.0.1:8080/slow
//! ```
//! `RUST_LOG=nimble_http=trace` shows every parsing step.

use nimble_http::{Cancellation, Context, Handler, Server, ServerOptions, StatusCode};
use std::{io, time::Duration};

struct Routes;

impl Handler for Routes {
    async fn handle(&self, ctx: &mut Context, cancel: &Cancellation) -> io::Result<()> {
        let (req, resp) = ctx.parts();

        match (req.method(), req.path()) {
            ("GET", "/") => {
                resp.status(StatusCode::Ok);
            }
            ("GET", "/content-length") => {
                // only "0123456789" reaches the client
                resp.status(StatusCode::Ok).header("Content-Length", 10);
                resp.write_body("0123456789abcdefghij").await?;
            }
            ("GET", "/custom-header") => {
                let value = req.header("Custom-Header").unwrap_or_default();
                resp.status(StatusCode::Ok)
                    .header("Content-Type", "text/plain")
                    .header("Content-Length", value.len());
                resp.write_body(value).await?;
            }
            ("GET", "/slow") => {
                for i in 0..10 {
                    if cancel.is_cancelled() {
                        break;
                    }
                    resp.write_body(format!("tick {i}\n")).await?;
                    tokio::time::sleep(Duration::from_millis(500)).await;
                }
            }
            _ => {
                resp.status(StatusCode::NotFound)
                    .header("Content-Type", "text/plain")
                    .header("Content-Length", 9);
                resp.write_body("Not Found").await?;
            }
        }

        Ok(())
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "nimble_http=debug".into()),
        )
        .init();

    let port = std::env::var("PORT")
        .ok()
        .and_then(|port| port.parse().ok())
        .unwrap_or(8080);

    let handle = match Server::new(Routes).start(ServerOptions::with_port(port)) {
        Ok(handle) => handle,
        Err(err) => {
            eprintln!("{err}");
            std::process::exit(1);
        }
    };

    tokio::signal::ctrl_c().await.unwrap();

    if !handle.shutdown(Duration::from_secs(3)).await {
        eprintln!("cancelled requests still in flight");
    }
}
