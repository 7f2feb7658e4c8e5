use nimble_http::{Cancellation, Context, Handler, Server, ServerOptions, StatusCode};

struct HelloWorld;

impl Handler for HelloWorld {
    async fn handle(&self, ctx: &mut Context, _: &Cancellation) -> std::io::Result<()> {
        ctx.response()
            .status(StatusCode::Ok)
            .header("Content-Type", "text/plain")
            .header("Content-Length", 13);
        ctx.response().write_body("Hello, world!").await?;
        Ok(())
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let handle = Server::new(HelloWorld)
        .start(ServerOptions::default())
        .unwrap();

    tokio::signal::ctrl_c().await.unwrap();
    handle.stop().await;
}
