use std::sync::Arc;

use futures::FutureExt;
use http::StatusCode;
use keel_http::connection::ConnectionConfig;
use keel_http::handler::middleware_fn;
use keel_http::protocol::Response;
use keel_server::{DateHeader, DateService, NotFound, Server, TcpListenerAdapter};
use tracing::{Level, info};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let subscriber = FmtSubscriber::builder().with_max_level(Level::INFO).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let hello = middleware_fn(|ctx, next| {
        async move {
            match ctx.request().path() {
                "/" => {
                    let name = ctx.request().query().get("name").unwrap_or("world").to_owned();
                    ctx.set_response(Response::with_text(StatusCode::OK, format!("hello {name}")));
                }
                _ => next.run(ctx).await,
            }
        }
        .boxed()
    });

    let server = Server::builder()
        .listener(TcpListenerAdapter::bind("127.0.0.1:3000").await?)
        .middleware(NotFound)
        .middleware(DateHeader::new(Arc::new(DateService::new())))
        .middleware(hello)
        .config(ConnectionConfig::new().idle_timeout(Some(std::time::Duration::from_secs(30))))
        .build()?
        .start()?;

    let token = server.shutdown_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("ctrl-c received");
            token.cancel();
        }
    });

    server.wait().await;
    Ok(())
}
