use async_trait::async_trait;
use http::StatusCode;
use keel_http::handler::{Middleware, Next};
use keel_http::protocol::{Context, Response};
use tracing::debug;

/// Answers `404 Not Found` when nothing further down the pipeline responded.
///
/// Register it first so that it sees the outcome of every other middleware.
#[derive(Debug, Clone, Copy, Default)]
pub struct NotFound;

#[async_trait]
impl Middleware for NotFound {
    async fn handle(&self, ctx: &mut Context, next: Next<'_>) {
        next.run(ctx).await;

        if ctx.response().is_none() {
            debug!(path = ctx.request().path(), "no middleware responded");
            let body = format!("no resource at {}", ctx.request().path());
            ctx.set_response(Response::with_text(StatusCode::NOT_FOUND, body));
        }
    }
}
