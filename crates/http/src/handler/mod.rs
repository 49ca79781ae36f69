//! The middleware pipeline.
//!
//! A [`Pipeline`] is an ordered list of [`Middleware`]. Each one receives the
//! request [`Context`] and a [`Next`] handle to the rest of the list: it may
//! set a response and return without calling `next` (short-circuit), or call
//! `next.run(ctx)` and inspect or rewrite the response afterwards.
//!
//! ```
//! use futures::FutureExt;
//! use http::StatusCode;
//! use keel_http::handler::{PipelineBuilder, middleware_fn};
//! use keel_http::protocol::Response;
//!
//! let pipeline = PipelineBuilder::new()
//!     .add_last(middleware_fn(|ctx, _next| {
//!         async move { ctx.set_response(Response::with_text(StatusCode::OK, "hello")) }.boxed()
//!     }))
//!     .build();
//! assert_eq!(pipeline.len(), 1);
//! ```

use std::fmt;

use async_trait::async_trait;
use futures::future::BoxFuture;

use crate::protocol::Context;

#[async_trait]
pub trait Middleware: Send + Sync {
    async fn handle(&self, ctx: &mut Context, next: Next<'_>);
}

/// The middleware that follow the one currently running.
#[derive(Clone, Copy)]
pub struct Next<'a> {
    rest: &'a [Box<dyn Middleware>],
}

impl<'a> Next<'a> {
    /// Runs the following middleware; does nothing at the end of the list.
    pub async fn run(self, ctx: &mut Context) {
        if let Some((current, rest)) = self.rest.split_first() {
            current.handle(ctx, Next { rest }).await;
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rest.is_empty()
    }
}

impl fmt::Debug for Next<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Next").field("remaining", &self.rest.len()).finish()
    }
}

#[derive(Default)]
pub struct Pipeline {
    middlewares: Vec<Box<dyn Middleware>>,
}

impl Pipeline {
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::new()
    }

    /// Runs the pipeline from the first middleware.
    pub async fn execute(&self, ctx: &mut Context) {
        Next { rest: &self.middlewares }.run(ctx).await
    }

    pub fn len(&self) -> usize {
        self.middlewares.len()
    }

    pub fn is_empty(&self) -> bool {
        self.middlewares.is_empty()
    }
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline").field("middlewares", &self.middlewares.len()).finish()
    }
}

#[derive(Default)]
pub struct PipelineBuilder {
    middlewares: Vec<Box<dyn Middleware>>,
}

impl PipelineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_last<M: Middleware + 'static>(mut self, middleware: M) -> Self {
        self.middlewares.push(Box::new(middleware));
        self
    }

    pub fn add_first<M: Middleware + 'static>(mut self, middleware: M) -> Self {
        self.middlewares.insert(0, Box::new(middleware));
        self
    }

    pub fn build(self) -> Pipeline {
        Pipeline { middlewares: self.middlewares }
    }
}

impl fmt::Debug for PipelineBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineBuilder").field("middlewares", &self.middlewares.len()).finish()
    }
}

pub struct MiddlewareFn<F> {
    f: F,
}

impl<F> fmt::Debug for MiddlewareFn<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("MiddlewareFn")
    }
}

#[async_trait]
impl<F> Middleware for MiddlewareFn<F>
where
    F: for<'a> Fn(&'a mut Context, Next<'a>) -> BoxFuture<'a, ()> + Send + Sync,
{
    async fn handle(&self, ctx: &mut Context, next: Next<'_>) {
        (self.f)(ctx, next).await
    }
}

/// Adapts a closure returning a boxed future into a [`Middleware`].
pub fn middleware_fn<F>(f: F) -> MiddlewareFn<F>
where
    F: for<'a> Fn(&'a mut Context, Next<'a>) -> BoxFuture<'a, ()> + Send + Sync,
{
    MiddlewareFn { f }
}
