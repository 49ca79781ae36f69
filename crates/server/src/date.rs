//! The `Date` response header.
//!
//! Formatting an HTTP date on every response is wasteful, so [`DateService`]
//! keeps a preformatted value that a background task refreshes. The
//! [`DateHeader`] middleware copies it into responses that lack one.

use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use async_trait::async_trait;
use bytes::Bytes;
use http::{HeaderValue, header};
use keel_http::handler::{Middleware, Next};
use keel_http::protocol::Context;
use tokio::task::JoinHandle;

pub const DEFAULT_UPDATE_INTERVAL: Duration = Duration::from_millis(800);

/// Maintains the current HTTP date string.
///
/// Must be created inside a tokio runtime. The refresh task stops when the
/// service is dropped.
#[derive(Debug)]
pub struct DateService {
    current: Arc<ArcSwap<Bytes>>,
    handle: JoinHandle<()>,
}

impl DateService {
    pub fn new() -> Self {
        Self::with_update_interval(DEFAULT_UPDATE_INTERVAL)
    }

    pub fn with_update_interval(update_interval: Duration) -> Self {
        let current = Arc::new(ArcSwap::from_pointee(format_now()));
        let current_arc = Arc::clone(&current);

        let handle = tokio::spawn(async move {
            loop {
                tokio::time::sleep(update_interval).await;
                current_arc.store(Arc::new(format_now()));
            }
        });

        Self { current, handle }
    }

    pub fn current(&self) -> Option<HeaderValue> {
        let date = self.current.load().as_ref().clone();
        HeaderValue::from_maybe_shared(date).ok()
    }
}

impl Default for DateService {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for DateService {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn format_now() -> Bytes {
    let mut buf = faf_http_date::get_date_buff_no_key();
    faf_http_date::get_date_no_key(&mut buf);
    Bytes::from_owner(buf)
}

/// Adds a `Date` header to every response that does not carry one.
#[derive(Debug, Clone)]
pub struct DateHeader {
    service: Arc<DateService>,
}

impl DateHeader {
    pub fn new(service: Arc<DateService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl Middleware for DateHeader {
    async fn handle(&self, ctx: &mut Context, next: Next<'_>) {
        next.run(ctx).await;

        let Some(response) = ctx.response_mut() else {
            return;
        };
        if response.headers().contains_key(header::DATE) {
            return;
        }
        if let Some(date) = self.service.current() {
            response.headers_mut().insert(header::DATE, date);
        }
    }
}
