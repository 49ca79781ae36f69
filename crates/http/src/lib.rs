//! The wire protocol core of an embeddable HTTP/1.x server.
//!
//! This crate reads requests from raw byte streams, runs them through an
//! ordered middleware pipeline and writes the responses back. It parses
//! request lines, headers, `Content-Length` and chunked bodies, urlencoded
//! forms and multipart bodies itself, without an external HTTP parser.
//!
//! # Features
//!
//! - HTTP/1.0 and HTTP/1.1 requests, including the version-less HTTP/0.9 line
//! - Keep-alive connections with a bounded number of empty retries
//! - Chunked transfer encoding with optional trailers (`TE: trailers`)
//! - Lazily parsed form and multipart bodies with zero-copy parts
//! - A transport-agnostic [`connection::Client`] trait, so TCP, TLS or an
//!   in-memory pipe all serve the same way
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use futures::FutureExt;
//! use http::StatusCode;
//! use keel_http::codec::HttpRequestProvider;
//! use keel_http::connection::{Client, ConnectionConfig, HttpConnection};
//! use keel_http::handler::{Pipeline, PipelineBuilder, middleware_fn};
//! use keel_http::protocol::Response;
//!
//! fn pipeline() -> Pipeline {
//!     PipelineBuilder::new()
//!         .add_last(middleware_fn(|ctx, _next| {
//!             async move {
//!                 let greeting = format!("Hello {}!", ctx.request().query().get("name").unwrap_or("World"));
//!                 ctx.set_response(Response::with_text(StatusCode::OK, greeting));
//!             }
//!             .boxed()
//!         }))
//!         .build()
//! }
//!
//! async fn serve<C: Client>(client: C, pipeline: Arc<Pipeline>) {
//!     let provider = Arc::new(HttpRequestProvider::new());
//!     HttpConnection::new(client, provider, pipeline, ConnectionConfig::default()).process().await;
//! }
//! ```
//!
//! # Architecture
//!
//! - [`codec`]: the buffered reader, chunked decoder, multipart parser,
//!   request provider and response encoder
//! - [`connection`]: the per-connection loop and its configuration
//! - [`handler`]: the middleware pipeline
//! - [`protocol`]: requests, responses, bodies, versions and errors
//!
//! Listeners, TLS and the server lifecycle live in the `keel-server` crate.
//!
//! # Error Handling
//!
//! - [`protocol::ParseError`]: malformed or truncated input
//! - [`protocol::SendError`]: failures writing a response
//! - [`protocol::HttpError`]: everything that can end a connection
//!
//! Connection errors are logged and close the connection; they never escape
//! [`connection::HttpConnection::process`].

pub mod codec;
pub mod connection;
pub mod handler;
pub mod protocol;

mod utils;
pub(crate) use utils::ensure;
