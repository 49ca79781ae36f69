//! Per-connection request processing.
//!
//! - [`Client`]: the transport contract a connection runs over
//! - [`HttpConnection`]: reads requests, runs the pipeline and writes
//!   responses until the connection ends, honoring keep-alive
//! - [`ConnectionConfig`]: retry, timeout and buffer settings

mod client;
mod config;
mod http_connection;
mod message_writer;

pub use client::Client;
pub use config::ConnectionConfig;
pub use http_connection::HttpConnection;
pub use message_writer::MessageWriter;
