//! Listeners, TLS and lifecycle for keel.
//!
//! `keel-http` handles a single connection; this crate feeds it. A [`Server`]
//! runs one accept loop per [`Listener`], spawns an
//! [`HttpConnection`](keel_http::connection::HttpConnection) for every client
//! and, on shutdown, stops accepting and waits for open connections.
//!
//! ```no_run
//! use keel_server::{NotFound, Server, TcpListenerAdapter};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let listener = TcpListenerAdapter::bind("127.0.0.1:8080").await?;
//! let server = Server::builder().listener(listener).middleware(NotFound).build()?.start()?;
//! server.wait().await;
//! # Ok(())
//! # }
//! ```

mod client;
mod date;
mod listener;
mod not_found;
mod server;

pub use client::{TcpClient, TlsClient};
pub use date::{DEFAULT_UPDATE_INTERVAL, DateHeader, DateService};
pub use listener::{Listener, TcpListenerAdapter, TlsListener};
pub use not_found::NotFound;
pub use server::{RunningServer, Server, ServerBuildError, ServerBuilder};
