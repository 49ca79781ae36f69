//! Server lifecycle: accept loops, connection tasks and graceful shutdown.

use std::fmt;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use keel_http::codec::{HttpRequestProvider, RequestProvider};
use keel_http::connection::{ConnectionConfig, HttpConnection};
use keel_http::handler::{Middleware, Pipeline, PipelineBuilder};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use crate::listener::Listener;

pub struct ServerBuilder {
    listeners: Vec<Box<dyn Listener>>,
    pipeline: PipelineBuilder,
    config: ConnectionConfig,
}

impl ServerBuilder {
    fn new() -> Self {
        Self { listeners: Vec::new(), pipeline: PipelineBuilder::new(), config: ConnectionConfig::default() }
    }

    pub fn listener(mut self, listener: impl Listener + 'static) -> Self {
        self.listeners.push(Box::new(listener));
        self
    }

    /// Appends a middleware to the end of the pipeline.
    pub fn middleware(mut self, middleware: impl Middleware + 'static) -> Self {
        self.pipeline = self.pipeline.add_last(middleware);
        self
    }

    pub fn config(mut self, config: ConnectionConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> Result<Server, ServerBuildError> {
        if self.listeners.is_empty() {
            return Err(ServerBuildError::MissingListener);
        }
        let provider = HttpRequestProvider::new().allow_trailers(self.config.get_allow_trailers());
        Ok(Server {
            listeners: self.listeners,
            provider: Arc::new(provider),
            pipeline: Arc::new(self.pipeline.build()),
            config: self.config,
        })
    }
}

impl fmt::Debug for ServerBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerBuilder").field("listeners", &self.listeners.len()).field("config", &self.config).finish()
    }
}

#[derive(Error, Debug)]
pub enum ServerBuildError {
    #[error("at least one listener must be set")]
    MissingListener,
}

pub struct Server {
    listeners: Vec<Box<dyn Listener>>,
    provider: Arc<dyn RequestProvider>,
    pipeline: Arc<Pipeline>,
    config: ConnectionConfig,
}

impl fmt::Debug for Server {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Server")
            .field("listeners", &self.listeners.len())
            .field("middlewares", &self.pipeline.len())
            .field("config", &self.config)
            .finish()
    }
}

impl Server {
    pub fn builder() -> ServerBuilder {
        ServerBuilder::new()
    }

    /// Spawns one accept loop per listener and returns immediately.
    ///
    /// Must be called inside a tokio runtime.
    pub fn start(self) -> io::Result<RunningServer> {
        let local_addrs = self.listeners.iter().map(|listener| listener.local_addr()).collect::<io::Result<Vec<_>>>()?;
        info!(addresses = ?local_addrs, "start listening");

        let token = CancellationToken::new();
        let tracker = TaskTracker::new();

        for listener in self.listeners {
            let acceptor = Acceptor {
                listener,
                provider: Arc::clone(&self.provider),
                pipeline: Arc::clone(&self.pipeline),
                config: self.config.clone(),
                token: token.clone(),
                tracker: tracker.clone(),
            };
            tracker.spawn(acceptor.run());
        }

        Ok(RunningServer { token, tracker, local_addrs })
    }
}

struct Acceptor {
    listener: Box<dyn Listener>,
    provider: Arc<dyn RequestProvider>,
    pipeline: Arc<Pipeline>,
    config: ConnectionConfig,
    token: CancellationToken,
    tracker: TaskTracker,
}

impl Acceptor {
    async fn run(self) {
        loop {
            let client = tokio::select! {
                () = self.token.cancelled() => break,
                accepted = self.listener.accept() => match accepted {
                    Ok(client) => client,
                    Err(e) => {
                        warn!(cause = %e, "failed to accept");
                        continue;
                    }
                },
            };

            debug!(remote = ?client.remote_addr(), "accepted connection");
            let connection =
                HttpConnection::new(client, Arc::clone(&self.provider), Arc::clone(&self.pipeline), self.config.clone())
                    .with_shutdown(self.token.clone());
            self.tracker.spawn(connection.process());
        }
        debug!("accept loop stopped");
    }
}

/// Handle to a started [`Server`].
#[derive(Debug)]
pub struct RunningServer {
    token: CancellationToken,
    tracker: TaskTracker,
    local_addrs: Vec<SocketAddr>,
}

impl RunningServer {
    /// Addresses of the listeners, in the order they were added.
    pub fn local_addrs(&self) -> &[SocketAddr] {
        &self.local_addrs
    }

    /// Cancelling this token has the same effect as [`RunningServer::shutdown`]
    /// without waiting.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Stops accepting and waits until every open connection has finished.
    pub async fn shutdown(self) {
        info!("shutting down");
        self.token.cancel();
        self.wait().await;
    }

    /// Waits until the server has been shut down through its token and
    /// every connection has finished.
    pub async fn wait(self) {
        self.token.cancelled().await;
        self.tracker.close();
        self.tracker.wait().await;
        info!("server stopped");
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use futures::FutureExt;
    use http::StatusCode;
    use keel_http::connection::Client;
    use keel_http::handler::middleware_fn;
    use keel_http::protocol::Response;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;

    use super::*;
    use crate::listener::TcpListenerAdapter;

    fn hello() -> impl Middleware {
        middleware_fn(|ctx, _next| {
            async move {
                let text = format!("hello {}", ctx.request().path());
                ctx.set_response(Response::with_text(StatusCode::OK, text))
            }
            .boxed()
        })
    }

    async fn roundtrip(address: SocketAddr, raw: &[u8]) -> String {
        let mut stream = TcpStream::connect(address).await.unwrap();
        stream.write_all(raw).await.unwrap();
        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();
        response
    }

    #[test]
    fn test_build_without_listener() {
        let result = Server::builder().middleware(hello()).build();
        assert!(matches!(result, Err(ServerBuildError::MissingListener)));
    }

    #[tokio::test]
    async fn test_serves_over_tcp_until_shutdown() {
        let listener = TcpListenerAdapter::bind("127.0.0.1:0").await.unwrap();
        let server = Server::builder().listener(listener).middleware(hello()).build().unwrap().start().unwrap();
        let address = server.local_addrs()[0];

        let response = roundtrip(address, b"GET /world HTTP/1.1\r\nHost: localhost\r\n\r\n").await;
        assert!(response.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(response.contains("connection: close\r\n"));
        assert!(response.ends_with("\r\n\r\nhello /world"));

        server.shutdown().await;
        assert!(TcpStream::connect(address).await.is_err());
    }

    #[tokio::test]
    async fn test_shutdown_closes_idle_keep_alive_connection() {
        let listener = TcpListenerAdapter::bind("127.0.0.1:0").await.unwrap();
        let config = ConnectionConfig::new().keep_alive_retries(u32::MAX);
        let server =
            Server::builder().listener(listener).middleware(hello()).config(config).build().unwrap().start().unwrap();

        let mut stream = TcpStream::connect(server.local_addrs()[0]).await.unwrap();
        stream.write_all(b"GET / HTTP/1.1\r\nConnection: keep-alive\r\n\r\n").await.unwrap();
        let mut buf = [0u8; 256];
        let n = stream.read(&mut buf).await.unwrap();
        assert!(buf[..n].starts_with(b"HTTP/1.1 200 OK\r\n"));

        server.shutdown().await;

        let mut rest = Vec::new();
        stream.read_to_end(&mut rest).await.unwrap();
        assert!(rest.is_empty());
    }

    struct FlakyListener {
        inner: TcpListenerAdapter,
        failures: AtomicUsize,
    }

    #[async_trait]
    impl Listener for FlakyListener {
        async fn accept(&self) -> io::Result<Box<dyn Client>> {
            if self.failures.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1)).is_ok() {
                return Err(io::Error::other("too many open files"));
            }
            self.inner.accept().await
        }

        fn local_addr(&self) -> io::Result<SocketAddr> {
            self.inner.local_addr()
        }
    }

    #[tokio::test]
    async fn test_accept_error_does_not_stop_loop() {
        let inner = TcpListenerAdapter::bind("127.0.0.1:0").await.unwrap();
        let listener = FlakyListener { inner, failures: AtomicUsize::new(2) };
        let server = Server::builder().listener(listener).middleware(hello()).build().unwrap().start().unwrap();

        let response = roundtrip(server.local_addrs()[0], b"GET /again HTTP/1.0\r\n\r\n").await;
        assert!(response.starts_with("HTTP/1.0 200 OK\r\n"));

        server.shutdown().await;
    }
}
