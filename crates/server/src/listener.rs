//! Sources of accepted connections.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use keel_http::connection::Client;
use rustls::ServerConfig;
use tokio::net::{TcpListener, ToSocketAddrs};
use tokio_rustls::TlsAcceptor;
use tracing::trace;

use crate::client::{TcpClient, TlsClient};

/// Hands out connected clients, one per call to [`Listener::accept`].
///
/// Accepted clients have not been handshaken yet; the connection handler
/// does that under its own timeout.
#[async_trait]
pub trait Listener: Send + Sync {
    async fn accept(&self) -> io::Result<Box<dyn Client>>;

    fn local_addr(&self) -> io::Result<SocketAddr>;
}

#[derive(Debug)]
pub struct TcpListenerAdapter {
    inner: TcpListener,
}

impl TcpListenerAdapter {
    pub fn new(inner: TcpListener) -> Self {
        Self { inner }
    }

    pub async fn bind<A: ToSocketAddrs>(address: A) -> io::Result<Self> {
        TcpListener::bind(address).await.map(Self::new)
    }
}

#[async_trait]
impl Listener for TcpListenerAdapter {
    async fn accept(&self) -> io::Result<Box<dyn Client>> {
        let (stream, remote) = self.inner.accept().await?;
        if let Err(e) = stream.set_nodelay(true) {
            trace!(%remote, cause = %e, "failed to set nodelay");
        }
        Ok(Box::new(TcpClient::new(stream, remote)))
    }

    fn local_addr(&self) -> io::Result<SocketAddr> {
        self.inner.local_addr()
    }
}

/// Wraps every client of an inner listener into a [`TlsClient`].
pub struct TlsListener<L> {
    inner: L,
    acceptor: TlsAcceptor,
}

impl<L: Listener> TlsListener<L> {
    pub fn new(inner: L, config: Arc<ServerConfig>) -> Self {
        Self { inner, acceptor: TlsAcceptor::from(config) }
    }
}

impl<L: std::fmt::Debug> std::fmt::Debug for TlsListener<L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TlsListener").field("inner", &self.inner).finish_non_exhaustive()
    }
}

#[async_trait]
impl<L: Listener> Listener for TlsListener<L> {
    async fn accept(&self) -> io::Result<Box<dyn Client>> {
        let client = self.inner.accept().await?;
        Ok(Box::new(TlsClient::new(client, self.acceptor.clone())))
    }

    fn local_addr(&self) -> io::Result<SocketAddr> {
        self.inner.local_addr()
    }
}

#[cfg(test)]
mod tests {
    use futures::FutureExt;
    use http::StatusCode;
    use keel_http::handler::middleware_fn;
    use keel_http::protocol::Response;
    use rustls::server::{ClientHello, ResolvesServerCert};
    use rustls::sign::CertifiedKey;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;

    use super::*;
    use crate::Server;

    /// Has no certificate for anyone, so every handshake fails.
    #[derive(Debug)]
    struct NoCertificate;

    impl ResolvesServerCert for NoCertificate {
        fn resolve(&self, _client_hello: ClientHello<'_>) -> Option<Arc<CertifiedKey>> {
            None
        }
    }

    fn tls_config() -> Arc<ServerConfig> {
        let provider = Arc::new(rustls::crypto::aws_lc_rs::default_provider());
        let config = ServerConfig::builder_with_provider(provider)
            .with_safe_default_protocol_versions()
            .unwrap()
            .with_no_client_auth()
            .with_cert_resolver(Arc::new(NoCertificate));
        Arc::new(config)
    }

    #[tokio::test]
    async fn test_tcp_listener_reports_address() {
        let listener = TcpListenerAdapter::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();

        let (client, accepted) = tokio::join!(TcpStream::connect(address), listener.accept());
        let client = client.unwrap();
        let accepted = accepted.unwrap();

        assert!(accepted.is_connected());
        assert_eq!(accepted.remote_addr(), Some(client.local_addr().unwrap()));
    }

    #[tokio::test]
    async fn test_tls_client_unusable_before_handshake() {
        let inner = TcpListenerAdapter::bind("127.0.0.1:0").await.unwrap();
        let listener = TlsListener::new(inner, tls_config());
        let address = listener.local_addr().unwrap();

        let (_peer, accepted) = tokio::join!(TcpStream::connect(address), listener.accept());
        let mut accepted = accepted.unwrap();

        let mut buf = [0u8; 8];
        let error = accepted.read(&mut buf).await.unwrap_err();
        assert_eq!(error.kind(), io::ErrorKind::NotConnected);
        assert!(accepted.remote_addr().is_some());
    }

    #[tokio::test]
    async fn test_plain_http_on_tls_listener_is_not_served() {
        let inner = TcpListenerAdapter::bind("127.0.0.1:0").await.unwrap();
        let listener = TlsListener::new(inner, tls_config());
        let server = Server::builder()
            .listener(listener)
            .middleware(middleware_fn(|ctx, _next| {
                async move { ctx.set_response(Response::with_text(StatusCode::OK, "secret")) }.boxed()
            }))
            .build()
            .unwrap()
            .start()
            .unwrap();

        let mut stream = TcpStream::connect(server.local_addrs()[0]).await.unwrap();
        stream.write_all(b"GET / HTTP/1.1\r\n\r\n").await.unwrap();
        let mut received = Vec::new();
        // the server may reset the connection after its alert
        let _ = stream.read_to_end(&mut received).await;

        assert!(!received.starts_with(b"HTTP/"));
        assert!(!received.windows(6).any(|window| window == b"secret"));

        server.shutdown().await;
    }
}
