//! Transport clients.
//!
//! [`TcpClient`] wraps an accepted socket and notices when the peer goes
//! away. [`TlsClient`] decorates any other [`Client`] with a server-side TLS
//! session that is negotiated in [`Client::handshake`].

use std::io;
use std::mem;
use std::net::SocketAddr;
use std::pin::Pin;
use std::task::{Context, Poll};

use async_trait::async_trait;
use keel_http::connection::Client;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, ReadBuf};
use tokio::net::TcpStream;
use tokio_rustls::TlsAcceptor;
use tokio_rustls::server::TlsStream;
use tracing::trace;

#[derive(Debug)]
pub struct TcpClient {
    stream: TcpStream,
    remote: SocketAddr,
    connected: bool,
}

impl TcpClient {
    pub fn new(stream: TcpStream, remote: SocketAddr) -> Self {
        Self { stream, remote, connected: true }
    }

    pub fn get_ref(&self) -> &TcpStream {
        &self.stream
    }
}

impl AsyncRead for TcpClient {
    fn poll_read(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        let before = buf.filled().len();
        let result = Pin::new(&mut this.stream).poll_read(cx, buf);
        match &result {
            // end of stream: nothing was filled although there was room
            Poll::Ready(Ok(())) if buf.filled().len() == before && buf.remaining() > 0 => {
                trace!(remote = %this.remote, "peer closed the connection");
                this.connected = false;
            }
            Poll::Ready(Err(_)) => this.connected = false,
            _ => {}
        }
        result
    }
}

impl AsyncWrite for TcpClient {
    fn poll_write(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &[u8]) -> Poll<io::Result<usize>> {
        let this = self.get_mut();
        let result = Pin::new(&mut this.stream).poll_write(cx, buf);
        if let Poll::Ready(Err(_)) = &result {
            this.connected = false;
        }
        result
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().stream).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        this.connected = false;
        Pin::new(&mut this.stream).poll_shutdown(cx)
    }
}

#[async_trait]
impl Client for TcpClient {
    fn is_connected(&self) -> bool {
        self.connected
    }

    fn remote_addr(&self) -> Option<SocketAddr> {
        Some(self.remote)
    }

    async fn close(&mut self) -> io::Result<()> {
        self.connected = false;
        self.stream.shutdown().await
    }
}

enum TlsState<C> {
    Pending { inner: C, acceptor: TlsAcceptor },
    Established(Box<TlsStream<C>>),
    Failed,
}

/// A server-side TLS session over another client.
///
/// Reading or writing before a successful [`Client::handshake`] fails with
/// [`io::ErrorKind::NotConnected`].
pub struct TlsClient<C> {
    state: TlsState<C>,
    remote: Option<SocketAddr>,
}

impl<C: Client> TlsClient<C> {
    pub fn new(inner: C, acceptor: TlsAcceptor) -> Self {
        let remote = inner.remote_addr();
        Self { state: TlsState::Pending { inner, acceptor }, remote }
    }

    pub fn is_established(&self) -> bool {
        matches!(self.state, TlsState::Established(_))
    }

    fn stream(&mut self) -> io::Result<&mut TlsStream<C>> {
        match &mut self.state {
            TlsState::Established(stream) => Ok(&mut **stream),
            _ => Err(io::Error::new(io::ErrorKind::NotConnected, "tls session is not established")),
        }
    }
}

impl<C> std::fmt::Debug for TlsClient<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = match self.state {
            TlsState::Pending { .. } => "pending",
            TlsState::Established(_) => "established",
            TlsState::Failed => "failed",
        };
        f.debug_struct("TlsClient").field("state", &state).field("remote", &self.remote).finish()
    }
}

impl<C: Client> AsyncRead for TlsClient<C> {
    fn poll_read(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<io::Result<()>> {
        match self.get_mut().stream() {
            Ok(stream) => Pin::new(stream).poll_read(cx, buf),
            Err(e) => Poll::Ready(Err(e)),
        }
    }
}

impl<C: Client> AsyncWrite for TlsClient<C> {
    fn poll_write(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &[u8]) -> Poll<io::Result<usize>> {
        match self.get_mut().stream() {
            Ok(stream) => Pin::new(stream).poll_write(cx, buf),
            Err(e) => Poll::Ready(Err(e)),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut().stream() {
            Ok(stream) => Pin::new(stream).poll_flush(cx),
            Err(e) => Poll::Ready(Err(e)),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut().stream() {
            Ok(stream) => Pin::new(stream).poll_shutdown(cx),
            Err(e) => Poll::Ready(Err(e)),
        }
    }
}

#[async_trait]
impl<C: Client> Client for TlsClient<C> {
    fn is_connected(&self) -> bool {
        match &self.state {
            TlsState::Pending { inner, .. } => inner.is_connected(),
            TlsState::Established(stream) => stream.get_ref().0.is_connected(),
            TlsState::Failed => false,
        }
    }

    fn remote_addr(&self) -> Option<SocketAddr> {
        self.remote
    }

    async fn handshake(&mut self) -> io::Result<()> {
        match mem::replace(&mut self.state, TlsState::Failed) {
            TlsState::Pending { inner, acceptor } => {
                let stream = acceptor.accept(inner).await?;
                trace!(remote = ?self.remote, "tls session established");
                self.state = TlsState::Established(Box::new(stream));
                Ok(())
            }
            established @ TlsState::Established(_) => {
                self.state = established;
                Ok(())
            }
            TlsState::Failed => Err(io::Error::new(io::ErrorKind::NotConnected, "tls handshake already failed")),
        }
    }

    async fn close(&mut self) -> io::Result<()> {
        match &mut self.state {
            TlsState::Pending { inner, .. } => inner.close().await,
            // sends close_notify before closing the transport
            TlsState::Established(stream) => stream.shutdown().await,
            TlsState::Failed => Ok(()),
        }
    }
}
