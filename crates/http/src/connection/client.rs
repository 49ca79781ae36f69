use std::io;
use std::net::SocketAddr;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};

/// A connected peer as seen by [`HttpConnection`](super::HttpConnection).
///
/// Implementations decide how a transport is secured and when it counts as
/// disconnected; the connection handler only reads, writes and asks.
#[async_trait]
pub trait Client: AsyncRead + AsyncWrite + Unpin + Send {
    fn is_connected(&self) -> bool;

    fn remote_addr(&self) -> Option<SocketAddr>;

    /// Finishes any transport negotiation before the first request.
    async fn handshake(&mut self) -> io::Result<()> {
        Ok(())
    }

    async fn close(&mut self) -> io::Result<()> {
        self.shutdown().await
    }
}

#[async_trait]
impl<C: Client + ?Sized> Client for Box<C> {
    fn is_connected(&self) -> bool {
        (**self).is_connected()
    }

    fn remote_addr(&self) -> Option<SocketAddr> {
        (**self).remote_addr()
    }

    async fn handshake(&mut self) -> io::Result<()> {
        (**self).handshake().await
    }

    async fn close(&mut self) -> io::Result<()> {
        (**self).close().await
    }
}
