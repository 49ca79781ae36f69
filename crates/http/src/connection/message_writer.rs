use bytes::BytesMut;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio_util::codec::Encoder;

use crate::codec::{ResponseEncoder, ResponseHead};
use crate::protocol::SendError;

/// Buffers encoded responses until an explicit flush.
///
/// The writer does not own the transport: the connection reads and writes
/// through the same client, so the target is passed to [`flush`](Self::flush).
#[derive(Debug)]
pub struct MessageWriter {
    buffer: BytesMut,
    encoder: ResponseEncoder,
}

impl MessageWriter {
    pub fn with_capacity(buffer_size: usize) -> Self {
        Self { buffer: BytesMut::with_capacity(buffer_size), encoder: ResponseEncoder::new() }
    }

    pub fn clear_buf(&mut self) {
        self.buffer.clear();
    }

    pub fn buffered(&self) -> &[u8] {
        &self.buffer
    }

    #[inline]
    pub fn write(&mut self, item: ResponseHead<'_>) -> Result<(), SendError> {
        self.encoder.encode(item, &mut self.buffer)
    }

    #[inline]
    pub async fn flush<W>(&mut self, writer: &mut W) -> Result<(), SendError>
    where
        W: AsyncWrite + Unpin + ?Sized,
    {
        if self.buffer.is_empty() {
            return Ok(());
        }

        writer.write_all(self.buffer.as_ref()).await?;
        self.buffer.clear();
        Ok(writer.flush().await?)
    }
}
