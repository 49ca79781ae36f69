use bytes::{BufMut, BytesMut};
use tokio_util::codec::Encoder;

use crate::codec::header::{HeaderEncoder, ResponseHead};
use crate::protocol::SendError;

/// Serializes a whole response: status line, headers and body.
#[derive(Debug, Default)]
pub struct ResponseEncoder {
    header_encoder: HeaderEncoder,
}

impl ResponseEncoder {
    pub fn new() -> Self {
        Default::default()
    }
}

impl<'a> Encoder<ResponseHead<'a>> for ResponseEncoder {
    type Error = SendError;

    fn encode(&mut self, item: ResponseHead<'a>, dst: &mut BytesMut) -> Result<(), Self::Error> {
        self.header_encoder.encode(item, dst)?;
        dst.put_slice(item.response.body());
        Ok(())
    }
}
