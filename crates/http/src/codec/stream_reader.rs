use async_trait::async_trait;
use bytes::Bytes;

use crate::protocol::ParseError;

/// How many bytes a [`StreamReader::read_bytes`] call should return.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ReadLength {
    /// Exactly this many bytes, or a [`ParseError::Truncated`] error.
    Exact(usize),
    /// Everything until the source is exhausted.
    ToEnd,
}

/// The line and block reading contract shared by the raw buffered reader and
/// the readers layered on top of it.
#[async_trait]
pub trait StreamReader: Send {
    /// Reads the next CRLF or LF terminated line with the terminator removed.
    ///
    /// Returns `Ok(None)` once the source is cleanly exhausted.
    async fn read_line(&mut self) -> Result<Option<String>, ParseError>;

    async fn read_bytes(&mut self, length: ReadLength) -> Result<Bytes, ParseError>;

    /// Number of raw bytes the last read took from the underlying source,
    /// including any line terminator or framing.
    fn last_consumed(&self) -> usize;
}
