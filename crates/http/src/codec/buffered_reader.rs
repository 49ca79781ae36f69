//! A buffered line/block reader over any [`AsyncRead`] source.
//!
//! The reader keeps a fixed-size refill buffer and only pulls a new chunk
//! from the source once every buffered byte has been handed out. Lines and
//! blocks can be mixed freely: a `read_bytes` call first drains whatever is
//! still buffered from previous line reads.

use async_trait::async_trait;
use bytes::{Buf, Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::trace;

use crate::codec::{ReadLength, StreamReader};
use crate::ensure;
use crate::protocol::ParseError;

/// Default size of the refill buffer.
pub const DEFAULT_BUFFER_SIZE: usize = 2 * 1024;

/// How line bytes are turned into text.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub enum LineEncoding {
    /// 7-bit ASCII, any other byte fails the read.
    #[default]
    Ascii,
    /// UTF-8 with invalid sequences replaced.
    Utf8,
}

#[derive(Debug)]
pub struct BufferedReader<R> {
    source: R,
    buffer: BytesMut,
    capacity: usize,
    encoding: LineEncoding,
    last_consumed: usize,
    eof: bool,
}

impl<R> BufferedReader<R>
where
    R: AsyncRead + Unpin,
{
    pub fn new(source: R) -> Self {
        Self::with_capacity(source, DEFAULT_BUFFER_SIZE)
    }

    pub fn with_capacity(source: R, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            source,
            buffer: BytesMut::with_capacity(capacity),
            capacity,
            encoding: LineEncoding::default(),
            last_consumed: 0,
            eof: false,
        }
    }

    /// Overrides the strict ASCII decoding of lines.
    pub fn encoding(mut self, encoding: LineEncoding) -> Self {
        self.encoding = encoding;
        self
    }

    pub fn get_ref(&self) -> &R {
        &self.source
    }

    #[inline]
    pub fn get_mut(&mut self) -> &mut R {
        &mut self.source
    }

    pub fn into_inner(self) -> R {
        self.source
    }

    /// Bytes read from the source but not handed out yet.
    pub fn buffered(&self) -> &[u8] {
        &self.buffer
    }

    /// Pulls the next chunk from the source into the empty buffer.
    ///
    /// Returns `false` once the source is exhausted.
    async fn fill_buf(&mut self) -> Result<bool, ParseError> {
        debug_assert!(self.buffer.is_empty());
        if self.eof {
            return Ok(false);
        }

        self.buffer.reserve(self.capacity);
        let mut limited = (&mut self.source).take(self.capacity as u64);
        let read = limited.read_buf(&mut self.buffer).await?;
        trace!(read, "refill reader buffer");
        if read == 0 {
            self.eof = true;
        }
        Ok(read != 0)
    }

    fn decode(&self, bytes: &[u8]) -> Result<String, ParseError> {
        match self.encoding {
            LineEncoding::Ascii => {
                ensure!(bytes.is_ascii(), ParseError::InvalidEncoding { encoding: "ascii" });
                // ascii is a subset of utf-8
                Ok(String::from_utf8_lossy(bytes).into_owned())
            }
            LineEncoding::Utf8 => Ok(String::from_utf8_lossy(bytes).into_owned()),
        }
    }
}

#[async_trait]
impl<R> StreamReader for BufferedReader<R>
where
    R: AsyncRead + Unpin + Send,
{
    async fn read_line(&mut self) -> Result<Option<String>, ParseError> {
        self.last_consumed = 0;
        let mut line = BytesMut::new();

        loop {
            if self.buffer.is_empty() && !self.fill_buf().await? {
                if self.last_consumed == 0 {
                    return Ok(None);
                }
                // unterminated last line
                let text = self.decode(&line)?;
                return Ok(Some(text));
            }

            match self.buffer.iter().position(|&b| b == b'\n') {
                Some(index) => {
                    line.extend_from_slice(&self.buffer[..index]);
                    self.buffer.advance(index + 1);
                    self.last_consumed += index + 1;
                    if line.last() == Some(&b'\r') {
                        line.truncate(line.len() - 1);
                    }
                    let text = self.decode(&line)?;
                    return Ok(Some(text));
                }
                None => {
                    self.last_consumed += self.buffer.len();
                    line.extend_from_slice(&self.buffer);
                    self.buffer.clear();
                }
            }
        }
    }

    async fn read_bytes(&mut self, length: ReadLength) -> Result<Bytes, ParseError> {
        self.last_consumed = 0;
        match length {
            ReadLength::Exact(count) => {
                // the length comes from the peer, grow with the data actually read
                let mut bytes = BytesMut::with_capacity(count.min(self.capacity));
                while bytes.len() < count {
                    if self.buffer.is_empty() && !self.fill_buf().await? {
                        self.last_consumed = bytes.len();
                        return Err(ParseError::truncated(count, bytes.len()));
                    }
                    let take = (count - bytes.len()).min(self.buffer.len());
                    bytes.extend_from_slice(&self.buffer.split_to(take));
                }
                self.last_consumed = count;
                Ok(bytes.freeze())
            }
            ReadLength::ToEnd => {
                let mut bytes = BytesMut::new();
                loop {
                    if self.buffer.is_empty() && !self.fill_buf().await? {
                        break;
                    }
                    bytes.extend_from_slice(&self.buffer);
                    self.buffer.clear();
                }
                self.last_consumed = bytes.len();
                Ok(bytes.freeze())
            }
        }
    }

    fn last_consumed(&self) -> usize {
        self.last_consumed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_read_lines() {
        let mut reader = BufferedReader::new(&b"first\r\nsecond\nthird"[..]);

        assert_eq!(reader.read_line().await.unwrap().as_deref(), Some("first"));
        assert_eq!(reader.last_consumed(), 7);

        assert_eq!(reader.read_line().await.unwrap().as_deref(), Some("second"));
        assert_eq!(reader.last_consumed(), 7);

        assert_eq!(reader.read_line().await.unwrap().as_deref(), Some("third"));
        assert_eq!(reader.last_consumed(), 5);

        assert_eq!(reader.read_line().await.unwrap(), None);
        assert_eq!(reader.last_consumed(), 0);
    }

    #[tokio::test]
    async fn test_empty_line_is_not_eof() {
        let mut reader = BufferedReader::new(&b"\r\n"[..]);
        assert_eq!(reader.read_line().await.unwrap().as_deref(), Some(""));
        assert_eq!(reader.last_consumed(), 2);
        assert_eq!(reader.read_line().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_line_across_refills() {
        // a tiny buffer forces every line to span several refills
        let mut reader = BufferedReader::with_capacity(&b"Host: localhost\r\n\r\n"[..], 3);
        assert_eq!(reader.read_line().await.unwrap().as_deref(), Some("Host: localhost"));
        assert_eq!(reader.last_consumed(), 17);
        assert_eq!(reader.read_line().await.unwrap().as_deref(), Some(""));
    }

    #[tokio::test]
    async fn test_crlf_split_between_refills() {
        let mut reader = BufferedReader::with_capacity(&b"ab\r\ncd\r\n"[..], 3);
        assert_eq!(reader.read_line().await.unwrap().as_deref(), Some("ab"));
        assert_eq!(reader.read_line().await.unwrap().as_deref(), Some("cd"));
    }

    #[tokio::test]
    async fn test_strict_ascii() {
        let mut reader = BufferedReader::new(&"caf\u{e9}\r\n".as_bytes()[..]);
        let result = reader.read_line().await;
        assert!(matches!(result, Err(ParseError::InvalidEncoding { .. })));
    }

    #[tokio::test]
    async fn test_utf8_override() {
        let mut reader = BufferedReader::new(&"caf\u{e9}\r\n".as_bytes()[..]).encoding(LineEncoding::Utf8);
        assert_eq!(reader.read_line().await.unwrap().as_deref(), Some("caf\u{e9}"));
    }

    #[tokio::test]
    async fn test_mix_lines_and_bytes() {
        let mut reader = BufferedReader::with_capacity(&b"POST\r\n0123456789rest"[..], 4);
        assert_eq!(reader.read_line().await.unwrap().as_deref(), Some("POST"));

        let bytes = reader.read_bytes(ReadLength::Exact(10)).await.unwrap();
        assert_eq!(&bytes[..], b"0123456789");
        assert_eq!(reader.last_consumed(), 10);

        let rest = reader.read_bytes(ReadLength::ToEnd).await.unwrap();
        assert_eq!(&rest[..], b"rest");
        assert_eq!(reader.last_consumed(), 4);
    }

    #[tokio::test]
    async fn test_read_bytes_truncated() {
        let mut reader = BufferedReader::new(&b"short"[..]);
        let result = reader.read_bytes(ReadLength::Exact(10)).await;
        match result {
            Err(ParseError::Truncated { expected, actual }) => {
                assert_eq!(expected, 10);
                assert_eq!(actual, 5);
            }
            other => panic!("expected truncated error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_read_bytes_beyond_memory_is_truncated() {
        let mut reader = BufferedReader::new(&b"short"[..]);
        let result = reader.read_bytes(ReadLength::Exact(usize::MAX)).await;
        assert!(matches!(result, Err(ParseError::Truncated { expected: usize::MAX, actual: 5 })));
    }

    #[tokio::test]
    async fn test_read_zero_bytes() {
        let mut reader = BufferedReader::new(&b""[..]);
        let bytes = reader.read_bytes(ReadLength::Exact(0)).await.unwrap();
        assert!(bytes.is_empty());
    }
}
