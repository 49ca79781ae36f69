//! Decoder for HTTP chunked transfer encoding.
//!
//! The decoder is itself a [`StreamReader`] layered over the connection reader:
//! reads return the dechunked payload while the framing (size lines, chunk
//! terminators and the trailer section) is consumed underneath. See
//! [RFC 7230 Section 4.1](https://tools.ietf.org/html/rfc7230#section-4.1).

use std::mem;

use async_trait::async_trait;
use bytes::{Buf, Bytes, BytesMut};
use http::HeaderMap;
use tracing::trace;

use crate::codec::header::read_headers;
use crate::codec::{ReadLength, StreamReader};
use crate::ensure;
use crate::protocol::ParseError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChunkedState {
    /// Expecting a size line
    Size,
    /// The zero-sized chunk and its trailer section were read
    End,
}

pub struct ChunkedDecoder<'a> {
    inner: &'a mut dyn StreamReader,
    state: ChunkedState,
    allow_trailers: bool,
    trailers: HeaderMap,
    // dechunked bytes not handed out by `read_line` yet
    pending: BytesMut,
    last_consumed: usize,
}

impl std::fmt::Debug for ChunkedDecoder<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChunkedDecoder")
            .field("state", &self.state)
            .field("allow_trailers", &self.allow_trailers)
            .field("pending", &self.pending.len())
            .finish_non_exhaustive()
    }
}

impl<'a> ChunkedDecoder<'a> {
    pub fn new(inner: &'a mut dyn StreamReader) -> Self {
        Self {
            inner,
            state: ChunkedState::Size,
            allow_trailers: false,
            trailers: HeaderMap::new(),
            pending: BytesMut::new(),
            last_consumed: 0,
        }
    }

    /// Keep the trailer fields after the last chunk instead of discarding them.
    pub fn allow_trailers(mut self, allow: bool) -> Self {
        self.allow_trailers = allow;
        self
    }

    /// Trailer fields read so far; empty unless trailers are allowed.
    pub fn take_trailers(&mut self) -> HeaderMap {
        mem::take(&mut self.trailers)
    }

    pub fn is_finished(&self) -> bool {
        self.state == ChunkedState::End
    }

    /// Reads the next chunk payload, `None` after the last chunk.
    async fn next_chunk(&mut self) -> Result<Option<Bytes>, ParseError> {
        if self.state == ChunkedState::End {
            return Ok(None);
        }

        let size_line = self.inner.read_line().await?;
        self.last_consumed += self.inner.last_consumed();
        let size_line = size_line.ok_or_else(|| ParseError::truncated(1, 0))?;
        let size = parse_chunk_size(&size_line)?;

        if size == 0 {
            self.read_trailers().await?;
            self.state = ChunkedState::End;
            trace!("finished reading chunked data");
            return Ok(None);
        }

        let size = usize::try_from(size).map_err(|_| ParseError::invalid_chunk("chunk size exceeds addressable memory"))?;
        let chunk = self.inner.read_bytes(ReadLength::Exact(size)).await?;
        self.last_consumed += self.inner.last_consumed();

        let terminator = self.inner.read_line().await?;
        self.last_consumed += self.inner.last_consumed();
        match terminator.as_deref() {
            Some("") => {}
            Some(_) => return Err(ParseError::invalid_chunk("chunk data is not followed by a line break")),
            None => return Err(ParseError::truncated(2, 0)),
        }

        trace!(len = chunk.len(), "read chunked bytes");
        Ok(Some(chunk))
    }

    async fn read_trailers(&mut self) -> Result<(), ParseError> {
        if self.allow_trailers {
            self.last_consumed += read_headers(&mut *self.inner, &mut self.trailers).await?;
        } else {
            let mut discarded = HeaderMap::new();
            self.last_consumed += read_headers(&mut *self.inner, &mut discarded).await?;
            if !discarded.is_empty() {
                trace!(count = discarded.len(), "discard chunked trailers");
            }
        }
        Ok(())
    }
}

/// Parses a chunk size line: hex digits, optional whitespace and optional
/// `;`-prefixed extensions which are ignored.
fn parse_chunk_size(line: &str) -> Result<u64, ParseError> {
    macro_rules! or_overflow {
        ($e:expr) => {
            match $e {
                Some(val) => val,
                None => return Err(ParseError::invalid_chunk("invalid overflow chunked length")),
            }
        };
    }

    let (size_part, _extensions) = line.split_once(';').unwrap_or((line, ""));
    let digits = size_part.trim_end_matches([' ', '\t']);
    ensure!(!digits.is_empty(), ParseError::invalid_chunk("chunk size line has no size"));

    let mut size: u64 = 0;
    for b in digits.bytes() {
        let digit = match b {
            b'0'..=b'9' => b - b'0',
            b'a'..=b'f' => b + 10 - b'a',
            b'A'..=b'F' => b + 10 - b'A',
            _ => return Err(ParseError::invalid_chunk(format!("invalid chunk size line {line:?}"))),
        };
        size = or_overflow!(size.checked_mul(16));
        size = or_overflow!(size.checked_add(u64::from(digit)));
    }

    Ok(size)
}

#[async_trait]
impl StreamReader for ChunkedDecoder<'_> {
    async fn read_line(&mut self) -> Result<Option<String>, ParseError> {
        self.last_consumed = 0;
        loop {
            if let Some(index) = self.pending.iter().position(|&b| b == b'\n') {
                let mut line = self.pending.split_to(index + 1);
                line.truncate(index);
                if line.last() == Some(&b'\r') {
                    line.truncate(index - 1);
                }
                return Ok(Some(String::from_utf8_lossy(&line).into_owned()));
            }

            match self.next_chunk().await? {
                Some(chunk) => self.pending.extend_from_slice(&chunk),
                None if self.pending.is_empty() => return Ok(None),
                None => {
                    let line = self.pending.split();
                    return Ok(Some(String::from_utf8_lossy(&line).into_owned()));
                }
            }
        }
    }

    async fn read_bytes(&mut self, length: ReadLength) -> Result<Bytes, ParseError> {
        self.last_consumed = 0;
        if let ReadLength::Exact(count) = length {
            return Err(ParseError::unsupported_read(format!(
                "chunked payload can only be read to the end, asked for {count} bytes"
            )));
        }

        let mut payload = self.pending.split();
        while let Some(chunk) = self.next_chunk().await? {
            if payload.is_empty() {
                payload.reserve(chunk.remaining());
            }
            payload.extend_from_slice(&chunk);
        }
        Ok(payload.freeze())
    }

    fn last_consumed(&self) -> usize {
        self.last_consumed
    }
}
