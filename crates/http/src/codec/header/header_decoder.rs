//! Header line decoding shared by requests, chunked trailers and multipart parts.
//!
//! A header line is `Name: value`. The name must be a valid HTTP token and the
//! value is taken with surrounding whitespace removed. A header block ends at
//! the first empty line.

use http::{HeaderMap, HeaderName, HeaderValue};
use tracing::trace;

use crate::codec::StreamReader;
use crate::protocol::ParseError;

/// Splits one header line into its name and value.
pub fn split_header(line: &str) -> Result<(HeaderName, HeaderValue), ParseError> {
    let (name, value) =
        line.split_once(':').ok_or_else(|| ParseError::invalid_header(format!("missing colon in {line:?}")))?;

    let name = HeaderName::from_bytes(name.as_bytes())
        .map_err(|_| ParseError::invalid_header(format!("invalid header name {name:?}")))?;
    let value = HeaderValue::from_str(value.trim())
        .map_err(|_| ParseError::invalid_header(format!("invalid value for header {name}")))?;

    Ok((name, value))
}

/// Reads header lines into `headers` until an empty line.
///
/// The block must be terminated: running out of input first is reported as
/// a [`ParseError::Truncated`] error. Returns the raw byte length of the
/// whole block including the terminating empty line.
pub async fn read_headers<S>(reader: &mut S, headers: &mut HeaderMap) -> Result<usize, ParseError>
where
    S: StreamReader + ?Sized,
{
    let mut consumed = 0;
    loop {
        let line = reader.read_line().await?;
        consumed += reader.last_consumed();
        match line {
            None => return Err(ParseError::truncated(consumed + 2, consumed)),
            Some(line) if line.is_empty() => {
                trace!(count = headers.len(), "read header block");
                return Ok(consumed);
            }
            Some(line) => {
                let (name, value) = split_header(&line)?;
                headers.append(name, value);
            }
        }
    }
}
