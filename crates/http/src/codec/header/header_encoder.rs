//! HTTP header encoder for serializing the status line and header block.
//!
//! `Content-Length` always reflects the body that is written and `Connection`
//! always reflects what the connection handler is going to do, so values a
//! handler set for either are replaced. Cookies changed during the request
//! follow as `Set-Cookie` lines.

use std::io;
use std::io::Write;

use bytes::{BufMut, BytesMut};
use http::header;
use tokio_util::codec::Encoder;

use crate::protocol::{CookieJar, Response, SendError};

/// Initial buffer size allocated for header serialization
const INIT_HEADER_SIZE: usize = 4 * 1024;

const DEFAULT_PROTOCOL: &str = "HTTP/1.1";

/// Everything needed to write the head of one response.
#[derive(Debug, Clone, Copy)]
pub struct ResponseHead<'a> {
    /// Protocol token of the request, `HTTP/1.1` is used when empty.
    pub protocol: &'a str,
    pub response: &'a Response,
    pub keep_alive: bool,
    pub cookies: Option<&'a CookieJar>,
}

/// Encoder for HTTP response heads implementing the [`Encoder`] trait.
#[derive(Debug, Default)]
pub struct HeaderEncoder;

impl<'a> Encoder<ResponseHead<'a>> for HeaderEncoder {
    type Error = SendError;

    fn encode(&mut self, item: ResponseHead<'a>, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let response = item.response;
        let protocol = if item.protocol.is_empty() { DEFAULT_PROTOCOL } else { item.protocol };
        let status = response.status();

        dst.reserve(INIT_HEADER_SIZE);
        write!(FastWrite(dst), "{} {} {}\r\n", protocol, status.as_str(), status.canonical_reason().unwrap_or("Unknown"))?;

        for (name, value) in response.headers() {
            if name == header::CONTENT_LENGTH || name == header::CONNECTION {
                continue;
            }
            put_header(dst, name.as_ref(), value.as_ref());
        }

        write!(FastWrite(dst), "content-length: {}\r\n", response.body().len())?;
        let connection: &[u8] = if item.keep_alive { b"keep-alive" } else { b"close" };
        put_header(dst, header::CONNECTION.as_ref(), connection);

        if let Some(cookies) = item.cookies {
            for cookie in cookies.set_cookie_values() {
                if cookie.bytes().any(|b| b == b'\r' || b == b'\n') {
                    return Err(SendError::invalid_header(format!("line break in cookie {cookie:?}")));
                }
                put_header(dst, header::SET_COOKIE.as_ref(), cookie.as_bytes());
            }
        }

        dst.put_slice(b"\r\n");
        Ok(())
    }
}

#[inline]
fn put_header(dst: &mut BytesMut, name: &[u8], value: &[u8]) {
    dst.put_slice(name);
    dst.put_slice(b": ");
    dst.put_slice(value);
    dst.put_slice(b"\r\n");
}

/// Fast writer implementation for writing to BytesMut.
///
/// Space has already been reserved, so writes never fail.
struct FastWrite<'a>(&'a mut BytesMut);

impl Write for FastWrite<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.put_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
