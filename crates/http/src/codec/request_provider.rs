//! Turns the bytes of a connection into [`Request`]s.
//!
//! A request is a request line, a header block and an optional body:
//!
//! - the request line is split at its first and last space into method,
//!   target and protocol token
//! - a `_method` header overrides the method of the request line
//! - the body is `Content-Length` bytes long when that is positive, otherwise
//!   it is dechunked when `Transfer-Encoding` contains `chunked`, otherwise it
//!   is empty
//! - chunked trailers are appended to the headers when the client sent
//!   `TE: trailers` and the provider allows them
//!
//! Anything that does not look like a request at all (a broken request line,
//! an unknown protocol) yields `Ok(None)`; framing problems past the request
//! line are errors.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use http::{HeaderMap, Method, header};
use tracing::{debug, trace, warn};

use crate::codec::header::read_headers;
use crate::codec::{ChunkedDecoder, ReadLength, StreamReader};
use crate::protocol::{Body, ParseError, Request, VersionCache, VersionProvider, has_token};

const METHOD_OVERRIDE: &str = "_method";

#[async_trait]
pub trait RequestProvider: Send + Sync {
    async fn provide(&self, reader: &mut dyn StreamReader) -> Result<Option<Request>, ParseError>;
}

#[derive(Debug)]
pub struct HttpRequestProvider<P = VersionCache> {
    versions: Arc<P>,
    allow_trailers: bool,
}

impl HttpRequestProvider {
    pub fn new() -> Self {
        Self::with_versions(Arc::new(VersionCache::new()))
    }
}

impl Default for HttpRequestProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: VersionProvider> HttpRequestProvider<P> {
    /// Resolves protocol tokens through a shared provider, usually one
    /// [`VersionCache`] for the whole server.
    pub fn with_versions(versions: Arc<P>) -> Self {
        Self { versions, allow_trailers: true }
    }

    pub fn allow_trailers(mut self, allow: bool) -> Self {
        self.allow_trailers = allow;
        self
    }

    async fn read_body(&self, reader: &mut dyn StreamReader, headers: &mut HeaderMap) -> Result<Bytes, ParseError> {
        let content_length = match headers.get(header::CONTENT_LENGTH) {
            Some(value) => value
                .to_str()
                .ok()
                .and_then(|value| value.trim().parse::<usize>().ok())
                .ok_or_else(|| ParseError::invalid_content_length(format!("{value:?} is not a length")))?,
            None => 0,
        };

        if content_length > 0 {
            return reader.read_bytes(ReadLength::Exact(content_length)).await;
        }

        if !has_token(headers, header::TRANSFER_ENCODING, "chunked") {
            return Ok(Bytes::new());
        }

        let keep_trailers = self.allow_trailers && has_token(headers, header::TE, "trailers");
        let mut decoder = ChunkedDecoder::new(reader).allow_trailers(keep_trailers);
        let payload = decoder.read_bytes(ReadLength::ToEnd).await?;

        let trailers = decoder.take_trailers();
        for (name, value) in trailers.iter() {
            headers.append(name.clone(), value.clone());
        }
        trace!(len = payload.len(), trailers = trailers.len(), "read chunked body");
        Ok(payload)
    }
}

#[async_trait]
impl<P: VersionProvider> RequestProvider for HttpRequestProvider<P> {
    async fn provide(&self, reader: &mut dyn StreamReader) -> Result<Option<Request>, ParseError> {
        // tolerate empty lines left over from a previous message
        let line = loop {
            match reader.read_line().await? {
                None => return Ok(None),
                Some(line) if line.is_empty() => continue,
                Some(line) => break line,
            }
        };

        let (Some(first), Some(last)) = (line.find(' '), line.rfind(' ')) else {
            debug!(line = %line, "request line has no spaces");
            return Ok(None);
        };
        if first == last {
            debug!(line = %line, "request line has fewer than three parts");
            return Ok(None);
        }

        let method = &line[..first];
        let target = line[first + 1..last].trim();
        let protocol = &line[last + 1..];

        let version = match self.versions.provide(protocol) {
            Ok(version) => version,
            Err(e) => {
                warn!(cause = %e, "unsupported protocol");
                return Ok(None);
            }
        };

        let mut headers = HeaderMap::new();
        read_headers(&mut *reader, &mut headers).await?;

        let method = match headers.get(METHOD_OVERRIDE) {
            Some(value) => value.as_bytes().to_ascii_uppercase(),
            None => method.as_bytes().to_vec(),
        };
        let Ok(method) = Method::from_bytes(&method) else {
            debug!(line = %line, "invalid request method");
            return Ok(None);
        };

        let raw = self.read_body(reader, &mut headers).await?;
        let body = if raw.is_empty() { Body::Empty } else { classify_body(raw, &headers) };

        trace!(%method, path = target, protocol, "provided request");
        Ok(Some(Request::new(method, target, protocol, version, headers, body)))
    }
}

fn classify_body(raw: Bytes, headers: &HeaderMap) -> Body {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse::<mime::Mime>().ok());

    if let Some(content_type) = content_type
        && content_type.type_() == mime::MULTIPART
        && let Some(boundary) = content_type.get_param(mime::BOUNDARY)
    {
        return Body::multipart(raw, boundary.as_str());
    }

    Body::form(raw)
}

#[cfg(test)]
mod tests {
    use indoc::indoc;

    use super::*;
    use crate::codec::BufferedReader;
    use crate::protocol::{MockVersionProvider, ProtocolVersion, VersionError};

    async fn provide(raw: &'static str) -> Result<Option<Request>, ParseError> {
        let mut reader = BufferedReader::new(raw.as_bytes());
        HttpRequestProvider::new().provide(&mut reader).await
    }

    #[tokio::test]
    async fn test_get_with_query() {
        let raw = indoc! {r##"
        GET /index/?a=1&b=2&a=3 HTTP/1.1
        Host: 127.0.0.1:8080
        Connection: keep-alive
        Accept: */*

        "##};

        let request = provide(raw).await.unwrap().unwrap();

        assert_eq!(request.method(), &Method::GET);
        assert_eq!(request.path(), "/index/");
        assert_eq!(request.query().get("a"), Some("3"));
        assert_eq!(request.protocol(), "HTTP/1.1");
        assert_eq!(request.version(), ProtocolVersion::HTTP_11);
        assert_eq!(request.headers().len(), 3);
        assert!(request.keep_alive());
        assert!(request.body().is_empty());
    }

    #[tokio::test]
    async fn test_form_body_with_content_length() {
        let raw = "POST /login HTTP/1.0\r\nContent-Length: 19\r\n\r\nuser=admin&pass=x+y";

        let request = provide(raw).await.unwrap().unwrap();
        let params = request.body().params().unwrap();

        assert_eq!(params.get("user"), Some("admin"));
        assert_eq!(params.get("pass"), Some("x y"));
        assert!(request.query().is_empty());
    }

    #[tokio::test]
    async fn test_chunked_body_with_trailers() {
        let raw = "POST /upload HTTP/1.1\r\nTransfer-Encoding: chunked\r\nTE: trailers\r\n\r\n\
                   4\r\nWiki\r\n5\r\npedia\r\n0\r\nX-Checksum: 9\r\n\r\n";

        let request = provide(raw).await.unwrap().unwrap();

        assert_eq!(&request.body().raw()[..], b"Wikipedia");
        assert_eq!(request.header("x-checksum"), Some("9"));
    }

    #[tokio::test]
    async fn test_trailers_dropped_without_te() {
        let raw = "POST / HTTP/1.1\r\nTransfer-Encoding: chunked\r\n\r\n1\r\na\r\n0\r\nX-Checksum: 9\r\n\r\n";
        let request = provide(raw).await.unwrap().unwrap();
        assert_eq!(&request.body().raw()[..], b"a");
        assert_eq!(request.header("x-checksum"), None);
    }

    #[tokio::test]
    async fn test_trailers_disabled() {
        let raw = "POST / HTTP/1.1\r\nTransfer-Encoding: chunked\r\nTE: trailers\r\n\r\n0\r\nX-Checksum: 9\r\n\r\n";
        let mut reader = BufferedReader::new(raw.as_bytes());
        let provider = HttpRequestProvider::new().allow_trailers(false);
        let request = provider.provide(&mut reader).await.unwrap().unwrap();
        assert_eq!(request.header("x-checksum"), None);
        assert!(request.body().is_empty());
    }

    #[tokio::test]
    async fn test_multipart_body() {
        let raw = "POST /form HTTP/1.1\r\n\
                   Content-Type: multipart/form-data; boundary=XyZ\r\n\
                   Content-Length: 59\r\n\r\n\
                   --XyZ\r\nContent-Disposition: form-data; name=a\r\n\r\n1\r\n--XyZ--";

        let request = provide(raw).await.unwrap().unwrap();
        let Body::Multipart(multipart) = request.body() else {
            panic!("expected multipart body, got {:?}", request.body());
        };

        assert_eq!(multipart.boundary(), "XyZ");
        assert_eq!(&multipart.parts().await.unwrap().get("a").unwrap().body()[..], b"1");
    }

    #[tokio::test]
    async fn test_method_override() {
        let raw = "POST /items/1 HTTP/1.1\r\n_method: delete\r\n\r\n";
        let request = provide(raw).await.unwrap().unwrap();
        assert_eq!(request.method(), &Method::DELETE);
    }

    #[tokio::test]
    async fn test_no_request() {
        assert!(provide("").await.unwrap().is_none());
        assert!(provide("GARBAGE\r\n\r\n").await.unwrap().is_none());
        assert!(provide("GET /\r\n\r\n").await.unwrap().is_none());
        assert!(provide("GET / SPDY/3\r\n\r\n").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_leading_empty_lines() {
        let request = provide("\r\n\r\nGET / HTTP/1.1\r\n\r\n").await.unwrap().unwrap();
        assert_eq!(request.path(), "/");
    }

    #[tokio::test]
    async fn test_truncated_header_block() {
        let result = provide("GET / HTTP/1.1\r\nHost: localhost\r\n").await;
        assert!(matches!(result, Err(ParseError::Truncated { .. })));
    }

    #[tokio::test]
    async fn test_invalid_header_line() {
        let result = provide("GET / HTTP/1.1\r\nno colon\r\n\r\n").await;
        assert!(matches!(result, Err(ParseError::InvalidHeader { .. })));
    }

    #[tokio::test]
    async fn test_invalid_content_length() {
        let result = provide("POST / HTTP/1.1\r\nContent-Length: ten\r\n\r\n").await;
        assert!(matches!(result, Err(ParseError::InvalidContentLength { .. })));
    }

    #[tokio::test]
    async fn test_short_body() {
        let result = provide("POST / HTTP/1.1\r\nContent-Length: 10\r\n\r\nabc").await;
        assert!(matches!(result, Err(ParseError::Truncated { expected: 10, actual: 3 })));
    }

    #[tokio::test]
    async fn test_huge_content_length_with_short_body() {
        let result = provide("POST / HTTP/1.1\r\nContent-Length: 99999999999999\r\n\r\nabc").await;
        assert!(matches!(result, Err(ParseError::Truncated { actual: 3, .. })));

        let result = provide("POST / HTTP/1.1\r\nContent-Length: 18446744073709551615\r\n\r\nabc").await;
        assert!(matches!(result, Err(ParseError::Truncated { actual: 3, .. } | ParseError::InvalidContentLength { .. })));
    }

    #[tokio::test]
    async fn test_versions_are_resolved_by_injected_provider() {
        let mut versions = MockVersionProvider::new();
        versions.expect_provide().withf(|token| token == "HTTP/1.1").times(1).returning(|_| Ok(ProtocolVersion::HTTP_11));
        versions
            .expect_provide()
            .withf(|token| token == "HTTP/9.9")
            .times(1)
            .returning(|token| Err(VersionError::new(token)));

        let provider = HttpRequestProvider::with_versions(Arc::new(versions));
        let mut reader = BufferedReader::new(&b"GET / HTTP/1.1\r\n\r\nGET / HTTP/9.9\r\n\r\n"[..]);

        assert!(provider.provide(&mut reader).await.unwrap().is_some());
        assert!(provider.provide(&mut reader).await.unwrap().is_none());
    }
}
