//! HTTP responses produced by middleware.
//!
//! `Content-Length` and `Connection` are filled in by the encoder, a handler
//! only decides the status, extra headers, body and whether the connection
//! must close afterwards.

use bytes::Bytes;
use http::{HeaderMap, HeaderName, HeaderValue, StatusCode, header};

const TEXT_PLAIN: HeaderValue = HeaderValue::from_static("text/plain; charset=utf-8");
const TEXT_HTML: HeaderValue = HeaderValue::from_static("text/html; charset=utf-8");

#[derive(Debug, Clone)]
pub struct Response {
    status: StatusCode,
    headers: HeaderMap,
    close: bool,
    body: Bytes,
}

impl Response {
    /// An empty response with the given status.
    pub fn new(status: StatusCode) -> Self {
        Self { status, headers: HeaderMap::new(), close: false, body: Bytes::new() }
    }

    pub fn with_body(status: StatusCode, content_type: HeaderValue, body: impl Into<Bytes>) -> Self {
        let mut response = Self::new(status);
        response.headers.insert(header::CONTENT_TYPE, content_type);
        response.body = body.into();
        response
    }

    pub fn with_text(status: StatusCode, text: impl Into<String>) -> Self {
        Self::with_body(status, TEXT_PLAIN, text.into())
    }

    pub fn with_html(status: StatusCode, html: impl Into<String>) -> Self {
        Self::with_body(status, TEXT_HTML, html.into())
    }

    /// Appends a header.
    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.append(name, value);
        self
    }

    /// Forces the connection to close once this response is written.
    pub fn close_connection(mut self) -> Self {
        self.close = true;
        self
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn should_close(&self) -> bool {
        self.close
    }
}
