//! A parsed HTTP request.
//!
//! Requests are produced by the request provider and never change afterwards.

use http::{HeaderMap, Method, header};

use crate::protocol::{Body, Params, ProtocolVersion};

#[derive(Debug)]
pub struct Request {
    method: Method,
    path: String,
    segments: Vec<String>,
    query: Params,
    headers: HeaderMap,
    protocol: String,
    version: ProtocolVersion,
    body: Body,
}

impl Request {
    /// Builds a request from its request-line target, splitting off the query.
    pub fn new(
        method: Method,
        target: &str,
        protocol: impl Into<String>,
        version: ProtocolVersion,
        headers: HeaderMap,
        body: Body,
    ) -> Self {
        let (path, query) = match target.split_once('?') {
            Some((path, query)) => (path, Params::parse(query.as_bytes())),
            None => (target, Params::empty()),
        };
        let segments = path.split('/').filter(|segment| !segment.is_empty()).map(str::to_string).collect();

        Self {
            method,
            path: path.to_string(),
            segments,
            query,
            headers,
            protocol: protocol.into(),
            version,
            body,
        }
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    /// The target path without the query string.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Non-empty path segments, `/a//b/` yields `["a", "b"]`.
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn query(&self) -> &Params {
        &self.query
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// The first value of a header, if it is visible ASCII.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|value| value.to_str().ok())
    }

    /// The protocol token exactly as sent, e.g. `HTTP/1.1`.
    pub fn protocol(&self) -> &str {
        &self.protocol
    }

    pub fn version(&self) -> ProtocolVersion {
        self.version
    }

    pub fn body(&self) -> &Body {
        &self.body
    }

    /// Whether the client asked for a persistent connection.
    pub fn keep_alive(&self) -> bool {
        has_token(&self.headers, header::CONNECTION, "keep-alive")
    }
}

/// Checks a comma separated header for a case-insensitive token.
pub(crate) fn has_token(headers: &HeaderMap, name: header::HeaderName, token: &str) -> bool {
    headers
        .get_all(name)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .any(|item| item.trim().eq_ignore_ascii_case(token))
}
