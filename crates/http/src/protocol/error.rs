use std::io;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HttpError {
    #[error("request error: {source}")]
    RequestError {
        #[from]
        source: ParseError,
    },

    #[error("response error: {source}")]
    ResponseError {
        #[from]
        source: SendError,
    },

    #[error("tls handshake did not finish within {0:?}")]
    HandshakeTimeout(Duration),

    #[error("tls handshake error: {source}")]
    Handshake { source: io::Error },
}

impl HttpError {
    pub fn handshake<E: Into<io::Error>>(e: E) -> Self {
        Self::Handshake { source: e.into() }
    }
}

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("invalid header: {reason}")]
    InvalidHeader { reason: String },

    #[error("invalid content-length header: {reason}")]
    InvalidContentLength { reason: String },

    #[error("invalid chunked body: {reason}")]
    InvalidChunk { reason: String },

    #[error("invalid multipart body: {reason}")]
    InvalidMultipart { reason: String },

    #[error("line is not valid {encoding} text")]
    InvalidEncoding { encoding: &'static str },

    #[error("stream ended after {actual} of {expected} bytes")]
    Truncated { expected: usize, actual: usize },

    #[error("unsupported read: {reason}")]
    UnsupportedRead { reason: String },

    #[error("io error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },
}

impl ParseError {
    pub fn invalid_header<S: ToString>(str: S) -> Self {
        Self::InvalidHeader { reason: str.to_string() }
    }

    pub fn invalid_content_length<S: ToString>(str: S) -> Self {
        Self::InvalidContentLength { reason: str.to_string() }
    }

    pub fn invalid_chunk<S: ToString>(str: S) -> Self {
        Self::InvalidChunk { reason: str.to_string() }
    }

    pub fn invalid_multipart<S: ToString>(str: S) -> Self {
        Self::InvalidMultipart { reason: str.to_string() }
    }

    pub fn truncated(expected: usize, actual: usize) -> Self {
        Self::Truncated { expected, actual }
    }

    pub fn unsupported_read<S: ToString>(str: S) -> Self {
        Self::UnsupportedRead { reason: str.to_string() }
    }

    pub fn io<E: Into<io::Error>>(e: E) -> Self {
        Self::Io { source: e.into() }
    }

    /// Returns true when the error means the peer sent fewer bytes than announced.
    pub fn is_truncated(&self) -> bool {
        matches!(self, Self::Truncated { .. })
    }
}

#[derive(Error, Debug)]
pub enum SendError {
    #[error("invalid header: {reason}")]
    InvalidHeader { reason: String },

    #[error("io error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },
}

impl SendError {
    pub fn invalid_header<S: ToString>(str: S) -> Self {
        Self::InvalidHeader { reason: str.to_string() }
    }

    pub fn io<E: Into<io::Error>>(e: E) -> Self {
        Self::Io { source: e.into() }
    }
}
