//! Request bodies.
//!
//! Bodies are fully read by the request provider. Their structured views are
//! computed on first access and cached: [`FormBody::params`] decodes the
//! urlencoded pairs once, [`MultipartBody::parts`] splits the parts once even
//! when several tasks ask at the same time. A failed multipart parse is cached
//! as well and reported again to later callers.

use bytes::Bytes;
use tokio::sync::OnceCell as AsyncOnceCell;

use crate::codec::multipart::{Multipart, parse_multipart};
use crate::protocol::{ParseError, Params};

#[derive(Debug, Default)]
pub enum Body {
    #[default]
    Empty,
    Form(FormBody),
    Multipart(MultipartBody),
}

impl Body {
    pub fn form(raw: Bytes) -> Self {
        Body::Form(FormBody::new(raw))
    }

    pub fn multipart(raw: Bytes, boundary: impl Into<String>) -> Self {
        Body::Multipart(MultipartBody::new(raw, boundary))
    }

    /// The body exactly as received, after dechunking.
    pub fn raw(&self) -> Bytes {
        match self {
            Body::Empty => Bytes::new(),
            Body::Form(form) => form.raw.clone(),
            Body::Multipart(multipart) => multipart.raw.clone(),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Body::Empty => true,
            Body::Form(form) => form.raw.is_empty(),
            Body::Multipart(multipart) => multipart.raw.is_empty(),
        }
    }

    /// The urlencoded pairs of a form body.
    pub fn params(&self) -> Option<&Params> {
        match self {
            Body::Form(form) => Some(form.params()),
            _ => None,
        }
    }
}

#[derive(Debug)]
pub struct FormBody {
    raw: Bytes,
    params: once_cell::sync::OnceCell<Params>,
}

impl FormBody {
    pub fn new(raw: Bytes) -> Self {
        Self { raw, params: once_cell::sync::OnceCell::new() }
    }

    pub fn raw(&self) -> &Bytes {
        &self.raw
    }

    pub fn params(&self) -> &Params {
        self.params.get_or_init(|| Params::parse(&self.raw))
    }
}

#[derive(Debug)]
pub struct MultipartBody {
    raw: Bytes,
    boundary: String,
    parsed: AsyncOnceCell<Result<Multipart, ParseError>>,
}

impl MultipartBody {
    pub fn new(raw: Bytes, boundary: impl Into<String>) -> Self {
        Self { raw, boundary: boundary.into(), parsed: AsyncOnceCell::new() }
    }

    pub fn raw(&self) -> &Bytes {
        &self.raw
    }

    pub fn boundary(&self) -> &str {
        &self.boundary
    }

    /// Every caller gets the same parts, or the same error when the body is
    /// malformed.
    pub async fn parts(&self) -> Result<&Multipart, &ParseError> {
        self.parsed.get_or_init(|| parse_multipart(self.raw.clone(), &self.boundary)).await.as_ref()
    }
}
