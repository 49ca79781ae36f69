//! Core HTTP protocol types.
//!
//! - **Requests** ([`Request`], [`Body`], [`Params`]): what the request
//!   provider produces. A request is immutable once built and its body views
//!   (form pairs, multipart parts) are computed lazily.
//! - **Responses** ([`Response`]): status, headers, body and the close flag.
//! - **Context** ([`Context`], [`CookieJar`]): the per-request record passed
//!   through the middleware pipeline.
//! - **Versions** ([`ProtocolVersion`], [`VersionProvider`], [`VersionCache`]):
//!   resolution of the request-line protocol token.
//! - **Errors** ([`HttpError`], [`ParseError`], [`SendError`]).

mod error;
pub use error::HttpError;
pub use error::ParseError;
pub use error::SendError;

mod version;
#[cfg(test)]
pub use version::MockVersionProvider;
pub use version::{HttpVersionParser, ProtocolVersion, VersionCache, VersionError, VersionProvider};

mod params;
pub use params::Params;

mod body;
pub use body::{Body, FormBody, MultipartBody};

mod request;
pub(crate) use request::has_token;
pub use request::Request;

mod response;
pub use response::Response;

mod cookie;
pub use cookie::CookieJar;

mod context;
pub use context::Context;
