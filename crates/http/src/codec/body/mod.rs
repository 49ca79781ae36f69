//! Request body framing.
//!
//! - [`ChunkedDecoder`]: dechunks a `Transfer-Encoding: chunked` payload.
//! - [`multipart`]: splits `multipart/*` bodies into parts.

mod chunked_decoder;
pub mod multipart;

pub use chunked_decoder::ChunkedDecoder;
