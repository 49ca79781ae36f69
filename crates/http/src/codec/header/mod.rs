//! Header lines and header values.
//!
//! - [`read_headers`] / [`split_header`]: the `Name: value` line syntax shared
//!   by request heads, chunked trailers and multipart parts.
//! - [`split_header_value`], [`quote`], [`unquote`]: parameterized values
//!   such as `Content-Disposition`.
//! - [`HeaderEncoder`]: the status line and header block of a response.

mod header_decoder;
mod header_encoder;
mod header_value;

pub use header_decoder::{read_headers, split_header};
pub use header_encoder::{HeaderEncoder, ResponseHead};
pub use header_value::{ParameterizedValue, quote, split_header_value, unquote};
