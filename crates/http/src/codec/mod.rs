//! Reading requests from and writing responses to byte streams.
//!
//! # Reading
//!
//! Everything on the read side speaks the [`StreamReader`] contract: read a
//! line, read a block of bytes, report how many raw bytes that took.
//!
//! - [`BufferedReader`]: the reader over the connection itself
//! - [`ChunkedDecoder`]: a reader over another reader that removes chunked
//!   framing
//! - [`multipart`]: splits `multipart/*` bodies, driving a [`BufferedReader`]
//!   over the in-memory body
//! - [`HttpRequestProvider`]: assembles a [`Request`](crate::protocol::Request)
//!   from a reader
//!
//! # Writing
//!
//! [`ResponseEncoder`] serializes a response into a buffer that the
//! connection flushes in one go.

mod body;
mod buffered_reader;
pub mod header;
mod request_provider;
mod response_encoder;
mod stream_reader;

pub use body::{ChunkedDecoder, multipart};
pub use buffered_reader::{BufferedReader, DEFAULT_BUFFER_SIZE, LineEncoding};
pub use header::ResponseHead;
pub use request_provider::{HttpRequestProvider, RequestProvider};
pub use response_encoder::ResponseEncoder;
pub use stream_reader::{ReadLength, StreamReader};
