//! Request decoding and response encoding.
//!
//! # Architecture
//!
//! - Request handling:
//!   - [`RequestParser`]: the byte-at-a-time state machine
//!   - Header line decoding via the [`header`] module
//!
//! - Response handling:
//!   - Response heads via the [`header`] module
//!   - Body framing via the [`body`] module (fixed length slices, in-place chunks)
//!   - [`error_page`]: canned answers for the five error outcomes
//!
//! Every encoder writes into a caller supplied [`Buffer`](crate::buffer::Buffer);
//! nothing here allocates on the response path.

pub mod body;
pub mod header;

mod error_page;
mod request_parser;

pub use error_page::error_page;
pub use request_parser::BODY_CHUNK_LIMIT;
pub use request_parser::LINE_CAPACITY;
pub use request_parser::ParseState;
pub use request_parser::RequestParser;
