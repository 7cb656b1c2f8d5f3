//! The byte-at-a-time HTTP/1.1 engine of the WiFi button firmware
//!
//! This crate holds the protocol half of the device's configuration server:
//! everything needed to take a request apart and to put a response on the wire,
//! without ever blocking and within a few kilobytes of memory. Routing, the
//! request lifecycle and push channels live in `button-web`.
//!
//! # Features
//!
//! - Fixed-capacity [`buffer::Buffer`] with overflow accounting and no panic path
//! - Incremental request parsing, one byte per call, across any number of
//!   receive events
//! - GET / POST / OPTIONS, HTTP/1.1 only
//! - Fixed-length responses sent in segment sized slices
//! - Chunked responses framed in place
//! - Canned error pages for 400 / 404 / 405 / 500 / 505
//!
//! # Example
//!
//! ```
//! use button_http::codec::RequestParser;
//! use button_http::protocol::{Method, Progress};
//!
//! let mut parser = RequestParser::new();
//! let event = b"GET /status HTTP/1.1\r\n\r\n";
//! let mut result = Ok(Progress::NeedMore);
//! for &byte in event {
//!     result = parser.feed(byte, event.len());
//! }
//!
//! assert_eq!(result, Ok(Progress::Complete));
//! assert_eq!(parser.method(), Some(Method::Get));
//! assert_eq!(parser.path(), Some("/status"));
//! ```
//!
//! # Architecture
//!
//! - [`buffer`]: the byte container every other module builds on
//! - [`protocol`]: methods, results and error types
//! - [`codec`]: request parser, response head / body / error page encoders
//! - [`transport`]: the seam to whatever network stack carries the bytes
//!
//! # Limitations
//!
//! - No persistent connections: every response ends with a close
//! - No pipelining, no request transfer codings
//! - Request lines and header lines longer than 256 bytes are truncated
//! - `Content-Length` is limited to 1 MiB - 1

pub mod buffer;
pub mod codec;
pub mod protocol;
pub mod transport;

mod utils;
pub(crate) use utils::ensure;
