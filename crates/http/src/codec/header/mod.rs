//! Header processing for requests and responses.
//!
//! - [`decode_header_line`]: turns one request header line into a [`KnownHeader`]
//!   (or drops it), normalizing the name and percent-decoding the value
//! - [`encode_ok_head`] / [`encode_options_head`]: write response heads into a
//!   fixed [`HeadBuffer`]

mod header_decoder;
mod header_encoder;

pub use header_decoder::KnownHeader;
pub use header_decoder::MAX_CONTENT_LENGTH;
pub use header_decoder::decode_header_line;
pub use header_decoder::normalize_name;
pub use header_decoder::percent_decode;

pub use header_encoder::HEAD_CAPACITY;
pub use header_encoder::HeadBuffer;
pub use header_encoder::encode_ok_head;
pub use header_encoder::encode_options_head;
