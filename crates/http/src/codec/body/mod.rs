//! Response body framing.
//!
//! - [`LengthEncoder`]: fixed-length bodies, sent in slices of at most
//!   [`MAX_SEGMENT`] bytes across successive sent events
//! - [`frame_chunk`]: chunked transfer encoding, framing a payload buffer in
//!   place without a second allocation

mod chunked_encoder;
mod length_encoder;

pub use chunked_encoder::MAX_CHUNK_OVERHEAD;
pub use chunked_encoder::frame_chunk;
pub use length_encoder::LengthEncoder;
pub use length_encoder::MAX_SEGMENT;
