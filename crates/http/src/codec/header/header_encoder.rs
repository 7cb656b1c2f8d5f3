//! Response head serialization.
//!
//! Every successful response carries the same no-cache and CORS headers; the
//! only variation is the content type and how the body is delimited:
//!
//! - [`PayloadSize::Length`]: `Content-Length` followed by `Connection: close`
//! - [`PayloadSize::Chunked`]: `Transfer-Encoding: chunked`
//!
//! Heads are formatted into a fixed [`HeadBuffer`] scratch area; a head that
//! does not fit is reported instead of being truncated.

use std::fmt::{self, Write};

use http::StatusCode;

use crate::buffer::Buffer;
use crate::protocol::PayloadSize;

/// Scratch size for a response head.
pub const HEAD_CAPACITY: usize = 512;

pub type HeadBuffer = Buffer<[u8; HEAD_CAPACITY]>;

const NO_CACHE: &str = "Pragma: no-cache\r\nCache-Control: no-store, no-cache\r\n";
const ALLOW_ORIGIN: &str = "Access-Control-Allow-Origin: *\r\n";
const ALLOW_METHODS: &str = "Access-Control-Allow-Methods: GET, POST, OPTIONS\r\n";

/// Writes the `200 OK` head of a page response. Returns `false` when it did not fit.
pub fn encode_ok_head<S>(dst: &mut Buffer<S>, content_type: &str, payload: PayloadSize) -> bool
where
    S: AsRef<[u8]> + AsMut<[u8]>,
{
    dst.clear();
    write_ok_head(dst, content_type, payload).is_ok() && dst.overflow() == 0
}

/// Writes the canned CORS preflight answer: empty body, connection closed.
pub fn encode_options_head<S>(dst: &mut Buffer<S>) -> bool
where
    S: AsRef<[u8]> + AsMut<[u8]>,
{
    dst.clear();
    write_options_head(dst).is_ok() && dst.overflow() == 0
}

fn write_status_line(dst: &mut impl Write, status: StatusCode) -> fmt::Result {
    write!(dst, "HTTP/1.1 {} {}\r\n", status.as_str(), status.canonical_reason().unwrap_or_default())
}

fn write_ok_head(dst: &mut impl Write, content_type: &str, payload: PayloadSize) -> fmt::Result {
    write_status_line(dst, StatusCode::OK)?;
    dst.write_str(NO_CACHE)?;
    dst.write_str(ALLOW_ORIGIN)?;
    write!(dst, "Content-Type: {content_type}\r\n")?;
    match payload {
        PayloadSize::Length(length) => write!(dst, "Content-Length: {length}\r\nConnection: close\r\n")?,
        PayloadSize::Chunked => dst.write_str("Transfer-Encoding: chunked\r\n")?,
    }
    dst.write_str("\r\n")
}

fn write_options_head(dst: &mut impl Write) -> fmt::Result {
    write_status_line(dst, StatusCode::OK)?;
    dst.write_str(NO_CACHE)?;
    write!(dst, "Content-Type: {}\r\n", mime::TEXT_PLAIN.as_ref())?;
    dst.write_str("Content-Length: 0\r\nConnection: close\r\n")?;
    dst.write_str(ALLOW_ORIGIN)?;
    dst.write_str(ALLOW_METHODS)?;
    dst.write_str("\r\n")
}
