//! Decoding of a single request header line.
//!
//! The parser hands over one complete line (CRLF already stripped). The line
//! is split at the first `:`, the name is normalized to `Title-Case` with
//! hyphens, and the value is stripped of surrounding blanks and
//! percent-decoded. Only four headers are kept; everything else is dropped
//! right after decoding.
//!
//! # Limits
//!
//! - `Content-Length` must be plain ASCII digits in `0..=1_048_575`
//! - a line with an empty name is a bad request; a line without `:` is a
//!   header with an empty value

use tracing::trace;

use crate::ensure;
use crate::protocol::HttpError;

/// Largest accepted `Content-Length`.
pub const MAX_CONTENT_LENGTH: usize = 1_048_575;

/// The request headers the engine acts upon.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KnownHeader {
    ContentLength(usize),
    ContentType(String),
    Referer(String),
    Token(String),
}

/// Decodes one header line, returning `None` for headers that are not kept.
pub fn decode_header_line(line: &str) -> Result<Option<KnownHeader>, HttpError> {
    let (name, value) = line.split_once(':').unwrap_or((line, ""));
    ensure!(!name.is_empty(), HttpError::BadRequest);

    let name = normalize_name(name);
    let value = percent_decode(value.trim_matches([' ', '\t']));
    trace!(header = %name, value = %value, "decoded header line");

    let header = match name.as_str() {
        "Content-Length" => KnownHeader::ContentLength(parse_content_length(&value)?),
        "Content-Type" => KnownHeader::ContentType(value),
        "Referer" => KnownHeader::Referer(value),
        "Token" => KnownHeader::Token(value),
        _ => return Ok(None),
    };
    Ok(Some(header))
}

/// `content-TYPE` becomes `Content-Type`.
pub fn normalize_name(name: &str) -> String {
    let mut normalized = String::with_capacity(name.len());
    let mut word_start = true;
    for c in name.chars() {
        if word_start {
            normalized.push(c.to_ascii_uppercase());
        } else {
            normalized.push(c.to_ascii_lowercase());
        }
        word_start = c == '-';
    }
    normalized
}

/// Replaces `%XY` escapes with the byte they encode.
///
/// Escapes that are truncated or not hex are kept literally; the result is
/// converted to UTF-8 lossily.
pub fn percent_decode(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut decoded = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%'
            && let Some(byte) = bytes.get(i + 1..i + 3).and_then(decode_hex_pair)
        {
            decoded.push(byte);
            i += 3;
            continue;
        }
        decoded.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&decoded).into_owned()
}

fn decode_hex_pair(pair: &[u8]) -> Option<u8> {
    match pair {
        [high, low] => Some((hex_value(*high)? << 4) | hex_value(*low)?),
        _ => None,
    }
}

fn hex_value(digit: u8) -> Option<u8> {
    char::from(digit).to_digit(16).and_then(|value| u8::try_from(value).ok())
}

fn parse_content_length(value: &str) -> Result<usize, HttpError> {
    ensure!(!value.is_empty() && value.bytes().all(|b| b.is_ascii_digit()), HttpError::BadRequest);
    let length = value.parse::<usize>().map_err(|_e| HttpError::BadRequest)?;
    ensure!(length <= MAX_CONTENT_LENGTH, HttpError::BadRequest);
    Ok(length)
}
