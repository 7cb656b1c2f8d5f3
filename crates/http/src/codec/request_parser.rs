//! Incremental HTTP/1.1 request parser fed one byte at a time.
//!
//! The parser never looks ahead and never blocks: every received byte is
//! handed to [`RequestParser::feed`], which answers with the outcome so far.
//! All progress lives in the parser itself, so a request may arrive split
//! across any number of receive events.
//!
//! # State machine
//!
//! ```text
//! StartLine --CRLF--> Headers --blank line--> Body --content-length reached--> Done
//!     |                  |  \--bodyless------------------------------------> Done
//!     \------------------+----------------------+--> Error (terminal)
//! ```
//!
//! - **StartLine** / **Headers**: bytes accumulate in a fixed 256 byte line
//!   buffer until it ends with CRLF. A line that overflows is cut short and a
//!   CRLF is forced into its last two bytes, so an over-long line is truncated
//!   rather than stalling the connection.
//! - **Body**: bytes go to a body buffer sized to `min(content_length, 1500) + 1`.
//!   It grows only when a single receive event is larger than the buffer or
//!   the buffer is full, never past the declared content length. A handler
//!   that drains the body on every event keeps it at its initial size.
//! - **Done**: trailing bytes are accepted and `Complete` is repeated.
//! - **Error**: every further byte yields `InternalError`; a parser is never
//!   reset, a new one is created for every connection.

use tracing::{debug, error, trace};

use crate::buffer::Buffer;
use crate::codec::header::{KnownHeader, MAX_CONTENT_LENGTH, decode_header_line};
use crate::ensure;
use crate::protocol::{HttpError, Method, Progress};

/// Capacity of the line accumulation buffer.
pub const LINE_CAPACITY: usize = 256;

/// Upper bound of the initial body buffer.
pub const BODY_CHUNK_LIMIT: usize = 1500;

const CRLF: &[u8] = b"\r\n";
const HTTP_1_1: &str = "HTTP/1.1";

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ParseState {
    StartLine,
    Headers,
    Body,
    Done,
    Error,
}

#[derive(Debug)]
pub struct RequestParser {
    state: ParseState,
    line: Buffer<[u8; LINE_CAPACITY]>,
    content: Option<Buffer>,
    method: Option<Method>,
    path: Option<String>,
    content_length: usize,
    content_type: Option<String>,
    referer: Option<String>,
    token: Option<String>,
    headers_done: bool,
}

impl Default for RequestParser {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestParser {
    pub fn new() -> Self {
        Self {
            state: ParseState::StartLine,
            line: Buffer::inline(),
            content: None,
            method: None,
            path: None,
            content_length: 0,
            content_type: None,
            referer: None,
            token: None,
            headers_done: false,
        }
    }

    /// Consumes one byte.
    ///
    /// `event_len` is the length of the receive event the byte belongs to. It
    /// only matters in the body phase, where it decides how far the body
    /// buffer grows.
    pub fn feed(&mut self, byte: u8, event_len: usize) -> Result<Progress, HttpError> {
        let result = match self.state {
            ParseState::StartLine | ParseState::Headers => {
                if !self.accumulate(byte) {
                    return Ok(Progress::NeedMore);
                }
                if self.state == ParseState::StartLine { self.parse_start_line() } else { self.parse_header_line() }
            }
            ParseState::Body => self.parse_body(byte, event_len),
            ParseState::Done => return Ok(Progress::Complete),
            ParseState::Error => {
                self.line.clear();
                return Err(HttpError::InternalError);
            }
        };

        if let Err(e) = result {
            debug!(cause = %e, state = ?self.state, "request rejected");
            self.line.clear();
            self.state = ParseState::Error;
        }
        result
    }

    #[inline]
    pub fn state(&self) -> ParseState {
        self.state
    }

    /// `true` once the blank line ending the header section was seen.
    #[inline]
    pub fn headers_done(&self) -> bool {
        self.headers_done
    }

    #[inline]
    pub fn method(&self) -> Option<Method> {
        self.method
    }

    /// The request target exactly as received.
    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    #[inline]
    pub fn content_length(&self) -> usize {
        self.content_length
    }

    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    pub fn referer(&self) -> Option<&str> {
        self.referer.as_deref()
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    /// The body buffer, allocated only for requests that carry a body.
    pub fn content(&self) -> Option<&Buffer> {
        self.content.as_ref()
    }

    /// Mutable body access, used by streaming handlers to drain consumed bytes.
    pub fn content_mut(&mut self) -> Option<&mut Buffer> {
        self.content.as_mut()
    }

    // true once the line ends with CRLF
    fn accumulate(&mut self, byte: u8) -> bool {
        self.line.write(byte);
        if self.line.overflow() > 0 {
            trace!("request line overflow, truncating");
            self.line.set_writer(LINE_CAPACITY - CRLF.len());
            self.line.crlf();
        }
        self.line.equal_from_end(CRLF)
    }

    fn parse_start_line(&mut self) -> Result<Progress, HttpError> {
        let (method, path) = {
            let text = line_text(&mut self.line);
            let mut tokens = text.split(' ');
            let (Some(method), Some(target), Some(version), None) =
                (tokens.next(), tokens.next(), tokens.next(), tokens.next())
            else {
                return Err(HttpError::BadRequest);
            };
            ensure!(!target.is_empty(), HttpError::BadRequest);

            let method = Method::from_token(method).ok_or(HttpError::MethodNotAllowed)?;
            ensure!(version == HTTP_1_1, HttpError::VersionNotSupported);
            (method, target.to_owned())
        };

        trace!(%method, %path, "parsed request line");
        self.method = Some(method);
        self.path = Some(path);
        self.line.clear();
        self.state = ParseState::Headers;
        Ok(Progress::NeedMore)
    }

    fn parse_header_line(&mut self) -> Result<Progress, HttpError> {
        if self.line.size() == CRLF.len() {
            self.line.clear();
            return self.finish_headers();
        }

        let header = decode_header_line(line_text(&mut self.line))?;
        self.line.clear();
        match header {
            Some(KnownHeader::ContentLength(length)) => self.content_length = length,
            Some(KnownHeader::ContentType(value)) => self.content_type = Some(value),
            Some(KnownHeader::Referer(value)) => self.referer = Some(value),
            Some(KnownHeader::Token(value)) => self.token = Some(value),
            None => {}
        }
        Ok(Progress::NeedMore)
    }

    fn finish_headers(&mut self) -> Result<Progress, HttpError> {
        self.headers_done = true;
        if self.method.is_none_or(Method::is_bodyless) || self.content_length == 0 {
            self.state = ParseState::Done;
            return Ok(Progress::Complete);
        }

        let capacity = self.content_length.min(BODY_CHUNK_LIMIT) + 1;
        let content = Buffer::try_new(capacity).map_err(|e| {
            error!(cause = %e, capacity, "unable to allocate request body");
            HttpError::InternalError
        })?;
        self.content = Some(content);
        self.state = ParseState::Body;
        Ok(Progress::NeedMore)
    }

    fn parse_body(&mut self, byte: u8, event_len: usize) -> Result<Progress, HttpError> {
        let content_length = self.content_length;
        let Some(content) = self.content.as_mut() else {
            return Err(HttpError::InternalError);
        };

        if event_len > content.capacity() || content.is_full() {
            let capacity = (content.size() + event_len + 1).min(content_length + 1).min(MAX_CONTENT_LENGTH + 1);
            content.grow(capacity).map_err(|e| {
                error!(cause = %e, capacity, "unable to grow request body");
                HttpError::InternalError
            })?;
        }

        content.write(byte);
        ensure!(content.overflow() == 0, HttpError::BadRequest);
        if content.size() < content_length {
            return Ok(Progress::NeedMore);
        }
        self.state = ParseState::Done;
        Ok(Progress::Complete)
    }
}

// the line without its CRLF, as text
fn line_text<S: AsRef<[u8]> + AsMut<[u8]>>(line: &mut Buffer<S>) -> &str {
    line.rewind(CRLF.len());
    line.as_text()
}
