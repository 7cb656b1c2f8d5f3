/// Outcome of one parsing or handling step that did not fail.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Progress {
    /// More input (or another event) is required before anything can be answered
    NeedMore,
    /// The message, or the handler's part of it, is complete
    Complete,
}

impl Progress {
    #[inline]
    pub fn is_complete(self) -> bool {
        matches!(self, Progress::Complete)
    }
}

/// Represents how a response payload is delimited.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PayloadSize {
    /// Payload with known length in bytes, followed by connection close
    Length(usize),
    /// Payload using chunked transfer encoding
    Chunked,
}
