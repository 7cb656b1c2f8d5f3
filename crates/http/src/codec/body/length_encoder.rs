/// Largest slice handed to the transport in one send, about one TCP segment.
pub const MAX_SEGMENT: usize = 1400;

/// Tracks a fixed-length body that is sent in segment sized slices.
///
/// Each completed send is followed by the next slice until `content_length`
/// bytes went out.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct LengthEncoder {
    content_length: usize,
    sent: usize,
}

impl LengthEncoder {
    pub fn new(content_length: usize) -> Self {
        Self { content_length, sent: 0 }
    }

    #[inline]
    pub fn content_length(&self) -> usize {
        self.content_length
    }

    #[inline]
    pub fn sent(&self) -> usize {
        self.sent
    }

    #[inline]
    pub fn is_eof(&self) -> bool {
        self.sent >= self.content_length
    }

    /// The next slice of `body` to send, empty when nothing is left.
    ///
    /// The slice is not accounted as sent until [`LengthEncoder::advance`].
    pub fn next_slice<'a>(&self, body: &'a [u8]) -> &'a [u8] {
        let end = self.content_length.min(self.sent + MAX_SEGMENT).min(body.len());
        body.get(self.sent..end).unwrap_or_default()
    }

    pub fn advance(&mut self, count: usize) {
        self.sent += count;
    }
}
