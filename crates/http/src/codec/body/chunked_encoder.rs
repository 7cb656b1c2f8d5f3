use crate::buffer::Buffer;

/// Longest size prefix: eight hex digits and CRLF.
const SIZE_PREFIX_CAPACITY: usize = 16;

/// Room framing adds around a payload at most: size prefix plus trailing CRLF.
pub const MAX_CHUNK_OVERHEAD: usize = 12;

/// Frames the active region of `payload` in place as one chunk.
///
/// The size prefix (uppercase hex without leading zeros, then CRLF) is built
/// in a small scratch buffer, the payload is shifted right to make room for it,
/// and a trailing CRLF is appended. An empty payload becomes the terminal
/// chunk `0\r\n\r\n`.
///
/// Returns `false` when the framed chunk did not fit in the payload's capacity.
pub fn frame_chunk<S>(payload: &mut Buffer<S>) -> bool
where
    S: AsRef<[u8]> + AsMut<[u8]>,
{
    let Ok(length) = u32::try_from(payload.size()) else {
        return false;
    };
    let mut prefix = Buffer::<[u8; SIZE_PREFIX_CAPACITY]>::inline();
    prefix.hex_no_zeros(length);
    prefix.crlf();

    let overflow = payload.overflow();
    payload.shift_right(prefix.size(), 0);
    payload.overwrite(prefix.data(), 0);
    payload.crlf();
    payload.overflow() == overflow
}
