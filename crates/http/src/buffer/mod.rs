//! Fixed-capacity byte buffer used by every layer of the engine.
//!
//! A [`Buffer`] is a plain byte store with two independent cursors:
//!
//! - the **write cursor** marks the end of the active region `[0, size)`;
//!   every append lands there and nothing is ever written past `capacity`
//! - the **read cursor** is a second traversal over the same bytes, moved by
//!   [`Buffer::read_next`]; reading never frees or shifts stored data
//!
//! Rejected writes are counted in an overflow counter instead of failing
//! loudly, so callers can build a whole message and check once at the end.
//! Every operation is total: out-of-range requests return `false`/`None` and
//! leave the buffer untouched. There is no panic path.
//!
//! # Storage
//!
//! The store is generic over `S: AsRef<[u8]> + AsMut<[u8]>`:
//!
//! - `Buffer` (`Box<[u8]>`) for heap buffers, with fallible allocation via
//!   [`Buffer::try_new`] and explicit growth via [`Buffer::grow`]
//! - `Buffer<[u8; N]>` for inline scratch space (parser line, chunk size prefix)
//! - `Buffer<&mut [u8]>` for caller supplied regions
//!
//! A buffer is never resized implicitly.

mod format;

use std::collections::TryReserveError;
use std::fmt;

/// Fixed-capacity byte container with independent read/write cursors.
#[derive(Clone)]
pub struct Buffer<S = Box<[u8]>> {
    store: S,
    write_it: usize,
    read_it: usize,
    overflow: usize,
}

impl Buffer {
    /// Creates a zero-filled heap buffer.
    pub fn new(capacity: usize) -> Self {
        Self::from_storage(vec![0; capacity].into_boxed_slice())
    }

    /// Creates a heap buffer, reporting allocation failure instead of aborting.
    pub fn try_new(capacity: usize) -> Result<Self, TryReserveError> {
        let mut store = Vec::new();
        store.try_reserve_exact(capacity)?;
        store.resize(capacity, 0);
        Ok(Self::from_storage(store.into_boxed_slice()))
    }

    /// Creates a buffer holding exactly `data`.
    pub fn from_slice(data: &[u8]) -> Self {
        let mut buffer = Self::new(data.len());
        buffer.append_fast(data);
        buffer
    }

    /// Re-allocates the store with a larger capacity, keeping content and cursors.
    ///
    /// Shrinking is a no-op.
    pub fn grow(&mut self, capacity: usize) -> Result<(), TryReserveError> {
        if capacity <= self.capacity() {
            return Ok(());
        }
        let mut store = Vec::new();
        store.try_reserve_exact(capacity)?;
        store.extend_from_slice(self.data());
        store.resize(capacity, 0);
        self.store = store.into_boxed_slice();
        Ok(())
    }
}

impl<const N: usize> Buffer<[u8; N]> {
    pub const fn inline() -> Self {
        Self::from_storage([0; N])
    }
}

impl<const N: usize> Default for Buffer<[u8; N]> {
    fn default() -> Self {
        Self::inline()
    }
}

impl<S> Buffer<S> {
    /// Wraps an existing store; its current bytes are treated as garbage.
    pub const fn from_storage(store: S) -> Self {
        Self { store, write_it: 0, read_it: 0, overflow: 0 }
    }

    /// Number of bytes in the active region.
    #[inline]
    pub fn size(&self) -> usize {
        self.write_it
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.write_it == 0
    }

    /// Number of writes rejected since the last [`Buffer::clear`].
    #[inline]
    pub fn overflow(&self) -> usize {
        self.overflow
    }

    #[inline]
    pub fn read_position(&self) -> usize {
        self.read_it
    }

    /// Bytes left for [`Buffer::read_next`].
    #[inline]
    pub fn bytes_to_read(&self) -> usize {
        self.write_it - self.read_it
    }

    pub fn reset_read(&mut self) {
        self.read_it = 0;
    }

    /// Resets both cursors and the overflow counter; stored bytes are untouched.
    ///
    /// Returns the size before clearing.
    pub fn clear(&mut self) -> usize {
        let size = self.write_it;
        self.write_it = 0;
        self.read_it = 0;
        self.overflow = 0;
        size
    }

    pub fn into_inner(self) -> S {
        self.store
    }

    fn reject(&mut self, count: usize) -> bool {
        self.overflow = self.overflow.saturating_add(count);
        false
    }
}

impl<S: AsRef<[u8]>> Buffer<S> {
    #[inline]
    pub fn capacity(&self) -> usize {
        self.store.as_ref().len()
    }

    #[inline]
    pub fn remaining(&self) -> usize {
        self.capacity() - self.write_it
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.write_it == self.capacity()
    }

    /// The active region `[0, size)`.
    #[inline]
    pub fn data(&self) -> &[u8] {
        &self.store.as_ref()[..self.write_it]
    }

    /// The active region starting at `offset`, empty when `offset` is past the end.
    pub fn data_from(&self, offset: usize) -> &[u8] {
        self.data().get(offset..).unwrap_or_default()
    }

    /// Random access inside the active region.
    pub fn read(&self, index: usize) -> Option<u8> {
        self.data().get(index).copied()
    }

    /// Compares the head of the active region with `data`.
    pub fn equal(&self, data: &[u8]) -> bool {
        !data.is_empty() && self.data().starts_with(data)
    }

    /// Compares the tail of the active region with `data`.
    ///
    /// Called after every received byte to spot a terminating CRLF.
    pub fn equal_from_end(&self, data: &[u8]) -> bool {
        !data.is_empty() && self.data().ends_with(data)
    }

    /// Index of the first `byte` at or after `begin`.
    pub fn search(&self, begin: usize, byte: u8) -> Option<usize> {
        self.data_from(begin).iter().position(|&b| b == byte).map(|index| index + begin)
    }

    /// Index of the first occurrence of `needle` in the active region.
    pub fn find(&self, needle: &[u8]) -> Option<usize> {
        if needle.is_empty() {
            return Some(0);
        }
        self.data().windows(needle.len()).position(|window| window == needle)
    }

    /// Active region as text, up to the first NUL and the first invalid UTF-8 sequence.
    ///
    /// Unlike [`Buffer::as_text`] this does not terminate the buffer.
    pub fn text(&self) -> &str {
        let data = self.data();
        let end = data.iter().position(|&b| b == 0).unwrap_or(data.len());
        utf8_prefix(&data[..end])
    }
}

impl<S: AsRef<[u8]> + AsMut<[u8]>> Buffer<S> {
    /// Appends one byte; a full buffer counts an overflow and rejects the write.
    pub fn write(&mut self, byte: u8) -> bool {
        if self.is_full() {
            return self.reject(1);
        }
        let index = self.write_it;
        self.store.as_mut()[index] = byte;
        self.write_it += 1;
        true
    }

    /// Returns the byte under the read cursor and advances it.
    pub fn read_next(&mut self) -> Option<u8> {
        let byte = self.read(self.read_it)?;
        self.read_it += 1;
        Some(byte)
    }

    /// Moves the write cursor, clamped to capacity. Returns `false` when clamped.
    pub fn set_writer(&mut self, offset: usize) -> bool {
        let capacity = self.capacity();
        self.write_it = offset.min(capacity);
        self.read_it = self.read_it.min(self.write_it);
        offset <= capacity
    }

    /// Moves the write cursor back by `count` bytes.
    pub fn rewind(&mut self, count: usize) {
        self.set_writer(self.write_it.saturating_sub(count));
    }

    /// Stores `byte` at `index`, extending the active region when `index` is at or past its end.
    pub fn write_at(&mut self, index: usize, byte: u8) -> bool {
        if index >= self.capacity() {
            return self.reject(1);
        }
        self.store.as_mut()[index] = byte;
        if index >= self.write_it {
            self.write_it = index + 1;
        }
        true
    }

    /// Copies `data` to `offset`, extending the active region if the copy ends past it.
    ///
    /// All or nothing: a copy that would cross capacity is rejected.
    pub fn overwrite(&mut self, data: &[u8], offset: usize) -> bool {
        let Some(end) = offset.checked_add(data.len()).filter(|&end| end <= self.capacity()) else {
            return self.reject(data.len());
        };
        self.store.as_mut()[offset..end].copy_from_slice(data);
        self.write_it = self.write_it.max(end);
        true
    }

    /// Copies `data` so that it ends `offset` bytes before the write cursor.
    pub fn overwrite_from_end(&mut self, data: &[u8], offset: usize) -> bool {
        let Some(begin) = self.write_it.checked_sub(offset).and_then(|end| end.checked_sub(data.len())) else {
            return false;
        };
        self.overwrite(data, begin)
    }

    /// Appends all of `data` or nothing.
    pub fn append(&mut self, data: &[u8]) -> bool {
        if data.len() > self.remaining() {
            return self.reject(data.len());
        }
        let begin = self.write_it;
        self.overwrite(data, begin)
    }

    /// Appends as much of `data` as fits and returns how many bytes were copied.
    ///
    /// Truncation is silent; the overflow counter is not touched.
    pub fn append_fast(&mut self, data: &[u8]) -> usize {
        let count = data.len().min(self.remaining());
        let begin = self.write_it;
        self.store.as_mut()[begin..begin + count].copy_from_slice(&data[..count]);
        self.write_it += count;
        count
    }

    pub fn puts(&mut self, text: &str) -> bool {
        self.append(text.as_bytes())
    }

    pub fn crlf(&mut self) -> bool {
        self.append(b"\r\n")
    }

    /// Drops the first `count` bytes, moving the rest of the active region to the front.
    pub fn shift_left(&mut self, count: usize) -> bool {
        if count == 0 || count > self.write_it {
            return false;
        }
        let size = self.write_it;
        self.store.as_mut().copy_within(count..size, 0);
        self.write_it -= count;
        self.read_it = self.read_it.saturating_sub(count);
        true
    }

    /// Moves the active region `count` bytes to the right and fills the gap with `fill`.
    ///
    /// Bytes pushed past capacity are lost and counted as overflow. An empty
    /// buffer is left unchanged.
    pub fn shift_right(&mut self, count: usize, fill: u8) -> bool {
        if count == 0 || self.is_empty() {
            return true;
        }
        let capacity = self.capacity();
        let size = self.write_it;
        let kept = size.min(capacity.saturating_sub(count));
        let dropped = size - kept;

        let store = self.store.as_mut();
        store.copy_within(..kept, count.min(capacity));
        store[..count.min(capacity)].fill(fill);

        self.write_it = (size + count).min(capacity);
        self.read_it = (self.read_it + count).min(self.write_it);
        if dropped > 0 {
            return self.reject(dropped);
        }
        true
    }

    /// Guarantees the active region ends with a NUL inside capacity.
    ///
    /// The NUL is appended (and becomes part of the active region) unless the
    /// last byte already is one; a full buffer has its last byte overwritten.
    /// Calling it twice changes nothing the second time.
    pub fn close(&mut self) {
        let capacity = self.capacity();
        if capacity == 0 {
            return;
        }
        let size = self.write_it;
        if size < capacity {
            if size == 0 || self.store.as_ref()[size - 1] != 0 {
                self.write_at(size, 0);
            }
            return;
        }
        self.store.as_mut()[capacity - 1] = 0;
    }

    /// Terminates the buffer and views it as text without copying.
    pub fn as_text(&mut self) -> &str {
        self.close();
        self.text()
    }
}

impl<S: AsRef<[u8]>> PartialEq<[u8]> for Buffer<S> {
    fn eq(&self, other: &[u8]) -> bool {
        self.data() == other
    }
}

impl<S: AsRef<[u8]>> fmt::Debug for Buffer<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Buffer")
            .field("capacity", &self.capacity())
            .field("size", &self.write_it)
            .field("read", &self.read_it)
            .field("overflow", &self.overflow)
            .finish()
    }
}

fn utf8_prefix(bytes: &[u8]) -> &str {
    match std::str::from_utf8(bytes) {
        Ok(text) => text,
        Err(e) => std::str::from_utf8(&bytes[..e.valid_up_to()]).unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_rejects_when_full() {
        let mut buffer = Buffer::<[u8; 2]>::inline();
        assert!(buffer.write(b'a'));
        assert!(buffer.write(b'b'));
        assert!(!buffer.write(b'c'));
        assert!(!buffer.write(b'd'));

        assert_eq!(buffer.data(), b"ab");
        assert_eq!(buffer.overflow(), 2);

        buffer.clear();
        assert_eq!(buffer.overflow(), 0);
        assert!(buffer.is_empty());
    }

    #[test]
    fn read_cursor_is_independent() {
        let mut buffer = Buffer::new(8);
        buffer.puts("xyz");

        assert_eq!(buffer.read_next(), Some(b'x'));
        assert_eq!(buffer.read_next(), Some(b'y'));
        assert_eq!(buffer.bytes_to_read(), 1);
        assert_eq!(buffer.read_next(), Some(b'z'));
        assert_eq!(buffer.read_next(), None);

        // reading does not consume
        assert_eq!(buffer.data(), b"xyz");
        buffer.reset_read();
        assert_eq!(buffer.read_next(), Some(b'x'));
    }

    #[test]
    fn set_writer_is_clamped() {
        let mut buffer = Buffer::new(4);
        buffer.puts("abcd");
        buffer.read_next();
        buffer.read_next();
        buffer.read_next();

        assert!(buffer.set_writer(1));
        assert_eq!(buffer.data(), b"a");
        assert_eq!(buffer.read_position(), 1);

        assert!(!buffer.set_writer(10));
        assert_eq!(buffer.size(), 4);
    }

    #[test]
    fn overwrite_extends_active_region() {
        let mut buffer = Buffer::new(8);
        buffer.puts("abc");

        assert!(buffer.overwrite(b"XY", 1));
        assert_eq!(buffer.data(), b"aXY");

        assert!(buffer.overwrite(b"123", 2));
        assert_eq!(buffer.data(), b"aX123");

        assert!(!buffer.overwrite(b"1234", 5));
        assert_eq!(buffer.data(), b"aX123");
        assert_eq!(buffer.overflow(), 4);
    }

    #[test]
    fn overwrite_from_end_patches_tail() {
        let mut buffer = Buffer::new(8);
        buffer.puts("hello!");

        assert!(buffer.overwrite_from_end(b"LL", 2));
        assert_eq!(buffer.data(), b"heLLo!");

        assert!(buffer.overwrite_from_end(b"?", 0));
        assert_eq!(buffer.data(), b"heLLo?");

        assert!(!buffer.overwrite_from_end(b"too long", 0));
    }

    #[test]
    fn append_fast_truncates_silently() {
        let mut buffer = Buffer::new(4);
        assert_eq!(buffer.append_fast(b"abcdef"), 4);
        assert_eq!(buffer.data(), b"abcd");
        assert_eq!(buffer.overflow(), 0);
        assert_eq!(buffer.append_fast(b"x"), 0);
    }

    #[test]
    fn append_is_all_or_nothing() {
        let mut buffer = Buffer::new(4);
        assert!(buffer.append(b"ab"));
        assert!(!buffer.append(b"cde"));
        assert_eq!(buffer.data(), b"ab");
        assert_eq!(buffer.overflow(), 3);
    }

    #[test]
    fn shift_left_drains_consumed_bytes() {
        let mut buffer = Buffer::new(8);
        buffer.puts("abcdef");
        for _ in 0..4 {
            buffer.read_next();
        }

        assert!(buffer.shift_left(3));
        assert_eq!(buffer.data(), b"def");
        assert_eq!(buffer.read_next(), Some(b'e'));

        assert!(!buffer.shift_left(4));
        assert!(!buffer.shift_left(0));
    }

    #[test]
    fn shift_right_makes_room_for_prefix() {
        let mut buffer = Buffer::new(8);
        buffer.puts("abc");

        assert!(buffer.shift_right(2, b'-'));
        assert_eq!(buffer.data(), b"--abc");

        assert!(!buffer.shift_right(4, b'.'));
        assert_eq!(buffer.data(), b"....--ab");
        assert_eq!(buffer.overflow(), 1);
    }

    #[test]
    fn shift_right_ignores_empty_buffer() {
        let mut buffer = Buffer::new(8);
        assert!(buffer.shift_right(3, b'x'));
        assert!(buffer.is_empty());
    }

    #[test]
    fn tail_compare_detects_crlf() {
        let mut buffer = Buffer::<[u8; 16]>::inline();
        buffer.puts("Host: a\r");
        assert!(!buffer.equal_from_end(b"\r\n"));
        buffer.write(b'\n');
        assert!(buffer.equal_from_end(b"\r\n"));
        assert!(buffer.equal(b"Host"));
        assert!(!buffer.equal(b""));
    }

    #[test]
    fn search_and_find() {
        let mut buffer = Buffer::new(32);
        buffer.puts("--bound\r\ndata--bound");

        assert_eq!(buffer.search(0, b'\r'), Some(7));
        assert_eq!(buffer.search(8, b'-'), Some(13));
        assert_eq!(buffer.search(40, b'-'), None);

        assert_eq!(buffer.find(b"data"), Some(9));
        assert_eq!(buffer.find(b"--bound"), Some(0));
        assert_eq!(buffer.find(b"xyz"), None);
    }

    #[test]
    fn close_is_idempotent() {
        let mut buffer = Buffer::new(8);
        buffer.puts("abc");

        let first = buffer.as_text().to_owned();
        let first_bytes = buffer.data().to_vec();
        let second = buffer.as_text().to_owned();

        assert_eq!(first, "abc");
        assert_eq!(first, second);
        assert_eq!(first_bytes, buffer.data());
        assert_eq!(buffer.data(), b"abc\0");
    }

    #[test]
    fn close_full_buffer_overwrites_last_byte() {
        let mut buffer = Buffer::<[u8; 4]>::inline();
        buffer.puts("abcd");
        assert_eq!(buffer.as_text(), "abc");
        assert_eq!(buffer.as_text(), "abc");
    }

    #[test]
    fn text_stops_at_invalid_utf8() {
        let mut buffer = Buffer::new(8);
        buffer.append(&[b'o', b'k', 0xFF, b'x']);
        assert_eq!(buffer.text(), "ok");
    }

    #[test]
    fn grow_keeps_content() {
        let mut buffer = Buffer::try_new(3).unwrap();
        buffer.puts("abc");
        buffer.read_next();

        buffer.grow(6).unwrap();
        assert_eq!(buffer.capacity(), 6);
        assert_eq!(buffer.data(), b"abc");
        assert_eq!(buffer.read_position(), 1);
        assert!(buffer.puts("def"));

        buffer.grow(2).unwrap();
        assert_eq!(buffer.capacity(), 6);
    }

    #[test]
    fn borrowed_storage() {
        let mut region = [0u8; 4];
        {
            let mut buffer = Buffer::from_storage(&mut region[..]);
            buffer.puts("hi");
            assert_eq!(buffer.capacity(), 4);
        }
        assert_eq!(&region[..2], b"hi");
    }

    #[test]
    fn zero_capacity_is_total() {
        let mut buffer = Buffer::new(0);
        assert!(!buffer.write(1));
        assert_eq!(buffer.read_next(), None);
        buffer.close();
        assert_eq!(buffer.as_text(), "");
        assert!(!buffer.write_at(0, 1));
    }
}
