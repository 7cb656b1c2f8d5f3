//! Number and address formatting straight into a [`Buffer`].

use super::Buffer;
use std::fmt::{self, Write};
use std::net::Ipv4Addr;

const HEX_DIGITS: &[u8; 16] = b"0123456789ABCDEF";

impl<S: AsRef<[u8]> + AsMut<[u8]>> Buffer<S> {
    /// Writes `value` as exactly two uppercase hex digits.
    pub fn write_hex(&mut self, value: u8) -> bool {
        let digits = [HEX_DIGITS[usize::from(value >> 4)], HEX_DIGITS[usize::from(value & 0x0F)]];
        self.append(&digits)
    }

    /// Writes the low `bytes` bytes of `value`, most significant first, two digits each.
    pub fn hex(&mut self, value: u64, bytes: usize) -> bool {
        if bytes == 0 || bytes > 8 || bytes * 2 > self.remaining() {
            return false;
        }
        value.to_be_bytes()[8 - bytes..].iter().all(|&byte| self.write_hex(byte))
    }

    /// Writes `value` in uppercase hex without leading zeros (`0` for zero).
    pub fn hex_no_zeros(&mut self, value: u32) -> bool {
        self.formatted(format_args!("{value:X}"))
    }

    /// Writes `value` in signed decimal.
    pub fn dec(&mut self, value: i64) -> bool {
        self.formatted(format_args!("{value}"))
    }

    /// Writes `addr` in dotted-quad form.
    pub fn put_ip(&mut self, addr: Ipv4Addr) -> bool {
        self.formatted(format_args!("{addr}"))
    }

    /// Writes a MAC address as 12 uppercase hex digits.
    pub fn put_mac(&mut self, mac: &[u8; 6]) -> bool {
        if self.remaining() < 12 {
            return false;
        }
        mac.iter().all(|&byte| self.write_hex(byte))
    }

    // all or nothing: a partially formatted value is rolled back
    fn formatted(&mut self, args: fmt::Arguments<'_>) -> bool {
        let mark = self.write_it;
        if self.write_fmt(args).is_ok() {
            return true;
        }
        self.set_writer(mark);
        false
    }
}

impl<S: AsRef<[u8]> + AsMut<[u8]>> Write for Buffer<S> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        if self.puts(s) { Ok(()) } else { Err(fmt::Error) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_hex_pads_to_two_digits() {
        let mut buffer = Buffer::new(8);
        buffer.write_hex(0x0A);
        buffer.write_hex(0xF0);
        buffer.write_hex(0);
        assert_eq!(buffer.data(), b"0AF000");
    }

    #[test]
    fn hex_fixed_width() {
        let mut buffer = Buffer::new(16);
        assert!(buffer.hex(0x01A2_B3C4, 4));
        assert_eq!(buffer.data(), b"01A2B3C4");

        buffer.clear();
        assert!(buffer.hex(0x1234, 1));
        assert_eq!(buffer.data(), b"34");

        assert!(!buffer.hex(1, 0));
        assert!(!buffer.hex(1, 9));
    }

    #[test]
    fn hex_without_leading_zeros() {
        let mut buffer = Buffer::new(16);
        buffer.hex_no_zeros(0);
        buffer.write(b' ');
        buffer.hex_no_zeros(0x1F);
        buffer.write(b' ');
        buffer.hex_no_zeros(1400);
        assert_eq!(buffer.text(), "0 1F 578");
    }

    #[test]
    fn dec_and_ip() {
        let mut buffer = Buffer::new(32);
        buffer.dec(-42);
        buffer.write(b' ');
        buffer.put_ip(Ipv4Addr::new(192, 168, 4, 1));
        assert_eq!(buffer.text(), "-42 192.168.4.1");
    }

    #[test]
    fn mac_is_twelve_digits() {
        let mut buffer = Buffer::new(12);
        assert!(buffer.put_mac(&[0x18, 0xFE, 0x34, 0x00, 0xAB, 0x0C]));
        assert_eq!(buffer.data(), b"18FE3400AB0C");
        assert!(!buffer.put_mac(&[0; 6]));
    }

    #[test]
    fn overflowing_format_is_rolled_back() {
        let mut buffer = Buffer::new(4);
        buffer.puts("ab");
        assert!(!buffer.dec(12345));
        assert_eq!(buffer.data(), b"ab");
        assert!(buffer.overflow() > 0);
    }

    #[test]
    fn fmt_write_into_buffer() {
        let mut buffer = Buffer::<[u8; 32]>::inline();
        write!(buffer, "{}-{:02}", "id", 7).unwrap();
        assert_eq!(buffer.text(), "id-07");
    }
}
