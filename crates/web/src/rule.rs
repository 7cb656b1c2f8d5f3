//! Typed validation of path segments and query values.
//!
//! A [`Rule`] is a `const` value, so pages declare their argument rules in
//! `static` arrays. The router asks [`Rule::validate`] for every segment or
//! query value; a match yields a typed [`Value`] that is handed to the page
//! handler.
//!
//! # Kinds
//!
//! | kind | accepts | value |
//! |------|---------|-------|
//! | `UnsignedInt` / `SignedInt` | decimal in `min..=max` | `Uint` / `Int` |
//! | `Boolean` | `true`, `false` | `Bool` |
//! | `Enum` | one of the listed words | `Index` |
//! | `Alnum`, `Alpha`, `Chars`, `Digits`, `LongHex`, `Set` | character classes | `Text` |
//! | `Hex` | 1 to 8 hex digits | `Uint` |
//! | `Mac` / `MacOrSelf` | 12 hex digits (or `self`) | `Mac` / `OwnMac` |
//! | `Ip` | dotted quad | `Ip` |
//! | `Real` | `-?digits(.digits)?` | `Real` |
//!
//! Length bounds (`min_len..=max_len`) apply to the character class kinds
//! and to `Hex`.

use std::fmt::{self, Write};
use std::net::Ipv4Addr;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum RuleKind {
    UnsignedInt { min: u32, max: u32 },
    SignedInt { min: i32, max: i32 },
    Boolean,
    Enum(&'static [&'static str]),
    Alnum,
    Alpha,
    Chars,
    Digits,
    None,
    SingleChar,
    Mac,
    Hex,
    Ip,
    LongHex,
    Real,
    Equal(&'static str),
    Set(&'static str),
    MacOrSelf,
}

/// A validated argument.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum Value<'a> {
    Uint(u32),
    Int(i32),
    Bool(bool),
    Index(usize),
    Real(f64),
    Char(char),
    Ip(Ipv4Addr),
    Mac([u8; 6]),
    /// `self` given where a MAC was expected.
    OwnMac,
    Text(&'a str),
}

impl Value<'_> {
    pub fn as_uint(&self) -> Option<u32> {
        match *self {
            Value::Uint(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match *self {
            Value::Text(text) => Some(text),
            _ => None,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Rule {
    kind: RuleKind,
    name: &'static str,
    min_len: usize,
    max_len: usize,
    required: bool,
}

impl Rule {
    const fn of(name: &'static str, kind: RuleKind) -> Self {
        Self { kind, name, min_len: 0, max_len: usize::MAX, required: false }
    }

    pub const fn uint(name: &'static str, min: u32, max: u32) -> Self {
        Self::of(name, RuleKind::UnsignedInt { min, max })
    }

    pub const fn int(name: &'static str, min: i32, max: i32) -> Self {
        Self::of(name, RuleKind::SignedInt { min, max })
    }

    pub const fn boolean(name: &'static str) -> Self {
        Self::of(name, RuleKind::Boolean)
    }

    pub const fn enumeration(name: &'static str, values: &'static [&'static str]) -> Self {
        Self::of(name, RuleKind::Enum(values))
    }

    pub const fn alnum(name: &'static str) -> Self {
        Self::of(name, RuleKind::Alnum)
    }

    pub const fn alpha(name: &'static str) -> Self {
        Self::of(name, RuleKind::Alpha)
    }

    pub const fn chars(name: &'static str) -> Self {
        Self::of(name, RuleKind::Chars)
    }

    pub const fn digits(name: &'static str) -> Self {
        Self::of(name, RuleKind::Digits)
    }

    pub const fn none(name: &'static str) -> Self {
        Self::of(name, RuleKind::None)
    }

    pub const fn single_char(name: &'static str) -> Self {
        Self::of(name, RuleKind::SingleChar)
    }

    pub const fn mac(name: &'static str) -> Self {
        Self::of(name, RuleKind::Mac)
    }

    pub const fn mac_or_self(name: &'static str) -> Self {
        Self::of(name, RuleKind::MacOrSelf)
    }

    pub const fn hex(name: &'static str) -> Self {
        Self::of(name, RuleKind::Hex).with_len(1, 8)
    }

    pub const fn long_hex(name: &'static str) -> Self {
        Self::of(name, RuleKind::LongHex)
    }

    pub const fn ip(name: &'static str) -> Self {
        Self::of(name, RuleKind::Ip)
    }

    pub const fn real(name: &'static str) -> Self {
        Self::of(name, RuleKind::Real)
    }

    /// Matches exactly `literal`.
    pub const fn equal(name: &'static str, literal: &'static str) -> Self {
        Self::of(name, RuleKind::Equal(literal))
    }

    /// Matches strings made only of characters from `set`.
    pub const fn set(name: &'static str, set: &'static str) -> Self {
        Self::of(name, RuleKind::Set(set))
    }

    /// Bounds the input length, for the kinds that check it.
    pub const fn with_len(mut self, min_len: usize, max_len: usize) -> Self {
        self.min_len = min_len;
        self.max_len = max_len;
        self
    }

    pub const fn required(mut self) -> Self {
        self.required = true;
        self
    }

    #[inline]
    pub fn kind(&self) -> RuleKind {
        self.kind
    }

    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }

    #[inline]
    pub fn is_required(&self) -> bool {
        self.required
    }

    fn checks_len(&self) -> bool {
        matches!(
            self.kind,
            RuleKind::Alnum
                | RuleKind::Alpha
                | RuleKind::Chars
                | RuleKind::Digits
                | RuleKind::Hex
                | RuleKind::LongHex
                | RuleKind::Set(_)
        )
    }

    /// Checks `input`, returning its typed value when it matches.
    pub fn validate<'a>(&self, input: &'a str) -> Option<Value<'a>> {
        if self.checks_len() && !(self.min_len..=self.max_len).contains(&input.len()) {
            return None;
        }

        match self.kind {
            RuleKind::UnsignedInt { min, max } => {
                let value = u32::try_from(parse_unsigned(input)?).ok()?;
                (min..=max).contains(&value).then_some(Value::Uint(value))
            }
            RuleKind::SignedInt { min, max } => {
                let value = i32::try_from(parse_signed(input)?).ok()?;
                (min..=max).contains(&value).then_some(Value::Int(value))
            }
            RuleKind::Boolean => match input {
                "true" => Some(Value::Bool(true)),
                "false" => Some(Value::Bool(false)),
                _ => None,
            },
            RuleKind::Enum(values) => values.iter().position(|v| *v == input).map(Value::Index),
            RuleKind::Alnum => all_chars(input, |c| c.is_ascii_alphanumeric() || c.is_ascii_whitespace()),
            RuleKind::Alpha => all_chars(input, |c| c.is_ascii_alphabetic()),
            RuleKind::Digits => all_chars(input, |c| c.is_ascii_digit()),
            RuleKind::LongHex => all_chars(input, |c| c.is_ascii_hexdigit()),
            RuleKind::Set(set) => {
                if set.is_empty() {
                    return None;
                }
                all_chars(input, |c| set.contains(c))
            }
            RuleKind::Chars | RuleKind::None => Some(Value::Text(input)),
            RuleKind::SingleChar => {
                let mut chars = input.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) if input.len() == 1 => Some(Value::Char(c)),
                    _ => None,
                }
            }
            RuleKind::Hex => {
                if input.is_empty() || !input.bytes().all(|b| b.is_ascii_hexdigit()) {
                    return None;
                }
                u32::from_str_radix(input, 16).ok().map(Value::Uint)
            }
            RuleKind::Mac => parse_mac(input).map(Value::Mac),
            RuleKind::MacOrSelf => {
                if input == "self" {
                    return Some(Value::OwnMac);
                }
                parse_mac(input).map(Value::Mac)
            }
            RuleKind::Ip => parse_ip(input).map(Value::Ip),
            RuleKind::Real => parse_real(input).map(Value::Real),
            RuleKind::Equal(literal) => (input == literal).then_some(Value::Text(input)),
        }
    }

    /// Short type tag used by the route listing.
    pub fn type_tag(&self) -> &'static str {
        match self.kind {
            RuleKind::UnsignedInt { .. } => "UINT",
            RuleKind::SignedInt { .. } => "SINT",
            RuleKind::Boolean => "BOOL",
            RuleKind::Enum(_) => "ENUM",
            RuleKind::Alnum => "ALNUM",
            RuleKind::Alpha => "ALPHA",
            RuleKind::Chars => "CHRS",
            RuleKind::Digits => "DIGS",
            RuleKind::None => "NONE",
            RuleKind::SingleChar => "SCHAR",
            RuleKind::Mac => "MAC",
            RuleKind::Hex => "HEX",
            RuleKind::Ip => "IP",
            RuleKind::LongHex => "LHEX",
            RuleKind::Real => "REAL",
            RuleKind::Equal(_) => "EQUAL",
            RuleKind::Set(_) => "SET",
            RuleKind::MacOrSelf => "SELF",
        }
    }

    /// Writes the accepted range; kinds without one, and unbounded lengths, write nothing.
    pub fn write_range(&self, dst: &mut impl Write) -> fmt::Result {
        match self.kind {
            RuleKind::Enum(values) => {
                for (index, value) in values.iter().enumerate() {
                    if index > 0 {
                        dst.write_char('|')?;
                    }
                    dst.write_str(value)?;
                }
                Ok(())
            }
            RuleKind::Boolean => dst.write_str("false|true"),
            RuleKind::Equal(literal) => dst.write_str(literal),
            RuleKind::UnsignedInt { min, max } => write!(dst, "{min}..{max}"),
            RuleKind::SignedInt { min, max } => write!(dst, "{min}..{max}"),
            _ if self.checks_len() && self.max_len != usize::MAX => {
                write!(dst, "{}..{}", self.min_len, self.max_len)
            }
            _ => Ok(()),
        }
    }
}

fn all_chars(input: &str, accept: impl Fn(char) -> bool) -> Option<Value<'_>> {
    input.chars().all(accept).then_some(Value::Text(input))
}

fn parse_unsigned(input: &str) -> Option<u64> {
    if input.is_empty() || !input.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    input.parse().ok()
}

fn parse_signed(input: &str) -> Option<i64> {
    let digits = input.strip_prefix('-').unwrap_or(input);
    let magnitude = i64::try_from(parse_unsigned(digits)?).ok()?;
    Some(if digits.len() < input.len() { -magnitude } else { magnitude })
}

fn parse_mac(input: &str) -> Option<[u8; 6]> {
    let bytes = input.as_bytes();
    if bytes.len() != 12 || !bytes.iter().all(u8::is_ascii_hexdigit) {
        return None;
    }
    let mut mac = [0u8; 6];
    for (octet, pair) in mac.iter_mut().zip(input.as_bytes().chunks(2)) {
        *octet = u8::from_str_radix(std::str::from_utf8(pair).ok()?, 16).ok()?;
    }
    Some(mac)
}

fn parse_ip(input: &str) -> Option<Ipv4Addr> {
    if !(7..=15).contains(&input.len()) || !input.bytes().all(|b| b.is_ascii_digit() || b == b'.') {
        return None;
    }
    if input.bytes().filter(|&b| b == b'.').count() != 3 {
        return None;
    }
    input.parse().ok()
}

// -?digits with at most one '.' that is neither first nor last
fn parse_real(input: &str) -> Option<f64> {
    let unsigned = input.strip_prefix('-').unwrap_or(input);
    if unsigned.is_empty() || !unsigned.bytes().all(|b| b.is_ascii_digit() || b == b'.') {
        return None;
    }
    let dots = unsigned.bytes().filter(|&b| b == b'.').count();
    if dots > 1 || (dots == 1 && (unsigned.len() < 3 || unsigned.starts_with('.') || unsigned.ends_with('.'))) {
        return None;
    }
    input.parse().ok()
}
