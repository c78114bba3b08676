//! Typed fields and their wire representation.
//!
//! Each field is a 1-byte [Tag] followed by its payload:
//! - [Tag::Int32]: 4 bytes, two's complement, little-endian.
//! - [Tag::Int64]: 8 bytes, two's complement, little-endian.
//! - [Tag::String]: raw bytes followed by a single NUL terminator.

use crate::{
    codec::{at_least, EncodeSize, Read, Write},
    Error,
};
use bytes::{Buf, BufMut, Bytes};
use std::ops::Deref;

/// The NUL byte terminating every string payload.
pub const TERMINATOR: u8 = 0x00;

/// Type tag written before every field payload.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Tag {
    Int32 = b'A',
    Int64 = b'B',
    String = b'C',
}

impl Tag {
    /// Size of the payload following this tag, if fixed.
    pub const fn payload_size(self) -> Option<usize> {
        match self {
            Self::Int32 => Some(4),
            Self::Int64 => Some(8),
            Self::String => None,
        }
    }
}

impl TryFrom<u8> for Tag {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self, Error> {
        match value {
            b'A' => Ok(Self::Int32),
            b'B' => Ok(Self::Int64),
            b'C' => Ok(Self::String),
            other => Err(Error::UnknownTag(other)),
        }
    }
}

/// A byte string guaranteed not to contain [TERMINATOR].
#[derive(Clone, Debug, PartialEq, Eq, Hash, Default)]
pub struct Text(Bytes);

impl Text {
    /// Wrap `bytes`, rejecting any payload that contains a NUL byte.
    pub fn new(bytes: impl Into<Bytes>) -> Result<Self, Error> {
        let bytes = bytes.into();
        if bytes.contains(&TERMINATOR) {
            return Err(Error::InvalidString);
        }
        Ok(Self(bytes))
    }

    /// Wrap a static payload.
    ///
    /// # Panics
    ///
    /// Panics if `bytes` contains a NUL byte (at compile time in a `const`).
    pub const fn from_static(bytes: &'static [u8]) -> Self {
        let mut i = 0;
        while i < bytes.len() {
            assert!(bytes[i] != TERMINATOR, "string payload contains a NUL byte");
            i += 1;
        }
        Self(Bytes::from_static(bytes))
    }

    /// Returns the underlying bytes.
    pub fn into_inner(self) -> Bytes {
        self.0
    }
}

impl Deref for Text {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.0
    }
}

/// One encoded value inside a message body.
///
/// Only `i32`, `i64` and NUL-free byte strings can become a [Field]; any other
/// value type is rejected at compile time.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Field {
    Int32(i32),
    Int64(i64),
    String(Text),
}

impl Field {
    /// Create a string field, rejecting payloads that contain a NUL byte.
    pub fn string(bytes: impl Into<Bytes>) -> Result<Self, Error> {
        Text::new(bytes).map(Self::String)
    }

    /// The tag this field is written with.
    pub fn tag(&self) -> Tag {
        match self {
            Self::Int32(_) => Tag::Int32,
            Self::Int64(_) => Tag::Int64,
            Self::String(_) => Tag::String,
        }
    }

    /// Returns the value if this is an [Field::Int32].
    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Self::Int32(value) => Some(*value),
            _ => None,
        }
    }

    /// Returns the value if this is an [Field::Int64].
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int64(value) => Some(*value),
            _ => None,
        }
    }

    /// Returns the payload if this is a [Field::String].
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::String(text) => Some(text),
            _ => None,
        }
    }
}

impl From<i32> for Field {
    fn from(value: i32) -> Self {
        Self::Int32(value)
    }
}

impl From<i64> for Field {
    fn from(value: i64) -> Self {
        Self::Int64(value)
    }
}

impl From<Text> for Field {
    fn from(text: Text) -> Self {
        Self::String(text)
    }
}

impl TryFrom<&'static str> for Field {
    type Error = Error;

    fn try_from(value: &'static str) -> Result<Self, Error> {
        Self::string(value)
    }
}

impl TryFrom<&'static [u8]> for Field {
    type Error = Error;

    fn try_from(value: &'static [u8]) -> Result<Self, Error> {
        Self::string(value)
    }
}

impl TryFrom<Vec<u8>> for Field {
    type Error = Error;

    fn try_from(value: Vec<u8>) -> Result<Self, Error> {
        Self::string(value)
    }
}

impl TryFrom<String> for Field {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Error> {
        Self::string(value)
    }
}

impl TryFrom<Bytes> for Field {
    type Error = Error;

    fn try_from(value: Bytes) -> Result<Self, Error> {
        Self::string(value)
    }
}

impl Write for Field {
    fn write(&self, buf: &mut impl BufMut) {
        buf.put_u8(self.tag() as u8);
        match self {
            Self::Int32(value) => buf.put_i32_le(*value),
            Self::Int64(value) => buf.put_i64_le(*value),
            Self::String(text) => {
                buf.put_slice(text);
                buf.put_u8(TERMINATOR);
            }
        }
    }
}

impl EncodeSize for Field {
    fn encode_size(&self) -> usize {
        1 + match self {
            Self::Int32(_) => 4,
            Self::Int64(_) => 8,
            Self::String(text) => text.len() + 1,
        }
    }
}

impl Read for Field {
    fn read(buf: &mut impl Buf) -> Result<Self, Error> {
        at_least(buf, 1)?;
        let tag = Tag::try_from(buf.chunk()[0])?;
        buf.advance(1);
        match tag {
            Tag::Int32 => {
                at_least(buf, 4)?;
                Ok(Self::Int32(buf.get_i32_le()))
            }
            Tag::Int64 => {
                at_least(buf, 8)?;
                Ok(Self::Int64(buf.get_i64_le()))
            }
            Tag::String => {
                let mut payload = Vec::new();
                loop {
                    at_least(buf, 1)?;
                    match buf.get_u8() {
                        TERMINATOR => break,
                        byte => payload.push(byte),
                    }
                }
                Ok(Self::String(Text(Bytes::from(payload))))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn encode(field: &Field) -> Vec<u8> {
        let mut buf = Vec::with_capacity(field.encode_size());
        field.write(&mut buf);
        buf
    }

    #[test_case(0x41, Some(Tag::Int32); "int32")]
    #[test_case(0x42, Some(Tag::Int64); "int64")]
    #[test_case(0x43, Some(Tag::String); "string")]
    #[test_case(0x00, None; "nul")]
    #[test_case(0x44, None; "past string")]
    fn test_tag_from_byte(byte: u8, expected: Option<Tag>) {
        assert_eq!(Tag::try_from(byte).ok(), expected);
    }

    #[test]
    fn test_int32_layout() {
        let encoded = encode(&Field::from(0x0403_0201i32));
        assert_eq!(&encoded[..], &[0x41, 0x01, 0x02, 0x03, 0x04]);

        let encoded = encode(&Field::from(-1i32));
        assert_eq!(&encoded[..], &[0x41, 0xFF, 0xFF, 0xFF, 0xFF]);
    }

    #[test]
    fn test_int64_layout() {
        let encoded = encode(&Field::from(0x0807_0605_0403_0201i64));
        assert_eq!(
            &encoded[..],
            &[0x42, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08]
        );
    }

    #[test]
    fn test_string_layout() {
        let field = Field::string("Lorem ipsum dolor sit amet").unwrap();
        let encoded = encode(&field);
        assert_eq!(encoded[0], 0x43);
        assert_eq!(&encoded[1..encoded.len() - 1], b"Lorem ipsum dolor sit amet");
        assert_eq!(encoded[encoded.len() - 1], TERMINATOR);
        assert_eq!(encoded.len(), field.encode_size());
    }

    #[test]
    fn test_empty_string() {
        let encoded = encode(&Field::string("").unwrap());
        assert_eq!(&encoded[..], &[0x43, 0x00]);
    }

    #[test]
    fn test_string_rejects_nul() {
        assert_eq!(Field::string(&b"a\0b"[..]), Err(Error::InvalidString));
        assert_eq!(Text::new(vec![0u8]), Err(Error::InvalidString));
    }

    #[test]
    fn test_from_static() {
        const PAYLOAD: Text = Text::from_static(b"*TIME");
        let payload = PAYLOAD;
        assert_eq!(&payload[..], b"*TIME");
        assert_eq!(Field::String(payload), Field::string("*TIME").unwrap());
    }

    #[test]
    #[should_panic(expected = "NUL")]
    fn test_from_static_rejects_nul() {
        let _ = Text::from_static(b"a\0b");
    }

    #[test]
    fn test_read_sequence() {
        let mut buf = Vec::new();
        Field::from(7i32).write(&mut buf);
        Field::string("x").unwrap().write(&mut buf);
        Field::from(-9i64).write(&mut buf);

        let mut reader = &buf[..];
        assert_eq!(Field::read(&mut reader), Ok(Field::Int32(7)));
        assert_eq!(Field::read(&mut reader), Field::string("x"));
        assert_eq!(Field::read(&mut reader), Ok(Field::Int64(-9)));
        assert_eq!(Field::read(&mut reader), Err(Error::EndOfBuffer));
    }

    #[test]
    fn test_read_truncated() {
        let mut reader = &[0x42u8, 0x01, 0x02][..];
        assert_eq!(Field::read(&mut reader), Err(Error::EndOfBuffer));

        let mut reader = &[0x43u8, b'a', b'b'][..];
        assert_eq!(Field::read(&mut reader), Err(Error::EndOfBuffer));
    }

    #[test]
    fn test_read_unknown_tag() {
        let mut reader = &b"Lorem"[..];
        assert_eq!(Field::read(&mut reader), Err(Error::UnknownTag(b'L')));
    }

    #[test]
    fn test_accessors() {
        assert_eq!(Field::from(3i32).as_i32(), Some(3));
        assert_eq!(Field::from(3i32).as_i64(), None);
        assert_eq!(Field::from(3i64).as_i64(), Some(3));
        assert_eq!(
            Field::string("SETX_SET").unwrap().as_bytes(),
            Some(&b"SETX_SET"[..])
        );
    }
}
