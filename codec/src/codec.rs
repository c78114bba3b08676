//! Traits shared by everything written into a message body.

use crate::error::Error;
use bytes::{Buf, BufMut};

/// A value with a wire representation.
pub trait Write {
    /// Append the wire representation of `self` to `buf`.
    fn write(&self, buf: &mut impl BufMut);
}

/// A value whose wire size is known before writing.
pub trait EncodeSize {
    /// Exact number of bytes [Write::write] appends.
    fn encode_size(&self) -> usize;
}

/// A value that can be decoded from the front of a buffer.
pub trait Read: Sized {
    /// Decode one value, advancing `buf` past it.
    fn read(buf: &mut impl Buf) -> Result<Self, Error>;
}

/// Ensure `buf` holds at least `len` more bytes.
pub(crate) fn at_least(buf: &mut impl Buf, len: usize) -> Result<(), Error> {
    if buf.remaining() < len {
        return Err(Error::EndOfBuffer);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_at_least() {
        let mut buf = &[0x01u8, 0x02][..];
        assert!(at_least(&mut buf, 2).is_ok());
        assert_eq!(at_least(&mut buf, 3), Err(Error::EndOfBuffer));
    }
}
