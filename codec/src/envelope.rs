//! Messages exchanged between simulated processes.

use crate::{field::Tag, EncodeSize, Error, Field, Read, Write};
use bytes::{Bytes, BytesMut};
use distsim_utils::{ProcessId, Tick, BROADCAST};
use std::cmp::Ordering;

/// A message record carrying addressing, timing and an encoded body.
///
/// Fields are extracted sequentially through a forward-only cursor. Reading a
/// field with the wrong accessor, or past the end of the body, returns an
/// [Error] that callers should treat as a bug in the handler. A failed read
/// leaves the cursor where it was.
#[derive(Clone, Debug)]
pub struct Envelope {
    /// Tick at which the message was sent.
    pub send_time: Tick,
    /// Tick at which the message becomes eligible for dispatch.
    pub delivery_time: Tick,
    /// Sender, or [BROADCAST] if unset.
    pub from: ProcessId,
    /// Recipient, or [BROADCAST] if unset.
    pub to: ProcessId,

    body: Bytes,
    cursor: usize,
}

impl Envelope {
    /// Create a message from a raw body.
    pub fn new(from: ProcessId, to: ProcessId, body: impl Into<Bytes>) -> Self {
        Self {
            send_time: 0,
            delivery_time: 0,
            from,
            to,
            body: body.into(),
            cursor: 0,
        }
    }

    /// Create an unaddressed message by concatenating `fields` in order.
    pub fn from_fields(fields: impl IntoIterator<Item = Field>) -> Self {
        let fields: Vec<Field> = fields.into_iter().collect();
        let size = fields.iter().map(EncodeSize::encode_size).sum();
        let mut body = BytesMut::with_capacity(size);
        for field in &fields {
            field.write(&mut body);
        }
        Self::new(BROADCAST, BROADCAST, body.freeze())
    }

    /// The encoded body.
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Offset of the next unread byte in the body.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Number of unread bytes in the body.
    pub fn remaining(&self) -> usize {
        self.body.len() - self.cursor
    }

    /// Compare two messages by delivery time.
    pub fn cmp_delivery(&self, other: &Self) -> Ordering {
        self.delivery_time.cmp(&other.delivery_time)
    }

    /// Whether this message is due strictly later than `other`.
    pub fn is_later_than(&self, other: &Self) -> bool {
        self.cmp_delivery(other) == Ordering::Greater
    }

    /// Check that the byte under the cursor is `expected`.
    fn expect_tag(&self, expected: Tag) -> Result<(), Error> {
        let found = *self.body.get(self.cursor).ok_or(Error::EndOfBuffer)?;
        if found != expected as u8 {
            return Err(Error::UnexpectedTag { expected, found });
        }
        Ok(())
    }

    /// Decode the field under the cursor and move past it.
    ///
    /// A fixed-size payload must end strictly before `body.len()` once the
    /// tag byte is counted, i.e. `cursor + size < len`.
    fn read_field(&mut self) -> Result<Field, Error> {
        let mut buf = &self.body[self.cursor..];
        let field = Field::read(&mut buf)?;
        self.cursor = self.body.len() - buf.len();
        Ok(field)
    }

    /// Decode the field under the cursor, which must be tagged `expected`.
    fn read_tagged(&mut self, expected: Tag) -> Result<Field, Error> {
        self.expect_tag(expected)?;
        self.read_field()
    }

    /// Extract the next field, which must be an `Int32`.
    pub fn get_i32(&mut self) -> Result<i32, Error> {
        match self.read_tagged(Tag::Int32)? {
            Field::Int32(value) => Ok(value),
            field => Err(Error::UnexpectedTag {
                expected: Tag::Int32,
                found: field.tag() as u8,
            }),
        }
    }

    /// Extract the next field, which must be an `Int64`.
    pub fn get_i64(&mut self) -> Result<i64, Error> {
        match self.read_tagged(Tag::Int64)? {
            Field::Int64(value) => Ok(value),
            field => Err(Error::UnexpectedTag {
                expected: Tag::Int64,
                found: field.tag() as u8,
            }),
        }
    }

    /// Extract the next field, which must be a `String`.
    ///
    /// The cursor moves past the terminator.
    pub fn get_string(&mut self) -> Result<Bytes, Error> {
        match self.read_tagged(Tag::String)? {
            Field::String(text) => Ok(text.into_inner()),
            field => Err(Error::UnexpectedTag {
                expected: Tag::String,
                found: field.tag() as u8,
            }),
        }
    }

    /// Extract the next field of any type.
    ///
    /// Returns `Ok(None)` once the body is exhausted.
    pub fn get_data(&mut self) -> Result<Option<Field>, Error> {
        if self.remaining() == 0 {
            return Ok(None);
        }
        self.read_field().map(Some)
    }
}
