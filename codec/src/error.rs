//! Error types for codec operations.
//!
//! Every variant describes a broken contract between a sender and the handler
//! reading its message (a field read with the wrong accessor, or a read past
//! the end of a well-formed body). Callers should treat them as bugs and abort
//! the current handler invocation rather than retry.

use crate::Tag;
use thiserror::Error;

/// Decoding or construction failure.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("unexpected end of buffer")]
    EndOfBuffer,
    #[error("unexpected tag: expected {expected:?}, found {found:#04x}")]
    UnexpectedTag { expected: Tag, found: u8 },
    #[error("unknown tag: {0:#04x}")]
    UnknownTag(u8),
    #[error("string payload contains a NUL byte")]
    InvalidString,
}
