//! Encode and decode the typed fields carried by simulated messages.
//!
//! # Overview
//!
//! A message body is a flat concatenation of fields. Each field begins with a
//! one byte [Tag]:
//!
//! | Tag    | Type    | Payload                                    |
//! |--------|---------|--------------------------------------------|
//! | `0x41` | `Int32` | 4 bytes, two's complement, little-endian   |
//! | `0x42` | `Int64` | 8 bytes, two's complement, little-endian   |
//! | `0x43` | String  | raw bytes (no `0x00`) then one `0x00` byte |
//!
//! There is no length prefix for strings. Bodies are read back field by field
//! through the forward-only cursor of an [Envelope].
//!
//! # Example
//!
//! ```
//! use distsim_codec::{Envelope, Field};
//!
//! let mut msg = Envelope::from_fields([
//!     Field::string("SETX_SET").unwrap(),
//!     Field::from(42i32),
//! ]);
//! assert_eq!(&msg.get_string().unwrap()[..], b"SETX_SET");
//! assert_eq!(msg.get_i32().unwrap(), 42);
//! assert!(msg.get_data().unwrap().is_none());
//! ```

pub mod codec;
pub mod envelope;
pub mod error;
pub mod field;

pub use codec::{EncodeSize, Read, Write};
pub use envelope::Envelope;
pub use error::Error;
pub use field::{Field, Tag, Text};
