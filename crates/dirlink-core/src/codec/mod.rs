//! Attribute value codecs.
//!
//! Directory attributes travel as raw byte strings. The codecs in this module convert them to
//! typed values and back; any value a format can represent round-trips without loss.

mod guid;
mod sid;
mod timestamp;

pub use guid::Guid;
pub use sid::Sid;
pub use timestamp::TimestampFormat;

use crate::error::CodecError;

/// Bidirectional conversion between a raw attribute value and a typed value.
pub trait AttributeCodec: Sized {
    /// Decodes a raw attribute value.
    ///
    /// # Errors
    ///
    /// Returns a [`CodecError`] when the value cannot be decoded.
    fn decode(raw: &[u8]) -> Result<Self, CodecError>;

    /// Encodes the value into its wire representation.
    fn encode(&self) -> Vec<u8>;
}
