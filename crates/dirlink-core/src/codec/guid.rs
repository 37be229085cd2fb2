//! Object GUID codec.
//!
//! Directory servers store GUIDs (`objectGUID`) as 16 raw bytes in the Microsoft mixed-endian
//! layout: the first three fields are little-endian, the remaining eight bytes are stored as-is.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::AttributeCodec;
use crate::error::CodecError;

const GUID_LEN: usize = 16;

/// Object GUID.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Guid(Uuid);

impl Guid {
    /// Wraps an existing [`Uuid`].
    #[must_use]
    pub const fn new(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Decodes the 16-byte mixed-endian representation.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::InvalidFormat`] if the value is not exactly 16 bytes long.
    pub fn from_binary(bytes: &[u8]) -> Result<Self, CodecError> {
        let bytes: [u8; GUID_LEN] = bytes.try_into().map_err(|_| {
            CodecError::InvalidFormat(format!(
                "binary GUID must be {GUID_LEN} bytes, got {}",
                bytes.len()
            ))
        })?;
        Ok(Self(Uuid::from_bytes_le(bytes)))
    }

    /// Encodes the 16-byte mixed-endian representation.
    #[must_use]
    pub fn to_binary(&self) -> Vec<u8> {
        self.0.to_bytes_le().to_vec()
    }

    /// Parses either the hyphenated text form or the binary form.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::InvalidInput`] if neither form can be decoded.
    pub fn parse(raw: impl AsRef<[u8]>) -> Result<Self, CodecError> {
        let raw = raw.as_ref();
        if let Some(guid) = std::str::from_utf8(raw)
            .ok()
            .and_then(|text| text.parse::<Self>().ok())
        {
            return Ok(guid);
        }

        Self::from_binary(raw).map_err(|err| {
            CodecError::InvalidInput(format!("value is neither a string nor a binary GUID ({err})"))
        })
    }

    /// Returns the inner [`Uuid`].
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for Guid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

impl FromStr for Guid {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // Only the 36 character hyphenated form is used by directories.
        if s.len() != 36 {
            return Err(CodecError::InvalidInput(format!("`{s}` is not a GUID")));
        }
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|_| CodecError::InvalidInput(format!("`{s}` is not a GUID")))
    }
}

impl From<Uuid> for Guid {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl AttributeCodec for Guid {
    fn decode(raw: &[u8]) -> Result<Self, CodecError> {
        Self::parse(raw)
    }

    fn encode(&self) -> Vec<u8> {
        self.to_binary()
    }
}
