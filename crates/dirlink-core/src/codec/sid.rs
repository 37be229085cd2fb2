//! Security identifier (SID) codec.
//!
//! A SID has two interchangeable representations:
//!
//! - canonical text: `S-<revision>-<authority>-<sub1>-<sub2>...`
//! - packed binary: revision (1 byte), sub-authority count (1 byte), two reserved zero bytes,
//!   identifier authority (4 bytes, big-endian), then `count` sub-authorities (4 bytes each,
//!   little-endian).
//!
//! Encoding and decoding share the same byte-order conventions, so any binary value produced by
//! [`Sid::to_binary`] decodes back to an identical [`Sid`].

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::AttributeCodec;
use crate::error::CodecError;

/// Length of the fixed binary header (revision, count, reserved, authority).
const HEADER_LEN: usize = 8;
const SUB_AUTHORITY_LEN: usize = 4;
const MAX_SUB_AUTHORITIES: usize = u8::MAX as usize;

/// Immutable security identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Sid {
    revision: u8,
    authority: u32,
    sub_authorities: Vec<u32>,
}

impl Sid {
    /// Builds a SID from its components.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::InvalidInput`] when more than 255 sub-authorities are given, since
    /// the binary form stores the count in a single byte.
    pub fn new(
        revision: u8,
        authority: u32,
        sub_authorities: Vec<u32>,
    ) -> Result<Self, CodecError> {
        if sub_authorities.len() > MAX_SUB_AUTHORITIES {
            return Err(CodecError::InvalidInput(format!(
                "a SID holds at most {MAX_SUB_AUTHORITIES} sub-authorities, got {}",
                sub_authorities.len()
            )));
        }

        Ok(Self {
            revision,
            authority,
            sub_authorities,
        })
    }

    /// Parses a SID from either of its representations.
    ///
    /// Input that is valid UTF-8 and matches the canonical text grammar is accepted as text.
    /// Anything else is decoded as binary.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::InvalidInput`] when neither representation can be decoded.
    pub fn parse(raw: impl AsRef<[u8]>) -> Result<Self, CodecError> {
        let raw = raw.as_ref();

        if let Some(sid) = std::str::from_utf8(raw)
            .ok()
            .and_then(|text| text.parse::<Self>().ok())
        {
            return Ok(sid);
        }

        Self::from_binary(raw).map_err(|err| {
            CodecError::InvalidInput(format!("value is neither a string nor a binary SID ({err})"))
        })
    }

    /// Returns true if `value` matches the canonical text grammar.
    #[must_use]
    pub fn is_valid(value: &str) -> bool {
        value.parse::<Self>().is_ok()
    }

    /// Decodes the packed binary representation.
    ///
    /// Exactly as many sub-authorities as the count byte declares are read; bytes beyond them
    /// are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::InvalidFormat`] if the header is incomplete or the buffer ends
    /// before the declared sub-authorities.
    pub fn from_binary(bytes: &[u8]) -> Result<Self, CodecError> {
        let header: &[u8; HEADER_LEN] = bytes
            .get(..HEADER_LEN)
            .and_then(|header| header.try_into().ok())
            .ok_or_else(|| {
                CodecError::InvalidFormat(format!(
                    "binary SID needs at least {HEADER_LEN} bytes, got {}",
                    bytes.len()
                ))
            })?;

        let revision = header[0];
        let count = usize::from(header[1]);
        // header[2..4] is reserved
        let authority = u32::from_be_bytes([header[4], header[5], header[6], header[7]]);

        let body_end = HEADER_LEN + count * SUB_AUTHORITY_LEN;
        let body = bytes.get(HEADER_LEN..body_end).ok_or_else(|| {
            CodecError::InvalidFormat(format!(
                "binary SID declares {count} sub-authorities but only {} bytes follow the header",
                bytes.len() - HEADER_LEN
            ))
        })?;

        let sub_authorities = body
            .chunks_exact(SUB_AUTHORITY_LEN)
            .map(|chunk| u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect();

        Ok(Self {
            revision,
            authority,
            sub_authorities,
        })
    }

    /// Encodes the packed binary representation.
    #[must_use]
    pub fn to_binary(&self) -> Vec<u8> {
        let mut bytes =
            Vec::with_capacity(HEADER_LEN + self.sub_authorities.len() * SUB_AUTHORITY_LEN);
        bytes.push(self.revision);
        // Length is bounded by `new` and the parsers.
        #[allow(clippy::cast_possible_truncation)]
        bytes.push(self.sub_authorities.len() as u8);
        bytes.extend_from_slice(&[0, 0]);
        bytes.extend_from_slice(&self.authority.to_be_bytes());
        for sub in &self.sub_authorities {
            bytes.extend_from_slice(&sub.to_le_bytes());
        }
        bytes
    }

    /// Revision level.
    #[must_use]
    pub const fn revision(&self) -> u8 {
        self.revision
    }

    /// Identifier authority.
    #[must_use]
    pub const fn authority(&self) -> u32 {
        self.authority
    }

    /// Sub-authorities in order.
    #[must_use]
    pub fn sub_authorities(&self) -> &[u32] {
        &self.sub_authorities
    }

    /// Relative identifier (the last sub-authority), if any.
    #[must_use]
    pub fn rid(&self) -> Option<u32> {
        self.sub_authorities.last().copied()
    }

    /// Returns the SID with its relative identifier stripped.
    ///
    /// For an account SID this is the SID of the domain that issued it.
    #[must_use]
    pub fn domain(&self) -> Self {
        let mut domain = self.clone();
        domain.sub_authorities.pop();
        domain
    }

    /// Returns a SID in the same domain with the relative identifier replaced.
    ///
    /// A SID without sub-authorities gets `rid` appended.
    #[must_use]
    pub fn with_rid(&self, rid: u32) -> Self {
        let mut sid = self.domain();
        if self.sub_authorities.is_empty() {
            sid = self.clone();
        }
        sid.sub_authorities.push(rid);
        sid
    }
}

impl fmt::Display for Sid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "S-{}-{}", self.revision, self.authority)?;
        for sub in &self.sub_authorities {
            write!(f, "-{sub}")?;
        }
        Ok(())
    }
}

impl FromStr for Sid {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || CodecError::InvalidInput(format!("`{s}` is not a canonical SID string"));

        let body = s.strip_prefix("S-").ok_or_else(invalid)?;
        let parts = body.split('-').collect::<Vec<_>>();
        if parts.len() < 2
            || parts
                .iter()
                .any(|part| part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()))
        {
            return Err(invalid());
        }

        let revision = parts[0].parse::<u8>().map_err(|_| invalid())?;
        let authority = parts[1].parse::<u32>().map_err(|_| invalid())?;
        let sub_authorities = parts[2..]
            .iter()
            .map(|part| part.parse::<u32>().map_err(|_| invalid()))
            .collect::<Result<Vec<_>, _>>()?;

        Self::new(revision, authority, sub_authorities)
    }
}

impl TryFrom<String> for Sid {
    type Error = CodecError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Sid> for String {
    fn from(value: Sid) -> Self {
        value.to_string()
    }
}

impl AttributeCodec for Sid {
    fn decode(raw: &[u8]) -> Result<Self, CodecError> {
        Self::parse(raw)
    }

    fn encode(&self) -> Vec<u8> {
        self.to_binary()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ADMINISTRATORS: [u8; 16] = [
        0x01, 0x02, 0x00, 0x00, 0x00, 0x00, 0x00, 0x05, 0x20, 0x00, 0x00, 0x00, 0x20, 0x02, 0x00,
        0x00,
    ];

    fn domain_user_binary() -> Vec<u8> {
        vec![
            0x01, 0x05, 0x00, 0x00, 0x00, 0x00, 0x00, 0x05, 0x15, 0x00, 0x00, 0x00, 0xc7, 0xf7,
            0xfe, 0xd7, 0x7c, 0x77, 0x55, 0xc8, 0x94, 0x5a, 0xce, 0x01, 0xf5, 0x03, 0x00, 0x00,
        ]
    }

    #[test]
    fn decodes_well_known_binary_sid() {
        let sid = Sid::from_binary(&ADMINISTRATORS).unwrap();
        assert_eq!(sid.to_string(), "S-1-5-32-544");
        assert_eq!(sid.revision(), 1);
        assert_eq!(sid.authority(), 5);
        assert_eq!(sid.sub_authorities(), &[32, 544]);
    }

    #[test]
    fn decodes_domain_account_sid() {
        let sid = Sid::parse(domain_user_binary()).unwrap();
        assert_eq!(
            sid.to_string(),
            "S-1-5-21-3623811015-3361044348-30300820-1013"
        );
        assert_eq!(sid.rid(), Some(1013));
    }

    #[test]
    fn binary_round_trip_is_byte_identical() {
        for bytes in [ADMINISTRATORS.to_vec(), domain_user_binary()] {
            let sid = Sid::from_binary(&bytes).unwrap();
            let text = sid.to_string();
            let reparsed: Sid = text.parse().unwrap();
            assert_eq!(reparsed.to_binary(), bytes);
        }
    }

    #[test]
    fn string_round_trip_is_stable() {
        let input = "S-1-5-21-3623811015-3361044348-30300820-1013";
        let sid: Sid = input.parse().unwrap();
        let decoded = Sid::from_binary(&sid.to_binary()).unwrap();
        assert_eq!(decoded, sid);
        assert_eq!(decoded.to_string(), input);
    }

    #[test]
    fn trailing_bytes_are_ignored() {
        let mut padded = ADMINISTRATORS.to_vec();
        padded.extend_from_slice(&[0xde, 0xad, 0xbe, 0xef, 0x00]);

        let sid = Sid::from_binary(&padded).unwrap();
        assert_eq!(sid.to_string(), "S-1-5-32-544");
        assert_eq!(sid.to_binary(), ADMINISTRATORS.to_vec());
    }

    #[test]
    fn short_buffer_is_invalid_format() {
        let err = Sid::from_binary(&ADMINISTRATORS[..5]).unwrap_err();
        assert!(matches!(err, CodecError::InvalidFormat(_)));

        let err = Sid::from_binary(&[]).unwrap_err();
        assert!(matches!(err, CodecError::InvalidFormat(_)));
    }

    #[test]
    fn truncated_sub_authorities_are_invalid_format() {
        let err = Sid::from_binary(&ADMINISTRATORS[..14]).unwrap_err();
        assert!(matches!(err, CodecError::InvalidFormat(_)));
    }

    #[test]
    fn header_only_sid_has_no_sub_authorities() {
        let sid = Sid::from_binary(&[0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x01]).unwrap();
        assert_eq!(sid.to_string(), "S-1-1");
        assert!(sid.sub_authorities().is_empty());
    }

    #[test]
    fn junk_string_is_invalid_input() {
        for junk in ["not-a-sid", "S-1", "S-1-5-", "S-x-5-21", "s-1-5", "S-1-+5", ""] {
            let err = Sid::parse(junk).unwrap_err();
            assert!(
                matches!(err, CodecError::InvalidInput(_)),
                "`{junk}` should be rejected"
            );
        }
    }

    #[test]
    fn overflowing_components_are_rejected() {
        assert!(matches!(
            "S-256-5-21".parse::<Sid>(),
            Err(CodecError::InvalidInput(_))
        ));
        assert!(matches!(
            "S-1-4294967296".parse::<Sid>(),
            Err(CodecError::InvalidInput(_))
        ));
        assert!(Sid::new(1, 5, vec![0; 256]).is_err());
    }

    #[test]
    fn string_input_takes_precedence() {
        let sid = Sid::parse(b"S-1-5-18").unwrap();
        assert_eq!(sid.sub_authorities(), &[18]);
        assert!(Sid::is_valid("S-1-5-18"));
        assert!(!Sid::is_valid("S-1-5-18-"));
    }

    #[test]
    fn rid_replacement_keeps_domain() {
        let user: Sid = "S-1-5-21-1004336348-1177238915-682003330-1105"
            .parse()
            .unwrap();
        let group = user.with_rid(513);
        assert_eq!(
            group.to_string(),
            "S-1-5-21-1004336348-1177238915-682003330-513"
        );
        assert_eq!(group.domain(), user.domain());
    }

    #[test]
    fn serializes_as_canonical_string() {
        let sid: Sid = "S-1-5-32-544".parse().unwrap();
        let json = serde_json::to_string(&sid).unwrap();
        assert_eq!(json, "\"S-1-5-32-544\"");

        let back: Sid = serde_json::from_str(&json).unwrap();
        assert_eq!(back, sid);
        assert!(serde_json::from_str::<Sid>("\"nope\"").is_err());
    }
}
