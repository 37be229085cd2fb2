//! Directory timestamp codecs.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CodecError;

/// Number of 100ns intervals between 1601-01-01 and the Unix epoch.
const WINDOWS_EPOCH_OFFSET: i64 = 116_444_736_000_000_000;
const TICKS_PER_SECOND: i64 = 10_000_000;

/// Wire format of a timestamp attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TimestampFormat {
    /// Generalized time without fractions, e.g. `20240102030405Z` (`createTimestamp`).
    ///
    /// Whole seconds only; sub-second precision is dropped on encode.
    Ldap,
    /// Generalized time with a fraction, e.g. `20240102030405.0Z` (`whenCreated`).
    WindowsGeneralized,
    /// 100ns intervals since 1601-01-01 as a decimal integer (`pwdLastSet`, `accountExpires`).
    WindowsInteger,
}

impl TimestampFormat {
    /// Decodes a raw attribute value.
    ///
    /// Returns `Ok(None)` for the Windows "never" sentinels (`0` and `i64::MAX`).
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::InvalidInput`] when the value does not match the format.
    pub fn decode(self, raw: &[u8]) -> Result<Option<DateTime<Utc>>, CodecError> {
        let text = std::str::from_utf8(raw)
            .map_err(|_| CodecError::InvalidInput("timestamp is not valid UTF-8".to_string()))?
            .trim();
        let invalid = || CodecError::InvalidInput(format!("`{text}` is not a {self:?} timestamp"));

        match self {
            Self::Ldap => NaiveDateTime::parse_from_str(text, "%Y%m%d%H%M%SZ")
                .map(|naive| Some(naive.and_utc()))
                .map_err(|_| invalid()),
            Self::WindowsGeneralized => NaiveDateTime::parse_from_str(text, "%Y%m%d%H%M%S%.fZ")
                .map(|naive| Some(naive.and_utc()))
                .map_err(|_| invalid()),
            Self::WindowsInteger => {
                let ticks = text.parse::<i64>().map_err(|_| invalid())?;
                if ticks == 0 || ticks == i64::MAX {
                    return Ok(None);
                }
                let unix_ticks = ticks.checked_sub(WINDOWS_EPOCH_OFFSET).ok_or_else(invalid)?;
                let seconds = unix_ticks.div_euclid(TICKS_PER_SECOND);
                // Always below 10^9, fits in u32.
                #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                let nanos = (unix_ticks.rem_euclid(TICKS_PER_SECOND) * 100) as u32;
                DateTime::from_timestamp(seconds, nanos)
                    .map(Some)
                    .ok_or_else(invalid)
            }
        }
    }

    /// Encodes a timestamp in this format.
    ///
    /// Generalized time keeps the sub-second fraction, written with `.0` when there is none.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::InvalidInput`] when the value falls outside the range of the format
    /// (before 1601 or after 30828 for the Windows integer format).
    pub fn encode(self, value: DateTime<Utc>) -> Result<Vec<u8>, CodecError> {
        let text = match self {
            Self::Ldap => value.format("%Y%m%d%H%M%SZ").to_string(),
            Self::WindowsGeneralized => format!(
                "{}.{}Z",
                value.format("%Y%m%d%H%M%S"),
                fraction(value.timestamp_subsec_nanos())
            ),
            Self::WindowsInteger => windows_ticks(value)
                .ok_or_else(|| {
                    CodecError::InvalidInput(format!("{value} is out of range for a Windows timestamp"))
                })?
                .to_string(),
        };
        Ok(text.into_bytes())
    }
}

/// Decimal fraction digits of `nanos` without trailing zeros, `0` for whole seconds.
fn fraction(nanos: u32) -> String {
    let digits = format!("{nanos:09}");
    match digits.trim_end_matches('0') {
        "" => "0".to_string(),
        trimmed => trimmed.to_string(),
    }
}

/// 100ns intervals since 1601-01-01, or `None` when they do not fit a non-negative `i64`.
fn windows_ticks(value: DateTime<Utc>) -> Option<i64> {
    value
        .timestamp()
        .checked_mul(TICKS_PER_SECOND)?
        .checked_add(i64::from(value.timestamp_subsec_nanos() / 100))?
        .checked_add(WINDOWS_EPOCH_OFFSET)
        .filter(|ticks| *ticks >= 0)
}
