//! Distinguished names.
//!
//! A [`DistinguishedName`] is the identity key of an entry: entries are looked up, compared and
//! de-duplicated by DN. Comparison follows directory semantics and ignores ASCII case in both
//! attribute types and values.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;
use thiserror::Error;

use dirlink_core::Error as CoreError;

/// Errors that can occur when parsing a distinguished name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DnError {
    /// The input was empty or whitespace.
    #[error("distinguished name cannot be empty")]
    Empty,
    /// An RDN component had no `=` separator.
    #[error("`{0}` is not an attribute=value pair")]
    MissingSeparator(String),
    /// An RDN component had nothing left of the `=`.
    #[error("missing attribute type in `{0}`")]
    EmptyAttribute(String),
    /// An RDN component had nothing right of the `=`.
    #[error("missing value for attribute `{0}`")]
    EmptyValue(String),
    /// The input ended in the middle of an escape sequence.
    #[error("unterminated escape sequence")]
    DanglingEscape,
    /// A `\XX` escape did not decode to valid UTF-8.
    #[error("escaped bytes are not valid UTF-8")]
    InvalidEscape,
}

impl From<DnError> for CoreError {
    fn from(err: DnError) -> Self {
        CoreError::InvalidDn(err.to_string())
    }
}

/// One `attribute=value` assertion of an RDN.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ava {
    attribute: String,
    value: String,
}

impl Ava {
    /// Attribute type (e.g. `cn`).
    #[must_use]
    pub fn attribute(&self) -> &str {
        &self.attribute
    }

    /// Unescaped attribute value.
    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }
}

/// Distinguished name with case-insensitive identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DistinguishedName {
    rdns: Vec<Vec<Ava>>,
    key: String,
}

impl DistinguishedName {
    /// Parses a distinguished name such as `cn=Smith\, John,ou=People,dc=example,dc=com`.
    ///
    /// Both `\,` style and `\2C` style escapes are understood.
    ///
    /// # Errors
    ///
    /// Returns [`DnError`] if the input is empty or malformed.
    pub fn parse(input: impl AsRef<str>) -> Result<Self, DnError> {
        let input = input.as_ref().trim();
        if input.is_empty() {
            return Err(DnError::Empty);
        }

        let mut rdns = Vec::new();
        for rdn in split_unescaped(input, ',')? {
            let avas = split_unescaped(rdn, '+')?
                .into_iter()
                .map(parse_ava)
                .collect::<Result<Vec<_>, _>>()?;
            rdns.push(avas);
        }

        Ok(Self::from_rdns(rdns))
    }

    fn from_rdns(rdns: Vec<Vec<Ava>>) -> Self {
        let key = render(&rdns, true);
        Self { rdns, key }
    }

    /// Lowercased canonical form used for identity comparisons.
    #[must_use]
    pub fn normalized(&self) -> &str {
        &self.key
    }

    /// Returns the RDNs from the leaf towards the root.
    #[must_use]
    pub fn rdns(&self) -> &[Vec<Ava>] {
        &self.rdns
    }

    /// Value of the leaf RDN's first assertion (the entry's "name", e.g. the `cn`).
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.rdns.first().and_then(|rdn| rdn.first()).map(Ava::value)
    }

    /// Value of the first assertion on `attribute`, searching from the leaf (case-insensitive).
    #[must_use]
    pub fn get(&self, attribute: &str) -> Option<&str> {
        self.rdns
            .iter()
            .flatten()
            .find(|ava| ava.attribute.eq_ignore_ascii_case(attribute))
            .map(Ava::value)
    }

    /// DN of the parent entry, or `None` for a single-RDN name.
    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        (self.rdns.len() > 1).then(|| Self::from_rdns(self.rdns[1..].to_vec()))
    }

    /// Builds the DN of a child entry below this one.
    #[must_use]
    pub fn child(&self, attribute: impl Into<String>, value: impl Into<String>) -> Self {
        let mut rdns = Vec::with_capacity(self.rdns.len() + 1);
        rdns.push(vec![Ava {
            attribute: attribute.into(),
            value: value.into(),
        }]);
        rdns.extend(self.rdns.iter().cloned());
        Self::from_rdns(rdns)
    }

    /// Returns true if this DN lies strictly below `ancestor`.
    #[must_use]
    pub fn is_descendant_of(&self, ancestor: &Self) -> bool {
        self.rdns.len() > ancestor.rdns.len()
            && self.key.ends_with(&format!(",{}", ancestor.key))
    }
}

impl PartialEq for DistinguishedName {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for DistinguishedName {}

impl Hash for DistinguishedName {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.hash(state);
    }
}

impl fmt::Display for DistinguishedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&render(&self.rdns, false))
    }
}

impl FromStr for DistinguishedName {
    type Err = DnError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for DistinguishedName {
    type Error = DnError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl TryFrom<&str> for DistinguishedName {
    type Error = DnError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<DistinguishedName> for String {
    fn from(value: DistinguishedName) -> Self {
        value.to_string()
    }
}

/// Splits on `delimiter` outside of escape sequences, keeping escapes intact.
fn split_unescaped(input: &str, delimiter: char) -> Result<Vec<&str>, DnError> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut escaped = false;

    for (idx, ch) in input.char_indices() {
        match ch {
            _ if escaped => escaped = false,
            '\\' => escaped = true,
            _ if ch == delimiter => {
                parts.push(input[start..idx].trim());
                start = idx + ch.len_utf8();
            }
            _ => {}
        }
    }

    if escaped {
        return Err(DnError::DanglingEscape);
    }
    parts.push(input[start..].trim());
    Ok(parts)
}

fn parse_ava(component: &str) -> Result<Ava, DnError> {
    if component.is_empty() {
        return Err(DnError::MissingSeparator(component.to_string()));
    }

    // Attribute types never contain escapes, so the first `=` is the separator.
    let (attribute, value) = component
        .split_once('=')
        .ok_or_else(|| DnError::MissingSeparator(component.to_string()))?;
    let attribute = attribute.trim();
    let value = value.trim();

    if attribute.is_empty() {
        return Err(DnError::EmptyAttribute(component.to_string()));
    }
    if value.is_empty() {
        return Err(DnError::EmptyValue(attribute.to_string()));
    }

    Ok(Ava {
        attribute: attribute.to_string(),
        value: unescape(value)?,
    })
}

fn unescape(value: &str) -> Result<String, DnError> {
    let mut bytes = Vec::with_capacity(value.len());
    let mut chars = value.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch != '\\' {
            let mut buf = [0; 4];
            bytes.extend_from_slice(ch.encode_utf8(&mut buf).as_bytes());
            continue;
        }

        let first = chars.next().ok_or(DnError::DanglingEscape)?;
        match (first.to_digit(16), chars.peek().and_then(|c| c.to_digit(16))) {
            (Some(high), Some(low)) => {
                chars.next();
                // Two hex digits always fit in a byte.
                #[allow(clippy::cast_possible_truncation)]
                bytes.push((high * 16 + low) as u8);
            }
            _ => {
                let mut buf = [0; 4];
                bytes.extend_from_slice(first.encode_utf8(&mut buf).as_bytes());
            }
        }
    }

    String::from_utf8(bytes).map_err(|_| DnError::InvalidEscape)
}

fn escape_value(value: &str, out: &mut String) {
    let last = value.chars().count().saturating_sub(1);
    for (idx, ch) in value.chars().enumerate() {
        let special = matches!(ch, ',' | '+' | '"' | '\\' | '<' | '>' | ';' | '=')
            || (idx == 0 && matches!(ch, ' ' | '#'))
            || (idx == last && ch == ' ');
        if special {
            out.push('\\');
        }
        out.push(ch);
    }
}

fn render(rdns: &[Vec<Ava>], lowercase: bool) -> String {
    let mut out = String::new();
    for (i, rdn) in rdns.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        for (j, ava) in rdn.iter().enumerate() {
            if j > 0 {
                out.push('+');
            }
            if lowercase {
                out.push_str(&ava.attribute.to_ascii_lowercase());
                out.push('=');
                escape_value(&ava.value.to_ascii_lowercase(), &mut out);
            } else {
                out.push_str(&ava.attribute);
                out.push('=');
                escape_value(&ava.value, &mut out);
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn parse_simple_dn() {
        let dn = DistinguishedName::parse("cn=John Doe,ou=People,dc=example,dc=com").unwrap();
        assert_eq!(dn.name(), Some("John Doe"));
        assert_eq!(dn.get("OU"), Some("People"));
        assert_eq!(dn.to_string(), "cn=John Doe,ou=People,dc=example,dc=com");
    }

    #[test]
    fn parse_escaped_values() {
        let dn = DistinguishedName::parse("cn=Smith\\, John,dc=example,dc=com").unwrap();
        assert_eq!(dn.name(), Some("Smith, John"));
        assert_eq!(dn.to_string(), "cn=Smith\\, John,dc=example,dc=com");

        let hex = DistinguishedName::parse("cn=Smith\\2C John,dc=example,dc=com").unwrap();
        assert_eq!(hex, dn);

        let utf8 = DistinguishedName::parse("cn=J\\C3\\BCrgen,dc=example,dc=com").unwrap();
        assert_eq!(utf8.name(), Some("Jürgen"));
    }

    #[test]
    fn identity_ignores_case_and_spacing() {
        let a = DistinguishedName::parse("CN=Admins, OU=Groups,DC=Example,DC=com").unwrap();
        let b = DistinguishedName::parse("cn=admins,ou=groups,dc=example,dc=com").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.normalized(), "cn=admins,ou=groups,dc=example,dc=com");

        let set = [a, b].into_iter().collect::<HashSet<_>>();
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn multi_valued_rdn() {
        let dn = DistinguishedName::parse("cn=John+uid=1234,dc=example,dc=com").unwrap();
        assert_eq!(dn.rdns()[0].len(), 2);
        assert_eq!(dn.get("uid"), Some("1234"));
        assert_eq!(dn.to_string(), "cn=John+uid=1234,dc=example,dc=com");
    }

    #[test]
    fn parent_and_child() {
        let base = DistinguishedName::parse("ou=People,dc=example,dc=com").unwrap();
        let user = base.child("cn", "Jane, Doe");
        assert_eq!(user.to_string(), "cn=Jane\\, Doe,ou=People,dc=example,dc=com");
        assert_eq!(user.parent(), Some(base.clone()));
        assert!(user.is_descendant_of(&base));
        assert!(!base.is_descendant_of(&user));
        assert!(DistinguishedName::parse("dc=com").unwrap().parent().is_none());
    }

    #[test]
    fn rejects_malformed_input() {
        assert_eq!(DistinguishedName::parse("  "), Err(DnError::Empty));
        assert!(matches!(
            DistinguishedName::parse("cn=John,"),
            Err(DnError::MissingSeparator(_))
        ));
        assert!(matches!(
            DistinguishedName::parse("=John"),
            Err(DnError::EmptyAttribute(_))
        ));
        assert!(matches!(
            DistinguishedName::parse("cn="),
            Err(DnError::EmptyValue(_))
        ));
        assert_eq!(
            DistinguishedName::parse("cn=John\\"),
            Err(DnError::DanglingEscape)
        );
    }

    #[test]
    fn serde_uses_string_form() {
        let dn = DistinguishedName::parse("cn=admins,dc=example,dc=com").unwrap();
        let json = serde_json::to_string(&dn).unwrap();
        assert_eq!(json, "\"cn=admins,dc=example,dc=com\"");
        let back: DistinguishedName = serde_json::from_str(&json).unwrap();
        assert_eq!(back, dn);
    }
}
