//! Raw directory entries.

use std::collections::HashMap;

use dirlink_core::{AttributeCodec, CodecError};

use crate::dn::DistinguishedName;

/// Attribute name holding an entry's object classes.
pub const OBJECT_CLASS: &str = "objectclass";

/// Directory entry: an optional DN and case-insensitive, multi-valued, binary attributes.
///
/// An entry without a DN has not been saved yet. Attribute names are stored lowercased; values
/// keep the order the server returned them in.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Entry {
    dn: Option<DistinguishedName>,
    attributes: HashMap<String, Vec<Vec<u8>>>,
}

impl Entry {
    /// Creates an entry that has not been saved yet.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an entry with the given DN.
    #[must_use]
    pub fn with_dn(dn: DistinguishedName) -> Self {
        Self {
            dn: Some(dn),
            attributes: HashMap::new(),
        }
    }

    /// Builder-style attribute setter.
    #[must_use]
    pub fn attribute<I, V>(mut self, name: &str, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Vec<u8>>,
    {
        self.set(name, values);
        self
    }

    /// Distinguished name, if assigned.
    #[must_use]
    pub const fn dn(&self) -> Option<&DistinguishedName> {
        self.dn.as_ref()
    }

    /// Assigns the distinguished name.
    pub fn set_dn(&mut self, dn: DistinguishedName) {
        self.dn = Some(dn);
    }

    /// Returns true if the attribute has at least one value.
    #[must_use]
    pub fn has(&self, name: &str) -> bool {
        self.values(name).is_some_and(|values| !values.is_empty())
    }

    /// All raw values of an attribute.
    #[must_use]
    pub fn values(&self, name: &str) -> Option<&[Vec<u8>]> {
        self.attributes
            .get(&name.to_ascii_lowercase())
            .map(Vec::as_slice)
    }

    /// First raw value of an attribute.
    #[must_use]
    pub fn first(&self, name: &str) -> Option<&[u8]> {
        self.values(name)
            .and_then(|values| values.first())
            .map(Vec::as_slice)
    }

    /// First value of an attribute as UTF-8 text.
    #[must_use]
    pub fn first_str(&self, name: &str) -> Option<&str> {
        self.first(name)
            .and_then(|value| std::str::from_utf8(value).ok())
    }

    /// All UTF-8 values of an attribute; binary values are skipped.
    #[must_use]
    pub fn strings(&self, name: &str) -> Vec<&str> {
        self.values(name)
            .unwrap_or_default()
            .iter()
            .filter_map(|value| std::str::from_utf8(value).ok())
            .collect()
    }

    /// Object classes of the entry, lowercased.
    #[must_use]
    pub fn object_classes(&self) -> Vec<String> {
        self.strings(OBJECT_CLASS)
            .into_iter()
            .map(str::to_ascii_lowercase)
            .collect()
    }

    /// Decodes the first value of an attribute with the given codec.
    ///
    /// Returns `None` when the attribute is absent.
    #[must_use]
    pub fn decode<C: AttributeCodec>(&self, name: &str) -> Option<Result<C, CodecError>> {
        self.first(name).map(C::decode)
    }

    /// Replaces all values of an attribute.
    pub fn set<I, V>(&mut self, name: &str, values: I)
    where
        I: IntoIterator<Item = V>,
        V: Into<Vec<u8>>,
    {
        self.attributes.insert(
            name.to_ascii_lowercase(),
            values.into_iter().map(Into::into).collect(),
        );
    }

    /// Appends a value to an attribute.
    pub fn add_value(&mut self, name: &str, value: impl Into<Vec<u8>>) {
        self.attributes
            .entry(name.to_ascii_lowercase())
            .or_default()
            .push(value.into());
    }

    /// Removes every occurrence of `value` from an attribute. Returns true if anything was
    /// removed. Other values are left untouched.
    pub fn remove_value(&mut self, name: &str, value: &[u8]) -> bool {
        let key = name.to_ascii_lowercase();
        let Some(values) = self.attributes.get_mut(&key) else {
            return false;
        };
        let before = values.len();
        values.retain(|existing| existing.as_slice() != value);
        let removed = values.len() != before;
        if values.is_empty() {
            self.attributes.remove(&key);
        }
        removed
    }

    /// Removes an attribute entirely.
    pub fn remove(&mut self, name: &str) -> Option<Vec<Vec<u8>>> {
        self.attributes.remove(&name.to_ascii_lowercase())
    }

    /// Iterates over `(name, values)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[Vec<u8>])> {
        self.attributes
            .iter()
            .map(|(name, values)| (name.as_str(), values.as_slice()))
    }
}
