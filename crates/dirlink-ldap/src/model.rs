//! Typed entities and target type resolution.
//!
//! A [`ModelType`] names a kind of entry and the object classes that identify it. A [`Model`]
//! pairs an [`Entry`] with the type it was materialised as. Relations declare their possible
//! result types as [`Targets`]; more than one target makes the relation polymorphic, and every
//! returned entry is matched against the declared object class sets to pick its type.

use dirlink_core::{CodecError, Guid, RelationError, Sid};

use crate::{
    dn::DistinguishedName,
    entry::{Entry, OBJECT_CLASS},
    filter::Filter,
    relation::{HasMany, HasManyIn, HasOne},
    Result,
};

/// Pseudo attribute naming an entry's distinguished name as a relation key.
pub const DN_KEY: &str = "dn";

/// Attribute holding an entry's GUID.
pub const OBJECT_GUID: &str = "objectguid";

/// A kind of directory entry, identified by its object classes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ModelType {
    name: String,
    object_classes: Vec<String>,
}

impl ModelType {
    /// Creates a type. Object classes are compared case-insensitively and stored lowercased.
    #[must_use]
    pub fn new<I, S>(name: impl Into<String>, object_classes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            name: name.into(),
            object_classes: object_classes
                .into_iter()
                .map(|class| class.as_ref().to_ascii_lowercase())
                .collect(),
        }
    }

    /// Type name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared object classes, lowercased.
    #[must_use]
    pub fn object_classes(&self) -> &[String] {
        &self.object_classes
    }

    /// Returns true if the entry carries every declared object class.
    ///
    /// A type that declares no classes matches any entry.
    #[must_use]
    pub fn matches(&self, entry: &Entry) -> bool {
        let classes = entry.object_classes();
        self.object_classes
            .iter()
            .all(|declared| classes.contains(declared))
    }

    /// New, unsaved entry of this type at `dn`, with its object classes set.
    #[must_use]
    pub fn entry(&self, dn: DistinguishedName) -> Entry {
        let entry = Entry::with_dn(dn);
        if self.object_classes.is_empty() {
            entry
        } else {
            entry.attribute(OBJECT_CLASS, self.object_classes.iter().map(String::as_str))
        }
    }

    fn is_refined_by(&self, other: &Self) -> bool {
        self.object_classes
            .iter()
            .all(|class| other.object_classes.contains(class))
    }
}

/// The closed, ordered set of types a relation may return.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Targets(Vec<ModelType>);

impl Targets {
    /// Declared types in order.
    #[must_use]
    pub fn types(&self) -> &[ModelType] {
        &self.0
    }

    /// Returns true when more than one type is declared.
    #[must_use]
    pub fn is_polymorphic(&self) -> bool {
        self.0.len() > 1
    }

    /// Returns true if at least one declared type matches the entry.
    #[must_use]
    pub fn admits(&self, entry: &Entry) -> bool {
        self.0.iter().any(|target| target.matches(entry))
    }

    /// Object class filter restricting a search to the declared types.
    #[must_use]
    pub fn only_related(&self) -> Filter {
        Filter::only_related(self.0.iter().map(ModelType::object_classes))
    }

    /// Materialises an entry as one of the declared types.
    ///
    /// A single declared type is used as is. With several types, the entry must match exactly one
    /// of them, or one match must refine every other match (a `computer` is also a `user`, so a
    /// computer entry resolves to the computer type).
    ///
    /// # Errors
    ///
    /// Returns [`RelationError::AmbiguousTarget`] when a polymorphic relation finds no match or
    /// several unrelated matches.
    pub fn resolve(&self, entry: Entry) -> Result<Model> {
        if let [only] = self.0.as_slice() {
            return Ok(Model::new(only.clone(), entry));
        }

        let matching = self
            .0
            .iter()
            .filter(|target| target.matches(&entry))
            .collect::<Vec<_>>();

        let most_specific = matching
            .iter()
            .copied()
            .filter(|candidate| matching.iter().all(|other| other.is_refined_by(candidate)))
            .collect::<Vec<_>>();

        match most_specific.as_slice() {
            [target] => Ok(Model::new((*target).clone(), entry)),
            _ => Err(RelationError::AmbiguousTarget {
                dn: entry.dn().map(ToString::to_string).unwrap_or_default(),
                candidates: matching.iter().map(|target| target.name.clone()).collect(),
            }
            .into()),
        }
    }
}

impl From<ModelType> for Targets {
    fn from(target: ModelType) -> Self {
        Self(vec![target])
    }
}

impl From<Vec<ModelType>> for Targets {
    fn from(targets: Vec<ModelType>) -> Self {
        Self(targets)
    }
}

impl<const N: usize> From<[ModelType; N]> for Targets {
    fn from(targets: [ModelType; N]) -> Self {
        Self(targets.into())
    }
}

impl FromIterator<ModelType> for Targets {
    fn from_iter<I: IntoIterator<Item = ModelType>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// An entry materialised as a particular [`ModelType`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Model {
    model_type: ModelType,
    entry: Entry,
}

impl Model {
    /// Pairs an entry with its type.
    #[must_use]
    pub const fn new(model_type: ModelType, entry: Entry) -> Self {
        Self { model_type, entry }
    }

    /// Type this entry was materialised as.
    #[must_use]
    pub const fn model_type(&self) -> &ModelType {
        &self.model_type
    }

    /// Returns true if the model was materialised as `model_type`.
    #[must_use]
    pub fn is(&self, model_type: &ModelType) -> bool {
        self.model_type.name == model_type.name
    }

    /// Underlying entry.
    #[must_use]
    pub const fn entry(&self) -> &Entry {
        &self.entry
    }

    /// Mutable access to the underlying entry.
    pub fn entry_mut(&mut self) -> &mut Entry {
        &mut self.entry
    }

    /// Consumes the model and returns the entry.
    #[must_use]
    pub fn into_entry(self) -> Entry {
        self.entry
    }

    /// Distinguished name, if the entry was saved.
    #[must_use]
    pub const fn dn(&self) -> Option<&DistinguishedName> {
        self.entry.dn()
    }

    /// Value of a key attribute as raw bytes. [`DN_KEY`] yields the DN itself.
    #[must_use]
    pub fn key(&self, attribute: &str) -> Option<Vec<u8>> {
        if attribute.eq_ignore_ascii_case(DN_KEY) {
            self.dn().map(|dn| dn.to_string().into_bytes())
        } else {
            self.entry.first(attribute).map(<[u8]>::to_vec)
        }
    }

    /// Decoded `objectsid`, if present.
    #[must_use]
    pub fn sid(&self) -> Option<std::result::Result<Sid, CodecError>> {
        self.entry.decode(crate::directory::OBJECT_SID)
    }

    /// Decoded `objectguid`, if present.
    #[must_use]
    pub fn guid(&self) -> Option<std::result::Result<Guid, CodecError>> {
        self.entry.decode(OBJECT_GUID)
    }

    /// One-to-many relation whose foreign key lives on the related entries.
    #[must_use]
    pub fn has_many(&self, targets: impl Into<Targets>, foreign_key: &str) -> HasMany<'_> {
        HasMany::new(self, targets.into(), foreign_key)
    }

    /// One-to-one relation whose foreign key lives on this entry.
    #[must_use]
    pub fn has_one(&self, targets: impl Into<Targets>, foreign_key: &str) -> HasOne<'_> {
        HasOne::new(self, targets.into(), foreign_key)
    }

    /// One-to-many relation whose foreign key values live on this entry.
    #[must_use]
    pub fn has_many_in(&self, targets: impl Into<Targets>, foreign_key: &str) -> HasManyIn<'_> {
        HasManyIn::new(self, targets.into(), foreign_key)
    }
}
