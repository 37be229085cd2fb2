//! Relations between entries.
//!
//! Relations are derived from attribute values rather than stored constraints:
//!
//! - [`HasMany`]: the related entries hold the parent's key in a foreign key attribute
//!   (a user's groups are the groups whose `member` holds the user's DN).
//! - [`HasOne`]: the parent holds the related key in a single-valued attribute (`manager`).
//! - [`HasManyIn`]: the parent holds the related keys in a multi-valued attribute (`memberof`).
//!
//! Descriptors borrow their parent and are built fresh on every access from the methods on
//! [`Model`]; operations that run the relation consume it.

mod has_many;
mod has_many_in;
mod has_one;

pub use has_many::HasMany;
pub use has_many_in::HasManyIn;
pub use has_one::HasOne;

use tracing::debug;

use dirlink_core::{Error, RelationError};

use crate::{
    directory::Directory,
    dn::DistinguishedName,
    entry::Entry,
    filter::Filter,
    model::{Model, Targets, DN_KEY},
    query::Query,
    Result,
};

/// Related entry given to, and returned from, attach and detach.
///
/// Operations hand back the shape they were given: a DN stays a DN, a model comes back with the
/// in-memory change applied when the change was made to the related entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Related {
    /// A materialised entry.
    Model(Model),
    /// A bare distinguished name, resolved with one lookup.
    Dn(DistinguishedName),
}

impl Related {
    /// Distinguished name of the related entry, if known.
    #[must_use]
    pub fn dn(&self) -> Option<&DistinguishedName> {
        match self {
            Self::Model(model) => model.dn(),
            Self::Dn(dn) => Some(dn),
        }
    }

    /// Returns the model, if this is one.
    #[must_use]
    pub fn into_model(self) -> Option<Model> {
        match self {
            Self::Model(model) => Some(model),
            Self::Dn(_) => None,
        }
    }

    fn with_model(&self, model: Model) -> Self {
        match self {
            Self::Model(_) => Self::Model(model),
            Self::Dn(dn) => Self::Dn(dn.clone()),
        }
    }
}

impl From<Model> for Related {
    fn from(model: Model) -> Self {
        Self::Model(model)
    }
}

impl From<DistinguishedName> for Related {
    fn from(dn: DistinguishedName) -> Self {
        Self::Dn(dn)
    }
}

/// State shared by every relation kind.
#[derive(Debug, Clone)]
struct RelationScope<'a> {
    parent: &'a Model,
    targets: Targets,
    foreign_key: String,
    relation_key: String,
    name: String,
}

impl<'a> RelationScope<'a> {
    fn new(parent: &'a Model, targets: Targets, foreign_key: &str) -> Self {
        Self {
            parent,
            targets,
            foreign_key: foreign_key.to_ascii_lowercase(),
            relation_key: DN_KEY.to_string(),
            name: foreign_key.to_string(),
        }
    }

    fn relation_key_is_dn(&self) -> bool {
        self.relation_key.eq_ignore_ascii_case(DN_KEY)
    }

    fn missing(&self, key: &str) -> Error {
        RelationError::MissingParentKey {
            relation: self.name.clone(),
            key: key.to_string(),
        }
        .into()
    }

    /// The parent's relation key value.
    fn parent_key(&self) -> Result<Vec<u8>> {
        self.parent
            .key(&self.relation_key)
            .ok_or_else(|| self.missing(&self.relation_key))
    }

    fn parent_dn(&self) -> Result<&'a DistinguishedName> {
        self.parent.dn().ok_or_else(|| self.missing(DN_KEY))
    }

    /// The relation key value of a related model.
    fn related_key(&self, model: &Model) -> Result<Vec<u8>> {
        model.key(&self.relation_key).ok_or_else(|| {
            Error::InvalidRequest(format!(
                "related entry `{}` has no `{}`",
                model.dn().map(ToString::to_string).unwrap_or_default(),
                self.relation_key
            ))
        })
    }

    /// Turns a [`Related`] into a model, looking up bare DNs.
    async fn materialize(&self, dir: &mut Directory, related: &Related) -> Result<Model> {
        match related {
            Related::Model(model) => Ok(model.clone()),
            Related::Dn(dn) => {
                let entry = dir
                    .find(dn)
                    .await?
                    .ok_or_else(|| Error::NotFound(format!("entry `{dn}` does not exist")))?;
                self.targets.resolve(entry)
            }
        }
    }

    /// Finds the entry a stored key value points at.
    async fn lookup(&self, dir: &mut Directory, value: &[u8]) -> Result<Option<Entry>> {
        if self.relation_key_is_dn() {
            let dn = std::str::from_utf8(value)
                .map_err(|_| Error::InvalidDn("stored DN is not valid UTF-8".to_string()))?;
            dir.find(&DistinguishedName::parse(dn)?).await
        } else {
            let query = Query::new()
                .filter(key_filter(&self.relation_key, value))
                .filter(self.targets.only_related());
            dir.first(&query).await
        }
    }
}

/// Direction of a mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Change {
    Add,
    Remove,
}

impl Change {
    async fn apply(
        self,
        dir: &mut Directory,
        dn: &DistinguishedName,
        attribute: &str,
        values: Vec<Vec<u8>>,
    ) -> Result<()> {
        debug!(%dn, attribute, change = ?self, "updating relation attribute");
        match self {
            Self::Add => dir.add_values(dn, attribute, values).await,
            Self::Remove => dir.remove_values(dn, attribute, values).await,
        }
    }
}

/// DN of a related model, which must have been saved.
fn saved_dn(model: &Model) -> Result<&DistinguishedName> {
    model
        .dn()
        .ok_or_else(|| Error::InvalidRequest("related entry has not been saved".to_string()))
}

/// Equality filter on a key value, textual when the value is UTF-8.
fn key_filter(attribute: &str, value: &[u8]) -> Filter {
    match std::str::from_utf8(value) {
        Ok(text) => Filter::equals(attribute, text),
        Err(_) => Filter::equals_bytes(attribute, value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ModelType;

    #[test]
    fn key_filter_escapes_text_and_binary() {
        assert_eq!(
            key_filter("member", b"cn=a(b),dc=x").render(),
            r"(member=cn=a\28b\29,dc=x)"
        );
        assert_eq!(
            key_filter("objectsid", &[0x01, 0xff]).render(),
            r"(objectsid=\01\ff)"
        );
    }

    #[test]
    fn unsaved_parent_has_no_key() {
        let parent = Model::new(ModelType::new("user", ["user"]), Entry::new());
        let scope = RelationScope::new(&parent, ModelType::new("group", ["group"]).into(), "member");
        assert_eq!(
            scope.parent_key().unwrap_err(),
            Error::Relation(RelationError::MissingParentKey {
                relation: "member".to_string(),
                key: "dn".to_string(),
            })
        );
    }

    #[test]
    fn related_keeps_its_shape() {
        let dn = DistinguishedName::parse("cn=a,dc=x").unwrap();
        let model = Model::new(ModelType::new("user", ["user"]), Entry::with_dn(dn.clone()));
        assert_eq!(
            Related::Dn(dn.clone()).with_model(model.clone()),
            Related::Dn(dn.clone())
        );
        assert_eq!(
            Related::Model(model.clone()).with_model(model.clone()),
            Related::Model(model)
        );
        assert_eq!(Related::from(dn.clone()).dn(), Some(&dn));
    }
}
