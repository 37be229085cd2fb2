//! One-to-one relations keyed on the parent.

use tracing::{debug, instrument};

use super::{Related, RelationScope};
use crate::{
    directory::Directory,
    model::{Model, Targets},
    Result,
};

/// The entry named by the parent's single-valued `foreign_key` attribute.
#[derive(Debug, Clone)]
pub struct HasOne<'a> {
    scope: RelationScope<'a>,
}

impl<'a> HasOne<'a> {
    pub(crate) fn new(parent: &'a Model, targets: Targets, foreign_key: &str) -> Self {
        Self {
            scope: RelationScope::new(parent, targets, foreign_key),
        }
    }

    /// Names the relation in errors and logs. Defaults to the foreign key.
    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.scope.name = name.into();
        self
    }

    /// Looks the stored value up in this attribute of the related entries instead of their DN.
    #[must_use]
    pub fn with_relation_key(mut self, attribute: impl Into<String>) -> Self {
        self.scope.relation_key = attribute.into();
        self
    }

    /// Attribute on the parent that names the related entry.
    #[must_use]
    pub fn foreign_key(&self) -> &str {
        &self.scope.foreign_key
    }

    /// Fetches the related model.
    ///
    /// Returns `None` when the parent does not name one, when the named entry does not exist, or
    /// when it turns out to be the parent itself.
    ///
    /// # Errors
    ///
    /// Returns [`dirlink_core::RelationError::AmbiguousTarget`] if the entry cannot be typed, or
    /// the transport error.
    #[instrument(skip_all, fields(relation = %self.scope.name))]
    pub async fn get(self, dir: &mut Directory) -> Result<Option<Model>> {
        let Some(value) = self.scope.parent.entry().first(&self.scope.foreign_key) else {
            return Ok(None);
        };
        let Some(entry) = self.scope.lookup(dir, value).await? else {
            debug!("related entry does not exist");
            return Ok(None);
        };

        let model = self.scope.targets.resolve(entry)?;
        if model.dn().is_some() && model.dn() == self.scope.parent.dn() {
            debug!("ignoring self reference");
            return Ok(None);
        }
        Ok(Some(model))
    }

    /// Points the parent at `related`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns [`dirlink_core::RelationError::MissingParentKey`] for an unsaved parent,
    /// [`dirlink_core::Error::NotFound`] for an unknown DN, or the transport error.
    pub async fn attach(&self, dir: &mut Directory, related: impl Into<Related>) -> Result<Related> {
        let related = related.into();
        let parent_dn = self.scope.parent_dn()?;
        let model = self.scope.materialize(dir, &related).await?;
        let key = self.scope.related_key(&model)?;
        dir.replace_values(parent_dn, &self.scope.foreign_key, vec![key])
            .await?;
        Ok(related.with_model(model))
    }

    /// Clears the parent's foreign key.
    ///
    /// # Errors
    ///
    /// Returns [`dirlink_core::RelationError::MissingParentKey`] for an unsaved parent, or the
    /// transport error.
    pub async fn detach(&self, dir: &mut Directory) -> Result<()> {
        let parent_dn = self.scope.parent_dn()?;
        dir.replace_values(parent_dn, &self.scope.foreign_key, Vec::new())
            .await
    }
}
