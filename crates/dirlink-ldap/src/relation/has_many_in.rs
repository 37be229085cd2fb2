//! One-to-many relations whose keys are stored on the parent.

use tracing::{debug, instrument};

use super::{Change, Related, RelationScope};
use crate::{
    directory::Directory,
    model::{Model, Targets},
    Result,
};

/// The entries named by the values of the parent's multi-valued `foreign_key` attribute.
#[derive(Debug, Clone)]
pub struct HasManyIn<'a> {
    scope: RelationScope<'a>,
}

impl<'a> HasManyIn<'a> {
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

    /// Looks stored values up in this attribute of the related entries instead of their DN.
    #[must_use]
    pub fn with_relation_key(mut self, attribute: impl Into<String>) -> Self {
        self.scope.relation_key = attribute.into();
        self
    }

    /// Attribute on the parent that lists the related entries.
    #[must_use]
    pub fn foreign_key(&self) -> &str {
        &self.scope.foreign_key
    }

    /// Fetches the related models with one lookup per stored value.
    ///
    /// Values naming missing entries, or entries of none of the declared types, are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`dirlink_core::RelationError::AmbiguousTarget`] if an entry matches several
    /// unrelated target types, or the first transport error.
    #[instrument(skip_all, fields(relation = %self.scope.name))]
    pub async fn get(self, dir: &mut Directory) -> Result<Vec<Model>> {
        self.collect(dir).await
    }

    async fn collect(&self, dir: &mut Directory) -> Result<Vec<Model>> {
        let parent = self.scope.parent;
        let values = parent
            .entry()
            .values(&self.scope.foreign_key)
            .unwrap_or_default();

        let mut models = Vec::with_capacity(values.len());
        for value in values {
            match self.scope.lookup(dir, value).await? {
                Some(entry) if self.scope.targets.admits(&entry) => {
                    models.push(self.scope.targets.resolve(entry)?);
                }
                Some(entry) => {
                    debug!(dn = ?entry.dn(), "skipping entry of an undeclared type");
                }
                None => debug!(
                    value = %String::from_utf8_lossy(value),
                    "skipping missing entry"
                ),
            }
        }
        Ok(models)
    }

    /// Adds the related key to the parent's foreign key.
    ///
    /// # Errors
    ///
    /// Returns [`dirlink_core::RelationError::MissingParentKey`] for an unsaved parent,
    /// [`dirlink_core::Error::NotFound`] for an unknown DN, or the transport error.
    pub async fn attach(&self, dir: &mut Directory, related: impl Into<Related>) -> Result<Related> {
        self.change(dir, related.into(), Change::Add).await
    }

    /// Removes the related key from the parent's foreign key. Other values are left untouched.
    ///
    /// # Errors
    ///
    /// Same as [`HasManyIn::attach`].
    pub async fn detach(&self, dir: &mut Directory, related: impl Into<Related>) -> Result<Related> {
        self.change(dir, related.into(), Change::Remove).await
    }

    /// Detaches every related model, one modification each. Returns the detached models.
    ///
    /// # Errors
    ///
    /// Stops at the first failure; models detached before it stay detached.
    #[instrument(skip_all, fields(relation = %self.scope.name))]
    pub async fn detach_all(self, dir: &mut Directory) -> Result<Vec<Model>> {
        let members = self.collect(dir).await?;
        let mut detached = Vec::with_capacity(members.len());
        for member in members {
            if let Related::Model(model) = self.detach(dir, member).await? {
                detached.push(model);
            }
        }
        Ok(detached)
    }

    async fn change(&self, dir: &mut Directory, related: Related, change: Change) -> Result<Related> {
        let parent_dn = self.scope.parent_dn()?;
        let model = self.scope.materialize(dir, &related).await?;
        let values = vec![self.scope.related_key(&model)?];
        change
            .apply(dir, parent_dn, &self.scope.foreign_key, values)
            .await?;
        Ok(related.with_model(model))
    }
}
