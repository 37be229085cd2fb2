//! One-to-many relations keyed on the related entries.

use std::collections::{HashSet, VecDeque};

use tracing::{debug, instrument};

use super::{key_filter, saved_dn, Change, Related, RelationScope};
use crate::{
    directory::Directory,
    entry::Entry,
    filter::Filter,
    model::{Model, Targets},
    pager::{self, PagedSearch, DEFAULT_PAGE_SIZE},
    query::Query,
    transport::SearchRequest,
    Result,
};

/// Entries whose `foreign_key` attribute holds the parent's key.
///
/// With [`HasMany::recursive`] the relation is followed transitively: every member found is used
/// as the parent of the next search, breadth first. Members are reported once, in discovery
/// order, and the walk stops on cyclic graphs.
#[derive(Debug, Clone)]
pub struct HasMany<'a> {
    scope: RelationScope<'a>,
    query: Query,
    page_size: u32,
    recursive: bool,
    using: Option<String>,
}

impl<'a> HasMany<'a> {
    pub(crate) fn new(parent: &'a Model, targets: Targets, foreign_key: &str) -> Self {
        let query = Query::new().filter(targets.only_related());
        Self {
            scope: RelationScope::new(parent, targets, foreign_key),
            query,
            page_size: DEFAULT_PAGE_SIZE,
            recursive: false,
            using: None,
        }
    }

    /// Names the relation in errors and logs. Defaults to the foreign key.
    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.scope.name = name.into();
        self
    }

    /// Compares against this attribute of the parent instead of its DN.
    #[must_use]
    pub fn with_relation_key(mut self, attribute: impl Into<String>) -> Self {
        self.scope.relation_key = attribute.into();
        self
    }

    /// Writes mutations to the parent's `attribute` instead of the related entry's foreign key.
    ///
    /// Needed when the foreign key is computed by the server (a group's members are found through
    /// their `memberof`, but membership is changed through the group's `member`).
    #[must_use]
    pub fn using(mut self, attribute: impl Into<String>) -> Self {
        self.using = Some(attribute.into());
        self
    }

    /// Follows the relation transitively.
    #[must_use]
    pub fn recursive(mut self) -> Self {
        self.recursive = true;
        self
    }

    /// Sets the page size of the searches.
    pub fn set_page_size(&mut self, page_size: u32) {
        self.page_size = page_size.max(1);
    }

    /// Builder form of [`HasMany::set_page_size`].
    #[must_use]
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.set_page_size(page_size);
        self
    }

    /// Narrows the relation with an additional filter.
    #[must_use]
    pub fn filter(mut self, filter: Filter) -> Self {
        self.query = self.query.filter(filter);
        self
    }

    /// Page size of the searches.
    #[must_use]
    pub const fn page_size(&self) -> u32 {
        self.page_size
    }

    /// Attribute on the related entries that holds the parent key.
    #[must_use]
    pub fn foreign_key(&self) -> &str {
        &self.scope.foreign_key
    }

    /// Object class filter of the declared target types.
    #[must_use]
    pub fn only_related(&self) -> Filter {
        self.scope.targets.only_related()
    }

    /// Scoped query, before the parent key is applied.
    #[must_use]
    pub const fn query(&self) -> &Query {
        &self.query
    }

    fn request(&self, dir: &Directory, key: &[u8]) -> SearchRequest {
        let query = self
            .query
            .clone()
            .scoped_by(key_filter(&self.scope.foreign_key, key));
        dir.request(&query, self.page_size)
    }

    /// Fetches every related model.
    ///
    /// # Errors
    ///
    /// Returns [`dirlink_core::RelationError::MissingParentKey`] before any search when the
    /// parent has no key, [`dirlink_core::RelationError::AmbiguousTarget`] when an entry cannot
    /// be typed, or the first transport error.
    #[instrument(skip_all, fields(relation = %self.scope.name, recursive = self.recursive))]
    pub async fn get(self, dir: &mut Directory) -> Result<Vec<Model>> {
        self.collect(dir, self.recursive).await
    }

    async fn collect(&self, dir: &mut Directory, recursive: bool) -> Result<Vec<Model>> {
        let mut walk = Walk::start(&self.scope)?;
        let mut models = Vec::new();
        while let Some(key) = walk.next_key() {
            let request = self.request(dir, &key);
            let entries = pager::paginate(dir.transport(), request).await?;
            models.extend(walk.admit(entries, &self.scope, recursive)?);
        }
        debug!(found = models.len(), "resolved relation");
        Ok(models)
    }

    /// Hands the related models to `callback` one page at a time. Returns the number of pages
    /// delivered.
    ///
    /// Recursive relations deliver each page's newly discovered members and then descend into
    /// them; pages with nothing new are skipped.
    ///
    /// # Errors
    ///
    /// Same as [`HasMany::get`]. Pages delivered before an error are not retracted.
    #[instrument(skip_all, fields(relation = %self.scope.name, recursive = self.recursive))]
    pub async fn chunk<F>(self, dir: &mut Directory, mut callback: F) -> Result<usize>
    where
        F: FnMut(Vec<Model>),
    {
        let mut walk = Walk::start(&self.scope)?;
        let mut delivered = 0;
        while let Some(key) = walk.next_key() {
            let mut search = PagedSearch::new(self.request(dir, &key));
            while let Some(page) = search.next_page(dir.transport()).await? {
                let models = walk.admit(page, &self.scope, self.recursive)?;
                if self.recursive && models.is_empty() {
                    continue;
                }
                delivered += 1;
                callback(models);
            }
        }
        Ok(delivered)
    }

    /// [`HasMany::chunk`] with pages of `page_size` entries.
    ///
    /// # Errors
    ///
    /// Same as [`HasMany::chunk`].
    pub async fn chunk_by<F>(
        self,
        dir: &mut Directory,
        page_size: u32,
        callback: F,
    ) -> Result<usize>
    where
        F: FnMut(Vec<Model>),
    {
        self.with_page_size(page_size).chunk(dir, callback).await
    }

    /// Links `related` to the parent.
    ///
    /// Without [`HasMany::using`] the parent key is added to the related entry's foreign key;
    /// with it the related key is added to the parent's attribute. A bare DN is looked up first.
    ///
    /// # Errors
    ///
    /// Returns [`dirlink_core::Error::NotFound`] for an unknown DN, a relation error when a key is
    /// missing, or the transport error.
    pub async fn attach(&self, dir: &mut Directory, related: impl Into<Related>) -> Result<Related> {
        self.change(dir, related.into(), Change::Add).await
    }

    /// Unlinks `related` from the parent, removing exactly the value [`HasMany::attach`] adds.
    ///
    /// # Errors
    ///
    /// Same as [`HasMany::attach`].
    pub async fn detach(&self, dir: &mut Directory, related: impl Into<Related>) -> Result<Related> {
        self.change(dir, related.into(), Change::Remove).await
    }

    /// Detaches every directly related model, one modification each. Returns the detached
    /// models.
    ///
    /// # Errors
    ///
    /// Stops at the first failure; models detached before it stay detached.
    #[instrument(skip_all, fields(relation = %self.scope.name))]
    pub async fn detach_all(self, dir: &mut Directory) -> Result<Vec<Model>> {
        let members = self.collect(dir, false).await?;
        let mut detached = Vec::with_capacity(members.len());
        for member in members {
            if let Related::Model(model) = self.detach(dir, member).await? {
                detached.push(model);
            }
        }
        Ok(detached)
    }

    async fn change(&self, dir: &mut Directory, related: Related, change: Change) -> Result<Related> {
        if let Some(attribute) = &self.using {
            let parent_dn = self.scope.parent_dn()?;
            let model = self.scope.materialize(dir, &related).await?;
            let values = vec![self.scope.related_key(&model)?];
            change.apply(dir, parent_dn, attribute, values).await?;
            return Ok(related.with_model(model));
        }

        let parent_key = self.scope.parent_key()?;
        let mut model = self.scope.materialize(dir, &related).await?;
        let foreign_key = &self.scope.foreign_key;
        change
            .apply(dir, saved_dn(&model)?, foreign_key, vec![parent_key.clone()])
            .await?;
        match change {
            Change::Add => model.entry_mut().add_value(foreign_key, parent_key),
            Change::Remove => {
                model.entry_mut().remove_value(foreign_key, &parent_key);
            }
        }
        Ok(related.with_model(model))
    }
}

/// Breadth-first traversal state: keys still to search and DNs already reported.
struct Walk {
    queue: VecDeque<Vec<u8>>,
    visited: HashSet<String>,
}

impl Walk {
    fn start(scope: &RelationScope<'_>) -> Result<Self> {
        let key = scope.parent_key()?;
        let visited = scope
            .parent
            .dn()
            .map(|dn| dn.normalized().to_string())
            .into_iter()
            .collect();
        Ok(Self {
            queue: VecDeque::from([key]),
            visited,
        })
    }

    fn next_key(&mut self) -> Option<Vec<u8>> {
        self.queue.pop_front()
    }

    /// Types the entries and keeps the ones not seen before, queueing their keys when descending.
    fn admit(
        &mut self,
        entries: Vec<Entry>,
        scope: &RelationScope<'_>,
        descend: bool,
    ) -> Result<Vec<Model>> {
        let mut fresh = Vec::with_capacity(entries.len());
        for entry in entries {
            if let Some(dn) = entry.dn() {
                if !self.visited.insert(dn.normalized().to_string()) {
                    continue;
                }
            }
            let model = scope.targets.resolve(entry)?;
            if descend {
                if let Some(key) = model.key(&scope.relation_key) {
                    self.queue.push_back(key);
                }
            }
            fresh.push(model);
        }
        Ok(fresh)
    }
}
