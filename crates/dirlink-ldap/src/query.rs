//! Scoped query builder.

use crate::{
    dn::DistinguishedName,
    entry::OBJECT_CLASS,
    filter::Filter,
    transport::{SearchRequest, SearchScope},
};

/// Search description that has not been sent yet.
///
/// Queries are plain values: cloning one yields an independent copy, so a relation can narrow its
/// own copy without affecting the builder it was derived from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Query {
    base_dn: Option<DistinguishedName>,
    scope: SearchScope,
    filters: Vec<Filter>,
    selects: Vec<String>,
}

impl Query {
    /// Creates an unfiltered subtree query below the directory's base DN.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Overrides the search base.
    #[must_use]
    pub fn in_base(mut self, base_dn: DistinguishedName) -> Self {
        self.base_dn = Some(base_dn);
        self
    }

    /// Sets the search scope.
    #[must_use]
    pub fn scope(mut self, scope: SearchScope) -> Self {
        self.scope = scope;
        self
    }

    /// Adds a filter; all filters are combined with AND.
    #[must_use]
    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    /// Adds a filter ahead of the existing ones.
    #[must_use]
    pub fn scoped_by(mut self, filter: Filter) -> Self {
        self.filters.insert(0, filter);
        self
    }

    /// Adds an equality filter.
    #[must_use]
    pub fn where_equals(self, attribute: impl Into<String>, value: impl Into<String>) -> Self {
        self.filter(Filter::equals(attribute, value))
    }

    /// Adds a presence filter.
    #[must_use]
    pub fn where_has(self, attribute: impl Into<String>) -> Self {
        self.filter(Filter::present(attribute))
    }

    /// Restricts the returned attributes.
    #[must_use]
    pub fn select<I, S>(mut self, attributes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.selects.extend(attributes.into_iter().map(Into::into));
        self
    }

    /// Filters added so far.
    #[must_use]
    pub fn filters(&self) -> &[Filter] {
        &self.filters
    }

    /// Selected attributes (empty means all).
    #[must_use]
    pub fn selects(&self) -> &[String] {
        &self.selects
    }

    /// Explicit search base, if one was set.
    #[must_use]
    pub const fn base_dn(&self) -> Option<&DistinguishedName> {
        self.base_dn.as_ref()
    }

    /// Combines the filters into one tree. An unfiltered query matches every entry.
    #[must_use]
    pub fn to_filter(&self) -> Filter {
        match self.filters.as_slice() {
            [] => Filter::present(OBJECT_CLASS),
            [single] => single.clone(),
            many => Filter::And(many.to_vec()),
        }
    }

    /// Renders the combined filter text.
    #[must_use]
    pub fn render(&self) -> String {
        self.to_filter().render()
    }

    /// Builds the transport request, falling back to `default_base` when no base was set.
    #[must_use]
    pub fn to_request(&self, default_base: &DistinguishedName, page_size: u32) -> SearchRequest {
        SearchRequest {
            base_dn: self.base_dn.as_ref().unwrap_or(default_base).to_string(),
            scope: self.scope,
            filter: self.render(),
            attributes: self.selects.clone(),
            page_size,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_query_matches_everything() {
        assert_eq!(Query::new().render(), "(objectclass=*)");
    }

    #[test]
    fn single_filter_is_not_wrapped() {
        let query = Query::new().where_equals("member", "cn=foo");
        assert_eq!(query.render(), "(member=cn=foo)");
    }

    #[test]
    fn filters_are_anded() {
        let query = Query::new()
            .where_equals("member", "cn=foo")
            .where_has("mail");
        assert_eq!(query.render(), "(&(member=cn=foo)(mail=*))");
    }

    #[test]
    fn scoping_filter_comes_first() {
        let query = Query::new()
            .where_has("mail")
            .scoped_by(Filter::equals("member", "cn=foo"));
        assert_eq!(query.render(), "(&(member=cn=foo)(mail=*))");
    }

    #[test]
    fn clones_are_independent() {
        let base = Query::new().where_has("cn");
        let narrowed = base.clone().where_equals("sn", "doe");
        assert_eq!(base.filters().len(), 1);
        assert_eq!(narrowed.filters().len(), 2);
    }

    #[test]
    fn request_uses_default_base() {
        let base = DistinguishedName::parse("dc=example,dc=com").unwrap();
        let request = Query::new().select(["cn"]).to_request(&base, 250);
        assert_eq!(request.base_dn, "dc=example,dc=com");
        assert_eq!(request.attributes, vec!["cn".to_string()]);
        assert_eq!(request.page_size, 250);
        assert_eq!(request.scope, SearchScope::Subtree);

        let ou = DistinguishedName::parse("ou=Groups,dc=example,dc=com").unwrap();
        let request = Query::new().in_base(ou).to_request(&base, 250);
        assert_eq!(request.base_dn, "ou=Groups,dc=example,dc=com");
    }
}
