//! Contract with the directory transport.
//!
//! Everything above this module talks to the directory through [`DirectoryTransport`]. The
//! production implementation lives in [`crate::connection`]; tests substitute their own.

use async_trait::async_trait;

use crate::{entry::Entry, Result};

/// Represents the search scope for LDAP queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SearchScope {
    /// Base object only.
    Base,
    /// One level below the base.
    OneLevel,
    /// Entire subtree.
    #[default]
    Subtree,
}

/// A fully rendered search, ready to be sent page by page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
    /// Search base.
    pub base_dn: String,
    /// Search scope.
    pub scope: SearchScope,
    /// Rendered filter text.
    pub filter: String,
    /// Attributes to return (empty means all user attributes).
    pub attributes: Vec<String>,
    /// Maximum number of entries per page.
    pub page_size: u32,
}

/// One page of search results.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchPage {
    /// Entries in server order.
    pub entries: Vec<Entry>,
    /// Cookie to request the next page; `None` or empty on the last page.
    pub cookie: Option<Vec<u8>>,
}

impl SearchPage {
    /// Returns true if the server indicated more pages follow.
    #[must_use]
    pub fn has_more(&self) -> bool {
        self.cookie.as_ref().is_some_and(|cookie| !cookie.is_empty())
    }
}

/// LDAP modification request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Modification {
    /// Add attribute values.
    Add {
        /// Attribute to modify.
        attribute: String,
        /// Values to add.
        values: Vec<Vec<u8>>,
    },
    /// Delete attribute values.
    Delete {
        /// Attribute to modify.
        attribute: String,
        /// Values to delete (empty removes the attribute).
        values: Vec<Vec<u8>>,
    },
    /// Replace attribute values.
    Replace {
        /// Attribute to modify.
        attribute: String,
        /// Replacement values.
        values: Vec<Vec<u8>>,
    },
}

/// Directory operations consumed by queries, pagers and relations.
///
/// Calls are strictly sequential: each one completes before the next is issued. Implementations
/// report server and network failures as [`dirlink_core::Error::Transport`] or
/// [`dirlink_core::Error::Timeout`]; callers never retry.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DirectoryTransport: Send {
    /// Fetches one page of a search. Pass `None` for the first page and the returned cookie for
    /// every following page.
    async fn search_page(
        &mut self,
        request: &SearchRequest,
        cookie: Option<Vec<u8>>,
    ) -> Result<SearchPage>;

    /// Reads a single entry by DN. Returns `Ok(None)` if it does not exist.
    async fn find(&mut self, dn: &str, attributes: &[String]) -> Result<Option<Entry>>;

    /// Creates a new entry.
    async fn add(&mut self, dn: &str, attributes: &[(String, Vec<Vec<u8>>)]) -> Result<()>;

    /// Applies modifications to an existing entry.
    async fn modify(&mut self, dn: &str, modifications: &[Modification]) -> Result<()>;
}
