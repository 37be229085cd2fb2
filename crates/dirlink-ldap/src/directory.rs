//! Directory handle.
//!
//! A [`Directory`] bundles a transport with the base DN and default page size. It is passed
//! explicitly to every operation that talks to the server; there is no process-wide registry.

use tracing::debug;

use dirlink_core::{Error, Sid};

use crate::{
    config::DirectoryConfig,
    connection::LdapConnector,
    dn::DistinguishedName,
    entry::Entry,
    filter::Filter,
    pager::{self, DEFAULT_PAGE_SIZE},
    query::Query,
    transport::{DirectoryTransport, Modification, SearchRequest},
    Result,
};

/// Attribute holding an entry's security identifier.
pub const OBJECT_SID: &str = "objectsid";

/// Connection handle used by queries and relations.
pub struct Directory {
    transport: Box<dyn DirectoryTransport>,
    base_dn: DistinguishedName,
    page_size: u32,
}

impl Directory {
    /// Wraps an already connected transport.
    #[must_use]
    pub fn new(transport: impl DirectoryTransport + 'static, base_dn: DistinguishedName) -> Self {
        Self {
            transport: Box::new(transport),
            base_dn,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    /// Connects over LDAP and binds with the configured service account.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection or the bind fails.
    pub async fn connect(config: &DirectoryConfig) -> Result<Self> {
        let transport = LdapConnector::new(config).connect().await?;
        Ok(Self::new(transport, config.base_dn().clone()).with_page_size(config.page_size()))
    }

    /// Overrides the default page size for searches issued through this handle.
    #[must_use]
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Base DN used by queries that do not set their own.
    #[must_use]
    pub const fn base_dn(&self) -> &DistinguishedName {
        &self.base_dn
    }

    /// Default page size.
    #[must_use]
    pub const fn page_size(&self) -> u32 {
        self.page_size
    }

    pub(crate) fn transport(&mut self) -> &mut dyn DirectoryTransport {
        self.transport.as_mut()
    }

    pub(crate) fn request(&self, query: &Query, page_size: u32) -> SearchRequest {
        query.to_request(&self.base_dn, page_size)
    }

    /// Runs a query to completion.
    ///
    /// # Errors
    ///
    /// Propagates the first transport error.
    pub async fn search(&mut self, query: &Query) -> Result<Vec<Entry>> {
        let request = self.request(query, self.page_size);
        pager::paginate(self.transport(), request).await
    }

    /// Runs a query and hands each page to `callback`. Returns the number of pages.
    ///
    /// # Errors
    ///
    /// Propagates the first transport error.
    pub async fn chunk<F>(&mut self, query: &Query, callback: F) -> Result<usize>
    where
        F: FnMut(Vec<Entry>),
    {
        let request = self.request(query, self.page_size);
        pager::chunk(self.transport(), request, callback).await
    }

    /// Reads an entry by DN.
    ///
    /// # Errors
    ///
    /// Propagates transport errors; a missing entry is `Ok(None)`.
    pub async fn find(&mut self, dn: &DistinguishedName) -> Result<Option<Entry>> {
        self.transport.find(&dn.to_string(), &[]).await
    }

    /// Returns the first entry whose `attribute` equals `value`.
    ///
    /// # Errors
    ///
    /// Propagates transport errors.
    pub async fn find_by(
        &mut self,
        attribute: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<Option<Entry>> {
        self.first(&Query::new().filter(Filter::equals(attribute, value)))
            .await
    }

    /// Returns the entry with the given security identifier.
    ///
    /// # Errors
    ///
    /// Propagates transport errors.
    pub async fn find_by_sid(&mut self, sid: &Sid) -> Result<Option<Entry>> {
        debug!(%sid, "looking up entry by SID");
        self.first(&Query::new().filter(Filter::equals_bytes(OBJECT_SID, sid.to_binary())))
            .await
    }

    /// Returns the first entry a query matches, paging one entry at a time.
    ///
    /// Servers may answer a page with no entries but a cookie, so paging continues until an entry
    /// arrives or the search ends. A search stopped early is abandoned on the server.
    pub(crate) async fn first(&mut self, query: &Query) -> Result<Option<Entry>> {
        let request = self.request(query, 1);
        let mut search = pager::PagedSearch::new(request);
        while let Some(page) = search.next_page(self.transport()).await? {
            if let Some(entry) = page.into_iter().next() {
                search.abandon(self.transport()).await?;
                return Ok(Some(entry));
            }
        }
        Ok(None)
    }

    /// Persists a new entry.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidRequest`] if the entry has no DN, or the transport error.
    pub async fn create(&mut self, entry: &Entry) -> Result<()> {
        let dn = entry
            .dn()
            .ok_or_else(|| Error::InvalidRequest("cannot create an entry without a DN".into()))?;
        let attributes = entry
            .iter()
            .map(|(name, values)| (name.to_string(), values.to_vec()))
            .collect::<Vec<_>>();
        debug!(%dn, attributes = attributes.len(), "creating entry");
        self.transport.add(&dn.to_string(), &attributes).await
    }

    /// Adds values to an attribute of an existing entry.
    ///
    /// # Errors
    ///
    /// Propagates the transport error.
    pub async fn add_values(
        &mut self,
        dn: &DistinguishedName,
        attribute: &str,
        values: Vec<Vec<u8>>,
    ) -> Result<()> {
        self.modify(
            dn,
            Modification::Add {
                attribute: attribute.to_string(),
                values,
            },
        )
        .await
    }

    /// Removes exactly the given values from an attribute. Other values are left untouched.
    ///
    /// # Errors
    ///
    /// Propagates the transport error.
    pub async fn remove_values(
        &mut self,
        dn: &DistinguishedName,
        attribute: &str,
        values: Vec<Vec<u8>>,
    ) -> Result<()> {
        self.modify(
            dn,
            Modification::Delete {
                attribute: attribute.to_string(),
                values,
            },
        )
        .await
    }

    /// Replaces every value of an attribute. An empty list clears it.
    ///
    /// # Errors
    ///
    /// Propagates the transport error.
    pub async fn replace_values(
        &mut self,
        dn: &DistinguishedName,
        attribute: &str,
        values: Vec<Vec<u8>>,
    ) -> Result<()> {
        self.modify(
            dn,
            Modification::Replace {
                attribute: attribute.to_string(),
                values,
            },
        )
        .await
    }

    async fn modify(&mut self, dn: &DistinguishedName, modification: Modification) -> Result<()> {
        debug!(%dn, ?modification, "modifying entry");
        self.transport
            .modify(&dn.to_string(), std::slice::from_ref(&modification))
            .await
    }
}
