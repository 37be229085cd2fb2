//! Paged searches.
//!
//! Large result sets are fetched with the paged-results control: the server returns at most
//! `page_size` entries per round-trip together with a cookie identifying the next page. Pages are
//! requested strictly one after another, in server order.

use tracing::debug;

use crate::{
    entry::Entry,
    transport::{DirectoryTransport, SearchRequest},
    Result,
};

/// Page size used when nothing else is configured.
pub const DEFAULT_PAGE_SIZE: u32 = 1000;

/// Cursor over the pages of one search.
#[derive(Debug, Clone)]
pub struct PagedSearch {
    request: SearchRequest,
    cookie: Option<Vec<u8>>,
    finished: bool,
    pages: usize,
}

impl PagedSearch {
    /// Creates a cursor positioned before the first page.
    #[must_use]
    pub fn new(request: SearchRequest) -> Self {
        Self {
            request,
            cookie: None,
            finished: false,
            pages: 0,
        }
    }

    /// The request being paged.
    #[must_use]
    pub const fn request(&self) -> &SearchRequest {
        &self.request
    }

    /// Number of pages fetched so far.
    #[must_use]
    pub const fn pages_fetched(&self) -> usize {
        self.pages
    }

    /// Fetches the next page, or returns `None` once the server reported the last one.
    ///
    /// # Errors
    ///
    /// Propagates the transport error. The cursor is finished afterwards, so a failed search is
    /// never silently resumed from the first page.
    pub async fn next_page(
        &mut self,
        transport: &mut dyn DirectoryTransport,
    ) -> Result<Option<Vec<Entry>>> {
        if self.finished {
            return Ok(None);
        }

        self.finished = true;
        let page = transport
            .search_page(&self.request, self.cookie.take())
            .await?;
        self.pages += 1;

        if page.has_more() {
            self.finished = false;
            self.cookie = page.cookie;
        }

        debug!(
            base = %self.request.base_dn,
            filter = %self.request.filter,
            page = self.pages,
            entries = page.entries.len(),
            more = !self.finished,
            "fetched search page"
        );

        Ok(Some(page.entries))
    }

    /// Releases the server-side cursor of a search that is stopped before its last page.
    ///
    /// Sends the outstanding cookie with a page size of zero, which ends the paged search on the
    /// server. Does nothing once the server reported the last page.
    ///
    /// # Errors
    ///
    /// Propagates the transport error.
    pub async fn abandon(&mut self, transport: &mut dyn DirectoryTransport) -> Result<()> {
        self.finished = true;
        let Some(cookie) = self.cookie.take() else {
            return Ok(());
        };

        let request = SearchRequest {
            page_size: 0,
            ..self.request.clone()
        };
        transport.search_page(&request, Some(cookie)).await?;
        debug!(filter = %self.request.filter, pages = self.pages, "abandoned paged search");
        Ok(())
    }
}

/// Runs a search to completion and returns every entry.
///
/// # Errors
///
/// Aborts on the first transport error.
pub async fn paginate(
    transport: &mut dyn DirectoryTransport,
    request: SearchRequest,
) -> Result<Vec<Entry>> {
    let mut search = PagedSearch::new(request);
    let mut entries = Vec::new();
    while let Some(page) = search.next_page(transport).await? {
        entries.extend(page);
    }
    Ok(entries)
}

/// Runs a search and hands each page to `callback` as it arrives. Returns the number of pages.
///
/// # Errors
///
/// Aborts on the first transport error; pages delivered before it are not retracted.
pub async fn chunk<F>(
    transport: &mut dyn DirectoryTransport,
    request: SearchRequest,
    mut callback: F,
) -> Result<usize>
where
    F: FnMut(Vec<Entry>),
{
    let mut search = PagedSearch::new(request);
    while let Some(page) = search.next_page(transport).await? {
        callback(page);
    }
    Ok(search.pages_fetched())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dn::DistinguishedName;
    use crate::transport::{MockDirectoryTransport, SearchPage, SearchScope};
    use dirlink_core::Error;
    use mockall::predicate::eq;

    fn request() -> SearchRequest {
        SearchRequest {
            base_dn: "dc=example,dc=com".to_string(),
            scope: SearchScope::Subtree,
            filter: "(member=cn=foo)".to_string(),
            attributes: Vec::new(),
            page_size: 2,
        }
    }

    fn entry(cn: &str) -> Entry {
        Entry::with_dn(DistinguishedName::parse(format!("cn={cn},dc=example,dc=com")).unwrap())
    }

    fn page(names: &[&str], cookie: Option<&str>) -> SearchPage {
        SearchPage {
            entries: names.iter().map(|name| entry(name)).collect(),
            cookie: cookie.map(|cookie| cookie.as_bytes().to_vec()),
        }
    }

    fn three_page_transport() -> MockDirectoryTransport {
        let mut transport = MockDirectoryTransport::new();
        let mut sequence = mockall::Sequence::new();
        transport
            .expect_search_page()
            .with(eq(request()), eq(None))
            .times(1)
            .in_sequence(&mut sequence)
            .returning(|_, _| Ok(page(&["a", "b"], Some("p2"))));
        transport
            .expect_search_page()
            .with(eq(request()), eq(Some(b"p2".to_vec())))
            .times(1)
            .in_sequence(&mut sequence)
            .returning(|_, _| Ok(page(&["c", "d"], Some("p3"))));
        transport
            .expect_search_page()
            .with(eq(request()), eq(Some(b"p3".to_vec())))
            .times(1)
            .in_sequence(&mut sequence)
            .returning(|_, _| Ok(page(&["e"], Some(""))));
        transport
    }

    #[tokio::test]
    async fn paginate_collects_all_pages() {
        let mut transport = three_page_transport();
        let entries = paginate(&mut transport, request()).await.unwrap();
        let names = entries
            .iter()
            .filter_map(|entry| entry.dn().and_then(DistinguishedName::name))
            .collect::<Vec<_>>();
        assert_eq!(names, vec!["a", "b", "c", "d", "e"]);
    }

    #[tokio::test]
    async fn chunk_calls_back_once_per_page_in_order() {
        let mut transport = three_page_transport();
        let mut seen = Vec::new();
        let pages = chunk(&mut transport, request(), |page| {
            seen.push(page.len());
        })
        .await
        .unwrap();

        assert_eq!(pages, 3);
        assert_eq!(seen, vec![2, 2, 1]);
    }

    #[tokio::test]
    async fn transport_error_aborts_pagination() {
        let mut transport = MockDirectoryTransport::new();
        let mut sequence = mockall::Sequence::new();
        transport
            .expect_search_page()
            .times(1)
            .in_sequence(&mut sequence)
            .returning(|_, _| Ok(page(&["a"], Some("p2"))));
        transport
            .expect_search_page()
            .times(1)
            .in_sequence(&mut sequence)
            .returning(|_, _| Err(Error::transport("search", "server busy")));

        let mut search = PagedSearch::new(request());
        assert!(search.next_page(&mut transport).await.unwrap().is_some());
        let err = search.next_page(&mut transport).await.unwrap_err();
        assert!(matches!(err, Error::Transport { .. }));
        assert!(search.next_page(&mut transport).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn abandon_sends_zero_size_request_with_cookie() {
        let mut transport = MockDirectoryTransport::new();
        let mut sequence = mockall::Sequence::new();
        transport
            .expect_search_page()
            .with(eq(request()), eq(None))
            .times(1)
            .in_sequence(&mut sequence)
            .returning(|_, _| Ok(page(&["a", "b"], Some("p2"))));
        let closing = SearchRequest {
            page_size: 0,
            ..request()
        };
        transport
            .expect_search_page()
            .with(eq(closing), eq(Some(b"p2".to_vec())))
            .times(1)
            .in_sequence(&mut sequence)
            .returning(|_, _| Ok(SearchPage::default()));

        let mut search = PagedSearch::new(request());
        search.next_page(&mut transport).await.unwrap();
        search.abandon(&mut transport).await.unwrap();
        assert!(search.next_page(&mut transport).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn abandon_after_last_page_is_a_no_op() {
        let mut transport = MockDirectoryTransport::new();
        transport
            .expect_search_page()
            .times(1)
            .returning(|_, _| Ok(page(&["a"], None)));

        let mut search = PagedSearch::new(request());
        search.next_page(&mut transport).await.unwrap();
        search.abandon(&mut transport).await.unwrap();
    }
}
