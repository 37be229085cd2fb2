//! Directory data access for dirlink.
//!
//! This crate maps LDAP entries onto typed models and resolves the relations between them
//! (group membership, managers, nested groups) from attribute conventions. Searches are paged,
//! filters are built from escaped values, and every operation takes an explicit [`Directory`]
//! handle.

#![deny(missing_docs)]

pub mod ad;
pub mod config;
pub mod connection;
pub mod directory;
pub mod dn;
pub mod entry;
pub mod filter;
pub mod model;
pub mod pager;
pub mod query;
pub mod relation;
pub mod transport;

pub use config::{DirectoryConfig, DEFAULT_CONNECTION_TIMEOUT_SECS, DEFAULT_OPERATION_TIMEOUT_SECS};
pub use connection::{LdapConnector, LdapTransport};
pub use directory::Directory;
pub use dn::{Ava, DistinguishedName, DnError};
pub use entry::Entry;
pub use filter::{Filter, FilterValue};
pub use model::{Model, ModelType, Targets};
pub use pager::{PagedSearch, DEFAULT_PAGE_SIZE};
pub use query::Query;
pub use relation::{HasMany, HasManyIn, HasOne, Related};
pub use transport::{DirectoryTransport, Modification, SearchPage, SearchRequest, SearchScope};

/// Convenient result alias that reuses the core error type.
pub type Result<T> = dirlink_core::Result<T>;
