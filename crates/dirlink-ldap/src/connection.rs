//! `ldap3`-backed directory transport.

use async_trait::async_trait;
use ldap3::{
    controls::{Control, ControlType, PagedResults},
    LdapConnAsync, LdapConnSettings, Mod, Scope, SearchEntry,
};
use native_tls::{Certificate, TlsConnector};
use std::collections::HashSet;
use std::fs;
use std::future::Future;
use std::time::Duration;
use tokio::time::timeout;
use tracing::debug;

use crate::{
    config::DirectoryConfig,
    dn::DistinguishedName,
    entry::Entry,
    transport::{DirectoryTransport, Modification, SearchPage, SearchRequest, SearchScope},
    Result,
};
use dirlink_core::Error;

/// LDAP result code returned when the base object of a search does not exist.
const NO_SUCH_OBJECT: u32 = 32;

impl From<SearchScope> for Scope {
    fn from(scope: SearchScope) -> Self {
        match scope {
            SearchScope::Base => Scope::Base,
            SearchScope::OneLevel => Scope::OneLevel,
            SearchScope::Subtree => Scope::Subtree,
        }
    }
}

/// Opens authenticated LDAP connections from a [`DirectoryConfig`].
pub struct LdapConnector<'a> {
    config: &'a DirectoryConfig,
}

impl<'a> LdapConnector<'a> {
    /// Creates a connector for the given configuration.
    #[must_use]
    pub const fn new(config: &'a DirectoryConfig) -> Self {
        Self { config }
    }

    /// Connects and binds with the configured service account.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigError`] for TLS setup problems, [`Error::Timeout`] when the server
    /// does not answer in time and [`Error::Transport`] when the connection or bind fails.
    pub async fn connect(&self) -> Result<LdapTransport> {
        let settings = build_ldap_settings(self.config)?;
        let (conn, ldap) = LdapConnAsync::with_settings(settings, self.config.url())
            .await
            .map_err(|err| Error::transport("connect", err))?;
        ldap3::drive!(conn);

        let mut transport = LdapTransport {
            inner: ldap,
            operation_timeout: self.config.operation_timeout(),
        };
        transport
            .simple_bind(self.config.bind_dn(), self.config.bind_password())
            .await?;
        debug!(url = self.config.url(), bind_dn = self.config.bind_dn(), "bound to directory");
        Ok(transport)
    }
}

/// Directory transport over an `ldap3` connection.
pub struct LdapTransport {
    inner: ldap3::Ldap,
    operation_timeout: Duration,
}

impl LdapTransport {
    async fn simple_bind(&mut self, dn: &str, password: &str) -> Result<()> {
        let timeout_after = self.operation_timeout;
        let result = with_timeout(timeout_after, "bind", self.inner.simple_bind(dn, password))
            .await?
            .map_err(|err| Error::transport("bind", err))?;
        result
            .success()
            .map_err(|err| Error::transport("bind", err))?;
        Ok(())
    }

    /// Unbinds and closes the connection.
    ///
    /// # Errors
    ///
    /// Returns an error if the unbind request cannot be sent.
    pub async fn unbind(&mut self) -> Result<()> {
        let timeout_after = self.operation_timeout;
        with_timeout(timeout_after, "unbind", self.inner.unbind())
            .await?
            .map_err(|err| Error::transport("unbind", err))
    }
}

#[async_trait]
impl DirectoryTransport for LdapTransport {
    async fn search_page(
        &mut self,
        request: &SearchRequest,
        cookie: Option<Vec<u8>>,
    ) -> Result<SearchPage> {
        let control = PagedResults {
            size: i32::try_from(request.page_size).unwrap_or(i32::MAX),
            cookie: cookie.unwrap_or_default(),
        };
        let timeout_after = self.operation_timeout;
        let search = self.inner.with_controls(control).search(
            &request.base_dn,
            request.scope.into(),
            &request.filter,
            request.attributes.clone(),
        );
        let (entries, result) = with_timeout(timeout_after, "search", search)
            .await?
            .map_err(|err| Error::transport("search", err))?
            .success()
            .map_err(|err| Error::transport("search", err))?;

        let cookie = result.ctrls.iter().find_map(|Control(kind, raw)| {
            matches!(kind, Some(ControlType::PagedResults))
                .then(|| raw.parse::<PagedResults>().cookie)
        });

        Ok(SearchPage {
            entries: entries
                .into_iter()
                .map(|entry| to_entry(SearchEntry::construct(entry)))
                .collect::<Result<Vec<_>>>()?,
            cookie,
        })
    }

    async fn find(&mut self, dn: &str, attributes: &[String]) -> Result<Option<Entry>> {
        let timeout_after = self.operation_timeout;
        let search = self
            .inner
            .search(dn, Scope::Base, "(objectclass=*)", attributes.to_vec());
        let result = with_timeout(timeout_after, "find", search)
            .await?
            .map_err(|err| Error::transport("find", err))?;

        if result.1.rc == NO_SUCH_OBJECT {
            return Ok(None);
        }
        let (entries, _) = result
            .success()
            .map_err(|err| Error::transport("find", err))?;

        entries
            .into_iter()
            .next()
            .map(|entry| to_entry(SearchEntry::construct(entry)))
            .transpose()
    }

    async fn add(&mut self, dn: &str, attributes: &[(String, Vec<Vec<u8>>)]) -> Result<()> {
        let attrs = attributes
            .iter()
            .map(|(name, values)| {
                (
                    name.as_bytes().to_vec(),
                    values.iter().cloned().collect::<HashSet<_>>(),
                )
            })
            .collect::<Vec<_>>();

        let timeout_after = self.operation_timeout;
        with_timeout(timeout_after, "add", self.inner.add(dn, attrs))
            .await?
            .map_err(|err| Error::transport("add", err))?
            .success()
            .map_err(|err| Error::transport("add", err))?;
        Ok(())
    }

    async fn modify(&mut self, dn: &str, modifications: &[Modification]) -> Result<()> {
        let mods = modifications
            .iter()
            .map(|modification| match modification {
                Modification::Add { attribute, values } => {
                    Mod::Add(attribute.as_bytes().to_vec(), value_set(values))
                }
                Modification::Delete { attribute, values } => {
                    Mod::Delete(attribute.as_bytes().to_vec(), value_set(values))
                }
                Modification::Replace { attribute, values } => {
                    Mod::Replace(attribute.as_bytes().to_vec(), value_set(values))
                }
            })
            .collect::<Vec<_>>();

        let timeout_after = self.operation_timeout;
        with_timeout(timeout_after, "modify", self.inner.modify(dn, mods))
            .await?
            .map_err(|err| Error::transport("modify", err))?
            .success()
            .map_err(|err| Error::transport("modify", err))?;
        Ok(())
    }
}

async fn with_timeout<F, T>(duration: Duration, operation: &str, fut: F) -> Result<T>
where
    F: Future<Output = T>,
{
    timeout(duration, fut)
        .await
        .map_err(|_| Error::Timeout(format!("directory {operation} timed out")))
}

fn value_set(values: &[Vec<u8>]) -> HashSet<Vec<u8>> {
    values.iter().cloned().collect()
}

fn to_entry(raw: SearchEntry) -> Result<Entry> {
    let mut entry = Entry::with_dn(DistinguishedName::parse(&raw.dn)?);
    for (name, values) in raw.attrs {
        entry.set(&name, values);
    }
    for (name, values) in raw.bin_attrs {
        entry.set(&name, values);
    }
    Ok(entry)
}

fn build_ldap_settings(config: &DirectoryConfig) -> Result<LdapConnSettings> {
    let mut settings = LdapConnSettings::new().set_conn_timeout(config.connection_timeout());

    if !config.tls_verify() {
        let connector = TlsConnector::builder()
            .danger_accept_invalid_certs(true)
            .build()
            .map_err(|err| {
                Error::ConfigError(format!("failed to construct TLS connector: {err}"))
            })?;
        settings = settings.set_connector(connector).set_no_tls_verify(true);
    } else if let Some(cert_path) = config.tls_ca_cert() {
        let pem = fs::read(cert_path).map_err(|err| {
            Error::ConfigError(format!(
                "failed to read CA certificate {}: {err}",
                cert_path.display()
            ))
        })?;
        let certificate = Certificate::from_pem(&pem)
            .map_err(|err| Error::ConfigError(format!("invalid CA certificate: {err}")))?;
        let connector = TlsConnector::builder()
            .add_root_certificate(certificate)
            .build()
            .map_err(|err| Error::ConfigError(format!("failed to load CA certificate: {err}")))?;
        settings = settings.set_connector(connector);
    }

    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn scope_maps_to_ldap3() {
        assert!(matches!(Scope::from(SearchScope::Base), Scope::Base));
        assert!(matches!(Scope::from(SearchScope::OneLevel), Scope::OneLevel));
        assert!(matches!(Scope::from(SearchScope::Subtree), Scope::Subtree));
    }

    #[test]
    fn search_entries_merge_text_and_binary_attributes() {
        let raw = SearchEntry {
            dn: "CN=jdoe,DC=example,DC=com".to_string(),
            attrs: HashMap::from([(
                "objectClass".to_string(),
                vec!["top".to_string(), "user".to_string()],
            )]),
            bin_attrs: HashMap::from([("objectSid".to_string(), vec![vec![1, 0, 0, 0]])]),
        };

        let entry = to_entry(raw).unwrap();
        assert_eq!(entry.object_classes(), vec!["top", "user"]);
        assert_eq!(entry.first("objectsid"), Some(&[1, 0, 0, 0][..]));
        assert_eq!(
            entry.dn().map(DistinguishedName::normalized),
            Some("cn=jdoe,dc=example,dc=com")
        );
    }

    #[test]
    fn rejects_unparseable_dn() {
        let raw = SearchEntry {
            dn: "garbage".to_string(),
            attrs: HashMap::new(),
            bin_attrs: HashMap::new(),
        };
        assert!(matches!(to_entry(raw), Err(Error::InvalidDn(_))));
    }
}
