//! Configuration types for directory connections.

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;
use url::Url;
use validator::Validate;

use crate::{dn::DistinguishedName, pager::DEFAULT_PAGE_SIZE, Result};

/// Default connection timeout (seconds).
pub const DEFAULT_CONNECTION_TIMEOUT_SECS: u64 = 10;
/// Default operation timeout (seconds).
pub const DEFAULT_OPERATION_TIMEOUT_SECS: u64 = 10;

/// Configuration for connecting to a directory server.
///
/// Can be deserialized (e.g. from a JSON or TOML file) or built with [`DirectoryConfig::new`]
/// and the `with_*` methods. Call [`Validate::validate`] after deserializing.
#[derive(Debug, Deserialize, Validate)]
pub struct DirectoryConfig {
    /// Server URL (`ldap://` or `ldaps://`).
    #[validate(url)]
    url: String,

    /// DN of the service account used for the simple bind.
    #[validate(length(min = 1))]
    bind_dn: String,

    /// Password of the service account.
    bind_password: SecretString,

    /// Base DN for searches that do not set their own.
    base_dn: DistinguishedName,

    /// Default page size for paged searches.
    #[validate(range(min = 1, max = 10000))]
    #[serde(default = "default_page_size")]
    page_size: u32,

    /// Whether to verify TLS certificates.
    #[serde(default = "default_tls_verify")]
    tls_verify: bool,

    /// Optional path to a custom CA certificate (PEM).
    #[serde(default)]
    tls_ca_cert: Option<PathBuf>,

    /// Connection timeout in seconds.
    #[validate(range(min = 1, max = 300))]
    #[serde(default = "default_connection_timeout_secs")]
    connection_timeout_secs: u64,

    /// Per-operation timeout in seconds.
    #[validate(range(min = 1, max = 300))]
    #[serde(default = "default_operation_timeout_secs")]
    operation_timeout_secs: u64,
}

const fn default_page_size() -> u32 {
    DEFAULT_PAGE_SIZE
}

const fn default_tls_verify() -> bool {
    true
}

const fn default_connection_timeout_secs() -> u64 {
    DEFAULT_CONNECTION_TIMEOUT_SECS
}

const fn default_operation_timeout_secs() -> u64 {
    DEFAULT_OPERATION_TIMEOUT_SECS
}

impl DirectoryConfig {
    /// Creates a new directory configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid or validation fails.
    pub fn new(
        url: impl Into<String>,
        bind_dn: impl Into<String>,
        bind_password: impl Into<String>,
        base_dn: DistinguishedName,
    ) -> Result<Self> {
        let url = url.into();
        Url::parse(&url)?;

        let config = Self {
            url,
            bind_dn: bind_dn.into(),
            bind_password: SecretString::from(bind_password.into()),
            base_dn,
            page_size: DEFAULT_PAGE_SIZE,
            tls_verify: default_tls_verify(),
            tls_ca_cert: None,
            connection_timeout_secs: DEFAULT_CONNECTION_TIMEOUT_SECS,
            operation_timeout_secs: DEFAULT_OPERATION_TIMEOUT_SECS,
        };
        config.validate()?;
        Ok(config)
    }

    /// Returns the server URL.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Returns the bind DN.
    #[must_use]
    pub fn bind_dn(&self) -> &str {
        &self.bind_dn
    }

    /// Returns the bind password.
    #[must_use]
    pub fn bind_password(&self) -> &str {
        self.bind_password.expose_secret()
    }

    /// Returns the base distinguished name.
    #[must_use]
    pub const fn base_dn(&self) -> &DistinguishedName {
        &self.base_dn
    }

    /// Returns the default page size.
    #[must_use]
    pub const fn page_size(&self) -> u32 {
        self.page_size
    }

    /// Returns whether TLS certificate verification is enabled.
    #[must_use]
    pub const fn tls_verify(&self) -> bool {
        self.tls_verify
    }

    /// Optional custom CA certificate path.
    #[must_use]
    pub fn tls_ca_cert(&self) -> Option<&PathBuf> {
        self.tls_ca_cert.as_ref()
    }

    /// Returns the connection timeout duration.
    #[must_use]
    pub fn connection_timeout(&self) -> Duration {
        Duration::from_secs(self.connection_timeout_secs)
    }

    /// Returns the operation timeout duration.
    #[must_use]
    pub fn operation_timeout(&self) -> Duration {
        Duration::from_secs(self.operation_timeout_secs)
    }

    /// Overrides the default page size.
    #[must_use]
    pub const fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    /// Enables or disables TLS certificate verification.
    #[must_use]
    pub const fn with_tls_verification(mut self, verify: bool) -> Self {
        self.tls_verify = verify;
        self
    }

    /// Sets the custom CA certificate path for TLS verification.
    #[must_use]
    pub fn with_tls_ca_cert(mut self, path: PathBuf) -> Self {
        self.tls_ca_cert = Some(path);
        self
    }

    /// Overrides the connection timeout in seconds.
    #[must_use]
    pub const fn with_connection_timeout_secs(mut self, seconds: u64) -> Self {
        self.connection_timeout_secs = seconds;
        self
    }

    /// Overrides the operation timeout in seconds.
    #[must_use]
    pub const fn with_operation_timeout_secs(mut self, seconds: u64) -> Self {
        self.operation_timeout_secs = seconds;
        self
    }
}
