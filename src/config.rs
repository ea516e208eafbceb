//! Client configuration.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use log::debug;
use serde::Deserialize;

use crate::error::ConfigError;
use crate::http::{ConnectionSettings, TlsMode};
use crate::path::Credentials;

/// Base URL of the API.
pub const DEFAULT_API_URL: &str = "https://api.digitalocean.com";

/// Retries after the first attempt when the connection fails.
pub const DEFAULT_MAXIMUM_RETRIES: u32 = 2;

/// Validated, immutable client configuration.
///
/// Built with [`ClientConfig::builder`]:
///
/// ```
/// use doapi::ClientConfig;
///
/// let config = ClientConfig::builder("client", "key")
///     .check_cert(false)
///     .maximum_retries(5)
///     .build()
///     .unwrap();
/// assert_eq!(config.maximum_retries(), 5);
/// ```
#[derive(Clone)]
pub struct ClientConfig {
    credentials: Credentials,
    tls: TlsMode,
    maximum_retries: u32,
    debug: bool,
    api_url: String,
    timeout: Option<Duration>,
}

impl ClientConfig {
    pub fn builder(client_id: impl Into<String>, api_key: impl Into<String>) -> ClientConfigBuilder {
        ClientConfigBuilder::new(client_id, api_key)
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    pub fn tls(&self) -> &TlsMode {
        &self.tls
    }

    pub fn maximum_retries(&self) -> u32 {
        self.maximum_retries
    }

    pub fn debug(&self) -> bool {
        self.debug
    }

    /// Base URL without a trailing slash.
    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn connection_settings(&self) -> ConnectionSettings {
        ConnectionSettings {
            tls: self.tls.clone(),
            verbose: self.debug,
            timeout: self.timeout,
        }
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("credentials", &self.credentials)
            .field("tls", &self.tls)
            .field("maximum_retries", &self.maximum_retries)
            .field("debug", &self.debug)
            .field("api_url", &self.api_url)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Builder for [`ClientConfig`]. Certificate verification is on by default.
#[derive(Clone)]
pub struct ClientConfigBuilder {
    client_id: String,
    api_key: String,
    check_cert: bool,
    pemfile: Option<PathBuf>,
    capath: Option<PathBuf>,
    maximum_retries: u32,
    debug: bool,
    api_url: Option<String>,
    timeout: Option<Duration>,
}

impl ClientConfigBuilder {
    fn new(client_id: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            api_key: api_key.into(),
            check_cert: true,
            pemfile: None,
            capath: None,
            maximum_retries: DEFAULT_MAXIMUM_RETRIES,
            debug: false,
            api_url: None,
            timeout: None,
        }
    }

    pub fn check_cert(mut self, check_cert: bool) -> Self {
        self.check_cert = check_cert;
        self
    }

    /// PEM bundle such as `/etc/ssl/certs/ca-certificates.crt`.
    pub fn pemfile(mut self, pemfile: impl Into<PathBuf>) -> Self {
        self.pemfile = Some(pemfile.into());
        self
    }

    /// Directory of PEM certificates such as `/etc/ssl/certs`.
    pub fn capath(mut self, capath: impl Into<PathBuf>) -> Self {
        self.capath = Some(capath.into());
        self
    }

    pub fn maximum_retries(mut self, maximum_retries: u32) -> Self {
        self.maximum_retries = maximum_retries;
        self
    }

    /// Turns on reqwest's wire tracing (`reqwest::connect::verbose` at trace
    /// level). The traced request lines carry the real `client_id` and
    /// `api_key`; this is the only place credentials are ever logged.
    pub fn debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = Some(api_url.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    #[tracing::instrument(skip(self))]
    pub fn build(self) -> Result<ClientConfig, ConfigError> {
        let credentials = Credentials::new(self.client_id, self.api_key)?;

        let tls = if self.check_cert {
            TlsMode::verified(self.pemfile.as_deref(), self.capath.as_deref())?
        } else {
            debug!("Certificate verification disabled");
            TlsMode::Insecure
        };

        let api_url = match self.api_url {
            Some(url) => normalize_api_url(&url)?,
            None => DEFAULT_API_URL.to_string(),
        };

        Ok(ClientConfig {
            credentials,
            tls,
            maximum_retries: self.maximum_retries,
            debug: self.debug,
            api_url,
            timeout: self.timeout,
        })
    }
}

fn normalize_api_url(url: &str) -> Result<String, ConfigError> {
    let trimmed = url.trim_end_matches('/');
    let host = trimmed
        .strip_prefix("https://")
        .or_else(|| trimmed.strip_prefix("http://"));

    match host {
        Some(host) if !host.is_empty() && !host.contains(['?', '#']) => Ok(trimmed.to_string()),
        _ => Err(ConfigError::InvalidApiUrl(url.to_string())),
    }
}

/// Credentials stored on disk for the command line tool.
///
/// ```json
/// { "client_id": "...", "api_key": "..." }
/// ```
#[derive(Debug, Default, Clone, Deserialize)]
pub struct CredentialsFile {
    pub client_id: Option<String>,
    pub api_key: Option<String>,
}

impl CredentialsFile {
    /// `<config dir>/doapi/config.json`, e.g. `~/.config/doapi/config.json`.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("doapi").join("config.json"))
    }

    pub fn load(path: &Path) -> Result<Self> {
        debug!("Loading credentials from {}", path.display());
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))
    }

    /// Loads the file at `path`, or the default file if it exists.
    /// A missing default file yields empty credentials; a missing explicit
    /// file is an error.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => match Self::default_path() {
                Some(path) if path.exists() => Self::load(&path),
                _ => Ok(Self::default()),
            },
        }
    }
}
