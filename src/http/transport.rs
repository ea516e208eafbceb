//! The connection to the API host.

use std::time::Duration;

use log::debug;
use reqwest::blocking::Client;

use super::classify::{TransportError, TransportErrorKind, classify_error};
use super::tls::TlsMode;

/// User-Agent sent with every request.
pub const USER_AGENT: &str = concat!("doapi/", env!("DOAPI_VERSION"));

/// Status line and body of a response, before any interpretation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub body: String,
}

/// A single reusable connection to the API host.
///
/// Implementations connect lazily on the first `get` and must drop the
/// connection when `get` fails, so that the next call starts afresh.
#[cfg_attr(test, mockall::automock)]
pub trait Transport {
    fn get(&mut self, url: &str) -> Result<RawResponse, TransportError>;

    /// Releases the connection. Calling this while disconnected is a no-op.
    fn close(&mut self);

    fn is_connected(&self) -> bool;
}

/// Settings used every time [`HttpTransport`] (re)connects.
#[derive(Debug, Clone)]
pub struct ConnectionSettings {
    pub tls: TlsMode,
    /// Trace the raw wire traffic through the `log` facade.
    pub verbose: bool,
    pub timeout: Option<Duration>,
}

/// [`Transport`] backed by a blocking reqwest client.
pub struct HttpTransport {
    settings: ConnectionSettings,
    client: Option<Client>,
}

impl HttpTransport {
    pub fn new(settings: ConnectionSettings) -> Self {
        Self {
            settings,
            client: None,
        }
    }

    fn connect(&self) -> Result<Client, TransportError> {
        debug!("Opening connection ({:?})", self.settings.tls);

        let mut builder = Client::builder()
            .user_agent(USER_AGENT)
            .pool_max_idle_per_host(1)
            .connection_verbose(self.settings.verbose);

        if let Some(timeout) = self.settings.timeout {
            builder = builder.timeout(timeout);
        }

        builder = match &self.settings.tls {
            TlsMode::Insecure => builder.danger_accept_invalid_certs(true),
            TlsMode::Verified(roots) => roots
                .iter()
                .cloned()
                .fold(builder.tls_built_in_root_certs(false), |b, root| {
                    b.add_root_certificate(root)
                }),
        };

        builder.build().map_err(|e| {
            TransportError::new(
                TransportErrorKind::Setup,
                format!("failed to set up connection: {}", e),
            )
        })
    }
}

impl Transport for HttpTransport {
    fn get(&mut self, url: &str) -> Result<RawResponse, TransportError> {
        // Taken out for the duration of the call; only a completed exchange
        // puts it back.
        let client = match self.client.take() {
            Some(client) => client,
            None => self.connect()?,
        };

        let response = client.get(url).send().map_err(classify_error)?;
        let status = response.status().as_u16();
        let body = response.text().map_err(classify_error)?;

        self.client = Some(client);
        Ok(RawResponse { status, body })
    }

    fn close(&mut self) {
        if self.client.take().is_some() {
            debug!("Connection closed");
        }
    }

    fn is_connected(&self) -> bool {
        self.client.is_some()
    }
}
