//! Error types returned by the API client.

use std::path::PathBuf;

use thiserror::Error;

/// Reasons a client or a request could not be constructed.
///
/// These are raised before any network activity takes place.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("client_id must not be empty")]
    MissingClientId,

    #[error("api_key must not be empty")]
    MissingApiKey,

    #[error("certificate verification requires a pemfile or a capath")]
    MissingCaMaterial,

    #[error("failed to read CA material from {}: {source}", .path.display())]
    UnreadableCa {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid CA certificate in {}: {reason}", .path.display())]
    InvalidCa { path: PathBuf, reason: String },

    #[error("no certificates found in CA directory {}", .path.display())]
    EmptyCaDirectory { path: PathBuf },

    #[error("invalid API URL '{0}': expected an http or https base URL")]
    InvalidApiUrl(String),

    #[error("endpoint must not be empty")]
    EmptyEndpoint,

    #[error("endpoint '{0}' contains an empty path segment")]
    EmptySegment(String),

    #[error("endpoint '{endpoint}' has {segments} segment(s) but {ids} id(s) were given")]
    TooManyIds {
        endpoint: String,
        segments: usize,
        ids: usize,
    },
}

/// The error type for every operation of [`DigitalOceanApi`](crate::DigitalOceanApi).
///
/// `Transport` failures have already been retried by the time they reach the
/// caller; `Protocol` failures are never retried.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Configuration(#[from] ConfigError),

    #[error("{url} -- {message}")]
    Transport {
        /// Full request URL with credentials redacted.
        url: String,
        /// Number of attempts made, including the first.
        attempts: u32,
        message: String,
    },

    #[error("While getting {url}, DigitalOcean reported an error:\n\t\"{message}\"")]
    Protocol {
        /// Full request URL with credentials redacted.
        url: String,
        /// HTTP status code, when the failure came from the status line.
        status: Option<u16>,
        message: String,
    },
}

impl ApiError {
    pub fn is_configuration(&self) -> bool {
        matches!(self, ApiError::Configuration(_))
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, ApiError::Transport { .. })
    }

    pub fn is_protocol(&self) -> bool {
        matches!(self, ApiError::Protocol { .. })
    }

    /// Whether a later, identical request could succeed.
    ///
    /// Only transport failures qualify; the client has already exhausted its
    /// own retries for them.
    pub fn is_retryable(&self) -> bool {
        self.is_transport()
    }

    /// The redacted URL the error refers to, if any.
    pub fn redacted_url(&self) -> Option<&str> {
        match self {
            ApiError::Configuration(_) => None,
            ApiError::Transport { url, .. } | ApiError::Protocol { url, .. } => Some(url),
        }
    }
}
