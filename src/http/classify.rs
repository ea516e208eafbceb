//! Classification of transport failures into transient and fatal ones.

use std::error::Error as _;
use std::fmt;

/// What went wrong below the HTTP layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    /// Could not open a connection (refused, DNS, TLS handshake)
    Connect,
    /// The transport's timeout elapsed
    Timeout,
    /// The request could not be sent or the status line was malformed
    Send,
    /// The response body could not be read
    Body,
    /// The connection could not be configured at all
    Setup,
}

/// A failure to exchange a request/response pair with the API host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportError {
    kind: TransportErrorKind,
    message: String,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn kind(&self) -> TransportErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Whether retrying on a fresh connection may succeed.
    pub fn is_transient(&self) -> bool {
        self.kind != TransportErrorKind::Setup
    }
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for TransportError {}

/// Maps a reqwest error onto a [`TransportError`].
///
/// The URL is stripped first: it carries the credentials.
pub fn classify_error(error: reqwest::Error) -> TransportError {
    let kind = if error.is_timeout() {
        TransportErrorKind::Timeout
    } else if error.is_connect() {
        TransportErrorKind::Connect
    } else if error.is_body() || error.is_decode() {
        TransportErrorKind::Body
    } else if error.is_builder() || error.is_redirect() {
        TransportErrorKind::Setup
    } else {
        // Reset connections and unparseable status lines both land here.
        TransportErrorKind::Send
    };

    TransportError::new(kind, describe(&error.without_url()))
}

/// Flattens an error and its sources into one line.
fn describe(error: &reqwest::Error) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
