//! HTTP transport with connection lifecycle and error classification.

mod classify;
mod tls;
mod transport;

pub use classify::{TransportError, TransportErrorKind, classify_error};
pub use tls::TlsMode;
#[cfg(test)]
pub use transport::MockTransport;
pub use transport::{ConnectionSettings, HttpTransport, RawResponse, Transport, USER_AGENT};
