//! Request dispatch with bounded retries.

use std::ops::{Deref, DerefMut};

use log::{debug, warn};
use serde_json::Value;

use crate::config::ClientConfig;
use crate::error::ApiError;
use crate::http::{HttpTransport, RawResponse, Transport};
use crate::path::{Endpoint, ResourceId, display_path, resource_path};

/// Client for the DigitalOcean API.
///
/// Holds one lazily opened connection. A request that fails at the
/// transport level drops the connection and is retried on a fresh one, up
/// to [`ClientConfig::maximum_retries`] times. One request is in flight at a
/// time, which `&mut self` enforces.
///
/// ```no_run
/// use doapi::{ClientConfig, DigitalOceanApi, ResourceId};
///
/// # fn main() -> Result<(), doapi::ApiError> {
/// let config = ClientConfig::builder("client_id", "api_key")
///     .capath("/etc/ssl/certs")
///     .build()?;
/// let mut api = DigitalOceanApi::new(config);
///
/// api.with_session(|api| {
///     let droplets = api.request("droplets", &[], &[])?;
///     println!("{}", droplets["droplets"]);
///     api.request("droplets/reboot", &[], &[ResourceId::from(42)])?;
///     Ok(())
/// })
/// # }
/// ```
pub struct DigitalOceanApi<T: Transport = HttpTransport> {
    config: ClientConfig,
    transport: T,
    retries_count: u32,
}

impl DigitalOceanApi<HttpTransport> {
    pub fn new(config: ClientConfig) -> Self {
        let transport = HttpTransport::new(config.connection_settings());
        Self::with_transport(config, transport)
    }
}

impl<T: Transport> DigitalOceanApi<T> {
    pub fn with_transport(config: ClientConfig, transport: T) -> Self {
        Self {
            config,
            transport,
            retries_count: 0,
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Retries spent by the most recent request. Zero once a response came back.
    pub fn retries_count(&self) -> u32 {
        self.retries_count
    }

    pub fn is_connected(&self) -> bool {
        self.transport.is_connected()
    }

    /// Releases the connection. The next request reconnects.
    pub fn close(&mut self) {
        self.transport.close();
    }

    /// Borrows the client for a scope; the connection is released when the
    /// returned guard is dropped, however the scope ends.
    pub fn session(&mut self) -> Session<'_, T> {
        Session { api: self }
    }

    /// Runs `f` inside a [`session`](Self::session).
    pub fn with_session<R>(&mut self, f: impl FnOnce(&mut Session<'_, T>) -> R) -> R {
        let mut session = self.session();
        f(&mut session)
    }

    /// Performs a GET request and returns the decoded JSON body.
    ///
    /// `endpoint` is the documented route with the id placeholders and the
    /// leading slash removed: `/domains/[domain_id]/records/[record_id]`
    /// becomes `domains/records`, with `ids` supplying the ids in order.
    /// `params` exclude the credentials, which are always appended.
    ///
    /// More ids than segments is rejected before anything is sent. Too few
    /// ids is not detected: the trailing segments go out literally, so
    /// `domains/records/destroy` without ids requests `/domains/records/destroy`.
    #[tracing::instrument(skip(self, params, ids))]
    pub fn request(
        &mut self,
        endpoint: &str,
        params: &[(&str, &str)],
        ids: &[ResourceId],
    ) -> Result<Value, ApiError> {
        let endpoint = Endpoint::parse(endpoint)?;
        let path = resource_path(&endpoint, params, ids, self.config.credentials())?;
        let url = format!("{}{}", self.config.api_url(), path);
        let shown_url = format!(
            "{}{}",
            self.config.api_url(),
            display_path(&endpoint, params, ids)?
        );

        debug!("GET {}", shown_url);

        let response = self.dispatch(&url, &shown_url)?;
        decode(response, shown_url)
    }

    /// Sends `url`, retrying transient failures on a fresh connection.
    fn dispatch(&mut self, url: &str, shown_url: &str) -> Result<RawResponse, ApiError> {
        let maximum_retries = self.config.maximum_retries();
        self.retries_count = 0;

        loop {
            match self.transport.get(url) {
                Ok(response) => {
                    self.retries_count = 0;
                    return Ok(response);
                }
                Err(e) => {
                    self.transport.close();

                    if !e.is_transient() || self.retries_count >= maximum_retries {
                        let attempts = self.retries_count + 1;
                        warn!("GET {}: giving up after {} attempt(s): {}", shown_url, attempts, e);
                        return Err(ApiError::Transport {
                            url: shown_url.to_string(),
                            attempts,
                            message: e.to_string(),
                        });
                    }

                    self.retries_count += 1;
                    warn!(
                        "GET {}: attempt {}/{} failed ({}), retrying...",
                        shown_url,
                        self.retries_count,
                        maximum_retries + 1,
                        e
                    );
                }
            }
        }
    }
}

/// Checks the status line and the `status` field of the envelope.
fn decode(response: RawResponse, url: String) -> Result<Value, ApiError> {
    if response.status != 200 {
        return Err(ApiError::Protocol {
            url,
            status: Some(response.status),
            message: format!("status code: {}", response.status),
        });
    }

    let json: Value = match serde_json::from_str(&response.body) {
        Ok(json) => json,
        Err(e) => {
            debug!("Response is not JSON: {}", e);
            return Err(ApiError::Protocol {
                url,
                status: None,
                message: response.body,
            });
        }
    };

    if json.get("status").and_then(Value::as_str) == Some("OK") {
        return Ok(json);
    }

    let message = ["message", "error_message"]
        .iter()
        .find_map(|key| json.get(key).and_then(Value::as_str))
        .map(str::to_string)
        .unwrap_or(response.body);

    Err(ApiError::Protocol {
        url,
        status: None,
        message,
    })
}

/// Scoped use of a [`DigitalOceanApi`]; closes the connection on drop.
pub struct Session<'a, T: Transport> {
    api: &'a mut DigitalOceanApi<T>,
}

impl<T: Transport> Deref for Session<'_, T> {
    type Target = DigitalOceanApi<T>;

    fn deref(&self) -> &Self::Target {
        self.api
    }
}

impl<T: Transport> DerefMut for Session<'_, T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.api
    }
}

impl<T: Transport> Drop for Session<'_, T> {
    fn drop(&mut self) {
        self.api.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{MockTransport, TransportError, TransportErrorKind};
    use mockall::Sequence;

    const OK_BODY: &str = r#"{"status": "OK", "droplets": []}"#;

    fn config(maximum_retries: u32) -> ClientConfig {
        ClientConfig::builder("abc", "xyz")
            .check_cert(false)
            .maximum_retries(maximum_retries)
            .build()
            .unwrap()
    }

    fn ok(body: &str) -> Result<RawResponse, TransportError> {
        Ok(RawResponse {
            status: 200,
            body: body.to_string(),
        })
    }

    fn reset() -> Result<RawResponse, TransportError> {
        Err(TransportError::new(
            TransportErrorKind::Send,
            "connection reset by peer",
        ))
    }

    #[test]
    fn test_request_sends_credentials() {
        let mut transport = MockTransport::new();
        transport
            .expect_get()
            .withf(|url| {
                url == "https://api.digitalocean.com/domains/1/records/2?foo=bar&client_id=abc&api_key=xyz"
            })
            .times(1)
            .returning(|_| ok(OK_BODY));

        let mut api = DigitalOceanApi::with_transport(config(2), transport);
        let json = api
            .request("domains/records", &[("foo", "bar")], &[1.into(), 2.into()])
            .unwrap();
        assert_eq!(json["status"], "OK");
        assert_eq!(api.retries_count(), 0);
    }

    #[test_log::test]
    fn test_success_after_retries_resets_counter() {
        let mut transport = MockTransport::new();
        let mut calls = 0;
        transport.expect_get().times(3).returning(move |_| {
            calls += 1;
            if calls <= 2 { reset() } else { ok(OK_BODY) }
        });
        transport.expect_close().times(2).return_const(());

        let mut api = DigitalOceanApi::with_transport(config(2), transport);
        api.request("droplets", &[], &[]).unwrap();
        assert_eq!(api.retries_count(), 0);
    }

    #[test_log::test]
    fn test_retries_exhausted() {
        let mut transport = MockTransport::new();
        transport.expect_get().times(4).returning(|_| reset());
        transport.expect_close().times(4).return_const(());

        let mut api = DigitalOceanApi::with_transport(config(3), transport);
        let err = api.request("droplets", &[], &[]).unwrap_err();

        match &err {
            ApiError::Transport {
                url,
                attempts,
                message,
            } => {
                assert_eq!(*attempts, 4);
                assert_eq!(
                    url,
                    "https://api.digitalocean.com/droplets?client_id=[REDACTED]&api_key=[REDACTED]"
                );
                assert!(message.contains("connection reset"));
            }
            other => panic!("expected transport error, got {:?}", other),
        }
        assert!(!err.to_string().contains("xyz"));
        assert_eq!(api.retries_count(), 3);
    }

    #[test]
    fn test_zero_retries() {
        let mut transport = MockTransport::new();
        transport.expect_get().times(1).returning(|_| reset());
        transport.expect_close().times(1).return_const(());

        let mut api = DigitalOceanApi::with_transport(config(0), transport);
        let err = api.request("droplets", &[], &[]).unwrap_err();
        assert!(matches!(err, ApiError::Transport { attempts: 1, .. }));
    }

    #[test]
    fn test_each_request_gets_a_full_retry_budget() {
        let mut transport = MockTransport::new();
        let mut seq = Sequence::new();
        transport
            .expect_get()
            .times(2)
            .in_sequence(&mut seq)
            .returning(|_| reset());
        transport
            .expect_get()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| reset());
        transport
            .expect_get()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| ok(OK_BODY));
        transport.expect_close().return_const(());

        let mut api = DigitalOceanApi::with_transport(config(1), transport);
        assert!(api.request("droplets", &[], &[]).unwrap_err().is_transport());
        assert_eq!(api.retries_count(), 1);

        api.request("droplets", &[], &[]).unwrap();
        assert_eq!(api.retries_count(), 0);
    }

    #[test]
    fn test_setup_failure_is_not_retried() {
        let mut transport = MockTransport::new();
        transport.expect_get().times(1).returning(|_| {
            Err(TransportError::new(
                TransportErrorKind::Setup,
                "failed to set up connection",
            ))
        });
        transport.expect_close().times(1).return_const(());

        let mut api = DigitalOceanApi::with_transport(config(5), transport);
        let err = api.request("droplets", &[], &[]).unwrap_err();
        assert!(matches!(err, ApiError::Transport { attempts: 1, .. }));
    }

    #[test]
    fn test_error_envelope_is_not_retried() {
        let mut transport = MockTransport::new();
        transport
            .expect_get()
            .times(1)
            .returning(|_| ok(r#"{"status": "ERROR", "message": "Access Denied"}"#));

        let mut api = DigitalOceanApi::with_transport(config(2), transport);
        let err = api.request("droplets", &[], &[]).unwrap_err();
        match err {
            ApiError::Protocol {
                url,
                status,
                message,
            } => {
                assert!(url.contains("[REDACTED]"));
                assert!(!url.contains("xyz"));
                assert_eq!(status, None);
                assert_eq!(message, "Access Denied");
            }
            other => panic!("expected protocol error, got {:?}", other),
        }
    }

    #[test]
    fn test_error_message_fallbacks() {
        let cases = [
            (r#"{"status": "ERROR", "error_message": "Not Found"}"#, "Not Found"),
            (r#"{"status": "ERROR"}"#, r#"{"status": "ERROR"}"#),
            (r#"[1, 2]"#, "[1, 2]"),
            ("<html>Bad Gateway</html>", "<html>Bad Gateway</html>"),
        ];

        for (body, expected) in cases {
            let mut transport = MockTransport::new();
            let body = body.to_string();
            transport.expect_get().times(1).returning(move |_| ok(&body));

            let mut api = DigitalOceanApi::with_transport(config(2), transport);
            match api.request("droplets", &[], &[]).unwrap_err() {
                ApiError::Protocol { message, .. } => assert_eq!(message, expected),
                other => panic!("expected protocol error, got {:?}", other),
            }
        }
    }

    #[test]
    fn test_http_status_is_protocol_error() {
        let mut transport = MockTransport::new();
        transport.expect_get().times(1).returning(|_| {
            Ok(RawResponse {
                status: 404,
                body: String::new(),
            })
        });

        let mut api = DigitalOceanApi::with_transport(config(2), transport);
        let err = api.request("droplets", &[], &[]).unwrap_err();
        match err {
            ApiError::Protocol {
                status, message, ..
            } => {
                assert_eq!(status, Some(404));
                assert_eq!(message, "status code: 404");
            }
            other => panic!("expected protocol error, got {:?}", other),
        }
        assert_eq!(api.retries_count(), 0);
    }

    #[test]
    fn test_bad_endpoint_fails_before_sending() {
        let mut transport = MockTransport::new();
        transport.expect_get().never();

        let mut api = DigitalOceanApi::with_transport(config(2), transport);
        let err = api
            .request("droplets", &[], &[1.into(), 2.into()])
            .unwrap_err();
        assert!(err.is_configuration());

        let err = api.request("/droplets", &[], &[]).unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_session_closes_on_success_and_error() {
        let mut transport = MockTransport::new();
        let mut seq = Sequence::new();
        transport
            .expect_get()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| ok(OK_BODY));
        transport
            .expect_close()
            .times(1)
            .in_sequence(&mut seq)
            .return_const(());
        transport
            .expect_get()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| ok(r#"{"status": "ERROR", "message": "nope"}"#));
        transport
            .expect_close()
            .times(1)
            .in_sequence(&mut seq)
            .return_const(());

        let mut api = DigitalOceanApi::with_transport(config(0), transport);

        let first = api.with_session(|s| s.request("droplets", &[], &[]));
        assert!(first.is_ok());

        let second = api.with_session(|s| s.request("droplets", &[], &[]));
        assert!(second.unwrap_err().is_protocol());
    }

    #[test]
    fn test_session_guard_closes_on_drop() {
        let mut transport = MockTransport::new();
        transport.expect_close().times(1).return_const(());
        transport.expect_is_connected().return_const(false);

        let mut api = DigitalOceanApi::with_transport(config(0), transport);
        {
            let session = api.session();
            assert!(!session.is_connected());
        }
    }
}
