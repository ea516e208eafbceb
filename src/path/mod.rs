//! Resource path construction.
//!
//! An endpoint such as `domains/records/destroy` omits the id placeholders
//! that the API documentation shows inline
//! (`/domains/[domain_id]/records/[record_id]/destroy`).
//! The ids are spliced back in by alternating endpoint segments and ids,
//! starting with the first segment:
//!
//! ```
//! use doapi::path::{Endpoint, ResourceId};
//!
//! let endpoint: Endpoint = "domains/records/destroy".parse().unwrap();
//! let ids = [ResourceId::from(1), ResourceId::from(2)];
//! assert_eq!(endpoint.interleave(&ids).unwrap(), "/domains/1/records/2/destroy");
//! ```
//!
//! Two functions build the full path with its query string:
//! [`resource_path`] carries the real credentials and is what goes on the
//! wire, [`display_path`] carries `[REDACTED]` placeholders and is what
//! appears in logs and error messages.

mod interleave;

pub use interleave::{RoundRobin, round_robin};

use std::fmt;
use std::str::FromStr;

use crate::error::ConfigError;

/// Placeholder substituted for credential values in display paths.
pub const REDACTED: &str = "[REDACTED]";

const CLIENT_ID_KEY: &str = "client_id";
const API_KEY_KEY: &str = "api_key";

/// Query-string credentials for the API.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    client_id: String,
    api_key: String,
}

impl Credentials {
    pub fn new(
        client_id: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Result<Self, ConfigError> {
        let client_id = client_id.into();
        let api_key = api_key.into();

        if client_id.is_empty() {
            return Err(ConfigError::MissingClientId);
        }
        if api_key.is_empty() {
            return Err(ConfigError::MissingApiKey);
        }

        Ok(Self { client_id, api_key })
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("client_id", &REDACTED)
            .field("api_key", &REDACTED)
            .finish()
    }
}

/// Identifier of a resource, numeric (`123`) or a slug (`ubuntu-12-04-x64`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceId(String);

impl ResourceId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

macro_rules! resource_id_from_integer {
    ($($t:ty),*) => {
        $(
            impl From<$t> for ResourceId {
                fn from(id: $t) -> Self {
                    Self(id.to_string())
                }
            }
        )*
    };
}

resource_id_from_integer!(u8, u16, u32, u64, u128, usize, i8, i16, i32, i64, i128, isize);

impl From<&str> for ResourceId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for ResourceId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl FromStr for ResourceId {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from(s))
    }
}

/// A parsed endpoint descriptor: slash-separated literal segments without
/// id placeholders and without a leading slash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    raw: String,
    segments: Vec<String>,
}

impl Endpoint {
    pub fn parse(endpoint: &str) -> Result<Self, ConfigError> {
        if endpoint.is_empty() {
            return Err(ConfigError::EmptyEndpoint);
        }

        let segments: Vec<String> = endpoint.split('/').map(str::to_string).collect();
        if segments.iter().any(String::is_empty) {
            return Err(ConfigError::EmptySegment(endpoint.to_string()));
        }

        Ok(Self {
            raw: endpoint.to_string(),
            segments,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Builds the path part (`/segment/id/segment...`) without a query string.
    ///
    /// Every id must follow a segment, so more ids than segments is an error.
    /// Too few ids cannot be detected without knowing the route, so the
    /// segments left over are appended literally.
    pub fn interleave(&self, ids: &[ResourceId]) -> Result<String, ConfigError> {
        if ids.len() > self.segments.len() {
            return Err(ConfigError::TooManyIds {
                endpoint: self.raw.clone(),
                segments: self.segments.len(),
                ids: ids.len(),
            });
        }

        let ids: Vec<String> = ids
            .iter()
            .map(|id| urlencoding::encode(id.as_str()).into_owned())
            .collect();

        let mut path = String::new();
        for part in round_robin([self.segments.clone(), ids]) {
            path.push('/');
            path.push_str(&part);
        }
        Ok(path)
    }
}

impl FromStr for Endpoint {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Builds the path sent on the wire, with the real credentials appended.
pub fn resource_path(
    endpoint: &Endpoint,
    params: &[(&str, &str)],
    ids: &[ResourceId],
    credentials: &Credentials,
) -> Result<String, ConfigError> {
    let client_id = urlencoding::encode(credentials.client_id());
    let api_key = urlencoding::encode(credentials.api_key());
    assemble(endpoint, params, ids, &client_id, &api_key)
}

/// Builds the path shown in logs and errors, with credentials redacted.
pub fn display_path(
    endpoint: &Endpoint,
    params: &[(&str, &str)],
    ids: &[ResourceId],
) -> Result<String, ConfigError> {
    assemble(endpoint, params, ids, REDACTED, REDACTED)
}

/// `client_id` and `api_key` arrive already in their final query form.
fn assemble(
    endpoint: &Endpoint,
    params: &[(&str, &str)],
    ids: &[ResourceId],
    client_id: &str,
    api_key: &str,
) -> Result<String, ConfigError> {
    let mut path = endpoint.interleave(ids)?;

    let mut pairs: Vec<String> = params
        .iter()
        .filter(|(key, _)| *key != CLIENT_ID_KEY && *key != API_KEY_KEY)
        .map(|(key, value)| {
            format!(
                "{}={}",
                urlencoding::encode(key),
                urlencoding::encode(value)
            )
        })
        .collect();
    pairs.push(format!("{}={}", CLIENT_ID_KEY, client_id));
    pairs.push(format!("{}={}", API_KEY_KEY, api_key));

    path.push('?');
    path.push_str(&pairs.join("&"));
    Ok(path)
}
