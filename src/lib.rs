//! A client for the DigitalOcean API (v1).
//!
//! Requests are plain GETs whose query string carries the `client_id` and
//! `api_key` credentials. [`DigitalOceanApi::request`] builds the resource
//! path from an endpoint and ids, retries connection failures, and returns
//! the decoded JSON envelope.

pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod path;

pub use client::{DigitalOceanApi, Session};
pub use config::{ClientConfig, ClientConfigBuilder, CredentialsFile};
pub use error::{ApiError, ConfigError};
pub use path::{Credentials, Endpoint, ResourceId};
