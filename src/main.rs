use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use doapi::config::DEFAULT_MAXIMUM_RETRIES;
use doapi::{ClientConfig, CredentialsFile, DigitalOceanApi, ResourceId};
use log::debug;

/// System CA directory used when verification is on and no CA was given.
const SYSTEM_CAPATH: &str = "/etc/ssl/certs";

/// doapi - DigitalOcean API client
///
/// Sends a GET request to an API endpoint and prints the JSON response.
/// Endpoints omit the id placeholders and the leading slash: for
/// /domains/[domain_id]/records/[record_id] pass "domains/records --id 1 --id 2".
///
/// Examples:
///   doapi droplets
///   doapi droplets/reboot --id 42
///   doapi domains/records/new --id 1 -p record_type=A -p data=127.0.0.1
#[derive(Parser, Debug)]
#[command(author, version = env!("DOAPI_VERSION"), about)]
struct Cli {
    /// API endpoint, e.g. "droplets" or "domains/records"
    #[arg(value_name = "ENDPOINT")]
    endpoint: String,

    /// Resource id, in the order the endpoint expects them (repeatable)
    #[arg(long = "id", value_name = "ID")]
    ids: Vec<String>,

    /// Query parameter (repeatable)
    #[arg(long = "param", short = 'p', value_name = "KEY=VALUE", value_parser = parse_param)]
    params: Vec<(String, String)>,

    /// Client id (also via DIGITALOCEAN_CLIENT_ID)
    #[arg(long, env = "DIGITALOCEAN_CLIENT_ID", hide_env_values = true)]
    client_id: Option<String>,

    /// API key (also via DIGITALOCEAN_API_KEY)
    #[arg(long, env = "DIGITALOCEAN_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Credentials file (defaults to <config dir>/doapi/config.json)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Skip certificate verification
    #[arg(long)]
    insecure: bool,

    /// PEM bundle of trusted CA certificates
    #[arg(long, value_name = "PATH")]
    pemfile: Option<PathBuf>,

    /// Directory of trusted CA certificates
    #[arg(long, value_name = "PATH")]
    capath: Option<PathBuf>,

    /// Retries after a failed connection
    #[arg(long = "max-retries", value_name = "N", default_value_t = DEFAULT_MAXIMUM_RETRIES)]
    max_retries: u32,

    /// Request timeout in seconds
    #[arg(long, value_name = "SECONDS")]
    timeout: Option<u64>,

    /// Trace requests on the wire (the trace includes the real credentials)
    #[arg(long)]
    debug: bool,

    /// API URL (defaults to https://api.digitalocean.com)
    #[arg(long = "api-url", value_name = "URL")]
    api_url: Option<String>,
}

fn parse_param(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected KEY=VALUE, got '{}'", s)),
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // reqwest traces wire traffic at trace level under its own target.
    let default_filter = if cli.debug {
        "debug,reqwest::connect::verbose=trace"
    } else {
        "warn"
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    let config = build_config(&cli)?;
    let mut api = DigitalOceanApi::new(config);

    let params: Vec<(&str, &str)> = cli
        .params
        .iter()
        .map(|(k, v)| (k.as_str(), v.as_str()))
        .collect();
    let ids: Vec<ResourceId> = cli.ids.iter().cloned().map(ResourceId::from).collect();

    let response = api.with_session(|api| api.request(&cli.endpoint, &params, &ids))?;
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}

fn build_config(cli: &Cli) -> Result<ClientConfig> {
    let file = if cli.client_id.is_some() && cli.api_key.is_some() {
        CredentialsFile::default()
    } else {
        CredentialsFile::load_or_default(cli.config.as_deref())?
    };

    let client_id = cli
        .client_id
        .clone()
        .or(file.client_id)
        .ok_or_else(|| anyhow!("No client id: pass --client-id or set DIGITALOCEAN_CLIENT_ID"))?;
    let api_key = cli
        .api_key
        .clone()
        .or(file.api_key)
        .ok_or_else(|| anyhow!("No API key: pass --api-key or set DIGITALOCEAN_API_KEY"))?;

    let mut builder = ClientConfig::builder(client_id, api_key)
        .check_cert(!cli.insecure)
        .maximum_retries(cli.max_retries)
        .debug(cli.debug);

    if let Some(pemfile) = &cli.pemfile {
        builder = builder.pemfile(pemfile);
    }
    if let Some(capath) = &cli.capath {
        builder = builder.capath(capath);
    }
    if !cli.insecure && cli.pemfile.is_none() && cli.capath.is_none() {
        let system = Path::new(SYSTEM_CAPATH);
        if system.is_dir() {
            debug!("Using system CA directory {}", SYSTEM_CAPATH);
            builder = builder.capath(system);
        }
    }
    if let Some(url) = &cli.api_url {
        builder = builder.api_url(url);
    }
    if let Some(seconds) = cli.timeout {
        builder = builder.timeout(Duration::from_secs(seconds));
    }

    builder.build().context("Invalid client configuration")
}
