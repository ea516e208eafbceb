//! Certificate authority material for verifying the API host.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use log::debug;
use reqwest::Certificate;

use crate::error::ConfigError;

/// How the server certificate is checked.
#[derive(Clone)]
pub enum TlsMode {
    /// Accept any certificate.
    Insecure,
    /// Verify against these roots only.
    Verified(Vec<Certificate>),
}

impl TlsMode {
    /// Loads roots from a PEM bundle, a directory of PEM files, or both.
    ///
    /// Passing neither is an error: verification needs something to verify
    /// against.
    pub fn verified(pemfile: Option<&Path>, capath: Option<&Path>) -> Result<Self, ConfigError> {
        if pemfile.is_none() && capath.is_none() {
            return Err(ConfigError::MissingCaMaterial);
        }

        let mut roots = Vec::new();
        if let Some(pemfile) = pemfile {
            roots.extend(load_pem_file(pemfile)?);
        }
        if let Some(capath) = capath {
            roots.extend(load_ca_dir(capath)?);
        }

        debug!("Loaded {} CA certificate(s)", roots.len());
        Ok(TlsMode::Verified(roots))
    }

    pub fn is_verified(&self) -> bool {
        matches!(self, TlsMode::Verified(_))
    }

    pub fn root_count(&self) -> usize {
        match self {
            TlsMode::Insecure => 0,
            TlsMode::Verified(roots) => roots.len(),
        }
    }
}

impl fmt::Debug for TlsMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TlsMode::Insecure => f.write_str("Insecure"),
            TlsMode::Verified(roots) => write!(f, "Verified({} roots)", roots.len()),
        }
    }
}

fn load_pem_file(path: &Path) -> Result<Vec<Certificate>, ConfigError> {
    let bytes = fs::read(path).map_err(|source| ConfigError::UnreadableCa {
        path: path.to_path_buf(),
        source,
    })?;
    parse_bundle(path, &bytes)
}

fn parse_bundle(path: &Path, bytes: &[u8]) -> Result<Vec<Certificate>, ConfigError> {
    let certs = Certificate::from_pem_bundle(bytes).map_err(|e| ConfigError::InvalidCa {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    if certs.is_empty() {
        return Err(ConfigError::InvalidCa {
            path: path.to_path_buf(),
            reason: "no PEM certificates found".to_string(),
        });
    }
    Ok(certs)
}

/// Directories such as `/etc/ssl/certs` mix certificates with other files,
/// so entries that fail to parse are skipped. An empty result is an error.
fn load_ca_dir(dir: &Path) -> Result<Vec<Certificate>, ConfigError> {
    let unreadable = |source| ConfigError::UnreadableCa {
        path: dir.to_path_buf(),
        source,
    };

    let mut files: Vec<PathBuf> = fs::read_dir(dir)
        .map_err(unreadable)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            matches!(
                path.extension().and_then(|ext| ext.to_str()),
                Some("pem" | "crt")
            )
        })
        .collect();
    files.sort();

    let mut roots = Vec::new();
    for file in files {
        match load_pem_file(&file) {
            Ok(certs) => roots.extend(certs),
            Err(e) => debug!("Skipping {}: {}", file.display(), e),
        }
    }

    if roots.is_empty() {
        return Err(ConfigError::EmptyCaDirectory {
            path: dir.to_path_buf(),
        });
    }
    Ok(roots)
}
