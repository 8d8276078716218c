use std::{env, net::SocketAddr, path::PathBuf, time::Duration};

use anyhow::{Context as _, Result};

/// Service configuration, read once at startup from the environment.
///
/// Every variable has a default suitable for a local development setup, so
/// `from_env` only fails on values that are present but malformed.
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the editor service (package retrieval and upload).
    pub editor_base_url: String,
    /// Base URL of the signing service (sign and validate calls).
    pub sign_base_url: String,
    /// Scratch root under which per-request working directories are created.
    pub tmp_dir: PathBuf,
    /// Signing key material handed to the external services.
    pub keys: KeyMaterial,
    /// Address the HTTP front-end listens on.
    pub listen_addr: SocketAddr,
    /// Bound on every outbound service call.
    pub request_timeout: Duration,
}

/// Paths to the key files forwarded to the sign/validate collaborators.
#[derive(Debug, Clone)]
pub struct KeyMaterial {
    pub public_key: PathBuf,
    pub private_key: PathBuf,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let editor_base_url = env::var("EDITOR_API_BASE").unwrap_or_else(|_| {
            let protocol = env::var("API_PROTOCOL").unwrap_or_else(|_| "http".to_owned());
            let host = env::var("API_HOST").unwrap_or_else(|_| "localhost".to_owned());
            let port = env::var("API_PORT").unwrap_or_else(|_| "8080".to_owned());
            format!("{protocol}://{host}:{port}/exist/restxq")
        });

        let sign_base_url =
            env::var("SIGN_API_BASE").unwrap_or_else(|_| "http://localhost:8082".to_owned());

        let tmp_dir = env::var("DS_TMP_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./tmp"));

        let keys = KeyMaterial {
            public_key: env::var("DS_PUBLIC_KEY")
                .map(PathBuf::from)
                .unwrap_or_else(|_| ["sig_keys", "id.public"].iter().collect()),
            private_key: env::var("DS_PRIVATE_KEY")
                .map(PathBuf::from)
                .unwrap_or_else(|_| ["sig_keys", "id.private"].iter().collect()),
        };

        let listen_addr = env::var("DS_LISTEN_ADDR")
            .unwrap_or_else(|_| "0.0.0.0:9003".to_owned())
            .parse()
            .context("DS_LISTEN_ADDR is not a valid socket address")?;

        let request_timeout = env::var("DS_REQUEST_TIMEOUT_SECS")
            .map(|v| v.parse::<u64>())
            .unwrap_or(Ok(120))
            .context("DS_REQUEST_TIMEOUT_SECS is not a valid integer")
            .map(Duration::from_secs)?;

        Ok(Config {
            editor_base_url,
            sign_base_url,
            tmp_dir,
            keys,
            listen_addr,
            request_timeout,
        })
    }
}
