use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

use rocket::figment::{
    providers::{Env, Serialized},
    Figment,
};
use serde::{Deserialize, Serialize};

use super::{push::BackoffPolicy, Result};

const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8000";

/// File under the data directory holding the generated computer ID.
const COMPUTER_ID_FILE: &str = "computer_id";

/// Client configuration, read from `QNA_*` environment variables.
/// Nested keys use a double underscore, e.g. `QNA_BACKOFF__MAX_ATTEMPTS=5`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Where the server lives, without a trailing slash.
    pub base_url: String,
    /// This device's identity. When unset, one is generated on first use and
    /// kept in `data_dir`.
    #[serde(default)]
    pub computer_id: Option<String>,
    /// Where the client keeps its state. Defaults to `qna` under the
    /// platform's local data directory.
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
    /// How the push channel reconnects.
    #[serde(default)]
    pub backoff: BackoffPolicy,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            computer_id: None,
            data_dir: None,
            backoff: BackoffPolicy::default(),
        }
    }
}

impl ClientConfig {
    /// Defaults overlaid with the environment.
    pub fn figment() -> Figment {
        Figment::from(Serialized::defaults(Self::default()))
            .merge(Env::prefixed("QNA_").split("__"))
    }

    pub fn load() -> Result<Self> {
        Ok(Self::figment().extract()?)
    }

    pub fn data_dir(&self) -> PathBuf {
        match &self.data_dir {
            Some(dir) => dir.clone(),
            None => dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("qna"),
        }
    }

    /// The computer ID this device registers with. A configured ID wins;
    /// otherwise the one saved by an earlier run is reused, and the very
    /// first run generates and saves one.
    pub fn computer_id(&self) -> Result<String> {
        if let Some(computer_id) = &self.computer_id {
            return Ok(computer_id.clone());
        }

        let dir = self.data_dir();
        let path = dir.join(COMPUTER_ID_FILE);
        match fs::read_to_string(&path) {
            Ok(saved) if !saved.trim().is_empty() => return Ok(saved.trim().to_string()),
            Ok(_) => warn!("{} is empty, generating a new computer ID", path.display()),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        let computer_id = format!("{:016x}", rand::random::<u64>());
        fs::create_dir_all(&dir)?;
        fs::write(&path, &computer_id)?;
        info!("Saved new computer ID {computer_id} to {}", path.display());
        Ok(computer_id)
    }
}
