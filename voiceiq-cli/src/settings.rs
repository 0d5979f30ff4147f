use anyhow::Result;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::{path::Path, path::PathBuf, time::Duration};
use url::Url;

use crate::paths::{config_file, default_store_dir};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Directory holding the persisted identity and session slots
    pub store_dir: PathBuf,
    /// Base URL of the identity provider
    pub provider_endpoint: Url,
    /// Client identifier sent along with every verification request
    pub requester: String,
    /// Client data field sent along with every verification request
    pub request_data: String,
    /// How often to ask the provider for the verification result
    pub poll_interval_ms: u64,
    /// When to give up on a verification request
    pub poll_timeout_ms: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            store_dir: default_store_dir(),
            provider_endpoint: Url::parse("https://mauthn.mukham.in")
                .expect("Valid hardcoded provider URL"),
            requester: "MetaKey".to_string(),
            request_data: "1000".to_string(),
            poll_interval_ms: 5_000,
            poll_timeout_ms: 2 * 60 * 1_000,
        }
    }
}

impl Settings {
    /// Load settings from defaults, the config file and `VOICEIQ__*` environment variables
    pub fn load() -> Result<Self> {
        Self::load_from(&config_file())
    }

    /// Like [`Settings::load`], with the config file at `path` (which may be missing)
    pub fn load_from(path: &Path) -> Result<Self> {
        let s = Config::builder()
            .add_source(Config::try_from(&Settings::default())?)
            .add_source(File::from(path).required(false))
            .add_source(
                Environment::with_prefix("VOICEIQ")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;
        Ok(s.try_deserialize()?)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms)
    }
}
