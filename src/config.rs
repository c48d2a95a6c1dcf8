use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::auth::BasicAuthSettings;

pub const DEFAULT_LISTEN_ADDRESS: &str = "localhost:5050";

/// Settings shared read-only by the listener and every connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProxyConfig {
    pub listen_address: String,

    /// Token expected after `Basic ` in `Proxy-Authorization`. Empty disables authentication.
    pub shared_credential: String,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            listen_address: DEFAULT_LISTEN_ADDRESS.to_string(),
            shared_credential: Default::default(),
        }
    }
}

/// On-disk form of [ProxyConfig]. The credential may be given as user and password instead of a token.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ConfigFile {
    listen_address: Option<String>,
    shared_credential: Option<String>,
    basic_auth: Option<BasicAuthSettings>,
}

impl ProxyConfig {
    pub fn new(listen_address: impl Into<String>, shared_credential: impl Into<String>) -> Self {
        Self {
            listen_address: listen_address.into(),
            shared_credential: shared_credential.into(),
        }
    }

    pub fn auth_enabled(&self) -> bool {
        !self.shared_credential.is_empty()
    }

    pub fn from_yaml(content: &str) -> anyhow::Result<Self> {
        let file: ConfigFile = serde_yaml::from_str(content).context("Parsing config")?;
        let shared_credential = match (file.shared_credential, file.basic_auth) {
            (Some(_), Some(_)) => {
                anyhow::bail!("Only one of shared_credential and basic_auth may be given")
            }
            (Some(c), None) => c,
            (None, Some(settings)) => settings.to_credential(),
            (None, None) => String::new(),
        };

        Ok(Self {
            listen_address: file
                .listen_address
                .unwrap_or_else(|| DEFAULT_LISTEN_ADDRESS.to_string()),
            shared_credential,
        })
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Reading config file {path:?}"))?;
        let config = Self::from_yaml(&content)?;
        log::info!("Configuration loaded from {path:?}");
        Ok(config)
    }
}
