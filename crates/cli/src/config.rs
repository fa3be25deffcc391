//! Client configuration
//!
//! Layered with the `config` crate: built-in defaults, then an optional
//! TOML/JSON file, then `HEPATICA__`-prefixed environment variables
//! (`HEPATICA__API__BASE_URL=https://...`).

use anyhow::Result;
use hepatica_http::ApiClientBuilder;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

/// Main client configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClientConfig {
    /// Prediction API connection settings
    pub api: ApiConfig,
}

/// Prediction API connection settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ApiConfig {
    /// Base URL of the backend, without the `/api` suffix
    pub base_url: String,

    /// Request timeout in seconds
    pub timeout_secs: u64,

    /// Override the default user agent
    #[serde(default)]
    pub user_agent: Option<String>,

    /// Let concurrent expired requests share one token refresh
    pub single_flight_refresh: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            timeout_secs: 30,
            user_agent: None,
            single_flight_refresh: true,
        }
    }
}

impl ApiConfig {
    /// Client builder preloaded with these settings
    pub fn client_builder(&self) -> ApiClientBuilder {
        let mut builder = hepatica_http::ApiClient::builder()
            .base_url(&self.base_url)
            .timeout(Duration::from_secs(self.timeout_secs))
            .single_flight_refresh(self.single_flight_refresh);
        if let Some(user_agent) = &self.user_agent {
            builder = builder.user_agent(user_agent);
        }
        builder
    }
}

impl ClientConfig {
    /// Load configuration from defaults, `file` (when it exists) and the
    /// process environment
    ///
    /// # Errors
    ///
    /// Returns an error if the file or an environment variable cannot be parsed
    pub fn load(file: Option<&Path>) -> Result<Self> {
        Self::load_from(file, None)
    }

    /// Like [`ClientConfig::load`] with an explicit environment map
    fn load_from(file: Option<&Path>, env: Option<HashMap<String, String>>) -> Result<Self> {
        let defaults = Self::default();

        let mut builder = config::Config::builder()
            .set_default("api.base_url", defaults.api.base_url)?
            .set_default("api.timeout_secs", defaults.api.timeout_secs)?
            .set_default(
                "api.single_flight_refresh",
                defaults.api.single_flight_refresh,
            )?;

        if let Some(path) = file {
            builder = builder.add_source(config::File::from(path).required(false));
        }

        let settings = builder
            .add_source(
                config::Environment::with_prefix("HEPATICA")
                    .separator("__")
                    .try_parsing(true)
                    .source(env),
            )
            .build()?;

        Ok(settings.try_deserialize()?)
    }
}
