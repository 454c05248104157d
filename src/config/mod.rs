//! Service configuration.
//!
//! Loaded once at start-up, from the process environment or from JSON.

use serde::Deserialize;
use std::env;
use std::time::Duration;
use strum_macros::{Display, EnumString};
use thiserror::Error;

const DEFAULT_SHUTDOWN_TIMEOUT_SECS: u64 = 10;

/// Deployment environment.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize, Display, EnumString,
)]
#[serde(try_from = "String")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Environment {
    #[default]
    Development,
    Test,
    Production,
}

// JSON goes through the same case-insensitive parser as `ENV`.
impl TryFrom<String> for Environment {
    type Error = strum::ParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing environment variable {0}")]
    Missing(&'static str),

    #[error("invalid value {value:?} for {name}")]
    Invalid { name: &'static str, value: String },

    #[error("invalid configuration document: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AppConfig {
    pub service_name: String,
    #[serde(default)]
    pub environment: Environment,
    #[serde(default = "default_shutdown_timeout_secs")]
    pub shutdown_timeout_secs: u64,
}

fn default_shutdown_timeout_secs() -> u64 {
    DEFAULT_SHUTDOWN_TIMEOUT_SECS
}

impl AppConfig {
    /// Read `SERVICE_NAME`, `ENV` and `SHUTDOWN_TIMEOUT_SECS` from the process
    /// environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(env::vars())
    }

    /// Same as [`from_env`](Self::from_env), over explicit variables.
    pub fn from_vars<I, K, V>(vars: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut service_name = None;
        let mut environment = Environment::default();
        let mut shutdown_timeout_secs = DEFAULT_SHUTDOWN_TIMEOUT_SECS;

        for (key, value) in vars {
            match key.as_ref() {
                "SERVICE_NAME" => service_name = Some(value.into()),
                "ENV" => {
                    let value = value.into();
                    environment = value
                        .parse()
                        .map_err(|_| ConfigError::Invalid { name: "ENV", value })?;
                }
                "SHUTDOWN_TIMEOUT_SECS" => {
                    let value = value.into();
                    shutdown_timeout_secs = value.parse().map_err(|_| ConfigError::Invalid {
                        name: "SHUTDOWN_TIMEOUT_SECS",
                        value,
                    })?;
                }
                _ => {}
            }
        }

        let service_name = service_name
            .filter(|name: &String| !name.is_empty())
            .ok_or(ConfigError::Missing("SERVICE_NAME"))?;

        Ok(Self {
            service_name,
            environment,
            shutdown_timeout_secs,
        })
    }

    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}
