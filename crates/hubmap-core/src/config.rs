//! Terminology service configuration
//!
//! Settings come from, in increasing precedence:
//! - Default values
//! - Configuration files (any serde format)
//! - Environment variables, optionally loaded from a `.env` file

use crate::terminology::cache::DEFAULT_CAPACITY;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

pub const ENV_ENABLED: &str = "HUBMAP_TERMINOLOGY_ENABLED";
pub const ENV_URL: &str = "HUBMAP_TERMINOLOGY_URL";
pub const ENV_USERNAME: &str = "HUBMAP_TERMINOLOGY_USERNAME";
pub const ENV_PASSWORD: &str = "HUBMAP_TERMINOLOGY_PASSWORD";
pub const ENV_TIMEOUT_SECS: &str = "HUBMAP_TERMINOLOGY_TIMEOUT_SECS";
pub const ENV_CACHE_CAPACITY: &str = "HUBMAP_TERMINOLOGY_CACHE_CAPACITY";

const TRANSLATE_PATH: &str = "ConceptMap/$translate";

/// Remote terminology settings
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TerminologyConfig {
    /// Whether remote translation is attempted at all
    pub enabled: bool,

    /// Base URL of the FHIR terminology server
    pub base_url: Option<String>,

    /// Basic auth user, used only together with `password`
    pub username: Option<String>,

    pub password: Option<String>,

    /// Request timeout in seconds
    pub timeout_secs: u64,

    /// Maximum number of cached translations
    pub cache_capacity: usize,
}

impl Default for TerminologyConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            base_url: None,
            username: None,
            password: None,
            timeout_secs: 30,
            cache_capacity: DEFAULT_CAPACITY,
        }
    }
}

impl fmt::Debug for TerminologyConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TerminologyConfig")
            .field("enabled", &self.enabled)
            .field("base_url", &self.base_url)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("timeout_secs", &self.timeout_secs)
            .field("cache_capacity", &self.cache_capacity)
            .finish()
    }
}

impl TerminologyConfig {
    /// Defaults overridden by the process environment and a `.env` file
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();
        let mut config = Self::default();
        config.merge_with(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Apply overrides from `lookup`, keyed by the `HUBMAP_TERMINOLOGY_*` names
    pub fn merge_with<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(enabled) = lookup(ENV_ENABLED) {
            self.enabled = parse_flag(ENV_ENABLED, &enabled)?;
        }

        if let Some(url) = lookup(ENV_URL) {
            self.base_url = non_empty(url);
        }

        if let Some(username) = lookup(ENV_USERNAME) {
            self.username = non_empty(username);
        }

        if let Some(password) = lookup(ENV_PASSWORD) {
            self.password = non_empty(password);
        }

        if let Some(timeout) = lookup(ENV_TIMEOUT_SECS) {
            self.timeout_secs = parse_number(ENV_TIMEOUT_SECS, &timeout)?;
        }

        if let Some(capacity) = lookup(ENV_CACHE_CAPACITY) {
            self.cache_capacity = parse_number(ENV_CACHE_CAPACITY, &capacity)?;
        }

        Ok(())
    }

    /// Check that the settings can be used to build a client
    pub fn validate(&self) -> Result<()> {
        if let Some(base) = &self.base_url {
            let url = Url::parse(base).map_err(|e| Error::Configuration {
                message: format!("Invalid terminology URL '{}'", base),
                source: Some(anyhow::Error::new(e)),
            })?;
            if !matches!(url.scheme(), "http" | "https") {
                return Err(Error::configuration(format!(
                    "Terminology URL must use http or https, got '{}'",
                    url.scheme()
                )));
            }
        }

        if self.timeout_secs == 0 {
            return Err(Error::configuration("Terminology timeout must be at least one second"));
        }

        if self.cache_capacity == 0 {
            return Err(Error::configuration("Terminology cache capacity must be positive"));
        }

        Ok(())
    }

    /// Full `$translate` endpoint, when a base URL is configured
    pub fn translate_url(&self) -> Result<Option<Url>> {
        let Some(base) = &self.base_url else {
            return Ok(None);
        };
        let joined = format!("{}/{}", base.trim_end_matches('/'), TRANSLATE_PATH);
        Url::parse(&joined)
            .map(Some)
            .map_err(|e| Error::Configuration {
                message: format!("Invalid terminology URL '{}'", joined),
                source: Some(anyhow::Error::new(e)),
            })
    }

    /// Basic auth pair when both parts are set and non-empty
    pub fn credentials(&self) -> Option<(&str, &str)> {
        match (self.username.as_deref(), self.password.as_deref()) {
            (Some(user), Some(password)) if !user.is_empty() && !password.is_empty() => {
                Some((user, password))
            }
            _ => None,
        }
    }
}

fn non_empty(value: String) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn parse_flag(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" | "" => Ok(false),
        other => Err(Error::configuration(format!(
            "{} must be a boolean, got '{}'",
            key, other
        ))),
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value.trim().parse().map_err(|_| {
        Error::configuration(format!("{} must be a positive number, got '{}'", key, value))
    })
}
