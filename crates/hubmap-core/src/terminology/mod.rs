//! Terminology (code-system) translation
//!
//! Codes carried by business elements are remapped between the code system
//! of a message model and the vocabulary of the business element. Results are
//! cached process-wide; a pre-populated cache can replay translations with the
//! remote service switched off.
//!
//! Copyright (c) 2025 Hubmap Team
//! Licensed under the Apache-2.0 license

pub mod cache;
pub mod client;

pub use cache::{CacheStats, TerminologyCache};
pub use client::{parse_translate_response, translate_request, FhirTranslateClient, TranslationClient};

use crate::config::TerminologyConfig;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Result of a code translation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransformCode {
    pub code: String,
    pub system: String,
    pub display_name: String,
}

impl TransformCode {
    pub fn new(code: impl Into<String>, system: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            system: system.into(),
            display_name: display_name.into(),
        }
    }

    /// No translation available
    pub fn blank() -> Self {
        Self::default()
    }

    pub fn is_blank(&self) -> bool {
        self.code.is_empty()
    }
}

/// Cache key: source system, code and target system
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheKey {
    pub source: String,
    pub code: String,
    pub target: String,
}

impl CacheKey {
    pub fn new(source: impl Into<String>, code: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            code: code.into(),
            target: target.into(),
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}::{}", self.source, self.code, self.target)
    }
}

/// Code translation with caching and offline replay
pub struct TerminologyService {
    enabled: bool,
    cache: Arc<TerminologyCache>,
    client: Option<Arc<dyn TranslationClient>>,
}

impl TerminologyService {
    /// Build from configuration with a fresh cache of the configured capacity
    pub fn from_config(config: &TerminologyConfig) -> Result<Self> {
        let cache = Arc::new(TerminologyCache::new(config.cache_capacity));
        Self::with_cache(config, cache)
    }

    /// Build from configuration sharing an existing cache
    pub fn with_cache(config: &TerminologyConfig, cache: Arc<TerminologyCache>) -> Result<Self> {
        let client = if config.enabled {
            FhirTranslateClient::from_config(config)?
                .map(|c| Arc::new(c) as Arc<dyn TranslationClient>)
        } else {
            config.validate()?;
            None
        };
        if config.enabled && client.is_none() {
            log::warn!("Terminology enabled without an endpoint; codes pass through unchanged");
        }

        Ok(Self {
            enabled: config.enabled,
            cache,
            client,
        })
    }

    /// Remote translation through `client`
    pub fn with_client(client: Arc<dyn TranslationClient>, cache: Arc<TerminologyCache>) -> Self {
        Self {
            enabled: true,
            cache,
            client: Some(client),
        }
    }

    /// No remote translation; answers only from `cache` when it holds entries
    pub fn offline(cache: Arc<TerminologyCache>) -> Self {
        Self {
            enabled: false,
            cache,
            client: None,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn cache(&self) -> &Arc<TerminologyCache> {
        &self.cache
    }

    /// Translate `code` from `source` into `target`
    ///
    /// Never fails: remote problems are logged and answered with a blank code.
    pub fn transform(&self, source: &str, code: &str, target: &str) -> TransformCode {
        if !source.is_empty() && source == target {
            log::trace!("Same code system {}, nothing to translate", source);
            return TransformCode::blank();
        }

        let complete = !source.is_empty() && !code.is_empty() && !target.is_empty();
        if let (true, true, Some(client)) = (self.enabled, complete, &self.client) {
            let key = CacheKey::new(source, code, target);
            if let Some(hit) = self.cache.get(&key) {
                log::trace!("Terminology cache hit {}", key);
                return hit;
            }

            return match client.translate(source, code, target) {
                Ok(result) => {
                    log::trace!("Caching translation {} -> '{}'", key, result.code);
                    self.cache.insert(key, result.clone());
                    result
                }
                Err(e) => {
                    log::error!("Unable to translate {}: {}", key, e);
                    TransformCode::blank()
                }
            };
        }

        if !self.enabled && !self.cache.is_empty() {
            let key = CacheKey::new(source, code, target);
            return self.cache.get(&key).unwrap_or_else(|| {
                log::trace!("No cached translation for {}", key);
                TransformCode::blank()
            });
        }

        TransformCode::new(code, "", "")
    }
}

impl fmt::Debug for TerminologyService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TerminologyService")
            .field("enabled", &self.enabled)
            .field("cached", &self.cache.len())
            .field("remote", &self.client.is_some())
            .finish()
    }
}
