//! FHIR `ConceptMap/$translate` client
//!
//! Copyright (c) 2025 Hubmap Team
//! Licensed under the Apache-2.0 license

use super::TransformCode;
use crate::config::TerminologyConfig;
use crate::{Error, Result};
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use url::Url;

/// Remote code translation
pub trait TranslationClient: Send + Sync {
    /// Translate `code` from the `source` code system into `target`
    ///
    /// A translation the server does not know is a blank code, not an error.
    fn translate(&self, source: &str, code: &str, target: &str) -> Result<TransformCode>;
}

/// FHIR `Parameters` resource
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Parameters {
    #[serde(default)]
    resource_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    #[serde(default)]
    parameter: Option<Vec<Parameter>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Parameter {
    #[serde(default)]
    name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    value_uri: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    value_string: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    value_boolean: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    value_coding: Option<Coding>,
    #[serde(skip_serializing_if = "Option::is_none")]
    part: Option<Vec<Parameter>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Coding {
    system: Option<String>,
    code: Option<String>,
    display: Option<String>,
}

/// Request body for a `$translate` call
pub fn translate_request(source: &str, code: &str, target: &str) -> Value {
    let body = Parameters {
        resource_type: "Parameters".to_string(),
        id: Some("translate".to_string()),
        parameter: Some(vec![
            Parameter {
                name: "source".to_string(),
                value_uri: Some(source.to_string()),
                ..Default::default()
            },
            Parameter {
                name: "target".to_string(),
                value_uri: Some(target.to_string()),
                ..Default::default()
            },
            Parameter {
                name: "code".to_string(),
                value_string: Some(code.to_string()),
                ..Default::default()
            },
        ]),
    };
    serde_json::to_value(body).unwrap_or(Value::Null)
}

/// Extract the translated concept from a `$translate` response
///
/// The first `match` whose `concept` part carries a non-empty code wins.
/// Anything else yields a blank code.
pub fn parse_translate_response(response: &Value) -> TransformCode {
    let parameters = match Parameters::deserialize(response) {
        Ok(parameters) => parameters,
        Err(e) => {
            tracing::debug!(error = %e, "Unexpected $translate response shape");
            return TransformCode::blank();
        }
    };

    let Some(parameter) = parameters.parameter else {
        tracing::trace!("$translate response has no parameter list");
        return TransformCode::blank();
    };

    for p in &parameter {
        match p.name.as_str() {
            "result" => {
                if p.value_boolean == Some(false) {
                    tracing::trace!("Terminology server reported no translation");
                }
            }
            "match" => {
                let concept = p
                    .part
                    .iter()
                    .flatten()
                    .filter(|part| part.name == "concept")
                    .filter_map(|part| part.value_coding.as_ref())
                    .find(|coding| coding.code.as_deref().is_some_and(|c| !c.is_empty()));

                if let Some(coding) = concept {
                    return TransformCode::new(
                        coding.code.clone().unwrap_or_default(),
                        coding.system.clone().unwrap_or_default(),
                        coding.display.clone().unwrap_or_default(),
                    );
                }
            }
            _ => {}
        }
    }

    TransformCode::blank()
}

/// Blocking HTTP client for a FHIR terminology server
pub struct FhirTranslateClient {
    client: Client,
    endpoint: Url,
    credentials: Option<(String, String)>,
}

impl FhirTranslateClient {
    /// Build a client, or `None` when no endpoint is configured
    ///
    /// Must not be called from inside an async runtime.
    pub fn from_config(config: &TerminologyConfig) -> Result<Option<Self>> {
        config.validate()?;
        let Some(endpoint) = config.translate_url()? else {
            return Ok(None);
        };

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Error::Configuration {
                message: format!("Failed to create terminology HTTP client: {}", e),
                source: Some(anyhow::Error::new(e)),
            })?;

        let credentials = config
            .credentials()
            .map(|(user, password)| (user.to_string(), password.to_string()));

        Ok(Some(Self {
            client,
            endpoint,
            credentials,
        }))
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

impl TranslationClient for FhirTranslateClient {
    fn translate(&self, source: &str, code: &str, target: &str) -> Result<TransformCode> {
        tracing::trace!(source, code, target, endpoint = %self.endpoint, "Starting $translate");

        let mut request = self
            .client
            .post(self.endpoint.clone())
            .json(&translate_request(source, code, target));
        if let Some((user, password)) = &self.credentials {
            request = request.basic_auth(user, Some(password));
        }

        let response = request.send()?;
        let status = response.status();
        tracing::trace!(status = status.as_u16(), "$translate responded");

        if !status.is_success() {
            return Err(Error::Http {
                message: format!(
                    "Terminology server returned {} for {}::{} to {}",
                    status, source, code, target
                ),
                status_code: Some(status.as_u16()),
                source: None,
            });
        }

        let body: Value = response.json().map_err(|e| Error::Terminology {
            message: format!("Unreadable $translate response for {}::{}: {}", source, code, e),
            system: Some(target.to_string()),
        })?;
        Ok(parse_translate_response(&body))
    }
}

impl std::fmt::Debug for FhirTranslateClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FhirTranslateClient")
            .field("endpoint", &self.endpoint.as_str())
            .field("authenticated", &self.credentials.is_some())
            .finish()
    }
}
