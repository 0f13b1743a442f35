//! Error types for the hubmap core library
//!
//! Only configuration problems abort a conversion call. Everything the engine
//! can recover from is recorded as a [`crate::engine::ConversionIssue`]
//! instead of being raised through this type.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Main error type for hubmap operations
#[derive(Error, Debug)]
pub enum Error {
    /// Missing interpreter, failed interpreter construction or invalid
    /// terminology settings
    #[error("Configuration error: {message}")]
    Configuration {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },

    /// Remote terminology translation failed
    #[error("Terminology error: {message}")]
    Terminology {
        message: String,
        system: Option<String>,
    },

    /// HTTP/Network related errors
    #[error("HTTP error: {message}")]
    Http {
        message: String,
        status_code: Option<u16>,
        #[source]
        source: Option<anyhow::Error>,
    },

    /// JSON parsing and serialization errors
    #[error("JSON error: {message}")]
    Json {
        message: String,
        #[source]
        source: serde_json::Error,
    },

    /// IO errors
    #[error("IO error: {message}")]
    Io {
        message: String,
        #[source]
        source: std::io::Error,
    },

    /// Generic internal error with context
    #[error("Internal error: {message}")]
    Internal {
        message: String,
        #[source]
        source: anyhow::Error,
    },
}

/// Convenience type alias for Results using our Error type
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Shorthand for a configuration error without an underlying cause
    pub fn configuration(message: impl Into<String>) -> Self {
        Error::Configuration {
            message: message.into(),
            source: None,
        }
    }

    /// Whether this error must abort the conversion call it occurred in
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::Configuration { .. })
    }
}

/// Severity levels for recorded conversion issues
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Severity {
    /// Informational, no action required
    Info,
    /// Warning, should be reviewed
    Warning,
    /// Error, part of the value tree was not converted
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Info => write!(f, "info"),
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
        }
    }
}

// Conversion implementations
impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Json {
            message: err.to_string(),
            source: err,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io {
            message: err.to_string(),
            source: err,
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::Http {
            message: err.to_string(),
            status_code: err.status().map(|s| s.as_u16()),
            source: Some(anyhow::Error::new(err)),
        }
    }
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Error::Internal {
            message: err.to_string(),
            source: err,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::configuration("no interpreter for 'HL7.CDA'");
        assert_eq!(
            err.to_string(),
            "Configuration error: no interpreter for 'HL7.CDA'"
        );
    }

    #[test]
    fn test_only_configuration_is_fatal() {
        assert!(Error::configuration("x").is_fatal());

        let err = Error::Terminology {
            message: "endpoint unreachable".to_string(),
            system: Some("LOINC".to_string()),
        };
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Info < Severity::Warning);
        assert!(Severity::Warning < Severity::Error);
        assert_eq!(Severity::Error.to_string(), "error");
    }

    #[test]
    fn test_json_error_conversion() {
        let parse_err = serde_json::from_str::<serde_json::Value>("{ nope").unwrap_err();
        let err: Error = parse_err.into();
        assert!(err.to_string().starts_with("JSON error"));
    }
}
