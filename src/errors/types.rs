//! Error type definitions for the avatar name cache

use thiserror::Error;

/// Top-level error type for the crate
#[derive(Error, Debug)]
pub enum NameCacheError {
    /// File system errors while importing or exporting the cache
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Cache document or lookup payload (de)serialization failures
    #[error("Serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration extraction errors
    #[error("Configuration error: {0}")]
    Figment(#[from] figment::Error),

    /// Configuration validation errors
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// HTTP client errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Lookup service answered with a non-success status
    #[error("Lookup service error: {status} - {url}")]
    LookupStatus { status: u16, url: String },

    /// Malformed lookup URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// HTTP transport constructed outside of a tokio runtime
    #[error("No async runtime available: {0}")]
    Runtime(#[from] tokio::runtime::TryCurrentError),
}

impl NameCacheError {
    /// Create a configuration error
    pub fn configuration<S: Into<String>>(message: S) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Whether the error came from talking to the lookup service
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Http(_) | Self::LookupStatus { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_error_message() {
        let err = NameCacheError::configuration("threshold above ceiling");
        assert_eq!(
            err.to_string(),
            "Configuration error: threshold above ceiling"
        );
        assert!(!err.is_transport());
    }

    #[test]
    fn test_lookup_status_is_transport() {
        let err = NameCacheError::LookupStatus {
            status: 503,
            url: "http://names.example/agents/".to_string(),
        };
        assert!(err.is_transport());
        assert!(err.to_string().contains("503"));
    }
}
