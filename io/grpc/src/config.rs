//! Response configuration.
//!
//! Loaded from TOML. Every field has a default, so an empty document is a
//! valid configuration:
//!
//! ```toml
//! default_encoding = "identity"
//! accept_encoding = "gzip"
//! reserved_metadata = "log"
//! max_send_message_size = 4194304
//! ```

use crate::encoding::{Encoding, GZIP, IDENTITY};
use crate::frame::MAX_MESSAGE_SIZE;

use serde::Deserialize;
use std::path::Path;

/// What to do with application metadata under the reserved `grpc-` prefix.
///
/// Such entries are always dropped; the policy only decides whether the drop
/// is reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReservedMetadataPolicy {
    /// Drop silently.
    Ignore,
    /// Drop and emit a warning.
    #[default]
    Log,
}

/// Per-response configuration, usually shared by every response of a server.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResponseConfig {
    /// Encoding used for messages until the application picks another.
    #[serde(default = "ResponseConfig::default_encoding")]
    pub default_encoding: String,

    /// Value advertised in `grpc-accept-encoding`.
    #[serde(default = "ResponseConfig::default_accept_encoding")]
    pub accept_encoding: String,

    /// Handling of reserved-prefix headers and trailers.
    #[serde(default)]
    pub reserved_metadata: ReservedMetadataPolicy,

    /// Largest frame, prefix included, that may be written.
    #[serde(default = "ResponseConfig::default_max_send_message_size")]
    pub max_send_message_size: usize,
}

impl Default for ResponseConfig {
    fn default() -> Self {
        Self {
            default_encoding: Self::default_encoding(),
            accept_encoding: Self::default_accept_encoding(),
            reserved_metadata: ReservedMetadataPolicy::default(),
            max_send_message_size: Self::default_max_send_message_size(),
        }
    }
}

impl ResponseConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML document.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        if Encoding::from_name(&config.default_encoding).is_err() {
            return Err(ConfigError::UnsupportedEncoding(config.default_encoding));
        }
        Ok(config)
    }

    fn default_encoding() -> String {
        IDENTITY.to_string()
    }

    fn default_accept_encoding() -> String {
        GZIP.to_string()
    }

    fn default_max_send_message_size() -> usize {
        MAX_MESSAGE_SIZE
    }
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("unsupported default encoding: {0}")]
    UnsupportedEncoding(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_uses_defaults() {
        let config = ResponseConfig::from_toml("").unwrap();
        assert_eq!(config, ResponseConfig::default());
        assert_eq!(config.default_encoding, "identity");
        assert_eq!(config.accept_encoding, "gzip");
        assert_eq!(config.reserved_metadata, ReservedMetadataPolicy::Log);
        assert_eq!(config.max_send_message_size, 4 * 1024 * 1024);
    }

    #[test]
    fn test_overrides() {
        let config = ResponseConfig::from_toml(
            r#"
            default_encoding = "gzip"
            accept_encoding = "gzip,identity"
            reserved_metadata = "ignore"
            max_send_message_size = 1024
            "#,
        )
        .unwrap();

        assert_eq!(config.default_encoding, "gzip");
        assert_eq!(config.accept_encoding, "gzip,identity");
        assert_eq!(config.reserved_metadata, ReservedMetadataPolicy::Ignore);
        assert_eq!(config.max_send_message_size, 1024);
    }

    #[test]
    fn test_unknown_field_rejected() {
        let err = ResponseConfig::from_toml("compression_level = 9").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_unsupported_default_encoding_rejected() {
        let err = ResponseConfig::from_toml(r#"default_encoding = "snappy""#).unwrap_err();
        assert!(matches!(err, ConfigError::UnsupportedEncoding(name) if name == "snappy"));
    }

    #[test]
    fn test_bad_policy_rejected() {
        assert!(ResponseConfig::from_toml(r#"reserved_metadata = "panic""#).is_err());
    }

    #[test]
    fn test_load_missing_file() {
        let err = ResponseConfig::load(Path::new("/nonexistent/grpc-response.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
