//! Depacketizer configuration.
//!
//! Loaded from TOML, every field optional:
//!
//! ```toml
//! max_frame_bytes = 512
//! anc_data_offset = 12
//! ```

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use smpte291_protocol::payload::{DEFAULT_ANC_DATA_OFFSET, MIN_HEADER_SIZE};

use crate::error::ConfigError;

/// Default capacity of one reassembled caption frame.
pub const DEFAULT_MAX_FRAME_BYTES: usize = 512;

/// Tunables for [`crate::Depacketizer`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DepayConfig {
    /// Upper bound on the bytes collected for one frame.
    pub max_frame_bytes: usize,
    /// Payload bytes preceding the ANC bitstream.
    pub anc_data_offset: usize,
}

impl Default for DepayConfig {
    fn default() -> Self {
        Self {
            max_frame_bytes: DEFAULT_MAX_FRAME_BYTES,
            anc_data_offset: DEFAULT_ANC_DATA_OFFSET,
        }
    }
}

impl DepayConfig {
    /// Default configuration with a custom frame capacity.
    pub fn with_max_frame_bytes(max_frame_bytes: usize) -> Self {
        Self {
            max_frame_bytes,
            ..Self::default()
        }
    }

    /// Parse and validate a TOML document.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: DepayConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Check value ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_frame_bytes == 0 {
            return Err(ConfigError::Invalid(
                "max_frame_bytes must be greater than 0".to_string(),
            ));
        }
        if self.anc_data_offset < MIN_HEADER_SIZE {
            return Err(ConfigError::Invalid(format!(
                "anc_data_offset {} is shorter than the {} byte payload header",
                self.anc_data_offset, MIN_HEADER_SIZE
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = DepayConfig::default();
        assert_eq!(config.max_frame_bytes, 512);
        assert_eq!(config.anc_data_offset, 12);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_document_uses_defaults() {
        let config = DepayConfig::from_toml_str("").unwrap();
        assert_eq!(config, DepayConfig::default());
    }

    #[test]
    fn test_partial_document() {
        let config = DepayConfig::from_toml_str("max_frame_bytes = 1024\n").unwrap();
        assert_eq!(config.max_frame_bytes, 1024);
        assert_eq!(config.anc_data_offset, 12);
    }

    #[test]
    fn test_rejects_zero_capacity() {
        let err = DepayConfig::from_toml_str("max_frame_bytes = 0").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_rejects_short_offset() {
        let err = DepayConfig::from_toml_str("anc_data_offset = 4").unwrap_err();
        assert!(err.to_string().contains("anc_data_offset 4"));
    }

    #[test]
    fn test_rejects_bad_toml() {
        let err = DepayConfig::from_toml_str("max_frame_bytes = \"big\"").unwrap_err();
        assert!(matches!(err, ConfigError::Toml(_)));
    }

    #[test]
    fn test_load_missing_file() {
        let err = DepayConfig::load("/nonexistent/smpte291.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
