//! Configuration validation with range checks.

use crate::error::ConfigError;

use super::Config;

impl Config {
    /// Validate configuration values are within acceptable ranges.
    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if self.endpoint.url.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "endpoint.url must not be empty".into(),
            ));
        }
        if self.endpoint.model.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "endpoint.model must not be empty".into(),
            ));
        }
        if let Some(t) = self.endpoint.temperature {
            if !(0.0..=2.0).contains(&t) {
                return Err(ConfigError::ValidationError(
                    "endpoint.temperature must be between 0.0 and 2.0".into(),
                ));
            }
        }
        if self.image.max_width == 0 || self.image.max_height == 0 {
            return Err(ConfigError::ValidationError(
                "image.max_width and image.max_height must be > 0".into(),
            ));
        }
        if self.batch.parallel == 0 {
            return Err(ConfigError::ValidationError(
                "batch.parallel must be > 0".into(),
            ));
        }
        if self.batch.timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "batch.timeout_ms must be > 0".into(),
            ));
        }
        Ok(())
    }
}
