// Configuration validation

use crate::{ConfigError, Result};

/// Implemented by typed settings loaded through [`ConfigManager::load_validated`](crate::ConfigManager::load_validated).
pub trait Validate {
    fn validate(&self) -> Result<()>;
}

/// Reusable checks for [`Validate`] implementations.
pub struct ConfigValidator;

impl ConfigValidator {
    pub fn not_empty(value: &str, field: &str) -> Result<()> {
        if value.trim().is_empty() {
            return Err(ConfigError::ValidationError(format!(
                "{} cannot be empty",
                field
            )));
        }
        Ok(())
    }

    pub fn in_range<T: PartialOrd + std::fmt::Display>(
        value: T,
        min: T,
        max: T,
        field: &str,
    ) -> Result<()> {
        if value < min || value > max {
            return Err(ConfigError::ValidationError(format!(
                "{} must be between {} and {}, got {}",
                field, min, max, value
            )));
        }
        Ok(())
    }

    /// Checks that a property-path root is a plain identifier.
    pub fn is_identifier(value: &str, field: &str) -> Result<()> {
        let mut chars = value.chars();
        let valid = chars
            .next()
            .is_some_and(|c| c.is_alphabetic() || c == '_')
            && chars.all(|c| c.is_alphanumeric() || c == '_');
        if !valid {
            return Err(ConfigError::ValidationError(format!(
                "{} must be an identifier, got '{}'",
                field, value
            )));
        }
        Ok(())
    }
}
