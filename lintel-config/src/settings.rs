// Typed bootstrap settings

use crate::{ConfigError, ConfigManager, ConfigValidator, Result, Validate};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const INVOKE_VALIDATE_WHEN_ERRORS_EXIST: &str = "validation.invoke_validate_when_errors_exist";
pub const EXPRESSION_CACHE_CAPACITY: &str = "binding.expression_cache_capacity";
pub const MAX_LIST_INDEX: &str = "binding.max_list_index";
pub const DENY_ROOTS: &str = "binding.deny_roots";
pub const DEFAULT_LOCALE: &str = "locale.default";

/// Settings read once when the dispatcher is configured.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BootstrapSettings {
    /// Run custom validation even when field validation already failed.
    pub invoke_validate_when_errors_exist: bool,
    /// Maximum number of parsed property expressions kept in memory.
    ///
    /// The expression cache is shared by the whole process, so the most
    /// recently built configuration decides its capacity for every dispatcher.
    pub expression_cache_capacity: usize,
    /// Highest list index a request parameter may write to. Parameters
    /// indexing past it are logged and skipped.
    pub max_list_index: usize,
    /// Property-path roots request parameters may never bind into.
    pub deny_roots: Vec<String>,
    pub default_locale: String,
}

impl Default for BootstrapSettings {
    fn default() -> Self {
        Self {
            invoke_validate_when_errors_exist: false,
            expression_cache_capacity: 1024,
            max_list_index: 10_000,
            deny_roots: vec!["context".to_string()],
            default_locale: "en-US".to_string(),
        }
    }
}

fn invalid(key: &str, message: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        message: message.into(),
    }
}

// Environment values arrive as strings, file values as typed JSON.
fn flag(value: Value, key: &str) -> Result<bool> {
    match value {
        Value::Bool(b) => Ok(b),
        Value::String(s) => match s.trim().to_lowercase().as_str() {
            "true" | "1" | "yes" => Ok(true),
            "false" | "0" | "no" => Ok(false),
            other => Err(invalid(key, format!("expected a boolean, got '{}'", other))),
        },
        other => Err(invalid(key, format!("expected a boolean, got {}", other))),
    }
}

fn count(value: Value, key: &str) -> Result<usize> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .map(|n| n as usize)
            .ok_or_else(|| invalid(key, format!("expected a positive integer, got {}", n))),
        Value::String(s) => s
            .trim()
            .parse()
            .map_err(|_| invalid(key, format!("expected a positive integer, got '{}'", s))),
        other => Err(invalid(key, format!("expected a positive integer, got {}", other))),
    }
}

fn list(value: Value, key: &str) -> Result<Vec<String>> {
    match value {
        Value::String(s) => Ok(s
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()),
        Value::Array(items) => items
            .into_iter()
            .map(|item| match item {
                Value::String(s) => Ok(s),
                other => Err(invalid(key, format!("expected strings, found {}", other))),
            })
            .collect(),
        other => Err(invalid(key, format!("expected a list, got {}", other))),
    }
}

impl BootstrapSettings {
    /// Read settings from a manager, keeping defaults for absent keys.
    pub fn from_manager(manager: &ConfigManager) -> Result<Self> {
        let mut settings = Self::default();

        if let Some(value) = manager.value(INVOKE_VALIDATE_WHEN_ERRORS_EXIST) {
            settings.invoke_validate_when_errors_exist =
                flag(value, INVOKE_VALIDATE_WHEN_ERRORS_EXIST)?;
        }
        if let Some(value) = manager.value(EXPRESSION_CACHE_CAPACITY) {
            settings.expression_cache_capacity = count(value, EXPRESSION_CACHE_CAPACITY)?;
        }
        if let Some(value) = manager.value(MAX_LIST_INDEX) {
            settings.max_list_index = count(value, MAX_LIST_INDEX)?;
        }
        if let Some(value) = manager.value(DENY_ROOTS) {
            settings.deny_roots = list(value, DENY_ROOTS)?;
        }
        if let Some(value) = manager.value(DEFAULT_LOCALE) {
            settings.default_locale = value
                .as_str()
                .map(str::to_string)
                .ok_or_else(|| invalid(DEFAULT_LOCALE, "expected a locale tag"))?;
        }

        settings.validate()?;
        Ok(settings)
    }

    /// Environment (`LINTEL_*`) over an optional `.env` file.
    pub fn from_env() -> Result<Self> {
        let manager = ConfigManager::with_prefix("LINTEL");
        manager.load_dotenv(None)?;
        Self::from_manager(&manager)
    }
}

impl Validate for BootstrapSettings {
    fn validate(&self) -> Result<()> {
        ConfigValidator::in_range(
            self.expression_cache_capacity,
            1,
            1 << 20,
            EXPRESSION_CACHE_CAPACITY,
        )?;
        ConfigValidator::in_range(self.max_list_index, 1, 1 << 24, MAX_LIST_INDEX)?;
        ConfigValidator::not_empty(&self.default_locale, DEFAULT_LOCALE)?;
        for root in &self.deny_roots {
            ConfigValidator::is_identifier(root, DENY_ROOTS)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FileFormat;
    use crate::loader::ConfigLoader;

    #[test]
    fn test_defaults_when_empty() {
        let settings = BootstrapSettings::from_manager(&ConfigManager::new()).unwrap();
        assert_eq!(settings, BootstrapSettings::default());
        assert_eq!(settings.deny_roots, vec!["context"]);
    }

    #[test]
    fn test_string_values_from_env_style_sources() {
        let manager = ConfigManager::new();
        manager.set(INVOKE_VALIDATE_WHEN_ERRORS_EXIST, "TRUE").unwrap();
        manager.set(EXPRESSION_CACHE_CAPACITY, " 256 ").unwrap();
        manager.set(DENY_ROOTS, "context, session").unwrap();
        manager.set(MAX_LIST_INDEX, "500").unwrap();

        let settings = BootstrapSettings::from_manager(&manager).unwrap();
        assert!(settings.invoke_validate_when_errors_exist);
        assert_eq!(settings.expression_cache_capacity, 256);
        assert_eq!(settings.max_list_index, 500);
        assert_eq!(settings.deny_roots, vec!["context", "session"]);
    }

    #[test]
    fn test_typed_values_from_toml() {
        let manager = ConfigManager::new();
        let doc = ConfigLoader::new(FileFormat::Toml)
            .parse(
                r#"
                [binding]
                expression_cache_capacity = 8
                max_list_index = 99
                deny_roots = ["context", "secrets"]

                [locale]
                default = "nl-NL"
            "#,
            )
            .unwrap();
        manager.merge_value(doc).unwrap();

        let settings = BootstrapSettings::from_manager(&manager).unwrap();
        assert_eq!(settings.expression_cache_capacity, 8);
        assert_eq!(settings.max_list_index, 99);
        assert_eq!(settings.deny_roots, vec!["context", "secrets"]);
        assert_eq!(settings.default_locale, "nl-NL");
        assert!(!settings.invoke_validate_when_errors_exist);
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let manager = ConfigManager::new();
        manager.set(EXPRESSION_CACHE_CAPACITY, 0).unwrap();
        assert!(matches!(
            BootstrapSettings::from_manager(&manager),
            Err(ConfigError::ValidationError(_))
        ));

        let manager = ConfigManager::new();
        manager.set(MAX_LIST_INDEX, 0).unwrap();
        assert!(matches!(
            BootstrapSettings::from_manager(&manager),
            Err(ConfigError::ValidationError(_))
        ));

        let manager = ConfigManager::new();
        manager.set(INVOKE_VALIDATE_WHEN_ERRORS_EXIST, "sometimes").unwrap();
        assert!(matches!(
            BootstrapSettings::from_manager(&manager),
            Err(ConfigError::InvalidValue { .. })
        ));
    }
}
