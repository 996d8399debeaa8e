// Configuration management for the Lintel framework

pub mod env;
pub mod error;
pub mod loader;
pub mod settings;
pub mod validation;

pub use env::EnvLoader;
pub use error::{ConfigError, Result};
pub use loader::{ConfigLoader, FileFormat};
pub use settings::BootstrapSettings;
pub use validation::{ConfigValidator, Validate};

use lintel_log::debug;
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::path::Path;
use std::sync::Arc;

/// Layered configuration store.
///
/// Values live in one JSON tree; keys are dotted paths into it
/// (`binding.expression_cache_capacity`). Later loads override earlier ones.
#[derive(Clone, Default)]
pub struct ConfigManager {
    config: Arc<RwLock<Map<String, Value>>>,
    env_prefix: Option<String>,
}

fn split_key(key: &str) -> Vec<String> {
    key.split('.').map(str::to_string).collect()
}

fn merge_into(target: &mut Map<String, Value>, source: Map<String, Value>) {
    for (key, value) in source {
        match (target.get_mut(&key), value) {
            (Some(Value::Object(existing)), Value::Object(incoming)) => {
                merge_into(existing, incoming)
            }
            (_, value) => {
                target.insert(key, value);
            }
        }
    }
}

impl ConfigManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read environment variables that start with `prefix`.
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            config: Arc::new(RwLock::new(Map::new())),
            env_prefix: Some(prefix.into()),
        }
    }

    pub fn load_env(&self) -> Result<()> {
        let loader = EnvLoader::new(self.env_prefix.clone());
        let vars = loader.load()?;
        debug!("Loaded {} configuration values from the environment", vars.len());

        let mut config = self.config.write();
        for (key, value) in vars {
            loader::insert_path(&mut config, &split_key(&key), Value::String(value));
        }

        Ok(())
    }

    /// Load a `.env` file into the process environment, then [`load_env`](Self::load_env).
    pub fn load_dotenv(&self, path: Option<&Path>) -> Result<()> {
        match path {
            Some(path) => {
                dotenvy::from_path(path).map_err(|e| ConfigError::LoadError(e.to_string()))?;
            }
            None => {
                // A missing .env is not an error.
                dotenvy::dotenv().ok();
            }
        }
        self.load_env()
    }

    pub fn load_file(&self, path: impl AsRef<Path>, format: FileFormat) -> Result<()> {
        let data = ConfigLoader::new(format).load_file(path)?;
        self.merge_value(data)
    }

    /// Merge a parsed document; the root must be an object.
    pub fn merge_value(&self, data: Value) -> Result<()> {
        match data {
            Value::Object(map) => {
                merge_into(&mut self.config.write(), map);
                Ok(())
            }
            other => Err(ConfigError::ParseError(format!(
                "configuration root must be a table, found {}",
                other
            ))),
        }
    }

    pub fn set<T: serde::Serialize>(&self, key: &str, value: T) -> Result<()> {
        let value = serde_json::to_value(value)
            .map_err(|e| ConfigError::SerializationError(e.to_string()))?;

        loader::insert_path(&mut self.config.write(), &split_key(key), value);
        Ok(())
    }

    /// Raw value at a dotted key.
    pub fn value(&self, key: &str) -> Option<Value> {
        let config = self.config.read();
        let mut parts = key.split('.');
        let mut current = config.get(parts.next()?)?;
        for part in parts {
            current = current.as_object()?.get(part)?;
        }
        Some(current.clone())
    }

    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<T> {
        let value = self
            .value(key)
            .ok_or_else(|| ConfigError::KeyNotFound(key.to_string()))?;

        serde_json::from_value(value).map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        })
    }

    pub fn get_or<T: DeserializeOwned>(&self, key: &str, default: T) -> T {
        self.get(key).unwrap_or(default)
    }

    pub fn has(&self, key: &str) -> bool {
        self.value(key).is_some()
    }

    /// Overlay every value of `other` onto this manager.
    pub fn merge(&self, other: &ConfigManager) -> Result<()> {
        let incoming = other.config.read().clone();
        merge_into(&mut self.config.write(), incoming);
        Ok(())
    }

    pub fn load_validated<T: DeserializeOwned + Validate>(&self) -> Result<T> {
        let tree = Value::Object(self.config.read().clone());

        let validated: T = serde_json::from_value(tree)
            .map_err(|e| ConfigError::ParseError(e.to_string()))?;

        validated.validate()?;
        Ok(validated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_and_get_dotted() {
        let manager = ConfigManager::new();
        manager.set("binding.expression_cache_capacity", 32).unwrap();
        manager.set("binding.deny_roots", vec!["context"]).unwrap();

        assert_eq!(manager.get::<usize>("binding.expression_cache_capacity").unwrap(), 32);
        assert_eq!(
            manager.get::<Vec<String>>("binding.deny_roots").unwrap(),
            vec!["context".to_string()]
        );
        assert!(manager.has("binding"));
    }

    #[test]
    fn test_get_or_default() {
        let manager = ConfigManager::new();
        let value: String = manager.get_or("locale.default", "en-US".to_string());
        assert_eq!(value, "en-US");
        assert!(matches!(
            manager.get::<String>("locale.default"),
            Err(ConfigError::KeyNotFound(_))
        ));
    }

    #[test]
    fn test_wrong_type_is_invalid_value() {
        let manager = ConfigManager::new();
        manager.set("binding.expression_cache_capacity", "lots").unwrap();
        assert!(matches!(
            manager.get::<usize>("binding.expression_cache_capacity"),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_merge_is_deep() {
        let base = ConfigManager::new();
        base.set("validation.invoke_validate_when_errors_exist", false).unwrap();
        base.set("locale.default", "en-US").unwrap();

        let overlay = ConfigManager::new();
        overlay.set("locale.default", "de-DE").unwrap();

        base.merge(&overlay).unwrap();
        assert_eq!(base.get::<String>("locale.default").unwrap(), "de-DE");
        assert!(base.has("validation.invoke_validate_when_errors_exist"));
    }

    #[test]
    fn test_merge_value_rejects_scalars() {
        let manager = ConfigManager::new();
        assert!(manager.merge_value(Value::Bool(true)).is_err());
    }
}
