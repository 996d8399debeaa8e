// Environment variable loading

use crate::{ConfigError, Result};
use std::collections::HashMap;
use std::env;

/// Reads environment variables into configuration keys.
///
/// With prefix `LINTEL`, the variable `LINTEL_BINDING__EXPRESSION_CACHE_CAPACITY`
/// becomes the key `binding.expression_cache_capacity`: the prefix is removed,
/// `__` separates sections and the result is lowercased.
pub struct EnvLoader {
    prefix: Option<String>,
}

impl EnvLoader {
    pub fn new(prefix: Option<String>) -> Self {
        Self { prefix }
    }

    /// Load every matching variable from the process environment.
    pub fn load(&self) -> Result<HashMap<String, String>> {
        Ok(self.load_from(env::vars()))
    }

    /// Same as [`load`](Self::load) over an explicit set of variables.
    pub fn load_from<I>(&self, vars: I) -> HashMap<String, String>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        vars.into_iter()
            .filter_map(|(name, value)| self.key_for(&name).map(|key| (key, value)))
            .collect()
    }

    fn key_for(&self, name: &str) -> Option<String> {
        let rest = match self.prefix {
            Some(ref prefix) => name.strip_prefix(prefix.as_str())?.strip_prefix('_')?,
            None => name,
        };
        if rest.is_empty() {
            return None;
        }
        Some(rest.split("__").collect::<Vec<_>>().join(".").to_lowercase())
    }

    /// Load a single variable, `key` given in configuration form (`binding.deny_roots`).
    pub fn load_var(&self, key: &str) -> Result<String> {
        env::var(self.variable_name(key)).map_err(ConfigError::EnvError)
    }

    pub fn load_var_or(&self, key: &str, default: &str) -> String {
        self.load_var(key).unwrap_or_else(|_| default.to_string())
    }

    /// The environment variable name a configuration key is read from.
    pub fn variable_name(&self, key: &str) -> String {
        let name = key.replace('.', "__").to_uppercase();
        match self.prefix {
            Some(ref prefix) => format!("{}_{}", prefix, name),
            None => name,
        }
    }
}

impl Default for EnvLoader {
    fn default() -> Self {
        Self::new(None)
    }
}
