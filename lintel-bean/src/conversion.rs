// Conversion of text into typed values, as consumed by map-key binding

use crate::value::Value;
use std::fmt;

/// A BCP 47 style locale tag (`en-US`, `de-DE`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Locale {
    tag: String,
}

impl Locale {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into().replace('_', "-"),
        }
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn language(&self) -> &str {
        self.tag.split('-').next().unwrap_or("")
    }

    /// Decimal separator used when reading numbers in this locale.
    pub fn decimal_separator(&self) -> char {
        match self.language().to_lowercase().as_str() {
            "de" | "fr" | "es" | "it" | "nl" | "pt" | "ru" | "pl" | "sv" | "da" | "nb" | "fi"
            | "tr" | "cs" => ',',
            _ => '.',
        }
    }

    pub fn grouping_separator(&self) -> char {
        if self.decimal_separator() == ',' { '.' } else { ',' }
    }
}

impl Default for Locale {
    fn default() -> Self {
        Locale::new("en-US")
    }
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.tag)
    }
}

/// Converts request text into a value of a named class.
pub trait TypeConversion: Send + Sync {
    /// `None` when no converter handles `target_class`, otherwise the
    /// converted value or the error messages produced by the attempt.
    fn convert(
        &self,
        input: &str,
        target_class: &str,
        locale: &Locale,
    ) -> Option<Result<Value, Vec<String>>>;
}
