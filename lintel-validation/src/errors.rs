// Validation errors

use indexmap::IndexMap;
use serde::Serialize;
use std::fmt;

/// Field name under which errors that belong to no single field are stored.
pub const GLOBAL_ERROR: &str = "__global_error";

/// Validation error for a single field
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationError {
    /// Field name that failed validation
    pub field: String,

    /// Error message
    pub message: String,

    /// Message key of the failed constraint (`validation.required.valueNotPresent`)
    pub constraint: String,

    /// Submitted value that failed validation, HTML-escaped once filled in
    pub value: Option<String>,

    /// Path of the action the value was submitted to
    pub action_path: Option<String>,

    /// Class of the bean being bound
    pub bean_class: Option<String>,
}

impl ValidationError {
    /// Create a new validation error
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            constraint: "custom".to_string(),
            value: None,
            action_path: None,
            bean_class: None,
        }
    }

    /// An error not tied to any field.
    pub fn global(message: impl Into<String>) -> Self {
        Self::new(GLOBAL_ERROR, message)
    }

    /// Set the constraint name
    pub fn with_constraint(mut self, constraint: impl Into<String>) -> Self {
        self.constraint = constraint.into();
        self
    }

    /// Set the invalid value
    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    pub fn is_global(&self) -> bool {
        self.field == GLOBAL_ERROR
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let field = if self.is_global() { "GLOBAL" } else { &self.field };
        write!(f, "{}: {}", field, self.message)
    }
}

impl std::error::Error for ValidationError {}

/// Errors grouped by field, in the order the fields first failed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidationErrors {
    errors: IndexMap<String, Vec<ValidationError>>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if there are any errors
    pub fn is_empty(&self) -> bool {
        self.errors.values().all(Vec::is_empty)
    }

    /// Total number of errors across all fields
    pub fn len(&self) -> usize {
        self.errors.values().map(Vec::len).sum()
    }

    /// Add an error under its own field
    pub fn add(&mut self, error: ValidationError) {
        self.errors.entry(error.field.clone()).or_default().push(error);
    }

    /// Add an error under `field`, overriding the field recorded on the error
    pub fn add_for(&mut self, field: impl Into<String>, mut error: ValidationError) {
        error.field = field.into();
        self.add(error);
    }

    pub fn add_global(&mut self, error: ValidationError) {
        self.add_for(GLOBAL_ERROR, error);
    }

    pub fn extend(&mut self, errors: impl IntoIterator<Item = ValidationError>) {
        for error in errors {
            self.add(error);
        }
    }

    /// Whether any error is recorded against a field (global errors excluded)
    pub fn has_field_errors(&self) -> bool {
        self.errors
            .iter()
            .any(|(field, errors)| field != GLOBAL_ERROR && !errors.is_empty())
    }

    pub fn contains_field(&self, field: &str) -> bool {
        self.errors.get(field).is_some_and(|e| !e.is_empty())
    }

    /// Get errors for a specific field
    pub fn get_field_errors(&self, field: &str) -> &[ValidationError] {
        self.errors.get(field).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.errors.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ValidationError> {
        self.errors.values().flatten()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut ValidationError> {
        self.errors.values_mut().flatten()
    }

    /// Convert to JSON representation
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "errors": self.iter().map(|e| {
                serde_json::json!({
                    "field": if e.is_global() { "GLOBAL" } else { e.field.as_str() },
                    "message": e.message,
                    "constraint": e.constraint,
                    "value": e.value,
                })
            }).collect::<Vec<_>>()
        })
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for error in self.iter() {
            writeln!(f, "{}", error)?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}

impl From<Vec<ValidationError>> for ValidationErrors {
    fn from(errors: Vec<ValidationError>) -> Self {
        let mut collected = Self::new();
        collected.extend(errors);
        collected
    }
}
