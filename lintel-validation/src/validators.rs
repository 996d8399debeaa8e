// Built-in validators

use crate::ValidationError;
use regex::Regex;

/// Validates that a value was supplied
pub struct Required;

impl Required {
    pub fn validate(value: Option<&str>, field: &str) -> Result<(), ValidationError> {
        match value {
            Some(v) if !v.trim().is_empty() => Ok(()),
            _ => Err(
                ValidationError::new(field, format!("{} is a required field", field))
                    .with_constraint("validation.required.valueNotPresent"),
            ),
        }
    }
}

/// Validates minimum string length, counted in characters
pub struct MinLength(pub usize);

impl MinLength {
    pub fn validate(&self, value: &str, field: &str) -> Result<(), ValidationError> {
        if value.chars().count() < self.0 {
            Err(ValidationError::new(
                field,
                format!("{} must be at least {} characters long", field, self.0),
            )
            .with_constraint("validation.minlength.valueTooShort")
            .with_value(value))
        } else {
            Ok(())
        }
    }
}

/// Validates maximum string length, counted in characters
pub struct MaxLength(pub usize);

impl MaxLength {
    pub fn validate(&self, value: &str, field: &str) -> Result<(), ValidationError> {
        if value.chars().count() > self.0 {
            Err(ValidationError::new(
                field,
                format!("{} must be no more than {} characters long", field, self.0),
            )
            .with_constraint("validation.maxlength.valueTooLong")
            .with_value(value))
        } else {
            Ok(())
        }
    }
}

/// Validates that the whole value matches a pattern
#[derive(Debug, Clone)]
pub struct Mask {
    pattern: String,
    regex: Regex,
}

impl Mask {
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            pattern: pattern.to_string(),
            regex: Regex::new(&format!("^(?:{})$", pattern))?,
        })
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn validate(&self, value: &str, field: &str) -> Result<(), ValidationError> {
        if self.regex.is_match(value) {
            Ok(())
        } else {
            Err(
                ValidationError::new(field, format!("{} is not a valid {}", value, field))
                    .with_constraint("validation.mask.valueDoesNotMatch")
                    .with_value(value),
            )
        }
    }
}

impl PartialEq for Mask {
    fn eq(&self, other: &Self) -> bool {
        self.pattern == other.pattern
    }
}

/// Validates a numeric lower bound
pub struct MinValue(pub f64);

impl MinValue {
    pub fn validate(&self, value: f64, field: &str) -> Result<(), ValidationError> {
        if value < self.0 {
            Err(ValidationError::new(
                field,
                format!("{} must be at least {}", field, self.0),
            )
            .with_constraint("validation.minvalue.valueBelowMinimum")
            .with_value(value.to_string()))
        } else {
            Ok(())
        }
    }
}

/// Validates a numeric upper bound
pub struct MaxValue(pub f64);

impl MaxValue {
    pub fn validate(&self, value: f64, field: &str) -> Result<(), ValidationError> {
        if value > self.0 {
            Err(ValidationError::new(
                field,
                format!("{} must be no greater than {}", field, self.0),
            )
            .with_constraint("validation.maxvalue.valueAboveMaximum")
            .with_value(value.to_string()))
        } else {
            Ok(())
        }
    }
}
