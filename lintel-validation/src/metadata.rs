// Per-property validation metadata

use crate::validators::{Mask, MaxLength, MaxValue, MinLength, MinValue};
use crate::ValidationError;
use std::collections::HashSet;
use std::fmt;

/// Events a rule applies to: all, only the listed ones, or all but the listed ones.
#[derive(Debug, Clone, Default, PartialEq)]
enum EventFilter {
    #[default]
    All,
    Only(HashSet<String>),
    Except(HashSet<String>),
}

/// Validation rules declared for one property of an action bean.
///
/// ```
/// use lintel_validation::ValidationMetadata;
///
/// let zip = ValidationMetadata::new("address.zip")
///     .required(true)
///     .on(&["save", "update"])
///     .mask(r"\d{5}")
///     .unwrap();
/// assert!(zip.requires_on("save"));
/// assert!(!zip.requires_on("preview"));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationMetadata {
    property: String,
    required: bool,
    on: EventFilter,
    ignore: bool,
    trim: bool,
    min_length: Option<usize>,
    max_length: Option<usize>,
    min_value: Option<f64>,
    max_value: Option<f64>,
    mask: Option<Mask>,
}

impl ValidationMetadata {
    pub fn new(property: impl Into<String>) -> Self {
        Self {
            property: property.into(),
            required: false,
            on: EventFilter::All,
            ignore: false,
            trim: true,
            min_length: None,
            max_length: None,
            min_value: None,
            max_value: None,
            mask: None,
        }
    }

    pub fn property(&self) -> &str {
        &self.property
    }

    pub fn required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    pub fn is_required(&self) -> bool {
        self.required
    }

    /// Restrict `required` to some events. A leading `!` on the first name
    /// turns the list into exclusions; an empty list means every event.
    pub fn on(mut self, events: &[&str]) -> Self {
        self.on = match events.first() {
            None => EventFilter::All,
            Some(first) if first.starts_with('!') => EventFilter::Except(
                events
                    .iter()
                    .map(|e| e.strip_prefix('!').unwrap_or(e).to_string())
                    .collect(),
            ),
            Some(_) => EventFilter::Only(events.iter().map(|e| e.to_string()).collect()),
        };
        self
    }

    /// Whether the property must have a value when `event` is handled.
    pub fn requires_on(&self, event: &str) -> bool {
        self.required
            && match &self.on {
                EventFilter::All => true,
                EventFilter::Only(events) => events.contains(event),
                EventFilter::Except(events) => !events.contains(event),
            }
    }

    /// Never bind this property from request parameters.
    pub fn ignore(mut self, ignore: bool) -> Self {
        self.ignore = ignore;
        self
    }

    pub fn is_ignored(&self) -> bool {
        self.ignore
    }

    pub fn trim(mut self, trim: bool) -> Self {
        self.trim = trim;
        self
    }

    pub fn trims(&self) -> bool {
        self.trim
    }

    pub fn min_length(mut self, length: usize) -> Self {
        self.min_length = Some(length);
        self
    }

    pub fn max_length(mut self, length: usize) -> Self {
        self.max_length = Some(length);
        self
    }

    pub fn min_value(mut self, value: f64) -> Self {
        self.min_value = Some(value);
        self
    }

    pub fn max_value(mut self, value: f64) -> Self {
        self.max_value = Some(value);
        self
    }

    pub fn mask(mut self, pattern: &str) -> Result<Self, regex::Error> {
        self.mask = Some(Mask::new(pattern)?);
        Ok(self)
    }

    /// Checks that run on the submitted text before conversion.
    pub fn validate_text(&self, field: &str, value: &str) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        if let Some(min) = self.min_length {
            errors.extend(MinLength(min).validate(value, field).err());
        }
        if let Some(max) = self.max_length {
            errors.extend(MaxLength(max).validate(value, field).err());
        }
        if let Some(mask) = &self.mask {
            errors.extend(mask.validate(value, field).err());
        }
        errors
    }

    /// Checks that run on the converted number.
    pub fn validate_number(&self, field: &str, value: f64) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        if let Some(min) = self.min_value {
            errors.extend(MinValue(min).validate(value, field).err());
        }
        if let Some(max) = self.max_value {
            errors.extend(MaxValue(max).validate(value, field).err());
        }
        errors
    }

    pub fn has_value_bounds(&self) -> bool {
        self.min_value.is_some() || self.max_value.is_some()
    }
}

impl fmt::Display for ValidationMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ValidationMetadata{{property={}", self.property)?;
        if self.required {
            write!(f, ", required")?;
        }
        if self.ignore {
            write!(f, ", ignore")?;
        }
        if let Some(min) = self.min_length {
            write!(f, ", min_length={}", min)?;
        }
        if let Some(max) = self.max_length {
            write!(f, ", max_length={}", max)?;
        }
        if let Some(min) = self.min_value {
            write!(f, ", min_value={}", min)?;
        }
        if let Some(max) = self.max_value {
            write!(f, ", max_value={}", max)?;
        }
        if let Some(mask) = &self.mask {
            write!(f, ", mask={}", mask.pattern())?;
        }
        write!(f, "}}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_required_on_events() {
        let always = ValidationMetadata::new("name").required(true);
        assert!(always.requires_on("anything"));

        let except = ValidationMetadata::new("name").required(true).on(&["!cancel"]);
        assert!(except.requires_on("save"));
        assert!(!except.requires_on("cancel"));

        let optional = ValidationMetadata::new("name").on(&["save"]);
        assert!(!optional.requires_on("save"));
    }

    #[test]
    fn test_text_and_number_checks() {
        let meta = ValidationMetadata::new("code")
            .min_length(2)
            .max_length(4)
            .min_value(10.0)
            .max_value(500.0);

        assert!(meta.validate_text("code", "123").is_empty());
        assert_eq!(meta.validate_text("code", "1").len(), 1);
        assert_eq!(meta.validate_number("code", 5.0).len(), 1);
        assert!(meta.validate_number("code", 250.0).is_empty());
        assert!(meta.has_value_bounds());
    }

    #[test]
    fn test_display_lists_rules() {
        let meta = ValidationMetadata::new("zip").required(true).mask("[0-9]+").unwrap();
        assert_eq!(meta.to_string(), "ValidationMetadata{property=zip, required, mask=[0-9]+}");
    }
}
