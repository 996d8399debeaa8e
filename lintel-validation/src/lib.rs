//! Type conversion and validation for Lintel
//!
//! Request parameters arrive as text. This crate turns them into typed
//! [`Value`](lintel_bean::Value)s through a [`TypeConverterFactory`] and
//! checks them against the [`ValidationMetadata`] declared for each
//! property, collecting failures into [`ValidationErrors`].
//!
//! # Examples
//!
//! ```
//! use lintel_bean::Locale;
//! use lintel_validation::{TypeConverterFactory, ValidationErrors, ValidationMetadata};
//!
//! let meta = ValidationMetadata::new("age").required(true).min_value(18.0);
//! let factory = TypeConverterFactory::new();
//! let mut errors = ValidationErrors::new();
//!
//! let age = factory.convert_text("16", "int", &Locale::default()).unwrap().unwrap();
//! errors.extend(meta.validate_number("age", age.as_f64().unwrap()));
//!
//! assert_eq!(errors.get_field_errors("age").len(), 1);
//! ```

mod converters;
mod errors;
mod metadata;
mod validators;

pub use converters::{
    BooleanConverter, CharacterConverter, DoubleConverter, EnumConverter, FloatConverter,
    IntegerConverter, LongConverter, StringConverter, TypeConverter, TypeConverterFactory,
    normalize_number,
};
pub use errors::{GLOBAL_ERROR, ValidationError, ValidationErrors};
pub use metadata::ValidationMetadata;
pub use validators::{Mask, MaxLength, MaxValue, MinLength, MinValue, Required};

/// Prelude for common imports
pub mod prelude {
    pub use crate::{
        TypeConverter, TypeConverterFactory, ValidationError, ValidationErrors,
        ValidationMetadata,
    };
}
