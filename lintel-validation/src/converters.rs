// Type converters: request text to typed values

use crate::ValidationError;
use lintel_bean::{Locale, TypeConversion, TypeRegistry, Value};
use lintel_log::trace;
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use regex::Regex;
use std::collections::HashMap;
use std::sync::Arc;

static CURRENCY_SYMBOLS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[$€£¥₹¤]").unwrap());

/// Converts one submitted string into a value of a target class.
///
/// Failures are returned as a [`ValidationError`] without a field; the
/// binder assigns the field it was converting.
pub trait TypeConverter: Send + Sync {
    fn convert(
        &self,
        input: &str,
        target_class: &str,
        locale: &Locale,
    ) -> Result<Value, ValidationError>;
}

impl<F> TypeConverter for F
where
    F: Fn(&str, &str, &Locale) -> Result<Value, ValidationError> + Send + Sync,
{
    fn convert(
        &self,
        input: &str,
        target_class: &str,
        locale: &Locale,
    ) -> Result<Value, ValidationError> {
        self(input, target_class, locale)
    }
}

fn conversion_error(input: &str, constraint: &str, message: String) -> ValidationError {
    ValidationError::new("", message)
        .with_constraint(constraint)
        .with_value(input)
}

/// Normalize a localized number: currency symbols and grouping separators
/// are dropped, `(n)` becomes `-n` and the decimal separator becomes `.`.
pub fn normalize_number(input: &str, locale: &Locale) -> String {
    let mut text = CURRENCY_SYMBOLS.replace_all(input.trim(), "").trim().to_string();
    if text.starts_with('(') && text.ends_with(')') && text.len() >= 2 {
        text = format!("-{}", &text[1..text.len() - 1]);
    }
    let grouping = locale.grouping_separator();
    let decimal = locale.decimal_separator();
    text.chars()
        .filter(|c| *c != grouping && !c.is_whitespace() && *c != '\u{a0}')
        .map(|c| if c == decimal { '.' } else { c })
        .collect()
}

fn parse_number(input: &str, locale: &Locale) -> Result<f64, ValidationError> {
    let normalized = normalize_number(input, locale);
    normalized.parse::<f64>().ok().filter(|n| n.is_finite()).ok_or_else(|| {
        conversion_error(
            input,
            "converter.number.invalidNumber",
            format!("The value ({}) entered is not a valid number", input),
        )
    })
}

fn parse_whole(input: &str, locale: &Locale, min: f64, max: f64) -> Result<i64, ValidationError> {
    let normalized = normalize_number(input, locale);
    if let Ok(n) = normalized.parse::<i64>() {
        if (n as f64) >= min && (n as f64) <= max {
            return Ok(n);
        }
    } else {
        // Fractions are truncated toward zero.
        let n = parse_number(input, locale)?.trunc();
        if n >= min && n <= max {
            return Ok(n as i64);
        }
    }
    Err(conversion_error(
        input,
        "converter.integer.outOfRange",
        format!(
            "The value ({}) entered must be between {} and {}",
            input, min as i64, max as i64
        ),
    ))
}

/// Integers (`Integer`, `int`, `Short`, `short`, `Byte`, `byte`).
pub struct IntegerConverter;

impl TypeConverter for IntegerConverter {
    fn convert(
        &self,
        input: &str,
        target_class: &str,
        locale: &Locale,
    ) -> Result<Value, ValidationError> {
        let (min, max) = match target_class {
            "Short" | "short" => (i16::MIN as f64, i16::MAX as f64),
            "Byte" | "byte" => (i8::MIN as f64, i8::MAX as f64),
            _ => (i32::MIN as f64, i32::MAX as f64),
        };
        parse_whole(input, locale, min, max).map(|n| Value::Integer(n as i32))
    }
}

/// `Long` and `long`.
pub struct LongConverter;

impl TypeConverter for LongConverter {
    fn convert(
        &self,
        input: &str,
        _target_class: &str,
        locale: &Locale,
    ) -> Result<Value, ValidationError> {
        parse_whole(input, locale, i64::MIN as f64, i64::MAX as f64).map(Value::Long)
    }
}

/// `Float` and `float`.
pub struct FloatConverter;

impl TypeConverter for FloatConverter {
    fn convert(
        &self,
        input: &str,
        _target_class: &str,
        locale: &Locale,
    ) -> Result<Value, ValidationError> {
        parse_number(input, locale).map(|n| Value::Float(n as f32))
    }
}

/// `Double` and `double`.
pub struct DoubleConverter;

impl TypeConverter for DoubleConverter {
    fn convert(
        &self,
        input: &str,
        _target_class: &str,
        locale: &Locale,
    ) -> Result<Value, ValidationError> {
        parse_number(input, locale).map(Value::Double)
    }
}

/// `Boolean` and `boolean`. Anything not recognised as true is false.
pub struct BooleanConverter;

impl TypeConverter for BooleanConverter {
    fn convert(
        &self,
        input: &str,
        _target_class: &str,
        _locale: &Locale,
    ) -> Result<Value, ValidationError> {
        let truthy = matches!(
            input.trim().to_lowercase().as_str(),
            "true" | "t" | "yes" | "y" | "on" | "1"
        );
        Ok(Value::Boolean(truthy))
    }
}

/// `Character` and `char`: the first character of the input.
pub struct CharacterConverter;

impl TypeConverter for CharacterConverter {
    fn convert(
        &self,
        input: &str,
        _target_class: &str,
        _locale: &Locale,
    ) -> Result<Value, ValidationError> {
        input.chars().next().map(Value::Char).ok_or_else(|| {
            conversion_error(
                input,
                "converter.character.missing",
                "A character value is required".to_string(),
            )
        })
    }
}

/// Text classes: the input unchanged.
pub struct StringConverter;

impl TypeConverter for StringConverter {
    fn convert(
        &self,
        input: &str,
        _target_class: &str,
        _locale: &Locale,
    ) -> Result<Value, ValidationError> {
        Ok(Value::String(input.to_string()))
    }
}

/// Enums registered in a [`TypeRegistry`], matched by constant name.
pub struct EnumConverter {
    registry: Arc<TypeRegistry>,
}

impl EnumConverter {
    pub fn new(registry: Arc<TypeRegistry>) -> Self {
        Self { registry }
    }
}

impl TypeConverter for EnumConverter {
    fn convert(
        &self,
        input: &str,
        target_class: &str,
        _locale: &Locale,
    ) -> Result<Value, ValidationError> {
        let input = input.trim();
        let constants = self
            .registry
            .get(target_class)
            .and_then(|class| class.enum_constants())
            .unwrap_or(&[]);

        constants
            .iter()
            .find(|c| c.as_str() == input)
            .or_else(|| constants.iter().find(|c| c.eq_ignore_ascii_case(input)))
            .map(|constant| Value::enumeration(target_class, constant.clone()))
            .ok_or_else(|| {
                conversion_error(
                    input,
                    "converter.enum.notAnEnumeratedValue",
                    format!("The value \"{}\" is not a valid {}", input, target_class),
                )
            })
    }
}

/// Looks up converters by target class.
///
/// Comes with converters for text, the numeric wrappers and primitives,
/// booleans and characters. With a registry, enum classes are converted by
/// constant name and subclasses of registered classes use the converter of
/// their nearest registered ancestor.
///
/// ```
/// use lintel_bean::{Locale, Value};
/// use lintel_validation::TypeConverterFactory;
///
/// let factory = TypeConverterFactory::new();
/// let german = Locale::new("de-DE");
/// assert_eq!(factory.convert_text("1.234,5", "double", &german), Some(Ok(Value::Double(1234.5))));
/// ```
pub struct TypeConverterFactory {
    converters: RwLock<HashMap<String, Arc<dyn TypeConverter>>>,
    registry: Option<Arc<TypeRegistry>>,
}

impl Default for TypeConverterFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeConverterFactory {
    pub fn new() -> Self {
        let factory = Self {
            converters: RwLock::new(HashMap::new()),
            registry: None,
        };
        let defaults: [(&[&str], Arc<dyn TypeConverter>); 7] = [
            (&["String", "CharSequence", "Object"], Arc::new(StringConverter)),
            (&["Integer", "int", "Short", "short", "Byte", "byte"], Arc::new(IntegerConverter)),
            (&["Long", "long"], Arc::new(LongConverter)),
            (&["Float", "float"], Arc::new(FloatConverter)),
            (&["Double", "double", "Number"], Arc::new(DoubleConverter)),
            (&["Boolean", "boolean"], Arc::new(BooleanConverter)),
            (&["Character", "char"], Arc::new(CharacterConverter)),
        ];
        for (classes, converter) in defaults {
            for class in classes {
                factory.add(*class, converter.clone());
            }
        }
        factory
    }

    /// Enable enum conversion and ancestor lookup through `registry`.
    pub fn with_registry(mut self, registry: Arc<TypeRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Register or replace the converter for `class`.
    pub fn add(&self, class: impl Into<String>, converter: Arc<dyn TypeConverter>) {
        self.converters.write().insert(class.into(), converter);
    }

    pub fn get_type_converter(&self, class: &str) -> Option<Arc<dyn TypeConverter>> {
        if let Some(converter) = self.converters.read().get(class) {
            return Some(converter.clone());
        }
        let registry = self.registry.as_ref()?;
        if registry.is_enum(class) {
            return Some(Arc::new(EnumConverter::new(registry.clone())));
        }

        let converters = self.converters.read();
        registry
            .ancestors(class)
            .into_iter()
            .skip(1)
            .filter(|ancestor| *ancestor != "Object")
            .find_map(|ancestor| converters.get(ancestor).cloned())
    }

    /// Convert with the converter for `target_class`. `None` when there is none.
    pub fn convert_text(
        &self,
        input: &str,
        target_class: &str,
        locale: &Locale,
    ) -> Option<Result<Value, ValidationError>> {
        let converter = self.get_type_converter(target_class)?;
        trace!("Converting '{}' to {} ({})", input, target_class, locale);
        Some(converter.convert(input, target_class, locale))
    }
}

impl TypeConversion for TypeConverterFactory {
    fn convert(
        &self,
        input: &str,
        target_class: &str,
        locale: &Locale,
    ) -> Option<Result<Value, Vec<String>>> {
        self.convert_text(input, target_class, locale)
            .map(|result| result.map_err(|error| vec![error.message]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lintel_bean::ClassDescriptor;

    fn us() -> Locale {
        Locale::default()
    }

    #[test]
    fn test_numbers_follow_locale() {
        let factory = TypeConverterFactory::new();
        assert_eq!(
            factory.convert_text("1,234", "int", &us()).unwrap().unwrap(),
            Value::Integer(1234)
        );
        assert_eq!(
            factory.convert_text("1.234,5", "Double", &Locale::new("de-DE")).unwrap().unwrap(),
            Value::Double(1234.5)
        );
        assert_eq!(
            factory.convert_text("($12)", "long", &us()).unwrap().unwrap(),
            Value::Long(-12)
        );
    }

    #[test]
    fn test_integer_range_and_garbage() {
        let factory = TypeConverterFactory::new();
        let err = factory.convert_text("99999999999", "int", &us()).unwrap().unwrap_err();
        assert_eq!(err.constraint, "converter.integer.outOfRange");

        let err = factory.convert_text("abc", "Integer", &us()).unwrap().unwrap_err();
        assert_eq!(err.constraint, "converter.number.invalidNumber");
        assert_eq!(err.value.as_deref(), Some("abc"));

        assert_eq!(
            factory.convert_text("300", "byte", &us()).unwrap().unwrap_err().constraint,
            "converter.integer.outOfRange"
        );
    }

    #[test]
    fn test_booleans_and_characters() {
        let factory = TypeConverterFactory::new();
        for truthy in ["true", "Yes", "on", "1"] {
            assert_eq!(
                factory.convert_text(truthy, "boolean", &us()).unwrap().unwrap(),
                Value::Boolean(true)
            );
        }
        assert_eq!(
            factory.convert_text("nope", "Boolean", &us()).unwrap().unwrap(),
            Value::Boolean(false)
        );
        assert_eq!(
            factory.convert_text("xyz", "char", &us()).unwrap().unwrap(),
            Value::Char('x')
        );
    }

    #[test]
    fn test_enums_and_ancestors_through_registry() {
        let mut registry = TypeRegistry::new();
        registry.register(ClassDescriptor::enumeration("Color", ["RED", "GREEN"]));
        registry.register(
            ClassDescriptor::class("Money").extends(lintel_bean::GenericType::class("Number")),
        );
        let factory = TypeConverterFactory::new().with_registry(Arc::new(registry));

        assert_eq!(
            factory.convert_text("green", "Color", &us()).unwrap().unwrap(),
            Value::enumeration("Color", "GREEN")
        );
        let err = factory.convert_text("BLUE", "Color", &us()).unwrap().unwrap_err();
        assert_eq!(err.constraint, "converter.enum.notAnEnumeratedValue");

        assert_eq!(
            factory.convert_text("2.5", "Money", &us()).unwrap().unwrap(),
            Value::Double(2.5)
        );
        assert!(factory.convert_text("x", "Unknown", &us()).is_none());
    }

    #[test]
    fn test_custom_converters_replace_defaults() {
        let factory = TypeConverterFactory::new();
        factory.add(
            "String",
            Arc::new(
                |input: &str, _: &str, _: &Locale| -> Result<Value, ValidationError> {
                    Ok(Value::String(input.to_uppercase()))
                },
            ),
        );
        assert_eq!(
            TypeConversion::convert(&factory, "abc", "String", &us()),
            Some(Ok(Value::from("ABC")))
        );
    }
}
