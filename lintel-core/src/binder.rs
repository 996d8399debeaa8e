//! Binding request parameters onto action beans.
//!
//! Every parameter name is a property expression. The binder walks the
//! parameters shortest name first (so `person` binds before
//! `person.address.city`), converts each value to the type declared at the
//! expression's leaf and writes it through a [`PropertyExpressionEvaluation`].
//! Field validation from the bean's [`ValidationMetadata`] runs around the
//! conversion; failures are collected on the context instead of aborting.

use crate::action::{
    ActionBean, ActionBeanContext, ActionBeanDefinition, FIELDS_PRESENT, SPECIAL_URL_KEYS,
};
use crate::http::Parameters;
use lintel_bean::{
    EvaluationError, GenericType, Introspector, PropertyExpression, PropertyExpressionEvaluation,
    TypeRegistry, Value,
};
use lintel_log::{debug, trace};
use lintel_validation::{Required, TypeConverterFactory, ValidationError, ValidationMetadata};
use once_cell::sync::Lazy;
use regex::Regex;
use std::borrow::Cow;

static INDEXES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[.*?\]").unwrap());

/// A parameter name with its index expressions removed, the key under which
/// validation metadata is declared (`items[2].name` becomes `items.name`).
pub fn strip_indexes(name: &str) -> Cow<'_, str> {
    INDEXES.replace_all(name, "")
}

pub fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#x27;")
}

#[derive(Debug, Clone)]
pub struct PropertyBinder {
    deny_roots: Vec<String>,
}

impl Default for PropertyBinder {
    fn default() -> Self {
        Self::new(vec!["context".to_string()])
    }
}

impl PropertyBinder {
    /// `deny_roots` lists the first expression nodes that parameters may never bind through.
    pub fn new(deny_roots: Vec<String>) -> Self {
        Self { deny_roots }
    }

    pub fn is_binding_allowed(&self, expression: &PropertyExpression) -> bool {
        let root = expression.root_node().string_value();
        !self.deny_roots.iter().any(|denied| denied == root)
    }

    /// Bind the context's parameters onto `bean`, validating when asked.
    pub fn bind(
        &self,
        bean: &mut ActionBean,
        context: &mut ActionBeanContext,
        definition: &ActionBeanDefinition,
        introspector: &Introspector,
        converters: &TypeConverterFactory,
        validate: bool,
    ) {
        let introspector = introspector.clone().with_locale(context.locale().clone());
        let locale = context.locale().clone();
        let event = context.event_name().map(str::to_string);
        let parameters = context.parameters().clone();
        let mut bound_numbers: Vec<(String, Vec<Value>)> = Vec::new();

        let mut names: Vec<&String> = parameters.keys().collect();
        names.sort_by(|a, b| {
            let (sa, sb) = (strip_indexes(a), strip_indexes(b));
            sa.len()
                .cmp(&sb.len())
                .then_with(|| sa.cmp(&sb))
                .then_with(|| a.cmp(b))
        });

        for name in names {
            if event.as_deref() == Some(name.as_str()) {
                trace!("Not binding event parameter {}", name);
                continue;
            }
            if SPECIAL_URL_KEYS.contains(&name.as_str())
                || context.validation_errors().contains_field(name)
            {
                continue;
            }

            let expression = match PropertyExpression::get_expression(name) {
                Ok(expression) => expression,
                Err(e) => {
                    debug!("Could not parse property name {}: {}", name, e);
                    continue;
                }
            };
            if !self.is_binding_allowed(&expression) {
                debug!("Binding of parameter {} is not allowed", name);
                continue;
            }

            let stripped = strip_indexes(name);
            let metadata = definition.validation_metadata(&stripped);
            if metadata.is_some_and(ValidationMetadata::is_ignored) {
                trace!("Ignoring parameter {} by declaration", name);
                continue;
            }

            let mut evaluation = match PropertyExpressionEvaluation::new(&introspector, expression, bean)
            {
                Ok(evaluation) => evaluation,
                Err(e) => {
                    log_binding_failure(name, &e);
                    continue;
                }
            };
            let Some(target_type) = evaluation.get_type() else {
                trace!("Could not find type for property {}, not binding", name);
                continue;
            };
            let scalar_type = evaluation
                .get_scalar_type()
                .unwrap_or_else(|| GenericType::class("String"));

            let trims = metadata.map_or(true, ValidationMetadata::trims);
            let inputs: Vec<String> = parameters[name]
                .iter()
                .map(|v| if trims { v.trim().to_string() } else { v.clone() })
                .filter(|v| !v.is_empty())
                .collect();

            let mut errors = Vec::new();
            if let (true, Some(metadata)) = (validate, metadata) {
                for input in &inputs {
                    errors.extend(metadata.validate_text(name, input));
                }
            }

            let mut values = Vec::with_capacity(inputs.len());
            if errors.is_empty() {
                let class = class_name(&scalar_type);
                for input in &inputs {
                    match converters.convert_text(input, &class, &locale) {
                        Some(Ok(value)) => values.push(value),
                        Some(Err(error)) => errors.push(error.with_value(input.clone())),
                        None => values.push(Value::String(input.clone())),
                    }
                }
            }

            if !errors.is_empty() {
                for error in errors {
                    context.validation_errors_mut().add_for(name.clone(), error);
                }
                continue;
            }

            let result = if values.is_empty() {
                evaluation.set_to_null()
            } else {
                match assemble(&target_type, values.clone(), introspector.registry()) {
                    Ok(value) => evaluation.set_value(value),
                    Err(reason) => {
                        debug!("Could not bind {}: {}", name, reason);
                        continue;
                    }
                }
            };

            match result {
                Ok(()) => {
                    if validate && metadata.is_some_and(ValidationMetadata::has_value_bounds) {
                        bound_numbers.push((name.clone(), values));
                    }
                }
                Err(e) => log_binding_failure(name, &e),
            }
        }

        self.bind_missing_values_as_null(bean, &parameters, &introspector);

        if validate {
            validate_required_fields(definition, &parameters, event.as_deref(), context);
            validate_converted_values(definition, bound_numbers, context);
        }
    }

    /// Null out fields the form rendered (listed in `_fields`) that were not submitted.
    fn bind_missing_values_as_null(
        &self,
        bean: &mut ActionBean,
        parameters: &Parameters,
        introspector: &Introspector,
    ) {
        let Some(present) = parameters.get(FIELDS_PRESENT) else {
            return;
        };
        let fields = present
            .iter()
            .flat_map(|list| list.split(','))
            .map(str::trim)
            .filter(|field| !field.is_empty() && !parameters.contains_key(*field));

        for field in fields {
            let Ok(expression) = PropertyExpression::get_expression(field) else {
                continue;
            };
            if !self.is_binding_allowed(&expression) {
                continue;
            }
            let result = PropertyExpressionEvaluation::new(introspector, expression, bean)
                .and_then(|mut evaluation| evaluation.set_to_null());
            if let Err(e) = result {
                log_binding_failure(field, &e);
            }
        }
    }
}

fn class_name(ty: &GenericType) -> String {
    ty.raw_name()
        .map(str::to_string)
        .unwrap_or_else(|| ty.to_string())
}

// Arrays and collections take every value, anything else the first.
fn assemble(
    target_type: &GenericType,
    mut values: Vec<Value>,
    registry: &TypeRegistry,
) -> std::result::Result<Value, String> {
    match target_type {
        GenericType::Array(component) => Ok(Value::Array {
            component: class_name(component),
            items: values,
        }),
        ty => match ty.raw_name() {
            Some(class) if registry.is_collection(class) => match registry.new_instance(class)? {
                Value::Collection { class, .. } => Ok(Value::Collection {
                    class,
                    items: values,
                }),
                other => Err(format!("{} is not a collection", other)),
            },
            _ => Ok(values.swap_remove(0)),
        },
    }
}

fn log_binding_failure(name: &str, error: &EvaluationError) {
    match error {
        EvaluationError::NoSuchProperty { .. } => {
            debug!("Could not bind property with name [{}] as it does not exist", name)
        }
        other => debug!("Could not bind property with name [{}]: {}", name, other),
    }
}

/// Required checks for the event being handled. Indexed parameters are
/// checked row by row; a row that was not submitted is not required.
fn validate_required_fields(
    definition: &ActionBeanDefinition,
    parameters: &Parameters,
    event: Option<&str>,
    context: &mut ActionBeanContext,
) {
    let event = event.unwrap_or_default();
    for metadata in definition.validations().filter(|m| m.requires_on(event)) {
        let property = metadata.property();
        let mut indexed = false;

        for (name, values) in parameters
            .iter()
            .filter(|(name, _)| name.contains('[') && strip_indexes(name) == property)
        {
            indexed = true;
            check_required(name, Some(values), context);
        }
        if !indexed {
            check_required(property, parameters.get(property), context);
        }
    }
}

fn check_required(field: &str, values: Option<&Vec<String>>, context: &mut ActionBeanContext) {
    if context.validation_errors().contains_field(field) {
        return;
    }
    let first = values.and_then(|values| values.iter().find(|v| !v.trim().is_empty()));
    if let Err(error) = Required::validate(first.map(String::as_str), field) {
        context.validation_errors_mut().add(error);
    }
}

fn validate_converted_values(
    definition: &ActionBeanDefinition,
    bound: Vec<(String, Vec<Value>)>,
    context: &mut ActionBeanContext,
) {
    for (name, values) in bound {
        if context.validation_errors().contains_field(&name) {
            continue;
        }
        let Some(metadata) = definition.validation_metadata(&strip_indexes(&name)) else {
            continue;
        };
        let errors: Vec<ValidationError> = values
            .iter()
            .filter_map(Value::as_f64)
            .flat_map(|n| metadata.validate_number(&name, n))
            .collect();
        context.validation_errors_mut().extend(errors);
    }
}

/// Complete errors raised during binding and validation with the action
/// path, the bean class and the submitted value (HTML escaped). Errors that
/// already carry an action path are left alone.
pub fn fill_in_validation_errors(context: &mut ActionBeanContext, bean_class: &str) {
    let action_path = context.action_path().unwrap_or_default().to_string();
    let parameters = context.parameters().clone();

    for error in context
        .validation_errors_mut()
        .iter_mut()
        .filter(|e| e.action_path.is_none())
    {
        error.action_path = Some(action_path.clone());
        error.bean_class = Some(bean_class.to_string());
        error.value = match error.value.take() {
            Some(value) => Some(html_escape(&value)),
            None => parameters
                .get(&error.field)
                .and_then(|values| values.first())
                .map(|value| html_escape(value)),
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::ActionFuture;
    use crate::http::ActionRequest;
    use lintel_bean::{ClassDescriptor, Locale};
    use std::sync::Arc;

    fn noop<'a>(_bean: &'a mut ActionBean, _ctx: &'a mut ActionBeanContext) -> ActionFuture<'a> {
        Box::pin(async move { Ok(None) })
    }

    fn registry() -> Arc<TypeRegistry> {
        let mut registry = TypeRegistry::new();
        registry.register(
            ClassDescriptor::class("Address")
                .property("city", GenericType::class("String"))
                .property("zip", GenericType::class("String")),
        );
        registry.register(
            ClassDescriptor::class("RegisterAction")
                .property("name", GenericType::class("String"))
                .property("age", GenericType::class("int"))
                .property("address", GenericType::class("Address"))
                .property("tags", GenericType::list_of(GenericType::class("String")))
                .property("scores", GenericType::array_of(GenericType::class("Integer")))
                .property("nickname", GenericType::class("String"))
                .property("context", GenericType::class("String")),
        );
        Arc::new(registry)
    }

    fn definition() -> ActionBeanDefinition {
        ActionBeanDefinition::new("RegisterAction", "/register")
            .handler("save", noop)
            .validate(ValidationMetadata::new("name").required(true).max_length(10))
            .validate(ValidationMetadata::new("age").min_value(18.0))
            .validate(ValidationMetadata::new("nickname").ignore(true))
    }

    fn bind(request: ActionRequest, validate: bool) -> (ActionBean, ActionBeanContext) {
        let registry = registry();
        let converters = TypeConverterFactory::new().with_registry(registry.clone());
        let introspector = Introspector::new(registry);
        let mut context = ActionBeanContext::new(request, Locale::default());
        context.set_event_name("save");
        context.set_action_path("/register");
        let mut bean = Value::bean("RegisterAction");

        PropertyBinder::default().bind(
            &mut bean,
            &mut context,
            &definition(),
            &introspector,
            &converters,
            validate,
        );
        (bean, context)
    }

    #[test]
    fn test_strip_indexes() {
        assert_eq!(strip_indexes("items[2].name"), "items.name");
        assert_eq!(strip_indexes("map['a'].b[0]"), "map.b");
        assert_eq!(strip_indexes("plain"), "plain");
    }

    #[test]
    fn test_binds_converted_values() {
        let request = ActionRequest::post("/register")
            .with_parameter("name", "  Ada ")
            .with_parameter("age", "36")
            .with_parameter("address.city", "London")
            .with_parameter("tags", "math")
            .with_parameter("tags", "poetry")
            .with_parameter("scores", "3")
            .with_parameter("scores", "4")
            .with_parameter("save", "Save");
        let (bean, context) = bind(request, true);

        assert!(context.validation_errors().is_empty());
        assert_eq!(bean.property("name"), Some(&Value::from("Ada")));
        assert_eq!(bean.property("age"), Some(&Value::Integer(36)));
        assert_eq!(
            bean.property("address").and_then(|a| a.property("city")),
            Some(&Value::from("London"))
        );
        assert_eq!(
            bean.property("tags").and_then(Value::items).map(<[Value]>::len),
            Some(2)
        );
        assert_eq!(
            bean.property("scores"),
            Some(&Value::Array {
                component: "Integer".into(),
                items: vec![Value::Integer(3), Value::Integer(4)],
            })
        );
        assert!(bean.property("save").is_none());
    }

    #[test]
    fn test_denied_ignored_and_unknown_parameters() {
        let request = ActionRequest::post("/register")
            .with_parameter("name", "Ada")
            .with_parameter("context", "evil")
            .with_parameter("nickname", "ace")
            .with_parameter("nonexistent.deep", "x")
            .with_parameter("_sourcePage", "/register.jsp");
        let (bean, context) = bind(request, true);

        assert!(context.validation_errors().is_empty());
        assert!(bean.property("context").is_none());
        assert!(bean.property("nickname").is_none());
        assert!(bean.property("_sourcePage").is_none());
    }

    #[test]
    fn test_list_index_past_maximum_is_skipped() {
        let request = ActionRequest::post("/register")
            .with_parameter("name", "Ada")
            .with_parameter("tags[1]", "poetry")
            .with_parameter("tags[50000000]", "flood");
        let registry = registry();
        let converters = TypeConverterFactory::new().with_registry(registry.clone());
        let introspector = Introspector::new(registry).with_max_list_index(10);
        let mut context = ActionBeanContext::new(request, Locale::default());
        let mut bean = Value::bean("RegisterAction");

        PropertyBinder::default().bind(
            &mut bean,
            &mut context,
            &definition(),
            &introspector,
            &converters,
            true,
        );

        assert!(context.validation_errors().is_empty());
        assert_eq!(bean.property("name"), Some(&Value::from("Ada")));
        let tags = bean.property("tags").and_then(Value::items).unwrap();
        assert_eq!(tags.len(), 2);
        assert_eq!(tags[1], Value::from("poetry"));
    }

    #[test]
    fn test_validation_errors() {
        let request = ActionRequest::post("/register")
            .with_parameter("name", "<b>Bartholomew</b>")
            .with_parameter("age", "12")
            .with_parameter("address.zip", "x");
        let (bean, mut context) = bind(request, true);

        assert_eq!(context.validation_errors().get_field_errors("name").len(), 1);
        assert!(bean.property("name").is_none());
        // converted and bound, then rejected by the range check
        assert_eq!(bean.property("age"), Some(&Value::Integer(12)));
        assert_eq!(context.validation_errors().get_field_errors("age").len(), 1);

        fill_in_validation_errors(&mut context, "RegisterAction");
        let error = &context.validation_errors().get_field_errors("name")[0];
        assert_eq!(error.action_path.as_deref(), Some("/register"));
        assert_eq!(error.bean_class.as_deref(), Some("RegisterAction"));
        assert_eq!(
            error.value.as_deref(),
            Some("&lt;b&gt;Bartholomew&lt;/b&gt;")
        );
    }

    #[test]
    fn test_required_and_conversion_errors() {
        let request = ActionRequest::post("/register")
            .with_parameter("name", "   ")
            .with_parameter("age", "old");
        let (_, context) = bind(request, true);

        let name_errors = context.validation_errors().get_field_errors("name");
        assert_eq!(name_errors.len(), 1);
        assert_eq!(name_errors[0].constraint, "validation.required.valueNotPresent");
        let age_errors = context.validation_errors().get_field_errors("age");
        assert_eq!(age_errors.len(), 1);
        assert_eq!(age_errors[0].value.as_deref(), Some("old"));

        let (_, unvalidated) = bind(ActionRequest::post("/register"), false);
        assert!(unvalidated.validation_errors().is_empty());
    }

    #[test]
    fn test_fields_present_but_not_submitted_are_nulled() {
        let request = ActionRequest::post("/register")
            .with_parameter("name", "Ada")
            .with_parameter("_fields", "name,address.city");
        let registry = registry();
        let converters = TypeConverterFactory::new();
        let introspector = Introspector::new(registry);
        let mut context = ActionBeanContext::new(request, Locale::default());
        let mut bean = Value::bean("RegisterAction")
            .with("address", Value::bean("Address").with("city", "Paris"));

        PropertyBinder::default().bind(
            &mut bean,
            &mut context,
            &definition(),
            &introspector,
            &converters,
            false,
        );

        assert_eq!(
            bean.property("address").and_then(|a| a.property("city")),
            Some(&Value::Null)
        );
        assert_eq!(bean.property("name"), Some(&Value::from("Ada")));
    }
}
