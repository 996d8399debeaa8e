// Entry point for evaluating expressions against values

use crate::accessor::NodeType;
use crate::conversion::{Locale, TypeConversion};
use crate::error::{EvaluationError, Result};
use crate::evaluation::{self, NodeEvaluation, PropertyExpressionEvaluation};
use crate::expression::PropertyExpression;
use crate::registry::TypeRegistry;
use crate::resolver::TypeResolver;
use crate::types::GenericType;
use crate::value::Value;
use std::fmt;
use std::sync::Arc;

/// Highest list index a write may grow a list to.
pub const DEFAULT_MAX_LIST_INDEX: usize = 10_000;

/// Evaluates property expressions using a shared [`TypeRegistry`].
///
/// Expressions are parsed through the global [`ExpressionCache`](crate::ExpressionCache),
/// so repeated evaluation of the same text does not re-parse it.
///
/// # Examples
///
/// ```
/// use lintel_bean::{ClassDescriptor, GenericType, Introspector, TypeRegistry, Value};
/// use std::sync::Arc;
///
/// let mut registry = TypeRegistry::new();
/// registry.register(
///     ClassDescriptor::class("Person").property("name", GenericType::class("String")),
/// );
/// let introspector = Introspector::new(Arc::new(registry));
///
/// let mut person = Value::bean("Person");
/// introspector.set_value("name", &mut person, Value::from("Ada")).unwrap();
/// assert_eq!(
///     introspector.get_value("name", &person).unwrap(),
///     Some(&Value::from("Ada"))
/// );
/// ```
#[derive(Clone)]
pub struct Introspector {
    registry: Arc<TypeRegistry>,
    converter: Option<Arc<dyn TypeConversion>>,
    locale: Locale,
    max_list_index: usize,
}

impl Introspector {
    pub fn new(registry: Arc<TypeRegistry>) -> Self {
        Self {
            registry,
            converter: None,
            locale: Locale::default(),
            max_list_index: DEFAULT_MAX_LIST_INDEX,
        }
    }

    /// Use `converter` for map keys whose declared class differs from the literal.
    pub fn with_converter(mut self, converter: Arc<dyn TypeConversion>) -> Self {
        self.converter = Some(converter);
        self
    }

    pub fn with_locale(mut self, locale: Locale) -> Self {
        self.locale = locale;
        self
    }

    /// Reject writes to list indexes above `max_list_index`.
    pub fn with_max_list_index(mut self, max_list_index: usize) -> Self {
        self.max_list_index = max_list_index;
        self
    }

    pub fn max_list_index(&self) -> usize {
        self.max_list_index
    }

    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    pub fn converter(&self) -> Option<&dyn TypeConversion> {
        self.converter.as_deref()
    }

    pub fn locale(&self) -> &Locale {
        &self.locale
    }

    /// Default instance for a node whose value is missing.
    pub(crate) fn default_value(&self, node: &NodeEvaluation, expression: &str) -> Result<Value> {
        let types = TypeResolver::new(&self.registry);
        let class = types.convert_to_class(node.value_type());

        let created = match &class {
            Some(GenericType::Array(component)) => Ok(Value::Array {
                component: component.to_string(),
                items: Vec::new(),
            }),
            Some(GenericType::Class(name)) => self.registry.new_instance(name),
            _ => Err(format!("the type {} cannot be resolved to a class", node.value_type())),
        };

        created.map_err(|reason| EvaluationError::DefaultInstantiation {
            property: describe(node),
            expression: expression.to_string(),
            reason,
        })
    }

    /// Parse `expression` and resolve it against `bean`.
    pub fn evaluate<'v>(
        &'v self,
        expression: &str,
        bean: &'v mut Value,
    ) -> Result<PropertyExpressionEvaluation<'v>> {
        let expression = PropertyExpression::get_expression(expression)?;
        PropertyExpressionEvaluation::new(self, expression, bean)
    }

    pub fn get_value<'v>(&self, expression: &str, bean: &'v Value) -> Result<Option<&'v Value>> {
        let expression = PropertyExpression::get_expression(expression)?;
        let nodes = evaluation::resolve_nodes(self, &expression, bean)?;
        evaluation::read_path(&nodes, bean, expression.source())
    }

    pub fn set_value(&self, expression: &str, bean: &mut Value, value: Value) -> Result<()> {
        self.evaluate(expression, bean)?.set_value(value)
    }

    pub fn set_to_null(&self, expression: &str, bean: &mut Value) -> Result<()> {
        self.evaluate(expression, bean)?.set_to_null()
    }

    pub fn get_type(&self, expression: &str, bean: &Value) -> Result<Option<GenericType>> {
        let leaf = self.resolve_leaf(expression, bean)?;
        Ok(evaluation::leaf_type(self, &leaf))
    }

    pub fn get_scalar_type(&self, expression: &str, bean: &Value) -> Result<Option<GenericType>> {
        let leaf = self.resolve_leaf(expression, bean)?;
        Ok(evaluation::scalar_type(self, &leaf))
    }

    fn resolve_leaf(&self, expression: &str, bean: &Value) -> Result<NodeEvaluation> {
        let expression = PropertyExpression::get_expression(expression)?;
        let mut nodes = evaluation::resolve_nodes(self, &expression, bean)?;
        nodes.pop().ok_or_else(|| {
            EvaluationError::Parse(crate::error::ParseError::new(
                expression.source(),
                "expression contains no nodes",
            ))
        })
    }
}

fn describe(node: &NodeEvaluation) -> String {
    match node.node_type() {
        NodeType::BeanProperty => node.node().string_value().to_string(),
        _ => format!("[{}]", node.node()),
    }
}

impl fmt::Debug for Introspector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Introspector")
            .field("converter", &self.converter.is_some())
            .field("locale", &self.locale)
            .field("max_list_index", &self.max_list_index)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ClassDescriptor;

    fn introspector() -> Introspector {
        let mut registry = TypeRegistry::new();
        registry.register(
            ClassDescriptor::class("Order")
                .property("customer", GenericType::class("Customer"))
                .property("tags", GenericType::array_of(GenericType::class("String")))
                .property("shape", GenericType::class("Shape")),
        );
        registry.register(
            ClassDescriptor::class("Customer").property("name", GenericType::class("String")),
        );
        registry.register(ClassDescriptor::abstract_class("Shape"));
        Introspector::new(Arc::new(registry))
    }

    #[test]
    fn test_nested_set_creates_intermediates() {
        let introspector = introspector();
        let mut order = Value::bean("Order");
        introspector
            .set_value("customer.name", &mut order, Value::from("Grace"))
            .unwrap();

        let customer = order.property("customer").unwrap();
        assert_eq!(customer.class_name().as_deref(), Some("Customer"));
        assert_eq!(
            introspector.get_value("customer.name", &order).unwrap(),
            Some(&Value::from("Grace"))
        );
    }

    #[test]
    fn test_get_does_not_create_intermediates() {
        let introspector = introspector();
        let order = Value::bean("Order");
        assert_eq!(introspector.get_value("customer.name", &order).unwrap(), None);
        assert_eq!(order, Value::bean("Order"));
    }

    #[test]
    fn test_default_for_abstract_class_without_implementation() {
        let introspector = introspector();
        let mut order = Value::bean("Order");
        let err = introspector
            .set_value("shape.sides", &mut order, Value::Integer(3))
            .unwrap_err();
        match err {
            EvaluationError::DefaultInstantiation { property, reason, .. } => {
                assert_eq!(property, "shape");
                assert!(reason.contains("abstract class Shape"));
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_types_of_leaf() {
        let introspector = introspector();
        let order = Value::bean("Order");
        assert_eq!(
            introspector.get_type("customer.name", &order).unwrap(),
            Some(GenericType::class("String"))
        );
        assert_eq!(
            introspector.get_scalar_type("tags", &order).unwrap(),
            Some(GenericType::class("String"))
        );
    }

    #[test]
    fn test_parse_errors_surface() {
        let introspector = introspector();
        let order = Value::bean("Order");
        let err = introspector.get_value("customer[", &order).unwrap_err();
        assert!(matches!(err, EvaluationError::Parse(_)));
    }
}
