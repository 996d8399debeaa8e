//! Property-expression binding for Lintel.
//!
//! Expressions such as `person.addresses[0].city` or `scores['math']` name a
//! location inside a graph of [`Value`]s. An [`Introspector`] parses them
//! (through a bounded [`ExpressionCache`]), resolves each node against the
//! classes in a [`TypeRegistry`] and then reads or writes the location,
//! creating missing intermediate objects on write.
//!
//! ```
//! use lintel_bean::{ClassDescriptor, GenericType, Introspector, TypeRegistry, Value};
//! use std::sync::Arc;
//!
//! let mut registry = TypeRegistry::new();
//! registry.register(
//!     ClassDescriptor::class("Survey").property(
//!         "scores",
//!         GenericType::map_of(GenericType::class("String"), GenericType::class("Integer")),
//!     ),
//! );
//! let introspector = Introspector::new(Arc::new(registry));
//!
//! let mut survey = Value::bean("Survey");
//! introspector.set_value("scores['math']", &mut survey, Value::Integer(7)).unwrap();
//! assert_eq!(
//!     introspector.get_value("scores[\"math\"]", &survey).unwrap(),
//!     Some(&Value::Integer(7))
//! );
//! ```

pub mod accessor;
pub mod conversion;
pub mod error;
pub mod evaluation;
pub mod expression;
pub mod introspector;
pub mod registry;
pub mod resolver;
pub mod types;
pub mod value;

pub use accessor::NodeType;
pub use conversion::{Locale, TypeConversion};
pub use error::{EvaluationError, ParseError, Result};
pub use evaluation::{NodeEvaluation, PropertyExpressionEvaluation};
pub use expression::{
    DEFAULT_CACHE_CAPACITY, ExpressionCache, Literal, Node, PropertyExpression,
};
pub use introspector::{DEFAULT_MAX_LIST_INDEX, Introspector};
pub use registry::{ResolvedProperty, TypeRegistry};
pub use resolver::{TypeBindings, TypeResolver};
pub use types::{ClassDescriptor, ClassKind, GenericType, PropertyDescriptor, TypeParameter};
pub use value::Value;
