// Type resolution: substitution environments and the per-node type walk

use crate::accessor::NodeType;
use crate::error::{EvaluationError, Result};
use crate::evaluation::NodeEvaluation;
use crate::expression::{Literal, Node, PropertyExpression};
use crate::introspector::Introspector;
use crate::registry::{ResolvedProperty, TypeRegistry};
use crate::types::GenericType;
use crate::value::Value;
use lintel_log::{debug, warn};
use std::borrow::Cow;
use std::collections::{HashMap, HashSet};

const MAX_RESOLUTION_DEPTH: usize = 32;

/// Maps `(declaring class, type parameter)` to the type bound to it.
///
/// Built once per container type by walking its supertypes top-down: the
/// container's own arguments are bound first, then each generic supertype's
/// arguments after substituting what is already known. For
/// `Sub extends Base<Long>` this binds `(Base, N)` to `Long`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TypeBindings {
    bindings: HashMap<(String, String), GenericType>,
}

impl TypeBindings {
    pub fn for_type(registry: &TypeRegistry, ty: &GenericType) -> Self {
        let mut bindings = Self::default();
        let mut visited = HashSet::new();
        match ty {
            GenericType::Parameterized { raw, args } => {
                bindings.bind_class(registry, raw, args, &mut visited)
            }
            GenericType::Class(raw) => bindings.bind_class(registry, raw, &[], &mut visited),
            _ => {}
        }
        bindings
    }

    fn bind_class(
        &mut self,
        registry: &TypeRegistry,
        class: &str,
        args: &[GenericType],
        visited: &mut HashSet<String>,
    ) {
        if !visited.insert(class.to_string()) {
            return;
        }
        let Some(descriptor) = registry.get(class) else {
            return;
        };

        for (param, arg) in descriptor.type_params.iter().zip(args) {
            self.bindings
                .insert((class.to_string(), param.name.clone()), arg.clone());
        }

        for supertype in descriptor.supertypes() {
            match self.substitute(supertype) {
                GenericType::Parameterized { raw, args } => {
                    self.bind_class(registry, &raw, &args, visited)
                }
                GenericType::Class(raw) => self.bind_class(registry, &raw, &[], visited),
                _ => {}
            }
        }
    }

    pub fn lookup(&self, class: &str, variable: &str) -> Option<&GenericType> {
        self.bindings
            .get(&(class.to_string(), variable.to_string()))
    }

    /// Replace every bound type variable inside `ty`.
    pub fn substitute(&self, ty: &GenericType) -> GenericType {
        self.substitute_at(ty, 0)
    }

    fn substitute_at(&self, ty: &GenericType, depth: usize) -> GenericType {
        if depth > MAX_RESOLUTION_DEPTH {
            return ty.clone();
        }
        match ty {
            GenericType::Class(_) => ty.clone(),
            GenericType::Variable { name, declared_by } => match self.lookup(declared_by, name) {
                Some(bound) if bound != ty => self.substitute_at(bound, depth + 1),
                _ => ty.clone(),
            },
            GenericType::Parameterized { raw, args } => GenericType::Parameterized {
                raw: raw.clone(),
                args: args.iter().map(|a| self.substitute_at(a, depth + 1)).collect(),
            },
            GenericType::Wildcard { upper, lower } => GenericType::Wildcard {
                upper: upper.iter().map(|a| self.substitute_at(a, depth + 1)).collect(),
                lower: lower.iter().map(|a| self.substitute_at(a, depth + 1)).collect(),
            },
            GenericType::Array(component) => {
                GenericType::array_of(self.substitute_at(component, depth + 1))
            }
        }
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

/// Type queries that need the registry: unwrapping, class forms, element types.
#[derive(Clone, Copy)]
pub struct TypeResolver<'a> {
    registry: &'a TypeRegistry,
}

impl<'a> TypeResolver<'a> {
    pub fn new(registry: &'a TypeRegistry) -> Self {
        Self { registry }
    }

    /// Strip wildcards (lower bound first, then upper, `Object` when unbounded)
    /// and unbound type variables (their first declared bound). `None` when a
    /// variable has nothing to fall back on.
    pub fn unwrap(&self, ty: &GenericType) -> Option<GenericType> {
        let mut current = ty.clone();
        for _ in 0..MAX_RESOLUTION_DEPTH {
            current = match current {
                GenericType::Wildcard { upper, lower } => lower
                    .into_iter()
                    .next()
                    .or_else(|| upper.into_iter().next())
                    .unwrap_or_else(|| GenericType::class("Object")),
                GenericType::Variable { name, declared_by } => self
                    .registry
                    .get(&declared_by)?
                    .type_params
                    .iter()
                    .find(|p| p.name == name)?
                    .bounds
                    .first()?
                    .clone(),
                other => return Some(other),
            };
        }
        None
    }

    /// The class form of a type: raw class of a parameterized type, arrays of
    /// class forms, wildcards and variables unwrapped.
    pub fn convert_to_class(&self, ty: &GenericType) -> Option<GenericType> {
        match self.unwrap(ty)? {
            GenericType::Parameterized { raw, .. } => Some(GenericType::Class(raw)),
            GenericType::Array(component) => Some(GenericType::array_of(
                self.convert_to_class(&component)
                    .unwrap_or_else(|| GenericType::class("Object")),
            )),
            class => Some(class),
        }
    }

    /// Class name of a class form (`String`, `String[]`).
    pub fn class_name(&self, ty: &GenericType) -> Option<String> {
        self.convert_to_class(ty).map(|c| c.to_string())
    }

    fn bound_argument(
        &self,
        ty: &GenericType,
        interface: &str,
        variable: &str,
        position: usize,
    ) -> Option<GenericType> {
        let bindings = TypeBindings::for_type(self.registry, ty);
        let bound = bindings
            .lookup(interface, variable)
            .map(|b| bindings.substitute(b))
            .filter(|b| !matches!(b, GenericType::Variable { .. }) || self.unwrap(b).is_some());
        bound.or_else(|| ty.type_args().get(position).cloned())
    }

    /// Declared element type of a collection type, if known.
    pub fn collection_element(&self, ty: &GenericType) -> Option<GenericType> {
        self.bound_argument(ty, "Collection", "E", 0)
    }

    /// Declared `(key, value)` types of a map type, if known.
    pub fn map_entry_types(&self, ty: &GenericType) -> Option<(GenericType, GenericType)> {
        Some((
            self.bound_argument(ty, "Map", "K", 0)?,
            self.bound_argument(ty, "Map", "V", 1)?,
        ))
    }

    pub fn is_list(&self, ty: &GenericType) -> bool {
        ty.raw_name().is_some_and(|raw| self.registry.is_list(raw))
    }

    pub fn is_map(&self, ty: &GenericType) -> bool {
        ty.raw_name().is_some_and(|raw| self.registry.is_map(raw))
    }

    pub fn is_collection(&self, ty: &GenericType) -> bool {
        ty.raw_name()
            .is_some_and(|raw| self.registry.is_collection(raw))
    }
}

/// Walks an expression against a root value, assigning each node its
/// category and declared type.
pub(crate) struct ExpressionResolver<'a> {
    introspector: &'a Introspector,
    types: TypeResolver<'a>,
    expression: &'a PropertyExpression,
}

impl<'a> ExpressionResolver<'a> {
    pub(crate) fn new(introspector: &'a Introspector, expression: &'a PropertyExpression) -> Self {
        Self {
            introspector,
            types: TypeResolver::new(introspector.registry()),
            expression,
        }
    }

    pub(crate) fn resolve(&self, root: &Value) -> Result<Vec<NodeEvaluation>> {
        let mut current = root.runtime_type().ok_or_else(|| EvaluationError::TypeMismatch {
            expected: "a non-null root object".to_string(),
            found: "null".to_string(),
            node: self.expression.root_node().to_string(),
            expression: self.expression.source().to_string(),
        })?;

        let mut evaluations: Vec<NodeEvaluation> = Vec::with_capacity(self.expression.nodes().len());
        for node in self.expression.nodes() {
            let evaluation = match self.resolve_static(&current, node) {
                Some(evaluation) => evaluation,
                None => {
                    debug!(
                        "Declared types ran out at node '{}' of '{}'; inspecting instances",
                        node,
                        self.expression
                    );
                    self.resolve_from_instances(&evaluations, node, root)?
                }
            };
            current = evaluation.value_type().clone();
            evaluations.push(evaluation);
        }

        Ok(evaluations)
    }

    fn resolve_static(&self, container: &GenericType, node: &Node) -> Option<NodeEvaluation> {
        let container = self.types.unwrap(container)?;
        let registry = self.introspector.registry();

        if let GenericType::Array(component) = &container {
            return Some(NodeEvaluation::new(
                node.clone(),
                NodeType::ArrayEntry,
                (**component).clone(),
                Some(GenericType::class("Integer")),
            ));
        }

        let raw = container.raw_name()?;
        let parameterized = matches!(container, GenericType::Parameterized { .. });

        if registry.is_list(raw) {
            if let Some(element) = self.types.collection_element(&container) {
                return Some(NodeEvaluation::new(
                    node.clone(),
                    NodeType::ListEntry,
                    element,
                    Some(GenericType::class("Integer")),
                ));
            }
        } else if registry.is_map(raw) {
            if let Some((key, value)) = self.types.map_entry_types(&container) {
                let key_type = self.types.convert_to_class(&key);
                let mut evaluation =
                    NodeEvaluation::new(node.clone(), NodeType::MapEntry, value, key_type);
                evaluation.key = Some(self.map_key(node, evaluation.key_type()));
                return Some(evaluation);
            }
        }
        if parameterized && (registry.is_list(raw) || registry.is_map(raw)) {
            return None;
        }

        let property = registry.find_property(raw, node.string_value())?;
        let bindings = TypeBindings::for_type(registry, &container);
        Some(self.bean_property(node, property, &bindings))
    }

    fn bean_property(
        &self,
        node: &Node,
        property: ResolvedProperty,
        bindings: &TypeBindings,
    ) -> NodeEvaluation {
        let value_type = bindings.substitute(&property.declared_type);
        let mut evaluation =
            NodeEvaluation::new(node.clone(), NodeType::BeanProperty, value_type, None);
        evaluation.property = Some(property);
        evaluation
    }

    fn resolve_from_instances(
        &self,
        previous: &[NodeEvaluation],
        node: &Node,
        root: &Value,
    ) -> Result<NodeEvaluation> {
        let source = self.expression.source();
        let mut container: Cow<'_, Value> = Cow::Borrowed(root);

        // Defaults stand in for missing values but are not written back.
        for evaluation in previous {
            let next = match container {
                Cow::Borrowed(value) => evaluation.get(value, source)?.map(Cow::Borrowed),
                Cow::Owned(ref value) => evaluation.get(value, source)?.cloned().map(Cow::Owned),
            };
            container = match next {
                Some(next) => next,
                None => Cow::Owned(self.introspector.default_value(evaluation, source)?),
            };
        }

        let literal = node.typed_value();
        match container.as_ref() {
            Value::Map { entries, .. } => {
                let key = literal.to_value();
                match entries.get(&key).and_then(Value::runtime_type) {
                    Some(value_type) => {
                        let mut evaluation = NodeEvaluation::new(
                            node.clone(),
                            NodeType::MapEntry,
                            value_type,
                            Some(GenericType::class(literal.class_name())),
                        );
                        evaluation.key = Some(key);
                        Ok(evaluation)
                    }
                    None => Err(EvaluationError::InsufficientTypeInformation {
                        expression: source.to_string(),
                        node: node.to_string(),
                        detail: format!(
                            "Map entry. Please ensure that either the Map is declared with \
                             generic type information or that it contains a value with the key \
                             type {} and value {}",
                            literal.class_name(),
                            node
                        ),
                    }),
                }
            }
            Value::Collection { class, items } if self.introspector.registry().is_list(class) => {
                let found = match literal {
                    Literal::Integer(index) if *index >= 0 => items
                        .get(*index as usize)
                        .and_then(Value::runtime_type),
                    _ => None,
                };
                found
                    .map(|value_type| {
                        NodeEvaluation::new(
                            node.clone(),
                            NodeType::ListEntry,
                            value_type,
                            Some(GenericType::class("Integer")),
                        )
                    })
                    .ok_or_else(|| EvaluationError::InsufficientTypeInformation {
                        expression: source.to_string(),
                        node: node.to_string(),
                        detail: format!(
                            "List entry. Please ensure that either the List is declared with \
                             generic type information or that the index is numeric and a value \
                             exists at the supplied index ({}).",
                            node
                        ),
                    })
            }
            other => {
                let class = other.class_name().unwrap_or_else(|| "null".to_string());
                let registry = self.introspector.registry();
                match registry.find_property(&class, node.string_value()) {
                    Some(property) => {
                        let bindings =
                            TypeBindings::for_type(registry, &GenericType::class(class.clone()));
                        Ok(self.bean_property(node, property, &bindings))
                    }
                    None => Err(EvaluationError::NoSuchProperty {
                        bean_class: class,
                        property: node.string_value().to_string(),
                        expression: source.to_string(),
                    }),
                }
            }
        }
    }

    /// Convert a node's literal to the declared key class. Failures keep the
    /// literal and are logged.
    fn map_key(&self, node: &Node, key_type: Option<&GenericType>) -> Value {
        let literal = node.typed_value();
        let key_class = match key_type {
            Some(GenericType::Class(name)) => name.as_str(),
            _ => return literal.to_value(),
        };
        if key_class == literal.class_name() || key_class == "Object" {
            return literal.to_value();
        }

        let text = node.string_value();
        let converted = self.introspector.converter().and_then(|converter| {
            converter.convert(text, key_class, self.introspector.locale())
        });

        match converted {
            Some(Ok(value)) => value,
            Some(Err(errors)) => {
                warn!(
                    "Could not convert map key '{}' to {} in expression '{}' ({}); using the {} key",
                    text,
                    key_class,
                    self.expression,
                    errors.join("; "),
                    literal.class_name()
                );
                literal.to_value()
            }
            None if key_class == "String" || key_class == "CharSequence" => {
                Value::String(text.to_string())
            }
            None => {
                warn!(
                    "No converter for map key type {} in expression '{}'; using the {} key '{}'",
                    key_class,
                    self.expression,
                    literal.class_name(),
                    text
                );
                literal.to_value()
            }
        }
    }
}
