// Evaluation of a parsed expression against one root value

use crate::accessor::NodeType;
use crate::error::{EvaluationError, Result};
use crate::expression::{Literal, Node, PropertyExpression};
use crate::introspector::Introspector;
use crate::registry::{ResolvedProperty, TypeRegistry};
use crate::resolver::{ExpressionResolver, TypeResolver};
use crate::types::GenericType;
use crate::value::Value;
use std::sync::Arc;

/// A node paired with the type information resolved for one evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeEvaluation {
    node: Node,
    node_type: NodeType,
    value_type: GenericType,
    key_type: Option<GenericType>,
    pub(crate) key: Option<Value>,
    pub(crate) property: Option<ResolvedProperty>,
}

impl NodeEvaluation {
    pub(crate) fn new(
        node: Node,
        node_type: NodeType,
        value_type: GenericType,
        key_type: Option<GenericType>,
    ) -> Self {
        Self {
            node,
            node_type,
            value_type,
            key_type,
            key: None,
            property: None,
        }
    }

    pub fn node(&self) -> &Node {
        &self.node
    }

    pub fn node_type(&self) -> NodeType {
        self.node_type
    }

    /// Declared type of the value this node points at.
    pub fn value_type(&self) -> &GenericType {
        &self.value_type
    }

    /// Index or key class for list, array and map entries.
    pub fn key_type(&self) -> Option<&GenericType> {
        self.key_type.as_ref()
    }

    /// Map key after conversion to the declared key class.
    pub fn key(&self) -> Option<&Value> {
        self.key.as_ref()
    }

    /// The property or field behind a bean node.
    pub fn property(&self) -> Option<&ResolvedProperty> {
        self.property.as_ref()
    }

    pub fn get<'v>(&self, container: &'v Value, expression: &str) -> Result<Option<&'v Value>> {
        self.node_type.get(self, container, expression)
    }

    pub fn get_mut<'v>(
        &self,
        container: &'v mut Value,
        expression: &str,
    ) -> Result<Option<&'v mut Value>> {
        self.node_type.get_mut(self, container, expression)
    }

    pub fn set(&self, container: &mut Value, value: Value, expression: &str) -> Result<()> {
        self.node_type.set(self, container, value, expression)
    }
}

/// An expression bound to a root value.
///
/// Construction resolves the type of every node up front; the value graph
/// is only touched by the get and set operations afterwards.
pub struct PropertyExpressionEvaluation<'a> {
    introspector: &'a Introspector,
    expression: Arc<PropertyExpression>,
    bean: &'a mut Value,
    nodes: Vec<NodeEvaluation>,
}

impl<'a> PropertyExpressionEvaluation<'a> {
    pub fn new(
        introspector: &'a Introspector,
        expression: Arc<PropertyExpression>,
        bean: &'a mut Value,
    ) -> Result<Self> {
        let nodes = resolve_nodes(introspector, &expression, bean)?;
        Ok(Self {
            introspector,
            expression,
            bean,
            nodes,
        })
    }

    pub fn expression(&self) -> &PropertyExpression {
        &self.expression
    }

    pub fn bean(&self) -> &Value {
        &*self.bean
    }

    pub fn nodes(&self) -> &[NodeEvaluation] {
        &self.nodes
    }

    fn source(&self) -> &str {
        self.expression.source()
    }

    fn leaf(&self) -> &NodeEvaluation {
        // Expressions always contain at least one node.
        &self.nodes[self.nodes.len() - 1]
    }

    /// Whether the leaf's type could be pinned down to a class.
    pub fn is_type_information_valid(&self) -> bool {
        self.get_type().is_some()
    }

    /// Walk to the leaf; `None` as soon as any value on the way is missing.
    pub fn get_value(&self) -> Result<Option<&Value>> {
        read_path(&self.nodes, &*self.bean, self.source())
    }

    /// Fails when a list entry on the path lies past the introspector's
    /// maximum list index, before anything is written.
    fn check_list_indexes(&self) -> Result<()> {
        let max = self.introspector.max_list_index();
        for node in self.nodes.iter().filter(|n| n.node_type() == NodeType::ListEntry) {
            if let Literal::Integer(index) = node.node().typed_value() {
                if *index >= 0 && *index as usize > max {
                    return Err(EvaluationError::InvalidIndex {
                        index: index.to_string(),
                        expression: self.source().to_string(),
                        reason: format!("list indexes above {} are not allowed", max),
                    });
                }
            }
        }
        Ok(())
    }

    /// Assign the leaf, creating default instances for missing intermediates.
    pub fn set_value(&mut self, value: Value) -> Result<()> {
        self.check_list_indexes()?;
        let source = self.expression.source();
        let Some((leaf, path)) = self.nodes.split_last() else {
            return Ok(());
        };

        let mut current: &mut Value = &mut *self.bean;
        for node in path {
            if node.get(current, source)?.is_none() {
                let default = self.introspector.default_value(node, source)?;
                node.set(current, default, source)?;
            }
            current = node
                .get_mut(current, source)?
                .ok_or_else(|| EvaluationError::DefaultInstantiation {
                    property: node.node().to_string(),
                    expression: source.to_string(),
                    reason: "the created instance could not be read back".to_string(),
                })?;
        }

        leaf.set(current, value, source)
    }

    /// Reset the leaf without creating anything: maps and collections are
    /// emptied, other properties get their type's zero value.
    pub fn set_to_null(&mut self) -> Result<()> {
        let source = self.expression.source();
        let registry = self.introspector.registry();
        let Some((leaf, path)) = self.nodes.split_last() else {
            return Ok(());
        };

        let mut current: &mut Value = &mut *self.bean;
        for node in path {
            match node.get_mut(current, source)? {
                Some(next) => current = next,
                None => return Ok(()),
            }
        }

        let leaf_class = TypeResolver::new(registry)
            .convert_to_class(leaf.value_type())
            .and_then(|c| c.raw_name().map(str::to_string));

        match leaf_class {
            Some(class) if registry.is_map(&class) || registry.is_collection(&class) => {
                match leaf.get_mut(current, source)? {
                    Some(Value::Map { entries, .. }) => entries.clear(),
                    Some(Value::Collection { items, .. }) => items.clear(),
                    Some(other) => *other = Value::Null,
                    None => {}
                }
                Ok(())
            }
            Some(class) => leaf.set(current, TypeRegistry::zero_value(&class), source),
            None => leaf.set(current, Value::Null, source),
        }
    }

    /// Class form of the leaf's declared type.
    pub fn get_type(&self) -> Option<GenericType> {
        leaf_type(self.introspector, self.leaf())
    }

    /// Element type for array, collection and map leaves (`String` when the
    /// declaration does not say); the leaf type itself otherwise.
    pub fn get_scalar_type(&self) -> Option<GenericType> {
        scalar_type(self.introspector, self.leaf())
    }
}

pub(crate) fn resolve_nodes(
    introspector: &Introspector,
    expression: &PropertyExpression,
    bean: &Value,
) -> Result<Vec<NodeEvaluation>> {
    ExpressionResolver::new(introspector, expression).resolve(bean)
}

pub(crate) fn read_path<'v>(
    nodes: &[NodeEvaluation],
    bean: &'v Value,
    source: &str,
) -> Result<Option<&'v Value>> {
    let mut current = bean;
    for node in nodes {
        match node.get(current, source)? {
            Some(next) => current = next,
            None => return Ok(None),
        }
    }
    Ok(Some(current))
}

pub(crate) fn leaf_type(introspector: &Introspector, leaf: &NodeEvaluation) -> Option<GenericType> {
    TypeResolver::new(introspector.registry()).convert_to_class(leaf.value_type())
}

pub(crate) fn scalar_type(introspector: &Introspector, leaf: &NodeEvaluation) -> Option<GenericType> {
    let types = TypeResolver::new(introspector.registry());
    let declared = types.unwrap(leaf.value_type())?;
    let class = types.convert_to_class(&declared)?;
    let string = || GenericType::class("String");

    if let GenericType::Array(component) = &class {
        return Some((**component).clone());
    }
    if types.is_map(&class) {
        return Some(
            types
                .map_entry_types(&declared)
                .and_then(|(_, value)| types.convert_to_class(&value))
                .unwrap_or_else(string),
        );
    }
    if types.is_collection(&class) {
        return Some(
            types
                .collection_element(&declared)
                .and_then(|element| types.convert_to_class(&element))
                .unwrap_or_else(string),
        );
    }
    Some(class)
}
