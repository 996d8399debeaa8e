// Per-category access strategies for resolved nodes

use crate::error::{EvaluationError, Result};
use crate::evaluation::NodeEvaluation;
use crate::expression::Literal;
use crate::value::Value;

/// How a node reaches into its container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeType {
    /// A bean property or public field.
    BeanProperty,
    /// An index into a `List`; reads past the end yield nothing, writes grow the list.
    ListEntry,
    /// A key of a `Map`; writing null removes the key.
    MapEntry,
    /// An index into an array; out-of-range access is an error.
    ArrayEntry,
}

fn mismatch(expected: &str, found: &Value, node: &NodeEvaluation, expression: &str) -> EvaluationError {
    EvaluationError::TypeMismatch {
        expected: expected.to_string(),
        found: found.class_name().unwrap_or_else(|| "null".to_string()),
        node: node.node().to_string(),
        expression: expression.to_string(),
    }
}

fn non_null(value: Option<&Value>) -> Option<&Value> {
    value.filter(|v| !v.is_null())
}

fn non_null_mut(value: Option<&mut Value>) -> Option<&mut Value> {
    value.filter(|v| !v.is_null())
}

fn list_index(node: &NodeEvaluation, expression: &str) -> Result<usize> {
    match node.node().typed_value() {
        Literal::Integer(index) if *index >= 0 => Ok(*index as usize),
        Literal::Integer(index) => Err(EvaluationError::InvalidIndex {
            index: index.to_string(),
            expression: expression.to_string(),
            reason: "list indexes cannot be negative".to_string(),
        }),
        other => Err(EvaluationError::InvalidIndex {
            index: node.node().to_string(),
            expression: expression.to_string(),
            reason: format!("list indexes must be integers, found {}", other.class_name()),
        }),
    }
}

fn array_index(node: &NodeEvaluation, length: usize, expression: &str) -> Result<usize> {
    match node.node().typed_value() {
        Literal::Integer(index) if *index >= 0 && (*index as usize) < length => {
            Ok(*index as usize)
        }
        Literal::Integer(index) => Err(EvaluationError::IndexOutOfBounds {
            index: i64::from(*index),
            length,
            expression: expression.to_string(),
        }),
        other => Err(EvaluationError::InvalidIndex {
            index: node.node().to_string(),
            expression: expression.to_string(),
            reason: format!("array indexes must be integers, found {}", other.class_name()),
        }),
    }
}

fn map_key<'n>(node: &'n NodeEvaluation, expression: &str) -> Result<&'n Value> {
    node.key().ok_or_else(|| EvaluationError::InvalidIndex {
        index: node.node().to_string(),
        expression: expression.to_string(),
        reason: "map entry has no resolved key".to_string(),
    })
}

impl NodeType {
    /// Read this node from `container`. Missing and null values are `None`.
    pub fn get<'v>(
        &self,
        node: &NodeEvaluation,
        container: &'v Value,
        expression: &str,
    ) -> Result<Option<&'v Value>> {
        match (self, container) {
            (NodeType::BeanProperty, Value::Bean { class, properties }) => {
                check_readable(node, class)?;
                Ok(non_null(properties.get(node.node().string_value())))
            }
            (NodeType::ListEntry, Value::Collection { items, .. }) => {
                let index = list_index(node, expression)?;
                Ok(non_null(items.get(index)))
            }
            (NodeType::MapEntry, Value::Map { entries, .. }) => {
                Ok(non_null(entries.get(map_key(node, expression)?)))
            }
            (NodeType::ArrayEntry, Value::Array { items, .. }) => {
                let index = array_index(node, items.len(), expression)?;
                Ok(non_null(items.get(index)))
            }
            (node_type, other) => Err(mismatch(node_type.container_name(), other, node, expression)),
        }
    }

    /// Mutable counterpart of [`get`](Self::get).
    pub fn get_mut<'v>(
        &self,
        node: &NodeEvaluation,
        container: &'v mut Value,
        expression: &str,
    ) -> Result<Option<&'v mut Value>> {
        match (self, container) {
            (NodeType::BeanProperty, Value::Bean { class, properties }) => {
                check_readable(node, class)?;
                Ok(non_null_mut(properties.get_mut(node.node().string_value())))
            }
            (NodeType::ListEntry, Value::Collection { items, .. }) => {
                let index = list_index(node, expression)?;
                Ok(non_null_mut(items.get_mut(index)))
            }
            (NodeType::MapEntry, Value::Map { entries, .. }) => {
                Ok(non_null_mut(entries.get_mut(map_key(node, expression)?)))
            }
            (NodeType::ArrayEntry, Value::Array { items, .. }) => {
                let index = array_index(node, items.len(), expression)?;
                Ok(non_null_mut(items.get_mut(index)))
            }
            (node_type, other) => Err(mismatch(node_type.container_name(), other, node, expression)),
        }
    }

    /// Write `value` for this node into `container`.
    pub fn set(
        &self,
        node: &NodeEvaluation,
        container: &mut Value,
        value: Value,
        expression: &str,
    ) -> Result<()> {
        match (self, container) {
            (NodeType::BeanProperty, Value::Bean { class, properties }) => {
                if let Some(property) = node.property() {
                    if !property.writable {
                        return Err(EvaluationError::NotWritable {
                            bean_class: class.clone(),
                            property: property.name.clone(),
                        });
                    }
                }
                properties.insert(node.node().string_value().to_string(), value);
                Ok(())
            }
            (NodeType::ListEntry, Value::Collection { items, .. }) => {
                let index = list_index(node, expression)?;
                if items.len() <= index {
                    items.resize(index + 1, Value::Null);
                }
                items[index] = value;
                Ok(())
            }
            (NodeType::MapEntry, Value::Map { entries, .. }) => {
                let key = map_key(node, expression)?.clone();
                if value.is_null() {
                    entries.shift_remove(&key);
                } else {
                    entries.insert(key, value);
                }
                Ok(())
            }
            (NodeType::ArrayEntry, Value::Array { items, .. }) => {
                let index = array_index(node, items.len(), expression)?;
                items[index] = value;
                Ok(())
            }
            (node_type, other) => Err(mismatch(node_type.container_name(), other, node, expression)),
        }
    }

    fn container_name(&self) -> &'static str {
        match self {
            NodeType::BeanProperty => "a bean",
            NodeType::ListEntry => "a list",
            NodeType::MapEntry => "a map",
            NodeType::ArrayEntry => "an array",
        }
    }
}

fn check_readable(node: &NodeEvaluation, class: &str) -> Result<()> {
    match node.property() {
        Some(property) if !property.readable => Err(EvaluationError::NotReadable {
            bean_class: class.to_string(),
            property: property.name.clone(),
        }),
        _ => Ok(()),
    }
}
