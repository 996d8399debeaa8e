// Error types for expression parsing and evaluation

use thiserror::Error;

/// A property expression could not be parsed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Could not parse property expression '{expression}': {message}")]
pub struct ParseError {
    pub expression: String,
    pub message: String,
}

impl ParseError {
    pub fn new(expression: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            expression: expression.into(),
            message: message.into(),
        }
    }
}

/// Evaluating an expression against a value graph failed.
#[derive(Error, Debug)]
pub enum EvaluationError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(
        "Bean class {bean_class} does not contain a property called '{property}'. \
         As a result the following expression could not be evaluated: {expression}"
    )]
    NoSuchProperty {
        bean_class: String,
        property: String,
        expression: String,
    },

    #[error(
        "Not enough type information available to evaluate expression '{expression}'. \
         Type information ran out at node '{node}', which represents a {detail}"
    )]
    InsufficientTypeInformation {
        expression: String,
        node: String,
        detail: String,
    },

    #[error(
        "Encountered an error while trying to create a default instance for property \
         '{property}' in expression '{expression}': {reason}"
    )]
    DefaultInstantiation {
        property: String,
        expression: String,
        reason: String,
    },

    #[error("Invalid index '{index}' in expression '{expression}': {reason}")]
    InvalidIndex {
        index: String,
        expression: String,
        reason: String,
    },

    #[error("Index {index} is out of bounds for array of length {length} in expression '{expression}'")]
    IndexOutOfBounds {
        index: i64,
        length: usize,
        expression: String,
    },

    #[error("Property '{property}' of {bean_class} is not readable")]
    NotReadable { bean_class: String, property: String },

    #[error("Property '{property}' of {bean_class} is not writable")]
    NotWritable { bean_class: String, property: String },

    #[error("Expected {expected} at node '{node}' of expression '{expression}', found {found}")]
    TypeMismatch {
        expected: String,
        found: String,
        node: String,
        expression: String,
    },
}

pub type Result<T> = std::result::Result<T, EvaluationError>;
