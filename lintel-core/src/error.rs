// Error types for request dispatch

use lintel_bean::EvaluationError;
use lintel_config::ConfigError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("No action bean is bound to '{0}'")]
    ActionBeanNotFound(String),

    #[error("Action bean {bean_class} has no handler for event '{event}'")]
    HandlerNotFound { bean_class: String, event: String },

    #[error("Could not instantiate action bean {class}: {reason}")]
    Instantiation { class: String, reason: String },

    #[error(
        "The request to {0} generated validation errors, but no source page was supplied \
         in the '_sourcePage' parameter to return to"
    )]
    NoSourcePage(String),

    #[error("Invalid URL binding: {0}")]
    UrlBinding(String),

    #[error("URL {uri} matches more than one binding: {}", .candidates.join(", "))]
    UrlBindingConflict { uri: String, candidates: Vec<String> },

    #[error(transparent)]
    Evaluation(#[from] EvaluationError),

    #[error("Interceptor error: {0}")]
    Interceptor(String),

    #[error("Handler error: {0}")]
    Handler(String),

    #[error("Resolution error: {0}")]
    Resolution(String),

    #[error(transparent)]
    Configuration(#[from] ConfigError),
}

impl Error {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> u16 {
        match self {
            Error::ActionBeanNotFound(_) => 404,
            Error::HandlerNotFound { .. } => 404,
            Error::UrlBindingConflict { .. } => 409,
            _ => 500,
        }
    }

    /// Check if this is a client error (4xx)
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status_code())
    }

    /// Check if this is a server error (5xx)
    pub fn is_server_error(&self) -> bool {
        self.status_code() >= 500
    }
}

pub type Result<T> = std::result::Result<T, Error>;
