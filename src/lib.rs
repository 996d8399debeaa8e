// Lintel - An action-bean request framework for Rust
//
// This library binds request parameters onto typed beans through property
// expressions, validates them, and runs each request through an
// interceptor-driven lifecycle.

// Re-export core functionality
pub use lintel_core::*;

// Property expressions and bean introspection
pub use lintel_bean as bean;
pub use lintel_bean::{
    ClassDescriptor, GenericType, Introspector, Locale, PropertyExpression,
    PropertyExpressionEvaluation, TypeRegistry, Value,
};

// Validation and type conversion
pub use lintel_validation as validation;
pub use lintel_validation::{
    TypeConverter, TypeConverterFactory, ValidationError, ValidationErrors, ValidationMetadata,
};

pub use lintel_log as log;

// Re-export optional crates
#[cfg(feature = "config")]
pub use lintel_config;

#[cfg(feature = "config")]
pub use lintel_config::{BootstrapSettings, ConfigManager};

pub use async_trait::async_trait;

// Prelude for common imports
pub mod prelude {
    pub use crate::{
        ActionBean,
        ActionBeanContext,
        ActionBeanDefinition,
        ActionFuture,
        ActionRequest,
        ClassDescriptor,
        Configuration,
        Dispatcher,
        Error,
        ExecutionContext,
        GenericType,
        HandlerOptions,
        Interceptor,
        LifecycleStage,
        Resolution,
        Response,
        Result,
        TypeRegistry,
        ValidationError,
        ValidationMetadata,
        ValidationState,
        Value,
        async_trait,
    };
}
