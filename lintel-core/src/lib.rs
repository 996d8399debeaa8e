//! Request lifecycle for Lintel action beans.
//!
//! A [`Dispatcher`] maps each request onto an action bean through its
//! [`UrlBinding`], then walks the fixed [`LifecycleStage`]s: it resolves the
//! bean and event handler, binds request parameters onto the bean with the
//! [`PropertyBinder`], runs validation, invokes the handler and executes the
//! [`Resolution`] it returns. Every stage runs inside a chain of
//! [`Interceptor`]s driven by an [`ExecutionContext`].
//!
//! ```
//! use lintel_bean::{ClassDescriptor, GenericType, TypeRegistry, Value};
//! use lintel_core::prelude::*;
//!
//! fn add<'a>(bean: &'a mut ActionBean, _ctx: &'a mut ActionBeanContext) -> ActionFuture<'a> {
//!     Box::pin(async move {
//!         let a = bean.property("a").and_then(Value::as_i64).unwrap_or(0);
//!         let b = bean.property("b").and_then(Value::as_i64).unwrap_or(0);
//!         Ok(Some(Resolution::json(&serde_json::json!({ "sum": a + b }))?))
//!     })
//! }
//!
//! # tokio_test::block_on(async {
//! let mut registry = TypeRegistry::new();
//! registry.register(
//!     ClassDescriptor::class("CalculatorAction")
//!         .property("a", GenericType::class("int"))
//!         .property("b", GenericType::class("int")),
//! );
//!
//! let configuration = Configuration::builder(registry)
//!     .action_bean(ActionBeanDefinition::new("CalculatorAction", "/calc/{a}/{b}").handler("add", add))
//!     .build()
//!     .unwrap();
//! let dispatcher = Dispatcher::new(configuration);
//!
//! let response = dispatcher.dispatch(ActionRequest::get("/calc/2/3")).await.unwrap();
//! assert_eq!(response.text(), r#"{"sum":5}"#);
//! # });
//! ```

pub mod action;
pub mod binder;
pub mod configuration;
pub mod dispatcher;
pub mod error;
pub mod execution;
pub mod http;
pub mod interceptor;
pub mod lifecycle;
pub mod resolution;
pub mod resolver;
pub mod url_binding;

pub use action::{
    ActionBean, ActionBeanContext, ActionBeanDefinition, ActionFuture, ActionMethod,
    EventHandler, EventSelector, HandlerOptions, Hook, ValidationMethod, ValidationState,
    EVENT_NAME, FIELDS_PRESENT, FLASH_SCOPE, SOURCE_PAGE, SPECIAL_URL_KEYS,
};
pub use binder::{fill_in_validation_errors, html_escape, strip_indexes, PropertyBinder};
pub use configuration::{Configuration, ConfigurationBuilder};
pub use dispatcher::Dispatcher;
pub use error::{Error, Result};
pub use execution::{CurrentExecution, ExecutionContext, LifecycleBlock};
pub use http::{ActionRequest, Parameters, Response};
pub use interceptor::{BeforeAfterMethodInterceptor, Interceptor, LoggingInterceptor};
pub use lifecycle::LifecycleStage;
pub use resolution::{Resolution, Target};
pub use resolver::ActionResolver;
pub use url_binding::{
    UrlBinding, UrlBindingFactory, UrlBindingParameter, UrlComponent, EVENT_PARAMETER,
};

/// Prelude for common imports
pub mod prelude {
    pub use crate::{
        ActionBean, ActionBeanContext, ActionBeanDefinition, ActionFuture, ActionRequest,
        Configuration, Dispatcher, Error, ExecutionContext, HandlerOptions, Interceptor,
        LifecycleStage, Resolution, Response, Result, ValidationState,
    };
}
