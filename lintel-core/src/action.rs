// Action beans: their definitions, handlers and per-request context

use crate::http::{ActionRequest, Parameters, Response};
use crate::lifecycle::LifecycleStage;
use crate::resolution::Resolution;
use crate::Result;
use async_trait::async_trait;
use futures_util::future::BoxFuture;
use indexmap::IndexMap;
use lintel_bean::{Locale, Value};
use lintel_validation::{ValidationErrors, ValidationMetadata};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

/// Parameter naming the page a form was submitted from.
pub const SOURCE_PAGE: &str = "_sourcePage";
/// Parameter naming the event when no handler-named parameter is present.
pub const EVENT_NAME: &str = "_eventName";
/// Comma separated list of the fields a form rendered.
pub const FIELDS_PRESENT: &str = "_fields";
/// Flash scope id.
pub const FLASH_SCOPE: &str = "__fp";

/// Parameters the binder never binds.
pub const SPECIAL_URL_KEYS: [&str; 4] = [SOURCE_PAGE, EVENT_NAME, FLASH_SCOPE, FIELDS_PRESENT];

/// Action bean state is a dynamic bean of the class named by its definition.
pub type ActionBean = Value;

/// Future returned by handler functions.
pub type ActionFuture<'a> = BoxFuture<'a, Result<Option<Resolution>>>;

/// Anything that can run against an action bean: event handlers, validation
/// methods, error handlers and lifecycle hooks.
///
/// Plain functions returning an [`ActionFuture`] implement it:
///
/// ```
/// use lintel_core::{ActionBean, ActionBeanContext, ActionFuture, Resolution};
///
/// fn done<'a>(_bean: &'a mut ActionBean, _ctx: &'a mut ActionBeanContext) -> ActionFuture<'a> {
///     Box::pin(async move { Ok(Some(Resolution::forward("/done.jsp"))) })
/// }
/// ```
#[async_trait]
pub trait ActionMethod: Send + Sync {
    async fn call(
        &self,
        bean: &mut ActionBean,
        context: &mut ActionBeanContext,
    ) -> Result<Option<Resolution>>;
}

#[async_trait]
impl<F> ActionMethod for F
where
    F: for<'a> Fn(&'a mut ActionBean, &'a mut ActionBeanContext) -> ActionFuture<'a> + Send + Sync,
{
    async fn call(
        &self,
        bean: &mut ActionBean,
        context: &mut ActionBeanContext,
    ) -> Result<Option<Resolution>> {
        (self)(bean, context).await
    }
}

/// Per-request state handed to handlers.
#[derive(Debug)]
pub struct ActionBeanContext {
    request: ActionRequest,
    parameters: Parameters,
    event_name: Option<String>,
    validation_errors: ValidationErrors,
    locale: Locale,
    action_path: Option<String>,
    response: Option<Response>,
}

impl ActionBeanContext {
    pub fn new(request: ActionRequest, default_locale: Locale) -> Self {
        let locale = request.locale.clone().unwrap_or(default_locale);
        let parameters = request.parameters.clone();
        Self {
            request,
            parameters,
            event_name: None,
            validation_errors: ValidationErrors::new(),
            locale,
            action_path: None,
            response: None,
        }
    }

    pub fn request(&self) -> &ActionRequest {
        &self.request
    }

    /// Request parameters merged with the values taken from the URL binding.
    pub fn parameters(&self) -> &Parameters {
        &self.parameters
    }

    pub fn set_parameters(&mut self, parameters: Parameters) {
        self.parameters = parameters;
    }

    pub fn parameter(&self, name: &str) -> Option<&str> {
        self.parameters
            .get(name)
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    pub fn event_name(&self) -> Option<&str> {
        self.event_name.as_deref()
    }

    pub fn set_event_name(&mut self, event: impl Into<String>) {
        self.event_name = Some(event.into());
    }

    pub fn validation_errors(&self) -> &ValidationErrors {
        &self.validation_errors
    }

    pub fn validation_errors_mut(&mut self) -> &mut ValidationErrors {
        &mut self.validation_errors
    }

    pub fn locale(&self) -> &Locale {
        &self.locale
    }

    /// Path of the URL binding the request resolved to.
    pub fn action_path(&self) -> Option<&str> {
        self.action_path.as_deref()
    }

    pub fn set_action_path(&mut self, path: impl Into<String>) {
        self.action_path = Some(path.into());
    }

    /// Page the form was submitted from, for returning with errors.
    pub fn source_page(&self) -> Option<&str> {
        self.parameter(SOURCE_PAGE).filter(|page| !page.is_empty())
    }

    pub fn response(&self) -> Option<&Response> {
        self.response.as_ref()
    }

    pub fn set_response(&mut self, response: Response) {
        self.response = Some(response);
    }

    pub fn take_response(&mut self) -> Option<Response> {
        self.response.take()
    }
}

/// Events a hook or validation method applies to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum EventSelector {
    #[default]
    All,
    Only(HashSet<String>),
    Except(HashSet<String>),
}

impl EventSelector {
    /// `[]` selects every event, `["save", "update"]` only those, and a
    /// leading `!` (`["!preview"]`) every event but the listed ones.
    pub fn parse(events: &[&str]) -> Self {
        match events.first() {
            None => EventSelector::All,
            Some(first) if first.starts_with('!') => EventSelector::Except(
                events
                    .iter()
                    .map(|e| e.trim_start_matches('!').to_string())
                    .collect(),
            ),
            Some(_) => EventSelector::Only(events.iter().map(|e| e.to_string()).collect()),
        }
    }

    pub fn applies_to(&self, event: &str) -> bool {
        match self {
            EventSelector::All => true,
            EventSelector::Only(events) => events.contains(event),
            EventSelector::Except(events) => !events.contains(event),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HandlerOptions {
    pub dont_bind: bool,
    pub dont_validate: bool,
    pub ignore_binding_errors: bool,
}

impl HandlerOptions {
    /// Neither bind nor validate before this handler.
    pub fn skip_binding(mut self) -> Self {
        self.dont_bind = true;
        self
    }

    /// Bind without validating; binding errors are ignored unless
    /// [`report_binding_errors`](Self::report_binding_errors) follows.
    pub fn skip_validation(mut self) -> Self {
        self.dont_validate = true;
        self.ignore_binding_errors = true;
        self
    }

    pub fn report_binding_errors(mut self) -> Self {
        self.ignore_binding_errors = false;
        self
    }
}

#[derive(Clone)]
pub struct EventHandler {
    name: String,
    options: HandlerOptions,
    method: Arc<dyn ActionMethod>,
}

impl EventHandler {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn options(&self) -> HandlerOptions {
        self.options
    }

    pub async fn invoke(
        &self,
        bean: &mut ActionBean,
        context: &mut ActionBeanContext,
    ) -> Result<Option<Resolution>> {
        self.method.call(bean, context).await
    }
}

impl fmt::Debug for EventHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventHandler")
            .field("name", &self.name)
            .field("options", &self.options)
            .finish()
    }
}

/// When a custom validation method runs relative to field errors.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ValidationState {
    /// Run regardless of errors.
    Always,
    /// Run when there are no errors, or always when the
    /// `validation.invoke_validate_when_errors_exist` setting is on.
    #[default]
    Default,
    NoErrors,
}

#[derive(Clone)]
pub struct ValidationMethod {
    pub(crate) name: String,
    pub(crate) priority: i32,
    pub(crate) when: ValidationState,
    pub(crate) on: EventSelector,
    pub(crate) method: Arc<dyn ActionMethod>,
}

impl ValidationMethod {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn priority(&self) -> i32 {
        self.priority
    }

    pub fn when(&self) -> ValidationState {
        self.when
    }

    pub fn applies_to(&self, event: &str) -> bool {
        self.on.applies_to(event)
    }
}

/// A method run before or after a lifecycle stage.
#[derive(Clone)]
pub struct Hook {
    pub(crate) stage: LifecycleStage,
    pub(crate) on: EventSelector,
    pub(crate) method: Arc<dyn ActionMethod>,
}

impl Hook {
    pub fn stage(&self) -> LifecycleStage {
        self.stage
    }

    /// Hooks always run while no event is known yet.
    pub fn applies_to(&self, event: Option<&str>) -> bool {
        event.map_or(true, |event| self.on.applies_to(event))
    }
}

/// Everything the framework knows about one action bean class.
///
/// ```
/// use lintel_core::{ActionBean, ActionBeanContext, ActionBeanDefinition, ActionFuture, Resolution};
/// use lintel_validation::ValidationMetadata;
///
/// fn add<'a>(_bean: &'a mut ActionBean, _ctx: &'a mut ActionBeanContext) -> ActionFuture<'a> {
///     Box::pin(async move { Ok(Some(Resolution::forward("/sum.jsp"))) })
/// }
///
/// let definition = ActionBeanDefinition::new("CalculatorAction", "/calc/{$event}")
///     .handler("add", add)
///     .validate(ValidationMetadata::new("a").required(true));
/// assert_eq!(definition.default_handler_name(), Some("add"));
/// ```
#[derive(Clone)]
pub struct ActionBeanDefinition {
    class: String,
    url_binding: String,
    handlers: IndexMap<String, EventHandler>,
    default_handler: Option<String>,
    validations: IndexMap<String, ValidationMetadata>,
    validation_methods: Vec<ValidationMethod>,
    error_handler: Option<Arc<dyn ActionMethod>>,
    before: Vec<Hook>,
    after: Vec<Hook>,
}

impl ActionBeanDefinition {
    pub fn new(class: impl Into<String>, url_binding: impl Into<String>) -> Self {
        Self {
            class: class.into(),
            url_binding: url_binding.into(),
            handlers: IndexMap::new(),
            default_handler: None,
            validations: IndexMap::new(),
            validation_methods: Vec::new(),
            error_handler: None,
            before: Vec::new(),
            after: Vec::new(),
        }
    }

    pub fn handler<F>(self, name: impl Into<String>, f: F) -> Self
    where
        F: for<'a> Fn(&'a mut ActionBean, &'a mut ActionBeanContext) -> ActionFuture<'a>
            + Send
            + Sync
            + 'static,
    {
        self.handler_with(name, HandlerOptions::default(), f)
    }

    pub fn handler_with<F>(mut self, name: impl Into<String>, options: HandlerOptions, f: F) -> Self
    where
        F: for<'a> Fn(&'a mut ActionBean, &'a mut ActionBeanContext) -> ActionFuture<'a>
            + Send
            + Sync
            + 'static,
    {
        let name = name.into();
        self.handlers.insert(
            name.clone(),
            EventHandler {
                name,
                options,
                method: Arc::new(f),
            },
        );
        self
    }

    /// Mark the handler that runs when the request names no event.
    pub fn default_handler(mut self, name: impl Into<String>) -> Self {
        self.default_handler = Some(name.into());
        self
    }

    pub fn validate(mut self, metadata: ValidationMetadata) -> Self {
        self.validations
            .insert(metadata.property().to_string(), metadata);
        self
    }

    /// Register a custom validation method. Lower priorities run first.
    pub fn validation_method<F>(
        mut self,
        name: impl Into<String>,
        priority: i32,
        when: ValidationState,
        on: &[&str],
        f: F,
    ) -> Self
    where
        F: for<'a> Fn(&'a mut ActionBean, &'a mut ActionBeanContext) -> ActionFuture<'a>
            + Send
            + Sync
            + 'static,
    {
        self.validation_methods.push(ValidationMethod {
            name: name.into(),
            priority,
            when,
            on: EventSelector::parse(on),
            method: Arc::new(f),
        });
        self.validation_methods
            .sort_by(|a, b| a.priority.cmp(&b.priority).then_with(|| a.name.cmp(&b.name)));
        self
    }

    /// Called when validation errors exist; may return the resolution to use.
    pub fn error_handler<F>(mut self, f: F) -> Self
    where
        F: for<'a> Fn(&'a mut ActionBean, &'a mut ActionBeanContext) -> ActionFuture<'a>
            + Send
            + Sync
            + 'static,
    {
        self.error_handler = Some(Arc::new(f));
        self
    }

    pub fn before<F>(mut self, stage: LifecycleStage, on: &[&str], f: F) -> Self
    where
        F: for<'a> Fn(&'a mut ActionBean, &'a mut ActionBeanContext) -> ActionFuture<'a>
            + Send
            + Sync
            + 'static,
    {
        self.before.push(Hook {
            stage,
            on: EventSelector::parse(on),
            method: Arc::new(f),
        });
        self
    }

    pub fn after<F>(mut self, stage: LifecycleStage, on: &[&str], f: F) -> Self
    where
        F: for<'a> Fn(&'a mut ActionBean, &'a mut ActionBeanContext) -> ActionFuture<'a>
            + Send
            + Sync
            + 'static,
    {
        self.after.push(Hook {
            stage,
            on: EventSelector::parse(on),
            method: Arc::new(f),
        });
        self
    }

    pub fn class(&self) -> &str {
        &self.class
    }

    pub fn url_binding(&self) -> &str {
        &self.url_binding
    }

    pub fn handler_names(&self) -> impl Iterator<Item = &str> {
        self.handlers.keys().map(String::as_str)
    }

    pub fn get_handler(&self, event: &str) -> Option<&EventHandler> {
        self.handlers.get(event)
    }

    /// The explicit default handler, or the only handler when there is one.
    pub fn default_handler_name(&self) -> Option<&str> {
        match &self.default_handler {
            Some(name) => Some(name),
            None if self.handlers.len() == 1 => self.handlers.keys().next().map(String::as_str),
            None => None,
        }
    }

    pub fn validation_metadata(&self, property: &str) -> Option<&ValidationMetadata> {
        self.validations.get(property)
    }

    pub fn validations(&self) -> impl Iterator<Item = &ValidationMetadata> {
        self.validations.values()
    }

    /// Validation methods in run order.
    pub fn validation_methods(&self) -> &[ValidationMethod] {
        &self.validation_methods
    }

    pub fn get_error_handler(&self) -> Option<&Arc<dyn ActionMethod>> {
        self.error_handler.as_ref()
    }

    pub fn before_hooks(&self, stage: LifecycleStage) -> impl Iterator<Item = &Hook> {
        self.before.iter().filter(move |hook| hook.stage == stage)
    }

    pub fn after_hooks(&self, stage: LifecycleStage) -> impl Iterator<Item = &Hook> {
        self.after.iter().filter(move |hook| hook.stage == stage)
    }
}

impl fmt::Debug for ActionBeanDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionBeanDefinition")
            .field("class", &self.class)
            .field("url_binding", &self.url_binding)
            .field("handlers", &self.handlers.keys().collect::<Vec<_>>())
            .field("default_handler", &self.default_handler)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop<'a>(_bean: &'a mut ActionBean, _ctx: &'a mut ActionBeanContext) -> ActionFuture<'a> {
        Box::pin(async move { Ok(None) })
    }

    fn view<'a>(_bean: &'a mut ActionBean, _ctx: &'a mut ActionBeanContext) -> ActionFuture<'a> {
        Box::pin(async move { Ok(Some(Resolution::forward("/view.jsp"))) })
    }

    #[test]
    fn test_event_selector() {
        let all = EventSelector::parse(&[]);
        let only = EventSelector::parse(&["save", "update"]);
        let except = EventSelector::parse(&["!preview"]);

        assert!(all.applies_to("anything"));
        assert!(only.applies_to("save"));
        assert!(!only.applies_to("preview"));
        assert!(!except.applies_to("preview"));
        assert!(except.applies_to("save"));
    }

    #[test]
    fn test_default_handler() {
        let single = ActionBeanDefinition::new("A", "/a").handler("view", view);
        assert_eq!(single.default_handler_name(), Some("view"));

        let several = ActionBeanDefinition::new("B", "/b")
            .handler("view", view)
            .handler("save", noop);
        assert_eq!(several.default_handler_name(), None);

        let explicit = several.default_handler("save");
        assert_eq!(explicit.default_handler_name(), Some("save"));
    }

    #[test]
    fn test_validation_methods_are_ordered() {
        let definition = ActionBeanDefinition::new("A", "/a")
            .validation_method("zeta", 1, ValidationState::Default, &[], noop)
            .validation_method("late", 5, ValidationState::Always, &[], noop)
            .validation_method("alpha", 1, ValidationState::NoErrors, &["save"], noop);

        let names: Vec<_> = definition
            .validation_methods()
            .iter()
            .map(ValidationMethod::name)
            .collect();
        assert_eq!(names, vec!["alpha", "zeta", "late"]);
        assert!(!definition.validation_methods()[0].applies_to("view"));
    }

    #[test]
    fn test_hooks_apply_without_event() {
        let definition = ActionBeanDefinition::new("A", "/a").before(
            LifecycleStage::BindingAndValidation,
            &["save"],
            noop,
        );
        let hook = definition
            .before_hooks(LifecycleStage::BindingAndValidation)
            .next()
            .unwrap();
        assert!(hook.applies_to(None));
        assert!(hook.applies_to(Some("save")));
        assert!(!hook.applies_to(Some("view")));
        assert_eq!(definition.after_hooks(LifecycleStage::EventHandling).count(), 0);
    }

    #[tokio::test]
    async fn test_handler_invocation() {
        let definition = ActionBeanDefinition::new("A", "/a").handler("view", view);
        let mut bean = Value::bean("A");
        let mut context = ActionBeanContext::new(ActionRequest::get("/a"), Locale::default());

        let resolution = definition
            .get_handler("view")
            .unwrap()
            .invoke(&mut bean, &mut context)
            .await
            .unwrap();
        assert_eq!(resolution, Some(Resolution::forward("/view.jsp")));
    }

    #[test]
    fn test_context_source_page() {
        let request = ActionRequest::post("/a").with_parameter(SOURCE_PAGE, "/form.jsp");
        let context = ActionBeanContext::new(request, Locale::new("de-DE"));
        assert_eq!(context.source_page(), Some("/form.jsp"));
        assert_eq!(context.locale().tag(), "de-DE");
    }
}
