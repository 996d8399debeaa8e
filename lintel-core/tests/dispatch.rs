//! End-to-end dispatch: URL bindings, binding and validation, handlers and
//! resolutions.

use async_trait::async_trait;
use lintel_bean::{ClassDescriptor, GenericType, TypeRegistry, Value};
use lintel_core::prelude::*;
use lintel_validation::{ValidationError, ValidationMetadata};
use parking_lot::Mutex;
use std::sync::Arc;

fn view<'a>(_bean: &'a mut ActionBean, _ctx: &'a mut ActionBeanContext) -> ActionFuture<'a> {
    Box::pin(async move { Ok(Some(Resolution::forward("/register.jsp"))) })
}

fn save<'a>(bean: &'a mut ActionBean, _ctx: &'a mut ActionBeanContext) -> ActionFuture<'a> {
    Box::pin(async move {
        let name = bean
            .property("user")
            .and_then(|user| user.property("name"))
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let stamped = bean
            .property("stamped")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        Ok(Some(
            Resolution::redirect("/welcome")
                .with_parameter("name", name)
                .with_parameter("stamped", stamped),
        ))
    })
}

fn cancel<'a>(_bean: &'a mut ActionBean, _ctx: &'a mut ActionBeanContext) -> ActionFuture<'a> {
    Box::pin(async move { Ok(Some(Resolution::redirect("/home"))) })
}

fn stamp<'a>(bean: &'a mut ActionBean, _ctx: &'a mut ActionBeanContext) -> ActionFuture<'a> {
    Box::pin(async move {
        *bean = bean.clone().with("stamped", true);
        Ok(None)
    })
}

fn check_email<'a>(bean: &'a mut ActionBean, ctx: &'a mut ActionBeanContext) -> ActionFuture<'a> {
    Box::pin(async move {
        let email = bean
            .property("user")
            .and_then(|user| user.property("email"))
            .and_then(Value::as_str)
            .unwrap_or_default();
        if !email.contains('@') {
            ctx.validation_errors_mut()
                .add(ValidationError::new("user.email", "must be an email address"));
        }
        Ok(None)
    })
}

fn go<'a>(_bean: &'a mut ActionBean, _ctx: &'a mut ActionBeanContext) -> ActionFuture<'a> {
    Box::pin(async move { Ok(Some(Resolution::forward("/went.jsp"))) })
}

fn reject<'a>(_bean: &'a mut ActionBean, ctx: &'a mut ActionBeanContext) -> ActionFuture<'a> {
    Box::pin(async move {
        let count = ctx.validation_errors().len();
        Ok(Some(
            Resolution::error(422).with_message(format!("{} invalid field(s)", count)),
        ))
    })
}

/// Captures the validation errors left on the context at the end of a request.
struct ErrorCollector {
    errors: Arc<Mutex<Vec<ValidationError>>>,
}

#[async_trait]
impl Interceptor for ErrorCollector {
    async fn intercept(&self, ctx: &mut ExecutionContext) -> Result<Option<Resolution>> {
        self.errors.lock().extend(
            ctx.action_bean_context()
                .validation_errors()
                .iter()
                .cloned(),
        );
        ctx.proceed().await
    }

    fn intercepts(&self) -> &[LifecycleStage] {
        &[LifecycleStage::RequestComplete]
    }
}

fn registry() -> TypeRegistry {
    let mut registry = TypeRegistry::new();
    registry.register(
        ClassDescriptor::class("User")
            .property("name", GenericType::class("String"))
            .property("age", GenericType::class("int"))
            .property("email", GenericType::class("String")),
    );
    registry.register(
        ClassDescriptor::class("RegistrationAction")
            .property("user", GenericType::class("User"))
            .property("stamped", GenericType::class("Boolean")),
    );
    registry.register(
        ClassDescriptor::class("StrictAction").property("code", GenericType::class("String")),
    );
    registry
}

fn registration() -> ActionBeanDefinition {
    ActionBeanDefinition::new("RegistrationAction", "/register/{$event}")
        .handler("view", view)
        .handler("save", save)
        .handler_with("cancel", HandlerOptions::default().skip_binding(), cancel)
        .default_handler("view")
        .validate(ValidationMetadata::new("user.name").required(true).on(&["save"]))
        .validate(ValidationMetadata::new("user.age").min_value(18.0))
        .validation_method("emailLooksValid", 0, ValidationState::Default, &["save"], check_email)
        .before(LifecycleStage::EventHandling, &["save"], stamp)
}

fn dispatcher(collector: Option<Arc<Mutex<Vec<ValidationError>>>>) -> Dispatcher {
    let mut builder = Configuration::builder(registry())
        .action_bean(registration())
        .action_bean(
            ActionBeanDefinition::new("StrictAction", "/strict")
                .handler("go", go)
                .validate(ValidationMetadata::new("code").required(true))
                .error_handler(reject),
        );
    if let Some(errors) = collector {
        builder = builder.interceptor(Arc::new(ErrorCollector { errors }));
    }
    Dispatcher::new(builder.build().unwrap())
}

#[tokio::test]
async fn test_default_handler_without_event() {
    let response = dispatcher(None)
        .dispatch(ActionRequest::get("/register"))
        .await
        .unwrap();

    assert_eq!(response.status, 200);
    assert_eq!(response.forward.as_deref(), Some("/register.jsp"));
}

#[tokio::test]
async fn test_event_from_url_binds_and_redirects() {
    let request = ActionRequest::post(
        "/register/save?user.name=Ada&user.age=36&user.email=ada%40example.com",
    );
    let response = dispatcher(None).dispatch(request).await.unwrap();

    assert_eq!(response.status, 302);
    assert_eq!(
        response.header("Location"),
        Some("/welcome?name=Ada&stamped=true")
    );
}

#[tokio::test]
async fn test_event_from_submit_button_parameter() {
    let request = ActionRequest::post("/register")
        .with_parameter("save", "Save")
        .with_parameter("user.name", "Grace")
        .with_parameter("user.email", "grace@example.com");
    let response = dispatcher(None).dispatch(request).await.unwrap();

    assert_eq!(
        response.header("Location"),
        Some("/welcome?name=Grace&stamped=true")
    );
}

#[tokio::test]
async fn test_validation_errors_return_to_source_page() {
    let errors = Arc::new(Mutex::new(Vec::new()));
    let request = ActionRequest::post("/register/save")
        .with_parameter("user.age", "<12>")
        .with_parameter("_sourcePage", "/register.jsp");
    let response = dispatcher(Some(errors.clone()))
        .dispatch(request)
        .await
        .unwrap();

    assert_eq!(response.forward.as_deref(), Some("/register.jsp"));

    let errors = errors.lock();
    let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
    assert!(fields.contains(&"user.name"));
    assert!(fields.contains(&"user.age"));
    // custom validation is skipped once field validation failed
    assert!(!fields.contains(&"user.email"));

    let age = errors.iter().find(|e| e.field == "user.age").unwrap();
    assert_eq!(age.value.as_deref(), Some("&lt;12&gt;"));
    assert_eq!(age.action_path.as_deref(), Some("/register/{$event}"));
    assert_eq!(age.bean_class.as_deref(), Some("RegistrationAction"));
}

#[tokio::test]
async fn test_custom_validation_error() {
    let errors = Arc::new(Mutex::new(Vec::new()));
    let request = ActionRequest::post("/register/save")
        .with_parameter("user.name", "Ada")
        .with_parameter("user.email", "not-an-address")
        .with_parameter("_sourcePage", "/register.jsp");
    let response = dispatcher(Some(errors.clone()))
        .dispatch(request)
        .await
        .unwrap();

    assert_eq!(response.forward.as_deref(), Some("/register.jsp"));
    let errors = errors.lock();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].field, "user.email");
    assert_eq!(errors[0].value.as_deref(), Some("not-an-address"));
}

#[tokio::test]
async fn test_validation_errors_without_source_page() {
    let request = ActionRequest::post("/register/save").with_parameter("user.age", "30");
    let result = dispatcher(None).dispatch(request).await;

    match result {
        Err(Error::NoSourcePage(path)) => assert_eq!(path, "/register/{$event}"),
        other => panic!("expected NoSourcePage, got {:?}", other),
    }
}

#[tokio::test]
async fn test_error_handler_chooses_resolution() {
    let response = dispatcher(None)
        .dispatch(ActionRequest::post("/strict"))
        .await
        .unwrap();

    assert_eq!(response.status, 422);
    assert_eq!(response.text(), "1 invalid field(s)");
}

#[tokio::test]
async fn test_handler_without_binding_ignores_bad_input() {
    let request = ActionRequest::post("/register/cancel").with_parameter("user.age", "abc");
    let response = dispatcher(None).dispatch(request).await.unwrap();

    assert_eq!(response.header("Location"), Some("/home"));
}

#[tokio::test]
async fn test_unknown_event_is_not_found() {
    let request = ActionRequest::post("/register").with_parameter("_eventName", "explode");
    let error = dispatcher(None).dispatch(request).await.unwrap_err();

    assert!(matches!(error, Error::HandlerNotFound { ref event, .. } if event == "explode"));
    assert_eq!(error.status_code(), 404);
}
