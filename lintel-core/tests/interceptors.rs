//! Interceptor chains and the current-execution handle, driven through a
//! real dispatcher.

use async_trait::async_trait;
use lintel_bean::{ClassDescriptor, TypeRegistry, Value};
use lintel_core::prelude::*;
use lintel_core::LoggingInterceptor;
use parking_lot::Mutex;
use std::sync::Arc;

type Log = Arc<Mutex<Vec<String>>>;

fn handle<'a>(bean: &'a mut ActionBean, _ctx: &'a mut ActionBeanContext) -> ActionFuture<'a> {
    Box::pin(async move {
        *bean = bean.clone().with("handled", true);
        Ok(Some(Resolution::forward("/done.jsp")))
    })
}

fn dispatcher(interceptors: Vec<Arc<dyn Interceptor>>) -> Dispatcher {
    let mut registry = TypeRegistry::new();
    registry.register(ClassDescriptor::class("PingAction"));

    let mut builder = Configuration::builder(registry)
        .action_bean(ActionBeanDefinition::new("PingAction", "/ping").handler("ping", handle));
    for interceptor in interceptors {
        builder = builder.interceptor(interceptor);
    }
    Dispatcher::new(builder.build().unwrap())
}

fn handled(ctx: &ExecutionContext) -> bool {
    ctx.action_bean()
        .and_then(|bean| bean.property("handled"))
        .and_then(Value::as_bool)
        .unwrap_or(false)
}

/// Records entry and exit around `EventHandling`.
struct Recorder {
    name: &'static str,
    log: Log,
}

#[async_trait]
impl Interceptor for Recorder {
    async fn intercept(&self, ctx: &mut ExecutionContext) -> Result<Option<Resolution>> {
        self.log
            .lock()
            .push(format!("{} before handled={}", self.name, handled(ctx)));
        let resolution = ctx.proceed().await;
        self.log
            .lock()
            .push(format!("{} after handled={}", self.name, handled(ctx)));
        resolution
    }

    fn intercepts(&self) -> &[LifecycleStage] {
        &[LifecycleStage::EventHandling]
    }
}

/// Swaps whatever the handler returned for a redirect.
struct Rewrite;

#[async_trait]
impl Interceptor for Rewrite {
    async fn intercept(&self, ctx: &mut ExecutionContext) -> Result<Option<Resolution>> {
        let original = ctx.proceed().await?;
        assert_eq!(original, Some(Resolution::forward("/done.jsp")));
        assert!(ctx.is_resolution_from_handler());
        Ok(Some(Resolution::redirect("/rewritten")))
    }

    fn intercepts(&self) -> &[LifecycleStage] {
        &[LifecycleStage::EventHandling]
    }
}

/// Refuses every request before binding.
struct Gate;

#[async_trait]
impl Interceptor for Gate {
    async fn intercept(&self, _ctx: &mut ExecutionContext) -> Result<Option<Resolution>> {
        Ok(Some(Resolution::error(401).with_message("login first")))
    }

    fn intercepts(&self) -> &[LifecycleStage] {
        &[LifecycleStage::BindingAndValidation]
    }
}

/// Notes what `ExecutionContext::current()` reports at every stage.
struct Observer {
    log: Log,
}

#[async_trait]
impl Interceptor for Observer {
    async fn intercept(&self, ctx: &mut ExecutionContext) -> Result<Option<Resolution>> {
        let seen = match ExecutionContext::current() {
            Some(current) => format!(
                "{} {} {}",
                current.stage(),
                current.uri(),
                current.event_name().unwrap_or_default()
            ),
            None => "none".to_string(),
        };
        self.log.lock().push(seen);
        ctx.proceed().await
    }
}

#[tokio::test]
async fn test_interceptors_wrap_handler_in_registration_order() {
    let log: Log = Arc::default();
    let dispatcher = dispatcher(vec![
        Arc::new(Recorder { name: "A", log: log.clone() }),
        Arc::new(Recorder { name: "B", log: log.clone() }),
    ]);

    let response = dispatcher.dispatch(ActionRequest::get("/ping")).await.unwrap();

    assert_eq!(response.forward.as_deref(), Some("/done.jsp"));
    assert_eq!(
        *log.lock(),
        vec![
            "A before handled=false",
            "B before handled=false",
            "B after handled=true",
            "A after handled=true",
        ]
    );
}

#[tokio::test]
async fn test_interceptor_post_processes_resolution() {
    let dispatcher = dispatcher(vec![Arc::new(Rewrite)]);

    let response = dispatcher.dispatch(ActionRequest::get("/ping")).await.unwrap();

    assert_eq!(response.status, 302);
    assert_eq!(response.header("Location"), Some("/rewritten"));
}

#[tokio::test]
async fn test_interceptor_short_circuits_remaining_stages() {
    let log: Log = Arc::default();
    let dispatcher = dispatcher(vec![
        Arc::new(Gate),
        Arc::new(Recorder { name: "A", log: log.clone() }),
    ]);

    let response = dispatcher.dispatch(ActionRequest::get("/ping")).await.unwrap();

    assert_eq!(response.status, 401);
    assert_eq!(response.text(), "login first");
    assert!(log.lock().is_empty());
}

#[tokio::test]
async fn test_current_execution_exists_only_during_dispatch() {
    let log: Log = Arc::default();
    let dispatcher = dispatcher(vec![
        Arc::new(Observer { log: log.clone() }),
        Arc::new(LoggingInterceptor::new()),
    ]);

    assert!(ExecutionContext::current().is_none());
    dispatcher.dispatch(ActionRequest::get("/ping")).await.unwrap();
    assert!(ExecutionContext::current().is_none());

    let seen = log.lock().clone();
    assert_eq!(seen.len(), 8);
    assert_eq!(seen[0], "RequestInit /ping ");
    assert_eq!(seen[2], "HandlerResolution /ping ");
    assert_eq!(seen[5], "EventHandling /ping ping");
    assert_eq!(seen[7], "RequestComplete /ping ping");
}

#[tokio::test]
async fn test_current_execution_cleared_after_failure() {
    let log: Log = Arc::default();
    let dispatcher = dispatcher(vec![Arc::new(Observer { log: log.clone() })]);

    let result = dispatcher.dispatch(ActionRequest::get("/nowhere")).await;

    assert!(matches!(result, Err(Error::ActionBeanNotFound(_))));
    assert!(ExecutionContext::current().is_none());
    // the failing stage and RequestComplete both ran inside the request
    assert_eq!(
        *log.lock(),
        vec![
            "RequestInit /nowhere ",
            "ActionBeanResolution /nowhere ",
            "RequestComplete /nowhere ",
        ]
    );
}
