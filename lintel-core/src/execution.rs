//! Interceptor chain around each lifecycle stage.
//!
//! For every stage the dispatcher hands an [`ExecutionContext`] the stage's
//! interceptors and the block that does the stage's work, then calls
//! [`wrap`](ExecutionContext::wrap). Each interceptor decides whether to
//! [`proceed`](ExecutionContext::proceed) to the next one (and eventually the
//! block) or to return early with a resolution of its own:
//!
//! ```text
//! A before -> B before -> block -> B after -> A after
//! ```
//!
//! While a request is being dispatched, [`ExecutionContext::current`] exposes
//! a read-only handle on it to any code running in the same task.

use crate::action::{ActionBean, ActionBeanContext, ActionBeanDefinition, EventHandler};
use crate::interceptor::Interceptor;
use crate::lifecycle::LifecycleStage;
use crate::resolution::Resolution;
use crate::Result;
use async_trait::async_trait;
use futures_util::future::BoxFuture;
use lintel_log::debug;
use parking_lot::RwLock;
use std::future::Future;
use std::sync::Arc;
use uuid::Uuid;

/// The work a lifecycle stage performs once every interceptor has proceeded.
#[async_trait]
pub trait LifecycleBlock: Send + Sync {
    async fn execute(&self, context: &mut ExecutionContext) -> Result<Option<Resolution>>;
}

tokio::task_local! {
    static CURRENT: CurrentExecution;
}

/// Handle on the request running in the current task.
#[derive(Debug, Clone)]
pub struct CurrentExecution {
    inner: Arc<CurrentInner>,
}

#[derive(Debug)]
struct CurrentInner {
    request_id: Uuid,
    uri: String,
    stage: RwLock<LifecycleStage>,
    event_name: RwLock<Option<String>>,
}

impl CurrentExecution {
    pub(crate) fn new(uri: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(CurrentInner {
                request_id: Uuid::new_v4(),
                uri: uri.into(),
                stage: RwLock::new(LifecycleStage::RequestInit),
                event_name: RwLock::new(None),
            }),
        }
    }

    pub fn request_id(&self) -> Uuid {
        self.inner.request_id
    }

    pub fn uri(&self) -> &str {
        &self.inner.uri
    }

    pub fn stage(&self) -> LifecycleStage {
        *self.inner.stage.read()
    }

    pub fn event_name(&self) -> Option<String> {
        self.inner.event_name.read().clone()
    }

    pub(crate) fn set_stage(&self, stage: LifecycleStage) {
        *self.inner.stage.write() = stage;
    }

    pub(crate) fn set_event_name(&self, event: &str) {
        *self.inner.event_name.write() = Some(event.to_string());
    }

    /// Run `f` with this handle installed as the current execution. The
    /// handle is gone again once `f` finishes, however it finishes.
    pub(crate) async fn scope<F: Future>(self, f: F) -> F::Output {
        CURRENT.scope(self, f).await
    }
}

/// Per-request state threaded through every stage and interceptor.
///
/// Accessors return `None` until the stage that fills them in has run:
/// the action bean and its definition after `ActionBeanResolution`, the
/// handler after `HandlerResolution`, the resolution once one exists.
pub struct ExecutionContext {
    stage: LifecycleStage,
    interceptors: Vec<Arc<dyn Interceptor>>,
    cursor: Option<usize>,
    target: Option<Arc<dyn LifecycleBlock>>,
    context: ActionBeanContext,
    action_bean: Option<ActionBean>,
    definition: Option<Arc<ActionBeanDefinition>>,
    handler: Option<EventHandler>,
    resolution: Option<Resolution>,
    resolution_from_handler: bool,
    current: Option<CurrentExecution>,
}

impl ExecutionContext {
    pub fn new(context: ActionBeanContext) -> Self {
        Self {
            stage: LifecycleStage::RequestInit,
            interceptors: Vec::new(),
            cursor: None,
            target: None,
            context,
            action_bean: None,
            definition: None,
            handler: None,
            resolution: None,
            resolution_from_handler: false,
            current: None,
        }
    }

    pub(crate) fn with_current(mut self, current: CurrentExecution) -> Self {
        self.current = Some(current);
        self
    }

    /// The execution running in this task, if a request is being dispatched.
    pub fn current() -> Option<CurrentExecution> {
        CURRENT.try_with(|current| current.clone()).ok()
    }

    /// Enter `stage` with the interceptors registered for it.
    pub fn set_stage(&mut self, stage: LifecycleStage, interceptors: Vec<Arc<dyn Interceptor>>) {
        self.stage = stage;
        self.interceptors = interceptors;
        self.cursor = None;
        if let Some(current) = &self.current {
            current.set_stage(stage);
        }
    }

    pub fn stage(&self) -> LifecycleStage {
        self.stage
    }

    /// Run the interceptor chain around `target`.
    pub async fn wrap(&mut self, target: Arc<dyn LifecycleBlock>) -> Result<Option<Resolution>> {
        self.target = Some(target);
        self.cursor = None;
        self.proceed().await
    }

    /// Continue to the next interceptor, or to the stage's block after the last one.
    pub fn proceed(&mut self) -> BoxFuture<'_, Result<Option<Resolution>>> {
        Box::pin(async move {
            let next = match self.cursor {
                None => {
                    debug!(target: "lintel::execution", "Transitioning to lifecycle stage {}", self.stage);
                    0
                }
                Some(position) => position + 1,
            };
            self.cursor = Some(next);

            match self.interceptors.get(next).cloned() {
                Some(interceptor) => interceptor.intercept(self).await,
                None => match self.target.clone() {
                    Some(target) => target.execute(self).await,
                    None => Ok(None),
                },
            }
        })
    }

    pub fn action_bean_context(&self) -> &ActionBeanContext {
        &self.context
    }

    pub fn action_bean_context_mut(&mut self) -> &mut ActionBeanContext {
        &mut self.context
    }

    pub fn action_bean(&self) -> Option<&ActionBean> {
        self.action_bean.as_ref()
    }

    pub fn action_bean_mut(&mut self) -> Option<&mut ActionBean> {
        self.action_bean.as_mut()
    }

    pub fn set_action_bean(&mut self, bean: ActionBean) {
        self.action_bean = Some(bean);
    }

    /// The bean and its context borrowed together, for invoking bean methods.
    pub fn bean_and_context_mut(&mut self) -> Option<(&mut ActionBean, &mut ActionBeanContext)> {
        let bean = self.action_bean.as_mut()?;
        Some((bean, &mut self.context))
    }

    pub fn definition(&self) -> Option<&Arc<ActionBeanDefinition>> {
        self.definition.as_ref()
    }

    pub fn set_definition(&mut self, definition: Arc<ActionBeanDefinition>) {
        self.definition = Some(definition);
    }

    pub fn handler(&self) -> Option<&EventHandler> {
        self.handler.as_ref()
    }

    pub fn set_handler(&mut self, handler: EventHandler) {
        self.handler = Some(handler);
    }

    pub fn set_event_name(&mut self, event: &str) {
        self.context.set_event_name(event);
        if let Some(current) = &self.current {
            current.set_event_name(event);
        }
    }

    pub fn resolution(&self) -> Option<&Resolution> {
        self.resolution.as_ref()
    }

    pub fn set_resolution(&mut self, resolution: Resolution) {
        self.resolution = Some(resolution);
    }

    /// Whether the resolution came from the event handler rather than from
    /// an interceptor, hook or validation.
    pub fn is_resolution_from_handler(&self) -> bool {
        self.resolution_from_handler
    }

    pub fn set_resolution_from_handler(&mut self, from_handler: bool) {
        self.resolution_from_handler = from_handler;
    }
}
