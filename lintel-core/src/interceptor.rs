// Interceptors wrapped around lifecycle stages

use crate::action::Hook;
use crate::execution::ExecutionContext;
use crate::lifecycle::LifecycleStage;
use crate::resolution::Resolution;
use crate::Result;
use async_trait::async_trait;
use lintel_log::{debug, warn};
use std::time::{Duration, Instant};

/// Code run around one or more lifecycle stages.
///
/// An interceptor calls [`ExecutionContext::proceed`] to continue the chain
/// and may inspect or replace what comes back. Returning without proceeding
/// short-circuits the stage.
#[async_trait]
pub trait Interceptor: Send + Sync {
    async fn intercept(&self, context: &mut ExecutionContext) -> Result<Option<Resolution>>;

    /// Stages this interceptor is registered for.
    fn intercepts(&self) -> &[LifecycleStage] {
        &LifecycleStage::ALL
    }
}

const HOOK_STAGES: [LifecycleStage; 6] = [
    LifecycleStage::ActionBeanResolution,
    LifecycleStage::HandlerResolution,
    LifecycleStage::BindingAndValidation,
    LifecycleStage::CustomValidation,
    LifecycleStage::EventHandling,
    LifecycleStage::ResolutionExecution,
];

/// Runs the before and after hooks declared on action bean definitions.
///
/// A resolution returned by a before hook ends the stage without running
/// it. One returned by an after hook replaces the stage's own result.
#[derive(Debug, Default, Clone, Copy)]
pub struct BeforeAfterMethodInterceptor;

#[async_trait]
impl Interceptor for BeforeAfterMethodInterceptor {
    async fn intercept(&self, context: &mut ExecutionContext) -> Result<Option<Resolution>> {
        if let Some(resolution) = run_hooks(context, HookKind::Before).await? {
            return Ok(Some(resolution));
        }

        let resolution = context.proceed().await?;

        // the stage may have changed the event
        match run_hooks(context, HookKind::After).await? {
            Some(overriding) => Ok(Some(overriding)),
            None => Ok(resolution),
        }
    }

    fn intercepts(&self) -> &[LifecycleStage] {
        &HOOK_STAGES
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HookKind {
    Before,
    After,
}

async fn run_hooks(context: &mut ExecutionContext, kind: HookKind) -> Result<Option<Resolution>> {
    let Some(definition) = context.definition().cloned() else {
        return Ok(None);
    };
    let stage = context.stage();
    let event = context
        .action_bean_context()
        .event_name()
        .map(str::to_string);

    let hooks: Vec<&Hook> = match kind {
        HookKind::Before => definition.before_hooks(stage).collect(),
        HookKind::After => definition.after_hooks(stage).collect(),
    };

    let mut resolution = None;
    for hook in hooks.into_iter().filter(|h| h.applies_to(event.as_deref())) {
        let Some((bean, bean_context)) = context.bean_and_context_mut() else {
            break;
        };
        if let Some(returned) = hook.method.call(bean, bean_context).await? {
            if resolution.is_some() {
                warn!(
                    "More than one {:?} hook for {} on {} returned a resolution; using the last",
                    kind,
                    stage,
                    definition.class()
                );
            }
            resolution = Some(returned);
        }
    }
    Ok(resolution)
}

/// Logs how long each stage takes, warning about slow ones.
#[derive(Debug, Default, Clone)]
pub struct LoggingInterceptor {
    slow_threshold: Option<Duration>,
}

impl LoggingInterceptor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_slow_threshold(mut self, threshold: Duration) -> Self {
        self.slow_threshold = Some(threshold);
        self
    }
}

#[async_trait]
impl Interceptor for LoggingInterceptor {
    async fn intercept(&self, context: &mut ExecutionContext) -> Result<Option<Resolution>> {
        let stage = context.stage();
        let start = Instant::now();

        let result = context.proceed().await;

        let duration = start.elapsed();
        match &result {
            Ok(_) if self.slow_threshold.is_some_and(|t| duration > t) => {
                warn!("{} took {:?}", stage, duration);
            }
            Ok(_) => debug!("{} completed in {:?}", stage, duration),
            Err(e) => warn!("{} failed after {:?}: {}", stage, duration, e),
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::{ActionBean, ActionBeanContext, ActionBeanDefinition, ActionFuture};
    use crate::execution::LifecycleBlock;
    use crate::http::ActionRequest;
    use lintel_bean::{Locale, Value};
    use std::sync::Arc;

    fn mark_before<'a>(bean: &'a mut ActionBean, _ctx: &'a mut ActionBeanContext) -> ActionFuture<'a> {
        Box::pin(async move {
            *bean = bean.clone().with("before", true);
            Ok(None)
        })
    }

    fn veto<'a>(_bean: &'a mut ActionBean, _ctx: &'a mut ActionBeanContext) -> ActionFuture<'a> {
        Box::pin(async move { Ok(Some(Resolution::error(403))) })
    }

    fn replace<'a>(_bean: &'a mut ActionBean, _ctx: &'a mut ActionBeanContext) -> ActionFuture<'a> {
        Box::pin(async move { Ok(Some(Resolution::forward("/after.jsp"))) })
    }

    struct Handle;

    #[async_trait]
    impl LifecycleBlock for Handle {
        async fn execute(&self, context: &mut ExecutionContext) -> Result<Option<Resolution>> {
            let ran = context
                .action_bean()
                .and_then(|b| b.property("before"))
                .and_then(Value::as_bool)
                .unwrap_or(false);
            Ok(Some(Resolution::forward(if ran { "/hooked.jsp" } else { "/plain.jsp" })))
        }
    }

    fn context_for(definition: ActionBeanDefinition, event: &str) -> ExecutionContext {
        let mut context = ExecutionContext::new(ActionBeanContext::new(
            ActionRequest::get("/a"),
            Locale::default(),
        ));
        context.set_action_bean(Value::bean("A"));
        context.set_definition(Arc::new(definition));
        context.set_event_name(event);
        context.set_stage(
            LifecycleStage::EventHandling,
            vec![Arc::new(BeforeAfterMethodInterceptor)],
        );
        context
    }

    #[tokio::test]
    async fn test_before_hook_runs_first() {
        let definition = ActionBeanDefinition::new("A", "/a").before(
            LifecycleStage::EventHandling,
            &["save"],
            mark_before,
        );

        let mut saving = context_for(definition.clone(), "save");
        let resolution = saving.wrap(Arc::new(Handle)).await.unwrap();
        assert_eq!(resolution, Some(Resolution::forward("/hooked.jsp")));

        let mut viewing = context_for(definition, "view");
        let resolution = viewing.wrap(Arc::new(Handle)).await.unwrap();
        assert_eq!(resolution, Some(Resolution::forward("/plain.jsp")));
    }

    #[tokio::test]
    async fn test_before_hook_resolution_skips_stage() {
        let definition =
            ActionBeanDefinition::new("A", "/a").before(LifecycleStage::EventHandling, &[], veto);
        let mut context = context_for(definition, "save");
        let resolution = context.wrap(Arc::new(Handle)).await.unwrap();
        assert_eq!(resolution, Some(Resolution::error(403)));
    }

    #[tokio::test]
    async fn test_after_hook_overrides() {
        let definition =
            ActionBeanDefinition::new("A", "/a").after(LifecycleStage::EventHandling, &[], replace);
        let mut context = context_for(definition, "save");
        let resolution = context.wrap(Arc::new(Handle)).await.unwrap();
        assert_eq!(resolution, Some(Resolution::forward("/after.jsp")));
    }

    #[test]
    fn test_registered_stages() {
        assert!(!BeforeAfterMethodInterceptor
            .intercepts()
            .contains(&LifecycleStage::RequestInit));
        assert_eq!(LoggingInterceptor::new().intercepts().len(), 8);
    }
}
