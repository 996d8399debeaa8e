//! Request dispatch through the lifecycle stages.
//!
//! ```text
//! RequestInit -> ActionBeanResolution -> HandlerResolution
//!   -> BindingAndValidation -> CustomValidation -> (validation errors?)
//!   -> EventHandling -> ResolutionExecution -> RequestComplete
//! ```
//!
//! The first stage to produce a resolution skips straight to
//! `ResolutionExecution`. `RequestComplete` runs whatever happened before it.

use crate::action::{
    ActionBean, ActionBeanContext, ActionBeanDefinition, EventHandler, ValidationState,
};
use crate::binder::fill_in_validation_errors;
use crate::configuration::Configuration;
use crate::execution::{CurrentExecution, ExecutionContext, LifecycleBlock};
use crate::http::{ActionRequest, Response};
use crate::lifecycle::LifecycleStage;
use crate::resolution::Resolution;
use crate::{Error, Result};
use async_trait::async_trait;
use lintel_log::{debug, error, warn};
use std::sync::Arc;

pub struct Dispatcher {
    configuration: Arc<Configuration>,
}

impl Dispatcher {
    pub fn new(configuration: Configuration) -> Self {
        Self {
            configuration: Arc::new(configuration),
        }
    }

    pub fn configuration(&self) -> &Configuration {
        &self.configuration
    }

    /// Process one request. `ExecutionContext::current()` is available to
    /// everything running inside the call and to nothing outside it.
    pub async fn dispatch(&self, request: ActionRequest) -> Result<Response> {
        let current = CurrentExecution::new(request.path.clone());
        debug!(
            "Dispatching {} {} [{}]",
            request.method,
            request.path,
            current.request_id()
        );

        let context = ActionBeanContext::new(request, self.configuration.default_locale().clone());
        let mut ctx = ExecutionContext::new(context).with_current(current.clone());

        current
            .scope(async move {
                let result = self.run_stages(&mut ctx).await;
                self.request_complete(&mut ctx).await;
                result?;
                Ok(ctx
                    .action_bean_context_mut()
                    .take_response()
                    .unwrap_or_else(Response::ok))
            })
            .await
    }

    fn block(&self, stage: LifecycleStage) -> Arc<dyn LifecycleBlock> {
        let config = self.configuration.clone();
        match stage {
            LifecycleStage::RequestInit => Arc::new(RequestInit),
            LifecycleStage::ActionBeanResolution => Arc::new(ActionBeanResolution(config)),
            LifecycleStage::HandlerResolution => Arc::new(HandlerResolution(config)),
            LifecycleStage::BindingAndValidation => Arc::new(BindingAndValidation(config)),
            LifecycleStage::CustomValidation => Arc::new(CustomValidation(config)),
            LifecycleStage::EventHandling => Arc::new(EventHandling),
            LifecycleStage::ResolutionExecution => Arc::new(ResolutionExecution(config)),
            LifecycleStage::RequestComplete => Arc::new(RequestComplete),
        }
    }

    async fn stage(
        &self,
        ctx: &mut ExecutionContext,
        stage: LifecycleStage,
        block: Arc<dyn LifecycleBlock>,
    ) -> Result<Option<Resolution>> {
        ctx.set_stage(stage, self.configuration.interceptors(stage));
        ctx.wrap(block).await
    }

    async fn run_stages(&self, ctx: &mut ExecutionContext) -> Result<()> {
        for stage in [
            LifecycleStage::RequestInit,
            LifecycleStage::ActionBeanResolution,
            LifecycleStage::HandlerResolution,
            LifecycleStage::BindingAndValidation,
            LifecycleStage::CustomValidation,
        ] {
            let block = self.block(stage);
            if let Some(resolution) = self.stage(ctx, stage, block).await? {
                return self.execute_resolution(ctx, resolution).await;
            }
        }

        if let Some(resolution) = self.handle_validation_errors(ctx).await? {
            return self.execute_resolution(ctx, resolution).await;
        }

        let block = self.block(LifecycleStage::EventHandling);
        if let Some(resolution) = self.stage(ctx, LifecycleStage::EventHandling, block).await? {
            return self.execute_resolution(ctx, resolution).await;
        }
        Ok(())
    }

    /// Turn validation errors into a resolution: the bean's error handler
    /// gets the first chance, then the request returns to its source page.
    async fn handle_validation_errors(
        &self,
        ctx: &mut ExecutionContext,
    ) -> Result<Option<Resolution>> {
        let (definition, handler) = resolved(ctx)?;
        if handler.options().ignore_binding_errors
            || ctx.action_bean_context().validation_errors().is_empty()
        {
            return Ok(None);
        }

        let mut resolution = None;
        if let Some(error_handler) = definition.get_error_handler() {
            let (bean, context) = bean_and_context(ctx)?;
            resolution = error_handler.call(bean, context).await?;
            fill_in_validation_errors(context, definition.class());
        }

        let context = ctx.action_bean_context();
        if resolution.is_none() && !context.validation_errors().is_empty() {
            debug!(
                "The following validation errors need to be fixed:\n{}",
                context.validation_errors()
            );
            let page = context.source_page().ok_or_else(|| {
                Error::NoSourcePage(
                    context
                        .action_path()
                        .unwrap_or(&context.request().path)
                        .to_string(),
                )
            })?;
            resolution = Some(Resolution::forward(page));
        }
        Ok(resolution)
    }

    async fn execute_resolution(
        &self,
        ctx: &mut ExecutionContext,
        resolution: Resolution,
    ) -> Result<()> {
        ctx.set_resolution(resolution);
        let block = self.block(LifecycleStage::ResolutionExecution);
        if let Some(ignored) = self
            .stage(ctx, LifecycleStage::ResolutionExecution, block)
            .await?
        {
            warn!(
                "An interceptor returned a resolution ({:?}) during ResolutionExecution. \
                 It will be ignored.",
                ignored
            );
        }
        Ok(())
    }

    async fn request_complete(&self, ctx: &mut ExecutionContext) {
        let block = self.block(LifecycleStage::RequestComplete);
        match self.stage(ctx, LifecycleStage::RequestComplete, block).await {
            Ok(None) => {}
            Ok(Some(ignored)) => warn!(
                "An interceptor returned a resolution ({:?}) during RequestComplete. \
                 It will be ignored.",
                ignored
            ),
            Err(e) => error!("Error running RequestComplete: {}", e),
        }
    }
}

fn resolved(ctx: &ExecutionContext) -> Result<(Arc<ActionBeanDefinition>, EventHandler)> {
    match (ctx.definition(), ctx.handler()) {
        (Some(definition), Some(handler)) => Ok((definition.clone(), handler.clone())),
        _ => Err(Error::Handler(format!(
            "no event handler was resolved before {}",
            ctx.stage()
        ))),
    }
}

fn bean_and_context(
    ctx: &mut ExecutionContext,
) -> Result<(&mut ActionBean, &mut ActionBeanContext)> {
    let stage = ctx.stage();
    ctx.bean_and_context_mut().ok_or_else(|| {
        Error::Handler(format!("no action bean was resolved before {}", stage))
    })
}

struct RequestInit;

#[async_trait]
impl LifecycleBlock for RequestInit {
    async fn execute(&self, _ctx: &mut ExecutionContext) -> Result<Option<Resolution>> {
        Ok(None)
    }
}

struct ActionBeanResolution(Arc<Configuration>);

#[async_trait]
impl LifecycleBlock for ActionBeanResolution {
    async fn execute(&self, ctx: &mut ExecutionContext) -> Result<Option<Resolution>> {
        let config = &self.0;
        let (definition, bean) = config
            .resolver()
            .get_action_bean(ctx.action_bean_context_mut(), config.registry())?;
        ctx.set_definition(definition);
        ctx.set_action_bean(bean);
        Ok(None)
    }
}

struct HandlerResolution(Arc<Configuration>);

#[async_trait]
impl LifecycleBlock for HandlerResolution {
    async fn execute(&self, ctx: &mut ExecutionContext) -> Result<Option<Resolution>> {
        let resolver = self.0.resolver();
        let definition = ctx.definition().cloned().ok_or_else(|| {
            Error::ActionBeanNotFound(ctx.action_bean_context().request().path.clone())
        })?;

        let handler = match resolver.get_event_name(&definition, ctx.action_bean_context()) {
            Some(event) => resolver.get_handler(&definition, &event)?,
            None => resolver.get_default_handler(&definition)?,
        };
        debug!(
            "Resolved event: {} will invoke: {}.{}",
            handler.name(),
            definition.class(),
            handler.name()
        );

        ctx.set_event_name(handler.name());
        ctx.set_handler(handler.clone());
        Ok(None)
    }
}

struct BindingAndValidation(Arc<Configuration>);

#[async_trait]
impl LifecycleBlock for BindingAndValidation {
    async fn execute(&self, ctx: &mut ExecutionContext) -> Result<Option<Resolution>> {
        let config = &self.0;
        let (definition, handler) = resolved(ctx)?;
        let options = handler.options();
        if options.dont_bind {
            return Ok(None);
        }

        let (bean, context) = bean_and_context(ctx)?;
        config.binder().bind(
            bean,
            context,
            &definition,
            config.introspector(),
            config.converters(),
            !options.dont_validate,
        );
        fill_in_validation_errors(context, definition.class());
        Ok(None)
    }
}

struct CustomValidation(Arc<Configuration>);

#[async_trait]
impl LifecycleBlock for CustomValidation {
    async fn execute(&self, ctx: &mut ExecutionContext) -> Result<Option<Resolution>> {
        let (definition, handler) = resolved(ctx)?;
        let options = handler.options();
        if options.dont_bind || options.dont_validate {
            return Ok(None);
        }
        let invoke_with_errors = self.0.settings().invoke_validate_when_errors_exist;

        for method in definition.validation_methods() {
            if !method.applies_to(handler.name()) {
                continue;
            }
            let errors_exist = !ctx.action_bean_context().validation_errors().is_empty();
            let run = match method.when() {
                ValidationState::Always => true,
                ValidationState::Default => invoke_with_errors || !errors_exist,
                ValidationState::NoErrors => !errors_exist,
            };
            if !run {
                continue;
            }

            let (bean, context) = bean_and_context(ctx)?;
            let resolution = method.method.call(bean, context).await?;
            fill_in_validation_errors(context, definition.class());
            if resolution.is_some() {
                return Ok(resolution);
            }
        }
        Ok(None)
    }
}

struct EventHandling;

#[async_trait]
impl LifecycleBlock for EventHandling {
    async fn execute(&self, ctx: &mut ExecutionContext) -> Result<Option<Resolution>> {
        let (definition, handler) = resolved(ctx)?;
        let (bean, context) = bean_and_context(ctx)?;
        let resolution = handler.invoke(bean, context).await?;
        fill_in_validation_errors(context, definition.class());

        if resolution.is_some() {
            ctx.set_resolution_from_handler(true);
        }
        Ok(resolution)
    }
}

struct ResolutionExecution(Arc<Configuration>);

#[async_trait]
impl LifecycleBlock for ResolutionExecution {
    async fn execute(&self, ctx: &mut ExecutionContext) -> Result<Option<Resolution>> {
        let Some(resolution) = ctx.resolution().cloned() else {
            return Ok(None);
        };
        let response = resolution.execute(self.0.resolver().bindings())?;
        ctx.action_bean_context_mut().set_response(response);
        Ok(None)
    }
}

struct RequestComplete;

#[async_trait]
impl LifecycleBlock for RequestComplete {
    async fn execute(&self, _ctx: &mut ExecutionContext) -> Result<Option<Resolution>> {
        Ok(None)
    }
}
