// Mapping requests to action beans and events to handlers

use crate::action::{ActionBean, ActionBeanContext, ActionBeanDefinition, EventHandler, EVENT_NAME};
use crate::url_binding::{UrlBinding, UrlBindingFactory};
use crate::{Error, Result};
use lintel_bean::TypeRegistry;
use lintel_config::ConfigError;
use lintel_log::{debug, info};
use std::collections::HashMap;
use std::sync::Arc;

/// Registry of action bean definitions and their URL bindings.
#[derive(Debug, Default)]
pub struct ActionResolver {
    definitions: HashMap<String, Arc<ActionBeanDefinition>>,
    bindings: UrlBindingFactory,
}

impl ActionResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a definition. Its class must be known to `registry` so beans
    /// can be instantiated, and its URL binding must parse.
    pub fn add_action_bean(
        &mut self,
        definition: ActionBeanDefinition,
        registry: &TypeRegistry,
    ) -> Result<()> {
        if !registry.contains(definition.class()) {
            return Err(Error::Configuration(ConfigError::InvalidValue {
                key: "action_beans".to_string(),
                message: format!(
                    "action bean class {} is not registered with the type registry",
                    definition.class()
                ),
            }));
        }

        let binding = UrlBinding::parse(definition.class(), definition.url_binding())?;
        info!("Bound action bean {} to {}", definition.class(), binding);
        self.bindings.add_binding(binding);
        self.definitions
            .insert(definition.class().to_string(), Arc::new(definition));
        Ok(())
    }

    pub fn bindings(&self) -> &UrlBindingFactory {
        &self.bindings
    }

    pub fn get_definition(&self, class: &str) -> Option<&Arc<ActionBeanDefinition>> {
        self.definitions.get(class)
    }

    pub fn definitions(&self) -> impl Iterator<Item = &Arc<ActionBeanDefinition>> {
        self.definitions.values()
    }

    /// The binding a request path maps to, with its parameter values.
    pub fn get_url_binding(&self, path: &str) -> Result<Option<UrlBinding>> {
        self.bindings.get_binding(path)
    }

    /// Resolve the request's action bean: merge URI parameters into the
    /// context, record the action path and create a fresh bean instance.
    pub fn get_action_bean(
        &self,
        context: &mut ActionBeanContext,
        registry: &TypeRegistry,
    ) -> Result<(Arc<ActionBeanDefinition>, ActionBean)> {
        let path = context.request().path.clone();
        let binding = self
            .get_url_binding(&path)?
            .ok_or_else(|| Error::ActionBeanNotFound(path.clone()))?;
        let definition = self
            .definitions
            .get(binding.bean_class())
            .cloned()
            .ok_or_else(|| Error::ActionBeanNotFound(path.clone()))?;

        let merged = binding.merge_parameters(&context.request().parameters);
        context.set_parameters(merged);
        if let Some(prototype) = self.bindings.binding_for_class(definition.class()) {
            context.set_action_path(prototype.to_string());
        }

        let bean = registry
            .new_instance(definition.class())
            .map_err(|reason| Error::Instantiation {
                class: definition.class().to_string(),
                reason,
            })?;
        debug!("Resolved {} to action bean {}", path, definition.class());
        Ok((definition, bean))
    }

    /// The event named by the request: a parameter named after a handler
    /// (or `handler.x` for image buttons), else the `_eventName` parameter.
    pub fn get_event_name(
        &self,
        definition: &ActionBeanDefinition,
        context: &ActionBeanContext,
    ) -> Option<String> {
        let parameters = context.parameters();
        definition
            .handler_names()
            .find(|name| {
                parameters.contains_key(*name) || parameters.contains_key(&format!("{}.x", name))
            })
            .map(str::to_string)
            .or_else(|| {
                context
                    .parameter(EVENT_NAME)
                    .filter(|event| !event.is_empty())
                    .map(str::to_string)
            })
    }

    pub fn get_handler<'d>(
        &self,
        definition: &'d ActionBeanDefinition,
        event: &str,
    ) -> Result<&'d EventHandler> {
        definition
            .get_handler(event)
            .ok_or_else(|| Error::HandlerNotFound {
                bean_class: definition.class().to_string(),
                event: event.to_string(),
            })
    }

    /// The handler for requests that name no event.
    pub fn get_default_handler<'d>(
        &self,
        definition: &'d ActionBeanDefinition,
    ) -> Result<&'d EventHandler> {
        definition
            .default_handler_name()
            .and_then(|name| definition.get_handler(name))
            .ok_or_else(|| Error::HandlerNotFound {
                bean_class: definition.class().to_string(),
                event: "(default)".to_string(),
            })
    }
}
