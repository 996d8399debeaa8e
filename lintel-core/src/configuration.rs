// Dispatcher configuration: registries, converters, interceptors and settings

use crate::action::ActionBeanDefinition;
use crate::binder::PropertyBinder;
use crate::interceptor::{BeforeAfterMethodInterceptor, Interceptor};
use crate::lifecycle::LifecycleStage;
use crate::resolver::ActionResolver;
use crate::Result;
use lintel_bean::{ExpressionCache, Introspector, Locale, TypeRegistry};
use lintel_config::{BootstrapSettings, ConfigManager, Validate};
use lintel_log::{debug, warn};
use lintel_validation::{TypeConverter, TypeConverterFactory};
use std::collections::HashMap;
use std::sync::Arc;

/// Immutable, shared setup of a [`Dispatcher`](crate::Dispatcher).
pub struct Configuration {
    registry: Arc<TypeRegistry>,
    converters: Arc<TypeConverterFactory>,
    introspector: Introspector,
    resolver: ActionResolver,
    interceptors: HashMap<LifecycleStage, Vec<Arc<dyn Interceptor>>>,
    binder: PropertyBinder,
    settings: BootstrapSettings,
    default_locale: Locale,
}

impl Configuration {
    pub fn builder(registry: TypeRegistry) -> ConfigurationBuilder {
        ConfigurationBuilder {
            registry,
            definitions: Vec::new(),
            converters: Vec::new(),
            interceptors: Vec::new(),
            settings: BootstrapSettings::default(),
        }
    }

    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    pub fn converters(&self) -> &TypeConverterFactory {
        &self.converters
    }

    pub fn introspector(&self) -> &Introspector {
        &self.introspector
    }

    pub fn resolver(&self) -> &ActionResolver {
        &self.resolver
    }

    pub fn binder(&self) -> &PropertyBinder {
        &self.binder
    }

    pub fn settings(&self) -> &BootstrapSettings {
        &self.settings
    }

    pub fn default_locale(&self) -> &Locale {
        &self.default_locale
    }

    /// Interceptors for `stage`, outermost first.
    pub fn interceptors(&self, stage: LifecycleStage) -> Vec<Arc<dyn Interceptor>> {
        self.interceptors.get(&stage).cloned().unwrap_or_default()
    }
}

pub struct ConfigurationBuilder {
    registry: TypeRegistry,
    definitions: Vec<ActionBeanDefinition>,
    converters: Vec<(String, Arc<dyn TypeConverter>)>,
    interceptors: Vec<Arc<dyn Interceptor>>,
    settings: BootstrapSettings,
}

impl ConfigurationBuilder {
    pub fn action_bean(mut self, definition: ActionBeanDefinition) -> Self {
        self.definitions.push(definition);
        self
    }

    /// Register a converter for `class`, replacing any built-in one.
    pub fn converter(mut self, class: impl Into<String>, converter: Arc<dyn TypeConverter>) -> Self {
        self.converters.push((class.into(), converter));
        self
    }

    /// Add an interceptor. Interceptors run in registration order, after the
    /// built-in [`BeforeAfterMethodInterceptor`].
    pub fn interceptor(mut self, interceptor: Arc<dyn Interceptor>) -> Self {
        self.interceptors.push(interceptor);
        self
    }

    pub fn settings(mut self, settings: BootstrapSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Take settings from a loaded [`ConfigManager`].
    pub fn settings_from(self, manager: &ConfigManager) -> Result<Self> {
        let settings = BootstrapSettings::from_manager(manager)?;
        Ok(self.settings(settings))
    }

    pub fn build(self) -> Result<Configuration> {
        self.settings.validate()?;
        ExpressionCache::configure(self.settings.expression_cache_capacity);

        let registry = Arc::new(self.registry);
        let converters = Arc::new(TypeConverterFactory::new().with_registry(registry.clone()));
        for (class, converter) in self.converters {
            converters.add(class, converter);
        }
        let introspector = Introspector::new(registry.clone())
            .with_converter(converters.clone())
            .with_max_list_index(self.settings.max_list_index);

        let mut resolver = ActionResolver::new();
        for definition in self.definitions {
            resolver.add_action_bean(definition, &registry)?;
        }

        let mut chain: Vec<Arc<dyn Interceptor>> = vec![Arc::new(BeforeAfterMethodInterceptor)];
        chain.extend(self.interceptors);

        let mut interceptors: HashMap<LifecycleStage, Vec<Arc<dyn Interceptor>>> = HashMap::new();
        for interceptor in &chain {
            for stage in interceptor.intercepts() {
                let registered = interceptors.entry(*stage).or_default();
                if registered.iter().any(|existing| Arc::ptr_eq(existing, interceptor)) {
                    warn!("Interceptor registered twice for {}; keeping the first", stage);
                    continue;
                }
                registered.push(interceptor.clone());
            }
        }
        for stage in LifecycleStage::ALL {
            debug!(
                "{} interceptor(s) registered for {}",
                interceptors.get(&stage).map_or(0, Vec::len),
                stage
            );
        }

        Ok(Configuration {
            binder: PropertyBinder::new(self.settings.deny_roots.clone()),
            default_locale: Locale::new(self.settings.default_locale.as_str()),
            registry,
            converters,
            introspector,
            resolver,
            interceptors,
            settings: self.settings,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::ExecutionContext;
    use crate::interceptor::LoggingInterceptor;
    use crate::resolution::Resolution;
    use crate::Error;
    use async_trait::async_trait;
    use lintel_bean::ClassDescriptor;

    struct InitOnly;

    #[async_trait]
    impl Interceptor for InitOnly {
        async fn intercept(&self, context: &mut ExecutionContext) -> Result<Option<Resolution>> {
            context.proceed().await
        }

        fn intercepts(&self) -> &[LifecycleStage] {
            &[LifecycleStage::RequestInit]
        }
    }

    #[test]
    fn test_interceptor_registration() {
        let logging: Arc<dyn Interceptor> = Arc::new(LoggingInterceptor::new());
        let configuration = Configuration::builder(TypeRegistry::new())
            .interceptor(logging.clone())
            .interceptor(logging)
            .interceptor(Arc::new(InitOnly))
            .build()
            .unwrap();

        assert_eq!(configuration.interceptors(LifecycleStage::RequestInit).len(), 2);
        assert_eq!(configuration.interceptors(LifecycleStage::EventHandling).len(), 2);
        assert_eq!(configuration.interceptors(LifecycleStage::RequestComplete).len(), 1);
    }

    #[test]
    fn test_settings_are_applied() {
        let manager = ConfigManager::new();
        manager.set("locale.default", "de-DE").unwrap();
        manager.set("binding.deny_roots", "context, session").unwrap();
        manager.set("binding.max_list_index", "250").unwrap();

        let mut registry = TypeRegistry::new();
        registry.register(ClassDescriptor::class("CalculatorAction"));
        let configuration = Configuration::builder(registry)
            .action_bean(ActionBeanDefinition::new("CalculatorAction", "/calc"))
            .settings_from(&manager)
            .unwrap()
            .build()
            .unwrap();

        assert_eq!(configuration.default_locale().tag(), "de-DE");
        assert_eq!(configuration.settings().deny_roots, vec!["context", "session"]);
        assert_eq!(configuration.introspector().max_list_index(), 250);
        assert!(configuration
            .resolver()
            .get_definition("CalculatorAction")
            .is_some());
    }

    #[test]
    fn test_unknown_action_bean_class_fails() {
        let result = Configuration::builder(TypeRegistry::new())
            .action_bean(ActionBeanDefinition::new("Ghost", "/ghost"))
            .build();
        assert!(matches!(result, Err(Error::Configuration(_))));
    }
}
