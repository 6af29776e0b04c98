//! The module loader: named modules accumulate ordered registration queues
//! before any injector exists. The injector reads the queues exactly once
//! per bootstrap.

use crate::annotation::Injectable;
use crate::error::BootstrapError;
use crate::injector::{INJECTOR_SERVICE, PROVIDE_SERVICE};
use crate::provider::ProviderSpec;
use crate::service::AnyServicePtr;
use derivative::Derivative;
use fxhash::FxHashMap;
use itertools::Itertools;
#[cfg(test)]
use mockall::automock;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

/// A deferred method call on a named provider-tier service, queued by a
/// module and executed during bootstrap.
#[derive(Clone, Debug)]
pub(crate) struct RegistrationCall {
    pub(crate) target: &'static str,
    pub(crate) invocation: Invocation,
}

/// The queued method and its arguments, dispatched against the resolved
/// target by an explicit table rather than reflection.
#[derive(Clone, Derivative)]
#[derivative(Debug)]
pub(crate) enum Invocation {
    Constant {
        name: String,
        #[derivative(Debug = "ignore")]
        value: AnyServicePtr,
    },
    Provider {
        name: String,
        spec: ProviderSpec,
    },
    Factory {
        name: String,
        factory: Injectable,
    },
    Invoke {
        block: Injectable,
    },
}

impl Invocation {
    /// The queued method's name, for diagnostics.
    pub(crate) fn method(&self) -> &'static str {
        match self {
            Invocation::Constant { .. } => "constant",
            Invocation::Provider { .. } => "provider",
            Invocation::Factory { .. } => "factory",
            Invocation::Invoke { .. } => "invoke",
        }
    }
}

/// A named module: immutable identity plus the registration and
/// configuration queues appended to through the module handle.
#[derive(Debug)]
pub struct Module {
    name: String,
    requires: Vec<String>,
    invoke_queue: RefCell<VecDeque<RegistrationCall>>,
    config_queue: RefCell<Vec<RegistrationCall>>,
}

impl Module {
    pub(crate) fn new(name: &str, requires: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            requires: requires.iter().map(ToString::to_string).collect(),
            invoke_queue: Default::default(),
            config_queue: Default::default(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Names of the modules loaded before this one.
    pub fn requires(&self) -> &[String] {
        &self.requires
    }

    /// Queues a constant registration. Constants jump ahead of the other
    /// registrations of their module, so they are visible to every provider
    /// constructor regardless of declaration order.
    pub fn constant(&self, name: &str, value: AnyServicePtr) -> &Self {
        self.invoke_queue.borrow_mut().push_front(RegistrationCall {
            target: PROVIDE_SERVICE,
            invocation: Invocation::Constant {
                name: name.to_string(),
                value,
            },
        });
        self
    }

    /// Queues a provider registration.
    pub fn provider(&self, name: &str, spec: ProviderSpec) -> &Self {
        self.invoke_queue.borrow_mut().push_back(RegistrationCall {
            target: PROVIDE_SERVICE,
            invocation: Invocation::Provider {
                name: name.to_string(),
                spec,
            },
        });
        self
    }

    /// Queues a factory registration.
    pub fn factory(&self, name: &str, factory: Injectable) -> &Self {
        self.invoke_queue.borrow_mut().push_back(RegistrationCall {
            target: PROVIDE_SERVICE,
            invocation: Invocation::Factory {
                name: name.to_string(),
                factory,
            },
        });
        self
    }

    /// Queues a configuration block, invoked with full dependency injection
    /// once the module's registrations have run.
    pub fn config(&self, block: Injectable) -> &Self {
        self.config_queue.borrow_mut().push(RegistrationCall {
            target: INJECTOR_SERVICE,
            invocation: Invocation::Invoke { block },
        });
        self
    }

    pub(crate) fn registration_calls(&self) -> Vec<RegistrationCall> {
        self.invoke_queue.borrow().iter().cloned().collect_vec()
    }

    pub(crate) fn config_calls(&self) -> Vec<RegistrationCall> {
        self.config_queue.borrow().iter().cloned().collect_vec()
    }
}

/// Module lookup consumed by [create_injector](crate::injector::create_injector).
#[cfg_attr(test, automock)]
pub trait ModuleSource {
    /// Looks up a declared module by name.
    fn get_module(&self, name: &str) -> Result<Rc<Module>, BootstrapError>;
}

/// Name-keyed registry of modules, accumulating registration calls before
/// any injector exists.
#[derive(Default, Debug)]
pub struct ModuleRegistry {
    modules: RefCell<FxHashMap<String, Rc<Module>>>,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares a module with its requirements, replacing any previous
    /// declaration under the same name. Returns the handle used to queue
    /// registrations.
    pub fn module(&self, name: &str, requires: &[&str]) -> Rc<Module> {
        let module = Rc::new(Module::new(name, requires));
        self.modules
            .borrow_mut()
            .insert(name.to_string(), Rc::clone(&module));
        module
    }
}

impl ModuleSource for ModuleRegistry {
    fn get_module(&self, name: &str) -> Result<Rc<Module>, BootstrapError> {
        self.modules
            .borrow()
            .get(name)
            .cloned()
            .ok_or_else(|| BootstrapError::UnknownModule(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use crate::annotation::Injectable;
    use crate::error::BootstrapError;
    use crate::injector::{INJECTOR_SERVICE, PROVIDE_SERVICE};
    use crate::module::{ModuleRegistry, ModuleSource};
    use crate::service::service;

    #[test]
    fn should_register_and_fetch_modules() {
        let registry = ModuleRegistry::new();
        registry.module("myModule", &["myOtherModule"]);

        let module = registry.get_module("myModule").unwrap();
        assert_eq!(module.name(), "myModule");
        assert_eq!(module.requires(), ["myOtherModule".to_string()]);
    }

    #[test]
    fn should_fail_for_unknown_modules() {
        let registry = ModuleRegistry::new();
        let error = registry.get_module("myModule").unwrap_err();

        assert_eq!(error, BootstrapError::UnknownModule("myModule".to_string()));
        assert_eq!(error.to_string(), "Module myModule is not available!");
    }

    #[test]
    fn should_replace_modules_with_the_same_name() {
        let registry = ModuleRegistry::new();
        registry.module("myModule", &[]);
        registry.module("myModule", &["myOtherModule"]);

        let module = registry.get_module("myModule").unwrap();
        assert_eq!(module.requires(), ["myOtherModule".to_string()]);
    }

    #[test]
    fn should_hoist_constants_to_the_front_of_the_queue() {
        let registry = ModuleRegistry::new();
        let module = registry.module("myModule", &[]);
        module
            .factory("aService", Injectable::unannotated(|_| Ok(service(42))))
            .constant("aConstant", service(42));

        let calls = module.registration_calls();
        assert_eq!(calls[0].invocation.method(), "constant");
        assert_eq!(calls[1].invocation.method(), "factory");
    }

    #[test]
    fn should_keep_configuration_blocks_in_their_own_queue() {
        let registry = ModuleRegistry::new();
        let module = registry.module("myModule", &[]);
        module
            .constant("aConstant", service(42))
            .config(Injectable::unannotated(|_| Ok(service(()))));

        assert_eq!(module.registration_calls().len(), 1);

        let config = module.config_calls();
        assert_eq!(config.len(), 1);
        assert_eq!(config[0].target, INJECTOR_SERVICE);
        assert_eq!(config[0].invocation.method(), "invoke");
    }

    #[test]
    fn should_target_the_registration_api_for_registrations() {
        let registry = ModuleRegistry::new();
        let module = registry.module("myModule", &[]);
        module.constant("aConstant", service(42));

        assert_eq!(module.registration_calls()[0].target, PROVIDE_SERVICE);
    }
}
