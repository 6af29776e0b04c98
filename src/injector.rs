//! The injector: two memoizing, cycle-safe resolvers over a shared
//! resolution path, plus the bootstrap sequencer feeding them from module
//! registration queues.
//!
//! The provider tier holds providers, constants and the registration API;
//! the instance tier holds constructed services. An instance-tier miss
//! locates the matching `<name>Provider` and invokes its factory through the
//! instance tier itself, so factory dependencies are resolved as instances
//! and provider-tier services stay unreachable from constructed code.

use crate::annotation::{annotate, Injectable, Token};
use crate::error::{BootstrapError, ResolutionError};
use crate::module::{Invocation, ModuleSource, RegistrationCall};
use crate::provider::{Provide, Provider, PROVIDER_SUFFIX};
use crate::resolver::{ResolutionPath, ResolverCache};
use crate::service::{service, AnyServicePtr, Locals, ServicePtr, ServiceRecord};
use fxhash::FxHashSet;
use std::fmt::{Debug, Formatter};
use std::rc::Rc;
use tracing::debug;

/// Reserved name under which each tier's own resolver is injectable.
pub const INJECTOR_SERVICE: &str = "$injector";

/// Reserved provider-tier name of the registration API.
pub const PROVIDE_SERVICE: &str = "$provide";

/// Shared state of one injector: both tier caches, the resolution path they
/// share and the annotation strictness flag.
pub(crate) struct InjectorCore {
    providers: ResolverCache,
    instances: ResolverCache,
    path: ResolutionPath,
    strict: bool,
}

impl InjectorCore {
    fn new(strict: bool) -> Rc<Self> {
        Rc::new(Self {
            providers: ResolverCache::default(),
            instances: ResolverCache::default(),
            path: ResolutionPath::default(),
            strict,
        })
    }

    #[inline]
    pub(crate) fn providers(&self) -> &ResolverCache {
        &self.providers
    }

    #[inline]
    pub(crate) fn instances(&self) -> &ResolverCache {
        &self.instances
    }

    pub(crate) fn provider_injector(self: &Rc<Self>) -> Injector {
        Injector {
            core: Rc::clone(self),
            tier: Tier::Provider,
        }
    }

    pub(crate) fn instance_injector(self: &Rc<Self>) -> Injector {
        Injector {
            core: Rc::clone(self),
            tier: Tier::Instance,
        }
    }
}

/// Which cache a handle resolves against.
#[derive(Clone, Copy, Eq, PartialEq, Debug)]
enum Tier {
    Provider,
    Instance,
}

/// Handle to one tier of an injector. Cheap to clone; every clone shares the
/// same caches and resolution path.
///
/// [create_injector] returns the instance-tier handle. The provider-tier
/// handle is injectable as [INJECTOR_SERVICE] in provider constructors,
/// while constructed services injecting [INJECTOR_SERVICE] receive the
/// instance-tier handle.
#[derive(Clone)]
pub struct Injector {
    core: Rc<InjectorCore>,
    tier: Tier,
}

impl Injector {
    /// Whether a service of this name is obtainable at this tier.
    pub fn has(&self, name: &str) -> bool {
        match self.tier {
            Tier::Provider => self.core.providers.contains(name),
            Tier::Instance => {
                self.core.instances.contains(name)
                    || self
                        .core
                        .providers
                        .contains(&format!("{name}{PROVIDER_SUFFIX}"))
            }
        }
    }

    /// Resolves a service by name, constructing it on first request. Each
    /// name is constructed at most once per injector.
    pub fn get(&self, name: &str) -> Result<AnyServicePtr, ResolutionError> {
        match self.tier {
            Tier::Provider => self.provider_service(name),
            Tier::Instance => self.instance_service(name),
        }
    }

    /// Typed counterpart of [Injector::get].
    pub fn get_typed<T: 'static>(&self, name: &str) -> Result<ServicePtr<T>, ResolutionError> {
        self.get(name)?
            .downcast::<T>()
            .map_err(|_| ResolutionError::IncompatibleService(name.to_string()))
    }

    /// The ordered dependency tokens `injectable` declares, subject to this
    /// injector's strict mode.
    pub fn annotate(&self, injectable: &Injectable) -> Result<Vec<Token>, ResolutionError> {
        annotate(injectable, self.core.strict)
    }

    /// Calls `injectable` with its dependencies resolved at this tier, in
    /// declared order. `locals` take precedence over the caches for the
    /// names they own; `receiver` is passed through to the callable.
    pub fn invoke(
        &self,
        injectable: &Injectable,
        receiver: Option<&ServiceRecord>,
        locals: Option<&Locals>,
    ) -> Result<AnyServicePtr, ResolutionError> {
        let tokens = self.annotate(injectable)?;

        let mut args = Vec::with_capacity(tokens.len());
        for (position, token) in tokens.iter().enumerate() {
            let name = match token {
                Token::Name(name) => name,
                Token::Value(_) => return Err(ResolutionError::InvalidToken(position)),
            };
            let value = match locals.and_then(|locals| locals.get(name)) {
                Some(local) => Rc::clone(local),
                None => self.get(name)?,
            };
            args.push(value);
        }

        injectable.call(receiver, &args)
    }

    /// Builds a fresh record by invoking `constructor` with the record as
    /// receiver, discarding the return value. The record carries no method
    /// table; everything the service exposes must be placed on it by the
    /// constructor.
    pub fn instantiate(
        &self,
        constructor: &Injectable,
        locals: Option<&Locals>,
    ) -> Result<ServicePtr<ServiceRecord>, ResolutionError> {
        let record = Rc::new(ServiceRecord::new());
        self.invoke(constructor, Some(&record), locals)?;
        Ok(record)
    }

    fn provider_service(&self, name: &str) -> Result<AnyServicePtr, ResolutionError> {
        let core = &self.core;
        core.providers.resolve(name, &core.path, || {
            Err(ResolutionError::UnknownProvider(core.path.format()))
        })
    }

    fn instance_service(&self, name: &str) -> Result<AnyServicePtr, ResolutionError> {
        let core = &self.core;
        core.instances.resolve(name, &core.path, || {
            let provider = self
                .provider_service(&format!("{name}{PROVIDER_SUFFIX}"))?
                .downcast::<Provider>()
                .map_err(|_| ResolutionError::InvalidProvider(name.to_string()))?;

            debug!("Constructing service '{}'.", name);

            // Factory dependencies resolve at the instance tier, with the
            // provider record as receiver.
            core.instance_injector()
                .invoke(&provider.factory(), Some(provider.record()), None)
        })
    }
}

impl Debug for Injector {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Injector").field("tier", &self.tier).finish()
    }
}

/// Creates an injector for the requested modules, walking module
/// requirements depth-first and executing each module's registration queue
/// followed by its configuration queue. Returns the instance-tier handle.
pub fn create_injector(
    source: &dyn ModuleSource,
    modules: &[&str],
    strict: bool,
) -> Result<Injector, BootstrapError> {
    let core = InjectorCore::new(strict);

    // Self-hosting bootstrap: both resolvers and the registration API are
    // seeded as ordinary cache entries before any module runs.
    core.providers
        .insert_ready(PROVIDE_SERVICE, service(Provide::new(Rc::clone(&core))));
    core.providers
        .insert_ready(INJECTOR_SERVICE, service(core.provider_injector()));
    core.instances
        .insert_ready(INJECTOR_SERVICE, service(core.instance_injector()));

    let mut loaded = FxHashSet::default();
    for name in modules {
        load_module(&core, source, name, &mut loaded)?;
    }

    Ok(core.instance_injector())
}

/// Loads one module: requirements first, then the registration queue, then
/// the configuration queue. Already-loaded names are skipped, which also
/// absorbs requirement cycles instead of reporting them.
fn load_module(
    core: &Rc<InjectorCore>,
    source: &dyn ModuleSource,
    name: &str,
    loaded: &mut FxHashSet<String>,
) -> Result<(), BootstrapError> {
    if !loaded.insert(name.to_string()) {
        return Ok(());
    }

    let module = source.get_module(name)?;
    for required in module.requires() {
        load_module(core, source, required, loaded)?;
    }

    debug!("Loading module '{}'.", name);
    for call in module.registration_calls() {
        run_queued_call(core, &call, Tier::Provider)?;
    }
    for call in module.config_calls() {
        run_queued_call(core, &call, Tier::Instance)?;
    }

    Ok(())
}

/// Executes one queued call: the target service is resolved at the given
/// tier, then the tagged invocation is dispatched against it. Registration
/// queues resolve targets at the provider tier; configuration queues at the
/// instance tier, so configuration blocks receive full dependency injection.
fn run_queued_call(
    core: &Rc<InjectorCore>,
    call: &RegistrationCall,
    tier: Tier,
) -> Result<(), BootstrapError> {
    let handle = match tier {
        Tier::Provider => core.provider_injector(),
        Tier::Instance => core.instance_injector(),
    };
    let target = handle.get(call.target)?;

    match &call.invocation {
        Invocation::Constant { name, value } => {
            registration_api(&target, call)?.constant(name, Rc::clone(value));
        }
        Invocation::Provider { name, spec } => {
            registration_api(&target, call)?.provider(name, spec.clone())?;
        }
        Invocation::Factory { name, factory } => {
            registration_api(&target, call)?.factory(name, factory.clone())?;
        }
        Invocation::Invoke { block } => {
            let injector = Rc::clone(&target)
                .downcast::<Injector>()
                .map_err(|_| invalid_target(call))?;
            injector.invoke(block, None, None)?;
        }
    }

    Ok(())
}

fn registration_api(
    target: &AnyServicePtr,
    call: &RegistrationCall,
) -> Result<ServicePtr<Provide>, BootstrapError> {
    Rc::clone(target)
        .downcast::<Provide>()
        .map_err(|_| invalid_target(call))
}

fn invalid_target(call: &RegistrationCall) -> BootstrapError {
    BootstrapError::InvalidQueueTarget {
        target: call.target.to_string(),
        method: call.invocation.method(),
    }
}

#[cfg(test)]
mod tests {
    use crate::annotation::Injectable;
    use crate::error::BootstrapError;
    use crate::injector::{create_injector, Injector, INJECTOR_SERVICE, PROVIDE_SERVICE};
    use crate::module::{MockModuleSource, Module, ModuleRegistry};
    use crate::service::service;
    use mockall::predicate::*;
    use std::rc::Rc;

    fn expect_module(
        source: &mut MockModuleSource,
        name: &'static str,
        requires: &'static [&'static str],
    ) {
        source
            .expect_get_module()
            .with(eq(name))
            .times(1)
            .returning(move |name| Ok(Rc::new(Module::new(name, requires))));
    }

    #[test]
    fn should_load_each_module_once_for_diamond_requirements() {
        let mut source = MockModuleSource::new();
        expect_module(&mut source, "a", &["b", "c"]);
        expect_module(&mut source, "b", &["d"]);
        expect_module(&mut source, "c", &["d"]);
        expect_module(&mut source, "d", &[]);

        assert!(create_injector(&source, &["a"], false).is_ok());
    }

    #[test]
    fn should_absorb_module_requirement_cycles() {
        let mut source = MockModuleSource::new();
        expect_module(&mut source, "a", &["b"]);
        expect_module(&mut source, "b", &["a"]);

        assert!(create_injector(&source, &["a"], false).is_ok());
    }

    #[test]
    fn should_forward_unknown_module_errors() {
        let mut source = MockModuleSource::new();
        source
            .expect_get_module()
            .with(eq("a"))
            .times(1)
            .returning(|name| Err(BootstrapError::UnknownModule(name.to_string())));

        assert_eq!(
            create_injector(&source, &["a"], false).unwrap_err(),
            BootstrapError::UnknownModule("a".to_string())
        );
    }

    #[test]
    fn should_seed_the_reserved_services() {
        let source = MockModuleSource::new();
        let injector = create_injector(&source, &[], false).unwrap();

        let this = injector.get_typed::<Injector>(INJECTOR_SERVICE).unwrap();
        assert!(this.has(INJECTOR_SERVICE));
        assert!(!injector.has(PROVIDE_SERVICE));
    }

    #[test]
    fn should_reject_queued_calls_on_overwritten_targets() {
        let registry = ModuleRegistry::new();
        let module = registry.module("myModule", &[]);
        // The hoisted constant replaces the registration API before the
        // factory registration runs.
        module
            .constant(PROVIDE_SERVICE, service(42))
            .factory("aService", Injectable::unannotated(|_| Ok(service(42))));

        assert_eq!(
            create_injector(&registry, &["myModule"], false).unwrap_err(),
            BootstrapError::InvalidQueueTarget {
                target: PROVIDE_SERVICE.to_string(),
                method: "factory",
            }
        );
    }
}
