//! Providers describe how to build the eventual service instance: a record
//! exposing a `$get` factory, registered under `<name>Provider`. The
//! [Provide] registration API is itself a provider-tier service, so a
//! provider constructor can depend on it and register further services as a
//! side effect of its own construction.

use crate::annotation::Injectable;
use crate::error::ResolutionError;
use crate::injector::InjectorCore;
use crate::service::{service, AnyServicePtr, ServicePtr, ServiceRecord};
use std::rc::Rc;
use tracing::debug;

/// Cache-key suffix under which providers are registered.
pub const PROVIDER_SUFFIX: &str = "Provider";

/// Name of the record slot holding a provider's factory.
pub const GET_SLOT: &str = "$get";

/// How to build a service instance: a factory plus the record its
/// constructor built. The record is the receiver of the factory and the
/// holder of any provider-tier configuration state.
#[derive(Clone, Debug)]
pub struct Provider {
    get: Injectable,
    record: ServicePtr<ServiceRecord>,
}

impl Provider {
    /// A provider from a bare factory, the `{$get}` record shape.
    pub fn new(get: Injectable) -> Self {
        Self {
            get,
            record: Rc::new(ServiceRecord::new()),
        }
    }

    /// Wraps a constructed provider record, which must expose a factory in
    /// its `$get` slot.
    pub(crate) fn from_record(
        name: &str,
        record: ServicePtr<ServiceRecord>,
    ) -> Result<Self, ResolutionError> {
        let get = record
            .get_typed::<Injectable>(GET_SLOT)
            .ok_or_else(|| ResolutionError::InvalidProvider(name.to_string()))?;

        Ok(Self {
            get: (*get).clone(),
            record,
        })
    }

    /// The effective factory: the record's current `$get` slot when present
    /// (provider-tier code may have replaced it), else the registered one.
    pub fn factory(&self) -> Injectable {
        self.record
            .get_typed::<Injectable>(GET_SLOT)
            .map(|get| (*get).clone())
            .unwrap_or_else(|| self.get.clone())
    }

    /// The provider's record; receiver for its factory and holder of any
    /// configuration-time state.
    pub fn record(&self) -> &ServiceRecord {
        &self.record
    }
}

/// Registration-time provider shape: either a ready provider, or an
/// annotated constructor to be instantiated at the provider tier. The record
/// a constructor builds must expose a `$get` factory.
#[derive(Clone, Debug)]
pub enum ProviderSpec {
    Value(Provider),
    Constructor(Injectable),
}

/// The registration API, injectable at the provider tier as
/// [PROVIDE_SERVICE](crate::injector::PROVIDE_SERVICE).
#[derive(Clone)]
pub struct Provide {
    core: Rc<InjectorCore>,
}

impl Provide {
    pub(crate) fn new(core: Rc<InjectorCore>) -> Self {
        Self { core }
    }

    /// Registers a constant, available unchanged at both tiers without any
    /// factory involvement.
    pub fn constant(&self, name: &str, value: AnyServicePtr) {
        debug!("Registering constant '{}'.", name);
        self.core.providers().insert_ready(name, Rc::clone(&value));
        self.core.instances().insert_ready(name, value);
    }

    /// Registers a provider under `name + "Provider"`. Constructor-style
    /// specs are instantiated through the provider-tier injector first, so
    /// their dependencies resolve against providers and constants.
    pub fn provider(&self, name: &str, spec: ProviderSpec) -> Result<(), ResolutionError> {
        let provider = match spec {
            ProviderSpec::Value(provider) => provider,
            ProviderSpec::Constructor(constructor) => {
                let record = self
                    .core
                    .provider_injector()
                    .instantiate(&constructor, None)?;
                Provider::from_record(name, record)?
            }
        };

        debug!("Registering provider '{}'.", name);
        self.core
            .providers()
            .insert_ready(&format!("{name}{PROVIDER_SUFFIX}"), service(provider));
        Ok(())
    }

    /// Registers a factory function, shorthand for a `{$get}` provider.
    pub fn factory(&self, name: &str, factory: Injectable) -> Result<(), ResolutionError> {
        self.provider(name, ProviderSpec::Value(Provider::new(factory)))
    }
}
