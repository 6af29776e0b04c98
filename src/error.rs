use thiserror::Error;

/// Errors related to resolving and constructing services.
#[derive(Error, Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Debug)]
pub enum ResolutionError {
    #[error("Unknown provider: {0}")]
    UnknownProvider(String),
    #[error("Circular dependency found: {0}")]
    CircularDependency(String),
    #[error("Incorrect injection token! Expected a service name at position {0}")]
    InvalidToken(usize),
    #[error("Injectable is not using explicit annotation and cannot be invoked in strict mode")]
    MissingAnnotation,
    #[error("Provider '{0}' does not define a $get factory")]
    InvalidProvider(String),
    #[error("Tried to downcast service '{0}' to an incompatible type")]
    IncompatibleService(String),
    #[error("Service construction failed: {0}")]
    ConstructionFailed(String),
}

/// Errors related to loading modules and running their registration queues.
#[derive(Error, Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Debug)]
pub enum BootstrapError {
    #[error("Module {0} is not available!")]
    UnknownModule(String),
    #[error("Service '{target}' does not support queued method '{method}'")]
    InvalidQueueTarget {
        target: String,
        method: &'static str,
    },
    #[error(transparent)]
    Resolution(#[from] ResolutionError),
}
