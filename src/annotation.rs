//! Dependency annotations: the ordered injection tokens a callable declares.
//!
//! There is deliberately no parameter-name inference. A callable either
//! carries an explicit annotation ([Injectable::new]) or none at all
//! ([Injectable::unannotated]), in which case it resolves to zero
//! dependencies outside strict mode.

use crate::error::ResolutionError;
use crate::service::{AnyServicePtr, ServiceRecord};
use derivative::Derivative;
use itertools::Itertools;
use std::rc::Rc;

/// An injection token declared by an [Injectable].
#[derive(Clone, Derivative)]
#[derivative(Debug)]
pub enum Token {
    /// The name of a service to resolve through the injector.
    Name(String),
    /// A raw value in annotation position. Registration calls assembled from
    /// dynamic arguments can produce these; they are rejected at injection
    /// time.
    Value(#[derivative(Debug = "ignore")] AnyServicePtr),
}

impl Token {
    /// Returns the service name for name tokens.
    pub fn name(&self) -> Option<&str> {
        match self {
            Token::Name(name) => Some(name),
            Token::Value(_) => None,
        }
    }
}

impl From<&str> for Token {
    fn from(name: &str) -> Self {
        Token::Name(name.to_string())
    }
}

impl From<String> for Token {
    fn from(name: String) -> Self {
        Token::Name(name)
    }
}

pub(crate) type InjectFn =
    Rc<dyn Fn(Option<&ServiceRecord>, &[AnyServicePtr]) -> Result<AnyServicePtr, ResolutionError>>;

/// A callable carrying its declared, ordered dependency tokens.
#[derive(Clone, Derivative)]
#[derivative(Debug)]
pub struct Injectable {
    tokens: Option<Vec<Token>>,
    #[derivative(Debug = "ignore")]
    func: InjectFn,
}

impl Injectable {
    /// An annotated callable: the token list followed by the function, which
    /// receives the resolved dependencies in declared order.
    pub fn new<I, F>(tokens: I, func: F) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Token>,
        F: Fn(&[AnyServicePtr]) -> Result<AnyServicePtr, ResolutionError> + 'static,
    {
        Self {
            tokens: Some(tokens.into_iter().map_into().collect()),
            func: Rc::new(move |_receiver, args| func(args)),
        }
    }

    /// An annotated callable which also receives the invocation receiver,
    /// when one is present. Provider constructors and `$get` factories use
    /// this to read and populate the provider record.
    pub fn with_receiver<I, F>(tokens: I, func: F) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Token>,
        F: Fn(Option<&ServiceRecord>, &[AnyServicePtr]) -> Result<AnyServicePtr, ResolutionError>
            + 'static,
    {
        Self {
            tokens: Some(tokens.into_iter().map_into().collect()),
            func: Rc::new(func),
        }
    }

    /// A callable without any annotation attached.
    pub fn unannotated<F>(func: F) -> Self
    where
        F: Fn(&[AnyServicePtr]) -> Result<AnyServicePtr, ResolutionError> + 'static,
    {
        Self {
            tokens: None,
            func: Rc::new(move |_receiver, args| func(args)),
        }
    }

    /// The declared annotation, when one is attached.
    pub fn tokens(&self) -> Option<&[Token]> {
        self.tokens.as_deref()
    }

    pub(crate) fn call(
        &self,
        receiver: Option<&ServiceRecord>,
        args: &[AnyServicePtr],
    ) -> Result<AnyServicePtr, ResolutionError> {
        (self.func)(receiver, args)
    }
}

/// Resolves the ordered dependency tokens declared by an injectable.
pub fn annotate(injectable: &Injectable, strict: bool) -> Result<Vec<Token>, ResolutionError> {
    match injectable.tokens() {
        Some(tokens) => Ok(tokens.to_vec()),
        None if strict => Err(ResolutionError::MissingAnnotation),
        None => Ok(Vec::new()),
    }
}

#[cfg(test)]
mod tests {
    use crate::annotation::{annotate, Injectable, Token};
    use crate::error::ResolutionError;
    use crate::service::service;

    #[test]
    fn should_return_declared_tokens() {
        let injectable = Injectable::new(["a", "b"], |_| Ok(service(())));

        let tokens = annotate(&injectable, false).unwrap();
        assert_eq!(tokens.len(), 2);
        assert_eq!(tokens[0].name(), Some("a"));
        assert_eq!(tokens[1].name(), Some("b"));
    }

    #[test]
    fn should_treat_missing_annotation_as_no_dependencies() {
        let injectable = Injectable::unannotated(|_| Ok(service(())));
        assert!(annotate(&injectable, false).unwrap().is_empty());
    }

    #[test]
    fn should_reject_missing_annotation_in_strict_mode() {
        let injectable = Injectable::unannotated(|_| Ok(service(())));
        assert_eq!(
            annotate(&injectable, true).unwrap_err(),
            ResolutionError::MissingAnnotation
        );
    }

    #[test]
    fn should_not_name_value_tokens() {
        assert!(Token::Value(service(42)).name().is_none());
    }
}
