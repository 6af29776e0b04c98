//! The generic resolution engine: a cycle-safe, memoizing name cache. One
//! engine instance backs each injector tier.

use crate::error::ResolutionError;
use crate::service::AnyServicePtr;
use fxhash::FxHashMap;
use itertools::Itertools;
use std::cell::RefCell;
use std::iter;
use std::rc::Rc;

/// State of a cache slot. A slot under construction on the current call
/// stack is the sole cycle-detection signal; failed constructions are
/// removed, so a later attempt retries from scratch instead of being
/// reported as circular.
pub(crate) enum CacheSlot {
    InProgress,
    Ready(AnyServicePtr),
}

/// Ordered stack of service names currently being resolved. Shared between
/// the provider and instance tiers, so a cycle spanning both is still
/// detected.
#[derive(Default)]
pub(crate) struct ResolutionPath {
    frames: RefCell<Vec<String>>,
}

impl ResolutionPath {
    fn push(&self, name: &str) {
        self.frames.borrow_mut().push(name.to_string());
    }

    fn pop(&self) {
        self.frames.borrow_mut().pop();
    }

    /// Formats the live path, most recently entered name first.
    pub(crate) fn format(&self) -> String {
        self.frames.borrow().iter().rev().join(" <- ")
    }

    /// Formats the live path with `head` prepended.
    pub(crate) fn format_from(&self, head: &str) -> String {
        iter::once(head)
            .chain(self.frames.borrow().iter().rev().map(String::as_str))
            .join(" <- ")
    }
}

/// Cycle-safe memoizing name cache. The miss handler is supplied per lookup,
/// so each tier can close over its own resolution context.
#[derive(Default)]
pub(crate) struct ResolverCache {
    slots: RefCell<FxHashMap<String, CacheSlot>>,
}

impl ResolverCache {
    #[inline]
    pub(crate) fn contains(&self, name: &str) -> bool {
        self.slots.borrow().contains_key(name)
    }

    /// Stores a ready value, replacing any previous registration.
    pub(crate) fn insert_ready(&self, name: &str, value: AnyServicePtr) {
        self.slots
            .borrow_mut()
            .insert(name.to_string(), CacheSlot::Ready(value));
    }

    /// Looks up `name`, running `produce` on a miss. Each name is produced at
    /// most once; re-entering a slot that is still under construction
    /// reports the full live path as a circular dependency.
    pub(crate) fn resolve<F>(
        &self,
        name: &str,
        path: &ResolutionPath,
        produce: F,
    ) -> Result<AnyServicePtr, ResolutionError>
    where
        F: FnOnce() -> Result<AnyServicePtr, ResolutionError>,
    {
        match self.slots.borrow().get(name) {
            Some(CacheSlot::InProgress) => {
                return Err(ResolutionError::CircularDependency(path.format_from(name)))
            }
            Some(CacheSlot::Ready(value)) => return Ok(Rc::clone(value)),
            None => {}
        }

        path.push(name);
        self.slots
            .borrow_mut()
            .insert(name.to_string(), CacheSlot::InProgress);

        let _guard = ConstructionGuard {
            cache: self,
            path,
            name,
        };

        let value = produce()?;
        self.slots
            .borrow_mut()
            .insert(name.to_string(), CacheSlot::Ready(Rc::clone(&value)));
        Ok(value)
    }
}

/// Pops the path frame and clears a still-in-progress slot on every exit
/// path, success or failure.
struct ConstructionGuard<'a> {
    cache: &'a ResolverCache,
    path: &'a ResolutionPath,
    name: &'a str,
}

impl Drop for ConstructionGuard<'_> {
    fn drop(&mut self) {
        self.path.pop();
        let mut slots = self.cache.slots.borrow_mut();
        if matches!(slots.get(self.name), Some(CacheSlot::InProgress)) {
            slots.remove(self.name);
        }
    }
}
