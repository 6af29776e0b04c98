use fxhash::FxHashMap;
use itertools::Itertools;
use std::any::Any;
use std::cell::RefCell;
use std::fmt::{Debug, Formatter};
use std::rc::Rc;

/// Shared pointer to a constructed service instance.
pub type ServicePtr<T> = Rc<T>;

/// Type-erased service value stored in injector caches.
pub type AnyServicePtr = Rc<dyn Any>;

/// Caller-supplied overrides consulted before the caches for the names they
/// own during a single invocation.
pub type Locals = FxHashMap<String, AnyServicePtr>;

/// Wraps a value into a type-erased service pointer.
pub fn service<T: 'static>(value: T) -> AnyServicePtr {
    Rc::new(value)
}

/// A plain string-keyed record built by instantiation.
///
/// Records carry no method table: all state and behavior a service exposes
/// must be placed in named slots by its constructor.
#[derive(Default)]
pub struct ServiceRecord {
    slots: RefCell<FxHashMap<String, AnyServicePtr>>,
}

impl ServiceRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a value under the given slot name, replacing any previous one.
    pub fn set<T: Into<String>>(&self, name: T, value: AnyServicePtr) {
        self.slots.borrow_mut().insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<AnyServicePtr> {
        self.slots.borrow().get(name).cloned()
    }

    /// Typed slot access; `None` when the slot is missing or holds a value of
    /// a different type.
    pub fn get_typed<T: 'static>(&self, name: &str) -> Option<ServicePtr<T>> {
        self.get(name).and_then(|value| value.downcast::<T>().ok())
    }

    #[inline]
    pub fn has(&self, name: &str) -> bool {
        self.slots.borrow().contains_key(name)
    }
}

impl Debug for ServiceRecord {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let slots = self.slots.borrow();
        let names = slots.keys().sorted().collect_vec();
        f.debug_struct("ServiceRecord").field("slots", &names).finish()
    }
}

#[cfg(test)]
mod tests {
    use crate::service::{service, ServiceRecord};

    #[test]
    fn should_store_and_retrieve_slots() {
        let record = ServiceRecord::new();
        record.set("port", service(8080i32));

        assert!(record.has("port"));
        assert!(!record.has("host"));
        assert_eq!(*record.get_typed::<i32>("port").unwrap(), 8080);
    }

    #[test]
    fn should_not_downcast_to_incompatible_types() {
        let record = ServiceRecord::new();
        record.set("port", service(8080i32));

        assert!(record.get_typed::<String>("port").is_none());
        assert!(record.get("port").is_some());
    }

    #[test]
    fn should_replace_existing_slots() {
        let record = ServiceRecord::new();
        record.set("port", service(8080i32));
        record.set("port", service(9090i32));

        assert_eq!(*record.get_typed::<i32>("port").unwrap(), 9090);
    }
}
