//! Value I/O between the engine and the host's animated objects.
//!
//! The engine never touches host objects directly. It reads a property's
//! current value when a tween needs an implicit `from`, and writes every
//! composed value back through a [`ValueIo`]. Adapters implement the trait
//! over their own object model; [`PropertyStore`] is the in-memory one.

use std::cell::RefCell;
use std::rc::Rc;

use hashbrown::HashMap;

use crate::ids::{PropertyKey, TargetId};
use crate::value::Value;

/// Reader/writer for animated properties.
pub trait ValueIo {
    /// Current value of `property` on `target`, if the host knows one.
    fn read(&self, target: TargetId, property: &str) -> Option<Value>;
    /// Apply a composed value.
    fn write(&mut self, target: TargetId, property: &str, value: &Value);
}

/// In-memory property table. Clones share the same storage so a host can
/// keep one handle while the engine owns another.
#[derive(Clone, Debug, Default)]
pub struct PropertyStore {
    values: Rc<RefCell<HashMap<PropertyKey, Value>>>,
}

impl PropertyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, target: TargetId, property: &str) -> Option<Value> {
        self.values
            .borrow()
            .get(&PropertyKey::new(target, property))
            .cloned()
    }

    /// Numeric view of a stored value; `None` when unset.
    pub fn number(&self, target: TargetId, property: &str) -> Option<f64> {
        self.get(target, property).map(|v| v.as_number())
    }

    pub fn set(&self, target: TargetId, property: &str, value: Value) {
        self.values
            .borrow_mut()
            .insert(PropertyKey::new(target, property), value);
    }

    pub fn len(&self) -> usize {
        self.values.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.borrow().is_empty()
    }
}

impl ValueIo for PropertyStore {
    fn read(&self, target: TargetId, property: &str) -> Option<Value> {
        self.get(target, property)
    }

    fn write(&mut self, target: TargetId, property: &str, value: &Value) {
        self.set(target, property, value.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_storage() {
        let store = PropertyStore::new();
        let mut engine_side = store.clone();
        engine_side.write(TargetId(3), "opacity", &Value::Number(0.5));
        assert_eq!(store.number(TargetId(3), "opacity"), Some(0.5));
        assert_eq!(store.len(), 1);
        assert!(store.read(TargetId(3), "x").is_none());
    }
}
