use std::rc::Rc;

use crate::{Map, ProcessId, Value};

/// Host data carried by an object next to its slots.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    None,
    Float(f64),
    Str(Rc<str>),
    /// activation record of a running method or block
    Activation { receiver: Value },
    /// opaque handle on a suspended frame stack
    ErrorToken { process: ProcessId, index: usize },
}

/// An instance: a map plus slot and parent values aligned with it.
#[derive(Debug, Clone)]
pub struct Object {
    pub(crate) map: Rc<Map>,
    pub(crate) slot_values: Vec<Value>,
    pub(crate) parent_values: Vec<Value>,
    pub(crate) scope_parent: Option<Value>,
    pub(crate) payload: Payload,
}

impl Object {
    pub(crate) fn with_values(map: Rc<Map>, slot_values: Vec<Value>, parent_values: Vec<Value>) -> Self {
        debug_assert_eq!(slot_values.len(), map.slot_count());
        debug_assert_eq!(parent_values.len(), map.parent_count());
        Self {
            map,
            slot_values,
            parent_values,
            scope_parent: None,
            payload: Payload::None,
        }
    }

    #[inline]
    pub fn map(&self) -> &Map {
        &self.map
    }

    #[inline]
    pub fn version(&self) -> u64 {
        self.map.version()
    }

    /// True while another object (or a method's binding layout) holds the
    /// same map, the next structural edit will copy it.
    pub fn is_map_shared(&self) -> bool {
        Rc::strong_count(&self.map) > 1
    }

    pub fn shares_map_with(&self, other: &Object) -> bool {
        Rc::ptr_eq(&self.map, &other.map)
    }

    #[inline]
    pub fn get_slot(&self, name: &str) -> Option<Value> {
        self.map.slot_index(name).map(|index| self.slot_values[index])
    }

    #[inline]
    pub fn get_parent(&self, name: &str) -> Option<Value> {
        self.map.parent_index(name).map(|index| self.parent_values[index])
    }

    pub fn slot_values(&self) -> &[Value] {
        &self.slot_values
    }

    pub fn parent_values(&self) -> &[Value] {
        &self.parent_values
    }

    pub fn scope_parent(&self) -> Option<Value> {
        self.scope_parent
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    /// `(name, value)` pairs in layout order.
    pub fn slots(&self) -> impl Iterator<Item = (&str, Value)> {
        self.map
            .slot_layout()
            .map(|(name, index)| (name, self.slot_values[index]))
    }

    /// Value-only update of an existing slot, the map is untouched.
    pub(crate) fn set_slot(&mut self, name: &str, value: Value) -> bool {
        match self.map.slot_index(name) {
            Some(index) => {
                self.slot_values[index] = value;
                true
            }
            None => false,
        }
    }
}
