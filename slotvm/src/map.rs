use std::{cell::RefCell, rc::Rc};

use indexmap::IndexMap;
use rustc_hash::FxHashMap;

use crate::{CachedSlot, CodeContext, PrimitiveDesc};

/// Code attached to a method or block object.
#[derive(Debug)]
pub struct Method {
    pub code: Rc<CodeContext>,
    pub params: Vec<Rc<str>>,
    pub is_block: bool,
    /// layout shared by every binding object of this method
    pub(crate) bindings: Rc<Map>,
}

impl Method {
    pub fn new(code: Rc<CodeContext>, params: Vec<Rc<str>>, is_block: bool) -> Self {
        let mut bindings = Map::new(Behavior::Data);
        for name in &params {
            if !bindings.has_slot(name) {
                let index = bindings.slot_count();
                bindings.add_slot(name.clone(), index);
            }
        }

        Self {
            code,
            params,
            is_block,
            bindings: Rc::new(bindings),
        }
    }

    pub fn arity(&self) -> usize {
        self.params.len()
    }
}

/// What happens when a slot holding an object with this map is the
/// result of a send.
#[derive(Debug, Clone)]
pub enum Behavior {
    /// push the object itself
    Data,
    Method(Rc<Method>),
    Native(PrimitiveDesc),
    /// marker stored in `name:` slots, the send writes slot `name`
    Assignment,
}

/// Slot layout shared by objects of identical structure.
///
/// Maps are shared through `Rc`. Structural edits go through
/// `Rc::make_mut`, so a map referenced by more than one object is cloned
/// before it changes. Every edit stamps a fresh version from the heap.
#[derive(Debug)]
pub struct Map {
    slots: IndexMap<Rc<str>, usize>,
    parents: IndexMap<Rc<str>, usize>,
    version: u64,
    behavior: Behavior,
    cache: RefCell<FxHashMap<Rc<str>, CachedSlot>>,
}

impl Clone for Map {
    fn clone(&self) -> Self {
        // entries describe the original's traversals, a clone starts cold
        Self {
            slots: self.slots.clone(),
            parents: self.parents.clone(),
            version: self.version,
            behavior: self.behavior.clone(),
            cache: RefCell::default(),
        }
    }
}

impl Map {
    pub fn new(behavior: Behavior) -> Self {
        Self {
            slots: IndexMap::new(),
            parents: IndexMap::new(),
            version: 0,
            behavior,
            cache: RefCell::default(),
        }
    }

    #[inline]
    pub fn version(&self) -> u64 {
        self.version
    }

    #[inline]
    pub fn behavior(&self) -> &Behavior {
        &self.behavior
    }

    pub fn method(&self) -> Option<&Rc<Method>> {
        match &self.behavior {
            Behavior::Method(method) => Some(method),
            _ => None,
        }
    }

    pub fn is_block(&self) -> bool {
        self.method().is_some_and(|method| method.is_block)
    }

    #[inline]
    pub fn slot_index(&self, name: &str) -> Option<usize> {
        self.slots.get(name).copied()
    }

    #[inline]
    pub fn parent_index(&self, name: &str) -> Option<usize> {
        self.parents.get(name).copied()
    }

    pub fn has_slot(&self, name: &str) -> bool {
        self.slots.contains_key(name)
    }

    pub fn has_parent(&self, name: &str) -> bool {
        self.parents.contains_key(name)
    }

    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    pub fn parent_count(&self) -> usize {
        self.parents.len()
    }

    /// Slot names in layout order.
    pub fn slot_names(&self) -> impl Iterator<Item = &str> {
        self.slots.keys().map(|name| &**name)
    }

    pub fn slot_layout(&self) -> impl Iterator<Item = (&str, usize)> {
        self.slots.iter().map(|(name, index)| (&**name, *index))
    }

    pub fn parent_names(&self) -> impl Iterator<Item = &str> {
        self.parents.keys().map(|name| &**name)
    }

    pub(crate) fn add_slot(&mut self, name: Rc<str>, index: usize) {
        self.slots.insert(name, index);
    }

    /// Places `name` at layout position `position`, clamped to the
    /// current bounds.
    pub(crate) fn insert_slot(&mut self, position: isize, name: Rc<str>, index: usize) {
        let position = position.clamp(0, self.slots.len() as isize) as usize;
        self.slots.shift_insert(position, name, index);
    }

    /// Returns the storage index that was freed, higher indices move down.
    pub(crate) fn remove_slot(&mut self, name: &str) -> Option<usize> {
        let removed = self.slots.shift_remove(name)?;
        shift_down(&mut self.slots, removed);
        Some(removed)
    }

    pub(crate) fn add_parent(&mut self, name: Rc<str>, index: usize) {
        self.parents.insert(name, index);
    }

    pub(crate) fn remove_parent(&mut self, name: &str) -> Option<usize> {
        let removed = self.parents.shift_remove(name)?;
        shift_down(&mut self.parents, removed);
        Some(removed)
    }

    /// Stamps a new version and drops cached lookups.
    pub(crate) fn touch(&mut self, version: u64) {
        self.version = version;
        self.cache.get_mut().clear();
    }

    pub(crate) fn cached(&self, name: &str) -> Option<CachedSlot> {
        self.cache.borrow().get(name).cloned()
    }

    pub(crate) fn store_cached(&self, name: Rc<str>, entry: CachedSlot) {
        self.cache.borrow_mut().insert(name, entry);
    }

    pub fn cached_names(&self) -> usize {
        self.cache.borrow().len()
    }
}

fn shift_down(indices: &mut IndexMap<Rc<str>, usize>, removed: usize) {
    for index in indices.values_mut() {
        if *index > removed {
            *index -= 1;
        }
    }
}
