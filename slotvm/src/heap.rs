use std::rc::Rc;

use rustc_hash::FxHashMap;

use crate::{Behavior, Map, Method, Object, ObjectId, ObjectLiteral, Payload, Value, VmError};

#[derive(Debug, Clone)]
pub struct HeapCreateInfo {
    /// number of object slots reserved up front
    pub initial_capacity: usize,
    /// live objects after which allocation fails, capped by the id space
    pub max_objects: usize,
}

impl Default for HeapCreateInfo {
    fn default() -> Self {
        Self {
            initial_capacity: 1024,
            max_objects: Heap::MAX_OBJECTS,
        }
    }
}

/// Arena of all objects of one VM.
///
/// Slots given back with [`Heap::release`] go on a free list and are handed
/// out again under the next generation, so an `ObjectId` of a released
/// object never aliases its successor. Every structural edit of an object's
/// map draws a new version from the heap-wide counter.
#[derive(Debug)]
pub struct Heap {
    objects: Vec<Object>,
    generations: Vec<u32>,
    free: Vec<u32>,
    max_objects: usize,
    version: u64,
    empty_map: Rc<Map>,
    strings: FxHashMap<Rc<str>, Value>,
    templates: FxHashMap<*const ObjectLiteral, (Rc<ObjectLiteral>, ObjectId)>,
}

impl Heap {
    /// Indices must fit into the `u32` of an `ObjectId`.
    pub const MAX_OBJECTS: usize = u32::MAX as usize;

    pub fn new(info: HeapCreateInfo) -> Self {
        let max_objects = info.max_objects.min(Self::MAX_OBJECTS);
        Self {
            objects: Vec::with_capacity(info.initial_capacity.min(max_objects)),
            generations: Vec::with_capacity(info.initial_capacity.min(max_objects)),
            free: Vec::new(),
            max_objects,
            version: 0,
            empty_map: Rc::new(Map::new(Behavior::Data)),
            strings: FxHashMap::default(),
            templates: FxHashMap::default(),
        }
    }

    /// Number of live objects.
    pub fn len(&self) -> usize {
        self.objects.len() - self.free.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn allocate(&mut self, object: Object) -> Result<ObjectId, VmError> {
        if let Some(index) = self.free.pop() {
            self.objects[index as usize] = object;
            return Ok(ObjectId::new(index, self.generations[index as usize]));
        }

        let index = self.objects.len();
        if index >= self.max_objects {
            return Err(VmError::HeapExhausted {
                limit: self.max_objects,
            });
        }
        self.objects.push(object);
        self.generations.push(0);
        Ok(ObjectId::new(index as u32, 0))
    }

    /// Gives the slot of `id` back to the arena. The caller guarantees that
    /// nothing reachable still refers to `id`.
    pub(crate) fn release(&mut self, id: ObjectId) {
        if !self.is_live(id) {
            return;
        }
        let index = id.index();
        self.objects[index] = Object::with_values(self.empty_map.clone(), Vec::new(), Vec::new());
        let generation = id.generation() + 1;
        self.generations[index] = generation;
        // a slot whose generations ran out stays retired
        if generation <= ObjectId::MAX_GENERATION {
            self.free.push(index as u32);
        }
    }

    /// Whether `id` still names the object it was handed out for.
    #[inline]
    pub fn is_live(&self, id: ObjectId) -> bool {
        self.generations.get(id.index()) == Some(&id.generation())
    }

    #[inline]
    pub fn object(&self, id: ObjectId) -> &Object {
        debug_assert!(self.is_live(id), "stale object id {id}");
        &self.objects[id.index()]
    }

    #[inline]
    pub(crate) fn object_mut(&mut self, id: ObjectId) -> &mut Object {
        debug_assert!(self.is_live(id), "stale object id {id}");
        &mut self.objects[id.index()]
    }

    pub fn get(&self, value: Value) -> Option<&Object> {
        value.as_object().map(|id| self.object(id))
    }

    pub fn as_str(&self, value: Value) -> Option<&str> {
        match self.get(value)?.payload() {
            Payload::Str(text) => Some(&**text),
            _ => None,
        }
    }

    pub fn as_float(&self, value: Value) -> Option<f64> {
        match self.get(value)?.payload() {
            Payload::Float(number) => Some(*number),
            _ => None,
        }
    }

    pub fn version_of(&self, id: ObjectId) -> u64 {
        self.object(id).version()
    }

    /// Empty object sharing the heap's empty map.
    pub fn new_object(&mut self) -> Result<ObjectId, VmError> {
        let object = Object::with_values(self.empty_map.clone(), Vec::new(), Vec::new());
        self.allocate(object)
    }

    /// Empty object with a private map of the given behavior.
    pub fn new_object_with(&mut self, behavior: Behavior) -> Result<ObjectId, VmError> {
        let object = Object::with_values(Rc::new(Map::new(behavior)), Vec::new(), Vec::new());
        self.allocate(object)
    }

    /// Empty object on the shared empty map carrying `payload`.
    pub(crate) fn new_with_payload(&mut self, payload: Payload) -> Result<ObjectId, VmError> {
        let mut object = Object::with_values(self.empty_map.clone(), Vec::new(), Vec::new());
        object.payload = payload;
        self.allocate(object)
    }

    pub fn new_method(&mut self, method: Method) -> Result<ObjectId, VmError> {
        self.new_object_with(Behavior::Method(Rc::new(method)))
    }

    /// Binding object for one call: parameters bound to `args`, missing
    /// ones to `nil`, chained to `scope`.
    pub(crate) fn new_binding(
        &mut self,
        method: &Method,
        args: &[Value],
        nil: Value,
        scope: Value,
    ) -> Result<ObjectId, VmError> {
        let layout = method.bindings.clone();
        let mut values = vec![nil; layout.slot_count()];
        for (name, arg) in method.params.iter().zip(args) {
            if let Some(index) = layout.slot_index(name) {
                values[index] = *arg;
            }
        }

        let mut object = Object::with_values(layout, values, Vec::new());
        object.scope_parent = Some(scope);
        self.allocate(object)
    }

    /// Shallow copy sharing the map, values are copied.
    pub fn clone_object(&mut self, id: ObjectId) -> Result<ObjectId, VmError> {
        let object = self.object(id).clone();
        self.allocate(object)
    }

    /// Clone of `template` whose scope parent is `scope`.
    pub fn instantiate(&mut self, template: ObjectId, scope: Value) -> Result<ObjectId, VmError> {
        let mut object = self.object(template).clone();
        object.scope_parent = Some(scope);
        self.allocate(object)
    }

    pub(crate) fn new_activation(&mut self, method: ObjectId, scope: Value, receiver: Value) -> Result<ObjectId, VmError> {
        let mut object = self.object(method).clone();
        object.scope_parent = Some(scope);
        object.payload = Payload::Activation { receiver };
        self.allocate(object)
    }

    pub fn clone_with_payload(&mut self, prototype: ObjectId, payload: Payload) -> Result<ObjectId, VmError> {
        let mut object = self.object(prototype).clone();
        object.payload = payload;
        self.allocate(object)
    }

    pub fn interned(&self, text: &str) -> Option<Value> {
        self.strings.get(text).copied()
    }

    pub(crate) fn remember_interned(&mut self, text: Rc<str>, value: Value) {
        self.strings.insert(text, value);
    }

    pub(crate) fn template(&self, literal: &Rc<ObjectLiteral>) -> Option<ObjectId> {
        self.templates
            .get(&Rc::as_ptr(literal))
            .map(|(_, template)| *template)
    }

    pub(crate) fn remember_template(&mut self, literal: &Rc<ObjectLiteral>, template: ObjectId) {
        // the stored Rc keeps the address from being reused
        self.templates
            .insert(Rc::as_ptr(literal), (literal.clone(), template));
    }

    /// Copy-on-write access to an object's map, stamped with a new version.
    fn map_mut(&mut self, id: ObjectId) -> &mut Map {
        self.version += 1;
        let version = self.version;
        let map = Rc::make_mut(&mut self.objects[id.index()].map);
        map.touch(version);
        map
    }

    pub fn add_slot(&mut self, id: ObjectId, name: &str, value: Value) {
        if let Some(index) = self.object(id).map().slot_index(name) {
            self.map_mut(id);
            self.object_mut(id).slot_values[index] = value;
            return;
        }

        let index = self.object(id).slot_values.len();
        self.map_mut(id).add_slot(name.into(), index);
        self.object_mut(id).slot_values.push(value);
    }

    /// Adds `name` at layout position `position`, see [`Map::insert_slot`].
    pub fn insert_slot(&mut self, id: ObjectId, position: isize, name: &str, value: Value) {
        if self.object(id).map().has_slot(name) {
            return self.add_slot(id, name, value);
        }

        let index = self.object(id).slot_values.len();
        self.map_mut(id).insert_slot(position, name.into(), index);
        self.object_mut(id).slot_values.push(value);
    }

    pub fn remove_slot(&mut self, id: ObjectId, name: &str) -> bool {
        if !self.object(id).map().has_slot(name) {
            return false;
        }

        if let Some(index) = self.map_mut(id).remove_slot(name) {
            self.object_mut(id).slot_values.remove(index);
        }
        true
    }

    pub fn add_parent(&mut self, id: ObjectId, name: &str, value: Value) {
        if let Some(index) = self.object(id).map().parent_index(name) {
            self.map_mut(id);
            self.object_mut(id).parent_values[index] = value;
            return;
        }

        let index = self.object(id).parent_values.len();
        self.map_mut(id).add_parent(name.into(), index);
        self.object_mut(id).parent_values.push(value);
    }

    pub fn remove_parent(&mut self, id: ObjectId, name: &str) -> bool {
        if !self.object(id).map().has_parent(name) {
            return false;
        }

        if let Some(index) = self.map_mut(id).remove_parent(name) {
            self.object_mut(id).parent_values.remove(index);
        }
        true
    }

    /// Value-only update, does not change the version.
    pub fn set_slot(&mut self, id: ObjectId, name: &str, value: Value) -> bool {
        self.object_mut(id).set_slot(name, value)
    }
}
