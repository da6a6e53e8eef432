//! Slot resolution over the prototype graph.
//!
//! `slot_lookup` tries the receiver's own slots, then a single hop through
//! its scope parent, then a breadth-first walk over scope parents and
//! parent slots. The walk stops expanding an object once it defines the
//! name, and a second defining object makes the lookup ambiguous.
//!
//! Successful walks are cached on the receiver's map. An entry records the
//! version of every object the walk visited and the receiver's own edges.
//! A hit still compares every checkpoint, so it costs one version check per
//! visited object instead of a walk. Any mismatch walks the whole graph again
//! from the receiver, so detached ancestors never come back.
use std::collections::VecDeque;

use log::trace;
use rustc_hash::FxHashSet;

use crate::{Heap, Object, ObjectId, SpecialObjects, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupResult {
    None,
    Found { holder: ObjectId, value: Value },
    Ambiguous { first: ObjectId, second: ObjectId },
}

impl LookupResult {
    pub fn value(&self) -> Option<Value> {
        match self {
            LookupResult::Found { value, .. } => Some(*value),
            _ => None,
        }
    }

    pub fn holder(&self) -> Option<ObjectId> {
        match self {
            LookupResult::Found { holder, .. } => Some(*holder),
            _ => None,
        }
    }
}

/// Version of one visited object at the time a walk passed it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Checkpoint {
    pub object: ObjectId,
    pub version: u64,
}

impl Checkpoint {
    /// A released object fails the check even if its slot was reused.
    pub fn is_valid(&self, heap: &Heap) -> bool {
        heap.is_live(self.object) && heap.version_of(self.object) == self.version
    }
}

#[derive(Debug, Clone)]
pub struct CachedSlot {
    pub holder: ObjectId,
    pub checkpoints: Vec<Checkpoint>,
    pub receiver_scope: Option<Value>,
    pub receiver_parents: Vec<Value>,
}

impl CachedSlot {
    fn is_valid_for(&self, heap: &Heap, receiver: &Object) -> bool {
        // objects sharing a map may still point at different parents
        self.receiver_scope == receiver.scope_parent()
            && self.receiver_parents == receiver.parent_values()
            && heap.is_live(self.holder)
            && self.checkpoints.iter().all(|checkpoint| checkpoint.is_valid(heap))
    }
}

/// Object a lookup on `value` starts from. Fixnums have no object of
/// their own and start at their traits.
#[inline]
pub fn lookup_start(specials: &SpecialObjects, value: Value) -> ObjectId {
    value.as_object().unwrap_or(specials.fixnum_traits)
}

/// Resolves `name` for `receiver`, using and refreshing the cache.
pub fn lookup(heap: &Heap, specials: &SpecialObjects, receiver: Value, name: &str) -> LookupResult {
    slot_lookup(heap, specials, lookup_start(specials, receiver), name)
}

pub fn slot_lookup(heap: &Heap, specials: &SpecialObjects, id: ObjectId, name: &str) -> LookupResult {
    resolve(heap, specials, id, name, true)
}

/// Same result as [`slot_lookup`] without reading or writing the cache.
pub fn uncached_slot_lookup(heap: &Heap, specials: &SpecialObjects, id: ObjectId, name: &str) -> LookupResult {
    resolve(heap, specials, id, name, false)
}

fn resolve(heap: &Heap, specials: &SpecialObjects, id: ObjectId, name: &str, use_cache: bool) -> LookupResult {
    let object = heap.object(id);
    if let Some(value) = object.get_slot(name) {
        return LookupResult::Found { holder: id, value };
    }

    if let Some(scope) = object.scope_parent() {
        let scope = lookup_start(specials, scope);
        if let Some(value) = heap.object(scope).get_slot(name) {
            return LookupResult::Found {
                holder: scope,
                value,
            };
        }
    }

    if use_cache {
        parent_lookup(heap, specials, id, name)
    } else {
        traverse(heap, specials, id, |object| object.get_slot(name)).result
    }
}

/// Breadth-first search through scope parents and parent slots.
pub fn parent_lookup(heap: &Heap, specials: &SpecialObjects, id: ObjectId, name: &str) -> LookupResult {
    let receiver = heap.object(id);

    if let Some(entry) = receiver.map().cached(name) {
        if entry.is_valid_for(heap, receiver) {
            if let Some(value) = heap.object(entry.holder).get_slot(name) {
                trace!("lookup cache hit: `{name}` on {id} held by {}", entry.holder);
                return LookupResult::Found {
                    holder: entry.holder,
                    value,
                };
            }
        }
        trace!("lookup cache stale: `{name}` on {id}");
    }

    let traversal = traverse(heap, specials, id, |object| object.get_slot(name));
    if let LookupResult::Found { holder, .. } = traversal.result {
        let checkpoints = traversal
            .visited
            .iter()
            .map(|&object| Checkpoint {
                object,
                version: heap.version_of(object),
            })
            .collect();

        receiver.map().store_cached(
            name.into(),
            CachedSlot {
                holder,
                checkpoints,
                receiver_scope: receiver.scope_parent(),
                receiver_parents: receiver.parent_values().to_vec(),
            },
        );
    }

    traversal.result
}

/// Finds the value of the parent slot `parent` reachable from `id`, the
/// starting point of a resend.
pub fn parent_slot_lookup(heap: &Heap, specials: &SpecialObjects, id: ObjectId, parent: &str) -> LookupResult {
    traverse(heap, specials, id, |object| object.get_parent(parent)).result
}

struct Traversal {
    result: LookupResult,
    visited: Vec<ObjectId>,
}

fn traverse<F>(heap: &Heap, specials: &SpecialObjects, start: ObjectId, defines: F) -> Traversal
where
    F: Fn(&Object) -> Option<Value>,
{
    let mut queue = VecDeque::from([start]);
    let mut seen = FxHashSet::default();
    seen.insert(start);
    let mut visited = Vec::new();
    let mut result = LookupResult::None;

    while let Some(id) = queue.pop_front() {
        visited.push(id);
        let object = heap.object(id);

        if let Some(value) = defines(object) {
            if let LookupResult::Found { holder, .. } = result {
                return Traversal {
                    result: LookupResult::Ambiguous {
                        first: holder,
                        second: id,
                    },
                    visited,
                };
            }
            result = LookupResult::Found { holder: id, value };
            continue;
        }

        let edges = object
            .scope_parent()
            .into_iter()
            .chain(object.parent_values().iter().copied());
        for edge in edges {
            let next = lookup_start(specials, edge);
            if seen.insert(next) {
                queue.push_back(next);
            }
        }
    }

    Traversal { result, visited }
}
