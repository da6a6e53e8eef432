use crate::{
    format, lookup, Heap, HeapCreateInfo, LookupResult, ObjectId, SchedulerConfig, SpecialObjects,
    Value, VmError,
};

#[derive(Debug, Clone, Default)]
pub struct VMCreateInfo {
    pub heap: HeapCreateInfo,
    pub scheduler: SchedulerConfig,
}

/// Object graph shared by all processes of one scheduler.
#[derive(Debug)]
pub struct VM {
    pub heap: Heap,
    pub specials: SpecialObjects,
}

impl VM {
    /// Fails only when `info` leaves no room for the bootstrap objects.
    pub fn new(info: HeapCreateInfo) -> Result<Self, VmError> {
        let mut heap = Heap::new(info);
        let specials = SpecialObjects::new(&mut heap)?;
        Ok(Self { heap, specials })
    }

    pub fn universe(&self) -> ObjectId {
        self.specials.universe
    }

    pub fn nil(&self) -> Value {
        self.specials.nil
    }

    pub fn lookup(&self, receiver: Value, name: &str) -> LookupResult {
        lookup::lookup(&self.heap, &self.specials, receiver, name)
    }

    pub fn format(&self, value: Value) -> String {
        format::format_value(&self.heap, &self.specials, value)
    }

    pub fn intern(&mut self, text: &str) -> Result<Value, VmError> {
        self.specials.intern(&mut self.heap, text)
    }

    pub fn new_string(&mut self, text: &str) -> Result<Value, VmError> {
        self.specials.new_string(&mut self.heap, text)
    }

    /// Makes `value` reachable from top-level code as `name`.
    pub fn add_global(&mut self, name: &str, value: Value) {
        let universe = self.universe();
        self.heap.add_slot(universe, name, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn globals_resolve_from_the_universe() {
        let mut vm = VM::new(HeapCreateInfo::default()).unwrap();
        let text = vm.new_string("hello").unwrap();
        vm.add_global("greeting", text);
        let universe = Value::from(vm.universe());
        assert_eq!(vm.lookup(universe, "greeting").value(), Some(text));
        assert_eq!(vm.format(text), "hello");
        assert_eq!(vm.lookup(universe, "missing"), LookupResult::None);
    }

    #[test]
    fn bootstrap_needs_room() {
        let info = HeapCreateInfo {
            max_objects: 4,
            ..Default::default()
        };
        assert!(matches!(VM::new(info), Err(VmError::HeapExhausted { limit: 4 })));
    }
}
