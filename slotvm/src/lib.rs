mod bytecode;
mod code;
mod error;
pub mod format;
mod heap;
mod interpreter;
pub mod lookup;
mod map;
mod object;
pub mod primitives;
mod process;
mod scheduler;
mod special;
mod tagged;
mod vm;

#[cfg(test)]
mod testing;

pub use bytecode::*;
pub use code::*;
pub use error::VmError;
pub use heap::{Heap, HeapCreateInfo};
pub use interpreter::{Interpreter, Turn, is_block_call};
pub use lookup::{CachedSlot, Checkpoint, LookupResult};
pub use map::{Behavior, Map, Method};
pub use object::{Object, Payload};
pub use primitives::{PrimitiveContext, PrimitiveDesc, PrimitiveFn, PrimitiveOutcome};
pub use process::{Process, ProcessHandle, ProcessId, ProcessStatus};
pub use scheduler::{Scheduler, SchedulerConfig};
pub use special::SpecialObjects;
pub use tagged::*;
pub use vm::{VM, VMCreateInfo};
