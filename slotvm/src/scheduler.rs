use std::{collections::VecDeque, rc::Rc};

use log::{debug, trace};

use crate::{
    CodeContext, Interpreter, Process, ProcessHandle, ProcessId, Turn, VMCreateInfo, VmError, VM,
};

#[derive(Debug, Clone, Copy)]
pub struct SchedulerConfig {
    /// Instructions a process runs per turn, `0` runs it to completion.
    pub quantum: usize,
    /// Frame depth at which a send fails with a stack overflow.
    pub max_frames: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            quantum: 1000,
            max_frames: 1024,
        }
    }
}

/// Round-robin pool of processes sharing one [`VM`].
pub struct Scheduler {
    vm: VM,
    config: SchedulerConfig,
    processes: VecDeque<Process>,
    next_id: u32,
}

impl Scheduler {
    pub fn new(info: VMCreateInfo) -> Result<Self, VmError> {
        Ok(Self {
            vm: VM::new(info.heap)?,
            config: info.scheduler,
            processes: VecDeque::new(),
            next_id: 0,
        })
    }

    pub fn vm(&self) -> &VM {
        &self.vm
    }

    pub fn vm_mut(&mut self) -> &mut VM {
        &mut self.vm
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Queues `code` as a new process running with the universe as `self`.
    pub fn add_process(&mut self, mut code: CodeContext) -> ProcessHandle {
        code.finalize();
        let id = ProcessId(self.next_id);
        self.next_id += 1;

        let process = Process::new(id, Rc::new(code), self.vm.universe().into());
        let handle = process.handle();
        debug!("{id} added");
        self.processes.push_back(process);
        handle
    }

    /// Drops a process from the pool, finished or not.
    pub fn remove_process(&mut self, id: ProcessId) -> bool {
        match self.processes.iter().position(|process| process.id() == id) {
            Some(index) => {
                self.processes.remove(index);
                debug!("{id} removed");
                true
            }
            None => false,
        }
    }

    pub fn process_count(&self) -> usize {
        self.processes.len()
    }

    pub fn has_processes_to_run(&self) -> bool {
        self.processes.iter().any(|process| !process.is_finished())
    }

    /// Gives the process at the head of the pool one turn. A process found
    /// finished leaves the pool instead. Returns `false` once the pool is
    /// empty.
    pub fn run_once(&mut self) -> bool {
        let Some(mut process) = self.processes.pop_front() else {
            return false;
        };
        if process.is_finished() {
            debug!("{} retired", process.id());
            return true;
        }

        let turn = Interpreter::new(&mut self.vm, &mut process, self.config.max_frames).run(self.config.quantum);
        trace!("{} turn ended: {turn:?}", process.id());
        self.processes.push_back(process);
        true
    }

    /// Runs every process to completion.
    pub fn interpret(&mut self) {
        while self.run_once() {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{testing::*, Value};

    fn adder(a: i64, b: i64) -> CodeContext {
        // (| add = (|| a + b) |) add
        let program = send(
            object(vec![constant("add", method(&[], vec![], vec![send(int(a), "+", vec![int(b)])]))]),
            "add",
            vec![],
        );
        compile(program)
    }

    #[test]
    fn independent_processes_finish_with_their_own_results() {
        let mut scheduler = Scheduler::new(VMCreateInfo::default()).unwrap();
        let one = scheduler.add_process(adder(1, 1));
        let two = scheduler.add_process(adder(2, 2));

        assert!(!one.finished());
        assert_eq!(one.result(), None);
        assert!(!two.finished());
        assert_eq!(two.result(), None);

        scheduler.interpret();

        assert!(one.finished());
        assert_eq!(one.result(), Some(Value::from_fixnum(2)));
        assert!(two.finished());
        assert_eq!(two.result(), Some(Value::from_fixnum(4)));
        assert_eq!(scheduler.process_count(), 0);
    }

    #[test]
    fn small_quantum_interleaves() {
        let mut scheduler = Scheduler::new(VMCreateInfo {
            scheduler: SchedulerConfig {
                quantum: 1,
                ..Default::default()
            },
            ..Default::default()
        }).unwrap();
        let one = scheduler.add_process(adder(1, 1));
        let two = scheduler.add_process(adder(2, 2));

        assert!(scheduler.run_once());
        assert!(scheduler.run_once());
        assert!(!one.finished());
        assert!(!two.finished());
        assert!(scheduler.has_processes_to_run());

        scheduler.interpret();
        assert_eq!(one.result(), Some(Value::from_fixnum(2)));
        assert_eq!(two.result(), Some(Value::from_fixnum(4)));
        assert!(!scheduler.run_once());
    }

    #[test]
    fn finished_process_leaves_on_its_next_turn() {
        let mut scheduler = Scheduler::new(VMCreateInfo {
            scheduler: SchedulerConfig {
                quantum: 0,
                ..Default::default()
            },
            ..Default::default()
        }).unwrap();
        let handle = scheduler.add_process(adder(3, 4));
        assert!(scheduler.run_once());
        assert!(handle.finished());
        assert_eq!(scheduler.process_count(), 1);
        assert!(!scheduler.has_processes_to_run());
        assert!(scheduler.run_once());
        assert_eq!(scheduler.process_count(), 0);
    }

    #[test]
    fn removed_process_never_finishes() {
        let mut scheduler = Scheduler::new(VMCreateInfo::default()).unwrap();
        let handle = scheduler.add_process(adder(1, 2));
        assert!(scheduler.remove_process(handle.id()));
        assert!(!scheduler.remove_process(handle.id()));
        scheduler.interpret();
        assert!(!handle.finished());
    }

    #[test]
    fn fatal_error_leaves_siblings_running() {
        let mut scheduler = Scheduler::new(VMCreateInfo::default()).unwrap();
        let broken = scheduler.add_process(compile(send(int(1), "/", vec![int(0)])));
        let healthy = scheduler.add_process(adder(2, 2));
        scheduler.interpret();

        assert!(broken.finished_with_error());
        assert!(healthy.finished());
        assert!(!healthy.finished_with_error());
        assert_eq!(healthy.result(), Some(Value::from_fixnum(4)));
    }

    #[test]
    fn processes_share_the_object_graph() {
        let mut scheduler = Scheduler::new(VMCreateInfo::default()).unwrap();
        let counter = scheduler.vm_mut().heap.new_object().unwrap();
        scheduler.vm_mut().heap.add_slot(counter, "count", Value::from_fixnum(0));
        let marker = scheduler.vm().specials.assignment;
        scheduler.vm_mut().heap.add_slot(counter, "count:", marker);
        scheduler.vm_mut().add_global("counter", counter.into());

        // counter count: counter count + 5
        let bump = || {
            compile(send(
                msg("counter", vec![]),
                "count:",
                vec![send(send(msg("counter", vec![]), "count", vec![]), "+", vec![int(5)])],
            ))
        };
        scheduler.add_process(bump());
        scheduler.add_process(bump());
        scheduler.interpret();

        assert_eq!(scheduler.vm().heap.object(counter).get_slot("count"), Some(Value::from_fixnum(10)));
    }
}
