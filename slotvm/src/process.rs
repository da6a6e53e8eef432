use std::{fmt, rc::Rc, sync::Arc};

use parking_lot::RwLock;

use crate::{CodeContext, ObjectId, Value, VmError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProcessId(pub u32);

impl fmt::Display for ProcessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "process-{}", self.0)
    }
}

/// Observable outcome of a process.
#[derive(Debug, Clone, Default)]
pub struct ProcessStatus {
    pub finished: bool,
    pub finished_with_error: bool,
    pub result: Option<Value>,
    /// host-level failure that ended the process, if any
    pub error: Option<VmError>,
    /// `result` rendered while the heap was at hand
    pub display: Option<String>,
}

/// Cheap view on a process' status, stays usable after the scheduler
/// dropped the process.
#[derive(Debug, Clone)]
pub struct ProcessHandle {
    id: ProcessId,
    status: Arc<RwLock<ProcessStatus>>,
}

impl ProcessHandle {
    pub fn id(&self) -> ProcessId {
        self.id
    }

    pub fn finished(&self) -> bool {
        self.status.read().finished
    }

    pub fn finished_with_error(&self) -> bool {
        self.status.read().finished_with_error
    }

    pub fn result(&self) -> Option<Value> {
        self.status.read().result
    }

    pub fn error(&self) -> Option<VmError> {
        self.status.read().error.clone()
    }

    pub fn display(&self) -> Option<String> {
        self.status.read().display.clone()
    }

    pub fn status(&self) -> ProcessStatus {
        self.status.read().clone()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FrameKind {
    Method,
    /// handler block running for a raised value; returning from it means
    /// the handler declined
    Handler { error: Value },
}

#[derive(Debug)]
pub(crate) struct Frame {
    pub code: Rc<CodeContext>,
    pub ip: usize,
    pub stack: Vec<Value>,
    /// what `PUSH_SELF` pushes, implicit sends start here
    pub activation: Value,
    pub receiver: Value,
    pub handler: Option<Value>,
    pub kind: FrameKind,
    /// activation and binding made for this call
    pub records: Vec<ObjectId>,
    /// set once an object literal took the activation as its scope, the
    /// records then outlive the frame
    pub captured: bool,
}

impl Frame {
    pub fn new(code: Rc<CodeContext>, activation: Value, receiver: Value, kind: FrameKind) -> Self {
        Self {
            code,
            ip: 0,
            stack: Vec::new(),
            activation,
            receiver,
            handler: None,
            kind,
            records: Vec::new(),
            captured: false,
        }
    }

    /// Records that may go back to the heap once the frame is gone.
    pub fn releasable(&self) -> &[ObjectId] {
        if self.captured {
            &[]
        } else {
            &self.records
        }
    }

    #[inline]
    pub fn push(&mut self, value: Value) {
        self.stack.push(value);
    }

    #[inline]
    pub fn pop(&mut self) -> Result<Value, VmError> {
        self.stack.pop().ok_or(VmError::StackUnderflow)
    }
}

/// One independent computation with its own frame stack.
#[derive(Debug)]
pub struct Process {
    id: ProcessId,
    pub(crate) frames: Vec<Frame>,
    /// frame stacks parked by a raise, indexed by error token
    suspended: Vec<Option<Vec<Frame>>>,
    status: Arc<RwLock<ProcessStatus>>,
    done: bool,
}

impl Process {
    pub(crate) fn new(id: ProcessId, code: Rc<CodeContext>, universe: Value) -> Self {
        Self {
            id,
            frames: vec![Frame::new(code, universe, universe, FrameKind::Method)],
            suspended: Vec::new(),
            status: Arc::default(),
            done: false,
        }
    }

    pub fn id(&self) -> ProcessId {
        self.id
    }

    pub fn handle(&self) -> ProcessHandle {
        ProcessHandle {
            id: self.id,
            status: self.status.clone(),
        }
    }

    pub fn is_finished(&self) -> bool {
        self.done
    }

    /// Number of live frames.
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub(crate) fn finish(&mut self, result: Value, display: String) {
        self.close(ProcessStatus {
            finished: true,
            finished_with_error: false,
            result: Some(result),
            error: None,
            display: Some(display),
        });
    }

    pub(crate) fn finish_with_error(&mut self, result: Value, display: String, error: Option<VmError>) {
        self.close(ProcessStatus {
            finished: true,
            finished_with_error: true,
            result: Some(result),
            error,
            display: Some(display),
        });
    }

    fn close(&mut self, status: ProcessStatus) {
        self.done = true;
        self.frames.clear();
        self.suspended.clear();
        *self.status.write() = status;
    }

    /// Parks every live frame and returns the token index for them.
    pub(crate) fn suspend(&mut self) -> usize {
        let frames = std::mem::take(&mut self.frames);
        self.suspended.push(Some(frames));
        self.suspended.len() - 1
    }

    /// Takes the live frames and every parked stack.
    pub(crate) fn take_all_frames(&mut self) -> Vec<Frame> {
        let mut frames = std::mem::take(&mut self.frames);
        for parked in self.suspended.drain(..).flatten() {
            frames.extend(parked);
        }
        frames
    }

    /// Takes the frames parked under `index`, each index resumes once.
    pub(crate) fn take_suspended(&mut self, index: usize) -> Option<Vec<Frame>> {
        self.suspended.get_mut(index)?.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn process() -> Process {
        let mut code = CodeContext::new();
        code.finalize();
        Process::new(ProcessId(7), Rc::new(code), Value::from_fixnum(0))
    }

    #[test]
    fn handle_observes_finish() {
        let mut process = process();
        let handle = process.handle();
        assert!(!handle.finished());
        assert_eq!(handle.result(), None);

        process.finish(Value::from_fixnum(3), "3".into());
        drop(process);
        assert!(handle.finished());
        assert!(!handle.finished_with_error());
        assert_eq!(handle.result(), Some(Value::from_fixnum(3)));
        assert_eq!(handle.display().as_deref(), Some("3"));
    }

    #[test]
    fn finishing_with_error_keeps_the_cause() {
        let mut process = process();
        let handle = process.handle();
        process.finish_with_error(Value::from_fixnum(0), "boom".into(), Some(VmError::StackUnderflow));
        assert!(process.is_finished());
        assert_eq!(process.depth(), 0);
        assert!(handle.finished_with_error());
        assert_eq!(handle.error(), Some(VmError::StackUnderflow));
    }

    #[test]
    fn suspended_frames_resume_once() {
        let mut process = process();
        let index = process.suspend();
        assert_eq!(process.depth(), 0);
        let frames = process.take_suspended(index).unwrap();
        assert_eq!(frames.len(), 1);
        assert!(process.take_suspended(index).is_none());
        assert!(process.take_suspended(index + 1).is_none());
    }

    #[test]
    fn all_frames_include_parked_ones() {
        let mut process = process();
        process.suspend();
        process.frames.push(Frame::new(
            Rc::new(CodeContext::new()),
            Value::from_fixnum(2),
            Value::from_fixnum(2),
            FrameKind::Method,
        ));
        assert_eq!(process.take_all_frames().len(), 2);
        assert_eq!(process.depth(), 0);
        assert!(process.take_suspended(0).is_none());
    }

    #[test]
    fn captured_frames_keep_their_records() {
        let mut frame = Frame::new(
            Rc::new(CodeContext::new()),
            Value::from_fixnum(0),
            Value::from_fixnum(0),
            FrameKind::Method,
        );
        frame.records = vec![ObjectId::new(4, 0), ObjectId::new(5, 0)];
        assert_eq!(frame.releasable().len(), 2);
        frame.captured = true;
        assert!(frame.releasable().is_empty());
    }

    #[test]
    fn ids_display_with_prefix() {
        assert_eq!(ProcessId(3).to_string(), "process-3");
    }
}
