use core::fmt;

use crate::{config::TASK_NAME_LEN, mem::HeapAddr};

/// Entry routine of a task. Receives the opaque argument given at creation.
pub type TaskEntry = extern "C" fn(usize);

/// Routine a task falls into when its entry routine returns.
pub type ExitRoutine = extern "C" fn() -> !;

/// Sequential identifier of a task, equal to its registry slot.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct TaskId(pub usize);

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub enum State {
    Ready,
    Running,
    Blocked,
    Terminated,
}

/// A task name truncated to `TASK_NAME_LEN - 1` bytes.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct TaskName {
    bytes: [u8; TASK_NAME_LEN],
    len:   u8,
}

impl TaskName {
    pub fn new(name: &str) -> Self {
        let mut len = name.len().min(TASK_NAME_LEN - 1);
        // Never cut a multi-byte character in half.
        while !name.is_char_boundary(len) {
            len -= 1;
        }

        let mut bytes = [0u8; TASK_NAME_LEN];
        bytes[..len].copy_from_slice(&name.as_bytes()[..len]);
        TaskName {
            bytes,
            len: len as u8,
        }
    }

    pub fn as_str(&self) -> &str {
        core::str::from_utf8(&self.bytes[..self.len as usize]).unwrap_or("")
    }
}

impl fmt::Display for TaskName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Debug for TaskName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.as_str())
    }
}

/// Task control block.
#[derive(Clone, Copy)]
pub struct Task {
    /// Machine address of the saved execution context. Written by the
    /// context switch whenever the task is switched out.
    pub cursor:     usize,
    pub entry:      TaskEntry,
    pub arg:        usize,
    pub state:      State,
    pub name:       TaskName,
    pub stack_base: HeapAddr,
    pub stack_size: usize,
    pub id:         TaskId,
    /// The heap block reserved for this descriptor. It only accounts for
    /// the descriptor's share of the arena and is never written; the
    /// control block itself lives in the registry's slot table.
    pub descriptor: HeapAddr,
}

impl Task {
    pub fn info(&self) -> TaskInfo {
        TaskInfo {
            id:         self.id,
            name:       self.name,
            state:      self.state,
            stack_base: self.stack_base,
            stack_size: self.stack_size,
        }
    }
}

/// A snapshot of a task for diagnostics.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct TaskInfo {
    pub id:         TaskId,
    pub name:       TaskName,
    pub state:      State,
    pub stack_base: HeapAddr,
    pub stack_size: usize,
}
