use core::mem::size_of;

use log::{error, info};

use super::{
    context::{self, ContextTemplate},
    State, Task, TaskEntry, TaskId, TaskInfo, TaskName,
};
use crate::{
    config::MAX_TASKS,
    error::{KernelError, KernelResult},
    mem::Heap,
};

/// Fixed-capacity registry of every task ever created.
///
/// Slots are filled in creation order and never emptied: a terminated task
/// keeps its slot, its descriptor block and its stack for the lifetime of
/// the system.
pub struct TaskList {
    slots:   [Option<Task>; MAX_TASKS],
    count:   usize,
    current: Option<TaskId>,
}

impl TaskList {
    pub const fn new() -> Self {
        TaskList {
            slots:   [None; MAX_TASKS],
            count:   0,
            current: None,
        }
    }

    pub fn init(&mut self) {
        *self = TaskList::new();
        info!("proc: task registry initialized, {} slots", MAX_TASKS);
    }

    /// Creates a task in the `Ready` state.
    ///
    /// Allocates the descriptor block, then the stack. If the stack cannot
    /// be had the descriptor block is given back, so a failed creation
    /// leaves both the heap and the registry as they were.
    pub fn create(
        &mut self,
        heap: &mut Heap<'_>,
        name: &str,
        entry: TaskEntry,
        arg: usize,
        stack_size: usize,
        template: &ContextTemplate,
    ) -> KernelResult<TaskId> {
        if self.count >= MAX_TASKS {
            error!("proc: maximum tasks reached, cannot create '{}'", name);
            return Err(KernelError::CapacityExceeded);
        }

        let descriptor = heap.allocate(size_of::<Task>()).map_err(|err| {
            error!("proc: failed to allocate descriptor for '{}'", name);
            err
        })?;

        let stack_base = match heap.allocate(stack_size) {
            Ok(addr) => addr,
            Err(err) => {
                error!("proc: failed to allocate stack for '{}'", name);
                let _ = heap.release(descriptor);
                return Err(err);
            }
        };

        let stack_addr = heap.address_of(stack_base);
        let frame = context::init_frame(
            heap.bytes_mut(stack_base, stack_size),
            stack_addr,
            template,
            entry as usize,
            arg,
        );
        let cursor = match frame {
            Some(cursor) => cursor,
            None => {
                error!("proc: stack of {} bytes is too small for '{}'", stack_size, name);
                let _ = heap.release(stack_base);
                let _ = heap.release(descriptor);
                return Err(KernelError::AllocationError);
            }
        };

        let id = TaskId(self.count);
        let task = Task {
            cursor,
            entry,
            arg,
            state: State::Ready,
            name: TaskName::new(name),
            stack_base,
            stack_size,
            id,
            descriptor,
        };
        self.slots[id.0] = Some(task);
        self.count += 1;

        info!(
            "proc: created task '{}' (id: {}, stack: 0x{:x})",
            task.name, id, stack_addr
        );
        Ok(id)
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn get(&self, id: TaskId) -> Option<&Task> {
        self.slots.get(id.0)?.as_ref()
    }

    pub fn get_mut(&mut self, id: TaskId) -> Option<&mut Task> {
        self.slots.get_mut(id.0)?.as_mut()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Task> {
        self.slots[..self.count].iter().flatten()
    }

    pub fn info(&self, id: TaskId) -> Option<TaskInfo> {
        self.get(id).map(Task::info)
    }

    pub fn state(&self, id: TaskId) -> Option<State> {
        self.get(id).map(|task| task.state)
    }

    /// Moves a task to `state`. A terminated task stays terminated.
    pub fn set_state(&mut self, id: TaskId, state: State) -> bool {
        match self.get_mut(id) {
            Some(task) if task.state != State::Terminated => {
                task.state = state;
                true
            }
            _ => false,
        }
    }

    /// The task presently holding the processor.
    pub fn current(&self) -> Option<TaskId> {
        self.current
    }

    pub fn set_current(&mut self, id: Option<TaskId>) {
        self.current = id;
    }

    /// Where the context switch stores the resumption state of `id`.
    pub fn cursor_slot(&mut self, id: TaskId) -> Option<*mut usize> {
        self.get_mut(id).map(|task| &mut task.cursor as *mut usize)
    }

    pub fn cursor(&self, id: TaskId) -> Option<usize> {
        self.get(id).map(|task| task.cursor)
    }
}

impl Default for TaskList {
    fn default() -> Self {
        TaskList::new()
    }
}
