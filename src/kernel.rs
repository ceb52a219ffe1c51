use log::{error, info};
use spin::Mutex;

use crate::{
    arch::Arch,
    error::KernelResult,
    mem::{Heap, HeapStats},
    proc::{ContextTemplate, ExitRoutine, State, TaskEntry, TaskId, TaskInfo, TaskList},
    sched::{Decision, Scheduler},
};

struct KernelInner {
    heap:  Heap<'static>,
    tasks: TaskList,
    sched: Scheduler,
}

/// A context switch the scheduler asked for, carried out once the kernel
/// lock is released.
struct Transfer {
    save:   Option<*mut usize>,
    resume: usize,
}

/// Heap, task registry and scheduler of one system, driven through a
/// platform.
///
/// All bookkeeping happens under a lock that is always released before the
/// platform switches away, so the next task finds the kernel unlocked.
pub struct Kernel<A: Arch> {
    arch:  A,
    /// Where tasks land when their entry routine returns.
    exit:  ExitRoutine,
    inner: Mutex<KernelInner>,
}

impl<A: Arch> Kernel<A> {
    pub fn new(arch: A, exit: ExitRoutine) -> Self {
        Kernel {
            arch,
            exit,
            inner: Mutex::new(KernelInner {
                heap:  Heap::empty(),
                tasks: TaskList::new(),
                sched: Scheduler::new(),
            }),
        }
    }

    /// Hands `arena` to the heap and resets the registry and scheduler.
    pub fn init(&self, arena: &'static mut [u8]) -> KernelResult<()> {
        let heap = Heap::new(arena)?;
        let mut inner = self.inner.lock();
        inner.heap = heap;
        inner.tasks.init();
        inner.sched = Scheduler::new();
        info!(
            "kernel: initialized with {} bytes of heap",
            inner.heap.stats().total_bytes
        );
        Ok(())
    }

    pub fn create_task(
        &self,
        name: &str,
        entry: TaskEntry,
        arg: usize,
        stack_size: usize,
    ) -> KernelResult<TaskId> {
        let template = ContextTemplate {
            layout: A::LAYOUT,
            status: A::INITIAL_STATUS,
            exit:   self.exit as usize,
        };
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        inner
            .tasks
            .create(&mut inner.heap, name, entry, arg, stack_size, &template)
    }

    /// Runs the first ready task. Halts if there is none.
    pub fn start(&self) -> ! {
        let resume = {
            let mut guard = self.inner.lock();
            let inner = &mut *guard;
            match inner.sched.start(&mut inner.tasks) {
                Ok(first) => inner.tasks.cursor(first),
                Err(_) => None,
            }
        };

        match resume {
            Some(cursor) => {
                info!("kernel: starting scheduler");
                unsafe { self.arch.bootstrap(cursor) }
            }
            None => {
                error!("kernel: nothing to run, halting");
                A::halt()
            }
        }
    }

    /// Lets the next ready task run. Returns once the caller is selected
    /// again, or right away when nobody else can run.
    pub fn yield_now(&self) {
        let transfer = {
            let mut guard = self.inner.lock();
            let inner = &mut *guard;
            let decision = inner.sched.schedule(&mut inner.tasks);
            Self::transfer(&mut inner.tasks, decision)
        };
        if let Some(transfer) = transfer {
            unsafe { self.perform(transfer) }
        }
    }

    /// Terminates the calling task.
    pub fn exit(&self) -> ! {
        let transfer = {
            let mut guard = self.inner.lock();
            let inner = &mut *guard;
            if let Some(id) = inner.tasks.current() {
                inner.tasks.set_state(id, State::Terminated);
                if let Some(task) = inner.tasks.get(id) {
                    info!("kernel: task '{}' (id: {}) exited", task.name, id);
                }
            }
            let decision = inner.sched.schedule(&mut inner.tasks);
            Self::transfer(&mut inner.tasks, decision)
        };
        if let Some(transfer) = transfer {
            unsafe { self.perform(transfer) }
        }

        // A terminated task is never resumed, so getting here means there
        // was nothing to switch to.
        error!("kernel: no task left to run, halting");
        A::halt()
    }

    /// Stops `id` from being scheduled. Blocking the calling task also
    /// yields.
    pub fn block(&self, id: TaskId) -> bool {
        let is_current = {
            let mut inner = self.inner.lock();
            match inner.tasks.state(id) {
                Some(State::Ready | State::Running) => {}
                _ => return false,
            }
            inner.tasks.set_state(id, State::Blocked);
            inner.tasks.current() == Some(id)
        };
        if is_current {
            self.yield_now();
        }
        true
    }

    /// Makes a blocked task eligible again.
    pub fn unblock(&self, id: TaskId) -> bool {
        let mut inner = self.inner.lock();
        if inner.tasks.state(id) != Some(State::Blocked) {
            return false;
        }
        inner.tasks.set_state(id, State::Ready)
    }

    /// Busy-waits `ms` milliseconds, yielding after each one.
    pub fn delay_ms(&self, ms: u32) {
        for _ in 0..ms {
            A::delay_us(1000);
            self.yield_now();
        }
    }

    pub fn delay_us(&self, us: u32) {
        A::delay_us(us);
    }

    pub fn current(&self) -> Option<TaskId> {
        self.inner.lock().tasks.current()
    }

    pub fn task_info(&self, id: TaskId) -> Option<TaskInfo> {
        self.inner.lock().tasks.info(id)
    }

    pub fn task_count(&self) -> usize {
        self.inner.lock().tasks.len()
    }

    pub fn heap_stats(&self) -> HeapStats {
        self.inner.lock().heap.stats()
    }

    pub fn switch_count(&self) -> u64 {
        self.inner.lock().sched.switches()
    }

    fn transfer(tasks: &mut TaskList, decision: Decision) -> Option<Transfer> {
        match decision {
            Decision::Switch { from, to } => Some(Transfer {
                resume: tasks.cursor(to)?,
                save:   from.and_then(|id| tasks.cursor_slot(id)),
            }),
            Decision::Idle | Decision::Stay | Decision::NoReadyTask => None,
        }
    }

    /// # Safety
    ///
    /// The save slot must point into this kernel's task registry.
    unsafe fn perform(&self, transfer: Transfer) {
        match transfer.save {
            Some(save) => self.arch.switch(save, transfer.resume),
            None => self.arch.bootstrap(transfer.resume),
        }
    }
}
