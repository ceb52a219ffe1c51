//! Cooperative round-robin scheduling.
//!
//! The scheduler only decides; the kernel performs the context switch the
//! decision calls for.

use log::{debug, error, trace, warn};

use crate::{
    error::{KernelError, KernelResult},
    proc::{State, TaskId, TaskList},
};

#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub enum SchedState {
    NotRunning,
    Running,
}

/// Outcome of a scheduling decision.
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub enum Decision {
    /// The scheduler has not been started.
    Idle,
    /// The calling task keeps the processor.
    Stay,
    /// Nothing can run.
    NoReadyTask,
    /// Suspend `from` and resume `to`. Without `from` there is nothing to
    /// save and the switch only restores.
    Switch { from: Option<TaskId>, to: TaskId },
}

pub struct Scheduler {
    state:    SchedState,
    /// Registry slot of the last selected task.
    cursor:   Option<usize>,
    switches: u64,
}

impl Scheduler {
    pub const fn new() -> Self {
        Scheduler {
            state:    SchedState::NotRunning,
            cursor:   None,
            switches: 0,
        }
    }

    pub fn state(&self) -> SchedState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == SchedState::Running
    }

    /// Number of switches performed since start.
    pub fn switches(&self) -> u64 {
        self.switches
    }

    /// Picks the next task in registry order after the last selected one,
    /// wrapping around.
    ///
    /// The task holding the processor is a candidate too, looked at last:
    /// when nobody else is ready it simply keeps running, and only a
    /// caller that cannot run itself makes this return `None`.
    pub fn select_next(&self, tasks: &TaskList) -> Option<TaskId> {
        let count = tasks.len();
        if count == 0 {
            return None;
        }
        let start = self.cursor.map_or(0, |slot| (slot + 1) % count);

        (0..count)
            .map(|offset| TaskId((start + offset) % count))
            .find(|&id| match tasks.state(id) {
                Some(State::Ready) => true,
                Some(State::Running) => tasks.current() == Some(id),
                _ => false,
            })
    }

    /// Marks the scheduler running and elects the first task.
    pub fn start(&mut self, tasks: &mut TaskList) -> KernelResult<TaskId> {
        self.state = SchedState::Running;
        let first = match self.select_next(tasks) {
            Some(id) => id,
            None => {
                error!("sched: no ready task to start");
                return Err(KernelError::NoReadyTask);
            }
        };

        tasks.set_state(first, State::Running);
        tasks.set_current(Some(first));
        self.cursor = Some(first.0);
        debug!("sched: starting with task {}", first);
        Ok(first)
    }

    /// Decides who runs next and updates task states to match.
    pub fn schedule(&mut self, tasks: &mut TaskList) -> Decision {
        if !self.is_running() {
            return Decision::Idle;
        }

        let next = match self.select_next(tasks) {
            Some(id) => id,
            None => {
                warn!("sched: no ready task");
                return Decision::NoReadyTask;
            }
        };
        self.cursor = Some(next.0);

        let current = tasks.current();
        if current == Some(next) {
            // May have been blocked and unblocked without ever switching out.
            tasks.set_state(next, State::Running);
            debug!("sched: no other ready task, staying with {}", next);
            return Decision::Stay;
        }

        if let Some(id) = current {
            if tasks.state(id) == Some(State::Running) {
                tasks.set_state(id, State::Ready);
            }
        }
        tasks.set_state(next, State::Running);
        tasks.set_current(Some(next));
        self.switches += 1;

        trace!("sched: switch {:?} -> {}", current, next);

        Decision::Switch { from: current, to: next }
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Scheduler::new()
    }
}
