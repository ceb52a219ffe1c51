//! Hosted platform for running the kernel inside an ordinary process.
//!
//! There is no way to swap register files under a host OS, so every task is
//! backed by its own thread and a baton decides which one may run. Exactly
//! one thread holds the baton at any time, which keeps the scheduling
//! behaviour identical to the bare-metal switch: a task only stops running
//! inside `switch` and only continues when some other task resumes it.
//!
//! A task is identified by the cursor of its initial frame. The frame is
//! read once to learn the entry routine, argument and exit routine; after
//! that the cursor is never rewritten.

use std::{
    collections::BTreeMap,
    format,
    io::Write,
    sync::{Arc, Condvar, Mutex, PoisonError},
    thread,
    time::{Duration, Instant},
};

use log::{error, trace};

use super::Arch;
use crate::proc::{context, ExitRoutine, FrameLayout, TaskEntry};

#[derive(Default)]
struct Baton {
    turn: Mutex<bool>,
    cv:   Condvar,
}

impl Baton {
    fn pass(&self) {
        let mut turn = self.turn.lock().unwrap_or_else(PoisonError::into_inner);
        *turn = true;
        self.cv.notify_one();
    }

    fn wait(&self) {
        let mut turn = self.turn.lock().unwrap_or_else(PoisonError::into_inner);
        while !*turn {
            turn = self.cv.wait(turn).unwrap_or_else(PoisonError::into_inner);
        }
        *turn = false;
    }
}

pub struct Platform {
    batons: Mutex<BTreeMap<usize, Arc<Baton>>>,
}

impl Platform {
    pub fn new() -> Self {
        Platform {
            batons: Mutex::new(BTreeMap::new()),
        }
    }

    fn baton(&self, cursor: usize) -> Arc<Baton> {
        let mut batons = self.batons.lock().unwrap_or_else(PoisonError::into_inner);
        batons.entry(cursor).or_default().clone()
    }

    /// Hands the processor to the task at `cursor`, starting its thread the
    /// first time.
    unsafe fn resume(&self, cursor: usize) {
        let mut batons = self.batons.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(baton) = batons.get(&cursor) {
            baton.pass();
            return;
        }
        batons.insert(cursor, Arc::new(Baton::default()));
        drop(batons);
        self.launch(cursor);
    }

    unsafe fn launch(&self, cursor: usize) {
        let layout = Self::LAYOUT;
        let entry: TaskEntry = core::mem::transmute(context::read_word(cursor, layout.pc));
        let arg = context::read_word(cursor, layout.arg);
        let exit: ExitRoutine = core::mem::transmute(context::read_word(cursor, layout.ra));

        trace!("hosted: launching task thread for frame 0x{:x}", cursor);
        let spawned = thread::Builder::new()
            .name(format!("task-{:x}", cursor))
            .spawn(move || {
                entry(arg);
                exit()
            });
        if let Err(err) = spawned {
            error!("hosted: failed to spawn task thread: {}", err);
        }
    }
}

impl Default for Platform {
    fn default() -> Self {
        Platform::new()
    }
}

impl Arch for Platform {
    const LAYOUT: FrameLayout = FrameLayout {
        words:  16,
        ra:     0,
        pc:     1,
        status: 2,
        arg:    3,
    };
    const INITIAL_STATUS: usize = 0;

    unsafe fn switch(&self, save: *mut usize, resume: usize) {
        let me = self.baton(*save);
        self.resume(resume);
        me.wait();
    }

    unsafe fn bootstrap(&self, resume: usize) -> ! {
        self.resume(resume);
        loop {
            thread::park();
        }
    }

    fn halt() -> ! {
        loop {
            thread::park();
        }
    }

    fn delay_us(us: u32) {
        let deadline = Instant::now() + Duration::from_micros(us as u64);
        while Instant::now() < deadline {
            core::hint::spin_loop();
        }
    }
}

/// Writes one byte to standard output.
pub fn console_putchar(c: u8) {
    let _ = std::io::stdout().write_all(&[c]);
}
