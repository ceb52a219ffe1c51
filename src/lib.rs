//! A cooperative multitasking core for single-core microcontrollers.
//!
//! Tasks share one processor and switch only when they call
//! [`yield_now`] (directly or through a delay). Task descriptors and stacks
//! come from a first-fit free-list heap carved out of a caller-supplied
//! arena.

#![no_std]

#[cfg(not(target_os = "none"))]
extern crate std;

use lazy_static::lazy_static;

pub use crate::{
    arch::{Arch, Platform},
    error::{KernelError, KernelResult},
    kernel::Kernel,
    mem::{HeapAddr, HeapStats},
    proc::{State, TaskEntry, TaskId, TaskInfo},
};

pub mod arch;
pub mod config;
pub mod console;
pub mod demo;
pub mod error;
mod kernel;
#[cfg(target_os = "none")]
mod lang_items;
pub mod logger;
pub mod mem;
pub mod proc;
pub mod sched;

lazy_static! {
    /// The kernel the free functions of this crate operate on.
    pub static ref KERNEL: Kernel<Platform> = Kernel::new(Platform::new(), task_exit);
}

/// Where a task lands when its entry routine returns.
extern "C" fn task_exit() -> ! {
    KERNEL.exit()
}

pub fn init(arena: &'static mut [u8]) -> KernelResult<()> {
    KERNEL.init(arena)
}

pub fn create_task(
    name: &str,
    entry: TaskEntry,
    arg: usize,
    stack_size: usize,
) -> KernelResult<TaskId> {
    KERNEL.create_task(name, entry, arg, stack_size)
}

/// Starts scheduling. Never returns.
pub fn start() -> ! {
    KERNEL.start()
}

pub fn yield_now() {
    KERNEL.yield_now()
}

pub fn exit() -> ! {
    KERNEL.exit()
}

pub fn current() -> Option<TaskId> {
    KERNEL.current()
}

pub fn heap_stats() -> HeapStats {
    KERNEL.heap_stats()
}

pub fn delay_ms(ms: u32) {
    KERNEL.delay_ms(ms)
}

pub fn delay_us(us: u32) {
    KERNEL.delay_us(us)
}
