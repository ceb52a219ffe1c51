//! Compile-time tunables of the kernel.

use log::LevelFilter;

/// Maximum number of tasks the registry can hold.
pub const MAX_TASKS: usize = 8;

/// The default stack size of a task.
pub const TASK_STACK_SIZE: usize = 2048;

/// Storage for a task name, including room for a terminator, so at most
/// `TASK_NAME_LEN - 1` visible bytes are kept.
pub const TASK_NAME_LEN: usize = 16;

/// Every heap size and block address is a multiple of this.
pub const HEAP_ALIGN: usize = 4;

/// Alignment of the stack pointer handed to a new task.
pub const STACK_ALIGN: usize = 16;

/// Size of the arena reserved for the heap by the firmware image.
pub const DEFAULT_ARENA_SIZE: usize = 32 * 1024;

#[cfg(feature = "verbose")]
pub const LOG_LEVEL: LevelFilter = LevelFilter::Trace;

#[cfg(not(feature = "verbose"))]
pub const LOG_LEVEL: LevelFilter = LevelFilter::Info;
