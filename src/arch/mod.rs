//! Platform boundary.
//!
//! Everything processor-specific sits behind [`Arch`]: the layout of a saved
//! context, the switch, the restore-only bootstrap and the busy-wait clock.
//! The rest of the kernel only moves opaque resumption cursors around.

use crate::proc::FrameLayout;

#[cfg(all(target_arch = "riscv32", target_os = "none"))]
mod rv32;
#[cfg(all(target_arch = "riscv32", target_os = "none"))]
pub use self::rv32::{console_putchar, Platform};

#[cfg(not(target_os = "none"))]
mod hosted;
#[cfg(not(target_os = "none"))]
pub use self::hosted::{console_putchar, Platform};

#[cfg(all(target_os = "none", not(target_arch = "riscv32")))]
compile_error!("unsupported bare-metal target: only riscv32 is implemented");

pub trait Arch: Sync {
    /// Shape of the frame `switch` saves and restores.
    const LAYOUT: FrameLayout;

    /// Status word a new task starts with.
    const INITIAL_STATUS: usize;

    /// Saves the caller's context, stores its cursor through `save` and
    /// resumes the context at `resume`. Returns when some later switch
    /// resumes the saved cursor.
    ///
    /// # Safety
    ///
    /// `save` must stay valid until the switch has stored through it, and
    /// `resume` must be a cursor produced by `switch` or by the initial
    /// frame builder, whose stack is still alive.
    unsafe fn switch(&self, save: *mut usize, resume: usize);

    /// Resumes the context at `resume` without saving anything.
    ///
    /// # Safety
    ///
    /// Same requirements on `resume` as [`Arch::switch`].
    unsafe fn bootstrap(&self, resume: usize) -> !;

    /// Stops the processor for good.
    fn halt() -> !;

    /// Busy-waits for roughly `us` microseconds.
    fn delay_us(us: u32);
}
