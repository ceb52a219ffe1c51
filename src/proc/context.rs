//! Saved execution context of a task.
//!
//! A context is a frame of machine words at the top of the task's private
//! stack. Its shape is owned by the platform; this module only knows where
//! the few registers it has to seed for a fresh task live.

use core::mem::size_of;

use crate::{align_down, config::STACK_ALIGN};

/// Size of one saved register.
pub const WORD: usize = size_of::<usize>();

/// Word indices of the registers a new task needs seeded.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct FrameLayout {
    /// Number of words in a frame.
    pub words:  usize,
    /// Return address.
    pub ra:     usize,
    /// Resumption program counter.
    pub pc:     usize,
    /// Processor status word.
    pub status: usize,
    /// First argument register.
    pub arg:    usize,
}

impl FrameLayout {
    pub const fn size(&self) -> usize {
        self.words * WORD
    }
}

/// What goes into the frame of a task that has never run.
#[derive(Clone, Copy, Debug)]
pub struct ContextTemplate {
    pub layout: FrameLayout,
    pub status: usize,
    /// Address of the task-exit routine.
    pub exit:   usize,
}

/// Writes the initial frame at the top of `stack`, whose first byte lives at
/// machine address `stack_addr`.
///
/// Every register not named by the layout starts out zero. Returns the
/// machine address of the frame, or `None` if the stack cannot hold it.
pub fn init_frame(
    stack: &mut [u8],
    stack_addr: usize,
    template: &ContextTemplate,
    entry: usize,
    arg: usize,
) -> Option<usize> {
    let layout = &template.layout;
    let top = align_down!(stack_addr.checked_add(stack.len())?, STACK_ALIGN);
    let frame_addr = top.checked_sub(layout.size())?;
    if frame_addr < stack_addr {
        return None;
    }

    let offset = frame_addr - stack_addr;
    let frame = &mut stack[offset..offset + layout.size()];
    frame.fill(0);

    let mut put = |index: usize, value: usize| {
        frame[index * WORD..(index + 1) * WORD].copy_from_slice(&value.to_ne_bytes());
    };
    put(layout.ra, template.exit);
    put(layout.pc, entry);
    put(layout.status, template.status);
    put(layout.arg, arg);

    Some(frame_addr)
}

/// Reads word `index` of the frame at machine address `frame`.
///
/// # Safety
///
/// `frame` must point at a live frame of at least `index + 1` words.
pub unsafe fn read_word(frame: usize, index: usize) -> usize {
    (frame as *const usize).add(index).read_unaligned()
}
