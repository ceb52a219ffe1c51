//! Single-core RV32 microcontroller running in machine mode.

use core::arch::global_asm;

use super::Arch;
use crate::proc::FrameLayout;

global_asm!(include_str!("switch.S"));

extern "C" {
    fn __kernel_switch(save: *mut usize, resume: usize);
    fn __kernel_restore(resume: usize) -> !;

    // Mask ROM routines.
    fn ets_delay_us(us: u32);
    fn uart_tx_one_char(c: u8) -> i32;
}

/// `mstatus` of a new task: MPP = machine, MIE set.
const MSTATUS_INIT: usize = 0x1808;

pub struct Platform;

impl Platform {
    pub const fn new() -> Self {
        Platform
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
    const INITIAL_STATUS: usize = MSTATUS_INIT;

    unsafe fn switch(&self, save: *mut usize, resume: usize) {
        __kernel_switch(save, resume)
    }

    unsafe fn bootstrap(&self, resume: usize) -> ! {
        __kernel_restore(resume)
    }

    fn halt() -> ! {
        loop {
            #[allow(unused_unsafe)]
            unsafe {
                riscv::asm::wfi()
            }
        }
    }

    fn delay_us(us: u32) {
        unsafe { ets_delay_us(us) }
    }
}

/// Writes one byte to the ROM console UART.
pub fn console_putchar(c: u8) {
    unsafe {
        uart_tx_one_char(c);
    }
}
