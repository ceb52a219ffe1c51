//! Boot sequence and the workloads the firmware ships with.

use log::{error, info};

use crate::{
    arch::{Arch, Platform},
    config::{LOG_LEVEL, TASK_STACK_SIZE},
    logger, println,
};

/// The compute task starts over once a term passes this value.
const FIB_LIMIT: u32 = 1_000_000;

/// Delay between two status reports.
const STATUS_PERIOD_MS: u32 = 2000;

/// Runs whenever nothing else wants the processor.
pub extern "C" fn idle_task(_arg: usize) {
    loop {
        crate::yield_now();
    }
}

/// Walks the Fibonacci sequence, one term per turn.
pub extern "C" fn compute_task(_arg: usize) {
    println!("[compute] task started");

    let (mut prev, mut cur) = (0u32, 1u32);
    let mut terms = 0u32;
    loop {
        let next = prev + cur;
        prev = cur;
        cur = next;
        if cur > FIB_LIMIT {
            prev = 0;
            cur = 1;
            println!("[compute] sequence reset");
        }

        terms = terms.wrapping_add(1);
        if terms % 10 == 0 {
            println!("[compute] fibonacci: {}", cur);
        }
        crate::yield_now();
    }
}

/// Reports that the system is alive every couple of seconds.
pub extern "C" fn status_task(_arg: usize) {
    println!("[status] task started");

    let mut reports = 0u32;
    loop {
        reports = reports.wrapping_add(1);
        println!("[status] update #{}: system running", reports);

        crate::delay_ms(STATUS_PERIOD_MS);

        if reports % 5 == 0 {
            let stats = crate::heap_stats();
            println!(
                "[status] heap: {} bytes used, {} bytes free",
                stats.used_bytes, stats.free_bytes
            );
        }
    }
}

/// Creates the demo workloads. A workload that cannot be created is
/// reported and skipped.
pub fn create_demo_tasks() {
    if let Err(err) = crate::create_task("compute", compute_task, 0, TASK_STACK_SIZE) {
        error!("demo: failed to create compute task: {}", err);
    }
    if let Err(err) = crate::create_task("status", status_task, 0, TASK_STACK_SIZE) {
        error!("demo: failed to create status task: {}", err);
    }
}

/// Brings the system up on `arena` and hands the processor to the tasks.
pub fn kernel_main(arena: &'static mut [u8]) -> ! {
    // Ignored when a logger is already installed.
    let _ = logger::init(LOG_LEVEL);
    info!("kernel: booting");

    if let Err(err) = crate::init(arena) {
        error!("kernel: heap initialization failed: {}", err);
        Platform::halt();
    }

    let stats = crate::heap_stats();
    info!(
        "kernel: heap {} bytes total, {} used, {} free",
        stats.total_bytes, stats.used_bytes, stats.free_bytes
    );

    if let Err(err) = crate::create_task("idle", idle_task, 0, TASK_STACK_SIZE) {
        error!("kernel: failed to create idle task: {}", err);
        Platform::halt();
    }
    create_demo_tasks();

    let stats = crate::heap_stats();
    info!(
        "kernel: heap after task creation {} used, {} free",
        stats.used_bytes, stats.free_bytes
    );

    crate::start()
}

#[cfg(target_os = "none")]
mod entry {
    use core::ptr::addr_of_mut;

    use crate::config::DEFAULT_ARENA_SIZE;

    static mut HEAP_SPACE: [u8; DEFAULT_ARENA_SIZE] = [0; DEFAULT_ARENA_SIZE];

    /// Called by the startup code once the C runtime is set up.
    #[no_mangle]
    pub extern "C" fn kernel_entry() -> ! {
        // Only reached once, so the arena is never aliased.
        let arena = unsafe { &mut *addr_of_mut!(HEAP_SPACE) };
        super::kernel_main(arena)
    }
}
