use std::{
    thread,
    time::{Duration, Instant},
};

use log::LevelFilter;

pub fn init_logger() {
    let _ = env_logger::builder()
        .is_test(true)
        .filter_level(LevelFilter::Debug)
        .try_init();
}

#[allow(dead_code)]
/// A heap arena that lives for the rest of the test process.
pub fn leak_arena(size: usize) -> &'static mut [u8] {
    Box::leak(vec![0u8; size].into_boxed_slice())
}

/// Polls `cond` until it holds. Returns `false` on timeout.
#[allow(dead_code)]
pub fn wait_for(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        thread::sleep(Duration::from_millis(1));
    }
    cond()
}

/// Holds the processor forever. Tasks call this once a test has seen
/// enough, so the rotation stops where it is.
#[allow(dead_code)]
pub fn park_forever() -> ! {
    loop {
        thread::park();
    }
}
