mod common;

use std::{
    sync::Mutex,
    thread,
    time::{Duration, Instant},
};

use coop_kernel::{Kernel, Platform, State, TaskEntry, TaskId};
use lazy_static::lazy_static;

/// A started kernel and the tags its tasks recorded, in order.
struct Bench {
    kernel: Kernel<Platform>,
    log:    Mutex<Vec<usize>>,
    limit:  usize,
}

impl Bench {
    fn new(limit: usize) -> &'static Bench {
        common::init_logger();
        let kernel = Kernel::new(Platform::new(), exit_task);
        kernel.init(common::leak_arena(32 * 1024)).unwrap();
        Box::leak(Box::new(Bench {
            kernel,
            log: Mutex::new(Vec::new()),
            limit,
        }))
    }

    fn from_arg(arg: usize) -> &'static Bench {
        unsafe { &*(arg as *const Bench) }
    }

    fn spawn(&'static self, entry: TaskEntry) -> TaskId {
        self.kernel
            .create_task("bench", entry, self as *const Bench as usize, 2048)
            .unwrap()
    }

    /// Appends `tag`. The caller holds the processor for good once the log
    /// is full, which freezes the rotation.
    fn mark(&self, tag: usize) {
        {
            let mut log = self.log.lock().unwrap();
            if log.len() < self.limit {
                log.push(tag);
                return;
            }
        }
        common::park_forever()
    }

    fn boot(&'static self) {
        thread::spawn(move || {
            self.kernel.start();
        });
    }

    fn wait_full(&self) -> Vec<usize> {
        let full = common::wait_for(Duration::from_secs(10), || {
            self.log.lock().unwrap().len() >= self.limit
        });
        assert!(full, "tasks stopped early: {:?}", self.log.lock().unwrap());
        self.log.lock().unwrap().clone()
    }

    fn wait_current(&self, id: TaskId) {
        let reached = common::wait_for(Duration::from_secs(10), || {
            self.kernel.current() == Some(id)
        });
        assert!(reached, "task {} never took over", id);
    }
}

extern "C" fn exit_task() -> ! {
    common::park_forever()
}

/// Records, yields, and records again each round.
extern "C" fn looper(arg: usize) {
    let bench = Bench::from_arg(arg);
    let tag = bench.kernel.current().map_or(usize::MAX, |id| id.0);
    loop {
        bench.mark(tag);
        bench.kernel.yield_now();
    }
}

/// Blocks itself on the first run and records 10 when woken up.
extern "C" fn sleeper(arg: usize) {
    let bench = Bench::from_arg(arg);
    bench.mark(0);
    if let Some(me) = bench.kernel.current() {
        bench.kernel.block(me);
    }
    bench.mark(10);
    loop {
        bench.kernel.yield_now();
        bench.mark(0);
    }
}

/// Wakes task 0 on its third run.
extern "C" fn waker(arg: usize) {
    let bench = Bench::from_arg(arg);
    let mut runs = 0;
    loop {
        bench.mark(1);
        runs += 1;
        if runs == 3 {
            assert!(bench.kernel.unblock(TaskId(0)));
        }
        bench.kernel.yield_now();
    }
}

#[test]
fn test_blocked_caller_skipped_until_unblocked() {
    let bench = Bench::new(13);
    bench.spawn(sleeper);
    bench.spawn(waker);
    bench.spawn(looper);
    bench.boot();

    assert_eq!(
        bench.wait_full(),
        vec![0, 1, 2, 1, 2, 1, 2, 10, 1, 2, 0, 1, 2]
    );

    // The next one to record is task 0, which stops there.
    bench.wait_current(TaskId(0));
    assert_eq!(bench.kernel.switch_count(), 13);
    assert_eq!(bench.kernel.task_info(TaskId(0)).unwrap().state, State::Running);
}

/// The only task blocks itself, keeps running for lack of anyone else, then
/// unblocks itself and yields.
extern "C" fn lone_blocker(arg: usize) {
    let bench = Bench::from_arg(arg);
    let me = TaskId(0);
    bench.mark(0);
    bench.kernel.block(me);
    bench.mark(1);
    bench.kernel.unblock(me);
    bench.kernel.yield_now();
    bench.mark(2);
    common::park_forever()
}

#[test]
fn test_lone_blocked_caller_keeps_running() {
    let bench = Bench::new(3);
    bench.spawn(lone_blocker);
    bench.boot();

    assert_eq!(bench.wait_full(), vec![0, 1, 2]);
    assert_eq!(bench.kernel.switch_count(), 0);
    assert_eq!(bench.kernel.current(), Some(TaskId(0)));
    assert_eq!(bench.kernel.task_info(TaskId(0)).unwrap().state, State::Running);
}

/// Records 100 after every 3 ms delay.
extern "C" fn delayer(arg: usize) {
    let bench = Bench::from_arg(arg);
    loop {
        bench.kernel.delay_ms(3);
        bench.mark(100);
    }
}

#[test]
fn test_delay_yields_every_millisecond() {
    let bench = Bench::new(8);
    bench.spawn(delayer);
    bench.spawn(looper);
    let started = Instant::now();
    bench.boot();

    assert_eq!(bench.wait_full(), vec![1, 1, 1, 100, 1, 1, 1, 100]);
    assert!(started.elapsed() >= Duration::from_millis(6));

    // Task 1 is the next to record and stops there.
    bench.wait_current(TaskId(1));
    assert_eq!(bench.kernel.switch_count(), 13);
}

lazy_static! {
    static ref SOLO: Kernel<Platform> = Kernel::new(Platform::new(), solo_exit);
}

static SOLO_RUNS: Mutex<usize> = Mutex::new(0);

extern "C" fn solo_exit() -> ! {
    SOLO.exit()
}

extern "C" fn solo_task(_arg: usize) {
    *SOLO_RUNS.lock().unwrap() += 1;
    SOLO.yield_now();
    *SOLO_RUNS.lock().unwrap() += 1;
}

#[test]
fn test_last_task_exit_halts() {
    common::init_logger();
    SOLO.init(common::leak_arena(8 * 1024)).unwrap();
    SOLO.create_task("solo", solo_task, 0, 2048).unwrap();
    thread::spawn(|| {
        SOLO.start();
    });

    let terminated = common::wait_for(Duration::from_secs(10), || {
        SOLO.task_info(TaskId(0)).map(|info| info.state) == Some(State::Terminated)
    });
    assert!(terminated);
    assert_eq!(*SOLO_RUNS.lock().unwrap(), 2);

    // Nothing was left to switch to, so the processor halted on the exited
    // task instead of resuming it.
    thread::sleep(Duration::from_millis(20));
    assert_eq!(*SOLO_RUNS.lock().unwrap(), 2);
    assert_eq!(SOLO.current(), Some(TaskId(0)));
    assert_eq!(SOLO.switch_count(), 0);
}
