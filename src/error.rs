use core::fmt;

/// Failures reported by the kernel core.
///
/// Nothing in the core unwinds: every fallible operation hands one of these
/// back to its caller, which decides whether the failure is fatal.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum KernelError {
    /// The arena cannot satisfy the request, or the request is malformed.
    AllocationError,
    /// The task registry has no free slot left.
    CapacityExceeded,
    /// `release` was called on a block that is already free.
    DoubleFree,
    /// The scheduler found nothing runnable.
    NoReadyTask,
}

impl fmt::Display for KernelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            KernelError::AllocationError => "allocation failed",
            KernelError::CapacityExceeded => "maximum number of tasks reached",
            KernelError::DoubleFree => "double free detected",
            KernelError::NoReadyTask => "no ready task",
        };
        f.write_str(msg)
    }
}

pub type KernelResult<T> = Result<T, KernelError>;
