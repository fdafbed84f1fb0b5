//! Tasking error types
//!
//! Every variant is fatal at the public API: the lifecycle and scheduler
//! entry points hand errors to [`fatal`], which logs and panics. The
//! `Result`s exist so the internal state machine can be exercised and
//! tested without bringing the kernel down.

use core::fmt;

use crate::scheduler::Pid;

/// Tasking error type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskingError {
    /// Allocation of a stack or PCB failed
    OutOfMemory {
        /// Bytes that could not be obtained
        requested: usize,
    },
    /// Tasking has not been initialized yet
    NotInitialized,
    /// `init` was called twice
    AlreadyInitialized,
    /// The pid was never issued
    NoSuchProcess(Pid),
    /// The pid was issued but its process has been reaped
    ProcessReaped(Pid),
    /// Attempt to terminate the idle task
    IdleTermination,
    /// The run queue has no entries at all
    EmptyRunQueue,
    /// The run queue has no `Alive` entry to resume
    NoRunnableTask,
    /// A terminated task was resumed
    ZombieResumed(Pid),
    /// Configured task stack is below the minimum
    StackTooSmall {
        /// Requested stack size in bytes
        requested: usize,
        /// Smallest accepted size in bytes
        minimum: usize,
    },
    /// Every process identifier has been handed out
    PidSpaceExhausted,
}

impl fmt::Display for TaskingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskingError::OutOfMemory { requested } => {
                write!(f, "out of memory allocating {} bytes", requested)
            }
            TaskingError::NotInitialized => write!(f, "tasking is not initialized"),
            TaskingError::AlreadyInitialized => write!(f, "tasking is already initialized"),
            TaskingError::NoSuchProcess(pid) => write!(f, "no such process: {}", pid),
            TaskingError::ProcessReaped(pid) => write!(f, "process {} has been reaped", pid),
            TaskingError::IdleTermination => write!(f, "the idle task cannot terminate"),
            TaskingError::EmptyRunQueue => write!(f, "run queue is empty"),
            TaskingError::NoRunnableTask => write!(f, "no runnable task in run queue"),
            TaskingError::ZombieResumed(pid) => {
                write!(f, "terminated process {} was resumed", pid)
            }
            TaskingError::StackTooSmall { requested, minimum } => write!(
                f,
                "task stack of {} bytes is below the minimum of {} bytes",
                requested, minimum
            ),
            TaskingError::PidSpaceExhausted => {
                write!(f, "process identifier space exhausted")
            }
        }
    }
}

/// Tasking result type
pub type Result<T> = core::result::Result<T, TaskingError>;

/// Report an unrecoverable tasking error and stop the kernel.
#[cold]
#[track_caller]
pub fn fatal(err: TaskingError) -> ! {
    log::error!("[TASK] fatal: {}", err);
    panic!("tasking: {}", err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::ToString;

    #[test]
    fn test_display_names_the_pid() {
        assert_eq!(
            TaskingError::ProcessReaped(Pid(9)).to_string(),
            "process 9 has been reaped"
        );
        assert_eq!(
            TaskingError::OutOfMemory { requested: 64 }.to_string(),
            "out of memory allocating 64 bytes"
        );
    }

    #[test]
    fn test_display_stack_too_small() {
        assert_eq!(
            TaskingError::StackTooSmall { requested: 0, minimum: 8192 }.to_string(),
            "task stack of 0 bytes is below the minimum of 8192 bytes"
        );
    }

    #[test]
    #[should_panic(expected = "tasking: the idle task cannot terminate")]
    fn test_fatal_panics_with_message() {
        fatal(TaskingError::IdleTermination);
    }
}
