//! Kernel configuration constants.
//!
//! This module contains compile-time configuration for the tasking
//! subsystem, plus the small runtime configuration passed to
//! [`crate::scheduler::init_with`].

/// Stack size per spawned task (64 KB).
pub const TASK_STACK_SIZE: usize = 64 * 1024;

/// Smallest stack size accepted by [`TaskingConfig`] (16 KB).
pub const MIN_TASK_STACK_SIZE: usize = 16 * 1024;

/// Alignment of the initial stack pointer (System V ABI).
pub const STACK_ALIGNMENT: usize = 16;

/// Name of the task adopted at tasking init.
pub const IDLE_TASK_NAME: &str = "kernel_idle";

/// Longest task name kept in a PCB, in characters.
pub const MAX_TASK_NAME_LEN: usize = 32;

/// Log level used by [`crate::logger::init_default`].
pub const DEFAULT_LOG_LEVEL: log::LevelFilter = if cfg!(feature = "trace-switches") {
    log::LevelFilter::Trace
} else {
    log::LevelFilter::Info
};

/// Runtime tasking configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskingConfig {
    /// Stack size for every task spawned after init.
    pub stack_size: usize,
    /// Name given to the adopted idle task.
    pub idle_name: &'static str,
}

impl TaskingConfig {
    /// Configuration built from the compile-time defaults.
    pub const fn new() -> Self {
        TaskingConfig {
            stack_size: TASK_STACK_SIZE,
            idle_name: IDLE_TASK_NAME,
        }
    }

    /// Override the per-task stack size.
    pub const fn with_stack_size(mut self, stack_size: usize) -> Self {
        self.stack_size = stack_size;
        self
    }
}

impl Default for TaskingConfig {
    fn default() -> Self {
        Self::new()
    }
}
