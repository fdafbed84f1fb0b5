//! Process control block definition.
//!
//! This module defines the PCB and its associated types: identifiers,
//! lifecycle states and the privately owned task stack.

use alloc::boxed::Box;
use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;

use super::context::SavedContext;
use crate::config::{MAX_TASK_NAME_LEN, STACK_ALIGNMENT};
use crate::error::TaskingError;
use crate::process::signal::SignalHandler;

/// Entry point of a spawned task.
///
/// Returning from the entry point terminates the task.
pub type TaskEntry = fn();

/// Unique process identifier.
///
/// Identifiers are handed out in strictly increasing order and are never
/// reused for the lifetime of the kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Pid(pub u32);

impl Pid {
    /// The idle task is always the first process created.
    pub const IDLE: Pid = Pid(1);

    /// Get the raw identifier value.
    pub fn as_u32(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for Pid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// Lifecycle state of a process.
///
/// The only transitions are `Alive -> Zombie` and `Zombie -> Dead`, each
/// taken exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    /// Eligible for scheduling.
    Alive,
    /// Terminated, but its stack and PCB have not been reclaimed yet.
    Zombie,
    /// Reaped. Only ever observed through a pid lookup.
    Dead,
}

impl fmt::Display for ProcessState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ProcessState::Alive => "alive",
            ProcessState::Zombie => "zombie",
            ProcessState::Dead => "dead",
        };
        f.pad(label)
    }
}

/// Heap-allocated stack owned by exactly one process.
///
/// The memory is released when the owning PCB is dropped at reap time.
pub struct TaskStack {
    memory: Box<[u8]>,
}

impl TaskStack {
    /// Allocate and zero a stack of `size` bytes.
    pub fn allocate(size: usize) -> Result<Self, TaskingError> {
        let mut memory = Vec::new();
        memory
            .try_reserve_exact(size)
            .map_err(|_| TaskingError::OutOfMemory { requested: size })?;
        memory.resize(size, 0u8);
        Ok(TaskStack {
            memory: memory.into_boxed_slice(),
        })
    }

    /// Lowest address of the stack memory.
    pub fn bottom(&self) -> usize {
        self.memory.as_ptr() as usize
    }

    /// Size of the stack in bytes.
    pub fn len(&self) -> usize {
        self.memory.len()
    }

    /// Initial stack pointer: the end of the allocation, aligned down.
    pub fn top(&self) -> usize {
        (self.bottom() + self.len()) & !(STACK_ALIGNMENT - 1)
    }

    /// Whether `addr` lies inside this stack.
    pub fn contains(&self, addr: usize) -> bool {
        addr >= self.bottom() && addr < self.bottom() + self.len()
    }
}

/// Per-process counters.
#[derive(Debug, Default, Clone, Copy)]
pub struct TaskStats {
    /// Number of times the scheduler switched into this process.
    pub switches_in: u64,
}

/// Process control block.
pub struct Process {
    pid: Pid,
    name: String,
    state: ProcessState,
    /// Boxed so its address survives growth of the process table while a
    /// switch is in flight.
    context: Box<SavedContext>,
    /// `None` for the adopted boot context, whose stack is not ours.
    stack: Option<TaskStack>,
    /// Taken by the entry trampoline on first resume.
    entry: Option<TaskEntry>,
    notify: Option<SignalHandler>,
    stats: TaskStats,
}

impl Process {
    /// Create a fresh process that starts at `entry` on `stack`.
    pub fn new(pid: Pid, name: &str, entry: TaskEntry, stack: TaskStack) -> Self {
        let context = Box::new(SavedContext::new_task(&stack));
        Process {
            pid,
            name: truncate_name(name),
            state: ProcessState::Alive,
            context,
            stack: Some(stack),
            entry: Some(entry),
            notify: None,
            stats: TaskStats::default(),
        }
    }

    /// Wrap the currently executing boot context in a PCB.
    ///
    /// Its saved context is filled in by the first switch away from it.
    pub fn adopt_current(pid: Pid, name: &str) -> Self {
        Process {
            pid,
            name: truncate_name(name),
            state: ProcessState::Alive,
            context: Box::new(SavedContext::empty()),
            stack: None,
            entry: None,
            notify: None,
            stats: TaskStats {
                switches_in: 1,
            },
        }
    }

    /// Get the process ID.
    pub fn pid(&self) -> Pid {
        self.pid
    }

    /// Get the process name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the lifecycle state.
    pub fn state(&self) -> ProcessState {
        self.state
    }

    /// Check if the scheduler may resume this process.
    pub fn is_runnable(&self) -> bool {
        self.state == ProcessState::Alive
    }

    /// `Alive -> Zombie`. Returns `false` if the process was already a
    /// zombie, in which case nothing changes.
    pub fn mark_zombie(&mut self) -> bool {
        match self.state {
            ProcessState::Alive => {
                self.state = ProcessState::Zombie;
                true
            }
            ProcessState::Zombie => false,
            ProcessState::Dead => panic!("process {} is already dead", self.pid),
        }
    }

    /// `Zombie -> Dead`, done once by the reaper right before the PCB is
    /// dropped.
    pub fn mark_dead(&mut self) {
        assert_eq!(
            self.state,
            ProcessState::Zombie,
            "process {} reaped while not a zombie",
            self.pid
        );
        self.state = ProcessState::Dead;
    }

    /// Raw pointer the switch routine saves the outgoing context into.
    pub fn context_ptr_mut(&mut self) -> *mut SavedContext {
        &mut *self.context as *mut SavedContext
    }

    /// Raw pointer the switch routine resumes from.
    pub fn context_ptr(&self) -> *const SavedContext {
        &*self.context as *const SavedContext
    }

    /// Take the entry point. Only the first call returns `Some`.
    pub fn take_entry(&mut self) -> Option<TaskEntry> {
        self.entry.take()
    }

    /// Whether the task has not been started yet.
    pub fn has_pending_entry(&self) -> bool {
        self.entry.is_some()
    }

    /// Get the registered signal handler.
    pub fn notify(&self) -> Option<&SignalHandler> {
        self.notify.as_ref()
    }

    /// Replace the signal handler, returning the previous one.
    pub fn set_notify(&mut self, handler: Option<SignalHandler>) -> Option<SignalHandler> {
        core::mem::replace(&mut self.notify, handler)
    }

    /// Get the process statistics.
    pub fn stats(&self) -> &TaskStats {
        &self.stats
    }

    /// Get a mutable reference to the process statistics.
    pub fn stats_mut(&mut self) -> &mut TaskStats {
        &mut self.stats
    }
}

impl fmt::Debug for Process {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Process")
            .field("pid", &self.pid)
            .field("name", &self.name)
            .field("state", &self.state)
            .field("context", &self.context)
            .field("has_stack", &self.stack.is_some())
            .field("has_handler", &self.notify.is_some())
            .finish()
    }
}

fn truncate_name(name: &str) -> String {
    match name.char_indices().nth(MAX_TASK_NAME_LEN) {
        Some((cut, _)) => String::from(&name[..cut]),
        None => String::from(name),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop() {}

    #[test]
    fn test_stack_top_is_aligned_and_inside() {
        let stack = TaskStack::allocate(8 * 1024 + 3).unwrap();
        assert_eq!(stack.top() % STACK_ALIGNMENT, 0);
        assert!(stack.contains(stack.top() - 1));
        assert!(!stack.contains(stack.bottom() + stack.len()));
    }

    #[test]
    fn test_absurd_stack_allocation_fails() {
        let err = TaskStack::allocate(usize::MAX).err();
        assert_eq!(
            err,
            Some(TaskingError::OutOfMemory {
                requested: usize::MAX
            })
        );
    }

    #[test]
    fn test_state_transitions_are_monotone() {
        let stack = TaskStack::allocate(4096).unwrap();
        let mut process = Process::new(Pid(7), "worker", noop, stack);

        assert_eq!(process.state(), ProcessState::Alive);
        assert!(process.mark_zombie());
        assert!(!process.mark_zombie());
        assert_eq!(process.state(), ProcessState::Zombie);
        process.mark_dead();
        assert_eq!(process.state(), ProcessState::Dead);
    }

    #[test]
    #[should_panic(expected = "reaped while not a zombie")]
    fn test_alive_process_cannot_be_reaped() {
        let mut process = Process::adopt_current(Pid::IDLE, "idle");
        process.mark_dead();
    }

    #[test]
    fn test_entry_is_taken_once() {
        let stack = TaskStack::allocate(4096).unwrap();
        let mut process = Process::new(Pid(2), "once", noop, stack);

        assert!(process.has_pending_entry());
        assert!(process.take_entry().is_some());
        assert!(process.take_entry().is_none());
    }

    #[test]
    fn test_long_names_are_truncated() {
        let long = "x".repeat(MAX_TASK_NAME_LEN + 10);
        let process = Process::adopt_current(Pid(3), &long);
        assert_eq!(process.name().len(), MAX_TASK_NAME_LEN);
    }
}
