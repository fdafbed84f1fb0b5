//! Kernel scheduler module.
//!
//! This module implements cooperative and preemptive task switching over
//! a single run queue ring.
//!
//! There are two entry points with identical switching semantics:
//!
//! - [`preempt`] is called by the timer interrupt epilogue, with
//!   interrupts already disabled. The interrupt return path re-enables
//!   them for whichever task it lands in.
//! - [`yield_now`] is called by task code that wants to give up the CPU,
//!   typically from a polling loop. It disables interrupts around the
//!   switch itself and restores the caller's interrupt state afterwards.
//!
//! All scheduler state lives in one [`Scheduler`] instance behind a spin
//! lock, created by [`init`] and never torn down. The lock is always
//! released before the register-level switch.

pub mod context;
pub mod round_robin;
pub mod task;

use alloc::string::String;
use alloc::vec::Vec;
use core::sync::atomic::{AtomicBool, Ordering};
use spin::Mutex;

use crate::config::{TaskingConfig, MIN_TASK_STACK_SIZE};
use crate::error::{fatal, Result, TaskingError};
use crate::interrupts;
use crate::process::signal::SignalHandler;
use crate::process::table::ProcessTable;

pub use context::SavedContext;
pub use task::{Pid, Process, ProcessState, TaskEntry, TaskStack, TaskStats};

/// Global scheduler instance.
static SCHEDULER: Mutex<Option<Scheduler>> = Mutex::new(None);

/// Set once the idle task exists. Readable from interrupt context
/// without touching the lock.
static TASKING_ACTIVE: AtomicBool = AtomicBool::new(false);

/// Snapshot of one process, for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskInfo {
    /// Process ID.
    pub pid: Pid,
    /// Process name.
    pub name: String,
    /// Lifecycle state.
    pub state: ProcessState,
    /// Whether this is the task that took the snapshot.
    pub is_current: bool,
    /// Whether a signal handler is registered.
    pub has_handler: bool,
    /// Times the scheduler switched into this task.
    pub switches_in: u64,
}

/// What a signal sent to a process turned into.
pub(crate) enum Disposition {
    /// The target has a handler; run it outside the lock.
    Handler(SignalHandler),
    /// No handler: the target is now a zombie.
    Terminated,
}

/// Register pointers for one switch, extracted under the lock.
struct PreparedSwitch {
    contexts: Option<(*mut SavedContext, *const SavedContext)>,
    reaped: Option<Process>,
}

/// The scheduler implementation.
pub struct Scheduler {
    /// All processes not yet reaped, threaded into the run queue ring.
    table: ProcessTable,
    /// Slot of the running task.
    current: usize,
    /// Slot of the idle task, which never terminates.
    idle: usize,
    /// Stack size for new tasks.
    stack_size: usize,
    /// Total context switches performed.
    context_switches: u64,
}

impl Scheduler {
    /// Create a scheduler whose idle task is the calling context.
    pub fn new(config: TaskingConfig) -> Result<Self> {
        if config.stack_size < MIN_TASK_STACK_SIZE {
            return Err(TaskingError::StackTooSmall {
                requested: config.stack_size,
                minimum: MIN_TASK_STACK_SIZE,
            });
        }

        let mut table = ProcessTable::new();
        let pid = table.allocate_pid();
        let idle = table.insert(Process::adopt_current(pid, config.idle_name), None)?;

        Ok(Scheduler {
            table,
            current: idle,
            idle,
            stack_size: config.stack_size,
            context_switches: 0,
        })
    }

    /// Create a task that starts at `entry` on its next turn.
    ///
    /// The task is linked just behind the current one, so it runs after
    /// every task already in the ring has had its turn.
    pub fn spawn(&mut self, name: &str, entry: TaskEntry) -> Result<Pid> {
        let stack = TaskStack::allocate(self.stack_size)?;
        let pid = self.table.allocate_pid();
        self.table
            .insert(Process::new(pid, name, entry, stack), Some(self.current))?;
        log::debug!("[SCHED] spawned pid {} ({})", pid, name);
        Ok(pid)
    }

    /// Turn `pid` into a zombie. It is reaped once the scheduler has
    /// switched away from it and walks past it again.
    ///
    /// Terminating a zombie again is a no-op.
    pub fn terminate(&mut self, pid: Pid) -> Result<()> {
        let index = self.table.resolve(pid)?;
        if index == self.idle {
            return Err(TaskingError::IdleTermination);
        }
        if self.table.process_mut(index).mark_zombie() {
            log::debug!("[SCHED] pid {} marked zombie", pid);
        }
        Ok(())
    }

    /// Turn the running task into a zombie.
    pub fn terminate_current(&mut self) -> Result<()> {
        let pid = self.current_pid();
        self.terminate(pid)
    }

    /// Reap every zombie except the running task in one pass.
    pub fn reap_zombies(&mut self) -> Vec<Process> {
        let zombies: Vec<usize> = self
            .table
            .ring_from(self.idle)
            .filter(|&(index, p)| index != self.current && p.state() == ProcessState::Zombie)
            .map(|(index, _)| index)
            .collect();

        zombies
            .into_iter()
            .map(|index| round_robin::reap(&mut self.table, index))
            .collect()
    }

    /// Pick the next task and extract the context pointers for the switch.
    fn prepare_switch(&mut self) -> Result<PreparedSwitch> {
        let round_robin::Pick { next, reaped } = round_robin::pick_next(&mut self.table, self.current)?;
        let prev = self.current;

        if next == prev {
            return Ok(PreparedSwitch {
                contexts: None,
                reaped,
            });
        }

        self.current = next;
        self.context_switches += 1;
        self.table.process_mut(next).stats_mut().switches_in += 1;

        if cfg!(feature = "trace-switches") {
            log::debug!(
                "[SCHED] switch {} -> {}",
                self.table.process(prev).pid(),
                self.table.process(next).pid()
            );
        } else {
            log::trace!(
                "[SCHED] switch {} -> {}",
                self.table.process(prev).pid(),
                self.table.process(next).pid()
            );
        }

        let save = self.table.process_mut(prev).context_ptr_mut();
        let load = self.table.process(next).context_ptr();
        Ok(PreparedSwitch {
            contexts: Some((save, load)),
            reaped,
        })
    }

    /// Decide what a signal to `pid` does.
    pub(crate) fn signal_disposition(&mut self, pid: Pid) -> Result<Disposition> {
        let index = self.table.resolve(pid)?;
        if let Some(handler) = self.table.process(index).notify() {
            return Ok(Disposition::Handler(handler.clone()));
        }
        self.terminate(pid)?;
        Ok(Disposition::Terminated)
    }

    /// Install or remove the signal handler of `pid`.
    pub fn set_notify(&mut self, pid: Pid, handler: Option<SignalHandler>) -> Result<Option<SignalHandler>> {
        let index = self.table.resolve(pid)?;
        Ok(self.table.process_mut(index).set_notify(handler))
    }

    /// Get the process registry.
    pub fn table(&self) -> &ProcessTable {
        &self.table
    }

    /// The running task.
    pub fn current(&self) -> &Process {
        self.table.process(self.current)
    }

    /// Pid of the running task.
    pub fn current_pid(&self) -> Pid {
        self.current().pid()
    }

    /// Pid of the idle task.
    pub fn idle_pid(&self) -> Pid {
        self.table.process(self.idle).pid()
    }

    /// Total context switches performed.
    pub fn context_switches(&self) -> u64 {
        self.context_switches
    }

    /// Describe every task, in ring order starting at the idle task.
    pub fn snapshot(&self) -> Vec<TaskInfo> {
        self.table
            .ring_from(self.idle)
            .map(|(index, p)| TaskInfo {
                pid: p.pid(),
                name: String::from(p.name()),
                state: p.state(),
                is_current: index == self.current,
                has_handler: p.notify().is_some(),
                switches_in: p.stats().switches_in,
            })
            .collect()
    }
}

/// Initialize tasking with the default configuration.
///
/// The calling context becomes the idle task. It must never terminate;
/// once it has nothing else to do it should sit in
/// [`crate::process::idle_loop`].
pub fn init() {
    init_with(TaskingConfig::default());
}

/// Initialize tasking with an explicit configuration.
pub fn init_with(config: TaskingConfig) {
    interrupts::without_interrupts(|| {
        let mut guard = SCHEDULER.lock();
        if guard.is_some() {
            fatal(TaskingError::AlreadyInitialized);
        }
        let scheduler = Scheduler::new(config).unwrap_or_else(|err| fatal(err));
        log::info!(
            "[SCHED] tasking initialized, idle task is pid {} ({})",
            scheduler.idle_pid(),
            config.idle_name
        );
        *guard = Some(scheduler);
        TASKING_ACTIVE.store(true, Ordering::Release);
    });
}

/// Returns `true` once the idle task exists and scheduling may happen.
pub fn tasking_active() -> bool {
    TASKING_ACTIVE.load(Ordering::Acquire)
}

/// Run `f` on the scheduler with interrupts disabled.
pub fn with_scheduler<R>(f: impl FnOnce(&mut Scheduler) -> R) -> Result<R> {
    interrupts::without_interrupts(|| match SCHEDULER.lock().as_mut() {
        Some(scheduler) => Ok(f(scheduler)),
        None => Err(TaskingError::NotInitialized),
    })
}

/// Preemptive entry, called once per timer tick.
///
/// Must be called with interrupts disabled. If the scheduler lock is held
/// by the interrupted code, the tick is skipped.
pub fn preempt() {
    debug_assert!(
        !interrupts::are_enabled(),
        "preemptive switch with interrupts enabled"
    );
    if let Some(guard) = SCHEDULER.try_lock() {
        switch_locked(guard);
    }
}

/// Cooperative entry: give the CPU to the next runnable task.
///
/// Returns once this task is scheduled again, with the interrupt flag as
/// it was on entry. Does nothing before tasking is initialized.
pub fn yield_now() {
    let were_enabled = interrupts::are_enabled();
    interrupts::disable();
    switch_locked(SCHEDULER.lock());
    if were_enabled {
        interrupts::enable();
    }
}

/// Switch away from a task that has just become a zombie.
///
/// Interrupts must already be disabled.
pub(crate) fn switch_away_for_good() -> ! {
    switch_locked(SCHEDULER.lock());
    let pid = current_pid().unwrap_or(Pid(0));
    fatal(TaskingError::ZombieResumed(pid))
}

fn switch_locked(mut guard: spin::MutexGuard<'_, Option<Scheduler>>) {
    let prepared = match guard.as_mut() {
        Some(scheduler) => scheduler.prepare_switch().unwrap_or_else(|err| fatal(err)),
        None => return,
    };
    drop(guard);
    drop(prepared.reaped);

    if let Some((save, load)) = prepared.contexts {
        // SAFETY:
        // - `save` is the context of the task running this code and `load`
        //   belongs to an `Alive` task, so its stack is allocated.
        // - Both contexts are boxed inside linked PCBs. Neither can be
        //   reaped before this switch completes: interrupts are disabled
        //   and reaping never touches the running task.
        // - The scheduler lock was released above.
        unsafe { context::switch_context(save, load) };
    }
}

/// Body of every spawned task, entered from the context trampoline.
pub(crate) fn run_current_entry() -> ! {
    let entry = with_scheduler(|s| {
        let current = s.current;
        s.table.process_mut(current).take_entry()
    });

    match entry {
        Ok(Some(entry)) => {
            interrupts::enable();
            entry();
            crate::process::exit()
        }
        Ok(None) => fatal(TaskingError::ZombieResumed(current_pid().unwrap_or(Pid(0)))),
        Err(err) => fatal(err),
    }
}

/// Pid of the running task, `None` before tasking is initialized.
pub fn current_pid() -> Option<Pid> {
    with_scheduler(|s| s.current_pid()).ok()
}

/// Pid of the running task without waiting for the scheduler lock.
///
/// For the panic path, which may run while the lock is held.
pub fn try_current_pid() -> Option<Pid> {
    let guard = SCHEDULER.try_lock()?;
    let pid = guard.as_ref().map(Scheduler::current_pid);
    pid
}

/// Name of the running task, `None` before tasking is initialized.
pub fn current_name() -> Option<String> {
    with_scheduler(|s| String::from(s.current().name())).ok()
}

/// Total context switches since init.
pub fn context_switches() -> u64 {
    with_scheduler(|s| s.context_switches()).unwrap_or(0)
}

/// Drop all tasking state so the next test can start from scratch.
#[cfg(test)]
pub(crate) fn reset_for_tests() {
    TASKING_ACTIVE.store(false, Ordering::Release);
    let old = SCHEDULER.lock().take();
    drop(old);
    interrupts::enable();
}
