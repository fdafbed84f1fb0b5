//! Process Lifecycle
//!
//! Creation and termination of kernel tasks.
//!
//! Every task moves through `Alive -> Zombie -> Dead` exactly once.
//! Termination only marks a task `Zombie`; the scheduler reaps it later,
//! after it has switched away from it, which is when its stack is freed.

use crate::error::{fatal, Result, TaskingError};
use crate::interrupts;
use crate::scheduler::{self, Pid, TaskEntry};

use super::is_running;

/// Create a task named `name` that starts at `entry`.
///
/// The task does not run until the scheduler reaches it; tasks spawned in
/// a row run in spawn order. Returning from `entry` terminates the task.
/// Allocation failure is fatal.
pub fn spawn(name: &str, entry: TaskEntry) -> Pid {
    scheduler::with_scheduler(|s| s.spawn(name, entry))
        .and_then(|r| r)
        .unwrap_or_else(|err| fatal(err))
}

/// Spawn a task and cooperatively yield until it has been reaped.
pub fn spawn_and_wait(name: &str, entry: TaskEntry) -> Pid {
    let pid = spawn(name, entry);
    while is_running(pid) {
        scheduler::yield_now();
    }
    log::debug!("[TASK] pid {} ({}) finished", pid, name);
    pid
}

/// Terminate the running task. Never returns.
///
/// Calling this from the idle task is fatal.
pub fn exit() -> ! {
    interrupts::disable();
    let pid = scheduler::with_scheduler(|s| -> Result<Pid> {
        let pid = s.current_pid();
        s.terminate_current()?;
        Ok(pid)
    })
    .and_then(|r| r)
    .unwrap_or_else(|err| fatal(err));

    log::debug!("[TASK] pid {} exited", pid);
    scheduler::switch_away_for_good()
}

/// Terminate `pid`.
///
/// The effect is deferred: the target becomes a zombie at once but, if it
/// is the running task, keeps running until the scheduler next switches
/// away from it. A task killed before its first turn never runs.
///
/// Killing an unknown or reaped pid, or the idle task, is fatal. Killing a
/// zombie again does nothing.
pub fn kill(pid: Pid) {
    if let Err(err) = try_kill(pid) {
        fatal(err);
    }
}

/// Terminate `pid`, reporting errors instead of stopping.
pub fn try_kill(pid: Pid) -> Result<()> {
    scheduler::with_scheduler(|s| s.terminate(pid))??;
    log::debug!("[TASK] killed pid {}", pid);
    Ok(())
}

/// Body of the idle task once boot work is done.
///
/// Keeps handing the CPU to other tasks and never returns.
pub fn idle_loop() -> ! {
    if !scheduler::tasking_active() {
        fatal(TaskingError::NotInitialized);
    }
    loop {
        scheduler::yield_now();
        core::hint::spin_loop();
    }
}

/// Spawn a task, naming it after its entry function unless a name is
/// given.
///
/// ```ignore
/// let pid = start!(shell_main);
/// let pid = start!("shell", shell_main);
/// ```
#[macro_export]
macro_rules! start {
    ($name:expr, $entry:expr) => {
        $crate::process::spawn($name, $entry)
    };
    ($entry:path) => {
        $crate::process::spawn(stringify!($entry), $entry)
    };
}

/// Like [`start!`], but waits until the task has been reaped.
#[macro_export]
macro_rules! start_and_wait {
    ($name:expr, $entry:expr) => {
        $crate::process::spawn_and_wait($name, $entry)
    };
    ($entry:path) => {
        $crate::process::spawn_and_wait(stringify!($entry), $entry)
    };
}
