//! Process Management
//!
//! The public tasking API: process creation and termination, signal
//! delivery and registry queries. Everything here goes through the one
//! global scheduler and is safe to call from any task.
//!
//! Query functions never fault. Before tasking is initialized they answer
//! as if no process existed.

pub mod lifecycle;
pub mod signal;
pub mod table;

use alloc::string::String;
use alloc::vec::Vec;

use crate::scheduler::{self, Pid, ProcessState};

pub use lifecycle::{exit, idle_loop, kill, spawn, spawn_and_wait, try_kill};
pub use scheduler::{context_switches, current_name, current_pid, tasking_active, TaskInfo};
pub use signal::{
    clear_signal_handler, raise, send_signal, set_signal_handler, set_signal_handler_for,
    try_send_signal, Delivery, Signal, SignalHandler,
};
pub use table::ProcessTable;

/// Whether `pid` has not been reaped yet.
///
/// A zombie still counts as running. Unknown and reaped pids give `false`.
pub fn is_running(pid: Pid) -> bool {
    matches!(
        lookup(pid),
        Some(ProcessState::Alive) | Some(ProcessState::Zombie)
    )
}

/// State of `pid`: `None` if it was never issued, `Dead` once reaped.
pub fn lookup(pid: Pid) -> Option<ProcessState> {
    scheduler::with_scheduler(|s| s.table().lookup(pid))
        .ok()
        .flatten()
}

/// Describe every process, in run order starting at the idle task.
pub fn snapshot() -> Vec<TaskInfo> {
    scheduler::with_scheduler(|s| s.snapshot()).unwrap_or_default()
}

/// Reap every zombie other than the running task right away.
///
/// Returns the number of processes reaped.
pub fn reap_zombies() -> usize {
    let reaped = scheduler::with_scheduler(|s| s.reap_zombies()).unwrap_or_default();
    let count = reaped.len();
    drop(reaped);
    if count > 0 {
        log::debug!("[TASK] swept {} zombie(s)", count);
    }
    count
}

/// Log the process table, one line per process.
pub fn print_all() {
    let tasks = snapshot();
    log::info!("  PID  STATE   SWITCHES  NAME");
    for task in &tasks {
        let marker = if task.is_current { '*' } else { ' ' };
        let handler = if task.has_handler { " [sig]" } else { "" };
        log::info!(
            "{}{:>4}  {:<6}  {:>8}  {}{}",
            marker,
            task.pid,
            task.state,
            task.switches_in,
            task.name,
            handler
        );
    }
    log::info!(
        "{} process(es), {} context switch(es)",
        tasks.len(),
        context_switches()
    );
}

/// Name of `pid` if it has not been reaped.
pub fn name_of(pid: Pid) -> Option<String> {
    scheduler::with_scheduler(|s| {
        s.table()
            .slot_of(pid)
            .map(|index| String::from(s.table().process(index).name()))
    })
    .ok()
    .flatten()
}
