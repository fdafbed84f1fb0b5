//! LevOS Kernel Tasking Library
//!
//! Process control blocks, the round-robin run queue, context switching,
//! the `Alive -> Zombie -> Dead` lifecycle and synchronous signal delivery
//! for a single-CPU kernel.
//!
//! # Usage
//!
//! ```ignore
//! // Brings up the serial console, then installs the logger.
//! levos_kernel::logger::init_default();
//! levos_kernel::init();
//!
//! let shell = levos_kernel::start!("shell", shell_main);
//! levos_kernel::idle_loop();
//! ```
//!
//! The timer interrupt epilogue calls [`interrupts::timer_tick`] and the
//! CPU exception handlers call [`interrupts::fault_trap`].

#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod config;
pub mod error;
pub mod interrupts;
pub mod logger;
mod panic;
pub mod process;
pub mod scheduler;
pub mod serial;

#[cfg(test)]
mod tests;

pub use config::TaskingConfig;
pub use error::{Result, TaskingError};
pub use process::{
    clear_signal_handler, context_switches, current_name, current_pid, exit, idle_loop,
    is_running, kill, lookup, print_all, raise, reap_zombies, send_signal, set_signal_handler,
    set_signal_handler_for, snapshot, spawn, spawn_and_wait, tasking_active, Signal,
    SignalHandler, TaskInfo,
};
pub use scheduler::{init, init_with, preempt, yield_now, Pid, ProcessState};
