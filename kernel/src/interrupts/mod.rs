//! Interrupt glue for the tasking subsystem.
//!
//! The interrupt controller and descriptor table belong to the platform
//! layer. What tasking needs from it is small:
//!
//! - **Interrupt flag**: query, enable, disable and a scoped
//!   [`without_interrupts`] guard.
//! - **Timer hook**: [`timer_tick`], called from the timer interrupt
//!   epilogue with interrupts disabled.
//! - **Fault hook**: [`fault_trap`], called from CPU exception handlers,
//!   which turns a fault into a signal for the running task.
//!
//! On bare metal the flag is the real `RFLAGS.IF`. On hosted builds it is
//! emulated in memory so the scheduler's interrupt discipline can still be
//! observed.

use core::fmt;
use core::sync::atomic::{AtomicU64, Ordering};

use crate::error::{fatal, TaskingError};
use crate::process::signal::{self, Signal};
use crate::scheduler;

/// Timer tick counter.
static TIMER_TICKS: AtomicU64 = AtomicU64::new(0);

#[cfg(all(target_arch = "x86_64", target_os = "none"))]
mod flag {
    use x86_64::instructions::interrupts;

    pub fn are_enabled() -> bool {
        interrupts::are_enabled()
    }

    pub fn enable() {
        interrupts::enable();
    }

    pub fn disable() {
        interrupts::disable();
    }

    pub fn halt() {
        x86_64::instructions::hlt();
    }
}


#[cfg(all(not(test), not(target_os = "none")))]
mod flag {
    use core::sync::atomic::{AtomicBool, Ordering};

    static ENABLED: AtomicBool = AtomicBool::new(true);

    pub fn are_enabled() -> bool {
        ENABLED.load(Ordering::SeqCst)
    }

    pub fn enable() {
        ENABLED.store(true, Ordering::SeqCst);
    }

    pub fn disable() {
        ENABLED.store(false, Ordering::SeqCst);
    }

    pub fn halt() {
        core::hint::spin_loop();
    }
}

/// Whether interrupts are enabled.
pub fn are_enabled() -> bool {
    flag::are_enabled()
}

/// Enable hardware interrupts.
pub fn enable() {
    flag::enable();
}

/// Disable hardware interrupts.
pub fn disable() {
    flag::disable();
}

/// Run `f` with interrupts disabled, restoring the previous state after.
pub fn without_interrupts<R>(f: impl FnOnce() -> R) -> R {
    let were_enabled = are_enabled();
    if were_enabled {
        disable();
    }
    let result = f();
    if were_enabled {
        enable();
    }
    result
}

/// Halt until the next interrupt, forever.
pub fn hlt_loop() -> ! {
    loop {
        flag::halt();
    }
}

/// Timer interrupt hook.
///
/// Counts the tick and, once tasking is up, runs the preemptive switch.
/// Must be called with interrupts disabled.
///
/// The platform handler must send the end-of-interrupt to the interrupt
/// controller *before* calling this. The switch may land in a freshly
/// spawned task that never returns through the handler, and a missing
/// EOI would mask the timer for good.
pub fn timer_tick() {
    TIMER_TICKS.fetch_add(1, Ordering::Relaxed);
    if scheduler::tasking_active() {
        scheduler::preempt();
    }
}

/// Get the current timer tick count.
pub fn ticks() -> u64 {
    TIMER_TICKS.load(Ordering::Relaxed)
}

/// CPU fault forwarded to the running task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// `#DE`
    DivideError,
    /// `#UD`
    InvalidOpcode,
    /// `#GP`
    GeneralProtection {
        /// Error code pushed by the CPU.
        error_code: u64,
    },
    /// `#PF`
    PageFault {
        /// Faulting address (CR2).
        address: u64,
    },
}

impl Fault {
    /// Signal delivered for this fault.
    pub fn signal(&self) -> Signal {
        match self {
            Fault::DivideError => Signal::ARITHMETIC,
            Fault::InvalidOpcode => Signal::ILLEGAL_INSTRUCTION,
            Fault::GeneralProtection { .. } | Fault::PageFault { .. } => Signal::SEGMENTATION,
        }
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Fault::DivideError => write!(f, "divide error"),
            Fault::InvalidOpcode => write!(f, "invalid opcode"),
            Fault::GeneralProtection { error_code } => {
                write!(f, "general protection fault (error code {:#x})", error_code)
            }
            Fault::PageFault { address } => write!(f, "page fault at {:#x}", address),
        }
    }
}

/// CPU exception hook.
///
/// Delivers the fault's signal to the running task. Returns if the task
/// handled it; otherwise the task is terminated and never resumes. A fault
/// before tasking is up, or in the idle task without a handler, is fatal.
pub fn fault_trap(fault: Fault) {
    let pid = match scheduler::current_pid() {
        Some(pid) => pid,
        None => {
            log::error!("[INT] {} before tasking init", fault);
            fatal(TaskingError::NotInitialized)
        }
    };
    log::warn!("[INT] {} in pid {}", fault, pid);
    signal::deliver_to_current(pid, fault.signal());
}
