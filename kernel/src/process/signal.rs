//! Signal Delivery
//!
//! A signal is an integer code delivered synchronously to one process.
//! There is no pending set and no queue: delivery either runs the target's
//! handler right away or applies the default disposition, which is
//! termination.
//!
//! The handler runs in the context of whoever sent the signal, not in the
//! target's own context. It is cloned out of the target's PCB under the
//! scheduler lock and invoked after the lock is released, so a handler may
//! itself spawn, kill or signal.

use alloc::sync::Arc;
use core::fmt;

use crate::error::{fatal, Result, TaskingError};
use crate::interrupts;
use crate::scheduler::{self, Disposition, Pid};

/// Signal code.
///
/// Numbering follows the Linux x86_64 values for the codes the kernel
/// raises itself; any other value may be sent and is passed through to
/// the handler untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Signal(pub i32);

impl Signal {
    /// Interrupt from the console.
    pub const INTERRUPT: Signal = Signal(2);
    /// Illegal instruction.
    pub const ILLEGAL_INSTRUCTION: Signal = Signal(4);
    /// Arithmetic fault (divide error).
    pub const ARITHMETIC: Signal = Signal(8);
    /// User-defined signal 1.
    pub const USER1: Signal = Signal(10);
    /// Invalid memory reference.
    pub const SEGMENTATION: Signal = Signal(11);
    /// User-defined signal 2.
    pub const USER2: Signal = Signal(12);
    /// Termination request.
    pub const TERMINATE: Signal = Signal(15);

    /// Raw signal code.
    pub const fn code(self) -> i32 {
        self.0
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "signal {}", self.0)
    }
}

impl From<i32> for Signal {
    fn from(code: i32) -> Self {
        Signal(code)
    }
}

/// A registered signal handler.
#[derive(Clone)]
pub struct SignalHandler(Arc<dyn Fn(Signal) + Send + Sync>);

impl SignalHandler {
    /// Wrap a closure as a handler.
    pub fn new(handler: impl Fn(Signal) + Send + Sync + 'static) -> Self {
        SignalHandler(Arc::new(handler))
    }

    /// Invoke the handler.
    pub fn call(&self, signal: Signal) {
        (self.0)(signal)
    }
}

impl From<fn(Signal)> for SignalHandler {
    fn from(handler: fn(Signal)) -> Self {
        SignalHandler::new(handler)
    }
}

impl fmt::Debug for SignalHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SignalHandler(..)")
    }
}

/// How a delivery ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// The target's handler ran.
    Handled,
    /// The target had no handler and is now a zombie.
    Terminated,
}

/// Deliver `signal` to `pid`, reporting errors instead of stopping.
pub fn try_send_signal(pid: Pid, signal: Signal) -> Result<Delivery> {
    let disposition = scheduler::with_scheduler(|s| s.signal_disposition(pid))??;

    match disposition {
        Disposition::Handler(handler) => {
            log::debug!("[SIGNAL] {} -> pid {}: handler", signal, pid);
            handler.call(signal);
            Ok(Delivery::Handled)
        }
        Disposition::Terminated => {
            log::debug!("[SIGNAL] {} -> pid {}: terminated", signal, pid);
            Ok(Delivery::Terminated)
        }
    }
}

/// Deliver `signal` to `pid`.
///
/// With a handler registered, the handler runs before this returns and the
/// target's state is untouched. Without one, the target becomes a zombie
/// and is reaped on a later scheduler pass; if it is another task it keeps
/// its place until the scheduler next switches away from it.
///
/// Signalling an unknown or reaped pid, or the idle task without a handler,
/// is fatal.
pub fn send_signal(pid: Pid, signal: Signal) -> Delivery {
    try_send_signal(pid, signal).unwrap_or_else(|err| fatal(err))
}

/// Deliver `signal` to the running task.
///
/// Returns if a handler ran. If the default disposition terminated the
/// running task, it is switched away from and never resumes.
pub fn raise(signal: Signal) {
    let pid = scheduler::current_pid().unwrap_or_else(|| fatal(TaskingError::NotInitialized));
    deliver_to_current(pid, signal);
}

/// Delivery to the running task, shared with the fault trap path.
pub(crate) fn deliver_to_current(pid: Pid, signal: Signal) {
    if send_signal(pid, signal) == Delivery::Terminated {
        interrupts::disable();
        scheduler::switch_away_for_good();
    }
}

/// Register `handler` for the running task, returning the old one.
pub fn set_signal_handler(handler: impl Into<SignalHandler>) -> Option<SignalHandler> {
    let pid = scheduler::current_pid().unwrap_or_else(|| fatal(TaskingError::NotInitialized));
    set_signal_handler_for(pid, handler)
}

/// Register `handler` for `pid`, returning the old one.
pub fn set_signal_handler_for(pid: Pid, handler: impl Into<SignalHandler>) -> Option<SignalHandler> {
    let handler = handler.into();
    scheduler::with_scheduler(|s| s.set_notify(pid, Some(handler)))
        .and_then(|r| r)
        .unwrap_or_else(|err| fatal(err))
}

/// Remove the running task's handler, restoring default termination.
pub fn clear_signal_handler() -> Option<SignalHandler> {
    scheduler::with_scheduler(|s| {
        let pid = s.current_pid();
        s.set_notify(pid, None)
    })
    .and_then(|r| r)
    .unwrap_or_else(|err| fatal(err))
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::sync::atomic::{AtomicI32, Ordering};

    #[test]
    fn test_handler_receives_exact_code() {
        static SEEN: AtomicI32 = AtomicI32::new(0);
        let handler = SignalHandler::new(|sig| SEEN.store(sig.code(), Ordering::SeqCst));
        handler.call(Signal(42));
        assert_eq!(SEEN.load(Ordering::SeqCst), 42);
    }

    #[test]
    fn test_fn_pointer_converts() {
        static HITS: AtomicI32 = AtomicI32::new(0);
        fn on_signal(sig: Signal) {
            HITS.fetch_add(sig.code(), Ordering::SeqCst);
        }
        let handler: SignalHandler = (on_signal as fn(Signal)).into();
        handler.clone().call(Signal::TERMINATE);
        assert_eq!(HITS.load(Ordering::SeqCst), 15);
    }

    #[test]
    fn test_signal_display() {
        use alloc::string::ToString;
        assert_eq!(Signal::SEGMENTATION.to_string(), "signal 11");
        assert_eq!(Signal::from(-3), Signal(-3));
    }
}
