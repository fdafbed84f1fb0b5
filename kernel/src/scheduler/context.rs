//! Context switch implementation.
//!
//! A suspended task is described by exactly two words: the stack pointer
//! and the program counter it will resume at. Callee-saved registers are
//! pushed onto the task's own stack by [`switch_context`] before the stack
//! pointer is recorded, so the calling convention does the rest.
//!
//! This is the only place in the tasking subsystem that touches raw
//! register state. Everything above it is ordinary control flow.

use core::arch::global_asm;

use super::task::TaskStack;

#[cfg(not(target_arch = "x86_64"))]
compile_error!("the tasking context switch is only implemented for x86_64");

/// Saved execution context of a suspended task.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[repr(C)]
pub struct SavedContext {
    /// Stack pointer at the moment of suspension.
    pub rsp: u64,
    /// Address execution continues at on resume.
    pub rip: u64,
}

impl SavedContext {
    /// Context of a task that has never been suspended.
    ///
    /// Used for the adopted boot context: the first switch away from it
    /// fills both words in.
    pub const fn empty() -> Self {
        SavedContext { rsp: 0, rip: 0 }
    }

    /// Prime a context so that its first resume starts a fresh task.
    ///
    /// The task begins in the entry trampoline on an empty, 16-byte
    /// aligned stack. The trampoline fetches the task's entry point from
    /// its PCB, so nothing has to be written to the stack itself.
    pub fn new_task(stack: &TaskStack) -> Self {
        SavedContext {
            rsp: stack.top() as u64,
            rip: levos_task_trampoline as *const () as usize as u64,
        }
    }

    /// Whether this context has ever been filled in.
    pub fn is_primed(&self) -> bool {
        self.rip != 0
    }
}

extern "C" {
    fn levos_switch_context(save: *mut SavedContext, load: *const SavedContext);
    fn levos_task_trampoline();
}

// rdi = context to save into, rsi = context to resume.
//
// The resume point pops the callee-saved registers pushed on entry, so a
// resumed task returns from `levos_switch_context` exactly as if it were
// an ordinary call.
global_asm!(
    ".pushsection .text",
    ".p2align 4",
    ".global levos_switch_context",
    "levos_switch_context:",
    "push rbp",
    "push rbx",
    "push r12",
    "push r13",
    "push r14",
    "push r15",
    "mov qword ptr [rdi], rsp",
    "lea rax, [rip + .Llevos_resume]",
    "mov qword ptr [rdi + 8], rax",
    "mov rsp, qword ptr [rsi]",
    "jmp qword ptr [rsi + 8]",
    ".Llevos_resume:",
    "pop r15",
    "pop r14",
    "pop r13",
    "pop r12",
    "pop rbx",
    "pop rbp",
    "ret",
    ".p2align 4",
    ".global levos_task_trampoline",
    "levos_task_trampoline:",
    "xor ebp, ebp",
    "call {start}",
    "ud2",
    ".popsection",
    start = sym task_start,
);

/// First Rust frame of every spawned task.
extern "C" fn task_start() -> ! {
    super::run_current_entry()
}

/// Suspend the running task into `save` and resume `load`.
///
/// Returns when some later switch resumes the context stored in `save`.
///
/// # Safety
///
/// - `save` must point to the saved context of the task executing this
///   call, and `load` to the context of a task that is suspended (or has
///   never run). Both must stay valid until the switch completes.
/// - The stack described by `load` must still be allocated.
/// - Interrupts must be disabled and the scheduler lock released.
pub unsafe fn switch_context(save: *mut SavedContext, load: *const SavedContext) {
    // SAFETY: forwarded from the caller's contract.
    unsafe { levos_switch_context(save, load) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_task_context_is_aligned() {
        let stack = TaskStack::allocate(4096).expect("stack");
        let ctx = SavedContext::new_task(&stack);

        assert_eq!(ctx.rsp % 16, 0);
        assert!(ctx.rsp as usize <= stack.bottom() + stack.len());
        assert!(ctx.rsp as usize > stack.bottom());
        assert!(ctx.is_primed());
    }

    #[test]
    fn test_empty_context_is_not_primed() {
        assert!(!SavedContext::empty().is_primed());
    }
}
