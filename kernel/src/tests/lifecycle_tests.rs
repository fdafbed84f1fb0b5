//! Lifecycle Unit Tests
//!
//! Tests for spawn, spawn-and-wait, exit and kill.

#[cfg(test)]
mod tests {
    use alloc::vec::Vec;
    use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};
    use spin::Mutex;

    use crate::error::TaskingError;
    use crate::process;
    use crate::scheduler::{self, Pid, ProcessState};
    use crate::tests::harness;

    fn noop() {}

    // ========================================
    // Spawn And Wait Tests
    // ========================================

    static FINISHED: Mutex<Vec<&'static str>> = Mutex::new(Vec::new());

    fn grandchild() {
        for _ in 0..3 {
            scheduler::yield_now();
        }
        FINISHED.lock().push("grandchild");
    }

    fn child() {
        let pid = process::spawn_and_wait("grandchild", grandchild);
        if process::lookup(pid) == Some(ProcessState::Dead) {
            FINISHED.lock().push("child");
        }
    }

    fn parent() {
        let pid = process::spawn_and_wait("child", child);
        if process::lookup(pid) == Some(ProcessState::Dead) {
            FINISHED.lock().push("parent");
        }
    }

    #[test]
    fn test_spawn_and_wait_nests() {
        let _guard = harness::boot();
        FINISHED.lock().clear();

        let pid = process::spawn_and_wait("parent", parent);

        assert_eq!(process::lookup(pid), Some(ProcessState::Dead));
        assert_eq!(*FINISHED.lock(), ["grandchild", "child", "parent"]);
        assert_eq!(process::snapshot().len(), 1);
    }

    static COUNTER: AtomicU32 = AtomicU32::new(0);

    fn count() {
        COUNTER.fetch_add(1, Ordering::SeqCst);
    }

    #[test]
    fn test_many_tasks_come_and_go() {
        let _guard = harness::boot();
        COUNTER.store(0, Ordering::SeqCst);

        for _ in 0..10 {
            let pids: Vec<Pid> = (0..10).map(|_| process::spawn("worker", count)).collect();
            harness::yield_until(64, || pids.iter().all(|&pid| !process::is_running(pid)));
        }

        assert_eq!(COUNTER.load(Ordering::SeqCst), 100);
        assert_eq!(process::snapshot().len(), 1);
        assert!(process::is_running(Pid::IDLE));
    }

    // ========================================
    // Kill Tests
    // ========================================

    static RAN: AtomicBool = AtomicBool::new(false);

    fn mark_ran() {
        RAN.store(true, Ordering::SeqCst);
    }

    #[test]
    fn test_killed_before_first_turn_never_runs() {
        let _guard = harness::boot();
        RAN.store(false, Ordering::SeqCst);

        let pid = process::spawn("doomed", mark_ran);
        process::kill(pid);
        scheduler::yield_now();

        assert!(!RAN.load(Ordering::SeqCst));
        assert_eq!(process::lookup(pid), Some(ProcessState::Dead));
    }

    #[test]
    fn test_kill_of_zombie_is_a_no_op() {
        let _guard = harness::boot();

        let pid = process::spawn("twice", noop);
        process::kill(pid);
        process::kill(pid);
        assert_eq!(process::lookup(pid), Some(ProcessState::Zombie));
    }

    static KEPT_RUNNING: AtomicBool = AtomicBool::new(false);
    static RESUMED: AtomicBool = AtomicBool::new(false);

    fn kill_self_then_yield() {
        let me = scheduler::current_pid().unwrap_or(Pid(0));
        process::kill(me);
        // Termination is deferred until the next switch.
        KEPT_RUNNING.store(true, Ordering::SeqCst);
        scheduler::yield_now();
        RESUMED.store(true, Ordering::SeqCst);
    }

    #[test]
    fn test_external_terminate_is_deferred() {
        let _guard = harness::boot();
        KEPT_RUNNING.store(false, Ordering::SeqCst);
        RESUMED.store(false, Ordering::SeqCst);

        let pid = process::spawn("self-killer", kill_self_then_yield);
        harness::yield_until(8, || !process::is_running(pid));

        assert!(KEPT_RUNNING.load(Ordering::SeqCst));
        assert!(!RESUMED.load(Ordering::SeqCst));
    }

    #[test]
    fn test_try_kill_errors() {
        let _guard = harness::boot();

        assert_eq!(
            process::try_kill(Pid::IDLE),
            Err(TaskingError::IdleTermination)
        );
        assert_eq!(
            process::try_kill(Pid(4242)),
            Err(TaskingError::NoSuchProcess(Pid(4242)))
        );

        let pid = process::spawn_and_wait("short", noop);
        assert_eq!(process::try_kill(pid), Err(TaskingError::ProcessReaped(pid)));
    }

    #[test]
    #[should_panic(expected = "the idle task cannot terminate")]
    fn test_kill_idle_is_fatal() {
        let _guard = harness::boot();
        process::kill(Pid::IDLE);
    }

    #[test]
    #[should_panic(expected = "has been reaped")]
    fn test_kill_reaped_is_fatal() {
        let _guard = harness::boot();
        let pid = process::spawn_and_wait("short", noop);
        process::kill(pid);
    }

    // ========================================
    // Exit Tests
    // ========================================

    fn exit_early() {
        RAN.store(true, Ordering::SeqCst);
        process::exit();
    }

    #[test]
    fn test_exit_never_returns() {
        let _guard = harness::boot();
        RAN.store(false, Ordering::SeqCst);

        let pid = process::spawn_and_wait("exiter", exit_early);
        assert!(RAN.load(Ordering::SeqCst));
        assert!(!process::is_running(pid));
    }

    #[test]
    #[should_panic(expected = "the idle task cannot terminate")]
    fn test_exit_from_idle_is_fatal() {
        let _guard = harness::boot();
        process::exit();
    }

    // ========================================
    // Macro Tests
    // ========================================

    #[test]
    fn test_start_macros_name_tasks() {
        let _guard = harness::boot();
        COUNTER.store(0, Ordering::SeqCst);

        let pid = crate::start!(count);
        assert_eq!(process::name_of(pid).as_deref(), Some("count"));

        let named = crate::start!("named", count);
        assert_eq!(process::name_of(named).as_deref(), Some("named"));

        let waited = crate::start_and_wait!(count);
        assert!(!process::is_running(waited));
        assert_eq!(COUNTER.load(Ordering::SeqCst), 3);
    }
}
