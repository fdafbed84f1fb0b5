//! Round-robin scheduler policy.
//!
//! Selection walks the run queue ring forward from the current task and
//! picks the first `Alive` entry. Zombies met on the way are reaped as a
//! side effect, bounded to one per walk so a timer tick never does more
//! than constant cleanup work.

use crate::error::{Result, TaskingError};
use crate::process::table::ProcessTable;

use super::task::{Process, ProcessState};

/// Outcome of one selection walk.
#[derive(Debug)]
pub struct Pick {
    /// Slot of the task to resume. Equal to the current slot for a
    /// self-resume.
    pub next: usize,
    /// Process reaped during the walk, already unlinked and `Dead`.
    /// Dropping it releases its stack.
    pub reaped: Option<Process>,
}

/// Choose the task to run after `current`.
///
/// `current` itself is never reaped here, even as a zombie: its stack is
/// the one this walk is running on.
pub fn pick_next(table: &mut ProcessTable, current: usize) -> Result<Pick> {
    if table.is_empty() {
        return Err(TaskingError::EmptyRunQueue);
    }

    let mut reaped = None;
    let mut cursor = table.next_of(current);

    loop {
        if cursor == current {
            return if table.process(current).is_runnable() {
                Ok(Pick {
                    next: current,
                    reaped,
                })
            } else {
                Err(TaskingError::NoRunnableTask)
            };
        }

        let following = table.next_of(cursor);
        match table.process(cursor).state() {
            ProcessState::Alive => {
                return Ok(Pick {
                    next: cursor,
                    reaped,
                })
            }
            ProcessState::Zombie if reaped.is_none() => {
                reaped = Some(reap(table, cursor));
            }
            ProcessState::Zombie | ProcessState::Dead => {}
        }
        cursor = following;
    }
}

/// Unlink a zombie, mark it `Dead` and hand it back for release.
pub fn reap(table: &mut ProcessTable, index: usize) -> Process {
    let mut process = table.unlink(index);
    process.mark_dead();
    log::debug!(
        "[SCHED] reaped pid {} ({})",
        process.pid(),
        process.name()
    );
    process
}
