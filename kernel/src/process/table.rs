//! Process Table
//!
//! Arena of process control blocks plus the run queue ring threaded
//! through it. Slots are addressed by index; the ring is kept as
//! `prev`/`next` slot indices, so linking and unlinking are O(1) and no
//! PCB ever owns another.
//!
//! The table also owns pid allocation. A pid maps to a slot only while its
//! process is linked; once reaped, the pid resolves to `Dead` forever even
//! after the slot has been recycled for a newer process.

use alloc::vec::Vec;
use hashbrown::HashMap;

use crate::error::{fatal, Result, TaskingError};
use crate::scheduler::{Pid, Process, ProcessState};

/// One occupied arena slot.
struct Slot {
    process: Process,
    prev: usize,
    next: usize,
}

/// The process registry.
pub struct ProcessTable {
    slots: Vec<Option<Slot>>,
    /// Recycled slot indices.
    free_slots: Vec<usize>,
    /// Linked processes by pid.
    by_pid: HashMap<Pid, usize>,
    /// Next pid to hand out. Pids below this have been issued.
    next_pid: u32,
    /// Number of linked processes.
    linked: usize,
}

impl ProcessTable {
    /// Create an empty table. The first pid issued is [`Pid::IDLE`].
    pub fn new() -> Self {
        ProcessTable {
            slots: Vec::new(),
            free_slots: Vec::new(),
            by_pid: HashMap::new(),
            next_pid: Pid::IDLE.0,
            linked: 0,
        }
    }

    /// Issue the next pid. Running out of pids is fatal.
    pub fn allocate_pid(&mut self) -> Pid {
        let pid = Pid(self.next_pid);
        self.next_pid = self
            .next_pid
            .checked_add(1)
            .unwrap_or_else(|| fatal(TaskingError::PidSpaceExhausted));
        pid
    }

    /// Whether `pid` has ever been handed out by [`allocate_pid`].
    ///
    /// [`allocate_pid`]: ProcessTable::allocate_pid
    pub fn was_issued(&self, pid: Pid) -> bool {
        pid.0 >= Pid::IDLE.0 && pid.0 < self.next_pid
    }

    /// Number of processes in the ring.
    pub fn len(&self) -> usize {
        self.linked
    }

    /// Whether the ring is empty.
    pub fn is_empty(&self) -> bool {
        self.linked == 0
    }

    /// Store `process` and link it into the ring just before `anchor`.
    ///
    /// With no anchor the process must be the first one, and forms a ring
    /// of one.
    pub fn insert(&mut self, process: Process, anchor: Option<usize>) -> Result<usize> {
        let pid = process.pid();
        self.by_pid
            .try_reserve(1)
            .map_err(|_| TaskingError::OutOfMemory {
                requested: core::mem::size_of::<(Pid, usize)>(),
            })?;

        let index = match self.free_slots.pop() {
            Some(index) => index,
            None => {
                self.slots
                    .try_reserve(1)
                    .map_err(|_| TaskingError::OutOfMemory {
                        requested: core::mem::size_of::<Option<Slot>>(),
                    })?;
                self.slots.push(None);
                self.slots.len() - 1
            }
        };

        let (prev, next) = match anchor {
            Some(anchor) => {
                let prev = self.slot(anchor).prev;
                self.slot_mut(prev).next = index;
                self.slot_mut(anchor).prev = index;
                (prev, anchor)
            }
            None => {
                assert!(self.is_empty(), "unanchored insert into a non-empty ring");
                (index, index)
            }
        };

        self.slots[index] = Some(Slot {
            process,
            prev,
            next,
        });
        self.by_pid.insert(pid, index);
        self.linked += 1;
        Ok(index)
    }

    /// Unlink the slot from the ring and hand back its process.
    pub fn unlink(&mut self, index: usize) -> Process {
        let slot = self.slots[index]
            .take()
            .unwrap_or_else(|| panic!("unlink of vacant slot {}", index));

        if slot.next != index {
            self.slot_mut(slot.prev).next = slot.next;
            self.slot_mut(slot.next).prev = slot.prev;
        }

        self.by_pid.remove(&slot.process.pid());
        self.free_slots.push(index);
        self.linked -= 1;
        slot.process
    }

    /// Slot index of a linked process.
    pub fn slot_of(&self, pid: Pid) -> Option<usize> {
        self.by_pid.get(&pid).copied()
    }

    /// Resolve a pid to a slot, distinguishing reaped from unknown pids.
    pub fn resolve(&self, pid: Pid) -> Result<usize> {
        match self.slot_of(pid) {
            Some(index) => Ok(index),
            None if self.was_issued(pid) => Err(TaskingError::ProcessReaped(pid)),
            None => Err(TaskingError::NoSuchProcess(pid)),
        }
    }

    /// State of any pid: `None` if never issued, `Dead` once reaped.
    pub fn lookup(&self, pid: Pid) -> Option<ProcessState> {
        match self.slot_of(pid) {
            Some(index) => Some(self.process(index).state()),
            None if self.was_issued(pid) => Some(ProcessState::Dead),
            None => None,
        }
    }

    /// Get the process in an occupied slot.
    pub fn process(&self, index: usize) -> &Process {
        &self.slot(index).process
    }

    /// Get the process in an occupied slot, mutably.
    pub fn process_mut(&mut self, index: usize) -> &mut Process {
        &mut self.slot_mut(index).process
    }

    /// Successor in the ring.
    pub fn next_of(&self, index: usize) -> usize {
        self.slot(index).next
    }

    /// Predecessor in the ring.
    pub fn prev_of(&self, index: usize) -> usize {
        self.slot(index).prev
    }

    /// Walk the whole ring once, starting at `start`.
    pub fn ring_from(&self, start: usize) -> RingIter<'_> {
        RingIter {
            table: self,
            start,
            cursor: Some(start),
        }
    }

    fn slot(&self, index: usize) -> &Slot {
        self.slots
            .get(index)
            .and_then(Option::as_ref)
            .unwrap_or_else(|| panic!("vacant process slot {}", index))
    }

    fn slot_mut(&mut self, index: usize) -> &mut Slot {
        self.slots
            .get_mut(index)
            .and_then(Option::as_mut)
            .unwrap_or_else(|| panic!("vacant process slot {}", index))
    }
}

impl Default for ProcessTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Iterator over the ring, yielding `(slot, process)` pairs.
pub struct RingIter<'a> {
    table: &'a ProcessTable,
    start: usize,
    cursor: Option<usize>,
}

impl<'a> Iterator for RingIter<'a> {
    type Item = (usize, &'a Process);

    fn next(&mut self) -> Option<Self::Item> {
        let index = self.cursor?;
        let next = self.table.next_of(index);
        self.cursor = if next == self.start { None } else { Some(next) };
        Some((index, self.table.process(index)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::TaskStack;
    use alloc::vec::Vec;

    fn noop() {}

    fn spawn_into(table: &mut ProcessTable, anchor: usize, name: &str) -> usize {
        let pid = table.allocate_pid();
        let stack = TaskStack::allocate(4096).unwrap();
        table
            .insert(Process::new(pid, name, noop, stack), Some(anchor))
            .unwrap()
    }

    fn with_idle() -> (ProcessTable, usize) {
        let mut table = ProcessTable::new();
        let pid = table.allocate_pid();
        let idle = table.insert(Process::adopt_current(pid, "idle"), None).unwrap();
        (table, idle)
    }

    fn ring_names(table: &ProcessTable, start: usize) -> Vec<&str> {
        table.ring_from(start).map(|(_, p)| p.name()).collect()
    }

    #[test]
    fn test_first_process_forms_ring_of_one() {
        let (table, idle) = with_idle();
        assert_eq!(table.len(), 1);
        assert_eq!(table.next_of(idle), idle);
        assert_eq!(table.prev_of(idle), idle);
        assert_eq!(table.process(idle).pid(), Pid::IDLE);
    }

    #[test]
    fn test_insert_before_anchor_keeps_spawn_order() {
        let (mut table, idle) = with_idle();
        spawn_into(&mut table, idle, "a");
        spawn_into(&mut table, idle, "b");
        spawn_into(&mut table, idle, "c");

        assert_eq!(ring_names(&table, idle), ["idle", "a", "b", "c"]);
    }

    #[test]
    fn test_unlink_closes_the_ring() {
        let (mut table, idle) = with_idle();
        let a = spawn_into(&mut table, idle, "a");
        let b = spawn_into(&mut table, idle, "b");

        let removed = table.unlink(a);
        assert_eq!(removed.name(), "a");
        assert_eq!(table.next_of(idle), b);
        assert_eq!(table.prev_of(b), idle);
        assert_eq!(ring_names(&table, idle), ["idle", "b"]);
    }

    #[test]
    fn test_recycled_slot_does_not_revive_old_pid() {
        let (mut table, idle) = with_idle();
        let a = spawn_into(&mut table, idle, "a");
        let old_pid = table.process(a).pid();
        table.unlink(a);

        let reused = spawn_into(&mut table, idle, "b");
        assert_eq!(reused, a);
        assert_ne!(table.process(reused).pid(), old_pid);
        assert_eq!(table.lookup(old_pid), Some(ProcessState::Dead));
        assert_eq!(table.resolve(old_pid), Err(TaskingError::ProcessReaped(old_pid)));
    }

    #[test]
    fn test_lookup_of_unissued_pid() {
        let (table, _) = with_idle();
        assert_eq!(table.lookup(Pid(0)), None);
        assert_eq!(table.lookup(Pid(1000)), None);
        assert_eq!(table.resolve(Pid(1000)), Err(TaskingError::NoSuchProcess(Pid(1000))));
        assert_eq!(table.lookup(Pid::IDLE), Some(ProcessState::Alive));
    }

    #[test]
    #[should_panic(expected = "process identifier space exhausted")]
    fn test_pid_exhaustion_is_fatal() {
        let mut table = ProcessTable::new();
        table.next_pid = u32::MAX;
        table.allocate_pid();
    }

    #[test]
    fn test_pids_strictly_increase() {
        let mut table = ProcessTable::new();
        let mut last = table.allocate_pid();
        for _ in 0..100 {
            let pid = table.allocate_pid();
            assert!(pid > last);
            last = pid;
        }
    }
}
