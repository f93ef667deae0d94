//! Bounded per-process time table
//!
//! Tracks last-seen cumulative CPU time and a short usage history for up to
//! [`MAX_TRACKED`] processes. When the table is full and an unseen pid shows
//! up, one compaction pass drops entries whose pid no longer resolves to a
//! live process; if that frees nothing the newcomer goes untracked. Lossy
//! tracking under pressure is the contract here, not an error.

use std::collections::HashMap;

use tracing::debug;

use crate::procfs::Pid;
use crate::window::RollingWindow;

/// Capacity of the process table.
pub const MAX_TRACKED: usize = 200;

/// Per-process rolling window length.
pub const PROC_WINDOW: usize = 20;

/// One tracked process.
#[derive(Debug, Clone)]
pub struct ProcRecord {
    name: String,
    last_time: u64,
    window: RollingWindow,
}

impl ProcRecord {
    fn new(name: &str, initial_time: u64) -> Self {
        Self {
            name: name.to_string(),
            last_time: initial_time,
            window: RollingWindow::new(PROC_WINDOW),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Rolling average over the recorded samples; 0.0 with no history.
    pub fn average(&self) -> f32 {
        self.window.mean()
    }

    /// Usage samples recorded so far, saturating at the window length.
    pub fn sample_count(&self) -> usize {
        self.window.len()
    }

    /// Store a new cumulative time, returning the previous one for delta
    /// computation by the caller.
    pub fn update(&mut self, new_time: u64) -> u64 {
        std::mem::replace(&mut self.last_time, new_time)
    }

    /// Fold one usage sample into the rolling window.
    pub fn record_sample(&mut self, percent: f32) {
        self.window.push(percent);
    }
}

/// Outcome of [`ProcessTable::lookup_or_create`].
pub enum Slot<'a> {
    /// The pid was already tracked.
    Existing(&'a mut ProcRecord),
    /// The pid was inserted by this call; it has no usable history yet.
    Created(&'a mut ProcRecord),
    /// Table full even after compaction; the pid is not tracked.
    NotTracked,
}

/// Capacity-bounded map of tracked processes, keyed by pid.
#[derive(Debug, Default)]
pub struct ProcessTable {
    records: HashMap<Pid, ProcRecord>,
}

impl ProcessTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, pid: Pid) -> Option<&ProcRecord> {
        self.records.get(&pid)
    }

    /// Fetch the record for `pid`, inserting one if the pid is unseen.
    ///
    /// A full table triggers one compaction pass via `alive` before giving
    /// up. The display name is refreshed on every call so a reused pid never
    /// reports a dead process's name.
    pub fn lookup_or_create(
        &mut self,
        pid: Pid,
        initial_time: u64,
        name: &str,
        alive: impl Fn(Pid) -> bool,
    ) -> Slot<'_> {
        let created = if self.records.contains_key(&pid) {
            false
        } else {
            if self.records.len() >= MAX_TRACKED {
                self.compact(&alive);
            }
            if self.records.len() >= MAX_TRACKED {
                debug!(pid, "process table full after compaction, not tracking");
                return Slot::NotTracked;
            }
            self.records.insert(pid, ProcRecord::new(name, initial_time));
            true
        };
        match self.records.get_mut(&pid) {
            Some(record) if created => Slot::Created(record),
            Some(record) => {
                if record.name != name {
                    record.name = name.to_string();
                }
                Slot::Existing(record)
            }
            // Unreachable: the pid was just inserted or found above.
            None => Slot::NotTracked,
        }
    }

    /// Drop every record whose pid no longer resolves to a live process.
    /// O(n) in the table size; callers invoke it only when an insert is
    /// pending on a full table.
    pub fn compact(&mut self, alive: impl Fn(Pid) -> bool) {
        let before = self.records.len();
        self.records.retain(|pid, _| alive(*pid));
        let evicted = before - self.records.len();
        if evicted > 0 {
            debug!(evicted, remaining = self.records.len(), "compacted process table");
        }
    }
}
