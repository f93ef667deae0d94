//! Top-process attribution
//!
//! Diffs cumulative per-process CPU time against the previous tick, ranks
//! the busiest processes and reports the top few together with each one's
//! prior rolling average, so a reader can tell "always this hot" from "hot
//! right now".
//!
//! One [`AttributionEngine::run`] call is one atomic tick: the very first
//! successful call only seeds the table and the clock (there is nothing to
//! diff against), and a stalled clock aborts the pass before any percentage
//! is computed. Stored cumulative times are overwritten as soon as each
//! process is diffed, so a process is never double-counted across ticks even
//! when it fails the inclusion policy.

use serde::Serialize;
use tracing::debug;

use crate::procfs::{Pid, Procfs};
use crate::table::{ProcessTable, Slot};

/// Readings at or below this share of total CPU are noise, never candidates.
pub const NOISE_FLOOR: f32 = 0.01;

/// Entries emitted per report.
pub const TOP_N: usize = 5;

/// Prior samples a record needs before its average is shown as a baseline.
pub const BASELINE_MIN_SAMPLES: usize = 5;

/// One ranked report line.
#[derive(Debug, Clone, Serialize)]
pub struct ReportEntry {
    pub pid: Pid,
    pub name: String,
    /// Share of total CPU since the previous tick, in percent.
    pub cpu_percent: f32,
    /// Rolling average prior to this tick, when the process has enough
    /// history; `None` marks a process with no established baseline.
    pub baseline: Option<f32>,
}

impl ReportEntry {
    /// `cpu_percent` expressed as a multiple of the baseline.
    pub fn ratio(&self) -> Option<f32> {
        self.baseline.map(|avg| self.cpu_percent / avg)
    }
}

/// Ranked top-CPU report for one tick.
#[derive(Debug, Clone, Serialize)]
pub struct TopReport {
    /// Whether the more selective spike-mode policy produced this report.
    pub spike_mode: bool,
    pub entries: Vec<ReportEntry>,
}

/// Tick-driven attribution engine: owns the process table and the previous
/// system clock reading.
#[derive(Debug, Default)]
pub struct AttributionEngine {
    table: ProcessTable,
    prev_total: Option<u64>,
}

impl AttributionEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn table(&self) -> &ProcessTable {
        &self.table
    }

    /// Run one attribution pass.
    ///
    /// Returns `None` on the seeding tick, when CPU accounting is
    /// unreadable, when no time elapsed on the system clock, or when no
    /// process qualifies under the inclusion policy. None of these are
    /// errors; the next tick simply tries again.
    pub fn run(&mut self, procfs: &Procfs, spike_mode: bool) -> Option<TopReport> {
        let total = match procfs.system_cpu() {
            Ok(times) => times.total(),
            Err(err) => {
                debug!(%err, "cpu accounting unavailable, skipping attribution");
                return None;
            }
        };

        let Some(prev_total) = self.prev_total else {
            for sample in procfs.scan() {
                self.table
                    .lookup_or_create(sample.pid, sample.cpu_time, &sample.name, |pid| {
                        procfs.is_alive(pid)
                    });
            }
            self.prev_total = Some(total);
            return None;
        };

        let total_delta = total.saturating_sub(prev_total);
        if total_delta == 0 {
            return None;
        }

        let mut candidates: Vec<ReportEntry> = Vec::new();
        for sample in procfs.scan() {
            let slot = self.table.lookup_or_create(
                sample.pid,
                sample.cpu_time,
                &sample.name,
                |pid| procfs.is_alive(pid),
            );
            let record = match slot {
                Slot::Existing(record) => record,
                // Seeded this tick: no previous time to diff against.
                Slot::Created(_) => continue,
                // Capacity exhausted: the process goes unreported this tick.
                Slot::NotTracked => continue,
            };

            let prev_time = record.update(sample.cpu_time);
            let proc_delta = sample.cpu_time.saturating_sub(prev_time);
            let cpu_percent = 100.0 * proc_delta as f32 / total_delta as f32;

            // The baseline consulted here (and displayed later) is the
            // average as it stood before this tick's sample lands in the
            // window. A process with history but an empty window carries a
            // zero average, so any positive usage qualifies in spike mode.
            let prev_avg = record.average();
            let prev_count = record.sample_count();
            let include = cpu_percent > NOISE_FLOOR && (!spike_mode || cpu_percent > prev_avg);
            record.record_sample(cpu_percent);

            if include {
                let baseline =
                    (prev_count >= BASELINE_MIN_SAMPLES && prev_avg > 0.0).then_some(prev_avg);
                candidates.push(ReportEntry {
                    pid: sample.pid,
                    name: sample.name,
                    cpu_percent,
                    baseline,
                });
            }
        }

        self.prev_total = Some(total);

        if candidates.is_empty() {
            return None;
        }
        // Stable sort: equal readings keep their scan order.
        candidates.sort_by(|a, b| {
            b.cpu_percent
                .partial_cmp(&a.cpu_percent)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        candidates.truncate(TOP_N);
        Some(TopReport {
            spike_mode,
            entries: candidates,
        })
    }
}
