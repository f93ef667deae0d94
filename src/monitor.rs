//! Tick orchestration
//!
//! [`CpuMonitor::tick`] is the whole per-tick control flow: read the system
//! clock, derive a usage percentage, feed the rolling baseline, and run
//! whichever attribution passes the baseline asks for. The host supplies the
//! timer and calls `tick` from a single context; nothing here spawns,
//! blocks, or locks.

use serde::Serialize;
use tracing::debug;

use crate::attribution::{AttributionEngine, TopReport};
use crate::procfs::Procfs;
use crate::spike::{SpikeEvent, SpikePolicy, SystemBaseline};

/// Everything one tick produced. All fields empty on a skipped tick.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TickOutcome {
    /// System usage percentage for this tick, when computable.
    pub system_usage: Option<f32>,
    /// Report from the periodic refresh pass.
    pub refresh_report: Option<TopReport>,
    /// Spike notification, when declared.
    pub spike: Option<SpikeEvent>,
    /// Report from the additional spike-mode pass.
    pub spike_report: Option<TopReport>,
}

impl TickOutcome {
    /// A tick with nothing to say: no reading, no report, no spike.
    pub fn is_quiet(&self) -> bool {
        self.refresh_report.is_none() && self.spike.is_none() && self.spike_report.is_none()
    }
}

/// The detector: system baseline, attribution engine, and their procfs
/// source. One instance per host; state lives for the process lifetime.
pub struct CpuMonitor {
    procfs: Procfs,
    baseline: SystemBaseline,
    engine: AttributionEngine,
    prev_used: u64,
    prev_total: u64,
}

impl CpuMonitor {
    pub fn new(procfs: Procfs, policy: SpikePolicy) -> Self {
        Self {
            procfs,
            baseline: SystemBaseline::new(policy),
            engine: AttributionEngine::new(),
            prev_used: 0,
            prev_total: 0,
        }
    }

    /// Free-memory reading for hosts that log it alongside CPU usage.
    pub fn mem_free_percent(&self) -> Option<f32> {
        self.procfs.mem_free_percent()
    }

    /// One detector tick. Never fails: unreadable counters or a stalled
    /// clock degrade to a quiet outcome, and the next tick starts clean.
    pub fn tick(&mut self) -> TickOutcome {
        let mut outcome = TickOutcome::default();

        let usage = match self.read_usage() {
            Some(usage) => usage,
            None => return outcome,
        };
        outcome.system_usage = Some(usage);

        let decision = self.baseline.observe(usage);
        if decision.refresh_due {
            outcome.refresh_report = self.engine.run(&self.procfs, false);
        }
        if let Some(spike) = decision.spike {
            debug!(
                usage = spike.usage,
                average = spike.average,
                "cpu spike detected"
            );
            outcome.spike = Some(spike);
            outcome.spike_report = self.engine.run(&self.procfs, true);
        }
        outcome
    }

    /// System usage since the previous tick: busy delta over total delta.
    /// The first reading diffs against zero, yielding the since-boot
    /// average, which is still a valid sample to seed the ring with.
    fn read_usage(&mut self) -> Option<f32> {
        let times = match self.procfs.system_cpu() {
            Ok(times) => times,
            Err(err) => {
                debug!(%err, "system clock unreadable, skipping tick");
                return None;
            }
        };
        let used = times.used();
        let total = times.total();
        let used_delta = used.saturating_sub(self.prev_used);
        let total_delta = total.saturating_sub(self.prev_total);
        self.prev_used = used;
        self.prev_total = total;
        if total_delta == 0 {
            return None;
        }
        Some(100.0 * used_delta as f32 / total_delta as f32)
    }
}
