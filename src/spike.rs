//! System-wide rolling baseline and spike policy
//!
//! The detector keeps the most recent [`SYSTEM_WINDOW`] system usage
//! readings and declares a spike when the current reading clears both a
//! relative threshold against its own rolling mean and an absolute floor.
//! The dual condition keeps near-idle machines from flagging every scheduler
//! hiccup: at 1% baseline a 3% blip is a huge ratio but not a spike.

use serde::Serialize;

use crate::window::RollingWindow;

/// System usage ring length.
pub const SYSTEM_WINDOW: usize = 60;

/// Readings required before spike detection arms itself.
pub const SPIKE_MIN_SAMPLES: usize = 10;

/// Default relative threshold: current > ratio x rolling mean.
pub const SPIKE_RATIO: f32 = 1.5;

/// Default absolute floor, in percent.
pub const SPIKE_FLOOR: f32 = 10.0;

/// Per-process spike classification multiplier. Declared for parity with
/// the system threshold, but candidate selection during a spike compares a
/// process against its raw pre-update average, not average times this.
pub const PROC_SPIKE_RATIO: f32 = 2.0;

/// Attribution refresh cadence, in ticks.
pub const REFRESH_INTERVAL: u64 = 10;

/// A declared system CPU spike.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct SpikeEvent {
    /// Usage reading that tripped the detector, in percent.
    pub usage: f32,
    /// Rolling mean at the time of detection.
    pub average: f32,
    /// `usage / average`.
    pub ratio: f32,
}

/// What one baseline observation asks of the caller.
#[derive(Debug, Clone, Copy)]
pub struct TickDecision {
    /// The periodic (non-spike) attribution pass is due this tick.
    pub refresh_due: bool,
    /// The reading crossed the spike thresholds.
    pub spike: Option<SpikeEvent>,
}

/// Tunable spike thresholds.
#[derive(Debug, Clone, Copy)]
pub struct SpikePolicy {
    pub ratio: f32,
    pub floor: f32,
}

impl Default for SpikePolicy {
    fn default() -> Self {
        Self {
            ratio: SPIKE_RATIO,
            floor: SPIKE_FLOOR,
        }
    }
}

/// Rolling system baseline plus the tick counter driving the refresh
/// cadence. Process-lifetime state; reset only by dropping the detector.
#[derive(Debug)]
pub struct SystemBaseline {
    window: RollingWindow,
    policy: SpikePolicy,
    ticks: u64,
}

impl SystemBaseline {
    pub fn new(policy: SpikePolicy) -> Self {
        Self {
            window: RollingWindow::new(SYSTEM_WINDOW),
            policy,
            ticks: 0,
        }
    }

    /// Ticks observed since initialization.
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Current rolling mean.
    pub fn mean(&self) -> f32 {
        self.window.mean()
    }

    /// Fold one system usage reading into the baseline and decide what the
    /// tick owes. The reading lands in the ring first; the spike test then
    /// runs against the updated mean.
    pub fn observe(&mut self, usage: f32) -> TickDecision {
        self.ticks += 1;
        self.window.push(usage);
        let mean = self.window.mean();
        let spike = if self.window.len() >= SPIKE_MIN_SAMPLES
            && usage > mean * self.policy.ratio
            && usage > self.policy.floor
        {
            Some(SpikeEvent {
                usage,
                average: mean,
                ratio: usage / mean,
            })
        } else {
            None
        };
        TickDecision {
            refresh_due: self.ticks % REFRESH_INTERVAL == 0,
            spike,
        }
    }
}
