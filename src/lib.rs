//! Centinela - CPU spike detection with top-process attribution
//!
//! This library watches system CPU usage through procfs, keeps rolling
//! baselines for the system and for every tracked process, and when usage
//! spikes above recent history it names the processes responsible. All
//! state is in-memory and tick-driven; the host supplies the timer.

pub mod attribution;
pub mod cli;
pub mod monitor;
pub mod output;
pub mod procfs;
pub mod spike;
pub mod table;
pub mod window;
