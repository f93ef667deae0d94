//! Report rendering
//!
//! The core returns plain data; this module turns a [`TickOutcome`] into
//! log-style text lines, or one JSON object per reporting tick for machine
//! consumers. Quiet ticks render to nothing in both formats.

use crate::attribution::TopReport;
use crate::monitor::TickOutcome;
use crate::spike::SpikeEvent;

/// Render the outcome as log-style text lines.
pub fn render_text(outcome: &TickOutcome) -> Vec<String> {
    let mut lines = Vec::new();
    if let Some(report) = &outcome.refresh_report {
        push_report(&mut lines, report);
    }
    if let Some(spike) = &outcome.spike {
        lines.push(spike_line(spike));
    }
    if let Some(report) = &outcome.spike_report {
        push_report(&mut lines, report);
    }
    lines
}

/// Render the outcome as one JSON object, or `None` for a quiet tick.
pub fn render_json(outcome: &TickOutcome) -> Option<String> {
    if outcome.is_quiet() {
        return None;
    }
    serde_json::to_string(outcome).ok()
}

fn spike_line(spike: &SpikeEvent) -> String {
    format!(
        "CPU spike detected: usage={:.1}% (avg={:.1}%, {:.1}x above avg)",
        spike.usage, spike.average, spike.ratio
    )
}

fn push_report(lines: &mut Vec<String>, report: &TopReport) {
    lines.push("Top CPU processes:".to_string());
    for entry in &report.entries {
        let line = match (entry.baseline, entry.ratio()) {
            (Some(avg), Some(ratio)) => format!(
                "  PID {} ({}): {:.1}% (avg={:.2}%, {:.1}x above avg)",
                entry.pid, entry.name, entry.cpu_percent, avg, ratio
            ),
            _ => format!(
                "  PID {} ({}): {:.1}% (new)",
                entry.pid, entry.name, entry.cpu_percent
            ),
        };
        lines.push(line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attribution::{ReportEntry, TopReport};
    use crate::monitor::TickOutcome;
    use crate::spike::SpikeEvent;

    fn sample_outcome() -> TickOutcome {
        TickOutcome {
            system_usage: Some(42.0),
            refresh_report: None,
            spike: Some(SpikeEvent {
                usage: 42.0,
                average: 12.0,
                ratio: 3.5,
            }),
            spike_report: Some(TopReport {
                spike_mode: true,
                entries: vec![
                    ReportEntry {
                        pid: 100,
                        name: "ffmpeg".to_string(),
                        cpu_percent: 31.0,
                        baseline: Some(10.0),
                    },
                    ReportEntry {
                        pid: 200,
                        name: "indexer".to_string(),
                        cpu_percent: 8.0,
                        baseline: None,
                    },
                ],
            }),
        }
    }

    #[test]
    fn test_text_lines_shapes() {
        let lines = render_text(&sample_outcome());
        assert_eq!(
            lines[0],
            "CPU spike detected: usage=42.0% (avg=12.0%, 3.5x above avg)"
        );
        assert_eq!(lines[1], "Top CPU processes:");
        assert_eq!(lines[2], "  PID 100 (ffmpeg): 31.0% (avg=10.00%, 3.1x above avg)");
        assert_eq!(lines[3], "  PID 200 (indexer): 8.0% (new)");
    }

    #[test]
    fn test_quiet_tick_renders_nothing() {
        let outcome = TickOutcome {
            system_usage: Some(3.0),
            ..TickOutcome::default()
        };
        assert!(render_text(&outcome).is_empty());
        assert!(render_json(&outcome).is_none());
    }

    #[test]
    fn test_json_contains_report_fields() {
        let json = render_json(&sample_outcome()).unwrap();
        assert!(json.contains("\"spike\""));
        assert!(json.contains("\"ffmpeg\""));
        assert!(json.contains("\"spike_mode\":true"));
    }
}
