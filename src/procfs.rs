//! Procfs readers: system clock source, process directory scanner, liveness
//! probe and the free-memory reading.
//!
//! Everything goes through a [`Procfs`] handle with an overridable root so
//! tests and containerized hosts can point the detector at an alternate
//! mount. Failures here are never fatal to a caller: the clock source
//! returns a typed error meaning "no data this tick", and the scanner skips
//! any entry that vanishes or fails to parse mid-scan.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

/// OS process identifier.
pub type Pid = libc::pid_t;

/// Maximum numeric `/proc` entries examined per scan.
pub const SCAN_LIMIT: usize = 500;

/// Display names are clipped to this many characters.
pub const COMM_MAX: usize = 32;

/// System CPU accounting failures. Callers treat these as "skip this tick",
/// never as a crash.
#[derive(Debug, Error)]
pub enum ProcError {
    #[error("cannot read {path}: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("no parsable `cpu` line in {0}")]
    MalformedStat(PathBuf),
}

/// Cumulative system CPU time split into the seven accounting buckets of the
/// aggregate `cpu` line of `/proc/stat`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CpuTimes {
    pub user: u64,
    pub nice: u64,
    pub system: u64,
    pub idle: u64,
    pub iowait: u64,
    pub irq: u64,
    pub softirq: u64,
}

impl CpuTimes {
    /// Sum of all buckets: the monotonically non-decreasing system clock.
    pub fn total(&self) -> u64 {
        self.user + self.nice + self.system + self.idle + self.iowait + self.irq + self.softirq
    }

    /// Busy time only: user + nice + system.
    pub fn used(&self) -> u64 {
        self.user + self.nice + self.system
    }
}

/// One scanned process: identifier, cumulative CPU ticks (utime + stime) and
/// a clipped display name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessSample {
    pub pid: Pid,
    pub cpu_time: u64,
    pub name: String,
}

/// Handle on a procfs mount (default `/proc`).
#[derive(Debug, Clone)]
pub struct Procfs {
    root: PathBuf,
}

impl Default for Procfs {
    fn default() -> Self {
        Self::new()
    }
}

impl Procfs {
    pub fn new() -> Self {
        Self {
            root: PathBuf::from("/proc"),
        }
    }

    /// Point the readers at an alternate mount.
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Read the system-wide cumulative CPU time.
    pub fn system_cpu(&self) -> Result<CpuTimes, ProcError> {
        let path = self.root.join("stat");
        let raw = fs::read_to_string(&path).map_err(|source| ProcError::Unreadable {
            path: path.clone(),
            source,
        })?;
        raw.lines()
            .find(|line| line.starts_with("cpu "))
            .and_then(parse_cpu_line)
            .ok_or(ProcError::MalformedStat(path))
    }

    /// Lazily enumerate running processes, capped at [`SCAN_LIMIT`] numeric
    /// directory entries.
    ///
    /// The iterator is finite and must be re-created each tick. Entries that
    /// disappear between the directory listing and the stat read (a race
    /// with process exit) are skipped silently.
    pub fn scan(&self) -> ScanIter {
        ScanIter {
            entries: fs::read_dir(&self.root).ok(),
            root: self.root.clone(),
            scanned: 0,
        }
    }

    /// Whether `pid` still resolves to a live process under this mount.
    pub fn is_alive(&self, pid: Pid) -> bool {
        self.root.join(pid.to_string()).join("stat").exists()
    }

    /// Free physical memory as a percentage of total, from `meminfo`.
    /// `None` when the file is missing or malformed.
    pub fn mem_free_percent(&self) -> Option<f32> {
        let raw = fs::read_to_string(self.root.join("meminfo")).ok()?;
        let mut free = None;
        let mut total = None;
        for line in raw.lines() {
            if let Some(rest) = line.strip_prefix("MemTotal:") {
                total = parse_meminfo_kb(rest);
            } else if let Some(rest) = line.strip_prefix("MemFree:") {
                free = parse_meminfo_kb(rest);
            }
            if free.is_some() && total.is_some() {
                break;
            }
        }
        match (free, total) {
            (Some(free), Some(total)) if total > 0 => Some(free as f32 * 100.0 / total as f32),
            _ => None,
        }
    }
}

/// Scanner over the numeric entries of a procfs root.
pub struct ScanIter {
    entries: Option<fs::ReadDir>,
    root: PathBuf,
    scanned: usize,
}

impl Iterator for ScanIter {
    type Item = ProcessSample;

    fn next(&mut self) -> Option<ProcessSample> {
        let entries = self.entries.as_mut()?;
        loop {
            if self.scanned >= SCAN_LIMIT {
                return None;
            }
            let entry = match entries.next() {
                Some(Ok(entry)) => entry,
                Some(Err(_)) => continue,
                None => return None,
            };
            let name = entry.file_name();
            let Some(pid) = name.to_str().and_then(|s| s.parse::<Pid>().ok()) else {
                continue;
            };
            if pid <= 0 {
                continue;
            }
            self.scanned += 1;
            match read_process(&self.root, pid) {
                Some(sample) => return Some(sample),
                None => {
                    debug!(pid, "skipping unreadable process entry");
                    continue;
                }
            }
        }
    }
}

fn read_process(root: &Path, pid: Pid) -> Option<ProcessSample> {
    let stat = fs::read_to_string(root.join(pid.to_string()).join("stat")).ok()?;
    let (stat_comm, cpu_time) = parse_stat_line(&stat)?;
    let name = match fs::read_to_string(root.join(pid.to_string()).join("comm")) {
        Ok(comm) => clip_name(comm.trim_end()),
        Err(_) => clip_name(&stat_comm),
    };
    Some(ProcessSample {
        pid,
        cpu_time,
        name,
    })
}

/// Parse a `/proc/<pid>/stat` line into `(comm, utime + stime)`.
///
/// The comm field is parenthesized and may itself contain spaces or parens,
/// so fields are counted from the last `)`; utime and stime are fields 14
/// and 15 per procfs(5).
pub fn parse_stat_line(line: &str) -> Option<(String, u64)> {
    let open = line.find('(')?;
    let close = line.rfind(')')?;
    if close <= open {
        return None;
    }
    let comm = line[open + 1..close].to_string();
    let rest: Vec<&str> = line[close + 1..].split_whitespace().collect();
    // rest[0] is the state (field 3), so utime/stime land at offsets 11/12.
    let utime: u64 = rest.get(11)?.parse().ok()?;
    let stime: u64 = rest.get(12)?.parse().ok()?;
    Some((comm, utime.saturating_add(stime)))
}

/// Parse the aggregate `cpu` line of `/proc/stat`. Newer kernels append
/// steal/guest buckets; anything past softirq is ignored.
pub fn parse_cpu_line(line: &str) -> Option<CpuTimes> {
    let mut fields = line.split_whitespace();
    if fields.next()? != "cpu" {
        return None;
    }
    let mut bucket = || fields.next().and_then(|f| f.parse::<u64>().ok());
    Some(CpuTimes {
        user: bucket()?,
        nice: bucket()?,
        system: bucket()?,
        idle: bucket()?,
        iowait: bucket()?,
        irq: bucket()?,
        softirq: bucket()?,
    })
}

fn parse_meminfo_kb(rest: &str) -> Option<u64> {
    rest.split_whitespace().next()?.parse().ok()
}

fn clip_name(name: &str) -> String {
    name.chars().take(COMM_MAX).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    fn write_process(root: &Path, pid: Pid, comm: &str, utime: u64, stime: u64) {
        let dir = root.join(pid.to_string());
        fs::create_dir_all(&dir).unwrap();
        let stat = format!(
            "{pid} ({comm}) S 1 {pid} {pid} 0 -1 4194304 120 0 0 0 {utime} {stime} 0 0 20 0 1 0 \
             400 10000000 500 18446744073709551615 1 1 0 0 0 0 0 0 0 0 0 0 17 0 0 0 0 0 0"
        );
        fs::write(dir.join("stat"), stat).unwrap();
        fs::write(dir.join("comm"), format!("{comm}\n")).unwrap();
    }

    #[test]
    fn test_parse_stat_line_reads_utime_plus_stime() {
        let line = "42 (worker) S 1 42 42 0 -1 4194304 120 0 0 0 150 50 0 0 20 0 1 0 400 \
                    10000000 500 18446744073709551615 1 1 0 0 0 0 0 0 0 0 0 0 17 0 0 0 0 0 0";
        let (comm, time) = parse_stat_line(line).unwrap();
        assert_eq!(comm, "worker");
        assert_eq!(time, 200);
    }

    #[test]
    fn test_parse_stat_line_comm_with_spaces_and_parens() {
        let line = "7 (tmux: server (1)) S 1 7 7 0 -1 4194304 0 0 0 0 9 1 0 0 20 0 1 0 400 \
                    10000000 500 18446744073709551615 1 1 0 0 0 0 0 0 0 0 0 0 17 0 0 0 0 0 0";
        let (comm, time) = parse_stat_line(line).unwrap();
        assert_eq!(comm, "tmux: server (1)");
        assert_eq!(time, 10);
    }

    #[test]
    fn test_parse_stat_line_rejects_truncated_input() {
        assert!(parse_stat_line("42 (worker) S 1 42").is_none());
        assert!(parse_stat_line("garbage").is_none());
        assert!(parse_stat_line("").is_none());
    }

    #[test]
    fn test_parse_cpu_line_seven_buckets() {
        let times = parse_cpu_line("cpu  100 5 50 800 20 3 2").unwrap();
        assert_eq!(times.used(), 155);
        assert_eq!(times.total(), 980);
    }

    #[test]
    fn test_parse_cpu_line_ignores_trailing_buckets() {
        let times = parse_cpu_line("cpu 100 5 50 800 20 3 2 7 0 0").unwrap();
        assert_eq!(times.total(), 980);
    }

    #[test]
    fn test_parse_cpu_line_rejects_per_core_lines() {
        assert!(parse_cpu_line("cpu0 100 5 50 800 20 3 2").is_none());
        assert!(parse_cpu_line("intr 12345").is_none());
    }

    #[test]
    fn test_clip_name_bounds_length() {
        let long = "x".repeat(100);
        assert_eq!(clip_name(&long).len(), COMM_MAX);
        assert_eq!(clip_name("short"), "short");
    }

    #[test]
    fn test_system_cpu_missing_stat_is_error() {
        let temp = TempDir::new().unwrap();
        let procfs = Procfs::with_root(temp.path());
        assert!(procfs.system_cpu().is_err());
    }

    #[test]
    fn test_system_cpu_reads_fake_root() {
        let temp = TempDir::new().unwrap();
        fs::write(
            temp.path().join("stat"),
            "cpu  100 0 100 800 0 0 0 0 0 0\ncpu0 100 0 100 800 0 0 0 0 0 0\n",
        )
        .unwrap();
        let procfs = Procfs::with_root(temp.path());
        let times = procfs.system_cpu().unwrap();
        assert_eq!(times.total(), 1000);
        assert_eq!(times.used(), 200);
    }

    #[test]
    fn test_scan_yields_numeric_entries_only() {
        let temp = TempDir::new().unwrap();
        write_process(temp.path(), 10, "alpha", 5, 5);
        write_process(temp.path(), 20, "beta", 7, 3);
        fs::create_dir_all(temp.path().join("sys")).unwrap();
        fs::write(temp.path().join("uptime"), "1 1").unwrap();

        let procfs = Procfs::with_root(temp.path());
        let mut samples: Vec<ProcessSample> = procfs.scan().collect();
        samples.sort_by_key(|s| s.pid);
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[0].pid, 10);
        assert_eq!(samples[0].name, "alpha");
        assert_eq!(samples[0].cpu_time, 10);
        assert_eq!(samples[1].pid, 20);
        assert_eq!(samples[1].cpu_time, 10);
    }

    #[test]
    fn test_scan_skips_malformed_stat() {
        let temp = TempDir::new().unwrap();
        write_process(temp.path(), 10, "ok", 1, 1);
        let broken = temp.path().join("30");
        fs::create_dir_all(&broken).unwrap();
        fs::write(broken.join("stat"), "not a stat line").unwrap();

        let procfs = Procfs::with_root(temp.path());
        let samples: Vec<ProcessSample> = procfs.scan().collect();
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].pid, 10);
    }

    #[test]
    fn test_scan_falls_back_to_stat_comm() {
        let temp = TempDir::new().unwrap();
        write_process(temp.path(), 10, "named", 1, 1);
        fs::remove_file(temp.path().join("10").join("comm")).unwrap();

        let procfs = Procfs::with_root(temp.path());
        let samples: Vec<ProcessSample> = procfs.scan().collect();
        assert_eq!(samples[0].name, "named");
    }

    #[test]
    fn test_is_alive_tracks_stat_presence() {
        let temp = TempDir::new().unwrap();
        write_process(temp.path(), 10, "alive", 0, 0);
        let procfs = Procfs::with_root(temp.path());
        assert!(procfs.is_alive(10));
        assert!(!procfs.is_alive(11));
        fs::remove_dir_all(temp.path().join("10")).unwrap();
        assert!(!procfs.is_alive(10));
    }

    #[test]
    fn test_mem_free_percent() {
        let temp = TempDir::new().unwrap();
        fs::write(
            temp.path().join("meminfo"),
            "MemTotal:       16000000 kB\nMemFree:         4000000 kB\nMemAvailable:    8000000 kB\n",
        )
        .unwrap();
        let procfs = Procfs::with_root(temp.path());
        let free = procfs.mem_free_percent().unwrap();
        assert!((free - 25.0).abs() < 1e-3);
    }

    #[test]
    fn test_mem_free_percent_missing_file() {
        let temp = TempDir::new().unwrap();
        let procfs = Procfs::with_root(temp.path());
        assert!(procfs.mem_free_percent().is_none());
    }
}
