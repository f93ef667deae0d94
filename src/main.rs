use std::thread;
use std::time::Duration;

use anyhow::Result;
use centinela::cli::{Cli, OutputFormat};
use centinela::monitor::CpuMonitor;
use centinela::output;
use centinela::procfs::Procfs;
use clap::Parser;
use tracing_subscriber::EnvFilter;

/// Initialize tracing subscriber for debug output
fn init_tracing(debug: bool) {
    if debug {
        tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::from_default_env().add_directive(tracing::Level::TRACE.into()),
            )
            .with_writer(std::io::stderr)
            .init();
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.debug);

    let procfs = match &cli.proc_root {
        Some(root) => {
            anyhow::ensure!(
                root.is_dir(),
                "proc root {} is not a directory",
                root.display()
            );
            Procfs::with_root(root)
        }
        None => Procfs::new(),
    };

    let mut monitor = CpuMonitor::new(procfs, cli.spike_policy());
    let interval = Duration::from_millis(cli.interval_ms);
    let mut ticks_done: u64 = 0;

    while cli.ticks.map_or(true, |limit| ticks_done < limit) {
        let outcome = monitor.tick();
        ticks_done += 1;

        if cli.memory {
            if let Some(free) = monitor.mem_free_percent() {
                eprintln!("free memory: {:.1}%", free);
            }
        }

        match cli.format {
            OutputFormat::Text => {
                for line in output::render_text(&outcome) {
                    println!("{}", line);
                }
            }
            OutputFormat::Json => {
                if let Some(json) = output::render_json(&outcome) {
                    println!("{}", json);
                }
            }
        }

        // Sleep only when another tick is coming.
        if cli.ticks.map_or(true, |limit| ticks_done < limit) {
            thread::sleep(interval);
        }
    }

    Ok(())
}
