use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use evreplay_lib::capture::{AdbTransport, DeviceTransport, LocalTransport};
use evreplay_lib::commands::{self, RecordOutcome};
use evreplay_lib::planning::BoundaryStrategy;
use evreplay_lib::project::ReplayConfig;
use evreplay_lib::utils::AppError;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

/// Record raw input events from an Android device and replay them.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    /// JSON configuration file
    #[arg(long, short, global = true, env = "EVREPLAY_CONFIG")]
    config: Option<PathBuf>,

    #[command(flatten)]
    overrides: Overrides,

    #[command(subcommand)]
    command: Command,
}

/// Settings that override the configuration file
#[derive(Args, Debug)]
struct Overrides {
    /// Path to adb
    #[arg(long, global = true, env = "ADB")]
    adb: Option<String>,

    /// Device serial
    #[arg(long, short, global = true, env = "ANDROID_SERIAL")]
    serial: Option<String>,

    /// Input node, e.g. /dev/input/event3
    #[arg(long, global = true)]
    device_node: Option<String>,

    /// Device directory for the blobs
    #[arg(long, global = true)]
    remote_dir: Option<String>,

    /// Local working directory
    #[arg(long, global = true)]
    local_dir: Option<PathBuf>,

    /// Target event groups per blob
    #[arg(long, global = true)]
    groups_per_cluster: Option<usize>,

    /// Split groups at pauses longer than this many milliseconds
    #[arg(long, global = true)]
    idle_gap_ms: Option<u64>,

    /// Do not append the synchronization-reset commands
    #[arg(long, global = true)]
    no_closing: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Capture until ENTER or Ctrl-C, then build and stage the replay
    Record {
        /// Write the bundle locally without pushing the blobs
        #[arg(long)]
        dry_run: bool,
    },

    /// Build a new replay from the capture saved in a bundle
    Plan {
        /// Bundle directory of an earlier capture
        from: PathBuf,

        /// Write the bundle locally without touching the device
        #[arg(long)]
        dry_run: bool,
    },

    /// Run a saved replay on the device
    Replay {
        /// Bundle directory
        bundle: PathBuf,

        /// Push the blobs again before replaying
        #[arg(long)]
        push: bool,
    },
}

impl Overrides {
    fn apply(self, config: &mut ReplayConfig) {
        if let Some(adb) = self.adb {
            config.adb_path = adb;
        }
        if self.serial.is_some() {
            config.device_serial = self.serial;
        }
        if let Some(node) = self.device_node {
            config.device_node = node;
        }
        if let Some(dir) = self.remote_dir {
            config.remote_dir = dir;
        }
        if self.local_dir.is_some() {
            config.local_dir = self.local_dir;
        }
        if let Some(n) = self.groups_per_cluster {
            config.groups_per_cluster = n;
        }
        if let Some(ms) = self.idle_gap_ms {
            config.boundary = BoundaryStrategy::IdleGap {
                gap_micros: ms * 1000,
            };
        }
        if self.no_closing {
            config.add_closing_commands = false;
        }
    }
}

async fn stop_requested() {
    eprintln!("Recording. Press ENTER (or Ctrl-C) to stop");
    commands::wait_for_stop(std::io::stdin()).await;

    // A second Ctrl-C while planning ends the process
    tokio::spawn(async {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("Interrupted");
            std::process::exit(130);
        }
    });
}

fn report(outcome: &RecordOutcome) {
    let summary = &outcome.plan.summary;
    println!(
        "{} records, {} groups, {} blobs, {} bytes",
        summary.record_count, summary.group_count, summary.cluster_count, summary.payload_bytes
    );
    println!("Bundle: {}", outcome.bundle_dir.display());
    for warning in &outcome.warnings {
        eprintln!("warning: {}", warning);
    }
}

/// Error code reported next to the message on failure
fn exit_reason(err: &anyhow::Error) -> &'static str {
    err.downcast_ref::<AppError>().map(AppError::code).unwrap_or("ERROR")
}

#[tokio::main]
async fn main() -> ExitCode {
    evreplay_lib::init_tracing();

    match run(Cli::parse()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error[{}]: {:#}", exit_reason(&err), err);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = match &cli.config {
        Some(path) => ReplayConfig::load(path)
            .with_context(|| format!("failed to load {}", path.display()))?,
        None => ReplayConfig::default(),
    };
    cli.overrides.apply(&mut config);

    let adb: Arc<dyn DeviceTransport> = Arc::new(AdbTransport::new(
        config.adb_path.clone(),
        config.device_serial.clone(),
    ));

    match cli.command {
        Command::Record { dry_run } => {
            let staging: Arc<dyn DeviceTransport> = if dry_run {
                Arc::new(LocalTransport)
            } else {
                Arc::clone(&adb)
            };
            let outcome = commands::record(&config, adb, staging, stop_requested()).await?;
            report(&outcome);
        }
        Command::Plan { from, dry_run } => {
            let transport: Arc<dyn DeviceTransport> = if dry_run {
                Arc::new(LocalTransport)
            } else {
                adb
            };
            let outcome = commands::replan(&config, transport, &from).await?;
            report(&outcome);
        }
        Command::Replay { bundle, push } => {
            let manifest = commands::replay(&bundle, adb.as_ref(), push).await?;
            println!(
                "Replayed {} blobs onto {}",
                manifest.summary.cluster_count, manifest.device_node
            );
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_accepts_dry_run() {
        let cli = Cli::try_parse_from(["evreplay", "--device-node", "/dev/input/event2", "record", "--dry-run"]).unwrap();
        assert!(matches!(cli.command, Command::Record { dry_run: true }));
        assert_eq!(cli.overrides.device_node.as_deref(), Some("/dev/input/event2"));

        let cli = Cli::try_parse_from(["evreplay", "record"]).unwrap();
        assert!(matches!(cli.command, Command::Record { dry_run: false }));
    }

    #[test]
    fn test_exit_reason_sees_through_context() {
        let err = Err::<(), _>(AppError::Config("deviceNode is required".to_string()))
            .context("failed to load evreplay.json")
            .unwrap_err();
        assert_eq!(exit_reason(&err), "CONFIG_ERROR");

        assert_eq!(exit_reason(&anyhow::anyhow!("other")), "ERROR");
    }
}
