//! Capture and planning commands

use crate::capture::session::CaptureSession;
use crate::capture::state::CapturedStream;
use crate::capture::transport::DeviceTransport;
use crate::planning::pipeline::ReplayPipeline;
use crate::planning::planner::ReplayPlanner;
use crate::planning::types::ReplayPlan;
use crate::project::bundle::{read_manifest, read_raw_capture, write_bundle, write_raw_capture};
use crate::project::schema::{ReplayConfig, ReplayManifest};
use crate::utils::error::AppResult;
use std::future::Future;
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::oneshot;

/// Result of a capture that was planned and saved
#[derive(Debug)]
pub struct RecordOutcome {
    /// Bundle directory holding blobs, script and manifest
    pub bundle_dir: PathBuf,
    pub plan: ReplayPlan,
    /// Non-fatal problems hit during capture
    pub warnings: Vec<String>,
}

/// Capture through `capture` until `stop_signal` resolves, then plan the
/// replay and stage it through `staging`.
///
/// Passing a [`LocalTransport`](crate::capture::LocalTransport) as `staging`
/// writes the bundle without touching the device.
pub async fn record<F>(
    config: &ReplayConfig,
    capture: Arc<dyn DeviceTransport>,
    staging: Arc<dyn DeviceTransport>,
    stop_signal: F,
) -> AppResult<RecordOutcome>
where
    F: Future<Output = ()>,
{
    config.validate()?;
    let local_dir = config.resolve_local_dir()?;

    let mut session = CaptureSession::new(capture, config.capture_options(local_dir));
    session.start().await?;

    stop_signal.await;

    let stream = session.stop().await?;
    plan_capture(config, staging, &stream).await
}

/// Resolve once a line (or EOF) arrives on `input`, or on Ctrl-C.
///
/// The blocking read runs on a detached thread, so a pending read never
/// holds up runtime shutdown.
pub async fn wait_for_stop<R>(input: R)
where
    R: Read + Send + 'static,
{
    let (tx, rx) = oneshot::channel();
    std::thread::spawn(move || {
        let mut line = String::new();
        let _ = BufReader::new(input).read_line(&mut line);
        let _ = tx.send(());
    });

    tokio::select! {
        _ = rx => tracing::debug!("Stop requested from input"),
        _ = tokio::signal::ctrl_c() => tracing::debug!("Stop requested by interrupt"),
    }
}

/// Plan a frozen capture and write the bundle into its working directory
pub async fn plan_capture(
    config: &ReplayConfig,
    transport: Arc<dyn DeviceTransport>,
    stream: &CapturedStream,
) -> AppResult<RecordOutcome> {
    write_raw_capture(&stream.local_dir, &stream.bytes)?;

    let planner = ReplayPlanner::new(config.planner_options(stream.local_dir.clone()), transport);
    let pipeline = ReplayPipeline::new(config.boundary, config.groups_per_cluster, planner);
    let plan = pipeline.run(stream).await?;

    let manifest = ReplayManifest::new(config, stream, &plan);
    write_bundle(&stream.local_dir, &manifest, &plan.script)?;

    for warning in &stream.warnings {
        tracing::warn!("Capture finished with warning: {}", warning);
    }

    Ok(RecordOutcome {
        bundle_dir: stream.local_dir.clone(),
        plan,
        warnings: stream.warnings.clone(),
    })
}

/// Re-plan the capture saved in `source_bundle` with the current settings
pub async fn replan(
    config: &ReplayConfig,
    transport: Arc<dyn DeviceTransport>,
    source_bundle: &Path,
) -> AppResult<RecordOutcome> {
    config.validate()?;

    let bytes = read_raw_capture(source_bundle)?;
    let source = read_manifest(source_bundle)?;
    let local_dir = config.resolve_local_dir()?;

    tracing::info!(
        "Re-planning {} bytes captured at {} from {:?}",
        bytes.len(),
        source.capture_stopped_at,
        source_bundle
    );

    let stream = CapturedStream {
        bytes,
        started_at: source.capture_started_at,
        stopped_at: source.capture_stopped_at,
        local_dir,
        warnings: Vec::new(),
    };

    plan_capture(config, transport, &stream).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::time::Duration;

    /// Input that never produces a byte, like a terminal nobody types into
    struct SilentInput;

    impl Read for SilentInput {
        fn read(&mut self, _buf: &mut [u8]) -> std::io::Result<usize> {
            loop {
                std::thread::park();
            }
        }
    }

    #[tokio::test]
    async fn test_stop_on_enter() {
        let stopped = tokio::time::timeout(
            Duration::from_secs(5),
            wait_for_stop(Cursor::new(b"\n".to_vec())),
        )
        .await;
        assert!(stopped.is_ok());
    }

    #[tokio::test]
    async fn test_stop_on_closed_input() {
        let stopped = tokio::time::timeout(Duration::from_secs(5), wait_for_stop(Cursor::new(Vec::new()))).await;
        assert!(stopped.is_ok());
    }

    #[tokio::test]
    async fn test_pending_input_does_not_hold_shutdown() {
        // The runtime is dropped at the end of the test; a read owned by the
        // blocking pool would keep it waiting forever.
        let stopped = tokio::time::timeout(Duration::from_millis(100), wait_for_stop(SilentInput)).await;
        assert!(stopped.is_err());
    }
}
