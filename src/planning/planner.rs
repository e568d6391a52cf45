//! Replay planning
//!
//! Turns clusters into blobs on disk, pushes them to the device and builds the
//! script that writes them back onto the input node with `dd`.

use super::types::{Cluster, PlanError, PlanResult, PlanSummary, PlannedBlob, ReplayPlan};
use crate::capture::transport::DeviceTransport;
use std::path::PathBuf;
use std::sync::Arc;

/// Synchronization-reset event triples (type, code, value) releasing held state
const CLOSING_EVENTS: [(u16, u16, i32); 3] = [(0, 0, 0), (0, 2, 0), (0, 0, 0)];

/// Planner settings
#[derive(Debug, Clone)]
pub struct PlannerOptions {
    /// Input node the script writes to
    pub device_node: String,

    /// Local directory receiving `<index>.bin`
    pub local_dir: PathBuf,

    /// Device directory the blobs are pushed into
    pub remote_dir: String,

    /// Append the synchronization-reset commands
    pub add_closing_commands: bool,

    /// Prepended to the joined command list
    pub elevation_prefix: String,
}

/// Device path of the blob for cluster `index`
pub fn remote_blob_path(remote_dir: &str, index: usize) -> String {
    format!("{}/{}.bin", remote_dir.trim_end_matches('/'), index)
}

/// `dd` command copying a pushed blob onto the input node
pub fn dd_command(byte_len: usize, remote_path: &str, device_node: &str) -> String {
    format!("dd bs={} if={} of={}", byte_len, remote_path, device_node)
}

/// The synchronization-reset commands for `device_node`
pub fn closing_commands(device_node: &str) -> Vec<String> {
    CLOSING_EVENTS
        .iter()
        .map(|(event_type, code, value)| format!("sendevent {} {} {} {}", device_node, event_type, code, value))
        .collect()
}

/// Join the commands and prepend the elevation prefix
pub fn assemble_script(elevation_prefix: &str, commands: &[String]) -> Vec<u8> {
    let mut script = elevation_prefix.as_bytes().to_vec();
    script.extend_from_slice(commands.join("\n").as_bytes());
    script
}

/// Writes, transfers and scripts a set of clusters
pub struct ReplayPlanner {
    options: PlannerOptions,
    transport: Arc<dyn DeviceTransport>,
}

impl ReplayPlanner {
    pub fn new(options: PlannerOptions, transport: Arc<dyn DeviceTransport>) -> Self {
        Self { options, transport }
    }

    pub fn options(&self) -> &PlannerOptions {
        &self.options
    }

    /// Build the plan.
    ///
    /// A failed remote mkdir is only logged, since the push that follows
    /// reports the real problem. A failed blob write or push aborts planning.
    pub async fn plan(&self, clusters: &[Cluster]) -> PlanResult<ReplayPlan> {
        let opts = &self.options;

        tokio::fs::create_dir_all(&opts.local_dir)
            .await
            .map_err(|source| PlanError::BlobWrite {
                path: opts.local_dir.clone(),
                source,
            })?;

        if !clusters.is_empty() {
            if let Err(e) = self.transport.make_remote_dir(&opts.remote_dir).await {
                tracing::warn!("Could not create {} on device: {}", opts.remote_dir, e);
            }
        }

        let mut plan = ReplayPlan::default();

        for cluster in clusters {
            let blob = cluster.blob();
            let local_path = opts.local_dir.join(format!("{}.bin", cluster.index));

            tokio::fs::write(&local_path, &blob)
                .await
                .map_err(|source| PlanError::BlobWrite {
                    path: local_path.clone(),
                    source,
                })?;

            self.transport
                .push(&local_path, &opts.remote_dir)
                .await
                .map_err(|source| PlanError::Transfer {
                    path: local_path.clone(),
                    source,
                })?;

            let remote_path = remote_blob_path(&opts.remote_dir, cluster.index);
            let command = dd_command(blob.len(), &remote_path, &opts.device_node);

            tracing::debug!(
                "Cluster {}: {} groups, {} bytes -> {}",
                cluster.index,
                cluster.groups.len(),
                blob.len(),
                remote_path
            );

            plan.summary.record_count += cluster.record_count();
            plan.summary.group_count += cluster.groups.len();
            plan.commands.push(command.clone());
            plan.blobs.push(PlannedBlob {
                local_path,
                remote_path,
                byte_len: blob.len(),
                command,
            });
            plan.payload.extend_from_slice(&blob);
        }

        if opts.add_closing_commands {
            plan.commands.extend(closing_commands(&opts.device_node));
        }

        plan.script = assemble_script(&opts.elevation_prefix, &plan.commands);
        plan.summary = PlanSummary {
            cluster_count: plan.blobs.len(),
            payload_bytes: plan.payload.len(),
            ..plan.summary
        };

        tracing::info!(
            "Planned {} blobs ({} bytes, {} commands)",
            plan.summary.cluster_count,
            plan.summary.payload_bytes,
            plan.commands.len()
        );

        Ok(plan)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::transport::{TransportError, TransportResult};
    use crate::events::DecodedRecord;
    use crate::planning::types::EventGroup;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::path::Path;
    use tokio::process::Command;

    #[derive(Default)]
    struct RecordingTransport {
        pushed: Mutex<Vec<(PathBuf, String)>>,
        dirs: Mutex<Vec<String>>,
        fail_push: bool,
    }

    #[async_trait]
    impl DeviceTransport for RecordingTransport {
        fn stream_command(&self, _device_node: &str) -> Command {
            Command::new("true")
        }

        async fn make_remote_dir(&self, dir: &str) -> TransportResult<()> {
            self.dirs.lock().push(dir.to_string());
            Ok(())
        }

        async fn push(&self, local: &Path, remote_dir: &str) -> TransportResult<()> {
            if self.fail_push {
                return Err(TransportError::Io(std::io::Error::new(
                    std::io::ErrorKind::BrokenPipe,
                    "device gone",
                )));
            }
            self.pushed.lock().push((local.to_path_buf(), remote_dir.to_string()));
            Ok(())
        }

        async fn run_script(&self, _script: &[u8]) -> TransportResult<()> {
            Ok(())
        }
    }

    fn options(local_dir: PathBuf, closing: bool) -> PlannerOptions {
        PlannerOptions {
            device_node: "/dev/input/event2".to_string(),
            local_dir,
            remote_dir: "/data/local/tmp/replay/".to_string(),
            add_closing_commands: closing,
            elevation_prefix: "su -- ".to_string(),
        }
    }

    fn cluster(index: usize, frames: usize) -> Cluster {
        let records = (0..frames)
            .map(|i| DecodedRecord::from_frame(DecodedRecord::encode(index as i64, i as i64, 3, 0x35, i as i32)))
            .collect();
        Cluster {
            index,
            groups: vec![EventGroup::new(records)],
        }
    }

    #[test]
    fn test_command_shapes() {
        assert_eq!(remote_blob_path("/sdcard/x/", 3), "/sdcard/x/3.bin");
        assert_eq!(remote_blob_path("/sdcard/x", 0), "/sdcard/x/0.bin");
        assert_eq!(
            dd_command(48, "/sdcard/x/0.bin", "/dev/input/event1"),
            "dd bs=48 if=/sdcard/x/0.bin of=/dev/input/event1"
        );
        assert_eq!(
            closing_commands("/dev/input/event1"),
            vec![
                "sendevent /dev/input/event1 0 0 0",
                "sendevent /dev/input/event1 0 2 0",
                "sendevent /dev/input/event1 0 0 0",
            ]
        );
        assert_eq!(assemble_script("su -- ", &["a".to_string(), "b".to_string()]), b"su -- a\nb".to_vec());
    }

    #[tokio::test]
    async fn test_plan_writes_and_pushes_each_cluster() {
        let dir = tempfile::tempdir().unwrap();
        let transport = Arc::new(RecordingTransport::default());
        let planner = ReplayPlanner::new(options(dir.path().to_path_buf(), true), transport.clone());

        let clusters = vec![cluster(0, 2), cluster(1, 3)];
        let plan = planner.plan(&clusters).await.unwrap();

        assert_eq!(plan.blobs.len(), 2);
        assert_eq!(std::fs::read(dir.path().join("0.bin")).unwrap(), clusters[0].blob());
        assert_eq!(std::fs::read(dir.path().join("1.bin")).unwrap(), clusters[1].blob());
        assert_eq!(plan.blobs[1].byte_len, 72);
        assert_eq!(
            plan.blobs[1].command,
            "dd bs=72 if=/data/local/tmp/replay/1.bin of=/dev/input/event2"
        );

        let expected_payload: Vec<u8> = clusters.iter().flat_map(Cluster::blob).collect();
        assert_eq!(plan.payload, expected_payload);
        assert_eq!(plan.summary.record_count, 5);
        assert_eq!(plan.summary.cluster_count, 2);
        assert_eq!(plan.summary.payload_bytes, 120);

        assert_eq!(*transport.dirs.lock(), vec!["/data/local/tmp/replay/".to_string()]);
        assert_eq!(transport.pushed.lock().len(), 2);

        let script = plan.script_text();
        assert!(script.starts_with("su -- dd bs=48 "));
        let lines: Vec<&str> = script.lines().collect();
        assert_eq!(lines.len(), 5);
        assert_eq!(lines[4], "sendevent /dev/input/event2 0 0 0");
        assert_eq!(lines[3], "sendevent /dev/input/event2 0 2 0");
    }

    #[tokio::test]
    async fn test_no_closing_commands() {
        let dir = tempfile::tempdir().unwrap();
        let planner = ReplayPlanner::new(
            options(dir.path().to_path_buf(), false),
            Arc::new(RecordingTransport::default()),
        );

        let plan = planner.plan(&[cluster(0, 1)]).await.unwrap();
        assert!(!plan.script_text().contains("sendevent"));
        assert_eq!(plan.commands.len(), 1);
    }

    #[tokio::test]
    async fn test_empty_plan_still_closes() {
        let dir = tempfile::tempdir().unwrap();
        let transport = Arc::new(RecordingTransport::default());
        let planner = ReplayPlanner::new(options(dir.path().to_path_buf(), true), transport.clone());

        let plan = planner.plan(&[]).await.unwrap();
        assert!(plan.blobs.is_empty());
        assert!(plan.payload.is_empty());
        assert_eq!(plan.commands.len(), 3);
        assert!(transport.dirs.lock().is_empty());
    }

    #[tokio::test]
    async fn test_push_failure_aborts() {
        let dir = tempfile::tempdir().unwrap();
        let transport = Arc::new(RecordingTransport {
            fail_push: true,
            ..Default::default()
        });
        let planner = ReplayPlanner::new(options(dir.path().to_path_buf(), true), transport);

        let err = planner.plan(&[cluster(0, 1), cluster(1, 1)]).await.unwrap_err();
        match err {
            PlanError::Transfer { path, .. } => assert_eq!(path, dir.path().join("0.bin")),
            other => panic!("unexpected error: {}", other),
        }
        assert!(!dir.path().join("1.bin").exists());
    }
}
