//! Device transport
//!
//! Everything that talks to the device goes through [`DeviceTransport`]:
//! the privileged raw read that feeds a capture, and the mkdir/push/shell
//! calls used when staging and running a replay.

use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// Transport errors
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Failed to start `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{command}` exited with {status}: {stderr}")]
    CommandFailed {
        command: String,
        status: std::process::ExitStatus,
        stderr: String,
    },

    #[error("Not supported by this transport: {0}")]
    Unsupported(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for transport operations
pub type TransportResult<T> = Result<T, TransportError>;

/// A link to one device
#[async_trait]
pub trait DeviceTransport: Send + Sync {
    /// Command whose stdout is the raw byte stream of `device_node`
    fn stream_command(&self, device_node: &str) -> Command;

    /// Create `dir` on the device, parents included
    async fn make_remote_dir(&self, dir: &str) -> TransportResult<()>;

    /// Copy a local file into `remote_dir`, keeping its file name
    async fn push(&self, local: &Path, remote_dir: &str) -> TransportResult<()>;

    /// Run a script in a device shell
    async fn run_script(&self, script: &[u8]) -> TransportResult<()>;
}

/// Transport over the `adb` command line tool
#[derive(Debug, Clone)]
pub struct AdbTransport {
    adb_path: String,
    serial: Option<String>,
}

impl AdbTransport {
    /// Create a transport for `serial`, or the only attached device when `None`
    pub fn new(adb_path: impl Into<String>, serial: Option<String>) -> Self {
        Self {
            adb_path: adb_path.into(),
            serial,
        }
    }

    /// `adb` invocation with the device selector applied
    fn adb(&self) -> Command {
        let mut command = Command::new(&self.adb_path);
        if let Some(serial) = &self.serial {
            command.args(["-s", serial.as_str()]);
        }
        command
    }

    fn describe(&self, args: &[&str]) -> String {
        let mut parts = vec![self.adb_path.as_str()];
        if let Some(serial) = &self.serial {
            parts.extend(["-s", serial.as_str()]);
        }
        parts.extend_from_slice(args);
        parts.join(" ")
    }

    /// Feed `input` to `adb shell` on stdin and wait for it to finish
    async fn shell_stdin(&self, input: &[u8]) -> TransportResult<()> {
        let description = self.describe(&["shell"]);
        let mut child = self
            .adb()
            .arg("shell")
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| TransportError::Spawn {
                command: description.clone(),
                source,
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(input).await?;
            stdin.write_all(b"\nexit\n").await?;
            stdin.shutdown().await?;
        }

        let output = child.wait_with_output().await?;
        check_status(description, output)
    }
}

fn check_status(command: String, output: std::process::Output) -> TransportResult<()> {
    if output.status.success() {
        Ok(())
    } else {
        Err(TransportError::CommandFailed {
            command,
            status: output.status,
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }
}

#[async_trait]
impl DeviceTransport for AdbTransport {
    fn stream_command(&self, device_node: &str) -> Command {
        let mut command = self.adb();
        command.args(["shell", "su", "--", "cat", device_node]);
        command
    }

    async fn make_remote_dir(&self, dir: &str) -> TransportResult<()> {
        tracing::debug!("Creating remote directory {}", dir);
        self.shell_stdin(format!("mkdir -p {}", dir).as_bytes()).await
    }

    async fn push(&self, local: &Path, remote_dir: &str) -> TransportResult<()> {
        let local_str = local.to_string_lossy();
        let description = self.describe(&["push", &*local_str, remote_dir]);

        let output = self
            .adb()
            .arg("push")
            .arg(local)
            .arg(remote_dir)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|source| TransportError::Spawn {
                command: description.clone(),
                source,
            })?;

        check_status(description, output)
    }

    async fn run_script(&self, script: &[u8]) -> TransportResult<()> {
        tracing::info!("Running {} byte replay script on device", script.len());
        self.shell_stdin(script).await
    }
}

/// Transport without a device.
///
/// The "device node" is a local file or FIFO that is streamed with `cat`, and
/// staging is skipped. Used for offline planning and dry runs.
#[derive(Debug, Clone, Default)]
pub struct LocalTransport;

#[async_trait]
impl DeviceTransport for LocalTransport {
    fn stream_command(&self, device_node: &str) -> Command {
        let mut command = Command::new("cat");
        command.arg(device_node);
        command
    }

    async fn make_remote_dir(&self, dir: &str) -> TransportResult<()> {
        tracing::debug!("Offline: skipping mkdir {}", dir);
        Ok(())
    }

    async fn push(&self, local: &Path, remote_dir: &str) -> TransportResult<()> {
        tracing::debug!("Offline: skipping push of {:?} to {}", local, remote_dir);
        Ok(())
    }

    async fn run_script(&self, _script: &[u8]) -> TransportResult<()> {
        Err(TransportError::Unsupported(
            "replay needs a device transport".to_string(),
        ))
    }
}
