//! Capture session
//!
//! Owns the upstream read of a raw input node: a child process streaming the
//! node's bytes, and a reader task appending them to a buffer. The stream has
//! no end marker, so a session only ends when [`CaptureSession::stop`] is
//! called. Stopping kills the process, which closes the pipe, then joins the
//! reader with a bounded timeout and aborts it if it is still alive. The
//! buffer is frozen only after the reader is gone. A process that already
//! exited with a failure is reported as a warning carrying its stderr tail.

use super::state::{CaptureOptions, CaptureState, CapturedStream};
use super::transport::{DeviceTransport, TransportError};
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use std::process::Stdio;
use std::sync::Arc;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Child;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

const READ_CHUNK: usize = 4096;

/// Bytes of upstream stderr kept for failure reports
const STDERR_TAIL: usize = 2048;

/// Capture errors
#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("Capture already started")]
    AlreadyRecording,

    #[error("No capture in progress")]
    NotRecording,

    #[error("Upstream process has no stdout")]
    NoStream,

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for capture operations
pub type CaptureResult<T> = Result<T, CaptureError>;

/// Events emitted during a capture
#[derive(Debug, Clone)]
pub enum CaptureEvent {
    Started,
    Stopped { bytes: usize },
    Warning(String),
}

/// A single capture of one input node
pub struct CaptureSession {
    state: Arc<RwLock<CaptureState>>,
    transport: Arc<dyn DeviceTransport>,
    options: CaptureOptions,

    /// Upstream process
    child: Option<Child>,

    /// Reader task, the buffer's only writer
    reader: Option<JoinHandle<u64>>,

    /// Collects the tail of the upstream stderr
    stderr_reader: Option<JoinHandle<()>>,
    stderr_tail: Arc<Mutex<Vec<u8>>>,

    buffer: Arc<Mutex<Vec<u8>>>,
    started_at: Option<DateTime<Utc>>,
    warnings: Vec<String>,
    event_tx: broadcast::Sender<CaptureEvent>,
}

impl CaptureSession {
    pub fn new(transport: Arc<dyn DeviceTransport>, options: CaptureOptions) -> Self {
        let (event_tx, _) = broadcast::channel(16);
        Self {
            state: Arc::new(RwLock::new(CaptureState::Idle)),
            transport,
            options,
            child: None,
            reader: None,
            stderr_reader: None,
            stderr_tail: Arc::new(Mutex::new(Vec::new())),
            buffer: Arc::new(Mutex::new(Vec::new())),
            started_at: None,
            warnings: Vec::new(),
            event_tx,
        }
    }

    /// Get the current capture state
    pub fn state(&self) -> CaptureState {
        *self.state.read()
    }

    /// Subscribe to capture events
    pub fn subscribe(&self) -> broadcast::Receiver<CaptureEvent> {
        self.event_tx.subscribe()
    }

    /// Bytes received so far
    pub fn buffered_len(&self) -> usize {
        self.buffer.lock().len()
    }

    /// Start the upstream read
    pub async fn start(&mut self) -> CaptureResult<()> {
        if self.state() != CaptureState::Idle {
            return Err(CaptureError::AlreadyRecording);
        }

        std::fs::create_dir_all(&self.options.local_dir)?;

        tracing::info!(
            "Starting capture of {} (working dir {:?})",
            self.options.device_node,
            self.options.local_dir
        );

        let mut command = self.transport.stream_command(&self.options.device_node);
        let description = format!("{:?}", command.as_std());
        let mut child = command
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| TransportError::Spawn {
                command: description,
                source,
            })?;

        let stdout = child.stdout.take().ok_or(CaptureError::NoStream)?;
        let buffer = Arc::clone(&self.buffer);
        self.reader = Some(tokio::spawn(read_stream(stdout, buffer)));
        if let Some(stderr) = child.stderr.take() {
            let tail = Arc::clone(&self.stderr_tail);
            self.stderr_reader = Some(tokio::spawn(read_tail(stderr, tail)));
        }
        self.child = Some(child);
        self.started_at = Some(Utc::now());

        *self.state.write() = CaptureState::Recording;
        let _ = self.event_tx.send(CaptureEvent::Started);

        Ok(())
    }

    /// Stop the capture and freeze the buffer.
    ///
    /// Failures to kill the process or to end the reader are reported as
    /// warnings on the returned stream; whatever was buffered is kept.
    pub async fn stop(&mut self) -> CaptureResult<CapturedStream> {
        if self.state() != CaptureState::Recording {
            return Err(CaptureError::NotRecording);
        }

        *self.state.write() = CaptureState::Stopping;
        tracing::info!("Stopping capture of {}", self.options.device_node);

        if let Some(mut child) = self.child.take() {
            let exited = match child.try_wait() {
                Ok(Some(status)) if !status.success() => {
                    let stderr = self.collect_stderr().await;
                    self.warn(format!("Upstream process exited early with {}: {}", status, stderr));
                    true
                }
                Ok(Some(status)) => {
                    tracing::debug!("Upstream process already exited with {}", status);
                    true
                }
                Ok(None) => false,
                Err(e) => {
                    tracing::debug!("Could not poll upstream process: {}", e);
                    false
                }
            };

            if !exited {
                match tokio::time::timeout(self.options.stop_timeout, child.kill()).await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => self.warn(format!("Failed to terminate upstream process: {}", e)),
                    Err(_) => self.warn(format!(
                        "Upstream process did not exit within {:?}",
                        self.options.stop_timeout
                    )),
                }
            }
        }

        if let Some(mut reader) = self.reader.take() {
            match tokio::time::timeout(self.options.stop_timeout, &mut reader).await {
                Ok(Ok(total)) => tracing::debug!("Reader finished after {} bytes", total),
                Ok(Err(e)) => self.warn(format!("Reader task failed: {}", e)),
                Err(_) => {
                    self.warn(format!(
                        "Reader still running after {:?}, cancelling it",
                        self.options.stop_timeout
                    ));
                    reader.abort();
                    if let Err(e) = reader.await {
                        if !e.is_cancelled() {
                            self.warn(format!("Reader task failed during cancellation: {}", e));
                        }
                    }
                }
            }
        }

        if let Some(stderr_reader) = self.stderr_reader.take() {
            stderr_reader.abort();
        }

        let bytes = std::mem::take(&mut *self.buffer.lock());
        let stopped_at = Utc::now();

        *self.state.write() = CaptureState::Stopped;
        let _ = self.event_tx.send(CaptureEvent::Stopped { bytes: bytes.len() });

        let stream = CapturedStream {
            bytes,
            started_at: self.started_at.unwrap_or(stopped_at),
            stopped_at,
            local_dir: self.options.local_dir.clone(),
            warnings: std::mem::take(&mut self.warnings),
        };

        tracing::info!(
            "Capture stopped. {} bytes in {}ms",
            stream.bytes.len(),
            stream.duration_ms()
        );
        Ok(stream)
    }

    /// Wait briefly for the stderr reader of an exited process, then render its tail
    async fn collect_stderr(&mut self) -> String {
        if let Some(mut stderr_reader) = self.stderr_reader.take() {
            if tokio::time::timeout(self.options.stop_timeout, &mut stderr_reader)
                .await
                .is_err()
            {
                stderr_reader.abort();
            }
        }

        let tail = self.stderr_tail.lock();
        let text = String::from_utf8_lossy(&tail).trim().to_string();
        if text.is_empty() {
            "no output on stderr".to_string()
        } else {
            text
        }
    }

    fn warn(&mut self, message: String) {
        tracing::warn!("{}", message);
        let _ = self.event_tx.send(CaptureEvent::Warning(message.clone()));
        self.warnings.push(message);
    }
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
        if let Some(stderr_reader) = self.stderr_reader.take() {
            stderr_reader.abort();
        }
    }
}

/// Append everything from `stream` to `buffer` until EOF or a read error
async fn read_stream<R>(mut stream: R, buffer: Arc<Mutex<Vec<u8>>>) -> u64
where
    R: AsyncRead + Unpin,
{
    let mut chunk = [0u8; READ_CHUNK];
    let mut total = 0u64;

    loop {
        match stream.read(&mut chunk).await {
            Ok(0) => break,
            Ok(n) => {
                buffer.lock().extend_from_slice(&chunk[..n]);
                total += n as u64;
                tracing::trace!("Captured {} bytes ({} total)", n, total);
            }
            Err(e) => {
                tracing::warn!("Capture read failed after {} bytes: {}", total, e);
                break;
            }
        }
    }

    total
}

/// Keep the last [`STDERR_TAIL`] bytes written to `stream`
async fn read_tail<R>(mut stream: R, tail: Arc<Mutex<Vec<u8>>>)
where
    R: AsyncRead + Unpin,
{
    let mut chunk = [0u8; READ_CHUNK];

    while let Ok(n) = stream.read(&mut chunk).await {
        if n == 0 {
            break;
        }
        let mut tail = tail.lock();
        tail.extend_from_slice(&chunk[..n]);
        let excess = tail.len().saturating_sub(STDERR_TAIL);
        tail.drain(..excess);
    }
}
