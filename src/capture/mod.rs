//! Input capture
//!
//! Streams a raw input node from the device and buffers it until stopped.

pub mod session;
pub mod state;
pub mod transport;

pub use session::{CaptureError, CaptureEvent, CaptureSession};
pub use state::{CaptureOptions, CaptureState, CapturedStream};
pub use transport::{AdbTransport, DeviceTransport, LocalTransport, TransportError};
