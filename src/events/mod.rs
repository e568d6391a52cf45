//! Kernel input event frames
//!
//! Decoding of the raw `struct input_event` byte stream read from an
//! `/dev/input/eventN` node into structured records.

pub mod decoder;
pub mod record;

pub use decoder::{decode_frames, decode_records, normalize_line_endings};
pub use record::{DecodedRecord, FRAME_SIZE};
