//! Decoded input event record
//!
//! One record per 24-byte kernel `input_event` frame:
//!
//! | offset | size | field        |
//! |--------|------|--------------|
//! | 0      | 8    | seconds      |
//! | 8      | 8    | microseconds |
//! | 16     | 2    | type         |
//! | 18     | 2    | code         |
//! | 20     | 4    | value        |

use serde::{Deserialize, Serialize};

/// Size in bytes of one raw frame
pub const FRAME_SIZE: usize = 24;

/// A single decoded input event, with its original bytes kept for replay
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecodedRecord {
    /// Timestamp seconds
    pub seconds: i64,

    /// Timestamp microseconds
    pub microseconds: i64,

    /// Event type (EV_SYN, EV_KEY, EV_ABS, ...)
    pub event_type: u16,

    /// Event code
    pub code: u16,

    /// Event value
    pub value: i32,

    /// The verbatim frame bytes
    #[serde(skip)]
    pub raw: [u8; FRAME_SIZE],
}

impl DecodedRecord {
    /// Unpack a record from exactly one frame
    pub fn from_frame(raw: [u8; FRAME_SIZE]) -> Self {
        let [s0, s1, s2, s3, s4, s5, s6, s7, u0, u1, u2, u3, u4, u5, u6, u7, t0, t1, c0, c1, v0, v1, v2, v3] = raw;

        let seconds = i64::from_le_bytes([s0, s1, s2, s3, s4, s5, s6, s7]);
        let microseconds = i64::from_le_bytes([u0, u1, u2, u3, u4, u5, u6, u7]);
        let event_type = u16::from_le_bytes([t0, t1]);
        let code = u16::from_le_bytes([c0, c1]);
        let value = i32::from_le_bytes([v0, v1, v2, v3]);

        Self {
            seconds,
            microseconds,
            event_type,
            code,
            value,
            raw,
        }
    }

    /// Pack the fields into a frame using the kernel layout
    pub fn encode(seconds: i64, microseconds: i64, event_type: u16, code: u16, value: i32) -> [u8; FRAME_SIZE] {
        let mut raw = [0u8; FRAME_SIZE];
        raw[0..8].copy_from_slice(&seconds.to_le_bytes());
        raw[8..16].copy_from_slice(&microseconds.to_le_bytes());
        raw[16..18].copy_from_slice(&event_type.to_le_bytes());
        raw[18..20].copy_from_slice(&code.to_le_bytes());
        raw[20..24].copy_from_slice(&value.to_le_bytes());
        raw
    }

    /// Timestamp in microseconds since the device clock epoch
    pub fn timestamp_micros(&self) -> i128 {
        self.seconds as i128 * 1_000_000 + self.microseconds as i128
    }
}
