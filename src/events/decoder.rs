//! Raw byte stream to record decoding
//!
//! The stream read through `adb shell` passes through a pseudo-terminal on
//! older devices, which rewrites every `\n` as `\r\n`. The decoder undoes that
//! before slicing, then consumes whole frames only. A partial trailing frame
//! is the normal result of stopping a capture mid-write and is dropped.

use super::record::{DecodedRecord, FRAME_SIZE};

/// Collapse every `\r\n` pair into `\n`
pub fn normalize_line_endings(bytes: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\r' && bytes.get(i + 1) == Some(&b'\n') {
            out.push(b'\n');
            i += 2;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    out
}

/// Decode already-normalized bytes into records, ignoring any partial tail
pub fn decode_frames(bytes: &[u8]) -> Vec<DecodedRecord> {
    bytes
        .chunks_exact(FRAME_SIZE)
        .map(|chunk| {
            let mut raw = [0u8; FRAME_SIZE];
            raw.copy_from_slice(chunk);
            DecodedRecord::from_frame(raw)
        })
        .collect()
}

/// Decode a frozen capture buffer into records in capture order
pub fn decode_records(captured: &[u8]) -> Vec<DecodedRecord> {
    let normalized = normalize_line_endings(captured);
    let usable = normalized.len() / FRAME_SIZE * FRAME_SIZE;
    let dropped = normalized.len() - usable;

    let records = decode_frames(&normalized[..usable]);

    tracing::debug!(
        "Decoded {} frames from {} bytes ({} after normalization, {} trailing bytes dropped)",
        records.len(),
        captured.len(),
        normalized.len(),
        dropped
    );

    records
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn frame(seconds: i64, micros: i64, event_type: u16, code: u16, value: i32) -> [u8; FRAME_SIZE] {
        DecodedRecord::encode(seconds, micros, event_type, code, value)
    }

    #[test]
    fn test_normalize_collapses_crlf_only() {
        assert_eq!(normalize_line_endings(b"a\r\nb"), b"a\nb".to_vec());
        assert_eq!(normalize_line_endings(b"\r\r\n\n"), b"\r\n\n".to_vec());
        assert_eq!(normalize_line_endings(b"\r"), b"\r".to_vec());
        assert_eq!(normalize_line_endings(b""), Vec::<u8>::new());
    }

    #[test]
    fn test_empty_buffer_has_no_records() {
        assert!(decode_records(&[]).is_empty());
    }

    #[test]
    fn test_partial_frame_is_dropped() {
        let mut bytes = frame(5, 6, 1, 330, 1).to_vec();
        bytes.extend_from_slice(&[7u8; 10]);

        let records = decode_records(&bytes);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].code, 330);
    }

    #[test]
    fn test_crlf_inside_stream_is_normalized_before_slicing() {
        // value 0x0a0d would otherwise survive as raw \r\n
        let mut bytes = frame(1, 0, 3, 0x36, 0x0a0d).to_vec();
        bytes.extend_from_slice(&frame(1, 1, 0, 0, 0));

        let records = decode_records(&bytes);
        // one byte lost in the first frame shifts everything: only one whole frame remains
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].raw[..20], bytes[..20]);
    }

    proptest! {
        #[test]
        fn prop_round_trip(fields in proptest::collection::vec(
            (0i64..1_000_000, 0i64..1_000_000, 0u16..0x20, any::<u16>(), any::<i32>()), 0..40)) {
            // keep bytes free of \r\n so normalization is the identity
            let frames: Vec<[u8; FRAME_SIZE]> = fields
                .iter()
                .map(|&(s, us, t, c, v)| frame(s, us, t, c, v))
                .filter(|raw| !raw.windows(2).any(|w| w == b"\r\n"))
                .collect();
            let bytes: Vec<u8> = frames.iter().flatten().copied().collect();
            prop_assume!(!bytes.windows(2).any(|w| w == b"\r\n"));

            let records = decode_records(&bytes);
            prop_assert_eq!(records.len(), frames.len());
            for (record, raw) in records.iter().zip(&frames) {
                prop_assert_eq!(&record.raw, raw);
                prop_assert_eq!(DecodedRecord::from_frame(*raw), *record);
            }
        }

        #[test]
        fn prop_trailing_bytes_never_change_count(count in 0usize..20, extra in 1usize..24) {
            let mut bytes: Vec<u8> = (0..count)
                .flat_map(|i| frame(i as i64, 0, 0, 0, 0))
                .collect();
            let before = decode_records(&bytes).len();
            bytes.extend(std::iter::repeat(0u8).take(extra));
            prop_assert_eq!(decode_records(&bytes).len(), before);
            prop_assert_eq!(before, count);
        }
    }
}
