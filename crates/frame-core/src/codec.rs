//! Wire codec mapping frames to and from their textual envelope.
//!
//! An envelope is a single JSON document
//! `{"seq":"<ascii-int>","msg":"<base64>","det":"<base64>"}` and is atomic
//! at the transport layer. Base64 keeps the binary payloads safe on a text
//! transport; both sides of the pipeline use the standard alphabet.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::frame::{Frame, ENVELOPE_MAX};

/// Envelope encoding or decoding failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CodecError {
    /// The received bytes do not form a valid envelope for this pipeline.
    #[error("malformed envelope: {0}")]
    Malformed(&'static str),
    /// The encoded envelope would exceed the transport bound.
    #[error("envelope of {0} bytes exceeds the transport bound")]
    Oversize(usize),
}

#[derive(Serialize)]
struct EnvelopeRef<'a> {
    seq: &'a str,
    msg: String,
    det: String,
}

#[derive(Deserialize)]
struct EnvelopeOwned {
    seq: String,
    msg: String,
    det: String,
}

/// Serialize a frame into one self-delimiting envelope.
pub fn encode(frame: &Frame) -> Result<Vec<u8>, CodecError> {
    let seq = std::str::from_utf8(frame.seq().bytes())
        .map_err(|_| CodecError::Malformed("sequence is not ASCII"))?;
    let envelope = EnvelopeRef {
        seq,
        msg: BASE64.encode(frame.msg().bytes()),
        det: BASE64.encode(frame.det().bytes()),
    };
    let bytes = serde_json::to_vec(&envelope)
        .map_err(|_| CodecError::Malformed("unencodable frame"))?;
    if bytes.len() > ENVELOPE_MAX {
        return Err(CodecError::Oversize(bytes.len()));
    }
    Ok(bytes)
}

/// Populate a freshly allocated frame from a received envelope.
///
/// On failure the frame is untouched except possibly for buffers written
/// before the failing field; the caller must return it to the pool either
/// way.
pub fn decode(envelope: &[u8], frame: &mut Frame) -> Result<(), CodecError> {
    if envelope.is_empty() || envelope.len() > ENVELOPE_MAX {
        return Err(CodecError::Malformed("envelope size out of bounds"));
    }
    let parsed: EnvelopeOwned = serde_json::from_slice(envelope)
        .map_err(|_| CodecError::Malformed("invalid JSON"))?;

    if parsed.seq.is_empty() || !parsed.seq.bytes().all(|b| b.is_ascii_digit()) {
        return Err(CodecError::Malformed("sequence is not a decimal integer"));
    }
    frame
        .seq_mut()
        .set(parsed.seq.as_bytes())
        .map_err(|_| CodecError::Malformed("sequence too long"))?;

    let msg = BASE64
        .decode(&parsed.msg)
        .map_err(|_| CodecError::Malformed("message payload is not base64"))?;
    frame
        .msg_mut()
        .set(&msg)
        .map_err(|_| CodecError::Malformed("message payload too large"))?;

    let det = BASE64
        .decode(&parsed.det)
        .map_err(|_| CodecError::Malformed("detection payload is not base64"))?;
    frame
        .det_mut()
        .set(&det)
        .map_err(|_| CodecError::Malformed("detection payload too large"))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use base64::Engine as _;

    use super::*;
    use crate::frame::{FramePool, DET_CAPACITY, MSG_CAPACITY};

    fn filled_frame(pool: &FramePool) -> Frame {
        let mut frame = pool.alloc().unwrap();
        frame.seq_mut().set(b"42").unwrap();
        frame.msg_mut().set(&[0xFF, 0xD8, 0x00, 0x7F, 0xFF]).unwrap();
        frame.det_mut().set(br#"{"seq":42,"detections":[]}"#).unwrap();
        frame
    }

    #[test]
    fn round_trip_preserves_every_byte() {
        let pool = FramePool::new(2);
        let original = filled_frame(&pool);

        let envelope = encode(&original).unwrap();
        let mut decoded = pool.alloc().unwrap();
        decode(&envelope, &mut decoded).unwrap();

        assert_eq!(decoded, original);
        pool.free(original);
        pool.free(decoded);
    }

    #[test]
    fn envelope_is_textual_json() {
        let pool = FramePool::new(1);
        let frame = filled_frame(&pool);
        let envelope = encode(&frame).unwrap();

        let value: serde_json::Value = serde_json::from_slice(&envelope).unwrap();
        assert_eq!(value["seq"], "42");
        assert!(value["msg"].is_string());
        assert!(value["det"].is_string());
        pool.free(frame);
    }

    #[test]
    fn rejects_non_json_input() {
        let pool = FramePool::new(1);
        let mut frame = pool.alloc().unwrap();
        let err = decode(b"not-json", &mut frame).unwrap_err();
        assert_eq!(err, CodecError::Malformed("invalid JSON"));
        pool.free(frame);
    }

    #[test]
    fn rejects_missing_fields_and_bad_sequences() {
        let pool = FramePool::new(1);
        let mut frame = pool.alloc().unwrap();

        assert!(decode(br#"{"seq":"1","msg":"AA=="}"#, &mut frame).is_err());
        assert!(decode(br#"{"seq":"","msg":"","det":""}"#, &mut frame).is_err());
        assert!(decode(br#"{"seq":"-3","msg":"","det":""}"#, &mut frame).is_err());
        assert!(decode(br#"{"seq":"12a","msg":"","det":""}"#, &mut frame).is_err());
        pool.free(frame);
    }

    #[test]
    fn rejects_payload_overflowing_its_buffer() {
        let pool = FramePool::new(1);
        let mut frame = pool.alloc().unwrap();

        let oversized = BASE64.encode(vec![0u8; DET_CAPACITY]);
        let envelope = format!(r#"{{"seq":"7","msg":"","det":"{oversized}"}}"#);
        let err = decode(envelope.as_bytes(), &mut frame).unwrap_err();
        assert_eq!(err, CodecError::Malformed("detection payload too large"));
        pool.free(frame);
    }

    #[test]
    fn rejects_envelopes_beyond_the_transport_bound() {
        let pool = FramePool::new(1);
        let mut frame = pool.alloc().unwrap();
        let huge = vec![b'x'; ENVELOPE_MAX + 1];
        assert!(decode(&huge, &mut frame).is_err());
        pool.free(frame);
    }

    #[test]
    fn largest_legal_frame_fits_the_transport_bound() {
        let pool = FramePool::new(1);
        let mut frame = pool.alloc().unwrap();
        let seq = "9".repeat(crate::frame::SEQ_CAPACITY - 1);
        frame.seq_mut().set(seq.as_bytes()).unwrap();
        frame.msg_mut().set(&vec![0xEE; MSG_CAPACITY - 1]).unwrap();
        frame.det_mut().set(&vec![0x22; DET_CAPACITY - 1]).unwrap();

        let envelope = encode(&frame).unwrap();
        assert!(envelope.len() <= ENVELOPE_MAX);
        pool.free(frame);
    }
}
