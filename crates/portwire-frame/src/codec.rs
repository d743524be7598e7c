use bytes::{Buf, BufMut, BytesMut};

use crate::error::{FrameError, Result};
use crate::frame::Frame;

/// Frame header: magic (2) + length (4) = 6 bytes.
pub const HEADER_SIZE: usize = 6;

/// Magic bytes: "PW" (0x50 0x57).
pub const MAGIC: [u8; 2] = [0x50, 0x57];

/// Default maximum frame body size: 16 MiB.
pub const DEFAULT_MAX_FRAME: usize = 16 * 1024 * 1024;

/// Serialize a frame to its JSON body, the array `[name, id, args]`.
pub fn encode_json(frame: &Frame) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec(frame)?)
}

/// Parse a JSON body back into a frame.
pub fn decode_json(body: &[u8]) -> Result<Frame> {
    Ok(serde_json::from_slice(body)?)
}

/// Encode a serialized frame body into the wire format.
///
/// Wire format:
/// ```text
/// ┌──────────────┬───────────┬─────────────────┐
/// │ Magic (2B)   │ Length    │ Body             │
/// │ 0x50 0x57    │ (4B LE)  │ (Length bytes)   │
/// │ "PW"         │          │ JSON array       │
/// └──────────────┴───────────┴─────────────────┘
/// ```
pub fn encode_body(body: &[u8], dst: &mut BytesMut) -> Result<()> {
    if body.len() > u32::MAX as usize {
        return Err(FrameError::FrameTooLarge {
            size: body.len(),
            max: u32::MAX as usize,
        });
    }
    dst.reserve(HEADER_SIZE + body.len());
    dst.put_slice(&MAGIC);
    dst.put_u32_le(body.len() as u32);
    dst.put_slice(body);
    Ok(())
}

/// Encode a frame into the wire format (JSON body plus header).
pub fn encode_frame(frame: &Frame, dst: &mut BytesMut) -> Result<()> {
    let body = encode_json(frame)?;
    encode_body(&body, dst)
}

/// Decode one frame from the front of `src`.
///
/// Returns `Ok(None)` until the buffer holds a complete frame; on success
/// the frame's bytes are consumed from the buffer.
pub fn decode_frame(src: &mut BytesMut, max_frame: usize) -> Result<Option<Frame>> {
    if src.len() < HEADER_SIZE {
        return Ok(None); // Need more data
    }

    // Check magic
    if src[0..2] != MAGIC {
        return Err(FrameError::InvalidMagic);
    }

    let body_len = u32::from_le_bytes([src[2], src[3], src[4], src[5]]) as usize;

    if body_len > max_frame {
        return Err(FrameError::FrameTooLarge {
            size: body_len,
            max: max_frame,
        });
    }

    let total = HEADER_SIZE + body_len;
    if src.len() < total {
        return Ok(None); // Need more data
    }

    src.advance(HEADER_SIZE);
    let body = src.split_to(body_len);

    decode_json(&body).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_encode_decode_roundtrip() {
        let mut buf = BytesMut::new();
        let frame = Frame::request("echo", 2, vec![json!("hello, portwire!")]);

        encode_frame(&frame, &mut buf).unwrap();

        let body_len = encode_json(&frame).unwrap().len();
        assert_eq!(buf.len(), HEADER_SIZE + body_len);
        assert_eq!(&buf[0..2], &MAGIC);

        let decoded = decode_frame(&mut buf, DEFAULT_MAX_FRAME).unwrap().unwrap();
        assert_eq!(decoded, frame);
        assert!(buf.is_empty());
    }

    #[test]
    fn test_decode_incomplete_header() {
        let mut buf = BytesMut::from(&[0x50, 0x57, 0x00][..]);
        let result = decode_frame(&mut buf, DEFAULT_MAX_FRAME).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_decode_incomplete_body() {
        let mut buf = BytesMut::new();
        encode_frame(&Frame::post("log", vec![json!("x")]), &mut buf).unwrap();
        buf.truncate(HEADER_SIZE + 2);

        let result = decode_frame(&mut buf, DEFAULT_MAX_FRAME).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_decode_invalid_magic() {
        let mut buf = BytesMut::from(&[0xFF, 0xFF, 0x00, 0x00, 0x00, 0x00][..]);
        let result = decode_frame(&mut buf, DEFAULT_MAX_FRAME);
        assert!(matches!(result, Err(FrameError::InvalidMagic)));
    }

    #[test]
    fn test_decode_body_too_large() {
        let mut buf = BytesMut::new();
        buf.put_slice(&MAGIC);
        buf.put_u32_le(1024 * 1024 * 32); // 32 MiB

        let result = decode_frame(&mut buf, DEFAULT_MAX_FRAME);
        assert!(matches!(result, Err(FrameError::FrameTooLarge { .. })));
    }

    #[test]
    fn test_decode_invalid_json_body() {
        let mut buf = BytesMut::new();
        encode_body(b"not json", &mut buf).unwrap();

        let result = decode_frame(&mut buf, DEFAULT_MAX_FRAME);
        assert!(matches!(result, Err(FrameError::Json(_))));
    }

    #[test]
    fn test_multiple_frames() {
        let mut buf = BytesMut::new();
        let first = Frame::request("first", 2, vec![]);
        let second = Frame::request("second", 3, vec![json!(true)]);
        encode_frame(&first, &mut buf).unwrap();
        encode_frame(&second, &mut buf).unwrap();

        assert_eq!(
            decode_frame(&mut buf, DEFAULT_MAX_FRAME).unwrap().unwrap(),
            first
        );
        assert_eq!(
            decode_frame(&mut buf, DEFAULT_MAX_FRAME).unwrap().unwrap(),
            second
        );
        assert!(buf.is_empty());
    }

    #[test]
    fn test_empty_args() {
        let mut buf = BytesMut::new();
        encode_frame(&Frame::post("tick", vec![]), &mut buf).unwrap();

        let frame = decode_frame(&mut buf, DEFAULT_MAX_FRAME).unwrap().unwrap();
        assert_eq!(frame.name, "tick");
        assert!(frame.args.is_empty());
    }
}
