//! Integration tests for the framed wire: header, frame buffer and MsgPack
//! payloads together, as the host sees them.

use rpc_worker::codec::MsgPackCodec;
use rpc_worker::protocol::{build_frame, flags, FrameBuffer, Header, HEADER_SIZE};
use rpc_worker::{CallOutcome, ErrorKind};
use serde_json::{json, Value};

/// A request frame carries a `{method, params}` map.
#[test]
fn test_request_frame_with_msgpack_payload() {
    let request = json!({"method": "add", "params": {"a": 2, "b": 3}});
    let payload = MsgPackCodec::encode(&request).unwrap();
    let frame_bytes = build_frame(0, 12345, &payload);

    assert_eq!(&frame_bytes[1..5], &12345u32.to_be_bytes());
    assert_eq!(&frame_bytes[5..9], &(payload.len() as u32).to_be_bytes());

    let mut buffer = FrameBuffer::new();
    let frames = buffer.push(&frame_bytes).unwrap();

    assert_eq!(frames.len(), 1);
    let frame = &frames[0];
    assert_eq!(frame.correlation_id(), 12345);
    assert!(!frame.is_response());

    let decoded: Value = MsgPackCodec::decode(frame.payload()).unwrap();
    assert_eq!(decoded, request);
}

/// Several replies in one read keep their ids and order.
#[test]
fn test_multiple_frames_sequence() {
    let mut buffer = FrameBuffer::new();
    let mut all_bytes = Vec::new();

    for i in 1u32..=5 {
        let outcome = CallOutcome::success(json!(format!("message_{i}")));
        let payload = MsgPackCodec::encode(&outcome).unwrap();
        all_bytes.extend(build_frame(flags::RESPONSE, i * 100, &payload));
    }

    let frames = buffer.push(&all_bytes).unwrap();
    assert_eq!(frames.len(), 5);

    for (i, frame) in frames.iter().enumerate() {
        assert_eq!(frame.correlation_id(), ((i + 1) * 100) as u32);

        let outcome: CallOutcome = MsgPackCodec::decode(frame.payload()).unwrap();
        assert_eq!(outcome.result(), Some(&json!(format!("message_{}", i + 1))));
    }
}

/// A failed outcome travels with the error flag set.
#[test]
fn test_error_reply() {
    let outcome = CallOutcome::error(ErrorKind::UnknownMethod, "Unknown method: nope");
    let payload = MsgPackCodec::encode(&outcome).unwrap();
    let header = Header::reply(123, outcome.is_ok(), payload.len() as u32);

    let mut frame_bytes = header.encode().to_vec();
    frame_bytes.extend_from_slice(&payload);

    let frames = FrameBuffer::new().push(&frame_bytes).unwrap();
    let frame = &frames[0];
    assert!(frame.is_response());
    assert!(frame.is_error());

    let decoded: Value = MsgPackCodec::decode(frame.payload()).unwrap();
    assert_eq!(decoded["ok"], false);
    assert_eq!(decoded["error"]["type"], "UnknownMethod");
    assert_eq!(decoded["done"], true);

    let decoded: CallOutcome = MsgPackCodec::decode(frame.payload()).unwrap();
    assert_eq!(decoded, outcome);
}

/// A null result is still present in the reply.
#[test]
fn test_null_result_reply() {
    let payload = MsgPackCodec::encode(&CallOutcome::success(Value::Null)).unwrap();
    let decoded: Value = MsgPackCodec::decode(&payload).unwrap();

    assert_eq!(decoded, json!({"ok": true, "result": null, "done": true}));
}

#[test]
fn test_fragmented_frame_parsing() {
    let payload = MsgPackCodec::encode(&"test data for fragmentation").unwrap();
    let frame_bytes = build_frame(flags::RESPONSE, 789, &payload);

    let mut buffer = FrameBuffer::new();

    assert!(buffer.push(&frame_bytes[..5]).unwrap().is_empty());
    assert!(buffer.push(&frame_bytes[5..HEADER_SIZE]).unwrap().is_empty());

    let mid = HEADER_SIZE + payload.len() / 2;
    assert!(buffer.push(&frame_bytes[HEADER_SIZE..mid]).unwrap().is_empty());

    let frames = buffer.push(&frame_bytes[mid..]).unwrap();
    assert_eq!(frames.len(), 1);

    let decoded: String = MsgPackCodec::decode(frames[0].payload()).unwrap();
    assert_eq!(decoded, "test data for fragmentation");
}
