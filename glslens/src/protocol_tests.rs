//! Unit tests for protocol.rs
//!
//! Tests request/response codecs, malformed payload handling, and framing.

use std::io::Cursor;
use crate::error::Error;
use crate::protocol::{
    decode_reflection_response, decode_response, encode_reflect_request, encode_request,
    opcode, read_frame, tag, try_read_frame, write_frame, QueryRequest, Request, Response,
    PROTOCOL_VERSION, RECORD_MIN_SIZE, SUMMARY_MIN_SIZE,
};
use crate::reflection::{ReflectionRecord, ShaderReflection, UniformSummary};
use crate::stage::StageId;

const GL_FLOAT: u32 = 0x1406;
const GL_FLOAT_VEC4: u32 = 0x8B52;

fn sample_reflection() -> ShaderReflection {
    let mut member = ReflectionRecord::new("Lights.positions", GL_FLOAT_VEC4, 128);
    member.offset = 16;
    member.binding_index = 3;
    member.array_size = 8;
    member.array_stride = 16;
    member.top_level_array_size = 1;

    let mut block = ReflectionRecord::new("Lights", 0, 144);
    block.binding_index = 3;
    block.num_members = 2;

    ShaderReflection {
        uniforms: vec![ReflectionRecord::new("Lights.count", GL_FLOAT, 4), member],
        blocks: vec![block],
    }
}

// ============================================================================
// REQUESTS
// ============================================================================

#[test]
fn test_encode_request_layout() {
    let bytes = encode_request("abc", 450, StageId::Fragment);

    assert_eq!(bytes[0], opcode::UNIFORMS);
    assert_eq!(&bytes[1..5], &PROTOCOL_VERSION.to_le_bytes());
    assert_eq!(&bytes[5..9], &450u32.to_le_bytes());
    assert_eq!(&bytes[9..13], &4u32.to_le_bytes());
    assert_eq!(&bytes[13..17], &3u32.to_le_bytes());
    assert_eq!(&bytes[17..], b"abc");
}

#[test]
fn test_request_decode_preserves_query() {
    let source = "#version 450\nuniform vec4 color;\nvoid main() {}\n";
    let request = Request::decode(&encode_reflect_request(source, 450, StageId::Compute)).unwrap();

    assert_eq!(
        request,
        Request::Reflect(QueryRequest {
            source: source.to_string(),
            version: 450,
            stage: StageId::Compute,
        })
    );
    assert_eq!(request.kind(), "reflect");
}

#[test]
fn test_handshake_and_shutdown_requests() {
    let handshake = Request::Handshake { protocol_version: 7 };
    assert_eq!(Request::decode(&handshake.encode()).unwrap(), handshake);
    assert_eq!(Request::decode(&Request::Shutdown.encode()).unwrap(), Request::Shutdown);
}

#[test]
fn test_request_with_wrong_protocol_version_is_rejected() {
    let mut bytes = encode_request("void main() {}", 450, StageId::Vertex);
    bytes[1..5].copy_from_slice(&99u32.to_le_bytes());

    let err = Request::decode(&bytes).unwrap_err();
    assert!(matches!(err, Error::ProtocolError(_)));
}

#[test]
fn test_request_with_unknown_stage_code_is_rejected() {
    let mut bytes = encode_request("void main() {}", 450, StageId::Vertex);
    bytes[9..13].copy_from_slice(&42u32.to_le_bytes());

    match Request::decode(&bytes) {
        Err(Error::ProtocolError(msg)) => assert!(msg.contains("42")),
        other => panic!("expected ProtocolError, got {:?}", other),
    }
}

#[test]
fn test_unknown_opcode_is_rejected() {
    let mut bytes = vec![0x7F];
    bytes.extend_from_slice(&PROTOCOL_VERSION.to_le_bytes());
    assert!(matches!(Request::decode(&bytes), Err(Error::ProtocolError(_))));
}

#[test]
fn test_request_with_source_length_past_end_is_rejected() {
    let mut bytes = encode_request("void main() {}", 450, StageId::Vertex);
    bytes[13..17].copy_from_slice(&1000u32.to_le_bytes());
    assert!(matches!(Request::decode(&bytes), Err(Error::ProtocolError(_))));
}

// ============================================================================
// RESPONSES
// ============================================================================

#[test]
fn test_uniforms_response_layout() {
    let response = Response::Uniforms(vec![UniformSummary::new("color", 0, GL_FLOAT_VEC4)]);
    let bytes = response.encode();

    assert_eq!(bytes[0], tag::UNIFORMS);
    assert_eq!(&bytes[1..5], &1u32.to_le_bytes());
    assert_eq!(&bytes[5..9], &5u32.to_le_bytes());
    assert_eq!(&bytes[9..14], b"color");
    assert_eq!(&bytes[14..18], &0u32.to_le_bytes());
    assert_eq!(&bytes[18..22], &GL_FLOAT_VEC4.to_le_bytes());
    assert_eq!(bytes.len(), 1 + 4 + SUMMARY_MIN_SIZE + 5);
}

#[test]
fn test_decode_response_returns_summaries_in_order() {
    let summaries = vec![
        UniformSummary::new("color", 0, GL_FLOAT_VEC4),
        UniformSummary::new("weights", 4, GL_FLOAT),
    ];
    let bytes = Response::Uniforms(summaries.clone()).encode();
    assert_eq!(decode_response(&bytes).unwrap(), summaries);
}

#[test]
fn test_decode_response_empty_list() {
    let bytes = Response::Uniforms(Vec::new()).encode();
    assert!(decode_response(&bytes).unwrap().is_empty());
}

#[test]
fn test_reflection_response_preserves_every_field() {
    let reflection = sample_reflection();
    let bytes = Response::Reflection(reflection.clone()).encode();

    let decoded = decode_reflection_response(&bytes).unwrap();
    assert_eq!(decoded, reflection);

    let positions = decoded.uniform("Lights.positions").unwrap();
    assert_eq!(positions.offset, 16);
    assert_eq!(positions.binding_index, 3);
    assert_eq!(positions.counter_index, -1);
    assert_eq!(positions.array_stride, 16);
}

#[test]
fn test_reflection_record_minimum_size() {
    let reflection = ShaderReflection {
        uniforms: vec![ReflectionRecord::new("", 0, 0)],
        blocks: Vec::new(),
    };
    let bytes = Response::Reflection(reflection).encode();
    assert_eq!(bytes.len(), 1 + 4 + RECORD_MIN_SIZE + 4);
}

#[test]
fn test_compilation_failure_maps_to_compilation_error() {
    let bytes = Response::CompilationFailed("0:2: 'vec5' : no such type".to_string()).encode();

    match decode_response(&bytes) {
        Err(Error::CompilationError(diagnostic)) => assert!(diagnostic.contains("vec5")),
        other => panic!("expected CompilationError, got {:?}", other),
    }
    assert!(matches!(decode_reflection_response(&bytes), Err(Error::CompilationError(_))));
}

#[test]
fn test_rejection_maps_to_protocol_error() {
    let bytes = Response::Rejected("bad opcode".to_string()).encode();
    match decode_response(&bytes) {
        Err(Error::ProtocolError(msg)) => assert!(msg.contains("bad opcode")),
        other => panic!("expected ProtocolError, got {:?}", other),
    }
}

#[test]
fn test_wrong_response_kind_is_protocol_error() {
    let goodbye = Response::Goodbye.encode();
    assert!(matches!(decode_response(&goodbye), Err(Error::ProtocolError(_))));

    let uniforms = Response::Uniforms(Vec::new()).encode();
    assert!(matches!(decode_reflection_response(&uniforms), Err(Error::ProtocolError(_))));
}

#[test]
fn test_unknown_tag_is_protocol_error() {
    assert!(matches!(decode_response(&[0x55]), Err(Error::ProtocolError(_))));
    assert!(matches!(decode_response(&[]), Err(Error::ProtocolError(_))));
}

// ============================================================================
// MALFORMED PAYLOADS
// ============================================================================

#[test]
fn test_every_truncation_is_rejected() {
    let bytes = Response::Reflection(sample_reflection()).encode();
    for len in 0..bytes.len() {
        let result = Response::decode(&bytes[..len]);
        assert!(
            matches!(result, Err(Error::ProtocolError(_))),
            "prefix of {} bytes should fail",
            len
        );
    }
}

#[test]
fn test_trailing_bytes_are_rejected() {
    let mut bytes = Response::Uniforms(vec![UniformSummary::new("a", 0, GL_FLOAT)]).encode();
    bytes.push(0);
    assert!(matches!(decode_response(&bytes), Err(Error::ProtocolError(_))));
}

#[test]
fn test_huge_count_is_rejected_before_allocation() {
    let mut bytes = vec![tag::UNIFORMS];
    bytes.extend_from_slice(&u32::MAX.to_le_bytes());
    bytes.extend_from_slice(&[0u8; 32]);

    match decode_response(&bytes) {
        Err(Error::ProtocolError(msg)) => assert!(msg.contains("count")),
        other => panic!("expected ProtocolError, got {:?}", other),
    }
}

#[test]
fn test_invalid_utf8_name_is_rejected() {
    let mut bytes = vec![tag::UNIFORMS];
    bytes.extend_from_slice(&1u32.to_le_bytes());
    bytes.extend_from_slice(&2u32.to_le_bytes());
    bytes.extend_from_slice(&[0xFF, 0xFE]);
    bytes.extend_from_slice(&0u32.to_le_bytes());
    bytes.extend_from_slice(&GL_FLOAT.to_le_bytes());

    assert!(matches!(decode_response(&bytes), Err(Error::ProtocolError(_))));
}

// ============================================================================
// FRAMING
// ============================================================================

#[test]
fn test_frames_are_read_in_order() {
    let mut stream = Vec::new();
    write_frame(&mut stream, b"first").unwrap();
    write_frame(&mut stream, b"").unwrap();
    write_frame(&mut stream, b"third").unwrap();

    assert_eq!(&stream[..4], &5u32.to_le_bytes());

    let mut cursor = Cursor::new(stream);
    assert_eq!(read_frame(&mut cursor, 1024).unwrap(), b"first");
    assert_eq!(read_frame(&mut cursor, 1024).unwrap(), b"");
    assert_eq!(read_frame(&mut cursor, 1024).unwrap(), b"third");
    assert_eq!(try_read_frame(&mut cursor, 1024).unwrap(), None);
}

#[test]
fn test_clean_end_of_stream() {
    let mut empty = Cursor::new(Vec::new());
    assert_eq!(try_read_frame(&mut empty, 1024).unwrap(), None);

    let mut empty = Cursor::new(Vec::new());
    assert!(matches!(read_frame(&mut empty, 1024), Err(Error::Transport(_))));
}

#[test]
fn test_partial_header_is_transport_error() {
    let mut cursor = Cursor::new(vec![3u8, 0]);
    assert!(matches!(try_read_frame(&mut cursor, 1024), Err(Error::Transport(_))));
}

#[test]
fn test_partial_payload_is_transport_error() {
    let mut stream = Vec::new();
    stream.extend_from_slice(&10u32.to_le_bytes());
    stream.extend_from_slice(b"short");

    let mut cursor = Cursor::new(stream);
    assert!(matches!(read_frame(&mut cursor, 1024), Err(Error::Transport(_))));
}

#[test]
fn test_oversized_frame_is_protocol_error() {
    let mut stream = Vec::new();
    write_frame(&mut stream, &[0u8; 64]).unwrap();

    let mut cursor = Cursor::new(stream);
    assert!(matches!(read_frame(&mut cursor, 63), Err(Error::ProtocolError(_))));
}

#[test]
fn test_oversized_frame_is_skipped() {
    let mut stream = Vec::new();
    write_frame(&mut stream, &[7u8; 535]).unwrap();
    write_frame(&mut stream, b"next").unwrap();
    write_frame(&mut stream, b"after").unwrap();

    let mut cursor = Cursor::new(stream);
    assert!(matches!(read_frame(&mut cursor, 64), Err(Error::ProtocolError(_))));
    assert_eq!(read_frame(&mut cursor, 64).unwrap(), b"next");
    assert_eq!(read_frame(&mut cursor, 64).unwrap(), b"after");
}

#[test]
fn test_truncated_oversized_frame_is_transport_error() {
    let mut stream = Vec::new();
    stream.extend_from_slice(&100u32.to_le_bytes());
    stream.extend_from_slice(&[0u8; 10]);

    let mut cursor = Cursor::new(stream);
    assert!(matches!(read_frame(&mut cursor, 64), Err(Error::Transport(_))));
}
