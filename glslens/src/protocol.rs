//! Wire protocol between a compiler handle and the backend process
//!
//! Every message is a frame: a little-endian `u32` payload length followed by
//! the payload. Requests start with an opcode byte and the protocol version;
//! responses start with a tag byte. All integers are little-endian.
//!
//! The protocol is strictly request/response: the backend answers every
//! request with exactly one response, in order.

use std::io::{self, Read, Write};
use crate::error::{Error, Result};
use crate::reflection::{ReflectionRecord, ShaderReflection, UniformSummary};
use crate::stage::StageId;

/// Version carried by every request and checked during the handshake
pub const PROTOCOL_VERSION: u32 = 1;

/// Default upper bound for a single frame payload (16 MiB)
pub const DEFAULT_MAX_FRAME_SIZE: u32 = 16 * 1024 * 1024;

/// Smallest encoded `UniformSummary`: name length, array size, type id
pub const SUMMARY_MIN_SIZE: usize = 12;

/// Smallest encoded `ReflectionRecord`: name length plus ten integer fields
pub const RECORD_MIN_SIZE: usize = 44;

/// Request opcodes
pub mod opcode {
    pub const HANDSHAKE: u8 = 0x01;
    pub const UNIFORMS: u8 = 0x02;
    pub const REFLECT: u8 = 0x03;
    pub const SHUTDOWN: u8 = 0x04;
}

/// Response tags
pub mod tag {
    pub const HANDSHAKE: u8 = 0x81;
    pub const UNIFORMS: u8 = 0x82;
    pub const REFLECTION: u8 = 0x83;
    pub const GOODBYE: u8 = 0x84;
    pub const COMPILATION_FAILED: u8 = 0xE1;
    pub const REJECTED: u8 = 0xE2;
}

// ===== REQUESTS =====

/// Body of a uniforms or reflect request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryRequest {
    /// GLSL source, sent as length-prefixed UTF-8
    pub source: String,
    /// GLSL version (e.g. 450)
    pub version: u32,
    /// Target pipeline stage
    pub stage: StageId,
}

/// Messages sent to the backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    /// Version negotiation, sent once right after the backend starts
    Handshake { protocol_version: u32 },
    /// Active uniforms as summaries
    Uniforms(QueryRequest),
    /// Full reflection (records and blocks)
    Reflect(QueryRequest),
    /// Ask the backend to exit
    Shutdown,
}

impl Request {
    /// Human-readable request name for logs
    pub fn kind(&self) -> &'static str {
        match self {
            Request::Handshake { .. } => "handshake",
            Request::Uniforms(_) => "uniforms",
            Request::Reflect(_) => "reflect",
            Request::Shutdown => "shutdown",
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        match self {
            Request::Handshake { protocol_version } => {
                let mut buffer = Vec::with_capacity(5);
                buffer.push(opcode::HANDSHAKE);
                put_u32(&mut buffer, *protocol_version);
                buffer
            }
            Request::Uniforms(query) => {
                encode_query(opcode::UNIFORMS, &query.source, query.version, query.stage)
            }
            Request::Reflect(query) => {
                encode_query(opcode::REFLECT, &query.source, query.version, query.stage)
            }
            Request::Shutdown => {
                let mut buffer = Vec::with_capacity(5);
                buffer.push(opcode::SHUTDOWN);
                put_u32(&mut buffer, PROTOCOL_VERSION);
                buffer
            }
        }
    }

    /// Decode a request payload
    ///
    /// Non-handshake requests must carry `PROTOCOL_VERSION`.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let mut reader = WireReader::new(bytes);
        let op = reader.u8("request opcode")?;
        let protocol_version = reader.u32("protocol version")?;

        if op != opcode::HANDSHAKE && protocol_version != PROTOCOL_VERSION {
            return Err(Error::ProtocolError(format!(
                "unsupported protocol version {} (expected {})",
                protocol_version, PROTOCOL_VERSION
            )));
        }

        let request = match op {
            opcode::HANDSHAKE => Request::Handshake { protocol_version },
            opcode::UNIFORMS => Request::Uniforms(decode_query(&mut reader)?),
            opcode::REFLECT => Request::Reflect(decode_query(&mut reader)?),
            opcode::SHUTDOWN => Request::Shutdown,
            other => {
                return Err(Error::ProtocolError(format!("unknown request opcode 0x{:02X}", other)));
            }
        };

        reader.finish()?;
        Ok(request)
    }
}

/// Encode a uniforms request for `source`
///
/// # Example
///
/// ```
/// use glslens::StageId;
/// use glslens::protocol::{encode_request, Request};
///
/// let bytes = encode_request("void main() {}", 450, StageId::Fragment);
/// assert!(matches!(Request::decode(&bytes).unwrap(), Request::Uniforms(_)));
/// ```
pub fn encode_request(source: &str, version: u32, stage: StageId) -> Vec<u8> {
    encode_query(opcode::UNIFORMS, source, version, stage)
}

/// Encode a reflect request for `source`
pub fn encode_reflect_request(source: &str, version: u32, stage: StageId) -> Vec<u8> {
    encode_query(opcode::REFLECT, source, version, stage)
}

fn encode_query(op: u8, source: &str, version: u32, stage: StageId) -> Vec<u8> {
    let mut buffer = Vec::with_capacity(17 + source.len());
    buffer.push(op);
    put_u32(&mut buffer, PROTOCOL_VERSION);
    put_u32(&mut buffer, version);
    put_u32(&mut buffer, stage.value());
    put_str(&mut buffer, source);
    buffer
}

fn decode_query(reader: &mut WireReader<'_>) -> Result<QueryRequest> {
    let version = reader.u32("GLSL version")?;
    let stage_code = reader.u32("stage")?;
    let stage = StageId::from_value(stage_code)
        .ok_or_else(|| Error::ProtocolError(format!("unknown stage code {}", stage_code)))?;
    let source = reader.string("source")?;
    Ok(QueryRequest { source, version, stage })
}

// ===== RESPONSES =====

/// Messages sent back by the backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// Backend protocol version
    Handshake { protocol_version: u32 },
    /// Active uniforms in declaration order
    Uniforms(Vec<UniformSummary>),
    /// Full reflection
    Reflection(ShaderReflection),
    /// Acknowledges a shutdown request
    Goodbye,
    /// The source was rejected; carries the backend diagnostic
    CompilationFailed(String),
    /// The request itself could not be decoded
    Rejected(String),
}

impl Response {
    /// Human-readable response name for logs and errors
    pub fn kind(&self) -> &'static str {
        match self {
            Response::Handshake { .. } => "handshake",
            Response::Uniforms(_) => "uniforms",
            Response::Reflection(_) => "reflection",
            Response::Goodbye => "goodbye",
            Response::CompilationFailed(_) => "compilation-failed",
            Response::Rejected(_) => "rejected",
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut buffer = Vec::new();
        match self {
            Response::Handshake { protocol_version } => {
                buffer.push(tag::HANDSHAKE);
                put_u32(&mut buffer, *protocol_version);
            }
            Response::Uniforms(summaries) => {
                buffer.push(tag::UNIFORMS);
                put_len(&mut buffer, summaries.len());
                for summary in summaries {
                    put_str(&mut buffer, summary.name());
                    put_u32(&mut buffer, summary.array_size());
                    put_u32(&mut buffer, summary.type_id());
                }
            }
            Response::Reflection(reflection) => {
                buffer.push(tag::REFLECTION);
                put_records(&mut buffer, &reflection.uniforms);
                put_records(&mut buffer, &reflection.blocks);
            }
            Response::Goodbye => buffer.push(tag::GOODBYE),
            Response::CompilationFailed(diagnostic) => {
                buffer.push(tag::COMPILATION_FAILED);
                put_str(&mut buffer, diagnostic);
            }
            Response::Rejected(reason) => {
                buffer.push(tag::REJECTED);
                put_str(&mut buffer, reason);
            }
        }
        buffer
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let mut reader = WireReader::new(bytes);
        let response = match reader.u8("response tag")? {
            tag::HANDSHAKE => Response::Handshake {
                protocol_version: reader.u32("protocol version")?,
            },
            tag::UNIFORMS => {
                let count = reader.count(SUMMARY_MIN_SIZE, "uniform summaries")?;
                let mut summaries = Vec::with_capacity(count);
                for _ in 0..count {
                    let name = reader.string("uniform name")?;
                    let array_size = reader.u32("array size")?;
                    let type_id = reader.u32("type id")?;
                    summaries.push(UniformSummary::new(name, array_size, type_id));
                }
                Response::Uniforms(summaries)
            }
            tag::REFLECTION => {
                let uniforms = read_records(&mut reader, "uniform records")?;
                let blocks = read_records(&mut reader, "block records")?;
                Response::Reflection(ShaderReflection { uniforms, blocks })
            }
            tag::GOODBYE => Response::Goodbye,
            tag::COMPILATION_FAILED => Response::CompilationFailed(reader.string("diagnostic")?),
            tag::REJECTED => Response::Rejected(reader.string("rejection reason")?),
            other => {
                return Err(Error::ProtocolError(format!("unknown response tag 0x{:02X}", other)));
            }
        };

        reader.finish()?;
        Ok(response)
    }
}

/// Decode the response to a uniforms request
///
/// A compilation failure becomes `Error::CompilationError` with the backend
/// diagnostic; any other unexpected response is a `ProtocolError`.
pub fn decode_response(bytes: &[u8]) -> Result<Vec<UniformSummary>> {
    match Response::decode(bytes)? {
        Response::Uniforms(summaries) => Ok(summaries),
        other => Err(unexpected_response(other, "uniforms")),
    }
}

/// Decode the response to a reflect request
pub fn decode_reflection_response(bytes: &[u8]) -> Result<ShaderReflection> {
    match Response::decode(bytes)? {
        Response::Reflection(reflection) => Ok(reflection),
        other => Err(unexpected_response(other, "reflection")),
    }
}

fn unexpected_response(response: Response, expected: &str) -> Error {
    match response {
        Response::CompilationFailed(diagnostic) => Error::CompilationError(diagnostic),
        Response::Rejected(reason) => {
            Error::ProtocolError(format!("backend rejected the request: {}", reason))
        }
        other => Error::ProtocolError(format!(
            "expected a {} response, got {}",
            expected,
            other.kind()
        )),
    }
}

fn put_records(buffer: &mut Vec<u8>, records: &[ReflectionRecord]) {
    put_len(buffer, records.len());
    for record in records {
        put_str(buffer, &record.name);
        put_u32(buffer, record.offset);
        put_u32(buffer, record.type_code);
        put_u32(buffer, record.size);
        put_i32(buffer, record.binding_index);
        put_i32(buffer, record.counter_index);
        put_u32(buffer, record.num_members);
        put_u32(buffer, record.array_stride);
        put_u32(buffer, record.top_level_array_size);
        put_u32(buffer, record.top_level_array_stride);
        put_u32(buffer, record.array_size);
    }
}

fn read_records(reader: &mut WireReader<'_>, what: &str) -> Result<Vec<ReflectionRecord>> {
    let count = reader.count(RECORD_MIN_SIZE, what)?;
    let mut records = Vec::with_capacity(count);
    for _ in 0..count {
        records.push(ReflectionRecord {
            name: reader.string("record name")?,
            offset: reader.u32("offset")?,
            type_code: reader.u32("type code")?,
            size: reader.u32("size")?,
            binding_index: reader.i32("binding index")?,
            counter_index: reader.i32("counter index")?,
            num_members: reader.u32("member count")?,
            array_stride: reader.u32("array stride")?,
            top_level_array_size: reader.u32("top-level array size")?,
            top_level_array_stride: reader.u32("top-level array stride")?,
            array_size: reader.u32("array size")?,
        });
    }
    Ok(records)
}

// ===== FRAMING =====

/// Write one frame and flush
pub fn write_frame<W: Write>(writer: &mut W, payload: &[u8]) -> Result<()> {
    let len = u32::try_from(payload.len()).map_err(|_| {
        Error::ProtocolError(format!("payload of {} bytes does not fit in a frame", payload.len()))
    })?;
    writer.write_all(&len.to_le_bytes())?;
    writer.write_all(payload)?;
    writer.flush()?;
    Ok(())
}

/// Read one frame, or `None` if the stream ended cleanly before a new frame
///
/// An oversized frame is skipped before `ProtocolError` is returned, so the
/// next read starts on a frame boundary.
pub fn try_read_frame<R: Read>(reader: &mut R, max_frame_size: u32) -> Result<Option<Vec<u8>>> {
    let mut header = [0u8; 4];
    let mut filled = 0;
    while filled < header.len() {
        match reader.read(&mut header[filled..]) {
            Ok(0) if filled == 0 => return Ok(None),
            Ok(0) => {
                return Err(Error::Transport("stream ended inside a frame header".to_string()));
            }
            Ok(read) => filled += read,
            Err(error) if error.kind() == io::ErrorKind::Interrupted => continue,
            Err(error) => return Err(error.into()),
        }
    }

    let len = u32::from_le_bytes(header);
    if len > max_frame_size {
        let skipped = io::copy(&mut reader.by_ref().take(u64::from(len)), &mut io::sink())?;
        if skipped < u64::from(len) {
            return Err(Error::Transport("stream ended inside an oversized frame".to_string()));
        }
        return Err(Error::ProtocolError(format!(
            "frame of {} bytes exceeds the {} byte limit",
            len, max_frame_size
        )));
    }

    let mut payload = vec![0u8; len as usize];
    reader.read_exact(&mut payload)?;
    Ok(Some(payload))
}

/// Read one frame; a closed stream is a transport error
pub fn read_frame<R: Read>(reader: &mut R, max_frame_size: u32) -> Result<Vec<u8>> {
    try_read_frame(reader, max_frame_size)?
        .ok_or_else(|| Error::Transport("channel closed by peer".to_string()))
}

// ===== PRIMITIVES =====

fn put_u32(buffer: &mut Vec<u8>, value: u32) {
    buffer.extend_from_slice(&value.to_le_bytes());
}

fn put_i32(buffer: &mut Vec<u8>, value: i32) {
    buffer.extend_from_slice(&value.to_le_bytes());
}

// Lengths beyond u32 never fit in a frame; saturate and let framing reject them.
fn put_len(buffer: &mut Vec<u8>, len: usize) {
    put_u32(buffer, u32::try_from(len).unwrap_or(u32::MAX));
}

fn put_str(buffer: &mut Vec<u8>, value: &str) {
    put_len(buffer, value.len());
    buffer.extend_from_slice(value.as_bytes());
}

/// Bounds-checked cursor over a payload
struct WireReader<'a> {
    bytes: &'a [u8],
    position: usize,
}

impl<'a> WireReader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, position: 0 }
    }

    fn remaining(&self) -> usize {
        self.bytes.len() - self.position
    }

    fn take(&mut self, len: usize, what: &str) -> Result<&'a [u8]> {
        if len > self.remaining() {
            return Err(Error::ProtocolError(format!(
                "truncated {}: needs {} bytes, {} left",
                what,
                len,
                self.remaining()
            )));
        }
        let slice = &self.bytes[self.position..self.position + len];
        self.position += len;
        Ok(slice)
    }

    fn array<const N: usize>(&mut self, what: &str) -> Result<[u8; N]> {
        let slice = self.take(N, what)?;
        let mut array = [0u8; N];
        array.copy_from_slice(slice);
        Ok(array)
    }

    fn u8(&mut self, what: &str) -> Result<u8> {
        Ok(self.array::<1>(what)?[0])
    }

    fn u32(&mut self, what: &str) -> Result<u32> {
        Ok(u32::from_le_bytes(self.array(what)?))
    }

    fn i32(&mut self, what: &str) -> Result<i32> {
        Ok(i32::from_le_bytes(self.array(what)?))
    }

    fn string(&mut self, what: &str) -> Result<String> {
        let len = self.u32(what)? as usize;
        let raw = self.take(len, what)?;
        String::from_utf8(raw.to_vec())
            .map_err(|_| Error::ProtocolError(format!("{} is not valid UTF-8", what)))
    }

    /// Read a record count, checking it against the bytes left before anything is allocated
    fn count(&mut self, min_record_size: usize, what: &str) -> Result<usize> {
        let count = self.u32(what)? as usize;
        match count.checked_mul(min_record_size) {
            Some(needed) if needed <= self.remaining() => Ok(count),
            _ => Err(Error::ProtocolError(format!(
                "{} count {} cannot fit in the {} bytes left",
                what,
                count,
                self.remaining()
            ))),
        }
    }

    fn finish(self) -> Result<()> {
        match self.remaining() {
            0 => Ok(()),
            extra => Err(Error::ProtocolError(format!("{} trailing bytes after message", extra))),
        }
    }
}

#[cfg(test)]
#[path = "protocol_tests.rs"]
mod tests;
