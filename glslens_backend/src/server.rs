/// Request loop of the `glslens-backend` executable
///
/// Reads framed requests until a Shutdown request or end of input and writes
/// one framed response per request. Oversized frames and requests that cannot
/// be decoded are answered with `Rejected` and the loop keeps going.

use std::io::{Read, Write};
use glslens::protocol::{self, Request, Response, PROTOCOL_VERSION};
use glslens::{Error, Result};
use crate::reflect::reflect;

const SOURCE: &str = "glslens_backend::server";

/// Why `serve` returned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServeExit {
    /// The client sent a Shutdown request
    Shutdown,
    /// The input reached end of file between frames
    EndOfInput,
}

/// Serve requests from `input` until shutdown or end of input
///
/// # Errors
///
/// I/O failures and truncated frames end the loop with an error, since the
/// stream cannot be resynchronized after them.
pub fn serve<R: Read, W: Write>(input: &mut R, output: &mut W, max_frame_size: u32) -> Result<ServeExit> {
    glslens::glslens_debug!(SOURCE, "Serving protocol version {}", PROTOCOL_VERSION);
    let mut served: u64 = 0;

    loop {
        let frame = match protocol::try_read_frame(input, max_frame_size) {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                glslens::glslens_debug!(SOURCE, "Input closed after {} request(s)", served);
                return Ok(ServeExit::EndOfInput);
            }
            // The frame was skipped, the next one starts on a boundary
            Err(Error::ProtocolError(reason)) => {
                served += 1;
                glslens::glslens_warn!(SOURCE, "Rejecting request #{}: {}", served, reason);
                protocol::write_frame(output, &Response::Rejected(reason).encode())?;
                continue;
            }
            Err(err) => return Err(err),
        };
        served += 1;

        let request = match Request::decode(&frame) {
            Ok(request) => request,
            Err(err) => {
                glslens::glslens_warn!(SOURCE, "Rejecting request #{}: {}", served, err);
                protocol::write_frame(output, &Response::Rejected(err.to_string()).encode())?;
                continue;
            }
        };

        glslens::glslens_trace!(SOURCE, "Request #{}: {}", served, request.kind());
        let response = respond(&request);
        protocol::write_frame(output, &response.encode())?;

        if matches!(request, Request::Shutdown) {
            glslens::glslens_debug!(SOURCE, "Shutdown requested after {} request(s)", served);
            return Ok(ServeExit::Shutdown);
        }
    }
}

/// Response to a single decoded request
pub fn respond(request: &Request) -> Response {
    match request {
        Request::Handshake { protocol_version } => {
            if *protocol_version != PROTOCOL_VERSION {
                glslens::glslens_warn!(
                    SOURCE,
                    "Client speaks protocol {}, backend speaks {}",
                    protocol_version,
                    PROTOCOL_VERSION
                );
            }
            Response::Handshake { protocol_version: PROTOCOL_VERSION }
        }
        Request::Uniforms(query) => match reflect(&query.source, query.version, query.stage) {
            Ok(reflection) => Response::Uniforms(reflection.summaries()),
            Err(err) => compilation_failed(err),
        },
        Request::Reflect(query) => match reflect(&query.source, query.version, query.stage) {
            Ok(reflection) => Response::Reflection(reflection),
            Err(err) => compilation_failed(err),
        },
        Request::Shutdown => Response::Goodbye,
    }
}

fn compilation_failed(err: glslens::Error) -> Response {
    let diagnostic = err.diagnostic().map(str::to_string).unwrap_or_else(|| err.to_string());
    glslens::glslens_debug!(SOURCE, "Compilation failed: {}", diagnostic);
    Response::CompilationFailed(diagnostic)
}

#[cfg(test)]
#[path = "server_tests.rs"]
mod tests;
