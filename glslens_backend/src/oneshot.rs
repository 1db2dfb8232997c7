/// Line-oriented one-shot mode (`glslens-backend --oneshot`)
///
/// Input: the GLSL version on the first line, the stage (numeric code or tag)
/// on the second, the shader source on the remaining lines. Output: one
/// `name arraySize typeId` line per active uniform.

use std::io::{Read, Write};
use glslens::{Error, Result, StageId, UniformSummary};
use crate::reflect::reflect;

/// Parsed one-shot input
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OneshotInput {
    pub version: u32,
    pub stage: StageId,
    pub source: String,
}

impl OneshotInput {
    pub fn parse(text: &str) -> Result<Self> {
        let mut lines = text.splitn(3, '\n');

        let version_line = lines.next().unwrap_or_default().trim();
        let version = version_line
            .parse::<u32>()
            .map_err(|_| Error::ProtocolError(format!("invalid version line '{}'", version_line)))?;

        let stage_line = lines
            .next()
            .ok_or_else(|| Error::ProtocolError("missing stage line".to_string()))?
            .trim();
        let stage = match stage_line.parse::<u32>() {
            Ok(code) => StageId::from_value(code),
            Err(_) => StageId::parse(stage_line),
        }
        .ok_or_else(|| Error::UnknownStage(stage_line.to_string()))?;

        Ok(Self {
            version,
            stage,
            source: lines.next().unwrap_or_default().to_string(),
        })
    }
}

/// `name arraySize typeId` lines
pub fn format_summaries(summaries: &[UniformSummary]) -> String {
    summaries
        .iter()
        .map(|summary| format!("{} {} {}\n", summary.name(), summary.array_size(), summary.type_id()))
        .collect()
}

/// Read the whole input, reflect it and print the summaries
///
/// Returns the number of uniforms printed.
pub fn run<R: Read, W: Write>(input: &mut R, output: &mut W) -> Result<usize> {
    let mut text = String::new();
    input.read_to_string(&mut text)?;

    let request = OneshotInput::parse(&text)?;
    let summaries = reflect(&request.source, request.version, request.stage)?.summaries();

    output.write_all(format_summaries(&summaries).as_bytes())?;
    output.flush()?;
    Ok(summaries.len())
}

#[cfg(test)]
#[path = "oneshot_tests.rs"]
mod tests;
