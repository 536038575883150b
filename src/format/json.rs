//! JSON and JSON Lines output formatters

use serde::Serialize;

use super::InstructionFormatter;
use crate::instruction::InstructionDetails;
use crate::{Architecture, DecodedInstruction, DetailError};

/// Pretty-printed JSON array of instructions.
pub struct JsonFormatter;

/// One compact JSON object per instruction, newline separated.
pub struct JsonLinesFormatter;

/// Serializable instruction for JSON output
#[derive(Serialize)]
struct InstructionJson<'a> {
    address: String,
    size: u16,
    id: u32,
    #[serde(skip_serializing_if = "is_false")]
    bad_byte: bool,
    mnemonic: &'a str,
    operands: &'a str,
    bytes: String,
    architecture: Architecture,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<&'a InstructionDetails>,
}

fn is_false(value: &bool) -> bool {
    !*value
}

fn instruction_to_json(insn: &DecodedInstruction) -> InstructionJson<'_> {
    InstructionJson {
        address: format!("0x{:x}", insn.address),
        size: insn.size,
        id: insn.id,
        bad_byte: insn.is_bad_byte(),
        mnemonic: &insn.mnemonic,
        operands: &insn.operand_text,
        bytes: insn.hex_bytes(),
        architecture: insn.architecture,
        details: insn.details.as_ref(),
    }
}

fn json_error(e: serde_json::Error) -> DetailError {
    DetailError::Format(format!("JSON serialization error: {}", e))
}

impl InstructionFormatter for JsonFormatter {
    fn format(&self, insns: &[DecodedInstruction]) -> Result<String, DetailError> {
        let instructions: Vec<_> = insns.iter().map(instruction_to_json).collect();
        serde_json::to_string_pretty(&instructions).map_err(json_error)
    }
}

impl InstructionFormatter for JsonLinesFormatter {
    fn format(&self, insns: &[DecodedInstruction]) -> Result<String, DetailError> {
        let mut output = String::new();
        for insn in insns {
            output.push_str(&serde_json::to_string(&instruction_to_json(insn)).map_err(json_error)?);
            output.push('\n');
        }
        Ok(output)
    }
}
