//! CSV output formatter

use serde::Serialize;

use super::InstructionFormatter;
use crate::{DecodedInstruction, DetailError, RegisterId};

/// One row per instruction; register sets are space-separated ids.
pub struct CsvFormatter;

#[derive(Serialize)]
struct CsvRow<'a> {
    address: String,
    size: u16,
    id: u32,
    mnemonic: &'a str,
    operands: &'a str,
    bytes: String,
    operand_count: Option<u8>,
    regs_read: String,
    regs_write: String,
    groups: String,
}

fn join<T: ToString>(values: &[T]) -> String {
    values
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" ")
}

fn csv_error(e: impl std::fmt::Display) -> DetailError {
    DetailError::Format(format!("CSV error: {}", e))
}

impl InstructionFormatter for CsvFormatter {
    fn format(&self, insns: &[DecodedInstruction]) -> Result<String, DetailError> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        let empty: &[RegisterId] = &[];

        for insn in insns {
            let details = insn.details.as_ref();
            writer
                .serialize(CsvRow {
                    address: format!("0x{:x}", insn.address),
                    size: insn.size,
                    id: insn.id,
                    mnemonic: &insn.mnemonic,
                    operands: &insn.operand_text,
                    bytes: insn.hex_bytes(),
                    operand_count: details.map(|d| d.arch.op_count()),
                    regs_read: join(details.map_or(empty, |d| d.regs_read.as_slice())),
                    regs_write: join(details.map_or(empty, |d| d.regs_write.as_slice())),
                    groups: details.map_or_else(String::new, |d| join(&d.groups)),
                })
                .map_err(csv_error)?;
        }

        let bytes = writer.into_inner().map_err(csv_error)?;
        String::from_utf8(bytes).map_err(csv_error)
    }
}
