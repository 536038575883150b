//! The unified, immutable view of one decoded instruction.

use std::fmt;

use serde::Serialize;

use crate::arch::ArchDetails;
use crate::operand::{GroupId, RegisterId};
use crate::{Address, Architecture, DetailError, RawDecodeRecord};

/// Typed detail of one instruction. Only present when the session decodes detail.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InstructionDetails {
    /// Registers read, explicit and implicit, as the oracle reports them.
    pub regs_read: Vec<RegisterId>,
    pub regs_write: Vec<RegisterId>,
    pub groups: Vec<GroupId>,
    /// Some operand updates its base register.
    pub writeback: bool,
    pub arch: ArchDetails,
}

impl InstructionDetails {
    pub fn architecture(&self) -> Architecture {
        self.arch.architecture()
    }

    pub fn reads(&self, reg: RegisterId) -> bool {
        self.regs_read.contains(&reg)
    }

    pub fn writes(&self, reg: RegisterId) -> bool {
        self.regs_write.contains(&reg)
    }

    pub fn in_group(&self, group: GroupId) -> bool {
        self.groups.contains(&group)
    }
}

/// One decoded instruction, or the placeholder for an undecodable byte.
///
/// `bytes.len() == size` always holds, and `id == 0` only for placeholders
/// built by [`DecodedInstruction::bad_byte`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DecodedInstruction {
    pub id: u32,
    /// Canonical id when this decode is an alias, otherwise `id`.
    pub alias_id: u32,
    pub address: Address,
    pub size: u16,
    pub bytes: Vec<u8>,
    pub mnemonic: String,
    pub operand_text: String,
    pub is_alias: bool,
    pub uses_alias_details: bool,
    /// `None` when detail is off for the session; that is not an error.
    pub details: Option<InstructionDetails>,
    pub architecture: Architecture,
}

impl DecodedInstruction {
    /// Placeholder for a byte nothing decodes at: id 0, size 1, no text, no details.
    pub fn bad_byte(architecture: Architecture, address: Address, byte: u8) -> Self {
        Self {
            id: 0,
            alias_id: 0,
            address,
            size: 1,
            bytes: vec![byte],
            mnemonic: String::new(),
            operand_text: String::new(),
            is_alias: false,
            uses_alias_details: false,
            details: None,
            architecture,
        }
    }

    /// Fails with `ByteSpanMismatch` unless the record's byte span is exactly `size` long.
    pub(crate) fn from_record(
        architecture: Architecture,
        record: RawDecodeRecord,
        details: Option<InstructionDetails>,
    ) -> Result<Self, DetailError> {
        if record.bytes.len() != usize::from(record.size) {
            return Err(DetailError::ByteSpanMismatch {
                address: record.address,
                size: record.size,
                actual: record.bytes.len(),
            });
        }

        Ok(Self {
            id: record.id,
            alias_id: record.alias_id,
            address: record.address,
            size: record.size,
            bytes: record.bytes,
            mnemonic: record.mnemonic,
            operand_text: record.op_str,
            is_alias: record.is_alias,
            uses_alias_details: record.uses_alias_details,
            details,
            architecture,
        })
    }

    pub fn is_bad_byte(&self) -> bool {
        self.id == 0
    }

    /// Address of the first byte after this instruction.
    pub fn end_address(&self) -> Address {
        self.address + Address::from(self.size)
    }

    /// Encoding bytes as space-separated hex.
    pub fn hex_bytes(&self) -> String {
        self.bytes
            .iter()
            .map(|b| format!("{:02x}", b))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl fmt::Display for DecodedInstruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let (true, Some(byte)) = (self.is_bad_byte(), self.bytes.first()) {
            return write!(f, ".byte\t{:#04x}", byte);
        }
        if self.operand_text.is_empty() {
            write!(f, "{}", self.mnemonic)
        } else {
            write!(f, "{}\t{}", self.mnemonic, self.operand_text)
        }
    }
}
