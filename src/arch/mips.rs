//! MIPS detail decoding. The engine reports no per-operand access here.

use std::mem::{offset_of, size_of};

use capstone_sys::{cs_mips, cs_mips_op, mips_op_mem, mips_op_type};
use serde::Serialize;

use super::register;
use crate::blob::{ArchLayout, DetailBlob};
use crate::operand::{OperandQuery, RegisterId};
use crate::Architecture;

pub(crate) const LAYOUT: ArchLayout = ArchLayout {
    arch: Architecture::Mips,
    size: size_of::<cs_mips>(),
    op_count: offset_of!(cs_mips, op_count),
    operands: offset_of!(cs_mips, operands),
    stride: size_of::<cs_mips_op>(),
    capacity: (size_of::<cs_mips>() - offset_of!(cs_mips, operands)) / size_of::<cs_mips_op>(),
};

const OP_TYPE: usize = offset_of!(cs_mips_op, type_);
const OP_VALUE: usize = offset_of!(cs_mips_op, __bindgen_anon_1);
const MEM_BASE: usize = OP_VALUE + offset_of!(mips_op_mem, base);
const MEM_DISP: usize = OP_VALUE + offset_of!(mips_op_mem, disp);

const TYPE_REG: u32 = mips_op_type::MIPS_OP_REG as u32;
const TYPE_IMM: u32 = mips_op_type::MIPS_OP_IMM as u32;
const TYPE_MEM: u32 = mips_op_type::MIPS_OP_MEM as u32;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MipsDetails {
    pub operands: Vec<MipsOperand>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MipsOperand {
    Invalid,
    Register(RegisterId),
    Immediate(i64),
    Memory { base: RegisterId, disp: i64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum MipsOperandKind {
    Invalid,
    Register,
    Immediate,
    Memory,
}

impl MipsOperand {
    pub fn kind(&self) -> MipsOperandKind {
        match self {
            MipsOperand::Invalid => MipsOperandKind::Invalid,
            MipsOperand::Register(_) => MipsOperandKind::Register,
            MipsOperand::Immediate(_) => MipsOperandKind::Immediate,
            MipsOperand::Memory { .. } => MipsOperandKind::Memory,
        }
    }
}

impl OperandQuery for MipsDetails {
    type Kind = MipsOperandKind;

    fn operand_count(&self) -> usize {
        self.operands.len()
    }

    fn operand_kind(&self, index: usize) -> Option<MipsOperandKind> {
        self.operands.get(index).map(MipsOperand::kind)
    }
}

pub(crate) fn decode(bytes: &[u8]) -> MipsDetails {
    let blob = LAYOUT.bind(bytes);
    MipsDetails {
        operands: LAYOUT.operands(&blob).map(|op| operand(&op)).collect(),
    }
}

fn operand(op: &DetailBlob<'_>) -> MipsOperand {
    match op.u32(OP_TYPE) {
        TYPE_REG => MipsOperand::Register(register(op.u32(OP_VALUE))),
        TYPE_IMM => MipsOperand::Immediate(op.i64(OP_VALUE)),
        TYPE_MEM => MipsOperand::Memory {
            base: register(op.u32(MEM_BASE)),
            disp: op.i64(MEM_DISP),
        },
        _ => MipsOperand::Invalid,
    }
}
