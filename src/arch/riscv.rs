//! RISC-V detail decoding.

use std::mem::{offset_of, size_of};

use capstone_sys::{cs_riscv, cs_riscv_op, riscv_op_mem, riscv_op_type};
use serde::Serialize;

use super::register;
use crate::blob::{ArchLayout, DetailBlob};
use crate::operand::{OperandQuery, RegisterId};
use crate::Architecture;

pub(crate) const LAYOUT: ArchLayout = ArchLayout {
    arch: Architecture::RiscV,
    size: size_of::<cs_riscv>(),
    op_count: offset_of!(cs_riscv, op_count),
    operands: offset_of!(cs_riscv, operands),
    stride: size_of::<cs_riscv_op>(),
    capacity: (size_of::<cs_riscv>() - offset_of!(cs_riscv, operands))
        / size_of::<cs_riscv_op>(),
};

const OP_TYPE: usize = offset_of!(cs_riscv_op, type_);
const OP_VALUE: usize = offset_of!(cs_riscv_op, __bindgen_anon_1);
const MEM_BASE: usize = OP_VALUE + offset_of!(riscv_op_mem, base);
const MEM_DISP: usize = OP_VALUE + offset_of!(riscv_op_mem, disp);

const TYPE_REG: u32 = riscv_op_type::RISCV_OP_REG as u32;
const TYPE_IMM: u32 = riscv_op_type::RISCV_OP_IMM as u32;
const TYPE_MEM: u32 = riscv_op_type::RISCV_OP_MEM as u32;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RiscVDetails {
    /// The instruction computes an effective address (loads, stores, atomics).
    pub need_effective_addr: bool,
    pub operands: Vec<RiscVOperand>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RiscVOperand {
    Invalid,
    Register(RegisterId),
    Immediate(i64),
    Memory { base: RegisterId, disp: i64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum RiscVOperandKind {
    Invalid,
    Register,
    Immediate,
    Memory,
}

impl RiscVOperand {
    pub fn kind(&self) -> RiscVOperandKind {
        match self {
            RiscVOperand::Invalid => RiscVOperandKind::Invalid,
            RiscVOperand::Register(_) => RiscVOperandKind::Register,
            RiscVOperand::Immediate(_) => RiscVOperandKind::Immediate,
            RiscVOperand::Memory { .. } => RiscVOperandKind::Memory,
        }
    }
}

impl OperandQuery for RiscVDetails {
    type Kind = RiscVOperandKind;

    fn operand_count(&self) -> usize {
        self.operands.len()
    }

    fn operand_kind(&self, index: usize) -> Option<RiscVOperandKind> {
        self.operands.get(index).map(RiscVOperand::kind)
    }
}

pub(crate) fn decode(bytes: &[u8]) -> RiscVDetails {
    let blob = LAYOUT.bind(bytes);
    RiscVDetails {
        need_effective_addr: blob.bool(offset_of!(cs_riscv, need_effective_addr)),
        operands: LAYOUT.operands(&blob).map(|op| operand(&op)).collect(),
    }
}

fn operand(op: &DetailBlob<'_>) -> RiscVOperand {
    match op.u32(OP_TYPE) {
        TYPE_REG => RiscVOperand::Register(register(op.u32(OP_VALUE))),
        TYPE_IMM => RiscVOperand::Immediate(op.i64(OP_VALUE)),
        TYPE_MEM => RiscVOperand::Memory {
            base: register(op.u32(MEM_BASE)),
            disp: op.i64(MEM_DISP),
        },
        _ => RiscVOperand::Invalid,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blob::BlobWriter;

    #[test]
    fn test_store_operands() {
        let mut w = BlobWriter::new(LAYOUT.size);
        let op = |i: usize| LAYOUT.operands + i * LAYOUT.stride;
        w.u8(offset_of!(cs_riscv, need_effective_addr), 1)
            .u8(LAYOUT.op_count, 2)
            .u32(op(0) + OP_TYPE, TYPE_REG)
            .u32(op(0) + OP_VALUE, 11)
            .u32(op(1) + OP_TYPE, TYPE_MEM)
            .u32(op(1) + MEM_BASE, 3)
            .i64(op(1) + MEM_DISP, -16);

        let details = decode(&w.bytes);
        assert!(details.need_effective_addr);
        assert_eq!(details.operands[1], RiscVOperand::Memory { base: 3, disp: -16 });
        assert_eq!(details.nth_operand_index_of_kind(RiscVOperandKind::Register, 1), Some(0));
        assert_eq!(LAYOUT.capacity, 8);
    }
}
