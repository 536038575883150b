//! PowerPC detail decoding.

use std::mem::{offset_of, size_of};

use capstone_sys::{cs_ppc, cs_ppc_op, ppc_bc, ppc_bh, ppc_op_crx, ppc_op_mem, ppc_op_type};
use serde::Serialize;

use super::register;
use crate::blob::{ArchLayout, DetailBlob};
use crate::operand::{OperandQuery, RegisterId};
use crate::Architecture;

pub(crate) const LAYOUT: ArchLayout = ArchLayout {
    arch: Architecture::Ppc,
    size: size_of::<cs_ppc>(),
    op_count: offset_of!(cs_ppc, op_count),
    operands: offset_of!(cs_ppc, operands),
    stride: size_of::<cs_ppc_op>(),
    capacity: (size_of::<cs_ppc>() - offset_of!(cs_ppc, operands)) / size_of::<cs_ppc_op>(),
};

const OP_TYPE: usize = offset_of!(cs_ppc_op, type_);
const OP_VALUE: usize = offset_of!(cs_ppc_op, __bindgen_anon_1);
const MEM_BASE: usize = OP_VALUE + offset_of!(ppc_op_mem, base);
const MEM_DISP: usize = OP_VALUE + offset_of!(ppc_op_mem, disp);
const CRX_SCALE: usize = OP_VALUE + offset_of!(ppc_op_crx, scale);
const CRX_REG: usize = OP_VALUE + offset_of!(ppc_op_crx, reg);
const CRX_COND: usize = OP_VALUE + offset_of!(ppc_op_crx, cond);

const TYPE_REG: u32 = ppc_op_type::PPC_OP_REG as u32;
const TYPE_IMM: u32 = ppc_op_type::PPC_OP_IMM as u32;
const TYPE_MEM: u32 = ppc_op_type::PPC_OP_MEM as u32;
const TYPE_CRX: u32 = ppc_op_type::PPC_OP_CRX as u32;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PpcDetails {
    pub branch_condition: Option<BranchCondition>,
    pub branch_hint: Option<BranchHint>,
    /// The dotted form: CR0 is updated.
    pub update_cr0: bool,
    pub operands: Vec<PpcOperand>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum BranchCondition {
    Lt,
    Le,
    Eq,
    Ge,
    Gt,
    Ne,
    Unordered,
    NotUnordered,
    SummaryOverflow,
    NotSummaryOverflow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum BranchHint {
    /// Predicted taken.
    Plus,
    /// Predicted not taken.
    Minus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PpcOperand {
    Invalid,
    Register(RegisterId),
    Immediate(i64),
    Memory {
        base: RegisterId,
        disp: i32,
    },
    /// A condition-register field test, e.g. `4*cr7+eq`.
    ConditionRegister {
        scale: u32,
        register: RegisterId,
        condition: Option<BranchCondition>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum PpcOperandKind {
    Invalid,
    Register,
    Immediate,
    Memory,
    ConditionRegister,
}

impl PpcOperand {
    pub fn kind(&self) -> PpcOperandKind {
        match self {
            PpcOperand::Invalid => PpcOperandKind::Invalid,
            PpcOperand::Register(_) => PpcOperandKind::Register,
            PpcOperand::Immediate(_) => PpcOperandKind::Immediate,
            PpcOperand::Memory { .. } => PpcOperandKind::Memory,
            PpcOperand::ConditionRegister { .. } => PpcOperandKind::ConditionRegister,
        }
    }
}

impl OperandQuery for PpcDetails {
    type Kind = PpcOperandKind;

    fn operand_count(&self) -> usize {
        self.operands.len()
    }

    fn operand_kind(&self, index: usize) -> Option<PpcOperandKind> {
        self.operands.get(index).map(PpcOperand::kind)
    }
}

/*────────────────────────  decoding  ───────────────────────*/

pub(crate) fn decode(bytes: &[u8]) -> PpcDetails {
    let blob = LAYOUT.bind(bytes);

    let branch_hint = match blob.u32(offset_of!(cs_ppc, bh)) {
        r if r == ppc_bh::PPC_BH_PLUS as u32 => Some(BranchHint::Plus),
        r if r == ppc_bh::PPC_BH_MINUS as u32 => Some(BranchHint::Minus),
        _ => None,
    };

    PpcDetails {
        branch_condition: condition(blob.u32(offset_of!(cs_ppc, bc))),
        branch_hint,
        update_cr0: blob.bool(offset_of!(cs_ppc, update_cr0)),
        operands: LAYOUT.operands(&blob).map(|op| operand(&op)).collect(),
    }
}

/// `ppc_bc` values are BO/BI encodings, not a dense range.
fn condition(raw: u32) -> Option<BranchCondition> {
    const TABLE: [(ppc_bc, BranchCondition); 10] = [
        (ppc_bc::PPC_BC_LT, BranchCondition::Lt),
        (ppc_bc::PPC_BC_LE, BranchCondition::Le),
        (ppc_bc::PPC_BC_EQ, BranchCondition::Eq),
        (ppc_bc::PPC_BC_GE, BranchCondition::Ge),
        (ppc_bc::PPC_BC_GT, BranchCondition::Gt),
        (ppc_bc::PPC_BC_NE, BranchCondition::Ne),
        (ppc_bc::PPC_BC_UN, BranchCondition::Unordered),
        (ppc_bc::PPC_BC_NU, BranchCondition::NotUnordered),
        (ppc_bc::PPC_BC_SO, BranchCondition::SummaryOverflow),
        (ppc_bc::PPC_BC_NS, BranchCondition::NotSummaryOverflow),
    ];
    TABLE
        .iter()
        .find(|(bc, _)| *bc as u32 == raw)
        .map(|(_, cond)| *cond)
}

fn operand(op: &DetailBlob<'_>) -> PpcOperand {
    match op.u32(OP_TYPE) {
        TYPE_REG => PpcOperand::Register(register(op.u32(OP_VALUE))),
        TYPE_IMM => PpcOperand::Immediate(op.i64(OP_VALUE)),
        TYPE_MEM => PpcOperand::Memory {
            base: register(op.u32(MEM_BASE)),
            disp: op.i32(MEM_DISP),
        },
        TYPE_CRX => PpcOperand::ConditionRegister {
            scale: op.u32(CRX_SCALE),
            register: register(op.u32(CRX_REG)),
            condition: condition(op.u32(CRX_COND)),
        },
        _ => PpcOperand::Invalid,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blob::BlobWriter;

    fn op_offset(index: usize) -> usize {
        LAYOUT.operands + index * LAYOUT.stride
    }

    #[test]
    fn test_branch_flags() {
        let mut w = BlobWriter::new(LAYOUT.size);
        w.u32(offset_of!(cs_ppc, bc), ppc_bc::PPC_BC_NE as u32)
            .u32(offset_of!(cs_ppc, bh), ppc_bh::PPC_BH_MINUS as u32)
            .u8(offset_of!(cs_ppc, update_cr0), 1);
        let details = decode(&w.bytes);
        assert_eq!(details.branch_condition, Some(BranchCondition::Ne));
        assert_eq!(details.branch_hint, Some(BranchHint::Minus));
        assert!(details.update_cr0);
        assert!(details.operands.is_empty());
    }

    #[test]
    fn test_crx_operand() {
        let mut w = BlobWriter::new(LAYOUT.size);
        w.u8(LAYOUT.op_count, 2)
            .u32(op_offset(0) + OP_TYPE, TYPE_CRX)
            .u32(op_offset(0) + CRX_SCALE, 4)
            .u32(op_offset(0) + CRX_REG, 51)
            .u32(op_offset(0) + CRX_COND, ppc_bc::PPC_BC_EQ as u32)
            .u32(op_offset(1) + OP_TYPE, TYPE_MEM)
            .u32(op_offset(1) + MEM_BASE, 4)
            .i32(op_offset(1) + MEM_DISP, 8);
        let details = decode(&w.bytes);
        assert_eq!(
            details.operands[0],
            PpcOperand::ConditionRegister {
                scale: 4,
                register: 51,
                condition: Some(BranchCondition::Eq),
            }
        );
        assert_eq!(details.operands[1], PpcOperand::Memory { base: 4, disp: 8 });
        assert_eq!(details.count_operands_of_kind(PpcOperandKind::ConditionRegister), 1);
    }
}
