//! AArch64 detail decoding.

use std::mem::{offset_of, size_of};

use capstone_sys::{
    arm64_insn, arm64_op_mem, arm64_op_type, cs_arm64, cs_arm64_op, cs_arm64_op__bindgen_ty_1,
};
use serde::Serialize;

use super::{optional_register, register};
use crate::blob::{ArchLayout, DetailBlob};
use crate::operand::{AccessKind, OperandQuery, RegisterId};
use crate::Architecture;

pub(crate) const LAYOUT: ArchLayout = ArchLayout {
    arch: Architecture::AArch64,
    size: size_of::<cs_arm64>(),
    op_count: offset_of!(cs_arm64, op_count),
    operands: offset_of!(cs_arm64, operands),
    stride: size_of::<cs_arm64_op>(),
    capacity: (size_of::<cs_arm64>() - offset_of!(cs_arm64, operands))
        / size_of::<cs_arm64_op>(),
};

const OP_VECTOR_INDEX: usize = offset_of!(cs_arm64_op, vector_index);
const OP_VAS: usize = offset_of!(cs_arm64_op, vas);
const OP_SHIFT_TYPE: usize =
    offset_of!(cs_arm64_op, shift) + offset_of!(cs_arm64_op__bindgen_ty_1, type_);
const OP_SHIFT_VALUE: usize =
    offset_of!(cs_arm64_op, shift) + offset_of!(cs_arm64_op__bindgen_ty_1, value);
const OP_EXT: usize = offset_of!(cs_arm64_op, ext);
const OP_TYPE: usize = offset_of!(cs_arm64_op, type_);
const OP_VALUE: usize = offset_of!(cs_arm64_op, __bindgen_anon_1);
const OP_ACCESS: usize = offset_of!(cs_arm64_op, access);

const MEM_BASE: usize = OP_VALUE + offset_of!(arm64_op_mem, base);
const MEM_INDEX: usize = OP_VALUE + offset_of!(arm64_op_mem, index);
const MEM_DISP: usize = OP_VALUE + offset_of!(arm64_op_mem, disp);

const TYPE_REG: u32 = arm64_op_type::ARM64_OP_REG as u32;
const TYPE_IMM: u32 = arm64_op_type::ARM64_OP_IMM as u32;
const TYPE_MEM: u32 = arm64_op_type::ARM64_OP_MEM as u32;
const TYPE_FP: u32 = arm64_op_type::ARM64_OP_FP as u32;
const TYPE_CIMM: u32 = arm64_op_type::ARM64_OP_CIMM as u32;
const TYPE_REG_MRS: u32 = arm64_op_type::ARM64_OP_REG_MRS as u32;
const TYPE_REG_MSR: u32 = arm64_op_type::ARM64_OP_REG_MSR as u32;
const TYPE_PSTATE: u32 = arm64_op_type::ARM64_OP_PSTATE as u32;
const TYPE_SYS: u32 = arm64_op_type::ARM64_OP_SYS as u32;
const TYPE_PREFETCH: u32 = arm64_op_type::ARM64_OP_PREFETCH as u32;
const TYPE_BARRIER: u32 = arm64_op_type::ARM64_OP_BARRIER as u32;

const INS_MRS: u32 = arm64_insn::ARM64_INS_MRS as u32;
const INS_MSR: u32 = arm64_insn::ARM64_INS_MSR as u32;

/*────────────────────────  model  ───────────────────────*/

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AArch64Details {
    pub condition: Option<AArch64Condition>,
    pub update_flags: bool,
    pub writeback: bool,
    pub operands: Vec<AArch64Operand>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum AArch64Condition {
    Eq,
    Ne,
    Hs,
    Lo,
    Mi,
    Pl,
    Vs,
    Vc,
    Hi,
    Ls,
    Ge,
    Lt,
    Gt,
    Le,
    Al,
    Nv,
}

const CONDITIONS: [AArch64Condition; 16] = [
    AArch64Condition::Eq,
    AArch64Condition::Ne,
    AArch64Condition::Hs,
    AArch64Condition::Lo,
    AArch64Condition::Mi,
    AArch64Condition::Pl,
    AArch64Condition::Vs,
    AArch64Condition::Vc,
    AArch64Condition::Hi,
    AArch64Condition::Ls,
    AArch64Condition::Ge,
    AArch64Condition::Lt,
    AArch64Condition::Gt,
    AArch64Condition::Le,
    AArch64Condition::Al,
    AArch64Condition::Nv,
];

/// Vector arrangement specifier, e.g. `.16b` or `.2d`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum VectorArrangement {
    B16,
    B8,
    B4,
    B1,
    H8,
    H4,
    H2,
    H1,
    S4,
    S2,
    S1,
    D2,
    D1,
    Q1,
}

const ARRANGEMENTS: [VectorArrangement; 14] = [
    VectorArrangement::B16,
    VectorArrangement::B8,
    VectorArrangement::B4,
    VectorArrangement::B1,
    VectorArrangement::H8,
    VectorArrangement::H4,
    VectorArrangement::H2,
    VectorArrangement::H1,
    VectorArrangement::S4,
    VectorArrangement::S2,
    VectorArrangement::S1,
    VectorArrangement::D2,
    VectorArrangement::D1,
    VectorArrangement::Q1,
];

impl VectorArrangement {
    /// Number of lanes and lane width in bits.
    pub fn shape(self) -> (u32, u32) {
        match self {
            VectorArrangement::B16 => (16, 8),
            VectorArrangement::B8 => (8, 8),
            VectorArrangement::B4 => (4, 8),
            VectorArrangement::B1 => (1, 8),
            VectorArrangement::H8 => (8, 16),
            VectorArrangement::H4 => (4, 16),
            VectorArrangement::H2 => (2, 16),
            VectorArrangement::H1 => (1, 16),
            VectorArrangement::S4 => (4, 32),
            VectorArrangement::S2 => (2, 32),
            VectorArrangement::S1 => (1, 32),
            VectorArrangement::D2 => (2, 64),
            VectorArrangement::D1 => (1, 64),
            VectorArrangement::Q1 => (1, 128),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum AArch64ShiftOp {
    Lsl,
    /// Shift left, filling with ones.
    Msl,
    Lsr,
    Asr,
    Ror,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AArch64Shift {
    pub op: AArch64ShiftOp,
    pub amount: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Extender {
    Uxtb,
    Uxth,
    Uxtw,
    Uxtx,
    Sxtb,
    Sxth,
    Sxtw,
    Sxtx,
}

const EXTENDERS: [Extender; 8] = [
    Extender::Uxtb,
    Extender::Uxth,
    Extender::Uxtw,
    Extender::Uxtx,
    Extender::Sxtb,
    Extender::Sxth,
    Extender::Sxtw,
    Extender::Sxtx,
];

/// Direction of a system-register operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum SystemRegisterAccess {
    /// Source of an `mrs`.
    Mrs,
    /// Destination of an `msr`.
    Msr,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AArch64Operand {
    pub value: AArch64OperandValue,
    pub access: AccessKind,
    pub vector_index: Option<u32>,
    pub arrangement: Option<VectorArrangement>,
    pub shift: Option<AArch64Shift>,
    pub extender: Option<Extender>,
}

impl AArch64Operand {
    pub fn is_vector_register(&self) -> bool {
        matches!(self.value, AArch64OperandValue::Register(_))
            && (self.arrangement.is_some() || self.vector_index.is_some())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum AArch64OperandValue {
    Invalid,
    Register(RegisterId),
    Immediate(i64),
    Memory(AArch64Memory),
    FloatingPoint(f64),
    CoprocImmediate(i64),
    /// `raw` is the `arm64_sysreg` encoding, e.g. `0xc000` for `MIDR_EL1`.
    SystemRegister {
        subtype: SystemRegisterAccess,
        raw: u32,
    },
    /// `arm64_pstate` field written by `msr`.
    PState(u32),
    /// IC/DC/AT/TLBI operation, `arm64_sys_op` numbering.
    System(u32),
    Prefetch(u32),
    Barrier(u32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AArch64Memory {
    pub base: RegisterId,
    pub index: Option<RegisterId>,
    pub disp: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum AArch64OperandKind {
    Invalid,
    Register,
    Immediate,
    Memory,
    FloatingPoint,
    CoprocImmediate,
    SystemRegister(SystemRegisterAccess),
    PState,
    System,
    Prefetch,
    Barrier,
}

impl AArch64OperandValue {
    pub fn kind(&self) -> AArch64OperandKind {
        match self {
            AArch64OperandValue::Invalid => AArch64OperandKind::Invalid,
            AArch64OperandValue::Register(_) => AArch64OperandKind::Register,
            AArch64OperandValue::Immediate(_) => AArch64OperandKind::Immediate,
            AArch64OperandValue::Memory(_) => AArch64OperandKind::Memory,
            AArch64OperandValue::FloatingPoint(_) => AArch64OperandKind::FloatingPoint,
            AArch64OperandValue::CoprocImmediate(_) => AArch64OperandKind::CoprocImmediate,
            AArch64OperandValue::SystemRegister { subtype, .. } => {
                AArch64OperandKind::SystemRegister(*subtype)
            }
            AArch64OperandValue::PState(_) => AArch64OperandKind::PState,
            AArch64OperandValue::System(_) => AArch64OperandKind::System,
            AArch64OperandValue::Prefetch(_) => AArch64OperandKind::Prefetch,
            AArch64OperandValue::Barrier(_) => AArch64OperandKind::Barrier,
        }
    }
}

impl OperandQuery for AArch64Details {
    type Kind = AArch64OperandKind;

    fn operand_count(&self) -> usize {
        self.operands.len()
    }

    fn operand_kind(&self, index: usize) -> Option<AArch64OperandKind> {
        self.operands.get(index).map(|op| op.value.kind())
    }
}

/*────────────────────────  decoding  ───────────────────────*/

/// Decode the detail of instruction `id`.
///
/// The system-register operand of `mrs`/`msr` arrives as a plain SYS operand;
/// `id` decides whether it is the source or the destination.
pub(crate) fn decode(bytes: &[u8], id: u32) -> AArch64Details {
    let blob = LAYOUT.bind(bytes);
    let sysreg = match id {
        INS_MRS => Some(SystemRegisterAccess::Mrs),
        INS_MSR => Some(SystemRegisterAccess::Msr),
        _ => None,
    };

    AArch64Details {
        condition: from_table(&CONDITIONS, blob.u32(offset_of!(cs_arm64, cc))),
        update_flags: blob.bool(offset_of!(cs_arm64, update_flags)),
        writeback: blob.bool(offset_of!(cs_arm64, writeback)),
        operands: LAYOUT.operands(&blob).map(|op| operand(&op, sysreg)).collect(),
    }
}

/// Look up a 1-based oracle enum value; 0 and out-of-range values are absent.
fn from_table<T: Copy>(table: &[T], raw: u32) -> Option<T> {
    table.get((raw as usize).wrapping_sub(1)).copied()
}

fn operand(op: &DetailBlob<'_>, sysreg: Option<SystemRegisterAccess>) -> AArch64Operand {
    let value = match op.u32(OP_TYPE) {
        TYPE_REG => AArch64OperandValue::Register(register(op.u32(OP_VALUE))),
        TYPE_IMM => AArch64OperandValue::Immediate(op.i64(OP_VALUE)),
        TYPE_MEM => AArch64OperandValue::Memory(AArch64Memory {
            base: register(op.u32(MEM_BASE)),
            index: optional_register(op.u32(MEM_INDEX)),
            disp: op.i32(MEM_DISP),
        }),
        TYPE_FP => AArch64OperandValue::FloatingPoint(op.f64(OP_VALUE)),
        TYPE_CIMM => AArch64OperandValue::CoprocImmediate(op.i64(OP_VALUE)),
        TYPE_REG_MRS => AArch64OperandValue::SystemRegister {
            subtype: SystemRegisterAccess::Mrs,
            raw: op.u32(OP_VALUE),
        },
        TYPE_REG_MSR => AArch64OperandValue::SystemRegister {
            subtype: SystemRegisterAccess::Msr,
            raw: op.u32(OP_VALUE),
        },
        TYPE_PSTATE => AArch64OperandValue::PState(op.u32(OP_VALUE)),
        TYPE_SYS => match sysreg {
            Some(subtype) => AArch64OperandValue::SystemRegister {
                subtype,
                raw: op.u32(OP_VALUE),
            },
            None => AArch64OperandValue::System(op.u32(OP_VALUE)),
        },
        TYPE_PREFETCH => AArch64OperandValue::Prefetch(op.u32(OP_VALUE)),
        TYPE_BARRIER => AArch64OperandValue::Barrier(op.u32(OP_VALUE)),
        _ => AArch64OperandValue::Invalid,
    };

    const SHIFTS: [AArch64ShiftOp; 5] = [
        AArch64ShiftOp::Lsl,
        AArch64ShiftOp::Msl,
        AArch64ShiftOp::Lsr,
        AArch64ShiftOp::Asr,
        AArch64ShiftOp::Ror,
    ];
    let shift = from_table(&SHIFTS, op.u32(OP_SHIFT_TYPE)).map(|op_kind| AArch64Shift {
        op: op_kind,
        amount: op.u32(OP_SHIFT_VALUE),
    });

    AArch64Operand {
        value,
        access: AccessKind::from_raw(op.u8(OP_ACCESS)),
        vector_index: u32::try_from(op.i32(OP_VECTOR_INDEX)).ok(),
        arrangement: from_table(&ARRANGEMENTS, op.u32(OP_VAS)),
        shift,
        extender: from_table(&EXTENDERS, op.u32(OP_EXT)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blob::BlobWriter;

    fn op_offset(index: usize) -> usize {
        LAYOUT.operands + index * LAYOUT.stride
    }

    fn blank(count: u8) -> BlobWriter {
        let mut w = BlobWriter::new(LAYOUT.size);
        w.u8(LAYOUT.op_count, count);
        for i in 0..usize::from(count) {
            w.i32(op_offset(i) + OP_VECTOR_INDEX, -1);
        }
        w
    }

    #[test]
    fn test_capacity() {
        assert_eq!(LAYOUT.capacity, 8);
    }

    #[test]
    fn test_mrs_shape() {
        let mut w = blank(2);
        w.u32(op_offset(0) + OP_TYPE, TYPE_REG)
            .u32(op_offset(0) + OP_VALUE, 225)
            .u8(op_offset(0) + OP_ACCESS, 2)
            .u32(op_offset(1) + OP_TYPE, TYPE_REG_MRS)
            .u32(op_offset(1) + OP_VALUE, 0xc000)
            .u8(op_offset(1) + OP_ACCESS, 1);

        let details = decode(&w.bytes, 0);
        assert_eq!(details.operands[0].value, AArch64OperandValue::Register(225));
        assert_eq!(details.operands[0].access, AccessKind::Write);
        assert_eq!(
            details.operands[1].value,
            AArch64OperandValue::SystemRegister {
                subtype: SystemRegisterAccess::Mrs,
                raw: 0xc000,
            }
        );
        assert_eq!(details.operands[1].vector_index, None);
        assert_eq!(
            details.count_operands_of_kind(AArch64OperandKind::SystemRegister(
                SystemRegisterAccess::Mrs
            )),
            1
        );
        assert_eq!(
            details.count_operands_of_kind(AArch64OperandKind::SystemRegister(
                SystemRegisterAccess::Msr
            )),
            0
        );
    }

    #[test]
    fn test_sys_operand_follows_instruction() {
        let mut w = blank(2);
        w.u32(op_offset(0) + OP_TYPE, TYPE_SYS)
            .u32(op_offset(0) + OP_VALUE, 0xc000)
            .u32(op_offset(1) + OP_TYPE, TYPE_REG)
            .u32(op_offset(1) + OP_VALUE, 225)
            .u8(op_offset(1) + OP_ACCESS, 1);

        assert_eq!(
            decode(&w.bytes, INS_MSR).operands[0].value,
            AArch64OperandValue::SystemRegister {
                subtype: SystemRegisterAccess::Msr,
                raw: 0xc000,
            }
        );
        assert_eq!(
            decode(&w.bytes, INS_MRS).operands[0].value,
            AArch64OperandValue::SystemRegister {
                subtype: SystemRegisterAccess::Mrs,
                raw: 0xc000,
            }
        );
        // Cache and TLB maintenance operands stay SYS.
        let sys = arm64_insn::ARM64_INS_SYS as u32;
        assert_eq!(
            decode(&w.bytes, sys).operands[0].value,
            AArch64OperandValue::System(0xc000)
        );
    }

    #[test]
    fn test_vector_lane_and_arrangement() {
        let mut w = blank(1);
        w.u32(op_offset(0) + OP_TYPE, TYPE_REG)
            .i32(op_offset(0) + OP_VECTOR_INDEX, 2)
            .u32(op_offset(0) + OP_VAS, 9);
        let op = &decode(&w.bytes, 0).operands[0];
        assert_eq!(op.vector_index, Some(2));
        assert_eq!(op.arrangement, Some(VectorArrangement::S4));
        assert_eq!(op.arrangement.map(VectorArrangement::shape), Some((4, 32)));
        assert!(op.is_vector_register());
    }

    #[test]
    fn test_shift_and_extend() {
        let mut w = blank(1);
        w.u32(op_offset(0) + OP_TYPE, TYPE_REG)
            .u32(op_offset(0) + OP_SHIFT_TYPE, 1)
            .u32(op_offset(0) + OP_SHIFT_VALUE, 12)
            .u32(op_offset(0) + OP_EXT, 7);
        let op = &decode(&w.bytes, 0).operands[0];
        assert_eq!(
            op.shift,
            Some(AArch64Shift {
                op: AArch64ShiftOp::Lsl,
                amount: 12
            })
        );
        assert_eq!(op.extender, Some(Extender::Sxtw));
        assert!(!op.is_vector_register());
    }

    #[test]
    fn test_memory_versus_register_tag() {
        let mut w = blank(1);
        w.u32(op_offset(0) + OP_TYPE, TYPE_MEM)
            .u32(op_offset(0) + MEM_BASE, 4)
            .u32(op_offset(0) + MEM_INDEX, 0)
            .i32(op_offset(0) + MEM_DISP, 16);
        assert_eq!(
            decode(&w.bytes, 0).operands[0].value,
            AArch64OperandValue::Memory(AArch64Memory {
                base: 4,
                index: None,
                disp: 16
            })
        );

        // Retagged as a register, only the first union field is read.
        w.u32(op_offset(0) + OP_TYPE, TYPE_REG);
        assert_eq!(
            decode(&w.bytes, 0).operands[0].value,
            AArch64OperandValue::Register(4)
        );
    }

    #[test]
    fn test_condition() {
        let mut w = blank(0);
        w.u32(offset_of!(cs_arm64, cc), 16);
        assert_eq!(decode(&w.bytes, 0).condition, Some(AArch64Condition::Nv));
        w.u32(offset_of!(cs_arm64, cc), 0);
        assert_eq!(decode(&w.bytes, 0).condition, None);
    }
}
