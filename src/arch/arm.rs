//! ARM and Thumb detail decoding.

use std::mem::{offset_of, size_of};

use capstone_sys::{
    arm_cpsflag_type, arm_cpsmode_type, arm_op_mem, arm_op_type, arm_setend_type, cs_arm, cs_arm_op,
    cs_arm_op__bindgen_ty_1,
};
use serde::Serialize;

use super::{numbered, optional_register, register};
use crate::blob::{ArchLayout, DetailBlob};
use crate::operand::{AccessKind, OperandQuery, RegisterId};
use crate::Architecture;

pub(crate) const LAYOUT: ArchLayout = ArchLayout {
    arch: Architecture::Arm,
    size: size_of::<cs_arm>(),
    op_count: offset_of!(cs_arm, op_count),
    operands: offset_of!(cs_arm, operands),
    stride: size_of::<cs_arm_op>(),
    capacity: (size_of::<cs_arm>() - offset_of!(cs_arm, operands)) / size_of::<cs_arm_op>(),
};

const OP_VECTOR_INDEX: usize = offset_of!(cs_arm_op, vector_index);
const OP_SHIFT_TYPE: usize =
    offset_of!(cs_arm_op, shift) + offset_of!(cs_arm_op__bindgen_ty_1, type_);
const OP_SHIFT_VALUE: usize =
    offset_of!(cs_arm_op, shift) + offset_of!(cs_arm_op__bindgen_ty_1, value);
const OP_TYPE: usize = offset_of!(cs_arm_op, type_);
const OP_VALUE: usize = offset_of!(cs_arm_op, __bindgen_anon_1);
const OP_SUBTRACTED: usize = offset_of!(cs_arm_op, subtracted);
const OP_ACCESS: usize = offset_of!(cs_arm_op, access);
const OP_NEON_LANE: usize = offset_of!(cs_arm_op, neon_lane);

const MEM_BASE: usize = OP_VALUE + offset_of!(arm_op_mem, base);
const MEM_INDEX: usize = OP_VALUE + offset_of!(arm_op_mem, index);
const MEM_SCALE: usize = OP_VALUE + offset_of!(arm_op_mem, scale);
const MEM_DISP: usize = OP_VALUE + offset_of!(arm_op_mem, disp);
const MEM_LSHIFT: usize = OP_VALUE + offset_of!(arm_op_mem, lshift);

const TYPE_REG: u32 = arm_op_type::ARM_OP_REG as u32;
const TYPE_IMM: u32 = arm_op_type::ARM_OP_IMM as u32;
const TYPE_MEM: u32 = arm_op_type::ARM_OP_MEM as u32;
const TYPE_FP: u32 = arm_op_type::ARM_OP_FP as u32;
const TYPE_CIMM: u32 = arm_op_type::ARM_OP_CIMM as u32;
const TYPE_PIMM: u32 = arm_op_type::ARM_OP_PIMM as u32;
const TYPE_SETEND: u32 = arm_op_type::ARM_OP_SETEND as u32;
const TYPE_SYSREG: u32 = arm_op_type::ARM_OP_SYSREG as u32;

/*────────────────────────  model  ───────────────────────*/

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArmDetails {
    /// LDM/STM loads user-mode registers.
    pub usermode: bool,
    pub vector_size: i32,
    /// Element data type of a NEON/VFP instruction.
    pub vector_data: Option<VectorDataType>,
    pub cps_mode: Option<CpsMode>,
    pub cps_flag: Option<CpsFlags>,
    /// `None` when the instruction is not predicated.
    pub condition: Option<ArmCondition>,
    pub update_flags: bool,
    pub writeback: bool,
    pub mem_barrier: Option<MemoryBarrier>,
    pub operands: Vec<ArmOperand>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ArmCondition {
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
}

const CONDITIONS: [ArmCondition; 15] = [
    ArmCondition::Eq,
    ArmCondition::Ne,
    ArmCondition::Hs,
    ArmCondition::Lo,
    ArmCondition::Mi,
    ArmCondition::Pl,
    ArmCondition::Vs,
    ArmCondition::Vc,
    ArmCondition::Hi,
    ArmCondition::Ls,
    ArmCondition::Ge,
    ArmCondition::Lt,
    ArmCondition::Gt,
    ArmCondition::Le,
    ArmCondition::Al,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CpsMode {
    InterruptEnable,
    InterruptDisable,
}

/// Interrupt masks a CPS instruction touches. All three clear means the
/// instruction names no flag, as in a mode-only `cps #19`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CpsFlags {
    pub abort: bool,
    pub irq: bool,
    pub fiq: bool,
}

impl CpsFlags {
    /// `arm_cpsflag_type` bits; 0 is "not a CPS instruction".
    fn from_raw(raw: u32) -> Option<Self> {
        use arm_cpsflag_type::*;
        (raw != ARM_CPSFLAG_INVALID as u32).then(|| CpsFlags {
            abort: raw & ARM_CPSFLAG_A as u32 != 0,
            irq: raw & ARM_CPSFLAG_I as u32 != 0,
            fiq: raw & ARM_CPSFLAG_F as u32 != 0,
        })
    }
}

/// DMB/DSB/ISB barrier option.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum MemoryBarrier {
    /// An encoding the architecture leaves reserved; holds the 4-bit option.
    Reserved(u8),
    OshLd,
    OshSt,
    Osh,
    NshLd,
    NshSt,
    Nsh,
    IshLd,
    IshSt,
    Ish,
    Ld,
    St,
    Sy,
}

const BARRIERS: [MemoryBarrier; 16] = [
    MemoryBarrier::Reserved(0),
    MemoryBarrier::OshLd,
    MemoryBarrier::OshSt,
    MemoryBarrier::Osh,
    MemoryBarrier::Reserved(4),
    MemoryBarrier::NshLd,
    MemoryBarrier::NshSt,
    MemoryBarrier::Nsh,
    MemoryBarrier::Reserved(8),
    MemoryBarrier::IshLd,
    MemoryBarrier::IshSt,
    MemoryBarrier::Ish,
    MemoryBarrier::Reserved(12),
    MemoryBarrier::Ld,
    MemoryBarrier::St,
    MemoryBarrier::Sy,
];

/// Vector element type suffix, e.g. `.i32` or the conversion pair `.f32.s32`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum VectorDataType {
    I8,
    I16,
    I32,
    I64,
    S8,
    S16,
    S32,
    S64,
    U8,
    U16,
    U32,
    U64,
    P8,
    F16,
    F32,
    F64,
    F16F64,
    F64F16,
    F32F16,
    F16F32,
    F64F32,
    F32F64,
    S32F32,
    U32F32,
    F32S32,
    F32U32,
    F64S16,
    F32S16,
    F64S32,
    S16F64,
    S16F32,
    S32F64,
    U16F64,
    U16F32,
    U32F64,
    F64U16,
    F32U16,
    F64U32,
    F16U16,
    U16F16,
    F16U32,
    U32F16,
}

const VECTOR_DATA: [VectorDataType; 42] = {
    use VectorDataType::*;
    [
        I8, I16, I32, I64, S8, S16, S32, S64, U8, U16, U32, U64, P8, F16, F32, F64, F16F64,
        F64F16, F32F16, F16F32, F64F32, F32F64, S32F32, U32F32, F32S32, F32U32, F64S16, F32S16,
        F64S32, S16F64, S16F32, S32F64, U16F64, U16F32, U32F64, F64U16, F32U16, F64U32, F16U16,
        U16F16, F16U32, U32F16,
    ]
};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArmOperand {
    pub value: ArmOperandValue,
    pub access: AccessKind,
    /// Element index for indexed vector operands.
    pub vector_index: Option<u32>,
    pub shift: Option<ArmShift>,
    /// The operand is subtracted from the base register rather than added.
    pub subtracted: bool,
    pub neon_lane: Option<u8>,
}

impl ArmOperand {
    pub fn is_vector_register(&self) -> bool {
        matches!(self.value, ArmOperandValue::Register(_))
            && (self.vector_index.is_some() || self.neon_lane.is_some())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum ArmOperandValue {
    Invalid,
    Register(RegisterId),
    Immediate(i32),
    Memory(ArmMemory),
    FloatingPoint(f64),
    /// Coprocessor register number (C-IMM).
    CoprocImmediate(i32),
    /// Coprocessor number (P-IMM).
    ProcessorImmediate(i32),
    Setend(Endianness),
    /// Raw `arm_sysreg` / M-class system register value.
    SystemRegister(u32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ArmMemory {
    pub base: RegisterId,
    pub index: Option<RegisterId>,
    /// 1, or -1 when the index is subtracted.
    pub scale: i32,
    pub disp: i32,
    /// Left shift applied to the index, 0 when irrelevant.
    pub lshift: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Endianness {
    Big,
    Little,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ArmShiftOp {
    Asr,
    Lsl,
    Lsr,
    Ror,
    Rrx,
}

/// A shift applied to an operand; the amount is either encoded or held in a register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ArmShift {
    Immediate { op: ArmShiftOp, amount: u32 },
    Register { op: ArmShiftOp, register: RegisterId },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ArmOperandKind {
    Invalid,
    Register,
    Immediate,
    Memory,
    FloatingPoint,
    CoprocImmediate,
    ProcessorImmediate,
    Setend,
    SystemRegister,
}

impl ArmOperandValue {
    pub fn kind(&self) -> ArmOperandKind {
        match self {
            ArmOperandValue::Invalid => ArmOperandKind::Invalid,
            ArmOperandValue::Register(_) => ArmOperandKind::Register,
            ArmOperandValue::Immediate(_) => ArmOperandKind::Immediate,
            ArmOperandValue::Memory(_) => ArmOperandKind::Memory,
            ArmOperandValue::FloatingPoint(_) => ArmOperandKind::FloatingPoint,
            ArmOperandValue::CoprocImmediate(_) => ArmOperandKind::CoprocImmediate,
            ArmOperandValue::ProcessorImmediate(_) => ArmOperandKind::ProcessorImmediate,
            ArmOperandValue::Setend(_) => ArmOperandKind::Setend,
            ArmOperandValue::SystemRegister(_) => ArmOperandKind::SystemRegister,
        }
    }
}

impl OperandQuery for ArmDetails {
    type Kind = ArmOperandKind;

    fn operand_count(&self) -> usize {
        self.operands.len()
    }

    fn operand_kind(&self, index: usize) -> Option<ArmOperandKind> {
        self.operands.get(index).map(|op| op.value.kind())
    }
}

/*────────────────────────  decoding  ───────────────────────*/

pub(crate) fn decode(bytes: &[u8]) -> ArmDetails {
    let blob = LAYOUT.bind(bytes);

    let cps_mode = match blob.u32(offset_of!(cs_arm, cps_mode)) {
        r if r == arm_cpsmode_type::ARM_CPSMODE_IE as u32 => Some(CpsMode::InterruptEnable),
        r if r == arm_cpsmode_type::ARM_CPSMODE_ID as u32 => Some(CpsMode::InterruptDisable),
        _ => None,
    };

    ArmDetails {
        usermode: blob.bool(offset_of!(cs_arm, usermode)),
        vector_size: blob.i32(offset_of!(cs_arm, vector_size)),
        vector_data: numbered(&VECTOR_DATA, blob.u32(offset_of!(cs_arm, vector_data))),
        cps_mode,
        cps_flag: CpsFlags::from_raw(blob.u32(offset_of!(cs_arm, cps_flag))),
        condition: condition(blob.u32(offset_of!(cs_arm, cc))),
        update_flags: blob.bool(offset_of!(cs_arm, update_flags)),
        writeback: blob.bool(offset_of!(cs_arm, writeback)),
        mem_barrier: numbered(&BARRIERS, blob.u32(offset_of!(cs_arm, mem_barrier))),
        operands: LAYOUT.operands(&blob).map(|op| operand(&op)).collect(),
    }
}

/// Condition code from `arm_cc`; 0 is "not predicated".
fn condition(raw: u32) -> Option<ArmCondition> {
    numbered(&CONDITIONS, raw)
}

/// `arm_shifter`: 1..=5 shift by an encoded amount, 6..=10 by a register.
fn shift(kind: u32, value: u32) -> Option<ArmShift> {
    const OPS: [ArmShiftOp; 5] = [
        ArmShiftOp::Asr,
        ArmShiftOp::Lsl,
        ArmShiftOp::Lsr,
        ArmShiftOp::Ror,
        ArmShiftOp::Rrx,
    ];
    match kind {
        1..=5 => Some(ArmShift::Immediate {
            op: OPS[kind as usize - 1],
            amount: value,
        }),
        6..=10 => Some(ArmShift::Register {
            op: OPS[kind as usize - 6],
            register: register(value),
        }),
        _ => None,
    }
}

fn operand(op: &DetailBlob<'_>) -> ArmOperand {
    let value = match op.u32(OP_TYPE) {
        TYPE_REG => ArmOperandValue::Register(register(op.u32(OP_VALUE))),
        TYPE_IMM => ArmOperandValue::Immediate(op.i32(OP_VALUE)),
        TYPE_MEM => ArmOperandValue::Memory(ArmMemory {
            base: register(op.u32(MEM_BASE)),
            index: optional_register(op.u32(MEM_INDEX)),
            scale: op.i32(MEM_SCALE),
            disp: op.i32(MEM_DISP),
            lshift: op.i32(MEM_LSHIFT),
        }),
        TYPE_FP => ArmOperandValue::FloatingPoint(op.f64(OP_VALUE)),
        TYPE_CIMM => ArmOperandValue::CoprocImmediate(op.i32(OP_VALUE)),
        TYPE_PIMM => ArmOperandValue::ProcessorImmediate(op.i32(OP_VALUE)),
        TYPE_SETEND => match op.u32(OP_VALUE) {
            r if r == arm_setend_type::ARM_SETEND_BE as u32 => {
                ArmOperandValue::Setend(Endianness::Big)
            }
            r if r == arm_setend_type::ARM_SETEND_LE as u32 => {
                ArmOperandValue::Setend(Endianness::Little)
            }
            _ => ArmOperandValue::Invalid,
        },
        TYPE_SYSREG => ArmOperandValue::SystemRegister(op.u32(OP_VALUE)),
        _ => ArmOperandValue::Invalid,
    };

    ArmOperand {
        value,
        access: AccessKind::from_raw(op.u8(OP_ACCESS)),
        vector_index: u32::try_from(op.i32(OP_VECTOR_INDEX)).ok(),
        shift: shift(op.u32(OP_SHIFT_TYPE), op.u32(OP_SHIFT_VALUE)),
        subtracted: op.bool(OP_SUBTRACTED),
        neon_lane: u8::try_from(op.i8(OP_NEON_LANE)).ok(),
    }
}
