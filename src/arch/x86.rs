//! x86 (16/32/64-bit) detail decoding.

use std::mem::{offset_of, size_of};

use capstone_sys::{
    cs_x86, cs_x86_encoding, cs_x86_op, x86_avx_bcast, x86_avx_rm, x86_insn_group, x86_op_mem,
    x86_op_type,
};
use serde::Serialize;

use super::{numbered, optional_register, register};
use crate::blob::{ArchLayout, DetailBlob};
use crate::operand::{AccessKind, GroupId, OperandQuery, RegisterId};
use crate::Architecture;

pub(crate) const LAYOUT: ArchLayout = ArchLayout {
    arch: Architecture::X86,
    size: size_of::<cs_x86>(),
    op_count: offset_of!(cs_x86, op_count),
    operands: offset_of!(cs_x86, operands),
    stride: size_of::<cs_x86_op>(),
    capacity: (offset_of!(cs_x86, encoding) - offset_of!(cs_x86, operands))
        / size_of::<cs_x86_op>(),
};

const FLAGS: usize = offset_of!(cs_x86, __bindgen_anon_1);
const ENCODING: usize = offset_of!(cs_x86, encoding);

const OP_TYPE: usize = offset_of!(cs_x86_op, type_);
const OP_VALUE: usize = offset_of!(cs_x86_op, __bindgen_anon_1);
const OP_SIZE: usize = offset_of!(cs_x86_op, size);
const OP_ACCESS: usize = offset_of!(cs_x86_op, access);
const OP_AVX_BCAST: usize = offset_of!(cs_x86_op, avx_bcast);
const OP_AVX_ZERO_OPMASK: usize = offset_of!(cs_x86_op, avx_zero_opmask);

const MEM_SEGMENT: usize = OP_VALUE + offset_of!(x86_op_mem, segment);
const MEM_BASE: usize = OP_VALUE + offset_of!(x86_op_mem, base);
const MEM_INDEX: usize = OP_VALUE + offset_of!(x86_op_mem, index);
const MEM_SCALE: usize = OP_VALUE + offset_of!(x86_op_mem, scale);
const MEM_DISP: usize = OP_VALUE + offset_of!(x86_op_mem, disp);

const TYPE_REG: u32 = x86_op_type::X86_OP_REG as u32;
const TYPE_IMM: u32 = x86_op_type::X86_OP_IMM as u32;
const TYPE_MEM: u32 = x86_op_type::X86_OP_MEM as u32;

const GRP_FPU: GroupId = x86_insn_group::X86_GRP_FPU as GroupId;

/*────────────────────────  model  ───────────────────────*/

/// Instruction-wide x86 detail.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct X86Details {
    /// REP/LOCK, segment override, operand-size and address-size prefixes; 0 when absent.
    pub prefix: [u8; 4],
    pub opcode: [u8; 4],
    pub rex: u8,
    pub addr_size: u8,
    pub modrm: u8,
    pub sib: u8,
    pub disp: i64,
    pub sib_index: Option<RegisterId>,
    pub sib_scale: i8,
    pub sib_base: Option<RegisterId>,
    /// Predicate of an XOP `vpcom*` comparison.
    pub xop_cc: Option<XopCondition>,
    /// Predicate of an SSE `cmp*ps/pd/ss/sd` comparison.
    pub sse_cc: Option<SseCondition>,
    /// Predicate of an AVX `vcmp*` comparison.
    pub avx_cc: Option<AvxCondition>,
    pub avx_sae: bool,
    pub avx_rounding: Option<AvxRounding>,
    pub flags: FlagEffects,
    pub encoding: X86Encoding,
    pub operands: Vec<X86Operand>,
}

/// Flag bits the instruction updates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FlagEffects {
    /// OR of `X86_EFLAGS_*` bits.
    Eflags(u64),
    /// OR of `X86_FPU_FLAGS_*` bits; used for instructions in the FPU group.
    FpuFlags(u64),
}

/// Offsets of encoding fields inside the instruction bytes, 0 when irrelevant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct X86Encoding {
    pub modrm_offset: u8,
    pub disp_offset: u8,
    pub disp_size: u8,
    pub imm_offset: u8,
    pub imm_size: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum XopCondition {
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Neq,
    False,
    True,
}

const XOP_CONDITIONS: [XopCondition; 8] = {
    use XopCondition::*;
    [Lt, Le, Gt, Ge, Eq, Neq, False, True]
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum SseCondition {
    Eq,
    Lt,
    Le,
    Unord,
    Neq,
    Nlt,
    Nle,
    Ord,
}

const SSE_CONDITIONS: [SseCondition; 8] = {
    use SseCondition::*;
    [Eq, Lt, Le, Unord, Neq, Nlt, Nle, Ord]
};

/// The 32 VEX/EVEX comparison predicates. The suffix names ordering and
/// signalling (`Oq`, `Os`, `Uq`, `Us`) where it differs from the default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum AvxCondition {
    Eq,
    Lt,
    Le,
    Unord,
    Neq,
    Nlt,
    Nle,
    Ord,
    EqUq,
    Nge,
    Ngt,
    False,
    NeqOq,
    Ge,
    Gt,
    True,
    EqOs,
    LtOq,
    LeOq,
    UnordS,
    NeqUs,
    NltUq,
    NleUq,
    OrdS,
    EqUs,
    NgeUq,
    NgtUq,
    FalseOs,
    NeqOs,
    GeOq,
    GtOq,
    TrueUs,
}

const AVX_CONDITIONS: [AvxCondition; 32] = {
    use AvxCondition::*;
    [
        Eq, Lt, Le, Unord, Neq, Nlt, Nle, Ord, EqUq, Nge, Ngt, False, NeqOq, Ge, Gt, True, EqOs,
        LtOq, LeOq, UnordS, NeqUs, NltUq, NleUq, OrdS, EqUs, NgeUq, NgtUq, FalseOs, NeqOs, GeOq,
        GtOq, TrueUs,
    ]
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AvxBroadcast {
    To2,
    To4,
    To8,
    To16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AvxRounding {
    Nearest,
    Down,
    Up,
    TowardZero,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct X86Operand {
    pub value: X86OperandValue,
    /// Operand size in bytes.
    pub size: u8,
    pub access: AccessKind,
    pub avx_broadcast: Option<AvxBroadcast>,
    pub avx_zero_opmask: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum X86OperandValue {
    Invalid,
    Register(RegisterId),
    Immediate(i64),
    Memory(X86Memory),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct X86Memory {
    pub segment: Option<RegisterId>,
    pub base: Option<RegisterId>,
    pub index: Option<RegisterId>,
    pub scale: i32,
    pub disp: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum X86OperandKind {
    Invalid,
    Register,
    Immediate,
    Memory,
}

impl X86OperandValue {
    pub fn kind(&self) -> X86OperandKind {
        match self {
            X86OperandValue::Invalid => X86OperandKind::Invalid,
            X86OperandValue::Register(_) => X86OperandKind::Register,
            X86OperandValue::Immediate(_) => X86OperandKind::Immediate,
            X86OperandValue::Memory(_) => X86OperandKind::Memory,
        }
    }
}

impl OperandQuery for X86Details {
    type Kind = X86OperandKind;

    fn operand_count(&self) -> usize {
        self.operands.len()
    }

    fn operand_kind(&self, index: usize) -> Option<X86OperandKind> {
        self.operands.get(index).map(|op| op.value.kind())
    }
}

/*────────────────────────  decoding  ───────────────────────*/

/// Decode a `cs_x86` blob. `groups` selects how the flag union is read.
pub(crate) fn decode(bytes: &[u8], groups: &[GroupId]) -> X86Details {
    let blob = LAYOUT.bind(bytes);

    let raw_flags = blob.u64(FLAGS);
    let flags = if groups.contains(&GRP_FPU) {
        FlagEffects::FpuFlags(raw_flags)
    } else {
        FlagEffects::Eflags(raw_flags)
    };

    X86Details {
        prefix: blob.bytes(offset_of!(cs_x86, prefix)),
        opcode: blob.bytes(offset_of!(cs_x86, opcode)),
        rex: blob.u8(offset_of!(cs_x86, rex)),
        addr_size: blob.u8(offset_of!(cs_x86, addr_size)),
        modrm: blob.u8(offset_of!(cs_x86, modrm)),
        sib: blob.u8(offset_of!(cs_x86, sib)),
        disp: blob.i64(offset_of!(cs_x86, disp)),
        sib_index: optional_register(blob.u32(offset_of!(cs_x86, sib_index))),
        sib_scale: blob.i8(offset_of!(cs_x86, sib_scale)),
        sib_base: optional_register(blob.u32(offset_of!(cs_x86, sib_base))),
        xop_cc: numbered(&XOP_CONDITIONS, blob.u32(offset_of!(cs_x86, xop_cc))),
        sse_cc: numbered(&SSE_CONDITIONS, blob.u32(offset_of!(cs_x86, sse_cc))),
        avx_cc: numbered(&AVX_CONDITIONS, blob.u32(offset_of!(cs_x86, avx_cc))),
        avx_sae: blob.bool(offset_of!(cs_x86, avx_sae)),
        avx_rounding: rounding(blob.u32(offset_of!(cs_x86, avx_rm))),
        flags,
        encoding: X86Encoding {
            modrm_offset: blob.u8(ENCODING + offset_of!(cs_x86_encoding, modrm_offset)),
            disp_offset: blob.u8(ENCODING + offset_of!(cs_x86_encoding, disp_offset)),
            disp_size: blob.u8(ENCODING + offset_of!(cs_x86_encoding, disp_size)),
            imm_offset: blob.u8(ENCODING + offset_of!(cs_x86_encoding, imm_offset)),
            imm_size: blob.u8(ENCODING + offset_of!(cs_x86_encoding, imm_size)),
        },
        operands: LAYOUT.operands(&blob).map(|op| operand(&op)).collect(),
    }
}

fn operand(op: &DetailBlob<'_>) -> X86Operand {
    let value = match op.u32(OP_TYPE) {
        TYPE_REG => X86OperandValue::Register(register(op.u32(OP_VALUE))),
        TYPE_IMM => X86OperandValue::Immediate(op.i64(OP_VALUE)),
        TYPE_MEM => X86OperandValue::Memory(X86Memory {
            segment: optional_register(op.u32(MEM_SEGMENT)),
            base: optional_register(op.u32(MEM_BASE)),
            index: optional_register(op.u32(MEM_INDEX)),
            scale: op.i32(MEM_SCALE),
            disp: op.i64(MEM_DISP),
        }),
        _ => X86OperandValue::Invalid,
    };

    X86Operand {
        value,
        size: op.u8(OP_SIZE),
        access: AccessKind::from_raw(op.u8(OP_ACCESS)),
        avx_broadcast: broadcast(op.u32(OP_AVX_BCAST)),
        avx_zero_opmask: op.bool(OP_AVX_ZERO_OPMASK),
    }
}

fn broadcast(raw: u32) -> Option<AvxBroadcast> {
    use x86_avx_bcast::*;
    match raw {
        r if r == X86_AVX_BCAST_2 as u32 => Some(AvxBroadcast::To2),
        r if r == X86_AVX_BCAST_4 as u32 => Some(AvxBroadcast::To4),
        r if r == X86_AVX_BCAST_8 as u32 => Some(AvxBroadcast::To8),
        r if r == X86_AVX_BCAST_16 as u32 => Some(AvxBroadcast::To16),
        _ => None,
    }
}

fn rounding(raw: u32) -> Option<AvxRounding> {
    use x86_avx_rm::*;
    match raw {
        r if r == X86_AVX_RM_RN as u32 => Some(AvxRounding::Nearest),
        r if r == X86_AVX_RM_RD as u32 => Some(AvxRounding::Down),
        r if r == X86_AVX_RM_RU as u32 => Some(AvxRounding::Up),
        r if r == X86_AVX_RM_RZ as u32 => Some(AvxRounding::TowardZero),
        _ => None,
    }
}
