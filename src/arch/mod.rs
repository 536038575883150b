//! Per-architecture operand decoders and the closed set of detail payloads.
//!
//! Each submodule reads one architecture's detail blob through a layout taken
//! from the engine's own struct definitions. [`ArchDetails::decode`] is the
//! single dispatch point.

pub mod aarch64;
pub mod arm;
pub mod m680x;
pub mod mips;
pub mod ppc;
pub mod riscv;
pub mod x86;

use serde::Serialize;

use crate::operand::{AccessKind, GroupId, OperandQuery, RegisterId};
use crate::Architecture;

pub use self::aarch64::{AArch64Details, AArch64OperandKind};
pub use self::arm::{ArmDetails, ArmOperandKind};
pub use self::m680x::{M680xDetails, M680xOperandKind};
pub use self::mips::{MipsDetails, MipsOperandKind};
pub use self::ppc::{PpcDetails, PpcOperandKind};
pub use self::riscv::{RiscVDetails, RiscVOperandKind};
pub use self::x86::{X86Details, X86OperandKind};

/// Register number as stored in an operand slot.
pub(crate) fn register(raw: u32) -> RegisterId {
    raw as RegisterId
}

/// Register number where 0 (`*_REG_INVALID`) means "no register".
pub(crate) fn optional_register(raw: u32) -> Option<RegisterId> {
    (raw != 0).then_some(raw as RegisterId)
}

/// Entry `raw` of a 1-based oracle enum; 0 and values past the table are `None`.
pub(crate) fn numbered<T: Copy>(table: &[T], raw: u32) -> Option<T> {
    table.get((raw as usize).wrapping_sub(1)).copied()
}

/// Architecture-specific operands and flags of one instruction.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "arch", content = "detail")]
pub enum ArchDetails {
    X86(X86Details),
    Arm(ArmDetails),
    AArch64(AArch64Details),
    Mips(MipsDetails),
    Ppc(PpcDetails),
    RiscV(RiscVDetails),
    M680x(M680xDetails),
}

/// Operand kind of any architecture; used to query [`ArchDetails`] directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ArchOperandKind {
    X86(X86OperandKind),
    Arm(ArmOperandKind),
    AArch64(AArch64OperandKind),
    Mips(MipsOperandKind),
    Ppc(PpcOperandKind),
    RiscV(RiscVOperandKind),
    M680x(M680xOperandKind),
}

impl ArchDetails {
    /// Decode `blob` as the detail struct of `arch` for instruction `id`.
    ///
    /// `groups` is needed on x86, where FPU-group membership selects how the
    /// flag-effects union is read. `id` classifies AArch64 system-register
    /// operands.
    ///
    /// # Panics
    /// When `blob` is smaller than the architecture's detail struct.
    pub fn decode(arch: Architecture, id: u32, blob: &[u8], groups: &[GroupId]) -> Self {
        match arch {
            Architecture::X86 => ArchDetails::X86(x86::decode(blob, groups)),
            Architecture::Arm => ArchDetails::Arm(arm::decode(blob)),
            Architecture::AArch64 => ArchDetails::AArch64(aarch64::decode(blob, id)),
            Architecture::Mips => ArchDetails::Mips(mips::decode(blob)),
            Architecture::Ppc => ArchDetails::Ppc(ppc::decode(blob)),
            Architecture::RiscV => ArchDetails::RiscV(riscv::decode(blob)),
            Architecture::M680x => ArchDetails::M680x(m680x::decode(blob)),
        }
    }

    pub fn architecture(&self) -> Architecture {
        match self {
            ArchDetails::X86(_) => Architecture::X86,
            ArchDetails::Arm(_) => Architecture::Arm,
            ArchDetails::AArch64(_) => Architecture::AArch64,
            ArchDetails::Mips(_) => Architecture::Mips,
            ArchDetails::Ppc(_) => Architecture::Ppc,
            ArchDetails::RiscV(_) => Architecture::RiscV,
            ArchDetails::M680x(_) => Architecture::M680x,
        }
    }

    /// Number of operands, as the oracle's `op_count`.
    pub fn op_count(&self) -> u8 {
        self.operand_count() as u8
    }

    /// The instruction updates a base register as a side effect of addressing.
    pub fn writeback(&self) -> bool {
        match self {
            ArchDetails::Arm(d) => d.writeback,
            ArchDetails::AArch64(d) => d.writeback,
            ArchDetails::M680x(d) => d.writeback(),
            ArchDetails::X86(_) | ArchDetails::Mips(_) | ArchDetails::Ppc(_) | ArchDetails::RiscV(_) => {
                false
            }
        }
    }

    /// Access of operand `index`. Architectures without per-operand access report `None`.
    pub fn operand_access(&self, index: usize) -> Option<AccessKind> {
        if index >= self.operand_count() {
            return None;
        }
        Some(match self {
            ArchDetails::X86(d) => d.operands[index].access,
            ArchDetails::Arm(d) => d.operands[index].access,
            ArchDetails::AArch64(d) => d.operands[index].access,
            ArchDetails::M680x(d) => d.operands[index].access,
            ArchDetails::Mips(_) | ArchDetails::Ppc(_) | ArchDetails::RiscV(_) => AccessKind::None,
        })
    }
}

impl OperandQuery for ArchDetails {
    type Kind = ArchOperandKind;

    fn operand_count(&self) -> usize {
        match self {
            ArchDetails::X86(d) => d.operand_count(),
            ArchDetails::Arm(d) => d.operand_count(),
            ArchDetails::AArch64(d) => d.operand_count(),
            ArchDetails::Mips(d) => d.operand_count(),
            ArchDetails::Ppc(d) => d.operand_count(),
            ArchDetails::RiscV(d) => d.operand_count(),
            ArchDetails::M680x(d) => d.operand_count(),
        }
    }

    fn operand_kind(&self, index: usize) -> Option<ArchOperandKind> {
        match self {
            ArchDetails::X86(d) => d.operand_kind(index).map(ArchOperandKind::X86),
            ArchDetails::Arm(d) => d.operand_kind(index).map(ArchOperandKind::Arm),
            ArchDetails::AArch64(d) => d.operand_kind(index).map(ArchOperandKind::AArch64),
            ArchDetails::Mips(d) => d.operand_kind(index).map(ArchOperandKind::Mips),
            ArchDetails::Ppc(d) => d.operand_kind(index).map(ArchOperandKind::Ppc),
            ArchDetails::RiscV(d) => d.operand_kind(index).map(ArchOperandKind::RiscV),
            ArchDetails::M680x(d) => d.operand_kind(index).map(ArchOperandKind::M680x),
        }
    }
}

/// Size of the detail blob each architecture's decoder expects.
pub fn detail_size(arch: Architecture) -> usize {
    match arch {
        Architecture::X86 => x86::LAYOUT.size,
        Architecture::Arm => arm::LAYOUT.size,
        Architecture::AArch64 => aarch64::LAYOUT.size,
        Architecture::Mips => mips::LAYOUT.size,
        Architecture::Ppc => ppc::LAYOUT.size,
        Architecture::RiscV => riscv::LAYOUT.size,
        Architecture::M680x => m680x::LAYOUT.size,
    }
}

/// Capacity of each architecture's operand array.
pub fn max_operands(arch: Architecture) -> usize {
    match arch {
        Architecture::X86 => x86::LAYOUT.capacity,
        Architecture::Arm => arm::LAYOUT.capacity,
        Architecture::AArch64 => aarch64::LAYOUT.capacity,
        Architecture::Mips => mips::LAYOUT.capacity,
        Architecture::Ppc => ppc::LAYOUT.capacity,
        Architecture::RiscV => riscv::LAYOUT.capacity,
        Architecture::M680x => m680x::LAYOUT.capacity,
    }
}
