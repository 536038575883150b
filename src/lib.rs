//! Typed, cross-architecture views over single-instruction decodes.
//!
//! A [`Decoder`] wraps one oracle session (Capstone by default) and turns each
//! raw decode into a [`DecodedInstruction`]: the architecture-agnostic fields
//! plus, when detail is enabled, an [`InstructionDetails`] holding the typed
//! per-architecture operands and the register-access sets.
//!
//! # Basic Usage
//!
//! ```rust,no_run
//! use nuclide_detail::{
//!     arch::ArchDetails, Decoder, DecoderConfig, OperandQuery, Target,
//! };
//!
//! let config = DecoderConfig {
//!     target: Target::AArch64,
//!     detail: true,
//!     ..DecoderConfig::default()
//! };
//! let decoder = Decoder::open(&config).unwrap();
//!
//! // mrs x9, midr_el1
//! let insn = decoder.decode(&[0x09, 0x00, 0x38, 0xd5], 0x2c).unwrap();
//! println!("{insn}");
//!
//! if let Some(details) = &insn.details {
//!     if let ArchDetails::AArch64(a64) = &details.arch {
//!         println!("{} operands", a64.operand_count());
//!     }
//!     for reg in &details.regs_write {
//!         println!("writes {}", decoder.register_name(*reg).unwrap());
//!     }
//! }
//! ```

pub mod access;
pub mod arch;
mod blob;
pub mod config;
pub mod decoder;
pub mod format;
pub mod instruction;
pub mod operand;
pub mod sweep;
#[cfg(test)]
mod scenario_tests;
#[cfg(test)]
mod stub_oracle;

use std::fmt;

use capstone_sys::cs_arch;
use serde::{Deserialize, Serialize};

pub use detail_core::{
    Address, DecodeOracle, OracleError, RawDecodeRecord, RawDetail, RawRegisterAccess, Syntax,
    Target,
};
pub use oracle_capstone::CapstoneOracle;

pub use crate::access::RegisterAccess;
pub use crate::arch::{ArchDetails, ArchOperandKind};
pub use crate::config::DecoderConfig;
pub use crate::decoder::Decoder;
pub use crate::instruction::{DecodedInstruction, InstructionDetails};
pub use crate::operand::{AccessKind, GroupId, OperandQuery, RegisterId};

/// Instruction-set families with a detail decoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Architecture {
    /// x86 in 16-, 32- and 64-bit modes
    X86,
    /// ARM, including Thumb
    Arm,
    AArch64,
    Mips,
    /// PowerPC
    Ppc,
    RiscV,
    /// Motorola 6800/6809 and Freescale HCS08
    M680x,
}

impl Architecture {
    pub fn all() -> &'static [Architecture] {
        &[
            Architecture::X86,
            Architecture::Arm,
            Architecture::AArch64,
            Architecture::Mips,
            Architecture::Ppc,
            Architecture::RiscV,
            Architecture::M680x,
        ]
    }

    /// The oracle's numbering for this architecture (`cs_arch`).
    pub fn raw(self) -> u32 {
        let arch = match self {
            Architecture::X86 => cs_arch::CS_ARCH_X86,
            Architecture::Arm => cs_arch::CS_ARCH_ARM,
            Architecture::AArch64 => cs_arch::CS_ARCH_ARM64,
            Architecture::Mips => cs_arch::CS_ARCH_MIPS,
            Architecture::Ppc => cs_arch::CS_ARCH_PPC,
            Architecture::RiscV => cs_arch::CS_ARCH_RISCV,
            Architecture::M680x => cs_arch::CS_ARCH_M680X,
        };
        arch as u32
    }

    /// Map an oracle architecture tag onto a supported architecture.
    pub fn from_raw(tag: u32) -> Result<Self, DetailError> {
        Architecture::all()
            .iter()
            .copied()
            .find(|arch| arch.raw() == tag)
            .ok_or(DetailError::UnsupportedArchitecture(tag))
    }
}

impl From<Target> for Architecture {
    fn from(target: Target) -> Self {
        match target {
            Target::X86_16 | Target::X86_32 | Target::X86_64 => Architecture::X86,
            Target::Arm | Target::Thumb => Architecture::Arm,
            Target::AArch64 => Architecture::AArch64,
            Target::Mips32 | Target::Mips64 => Architecture::Mips,
            Target::Ppc32 | Target::Ppc64 => Architecture::Ppc,
            Target::RiscV32 | Target::RiscV64 => Architecture::RiscV,
            Target::M6800 | Target::M6809 | Target::Hcs08 => Architecture::M680x,
        }
    }
}

impl fmt::Display for Architecture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Architecture::X86 => write!(f, "x86"),
            Architecture::Arm => write!(f, "ARM"),
            Architecture::AArch64 => write!(f, "AArch64"),
            Architecture::Mips => write!(f, "MIPS"),
            Architecture::Ppc => write!(f, "PowerPC"),
            Architecture::RiscV => write!(f, "RISC-V"),
            Architecture::M680x => write!(f, "M680X"),
        }
    }
}

/// Errors surfaced by decoding, access resolution and label lookups.
#[derive(Debug, thiserror::Error)]
pub enum DetailError {
    /// Nothing decodes at `address`; callers may skip a byte and resynchronize.
    #[error("no instruction at 0x{address:x}")]
    NoInstruction { address: Address },

    /// The oracle's byte span does not match the size it reported.
    #[error("record at 0x{address:x} spans {actual} bytes but reports size {size}")]
    ByteSpanMismatch {
        address: Address,
        size: u16,
        actual: usize,
    },

    /// Detail is enabled for the session but the oracle returned none.
    #[error("no detail returned for the instruction at 0x{address:x}")]
    MissingDetail { address: Address },

    /// The oracle tagged a detail with an architecture this crate has no decoder for.
    #[error("unsupported architecture tag {0}")]
    UnsupportedArchitecture(u32),

    /// A register-access answer whose counts do not match its lists.
    #[error("inconsistent {list} list: {reported} reported, {actual} available")]
    AccessQueryInconsistent {
        list: &'static str,
        reported: usize,
        actual: usize,
    },

    /// The oracle rejected the register-access query.
    #[error("register access query failed: {0}")]
    RegisterAccessQueryFailed(#[source] OracleError),

    #[error("unknown register {0}")]
    UnknownRegister(RegisterId),

    #[error("unknown instruction id {0}")]
    UnknownInstruction(u32),

    #[error("unknown instruction group {0}")]
    UnknownGroup(GroupId),

    /// The oracle session could not be opened or configured.
    #[error("decoder session: {0}")]
    Session(#[source] OracleError),

    #[error("invalid configuration: {0}")]
    Config(#[source] serde_json::Error),

    #[error("formatting failed: {0}")]
    Format(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_architecture_tags_round_trip() {
        for &arch in Architecture::all() {
            assert_eq!(Architecture::from_raw(arch.raw()).unwrap(), arch);
        }
        assert_eq!(Architecture::X86.raw(), 3);
        assert_eq!(Architecture::AArch64.raw(), 1);
    }

    #[test]
    fn test_unknown_tag_is_unsupported() {
        // CS_ARCH_SPARC has no decoder here.
        let err = Architecture::from_raw(cs_arch::CS_ARCH_SPARC as u32).unwrap_err();
        assert!(matches!(err, DetailError::UnsupportedArchitecture(_)));
    }

    #[test]
    fn test_target_families() {
        assert_eq!(Architecture::from(Target::Thumb), Architecture::Arm);
        assert_eq!(Architecture::from(Target::X86_16), Architecture::X86);
        assert_eq!(Architecture::from(Target::Hcs08), Architecture::M680x);
        for &target in Target::all() {
            let _ = Architecture::from(target);
        }
    }

    #[test]
    fn test_error_messages() {
        let err = DetailError::NoInstruction { address: 0x40 };
        assert_eq!(err.to_string(), "no instruction at 0x40");
        let err = DetailError::AccessQueryInconsistent {
            list: "read",
            reported: 70,
            actual: 64,
        };
        assert_eq!(err.to_string(), "inconsistent read list: 70 reported, 64 available");
        let err = DetailError::ByteSpanMismatch {
            address: 0x10,
            size: 2,
            actual: 1,
        };
        assert_eq!(err.to_string(), "record at 0x10 spans 1 bytes but reports size 2");
    }
}
