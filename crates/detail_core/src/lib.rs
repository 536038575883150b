// ------------------------------------------------------------------
// Oracle ABI shared by every crate in the workspace.
// The decode oracle (Capstone, or a test double) hands back one
// `RawDecodeRecord` per call; everything typed is built on top of it
// by the root crate.
// ------------------------------------------------------------------

use serde::{Deserialize, Serialize};

/// 64‑bit virtual address of the first byte of an instruction.
pub type Address = u64;

/// Capacity of the register lists returned by a register-access query.
pub const REG_ACCESS_CAPACITY: usize = 64;

/*───────────────────────────────────────────────────────────────────────────
 *  Session targets
 *─────────────────────────────────────────────────────────────────────────*/

/// Architecture + mode a decode session is opened for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Target {
    X86_16,
    X86_32,
    X86_64,
    Arm,
    Thumb,
    AArch64,
    Mips32,
    Mips64,
    /// Big-endian PowerPC, 32-bit.
    Ppc32,
    /// Big-endian PowerPC, 64-bit.
    Ppc64,
    RiscV32,
    RiscV64,
    M6800,
    M6809,
    Hcs08,
}

impl Target {
    /// Every target, in declaration order.
    pub fn all() -> &'static [Target] {
        use Target::*;
        &[
            X86_16, X86_32, X86_64, Arm, Thumb, AArch64, Mips32, Mips64, Ppc32, Ppc64,
            RiscV32, RiscV64, M6800, M6809, Hcs08,
        ]
    }

    /// Longest encoding the target can produce, in bytes.
    pub fn max_instruction_size(self) -> usize {
        match self {
            Target::X86_16 | Target::X86_32 | Target::X86_64 => 15,
            Target::M6800 | Target::M6809 | Target::Hcs08 => 5,
            _ => 4,
        }
    }
}

impl std::fmt::Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Target::X86_16 => "x86-16",
            Target::X86_32 => "x86-32",
            Target::X86_64 => "x86-64",
            Target::Arm => "ARM",
            Target::Thumb => "Thumb",
            Target::AArch64 => "AArch64",
            Target::Mips32 => "MIPS32",
            Target::Mips64 => "MIPS64",
            Target::Ppc32 => "PowerPC 32",
            Target::Ppc64 => "PowerPC 64",
            Target::RiscV32 => "RISC-V 32",
            Target::RiscV64 => "RISC-V 64",
            Target::M6800 => "M6800",
            Target::M6809 => "M6809",
            Target::Hcs08 => "HCS08",
        };
        f.write_str(name)
    }
}

/// Assembly syntax flavour requested from the oracle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Syntax {
    /// Whatever the oracle prints by default for the architecture.
    #[default]
    Default,
    Intel,
    Att,
    Masm,
    /// Print registers as numbers only.
    NoRegName,
}

/*───────────────────────────────────────────────────────────────────────────
 *  Raw records
 *─────────────────────────────────────────────────────────────────────────*/

/// One instruction exactly as the oracle reported it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawDecodeRecord {
    /// Architecture-specific instruction id; 0 is never produced by a successful decode.
    pub id: u32,
    /// Canonical id when this decode is an alias, otherwise `id`.
    pub alias_id: u32,
    pub address: Address,
    pub size: u16,
    /// Encoding bytes, `size` of them.
    pub bytes: Vec<u8>,
    pub mnemonic: String,
    pub op_str: String,
    pub is_alias: bool,
    pub uses_alias_details: bool,
    /// Present only when the session was opened with detail enabled.
    pub detail: Option<RawDetail>,
}

/// Detail section of a raw record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawDetail {
    /// Oracle numbering of the architecture that produced `blob`.
    pub arch_tag: u32,
    /// Implicitly read registers.
    pub regs_read: Vec<u16>,
    /// Implicitly written registers.
    pub regs_write: Vec<u16>,
    pub groups: Vec<u8>,
    /// Number of groups the oracle claims to have filled.
    pub groups_count: u8,
    /// The architecture's detail struct, byte for byte in the oracle's layout.
    pub blob: Vec<u8>,
}

/// Answer to a register-access query, in the oracle's fixed-capacity shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRegisterAccess {
    pub read: [u16; REG_ACCESS_CAPACITY],
    pub read_count: u8,
    pub write: [u16; REG_ACCESS_CAPACITY],
    pub write_count: u8,
}

impl RawRegisterAccess {
    /// Build an answer from two register lists; lists longer than the capacity are cut.
    pub fn from_lists(read: &[u16], write: &[u16]) -> Self {
        let mut out = Self::default();
        for (slot, reg) in out.read.iter_mut().zip(read) {
            *slot = *reg;
        }
        for (slot, reg) in out.write.iter_mut().zip(write) {
            *slot = *reg;
        }
        out.read_count = read.len().min(REG_ACCESS_CAPACITY) as u8;
        out.write_count = write.len().min(REG_ACCESS_CAPACITY) as u8;
        out
    }
}

impl Default for RawRegisterAccess {
    fn default() -> Self {
        Self {
            read: [0; REG_ACCESS_CAPACITY],
            read_count: 0,
            write: [0; REG_ACCESS_CAPACITY],
            write_count: 0,
        }
    }
}

/*───────────────────────────────────────────────────────────────────────────
 *  Oracle abstraction
 *─────────────────────────────────────────────────────────────────────────*/

/// Failures reported by a decode oracle.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OracleError {
    /// Nothing decodes at the front of the input.
    #[error("no instruction at {address:#x}")]
    NoInstruction { address: Address },

    /// The session could not be opened or configured.
    #[error("cannot open {target} session: {message}")]
    Session { target: Target, message: String },

    /// A register-access query was rejected.
    #[error("register access query failed ({code}): {message}")]
    Query { code: u32, message: String },
}

/// The external disassembly engine, one instance per decode session.
///
/// A session is fixed to one [`Target`] and one detail setting for its whole
/// life. Implementors need not be `Sync`; callers keep one session per thread.
pub trait DecodeOracle {
    /// Target the session was opened for.
    fn target(&self) -> Target;

    /// Whether decodes carry a [`RawDetail`].
    fn detail_enabled(&self) -> bool;

    /// Decode exactly one instruction at the front of `bytes`.
    fn decode_one(&self, bytes: &[u8], address: Address) -> Result<RawDecodeRecord, OracleError>;

    /// Registers read and written by `record`, explicit and implicit.
    fn query_register_access(
        &self,
        record: &RawDecodeRecord,
    ) -> Result<RawRegisterAccess, OracleError>;

    fn register_name(&self, reg: u16) -> Option<String>;

    fn instruction_name(&self, id: u32) -> Option<String>;

    fn group_name(&self, group: u8) -> Option<String>;
}
