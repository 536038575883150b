//! One decoder session: raw oracle decodes turned into [`DecodedInstruction`]s.

use std::fmt;

use crate::access;
use crate::arch::ArchDetails;
use crate::instruction::{DecodedInstruction, InstructionDetails};
use crate::operand::{GroupId, RegisterId};
use crate::{
    Address, Architecture, CapstoneOracle, DecodeOracle, DecoderConfig, DetailError, OracleError,
    RawDecodeRecord, Target,
};

/// A decoder bound to one oracle session.
///
/// The session's target and detail setting are fixed at construction. A
/// `Decoder` is not shared between threads; open one per thread instead.
pub struct Decoder<O: DecodeOracle = CapstoneOracle> {
    oracle: O,
    architecture: Architecture,
}

impl Decoder<CapstoneOracle> {
    /// Open a Capstone session configured by `config`.
    pub fn open(config: &DecoderConfig) -> Result<Self, DetailError> {
        let oracle = CapstoneOracle::open(config.target, config.syntax, config.detail)
            .map_err(DetailError::Session)?;
        log::debug!(
            "opened {} session (detail {})",
            config.target,
            if config.detail { "on" } else { "off" }
        );
        Ok(Self::with_oracle(oracle))
    }
}

impl<O: DecodeOracle> Decoder<O> {
    pub fn with_oracle(oracle: O) -> Self {
        let architecture = Architecture::from(oracle.target());
        Self {
            oracle,
            architecture,
        }
    }

    pub fn target(&self) -> Target {
        self.oracle.target()
    }

    pub fn architecture(&self) -> Architecture {
        self.architecture
    }

    pub fn detail_enabled(&self) -> bool {
        self.oracle.detail_enabled()
    }

    pub fn oracle(&self) -> &O {
        &self.oracle
    }

    /// Decode the instruction at the start of `bytes`, located at `address`.
    ///
    /// With detail enabled the oracle must return a detail, and both the
    /// operand decode and the register-access query must succeed; a failure
    /// in any of them fails the whole call.
    ///
    /// # Panics
    ///
    /// If the oracle hands back a detail for a different architecture than
    /// the session's, or a blob shorter than that architecture's layout.
    pub fn decode(&self, bytes: &[u8], address: Address) -> Result<DecodedInstruction, DetailError> {
        let record = self.oracle.decode_one(bytes, address).map_err(|e| match e {
            OracleError::NoInstruction { address } => DetailError::NoInstruction { address },
            other => DetailError::Session(other),
        })?;

        let details = if self.detail_enabled() {
            Some(self.details(&record)?)
        } else {
            None
        };
        DecodedInstruction::from_record(self.architecture, record, details)
    }

    fn details(&self, record: &RawDecodeRecord) -> Result<InstructionDetails, DetailError> {
        let raw = record.detail.as_ref().ok_or(DetailError::MissingDetail {
            address: record.address,
        })?;

        let arch = Architecture::from_raw(raw.arch_tag)?;
        assert_eq!(
            arch, self.architecture,
            "{} detail returned by a {} session",
            arch, self.architecture
        );

        let arch_details = ArchDetails::decode(arch, record.id, &raw.blob, &raw.groups);
        let access = access::resolve(&self.oracle, record)?;
        Ok(InstructionDetails {
            regs_read: access.regs_read,
            regs_write: access.regs_write,
            groups: access.groups,
            writeback: arch_details.writeback(),
            arch: arch_details,
        })
    }

    /// Like [`decode`](Self::decode), but an undecodable first byte becomes a
    /// [`DecodedInstruction::bad_byte`] placeholder instead of an error.
    pub fn decode_or_skip(
        &self,
        bytes: &[u8],
        address: Address,
    ) -> Result<DecodedInstruction, DetailError> {
        match self.decode(bytes, address) {
            Err(DetailError::NoInstruction { .. }) if !bytes.is_empty() => {
                log::trace!("{:#x}: no instruction, skipping one byte", address);
                Ok(DecodedInstruction::bad_byte(
                    self.architecture,
                    address,
                    bytes[0],
                ))
            }
            other => other,
        }
    }

    pub fn register_name(&self, reg: RegisterId) -> Result<String, DetailError> {
        self.oracle
            .register_name(reg)
            .ok_or(DetailError::UnknownRegister(reg))
    }

    pub fn instruction_name(&self, id: u32) -> Result<String, DetailError> {
        self.oracle
            .instruction_name(id)
            .ok_or(DetailError::UnknownInstruction(id))
    }

    pub fn group_name(&self, group: GroupId) -> Result<String, DetailError> {
        self.oracle
            .group_name(group)
            .ok_or(DetailError::UnknownGroup(group))
    }
}

impl<O: DecodeOracle> fmt::Debug for Decoder<O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Decoder")
            .field("target", &self.target())
            .field("detail", &self.detail_enabled())
            .finish()
    }
}

impl<O: DecodeOracle> fmt::Display for Decoder<O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Decoder::{}", self.target())
    }
}
