//! Scripted `DecodeOracle` for tests that must not depend on the engine.

use std::cell::Cell;

use detail_core::{
    Address, DecodeOracle, OracleError, RawDecodeRecord, RawDetail, RawRegisterAccess, Target,
};

pub(crate) struct StubOracle {
    pub target: Target,
    pub detail: bool,
    /// Returned by every decode, relocated to the requested address; `None` decodes nothing.
    pub record: Option<RawDecodeRecord>,
    pub access: Result<RawRegisterAccess, OracleError>,
    pub queries: Cell<usize>,
}

impl StubOracle {
    pub fn new(target: Target, detail: bool, record: Option<RawDecodeRecord>) -> Self {
        Self {
            target,
            detail,
            record,
            access: Ok(RawRegisterAccess::default()),
            queries: Cell::new(0),
        }
    }
}

/// A two-byte record carrying `detail`.
pub(crate) fn record(detail: Option<RawDetail>) -> RawDecodeRecord {
    RawDecodeRecord {
        id: 7,
        alias_id: 7,
        address: 0,
        size: 2,
        bytes: vec![0xaa, 0xbb],
        mnemonic: "op".to_string(),
        op_str: "r1, r2".to_string(),
        is_alias: false,
        uses_alias_details: false,
        detail,
    }
}

/// A zeroed detail blob of `size` bytes tagged `arch_tag`.
pub(crate) fn detail(arch_tag: u32, size: usize) -> RawDetail {
    RawDetail {
        arch_tag,
        regs_read: vec![],
        regs_write: vec![],
        groups: vec![1, 2],
        groups_count: 2,
        blob: vec![0; size],
    }
}

impl DecodeOracle for StubOracle {
    fn target(&self) -> Target {
        self.target
    }

    fn detail_enabled(&self) -> bool {
        self.detail
    }

    fn decode_one(&self, bytes: &[u8], address: Address) -> Result<RawDecodeRecord, OracleError> {
        match &self.record {
            Some(record) if bytes.len() >= record.bytes.len() => {
                let mut record = record.clone();
                record.address = address;
                record.bytes = bytes[..record.bytes.len()].to_vec();
                if !self.detail {
                    record.detail = None;
                }
                Ok(record)
            }
            _ => Err(OracleError::NoInstruction { address }),
        }
    }

    fn query_register_access(
        &self,
        _record: &RawDecodeRecord,
    ) -> Result<RawRegisterAccess, OracleError> {
        self.queries.set(self.queries.get() + 1);
        self.access.clone()
    }

    fn register_name(&self, reg: u16) -> Option<String> {
        (reg < 32).then(|| format!("r{reg}"))
    }

    fn instruction_name(&self, id: u32) -> Option<String> {
        (id == 7).then(|| "op".to_string())
    }

    fn group_name(&self, group: u8) -> Option<String> {
        (group == 1).then(|| "jump".to_string())
    }
}
