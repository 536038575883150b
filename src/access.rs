//! Register and group access resolution.
//!
//! Packages the oracle's register-access answer and the record's group list
//! without interpreting the values. Counts are checked against the lists they
//! describe; nothing is truncated or padded.

use serde::Serialize;

use crate::operand::{GroupId, RegisterId};
use crate::{DecodeOracle, DetailError, RawDecodeRecord};

/// Registers read and written by one instruction, and its groups.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RegisterAccess {
    pub regs_read: Vec<RegisterId>,
    pub regs_write: Vec<RegisterId>,
    pub groups: Vec<GroupId>,
}

/// Query `oracle` for the register accesses of `record`.
///
/// Fails with `RegisterAccessQueryFailed` when the oracle rejects the query
/// and with `AccessQueryInconsistent` when a reported count does not fit the
/// list it describes. The query is never retried.
pub fn resolve<O>(oracle: &O, record: &RawDecodeRecord) -> Result<RegisterAccess, DetailError>
where
    O: DecodeOracle + ?Sized,
{
    let raw = oracle
        .query_register_access(record)
        .map_err(DetailError::RegisterAccessQueryFailed)?;

    let regs_read = counted("read", &raw.read, usize::from(raw.read_count))?;
    let regs_write = counted("write", &raw.write, usize::from(raw.write_count))?;

    let groups = match &record.detail {
        Some(detail) => {
            let reported = usize::from(detail.groups_count);
            if reported != detail.groups.len() {
                return Err(DetailError::AccessQueryInconsistent {
                    list: "groups",
                    reported,
                    actual: detail.groups.len(),
                });
            }
            detail.groups.clone()
        }
        None => Vec::new(),
    };

    log::trace!(
        "{:#x}: {} read, {} written, {} groups",
        record.address,
        regs_read.len(),
        regs_write.len(),
        groups.len()
    );
    Ok(RegisterAccess {
        regs_read,
        regs_write,
        groups,
    })
}

fn counted<T: Copy>(list: &'static str, values: &[T], reported: usize) -> Result<Vec<T>, DetailError> {
    if reported > values.len() {
        return Err(DetailError::AccessQueryInconsistent {
            list,
            reported,
            actual: values.len(),
        });
    }
    Ok(values[..reported].to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stub_oracle::{detail, record, StubOracle};
    use crate::{OracleError, RawRegisterAccess, Target};

    #[test]
    fn test_packages_lists_and_groups() {
        let mut oracle = StubOracle::new(Target::Thumb, true, None);
        oracle.access = Ok(RawRegisterAccess::from_lists(&[10], &[11, 3]));
        let rec = record(Some(detail(0, 8)));

        let access = resolve(&oracle, &rec).unwrap();
        assert_eq!(access.regs_read, vec![10]);
        assert_eq!(access.regs_write, vec![11, 3]);
        assert_eq!(access.groups, vec![1, 2]);
        assert_eq!(oracle.queries.get(), 1);
    }

    #[test]
    fn test_count_over_capacity_is_inconsistent() {
        let mut oracle = StubOracle::new(Target::Arm, true, None);
        let mut raw = RawRegisterAccess::from_lists(&[1], &[]);
        raw.read_count = 65;
        oracle.access = Ok(raw);

        let err = resolve(&oracle, &record(Some(detail(0, 8)))).unwrap_err();
        assert!(matches!(
            err,
            DetailError::AccessQueryInconsistent {
                list: "read",
                reported: 65,
                actual: 64
            }
        ));
    }

    #[test]
    fn test_group_count_mismatch_is_inconsistent() {
        let oracle = StubOracle::new(Target::Arm, true, None);
        let mut raw = detail(0, 8);
        raw.groups_count = 3;

        let err = resolve(&oracle, &record(Some(raw))).unwrap_err();
        assert!(matches!(
            err,
            DetailError::AccessQueryInconsistent { list: "groups", .. }
        ));
    }

    #[test]
    fn test_oracle_failure_is_not_retried() {
        let mut oracle = StubOracle::new(Target::Mips32, true, None);
        oracle.access = Err(OracleError::Query {
            code: 7,
            message: "details are unavailable".to_string(),
        });

        let err = resolve(&oracle, &record(Some(detail(2, 8)))).unwrap_err();
        assert!(matches!(err, DetailError::RegisterAccessQueryFailed(_)));
        assert_eq!(oracle.queries.get(), 1);
    }
}
