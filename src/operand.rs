//! Operand-level vocabulary shared by every architecture, and the query
//! helpers layered over any operand list.

use serde::Serialize;

/// Architecture-specific register number, as the oracle reports it.
pub type RegisterId = u16;

/// Architecture-specific instruction group number.
pub type GroupId = u8;

/// How an operand is accessed by its instruction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
pub enum AccessKind {
    /// Not accessed, or the oracle does not report access for the architecture.
    #[default]
    None,
    Read,
    Write,
    ReadWrite,
}

impl AccessKind {
    /// Decode the oracle's access bit set (`CS_AC_READ` = 1, `CS_AC_WRITE` = 2).
    pub fn from_raw(raw: u8) -> Self {
        match raw & 0b11 {
            0 => AccessKind::None,
            1 => AccessKind::Read,
            2 => AccessKind::Write,
            _ => AccessKind::ReadWrite,
        }
    }

    pub fn reads(self) -> bool {
        matches!(self, AccessKind::Read | AccessKind::ReadWrite)
    }

    pub fn writes(self) -> bool {
        matches!(self, AccessKind::Write | AccessKind::ReadWrite)
    }
}

/// Kind-based queries over an ordered operand list.
///
/// Implementors supply the operand count and the kind of each operand; the
/// counting and positional lookups are shared.
pub trait OperandQuery {
    /// Discriminant of one operand, without its payload.
    type Kind: Copy + PartialEq;

    fn operand_count(&self) -> usize;

    /// Kind of the operand at `index`, or `None` past the end.
    fn operand_kind(&self, index: usize) -> Option<Self::Kind>;

    /// Number of operands whose kind is `kind`.
    fn count_operands_of_kind(&self, kind: Self::Kind) -> u32 {
        (0..self.operand_count())
            .filter(|&index| self.operand_kind(index) == Some(kind))
            .count() as u32
    }

    /// Overall index of the `position`-th operand of `kind`, counting from 1.
    ///
    /// Returns `None` when `position < 1` or when fewer than `position`
    /// operands have that kind.
    fn nth_operand_index_of_kind(&self, kind: Self::Kind, position: i32) -> Option<usize> {
        if position < 1 {
            return None;
        }
        (0..self.operand_count())
            .filter(|&index| self.operand_kind(index) == Some(kind))
            .nth(position as usize - 1)
    }

    fn is_operand_of_kind(&self, index: usize, kind: Self::Kind) -> bool {
        self.operand_kind(index) == Some(kind)
    }
}
