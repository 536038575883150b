//! Motorola 6800/6809 and Freescale HCS08 detail decoding.

use std::mem::{offset_of, size_of};

use capstone_sys::{cs_m680x, cs_m680x_op, m680x_op_ext, m680x_op_idx, m680x_op_rel, m680x_op_type};
use serde::Serialize;

use super::{optional_register, register};
use crate::blob::{ArchLayout, DetailBlob};
use crate::operand::{AccessKind, OperandQuery, RegisterId};
use crate::Architecture;

pub(crate) const LAYOUT: ArchLayout = ArchLayout {
    arch: Architecture::M680x,
    size: size_of::<cs_m680x>(),
    op_count: offset_of!(cs_m680x, op_count),
    operands: offset_of!(cs_m680x, operands),
    stride: size_of::<cs_m680x_op>(),
    capacity: (size_of::<cs_m680x>() - offset_of!(cs_m680x, operands))
        / size_of::<cs_m680x_op>(),
};

const OP_TYPE: usize = offset_of!(cs_m680x_op, type_);
const OP_VALUE: usize = offset_of!(cs_m680x_op, __bindgen_anon_1);
const OP_SIZE: usize = offset_of!(cs_m680x_op, size);
const OP_ACCESS: usize = offset_of!(cs_m680x_op, access);

const IDX_BASE: usize = OP_VALUE + offset_of!(m680x_op_idx, base_reg);
const IDX_OFFSET_REG: usize = OP_VALUE + offset_of!(m680x_op_idx, offset_reg);
const IDX_OFFSET: usize = OP_VALUE + offset_of!(m680x_op_idx, offset);
const IDX_OFFSET_ADDR: usize = OP_VALUE + offset_of!(m680x_op_idx, offset_addr);
const IDX_OFFSET_BITS: usize = OP_VALUE + offset_of!(m680x_op_idx, offset_bits);
const IDX_INC_DEC: usize = OP_VALUE + offset_of!(m680x_op_idx, inc_dec);
const IDX_FLAGS: usize = OP_VALUE + offset_of!(m680x_op_idx, flags);
const REL_ADDRESS: usize = OP_VALUE + offset_of!(m680x_op_rel, address);
const REL_OFFSET: usize = OP_VALUE + offset_of!(m680x_op_rel, offset);
const EXT_ADDRESS: usize = OP_VALUE + offset_of!(m680x_op_ext, address);
const EXT_INDIRECT: usize = OP_VALUE + offset_of!(m680x_op_ext, indirect);

const TYPE_REGISTER: u32 = m680x_op_type::M680X_OP_REGISTER as u32;
const TYPE_IMMEDIATE: u32 = m680x_op_type::M680X_OP_IMMEDIATE as u32;
const TYPE_INDEXED: u32 = m680x_op_type::M680X_OP_INDEXED as u32;
const TYPE_EXTENDED: u32 = m680x_op_type::M680X_OP_EXTENDED as u32;
const TYPE_DIRECT: u32 = m680x_op_type::M680X_OP_DIRECT as u32;
const TYPE_RELATIVE: u32 = m680x_op_type::M680X_OP_RELATIVE as u32;
const TYPE_CONSTANT: u32 = m680x_op_type::M680X_OP_CONSTANT as u32;

// m680x.h preprocessor flags; bindgen does not emit them.
const IDX_INDIRECT: u8 = 1;
const IDX_NO_COMMA: u8 = 2;
const IDX_POST_INC_DEC: u8 = 4;
const FIRST_OP_IN_MNEM: u8 = 1;
const SECOND_OP_IN_MNEM: u8 = 2;

/*────────────────────────  model  ───────────────────────*/

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct M680xDetails {
    /// The first operand is encoded in the mnemonic (e.g. `ldaa`).
    pub first_op_in_mnemonic: bool,
    pub second_op_in_mnemonic: bool,
    pub operands: Vec<M680xOperand>,
}

impl M680xDetails {
    /// Any indexed operand auto-increments or auto-decrements its base.
    pub fn writeback(&self) -> bool {
        self.operands
            .iter()
            .any(|op| matches!(op.value, M680xOperandValue::Indexed(idx) if idx.inc_dec != 0))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct M680xOperand {
    pub value: M680xOperandValue,
    /// Operand size in bytes.
    pub size: u8,
    pub access: AccessKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum M680xOperandValue {
    Invalid,
    Register(RegisterId),
    Immediate(i32),
    Indexed(M680xIndexed),
    Extended { address: u16, indirect: bool },
    /// Low byte of a direct-page address.
    Direct(u8),
    Relative { address: u16, offset: i16 },
    /// Bit index or page number.
    Constant(u8),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct M680xIndexed {
    pub base: Option<RegisterId>,
    pub offset_register: Option<RegisterId>,
    pub offset: i16,
    /// `offset + PC` when the base is PC.
    pub offset_addr: u16,
    pub offset_bits: u8,
    /// 1..=8 increments, -1..=-8 decrements, 0 for none.
    pub inc_dec: i8,
    pub indirect: bool,
    pub no_comma: bool,
    /// `inc_dec` applies after the access rather than before.
    pub post_inc_dec: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum M680xOperandKind {
    Invalid,
    Register,
    Immediate,
    Indexed,
    Extended,
    Direct,
    Relative,
    Constant,
}

impl M680xOperandValue {
    pub fn kind(&self) -> M680xOperandKind {
        match self {
            M680xOperandValue::Invalid => M680xOperandKind::Invalid,
            M680xOperandValue::Register(_) => M680xOperandKind::Register,
            M680xOperandValue::Immediate(_) => M680xOperandKind::Immediate,
            M680xOperandValue::Indexed(_) => M680xOperandKind::Indexed,
            M680xOperandValue::Extended { .. } => M680xOperandKind::Extended,
            M680xOperandValue::Direct(_) => M680xOperandKind::Direct,
            M680xOperandValue::Relative { .. } => M680xOperandKind::Relative,
            M680xOperandValue::Constant(_) => M680xOperandKind::Constant,
        }
    }
}

impl OperandQuery for M680xDetails {
    type Kind = M680xOperandKind;

    fn operand_count(&self) -> usize {
        self.operands.len()
    }

    fn operand_kind(&self, index: usize) -> Option<M680xOperandKind> {
        self.operands.get(index).map(|op| op.value.kind())
    }
}

/*────────────────────────  decoding  ───────────────────────*/

pub(crate) fn decode(bytes: &[u8]) -> M680xDetails {
    let blob = LAYOUT.bind(bytes);
    let flags = blob.u8(offset_of!(cs_m680x, flags));

    M680xDetails {
        first_op_in_mnemonic: flags & FIRST_OP_IN_MNEM != 0,
        second_op_in_mnemonic: flags & SECOND_OP_IN_MNEM != 0,
        operands: LAYOUT.operands(&blob).map(|op| operand(&op)).collect(),
    }
}

fn operand(op: &DetailBlob<'_>) -> M680xOperand {
    let value = match op.u32(OP_TYPE) {
        TYPE_REGISTER => M680xOperandValue::Register(register(op.u32(OP_VALUE))),
        TYPE_IMMEDIATE => M680xOperandValue::Immediate(op.i32(OP_VALUE)),
        TYPE_INDEXED => {
            let flags = op.u8(IDX_FLAGS);
            M680xOperandValue::Indexed(M680xIndexed {
                base: optional_register(op.u32(IDX_BASE)),
                offset_register: optional_register(op.u32(IDX_OFFSET_REG)),
                offset: op.i16(IDX_OFFSET),
                offset_addr: op.u16(IDX_OFFSET_ADDR),
                offset_bits: op.u8(IDX_OFFSET_BITS),
                inc_dec: op.i8(IDX_INC_DEC),
                indirect: flags & IDX_INDIRECT != 0,
                no_comma: flags & IDX_NO_COMMA != 0,
                post_inc_dec: flags & IDX_POST_INC_DEC != 0,
            })
        }
        TYPE_EXTENDED => M680xOperandValue::Extended {
            address: op.u16(EXT_ADDRESS),
            indirect: op.bool(EXT_INDIRECT),
        },
        TYPE_DIRECT => M680xOperandValue::Direct(op.u8(OP_VALUE)),
        TYPE_RELATIVE => M680xOperandValue::Relative {
            address: op.u16(REL_ADDRESS),
            offset: op.i16(REL_OFFSET),
        },
        TYPE_CONSTANT => M680xOperandValue::Constant(op.u8(OP_VALUE)),
        _ => M680xOperandValue::Invalid,
    };

    M680xOperand {
        value,
        size: op.u8(OP_SIZE),
        access: AccessKind::from_raw(op.u8(OP_ACCESS)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blob::BlobWriter;

    fn op_offset(index: usize) -> usize {
        LAYOUT.operands + index * LAYOUT.stride
    }

    #[test]
    fn test_capacity() {
        assert_eq!(LAYOUT.capacity, 9);
    }

    #[test]
    fn test_post_increment_indexed() {
        // ldx ,y++ style operand
        let mut w = BlobWriter::new(LAYOUT.size);
        w.u8(offset_of!(cs_m680x, flags), FIRST_OP_IN_MNEM)
            .u8(LAYOUT.op_count, 1)
            .u32(op_offset(0) + OP_TYPE, TYPE_INDEXED)
            .u32(op_offset(0) + IDX_BASE, 7)
            .put(op_offset(0) + IDX_INC_DEC, &[2])
            .u8(op_offset(0) + IDX_FLAGS, IDX_POST_INC_DEC)
            .u8(op_offset(0) + OP_ACCESS, 1)
            .u8(op_offset(0) + OP_SIZE, 2);

        let details = decode(&w.bytes);
        assert!(details.first_op_in_mnemonic);
        assert!(!details.second_op_in_mnemonic);
        let M680xOperandValue::Indexed(idx) = details.operands[0].value else {
            panic!("expected an indexed operand");
        };
        assert_eq!(idx.base, Some(7));
        assert_eq!(idx.offset_register, None);
        assert_eq!(idx.inc_dec, 2);
        assert!(idx.post_inc_dec);
        assert!(!idx.indirect);
        assert!(details.writeback());
    }

    #[test]
    fn test_relative_and_extended() {
        let mut w = BlobWriter::new(LAYOUT.size);
        w.u8(LAYOUT.op_count, 2)
            .u32(op_offset(0) + OP_TYPE, TYPE_RELATIVE)
            .u16(op_offset(0) + REL_ADDRESS, 0x1010)
            .put(op_offset(0) + REL_OFFSET, &(-6i16).to_ne_bytes())
            .u32(op_offset(1) + OP_TYPE, TYPE_EXTENDED)
            .u16(op_offset(1) + EXT_ADDRESS, 0xfffe)
            .u8(op_offset(1) + EXT_INDIRECT, 1);

        let details = decode(&w.bytes);
        assert_eq!(
            details.operands[0].value,
            M680xOperandValue::Relative {
                address: 0x1010,
                offset: -6
            }
        );
        assert_eq!(
            details.operands[1].value,
            M680xOperandValue::Extended {
                address: 0xfffe,
                indirect: true
            }
        );
        assert!(!details.writeback());
    }
}
