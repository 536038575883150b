//! Decodes against the bundled Capstone engine.

use capstone_sys::{arm64_reg, arm_reg};
use rstest::rstest;

use crate::arch::aarch64::{AArch64OperandKind, AArch64OperandValue, SystemRegisterAccess};
use crate::arch::arm::{ArmOperandKind, ArmOperandValue};
use crate::arch::ArchDetails;
use crate::sweep::sweep;
use crate::{
    AccessKind, Address, ArchOperandKind, Architecture, Decoder, DecoderConfig, DetailError,
    OperandQuery, RegisterId, Target,
};

const X9: RegisterId = arm64_reg::ARM64_REG_X9 as RegisterId;
const LR: RegisterId = arm_reg::ARM_REG_LR as RegisterId;
const R3: RegisterId = arm_reg::ARM_REG_R3 as RegisterId;
const CPSR: RegisterId = arm_reg::ARM_REG_CPSR as RegisterId;

fn open(target: Target, detail: bool) -> Decoder {
    Decoder::open(&DecoderConfig {
        target,
        detail,
        ..DecoderConfig::default()
    })
    .unwrap()
}

#[test]
fn test_aarch64_mrs_system_register() {
    let decoder = open(Target::AArch64, true);
    let insn = decoder.decode(&[0x09, 0x00, 0x38, 0xd5], 0x2c).unwrap();

    assert_eq!(insn.address, 0x2c);
    assert_eq!(insn.size, 4);
    assert_eq!(insn.mnemonic, "mrs");
    assert!(insn.operand_text.eq_ignore_ascii_case("x9, MIDR_EL1"));

    let details = insn.details.as_ref().unwrap();
    let ArchDetails::AArch64(a64) = &details.arch else {
        panic!("expected AArch64 details, got {:?}", details.arch);
    };
    assert_eq!(a64.operands.len(), 2);
    assert_eq!(a64.operands[0].value, AArch64OperandValue::Register(X9));
    assert_eq!(a64.operands[0].access, AccessKind::Write);
    assert_eq!(
        a64.operands[1].value,
        AArch64OperandValue::SystemRegister {
            subtype: SystemRegisterAccess::Mrs,
            raw: 0xc000,
        }
    );
    assert_eq!(details.regs_write, vec![X9]);
    assert!(details.regs_read.is_empty());
    assert_eq!(decoder.register_name(X9).unwrap(), "x9");

    let sysreg = AArch64OperandKind::SystemRegister(SystemRegisterAccess::Mrs);
    assert_eq!(a64.nth_operand_index_of_kind(sysreg, 1), Some(1));
}

#[test]
fn test_thumb_bx_lr() {
    let decoder = open(Target::Thumb, true);
    let insn = decoder.decode(&[0x70, 0x47], 0x1000).unwrap();

    assert_eq!(insn.mnemonic, "bx");
    assert_eq!(insn.operand_text, "lr");
    assert_eq!(insn.size, 2);

    let details = insn.details.as_ref().unwrap();
    let ArchDetails::Arm(arm) = &details.arch else {
        panic!("expected ARM details, got {:?}", details.arch);
    };
    assert_eq!(arm.operands.len(), 1);
    assert_eq!(arm.operands[0].value, ArmOperandValue::Register(LR));
    assert_eq!(arm.operands[0].access, AccessKind::Read);
    assert_eq!(details.regs_read, vec![LR]);
    assert!(!details.writeback);
}

#[test]
fn test_arm_cmp_sets_flags() {
    let decoder = open(Target::Arm, true);
    let insn = decoder.decode(&[0x00, 0x00, 0x53, 0xe3], 0).unwrap();

    assert_eq!(insn.mnemonic, "cmp");
    assert_eq!(insn.operand_text, "r3, #0");

    let details = insn.details.as_ref().unwrap();
    let ArchDetails::Arm(arm) = &details.arch else {
        panic!("expected ARM details, got {:?}", details.arch);
    };
    assert!(arm.update_flags);
    assert_eq!(arm.operands.len(), 2);
    assert_eq!(arm.operands[0].value, ArmOperandValue::Register(R3));
    assert_eq!(arm.operands[0].access, AccessKind::Read);
    assert_eq!(arm.operands[1].value, ArmOperandValue::Immediate(0));
    assert!(details.reads(R3));
    assert_eq!(details.regs_write, vec![CPSR]);
}

#[rstest]
#[case(ArmOperandKind::Register, 1, Some(0))]
#[case(ArmOperandKind::Register, 2, None)]
#[case(ArmOperandKind::Immediate, 1, Some(1))]
#[case(ArmOperandKind::Register, 0, None)]
#[case(ArmOperandKind::Memory, 1, None)]
fn test_nth_operand_on_real_decode(
    #[case] kind: ArmOperandKind,
    #[case] position: i32,
    #[case] expected: Option<usize>,
) {
    let decoder = open(Target::Arm, true);
    let insn = decoder.decode(&[0x00, 0x00, 0x53, 0xe3], 0).unwrap();
    let details = insn.details.unwrap();

    assert_eq!(
        details
            .arch
            .nth_operand_index_of_kind(ArchOperandKind::Arm(kind), position),
        expected
    );
    // Kinds of another architecture never match.
    assert_eq!(
        details.arch.count_operands_of_kind(ArchOperandKind::AArch64(AArch64OperandKind::Register)),
        0
    );
}

#[test]
fn test_detail_gating() {
    let bytes = [0x09, 0x00, 0x38, 0xd5];

    let without = open(Target::AArch64, false).decode(&bytes, 0x2c).unwrap();
    let with = open(Target::AArch64, true).decode(&bytes, 0x2c).unwrap();

    assert!(without.details.is_none());
    assert_eq!(
        with.details.as_ref().map(|d| d.architecture()),
        Some(Architecture::AArch64)
    );
    assert_eq!(without.id, with.id);
    assert_eq!(without.address, with.address);
    assert_eq!(without.mnemonic, with.mnemonic);
    assert_eq!(without.operand_text, with.operand_text);
    assert_eq!(without.size, with.size);
    assert_eq!(without.bytes, with.bytes);
    assert_eq!(without.mnemonic, "mrs");
}

#[test]
fn test_truncated_encoding_becomes_bad_byte() {
    let decoder = open(Target::AArch64, true);

    let err = decoder.decode(&[0x09, 0x00], 0x80).unwrap_err();
    assert!(matches!(err, DetailError::NoInstruction { address: 0x80 }));

    let insn = decoder.decode_or_skip(&[0x09, 0x00], 0x80).unwrap();
    assert!(insn.is_bad_byte());
    assert_eq!(insn.address, 0x80);
    assert_eq!(insn.bytes, vec![0x09]);
    assert!(insn.details.is_none());
}

#[rstest]
#[case(Target::X86_64, &[0x55, 0x48, 0x89, 0xe5, 0x06, 0x0f, 0x0b, 0xc3, 0x0f])]
#[case(Target::Thumb, &[0x70, 0x47, 0x00, 0xbf, 0x01])]
#[case(Target::Mips32, &[0x08, 0x00, 0xe0, 0x03, 0x00, 0x00, 0x00, 0x00, 0xff])]
fn test_sweep_size_invariant(#[case] target: Target, #[case] image: &[u8]) {
    let decoder = open(target, true);
    let insns = sweep(&decoder, image, 0x1000).unwrap();

    let mut expected = 0x1000;
    for insn in &insns {
        assert_eq!(insn.address, expected);
        assert_eq!(insn.bytes.len(), usize::from(insn.size));
        assert_eq!(insn.details.is_none(), insn.is_bad_byte());
        expected = insn.end_address();
    }
    assert_eq!(expected, 0x1000 + image.len() as Address);
}
