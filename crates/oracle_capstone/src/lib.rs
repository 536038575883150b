//! Capstone-backed decode oracle implementing `detail_core::DecodeOracle`.
//!
//! The session talks to the engine through `capstone-sys` directly: the safe
//! wrapper hides the per-operand access bytes and `cs_regs_access`, both of
//! which the detail layer needs.

use std::cell::Cell;
use std::ffi::CStr;
use std::marker::PhantomData;
use std::mem;
use std::os::raw::c_char;
use std::ptr;
use std::slice;

use capstone_sys::{
    arm64_insn, arm64_op_type, cs_ac_type, cs_arch, cs_arm, cs_arm64, cs_arm64_op, cs_close, cs_detail, cs_detail__bindgen_ty_1, cs_disasm, cs_err,
    cs_free, cs_group_name, cs_insn, cs_insn_name, cs_m680x, cs_mips, cs_mode, cs_open,
    cs_opt_type, cs_opt_value, cs_option, cs_ppc, cs_reg_name, cs_regs, cs_regs_access, cs_riscv,
    cs_strerror, cs_x86, csh,
};
use detail_core::{
    Address, DecodeOracle, OracleError, RawDecodeRecord, RawDetail, RawRegisterAccess, Syntax,
    Target,
};

/*────────────────────────  target mapping  ───────────────────────*/

/// Engine architecture and mode bits for `target`.
fn arch_mode(target: Target) -> (cs_arch, cs_mode) {
    use capstone_sys::cs_arch::*;

    match target {
        Target::X86_16 => (CS_ARCH_X86, cs_mode::CS_MODE_16),
        Target::X86_32 => (CS_ARCH_X86, cs_mode::CS_MODE_32),
        Target::X86_64 => (CS_ARCH_X86, cs_mode::CS_MODE_64),
        Target::Arm => (CS_ARCH_ARM, cs_mode::CS_MODE_ARM),
        Target::Thumb => (CS_ARCH_ARM, cs_mode::CS_MODE_THUMB),
        Target::AArch64 => (CS_ARCH_ARM64, cs_mode::CS_MODE_ARM),
        Target::Mips32 => (CS_ARCH_MIPS, cs_mode::CS_MODE_MIPS32),
        Target::Mips64 => (CS_ARCH_MIPS, cs_mode::CS_MODE_MIPS64),
        Target::Ppc32 => (CS_ARCH_PPC, cs_mode::CS_MODE_32 | cs_mode::CS_MODE_BIG_ENDIAN),
        Target::Ppc64 => (CS_ARCH_PPC, cs_mode::CS_MODE_64 | cs_mode::CS_MODE_BIG_ENDIAN),
        Target::RiscV32 => (CS_ARCH_RISCV, cs_mode::CS_MODE_RISCV32 | cs_mode::CS_MODE_RISCVC),
        Target::RiscV64 => (CS_ARCH_RISCV, cs_mode::CS_MODE_RISCV64 | cs_mode::CS_MODE_RISCVC),
        Target::M6800 => (CS_ARCH_M680X, cs_mode::CS_MODE_M680X_6800),
        Target::M6809 => (CS_ARCH_M680X, cs_mode::CS_MODE_M680X_6809),
        Target::Hcs08 => (CS_ARCH_M680X, cs_mode::CS_MODE_M680X_HCS08),
    }
}

/// Oracle numbering of the architecture behind `target` (the `cs_arch` value).
pub fn arch_tag(target: Target) -> u32 {
    arch_mode(target).0 as u32
}

/// Size of the architecture's slice of the `cs_detail` union.
fn detail_size(arch: cs_arch) -> usize {
    use capstone_sys::cs_arch::*;

    match arch {
        CS_ARCH_X86 => mem::size_of::<cs_x86>(),
        CS_ARCH_ARM => mem::size_of::<cs_arm>(),
        CS_ARCH_ARM64 => mem::size_of::<cs_arm64>(),
        CS_ARCH_MIPS => mem::size_of::<cs_mips>(),
        CS_ARCH_PPC => mem::size_of::<cs_ppc>(),
        CS_ARCH_RISCV => mem::size_of::<cs_riscv>(),
        CS_ARCH_M680X => mem::size_of::<cs_m680x>(),
        _ => mem::size_of::<cs_detail__bindgen_ty_1>(),
    }
}

fn syntax_value(syntax: Syntax) -> Option<cs_opt_value::Type> {
    match syntax {
        Syntax::Default => None,
        Syntax::Intel => Some(cs_opt_value::CS_OPT_SYNTAX_INTEL),
        Syntax::Att => Some(cs_opt_value::CS_OPT_SYNTAX_ATT),
        Syntax::Masm => Some(cs_opt_value::CS_OPT_SYNTAX_MASM),
        Syntax::NoRegName => Some(cs_opt_value::CS_OPT_SYNTAX_NOREGNAME),
    }
}

fn strerror(code: cs_err::Type) -> String {
    let message = unsafe { cs_strerror(code) };
    c_str(message).unwrap_or_else(|| format!("capstone error {code}"))
}

fn c_str(raw: *const c_char) -> Option<String> {
    if raw.is_null() {
        return None;
    }
    let text = unsafe { CStr::from_ptr(raw) }.to_string_lossy().into_owned();
    (!text.is_empty()).then_some(text)
}

/// NUL-terminated text stored inline in a `cs_insn`.
fn inline_text(raw: &[c_char]) -> String {
    let bytes: Vec<u8> = raw.iter().take_while(|&&c| c != 0).map(|&c| c as u8).collect();
    String::from_utf8_lossy(&bytes).into_owned()
}

/// Narrow the transfer register of AArch64 `mrs`/`msr` to the direction it moves.
///
/// The engine marks it read-write, which puts the `mrs` destination in the
/// read set of `cs_regs_access` as well.
fn narrow_transfer_access(id: u32, blob: &mut [u8]) {
    let access = if id == arm64_insn::ARM64_INS_MRS as u32 {
        cs_ac_type::CS_AC_WRITE.0 as u8
    } else if id == arm64_insn::ARM64_INS_MSR as u32 {
        cs_ac_type::CS_AC_READ.0 as u8
    } else {
        return;
    };

    let operands = mem::offset_of!(cs_arm64, operands);
    let stride = mem::size_of::<cs_arm64_op>();
    let type_at = mem::offset_of!(cs_arm64_op, type_);
    let access_at = mem::offset_of!(cs_arm64_op, access);
    let count = blob
        .get(mem::offset_of!(cs_arm64, op_count))
        .map_or(0, |&n| usize::from(n));

    for index in 0..count {
        let base = operands + index * stride;
        let Some(raw_type) = blob.get(base + type_at..base + type_at + 4) else {
            break;
        };
        let raw_type = u32::from_ne_bytes([raw_type[0], raw_type[1], raw_type[2], raw_type[3]]);
        if raw_type == arm64_op_type::ARM64_OP_REG as u32 {
            if let Some(slot) = blob.get_mut(base + access_at) {
                *slot = access;
            }
        }
    }
}

/*────────────────────────  scoped engine buffer  ───────────────────────*/

/// Instructions allocated by `cs_disasm`, released when the guard drops.
struct InsnBuffer {
    insn: *mut cs_insn,
    count: usize,
}

impl InsnBuffer {
    fn first(&self) -> Option<&cs_insn> {
        if self.count == 0 || self.insn.is_null() {
            None
        } else {
            Some(unsafe { &*self.insn })
        }
    }
}

impl Drop for InsnBuffer {
    fn drop(&mut self) {
        if self.count > 0 && !self.insn.is_null() {
            unsafe { cs_free(self.insn, self.count) };
        }
    }
}

/*────────────────────────  session  ───────────────────────*/

/// One open Capstone handle, fixed to a target and a detail setting.
///
/// The handle is closed on drop. The type is `Send` but not `Sync`: the
/// engine keeps per-handle state during a decode.
#[derive(Debug)]
pub struct CapstoneOracle {
    handle: csh,
    target: Target,
    arch: cs_arch,
    detail: bool,
    _not_sync: PhantomData<Cell<()>>,
}

impl CapstoneOracle {
    /// Open a session for `target`.
    pub fn open(target: Target, syntax: Syntax, detail: bool) -> Result<Self, OracleError> {
        let (arch, mode) = arch_mode(target);
        let mut handle: csh = 0;
        let code = unsafe { cs_open(arch, mode, &mut handle) };
        if code != cs_err::CS_ERR_OK {
            return Err(OracleError::Session {
                target,
                message: strerror(code),
            });
        }

        let oracle = Self {
            handle,
            target,
            arch,
            detail,
            _not_sync: PhantomData,
        };
        if detail {
            oracle.set_option(cs_opt_type::CS_OPT_DETAIL, cs_opt_value::CS_OPT_ON)?;
        }
        if let Some(value) = syntax_value(syntax) {
            oracle.set_option(cs_opt_type::CS_OPT_SYNTAX, value)?;
        }

        log::debug!("opened capstone session for {target} (detail: {detail}, syntax: {syntax:?})");
        Ok(oracle)
    }

    fn set_option(&self, option: cs_opt_type, value: cs_opt_value::Type) -> Result<(), OracleError> {
        let code = unsafe { cs_option(self.handle, option, value as usize) };
        if code == cs_err::CS_ERR_OK {
            Ok(())
        } else {
            Err(OracleError::Session {
                target: self.target,
                message: format!("{option:?}: {}", strerror(code)),
            })
        }
    }

    fn copy_detail(&self, id: u32, detail: &cs_detail) -> RawDetail {
        let size = detail_size(self.arch);
        // The union is at least as large as any of its members.
        let mut blob = unsafe {
            slice::from_raw_parts(ptr::addr_of!(detail.__bindgen_anon_1).cast::<u8>(), size)
        }
        .to_vec();
        if self.arch == cs_arch::CS_ARCH_ARM64 {
            narrow_transfer_access(id, &mut blob);
        }

        RawDetail {
            arch_tag: self.arch as u32,
            regs_read: detail
                .regs_read
                .iter()
                .take(usize::from(detail.regs_read_count))
                .copied()
                .collect(),
            regs_write: detail
                .regs_write
                .iter()
                .take(usize::from(detail.regs_write_count))
                .copied()
                .collect(),
            groups: detail
                .groups
                .iter()
                .take(usize::from(detail.groups_count))
                .copied()
                .collect(),
            groups_count: detail.groups_count,
            blob,
        }
    }
}

impl Drop for CapstoneOracle {
    fn drop(&mut self) {
        let code = unsafe { cs_close(&mut self.handle) };
        if code != cs_err::CS_ERR_OK {
            log::warn!("closing {} session: {}", self.target, strerror(code));
        }
    }
}

impl DecodeOracle for CapstoneOracle {
    fn target(&self) -> Target {
        self.target
    }

    fn detail_enabled(&self) -> bool {
        self.detail
    }

    fn decode_one(&self, bytes: &[u8], address: Address) -> Result<RawDecodeRecord, OracleError> {
        if bytes.is_empty() {
            return Err(OracleError::NoInstruction { address });
        }

        let mut buffer = InsnBuffer {
            insn: ptr::null_mut(),
            count: 0,
        };
        buffer.count = unsafe {
            cs_disasm(self.handle, bytes.as_ptr(), bytes.len(), address, 1, &mut buffer.insn)
        };
        let insn = buffer.first().ok_or(OracleError::NoInstruction { address })?;

        let len = usize::from(insn.size).min(insn.bytes.len());
        let detail = if self.detail {
            unsafe { insn.detail.as_ref() }.map(|d| self.copy_detail(insn.id, d))
        } else {
            None
        };

        log::trace!("{address:#x}: id {} size {}", insn.id, insn.size);
        Ok(RawDecodeRecord {
            id: insn.id,
            alias_id: insn.id,
            address: insn.address,
            size: insn.size,
            bytes: insn.bytes[..len].to_vec(),
            mnemonic: inline_text(&insn.mnemonic),
            op_str: inline_text(&insn.op_str),
            is_alias: false,
            uses_alias_details: false,
            detail,
        })
    }

    fn query_register_access(
        &self,
        record: &RawDecodeRecord,
    ) -> Result<RawRegisterAccess, OracleError> {
        let raw = record.detail.as_ref().ok_or_else(|| OracleError::Query {
            code: cs_err::CS_ERR_DETAIL,
            message: strerror(cs_err::CS_ERR_DETAIL),
        })?;

        // Rebuild the engine's view of the instruction for the duration of the query.
        let mut detail: cs_detail = unsafe { mem::zeroed() };
        for (slot, reg) in detail.regs_read.iter_mut().zip(&raw.regs_read) {
            *slot = *reg;
        }
        detail.regs_read_count = raw.regs_read.len().min(detail.regs_read.len()) as u8;
        for (slot, reg) in detail.regs_write.iter_mut().zip(&raw.regs_write) {
            *slot = *reg;
        }
        detail.regs_write_count = raw.regs_write.len().min(detail.regs_write.len()) as u8;
        for (slot, group) in detail.groups.iter_mut().zip(&raw.groups) {
            *slot = *group;
        }
        detail.groups_count = raw.groups.len().min(detail.groups.len()) as u8;
        let len = raw.blob.len().min(mem::size_of::<cs_detail__bindgen_ty_1>());
        unsafe {
            ptr::copy_nonoverlapping(
                raw.blob.as_ptr(),
                ptr::addr_of_mut!(detail.__bindgen_anon_1).cast::<u8>(),
                len,
            );
        }

        let mut insn: cs_insn = unsafe { mem::zeroed() };
        insn.id = record.id;
        insn.address = record.address;
        insn.size = record.size;
        insn.detail = &mut detail;

        let mut read: cs_regs = [0; 64];
        let mut write: cs_regs = [0; 64];
        let mut read_count = 0u8;
        let mut write_count = 0u8;
        let code = unsafe {
            cs_regs_access(
                self.handle,
                &insn,
                read.as_mut_ptr(),
                &mut read_count,
                write.as_mut_ptr(),
                &mut write_count,
            )
        };

        match code {
            cs_err::CS_ERR_OK => Ok(RawRegisterAccess {
                read,
                read_count,
                write,
                write_count,
            }),
            cs_err::CS_ERR_ARCH => {
                // No access routine for this architecture: implicit registers only.
                log::debug!("{}: engine reports implicit registers only", self.target);
                Ok(RawRegisterAccess::from_lists(&raw.regs_read, &raw.regs_write))
            }
            code => Err(OracleError::Query {
                code,
                message: strerror(code),
            }),
        }
    }

    fn register_name(&self, reg: u16) -> Option<String> {
        c_str(unsafe { cs_reg_name(self.handle, u32::from(reg)) })
    }

    fn instruction_name(&self, id: u32) -> Option<String> {
        c_str(unsafe { cs_insn_name(self.handle, id) })
    }

    fn group_name(&self, group: u8) -> Option<String> {
        c_str(unsafe { cs_group_name(self.handle, u32::from(group)) })
    }
}
