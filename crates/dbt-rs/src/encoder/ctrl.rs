//! Control-flow encoders.
//!
//! Relative forms emit their opcode followed by a zero rel32 placeholder,
//! register the placeholder with the buffer, and return its offset. The
//! caller later resolves it with [`patch_rel32`].

use super::{emit_rr, Op};
use crate::buffer::CodeBuffer;
use crate::error::DbtError;
use crate::regmap::{Condition, HostCondition};
use crate::reloc::RelocKind;

/// `JMP rel32` (`E9 cd`). Returns the placeholder offset.
pub fn emit_jmp_rel32(buf: &mut CodeBuffer<'_>) -> usize {
    buf.emit_byte(0xE9);
    buf.emit_rel32_placeholder(RelocKind::Jmp)
}

/// `Jcc rel32` (`0F 80+cc cd`). Returns the placeholder offset.
pub fn emit_jcc_rel32(buf: &mut CodeBuffer<'_>, cc: HostCondition) -> usize {
    buf.emit_bytes(&[0x0F, cc.jcc_opcode()]);
    buf.emit_rel32_placeholder(RelocKind::Jcc(cc))
}

/// `CALL rel32` (`E8 cd`). Returns the placeholder offset.
pub fn emit_call_rel32(buf: &mut CodeBuffer<'_>) -> usize {
    buf.emit_byte(0xE8);
    buf.emit_rel32_placeholder(RelocKind::Call)
}

/// `JRCXZ rel8` (`E3 cb`): jump if `RCX` is zero, flags untouched.
///
/// Only used for short hops inside a block, so the displacement is given
/// up front instead of going through the relocation ledger.
pub fn emit_jrcxz_rel8(buf: &mut CodeBuffer<'_>, rel: i8) {
    buf.emit_bytes(&[0xE3, rel as u8]);
}

/// `JMP reg` (`FF /4`).
pub fn emit_jmp_reg(buf: &mut CodeBuffer<'_>, reg: u8) {
    emit_rr(buf, Op::new(&[0xFF]), 4, reg);
}

/// `CALL reg` (`FF /2`).
pub fn emit_call_reg(buf: &mut CodeBuffer<'_>, reg: u8) {
    emit_rr(buf, Op::new(&[0xFF]), 2, reg);
}

/// `RET` (`C3`).
pub fn emit_ret(buf: &mut CodeBuffer<'_>) {
    buf.emit_byte(0xC3);
}

/// Emit the host conditional jump testing the AArch64 condition `cond`.
///
/// `AL`/`NV` emit nothing and return `None`: the caller falls through or
/// emits its own unconditional jump.
pub fn emit_cond_branch(buf: &mut CodeBuffer<'_>, cond: Condition) -> Option<usize> {
    let cc = cond.to_host()?;
    Some(emit_jcc_rel32(buf, cc))
}

/// Resolve the placeholder at `offset` to jump to `target`.
///
/// # Errors
///
/// See [`CodeBuffer::patch_rel32`].
pub fn patch_rel32(buf: &mut CodeBuffer<'_>, offset: usize, target: u64) -> Result<(), DbtError> {
    buf.patch_rel32(offset, target)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jmp_placeholder_and_patch() {
        let mut buf = CodeBuffer::new(16);
        let off = emit_jmp_rel32(&mut buf);
        assert_eq!(off, 1);
        assert_eq!(buf.as_bytes(), &[0xE9, 0, 0, 0, 0]);
        patch_rel32(&mut buf, off, 0x20).unwrap();
        assert_eq!(buf.read_le32(off), Some(0x20 - 5));
    }

    #[test]
    fn jcc_opcodes() {
        let mut buf = CodeBuffer::new(16);
        let off = emit_jcc_rel32(&mut buf, HostCondition::Ne);
        assert_eq!(off, 2);
        assert_eq!(buf.as_bytes(), &[0x0F, 0x85, 0, 0, 0, 0]);
        assert_eq!(buf.relocations()[0].kind, RelocKind::Jcc(HostCondition::Ne));
    }

    #[test]
    fn cond_branch_eq_ne_are_negations() {
        let mut eq = CodeBuffer::new(8);
        let mut ne = CodeBuffer::new(8);
        emit_cond_branch(&mut eq, Condition::Eq).unwrap();
        emit_cond_branch(&mut ne, Condition::Ne).unwrap();
        assert_eq!(eq.as_bytes()[1], 0x84);
        assert_eq!(ne.as_bytes()[1], 0x85);
        assert_eq!(eq.as_bytes()[1] ^ ne.as_bytes()[1], 1);
    }

    #[test]
    fn cond_branch_always_emits_nothing() {
        let mut buf = CodeBuffer::new(8);
        assert_eq!(emit_cond_branch(&mut buf, Condition::Al), None);
        assert_eq!(emit_cond_branch(&mut buf, Condition::Nv), None);
        assert!(buf.is_empty());
        assert!(buf.relocations().is_empty());
    }

    #[test]
    fn jrcxz_is_short_and_untracked() {
        let mut buf = CodeBuffer::new(8);
        emit_jrcxz_rel8(&mut buf, 8);
        assert_eq!(buf.as_bytes(), &[0xE3, 0x08]);
        assert!(buf.relocations().is_empty());
    }

    #[test]
    fn indirect_forms() {
        let mut buf = CodeBuffer::new(16);
        emit_jmp_reg(&mut buf, 0);
        emit_jmp_reg(&mut buf, 9);
        emit_call_reg(&mut buf, 3);
        emit_ret(&mut buf);
        assert_eq!(
            buf.as_bytes(),
            &[0xFF, 0xE0, 0x41, 0xFF, 0xE1, 0xFF, 0xD3, 0xC3]
        );
    }

    #[test]
    fn call_relocation_kind() {
        let mut buf = CodeBuffer::new(16);
        let off = emit_call_rel32(&mut buf);
        assert_eq!(buf.relocations()[0].kind, RelocKind::Call);
        assert!(buf.patch_rel32(off, 0).is_ok());
        assert_eq!(buf.read_le32(off), Some((-5i32) as u32));
    }
}
