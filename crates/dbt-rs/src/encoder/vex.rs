//! VEX prefix encoding and AVX three-operand forms.
//!
//! VEX folds the legacy mandatory prefix, REX bits, and `0F`-family escape
//! into a 2- or 3-byte prefix and adds a non-destructive source operand
//! (`vvvv`). The translator uses these forms when AVX is enabled so that
//! `Vd = Vn op Vm` needs no preliminary copy of `Vn` into `Vd`.

use super::{simd::PackedOp, InstrBytes, ScalarOp};
use crate::buffer::CodeBuffer;
use crate::encoder::fp::Precision;

/// VEX `pp` field (implied mandatory prefix).
///   0 = none, 1 = 0x66, 2 = 0xF3, 3 = 0xF2
fn vex_pp(mandatory_prefix: u8) -> u8 {
    match mandatory_prefix {
        0x66 => 0b01,
        0xF3 => 0b10,
        0xF2 => 0b11,
        _ => 0b00,
    }
}

/// VEX `m-mmmm` field (implied escape bytes).
///   1 = 0F, 2 = 0F 38, 3 = 0F 3A
fn vex_mmmmm(escape: &[u8]) -> u8 {
    match escape {
        [0x0F, 0x38] => 0b00010,
        [0x0F, 0x3A] => 0b00011,
        _ => 0b00001,
    }
}

/// 2-byte VEX: `C5 [~R ~vvvv L pp]`.
///
/// Usable only when the escape is plain `0F`, `W = 0`, and neither
/// `X` nor `B` is extended.
fn emit_vex2(ib: &mut InstrBytes, r: bool, vvvv: u8, l: bool, pp: u8) {
    let byte1 = (if r { 0 } else { 0x80 })
        | (((!vvvv) & 0x0F) << 3)
        | (if l { 0x04 } else { 0 })
        | (pp & 0x03);
    ib.push(0xC5);
    ib.push(byte1);
}

/// 3-byte VEX: `C4 [~R ~X ~B mmmmm] [W ~vvvv L pp]`.
#[allow(clippy::fn_params_excessive_bools)]
fn emit_vex3(ib: &mut InstrBytes, r: bool, b: bool, mmmmm: u8, w: bool, vvvv: u8, l: bool, pp: u8) {
    let byte1 = (if r { 0 } else { 0x80 }) | 0x40 | (if b { 0 } else { 0x20 }) | (mmmmm & 0x1F);
    let byte2 = (if w { 0x80 } else { 0 })
        | (((!vvvv) & 0x0F) << 3)
        | (if l { 0x04 } else { 0 })
        | (pp & 0x03);
    ib.push(0xC4);
    ib.push(byte1);
    ib.push(byte2);
}

/// Opcode description for a VEX-encoded instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VexOp<'a> {
    /// Implied legacy prefix (`0x00`, `0x66`, `0xF3`, `0xF2`).
    pub prefix: u8,
    /// Escape bytes (`[0x0F]`, `[0x0F, 0x38]`, `[0x0F, 0x3A]`).
    pub escape: &'a [u8],
    /// Final opcode byte.
    pub opcode: u8,
    /// `VEX.W`.
    pub w: bool,
    /// `VEX.L` (256-bit).
    pub l: bool,
}

impl<'a> VexOp<'a> {
    /// Split a legacy `0F…` opcode sequence into escape and final byte.
    ///
    /// Returns `None` for an empty sequence.
    pub fn from_legacy(prefix: u8, legacy: &'a [u8]) -> Option<Self> {
        let (&opcode, escape) = legacy.split_last()?;
        Some(Self {
            prefix,
            escape,
            opcode,
            w: false,
            l: false,
        })
    }
}

fn instr_vex_rrr(op: VexOp<'_>, dst: u8, src1: u8, src2: u8) -> InstrBytes {
    let mut ib = InstrBytes::new();
    let pp = vex_pp(op.prefix);
    let mmmmm = vex_mmmmm(op.escape);
    let r = dst & 8 != 0;
    let b = src2 & 8 != 0;
    if mmmmm == 0b00001 && !op.w && !b {
        emit_vex2(&mut ib, r, src1 & 0x0F, op.l, pp);
    } else {
        emit_vex3(&mut ib, r, b, mmmmm, op.w, src1 & 0x0F, op.l, pp);
    }
    ib.push(op.opcode);
    ib.push(0xC0 | ((dst & 7) << 3) | (src2 & 7));
    ib
}

/// Emit `op dst, src1, src2`: `dst` in ModR/M.reg, `src1` in `vvvv`,
/// `src2` in ModR/M.rm.
pub fn emit_vex_rrr(buf: &mut CodeBuffer<'_>, op: VexOp<'_>, dst: u8, src1: u8, src2: u8) {
    instr_vex_rrr(op, dst, src1, src2).emit(buf);
}

/// Emit `op dst, src1, src2, imm8`.
pub fn emit_vex_rrr_ib(
    buf: &mut CodeBuffer<'_>,
    op: VexOp<'_>,
    dst: u8,
    src1: u8,
    src2: u8,
    imm: u8,
) {
    let mut ib = instr_vex_rrr(op, dst, src1, src2);
    ib.push(imm);
    ib.emit(buf);
}

/// AVX form of a [`PackedOp`]: `dst = src1 op src2` (128-bit).
///
/// Returns `false` (and emits nothing) when the width has no encoding.
pub fn emit_vpacked(buf: &mut CodeBuffer<'_>, op: PackedOp, dst: u8, src1: u8, src2: u8) -> bool {
    match op.opcode().and_then(|legacy| VexOp::from_legacy(0x66, legacy)) {
        Some(vop) => {
            emit_vex_rrr(buf, vop, dst, src1, src2);
            true
        }
        None => false,
    }
}

/// `VADDSS/VADDSD…` family: `dst = src1 op src2` in the low lane,
/// upper bits copied from `src1`.
pub fn emit_vscalar(
    buf: &mut CodeBuffer<'_>,
    op: ScalarOp,
    prec: Precision,
    dst: u8,
    src1: u8,
    src2: u8,
) {
    let vop = VexOp {
        prefix: prec.scalar_prefix(),
        escape: &[0x0F],
        opcode: op as u8,
        w: false,
        l: false,
    };
    emit_vex_rrr(buf, vop, dst, src1, src2);
}

/// `VPALIGNR dst, src1, src2, imm8`.
pub fn emit_vpalignr(buf: &mut CodeBuffer<'_>, dst: u8, src1: u8, src2: u8, imm: u8) {
    let vop = VexOp {
        prefix: 0x66,
        escape: &[0x0F, 0x3A],
        opcode: 0x0F,
        w: false,
        l: false,
    };
    emit_vex_rrr_ib(buf, vop, dst, src1, src2, imm);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::simd::ElemSize;
    use alloc::vec::Vec;

    fn enc(f: impl FnOnce(&mut CodeBuffer<'_>)) -> Vec<u8> {
        let mut buf = CodeBuffer::new(32);
        f(&mut buf);
        buf.as_bytes().to_vec()
    }

    #[test]
    fn vex_pp_values() {
        assert_eq!(vex_pp(0x00), 0b00);
        assert_eq!(vex_pp(0x66), 0b01);
        assert_eq!(vex_pp(0xF3), 0b10);
        assert_eq!(vex_pp(0xF2), 0b11);
    }

    #[test]
    fn vex_mmmmm_values() {
        assert_eq!(vex_mmmmm(&[0x0F]), 0b00001);
        assert_eq!(vex_mmmmm(&[0x0F, 0x38]), 0b00010);
        assert_eq!(vex_mmmmm(&[0x0F, 0x3A]), 0b00011);
    }

    /// VPADDD xmm0, xmm1, xmm2 — encoding: [C5 F1 FE C2]
    #[test]
    fn vpaddd_two_byte_prefix() {
        assert_eq!(
            enc(|b| {
                emit_vpacked(b, PackedOp::Add(ElemSize::B32), 0, 1, 2);
            }),
            [0xC5, 0xF1, 0xFE, 0xC2]
        );
    }

    /// VPADDD xmm0, xmm1, xmm9 — encoding: [C4 C1 71 FE C1]
    #[test]
    fn extended_rm_forces_three_byte_prefix() {
        assert_eq!(
            enc(|b| {
                emit_vpacked(b, PackedOp::Add(ElemSize::B32), 0, 1, 9);
            }),
            [0xC4, 0xC1, 0x71, 0xFE, 0xC1]
        );
    }

    /// VPXOR xmm8, xmm1, xmm2 — encoding: [C5 71 EF C2]
    #[test]
    fn extended_reg_stays_two_byte() {
        assert_eq!(
            enc(|b| {
                emit_vpacked(b, PackedOp::Xor, 8, 1, 2);
            }),
            [0xC5, 0x71, 0xEF, 0xC2]
        );
    }

    /// VPCMPEQQ xmm0, xmm1, xmm2 — encoding: [C4 E2 71 29 C2]
    #[test]
    fn escape_0f38_uses_three_byte_prefix() {
        assert_eq!(
            enc(|b| {
                emit_vpacked(b, PackedOp::CmpEq(ElemSize::B64), 0, 1, 2);
            }),
            [0xC4, 0xE2, 0x71, 0x29, 0xC2]
        );
    }

    /// VADDSD xmm0, xmm1, xmm2 — encoding: [C5 F3 58 C2]
    #[test]
    fn vaddsd() {
        assert_eq!(
            enc(|b| emit_vscalar(b, ScalarOp::Add, Precision::Double, 0, 1, 2)),
            [0xC5, 0xF3, 0x58, 0xC2]
        );
    }

    /// VPALIGNR xmm0, xmm1, xmm2, 8 — encoding: [C4 E3 71 0F C2 08]
    #[test]
    fn vpalignr() {
        assert_eq!(
            enc(|b| emit_vpalignr(b, 0, 1, 2, 8)),
            [0xC4, 0xE3, 0x71, 0x0F, 0xC2, 0x08]
        );
    }

    #[test]
    fn unencodable_width_emits_nothing() {
        let mut buf = CodeBuffer::new(8);
        assert!(!emit_vpacked(&mut buf, PackedOp::MulLow(ElemSize::B64), 0, 1, 2));
        assert!(buf.is_empty());
    }
}
