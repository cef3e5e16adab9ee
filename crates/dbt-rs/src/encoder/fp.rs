//! Scalar SSE/SSE2/SSE4.1 floating-point encoders.
//!
//! The precision is selected by the mandatory prefix: `F3` for single,
//! `F2` for double. Compare and packed-logic forms use `66` (or none)
//! instead. Operands are XMM register numbers 0–15; conversions that touch
//! a GPR take a host GPR number.

use super::{emit_rm, emit_rr, emit_rr_ib, Mem, Op, Width};
use crate::buffer::CodeBuffer;

/// Scalar precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Precision {
    /// 32-bit IEEE single (`ss`).
    Single,
    /// 64-bit IEEE double (`sd`).
    Double,
}

impl Precision {
    /// `F3` for single, `F2` for double.
    #[inline]
    pub const fn scalar_prefix(self) -> u8 {
        match self {
            Precision::Single => 0xF3,
            Precision::Double => 0xF2,
        }
    }

    /// Value width in bytes.
    #[inline]
    pub const fn bytes(self) -> i32 {
        match self {
            Precision::Single => 4,
            Precision::Double => 8,
        }
    }

    /// Sign-bit mask for the lane.
    #[inline]
    pub const fn sign_mask(self) -> u64 {
        match self {
            Precision::Single => 0x8000_0000,
            Precision::Double => 0x8000_0000_0000_0000,
        }
    }
}

/// Scalar arithmetic opcode (second byte after `0F`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ScalarOp {
    Sqrt = 0x51,
    Add = 0x58,
    Mul = 0x59,
    Sub = 0x5C,
    Min = 0x5D,
    Div = 0x5E,
    Max = 0x5F,
}

/// `op{ss,sd} dst, src`.
pub fn emit_scalar_op(buf: &mut CodeBuffer<'_>, op: ScalarOp, prec: Precision, dst: u8, src: u8) {
    emit_rr(
        buf,
        Op::new(&[0x0F, op as u8]).prefix(prec.scalar_prefix()),
        dst,
        src,
    );
}

/// `ADDSS/ADDSD dst, src`.
pub fn emit_fadd(buf: &mut CodeBuffer<'_>, prec: Precision, dst: u8, src: u8) {
    emit_scalar_op(buf, ScalarOp::Add, prec, dst, src);
}

/// `SUBSS/SUBSD dst, src`.
pub fn emit_fsub(buf: &mut CodeBuffer<'_>, prec: Precision, dst: u8, src: u8) {
    emit_scalar_op(buf, ScalarOp::Sub, prec, dst, src);
}

/// `MULSS/MULSD dst, src`.
pub fn emit_fmul(buf: &mut CodeBuffer<'_>, prec: Precision, dst: u8, src: u8) {
    emit_scalar_op(buf, ScalarOp::Mul, prec, dst, src);
}

/// `DIVSS/DIVSD dst, src`.
pub fn emit_fdiv(buf: &mut CodeBuffer<'_>, prec: Precision, dst: u8, src: u8) {
    emit_scalar_op(buf, ScalarOp::Div, prec, dst, src);
}

/// `SQRTSS/SQRTSD dst, src`.
pub fn emit_fsqrt(buf: &mut CodeBuffer<'_>, prec: Precision, dst: u8, src: u8) {
    emit_scalar_op(buf, ScalarOp::Sqrt, prec, dst, src);
}

/// `MINSS/MINSD dst, src`.
pub fn emit_fmin(buf: &mut CodeBuffer<'_>, prec: Precision, dst: u8, src: u8) {
    emit_scalar_op(buf, ScalarOp::Min, prec, dst, src);
}

/// `MAXSS/MAXSD dst, src`.
pub fn emit_fmax(buf: &mut CodeBuffer<'_>, prec: Precision, dst: u8, src: u8) {
    emit_scalar_op(buf, ScalarOp::Max, prec, dst, src);
}

/// `MOVSS/MOVSD dst, src` (register form, merges the low lane only).
pub fn emit_fmov_rr(buf: &mut CodeBuffer<'_>, prec: Precision, dst: u8, src: u8) {
    emit_rr(
        buf,
        Op::new(&[0x0F, 0x10]).prefix(prec.scalar_prefix()),
        dst,
        src,
    );
}

/// `MOVSS/MOVSD dst, [mem]` (zeroes the upper lanes).
pub fn emit_fload(buf: &mut CodeBuffer<'_>, prec: Precision, dst: u8, mem: Mem) {
    emit_rm(
        buf,
        Op::new(&[0x0F, 0x10]).prefix(prec.scalar_prefix()),
        dst,
        mem,
    );
}

/// `MOVSS/MOVSD [mem], src`.
pub fn emit_fstore(buf: &mut CodeBuffer<'_>, prec: Precision, mem: Mem, src: u8) {
    emit_rm(
        buf,
        Op::new(&[0x0F, 0x11]).prefix(prec.scalar_prefix()),
        src,
        mem,
    );
}

/// `MOVAPS dst, src` (`0F 28`): full 128-bit register copy.
pub fn emit_movaps(buf: &mut CodeBuffer<'_>, dst: u8, src: u8) {
    emit_rr(buf, Op::new(&[0x0F, 0x28]), dst, src);
}

/// `MOVAPD dst, src` (`66 0F 28`).
pub fn emit_movapd(buf: &mut CodeBuffer<'_>, dst: u8, src: u8) {
    emit_rr(buf, Op::new(&[0x0F, 0x28]).prefix(0x66), dst, src);
}

/// `UCOMISS/UCOMISD a, b` (`[66] 0F 2E`): quiet compare into ZF/PF/CF.
pub fn emit_ucomis(buf: &mut CodeBuffer<'_>, prec: Precision, a: u8, b: u8) {
    match prec {
        Precision::Single => emit_rr(buf, Op::new(&[0x0F, 0x2E]), a, b),
        Precision::Double => emit_rr(buf, Op::new(&[0x0F, 0x2E]).prefix(0x66), a, b),
    }
}

/// `COMISS/COMISD a, b` (`[66] 0F 2F`): signalling compare.
pub fn emit_comis(buf: &mut CodeBuffer<'_>, prec: Precision, a: u8, b: u8) {
    match prec {
        Precision::Single => emit_rr(buf, Op::new(&[0x0F, 0x2F]), a, b),
        Precision::Double => emit_rr(buf, Op::new(&[0x0F, 0x2F]).prefix(0x66), a, b),
    }
}

/// `CMPSS/CMPSD dst, src, pred` (`F3/F2 0F C2 ib`).
pub fn emit_fcmp_pred(buf: &mut CodeBuffer<'_>, prec: Precision, dst: u8, src: u8, pred: u8) {
    emit_rr_ib(
        buf,
        Op::new(&[0x0F, 0xC2]).prefix(prec.scalar_prefix()),
        dst,
        src,
        pred,
    );
}

/// Convert between precisions: `CVTSS2SD` when `from` is single, `CVTSD2SS` otherwise.
pub fn emit_fcvt(buf: &mut CodeBuffer<'_>, from: Precision, dst: u8, src: u8) {
    emit_rr(
        buf,
        Op::new(&[0x0F, 0x5A]).prefix(from.scalar_prefix()),
        dst,
        src,
    );
}

/// `CVTSI2SS/CVTSI2SD dst, src` (`F3/F2 [REX.W] 0F 2A`), signed integer source.
pub fn emit_cvtsi2f(buf: &mut CodeBuffer<'_>, prec: Precision, width: Width, dst: u8, src: u8) {
    emit_rr(
        buf,
        Op::new(&[0x0F, 0x2A])
            .prefix(prec.scalar_prefix())
            .w(width.rex_w()),
        dst,
        src,
    );
}

/// `CVTTSS2SI/CVTTSD2SI dst, src` (`F3/F2 [REX.W] 0F 2C`), truncating.
pub fn emit_cvttf2si(buf: &mut CodeBuffer<'_>, prec: Precision, width: Width, dst: u8, src: u8) {
    emit_rr(
        buf,
        Op::new(&[0x0F, 0x2C])
            .prefix(prec.scalar_prefix())
            .w(width.rex_w()),
        dst,
        src,
    );
}

/// `CVTSS2SI/CVTSD2SI dst, src` (`F3/F2 [REX.W] 0F 2D`), MXCSR rounding.
pub fn emit_cvtf2si(buf: &mut CodeBuffer<'_>, prec: Precision, width: Width, dst: u8, src: u8) {
    emit_rr(
        buf,
        Op::new(&[0x0F, 0x2D])
            .prefix(prec.scalar_prefix())
            .w(width.rex_w()),
        dst,
        src,
    );
}

/// SSE4.1 rounding-control immediate for `ROUNDSS/ROUNDSD`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum RoundMode {
    /// Round to nearest, ties to even.
    Nearest = 0b00,
    /// Toward −∞.
    Down = 0b01,
    /// Toward +∞.
    Up = 0b10,
    /// Toward zero.
    Zero = 0b11,
    /// Use the current `MXCSR.RC`.
    Current = 0b100,
}

impl RoundMode {
    /// Immediate byte; bit 3 suppresses the precision exception.
    #[inline]
    pub const fn imm(self, inexact: bool) -> u8 {
        let base = self as u8;
        if inexact {
            base
        } else {
            base | 0b1000
        }
    }
}

/// `ROUNDSS/ROUNDSD dst, src, imm8` (`66 0F 3A 0A/0B ib`).
pub fn emit_fround(
    buf: &mut CodeBuffer<'_>,
    prec: Precision,
    dst: u8,
    src: u8,
    mode: RoundMode,
    inexact: bool,
) {
    let opcode = match prec {
        Precision::Single => 0x0A,
        Precision::Double => 0x0B,
    };
    emit_rr_ib(
        buf,
        Op::new(&[0x0F, 0x3A, opcode]).prefix(0x66),
        dst,
        src,
        mode.imm(inexact),
    );
}

/// `ANDPS/ANDPD dst, src`.
pub fn emit_fand(buf: &mut CodeBuffer<'_>, prec: Precision, dst: u8, src: u8) {
    packed_logic(buf, prec, 0x54, dst, src);
}

/// `ANDNPS/ANDNPD dst, src` (`dst = !dst & src`).
pub fn emit_fandn(buf: &mut CodeBuffer<'_>, prec: Precision, dst: u8, src: u8) {
    packed_logic(buf, prec, 0x55, dst, src);
}

/// `ORPS/ORPD dst, src`.
pub fn emit_for(buf: &mut CodeBuffer<'_>, prec: Precision, dst: u8, src: u8) {
    packed_logic(buf, prec, 0x56, dst, src);
}

/// `XORPS/XORPD dst, src`.
pub fn emit_fxor(buf: &mut CodeBuffer<'_>, prec: Precision, dst: u8, src: u8) {
    packed_logic(buf, prec, 0x57, dst, src);
}

fn packed_logic(buf: &mut CodeBuffer<'_>, prec: Precision, opcode: u8, dst: u8, src: u8) {
    match prec {
        Precision::Single => emit_rr(buf, Op::new(&[0x0F, opcode]), dst, src),
        Precision::Double => emit_rr(buf, Op::new(&[0x0F, opcode]).prefix(0x66), dst, src),
    }
}

/// `MOVD/MOVQ xmm, r32/r64` (`66 [REX.W] 0F 6E`).
pub fn emit_movq_to_xmm(buf: &mut CodeBuffer<'_>, width: Width, dst: u8, src: u8) {
    emit_rr(
        buf,
        Op::new(&[0x0F, 0x6E]).prefix(0x66).w(width.rex_w()),
        dst,
        src,
    );
}

/// `MOVD/MOVQ r32/r64, xmm` (`66 [REX.W] 0F 7E`).
pub fn emit_movq_from_xmm(buf: &mut CodeBuffer<'_>, width: Width, dst: u8, src: u8) {
    emit_rr(
        buf,
        Op::new(&[0x0F, 0x7E]).prefix(0x66).w(width.rex_w()),
        src,
        dst,
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec::Vec;

    fn enc(f: impl FnOnce(&mut CodeBuffer<'_>)) -> Vec<u8> {
        let mut buf = CodeBuffer::new(32);
        f(&mut buf);
        buf.as_bytes().to_vec()
    }

    #[test]
    fn arithmetic_prefix_selects_precision() {
        assert_eq!(
            enc(|b| emit_fadd(b, Precision::Single, 0, 1)),
            [0xF3, 0x0F, 0x58, 0xC1]
        );
        assert_eq!(
            enc(|b| emit_fadd(b, Precision::Double, 0, 1)),
            [0xF2, 0x0F, 0x58, 0xC1]
        );
        assert_eq!(
            enc(|b| emit_fsub(b, Precision::Double, 2, 3)),
            [0xF2, 0x0F, 0x5C, 0xD3]
        );
        assert_eq!(
            enc(|b| emit_fmul(b, Precision::Single, 8, 9)),
            [0xF3, 0x45, 0x0F, 0x59, 0xC1]
        );
        assert_eq!(
            enc(|b| emit_fdiv(b, Precision::Double, 0, 1)),
            [0xF2, 0x0F, 0x5E, 0xC1]
        );
        assert_eq!(
            enc(|b| emit_fsqrt(b, Precision::Single, 0, 1)),
            [0xF3, 0x0F, 0x51, 0xC1]
        );
        assert_eq!(
            enc(|b| emit_fmin(b, Precision::Double, 0, 1)),
            [0xF2, 0x0F, 0x5D, 0xC1]
        );
        assert_eq!(
            enc(|b| emit_fmax(b, Precision::Double, 0, 1)),
            [0xF2, 0x0F, 0x5F, 0xC1]
        );
    }

    #[test]
    fn compares() {
        assert_eq!(
            enc(|b| emit_ucomis(b, Precision::Single, 0, 1)),
            [0x0F, 0x2E, 0xC1]
        );
        assert_eq!(
            enc(|b| emit_ucomis(b, Precision::Double, 0, 1)),
            [0x66, 0x0F, 0x2E, 0xC1]
        );
        assert_eq!(
            enc(|b| emit_comis(b, Precision::Double, 10, 1)),
            [0x66, 0x44, 0x0F, 0x2F, 0xD1]
        );
    }

    #[test]
    fn conversions() {
        assert_eq!(
            enc(|b| emit_fcvt(b, Precision::Single, 0, 1)),
            [0xF3, 0x0F, 0x5A, 0xC1]
        );
        assert_eq!(
            enc(|b| emit_cvtsi2f(b, Precision::Double, Width::W64, 0, 3)),
            [0xF2, 0x48, 0x0F, 0x2A, 0xC3]
        );
        assert_eq!(
            enc(|b| emit_cvttf2si(b, Precision::Double, Width::W64, 0, 1)),
            [0xF2, 0x48, 0x0F, 0x2C, 0xC1]
        );
    }

    #[test]
    fn rounding() {
        assert_eq!(
            enc(|b| emit_fround(b, Precision::Double, 0, 1, RoundMode::Zero, false)),
            [0x66, 0x0F, 0x3A, 0x0B, 0xC1, 0x0B]
        );
        assert_eq!(
            enc(|b| emit_fround(b, Precision::Single, 0, 1, RoundMode::Current, true)),
            [0x66, 0x0F, 0x3A, 0x0A, 0xC1, 0x04]
        );
    }

    #[test]
    fn moves_between_files() {
        assert_eq!(
            enc(|b| emit_movq_to_xmm(b, Width::W64, 1, 0)),
            [0x66, 0x48, 0x0F, 0x6E, 0xC8]
        );
        assert_eq!(
            enc(|b| emit_movq_from_xmm(b, Width::W64, 0, 1)),
            [0x66, 0x48, 0x0F, 0x7E, 0xC8]
        );
        assert_eq!(enc(|b| emit_movaps(b, 0, 1)), [0x0F, 0x28, 0xC1]);
        assert_eq!(
            enc(|b| emit_fload(b, Precision::Double, 0, Mem::base(3))),
            [0xF2, 0x0F, 0x10, 0x03]
        );
    }

    #[test]
    fn sign_logic() {
        assert_eq!(
            enc(|b| emit_fxor(b, Precision::Single, 0, 15)),
            [0x41, 0x0F, 0x57, 0xC7]
        );
        assert_eq!(
            enc(|b| emit_fandn(b, Precision::Double, 15, 0)),
            [0x66, 0x44, 0x0F, 0x55, 0xF8]
        );
    }
}
