//! Scalar floating point.
//!
//! An AArch64 `S`/`D` register is the low lane of the mapped XMM register.
//! Writes to a scalar register clear the rest of the vector register, so
//! every result is followed by an upper-lane clear unless the instruction
//! that produced it already zeroes those bits.
//!
//! x86 returns the "integer indefinite" value on out-of-range conversions
//! and propagates NaN operands by position rather than by the FPCR rules;
//! both differences are accepted.

use super::{bind_here, Translator};
use crate::buffer::CodeBuffer;
use crate::decoder::{Float, FpBinOp, FpRound, FpType, FpUnOp};
use crate::encoder::{
    emit_alu_ri, emit_bt_ri, emit_comis, emit_cvtsi2f, emit_cvttf2si, emit_fand, emit_fcvt,
    emit_fround, emit_fxor, emit_jcc_rel32, emit_jmp_rel32, emit_load_imm_keep_flags,
    emit_movaps, emit_movq_from_xmm, emit_movq_to_xmm, emit_movq_xmm, emit_mov_rr, emit_neg,
    emit_scalar_op, emit_shift_ri, emit_test_rr, emit_ucomis, emit_vscalar, AluOp, BitTestOp,
    Precision, RoundMode, ScalarOp, ShiftOp, Width,
};
use crate::error::DbtError;
use crate::regmap::HostCondition;

const fn precision(ty: FpType) -> Precision {
    match ty {
        FpType::Single => Precision::Single,
        FpType::Double => Precision::Double,
    }
}

/// 2^63 in the given precision.
const fn two_pow_63(prec: Precision) -> u64 {
    match prec {
        Precision::Single => 0x5F00_0000,
        Precision::Double => 0x43E0_0000_0000_0000,
    }
}

impl Translator<'_> {
    pub(super) fn float(&mut self, buf: &mut CodeBuffer<'_>, op: &Float) -> Result<(), DbtError> {
        match *op {
            Float::Binary { op, ty, rd, rn, rm } => self.fp_binary(buf, op, precision(ty), rd, rn, rm),
            Float::Unary { op, ty, rd, rn } => self.fp_unary(buf, op, precision(ty), rd, rn),
            Float::Convert { from, rd, rn } => {
                let (d, n) = (self.xmm(rd)?, self.xmm(rn)?);
                let from = precision(from);
                emit_fcvt(buf, from, d, n);
                let to = match from {
                    Precision::Single => Precision::Double,
                    Precision::Double => Precision::Single,
                };
                self.zero_upper(buf, to, d);
                Ok(())
            }
            Float::Compare {
                ty,
                rn,
                rm,
                signaling,
            } => {
                let prec = precision(ty);
                let a = self.xmm(rn)?;
                let b = match rm {
                    Some(rm) => self.xmm(rm)?,
                    None => {
                        let v = self.vscratch();
                        emit_fxor(buf, Precision::Single, v, v);
                        v
                    }
                };
                if signaling {
                    emit_comis(buf, prec, a, b);
                } else {
                    emit_ucomis(buf, prec, a, b);
                }
                self.set_flags(super::FlagOrigin::Float);
                Ok(())
            }
            Float::Select {
                ty,
                cond,
                rd,
                rn,
                rm,
            } => {
                let pred = self.predicate(cond)?;
                let (d, n, m) = (self.xmm(rd)?, self.xmm(rn)?, self.xmm(rm)?);
                let v = self.vscratch();
                emit_movaps(buf, v, m);
                let skips = self.skip_unless(buf, pred)?;
                emit_movaps(buf, v, n);
                for skip in skips {
                    bind_here(buf, skip)?;
                }
                emit_movaps(buf, d, v);
                self.zero_upper(buf, precision(ty), d);
                Ok(())
            }
            Float::IntToFp {
                signed,
                sf,
                ty,
                rd,
                rn,
            } => self.int_to_fp(buf, signed, Width::from_sf(sf), precision(ty), rd, rn),
            Float::FpToInt {
                signed,
                sf,
                ty,
                round,
                rd,
                rn,
            } => self.fp_to_int(buf, signed, Width::from_sf(sf), precision(ty), round, rd, rn),
            Float::MovGeneral { sf, to_fp, rd, rn } => {
                let width = Width::from_sf(sf);
                if to_fp {
                    let d = self.xmm(rd)?;
                    match self.gpr_or_zr(rn)? {
                        Some(n) => emit_movq_to_xmm(buf, width, d, n),
                        None => emit_fxor(buf, Precision::Single, d, d),
                    }
                } else if let Some(d) = self.gpr_or_zr(rd)? {
                    let n = self.xmm(rn)?;
                    emit_movq_from_xmm(buf, width, d, n);
                }
                Ok(())
            }
        }
    }

    /// Clear everything above the low `prec` lane of `xmm`.
    fn zero_upper(&self, buf: &mut CodeBuffer<'_>, prec: Precision, xmm: u8) {
        match prec {
            Precision::Double => emit_movq_xmm(buf, xmm, xmm),
            Precision::Single => {
                let s = self.scratch();
                emit_movq_from_xmm(buf, Width::W32, s, xmm);
                emit_movq_to_xmm(buf, Width::W32, xmm, s);
            }
        }
    }

    /// Load a lane-sized bit pattern into the vector scratch (upper lanes zero).
    fn vconst(&self, buf: &mut CodeBuffer<'_>, bits: u64) -> u8 {
        let (s, v) = (self.scratch(), self.vscratch());
        emit_load_imm_keep_flags(buf, s, bits);
        emit_movq_to_xmm(buf, Width::W64, v, s);
        v
    }

    fn round_mode(&self, round: FpRound) -> Result<(RoundMode, bool), DbtError> {
        match round {
            FpRound::Nearest => Ok((RoundMode::Nearest, false)),
            FpRound::PlusInf => Ok((RoundMode::Up, false)),
            FpRound::MinusInf => Ok((RoundMode::Down, false)),
            FpRound::Zero => Ok((RoundMode::Zero, false)),
            FpRound::Exact => Ok((self.ctx.fp().rounding_mode(), true)),
            FpRound::Current => Ok((self.ctx.fp().rounding_mode(), false)),
            FpRound::TiesAway => Err(self.unsupported("round to nearest with ties away")),
        }
    }

    // ── Arithmetic ───────────────────────────────────────────────────────

    fn fp_binary(
        &mut self,
        buf: &mut CodeBuffer<'_>,
        op: FpBinOp,
        prec: Precision,
        rd: u8,
        rn: u8,
        rm: u8,
    ) -> Result<(), DbtError> {
        let (d, n, m) = (self.xmm(rd)?, self.xmm(rn)?, self.xmm(rm)?);
        let scalar = match op {
            FpBinOp::Mul | FpBinOp::NegMul => ScalarOp::Mul,
            FpBinOp::Div => ScalarOp::Div,
            FpBinOp::Add => ScalarOp::Add,
            FpBinOp::Sub => ScalarOp::Sub,
            FpBinOp::Max | FpBinOp::MaxNum => ScalarOp::Max,
            FpBinOp::Min | FpBinOp::MinNum => ScalarOp::Min,
        };
        if self.config.avx {
            emit_vscalar(buf, scalar, prec, d, n, m);
        } else if d == n {
            emit_scalar_op(buf, scalar, prec, d, m);
        } else if d == m {
            if matches!(scalar, ScalarOp::Add | ScalarOp::Mul) {
                emit_scalar_op(buf, scalar, prec, d, n);
            } else {
                let v = self.vscratch();
                emit_movaps(buf, v, m);
                emit_movaps(buf, d, n);
                emit_scalar_op(buf, scalar, prec, d, v);
            }
        } else {
            emit_movaps(buf, d, n);
            emit_scalar_op(buf, scalar, prec, d, m);
        }
        if op == FpBinOp::NegMul {
            let v = self.vconst(buf, prec.sign_mask());
            emit_fxor(buf, prec, d, v);
        }
        self.zero_upper(buf, prec, d);
        Ok(())
    }

    fn fp_unary(
        &mut self,
        buf: &mut CodeBuffer<'_>,
        op: FpUnOp,
        prec: Precision,
        rd: u8,
        rn: u8,
    ) -> Result<(), DbtError> {
        let (d, n) = (self.xmm(rd)?, self.xmm(rn)?);
        match op {
            FpUnOp::Mov => match prec {
                Precision::Double => emit_movq_xmm(buf, d, n),
                Precision::Single => {
                    let s = self.scratch();
                    emit_movq_from_xmm(buf, Width::W32, s, n);
                    emit_movq_to_xmm(buf, Width::W32, d, s);
                }
            },
            FpUnOp::Abs => {
                let v = self.vconst(buf, !prec.sign_mask() & lane_mask(prec));
                if d != n {
                    emit_movaps(buf, d, n);
                }
                // The mask's upper lanes are zero, so this also clears them.
                emit_fand(buf, prec, d, v);
            }
            FpUnOp::Neg => {
                let v = self.vconst(buf, prec.sign_mask());
                if d != n {
                    emit_movaps(buf, d, n);
                }
                emit_fxor(buf, prec, d, v);
                self.zero_upper(buf, prec, d);
            }
            FpUnOp::Sqrt => {
                emit_scalar_op(buf, ScalarOp::Sqrt, prec, d, n);
                self.zero_upper(buf, prec, d);
            }
            FpUnOp::Round(round) => {
                let (mode, inexact) = self.round_mode(round)?;
                emit_fround(buf, prec, d, n, mode, inexact);
                self.zero_upper(buf, prec, d);
            }
        }
        Ok(())
    }

    // ── Integer conversions ──────────────────────────────────────────────

    fn int_to_fp(
        &mut self,
        buf: &mut CodeBuffer<'_>,
        signed: bool,
        width: Width,
        prec: Precision,
        rd: u8,
        rn: u8,
    ) -> Result<(), DbtError> {
        let d = self.xmm(rd)?;
        let n = self.gpr_or_zr(rn)?;
        // CVTSI2Sx only writes the low lane.
        emit_fxor(buf, Precision::Single, d, d);
        let Some(n) = n else {
            return Ok(());
        };
        let s = self.scratch();
        match (signed, width) {
            (true, width) => emit_cvtsi2f(buf, prec, width, d, n),
            (false, Width::W32) => {
                emit_mov_rr(buf, Width::W32, s, n);
                emit_cvtsi2f(buf, prec, Width::W64, d, s);
            }
            (false, Width::W64) => {
                // Values with the top bit set are halved (keeping the low bit
                // for rounding), converted, and doubled.
                emit_test_rr(buf, Width::W64, n, n);
                let big = emit_jcc_rel32(buf, HostCondition::S);
                emit_cvtsi2f(buf, prec, Width::W64, d, n);
                let done = emit_jmp_rel32(buf);
                bind_here(buf, big)?;
                emit_mov_rr(buf, Width::W64, s, n);
                emit_shift_ri(buf, ShiftOp::Shr, Width::W64, s, 1);
                let even = emit_jcc_rel32(buf, HostCondition::Ae);
                emit_alu_ri(buf, AluOp::Or, Width::W64, s, 1);
                bind_here(buf, even)?;
                emit_cvtsi2f(buf, prec, Width::W64, d, s);
                emit_scalar_op(buf, ScalarOp::Add, prec, d, d);
                bind_here(buf, done)?;
                self.clobber_flags();
            }
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn fp_to_int(
        &mut self,
        buf: &mut CodeBuffer<'_>,
        signed: bool,
        width: Width,
        prec: Precision,
        round: FpRound,
        rd: u8,
        rn: u8,
    ) -> Result<(), DbtError> {
        let n = self.xmm(rn)?;
        let Some(d) = self.gpr_or_zr(rd)? else {
            return Ok(());
        };
        let src = if round == FpRound::Zero {
            n
        } else {
            let (mode, inexact) = self.round_mode(round)?;
            let v = self.vscratch();
            emit_fround(buf, prec, v, n, mode, inexact);
            v
        };
        match (signed, width) {
            (true, width) => emit_cvttf2si(buf, prec, width, d, src),
            (false, Width::W32) => {
                emit_cvttf2si(buf, prec, Width::W64, d, src);
                emit_mov_rr(buf, Width::W32, d, d);
            }
            (false, Width::W64) if src == n => {
                // n >= 2^63: convert 2^63 - n, negate, then set bit 63.
                let v = self.vconst(buf, two_pow_63(prec));
                emit_ucomis(buf, prec, n, v);
                let big = emit_jcc_rel32(buf, HostCondition::Ae);
                emit_cvttf2si(buf, prec, Width::W64, d, n);
                let done = emit_jmp_rel32(buf);
                bind_here(buf, big)?;
                emit_scalar_op(buf, ScalarOp::Sub, prec, v, n);
                emit_cvttf2si(buf, prec, Width::W64, d, v);
                emit_neg(buf, Width::W64, d);
                emit_bt_ri(buf, BitTestOp::Btc, Width::W64, d, 63);
                bind_here(buf, done)?;
                self.clobber_flags();
            }
            (false, Width::W64) => {
                return Err(self.unsupported("unsigned 64-bit conversion with rounding"));
            }
        }
        Ok(())
    }
}

const fn lane_mask(prec: Precision) -> u64 {
    match prec {
        Precision::Single => 0xFFFF_FFFF,
        Precision::Double => u64::MAX,
    }
}
