//! Integer data processing, compares, and moves.
//!
//! Results that do not define guest flags are computed with flag-neutral
//! host instructions (`LEA`, `MOV`, `NOT`, `CMOVcc`, `BSWAP`) whenever one
//! exists, so a compare can be separated from its conditional consumer by
//! ordinary arithmetic. Anything else marks the host flags clobbered.

use alloc::vec::Vec;

use super::{bind_here, mask, FlagOrigin, Predicate, Translator};
use crate::buffer::CodeBuffer;
use crate::decoder::{
    Alu, AluOp, BitOp, BitfieldKind, Compare, CompareKind, Move, MoveWideKind, Operand2,
    SelectOp, ShiftType,
};
use crate::encoder::{
    emit_alu_ri, emit_alu_rr, emit_bswap, emit_cdq, emit_cmov, emit_cqo, emit_div, emit_idiv,
    emit_imul1, emit_imul_rr, emit_jcc_rel32, emit_jmp_rel32, emit_load_imm_keep_flags,
    emit_lzcnt, emit_mov_reg_imm16, emit_mov_reg_imm32, emit_mov_rr, emit_movq_from_xmm,
    emit_movq_to_xmm, emit_movsx16_rr, emit_movsx8_rr, emit_movsxd_rr, emit_movzx16_rr,
    emit_movzx8_rr, emit_mul, emit_neg, emit_not, emit_pextr, emit_pinsr, emit_shift_cl,
    emit_shift_ri, emit_test_ri, emit_test_rr, AluOp as HostOp, ElemSize, ShiftOp, Width,
};
use crate::error::DbtError;
use crate::regmap::{HostCondition, GUEST_ZR, RAX, RCX, RDX};

/// A second operand after shifting and inversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Src {
    Reg(u8),
    /// Immediate as the host instruction will see it (sign-extended for W64).
    Imm(i32),
}

const fn shift_op(kind: ShiftType) -> ShiftOp {
    match kind {
        ShiftType::Lsl => ShiftOp::Shl,
        ShiftType::Lsr => ShiftOp::Shr,
        ShiftType::Asr => ShiftOp::Sar,
        ShiftType::Ror => ShiftOp::Ror,
    }
}

/// `dst = src`; the 32-bit copy is kept even onto itself to clear bits 32–63.
fn copy(buf: &mut CodeBuffer<'_>, width: Width, dst: u8, src: u8) {
    if width == Width::W32 || dst != src {
        emit_mov_rr(buf, width, dst, src);
    }
}

/// `dst = src`, where `None` reads as zero.
fn copy_or_zero(buf: &mut CodeBuffer<'_>, width: Width, dst: u8, src: Option<u8>) {
    match src {
        Some(src) => copy(buf, width, dst, src),
        None => emit_load_imm_keep_flags(buf, dst, 0),
    }
}

fn load_src(buf: &mut CodeBuffer<'_>, width: Width, dst: u8, src: Src) {
    match src {
        Src::Reg(r) => copy(buf, width, dst, r),
        Src::Imm(v) => emit_load_imm_keep_flags(buf, dst, mask(width, v as i64 as u64)),
    }
}

/// `dst` = bits `imms..=0` of `src` through a flag-neutral move or
/// extension; `false` when the field has no such form.
fn extend_in_place(
    buf: &mut CodeBuffer<'_>,
    width: Width,
    signed: bool,
    imms: u8,
    dst: u8,
    src: u8,
) -> bool {
    match (signed, imms, width) {
        (_, s, _) if u32::from(s) == width.bits() - 1 => copy(buf, width, dst, src),
        (true, 7, _) => emit_movsx8_rr(buf, width, dst, src),
        (true, 15, _) => emit_movsx16_rr(buf, width, dst, src),
        (true, 31, Width::W64) => emit_movsxd_rr(buf, dst, src),
        (false, 7, _) => emit_movzx8_rr(buf, dst, src),
        (false, 15, _) => emit_movzx16_rr(buf, dst, src),
        (false, 31, Width::W64) => emit_mov_rr(buf, Width::W32, dst, src),
        _ => return false,
    }
    true
}

fn apply(buf: &mut CodeBuffer<'_>, op: HostOp, width: Width, dst: u8, src: Src) {
    match src {
        Src::Reg(r) => emit_alu_rr(buf, op, width, dst, r),
        Src::Imm(v) => emit_alu_ri(buf, op, width, dst, v),
    }
}

impl Translator<'_> {
    pub(super) fn alu(&mut self, buf: &mut CodeBuffer<'_>, insn: &Alu) -> Result<(), DbtError> {
        match *insn {
            Alu::Binary {
                op,
                sf,
                set_flags,
                sp,
                rd,
                rn,
                operand,
            } => self.binary(buf, op, Width::from_sf(sf), set_flags, sp, rd, rn, operand),
            Alu::Mvn {
                sf,
                rd,
                rm,
                shift,
                amount,
            } => self.mvn(buf, Width::from_sf(sf), rd, rm, shift, amount),
            Alu::MulAdd {
                sf,
                negate,
                rd,
                rn,
                rm,
                ra,
            } => self.mul_add(buf, Width::from_sf(sf), negate, rd, rn, rm, ra),
            Alu::MulHigh { signed, rd, rn, rm } => self.mul_high(buf, signed, rd, rn, rm),
            Alu::Div {
                sf,
                signed,
                rd,
                rn,
                rm,
            } => self.div(buf, Width::from_sf(sf), signed, rd, rn, rm),
            Alu::ShiftVar {
                sf,
                kind,
                rd,
                rn,
                rm,
            } => self.shift_var(buf, Width::from_sf(sf), kind, rd, rn, rm),
            Alu::Unary { sf, op, rd, rn } => self.unary(buf, Width::from_sf(sf), op, rd, rn),
            Alu::Bitfield {
                kind: BitfieldKind::Insert,
                sf,
                rd,
                rn,
                immr,
                imms,
            } => self.bitfield_insert(buf, Width::from_sf(sf), rd, rn, immr, imms),
            Alu::Bitfield {
                kind,
                sf,
                rd,
                rn,
                immr,
                imms,
            } => self.bitfield_extend(
                buf,
                Width::from_sf(sf),
                kind == BitfieldKind::Signed,
                rd,
                rn,
                immr,
                imms,
            ),
            Alu::Extract {
                sf,
                rd,
                rn,
                rm,
                lsb,
            } => self.extract(buf, Width::from_sf(sf), rd, rn, rm, lsb),
            Alu::CondSelect {
                sf,
                op,
                cond,
                rd,
                rn,
                rm,
            } => {
                let pred = self.predicate(cond)?;
                self.cond_select(buf, Width::from_sf(sf), op, pred, rd, rn, rm)
            }
        }
    }

    // ── Operands ─────────────────────────────────────────────────────────

    /// Materialize `operand`, inverted for BIC/ORN/EON.
    ///
    /// Shifted registers are computed in the scratch GPR; 64-bit immediates
    /// that do not sign-extend from 32 bits are loaded there too.
    pub(super) fn operand(
        &mut self,
        buf: &mut CodeBuffer<'_>,
        width: Width,
        operand: Operand2,
        invert: bool,
    ) -> Result<Src, DbtError> {
        match operand {
            Operand2::Imm(v) => {
                let v = mask(width, if invert { !v } else { v });
                Ok(self.imm_operand(buf, width, v))
            }
            Operand2::Shifted { rm: GUEST_ZR, .. } => Ok(Src::Imm(if invert { -1 } else { 0 })),
            Operand2::Shifted { rm, shift, amount } => {
                let m = self.gpr(rm)?;
                if amount == 0 && !invert {
                    return Ok(Src::Reg(m));
                }
                let s = self.scratch();
                emit_mov_rr(buf, width, s, m);
                if amount != 0 {
                    emit_shift_ri(buf, shift_op(shift), width, s, amount);
                    self.clobber_flags();
                }
                if invert {
                    emit_not(buf, width, s);
                }
                Ok(Src::Reg(s))
            }
        }
    }

    fn imm_operand(&self, buf: &mut CodeBuffer<'_>, width: Width, v: u64) -> Src {
        match width {
            Width::W32 => Src::Imm(v as u32 as i32),
            Width::W64 => match i32::try_from(v as i64) {
                Ok(imm) => Src::Imm(imm),
                Err(_) => {
                    let s = self.scratch();
                    emit_load_imm_keep_flags(buf, s, v);
                    Src::Reg(s)
                }
            },
        }
    }

    // ── ADD/SUB/AND/ORR/EOR/BIC/ORN/EON ──────────────────────────────────

    #[allow(clippy::too_many_arguments)]
    fn binary(
        &mut self,
        buf: &mut CodeBuffer<'_>,
        op: AluOp,
        width: Width,
        set_flags: bool,
        sp: bool,
        rd: u8,
        rn: u8,
        operand: Operand2,
    ) -> Result<(), DbtError> {
        let lhs = if sp {
            Some(self.gpr(rn)?)
        } else {
            self.gpr_or_zr(rn)?
        };
        let dst = if sp && !set_flags {
            Some(self.gpr(rd)?)
        } else {
            self.gpr_or_zr(rd)?
        };
        if let Operand2::Shifted { rm, .. } = operand {
            if rm != GUEST_ZR {
                self.gpr(rm)?;
            }
        }
        if !set_flags {
            let Some(dst) = dst else {
                return Ok(());
            };
            if matches!(op, AluOp::Add | AluOp::Sub) {
                return self.add_sub_lea(buf, op == AluOp::Sub, width, dst, lhs, operand);
            }
        }
        let (host, invert) = match op {
            AluOp::Add => (HostOp::Add, false),
            AluOp::Sub => (HostOp::Sub, false),
            AluOp::And => (HostOp::And, false),
            AluOp::Orr => (HostOp::Or, false),
            AluOp::Eor => (HostOp::Xor, false),
            AluOp::Bic => (HostOp::And, true),
            AluOp::Orn => (HostOp::Or, true),
            AluOp::Eon => (HostOp::Xor, true),
        };
        let rhs = self.operand(buf, width, operand, invert)?;
        self.emit_binary(buf, host, width, dst, lhs, rhs, set_flags);
        Ok(())
    }

    /// Flag-neutral ADD/SUB through `LEA`.
    fn add_sub_lea(
        &mut self,
        buf: &mut CodeBuffer<'_>,
        sub: bool,
        width: Width,
        dst: u8,
        lhs: Option<u8>,
        operand: Operand2,
    ) -> Result<(), DbtError> {
        if let (
            false,
            Some(l),
            Operand2::Shifted {
                rm,
                shift: ShiftType::Lsl,
                amount: amount @ 0..=3,
            },
        ) = (sub, lhs, operand)
        {
            if rm != GUEST_ZR {
                let m = self.gpr(rm)?;
                if self.lea(buf, width, dst, l, Some((m, amount)), 0).is_ok() {
                    return Ok(());
                }
            }
        }
        let s = self.scratch();
        let rhs = self.operand(buf, width, operand, false)?;
        match (lhs, rhs) {
            (Some(l), Src::Imm(0)) => copy(buf, width, dst, l),
            (Some(l), Src::Imm(v)) => {
                let disp = if sub { v.wrapping_neg() } else { v };
                self.lea(buf, width, dst, l, None, disp)?;
            }
            (Some(l), Src::Reg(r)) if !sub => self.lea(buf, width, dst, l, Some((r, 0)), 0)?,
            (Some(l), Src::Reg(r)) => {
                // l - r == l + !r + 1
                copy(buf, width, s, r);
                emit_not(buf, width, s);
                self.lea(buf, width, dst, l, Some((s, 0)), 1)?;
            }
            (None, Src::Imm(v)) => {
                let v = if sub { v.wrapping_neg() } else { v };
                emit_load_imm_keep_flags(buf, dst, mask(width, v as i64 as u64));
            }
            (None, Src::Reg(r)) if !sub => copy(buf, width, dst, r),
            (None, Src::Reg(r)) => {
                copy(buf, width, s, r);
                emit_not(buf, width, s);
                self.lea(buf, width, dst, s, None, 1)?;
            }
        }
        Ok(())
    }

    /// `dst = lhs op rhs` with x86 two-operand forms; `dst == None` keeps
    /// only the flags and `lhs == None` reads as zero.
    #[allow(clippy::too_many_arguments)]
    fn emit_binary(
        &mut self,
        buf: &mut CodeBuffer<'_>,
        op: HostOp,
        width: Width,
        dst: Option<u8>,
        lhs: Option<u8>,
        rhs: Src,
        set_flags: bool,
    ) {
        let s = self.scratch();
        let origin = if op == HostOp::Sub {
            FlagOrigin::Sub
        } else {
            FlagOrigin::Add
        };
        // add/sub/or/xor with zero would be folded away by the peephole pass,
        // taking their flag and zero-extension effects with them.
        let identity = rhs == Src::Imm(0) && op != HostOp::And;
        let mut touched = true;
        match (lhs, dst) {
            (None, dst) => {
                let d = dst.unwrap_or(s);
                match op {
                    HostOp::Sub => {
                        load_src(buf, width, d, rhs);
                        emit_neg(buf, width, d);
                    }
                    HostOp::And if set_flags => emit_alu_rr(buf, HostOp::Xor, width, d, d),
                    HostOp::And => {
                        emit_load_imm_keep_flags(buf, d, 0);
                        touched = false;
                    }
                    _ => {
                        load_src(buf, width, d, rhs);
                        if set_flags {
                            emit_test_rr(buf, width, d, d);
                        } else {
                            touched = false;
                        }
                    }
                }
            }
            (Some(l), None) => match (op, rhs) {
                _ if identity => emit_test_rr(buf, width, l, l),
                (HostOp::Sub, rhs) => apply(buf, HostOp::Cmp, width, l, rhs),
                (HostOp::And, Src::Reg(r)) => emit_test_rr(buf, width, l, r),
                (HostOp::And, Src::Imm(v)) => emit_test_ri(buf, width, l, v),
                (_, Src::Reg(r)) if r == s => emit_alu_rr(buf, op, width, s, l),
                (_, rhs) => {
                    emit_mov_rr(buf, width, s, l);
                    apply(buf, op, width, s, rhs);
                }
            },
            (Some(l), Some(d)) => {
                if identity {
                    copy(buf, width, d, l);
                    if set_flags {
                        emit_test_rr(buf, width, d, d);
                    } else {
                        touched = false;
                    }
                } else if d == l {
                    apply(buf, op, width, d, rhs);
                } else if rhs == Src::Reg(d) {
                    if op.is_commutative() {
                        emit_alu_rr(buf, op, width, d, l);
                    } else {
                        emit_mov_rr(buf, width, s, d);
                        emit_mov_rr(buf, width, d, l);
                        emit_alu_rr(buf, op, width, d, s);
                    }
                } else {
                    emit_mov_rr(buf, width, d, l);
                    apply(buf, op, width, d, rhs);
                }
            }
        }
        if set_flags {
            self.set_flags(origin);
        } else if touched {
            self.clobber_flags();
        }
    }

    // ── CMP/CMN/TST ──────────────────────────────────────────────────────

    pub(super) fn compare(
        &mut self,
        buf: &mut CodeBuffer<'_>,
        cmp: &Compare,
    ) -> Result<(), DbtError> {
        let width = Width::from_sf(cmp.sf);
        let sp = matches!(cmp.operand, Operand2::Imm(_)) && cmp.kind != CompareKind::Tst;
        let lhs = if sp {
            Some(self.gpr(cmp.rn)?)
        } else {
            self.gpr_or_zr(cmp.rn)?
        };
        let op = match cmp.kind {
            CompareKind::Cmp => HostOp::Sub,
            CompareKind::Cmn => HostOp::Add,
            CompareKind::Tst => HostOp::And,
        };
        let rhs = self.operand(buf, width, cmp.operand, false)?;
        self.emit_binary(buf, op, width, None, lhs, rhs, true);
        Ok(())
    }

    // ── MOVZ/MOVN/MOVK, MOV ──────────────────────────────────────────────

    pub(super) fn mov(&mut self, buf: &mut CodeBuffer<'_>, mv: &Move) -> Result<(), DbtError> {
        match *mv {
            Move::Wide {
                kind,
                sf,
                rd,
                imm16,
                shift,
            } => {
                let width = Width::from_sf(sf);
                let Some(d) = self.gpr_or_zr(rd)? else {
                    return Ok(());
                };
                let value = u64::from(imm16) << shift;
                match kind {
                    MoveWideKind::Movz => emit_load_imm_keep_flags(buf, d, value),
                    MoveWideKind::Movn => emit_load_imm_keep_flags(buf, d, mask(width, !value)),
                    MoveWideKind::Movk if shift == 0 => {
                        emit_mov_reg_imm16(buf, d, imm16);
                        if width == Width::W32 {
                            emit_mov_rr(buf, width, d, d);
                        }
                    }
                    MoveWideKind::Movk => {
                        // Replace one 16-bit lane through the vector scratch.
                        let (v, s) = (self.vscratch(), self.scratch());
                        emit_movq_to_xmm(buf, width, v, d);
                        emit_mov_reg_imm32(buf, s, u32::from(imm16));
                        emit_pinsr(buf, ElemSize::B16, v, s, shift / 16);
                        emit_movq_from_xmm(buf, width, d, v);
                    }
                }
            }
            Move::Register { sf, rd, rm } => {
                let Some(d) = self.gpr_or_zr(rd)? else {
                    return Ok(());
                };
                let m = self.gpr_or_zr(rm)?;
                copy_or_zero(buf, Width::from_sf(sf), d, m);
            }
            Move::Immediate { sf, rd, imm } => {
                if let Some(d) = self.gpr_or_zr(rd)? {
                    emit_load_imm_keep_flags(buf, d, mask(Width::from_sf(sf), imm));
                }
            }
            Move::Address { rd, .. } => {
                if let (Some(d), Some(address)) = (self.gpr_or_zr(rd)?, mv.address(self.pc)) {
                    emit_load_imm_keep_flags(buf, d, address);
                }
            }
        }
        Ok(())
    }

    fn mvn(
        &mut self,
        buf: &mut CodeBuffer<'_>,
        width: Width,
        rd: u8,
        rm: u8,
        shift: ShiftType,
        amount: u8,
    ) -> Result<(), DbtError> {
        let Some(d) = self.gpr_or_zr(rd)? else {
            return Ok(());
        };
        match self.gpr_or_zr(rm)? {
            None => emit_load_imm_keep_flags(buf, d, mask(width, u64::MAX)),
            Some(m) => {
                copy(buf, width, d, m);
                if amount != 0 {
                    emit_shift_ri(buf, shift_op(shift), width, d, amount);
                    self.clobber_flags();
                }
                emit_not(buf, width, d);
            }
        }
        Ok(())
    }

    // ── Multiply and divide ──────────────────────────────────────────────

    #[allow(clippy::too_many_arguments)]
    fn mul_add(
        &mut self,
        buf: &mut CodeBuffer<'_>,
        width: Width,
        negate: bool,
        rd: u8,
        rn: u8,
        rm: u8,
        ra: u8,
    ) -> Result<(), DbtError> {
        let Some(d) = self.gpr_or_zr(rd)? else {
            return Ok(());
        };
        let n = self.gpr_or_zr(rn)?;
        let m = self.gpr_or_zr(rm)?;
        let a = self.gpr_or_zr(ra)?;
        let (Some(n), Some(m)) = (n, m) else {
            copy_or_zero(buf, width, d, a);
            return Ok(());
        };
        let s = self.scratch();
        emit_mov_rr(buf, width, s, n);
        emit_imul_rr(buf, width, s, m);
        if negate {
            emit_neg(buf, width, s);
        }
        self.clobber_flags();
        match a {
            Some(a) => self.lea(buf, width, d, a, Some((s, 0)), 0),
            None => {
                emit_mov_rr(buf, width, d, s);
                Ok(())
            }
        }
    }

    /// A scratch GPR distinct from the fixed registers an x86 instruction uses.
    fn scratch_avoiding(&self, fixed: &[u8]) -> Result<u8, DbtError> {
        let s = self.scratch();
        if fixed.contains(&s) {
            return Err(self.unsupported(alloc::format!(
                "scratch register {} is an implicit operand of the host sequence",
                s
            )));
        }
        Ok(s)
    }

    /// Park `RAX`/`RDX` in the vector scratch around `MUL`/`DIV`.
    fn save_rax_rdx(&self, buf: &mut CodeBuffer<'_>) {
        let v = self.vscratch();
        emit_movq_to_xmm(buf, Width::W64, v, RAX);
        emit_pinsr(buf, ElemSize::B64, v, RDX, 1);
    }

    fn restore_rax_rdx(&self, buf: &mut CodeBuffer<'_>) {
        let v = self.vscratch();
        emit_movq_from_xmm(buf, Width::W64, RAX, v);
        emit_pextr(buf, ElemSize::B64, RDX, v, 1);
    }

    fn mul_high(
        &mut self,
        buf: &mut CodeBuffer<'_>,
        signed: bool,
        rd: u8,
        rn: u8,
        rm: u8,
    ) -> Result<(), DbtError> {
        let Some(d) = self.gpr_or_zr(rd)? else {
            return Ok(());
        };
        let (Some(n), Some(m)) = (self.gpr_or_zr(rn)?, self.gpr_or_zr(rm)?) else {
            emit_load_imm_keep_flags(buf, d, 0);
            return Ok(());
        };
        let s = self.scratch_avoiding(&[RAX, RDX])?;
        self.save_rax_rdx(buf);
        emit_mov_rr(buf, Width::W64, s, m);
        emit_mov_rr(buf, Width::W64, RAX, n);
        if signed {
            emit_imul1(buf, Width::W64, s);
        } else {
            emit_mul(buf, Width::W64, s);
        }
        emit_mov_rr(buf, Width::W64, s, RDX);
        self.restore_rax_rdx(buf);
        emit_mov_rr(buf, Width::W64, d, s);
        self.clobber_flags();
        Ok(())
    }

    /// `SDIV`/`UDIV`: division by zero yields 0 and `MIN / -1` yields `MIN`,
    /// neither of which may reach the faulting x86 divide.
    fn div(
        &mut self,
        buf: &mut CodeBuffer<'_>,
        width: Width,
        signed: bool,
        rd: u8,
        rn: u8,
        rm: u8,
    ) -> Result<(), DbtError> {
        let Some(d) = self.gpr_or_zr(rd)? else {
            return Ok(());
        };
        let (Some(n), Some(m)) = (self.gpr_or_zr(rn)?, self.gpr_or_zr(rm)?) else {
            emit_load_imm_keep_flags(buf, d, 0);
            return Ok(());
        };
        let s = self.scratch_avoiding(&[RAX, RDX])?;
        self.save_rax_rdx(buf);
        emit_mov_rr(buf, width, s, m);
        emit_mov_rr(buf, width, RAX, n);
        emit_test_rr(buf, width, s, s);
        let by_zero = emit_jcc_rel32(buf, HostCondition::E);
        let mut done = Vec::with_capacity(2);
        if signed {
            emit_alu_ri(buf, HostOp::Cmp, width, s, -1);
            let divide = emit_jcc_rel32(buf, HostCondition::Ne);
            emit_neg(buf, width, RAX);
            done.push(emit_jmp_rel32(buf));
            bind_here(buf, divide)?;
            match width {
                Width::W64 => emit_cqo(buf),
                Width::W32 => emit_cdq(buf),
            }
            emit_idiv(buf, width, s);
        } else {
            emit_alu_rr(buf, HostOp::Xor, Width::W32, RDX, RDX);
            emit_div(buf, width, s);
        }
        done.push(emit_jmp_rel32(buf));
        bind_here(buf, by_zero)?;
        emit_alu_rr(buf, HostOp::Xor, Width::W32, RAX, RAX);
        for jump in done {
            bind_here(buf, jump)?;
        }
        emit_mov_rr(buf, width, s, RAX);
        self.restore_rax_rdx(buf);
        emit_mov_rr(buf, width, d, s);
        self.clobber_flags();
        Ok(())
    }

    /// `LSLV/LSRV/ASRV/RORV`: the amount goes through `CL`, which the x86
    /// shift masks to the operand width exactly as AArch64 does.
    fn shift_var(
        &mut self,
        buf: &mut CodeBuffer<'_>,
        width: Width,
        kind: ShiftType,
        rd: u8,
        rn: u8,
        rm: u8,
    ) -> Result<(), DbtError> {
        let Some(d) = self.gpr_or_zr(rd)? else {
            return Ok(());
        };
        let Some(n) = self.gpr_or_zr(rn)? else {
            emit_load_imm_keep_flags(buf, d, 0);
            return Ok(());
        };
        let Some(m) = self.gpr_or_zr(rm)? else {
            copy(buf, width, d, n);
            return Ok(());
        };
        let s = self.scratch_avoiding(&[RCX])?;
        let v = self.vscratch();
        emit_movq_to_xmm(buf, Width::W64, v, RCX);
        emit_mov_rr(buf, width, s, n);
        emit_mov_rr(buf, Width::W32, RCX, m);
        emit_shift_cl(buf, shift_op(kind), width, s);
        emit_movq_from_xmm(buf, Width::W64, RCX, v);
        emit_mov_rr(buf, width, d, s);
        self.clobber_flags();
        Ok(())
    }

    // ── CLZ/RBIT/REV ─────────────────────────────────────────────────────

    fn unary(
        &mut self,
        buf: &mut CodeBuffer<'_>,
        width: Width,
        op: BitOp,
        rd: u8,
        rn: u8,
    ) -> Result<(), DbtError> {
        let Some(d) = self.gpr_or_zr(rd)? else {
            return Ok(());
        };
        let Some(n) = self.gpr_or_zr(rn)? else {
            let value = if op == BitOp::Clz {
                u64::from(width.bits())
            } else {
                0
            };
            emit_load_imm_keep_flags(buf, d, value);
            return Ok(());
        };
        match op {
            BitOp::Clz => {
                emit_lzcnt(buf, width, d, n);
                self.clobber_flags();
            }
            BitOp::Rev => {
                copy(buf, width, d, n);
                emit_bswap(buf, width, d);
            }
            BitOp::Rev32 if width == Width::W64 => {
                copy(buf, width, d, n);
                emit_bswap(buf, width, d);
                emit_shift_ri(buf, ShiftOp::Ror, width, d, 32);
                self.clobber_flags();
            }
            BitOp::Rev32 => {
                copy(buf, width, d, n);
                emit_bswap(buf, width, d);
            }
            BitOp::Rev16 => {
                copy(buf, width, d, n);
                self.swap_bits(buf, width, d, &[(8, 0x00FF_00FF_00FF_00FF)])?;
            }
            BitOp::Rbit => {
                copy(buf, width, d, n);
                self.swap_bits(
                    buf,
                    width,
                    d,
                    &[
                        (1, 0x5555_5555_5555_5555),
                        (2, 0x3333_3333_3333_3333),
                        (4, 0x0F0F_0F0F_0F0F_0F0F),
                    ],
                )?;
                emit_bswap(buf, width, d);
            }
        }
        Ok(())
    }

    /// For each `(k, mask)`: `d = ((d >> k) & mask) | ((d & mask) << k)`.
    ///
    /// 64-bit masks do not fit an immediate; they are loaded into a borrowed
    /// GPR whose value waits in the vector scratch.
    fn swap_bits(
        &mut self,
        buf: &mut CodeBuffer<'_>,
        width: Width,
        d: u8,
        stages: &[(u8, u64)],
    ) -> Result<(), DbtError> {
        let s = self.scratch();
        let v = self.vscratch();
        let borrowed = match width {
            Width::W32 => None,
            Width::W64 => {
                let t = [RAX, RCX, RDX]
                    .into_iter()
                    .find(|&r| r != d && r != s)
                    .ok_or_else(|| self.unsupported("no register left for a 64-bit mask"))?;
                emit_movq_to_xmm(buf, Width::W64, v, t);
                Some(t)
            }
        };
        for &(k, m) in stages {
            emit_mov_rr(buf, width, s, d);
            emit_shift_ri(buf, ShiftOp::Shr, width, s, k);
            match borrowed {
                Some(t) => {
                    emit_load_imm_keep_flags(buf, t, m);
                    emit_alu_rr(buf, HostOp::And, width, s, t);
                    emit_alu_rr(buf, HostOp::And, width, d, t);
                }
                None => {
                    let imm = m as u32 as i32;
                    emit_alu_ri(buf, HostOp::And, width, s, imm);
                    emit_alu_ri(buf, HostOp::And, width, d, imm);
                }
            }
            emit_shift_ri(buf, ShiftOp::Shl, width, d, k);
            emit_alu_rr(buf, HostOp::Or, width, d, s);
        }
        if let Some(t) = borrowed {
            emit_movq_from_xmm(buf, Width::W64, t, v);
        }
        self.clobber_flags();
        Ok(())
    }

    // ── SBFM/UBFM/BFM, EXTR ──────────────────────────────────────────────

    /// `SBFM`/`UBFM`: shift the top of the field to the top of the register,
    /// then `SAR`/`SHR` it down to where it belongs. Plain extensions use
    /// `MOVSX`/`MOVZX` and keep the flags.
    #[allow(clippy::too_many_arguments)]
    fn bitfield_extend(
        &mut self,
        buf: &mut CodeBuffer<'_>,
        width: Width,
        signed: bool,
        rd: u8,
        rn: u8,
        immr: u8,
        imms: u8,
    ) -> Result<(), DbtError> {
        let Some(d) = self.gpr_or_zr(rd)? else {
            return Ok(());
        };
        let Some(n) = self.gpr_or_zr(rn)? else {
            emit_load_imm_keep_flags(buf, d, 0);
            return Ok(());
        };
        let bits = width.bits() as u8;
        if immr == 0 && extend_in_place(buf, width, signed, imms, d, n) {
            return Ok(());
        }
        let left = bits - 1 - imms;
        let right = (left + immr) % bits;
        copy(buf, width, d, n);
        if left != 0 {
            emit_shift_ri(buf, ShiftOp::Shl, width, d, left);
        }
        if right != 0 {
            let op = if signed { ShiftOp::Sar } else { ShiftOp::Shr };
            emit_shift_ri(buf, op, width, d, right);
        }
        if left != 0 || right != 0 {
            self.clobber_flags();
        }
        Ok(())
    }

    /// `BFM`: the source field is isolated in the scratch register, the
    /// destination field is cleared by rotating it to bit 0 and shifting it
    /// out, and the two are merged with `OR`.
    fn bitfield_insert(
        &mut self,
        buf: &mut CodeBuffer<'_>,
        width: Width,
        rd: u8,
        rn: u8,
        immr: u8,
        imms: u8,
    ) -> Result<(), DbtError> {
        let Some(d) = self.gpr_or_zr(rd)? else {
            return Ok(());
        };
        let n = self.gpr_or_zr(rn)?;
        let bits = width.bits() as u8;
        // (field length, source lsb, destination lsb)
        let (len, from, to) = if imms >= immr {
            (imms - immr + 1, immr, 0)
        } else {
            (imms + 1, 0, bits - immr)
        };
        if len == bits {
            copy_or_zero(buf, width, d, n);
            return Ok(());
        }
        let s = self.scratch();
        if let Some(n) = n {
            emit_mov_rr(buf, width, s, n);
            let up = bits - from - len;
            if up != 0 {
                emit_shift_ri(buf, ShiftOp::Shl, width, s, up);
            }
            let down = bits - len - to;
            if down != 0 {
                emit_shift_ri(buf, ShiftOp::Shr, width, s, down);
            }
        }
        if to != 0 {
            emit_shift_ri(buf, ShiftOp::Ror, width, d, to);
        }
        emit_shift_ri(buf, ShiftOp::Shr, width, d, len);
        emit_shift_ri(buf, ShiftOp::Shl, width, d, len);
        if to != 0 {
            emit_shift_ri(buf, ShiftOp::Rol, width, d, to);
        }
        if n.is_some() {
            emit_alu_rr(buf, HostOp::Or, width, d, s);
        }
        self.clobber_flags();
        Ok(())
    }

    /// `EXTR`: `Rd = (Rm >> lsb) | (Rn << (datasize - lsb))`.
    fn extract(
        &mut self,
        buf: &mut CodeBuffer<'_>,
        width: Width,
        rd: u8,
        rn: u8,
        rm: u8,
        lsb: u8,
    ) -> Result<(), DbtError> {
        let Some(d) = self.gpr_or_zr(rd)? else {
            return Ok(());
        };
        let n = self.gpr_or_zr(rn)?;
        let m = self.gpr_or_zr(rm)?;
        if lsb == 0 {
            copy_or_zero(buf, width, d, m);
            return Ok(());
        }
        let high = width.bits() as u8 - lsb;
        match (n, m) {
            (None, None) => {
                emit_load_imm_keep_flags(buf, d, 0);
                return Ok(());
            }
            (Some(n), Some(m)) if n == m => {
                copy(buf, width, d, n);
                emit_shift_ri(buf, ShiftOp::Ror, width, d, lsb);
            }
            (Some(n), None) => {
                copy(buf, width, d, n);
                emit_shift_ri(buf, ShiftOp::Shl, width, d, high);
            }
            (None, Some(m)) => {
                copy(buf, width, d, m);
                emit_shift_ri(buf, ShiftOp::Shr, width, d, lsb);
            }
            (Some(n), Some(m)) => {
                let s = self.scratch();
                emit_mov_rr(buf, width, s, m);
                emit_shift_ri(buf, ShiftOp::Shr, width, s, lsb);
                copy(buf, width, d, n);
                emit_shift_ri(buf, ShiftOp::Shl, width, d, high);
                emit_alu_rr(buf, HostOp::Or, width, d, s);
            }
        }
        self.clobber_flags();
        Ok(())
    }

    // ── CSEL/CSINC/CSINV/CSNEG ───────────────────────────────────────────

    #[allow(clippy::too_many_arguments)]
    fn cond_select(
        &mut self,
        buf: &mut CodeBuffer<'_>,
        width: Width,
        op: SelectOp,
        pred: Predicate,
        rd: u8,
        rn: u8,
        rm: u8,
    ) -> Result<(), DbtError> {
        let Some(d) = self.gpr_or_zr(rd)? else {
            return Ok(());
        };
        let n = self.gpr_or_zr(rn)?;
        let m = self.gpr_or_zr(rm)?;
        let s = self.scratch();

        // Else-value into the scratch, flags untouched.
        match m {
            None => {
                let value = match op {
                    SelectOp::Csel | SelectOp::Csneg => 0,
                    SelectOp::Csinc => 1,
                    SelectOp::Csinv => mask(width, u64::MAX),
                };
                emit_load_imm_keep_flags(buf, s, value);
            }
            Some(m) => match op {
                SelectOp::Csel => emit_mov_rr(buf, width, s, m),
                SelectOp::Csinc => self.lea(buf, width, s, m, None, 1)?,
                SelectOp::Csinv => {
                    emit_mov_rr(buf, width, s, m);
                    emit_not(buf, width, s);
                }
                SelectOp::Csneg => {
                    emit_mov_rr(buf, width, s, m);
                    emit_not(buf, width, s);
                    self.lea(buf, width, s, s, None, 1)?;
                }
            },
        }

        let t = match n {
            Some(n) => n,
            None => {
                emit_load_imm_keep_flags(buf, d, 0);
                d
            }
        };
        match pred {
            Predicate::Always => {
                if n.is_some() {
                    copy(buf, width, d, t);
                }
            }
            Predicate::Never => emit_mov_rr(buf, width, d, s),
            Predicate::One(a) => {
                emit_cmov(buf, a, width, s, t);
                emit_mov_rr(buf, width, d, s);
            }
            Predicate::Any(a, b) => {
                emit_cmov(buf, a, width, s, t);
                emit_cmov(buf, b, width, s, t);
                emit_mov_rr(buf, width, d, s);
            }
            Predicate::All(a, b) if d == t => {
                emit_cmov(buf, a.invert(), width, d, s);
                emit_cmov(buf, b.invert(), width, d, s);
            }
            Predicate::All(a, b) => {
                emit_mov_rr(buf, width, d, s);
                emit_cmov(buf, a, width, d, t);
                emit_cmov(buf, b.invert(), width, d, s);
            }
        }
        Ok(())
    }
}
