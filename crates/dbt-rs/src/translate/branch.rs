//! Branches.
//!
//! Every branch ends the block. Direct targets are recorded on the exit for
//! the linker; register targets are left in the scratch GPR.
//!
//! `CBZ`/`CBNZ`/`TBZ`/`TBNZ` do not write NZCV, so while the guest flags are
//! live in EFLAGS the register is tested through the scratch XMM and
//! `JRCXZ` instead of `TEST`/`BT`.

use super::{ExitKind, FlagOrigin, FlagState, Predicate, Translator};
use crate::buffer::CodeBuffer;
use crate::decoder::Branch;
use crate::encoder::{
    emit_bt_ri, emit_cond_branch, emit_jrcxz_rel8, emit_load_imm_keep_flags, emit_mov_rr,
    emit_movq_from_xmm, emit_movq_to_xmm, emit_pshift_imm, emit_test_rr, BitTestOp, ElemSize,
    PShift, Width,
};
use crate::error::DbtError;
use crate::regmap::{Condition, HostCondition, GUEST_LR, RCX};

/// `MOV rcx, scratch` (3 bytes) plus `JMP rel32` (5 bytes).
const JRCXZ_HOP: i8 = 8;

impl Translator<'_> {
    pub(super) fn branch(&mut self, buf: &mut CodeBuffer<'_>, br: &Branch) -> Result<(), DbtError> {
        let pc = self.pc;
        let next = pc.wrapping_add(4);
        let target = |offset: i64| pc.wrapping_add(offset as u64);
        match *br {
            Branch::Unconditional { offset } => {
                self.exit_jmp(buf, Some(target(offset)), ExitKind::Jump);
            }
            Branch::Link { offset } => {
                let lr = self.gpr(GUEST_LR)?;
                emit_load_imm_keep_flags(buf, lr, next);
                self.exit_jmp(buf, Some(target(offset)), ExitKind::Call);
            }
            Branch::Register { rn, link } => {
                self.target_to_scratch(buf, rn)?;
                let kind = if link {
                    let lr = self.gpr(GUEST_LR)?;
                    emit_load_imm_keep_flags(buf, lr, next);
                    ExitKind::IndirectCall
                } else {
                    ExitKind::Indirect
                };
                self.exit_jmp(buf, None, kind);
            }
            Branch::Return { rn } => {
                self.target_to_scratch(buf, rn)?;
                self.exit_jmp(buf, None, ExitKind::Return);
            }
            Branch::Conditional { cond, offset } => {
                self.conditional(buf, cond, target(offset), next)?;
            }
            Branch::CompareZero {
                sf,
                nonzero,
                rt,
                offset,
            } => match self.gpr_or_zr(rt)? {
                None => {
                    let pred = if nonzero {
                        Predicate::Never
                    } else {
                        Predicate::Always
                    };
                    self.exit_when(buf, pred, target(offset), next);
                }
                Some(r) if self.keeps_flags() => {
                    let width = Width::from_sf(sf);
                    self.exit_on_zero(buf, width, r, None, nonzero, target(offset), next);
                }
                Some(r) => {
                    emit_test_rr(buf, Width::from_sf(sf), r, r);
                    self.clobber_flags();
                    let cc = if nonzero {
                        HostCondition::Ne
                    } else {
                        HostCondition::E
                    };
                    self.exit_when(buf, Predicate::One(cc), target(offset), next);
                }
            },
            Branch::TestBit {
                nonzero,
                rt,
                bit,
                offset,
            } => match self.gpr_or_zr(rt)? {
                None => {
                    let pred = if nonzero {
                        Predicate::Never
                    } else {
                        Predicate::Always
                    };
                    self.exit_when(buf, pred, target(offset), next);
                }
                Some(r) if self.keeps_flags() => {
                    let bit = Some(bit);
                    self.exit_on_zero(buf, Width::W64, r, bit, nonzero, target(offset), next);
                }
                Some(r) => {
                    // CF = selected bit
                    emit_bt_ri(buf, BitTestOp::Bt, Width::W64, r, bit);
                    self.clobber_flags();
                    let cc = if nonzero {
                        HostCondition::B
                    } else {
                        HostCondition::Ae
                    };
                    self.exit_when(buf, Predicate::One(cc), target(offset), next);
                }
            },
        }
        Ok(())
    }

    /// The guest flags are live and the flag-free test sequence is available.
    fn keeps_flags(&self) -> bool {
        self.flags != FlagState::Clobbered && self.scratch() != RCX
    }

    /// Leave for `taken` or `next` depending on whether `r` (or bit `bit`
    /// of it) is zero, without touching EFLAGS.
    ///
    /// The value is isolated in the scratch XMM, moved into `RCX` (saved in
    /// the scratch GPR), and tested with `JRCXZ`; each side restores `RCX`
    /// before its exit.
    fn exit_on_zero(
        &mut self,
        buf: &mut CodeBuffer<'_>,
        width: Width,
        r: u8,
        bit: Option<u8>,
        nonzero: bool,
        taken: u64,
        next: u64,
    ) {
        let (v, s) = (self.vscratch(), self.scratch());
        emit_movq_to_xmm(buf, width, v, r);
        if let Some(bit) = bit {
            if bit < 63 {
                emit_pshift_imm(buf, PShift::Sll, ElemSize::B64, v, 63 - bit);
            }
            emit_pshift_imm(buf, PShift::Srl, ElemSize::B64, v, 63);
        }
        emit_mov_rr(buf, Width::W64, s, RCX);
        emit_movq_from_xmm(buf, Width::W64, RCX, v);
        emit_jrcxz_rel8(buf, JRCXZ_HOP);

        let (if_set, if_clear) = if nonzero {
            ((taken, ExitKind::Conditional), (next, ExitKind::FallThrough))
        } else {
            ((next, ExitKind::FallThrough), (taken, ExitKind::Conditional))
        };
        emit_mov_rr(buf, Width::W64, RCX, s);
        self.exit_jmp(buf, Some(if_set.0), if_set.1);
        emit_mov_rr(buf, Width::W64, RCX, s);
        self.exit_jmp(buf, Some(if_clear.0), if_clear.1);
    }

    /// Copy an indirect branch target into the scratch GPR.
    fn target_to_scratch(&mut self, buf: &mut CodeBuffer<'_>, rn: u8) -> Result<(), DbtError> {
        let s = self.scratch();
        match self.gpr_or_zr(rn)? {
            Some(r) => emit_mov_rr(buf, Width::W64, s, r),
            None => emit_load_imm_keep_flags(buf, s, 0),
        }
        Ok(())
    }

    fn conditional(
        &mut self,
        buf: &mut CodeBuffer<'_>,
        cond: Condition,
        taken: u64,
        next: u64,
    ) -> Result<(), DbtError> {
        let pred = self.predicate(cond)?;
        if self.flags == FlagState::Host(FlagOrigin::Sub) {
            if let Some(offset) = emit_cond_branch(buf, cond) {
                self.record_exit(buf, offset, Some(taken), ExitKind::Conditional);
                self.exit_jmp(buf, Some(next), ExitKind::FallThrough);
                return Ok(());
            }
        }
        self.exit_when(buf, pred, taken, next);
        Ok(())
    }

    /// Leave for `taken` when `pred` holds and for `next` otherwise.
    fn exit_when(&mut self, buf: &mut CodeBuffer<'_>, pred: Predicate, taken: u64, next: u64) {
        match pred {
            Predicate::Always => {
                self.exit_jmp(buf, Some(taken), ExitKind::Jump);
                return;
            }
            Predicate::Never => {}
            Predicate::One(a) => self.exit_jcc(buf, a, taken, ExitKind::Conditional),
            Predicate::Any(a, b) => {
                self.exit_jcc(buf, a, taken, ExitKind::Conditional);
                self.exit_jcc(buf, b, taken, ExitKind::Conditional);
            }
            Predicate::All(a, b) => {
                self.exit_jcc(buf, a.invert(), next, ExitKind::FallThrough);
                self.exit_jcc(buf, b, taken, ExitKind::Conditional);
            }
        }
        self.exit_jmp(buf, Some(next), ExitKind::FallThrough);
    }
}
