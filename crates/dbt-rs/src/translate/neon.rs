//! Advanced SIMD.
//!
//! A `Vn` register is the whole mapped XMM register. 64-bit (`q == 0`)
//! forms compute on all 128 bits and then clear the upper half, which is
//! what AArch64 does to the destination of a 64-bit vector operation.
//! Element widths SSE lacks (byte shifts, 64-bit arithmetic right shift,
//! unsigned 64-bit compares) are synthesized from neighbouring widths.

use super::Translator;
use crate::buffer::CodeBuffer;
use crate::decoder::{VecOp, VecShift, Vector};
use crate::encoder::{
    emit_load_imm_keep_flags, emit_movdqa, emit_movq_to_xmm, emit_movq_xmm, emit_packed,
    emit_palignr, emit_pand, emit_pandn, emit_pcmpeq, emit_pcmpgt, emit_pmov_extend, emit_por,
    emit_pshift_imm, emit_pshufb, emit_pshufd, emit_pshuflw, emit_psrldq, emit_psub, emit_pxor,
    emit_vpacked, emit_vpalignr, ElemSize, PShift, PackedOp, Width,
};
use crate::error::DbtError;

const fn is_commutative(op: PackedOp) -> bool {
    matches!(
        op,
        PackedOp::Add(_)
            | PackedOp::And
            | PackedOp::Or
            | PackedOp::Xor
            | PackedOp::MulLow(_)
            | PackedOp::MulUdq
            | PackedOp::MulDq
            | PackedOp::CmpEq(_)
            | PackedOp::MinSigned(_)
            | PackedOp::MaxSigned(_)
            | PackedOp::MinUnsigned(_)
            | PackedOp::MaxUnsigned(_)
    )
}

impl Translator<'_> {
    pub(super) fn vector(&mut self, buf: &mut CodeBuffer<'_>, op: &Vector) -> Result<(), DbtError> {
        match *op {
            Vector::ThreeSame {
                op,
                q,
                size,
                rd,
                rn,
                rm,
            } => {
                let (d, n, m) = (self.xmm(rd)?, self.xmm(rn)?, self.xmm(rm)?);
                self.three_same(buf, op, ElemSize::from_bits(u32::from(size)), d, n, m)?;
                if !q {
                    emit_movq_xmm(buf, d, d);
                }
            }
            Vector::MulLong {
                signed,
                q,
                size,
                rd,
                rn,
                rm,
            } => {
                let (d, n, m) = (self.xmm(rd)?, self.xmm(rn)?, self.xmm(rm)?);
                self.mul_long(buf, signed, q, ElemSize::from_bits(u32::from(size)), d, n, m)?;
            }
            Vector::ShiftImm {
                op,
                q,
                size,
                shift,
                rd,
                rn,
            } => {
                let (d, n) = (self.xmm(rd)?, self.xmm(rn)?);
                if d != n {
                    emit_movdqa(buf, d, n);
                }
                self.shift_imm(buf, op, ElemSize::from_bits(u32::from(size)), d, shift)?;
                if !q {
                    emit_movq_xmm(buf, d, d);
                }
            }
            Vector::Ext {
                q,
                index,
                rd,
                rn,
                rm,
            } => {
                let (d, n, m) = (self.xmm(rd)?, self.xmm(rn)?, self.xmm(rm)?);
                let v = self.vscratch();
                if q {
                    if self.config.avx {
                        emit_vpalignr(buf, d, m, n, index);
                    } else {
                        emit_movdqa(buf, v, m);
                        emit_palignr(buf, v, n, index);
                        emit_movdqa(buf, d, v);
                    }
                } else {
                    // [n.lo, m.lo] shifted down by `index` bytes.
                    emit_movdqa(buf, v, n);
                    emit_packed(buf, PackedOp::UnpackLow(ElemSize::B64), v, m);
                    emit_psrldq(buf, v, index);
                    emit_movq_xmm(buf, d, v);
                }
            }
            Vector::Dup { q, size, rd, rn } => {
                let d = self.xmm(rd)?;
                let Some(n) = self.gpr_or_zr(rn)? else {
                    emit_pxor(buf, d, d);
                    return Ok(());
                };
                match ElemSize::from_bits(u32::from(size)) {
                    ElemSize::B8 => {
                        let v = self.vscratch();
                        emit_movq_to_xmm(buf, Width::W32, d, n);
                        emit_pxor(buf, v, v);
                        emit_pshufb(buf, d, v);
                    }
                    ElemSize::B16 => {
                        emit_movq_to_xmm(buf, Width::W32, d, n);
                        emit_pshuflw(buf, d, d, 0);
                        emit_pshufd(buf, d, d, 0);
                    }
                    ElemSize::B32 => {
                        emit_movq_to_xmm(buf, Width::W32, d, n);
                        emit_pshufd(buf, d, d, 0);
                    }
                    ElemSize::B64 => {
                        emit_movq_to_xmm(buf, Width::W64, d, n);
                        emit_packed(buf, PackedOp::UnpackLow(ElemSize::B64), d, d);
                    }
                }
                if !q {
                    emit_movq_xmm(buf, d, d);
                }
            }
        }
        Ok(())
    }

    /// `d = n op m` without clobbering an input that aliases `d`.
    fn vbinary(
        &self,
        buf: &mut CodeBuffer<'_>,
        op: PackedOp,
        d: u8,
        n: u8,
        m: u8,
    ) -> Result<(), DbtError> {
        if op.opcode().is_none() {
            return Err(self.unsupported(alloc::format!("no host form for {:?}", op)));
        }
        if self.config.avx {
            if !emit_vpacked(buf, op, d, n, m) {
                return Err(self.unsupported(alloc::format!("no VEX form for {:?}", op)));
            }
        } else if d == n {
            emit_packed(buf, op, d, m);
        } else if d == m && is_commutative(op) {
            emit_packed(buf, op, d, n);
        } else if d == m {
            let v = self.vscratch();
            emit_movdqa(buf, v, m);
            emit_movdqa(buf, d, n);
            emit_packed(buf, op, d, v);
        } else {
            emit_movdqa(buf, d, n);
            emit_packed(buf, op, d, m);
        }
        Ok(())
    }

    /// `d = !v` (clobbers `v` when `d == v`).
    fn vnot_into(&self, buf: &mut CodeBuffer<'_>, d: u8, v: u8) {
        if d == v {
            let ones = self.vscratch();
            // Only reached with d != vscratch.
            emit_pcmpeq(buf, ElemSize::B32, ones, ones);
            emit_pxor(buf, d, ones);
        } else {
            emit_pcmpeq(buf, ElemSize::B32, d, d);
            emit_pxor(buf, d, v);
        }
    }

    /// `d = clear ^ ((clear ^ set) & mask)`: `set` where `mask` is one.
    fn bit_select(&self, buf: &mut CodeBuffer<'_>, d: u8, mask: u8, set: u8, clear: u8) {
        let v = self.vscratch();
        emit_movdqa(buf, v, clear);
        emit_pxor(buf, v, set);
        emit_pand(buf, v, mask);
        emit_pxor(buf, v, clear);
        emit_movdqa(buf, d, v);
    }

    fn three_same(
        &mut self,
        buf: &mut CodeBuffer<'_>,
        op: VecOp,
        e: ElemSize,
        d: u8,
        n: u8,
        m: u8,
    ) -> Result<(), DbtError> {
        let v = self.vscratch();
        match op {
            VecOp::Add => self.vbinary(buf, PackedOp::Add(e), d, n, m)?,
            VecOp::Sub => self.vbinary(buf, PackedOp::Sub(e), d, n, m)?,
            VecOp::Mul => self.vbinary(buf, PackedOp::MulLow(e), d, n, m)?,
            VecOp::And => self.vbinary(buf, PackedOp::And, d, n, m)?,
            VecOp::Orr => self.vbinary(buf, PackedOp::Or, d, n, m)?,
            VecOp::Eor => self.vbinary(buf, PackedOp::Xor, d, n, m)?,
            VecOp::SMax => self.vbinary(buf, PackedOp::MaxSigned(e), d, n, m)?,
            VecOp::SMin => self.vbinary(buf, PackedOp::MinSigned(e), d, n, m)?,
            VecOp::UMax => self.vbinary(buf, PackedOp::MaxUnsigned(e), d, n, m)?,
            VecOp::UMin => self.vbinary(buf, PackedOp::MinUnsigned(e), d, n, m)?,
            VecOp::CmEq => self.vbinary(buf, PackedOp::CmpEq(e), d, n, m)?,
            VecOp::CmGt => self.vbinary(buf, PackedOp::CmpGt(e), d, n, m)?,
            VecOp::Bic => {
                emit_movdqa(buf, v, m);
                emit_pandn(buf, v, n);
                emit_movdqa(buf, d, v);
            }
            VecOp::Orn => {
                emit_pcmpeq(buf, ElemSize::B32, v, v);
                emit_pxor(buf, v, m);
                emit_por(buf, v, n);
                emit_movdqa(buf, d, v);
            }
            VecOp::Bsl => self.bit_select(buf, d, d, n, m),
            VecOp::Bit => self.bit_select(buf, d, m, n, d),
            VecOp::Bif => self.bit_select(buf, d, m, d, n),
            VecOp::CmGe => {
                // !(m > n)
                emit_movdqa(buf, v, m);
                emit_pcmpgt(buf, e, v, n);
                self.vnot_into(buf, d, v);
            }
            VecOp::CmHs | VecOp::CmHi if e == ElemSize::B64 => {
                self.unsigned_gt_q(buf, op == VecOp::CmHs, d, n, m);
            }
            VecOp::CmHs => {
                // max(n, m) == n
                emit_movdqa(buf, v, n);
                emit_packed(buf, PackedOp::MaxUnsigned(e), v, m);
                emit_pcmpeq(buf, e, v, n);
                emit_movdqa(buf, d, v);
            }
            VecOp::CmHi => {
                // !(max(m, n) == m)
                emit_movdqa(buf, v, m);
                emit_packed(buf, PackedOp::MaxUnsigned(e), v, n);
                emit_pcmpeq(buf, e, v, m);
                self.vnot_into(buf, d, v);
            }
            VecOp::CmTst => {
                // !((n & m) == 0)
                emit_movdqa(buf, v, n);
                emit_pand(buf, v, m);
                emit_pxor(buf, d, d);
                emit_pcmpeq(buf, e, d, v);
                self.vnot_into(buf, d, d);
            }
            VecOp::Mla | VecOp::Mls => {
                let mul = PackedOp::MulLow(e);
                if mul.opcode().is_none() {
                    return Err(self.unsupported(alloc::format!("{}-bit lane multiply", e.bits())));
                }
                emit_movdqa(buf, v, n);
                emit_packed(buf, mul, v, m);
                if op == VecOp::Mla {
                    emit_packed(buf, PackedOp::Add(e), d, v);
                } else {
                    emit_psub(buf, e, d, v);
                }
            }
        }
        Ok(())
    }

    /// 64-bit unsigned `n > m` (or `n >= m` when `or_equal`) by flipping
    /// the sign bits and comparing signed.
    fn unsigned_gt_q(&self, buf: &mut CodeBuffer<'_>, or_equal: bool, d: u8, n: u8, m: u8) {
        let v = self.vscratch();
        let q = ElemSize::B64;
        if n == m {
            if or_equal {
                emit_pcmpeq(buf, ElemSize::B32, d, d);
            } else {
                emit_pxor(buf, d, d);
            }
            return;
        }
        // n >= m is !(m > n)
        let (a, b) = if or_equal { (m, n) } else { (n, m) };
        emit_pcmpeq(buf, ElemSize::B32, v, v);
        emit_pshift_imm(buf, PShift::Sll, q, v, 63);
        if d == b {
            emit_pxor(buf, d, v);
            emit_pxor(buf, v, a);
            emit_pcmpgt(buf, q, v, d);
            emit_movdqa(buf, d, v);
        } else {
            if d != a {
                emit_movdqa(buf, d, a);
            }
            emit_pxor(buf, d, v);
            emit_pxor(buf, v, b);
            emit_pcmpgt(buf, q, d, v);
        }
        if or_equal {
            self.vnot_into(buf, d, d);
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn mul_long(
        &mut self,
        buf: &mut CodeBuffer<'_>,
        signed: bool,
        upper: bool,
        e: ElemSize,
        d: u8,
        n: u8,
        m: u8,
    ) -> Result<(), DbtError> {
        let v = self.vscratch();
        // m first: d may alias it.
        if upper {
            emit_pshufd(buf, v, m, 0xEE);
            emit_pmov_extend(buf, e, signed, v, v);
            emit_pshufd(buf, d, n, 0xEE);
            emit_pmov_extend(buf, e, signed, d, d);
        } else {
            emit_pmov_extend(buf, e, signed, v, m);
            emit_pmov_extend(buf, e, signed, d, n);
        }
        let product = match (e, signed) {
            (ElemSize::B8, _) => PackedOp::MulLow(ElemSize::B16),
            (ElemSize::B16, _) => PackedOp::MulLow(ElemSize::B32),
            (ElemSize::B32, true) => PackedOp::MulDq,
            (ElemSize::B32, false) => PackedOp::MulUdq,
            (ElemSize::B64, _) => return Err(self.unsupported("64-bit long multiply")),
        };
        emit_packed(buf, product, d, v);
        Ok(())
    }

    /// Broadcast `byte` to every byte of the vector scratch.
    fn byte_splat(&self, buf: &mut CodeBuffer<'_>, byte: u8) -> u8 {
        let (s, v) = (self.scratch(), self.vscratch());
        emit_load_imm_keep_flags(buf, s, u64::from(byte) * 0x0101_0101);
        emit_movq_to_xmm(buf, Width::W32, v, s);
        emit_pshufd(buf, v, v, 0);
        v
    }

    /// Shift `d` in place.
    fn shift_imm(
        &mut self,
        buf: &mut CodeBuffer<'_>,
        op: VecShift,
        e: ElemSize,
        d: u8,
        k: u8,
    ) -> Result<(), DbtError> {
        match (op, e) {
            (VecShift::Shl, ElemSize::B8) => {
                emit_pshift_imm(buf, PShift::Sll, ElemSize::B16, d, k);
                let v = self.byte_splat(buf, 0xFFu8 << k);
                emit_pand(buf, d, v);
            }
            (VecShift::Ushr, ElemSize::B8) => {
                emit_pshift_imm(buf, PShift::Srl, ElemSize::B16, d, k);
                let v = self.byte_splat(buf, (0xFFu16 >> k) as u8);
                emit_pand(buf, d, v);
            }
            (VecShift::Sshr, ElemSize::B8) => {
                // Logical shift, then sign-extend from bit 7 - k.
                let k = k.min(7);
                emit_pshift_imm(buf, PShift::Srl, ElemSize::B16, d, k);
                let v = self.byte_splat(buf, 0xFF >> k);
                emit_pand(buf, d, v);
                let v = self.byte_splat(buf, 0x80 >> k);
                emit_pxor(buf, d, v);
                emit_psub(buf, ElemSize::B8, d, v);
            }
            (VecShift::Sshr, ElemSize::B64) => {
                let v = self.vscratch();
                emit_pxor(buf, v, v);
                emit_pcmpgt(buf, ElemSize::B64, v, d);
                emit_pshift_imm(buf, PShift::Srl, ElemSize::B64, d, k);
                emit_pshift_imm(buf, PShift::Sll, ElemSize::B64, v, 64 - k);
                emit_por(buf, d, v);
            }
            (op, e) => {
                let kind = match op {
                    VecShift::Shl => PShift::Sll,
                    VecShift::Ushr => PShift::Srl,
                    VecShift::Sshr => PShift::Sra,
                };
                if !emit_pshift_imm(buf, kind, e, d, k) {
                    return Err(self.unsupported("vector shift width"));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::{host, host_with, translate_err};
    use crate::config::TranslatorConfig;
    use crate::error::DbtError;

    fn contains(haystack: &[u8], needle: &[u8]) -> bool {
        haystack.windows(needle.len()).any(|w| w == needle)
    }

    #[test]
    fn add_4s() {
        // add v0.4s, v1.4s, v2.4s -> movdqa xmm0, xmm1; paddd xmm0, xmm2
        assert_eq!(
            host(&[0x4EA2_8420]),
            [0x66, 0x0F, 0x6F, 0xC1, 0x66, 0x0F, 0xFE, 0xC2]
        );
    }

    #[test]
    fn add_2s_clears_upper_half() {
        let code = host(&[0x0EA2_8420]);
        assert!(code.ends_with(&[0xF3, 0x0F, 0x7E, 0xC0]));
    }

    #[test]
    fn add_with_avx_is_three_operand() {
        let config = TranslatorConfig::default().with_avx(true);
        // vpaddd xmm0, xmm1, xmm2
        assert_eq!(host_with(config, &[0x4EA2_8420]), [0xC5, 0xF1, 0xFE, 0xC2]);
    }

    #[test]
    fn bic_through_pandn() {
        // bic v0.16b, v1.16b, v2.16b
        assert_eq!(
            host(&[0x4E62_1C20]),
            [
                0x66, 0x44, 0x0F, 0x6F, 0xFA, // movdqa xmm15, xmm2
                0x66, 0x44, 0x0F, 0xDF, 0xF9, // pandn xmm15, xmm1
                0x66, 0x41, 0x0F, 0x6F, 0xC7, // movdqa xmm0, xmm15
            ]
        );
    }

    #[test]
    fn bsl_ends_with_copy() {
        // bsl v0.16b, v1.16b, v2.16b
        let code = host(&[0x6E62_1C20]);
        assert!(code.ends_with(&[0x66, 0x41, 0x0F, 0x6F, 0xC7]));
    }

    #[test]
    fn cmhi_2d_uses_pcmpgtq() {
        // cmhi v0.2d, v1.2d, v2.2d
        let code = host(&[0x6EE2_3420]);
        assert!(contains(&code, &[0x66, 0x0F, 0x38, 0x37]));
    }

    #[test]
    fn byte_multiply_unsupported() {
        // mul v0.16b, v1.16b, v2.16b
        let err = translate_err(&[0x4E22_9C20]);
        assert!(matches!(err, DbtError::Unsupported { .. }));
    }

    #[test]
    fn shl_4s() {
        // shl v0.4s, v1.4s, #3 -> movdqa xmm0, xmm1; pslld xmm0, 3
        assert_eq!(
            host(&[0x4F23_5420]),
            [0x66, 0x0F, 0x6F, 0xC1, 0x66, 0x0F, 0x72, 0xF0, 0x03]
        );
    }

    #[test]
    fn ushr_16b_masks_words() {
        // ushr v0.16b, v1.16b, #3
        let code = host(&[0x6F0D_0420]);
        // psrlw xmm0, 3
        assert!(contains(&code, &[0x66, 0x0F, 0x71, 0xD0, 0x03]));
        // mov r11d, 0x1f1f1f1f
        assert!(contains(&code, &[0x41, 0xBB, 0x1F, 0x1F, 0x1F, 0x1F]));
    }

    #[test]
    fn sshr_2d_builds_sign() {
        // sshr v0.2d, v1.2d, #1 -> ... pcmpgtq xmm15, xmm0 ...
        let code = host(&[0x4F7F_0420]);
        assert!(contains(&code, &[0x66, 0x44, 0x0F, 0x38, 0x37, 0xF8]));
    }

    #[test]
    fn ext_16b_is_palignr() {
        // ext v0.16b, v1.16b, v2.16b, #3
        assert_eq!(
            host(&[0x6E02_1820]),
            [
                0x66, 0x44, 0x0F, 0x6F, 0xFA, // movdqa xmm15, xmm2
                0x66, 0x44, 0x0F, 0x3A, 0x0F, 0xF9, 0x03, // palignr xmm15, xmm1, 3
                0x66, 0x41, 0x0F, 0x6F, 0xC7, // movdqa xmm0, xmm15
            ]
        );
    }

    #[test]
    fn dup_4s() {
        // dup v0.4s, w1 -> movd xmm0, ecx; pshufd xmm0, xmm0, 0
        assert_eq!(
            host(&[0x4E04_0C20]),
            [0x66, 0x0F, 0x6E, 0xC1, 0x66, 0x0F, 0x70, 0xC0, 0x00]
        );
    }

    #[test]
    fn smull_2d() {
        // smull v0.2d, v1.2s, v2.2s
        assert_eq!(
            host(&[0x0EA2_C020]),
            [
                0x66, 0x44, 0x0F, 0x38, 0x25, 0xFA, // pmovsxdq xmm15, xmm2
                0x66, 0x0F, 0x38, 0x25, 0xC1, // pmovsxdq xmm0, xmm1
                0x66, 0x41, 0x0F, 0x38, 0x28, 0xC7, // pmuldq xmm0, xmm15
            ]
        );
    }
}
