//! Packed-integer SSE2/SSSE3/SSE4.1 encoders.
//!
//! Nearly everything here carries the mandatory `66` prefix. SSSE3 and
//! SSE4.1 additions live behind the three-byte `0F 38` and `0F 3A` escapes.
//! Lane width is chosen by [`ElemSize`]; operations the ISA does not provide
//! for a width (no `PSLLB`, no SSE `PSRAQ`, no `PMINSQ`) are reported as
//! `None` by the opcode lookups so the translator can synthesize them.

use super::{emit_rm, emit_rr, emit_rr_ib, Mem, Op};
use crate::buffer::CodeBuffer;

/// Vector lane width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ElemSize {
    /// 8-bit lanes.
    B8,
    /// 16-bit lanes.
    B16,
    /// 32-bit lanes.
    B32,
    /// 64-bit lanes.
    B64,
}

impl ElemSize {
    /// Decode the two-bit AArch64 `size` field (`00`=byte … `11`=doubleword).
    #[inline]
    pub const fn from_bits(size: u32) -> Self {
        match size & 3 {
            0 => ElemSize::B8,
            1 => ElemSize::B16,
            2 => ElemSize::B32,
            _ => ElemSize::B64,
        }
    }

    /// Lane width in bits.
    #[inline]
    pub const fn bits(self) -> u32 {
        match self {
            ElemSize::B8 => 8,
            ElemSize::B16 => 16,
            ElemSize::B32 => 32,
            ElemSize::B64 => 64,
        }
    }

    /// The next wider lane, if any.
    #[inline]
    pub const fn widen(self) -> Option<Self> {
        match self {
            ElemSize::B8 => Some(ElemSize::B16),
            ElemSize::B16 => Some(ElemSize::B32),
            ElemSize::B32 => Some(ElemSize::B64),
            ElemSize::B64 => None,
        }
    }

    const fn idx(self) -> usize {
        match self {
            ElemSize::B8 => 0,
            ElemSize::B16 => 1,
            ElemSize::B32 => 2,
            ElemSize::B64 => 3,
        }
    }
}

/// Two-operand packed operation (`dst = dst op src`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PackedOp {
    Add(ElemSize),
    Sub(ElemSize),
    And,
    AndNot,
    Or,
    Xor,
    /// Low-half multiply (`PMULLW`, `PMULLD`).
    MulLow(ElemSize),
    /// Even-lane unsigned 32×32→64 (`PMULUDQ`).
    MulUdq,
    /// Even-lane signed 32×32→64 (`PMULDQ`).
    MulDq,
    CmpEq(ElemSize),
    /// Signed greater-than.
    CmpGt(ElemSize),
    MinSigned(ElemSize),
    MaxSigned(ElemSize),
    MinUnsigned(ElemSize),
    MaxUnsigned(ElemSize),
    UnpackLow(ElemSize),
    UnpackHigh(ElemSize),
    /// `PSHUFB`: byte shuffle by control register.
    ShuffleBytes,
    Abs(ElemSize),
}

impl PackedOp {
    /// Opcode bytes after the `66` prefix, or `None` when the width is not encodable.
    pub fn opcode(self) -> Option<&'static [u8]> {
        use ElemSize::*;
        const ADD: [&[u8]; 4] = [&[0x0F, 0xFC], &[0x0F, 0xFD], &[0x0F, 0xFE], &[0x0F, 0xD4]];
        const SUB: [&[u8]; 4] = [&[0x0F, 0xF8], &[0x0F, 0xF9], &[0x0F, 0xFA], &[0x0F, 0xFB]];
        const CMPEQ: [&[u8]; 4] = [
            &[0x0F, 0x74],
            &[0x0F, 0x75],
            &[0x0F, 0x76],
            &[0x0F, 0x38, 0x29],
        ];
        const CMPGT: [&[u8]; 4] = [
            &[0x0F, 0x64],
            &[0x0F, 0x65],
            &[0x0F, 0x66],
            &[0x0F, 0x38, 0x37],
        ];
        const UNPCKL: [&[u8]; 4] = [&[0x0F, 0x60], &[0x0F, 0x61], &[0x0F, 0x62], &[0x0F, 0x6C]];
        const UNPCKH: [&[u8]; 4] = [&[0x0F, 0x68], &[0x0F, 0x69], &[0x0F, 0x6A], &[0x0F, 0x6D]];
        Some(match self {
            PackedOp::Add(s) => ADD[s.idx()],
            PackedOp::Sub(s) => SUB[s.idx()],
            PackedOp::And => &[0x0F, 0xDB],
            PackedOp::AndNot => &[0x0F, 0xDF],
            PackedOp::Or => &[0x0F, 0xEB],
            PackedOp::Xor => &[0x0F, 0xEF],
            PackedOp::MulLow(B16) => &[0x0F, 0xD5],
            PackedOp::MulLow(B32) => &[0x0F, 0x38, 0x40],
            PackedOp::MulLow(_) => return None,
            PackedOp::MulUdq => &[0x0F, 0xF4],
            PackedOp::MulDq => &[0x0F, 0x38, 0x28],
            PackedOp::CmpEq(s) => CMPEQ[s.idx()],
            PackedOp::CmpGt(s) => CMPGT[s.idx()],
            PackedOp::MinSigned(B8) => &[0x0F, 0x38, 0x38],
            PackedOp::MinSigned(B16) => &[0x0F, 0xEA],
            PackedOp::MinSigned(B32) => &[0x0F, 0x38, 0x39],
            PackedOp::MaxSigned(B8) => &[0x0F, 0x38, 0x3C],
            PackedOp::MaxSigned(B16) => &[0x0F, 0xEE],
            PackedOp::MaxSigned(B32) => &[0x0F, 0x38, 0x3D],
            PackedOp::MinUnsigned(B8) => &[0x0F, 0xDA],
            PackedOp::MinUnsigned(B16) => &[0x0F, 0x38, 0x3A],
            PackedOp::MinUnsigned(B32) => &[0x0F, 0x38, 0x3B],
            PackedOp::MaxUnsigned(B8) => &[0x0F, 0xDE],
            PackedOp::MaxUnsigned(B16) => &[0x0F, 0x38, 0x3E],
            PackedOp::MaxUnsigned(B32) => &[0x0F, 0x38, 0x3F],
            PackedOp::MinSigned(B64)
            | PackedOp::MaxSigned(B64)
            | PackedOp::MinUnsigned(B64)
            | PackedOp::MaxUnsigned(B64) => return None,
            PackedOp::UnpackLow(s) => UNPCKL[s.idx()],
            PackedOp::UnpackHigh(s) => UNPCKH[s.idx()],
            PackedOp::ShuffleBytes => &[0x0F, 0x38, 0x00],
            PackedOp::Abs(B8) => &[0x0F, 0x38, 0x1C],
            PackedOp::Abs(B16) => &[0x0F, 0x38, 0x1D],
            PackedOp::Abs(B32) => &[0x0F, 0x38, 0x1E],
            PackedOp::Abs(B64) => return None,
        })
    }
}

/// Emit `op dst, src`. Returns `false` (and emits nothing) if `op` has no
/// encoding at its width.
pub fn emit_packed(buf: &mut CodeBuffer<'_>, op: PackedOp, dst: u8, src: u8) -> bool {
    match op.opcode() {
        Some(opcode) => {
            emit_rr(buf, Op::new(opcode).prefix(0x66), dst, src);
            true
        }
        None => false,
    }
}

/// `PADDB/W/D/Q dst, src`.
pub fn emit_padd(buf: &mut CodeBuffer<'_>, size: ElemSize, dst: u8, src: u8) {
    emit_packed(buf, PackedOp::Add(size), dst, src);
}

/// `PSUBB/W/D/Q dst, src`.
pub fn emit_psub(buf: &mut CodeBuffer<'_>, size: ElemSize, dst: u8, src: u8) {
    emit_packed(buf, PackedOp::Sub(size), dst, src);
}

/// `PAND dst, src`.
pub fn emit_pand(buf: &mut CodeBuffer<'_>, dst: u8, src: u8) {
    emit_packed(buf, PackedOp::And, dst, src);
}

/// `PANDN dst, src` (`dst = !dst & src`).
pub fn emit_pandn(buf: &mut CodeBuffer<'_>, dst: u8, src: u8) {
    emit_packed(buf, PackedOp::AndNot, dst, src);
}

/// `POR dst, src`.
pub fn emit_por(buf: &mut CodeBuffer<'_>, dst: u8, src: u8) {
    emit_packed(buf, PackedOp::Or, dst, src);
}

/// `PXOR dst, src`.
pub fn emit_pxor(buf: &mut CodeBuffer<'_>, dst: u8, src: u8) {
    emit_packed(buf, PackedOp::Xor, dst, src);
}

/// `PCMPEQB/W/D/Q dst, src`.
pub fn emit_pcmpeq(buf: &mut CodeBuffer<'_>, size: ElemSize, dst: u8, src: u8) {
    emit_packed(buf, PackedOp::CmpEq(size), dst, src);
}

/// `PCMPGTB/W/D/Q dst, src` (signed).
pub fn emit_pcmpgt(buf: &mut CodeBuffer<'_>, size: ElemSize, dst: u8, src: u8) {
    emit_packed(buf, PackedOp::CmpGt(size), dst, src);
}

/// `PACKSSWB dst, src` (`66 0F 63`): words to bytes, signed saturation.
pub fn emit_packsswb(buf: &mut CodeBuffer<'_>, dst: u8, src: u8) {
    emit_rr(buf, Op::new(&[0x0F, 0x63]).prefix(0x66), dst, src);
}

/// `PACKUSWB dst, src` (`66 0F 67`): words to bytes, unsigned saturation.
pub fn emit_packuswb(buf: &mut CodeBuffer<'_>, dst: u8, src: u8) {
    emit_rr(buf, Op::new(&[0x0F, 0x67]).prefix(0x66), dst, src);
}

// ─── Moves ───────────────────────────────────────────────────────────────────

/// `MOVDQA dst, src` (`66 0F 6F`).
pub fn emit_movdqa(buf: &mut CodeBuffer<'_>, dst: u8, src: u8) {
    emit_rr(buf, Op::new(&[0x0F, 0x6F]).prefix(0x66), dst, src);
}

/// `MOVDQU dst, [mem]` (`F3 0F 6F`).
pub fn emit_movdqu_load(buf: &mut CodeBuffer<'_>, dst: u8, mem: Mem) {
    emit_rm(buf, Op::new(&[0x0F, 0x6F]).prefix(0xF3), dst, mem);
}

/// `MOVDQU [mem], src` (`F3 0F 7F`).
pub fn emit_movdqu_store(buf: &mut CodeBuffer<'_>, mem: Mem, src: u8) {
    emit_rm(buf, Op::new(&[0x0F, 0x7F]).prefix(0xF3), src, mem);
}

/// `MOVQ dst, src` (`F3 0F 7E`): copy the low 64 bits, zero the upper 64.
pub fn emit_movq_xmm(buf: &mut CodeBuffer<'_>, dst: u8, src: u8) {
    emit_rr(buf, Op::new(&[0x0F, 0x7E]).prefix(0xF3), dst, src);
}

/// `MOVQ dst, [mem]` (`F3 0F 7E`).
pub fn emit_movq_load(buf: &mut CodeBuffer<'_>, dst: u8, mem: Mem) {
    emit_rm(buf, Op::new(&[0x0F, 0x7E]).prefix(0xF3), dst, mem);
}

/// `MOVQ [mem], src` (`66 0F D6`).
pub fn emit_movq_store(buf: &mut CodeBuffer<'_>, mem: Mem, src: u8) {
    emit_rm(buf, Op::new(&[0x0F, 0xD6]).prefix(0x66), src, mem);
}

// ─── Shifts by immediate ─────────────────────────────────────────────────────

/// Packed shift kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PShift {
    /// Logical left.
    Sll,
    /// Logical right.
    Srl,
    /// Arithmetic right.
    Sra,
}

/// `(opcode, /digit)` for a packed shift-by-immediate, `None` if not encodable.
pub const fn pshift_opcode(kind: PShift, size: ElemSize) -> Option<(u8, u8)> {
    let opcode = match size {
        ElemSize::B8 => return None,
        ElemSize::B16 => 0x71,
        ElemSize::B32 => 0x72,
        ElemSize::B64 => 0x73,
    };
    let digit = match (kind, size) {
        (PShift::Sra, ElemSize::B64) => return None,
        (PShift::Srl, _) => 2,
        (PShift::Sra, _) => 4,
        (PShift::Sll, _) => 6,
    };
    Some((opcode, digit))
}

/// `PSLL/PSRL/PSRA{W,D,Q} dst, imm8`. Returns `false` if not encodable.
pub fn emit_pshift_imm(
    buf: &mut CodeBuffer<'_>,
    kind: PShift,
    size: ElemSize,
    dst: u8,
    imm: u8,
) -> bool {
    match pshift_opcode(kind, size) {
        Some((opcode, digit)) => {
            emit_rr_ib(buf, Op::new(&[0x0F, opcode]).prefix(0x66), digit, dst, imm);
            true
        }
        None => false,
    }
}

/// `PSRLDQ dst, imm8` (`66 0F 73 /3 ib`): whole-register byte shift right.
pub fn emit_psrldq(buf: &mut CodeBuffer<'_>, dst: u8, bytes: u8) {
    emit_rr_ib(buf, Op::new(&[0x0F, 0x73]).prefix(0x66), 3, dst, bytes);
}

/// `PSLLDQ dst, imm8` (`66 0F 73 /7 ib`): whole-register byte shift left.
pub fn emit_pslldq(buf: &mut CodeBuffer<'_>, dst: u8, bytes: u8) {
    emit_rr_ib(buf, Op::new(&[0x0F, 0x73]).prefix(0x66), 7, dst, bytes);
}

// ─── Shuffles, align, insert, extract ────────────────────────────────────────

/// `PSHUFD dst, src, imm8` (`66 0F 70 ib`).
pub fn emit_pshufd(buf: &mut CodeBuffer<'_>, dst: u8, src: u8, imm: u8) {
    emit_rr_ib(buf, Op::new(&[0x0F, 0x70]).prefix(0x66), dst, src, imm);
}

/// `PSHUFLW dst, src, imm8` (`F2 0F 70 ib`).
pub fn emit_pshuflw(buf: &mut CodeBuffer<'_>, dst: u8, src: u8, imm: u8) {
    emit_rr_ib(buf, Op::new(&[0x0F, 0x70]).prefix(0xF2), dst, src, imm);
}

/// `PSHUFB dst, src` (`66 0F 38 00`).
pub fn emit_pshufb(buf: &mut CodeBuffer<'_>, dst: u8, src: u8) {
    emit_packed(buf, PackedOp::ShuffleBytes, dst, src);
}

/// `PALIGNR dst, src, imm8` (`66 0F 3A 0F ib`): `dst = (dst:src) >> (imm*8)`.
pub fn emit_palignr(buf: &mut CodeBuffer<'_>, dst: u8, src: u8, imm: u8) {
    emit_rr_ib(buf, Op::new(&[0x0F, 0x3A, 0x0F]).prefix(0x66), dst, src, imm);
}

/// `PINSRB/W/D/Q dst, r32/r64, lane`.
pub fn emit_pinsr(buf: &mut CodeBuffer<'_>, size: ElemSize, dst: u8, src: u8, lane: u8) {
    let op = match size {
        ElemSize::B8 => Op::new(&[0x0F, 0x3A, 0x20]),
        ElemSize::B16 => Op::new(&[0x0F, 0xC4]),
        ElemSize::B32 => Op::new(&[0x0F, 0x3A, 0x22]),
        ElemSize::B64 => Op::new(&[0x0F, 0x3A, 0x22]).w(true),
    };
    emit_rr_ib(buf, op.prefix(0x66), dst, src, lane);
}

/// `PEXTRB/W/D/Q r32/r64, src, lane` (SSE4.1 `0F 3A 14..16` forms).
pub fn emit_pextr(buf: &mut CodeBuffer<'_>, size: ElemSize, dst: u8, src: u8, lane: u8) {
    let op = match size {
        ElemSize::B8 => Op::new(&[0x0F, 0x3A, 0x14]),
        ElemSize::B16 => Op::new(&[0x0F, 0x3A, 0x15]),
        ElemSize::B32 => Op::new(&[0x0F, 0x3A, 0x16]),
        ElemSize::B64 => Op::new(&[0x0F, 0x3A, 0x16]).w(true),
    };
    emit_rr_ib(buf, op.prefix(0x66), src, dst, lane);
}

/// `PMOVSX/PMOVZX` from `from`-wide lanes to the next width up.
///
/// Returns `false` for 64-bit sources, which have no wider lane.
pub fn emit_pmov_extend(
    buf: &mut CodeBuffer<'_>,
    from: ElemSize,
    signed: bool,
    dst: u8,
    src: u8,
) -> bool {
    let opcode = match (from, signed) {
        (ElemSize::B8, true) => 0x20,
        (ElemSize::B16, true) => 0x23,
        (ElemSize::B32, true) => 0x25,
        (ElemSize::B8, false) => 0x30,
        (ElemSize::B16, false) => 0x33,
        (ElemSize::B32, false) => 0x35,
        (ElemSize::B64, _) => return false,
    };
    emit_rr(buf, Op::new(&[0x0F, 0x38, opcode]).prefix(0x66), dst, src);
    true
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
    fn add_sub_by_width() {
        let sizes = [ElemSize::B8, ElemSize::B16, ElemSize::B32, ElemSize::B64];
        let add = [0xFC, 0xFD, 0xFE, 0xD4];
        let sub = [0xF8, 0xF9, 0xFA, 0xFB];
        for (i, &s) in sizes.iter().enumerate() {
            assert_eq!(enc(|b| emit_padd(b, s, 0, 1)), [0x66, 0x0F, add[i], 0xC1]);
            assert_eq!(enc(|b| emit_psub(b, s, 0, 1)), [0x66, 0x0F, sub[i], 0xC1]);
        }
    }

    #[test]
    fn logic() {
        assert_eq!(enc(|b| emit_pand(b, 0, 1)), [0x66, 0x0F, 0xDB, 0xC1]);
        assert_eq!(enc(|b| emit_por(b, 0, 1)), [0x66, 0x0F, 0xEB, 0xC1]);
        assert_eq!(enc(|b| emit_pxor(b, 0, 1)), [0x66, 0x0F, 0xEF, 0xC1]);
        assert_eq!(enc(|b| emit_pandn(b, 0, 1)), [0x66, 0x0F, 0xDF, 0xC1]);
    }

    #[test]
    fn packs() {
        assert_eq!(enc(|b| emit_packsswb(b, 15, 15)), [0x66, 0x45, 0x0F, 0x63, 0xFF]);
        assert_eq!(enc(|b| emit_packuswb(b, 0, 1)), [0x66, 0x0F, 0x67, 0xC1]);
    }

    #[test]
    fn sse41_extended_opcodes() {
        let mut buf = CodeBuffer::new(64);
        assert!(emit_packed(&mut buf, PackedOp::MulLow(ElemSize::B32), 0, 1));
        assert!(emit_packed(&mut buf, PackedOp::CmpEq(ElemSize::B64), 0, 1));
        assert!(emit_packed(&mut buf, PackedOp::CmpGt(ElemSize::B64), 0, 1));
        assert!(emit_packed(&mut buf, PackedOp::MinUnsigned(ElemSize::B32), 0, 1));
        assert!(emit_packed(&mut buf, PackedOp::MaxUnsigned(ElemSize::B32), 0, 1));
        assert_eq!(
            buf.as_bytes(),
            &[
                0x66, 0x0F, 0x38, 0x40, 0xC1, //
                0x66, 0x0F, 0x38, 0x29, 0xC1, //
                0x66, 0x0F, 0x38, 0x37, 0xC1, //
                0x66, 0x0F, 0x38, 0x3B, 0xC1, //
                0x66, 0x0F, 0x38, 0x3F, 0xC1,
            ]
        );
    }

    #[test]
    fn unencodable_widths_emit_nothing() {
        let mut buf = CodeBuffer::new(16);
        assert!(!emit_packed(&mut buf, PackedOp::MulLow(ElemSize::B8), 0, 1));
        assert!(!emit_packed(&mut buf, PackedOp::MaxSigned(ElemSize::B64), 0, 1));
        assert!(!emit_pshift_imm(&mut buf, PShift::Sll, ElemSize::B8, 0, 1));
        assert!(!emit_pshift_imm(&mut buf, PShift::Sra, ElemSize::B64, 0, 1));
        assert!(buf.is_empty());
    }

    #[test]
    fn shifts_by_immediate() {
        assert_eq!(
            enc(|b| {
                emit_pshift_imm(b, PShift::Sll, ElemSize::B16, 1, 3);
            }),
            [0x66, 0x0F, 0x71, 0xF1, 0x03]
        );
        assert_eq!(
            enc(|b| {
                emit_pshift_imm(b, PShift::Srl, ElemSize::B32, 2, 4);
            }),
            [0x66, 0x0F, 0x72, 0xD2, 0x04]
        );
        assert_eq!(
            enc(|b| {
                emit_pshift_imm(b, PShift::Sra, ElemSize::B32, 0, 31);
            }),
            [0x66, 0x0F, 0x72, 0xE0, 0x1F]
        );
        assert_eq!(
            enc(|b| {
                emit_pshift_imm(b, PShift::Sll, ElemSize::B64, 9, 1);
            }),
            [0x66, 0x41, 0x0F, 0x73, 0xF1, 0x01]
        );
        assert_eq!(enc(|b| emit_psrldq(b, 0, 8)), [0x66, 0x0F, 0x73, 0xD8, 0x08]);
        assert_eq!(enc(|b| emit_pslldq(b, 0, 8)), [0x66, 0x0F, 0x73, 0xF8, 0x08]);
    }

    #[test]
    fn shuffles() {
        assert_eq!(enc(|b| emit_pshufb(b, 0, 1)), [0x66, 0x0F, 0x38, 0x00, 0xC1]);
        assert_eq!(
            enc(|b| emit_palignr(b, 0, 1, 4)),
            [0x66, 0x0F, 0x3A, 0x0F, 0xC1, 0x04]
        );
        assert_eq!(enc(|b| emit_pshufd(b, 0, 1, 0)), [0x66, 0x0F, 0x70, 0xC1, 0x00]);
    }

    #[test]
    fn insert_extract() {
        // pinsrq xmm1, rax, 1
        assert_eq!(
            enc(|b| emit_pinsr(b, ElemSize::B64, 1, 0, 1)),
            [0x66, 0x48, 0x0F, 0x3A, 0x22, 0xC8, 0x01]
        );
        // pextrd eax, xmm1, 2
        assert_eq!(
            enc(|b| emit_pextr(b, ElemSize::B32, 0, 1, 2)),
            [0x66, 0x0F, 0x3A, 0x16, 0xC8, 0x02]
        );
        // pinsrw xmm0, ecx, 3
        assert_eq!(
            enc(|b| emit_pinsr(b, ElemSize::B16, 0, 1, 3)),
            [0x66, 0x0F, 0xC4, 0xC1, 0x03]
        );
    }

    #[test]
    fn moves() {
        assert_eq!(enc(|b| emit_movdqa(b, 0, 1)), [0x66, 0x0F, 0x6F, 0xC1]);
        assert_eq!(enc(|b| emit_movq_xmm(b, 0, 1)), [0xF3, 0x0F, 0x7E, 0xC1]);
        assert_eq!(
            enc(|b| emit_movdqu_load(b, 2, Mem::base(0))),
            [0xF3, 0x0F, 0x6F, 0x10]
        );
        assert_eq!(
            enc(|b| emit_movq_store(b, Mem::new(0, 8), 2)),
            [0x66, 0x0F, 0xD6, 0x50, 0x08]
        );
    }

    #[test]
    fn extends() {
        let mut buf = CodeBuffer::new(16);
        assert!(emit_pmov_extend(&mut buf, ElemSize::B8, true, 0, 1));
        assert!(emit_pmov_extend(&mut buf, ElemSize::B32, false, 0, 1));
        assert!(!emit_pmov_extend(&mut buf, ElemSize::B64, false, 0, 1));
        assert_eq!(
            buf.as_bytes(),
            &[0x66, 0x0F, 0x38, 0x20, 0xC1, 0x66, 0x0F, 0x38, 0x35, 0xC1]
        );
    }
}
