//! x86-64 instruction encoders.
//!
//! Every encoder takes host register numbers (0–15), immediates, and a
//! [`CodeBuffer`], and appends one complete instruction. Instructions are
//! assembled into a small stack buffer first and written with a single
//! [`CodeBuffer::emit_bytes`] call, so an overflow never leaves half an
//! instruction behind.
//!
//! ## Families
//!
//! - [`gpr`]: integer ALU, moves, shifts, bit scans, multiply/divide, stack, CPU control
//! - [`fp`]: scalar SSE/SSE2 (`F3` single, `F2` double) arithmetic, compare, convert, round
//! - [`simd`]: packed SSE2/SSSE3/SSE4.1 integer operations by element width
//! - [`vex`]: 2-/3-byte VEX prefixes and AVX three-operand forms
//! - [`ctrl`]: jumps, calls, returns with rel32 relocations
//!
//! ## Encoding layout
//!
//! ```text
//! [legacy prefix] [REX 0100WRXB] [escape 0F | 0F 38 | 0F 3A] opcode ModR/M [SIB] [disp] [imm]
//! ```

use crate::buffer::CodeBuffer;

pub mod ctrl;
pub mod fp;
pub mod gpr;
pub mod simd;
pub mod vex;

pub use ctrl::*;
pub use fp::*;
pub use gpr::*;
pub use simd::*;
pub use vex::*;

// ─── InstrBytes ──────────────────────────────────────────────────────────────

/// Stack buffer for one x86 instruction (architectural maximum is 15 bytes).
#[derive(Clone, Copy)]
pub(crate) struct InstrBytes {
    data: [u8; 16],
    len: u8,
}

impl InstrBytes {
    #[inline]
    pub(crate) const fn new() -> Self {
        Self {
            data: [0; 16],
            len: 0,
        }
    }

    /// # Panics
    ///
    /// Panics past 16 bytes, which no encoder in this crate produces.
    #[inline]
    pub(crate) fn push(&mut self, byte: u8) {
        assert!((self.len as usize) < 16, "InstrBytes overflow");
        self.data[self.len as usize] = byte;
        self.len += 1;
    }

    #[inline]
    pub(crate) fn extend_from_slice(&mut self, bytes: &[u8]) {
        for &b in bytes {
            self.push(b);
        }
    }

    #[inline]
    pub(crate) fn as_slice(&self) -> &[u8] {
        &self.data[..self.len as usize]
    }

    #[inline]
    pub(crate) fn emit(&self, buf: &mut CodeBuffer<'_>) {
        buf.emit_bytes(self.as_slice());
    }
}

// ─── Operand width ───────────────────────────────────────────────────────────

/// GPR operand width. 32-bit writes zero-extend into the full register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Width {
    /// 32-bit operation (no `REX.W`).
    W32,
    /// 64-bit operation (`REX.W`).
    W64,
}

impl Width {
    /// Pick the width matching the AArch64 `sf` bit.
    #[inline]
    pub const fn from_sf(sf: bool) -> Self {
        if sf {
            Width::W64
        } else {
            Width::W32
        }
    }

    #[inline]
    pub(crate) const fn rex_w(self) -> bool {
        matches!(self, Width::W64)
    }

    /// Operand size in bits.
    #[inline]
    pub const fn bits(self) -> u32 {
        match self {
            Width::W32 => 32,
            Width::W64 => 64,
        }
    }
}

// ─── Memory operand ──────────────────────────────────────────────────────────

/// `[base + index*scale + disp32]` memory operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mem {
    /// Host base register.
    pub base: u8,
    /// Host index register and `log2(scale)`.
    pub index: Option<(u8, u8)>,
    /// Signed displacement.
    pub disp: i32,
}

impl Mem {
    /// `[base + disp]`.
    #[inline]
    pub const fn new(base: u8, disp: i32) -> Self {
        Self {
            base,
            index: None,
            disp,
        }
    }

    /// `[base]`.
    #[inline]
    pub const fn base(base: u8) -> Self {
        Self::new(base, 0)
    }

    /// `[base + index << shift + disp]`.
    ///
    /// `RSP` cannot be an index. An unscaled `RSP` index is swapped into the
    /// base slot; a scaled one (or `RSP` in both slots) returns `None`.
    pub const fn indexed(base: u8, index: u8, shift: u8, disp: i32) -> Option<Self> {
        if shift > 3 {
            return None;
        }
        if index & 0xF == 4 {
            if shift != 0 || base & 0xF == 4 {
                return None;
            }
            return Some(Self {
                base: index,
                index: Some((base, 0)),
                disp,
            });
        }
        Some(Self {
            base,
            index: Some((index, shift)),
            disp,
        })
    }
}

// ─── REX / ModR/M / SIB helpers ──────────────────────────────────────────────

/// Build a REX prefix byte.
#[inline]
pub(crate) fn rex(w: bool, r: bool, x: bool, b: bool) -> u8 {
    let mut val: u8 = 0x40;
    if w {
        val |= 0x08;
    }
    if r {
        val |= 0x04;
    }
    if x {
        val |= 0x02;
    }
    if b {
        val |= 0x01;
    }
    val
}

/// Whether a REX prefix with at least one flag is needed.
#[inline]
pub(crate) fn needs_rex(w: bool, r: bool, x: bool, b: bool) -> bool {
    w || r || x || b
}

/// Build ModR/M byte.
#[inline]
pub(crate) fn modrm(mod_: u8, reg: u8, rm: u8) -> u8 {
    (mod_ << 6) | ((reg & 7) << 3) | (rm & 7)
}

/// Build SIB byte.
#[inline]
pub(crate) fn sib(ss: u8, index: u8, base: u8) -> u8 {
    (ss << 6) | ((index & 7) << 3) | (base & 7)
}

#[inline]
fn is_ext(reg: u8) -> bool {
    reg & 0x8 != 0
}

/// Byte registers 4–7 mean `AH..BH` without REX and `SPL..DIL` with it.
#[inline]
fn byte_reg_needs_rex(reg: u8) -> bool {
    (4..8).contains(&reg)
}

/// Prefix / escape description shared by every `reg, r/m` form.
#[derive(Clone, Copy)]
pub(crate) struct Op<'a> {
    /// Mandatory or operand-size prefix (`66`, `F2`, `F3`), emitted before REX.
    pub prefix: Option<u8>,
    /// REX.W.
    pub w: bool,
    /// Opcode bytes including any `0F`/`0F 38`/`0F 3A` escape.
    pub opcode: &'a [u8],
    /// Force a REX prefix when a byte register 4–7 is involved.
    pub byte_regs: bool,
}

impl<'a> Op<'a> {
    #[inline]
    pub(crate) const fn new(opcode: &'a [u8]) -> Self {
        Self {
            prefix: None,
            w: false,
            opcode,
            byte_regs: false,
        }
    }

    #[inline]
    pub(crate) const fn w(mut self, w: bool) -> Self {
        self.w = w;
        self
    }

    #[inline]
    pub(crate) const fn prefix(mut self, p: u8) -> Self {
        self.prefix = Some(p);
        self
    }

    #[inline]
    pub(crate) const fn bytes(mut self) -> Self {
        self.byte_regs = true;
        self
    }

    fn head(&self, ib: &mut InstrBytes, reg: u8, index: u8, base: u8, byte_operands: &[u8]) {
        if let Some(p) = self.prefix {
            ib.push(p);
        }
        let r = is_ext(reg);
        let x = is_ext(index);
        let b = is_ext(base);
        let force = self.byte_regs && byte_operands.iter().any(|&r| byte_reg_needs_rex(r));
        if needs_rex(self.w, r, x, b) || force {
            ib.push(rex(self.w, r, x, b));
        }
        ib.extend_from_slice(self.opcode);
    }
}

/// `op reg, rm` with register-direct ModR/M (`mod = 11`).
pub(crate) fn instr_rr(op: Op<'_>, reg: u8, rm: u8) -> InstrBytes {
    let mut ib = InstrBytes::new();
    op.head(&mut ib, reg, 0, rm, &[reg, rm]);
    ib.push(modrm(0b11, reg, rm));
    ib
}

/// `op reg, [base + index*scale + disp]`.
pub(crate) fn instr_rm(op: Op<'_>, reg: u8, mem: Mem) -> InstrBytes {
    let mut ib = InstrBytes::new();
    let index = mem.index.map_or(0, |(i, _)| i);
    op.head(&mut ib, reg, index, mem.base, &[reg]);
    push_mem(&mut ib, reg, mem);
    ib
}

/// ModR/M (+SIB) (+disp) for a memory operand, choosing the shortest form.
///
/// `RSP`/`R12` as base require a SIB byte; `RBP`/`R13` with no displacement
/// must use a zero disp8 since `mod = 00, rm = 101` means RIP-relative
/// (or no base, with a SIB byte).
pub(crate) fn push_mem(ib: &mut InstrBytes, reg: u8, mem: Mem) {
    let low = mem.base & 7;
    let mod_ = if mem.disp == 0 && low != 5 {
        0b00
    } else if i8::try_from(mem.disp).is_ok() {
        0b01
    } else {
        0b10
    };
    if let Some((index, shift)) = mem.index {
        ib.push(modrm(mod_, reg, 0b100));
        ib.push(sib(shift, index, low));
    } else if low == 4 {
        ib.push(modrm(mod_, reg, 0b100));
        ib.push(sib(0, 0b100, low));
    } else {
        ib.push(modrm(mod_, reg, low));
    }
    match mod_ {
        0b01 => ib.push(mem.disp as i8 as u8),
        0b10 => ib.extend_from_slice(&mem.disp.to_le_bytes()),
        _ => {}
    }
}

/// Emit `op reg, rm` (register-direct).
#[inline]
pub(crate) fn emit_rr(buf: &mut CodeBuffer<'_>, op: Op<'_>, reg: u8, rm: u8) {
    instr_rr(op, reg, rm).emit(buf);
}

/// Emit `op reg, rm` followed by an 8-bit immediate.
#[inline]
pub(crate) fn emit_rr_ib(buf: &mut CodeBuffer<'_>, op: Op<'_>, reg: u8, rm: u8, imm: u8) {
    let mut ib = instr_rr(op, reg, rm);
    ib.push(imm);
    ib.emit(buf);
}

/// Emit `op reg, [base + disp]`.
#[inline]
pub(crate) fn emit_rm(buf: &mut CodeBuffer<'_>, op: Op<'_>, reg: u8, mem: Mem) {
    instr_rm(op, reg, mem).emit(buf);
}
