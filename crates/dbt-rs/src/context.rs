//! Per-thread guest CPU state.
//!
//! [`CpuContext`] is owned by whoever runs guest threads; the translator only
//! reads from it. Floating-point control lives here rather than in any
//! process-wide state, so threads with different FPCR settings translate
//! independently.

use crate::encoder::fp::RoundMode;

// ─── FPCR / FPSR ────────────────────────────────────────────────────────────

/// FPCR rounding-mode field (`RMode`, bits 22–23).
const FPCR_RMODE_SHIFT: u32 = 22;
/// FPCR flush-to-zero.
const FPCR_FZ: u32 = 1 << 24;
/// FPCR default-NaN.
const FPCR_DN: u32 = 1 << 25;
/// FPCR bits this model keeps (`AHP`, `DN`, `FZ`, `RMode`, trap enables).
const FPCR_MASK: u32 = 0x07C0_9F00;

/// FPSR cumulative exception bits (`IOC`, `DZC`, `OFC`, `UFC`, `IXC`, `IDC`).
const FPSR_CUMULATIVE: u32 = 0x9F;
/// FPSR saturation bit.
const FPSR_QC: u32 = 1 << 27;

/// Default MXCSR: all exceptions masked, round to nearest.
const MXCSR_DEFAULT: u32 = 0x1F80;
const MXCSR_DAZ: u32 = 1 << 6;
const MXCSR_FTZ: u32 = 1 << 15;
const MXCSR_RC_SHIFT: u32 = 13;

/// Guest floating-point control and status registers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FpControl {
    fpcr: u32,
    fpsr: u32,
}

impl FpControl {
    /// Build from raw register values, dropping reserved bits.
    pub const fn new(fpcr: u32, fpsr: u32) -> Self {
        Self {
            fpcr: fpcr & FPCR_MASK,
            fpsr: fpsr & (FPSR_CUMULATIVE | FPSR_QC),
        }
    }

    #[inline]
    pub const fn fpcr(&self) -> u32 {
        self.fpcr
    }

    #[inline]
    pub const fn fpsr(&self) -> u32 {
        self.fpsr
    }

    /// Write FPCR (as `MSR FPCR, Xt` would).
    pub fn set_fpcr(&mut self, value: u32) {
        self.fpcr = value & FPCR_MASK;
    }

    /// Write FPSR (as `MSR FPSR, Xt` would).
    pub fn set_fpsr(&mut self, value: u32) {
        self.fpsr = value & (FPSR_CUMULATIVE | FPSR_QC);
    }

    /// Current rounding mode from `FPCR.RMode`.
    pub const fn rounding_mode(&self) -> RoundMode {
        match (self.fpcr >> FPCR_RMODE_SHIFT) & 3 {
            0b00 => RoundMode::Nearest,
            0b01 => RoundMode::Up,
            0b10 => RoundMode::Down,
            _ => RoundMode::Zero,
        }
    }

    /// Set `FPCR.RMode` from a host rounding mode.
    ///
    /// [`RoundMode::Current`] leaves the field unchanged.
    pub fn set_rounding_mode(&mut self, mode: RoundMode) {
        let rmode = match mode {
            RoundMode::Nearest => 0b00,
            RoundMode::Up => 0b01,
            RoundMode::Down => 0b10,
            RoundMode::Zero => 0b11,
            RoundMode::Current => return,
        };
        self.fpcr = (self.fpcr & !(3 << FPCR_RMODE_SHIFT)) | (rmode << FPCR_RMODE_SHIFT);
    }

    #[inline]
    pub const fn flush_to_zero(&self) -> bool {
        self.fpcr & FPCR_FZ != 0
    }

    #[inline]
    pub const fn default_nan(&self) -> bool {
        self.fpcr & FPCR_DN != 0
    }

    /// Host MXCSR equivalent of this FPCR: exceptions masked, matching
    /// rounding control, and FTZ/DAZ when flush-to-zero is on.
    pub const fn mxcsr(&self) -> u32 {
        let rc = match self.rounding_mode() {
            RoundMode::Down => 0b01,
            RoundMode::Up => 0b10,
            RoundMode::Zero => 0b11,
            RoundMode::Nearest | RoundMode::Current => 0b00,
        };
        let mut value = MXCSR_DEFAULT | (rc << MXCSR_RC_SHIFT);
        if self.flush_to_zero() {
            value |= MXCSR_FTZ | MXCSR_DAZ;
        }
        value
    }

    /// Fold host MXCSR exception flags (bits 0–5) into the cumulative
    /// FPSR bits.
    pub fn accumulate_mxcsr(&mut self, mxcsr: u32) {
        // MXCSR: IE DE ZE OE UE PE   FPSR: IOC DZC OFC UFC IXC .. IDC
        let mut bits = 0;
        if mxcsr & 0x01 != 0 {
            bits |= 1 << 0;
        }
        if mxcsr & 0x04 != 0 {
            bits |= 1 << 1;
        }
        if mxcsr & 0x08 != 0 {
            bits |= 1 << 2;
        }
        if mxcsr & 0x10 != 0 {
            bits |= 1 << 3;
        }
        if mxcsr & 0x20 != 0 {
            bits |= 1 << 4;
        }
        if mxcsr & 0x02 != 0 {
            bits |= 1 << 7;
        }
        self.fpsr |= bits;
    }
}

// ─── Register file ──────────────────────────────────────────────────────────

/// Guest register file of one thread.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CpuContext {
    /// `X0..X28`, frame pointer `X29`, link register `X30`.
    x: [u64; 31],
    sp: u64,
    pc: u64,
    /// NZCV in bits 28–31.
    nzcv: u32,
    v: [u128; 32],
    fp: FpControl,
}

impl Default for CpuContext {
    fn default() -> Self {
        Self::new(0)
    }
}

impl CpuContext {
    /// Zeroed register file starting at `pc`.
    pub const fn new(pc: u64) -> Self {
        Self {
            x: [0; 31],
            sp: 0,
            pc,
            nzcv: 0,
            v: [0; 32],
            fp: FpControl::new(0, 0),
        }
    }

    /// Read `Xn`; register 31 reads as zero.
    #[inline]
    pub fn gpr(&self, n: u8) -> u64 {
        self.x.get(usize::from(n)).copied().unwrap_or(0)
    }

    /// Write `Xn`; writes to register 31 are discarded.
    #[inline]
    pub fn set_gpr(&mut self, n: u8, value: u64) {
        if let Some(slot) = self.x.get_mut(usize::from(n)) {
            *slot = value;
        }
    }

    #[inline]
    pub const fn sp(&self) -> u64 {
        self.sp
    }

    #[inline]
    pub fn set_sp(&mut self, value: u64) {
        self.sp = value;
    }

    #[inline]
    pub const fn pc(&self) -> u64 {
        self.pc
    }

    #[inline]
    pub fn set_pc(&mut self, value: u64) {
        self.pc = value;
    }

    #[inline]
    pub const fn nzcv(&self) -> u32 {
        self.nzcv
    }

    #[inline]
    pub fn set_nzcv(&mut self, value: u32) {
        self.nzcv = value & 0xF000_0000;
    }

    /// Read `Vn` (128 bits).
    #[inline]
    pub fn vreg(&self, n: u8) -> u128 {
        self.v[usize::from(n & 0x1F)]
    }

    /// Write `Vn` (128 bits).
    #[inline]
    pub fn set_vreg(&mut self, n: u8, value: u128) {
        self.v[usize::from(n & 0x1F)] = value;
    }

    /// Floating-point control/status.
    #[inline]
    pub const fn fp(&self) -> &FpControl {
        &self.fp
    }

    #[inline]
    pub fn fp_mut(&mut self) -> &mut FpControl {
        &mut self.fp
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rounding_mode_from_fpcr() {
        let mut fp = FpControl::default();
        assert_eq!(fp.rounding_mode(), RoundMode::Nearest);
        fp.set_fpcr(0b01 << 22);
        assert_eq!(fp.rounding_mode(), RoundMode::Up);
        fp.set_fpcr(0b10 << 22);
        assert_eq!(fp.rounding_mode(), RoundMode::Down);
        fp.set_fpcr(0b11 << 22);
        assert_eq!(fp.rounding_mode(), RoundMode::Zero);
    }

    #[test]
    fn set_rounding_mode_round_trips() {
        let mut fp = FpControl::default();
        for mode in [RoundMode::Up, RoundMode::Down, RoundMode::Zero, RoundMode::Nearest] {
            fp.set_rounding_mode(mode);
            assert_eq!(fp.rounding_mode(), mode);
        }
        fp.set_rounding_mode(RoundMode::Zero);
        fp.set_rounding_mode(RoundMode::Current);
        assert_eq!(fp.rounding_mode(), RoundMode::Zero);
    }

    #[test]
    fn reserved_bits_dropped() {
        let fp = FpControl::new(u32::MAX, u32::MAX);
        assert_eq!(fp.fpcr(), FPCR_MASK);
        assert_eq!(fp.fpsr(), 0x9F | (1 << 27));
    }

    #[test]
    fn mxcsr_tracks_fpcr() {
        let mut fp = FpControl::default();
        assert_eq!(fp.mxcsr(), 0x1F80);
        fp.set_rounding_mode(RoundMode::Zero);
        assert_eq!(fp.mxcsr(), 0x7F80);
        fp.set_fpcr(fp.fpcr() | FPCR_FZ);
        assert!(fp.flush_to_zero());
        assert_eq!(fp.mxcsr(), 0x7F80 | 0x8000 | 0x40);
    }

    #[test]
    fn mxcsr_flags_accumulate() {
        let mut fp = FpControl::default();
        fp.accumulate_mxcsr(0x20); // precision
        fp.accumulate_mxcsr(0x04); // divide by zero
        assert_eq!(fp.fpsr(), (1 << 4) | (1 << 1));
    }

    #[test]
    fn zero_register_reads_zero() {
        let mut ctx = CpuContext::new(0x4000);
        ctx.set_gpr(31, 7);
        assert_eq!(ctx.gpr(31), 0);
        ctx.set_gpr(30, 0xdead);
        assert_eq!(ctx.gpr(30), 0xdead);
        assert_eq!(ctx.pc(), 0x4000);
    }

    #[test]
    fn contexts_are_independent() {
        let mut a = CpuContext::default();
        let b = CpuContext::default();
        a.fp_mut().set_rounding_mode(RoundMode::Up);
        assert_eq!(a.fp().rounding_mode(), RoundMode::Up);
        assert_eq!(b.fp().rounding_mode(), RoundMode::Nearest);
    }
}
