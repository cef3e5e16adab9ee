//! Size-preserving peephole optimizer over finished x86-64 code.
//!
//! The optimizer walks a byte range one instruction at a time using a small
//! length scanner ([`scan`]) and rewrites known-redundant instructions to
//! `NOP` bytes in place. Nothing is ever inserted or removed, so relocation
//! offsets recorded during emission stay valid.
//!
//! ## Passes
//!
//! Applied in this order at every recognised instruction:
//!
//! - **Redundant move** ([`PeepholeFlags::REDUNDANT_MOV`]): `mov r64, r64` with
//!   identical operands, and same-register `movaps`/`movapd`/`movdqa`/`movdqu`.
//!   `mov r32, r32` is kept: it clears the upper half.
//! - **Zero immediate** ([`PeepholeFlags::CONST_FOLD`]): `add/sub/or/xor r, 0`
//!   in the `83 ib` and `81 id` forms.
//! - **Move pair** ([`PeepholeFlags::INSN_COMBINE`]): the second half of
//!   `mov a, b; mov b, a`.
//! - **NOP compaction** ([`PeepholeFlags::NOP_COMPACT`]): runs of `0x90` become
//!   multi-byte NOPs of the same total length.
//!
//! The zero-immediate and move-pair passes change flags or skip a write only
//! where the result is unobservable, assuming flags are dead after an
//! arithmetic instruction with a zero operand.
//!
//! Unrecognised bytes advance the cursor by one; the pass never fails.

use core::ops::{BitOr, BitOrAssign};

use crate::buffer::NOP;

// ─── Flags ───────────────────────────────────────────────────────────────────

/// Bitmask of enabled passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PeepholeFlags(u32);

impl PeepholeFlags {
    /// No passes.
    pub const NONE: Self = Self(0);
    /// Remove `mov` to the same register.
    pub const REDUNDANT_MOV: Self = Self(0x1);
    /// Remove arithmetic with a zero immediate.
    pub const CONST_FOLD: Self = Self(0x2);
    /// Reserved for strength reduction; currently selects nothing.
    pub const STRENGTH_RED: Self = Self(0x4);
    /// Two-instruction combining.
    pub const INSN_COMBINE: Self = Self(0x8);
    /// Merge single-byte NOP runs into multi-byte NOPs.
    pub const NOP_COMPACT: Self = Self(0x10);
    /// Every pass.
    pub const ALL: Self = Self(0xFFFF);

    #[inline]
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    #[inline]
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// `true` if every bit of `other` is set in `self`.
    #[inline]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    #[inline]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl Default for PeepholeFlags {
    fn default() -> Self {
        Self::ALL
    }
}

impl BitOr for PeepholeFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for PeepholeFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

// ─── Length scanner ──────────────────────────────────────────────────────────

/// Opcode map an instruction lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpcodeMap {
    /// One-byte opcodes.
    Primary,
    /// `0F xx`.
    Secondary,
    /// `0F 38 xx`.
    Escape38,
    /// `0F 3A xx`.
    Escape3A,
}

/// Layout of one scanned instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InsnInfo {
    /// Total length in bytes.
    pub len: usize,
    /// Last legacy `66`/`F2`/`F3` prefix, if any.
    pub prefix: Option<u8>,
    /// REX byte, if any.
    pub rex: Option<u8>,
    /// VEX-encoded.
    pub vex: bool,
    pub map: OpcodeMap,
    pub opcode: u8,
    /// ModR/M byte, if the opcode takes one.
    pub modrm: Option<u8>,
    /// Offset of the immediate (equals `len` when there is none).
    pub imm_offset: usize,
}

impl InsnInfo {
    #[inline]
    fn rex_bits(&self) -> u8 {
        self.rex.unwrap_or(0)
    }

    /// `mod = 11` register-direct form.
    #[inline]
    fn is_register_direct(&self) -> bool {
        self.modrm.is_some_and(|m| m >> 6 == 0b11)
    }

    /// Full ModR/M.reg number including REX.R.
    fn reg(&self) -> u8 {
        let m = self.modrm.unwrap_or(0);
        (((self.rex_bits() >> 2) & 1) << 3) | ((m >> 3) & 7)
    }

    /// Full ModR/M.rm number including REX.B.
    fn rm(&self) -> u8 {
        let m = self.modrm.unwrap_or(0);
        ((self.rex_bits() & 1) << 3) | (m & 7)
    }
}

#[derive(Clone, Copy)]
enum Imm {
    None,
    B1,
    B2,
    B4,
    /// 16 with a `66` prefix, else 32.
    Z,
    /// `B8+r`: 64 with REX.W, 16 with `66`, else 32.
    V,
    /// `F6` group: imm8 only for `/0` and `/1` (TEST).
    F6,
    /// `F7` group: immz only for `/0` and `/1` (TEST).
    F7,
}

fn primary(op: u8) -> Option<(bool, Imm)> {
    Some(match op {
        0x00..=0x3F => match op & 7 {
            0..=3 => (true, Imm::None),
            4 => (false, Imm::B1),
            5 => (false, Imm::Z),
            _ => return None,
        },
        0x50..=0x5F | 0x90..=0x99 | 0xC3 | 0xC9 | 0xCC | 0xF4 | 0xF5 | 0xF8..=0xFD => {
            (false, Imm::None)
        }
        0x63 | 0x84..=0x8B | 0x8D | 0x8F | 0xD0..=0xD3 | 0xFE | 0xFF => (true, Imm::None),
        0x68 => (false, Imm::Z),
        0x69 | 0x81 | 0xC7 => (true, Imm::Z),
        0x6A | 0x70..=0x7F | 0xB0..=0xB7 | 0xCD | 0xE3 | 0xEB => (false, Imm::B1),
        0x6B | 0x80 | 0x83 | 0xC0 | 0xC1 | 0xC6 => (true, Imm::B1),
        0xB8..=0xBF => (false, Imm::V),
        0xC2 => (false, Imm::B2),
        0xE8 | 0xE9 => (false, Imm::B4),
        0xF6 => (true, Imm::F6),
        0xF7 => (true, Imm::F7),
        _ => return None,
    })
}

fn secondary(op: u8) -> Option<(bool, Imm)> {
    Some(match op {
        0x05 | 0x06 | 0x07 | 0x08 | 0x09 | 0x0B | 0x31 | 0x77 | 0xA2 | 0xC8..=0xCF => {
            (false, Imm::None)
        }
        0x80..=0x8F => (false, Imm::B4),
        0x70..=0x73 | 0xA4 | 0xAC | 0xBA | 0xC2 | 0xC4..=0xC6 => (true, Imm::B1),
        0x10..=0x1F
        | 0x28..=0x2F
        | 0x40..=0x6F
        | 0x74..=0x76
        | 0x78..=0x7F
        | 0x90..=0x9F
        | 0xA3
        | 0xA5
        | 0xAB
        | 0xAD..=0xAF
        | 0xB0..=0xB9
        | 0xBB..=0xBF
        | 0xC0
        | 0xC1
        | 0xC3
        | 0xC7
        | 0xD0..=0xFF => (true, Imm::None),
        _ => return None,
    })
}

/// Bytes taken by ModR/M, SIB, and displacement starting at `at`.
fn modrm_len(code: &[u8], at: usize) -> Option<usize> {
    let m = *code.get(at)?;
    let md = m >> 6;
    let rm = m & 7;
    if md == 0b11 {
        return Some(1);
    }
    let mut n = 1;
    if rm == 0b100 {
        let sib = *code.get(at + 1)?;
        n += 1;
        if md == 0b00 && sib & 7 == 0b101 {
            n += 4;
        }
    } else if md == 0b00 && rm == 0b101 {
        n += 4;
    }
    n += match md {
        0b01 => 1,
        0b10 => 4,
        _ => 0,
    };
    Some(n)
}

/// Measure the instruction at the start of `code`.
///
/// Covers legacy `66`/`F2`/`F3` prefixes, REX, 2- and 3-byte VEX, the
/// `0F`/`0F 38`/`0F 3A` maps, ModR/M with SIB and displacement, and the
/// immediate sizes of every form this crate emits. Returns `None` for
/// anything else, or if the instruction would run past the end of `code`.
pub fn scan(code: &[u8]) -> Option<InsnInfo> {
    let mut i = 0;
    let mut prefix = None;
    while let Some(&b @ (0x66 | 0xF2 | 0xF3)) = code.get(i) {
        prefix = Some(b);
        i += 1;
        if i > 4 {
            return None;
        }
    }

    let mut rex = None;
    let mut vex = false;
    let map = match *code.get(i)? {
        0xC5 => {
            code.get(i + 1)?;
            vex = true;
            i += 2;
            OpcodeMap::Secondary
        }
        0xC4 => {
            let b1 = *code.get(i + 1)?;
            code.get(i + 2)?;
            vex = true;
            i += 3;
            match b1 & 0x1F {
                1 => OpcodeMap::Secondary,
                2 => OpcodeMap::Escape38,
                3 => OpcodeMap::Escape3A,
                _ => return None,
            }
        }
        _ => {
            if let Some(&b @ 0x40..=0x4F) = code.get(i) {
                rex = Some(b);
                i += 1;
            }
            match (code.get(i), code.get(i + 1)) {
                (Some(0x0F), Some(0x38)) => {
                    i += 2;
                    OpcodeMap::Escape38
                }
                (Some(0x0F), Some(0x3A)) => {
                    i += 2;
                    OpcodeMap::Escape3A
                }
                (Some(0x0F), _) => {
                    i += 1;
                    OpcodeMap::Secondary
                }
                _ => OpcodeMap::Primary,
            }
        }
    };
    if vex && prefix.is_some() {
        return None;
    }

    let opcode = *code.get(i)?;
    i += 1;
    let (has_modrm, imm) = match map {
        OpcodeMap::Primary => primary(opcode)?,
        OpcodeMap::Secondary => secondary(opcode)?,
        OpcodeMap::Escape38 => (true, Imm::None),
        OpcodeMap::Escape3A => (true, Imm::B1),
    };

    let modrm = if has_modrm {
        let m = *code.get(i)?;
        i += modrm_len(code, i)?;
        Some(m)
    } else {
        None
    };

    let rex_w = rex.is_some_and(|r| r & 0x08 != 0);
    let osize16 = prefix == Some(0x66);
    let digit = modrm.map_or(0, |m| (m >> 3) & 7);
    let imm_len = match imm {
        Imm::None => 0,
        Imm::B1 => 1,
        Imm::B2 => 2,
        Imm::B4 => 4,
        Imm::Z if osize16 => 2,
        Imm::Z => 4,
        Imm::V if rex_w => 8,
        Imm::V if osize16 => 2,
        Imm::V => 4,
        Imm::F6 if digit <= 1 => 1,
        Imm::F7 if digit <= 1 && osize16 => 2,
        Imm::F7 if digit <= 1 => 4,
        Imm::F6 | Imm::F7 => 0,
    };

    let imm_offset = i;
    let len = i + imm_len;
    if len > code.len() {
        return None;
    }
    Some(InsnInfo {
        len,
        prefix,
        rex,
        vex,
        map,
        opcode,
        modrm,
        imm_offset,
    })
}

/// Length of the instruction at the start of `code`, or `None` if unrecognised.
#[inline]
pub fn insn_len(code: &[u8]) -> Option<usize> {
    scan(code).map(|info| info.len)
}

// ─── Pattern predicates ──────────────────────────────────────────────────────

/// Destination and source of a register-to-register move, if `info` is one.
fn move_operands(info: &InsnInfo) -> Option<(u8, u8)> {
    if info.vex || !info.is_register_direct() {
        return None;
    }
    match (info.map, info.opcode, info.prefix) {
        // 64-bit only: the 32-bit form zero-extends.
        (OpcodeMap::Primary, 0x89, None) if info.rex_bits() & 0x08 != 0 => {
            Some((info.rm(), info.reg()))
        }
        (OpcodeMap::Primary, 0x8B, None) if info.rex_bits() & 0x08 != 0 => {
            Some((info.reg(), info.rm()))
        }
        _ => None,
    }
}

fn is_redundant_move(info: &InsnInfo) -> bool {
    if let Some((dst, src)) = move_operands(info) {
        return dst == src;
    }
    if info.vex || !info.is_register_direct() || info.reg() != info.rm() {
        return false;
    }
    matches!(
        (info.map, info.opcode, info.prefix),
        (OpcodeMap::Secondary, 0x28 | 0x29 | 0x10 | 0x11, None | Some(0x66))
            | (OpcodeMap::Secondary, 0x6F | 0x7F, Some(0x66 | 0xF3))
    )
}

fn is_zero_immediate(code: &[u8], info: &InsnInfo) -> bool {
    if info.map != OpcodeMap::Primary || info.prefix.is_some() || !info.is_register_direct() {
        return false;
    }
    // ADD /0, OR /1, SUB /5, XOR /6.
    if !matches!(info.modrm.map(|m| (m >> 3) & 7), Some(0 | 1 | 5 | 6)) {
        return false;
    }
    let imm = &code[info.imm_offset..info.len];
    match info.opcode {
        0x83 | 0x81 => imm.iter().all(|&b| b == 0),
        _ => false,
    }
}

// ─── Multi-byte NOPs ─────────────────────────────────────────────────────────

/// Recommended NOP encodings, indexed by length.
const LONG_NOPS: [&[u8]; 10] = [
    &[],
    &[0x90],
    &[0x66, 0x90],
    &[0x0F, 0x1F, 0x00],
    &[0x0F, 0x1F, 0x40, 0x00],
    &[0x0F, 0x1F, 0x44, 0x00, 0x00],
    &[0x66, 0x0F, 0x1F, 0x44, 0x00, 0x00],
    &[0x0F, 0x1F, 0x80, 0x00, 0x00, 0x00, 0x00],
    &[0x0F, 0x1F, 0x84, 0x00, 0x00, 0x00, 0x00, 0x00],
    &[0x66, 0x0F, 0x1F, 0x84, 0x00, 0x00, 0x00, 0x00, 0x00],
];

const MAX_NOP: usize = LONG_NOPS.len() - 1;

// ─── Context ─────────────────────────────────────────────────────────────────

/// Counters reported by a pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PeepholeStats {
    /// Bytes rewritten.
    pub bytes_optimized: usize,
    /// Instructions the scanner recognised.
    pub instructions_seen: usize,
    /// Individual rewrites performed.
    pub optimizations_done: usize,
}

/// Cursor over one finished code range.
#[derive(Debug)]
pub struct PeepholeContext<'a> {
    code: &'a mut [u8],
    start: usize,
    current: usize,
    end: usize,
    flags: PeepholeFlags,
    /// Offsets that must stay instruction boundaries (local branch targets).
    protected: &'a [usize],
    stats: PeepholeStats,
}

impl<'a> PeepholeContext<'a> {
    /// Cover all of `code`.
    pub fn new(code: &'a mut [u8], flags: PeepholeFlags) -> Self {
        let end = code.len();
        Self::with_range(code, 0, end, flags)
    }

    /// Cover `code[start..end]`, clamped to the slice.
    pub fn with_range(code: &'a mut [u8], start: usize, end: usize, flags: PeepholeFlags) -> Self {
        let end = end.min(code.len());
        let start = start.min(end);
        Self {
            code,
            start,
            current: start,
            end,
            flags,
            protected: &[],
            stats: PeepholeStats::default(),
        }
    }

    /// Keep each of `offsets` an instruction boundary. Required when code
    /// inside the range branches to a point inside the range.
    #[must_use]
    pub fn protect(mut self, offsets: &'a [usize]) -> Self {
        self.protected = offsets;
        self
    }

    /// Start of the covered range.
    #[inline]
    pub fn start(&self) -> usize {
        self.start
    }

    /// Cursor position.
    #[inline]
    pub fn position(&self) -> usize {
        self.current
    }

    /// End of the covered range.
    #[inline]
    pub fn end(&self) -> usize {
        self.end
    }

    /// Counters so far.
    #[inline]
    pub fn stats(&self) -> PeepholeStats {
        self.stats
    }

    /// Run every enabled pass over the range in a single forward sweep.
    pub fn run(&mut self) -> PeepholeStats {
        if self.flags.is_empty() {
            return self.stats;
        }
        let compact = self.flags.contains(PeepholeFlags::NOP_COMPACT);
        while self.current < self.end {
            let Some(info) = scan(&self.code[self.current..self.end]) else {
                self.current += 1;
                continue;
            };
            self.stats.instructions_seen += 1;
            let rewritten = self.rewrite(&info);
            if compact && (rewritten || self.code[self.current] == NOP) {
                self.current += self.compact_nops();
            } else {
                self.current += info.len;
            }
        }
        log::trace!(
            "peephole: {} insns, {} rewrites, {} bytes",
            self.stats.instructions_seen,
            self.stats.optimizations_done,
            self.stats.bytes_optimized
        );
        self.stats
    }

    /// Apply the rewrite passes to the instruction at the cursor. Returns
    /// `true` if that instruction became NOPs.
    fn rewrite(&mut self, info: &InsnInfo) -> bool {
        let at = self.current;
        if self.flags.contains(PeepholeFlags::REDUNDANT_MOV) && is_redundant_move(info) {
            self.nop_out(at, info.len);
            return true;
        }
        if self.flags.contains(PeepholeFlags::CONST_FOLD)
            && is_zero_immediate(&self.code[at..self.end], info)
        {
            self.nop_out(at, info.len);
            return true;
        }
        if self.flags.contains(PeepholeFlags::INSN_COMBINE) {
            self.combine_move_pair(info);
        }
        false
    }

    /// `mov a, b; mov b, a`: the second move is a no-op.
    fn combine_move_pair(&mut self, first: &InsnInfo) {
        let Some((dst, src)) = move_operands(first) else {
            return;
        };
        let next = self.current + first.len;
        if next >= self.end || self.is_protected(next) {
            return;
        }
        let Some(second) = scan(&self.code[next..self.end]) else {
            return;
        };
        if move_operands(&second) == Some((src, dst)) {
            self.nop_out(next, second.len);
        }
    }

    /// Merge the run of `0x90` at the cursor. Returns the run length.
    fn compact_nops(&mut self) -> usize {
        let at = self.current;
        let mut run = 0;
        while at + run < self.end && self.code[at + run] == NOP {
            if run > 0 && self.is_protected(at + run) {
                break;
            }
            run += 1;
        }
        if run < 2 {
            return run.max(1);
        }
        let mut pos = at;
        let mut left = run;
        while left > 0 {
            let n = left.min(MAX_NOP);
            self.code[pos..pos + n].copy_from_slice(LONG_NOPS[n]);
            pos += n;
            left -= n;
        }
        self.stats.bytes_optimized += run;
        self.stats.optimizations_done += 1;
        run
    }

    fn nop_out(&mut self, at: usize, len: usize) {
        self.code[at..at + len].fill(NOP);
        self.stats.bytes_optimized += len;
        self.stats.optimizations_done += 1;
    }

    fn is_protected(&self, offset: usize) -> bool {
        self.protected.contains(&offset)
    }
}

/// Optimize all of `code` with `flags`.
pub fn optimize(code: &mut [u8], flags: PeepholeFlags) -> PeepholeStats {
    PeepholeContext::new(code, flags).run()
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    #[test]
    fn mov_rax_rax_becomes_nops() {
        let mut code = vec![0x48, 0x89, 0xC0];
        let stats = optimize(&mut code, PeepholeFlags::REDUNDANT_MOV);
        assert_eq!(code, [0x90, 0x90, 0x90]);
        assert_eq!(stats.bytes_optimized, 3);
        assert_eq!(stats.optimizations_done, 1);
    }

    #[test]
    fn mov_rax_rbx_untouched() {
        let mut code = vec![0x48, 0x89, 0xD8];
        let stats = optimize(&mut code, PeepholeFlags::ALL);
        assert_eq!(code, [0x48, 0x89, 0xD8]);
        assert_eq!(stats.bytes_optimized, 0);
    }

    #[test]
    fn mov_r32_same_register_is_kept() {
        // mov eax, eax clears the upper half of rax
        let mut code = vec![0x89, 0xC0];
        optimize(&mut code, PeepholeFlags::ALL);
        assert_eq!(code, [0x89, 0xC0]);
    }

    #[test]
    fn extended_registers_compare_with_rex() {
        // mov r8, r8 vs mov r8, rax
        let mut same = vec![0x4D, 0x89, 0xC0];
        let mut diff = vec![0x49, 0x89, 0xC0];
        optimize(&mut same, PeepholeFlags::REDUNDANT_MOV);
        optimize(&mut diff, PeepholeFlags::REDUNDANT_MOV);
        assert_eq!(same, [0x90; 3]);
        assert_eq!(diff, [0x49, 0x89, 0xC0]);
    }

    #[test]
    fn add_zero_becomes_nops() {
        let mut code = vec![0x83, 0xC0, 0x00];
        let stats = optimize(&mut code, PeepholeFlags::CONST_FOLD);
        assert_eq!(code, [0x90, 0x90, 0x90]);
        assert_eq!(stats.bytes_optimized, 3);
    }

    #[test]
    fn add_five_untouched() {
        let mut code = vec![0x83, 0xC0, 0x05];
        optimize(&mut code, PeepholeFlags::ALL);
        assert_eq!(code, [0x83, 0xC0, 0x05]);
    }

    #[test]
    fn zero_immediate_variants() {
        // sub rcx, 0 ; xor edx, 0 ; add rax, imm32 0
        let mut code = vec![
            0x48, 0x83, 0xE9, 0x00, //
            0x83, 0xF2, 0x00, //
            0x48, 0x81, 0xC0, 0x00, 0x00, 0x00, 0x00,
        ];
        let stats = optimize(&mut code, PeepholeFlags::CONST_FOLD);
        assert!(code.iter().all(|&b| b == NOP));
        assert_eq!(stats.optimizations_done, 3);
        // cmp rax, 0 sets flags that matter
        let mut cmp = vec![0x48, 0x83, 0xF8, 0x00];
        optimize(&mut cmp, PeepholeFlags::CONST_FOLD);
        assert_eq!(cmp, [0x48, 0x83, 0xF8, 0x00]);
    }

    #[test]
    fn move_pair_second_half_removed() {
        // mov rax, rbx ; mov rbx, rax
        let mut code = vec![0x48, 0x89, 0xD8, 0x48, 0x89, 0xC3];
        optimize(&mut code, PeepholeFlags::INSN_COMBINE);
        assert_eq!(code, [0x48, 0x89, 0xD8, 0x90, 0x90, 0x90]);
    }

    #[test]
    fn move_pair_respects_protected_offset() {
        let mut code = vec![0x48, 0x89, 0xD8, 0x48, 0x89, 0xC3];
        let protected = [3usize];
        PeepholeContext::new(&mut code, PeepholeFlags::INSN_COMBINE)
            .protect(&protected)
            .run();
        assert_eq!(code, [0x48, 0x89, 0xD8, 0x48, 0x89, 0xC3]);
    }

    #[test]
    fn nop_runs_compact() {
        let mut code = vec![0x90; 12];
        let stats = optimize(&mut code, PeepholeFlags::NOP_COMPACT);
        assert_eq!(&code[..9], LONG_NOPS[9]);
        assert_eq!(&code[9..], LONG_NOPS[3]);
        assert_eq!(stats.bytes_optimized, 12);
        // still 12 bytes of NOPs by instruction count
        let mut pos = 0;
        let mut count = 0;
        while pos < code.len() {
            pos += insn_len(&code[pos..]).unwrap();
            count += 1;
        }
        assert_eq!(pos, 12);
        assert_eq!(count, 2);
    }

    #[test]
    fn compaction_stops_at_protected_offset() {
        let mut code = vec![0x90; 6];
        let protected = [4usize];
        PeepholeContext::new(&mut code, PeepholeFlags::NOP_COMPACT)
            .protect(&protected)
            .run();
        assert_eq!(&code[..4], LONG_NOPS[4]);
        assert_eq!(&code[4..], LONG_NOPS[2]);
    }

    #[test]
    fn second_run_is_idempotent() {
        let mut code = vec![
            0x48, 0x89, 0xC0, // mov rax, rax
            0x90, // nop
            0x83, 0xC1, 0x00, // add ecx, 0
            0x48, 0x89, 0xD8, 0x48, 0x89, 0xC3, // mov pair
            0x48, 0x01, 0xD8, // add rax, rbx
        ];
        let first = optimize(&mut code, PeepholeFlags::ALL);
        assert!(first.bytes_optimized > 0);
        let snapshot = code.clone();
        let second = optimize(&mut code, PeepholeFlags::ALL);
        assert_eq!(second.bytes_optimized, 0);
        assert_eq!(code, snapshot);
    }

    #[test]
    fn unknown_bytes_advance_one_at_a_time() {
        // 0x06 is invalid in 64-bit mode
        let mut code = vec![0x06, 0x06, 0x48, 0x89, 0xC0];
        let stats = optimize(&mut code, PeepholeFlags::REDUNDANT_MOV);
        assert_eq!(&code[2..], [0x90; 3]);
        assert_eq!(stats.instructions_seen, 1);
    }

    #[test]
    fn scanner_lengths() {
        assert_eq!(insn_len(&[0x90]), Some(1));
        assert_eq!(insn_len(&[0xC3]), Some(1));
        assert_eq!(insn_len(&[0xE9, 0, 0, 0, 0]), Some(5));
        assert_eq!(insn_len(&[0x0F, 0x84, 0, 0, 0, 0]), Some(6));
        assert_eq!(insn_len(&[0xE3, 0x08]), Some(2));
        assert_eq!(insn_len(&[0xF5]), Some(1));
        // mov rax, imm64
        assert_eq!(insn_len(&[0x48, 0xB8, 1, 2, 3, 4, 5, 6, 7, 8]), Some(10));
        // mov eax, imm32
        assert_eq!(insn_len(&[0xB8, 1, 2, 3, 4]), Some(5));
        // mov rax, [rsp+8]
        assert_eq!(insn_len(&[0x48, 0x8B, 0x44, 0x24, 0x08]), Some(5));
        // mov rdx, [rbx+0x1000]
        assert_eq!(insn_len(&[0x48, 0x8B, 0x93, 0, 0x10, 0, 0]), Some(7));
        // addsd xmm0, xmm1
        assert_eq!(insn_len(&[0xF2, 0x0F, 0x58, 0xC1]), Some(4));
        // pshufb xmm0, xmm1
        assert_eq!(insn_len(&[0x66, 0x0F, 0x38, 0x00, 0xC1]), Some(5));
        // palignr xmm0, xmm1, 4
        assert_eq!(insn_len(&[0x66, 0x0F, 0x3A, 0x0F, 0xC1, 0x04]), Some(6));
        // vpaddd xmm0, xmm1, xmm2
        assert_eq!(insn_len(&[0xC5, 0xF1, 0xFE, 0xC2]), Some(4));
        // vpcmpeqq xmm0, xmm1, xmm2
        assert_eq!(insn_len(&[0xC4, 0xE2, 0x71, 0x29, 0xC2]), Some(5));
        // test eax, imm32 via F7 /0
        assert_eq!(insn_len(&[0xF7, 0xC0, 1, 0, 0, 0]), Some(6));
        // neg rax: F7 /3 has no immediate
        assert_eq!(insn_len(&[0x48, 0xF7, 0xD8]), Some(3));
        // psrldq xmm0, 8
        assert_eq!(insn_len(&[0x66, 0x0F, 0x73, 0xD8, 0x08]), Some(5));
        for (n, nop) in LONG_NOPS.iter().enumerate().skip(1) {
            assert_eq!(insn_len(nop), Some(n));
        }
    }

    #[test]
    fn scanner_rejects_truncated() {
        assert_eq!(insn_len(&[0xE9, 0, 0]), None);
        assert_eq!(insn_len(&[0x48]), None);
        assert_eq!(insn_len(&[]), None);
        assert_eq!(insn_len(&[0x48, 0x8B, 0x44]), None);
    }

    #[test]
    fn flags_compose() {
        let f = PeepholeFlags::REDUNDANT_MOV | PeepholeFlags::CONST_FOLD;
        assert_eq!(f.bits(), 0x3);
        assert!(f.contains(PeepholeFlags::CONST_FOLD));
        assert!(!f.contains(PeepholeFlags::NOP_COMPACT));
        assert!(PeepholeFlags::ALL.contains(f));
        assert!(PeepholeFlags::NONE.is_empty());
    }

    #[test]
    fn empty_flags_touch_nothing() {
        let mut code = vec![0x48, 0x89, 0xC0, 0x90, 0x90];
        let stats = optimize(&mut code, PeepholeFlags::NONE);
        assert_eq!(code, [0x48, 0x89, 0xC0, 0x90, 0x90]);
        assert_eq!(stats, PeepholeStats::default());
    }

    #[test]
    fn range_is_respected() {
        let mut code = vec![0x48, 0x89, 0xC0, 0x48, 0x89, 0xC0];
        let stats = PeepholeContext::with_range(&mut code, 3, 6, PeepholeFlags::REDUNDANT_MOV).run();
        assert_eq!(code, [0x48, 0x89, 0xC0, 0x90, 0x90, 0x90]);
        assert_eq!(stats.optimizations_done, 1);
    }
}
