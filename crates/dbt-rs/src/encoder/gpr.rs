//! General-purpose register encoders.
//!
//! Register operands are host register numbers 0–15 in x86 encoding order
//! (`RAX`=0 … `R15`=15). All `reg, reg` forms use register-direct ModR/M
//! with the *source* in the `reg` field and the *destination* in `r/m`
//! (the `01`/`09`/`29`/`89`… "MR" opcodes), so `MOV RAX, RBX` is `48 89 D8`.

use super::{emit_rm, emit_rr, emit_rr_ib, instr_rm, instr_rr, InstrBytes, Mem, Op, Width};
use crate::buffer::CodeBuffer;
use crate::regmap::HostCondition;

// ─── ALU ─────────────────────────────────────────────────────────────────────

/// The eight classic two-operand ALU operations.
///
/// The discriminant is the `/digit` of the `81`/`83` immediate group; the
/// register form opcode is `digit * 8 + 1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum AluOp {
    Add = 0,
    Or = 1,
    Adc = 2,
    Sbb = 3,
    And = 4,
    Sub = 5,
    Xor = 6,
    Cmp = 7,
}

impl AluOp {
    #[inline]
    const fn digit(self) -> u8 {
        self as u8
    }

    /// `op r/m, r` opcode.
    #[inline]
    pub const fn rr_opcode(self) -> u8 {
        (self as u8) << 3 | 0x01
    }

    /// Whether `a op b == b op a`.
    #[inline]
    pub const fn is_commutative(self) -> bool {
        matches!(self, AluOp::Add | AluOp::Or | AluOp::And | AluOp::Xor)
    }
}

/// `op dst, src` at the given width.
pub fn emit_alu_rr(buf: &mut CodeBuffer<'_>, op: AluOp, width: Width, dst: u8, src: u8) {
    emit_rr(buf, Op::new(&[op.rr_opcode()]).w(width.rex_w()), src, dst);
}

/// `op dst, imm`; uses the sign-extended `83 /digit ib` form when `imm` fits.
pub fn emit_alu_ri(buf: &mut CodeBuffer<'_>, op: AluOp, width: Width, dst: u8, imm: i32) {
    let w = width.rex_w();
    if let Ok(imm8) = i8::try_from(imm) {
        emit_rr_ib(buf, Op::new(&[0x83]).w(w), op.digit(), dst, imm8 as u8);
    } else {
        let mut ib = instr_rr(Op::new(&[0x81]).w(w), op.digit(), dst);
        ib.extend_from_slice(&imm.to_le_bytes());
        ib.emit(buf);
    }
}

/// `ADD dst, src` (64-bit).
pub fn emit_add_reg_reg(buf: &mut CodeBuffer<'_>, dst: u8, src: u8) {
    emit_alu_rr(buf, AluOp::Add, Width::W64, dst, src);
}

/// `SUB dst, src` (64-bit).
pub fn emit_sub_reg_reg(buf: &mut CodeBuffer<'_>, dst: u8, src: u8) {
    emit_alu_rr(buf, AluOp::Sub, Width::W64, dst, src);
}

/// `AND dst, src` (64-bit).
pub fn emit_and_reg_reg(buf: &mut CodeBuffer<'_>, dst: u8, src: u8) {
    emit_alu_rr(buf, AluOp::And, Width::W64, dst, src);
}

/// `OR dst, src` (64-bit).
pub fn emit_or_reg_reg(buf: &mut CodeBuffer<'_>, dst: u8, src: u8) {
    emit_alu_rr(buf, AluOp::Or, Width::W64, dst, src);
}

/// `XOR dst, src` (64-bit).
pub fn emit_xor_reg_reg(buf: &mut CodeBuffer<'_>, dst: u8, src: u8) {
    emit_alu_rr(buf, AluOp::Xor, Width::W64, dst, src);
}

/// `CMP dst, src` (64-bit).
pub fn emit_cmp_reg_reg(buf: &mut CodeBuffer<'_>, dst: u8, src: u8) {
    emit_alu_rr(buf, AluOp::Cmp, Width::W64, dst, src);
}

/// `ADD dst, imm32` (64-bit).
pub fn emit_add_reg_imm32(buf: &mut CodeBuffer<'_>, dst: u8, imm: i32) {
    emit_alu_ri(buf, AluOp::Add, Width::W64, dst, imm);
}

/// `SUB dst, imm32` (64-bit).
pub fn emit_sub_reg_imm32(buf: &mut CodeBuffer<'_>, dst: u8, imm: i32) {
    emit_alu_ri(buf, AluOp::Sub, Width::W64, dst, imm);
}

/// `CMP dst, imm32` (64-bit).
pub fn emit_cmp_reg_imm32(buf: &mut CodeBuffer<'_>, dst: u8, imm: i32) {
    emit_alu_ri(buf, AluOp::Cmp, Width::W64, dst, imm);
}

/// `TEST a, b`.
pub fn emit_test_rr(buf: &mut CodeBuffer<'_>, width: Width, a: u8, b: u8) {
    emit_rr(buf, Op::new(&[0x85]).w(width.rex_w()), b, a);
}

/// `TEST a, b` (64-bit).
pub fn emit_test_reg_reg(buf: &mut CodeBuffer<'_>, a: u8, b: u8) {
    emit_test_rr(buf, Width::W64, a, b);
}

/// `TEST dst, imm32` (`F7 /0 id`).
pub fn emit_test_ri(buf: &mut CodeBuffer<'_>, width: Width, dst: u8, imm: i32) {
    let mut ib = instr_rr(Op::new(&[0xF7]).w(width.rex_w()), 0, dst);
    ib.extend_from_slice(&imm.to_le_bytes());
    ib.emit(buf);
}

// ─── Unary group 3 ───────────────────────────────────────────────────────────

/// `NOT dst` (`F7 /2`).
pub fn emit_not(buf: &mut CodeBuffer<'_>, width: Width, dst: u8) {
    emit_rr(buf, Op::new(&[0xF7]).w(width.rex_w()), 2, dst);
}

/// `NEG dst` (`F7 /3`).
pub fn emit_neg(buf: &mut CodeBuffer<'_>, width: Width, dst: u8) {
    emit_rr(buf, Op::new(&[0xF7]).w(width.rex_w()), 3, dst);
}

/// `MUL src` (`F7 /4`): `RDX:RAX = RAX * src`, unsigned.
pub fn emit_mul(buf: &mut CodeBuffer<'_>, width: Width, src: u8) {
    emit_rr(buf, Op::new(&[0xF7]).w(width.rex_w()), 4, src);
}

/// `IMUL src` (`F7 /5`): `RDX:RAX = RAX * src`, signed.
pub fn emit_imul1(buf: &mut CodeBuffer<'_>, width: Width, src: u8) {
    emit_rr(buf, Op::new(&[0xF7]).w(width.rex_w()), 5, src);
}

/// `DIV src` (`F7 /6`), unsigned `RDX:RAX / src`.
pub fn emit_div(buf: &mut CodeBuffer<'_>, width: Width, src: u8) {
    emit_rr(buf, Op::new(&[0xF7]).w(width.rex_w()), 6, src);
}

/// `IDIV src` (`F7 /7`), signed `RDX:RAX / src`.
pub fn emit_idiv(buf: &mut CodeBuffer<'_>, width: Width, src: u8) {
    emit_rr(buf, Op::new(&[0xF7]).w(width.rex_w()), 7, src);
}

/// `IMUL dst, src` (`0F AF /r`): truncated signed multiply.
pub fn emit_imul_rr(buf: &mut CodeBuffer<'_>, width: Width, dst: u8, src: u8) {
    emit_rr(buf, Op::new(&[0x0F, 0xAF]).w(width.rex_w()), dst, src);
}

/// `CQO` (`48 99`): sign-extend `RAX` into `RDX`.
pub fn emit_cqo(buf: &mut CodeBuffer<'_>) {
    buf.emit_bytes(&[0x48, 0x99]);
}

/// `CDQ` (`99`): sign-extend `EAX` into `EDX`.
pub fn emit_cdq(buf: &mut CodeBuffer<'_>) {
    buf.emit_byte(0x99);
}

// ─── Moves ───────────────────────────────────────────────────────────────────

/// `MOV dst, src` (`89 /r`).
pub fn emit_mov_rr(buf: &mut CodeBuffer<'_>, width: Width, dst: u8, src: u8) {
    emit_rr(buf, Op::new(&[0x89]).w(width.rex_w()), src, dst);
}

/// `MOV dst, src` (64-bit).
pub fn emit_mov_reg_reg(buf: &mut CodeBuffer<'_>, dst: u8, src: u8) {
    emit_mov_rr(buf, Width::W64, dst, src);
}

/// `MOV dst, imm64` (`REX.W B8+r io`).
pub fn emit_mov_reg_imm64(buf: &mut CodeBuffer<'_>, dst: u8, imm: u64) {
    let mut ib = InstrBytes::new();
    ib.push(super::rex(true, false, false, dst >= 8));
    ib.push(0xB8 + (dst & 7));
    ib.extend_from_slice(&imm.to_le_bytes());
    ib.emit(buf);
}

/// `MOV r32, imm32` (`B8+r id`); the upper 32 bits are cleared.
pub fn emit_mov_reg_imm32(buf: &mut CodeBuffer<'_>, dst: u8, imm: u32) {
    let mut ib = InstrBytes::new();
    if dst >= 8 {
        ib.push(0x41);
    }
    ib.push(0xB8 + (dst & 7));
    ib.extend_from_slice(&imm.to_le_bytes());
    ib.emit(buf);
}

/// `MOV r16, imm16` (`66 B8+r iw`). Bits 16–63 of `dst` are preserved.
pub fn emit_mov_reg_imm16(buf: &mut CodeBuffer<'_>, dst: u8, imm: u16) {
    let mut ib = InstrBytes::new();
    ib.push(0x66);
    if dst >= 8 {
        ib.push(0x41);
    }
    ib.push(0xB8 + (dst & 7));
    ib.extend_from_slice(&imm.to_le_bytes());
    ib.emit(buf);
}

/// `MOV r64, simm32` (`REX.W C7 /0 id`), sign-extended.
pub fn emit_mov_reg_simm32(buf: &mut CodeBuffer<'_>, dst: u8, imm: i32) {
    let mut ib = instr_rr(Op::new(&[0xC7]).w(true), 0, dst);
    ib.extend_from_slice(&imm.to_le_bytes());
    ib.emit(buf);
}

/// Load a 64-bit constant with the shortest encoding.
///
/// `0` becomes `XOR r32, r32` (flags are clobbered), values up to
/// `u32::MAX` use `MOV r32, imm32`, negative values fitting `i32` use the
/// sign-extended form, everything else `MOV r64, imm64`.
pub fn emit_load_imm(buf: &mut CodeBuffer<'_>, dst: u8, imm: u64) {
    if imm == 0 {
        emit_alu_rr(buf, AluOp::Xor, Width::W32, dst, dst);
    } else if let Ok(v) = u32::try_from(imm) {
        emit_mov_reg_imm32(buf, dst, v);
    } else if let Ok(v) = i32::try_from(imm as i64) {
        emit_mov_reg_simm32(buf, dst, v);
    } else {
        emit_mov_reg_imm64(buf, dst, imm);
    }
}

/// Load a constant without touching flags (never uses the `XOR` idiom).
pub fn emit_load_imm_keep_flags(buf: &mut CodeBuffer<'_>, dst: u8, imm: u64) {
    if let Ok(v) = u32::try_from(imm) {
        emit_mov_reg_imm32(buf, dst, v);
    } else if let Ok(v) = i32::try_from(imm as i64) {
        emit_mov_reg_simm32(buf, dst, v);
    } else {
        emit_mov_reg_imm64(buf, dst, imm);
    }
}

/// `MOV dst, [base + disp]` (`8B /r`).
pub fn emit_mov_load(buf: &mut CodeBuffer<'_>, width: Width, dst: u8, mem: Mem) {
    emit_rm(buf, Op::new(&[0x8B]).w(width.rex_w()), dst, mem);
}

/// `MOV dst, [base + disp]` (64-bit).
pub fn emit_mov_reg_mem(buf: &mut CodeBuffer<'_>, dst: u8, base: u8, disp: i32) {
    emit_mov_load(buf, Width::W64, dst, Mem::new(base, disp));
}

/// `MOV [base + disp], src` (`89 /r`).
pub fn emit_mov_store(buf: &mut CodeBuffer<'_>, width: Width, mem: Mem, src: u8) {
    emit_rm(buf, Op::new(&[0x89]).w(width.rex_w()), src, mem);
}

/// `MOV [base + disp], src` (64-bit).
pub fn emit_mov_mem_reg(buf: &mut CodeBuffer<'_>, base: u8, src: u8, disp: i32) {
    emit_mov_store(buf, Width::W64, Mem::new(base, disp), src);
}

/// `MOV [base + disp], src8` (`88 /r`).
pub fn emit_mov_store8(buf: &mut CodeBuffer<'_>, mem: Mem, src: u8) {
    emit_rm(buf, Op::new(&[0x88]).bytes(), src, mem);
}

/// `MOV [base + disp], src16` (`66 89 /r`).
pub fn emit_mov_store16(buf: &mut CodeBuffer<'_>, mem: Mem, src: u8) {
    emit_rm(buf, Op::new(&[0x89]).prefix(0x66), src, mem);
}

/// `MOV [mem], imm` storing `size` bytes (`C6 /0 ib`, `66 C7 /0 iw`,
/// `C7 /0 id`, `REX.W C7 /0 id`). Other sizes emit nothing.
pub fn emit_mov_store_imm(buf: &mut CodeBuffer<'_>, size: u8, mem: Mem, imm: i32) {
    let (op, imm_bytes) = match size {
        1 => (Op::new(&[0xC6]), 1),
        2 => (Op::new(&[0xC7]).prefix(0x66), 2),
        4 => (Op::new(&[0xC7]), 4),
        8 => (Op::new(&[0xC7]).w(true), 4),
        _ => return,
    };
    let mut ib = instr_rm(op, 0, mem);
    ib.extend_from_slice(&imm.to_le_bytes()[..imm_bytes]);
    ib.emit(buf);
}

/// `MOVZX r32, byte [mem]` (`0F B6 /r`).
pub fn emit_movzx8_load(buf: &mut CodeBuffer<'_>, dst: u8, mem: Mem) {
    emit_rm(buf, Op::new(&[0x0F, 0xB6]), dst, mem);
}

/// `MOVZX r32, word [mem]` (`0F B7 /r`).
pub fn emit_movzx16_load(buf: &mut CodeBuffer<'_>, dst: u8, mem: Mem) {
    emit_rm(buf, Op::new(&[0x0F, 0xB7]), dst, mem);
}

/// `MOVSX dst, byte [mem]` (`0F BE /r`).
pub fn emit_movsx8_load(buf: &mut CodeBuffer<'_>, width: Width, dst: u8, mem: Mem) {
    emit_rm(buf, Op::new(&[0x0F, 0xBE]).w(width.rex_w()), dst, mem);
}

/// `MOVSX dst, word [mem]` (`0F BF /r`).
pub fn emit_movsx16_load(buf: &mut CodeBuffer<'_>, width: Width, dst: u8, mem: Mem) {
    emit_rm(buf, Op::new(&[0x0F, 0xBF]).w(width.rex_w()), dst, mem);
}

/// `MOVSXD r64, dword [mem]` (`REX.W 63 /r`).
pub fn emit_movsxd_load(buf: &mut CodeBuffer<'_>, dst: u8, mem: Mem) {
    emit_rm(buf, Op::new(&[0x63]).w(true), dst, mem);
}

/// `MOVZX r32, r8` (`0F B6 /r`).
pub fn emit_movzx8_rr(buf: &mut CodeBuffer<'_>, dst: u8, src: u8) {
    emit_rr(buf, Op::new(&[0x0F, 0xB6]).bytes(), dst, src);
}

/// `MOVZX r32, r16` (`0F B7 /r`).
pub fn emit_movzx16_rr(buf: &mut CodeBuffer<'_>, dst: u8, src: u8) {
    emit_rr(buf, Op::new(&[0x0F, 0xB7]), dst, src);
}

/// `MOVSX dst, r8` (`0F BE /r`).
pub fn emit_movsx8_rr(buf: &mut CodeBuffer<'_>, width: Width, dst: u8, src: u8) {
    emit_rr(buf, Op::new(&[0x0F, 0xBE]).w(width.rex_w()).bytes(), dst, src);
}

/// `MOVSX dst, r16` (`0F BF /r`).
pub fn emit_movsx16_rr(buf: &mut CodeBuffer<'_>, width: Width, dst: u8, src: u8) {
    emit_rr(buf, Op::new(&[0x0F, 0xBF]).w(width.rex_w()), dst, src);
}

/// `MOVSXD r64, r32` (`REX.W 63 /r`).
pub fn emit_movsxd_rr(buf: &mut CodeBuffer<'_>, dst: u8, src: u8) {
    emit_rr(buf, Op::new(&[0x63]).w(true), dst, src);
}

/// `LEA dst, [base + disp]` (`8D /r`).
pub fn emit_lea(buf: &mut CodeBuffer<'_>, width: Width, dst: u8, mem: Mem) {
    emit_rm(buf, Op::new(&[0x8D]).w(width.rex_w()), dst, mem);
}

/// `CMOVcc dst, src` (`0F 40+cc /r`).
pub fn emit_cmov(buf: &mut CodeBuffer<'_>, cc: HostCondition, width: Width, dst: u8, src: u8) {
    emit_rr(
        buf,
        Op::new(&[0x0F, cc.cmov_opcode()]).w(width.rex_w()),
        dst,
        src,
    );
}

/// `SETcc dst8` (`0F 90+cc /0`).
pub fn emit_setcc(buf: &mut CodeBuffer<'_>, cc: HostCondition, dst: u8) {
    emit_rr(buf, Op::new(&[0x0F, cc.setcc_opcode()]).bytes(), 0, dst);
}

// ─── Shifts and rotates ──────────────────────────────────────────────────────

/// Group-2 shift/rotate operation; the discriminant is the `/digit`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ShiftOp {
    Rol = 0,
    Ror = 1,
    Shl = 4,
    Shr = 5,
    Sar = 7,
}

/// `op dst, imm8` (`C1 /digit ib`).
pub fn emit_shift_ri(buf: &mut CodeBuffer<'_>, op: ShiftOp, width: Width, dst: u8, amount: u8) {
    emit_rr_ib(
        buf,
        Op::new(&[0xC1]).w(width.rex_w()),
        op as u8,
        dst,
        amount,
    );
}

/// `op dst, CL` (`D3 /digit`).
pub fn emit_shift_cl(buf: &mut CodeBuffer<'_>, op: ShiftOp, width: Width, dst: u8) {
    emit_rr(buf, Op::new(&[0xD3]).w(width.rex_w()), op as u8, dst);
}

/// `SHL dst, imm8` (64-bit).
pub fn emit_shl_imm(buf: &mut CodeBuffer<'_>, dst: u8, amount: u8) {
    emit_shift_ri(buf, ShiftOp::Shl, Width::W64, dst, amount);
}

/// `SHR dst, imm8` (64-bit).
pub fn emit_shr_imm(buf: &mut CodeBuffer<'_>, dst: u8, amount: u8) {
    emit_shift_ri(buf, ShiftOp::Shr, Width::W64, dst, amount);
}

/// `SAR dst, imm8` (64-bit).
pub fn emit_sar_imm(buf: &mut CodeBuffer<'_>, dst: u8, amount: u8) {
    emit_shift_ri(buf, ShiftOp::Sar, Width::W64, dst, amount);
}

/// `ROL dst, imm8` (64-bit).
pub fn emit_rol_imm(buf: &mut CodeBuffer<'_>, dst: u8, amount: u8) {
    emit_shift_ri(buf, ShiftOp::Rol, Width::W64, dst, amount);
}

/// `ROR dst, imm8` (64-bit).
pub fn emit_ror_imm(buf: &mut CodeBuffer<'_>, dst: u8, amount: u8) {
    emit_shift_ri(buf, ShiftOp::Ror, Width::W64, dst, amount);
}

// ─── Bit operations ──────────────────────────────────────────────────────────

/// `BSF dst, src` (`0F BC /r`).
pub fn emit_bsf(buf: &mut CodeBuffer<'_>, width: Width, dst: u8, src: u8) {
    emit_rr(buf, Op::new(&[0x0F, 0xBC]).w(width.rex_w()), dst, src);
}

/// `BSR dst, src` (`0F BD /r`).
pub fn emit_bsr(buf: &mut CodeBuffer<'_>, width: Width, dst: u8, src: u8) {
    emit_rr(buf, Op::new(&[0x0F, 0xBD]).w(width.rex_w()), dst, src);
}

/// `POPCNT dst, src` (`F3 0F B8 /r`).
pub fn emit_popcnt(buf: &mut CodeBuffer<'_>, width: Width, dst: u8, src: u8) {
    emit_rr(
        buf,
        Op::new(&[0x0F, 0xB8]).prefix(0xF3).w(width.rex_w()),
        dst,
        src,
    );
}

/// `LZCNT dst, src` (`F3 0F BD /r`).
pub fn emit_lzcnt(buf: &mut CodeBuffer<'_>, width: Width, dst: u8, src: u8) {
    emit_rr(
        buf,
        Op::new(&[0x0F, 0xBD]).prefix(0xF3).w(width.rex_w()),
        dst,
        src,
    );
}

/// `BSWAP dst` (`0F C8+r`).
pub fn emit_bswap(buf: &mut CodeBuffer<'_>, width: Width, dst: u8) {
    let mut ib = InstrBytes::new();
    if super::needs_rex(width.rex_w(), false, false, dst >= 8) {
        ib.push(super::rex(width.rex_w(), false, false, dst >= 8));
    }
    ib.push(0x0F);
    ib.push(0xC8 + (dst & 7));
    ib.emit(buf);
}

/// Bit-test group (`0F BA /digit ib`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum BitTestOp {
    Bt = 4,
    Bts = 5,
    Btr = 6,
    Btc = 7,
}

/// `BT/BTS/BTR/BTC dst, imm8`; CF receives the selected bit.
pub fn emit_bt_ri(buf: &mut CodeBuffer<'_>, op: BitTestOp, width: Width, dst: u8, bit: u8) {
    emit_rr_ib(
        buf,
        Op::new(&[0x0F, 0xBA]).w(width.rex_w()),
        op as u8,
        dst,
        bit,
    );
}

/// `BT dst, imm8` (64-bit).
pub fn emit_bt_imm(buf: &mut CodeBuffer<'_>, dst: u8, bit: u8) {
    emit_bt_ri(buf, BitTestOp::Bt, Width::W64, dst, bit);
}

// ─── Stack ───────────────────────────────────────────────────────────────────

/// `PUSH reg` (`50+r`, `41` prefix for `R8`–`R15`).
pub fn emit_push(buf: &mut CodeBuffer<'_>, reg: u8) {
    if reg >= 8 {
        buf.emit_bytes(&[0x41, 0x50 + (reg & 7)]);
    } else {
        buf.emit_byte(0x50 + reg);
    }
}

/// `POP reg` (`58+r`, `41` prefix for `R8`–`R15`).
pub fn emit_pop(buf: &mut CodeBuffer<'_>, reg: u8) {
    if reg >= 8 {
        buf.emit_bytes(&[0x41, 0x58 + (reg & 7)]);
    } else {
        buf.emit_byte(0x58 + reg);
    }
}

// ─── CPU control ─────────────────────────────────────────────────────────────

/// `NOP` (`90`).
pub fn emit_nop(buf: &mut CodeBuffer<'_>) {
    buf.emit_byte(0x90);
}

/// `CMC` (`F5`): complement the carry flag.
pub fn emit_cmc(buf: &mut CodeBuffer<'_>) {
    buf.emit_byte(0xF5);
}

/// `CLI` (`FA`).
pub fn emit_cli(buf: &mut CodeBuffer<'_>) {
    buf.emit_byte(0xFA);
}

/// `STI` (`FB`).
pub fn emit_sti(buf: &mut CodeBuffer<'_>) {
    buf.emit_byte(0xFB);
}

/// `HLT` (`F4`).
pub fn emit_hlt(buf: &mut CodeBuffer<'_>) {
    buf.emit_byte(0xF4);
}

/// `INT3` (`CC`).
pub fn emit_int3(buf: &mut CodeBuffer<'_>) {
    buf.emit_byte(0xCC);
}

/// `UD2` (`0F 0B`).
pub fn emit_ud2(buf: &mut CodeBuffer<'_>) {
    buf.emit_bytes(&[0x0F, 0x0B]);
}

/// `CPUID` (`0F A2`).
pub fn emit_cpuid(buf: &mut CodeBuffer<'_>) {
    buf.emit_bytes(&[0x0F, 0xA2]);
}

/// `RDTSC` (`0F 31`).
pub fn emit_rdtsc(buf: &mut CodeBuffer<'_>) {
    buf.emit_bytes(&[0x0F, 0x31]);
}

/// `SYSCALL` (`0F 05`).
pub fn emit_syscall(buf: &mut CodeBuffer<'_>) {
    buf.emit_bytes(&[0x0F, 0x05]);
}

/// `PAUSE` (`F3 90`).
pub fn emit_pause(buf: &mut CodeBuffer<'_>) {
    buf.emit_bytes(&[0xF3, 0x90]);
}

/// `MFENCE` (`0F AE F0`).
pub fn emit_mfence(buf: &mut CodeBuffer<'_>) {
    buf.emit_bytes(&[0x0F, 0xAE, 0xF0]);
}

/// `LFENCE` (`0F AE E8`).
pub fn emit_lfence(buf: &mut CodeBuffer<'_>) {
    buf.emit_bytes(&[0x0F, 0xAE, 0xE8]);
}

/// `SFENCE` (`0F AE F8`).
pub fn emit_sfence(buf: &mut CodeBuffer<'_>) {
    buf.emit_bytes(&[0x0F, 0xAE, 0xF8]);
}
