//! Cross-validation tests: encode with dbt_rs, decode with iced-x86.
//!
//! Every encoder output is decoded with iced-x86 and the decoded mnemonic,
//! length, and (where it matters) operands are checked. Translated blocks
//! are walked instruction by instruction to make sure the whole stream
//! decodes with no invalid or truncated instruction.

use dbt_rs::buffer::CodeBuffer;
use dbt_rs::encoder::*;
use dbt_rs::regmap::*;
use dbt_rs::{translate_block, CpuContext, PeepholeFlags, TranslatorConfig};
use iced_x86::{Decoder, DecoderOptions, Instruction, Mnemonic, Register};

// ─── Helpers ──────────────────────────────────────────────────────────────────

/// Run one encoder and decode its output as exactly one instruction.
fn encode_and_decode(f: impl FnOnce(&mut CodeBuffer<'_>)) -> (Instruction, Vec<u8>) {
    let mut buf = CodeBuffer::new(32);
    f(&mut buf);
    let bytes = buf.as_bytes().to_vec();
    assert!(!bytes.is_empty(), "encoder emitted nothing");

    let mut decoder = Decoder::with_ip(64, &bytes, 0, DecoderOptions::NONE);
    let instr = decoder.decode();
    assert_ne!(
        instr.mnemonic(),
        Mnemonic::INVALID,
        "iced-x86 decoded INVALID for {:02X?}",
        bytes
    );
    assert_eq!(
        instr.len(),
        bytes.len(),
        "iced-x86 decoded {} bytes but dbt_rs emitted {} bytes: {:02X?}",
        instr.len(),
        bytes.len(),
        bytes
    );
    (instr, bytes)
}

fn verify(expected: Mnemonic, f: impl FnOnce(&mut CodeBuffer<'_>)) {
    let (instr, bytes) = encode_and_decode(f);
    assert_eq!(
        instr.mnemonic(),
        expected,
        "mnemonic mismatch for {:02X?}",
        bytes
    );
}

/// Decode a whole stream; returns the mnemonics in order.
fn decode_stream(code: &[u8]) -> Vec<Mnemonic> {
    let mut decoder = Decoder::with_ip(64, code, 0, DecoderOptions::NONE);
    let mut out = Vec::new();
    let mut consumed = 0;
    while decoder.can_decode() {
        let instr = decoder.decode();
        assert!(
            !instr.is_invalid(),
            "invalid instruction at offset {} in {:02X?}",
            consumed,
            code
        );
        consumed += instr.len();
        out.push(instr.mnemonic());
    }
    assert_eq!(consumed, code.len());
    out
}

/// Translate and link `words` with every exit pointing at the block start.
fn translated(words: &[u32], config: TranslatorConfig) -> Vec<u8> {
    let ctx = CpuContext::new(0x1000);
    let block = translate_block(words, 0x1000, &ctx, config)
        .unwrap_or_else(|e| panic!("translation of {:08X?} failed: {e}", words));
    block
        .link(|_| Some(0))
        .unwrap_or_else(|e| panic!("link of {:08X?} failed: {e}", words))
        .into_code()
}

// ─── GPR ──────────────────────────────────────────────────────────────────────

#[test]
fn xval_alu_rr() {
    verify(Mnemonic::Add, |b| emit_add_reg_reg(b, RAX, R9));
    verify(Mnemonic::Sub, |b| emit_sub_reg_reg(b, R15, RSP));
    verify(Mnemonic::And, |b| emit_and_reg_reg(b, R12, R13));
    verify(Mnemonic::Or, |b| emit_or_reg_reg(b, RBP, RSI));
    verify(Mnemonic::Xor, |b| emit_xor_reg_reg(b, RDI, R8));
    verify(Mnemonic::Cmp, |b| emit_cmp_reg_reg(b, R14, R11));
    verify(Mnemonic::Adc, |b| emit_alu_rr(b, AluOp::Adc, Width::W32, RAX, RCX));
    verify(Mnemonic::Sbb, |b| emit_alu_rr(b, AluOp::Sbb, Width::W64, RAX, RCX));
    verify(Mnemonic::Test, |b| emit_test_rr(b, Width::W32, R10, R10));
}

#[test]
fn xval_alu_operand_order() {
    // add rax, r9: rax is the destination
    let (instr, _) = encode_and_decode(|b| emit_add_reg_reg(b, RAX, R9));
    assert_eq!(instr.op0_register(), Register::RAX);
    assert_eq!(instr.op1_register(), Register::R9);

    // mov r8d, eax
    let (instr, _) = encode_and_decode(|b| emit_mov_rr(b, Width::W32, R8, RAX));
    assert_eq!(instr.op0_register(), Register::R8D);
    assert_eq!(instr.op1_register(), Register::EAX);
}

#[test]
fn xval_alu_ri() {
    verify(Mnemonic::Add, |b| emit_add_reg_imm32(b, RAX, 1));
    verify(Mnemonic::Add, |b| emit_add_reg_imm32(b, R12, 0x12345));
    verify(Mnemonic::Sub, |b| emit_sub_reg_imm32(b, RSP, -128));
    verify(Mnemonic::Cmp, |b| emit_cmp_reg_imm32(b, R15, i32::MIN));
    verify(Mnemonic::Test, |b| emit_test_ri(b, Width::W64, RBX, 0x10));
}

#[test]
fn xval_unary_mul_div() {
    verify(Mnemonic::Not, |b| emit_not(b, Width::W64, R8));
    verify(Mnemonic::Neg, |b| emit_neg(b, Width::W32, RDX));
    verify(Mnemonic::Mul, |b| emit_mul(b, Width::W64, R10));
    verify(Mnemonic::Imul, |b| emit_imul1(b, Width::W64, RCX));
    verify(Mnemonic::Div, |b| emit_div(b, Width::W32, RBX));
    verify(Mnemonic::Idiv, |b| emit_idiv(b, Width::W64, R9));
    verify(Mnemonic::Imul, |b| emit_imul_rr(b, Width::W64, R13, R14));
    verify(Mnemonic::Cqo, emit_cqo);
    verify(Mnemonic::Cdq, emit_cdq);
}

#[test]
fn xval_moves() {
    verify(Mnemonic::Mov, |b| emit_mov_reg_reg(b, R15, RSP));
    verify(Mnemonic::Mov, |b| emit_mov_reg_imm64(b, R11, u64::MAX));
    verify(Mnemonic::Mov, |b| emit_mov_reg_imm32(b, R14, 0x1004));
    verify(Mnemonic::Mov, |b| emit_mov_reg_imm16(b, R9, 0xBEEF));
    verify(Mnemonic::Mov, |b| emit_mov_reg_simm32(b, RAX, -2));
    verify(Mnemonic::Mov, |b| emit_mov_reg_mem(b, RAX, R12, 0));
    verify(Mnemonic::Mov, |b| emit_mov_reg_mem(b, RAX, R13, 0));
    verify(Mnemonic::Mov, |b| emit_mov_mem_reg(b, RSP, R8, -8));
    verify(Mnemonic::Mov, |b| emit_mov_store8(b, Mem::new(R15, 1), RDI));
    verify(Mnemonic::Mov, |b| emit_mov_store16(b, Mem::new(RAX, 0x200), R9));
    for size in [1, 2, 4, 8] {
        verify(Mnemonic::Mov, |b| emit_mov_store_imm(b, size, Mem::base(RCX), 0));
    }
}

#[test]
fn xval_extending_moves() {
    verify(Mnemonic::Movzx, |b| emit_movzx8_load(b, R8, Mem::base(RAX)));
    verify(Mnemonic::Movzx, |b| emit_movzx16_load(b, RAX, Mem::new(R13, 2)));
    verify(Mnemonic::Movsx, |b| emit_movsx8_load(b, Width::W64, RAX, Mem::base(RCX)));
    verify(Mnemonic::Movsx, |b| emit_movsx16_load(b, Width::W32, RAX, Mem::base(RCX)));
    verify(Mnemonic::Movsxd, |b| emit_movsxd_load(b, R10, Mem::base(RSP)));
    verify(Mnemonic::Movzx, |b| emit_movzx8_rr(b, RAX, RSI));
    verify(Mnemonic::Movzx, |b| emit_movzx16_rr(b, RAX, R9));
    verify(Mnemonic::Movsx, |b| emit_movsx8_rr(b, Width::W64, RAX, RDI));
    verify(Mnemonic::Movsx, |b| emit_movsx16_rr(b, Width::W64, RAX, RCX));
    verify(Mnemonic::Movsxd, |b| emit_movsxd_rr(b, R11, RDX));
}

#[test]
fn xval_byte_register_needs_rex() {
    // movzx eax, sil rather than movzx eax, dh
    let (instr, _) = encode_and_decode(|b| emit_movzx8_rr(b, RAX, RSI));
    assert_eq!(instr.op1_register(), Register::SIL);
    let (instr, _) = encode_and_decode(|b| emit_setcc(b, HostCondition::E, RDI));
    assert_eq!(instr.op0_register(), Register::DIL);
}

#[test]
fn xval_lea_sib() {
    let mem = Mem::indexed(R13, R12, 3, 0x40).unwrap();
    verify(Mnemonic::Lea, |b| emit_lea(b, Width::W64, RAX, mem));
    let (instr, _) = encode_and_decode(|b| emit_lea(b, Width::W64, RAX, mem));
    assert_eq!(instr.memory_base(), Register::R13);
    assert_eq!(instr.memory_index(), Register::R12);
    assert_eq!(instr.memory_index_scale(), 8);
    assert_eq!(instr.memory_displacement64(), 0x40);

    // rsp cannot be an index; it is swapped into the base
    let mem = Mem::indexed(RAX, RSP, 0, 0).unwrap();
    let (instr, _) = encode_and_decode(|b| emit_lea(b, Width::W64, RCX, mem));
    assert_eq!(instr.memory_base(), Register::RSP);
    assert_eq!(instr.memory_index(), Register::RAX);
}

#[test]
fn xval_conditional_moves() {
    let pairs = [
        (HostCondition::E, Mnemonic::Cmove, Mnemonic::Sete),
        (HostCondition::Ne, Mnemonic::Cmovne, Mnemonic::Setne),
        (HostCondition::B, Mnemonic::Cmovb, Mnemonic::Setb),
        (HostCondition::Ae, Mnemonic::Cmovae, Mnemonic::Setae),
        (HostCondition::A, Mnemonic::Cmova, Mnemonic::Seta),
        (HostCondition::Be, Mnemonic::Cmovbe, Mnemonic::Setbe),
        (HostCondition::L, Mnemonic::Cmovl, Mnemonic::Setl),
        (HostCondition::Ge, Mnemonic::Cmovge, Mnemonic::Setge),
        (HostCondition::G, Mnemonic::Cmovg, Mnemonic::Setg),
        (HostCondition::Le, Mnemonic::Cmovle, Mnemonic::Setle),
        (HostCondition::S, Mnemonic::Cmovs, Mnemonic::Sets),
        (HostCondition::O, Mnemonic::Cmovo, Mnemonic::Seto),
        (HostCondition::P, Mnemonic::Cmovp, Mnemonic::Setp),
    ];
    for (cc, cmov, set) in pairs {
        verify(cmov, |b| emit_cmov(b, cc, Width::W64, RAX, R9));
        verify(set, |b| emit_setcc(b, cc, R10));
    }
}

#[test]
fn xval_shifts_and_bits() {
    verify(Mnemonic::Shl, |b| emit_shl_imm(b, R8, 3));
    verify(Mnemonic::Shr, |b| emit_shr_imm(b, RAX, 63));
    verify(Mnemonic::Sar, |b| emit_sar_imm(b, RDX, 1));
    verify(Mnemonic::Rol, |b| emit_rol_imm(b, RAX, 16));
    verify(Mnemonic::Ror, |b| emit_ror_imm(b, R15, 8));
    verify(Mnemonic::Sar, |b| emit_shift_cl(b, ShiftOp::Sar, Width::W32, RBX));
    verify(Mnemonic::Bsf, |b| emit_bsf(b, Width::W64, RAX, RCX));
    verify(Mnemonic::Bsr, |b| emit_bsr(b, Width::W32, R9, R10));
    verify(Mnemonic::Popcnt, |b| emit_popcnt(b, Width::W64, R8, RAX));
    verify(Mnemonic::Lzcnt, |b| emit_lzcnt(b, Width::W64, RAX, R12));
    verify(Mnemonic::Bswap, |b| emit_bswap(b, Width::W64, R13));
    verify(Mnemonic::Bt, |b| emit_bt_imm(b, R8, 63));
    verify(Mnemonic::Btc, |b| emit_bt_ri(b, BitTestOp::Btc, Width::W64, RAX, 63));
}

#[test]
fn xval_stack_and_system() {
    verify(Mnemonic::Push, |b| emit_push(b, R12));
    verify(Mnemonic::Pop, |b| emit_pop(b, RBP));
    verify(Mnemonic::Nop, emit_nop);
    verify(Mnemonic::Cli, emit_cli);
    verify(Mnemonic::Sti, emit_sti);
    verify(Mnemonic::Hlt, emit_hlt);
    verify(Mnemonic::Int3, emit_int3);
    verify(Mnemonic::Ud2, emit_ud2);
    verify(Mnemonic::Cpuid, emit_cpuid);
    verify(Mnemonic::Rdtsc, emit_rdtsc);
    verify(Mnemonic::Syscall, emit_syscall);
    verify(Mnemonic::Pause, emit_pause);
    verify(Mnemonic::Mfence, emit_mfence);
    verify(Mnemonic::Lfence, emit_lfence);
    verify(Mnemonic::Sfence, emit_sfence);
}

// ─── Control flow ────────────────────────────────────────────────────────────

#[test]
fn xval_control_flow() {
    verify(Mnemonic::Jmp, |b| {
        emit_jmp_rel32(b);
    });
    verify(Mnemonic::Call, |b| {
        emit_call_rel32(b);
    });
    verify(Mnemonic::Jmp, |b| emit_jmp_reg(b, R11));
    verify(Mnemonic::Call, |b| emit_call_reg(b, RAX));
    verify(Mnemonic::Ret, emit_ret);
}

#[test]
fn xval_cond_branch_every_condition() {
    use dbt_rs::Condition;
    let expect = [
        (Condition::Eq, Mnemonic::Je),
        (Condition::Ne, Mnemonic::Jne),
        (Condition::Cs, Mnemonic::Jae),
        (Condition::Cc, Mnemonic::Jb),
        (Condition::Mi, Mnemonic::Js),
        (Condition::Pl, Mnemonic::Jns),
        (Condition::Vs, Mnemonic::Jo),
        (Condition::Vc, Mnemonic::Jno),
        (Condition::Hi, Mnemonic::Ja),
        (Condition::Ls, Mnemonic::Jbe),
        (Condition::Ge, Mnemonic::Jge),
        (Condition::Lt, Mnemonic::Jl),
        (Condition::Gt, Mnemonic::Jg),
        (Condition::Le, Mnemonic::Jle),
    ];
    for (cond, mnemonic) in expect {
        verify(mnemonic, |b| {
            assert!(emit_cond_branch(b, cond).is_some());
        });
    }
}

#[test]
fn xval_patched_branch_target() {
    let mut buf = CodeBuffer::new(16).with_base_address(0x40_0000);
    let at = emit_jcc_rel32(&mut buf, HostCondition::Ne);
    patch_rel32(&mut buf, at, 0x40_1000).unwrap();
    let mut decoder = Decoder::with_ip(64, buf.as_bytes(), 0x40_0000, DecoderOptions::NONE);
    let instr = decoder.decode();
    assert_eq!(instr.mnemonic(), Mnemonic::Jne);
    assert_eq!(instr.near_branch_target(), 0x40_1000);
}

// ─── Scalar FP ───────────────────────────────────────────────────────────────

#[test]
fn xval_scalar_fp() {
    use Precision::{Double, Single};
    verify(Mnemonic::Addsd, |b| emit_fadd(b, Double, 0, 9));
    verify(Mnemonic::Addss, |b| emit_fadd(b, Single, 8, 1));
    verify(Mnemonic::Subsd, |b| emit_fsub(b, Double, 2, 3));
    verify(Mnemonic::Mulss, |b| emit_fmul(b, Single, 14, 15));
    verify(Mnemonic::Divsd, |b| emit_fdiv(b, Double, 0, 1));
    verify(Mnemonic::Sqrtss, |b| emit_fsqrt(b, Single, 0, 1));
    verify(Mnemonic::Minsd, |b| emit_fmin(b, Double, 0, 1));
    verify(Mnemonic::Maxss, |b| emit_fmax(b, Single, 0, 1));
    verify(Mnemonic::Movsd, |b| emit_fmov_rr(b, Double, 0, 1));
    verify(Mnemonic::Movss, |b| emit_fload(b, Single, 0, Mem::new(RCX, 4)));
    verify(Mnemonic::Movsd, |b| emit_fstore(b, Double, Mem::base(R15), 10));
    verify(Mnemonic::Ucomisd, |b| emit_ucomis(b, Double, 0, 1));
    verify(Mnemonic::Comiss, |b| emit_comis(b, Single, 0, 1));
    verify(Mnemonic::Cmpsd, |b| emit_fcmp_pred(b, Double, 0, 1, 1));
    verify(Mnemonic::Cvtss2sd, |b| emit_fcvt(b, Single, 0, 1));
    verify(Mnemonic::Cvtsd2ss, |b| emit_fcvt(b, Double, 0, 1));
    verify(Mnemonic::Cvtsi2sd, |b| emit_cvtsi2f(b, Double, Width::W64, 0, R8));
    verify(Mnemonic::Cvttss2si, |b| emit_cvttf2si(b, Single, Width::W32, RAX, 1));
    verify(Mnemonic::Cvtsd2si, |b| emit_cvtf2si(b, Double, Width::W64, RAX, 1));
    verify(Mnemonic::Roundsd, |b| emit_fround(b, Double, 0, 1, RoundMode::Down, false));
    verify(Mnemonic::Roundss, |b| emit_fround(b, Single, 0, 1, RoundMode::Current, true));
    verify(Mnemonic::Andps, |b| emit_fand(b, Single, 0, 1));
    verify(Mnemonic::Andnpd, |b| emit_fandn(b, Double, 0, 1));
    verify(Mnemonic::Orps, |b| emit_for(b, Single, 0, 1));
    verify(Mnemonic::Xorpd, |b| emit_fxor(b, Double, 0, 1));
    verify(Mnemonic::Movaps, |b| emit_movaps(b, 0, 15));
    verify(Mnemonic::Movapd, |b| emit_movapd(b, 0, 1));
    verify(Mnemonic::Movq, |b| emit_movq_to_xmm(b, Width::W64, 0, RAX));
    verify(Mnemonic::Movd, |b| emit_movq_to_xmm(b, Width::W32, 0, RAX));
    verify(Mnemonic::Movq, |b| emit_movq_from_xmm(b, Width::W64, R9, 3));
}

// ─── Packed SIMD ─────────────────────────────────────────────────────────────

#[test]
fn xval_packed_ops() {
    use ElemSize::*;
    let table = [
        (PackedOp::Add(B8), Mnemonic::Paddb),
        (PackedOp::Add(B64), Mnemonic::Paddq),
        (PackedOp::Sub(B16), Mnemonic::Psubw),
        (PackedOp::Sub(B32), Mnemonic::Psubd),
        (PackedOp::And, Mnemonic::Pand),
        (PackedOp::AndNot, Mnemonic::Pandn),
        (PackedOp::Or, Mnemonic::Por),
        (PackedOp::Xor, Mnemonic::Pxor),
        (PackedOp::MulLow(B16), Mnemonic::Pmullw),
        (PackedOp::MulLow(B32), Mnemonic::Pmulld),
        (PackedOp::MulUdq, Mnemonic::Pmuludq),
        (PackedOp::MulDq, Mnemonic::Pmuldq),
        (PackedOp::CmpEq(B8), Mnemonic::Pcmpeqb),
        (PackedOp::CmpEq(B64), Mnemonic::Pcmpeqq),
        (PackedOp::CmpGt(B16), Mnemonic::Pcmpgtw),
        (PackedOp::CmpGt(B64), Mnemonic::Pcmpgtq),
        (PackedOp::MinSigned(B8), Mnemonic::Pminsb),
        (PackedOp::MinSigned(B16), Mnemonic::Pminsw),
        (PackedOp::MaxSigned(B32), Mnemonic::Pmaxsd),
        (PackedOp::MinUnsigned(B8), Mnemonic::Pminub),
        (PackedOp::MinUnsigned(B16), Mnemonic::Pminuw),
        (PackedOp::MaxUnsigned(B32), Mnemonic::Pmaxud),
        (PackedOp::UnpackLow(B64), Mnemonic::Punpcklqdq),
        (PackedOp::UnpackHigh(B8), Mnemonic::Punpckhbw),
        (PackedOp::ShuffleBytes, Mnemonic::Pshufb),
        (PackedOp::Abs(B32), Mnemonic::Pabsd),
    ];
    for (op, mnemonic) in table {
        verify(mnemonic, |b| {
            assert!(emit_packed(b, op, 9, 14), "{:?} not encodable", op);
        });
    }
}

#[test]
fn xval_vector_moves_and_shuffles() {
    verify(Mnemonic::Movdqa, |b| emit_movdqa(b, 8, 1));
    verify(Mnemonic::Movdqu, |b| emit_movdqu_load(b, 0, Mem::base(RSP)));
    verify(Mnemonic::Movdqu, |b| emit_movdqu_store(b, Mem::new(R13, 16), 2));
    verify(Mnemonic::Movq, |b| emit_movq_xmm(b, 0, 1));
    verify(Mnemonic::Movq, |b| emit_movq_load(b, 0, Mem::base(RAX)));
    verify(Mnemonic::Movq, |b| emit_movq_store(b, Mem::base(RAX), 0));
    verify(Mnemonic::Pshufd, |b| emit_pshufd(b, 0, 1, 0xEE));
    verify(Mnemonic::Pshuflw, |b| emit_pshuflw(b, 0, 1, 0));
    verify(Mnemonic::Palignr, |b| emit_palignr(b, 0, 1, 8));
    verify(Mnemonic::Psrldq, |b| emit_psrldq(b, 3, 8));
    verify(Mnemonic::Pslldq, |b| emit_pslldq(b, 3, 8));
    verify(Mnemonic::Packsswb, |b| emit_packsswb(b, 0, 1));
    verify(Mnemonic::Packuswb, |b| emit_packuswb(b, 0, 1));
}

#[test]
fn xval_packed_shifts() {
    let table = [
        (PShift::Sll, ElemSize::B16, Mnemonic::Psllw),
        (PShift::Srl, ElemSize::B32, Mnemonic::Psrld),
        (PShift::Sra, ElemSize::B32, Mnemonic::Psrad),
        (PShift::Sll, ElemSize::B64, Mnemonic::Psllq),
        (PShift::Srl, ElemSize::B64, Mnemonic::Psrlq),
    ];
    for (kind, size, mnemonic) in table {
        verify(mnemonic, |b| {
            assert!(emit_pshift_imm(b, kind, size, 12, 5));
        });
    }
}

#[test]
fn xval_insert_extract_extend() {
    verify(Mnemonic::Pinsrb, |b| emit_pinsr(b, ElemSize::B8, 0, RAX, 3));
    verify(Mnemonic::Pinsrw, |b| emit_pinsr(b, ElemSize::B16, 0, RAX, 1));
    verify(Mnemonic::Pinsrd, |b| emit_pinsr(b, ElemSize::B32, 0, RAX, 2));
    verify(Mnemonic::Pinsrq, |b| emit_pinsr(b, ElemSize::B64, 15, R11, 1));
    verify(Mnemonic::Pextrq, |b| emit_pextr(b, ElemSize::B64, R11, 15, 1));
    verify(Mnemonic::Pextrd, |b| emit_pextr(b, ElemSize::B32, RAX, 1, 0));
    let table = [
        (ElemSize::B8, true, Mnemonic::Pmovsxbw),
        (ElemSize::B16, true, Mnemonic::Pmovsxwd),
        (ElemSize::B32, true, Mnemonic::Pmovsxdq),
        (ElemSize::B8, false, Mnemonic::Pmovzxbw),
        (ElemSize::B16, false, Mnemonic::Pmovzxwd),
        (ElemSize::B32, false, Mnemonic::Pmovzxdq),
    ];
    for (from, signed, mnemonic) in table {
        verify(mnemonic, |b| {
            assert!(emit_pmov_extend(b, from, signed, 0, 1));
        });
    }
}

// ─── VEX ─────────────────────────────────────────────────────────────────────

#[test]
fn xval_vex_forms() {
    verify(Mnemonic::Vpaddd, |b| {
        assert!(emit_vpacked(b, PackedOp::Add(ElemSize::B32), 0, 1, 2));
    });
    verify(Mnemonic::Vpxor, |b| {
        assert!(emit_vpacked(b, PackedOp::Xor, 9, 10, 11));
    });
    verify(Mnemonic::Vpcmpgtq, |b| {
        assert!(emit_vpacked(b, PackedOp::CmpGt(ElemSize::B64), 0, 1, 2));
    });
    verify(Mnemonic::Vaddsd, |b| {
        emit_vscalar(b, ScalarOp::Add, Precision::Double, 0, 1, 2)
    });
    verify(Mnemonic::Vmulss, |b| {
        emit_vscalar(b, ScalarOp::Mul, Precision::Single, 8, 9, 10)
    });
    verify(Mnemonic::Vpalignr, |b| emit_vpalignr(b, 0, 1, 12, 4));
}

#[test]
fn xval_vex_operands() {
    // vpsubq xmm9, xmm2, xmm12
    let (instr, _) = encode_and_decode(|b| {
        assert!(emit_vpacked(b, PackedOp::Sub(ElemSize::B64), 9, 2, 12));
    });
    assert_eq!(instr.mnemonic(), Mnemonic::Vpsubq);
    assert_eq!(instr.op0_register(), Register::XMM9);
    assert_eq!(instr.op1_register(), Register::XMM2);
    assert_eq!(instr.op2_register(), Register::XMM12);
}

// ─── Translated blocks ───────────────────────────────────────────────────────

/// A spread of guest instructions across every family the translator covers.
const GUEST_WORDS: &[u32] = &[
    0x8B02_0020, // add x0, x1, x2
    0xCB02_0020, // sub x0, x1, x2
    0xEB01_001F, // cmp x0, x1
    0xAA02_0020, // orr x0, x1, x2
    0x8A02_0020, // and x0, x1, x2
    0xCA02_0020, // eor x0, x1, x2
    0xAA22_0020, // orn x0, x1, x2
    0xAA22_03E0, // mvn x0, x2
    0x9100_0420, // add x0, x1, #1
    0xF100_0420, // subs x0, x1, #1
    0xD280_0540, // movz x0, #42
    0xF2A0_0020, // movk x0, #1, lsl #16
    0x9B02_7C20, // mul x0, x1, x2
    0x9AC2_0C20, // sdiv x0, x1, x2
    0x9AC2_0820, // udiv x0, x1, x2
    0x9BC2_7C20, // umulh x0, x1, x2
    0x9AC2_2020, // lsl x0, x1, x2
    0xDAC0_1020, // clz x0, x1
    0xDAC0_0C20, // rev x0, x1
    0xDAC0_0020, // rbit x0, x1
    0x9A82_0020, // csel x0, x1, x2, eq
    0xF940_0420, // ldr x0, [x1, #8]
    0x3940_0020, // ldrb w0, [x1]
    0xB980_0420, // ldrsw x0, [x1, #4]
    0xF900_0420, // str x0, [x1, #8]
    0xA8C1_07E0, // ldp x0, x1, [sp], #16
    0x3DC0_0020, // ldr q0, [x1]
    0x1E62_2820, // fadd d0, d1, d2
    0x1E61_C020, // fsqrt d0, d1
    0x1E62_2000, // fcmp d0, d2
    0x9E62_0020, // scvtf d0, x1
    0x9E78_0020, // fcvtzs x0, d1
    0x4EA2_8420, // add v0.4s, v1.4s, v2.4s
    0x6EE2_3420, // cmhi v0.2d, v1.2d, v2.2d
    0x0EA2_C020, // smull v0.2d, v1.2s, v2.2s
    0x4E22_1C20, // and v0.16b, v1.16b, v2.16b
    0x6E62_1C20, // bsl v0.16b, v1.16b, v2.16b
    0x4F21_5420, // shl v0.4s, v1.4s, #1
    0x6E02_2020, // ext v0.16b, v1.16b, v2.16b, #4
    0x4E08_0C20, // dup v0.2d, x1
    0xD503_3BBF, // dmb ish
];

#[test]
fn xval_translated_instructions_decode_cleanly() {
    let ctx = CpuContext::new(0x1000);
    for &word in GUEST_WORDS {
        // A word the translator rejects is not an encoding problem.
        let Ok(block) = translate_block(&[word], 0x1000, &ctx, TranslatorConfig::default()) else {
            continue;
        };
        let code = block.link(|_| Some(0)).unwrap().into_code();
        let mnemonics = decode_stream(&code);
        assert_eq!(
            mnemonics.last(),
            Some(&Mnemonic::Jmp),
            "{:#010x} does not end in its exit jump",
            word
        );
    }
}

#[test]
fn xval_translated_with_avx() {
    let ctx = CpuContext::new(0x1000);
    let config = TranslatorConfig::default().with_avx(true);
    for &word in GUEST_WORDS {
        if let Ok(block) = translate_block(&[word], 0x1000, &ctx, config) {
            decode_stream(&block.link(|_| Some(0)).unwrap().into_code());
        }
    }
}

#[test]
fn xval_no_host_stack_traffic() {
    let ctx = CpuContext::new(0x1000);
    for &word in GUEST_WORDS {
        if let Ok(block) = translate_block(&[word], 0x1000, &ctx, TranslatorConfig::default()) {
            let code = block.link(|_| Some(0)).unwrap().into_code();
            for m in decode_stream(&code) {
                assert!(
                    !matches!(m, Mnemonic::Push | Mnemonic::Pop | Mnemonic::Call | Mnemonic::Ret),
                    "{:#010x} emitted {:?}",
                    word,
                    m
                );
            }
        }
    }
}

#[test]
fn xval_translated_add_is_lea() {
    let code = translated(&[0x8B02_0020], TranslatorConfig::default());
    assert_eq!(decode_stream(&code), [Mnemonic::Lea, Mnemonic::Jmp]);
}

#[test]
fn xval_translated_loop_after_peephole() {
    // subs x0, x0, #1; b.ne #-4
    let words = [0xF100_0400, 0x54FF_FFE1];
    for flags in [PeepholeFlags::NONE, PeepholeFlags::ALL] {
        let code = translated(&words, TranslatorConfig::default().with_peephole(flags));
        let mnemonics = decode_stream(&code);
        assert!(mnemonics.contains(&Mnemonic::Sub));
        assert!(mnemonics.contains(&Mnemonic::Jne));
    }
}
