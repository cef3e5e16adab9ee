//! AArch64 instruction decoder.
//!
//! [`decode`] classifies a raw 32-bit word by matching fixed mask/value
//! templates in priority order and extracts its operand fields into an
//! [`Instruction`]. Decoding never fails outright: words that match no
//! template become [`Instruction::Unknown`], which the translator must
//! reject.
//!
//! Register numbers are the raw 5-bit fields (0–31). Whether 31 names the
//! zero register or the stack pointer depends on the form; the types below
//! record which where it matters.

use crate::error::DbtError;
use crate::regmap::Condition;

// ─── Family tags ─────────────────────────────────────────────────────────────

/// Top-level instruction family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum InstrClass {
    Alu,
    Branch,
    Compare,
    Move,
    Load,
    Store,
    System,
    FloatingPoint,
    Vector,
    Unknown,
}

/// Branch subtype.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum BranchKind {
    Unconditional,
    Link,
    Register,
    Return,
    Conditional,
    CompareZero,
    TestBit,
}

// ─── Operand pieces ──────────────────────────────────────────────────────────

/// Shift applied to a register operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ShiftType {
    Lsl,
    Lsr,
    Asr,
    Ror,
}

impl ShiftType {
    const fn from_bits(bits: u32) -> Self {
        match bits & 3 {
            0 => ShiftType::Lsl,
            1 => ShiftType::Lsr,
            2 => ShiftType::Asr,
            _ => ShiftType::Ror,
        }
    }
}

/// Second source operand of a data-processing instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Operand2 {
    /// `Rm, <shift> #amount`; register 31 reads as zero.
    Shifted {
        rm: u8,
        shift: ShiftType,
        amount: u8,
    },
    /// Fully expanded immediate.
    Imm(u64),
}

impl Operand2 {
    /// Unshifted register operand.
    #[inline]
    pub const fn reg(rm: u8) -> Self {
        Operand2::Shifted {
            rm,
            shift: ShiftType::Lsl,
            amount: 0,
        }
    }
}

/// Two-operand ALU operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum AluOp {
    Add,
    Sub,
    And,
    Orr,
    Eor,
    /// `Rn & !op2`.
    Bic,
    /// `Rn | !op2`.
    Orn,
    /// `Rn ^ !op2`.
    Eon,
}

/// Bit-manipulation 1-source operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum BitOp {
    Clz,
    Rbit,
    /// Byte reverse of the full register.
    Rev,
    /// Byte reverse within each halfword.
    Rev16,
    /// Byte reverse within each word (64-bit only).
    Rev32,
}

/// Conditional-select flavour applied to `Rm` when the condition fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SelectOp {
    /// `Rm`.
    Csel,
    /// `Rm + 1`.
    Csinc,
    /// `!Rm`.
    Csinv,
    /// `-Rm`.
    Csneg,
}

/// Bitfield move flavour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum BitfieldKind {
    /// `SBFM`: sign-extend the field, zero elsewhere.
    Signed,
    /// `BFM`: insert the field, keeping the other destination bits.
    Insert,
    /// `UBFM`: zero-extend the field.
    Unsigned,
}

/// Integer data-processing instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Alu {
    /// `Rd = Rn op operand`, optionally setting NZCV.
    ///
    /// When `sp` is set (ADD/SUB immediate) register 31 in `rn` names SP,
    /// and so does `rd` unless flags are set.
    Binary {
        op: AluOp,
        sf: bool,
        set_flags: bool,
        sp: bool,
        rd: u8,
        rn: u8,
        operand: Operand2,
    },
    /// `MVN Rd, Rm{, shift}` (ORN with `Rn = ZR`).
    Mvn {
        sf: bool,
        rd: u8,
        rm: u8,
        shift: ShiftType,
        amount: u8,
    },
    /// `Rd = Ra ± Rn * Rm` (`MADD`/`MSUB`; `MUL`/`MNEG` when `Ra = ZR`).
    MulAdd {
        sf: bool,
        negate: bool,
        rd: u8,
        rn: u8,
        rm: u8,
        ra: u8,
    },
    /// High 64 bits of the 128-bit product (`SMULH`/`UMULH`).
    MulHigh {
        signed: bool,
        rd: u8,
        rn: u8,
        rm: u8,
    },
    /// `SDIV`/`UDIV`. Division by zero yields zero.
    Div {
        sf: bool,
        signed: bool,
        rd: u8,
        rn: u8,
        rm: u8,
    },
    /// Variable shift (`LSLV`/`LSRV`/`ASRV`/`RORV`).
    ShiftVar {
        sf: bool,
        kind: ShiftType,
        rd: u8,
        rn: u8,
        rm: u8,
    },
    /// `CLZ`/`RBIT`/`REV*`.
    Unary {
        sf: bool,
        op: BitOp,
        rd: u8,
        rn: u8,
    },
    /// `SBFM`/`BFM`/`UBFM`.
    ///
    /// Covers the aliases `LSL/LSR/ASR (immediate)`, `SBFX/UBFX`,
    /// `SBFIZ/UBFIZ`, `BFI/BFXIL`, `SXTB/SXTH/SXTW` and `UXTB/UXTH`. With
    /// `imms >= immr` bits `imms..=immr` of `Rn` land at bit 0; otherwise bits
    /// `imms..=0` land at bit `datasize - immr`.
    Bitfield {
        kind: BitfieldKind,
        sf: bool,
        rd: u8,
        rn: u8,
        immr: u8,
        imms: u8,
    },
    /// `EXTR`: the low half of `Rn:Rm >> lsb` (`ROR` when `Rn == Rm`).
    Extract {
        sf: bool,
        rd: u8,
        rn: u8,
        rm: u8,
        lsb: u8,
    },
    /// `CSEL`/`CSINC`/`CSINV`/`CSNEG`.
    CondSelect {
        sf: bool,
        op: SelectOp,
        cond: Condition,
        rd: u8,
        rn: u8,
        rm: u8,
    },
}

/// Flag-setting compare with the result discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CompareKind {
    /// `SUBS ZR, Rn, op2`.
    Cmp,
    /// `ADDS ZR, Rn, op2`.
    Cmn,
    /// `ANDS ZR, Rn, op2`.
    Tst,
}

/// Compare instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Compare {
    pub kind: CompareKind,
    pub sf: bool,
    /// Register 31 names SP for immediate CMP/CMN and ZR otherwise.
    pub rn: u8,
    pub operand: Operand2,
}

/// Move-wide opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum MoveWideKind {
    /// `Rd = !(imm16 << shift)`.
    Movn,
    /// `Rd = imm16 << shift`.
    Movz,
    /// Insert `imm16` at `shift`, keeping other bits.
    Movk,
}

/// Register or immediate move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Move {
    /// `MOVZ`/`MOVN`/`MOVK`; `shift` is `hw * 16`.
    Wide {
        kind: MoveWideKind,
        sf: bool,
        rd: u8,
        imm16: u16,
        shift: u8,
    },
    /// `MOV Rd, Rm` (ORR with `Rn = ZR`, no shift).
    Register { sf: bool, rd: u8, rm: u8 },
    /// `MOV Rd, #bitmask` (ORR immediate with `Rn = ZR`).
    Immediate { sf: bool, rd: u8, imm: u64 },
    /// `ADR` (`page == false`) or `ADRP`; `offset` is already scaled.
    Address { rd: u8, page: bool, offset: i64 },
}

impl Move {
    /// Address an `ADR`/`ADRP` at `pc` produces; `None` for other moves.
    pub const fn address(&self, pc: u64) -> Option<u64> {
        match *self {
            Move::Address {
                page: false,
                offset,
                ..
            } => Some(pc.wrapping_add(offset as u64)),
            Move::Address {
                page: true, offset, ..
            } => Some((pc & !0xFFF).wrapping_add(offset as u64)),
            _ => None,
        }
    }
}

/// Index register extension in register-offset addressing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum IndexExtend {
    /// 64-bit index (`LSL`/`UXTX`).
    Lsl,
    Uxtw,
    Sxtw,
    Sxtx,
}

/// Effective-address computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Addressing {
    /// `[Rn, #imm]`.
    Offset(i64),
    /// `[Rn, #imm]!`: base updated before the access.
    PreIndex(i64),
    /// `[Rn], #imm`: base updated after the access.
    PostIndex(i64),
    /// `[Rn, Rm{, extend #shift}]`.
    Register {
        rm: u8,
        extend: IndexExtend,
        shift: u8,
    },
}

/// Load or store of one register or a register pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MemAccess {
    /// Transfer register; 31 is ZR for GPRs.
    pub rt: u8,
    /// Second register of `LDP`/`STP`.
    pub rt2: Option<u8>,
    /// Base register; 31 is SP.
    pub rn: u8,
    /// Bytes per register: 1, 2, 4, 8, or 16.
    pub size: u8,
    /// Sign-extend the loaded value.
    pub signed: bool,
    /// Destination of a sign-extending load is 64-bit.
    pub wide: bool,
    /// `rt`/`rt2` are SIMD&FP registers.
    pub vector: bool,
    pub addressing: Addressing,
}

/// Load-acquire/store-release and exclusive accesses: `LDAR`/`STLR`,
/// `LDLAR`/`STLLR`, `LDXR`/`STXR`, `LDAXR`/`STLXR` (all sizes) and the
/// `LDXP`/`STXP`/`LDAXP`/`STLXP` pairs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct OrderedAccess {
    pub load: bool,
    /// Acquire (load) or release (store) semantics.
    pub ordered: bool,
    /// Takes part in the exclusive monitor.
    pub exclusive: bool,
    /// `Ws` of a store-exclusive, written with 0 on success.
    pub status: Option<u8>,
    /// Addressing is always `[Rn]`.
    pub access: MemAccess,
}

/// Memory barrier flavour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Barrier {
    Dmb,
    Dsb,
    Isb,
}

/// Exception-generating and hint instructions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum System {
    /// Supervisor call; `imm` is handed to the syscall layer.
    Svc { imm: u16 },
    /// Breakpoint.
    Brk { imm: u16 },
    /// Halt.
    Hlt { imm: u16 },
    /// `NOP` and other hint-space instructions.
    Nop,
    Barrier(Barrier),
}

/// Scalar floating-point element type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum FpType {
    Single,
    Double,
}

impl FpType {
    const fn from_bits(ty: u32) -> Option<Self> {
        match ty & 3 {
            0 => Some(FpType::Single),
            1 => Some(FpType::Double),
            _ => None,
        }
    }
}

/// Scalar FP two-source operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum FpBinOp {
    Mul,
    Div,
    Add,
    Sub,
    Max,
    Min,
    MaxNum,
    MinNum,
    /// `-(Rn * Rm)`.
    NegMul,
}

/// FP rounding behaviour of `FRINT*`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum FpRound {
    /// Nearest, ties to even (`FRINTN`).
    Nearest,
    /// Toward +∞ (`FRINTP`).
    PlusInf,
    /// Toward −∞ (`FRINTM`).
    MinusInf,
    /// Toward zero (`FRINTZ`).
    Zero,
    /// Nearest, ties away from zero (`FRINTA`).
    TiesAway,
    /// Current FPCR mode, signalling inexact (`FRINTX`).
    Exact,
    /// Current FPCR mode (`FRINTI`).
    Current,
}

/// Scalar FP one-source operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum FpUnOp {
    Mov,
    Abs,
    Neg,
    Sqrt,
    Round(FpRound),
}

/// Scalar floating-point instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Float {
    Binary {
        op: FpBinOp,
        ty: FpType,
        rd: u8,
        rn: u8,
        rm: u8,
    },
    Unary {
        op: FpUnOp,
        ty: FpType,
        rd: u8,
        rn: u8,
    },
    /// `FCVT` between single and double; `from` is the source type.
    Convert { from: FpType, rd: u8, rn: u8 },
    /// `FCMP`/`FCMPE`; `rm = None` compares against `+0.0`.
    Compare {
        ty: FpType,
        rn: u8,
        rm: Option<u8>,
        signaling: bool,
    },
    /// `FCSEL`.
    Select {
        ty: FpType,
        cond: Condition,
        rd: u8,
        rn: u8,
        rm: u8,
    },
    /// `SCVTF`/`UCVTF`: GPR `rn` (`sf` width) to FP `rd`.
    IntToFp {
        signed: bool,
        sf: bool,
        ty: FpType,
        rd: u8,
        rn: u8,
    },
    /// `FCVTZS`/`FCVTZU`/`FCVTNS`: FP `rn` to GPR `rd`.
    FpToInt {
        signed: bool,
        sf: bool,
        ty: FpType,
        round: FpRound,
        rd: u8,
        rn: u8,
    },
    /// `FMOV` between a GPR and an FP register, bit pattern unchanged.
    MovGeneral {
        sf: bool,
        to_fp: bool,
        rd: u8,
        rn: u8,
    },
}

/// NEON three-same operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum VecOp {
    Add,
    Sub,
    Mul,
    /// `Vd += Vn * Vm`.
    Mla,
    /// `Vd -= Vn * Vm`.
    Mls,
    And,
    Bic,
    Orr,
    Orn,
    Eor,
    /// `Vd = (Vd & Vn) | (!Vd & Vm)`.
    Bsl,
    /// `Vd = (Vn & Vm) | (Vd & !Vm)`.
    Bit,
    /// `Vd = (Vd & Vm) | (Vn & !Vm)`.
    Bif,
    CmEq,
    /// Signed `>`.
    CmGt,
    /// Signed `>=`.
    CmGe,
    /// Unsigned `>`.
    CmHi,
    /// Unsigned `>=`.
    CmHs,
    /// `(Vn & Vm) != 0`.
    CmTst,
    SMax,
    SMin,
    UMax,
    UMin,
}

impl VecOp {
    /// Bitwise ops ignore the element size (the size field selects the op).
    pub const fn is_bitwise(self) -> bool {
        matches!(
            self,
            VecOp::And
                | VecOp::Bic
                | VecOp::Orr
                | VecOp::Orn
                | VecOp::Eor
                | VecOp::Bsl
                | VecOp::Bit
                | VecOp::Bif
        )
    }
}

/// NEON shift-by-immediate operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum VecShift {
    Shl,
    Sshr,
    Ushr,
}

/// NEON (Advanced SIMD) instruction. `size` is the raw 2-bit element-size
/// field (`00` byte … `11` doubleword); `q` selects 128-bit operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Vector {
    ThreeSame {
        op: VecOp,
        q: bool,
        size: u8,
        rd: u8,
        rn: u8,
        rm: u8,
    },
    /// `SMULL`/`UMULL` (`q` selects the `2` upper-half form).
    MulLong {
        signed: bool,
        q: bool,
        size: u8,
        rd: u8,
        rn: u8,
        rm: u8,
    },
    ShiftImm {
        op: VecShift,
        q: bool,
        size: u8,
        shift: u8,
        rd: u8,
        rn: u8,
    },
    /// `EXT Vd, Vn, Vm, #index` (byte index).
    Ext {
        q: bool,
        index: u8,
        rd: u8,
        rn: u8,
        rm: u8,
    },
    /// `DUP Vd.T, Rn`.
    Dup { q: bool, size: u8, rd: u8, rn: u8 },
}

/// Branch instruction. Offsets are byte displacements from the branch itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Branch {
    /// `B label`.
    Unconditional { offset: i64 },
    /// `BL label`.
    Link { offset: i64 },
    /// `BR Rn` / `BLR Rn`.
    Register { rn: u8, link: bool },
    /// `RET {Rn}`.
    Return { rn: u8 },
    /// `B.cond label`.
    Conditional { cond: Condition, offset: i64 },
    /// `CBZ`/`CBNZ`.
    CompareZero {
        sf: bool,
        nonzero: bool,
        rt: u8,
        offset: i64,
    },
    /// `TBZ`/`TBNZ`; `bit` is 0–63.
    TestBit {
        nonzero: bool,
        rt: u8,
        bit: u8,
        offset: i64,
    },
}

impl Branch {
    /// Subtype tag.
    pub const fn kind(&self) -> BranchKind {
        match self {
            Branch::Unconditional { .. } => BranchKind::Unconditional,
            Branch::Link { .. } => BranchKind::Link,
            Branch::Register { .. } => BranchKind::Register,
            Branch::Return { .. } => BranchKind::Return,
            Branch::Conditional { .. } => BranchKind::Conditional,
            Branch::CompareZero { .. } => BranchKind::CompareZero,
            Branch::TestBit { .. } => BranchKind::TestBit,
        }
    }

    /// PC-relative displacement, or `None` for register-indirect forms.
    pub const fn offset(&self) -> Option<i64> {
        match *self {
            Branch::Unconditional { offset }
            | Branch::Link { offset }
            | Branch::Conditional { offset, .. }
            | Branch::CompareZero { offset, .. }
            | Branch::TestBit { offset, .. } => Some(offset),
            Branch::Register { .. } | Branch::Return { .. } => None,
        }
    }

    /// Static target for a branch at `pc`, or `None` for register-indirect forms.
    pub fn target(&self, pc: u64) -> Option<u64> {
        self.offset().map(|off| pc.wrapping_add(off as u64))
    }
}

// ─── Decoded instruction ─────────────────────────────────────────────────────

/// A decoded AArch64 instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Instruction {
    Alu(Alu),
    Branch(Branch),
    Compare(Compare),
    Move(Move),
    Load(MemAccess),
    Store(MemAccess),
    /// Ordered or exclusive load/store.
    Ordered(OrderedAccess),
    System(System),
    Float(Float),
    Vector(Vector),
    /// No template matched; carries the raw word.
    Unknown(u32),
}

impl Instruction {
    /// Family tag.
    pub const fn class(&self) -> InstrClass {
        match self {
            Instruction::Alu(_) => InstrClass::Alu,
            Instruction::Branch(_) => InstrClass::Branch,
            Instruction::Compare(_) => InstrClass::Compare,
            Instruction::Move(_) => InstrClass::Move,
            Instruction::Load(_) => InstrClass::Load,
            Instruction::Store(_) => InstrClass::Store,
            Instruction::Ordered(OrderedAccess { load: true, .. }) => InstrClass::Load,
            Instruction::Ordered(_) => InstrClass::Store,
            Instruction::System(_) => InstrClass::System,
            Instruction::Float(_) => InstrClass::FloatingPoint,
            Instruction::Vector(_) => InstrClass::Vector,
            Instruction::Unknown(_) => InstrClass::Unknown,
        }
    }

    /// `false` only for [`Instruction::Unknown`].
    #[inline]
    pub const fn is_known(&self) -> bool {
        !matches!(self, Instruction::Unknown(_))
    }

    /// Whether control may leave the straight-line sequence after this
    /// instruction (branches and exception-generating instructions).
    pub const fn ends_block(&self) -> bool {
        matches!(
            self,
            Instruction::Branch(_)
                | Instruction::System(System::Svc { .. } | System::Brk { .. } | System::Hlt { .. })
        )
    }
}

// ─── Field extraction ────────────────────────────────────────────────────────

#[inline]
const fn bits(word: u32, lo: u32, width: u32) -> u32 {
    (word >> lo) & ((1 << width) - 1)
}

#[inline]
const fn reg(word: u32, lo: u32) -> u8 {
    bits(word, lo, 5) as u8
}

/// Sign-extend the low `width` bits of `value`.
#[inline]
const fn sign_extend(value: u32, width: u32) -> i64 {
    let shift = 64 - width;
    ((value as i64) << shift) >> shift
}

/// imm26 word offset, scaled to bytes.
#[inline]
const fn imm26(word: u32) -> i64 {
    sign_extend(word & 0x03FF_FFFF, 26) << 2
}

/// imm19 word offset at bits 5..24, scaled to bytes.
#[inline]
const fn imm19(word: u32) -> i64 {
    sign_extend(bits(word, 5, 19), 19) << 2
}

/// imm14 word offset at bits 5..19, scaled to bytes.
#[inline]
const fn imm14(word: u32) -> i64 {
    sign_extend(bits(word, 5, 14), 14) << 2
}

// ─── Entry points ────────────────────────────────────────────────────────────

/// Decode one instruction word.
///
/// Templates are tried in a fixed priority order: branches, then
/// data-processing (register and immediate, with compares recognised as
/// flag-setting forms that discard the result), move-wide, loads and stores,
/// system, scalar floating point, and finally Advanced SIMD.
pub fn decode(word: u32) -> Instruction {
    decode_branch(word)
        .or_else(|| decode_dp_register(word))
        .or_else(|| decode_dp_immediate(word))
        .or_else(|| decode_move_wide(word))
        .or_else(|| decode_load_store(word))
        .or_else(|| decode_system(word))
        .or_else(|| decode_float(word))
        .or_else(|| decode_vector(word))
        .unwrap_or(Instruction::Unknown(word))
}

/// [`decode`], mapping [`Instruction::Unknown`] to [`DbtError::Decode`].
///
/// # Errors
///
/// Returns [`DbtError::Decode`] if `word` matches no template.
pub fn try_decode(word: u32, pc: u64) -> Result<Instruction, DbtError> {
    match decode(word) {
        Instruction::Unknown(encoding) => {
            log::warn!("{pc:#x}: undecodable instruction {encoding:#010x}");
            Err(DbtError::Decode { encoding, pc })
        }
        insn => Ok(insn),
    }
}

/// Static target of a PC-relative branch at `pc`.
///
/// Returns `None` for register-indirect branches (`BR`/`BLR`/`RET`), whose
/// target is only known at run time, and for non-branches.
pub fn compute_branch_target(word: u32, pc: u64) -> Option<u64> {
    match decode_branch(word)? {
        Instruction::Branch(b) => b.target(pc),
        _ => None,
    }
}

// ─── Branches ────────────────────────────────────────────────────────────────

fn decode_branch(w: u32) -> Option<Instruction> {
    let b = match w {
        _ if w & 0xFC00_0000 == 0x1400_0000 => Branch::Unconditional { offset: imm26(w) },
        _ if w & 0xFC00_0000 == 0x9400_0000 => Branch::Link { offset: imm26(w) },
        _ if w & 0xFFFF_FC1F == 0xD61F_0000 => Branch::Register {
            rn: reg(w, 5),
            link: false,
        },
        _ if w & 0xFFFF_FC1F == 0xD63F_0000 => Branch::Register {
            rn: reg(w, 5),
            link: true,
        },
        _ if w & 0xFFFF_FC1F == 0xD65F_0000 => Branch::Return { rn: reg(w, 5) },
        _ if w & 0xFF00_0010 == 0x5400_0000 => Branch::Conditional {
            cond: Condition::from_bits(w),
            offset: imm19(w),
        },
        _ if w & 0x7E00_0000 == 0x3400_0000 => Branch::CompareZero {
            sf: w >> 31 != 0,
            nonzero: w & 0x0100_0000 != 0,
            rt: reg(w, 0),
            offset: imm19(w),
        },
        _ if w & 0x7E00_0000 == 0x3600_0000 => Branch::TestBit {
            nonzero: w & 0x0100_0000 != 0,
            rt: reg(w, 0),
            bit: (((w >> 31) << 5) | bits(w, 19, 5)) as u8,
            offset: imm14(w),
        },
        _ => return None,
    };
    Some(Instruction::Branch(b))
}

// ─── Data processing (register) ──────────────────────────────────────────────

fn decode_dp_register(w: u32) -> Option<Instruction> {
    let sf = w >> 31 != 0;
    let rd = reg(w, 0);
    let rn = reg(w, 5);
    let rm = reg(w, 16);

    // Logical (shifted register).
    if w & 0x1F00_0000 == 0x0A00_0000 {
        let amount = bits(w, 10, 6) as u8;
        if !sf && amount >= 32 {
            return None;
        }
        let shift = ShiftType::from_bits(bits(w, 22, 2));
        let negate = w & 0x0020_0000 != 0;
        let operand = Operand2::Shifted { rm, shift, amount };
        let (op, set_flags) = match (bits(w, 29, 2), negate) {
            (0b00, false) => (AluOp::And, false),
            (0b00, true) => (AluOp::Bic, false),
            (0b01, false) => (AluOp::Orr, false),
            (0b01, true) => (AluOp::Orn, false),
            (0b10, false) => (AluOp::Eor, false),
            (0b10, true) => (AluOp::Eon, false),
            (_, false) => (AluOp::And, true),
            (_, true) => (AluOp::Bic, true),
        };
        if set_flags && op == AluOp::And && rd == 31 {
            return Some(Instruction::Compare(Compare {
                kind: CompareKind::Tst,
                sf,
                rn,
                operand,
            }));
        }
        if rn == 31 && op == AluOp::Orn {
            return Some(Instruction::Alu(Alu::Mvn {
                sf,
                rd,
                rm,
                shift,
                amount,
            }));
        }
        if rn == 31 && op == AluOp::Orr && amount == 0 {
            return Some(Instruction::Move(Move::Register { sf, rd, rm }));
        }
        return Some(Instruction::Alu(Alu::Binary {
            op,
            sf,
            set_flags,
            sp: false,
            rd,
            rn,
            operand,
        }));
    }

    // Add/subtract (shifted register).
    if w & 0x1F20_0000 == 0x0B00_0000 {
        let shift = bits(w, 22, 2);
        let amount = bits(w, 10, 6) as u8;
        if shift == 0b11 || (!sf && amount >= 32) {
            return None;
        }
        let operand = Operand2::Shifted {
            rm,
            shift: ShiftType::from_bits(shift),
            amount,
        };
        return Some(add_sub(w, sf, rd, rn, operand, false));
    }

    // Data-processing (3 source).
    if w & 0x7F00_0000 == 0x1B00_0000 {
        let ra = reg(w, 10);
        let o0 = w & 0x8000 != 0;
        return match bits(w, 21, 3) {
            0b000 => Some(Instruction::Alu(Alu::MulAdd {
                sf,
                negate: o0,
                rd,
                rn,
                rm,
                ra,
            })),
            0b010 if sf && !o0 => Some(Instruction::Alu(Alu::MulHigh {
                signed: true,
                rd,
                rn,
                rm,
            })),
            0b110 if sf && !o0 => Some(Instruction::Alu(Alu::MulHigh {
                signed: false,
                rd,
                rn,
                rm,
            })),
            _ => None,
        };
    }

    // Data-processing (2 source).
    if w & 0x7FE0_0000 == 0x1AC0_0000 {
        let insn = match bits(w, 10, 6) {
            0b00_0010 => Alu::Div {
                sf,
                signed: false,
                rd,
                rn,
                rm,
            },
            0b00_0011 => Alu::Div {
                sf,
                signed: true,
                rd,
                rn,
                rm,
            },
            op @ 0b00_1000..=0b00_1011 => Alu::ShiftVar {
                sf,
                kind: ShiftType::from_bits(op),
                rd,
                rn,
                rm,
            },
            _ => return None,
        };
        return Some(Instruction::Alu(insn));
    }

    // Data-processing (1 source).
    if w & 0x7FFF_0000 == 0x5AC0_0000 {
        let op = match (bits(w, 10, 6), sf) {
            (0b00_0000, _) => BitOp::Rbit,
            (0b00_0001, _) => BitOp::Rev16,
            (0b00_0010, false) | (0b00_0011, true) => BitOp::Rev,
            (0b00_0010, true) => BitOp::Rev32,
            (0b00_0100, _) => BitOp::Clz,
            _ => return None,
        };
        return Some(Instruction::Alu(Alu::Unary { sf, op, rd, rn }));
    }

    // Conditional select.
    if w & 0x3FE0_0800 == 0x1A80_0000 {
        let op = match (w & 0x4000_0000 != 0, w & 0x400 != 0) {
            (false, false) => SelectOp::Csel,
            (false, true) => SelectOp::Csinc,
            (true, false) => SelectOp::Csinv,
            (true, true) => SelectOp::Csneg,
        };
        return Some(Instruction::Alu(Alu::CondSelect {
            sf,
            op,
            cond: Condition::from_bits(bits(w, 12, 4)),
            rd,
            rn,
            rm,
        }));
    }

    None
}

/// ADD/SUB/ADDS/SUBS in either operand form, folding `Rd = ZR` flag-setting
/// forms into CMP/CMN.
fn add_sub(w: u32, sf: bool, rd: u8, rn: u8, operand: Operand2, sp: bool) -> Instruction {
    let sub = w & 0x4000_0000 != 0;
    let set_flags = w & 0x2000_0000 != 0;
    if set_flags && rd == 31 {
        return Instruction::Compare(Compare {
            kind: if sub { CompareKind::Cmp } else { CompareKind::Cmn },
            sf,
            rn,
            operand,
        });
    }
    Instruction::Alu(Alu::Binary {
        op: if sub { AluOp::Sub } else { AluOp::Add },
        sf,
        set_flags,
        sp,
        rd,
        rn,
        operand,
    })
}

// ─── Data processing (immediate) ─────────────────────────────────────────────

fn decode_dp_immediate(w: u32) -> Option<Instruction> {
    let sf = w >> 31 != 0;
    let rd = reg(w, 0);
    let rn = reg(w, 5);

    // PC-relative addressing.
    if w & 0x1F00_0000 == 0x1000_0000 {
        let imm = sign_extend((bits(w, 5, 19) << 2) | bits(w, 29, 2), 21);
        let page = w >> 31 != 0;
        return Some(Instruction::Move(Move::Address {
            rd,
            page,
            offset: if page { imm << 12 } else { imm },
        }));
    }

    // Add/subtract (immediate).
    if w & 0x1F80_0000 == 0x1100_0000 {
        let imm12 = u64::from(bits(w, 10, 12));
        let imm = if w & 0x0040_0000 != 0 { imm12 << 12 } else { imm12 };
        return Some(add_sub(w, sf, rd, rn, Operand2::Imm(imm), true));
    }

    // Logical (immediate).
    if w & 0x1F80_0000 == 0x1200_0000 {
        let imm = decode_bit_masks(bits(w, 22, 1), bits(w, 10, 6), bits(w, 16, 6), sf)?;
        let operand = Operand2::Imm(imm);
        let insn = match bits(w, 29, 2) {
            0b00 => Alu::Binary {
                op: AluOp::And,
                sf,
                set_flags: false,
                sp: false,
                rd,
                rn,
                operand,
            },
            0b01 if rn == 31 => return Some(Instruction::Move(Move::Immediate { sf, rd, imm })),
            0b01 => Alu::Binary {
                op: AluOp::Orr,
                sf,
                set_flags: false,
                sp: false,
                rd,
                rn,
                operand,
            },
            0b10 => Alu::Binary {
                op: AluOp::Eor,
                sf,
                set_flags: false,
                sp: false,
                rd,
                rn,
                operand,
            },
            _ if rd == 31 => {
                return Some(Instruction::Compare(Compare {
                    kind: CompareKind::Tst,
                    sf,
                    rn,
                    operand,
                }))
            }
            _ => Alu::Binary {
                op: AluOp::And,
                sf,
                set_flags: true,
                sp: false,
                rd,
                rn,
                operand,
            },
        };
        return Some(Instruction::Alu(insn));
    }

    // Bitfield.
    if w & 0x1F80_0000 == 0x1300_0000 {
        let immr = bits(w, 16, 6) as u8;
        let imms = bits(w, 10, 6) as u8;
        let n = w & 0x0040_0000 != 0;
        if n != sf || (!sf && (immr >= 32 || imms >= 32)) {
            return None;
        }
        let kind = match bits(w, 29, 2) {
            0b00 => BitfieldKind::Signed,
            0b01 => BitfieldKind::Insert,
            0b10 => BitfieldKind::Unsigned,
            _ => return None,
        };
        return Some(Instruction::Alu(Alu::Bitfield {
            kind,
            sf,
            rd,
            rn,
            immr,
            imms,
        }));
    }

    // Extract.
    if w & 0x7FA0_0000 == 0x1380_0000 {
        let lsb = bits(w, 10, 6) as u8;
        let n = w & 0x0040_0000 != 0;
        if n != sf || (!sf && lsb >= 32) {
            return None;
        }
        return Some(Instruction::Alu(Alu::Extract {
            sf,
            rd,
            rn,
            rm: reg(w, 16),
            lsb,
        }));
    }

    None
}

/// Expand a logical-immediate `N:immr:imms` triple into its bitmask.
///
/// Returns `None` for the reserved encodings (all-ones element, `N = 1`
/// with a 32-bit operand).
pub fn decode_bit_masks(n: u32, imms: u32, immr: u32, sf: bool) -> Option<u64> {
    let combined = (n << 6) | (!imms & 0x3F);
    if combined == 0 {
        return None;
    }
    let len = 31 - combined.leading_zeros();
    if len < 1 || (!sf && n == 1) {
        return None;
    }
    let esize = 1u32 << len;
    let levels = esize - 1;
    let s = imms & levels;
    let r = immr & levels;
    if s == levels {
        return None;
    }
    let welem: u64 = (1u64 << (s + 1)) - 1;
    let emask = if esize == 64 { u64::MAX } else { (1u64 << esize) - 1 };
    let elem = if r == 0 {
        welem
    } else {
        ((welem >> r) | (welem << (esize - r))) & emask
    };
    let mut value = 0u64;
    let mut i = 0;
    while i < 64 {
        value |= elem << i;
        i += esize;
    }
    Some(if sf { value } else { value & 0xFFFF_FFFF })
}

// ─── Move wide ───────────────────────────────────────────────────────────────

fn decode_move_wide(w: u32) -> Option<Instruction> {
    if w & 0x1F80_0000 != 0x1280_0000 {
        return None;
    }
    let sf = w >> 31 != 0;
    let hw = bits(w, 21, 2);
    if !sf && hw >= 2 {
        return None;
    }
    let kind = match bits(w, 29, 2) {
        0b00 => MoveWideKind::Movn,
        0b10 => MoveWideKind::Movz,
        0b11 => MoveWideKind::Movk,
        _ => return None,
    };
    Some(Instruction::Move(Move::Wide {
        kind,
        sf,
        rd: reg(w, 0),
        imm16: bits(w, 5, 16) as u16,
        shift: (hw * 16) as u8,
    }))
}

// ─── Loads and stores ────────────────────────────────────────────────────────

/// Size/opc decode shared by the single-register forms.
///
/// Returns `(load, bytes, signed, wide)` or `None` for prefetch and
/// unallocated combinations.
fn single_reg_kind(size: u32, opc: u32, vector: bool) -> Option<(bool, u8, bool, bool)> {
    if vector {
        return match (size, opc) {
            (0b00, 0b10) => Some((false, 16, false, false)),
            (0b00, 0b11) => Some((true, 16, false, false)),
            (_, 0b00) => Some((false, 1 << size, false, false)),
            (_, 0b01) => Some((true, 1 << size, false, false)),
            _ => None,
        };
    }
    let bytes = 1u8 << size;
    match (size, opc) {
        (_, 0b00) => Some((false, bytes, false, false)),
        (_, 0b01) => Some((true, bytes, false, false)),
        (0b11, _) => None,
        (0b10, 0b10) => Some((true, 4, true, true)),
        (0b10, _) => None,
        (_, 0b10) => Some((true, bytes, true, true)),
        _ => Some((true, bytes, true, false)),
    }
}

fn access(load: bool, m: MemAccess) -> Instruction {
    if load {
        Instruction::Load(m)
    } else {
        Instruction::Store(m)
    }
}

fn decode_load_store(w: u32) -> Option<Instruction> {
    let rt = reg(w, 0);
    let rn = reg(w, 5);
    let vector = w & 0x0400_0000 != 0;
    let size = bits(w, 30, 2);
    let opc = bits(w, 22, 2);

    // Unsigned immediate offset.
    if w & 0x3B00_0000 == 0x3900_0000 {
        let (load, bytes, signed, wide) = single_reg_kind(size, opc, vector)?;
        let offset = i64::from(bits(w, 10, 12)) * i64::from(bytes);
        return Some(access(
            load,
            MemAccess {
                rt,
                rt2: None,
                rn,
                size: bytes,
                signed,
                wide,
                vector,
                addressing: Addressing::Offset(offset),
            },
        ));
    }

    // Unscaled immediate / pre-index / post-index.
    if w & 0x3B20_0000 == 0x3800_0000 {
        let (load, bytes, signed, wide) = single_reg_kind(size, opc, vector)?;
        let imm9 = sign_extend(bits(w, 12, 9), 9);
        let addressing = match bits(w, 10, 2) {
            0b00 => Addressing::Offset(imm9),
            0b01 => Addressing::PostIndex(imm9),
            0b11 => Addressing::PreIndex(imm9),
            _ => return None,
        };
        return Some(access(
            load,
            MemAccess {
                rt,
                rt2: None,
                rn,
                size: bytes,
                signed,
                wide,
                vector,
                addressing,
            },
        ));
    }

    // Register offset.
    if w & 0x3B20_0C00 == 0x3820_0800 {
        let (load, bytes, signed, wide) = single_reg_kind(size, opc, vector)?;
        let extend = match bits(w, 13, 3) {
            0b010 => IndexExtend::Uxtw,
            0b011 => IndexExtend::Lsl,
            0b110 => IndexExtend::Sxtw,
            0b111 => IndexExtend::Sxtx,
            _ => return None,
        };
        let shift = if w & 0x1000 != 0 {
            bytes.trailing_zeros() as u8
        } else {
            0
        };
        return Some(access(
            load,
            MemAccess {
                rt,
                rt2: None,
                rn,
                size: bytes,
                signed,
                wide,
                vector,
                addressing: Addressing::Register {
                    rm: reg(w, 16),
                    extend,
                    shift,
                },
            },
        ));
    }

    // Register pair.
    if w & 0x3A00_0000 == 0x2800_0000 {
        let load = w & 0x0040_0000 != 0;
        let pair_opc = bits(w, 30, 2);
        let (scale, signed) = match (vector, pair_opc) {
            (true, 0b11) => return None,
            (true, o) => (2 + o, false),
            (false, 0b00) => (2, false),
            (false, 0b01) if load => (2, true),
            (false, 0b10) => (3, false),
            _ => return None,
        };
        let offset = sign_extend(bits(w, 15, 7), 7) << scale;
        let addressing = match bits(w, 23, 2) {
            0b00 | 0b10 => Addressing::Offset(offset),
            0b01 => Addressing::PostIndex(offset),
            _ => Addressing::PreIndex(offset),
        };
        return Some(access(
            load,
            MemAccess {
                rt,
                rt2: Some(reg(w, 10)),
                rn,
                size: 1 << scale,
                signed,
                wide: signed,
                vector,
                addressing,
            },
        ));
    }

    // Exclusive, load-acquire and store-release.
    if w & 0x3F00_0000 == 0x0800_0000 {
        return decode_ordered(w);
    }

    // LD1/ST1 (multiple structures, one register, no offset).
    if w & 0xBFBF_F000 == 0x0C00_7000 {
        let q = w & 0x4000_0000 != 0;
        return Some(access(
            w & 0x0040_0000 != 0,
            MemAccess {
                rt,
                rt2: None,
                rn,
                size: if q { 16 } else { 8 },
                signed: false,
                wide: false,
                vector: true,
                addressing: Addressing::Offset(0),
            },
        ));
    }

    None
}

fn decode_ordered(w: u32) -> Option<Instruction> {
    let size = bits(w, 30, 2);
    let load = w & 0x0040_0000 != 0;
    let pair = w & 0x0020_0000 != 0;
    let ordered = w & 0x8000 != 0;
    let exclusive = w & 0x0080_0000 == 0;
    let rt2 = match (exclusive, pair) {
        (_, false) => None,
        // LDXP/STXP: two registers of 32 or 64 bits.
        (true, true) if size >= 0b10 => Some(reg(w, 10)),
        // CASP and CAS.
        _ => return None,
    };
    Some(Instruction::Ordered(OrderedAccess {
        load,
        // LDLAR/STLLR (o0 = 0) order within a limited region; treated as LDAR/STLR.
        ordered: ordered || !exclusive,
        exclusive,
        status: (exclusive && !load).then(|| reg(w, 16)),
        access: MemAccess {
            rt: reg(w, 0),
            rt2,
            rn: reg(w, 5),
            size: 1 << size,
            signed: false,
            wide: false,
            vector: false,
            addressing: Addressing::Offset(0),
        },
    }))
}

// ─── System ──────────────────────────────────────────────────────────────────

fn decode_system(w: u32) -> Option<Instruction> {
    let imm = bits(w, 5, 16) as u16;
    let sys = match w {
        _ if w & 0xFFE0_001F == 0xD400_0001 => System::Svc { imm },
        _ if w & 0xFFE0_001F == 0xD420_0000 => System::Brk { imm },
        _ if w & 0xFFE0_001F == 0xD440_0000 => System::Hlt { imm },
        _ if w & 0xFFFF_F01F == 0xD503_201F => System::Nop,
        _ if w & 0xFFFF_F0FF == 0xD503_30BF => System::Barrier(Barrier::Dmb),
        _ if w & 0xFFFF_F0FF == 0xD503_309F => System::Barrier(Barrier::Dsb),
        _ if w & 0xFFFF_F0FF == 0xD503_30DF => System::Barrier(Barrier::Isb),
        _ => return None,
    };
    Some(Instruction::System(sys))
}

// ─── Scalar floating point ───────────────────────────────────────────────────

fn decode_float(w: u32) -> Option<Instruction> {
    let rd = reg(w, 0);
    let rn = reg(w, 5);
    let rm = reg(w, 16);

    // Conversions between FP and integer.
    if w & 0x7F20_FC00 == 0x1E20_0000 {
        return decode_fp_int(w, rd, rn).map(Instruction::Float);
    }

    // Only single and double precision are modelled.
    let ty = FpType::from_bits(bits(w, 22, 2));

    let f = if w & 0xFF20_0C00 == 0x1E20_0800 {
        let op = match bits(w, 12, 4) {
            0x0 => FpBinOp::Mul,
            0x1 => FpBinOp::Div,
            0x2 => FpBinOp::Add,
            0x3 => FpBinOp::Sub,
            0x4 => FpBinOp::Max,
            0x5 => FpBinOp::Min,
            0x6 => FpBinOp::MaxNum,
            0x7 => FpBinOp::MinNum,
            0x8 => FpBinOp::NegMul,
            _ => return None,
        };
        Float::Binary {
            op,
            ty: ty?,
            rd,
            rn,
            rm,
        }
    } else if w & 0xFF20_7C00 == 0x1E20_4000 {
        let ty = ty?;
        let op = match bits(w, 15, 6) {
            0x00 => FpUnOp::Mov,
            0x01 => FpUnOp::Abs,
            0x02 => FpUnOp::Neg,
            0x03 => FpUnOp::Sqrt,
            0x04 if ty == FpType::Double => {
                return Some(Instruction::Float(Float::Convert { from: ty, rd, rn }))
            }
            0x05 if ty == FpType::Single => {
                return Some(Instruction::Float(Float::Convert { from: ty, rd, rn }))
            }
            0x08 => FpUnOp::Round(FpRound::Nearest),
            0x09 => FpUnOp::Round(FpRound::PlusInf),
            0x0A => FpUnOp::Round(FpRound::MinusInf),
            0x0B => FpUnOp::Round(FpRound::Zero),
            0x0C => FpUnOp::Round(FpRound::TiesAway),
            0x0E => FpUnOp::Round(FpRound::Exact),
            0x0F => FpUnOp::Round(FpRound::Current),
            _ => return None,
        };
        Float::Unary { op, ty, rd, rn }
    } else if w & 0xFF20_FC07 == 0x1E20_2000 {
        let with_zero = w & 0x8 != 0;
        Float::Compare {
            ty: ty?,
            rn,
            rm: if with_zero { None } else { Some(rm) },
            signaling: w & 0x10 != 0,
        }
    } else if w & 0xFF20_0C00 == 0x1E20_0C00 {
        Float::Select {
            ty: ty?,
            cond: Condition::from_bits(bits(w, 12, 4)),
            rd,
            rn,
            rm,
        }
    } else {
        return None;
    };
    Some(Instruction::Float(f))
}

fn decode_fp_int(w: u32, rd: u8, rn: u8) -> Option<Float> {
    let sf = w >> 31 != 0;
    let ty_bits = bits(w, 22, 2);
    let rmode = bits(w, 19, 2);
    let opcode = bits(w, 16, 3);
    match (rmode, opcode) {
        (0b00, 0b110 | 0b111) => {
            // FMOV general: the register width must match the FP type.
            let ok = matches!((sf, ty_bits), (false, 0b00) | (true, 0b01));
            ok.then_some(Float::MovGeneral {
                sf,
                to_fp: opcode == 0b111,
                rd,
                rn,
            })
        }
        (0b00, 0b010 | 0b011) => Some(Float::IntToFp {
            signed: opcode == 0b010,
            sf,
            ty: FpType::from_bits(ty_bits)?,
            rd,
            rn,
        }),
        (0b00, 0b000) => Some(Float::FpToInt {
            signed: true,
            sf,
            ty: FpType::from_bits(ty_bits)?,
            round: FpRound::Nearest,
            rd,
            rn,
        }),
        (0b11, 0b000 | 0b001) => Some(Float::FpToInt {
            signed: opcode == 0b000,
            sf,
            ty: FpType::from_bits(ty_bits)?,
            round: FpRound::Zero,
            rd,
            rn,
        }),
        _ => None,
    }
}

// ─── Advanced SIMD ───────────────────────────────────────────────────────────

fn decode_vector(w: u32) -> Option<Instruction> {
    let q = w & 0x4000_0000 != 0;
    let u = w & 0x2000_0000 != 0;
    let size = bits(w, 22, 2) as u8;
    let rd = reg(w, 0);
    let rn = reg(w, 5);
    let rm = reg(w, 16);

    // Three same.
    if w & 0x9F20_0400 == 0x0E20_0400 {
        let op = match (u, bits(w, 11, 5)) {
            (false, 0b10000) => VecOp::Add,
            (true, 0b10000) => VecOp::Sub,
            (false, 0b10011) if size != 3 => VecOp::Mul,
            (false, 0b10010) if size != 3 => VecOp::Mla,
            (true, 0b10010) if size != 3 => VecOp::Mls,
            (true, 0b10001) => VecOp::CmEq,
            (false, 0b10001) => VecOp::CmTst,
            (false, 0b00110) => VecOp::CmGt,
            (true, 0b00110) => VecOp::CmHi,
            (false, 0b00111) => VecOp::CmGe,
            (true, 0b00111) => VecOp::CmHs,
            (false, 0b01100) if size != 3 => VecOp::SMax,
            (true, 0b01100) if size != 3 => VecOp::UMax,
            (false, 0b01101) if size != 3 => VecOp::SMin,
            (true, 0b01101) if size != 3 => VecOp::UMin,
            (false, 0b00011) => [VecOp::And, VecOp::Bic, VecOp::Orr, VecOp::Orn][size as usize],
            (true, 0b00011) => [VecOp::Eor, VecOp::Bsl, VecOp::Bit, VecOp::Bif][size as usize],
            _ => return None,
        };
        // 64-bit lanes need the full register.
        if size == 3 && !q && !op.is_bitwise() {
            return None;
        }
        return Some(Instruction::Vector(Vector::ThreeSame {
            op,
            q,
            size,
            rd,
            rn,
            rm,
        }));
    }

    // Three different: SMULL/UMULL.
    if w & 0x9F20_FC00 == 0x0E20_C000 {
        if size == 3 {
            return None;
        }
        return Some(Instruction::Vector(Vector::MulLong {
            signed: !u,
            q,
            size,
            rd,
            rn,
            rm,
        }));
    }

    // Shift by immediate.
    if w & 0x9F80_0400 == 0x0F00_0400 {
        let immh = bits(w, 19, 4);
        if immh == 0 {
            return None;
        }
        let hsb = 31 - immh.leading_zeros();
        if hsb == 3 && !q {
            return None;
        }
        let esize = 8u32 << hsb;
        let immhb = bits(w, 16, 7);
        let (op, shift) = match (u, bits(w, 11, 5)) {
            (false, 0b01010) => (VecShift::Shl, immhb - esize),
            (false, 0b00000) => (VecShift::Sshr, 2 * esize - immhb),
            (true, 0b00000) => (VecShift::Ushr, 2 * esize - immhb),
            _ => return None,
        };
        return Some(Instruction::Vector(Vector::ShiftImm {
            op,
            q,
            size: hsb as u8,
            shift: shift as u8,
            rd,
            rn,
        }));
    }

    // EXT.
    if w & 0xBFE0_8400 == 0x2E00_0000 {
        let index = bits(w, 11, 4) as u8;
        if !q && index >= 8 {
            return None;
        }
        return Some(Instruction::Vector(Vector::Ext {
            q,
            index,
            rd,
            rn,
            rm,
        }));
    }

    // DUP (general).
    if w & 0xBFE0_FC00 == 0x0E00_0C00 {
        let imm5 = bits(w, 16, 5);
        if imm5 & 0xF == 0 {
            return None;
        }
        let size = imm5.trailing_zeros() as u8;
        if size == 3 && !q {
            return None;
        }
        return Some(Instruction::Vector(Vector::Dup { q, size, rd, rn }));
    }

    None
}
