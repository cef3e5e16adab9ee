//! Guest instruction → host code semantic mapping.
//!
//! A [`Translator`] takes one decoded AArch64 instruction at a time and
//! appends an x86-64 sequence with the same architectural effect to a
//! [`CodeBuffer`]. The per-family mappings live in submodules:
//!
//! - `alu`: integer data processing, compares, moves, multiply/divide
//! - `branch`: direct, conditional, and register branches
//! - `mem`: loads and stores, including pairs and SIMD&FP registers
//! - `fp`: scalar floating point
//! - `neon`: Advanced SIMD
//! - `system`: exception generation, hints, barriers
//!
//! ## Guest state
//!
//! Guest registers live in host registers ([`map_gpr`](crate::regmap::map_gpr),
//! [`map_xmm`](crate::regmap::map_xmm)). Guest `X4` lives in `RSP`, so
//! translated code never touches the host stack: no `PUSH`, `POP`, `CALL`,
//! or `RET` is emitted, and temporaries go to the configured scratch
//! registers only.
//!
//! Guest NZCV lives in host EFLAGS. x86 arithmetic leaves the carry flag
//! with a different meaning depending on the operation, so the translator
//! remembers which kind of instruction produced the current flags
//! ([`FlagOrigin`]) and picks host conditions accordingly. Sequences that
//! need the host flags for their own purposes mark them
//! [`FlagState::Clobbered`]; a later flag reader in the same block then
//! fails with [`DbtError::Unsupported`] rather than test stale flags.
//!
//! Between blocks the flags are always in compare form
//! ([`FlagOrigin::Sub`]): before the first exit of a block, flags produced
//! by an addition get their carry complemented and flags produced by a
//! float compare are rebuilt with a `CMP`. Each [`Exit`] records the state
//! it leaves, so a successor reached from a clobbering block can be
//! translated with
//! [`entry_flags`](crate::config::TranslatorConfig::entry_flags) set to
//! `Clobbered`.
//!
//! ## Block exits
//!
//! Every transfer out of the translated code is a `JMP`/`Jcc rel32` whose
//! placeholder is recorded as an [`Exit`]. Indirect exits leave the guest
//! target address in the scratch GPR.

mod alu;
mod branch;
mod fp;
mod mem;
mod neon;
mod system;

use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;

use crate::buffer::CodeBuffer;
use crate::config::TranslatorConfig;
use crate::context::CpuContext;
use crate::decoder::Instruction;
use crate::encoder::{
    emit_alu_ri, emit_cmc, emit_jcc_rel32, emit_jmp_rel32, emit_lea, emit_mov_reg_imm32,
    emit_mov_reg_imm64, AluOp, Mem, Width,
};
use crate::error::DbtError;
use crate::regmap::{Condition, HostCondition, GUEST_ZR};

// ─── Control flow ────────────────────────────────────────────────────────────

/// Whether translation of the block continues after an instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Straight-line code; the next guest instruction follows.
    Continue,
    /// The instruction ended the block with one or more exits.
    Exit,
}

/// What kind of transfer an [`Exit`] performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ExitKind {
    /// `B`.
    Jump,
    /// `BL`; the return address is already in the guest link register.
    Call,
    /// Taken side of a conditional branch.
    Conditional,
    /// Continue at the next guest instruction in another block.
    FallThrough,
    /// `BR`; the guest target is in the scratch GPR.
    Indirect,
    /// `BLR`; the guest target is in the scratch GPR.
    IndirectCall,
    /// `RET`; the guest target is in the scratch GPR.
    Return,
    /// `SVC #imm`; the guest target is the instruction after it.
    Syscall(u16),
    /// `BRK #imm`; the guest target is the `BRK` itself.
    Breakpoint(u16),
    /// `HLT #imm`; the guest target is the `HLT` itself.
    Halt(u16),
}

impl ExitKind {
    /// The target is only known at run time.
    #[inline]
    pub const fn is_indirect(self) -> bool {
        matches!(
            self,
            ExitKind::Indirect | ExitKind::IndirectCall | ExitKind::Return
        )
    }
}

impl fmt::Display for ExitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitKind::Jump => write!(f, "jump"),
            ExitKind::Call => write!(f, "call"),
            ExitKind::Conditional => write!(f, "conditional"),
            ExitKind::FallThrough => write!(f, "fall-through"),
            ExitKind::Indirect => write!(f, "indirect"),
            ExitKind::IndirectCall => write!(f, "indirect call"),
            ExitKind::Return => write!(f, "return"),
            ExitKind::Syscall(imm) => write!(f, "svc #{:#x}", imm),
            ExitKind::Breakpoint(imm) => write!(f, "brk #{:#x}", imm),
            ExitKind::Halt(imm) => write!(f, "hlt #{:#x}", imm),
        }
    }
}

/// One unresolved transfer out of the block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Exit {
    /// Buffer offset of the rel32 placeholder.
    pub offset: usize,
    /// Guest address control continues at, when statically known.
    pub guest_target: Option<u64>,
    pub kind: ExitKind,
    /// Host flags when control leaves through this exit.
    pub flags: FlagState,
}

// ─── Flags ───────────────────────────────────────────────────────────────────

/// Which host instruction family produced the flags now in EFLAGS.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum FlagOrigin {
    /// `CMP`/`SUB`/`NEG`: CF is the borrow, the inverse of ARM's C.
    Sub,
    /// `ADD`/`TEST`/`AND`: CF matches ARM's C (zero for logical results).
    Add,
    /// `UCOMISS`/`COMISD`…: ZF/PF/CF encode the FP comparison.
    Float,
}

impl FlagOrigin {
    /// Host test equivalent to the guest condition over flags of this origin.
    pub(crate) const fn predicate(self, cond: Condition) -> Predicate {
        use Condition as C;
        use HostCondition as H;
        if cond.is_always() {
            return Predicate::Always;
        }
        match self {
            FlagOrigin::Sub => match cond.to_host() {
                Some(cc) => Predicate::One(cc),
                None => Predicate::Always,
            },
            FlagOrigin::Add => match cond {
                C::Cs => Predicate::One(H::B),
                C::Cc => Predicate::One(H::Ae),
                C::Hi => Predicate::All(H::B, H::Ne),
                C::Ls => Predicate::Any(H::Ae, H::E),
                _ => match cond.to_host() {
                    Some(cc) => Predicate::One(cc),
                    None => Predicate::Always,
                },
            },
            // ucomis: unordered ZF=PF=CF=1, less CF=1, equal ZF=1.
            FlagOrigin::Float => match cond {
                C::Eq => Predicate::All(H::E, H::Np),
                C::Ne => Predicate::Any(H::Ne, H::P),
                C::Cs | C::Pl => Predicate::Any(H::Ae, H::P),
                C::Cc | C::Mi => Predicate::All(H::B, H::Np),
                C::Vs => Predicate::One(H::P),
                C::Vc => Predicate::One(H::Np),
                C::Hi => Predicate::Any(H::A, H::P),
                C::Ls => Predicate::All(H::Be, H::Np),
                C::Ge => Predicate::One(H::Ae),
                C::Lt => Predicate::One(H::B),
                C::Gt => Predicate::One(H::A),
                C::Le => Predicate::One(H::Be),
                C::Al | C::Nv => Predicate::Always,
            },
        }
    }
}

/// What the translator knows about the host flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum FlagState {
    /// EFLAGS hold guest NZCV as produced by `origin`.
    Host(FlagOrigin),
    /// EFLAGS were overwritten by a helper sequence.
    Clobbered,
}

/// A guest condition as a combination of at most two host conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Predicate {
    Always,
    Never,
    One(HostCondition),
    /// Both hold.
    All(HostCondition, HostCondition),
    /// Either holds.
    Any(HostCondition, HostCondition),
}

impl Predicate {
    pub(crate) const fn invert(self) -> Self {
        match self {
            Predicate::Always => Predicate::Never,
            Predicate::Never => Predicate::Always,
            Predicate::One(a) => Predicate::One(a.invert()),
            Predicate::All(a, b) => Predicate::Any(a.invert(), b.invert()),
            Predicate::Any(a, b) => Predicate::All(a.invert(), b.invert()),
        }
    }
}

// ─── Translator ──────────────────────────────────────────────────────────────

/// Per-block translation state.
///
/// # Examples
///
/// ```rust
/// use dbt_rs::buffer::CodeBuffer;
/// use dbt_rs::config::TranslatorConfig;
/// use dbt_rs::context::CpuContext;
/// use dbt_rs::decoder::decode;
/// use dbt_rs::translate::{Flow, Translator};
///
/// let ctx = CpuContext::new(0x1000);
/// let mut tr = Translator::new(&ctx, TranslatorConfig::default());
/// let mut buf = CodeBuffer::new(64);
/// // add x0, x1, x2
/// let word = 0x8B02_0020;
/// let flow = tr.translate(&decode(word), word, 0x1000, &mut buf).unwrap();
/// assert_eq!(flow, Flow::Continue);
/// // lea rax, [rcx+rdx]
/// assert_eq!(buf.as_bytes(), &[0x48, 0x8D, 0x04, 0x11]);
/// ```
#[derive(Debug)]
pub struct Translator<'a> {
    ctx: &'a CpuContext,
    config: TranslatorConfig,
    flags: FlagState,
    exits: Vec<Exit>,
    pc: u64,
    word: u32,
}

impl<'a> Translator<'a> {
    /// Start a block with the flags in
    /// [`config.entry_flags`](TranslatorConfig::entry_flags).
    pub fn new(ctx: &'a CpuContext, config: TranslatorConfig) -> Self {
        Self {
            ctx,
            config,
            flags: config.entry_flags,
            exits: Vec::new(),
            pc: 0,
            word: 0,
        }
    }

    /// Append the host sequence for `insn` (decoded from `word` at `pc`).
    ///
    /// # Errors
    ///
    /// - [`DbtError::Decode`] for [`Instruction::Unknown`]
    /// - [`DbtError::ScratchConflict`] if an operand maps onto a scratch register
    /// - [`DbtError::Unsupported`] if no host sequence exists for this form
    ///
    /// A full buffer is not an error here; see [`CodeBuffer::check_overflow`].
    pub fn translate(
        &mut self,
        insn: &Instruction,
        word: u32,
        pc: u64,
        buf: &mut CodeBuffer<'_>,
    ) -> Result<Flow, DbtError> {
        self.pc = pc;
        self.word = word;
        let start = buf.len();
        if insn.ends_block() {
            self.normalize_flags(buf)?;
        }
        let flow = match insn {
            Instruction::Alu(op) => self.alu(buf, op).map(|()| Flow::Continue),
            Instruction::Compare(cmp) => self.compare(buf, cmp).map(|()| Flow::Continue),
            Instruction::Move(mv) => self.mov(buf, mv).map(|()| Flow::Continue),
            Instruction::Branch(br) => self.branch(buf, br).map(|()| Flow::Exit),
            Instruction::Load(access) => self.load(buf, access).map(|()| Flow::Continue),
            Instruction::Store(access) => self.store(buf, access).map(|()| Flow::Continue),
            Instruction::Ordered(op) => self.ordered(buf, op).map(|()| Flow::Continue),
            Instruction::System(sys) => self.system(buf, sys),
            Instruction::Float(op) => self.float(buf, op).map(|()| Flow::Continue),
            Instruction::Vector(op) => self.vector(buf, op).map(|()| Flow::Continue),
            Instruction::Unknown(encoding) => Err(DbtError::Decode {
                encoding: *encoding,
                pc,
            }),
        }?;
        log::trace!(
            "{:#x}: {:#010x} -> {} bytes",
            pc,
            word,
            buf.len().saturating_sub(start)
        );
        Ok(flow)
    }

    /// End the block with a jump to `next_pc`.
    ///
    /// # Errors
    ///
    /// Only if a local jump cannot be bound; see [`CodeBuffer::bind_local`].
    pub fn fall_through(
        &mut self,
        buf: &mut CodeBuffer<'_>,
        next_pc: u64,
    ) -> Result<(), DbtError> {
        self.normalize_flags(buf)?;
        self.exit_jmp(buf, Some(next_pc), ExitKind::FallThrough);
        Ok(())
    }

    /// Exits recorded so far, in emission order.
    pub fn exits(&self) -> &[Exit] {
        &self.exits
    }

    /// Take the recorded exits, leaving none behind.
    pub fn take_exits(&mut self) -> Vec<Exit> {
        core::mem::take(&mut self.exits)
    }

    /// Current knowledge about the host flags.
    pub fn flag_state(&self) -> FlagState {
        self.flags
    }

    pub fn config(&self) -> &TranslatorConfig {
        &self.config
    }

    // ── Operand helpers ──────────────────────────────────────────────────

    /// Host GPR for guest register `guest` (31 is SP here).
    pub(crate) fn gpr(&self, guest: u8) -> Result<u8, DbtError> {
        self.config
            .scratch
            .check_gpr(guest, self.pc)
            .map_err(|e| {
                log::warn!("{}", e);
                e
            })
    }

    /// Host GPR for a data-processing operand; `None` for `XZR`.
    pub(crate) fn gpr_or_zr(&self, guest: u8) -> Result<Option<u8>, DbtError> {
        if guest == GUEST_ZR {
            Ok(None)
        } else {
            self.gpr(guest).map(Some)
        }
    }

    pub(crate) fn xmm(&self, guest: u8) -> Result<u8, DbtError> {
        self.config
            .scratch
            .check_xmm(guest, self.pc)
            .map_err(|e| {
                log::warn!("{}", e);
                e
            })
    }

    #[inline]
    pub(crate) fn scratch(&self) -> u8 {
        self.config.scratch.gpr
    }

    #[inline]
    pub(crate) fn vscratch(&self) -> u8 {
        self.config.scratch.xmm
    }

    pub(crate) fn unsupported(&self, detail: impl Into<String>) -> DbtError {
        DbtError::Unsupported {
            encoding: self.word,
            pc: self.pc,
            detail: detail.into(),
        }
    }

    /// `LEA dst, [base + index << shift + disp]`.
    pub(crate) fn lea(
        &self,
        buf: &mut CodeBuffer<'_>,
        width: Width,
        dst: u8,
        base: u8,
        index: Option<(u8, u8)>,
        disp: i32,
    ) -> Result<(), DbtError> {
        let mem = match index {
            None => Mem::new(base, disp),
            Some((index, shift)) => Mem::indexed(base, index, shift, disp)
                .ok_or_else(|| self.unsupported("address needs RSP as a scaled index"))?,
        };
        emit_lea(buf, width, dst, mem);
        Ok(())
    }

    // ── Flags ────────────────────────────────────────────────────────────

    pub(crate) fn set_flags(&mut self, origin: FlagOrigin) {
        self.flags = FlagState::Host(origin);
    }

    pub(crate) fn clobber_flags(&mut self) {
        self.flags = FlagState::Clobbered;
    }

    /// Put live flags into compare form, the form every exit leaves.
    ///
    /// After an addition only the carry differs. After a float compare the
    /// four outcomes are turned into a `CMP s, 1` whose operands reproduce
    /// the guest NZCV: `0 - 1` (less, `1000`), `1 - 1` (equal, `0110`),
    /// `2 - 1` (greater, `0010`), and `i64::MIN - 1` (unordered, `0011`).
    pub(crate) fn normalize_flags(&mut self, buf: &mut CodeBuffer<'_>) -> Result<(), DbtError> {
        let origin = match self.flags {
            FlagState::Host(origin) => origin,
            FlagState::Clobbered => return Ok(()),
        };
        match origin {
            FlagOrigin::Sub => return Ok(()),
            FlagOrigin::Add => emit_cmc(buf),
            FlagOrigin::Float => {
                let s = self.scratch();
                // MOV leaves the ucomis flags in place for the tests below.
                emit_mov_reg_imm64(buf, s, 1 << 63);
                let unordered = emit_jcc_rel32(buf, HostCondition::P);
                emit_mov_reg_imm32(buf, s, 1);
                let equal = emit_jcc_rel32(buf, HostCondition::E);
                emit_mov_reg_imm32(buf, s, 0);
                let less = emit_jcc_rel32(buf, HostCondition::B);
                emit_mov_reg_imm32(buf, s, 2);
                for placeholder in [unordered, equal, less] {
                    bind_here(buf, placeholder)?;
                }
                emit_alu_ri(buf, AluOp::Cmp, Width::W64, s, 1);
            }
        }
        self.flags = FlagState::Host(FlagOrigin::Sub);
        Ok(())
    }

    /// Host test for the guest condition `cond` over the current flags.
    pub(crate) fn predicate(&self, cond: Condition) -> Result<Predicate, DbtError> {
        if cond.is_always() {
            return Ok(Predicate::Always);
        }
        match self.flags {
            FlagState::Host(origin) => Ok(origin.predicate(cond)),
            FlagState::Clobbered => Err(self.unsupported(alloc::format!(
                "condition {} reads flags clobbered earlier in the block",
                cond
            ))),
        }
    }

    // ── Exits and local labels ───────────────────────────────────────────

    pub(crate) fn exit_jmp(
        &mut self,
        buf: &mut CodeBuffer<'_>,
        guest_target: Option<u64>,
        kind: ExitKind,
    ) {
        let offset = emit_jmp_rel32(buf);
        self.record_exit(buf, offset, guest_target, kind);
    }

    pub(crate) fn exit_jcc(
        &mut self,
        buf: &mut CodeBuffer<'_>,
        cc: HostCondition,
        guest_target: u64,
        kind: ExitKind,
    ) {
        let offset = emit_jcc_rel32(buf, cc);
        self.record_exit(buf, offset, Some(guest_target), kind);
    }

    pub(crate) fn record_exit(
        &mut self,
        buf: &mut CodeBuffer<'_>,
        offset: usize,
        guest_target: Option<u64>,
        kind: ExitKind,
    ) {
        if let Some(target) = guest_target {
            buf.set_guest_target(offset, target);
        }
        self.exits.push(Exit {
            offset,
            guest_target,
            kind,
            flags: self.flags,
        });
    }

    /// Jumps taken when `pred` is false, to be bound past the guarded code.
    pub(crate) fn skip_unless(
        &self,
        buf: &mut CodeBuffer<'_>,
        pred: Predicate,
    ) -> Result<Vec<usize>, DbtError> {
        let mut skips = Vec::new();
        match pred {
            Predicate::Always => {}
            Predicate::Never => skips.push(emit_jmp_rel32(buf)),
            Predicate::One(a) => skips.push(emit_jcc_rel32(buf, a.invert())),
            Predicate::All(a, b) => {
                skips.push(emit_jcc_rel32(buf, a.invert()));
                skips.push(emit_jcc_rel32(buf, b.invert()));
            }
            Predicate::Any(a, b) => {
                let take = emit_jcc_rel32(buf, a);
                skips.push(emit_jcc_rel32(buf, b.invert()));
                bind_here(buf, take)?;
            }
        }
        Ok(skips)
    }
}

/// Point the local jump at `placeholder` to the current end of `buf`.
pub(crate) fn bind_here(buf: &mut CodeBuffer<'_>, placeholder: usize) -> Result<(), DbtError> {
    if buf.has_overflowed() {
        return Ok(());
    }
    buf.bind_local(placeholder, buf.len())
}

/// Truncate `value` to the operand width.
#[inline]
pub(crate) const fn mask(width: Width, value: u64) -> u64 {
    match width {
        Width::W32 => value & 0xFFFF_FFFF,
        Width::W64 => value,
    }
}
