//! Block-level translation: a run of guest words in, linked host code out.
//!
//! [`translate_block`] decodes and translates guest instructions until the
//! first one that leaves the block (or until
//! [`max_block_instructions`](TranslatorConfig::max_block_instructions)),
//! producing a [`TranslatedBlock`] whose exits still hold zero placeholders.
//! [`TranslatedBlock::link`] asks the caller where each exit should land,
//! patches the placeholders, freezes the buffer, and runs the peephole pass.
//!
//! ```
//! use dbt_rs::{translate_block, CpuContext, TranslatorConfig};
//!
//! let ctx = CpuContext::new(0x1000);
//! // add x0, x1, x2; ret
//! let block = translate_block(&[0x8B02_0020, 0xD65F_03C0], 0x1000, &ctx, TranslatorConfig::default())?;
//! assert_eq!(block.instruction_count(), 2);
//!
//! // Every exit goes to a dispatcher at 0x10_0000.
//! let finished = block.link(|_| Some(0x10_0000))?;
//! assert_eq!(&finished.code()[..4], &[0x48, 0x8D, 0x04, 0x11]);
//! # Ok::<(), dbt_rs::DbtError>(())
//! ```

use alloc::vec::Vec;

use crate::buffer::CodeBuffer;
use crate::config::TranslatorConfig;
use crate::context::CpuContext;
use crate::decoder::try_decode;
use crate::error::DbtError;
use crate::peephole::{PeepholeContext, PeepholeFlags, PeepholeStats};
use crate::reloc::Relocation;
use crate::translate::{Exit, Flow, Translator};

// ─── Translation ─────────────────────────────────────────────────────────────

/// Host code for one guest block, exits not yet patched.
#[derive(Debug)]
pub struct TranslatedBlock {
    buf: CodeBuffer<'static>,
    guest_pc: u64,
    instruction_count: usize,
    exits: Vec<Exit>,
    peephole: PeepholeFlags,
}

/// Translate `words`, fetched from guest address `guest_pc`.
///
/// Translation stops after the first instruction that transfers control. A
/// block cut short by the instruction limit or by the end of `words` gets a
/// fall-through exit to the next guest address.
///
/// # Errors
///
/// - [`DbtError::EmptyBlock`] if no instruction could be taken from `words`
/// - [`DbtError::Decode`] if a word matches no instruction template
/// - any error from [`Translator::translate`]
///
/// The block starts with EFLAGS as described by
/// [`entry_flags`](TranslatorConfig::entry_flags); pass the
/// [`flags`](Exit::flags) of the exit that reaches it.
///
/// Overflowing [`buffer_capacity`](TranslatorConfig::buffer_capacity) is
/// reported by [`TranslatedBlock::link`].
pub fn translate_block(
    words: &[u32],
    guest_pc: u64,
    ctx: &CpuContext,
    config: TranslatorConfig,
) -> Result<TranslatedBlock, DbtError> {
    let limit = words.len().min(config.max_block_instructions);
    if limit == 0 {
        return Err(DbtError::EmptyBlock { pc: guest_pc });
    }

    let mut buf = CodeBuffer::new(config.buffer_capacity).with_base_address(config.base_address);
    let mut tr = Translator::new(ctx, config);
    let mut pc = guest_pc;
    let mut count = 0;
    let mut ended = false;

    for &word in &words[..limit] {
        let insn = try_decode(word, pc)?;
        let flow = tr.translate(&insn, word, pc, &mut buf)?;
        count += 1;
        pc = pc.wrapping_add(4);
        if flow == Flow::Exit {
            ended = true;
            break;
        }
    }
    if !ended {
        tr.fall_through(&mut buf, pc)?;
    }

    if buf.has_overflowed() {
        log::warn!(
            "{:#x}: block overflowed its {}-byte buffer",
            guest_pc,
            buf.capacity()
        );
    }
    log::debug!(
        "{:#x}: {} instructions -> {} bytes, {} relocations",
        guest_pc,
        count,
        buf.len(),
        buf.relocations().len()
    );

    Ok(TranslatedBlock {
        buf,
        guest_pc,
        instruction_count: count,
        exits: tr.take_exits(),
        peephole: config.peephole,
    })
}

impl TranslatedBlock {
    /// Guest address of the first instruction.
    #[inline]
    pub fn guest_pc(&self) -> u64 {
        self.guest_pc
    }

    /// Guest address after the last translated instruction.
    #[inline]
    pub fn guest_end(&self) -> u64 {
        self.guest_pc
            .wrapping_add(4 * self.instruction_count as u64)
    }

    #[inline]
    pub fn instruction_count(&self) -> usize {
        self.instruction_count
    }

    /// Transfers out of the block, in emission order.
    #[inline]
    pub fn exits(&self) -> &[Exit] {
        &self.exits
    }

    /// Host code emitted so far, placeholders still zero.
    #[inline]
    pub fn code(&self) -> &[u8] {
        self.buf.as_bytes()
    }

    #[inline]
    pub fn has_overflowed(&self) -> bool {
        self.buf.has_overflowed()
    }

    /// Patch every exit and freeze the block.
    ///
    /// `resolver` maps each exit to the host address its jump should reach:
    /// another block's code for direct exits, or a runtime stub for indirect
    /// ones and exceptions. Returning `None` leaves the exit unresolved.
    ///
    /// After patching, the enabled peephole passes run over the code with
    /// every in-block jump target kept as an instruction boundary.
    ///
    /// # Errors
    ///
    /// - [`DbtError::BufferOverflow`] if emission ran out of space
    /// - [`DbtError::UnresolvedRelocation`] if `resolver` returned `None`
    /// - [`DbtError::RelocationOutOfRange`] if a target is beyond ±2 GiB
    pub fn link<F>(self, mut resolver: F) -> Result<FinishedBlock, DbtError>
    where
        F: FnMut(&Exit) -> Option<u64>,
    {
        let TranslatedBlock {
            mut buf,
            guest_pc,
            instruction_count,
            exits,
            peephole,
        } = self;

        buf.check_overflow()?;
        for exit in &exits {
            let host = resolver(exit).ok_or(DbtError::UnresolvedRelocation {
                offset: exit.offset,
                target: exit.guest_target,
            })?;
            buf.patch_rel32(exit.offset, host)?;
        }

        let mut code = buf.finalize()?;
        let base = code.base_address();
        let len = code.len() as u64;
        let targets: Vec<usize> = code
            .relocations()
            .iter()
            .filter_map(|r| r.resolved)
            .filter(|&t| t >= base && t - base <= len)
            .map(|t| (t - base) as usize)
            .collect();

        let stats = if peephole.is_empty() {
            PeepholeStats::default()
        } else {
            PeepholeContext::new(code.bytes_mut(), peephole)
                .protect(&targets)
                .run()
        };

        log::debug!(
            "{:#x}: linked {} exits at {:#x}, peephole rewrote {} bytes",
            guest_pc,
            exits.len(),
            base,
            stats.bytes_optimized
        );

        Ok(FinishedBlock {
            code: code.to_vec(),
            guest_pc,
            instruction_count,
            base_address: base,
            relocations: code.relocations().to_vec(),
            exits,
            stats,
        })
    }
}

// ─── Finished blocks ─────────────────────────────────────────────────────────

/// Linked, optimized host code ready to be copied into executable memory.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FinishedBlock {
    code: Vec<u8>,
    guest_pc: u64,
    instruction_count: usize,
    base_address: u64,
    relocations: Vec<Relocation>,
    exits: Vec<Exit>,
    stats: PeepholeStats,
}

impl FinishedBlock {
    /// The host machine code.
    #[must_use]
    pub fn code(&self) -> &[u8] {
        &self.code
    }

    /// Consume the block and return its code.
    #[must_use]
    pub fn into_code(self) -> Vec<u8> {
        self.code
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.code.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.code.is_empty()
    }

    #[must_use]
    pub fn guest_pc(&self) -> u64 {
        self.guest_pc
    }

    #[must_use]
    pub fn instruction_count(&self) -> usize {
        self.instruction_count
    }

    /// Host address the code was linked for.
    #[must_use]
    pub fn base_address(&self) -> u64 {
        self.base_address
    }

    /// Every rel32 field in the code, with the host address it now reaches.
    #[must_use]
    pub fn relocations(&self) -> &[Relocation] {
        &self.relocations
    }

    #[must_use]
    pub fn exits(&self) -> &[Exit] {
        &self.exits
    }

    /// What the peephole pass did to the code.
    #[must_use]
    pub fn stats(&self) -> PeepholeStats {
        self.stats
    }
}
