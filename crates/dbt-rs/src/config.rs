//! Translator configuration.

use crate::peephole::PeepholeFlags;
use crate::regmap::ScratchRegs;
use crate::translate::{FlagOrigin, FlagState};

/// Knobs for block translation.
///
/// Every field has a default suited to translating ordinary compiler output;
/// the `with_*` setters adjust one field at a time.
///
/// # Examples
///
/// ```rust
/// use dbt_rs::config::TranslatorConfig;
/// use dbt_rs::peephole::PeepholeFlags;
///
/// let config = TranslatorConfig::default()
///     .with_buffer_capacity(1024)
///     .with_peephole(PeepholeFlags::NONE)
///     .with_base_address(0x7000_0000);
/// assert_eq!(config.buffer_capacity, 1024);
/// assert!(config.peephole.is_empty());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TranslatorConfig {
    /// Host code bytes available to one block. Default: 4096.
    pub buffer_capacity: usize,
    /// Guest instructions translated before a block is cut with a
    /// fall-through exit. Default: 64.
    pub max_block_instructions: usize,
    /// Peephole passes run when a block is linked. Default: all.
    pub peephole: PeepholeFlags,
    /// Host registers reserved for intermediate values. Default: `R11`, `XMM15`.
    pub scratch: ScratchRegs,
    /// Host address the block will be loaded at. Default: 0.
    pub base_address: u64,
    /// Emit VEX three-operand forms for vector arithmetic. Default: `false`.
    pub avx: bool,
    /// What host EFLAGS hold when the block is entered. Default: guest NZCV
    /// in compare form, the state every exit with live flags leaves behind.
    /// Translate a block reached through an exit whose
    /// [`flags`](crate::translate::Exit::flags) are
    /// [`Clobbered`](FlagState::Clobbered) with `Clobbered` here.
    pub entry_flags: FlagState,
}

impl Default for TranslatorConfig {
    fn default() -> Self {
        Self {
            buffer_capacity: 4096,
            max_block_instructions: 64,
            peephole: PeepholeFlags::ALL,
            scratch: ScratchRegs::default(),
            base_address: 0,
            avx: false,
            entry_flags: FlagState::Host(FlagOrigin::Sub),
        }
    }
}

impl TranslatorConfig {
    #[must_use]
    pub fn with_buffer_capacity(mut self, bytes: usize) -> Self {
        self.buffer_capacity = bytes;
        self
    }

    #[must_use]
    pub fn with_max_block_instructions(mut self, count: usize) -> Self {
        self.max_block_instructions = count;
        self
    }

    #[must_use]
    pub fn with_peephole(mut self, flags: PeepholeFlags) -> Self {
        self.peephole = flags;
        self
    }

    #[must_use]
    pub fn with_scratch(mut self, scratch: ScratchRegs) -> Self {
        self.scratch = scratch;
        self
    }

    #[must_use]
    pub fn with_base_address(mut self, base: u64) -> Self {
        self.base_address = base;
        self
    }

    #[must_use]
    pub fn with_avx(mut self, enabled: bool) -> Self {
        self.avx = enabled;
        self
    }

    #[must_use]
    pub fn with_entry_flags(mut self, flags: FlagState) -> Self {
        self.entry_flags = flags;
        self
    }
}
