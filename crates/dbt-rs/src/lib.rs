//! # dbt-rs — AArch64 to x86-64 Dynamic Binary Translation Core
//!
//! `dbt-rs` turns AArch64 guest machine code into x86-64 host machine code,
//! one basic block at a time. It is the code-generation core of a user-mode
//! emulator: it decodes, translates, encodes, and links, but it does not map
//! executable memory, run guest threads, or emulate system calls.
//!
//! ## Quick Start
//!
//! ```rust
//! use dbt_rs::{translate_block, CpuContext, TranslatorConfig};
//!
//! let ctx = CpuContext::new(0x40_0000);
//! // subs x0, x0, #1; b.ne #-4
//! let words = [0xF100_0400, 0x54FF_FFE1];
//! let block = translate_block(&words, 0x40_0000, &ctx, TranslatorConfig::default())?;
//! let finished = block.link(|_exit| Some(0))?;
//! assert!(!finished.code().is_empty());
//! # Ok::<(), dbt_rs::DbtError>(())
//! ```
//!
//! ## Pipeline
//!
//! - [`decoder`] classifies a 32-bit word into an [`Instruction`].
//! - [`translate`] maps it onto host registers ([`regmap`]) and appends an
//!   x86-64 sequence through the [`encoder`] into a [`CodeBuffer`].
//! - [`block`] strings instructions into a block, patches its exits, and
//!   runs the size-preserving [`peephole`] pass.
//!
//! ## Features
//!
//! - **`no_std` + `alloc`**: disable the default `std` feature.
//! - **`serde`**: derive `Serialize`/`Deserialize` on public data types.
//! - **No `unsafe`**: the crate only produces bytes; making them executable
//!   is the embedder's job.

#![cfg_attr(not(feature = "std"), no_std)]
#![forbid(unsafe_code)]
// ── Pedantic lint policy ─────────────────────────────────────────────────
// Encoders narrow and reinterpret integers constantly (register numbers into
// ModRM fields, signed displacements into bytes) and opcode tables read best
// as unseparated hex.
#![allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_lossless,
    clippy::cast_possible_wrap,
    clippy::unreadable_literal,
    clippy::match_same_arms,
    clippy::redundant_closure_for_method_calls,
    clippy::bool_to_int_with_if,
    clippy::wildcard_imports,
    clippy::enum_glob_use,
    clippy::semicolon_if_nothing_returned,
    clippy::must_use_candidate,
    clippy::module_name_repetitions,
    clippy::uninlined_format_args,
    clippy::doc_markdown,
    clippy::similar_names,
    clippy::fn_params_excessive_bools,
    clippy::too_many_lines,
    clippy::too_many_arguments,
    clippy::single_match_else,
    clippy::manual_let_else,
    clippy::unnecessary_wraps,
    clippy::unused_self,
    clippy::many_single_char_names,
    clippy::return_self_not_must_use,
    clippy::missing_errors_doc
)]

extern crate alloc;

/// Block-level API: translate, link, and optimize a guest basic block.
pub mod block;
/// Fixed-capacity host code buffer with sticky overflow and relocation ledger.
pub mod buffer;
/// Translator configuration.
pub mod config;
/// Per-thread guest CPU state the translator reads (FPCR/FPSR).
pub mod context;
/// AArch64 instruction decoder.
pub mod decoder;
/// x86-64 instruction encoders (GPR, scalar FP, packed SIMD, VEX, control flow).
pub mod encoder;
/// Error types.
pub mod error;
/// Size-preserving peephole optimizer over finished host code.
pub mod peephole;
/// Guest → host register and condition-code mapping.
pub mod regmap;
/// rel32 relocation records and displacement arithmetic.
pub mod reloc;
/// Per-instruction semantic mapping from AArch64 to x86-64.
pub mod translate;

// Re-exports
pub use block::{translate_block, FinishedBlock, TranslatedBlock};
pub use buffer::{CodeBuffer, FinishedCode};
pub use config::TranslatorConfig;
pub use context::{CpuContext, FpControl};
pub use decoder::{compute_branch_target, decode, try_decode, InstrClass, Instruction};
pub use encoder::RoundMode;
pub use error::{DbtError, RegisterFile};
pub use peephole::{optimize, PeepholeContext, PeepholeFlags, PeepholeStats};
pub use regmap::{map_condition, map_gpr, map_xmm, Condition, HostCondition, ScratchRegs};
pub use reloc::{RelocKind, Relocation};
pub use translate::{Exit, ExitKind, FlagOrigin, FlagState, Flow, Translator};
