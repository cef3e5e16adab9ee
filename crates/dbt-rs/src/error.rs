//! Error taxonomy for decoding, emission, and block finalization.

use alloc::string::String;
use core::fmt;

/// Which register file a [`DbtError::ScratchConflict`] refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RegisterFile {
    /// General-purpose registers (`RAX`..`R15`).
    Gpr,
    /// SSE vector registers (`XMM0`..`XMM15`).
    Xmm,
}

impl fmt::Display for RegisterFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegisterFile::Gpr => write!(f, "r"),
            RegisterFile::Xmm => write!(f, "xmm"),
        }
    }
}

/// Translation error with the guest location that caused it.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DbtError {
    /// The 32-bit word matches no known instruction template.
    Decode {
        /// The raw instruction word.
        encoding: u32,
        /// Guest address of the word.
        pc: u64,
    },

    /// The instruction decoded, but this translator has no host sequence for it.
    Unsupported {
        /// The raw instruction word.
        encoding: u32,
        /// Guest address of the word.
        pc: u64,
        /// What exactly is missing.
        detail: String,
    },

    /// Emission ran past the end of the code buffer.
    BufferOverflow {
        /// Capacity of the buffer in bytes.
        capacity: usize,
        /// Total number of bytes the emitters tried to write.
        attempted: usize,
    },

    /// A rel32 placeholder was never patched.
    UnresolvedRelocation {
        /// Buffer offset of the 4-byte placeholder.
        offset: usize,
        /// Guest address the branch was aiming for, when known.
        target: Option<u64>,
    },

    /// A patched displacement does not fit in a signed 32-bit field.
    RelocationOutOfRange {
        /// Buffer offset of the 4-byte placeholder.
        offset: usize,
        /// The displacement that was requested.
        displacement: i64,
    },

    /// A patch would write outside the bytes emitted so far.
    PatchOutOfBounds {
        /// Requested patch offset.
        offset: usize,
        /// Bytes currently in the buffer.
        len: usize,
    },

    /// A guest operand maps onto the host register reserved as scratch.
    ScratchConflict {
        /// Register file of the conflicting register.
        file: RegisterFile,
        /// Host register index (0-15).
        register: u8,
        /// Guest address of the instruction.
        pc: u64,
    },

    /// The block contained no instructions to translate.
    EmptyBlock {
        /// Guest address the block would have started at.
        pc: u64,
    },
}

impl fmt::Display for DbtError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DbtError::Decode { encoding, pc } => {
                write!(f, "{:#x}: undecodable instruction {:#010x}", pc, encoding)
            }
            DbtError::Unsupported {
                encoding,
                pc,
                detail,
            } => write!(
                f,
                "{:#x}: cannot translate {:#010x}: {}",
                pc, encoding, detail
            ),
            DbtError::BufferOverflow {
                capacity,
                attempted,
            } => write!(
                f,
                "code buffer overflow ({} bytes emitted, capacity {})",
                attempted, capacity
            ),
            DbtError::UnresolvedRelocation { offset, target } => match target {
                Some(t) => write!(
                    f,
                    "unresolved relocation at offset {:#x} (guest target {:#x})",
                    offset, t
                ),
                None => write!(f, "unresolved relocation at offset {:#x}", offset),
            },
            DbtError::RelocationOutOfRange {
                offset,
                displacement,
            } => write!(
                f,
                "relocation at offset {:#x} out of rel32 range (displacement={})",
                offset, displacement
            ),
            DbtError::PatchOutOfBounds { offset, len } => write!(
                f,
                "patch at offset {:#x} outside emitted code ({} bytes)",
                offset, len
            ),
            DbtError::ScratchConflict { file, register, pc } => write!(
                f,
                "{:#x}: guest operand maps onto scratch register {}{}",
                pc, file, register
            ),
            DbtError::EmptyBlock { pc } => write!(f, "{:#x}: empty block", pc),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for DbtError {}
