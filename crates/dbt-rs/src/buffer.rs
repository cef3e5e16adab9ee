//! Fixed-capacity byte sink for emitted host code.
//!
//! A [`CodeBuffer`] either owns its storage or borrows a caller-provided
//! slice. Writes are appended strictly in call order. Writing past the
//! capacity drops the bytes and latches the overflow flag; from then on
//! every emit is a no-op, so a block is checked once when it is finished
//! rather than after every call.
//!
//! The lifecycle is append, patch, freeze: emitters append bytes and register
//! rel32 placeholders, [`CodeBuffer::patch_rel32`] fills placeholders in,
//! and [`CodeBuffer::finalize`] consumes the buffer after checking that it
//! neither overflowed nor kept a pending relocation.

use alloc::vec;
use alloc::vec::Vec;

use crate::error::DbtError;
use crate::reloc::{self, RelocKind, Relocation, REL32_WIDTH};

/// Single-byte `NOP`, also the padding byte for [`CodeBuffer::emit_align`].
pub const NOP: u8 = 0x90;

#[derive(Debug)]
enum Storage<'a> {
    Owned(Vec<u8>),
    Borrowed(&'a mut [u8]),
}

impl Storage<'_> {
    fn as_slice(&self) -> &[u8] {
        match self {
            Storage::Owned(v) => v,
            Storage::Borrowed(s) => s,
        }
    }

    fn as_mut_slice(&mut self) -> &mut [u8] {
        match self {
            Storage::Owned(v) => v,
            Storage::Borrowed(s) => s,
        }
    }
}

/// Append-only host code buffer with a sticky overflow flag.
#[derive(Debug)]
pub struct CodeBuffer<'a> {
    storage: Storage<'a>,
    len: usize,
    attempted: usize,
    overflowed: bool,
    base_address: u64,
    relocs: Vec<Relocation>,
}

impl CodeBuffer<'static> {
    /// Create a buffer that owns `capacity` bytes of zeroed storage.
    pub fn new(capacity: usize) -> Self {
        CodeBuffer {
            storage: Storage::Owned(vec![0; capacity]),
            len: 0,
            attempted: 0,
            overflowed: false,
            base_address: 0,
            relocs: Vec::new(),
        }
    }
}

impl<'a> CodeBuffer<'a> {
    /// Create a buffer that writes into `storage`; its length is the capacity.
    pub fn from_slice(storage: &'a mut [u8]) -> Self {
        CodeBuffer {
            storage: Storage::Borrowed(storage),
            len: 0,
            attempted: 0,
            overflowed: false,
            base_address: 0,
            relocs: Vec::new(),
        }
    }

    /// Host address the first byte will be loaded at. Patches are computed
    /// relative to it.
    #[must_use]
    pub fn with_base_address(mut self, base: u64) -> Self {
        self.base_address = base;
        self
    }

    /// Total capacity in bytes.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.storage.as_slice().len()
    }

    /// Bytes written so far.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// `true` when nothing has been written.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Bytes still available before overflow.
    #[inline]
    pub fn remaining(&self) -> usize {
        self.capacity() - self.len
    }

    /// Whether any write has been dropped for lack of space.
    #[inline]
    pub fn has_overflowed(&self) -> bool {
        self.overflowed
    }

    /// `Err(BufferOverflow)` once any write has been dropped.
    pub fn check_overflow(&self) -> Result<(), DbtError> {
        if self.overflowed {
            return Err(DbtError::BufferOverflow {
                capacity: self.capacity(),
                attempted: self.attempted,
            });
        }
        Ok(())
    }

    /// Host address of the first byte.
    #[inline]
    pub fn base_address(&self) -> u64 {
        self.base_address
    }

    /// The emitted bytes.
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.storage.as_slice()[..self.len]
    }

    /// All relocations registered so far, in emission order.
    #[inline]
    pub fn relocations(&self) -> &[Relocation] {
        &self.relocs
    }

    /// Relocations that still hold a zero placeholder.
    pub fn pending_relocations(&self) -> impl Iterator<Item = &Relocation> + '_ {
        self.relocs.iter().filter(|r| !r.is_resolved())
    }

    // ── Emission ─────────────────────────────────────────────────────────

    /// Append one byte.
    #[inline]
    pub fn emit_byte(&mut self, byte: u8) {
        self.emit_bytes(&[byte]);
    }

    /// Append a little-endian 16-bit word.
    #[inline]
    pub fn emit_word16(&mut self, word: u16) {
        self.emit_bytes(&word.to_le_bytes());
    }

    /// Append a little-endian 32-bit word.
    #[inline]
    pub fn emit_word32(&mut self, word: u32) {
        self.emit_bytes(&word.to_le_bytes());
    }

    /// Append a little-endian 64-bit word.
    #[inline]
    pub fn emit_word64(&mut self, word: u64) {
        self.emit_bytes(&word.to_le_bytes());
    }

    /// Append `bytes` as a unit. If they do not all fit, none are written.
    pub fn emit_bytes(&mut self, bytes: &[u8]) {
        self.attempted += bytes.len();
        if self.overflowed {
            return;
        }
        let end = self.len + bytes.len();
        if end > self.capacity() {
            log::warn!(
                "code buffer overflow: {} bytes requested with {} free",
                bytes.len(),
                self.remaining()
            );
            self.overflowed = true;
            return;
        }
        self.storage.as_mut_slice()[self.len..end].copy_from_slice(bytes);
        self.len = end;
    }

    /// Pad with `NOP` until the write offset is a multiple of `boundary`.
    pub fn emit_align(&mut self, boundary: usize) {
        if boundary <= 1 {
            return;
        }
        let rem = self.len % boundary;
        if rem == 0 {
            return;
        }
        for _ in 0..boundary - rem {
            self.emit_byte(NOP);
        }
    }

    /// Append a zero rel32 placeholder owned by `kind` and return its offset.
    ///
    /// The opcode bytes must already be in the buffer. If the placeholder
    /// itself overflows, no relocation is recorded: the buffer is unusable
    /// anyway and will be rejected by [`finalize`](Self::finalize).
    pub fn emit_rel32_placeholder(&mut self, kind: RelocKind) -> usize {
        let offset = self.len;
        self.emit_word32(0);
        if !self.overflowed {
            self.relocs.push(Relocation::new(offset, kind));
        }
        offset
    }

    /// Attach the guest address a placeholder at `offset` stands for.
    pub fn set_guest_target(&mut self, offset: usize, guest: u64) {
        if let Some(r) = self.relocs.iter_mut().find(|r| r.offset == offset) {
            r.guest_target = Some(guest);
        }
    }

    // ── Patching ─────────────────────────────────────────────────────────

    /// Overwrite the rel32 field at `offset` with `target - (base + offset + 4)`.
    ///
    /// Any relocation registered at `offset` is marked resolved.
    ///
    /// # Errors
    ///
    /// Returns [`DbtError::PatchOutOfBounds`] if the field lies outside the
    /// emitted bytes and [`DbtError::RelocationOutOfRange`] if the
    /// displacement does not fit in 32 bits.
    pub fn patch_rel32(&mut self, offset: usize, target: u64) -> Result<(), DbtError> {
        self.check_field(offset)?;
        let disp = reloc::rel32_displacement(self.base_address, offset, target)?;
        self.write_rel32(offset, disp, target);
        Ok(())
    }

    /// Patch the placeholder at `offset` to land on buffer offset `label`.
    ///
    /// The displacement depends only on the two offsets, so this works for
    /// any base address, including one where `base + label` wraps.
    ///
    /// # Errors
    ///
    /// Same as [`patch_rel32`](Self::patch_rel32).
    pub fn bind_local(&mut self, offset: usize, label: usize) -> Result<(), DbtError> {
        self.check_field(offset)?;
        let disp = reloc::rel32_displacement(0, offset, label as u64)?;
        self.write_rel32(offset, disp, self.base_address.wrapping_add(label as u64));
        Ok(())
    }

    fn check_field(&self, offset: usize) -> Result<(), DbtError> {
        match offset.checked_add(REL32_WIDTH) {
            Some(end) if end <= self.len => Ok(()),
            _ => Err(DbtError::PatchOutOfBounds {
                offset,
                len: self.len,
            }),
        }
    }

    fn write_rel32(&mut self, offset: usize, disp: i32, target: u64) {
        self.storage.as_mut_slice()[offset..offset + REL32_WIDTH]
            .copy_from_slice(&disp.to_le_bytes());
        for r in self.relocs.iter_mut().filter(|r| r.offset == offset) {
            r.resolved = Some(target);
        }
    }

    /// Read back the little-endian 32-bit value at `offset`.
    pub fn read_le32(&self, offset: usize) -> Option<u32> {
        reloc::read_le32(self.as_bytes(), offset)
    }

    // ── Finalization ─────────────────────────────────────────────────────

    /// Check the block invariants and freeze the buffer.
    ///
    /// # Errors
    ///
    /// Returns [`DbtError::BufferOverflow`] if any write was dropped and
    /// [`DbtError::UnresolvedRelocation`] if a placeholder was never patched.
    pub fn finalize(self) -> Result<FinishedCode<'a>, DbtError> {
        self.check_overflow()?;
        reloc::check_resolved(&self.relocs)?;
        Ok(FinishedCode {
            storage: self.storage,
            len: self.len,
            base_address: self.base_address,
            relocs: self.relocs,
        })
    }
}

/// Frozen host code: every relocation resolved, nothing more can be appended.
///
/// The bytes stay mutable only for in-place, size-preserving rewriting by
/// the [peephole optimizer](crate::peephole).
#[derive(Debug)]
pub struct FinishedCode<'a> {
    storage: Storage<'a>,
    len: usize,
    base_address: u64,
    relocs: Vec<Relocation>,
}

impl FinishedCode<'_> {
    /// The final machine code.
    #[inline]
    pub fn bytes(&self) -> &[u8] {
        &self.storage.as_slice()[..self.len]
    }

    /// Mutable view for size-preserving rewrites.
    #[inline]
    pub fn bytes_mut(&mut self) -> &mut [u8] {
        &mut self.storage.as_mut_slice()[..self.len]
    }

    /// Code size in bytes.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// `true` when no code was emitted.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Host address the code was patched for.
    #[inline]
    pub fn base_address(&self) -> u64 {
        self.base_address
    }

    /// The resolved relocations.
    #[inline]
    pub fn relocations(&self) -> &[Relocation] {
        &self.relocs
    }

    /// Copy the code out, e.g. into an executable mapping.
    pub fn to_vec(&self) -> Vec<u8> {
        self.bytes().to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::regmap::HostCondition;

    #[test]
    fn emit_word32_grows_by_four() {
        let mut buf = CodeBuffer::new(16);
        buf.emit_byte(0xCC);
        let before = buf.len();
        buf.emit_word32(0xDEAD_BEEF);
        assert_eq!(buf.len(), before + 4);
        assert_eq!(buf.as_bytes(), &[0xCC, 0xEF, 0xBE, 0xAD, 0xDE]);
    }

    #[test]
    fn emit_word64_little_endian() {
        let mut buf = CodeBuffer::new(8);
        buf.emit_word64(0x0102_0304_0506_0708);
        assert_eq!(buf.as_bytes(), &[8, 7, 6, 5, 4, 3, 2, 1]);
        assert!(!buf.has_overflowed());
    }

    #[test]
    fn overflow_is_sticky_and_leaves_storage_untouched() {
        let mut storage = [0xAAu8; 4];
        {
            let mut buf = CodeBuffer::from_slice(&mut storage[..3]);
            buf.emit_byte(1);
            buf.emit_byte(2);
            assert!(!buf.has_overflowed());
            buf.emit_word16(0x0403);
            assert!(buf.has_overflowed());
            assert_eq!(buf.len(), 2);
            // Would fit, but the flag is sticky.
            buf.emit_byte(3);
            assert_eq!(buf.as_bytes(), &[1, 2]);
        }
        assert_eq!(storage, [1, 2, 0xAA, 0xAA]);
    }

    #[test]
    fn partial_multi_byte_write_is_dropped_whole() {
        let mut buf = CodeBuffer::new(3);
        buf.emit_word32(0x1122_3344);
        assert!(buf.has_overflowed());
        assert!(buf.is_empty());
        let err = buf.finalize().unwrap_err();
        assert_eq!(
            err,
            DbtError::BufferOverflow {
                capacity: 3,
                attempted: 4
            }
        );
    }

    #[test]
    fn align_pads_with_nops() {
        let mut buf = CodeBuffer::new(32);
        buf.emit_byte(0xC3);
        buf.emit_align(8);
        assert_eq!(buf.len(), 8);
        assert!(buf.as_bytes()[1..].iter().all(|&b| b == NOP));
        buf.emit_align(8);
        assert_eq!(buf.len(), 8);
        buf.emit_align(0);
        buf.emit_align(1);
        assert_eq!(buf.len(), 8);
    }

    #[test]
    fn patch_round_trip() {
        let mut buf = CodeBuffer::new(16);
        buf.emit_byte(0xE9);
        let off = buf.emit_rel32_placeholder(RelocKind::Jmp);
        assert_eq!(off, 1);
        assert_eq!(buf.pending_relocations().count(), 1);
        buf.patch_rel32(off, 0x40).unwrap();
        let disp = buf.read_le32(off).unwrap() as i32;
        assert_eq!(disp as i64, 0x40 - (off as i64 + 4));
        assert_eq!(buf.pending_relocations().count(), 0);
        let code = buf.finalize().unwrap();
        assert_eq!(code.bytes(), &[0xE9, 0x3B, 0, 0, 0]);
    }

    #[test]
    fn patch_backwards_and_with_base() {
        let mut buf = CodeBuffer::new(16).with_base_address(0x1000);
        buf.emit_byte(0xE9);
        let off = buf.emit_rel32_placeholder(RelocKind::Jmp);
        buf.bind_local(off, 0).unwrap();
        assert_eq!(buf.read_le32(off), Some((-5i32) as u32));
    }

    #[test]
    fn local_label_near_top_of_address_space() {
        let mut buf = CodeBuffer::new(16).with_base_address(u64::MAX - 2);
        buf.emit_byte(0x0F);
        buf.emit_byte(0x84);
        let off = buf.emit_rel32_placeholder(RelocKind::Jcc(HostCondition::E));
        buf.emit_byte(0x90);
        let label = buf.len();
        buf.bind_local(off, label).unwrap();
        assert_eq!(buf.read_le32(off), Some(1));
        assert_eq!(buf.pending_relocations().count(), 0);
        assert!(buf.bind_local(usize::MAX, 0).is_err());
    }

    #[test]
    fn patch_outside_emitted_bytes_fails() {
        let mut buf = CodeBuffer::new(16);
        buf.emit_byte(0xE9);
        assert_eq!(
            buf.patch_rel32(0, 0),
            Err(DbtError::PatchOutOfBounds { offset: 0, len: 1 })
        );
        assert!(buf.patch_rel32(usize::MAX, 0).is_err());
    }

    #[test]
    fn finalize_rejects_pending_relocation() {
        let mut buf = CodeBuffer::new(16);
        buf.emit_byte(0xE8);
        let off = buf.emit_rel32_placeholder(RelocKind::Call);
        buf.set_guest_target(off, 0x4000);
        assert_eq!(
            buf.finalize().unwrap_err(),
            DbtError::UnresolvedRelocation {
                offset: 1,
                target: Some(0x4000)
            }
        );
    }

    #[test]
    fn finished_code_exposes_relocations() {
        let mut buf = CodeBuffer::new(16);
        buf.emit_byte(0xE9);
        let off = buf.emit_rel32_placeholder(RelocKind::Jmp);
        buf.patch_rel32(off, 5).unwrap();
        let code = buf.finalize().unwrap();
        assert_eq!(code.len(), 5);
        assert_eq!(code.relocations().len(), 1);
        assert_eq!(code.relocations()[0].resolved, Some(5));
        assert_eq!(code.to_vec(), vec![0xE9, 0, 0, 0, 0]);
    }
}
