//! Pending rel32 relocations.
//!
//! Every relative jump, conditional jump, and call emitted into a
//! [`CodeBuffer`](crate::buffer::CodeBuffer) leaves a 4-byte zero placeholder
//! and a [`Relocation`] entry describing it. Entries are resolved by
//! [`patch_rel32`](crate::buffer::CodeBuffer::patch_rel32); the buffer refuses
//! to finalize while any entry is still pending.

use core::fmt;

use crate::error::DbtError;
use crate::regmap::HostCondition;

/// Width in bytes of every relocation field this crate emits.
pub const REL32_WIDTH: usize = 4;

/// Which instruction owns the placeholder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RelocKind {
    /// `E9 rel32`.
    Jmp,
    /// `0F 8x rel32`.
    Jcc(HostCondition),
    /// `E8 rel32`.
    Call,
}

impl fmt::Display for RelocKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RelocKind::Jmp => write!(f, "jmp"),
            RelocKind::Jcc(cc) => write!(f, "jcc({:#x})", cc.cc()),
            RelocKind::Call => write!(f, "call"),
        }
    }
}

/// A 4-byte displacement field awaiting its final value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Relocation {
    /// Buffer offset of the first placeholder byte.
    pub offset: usize,
    /// The instruction the field belongs to.
    pub kind: RelocKind,
    /// Guest address this branch leaves to, for block exits.
    pub guest_target: Option<u64>,
    /// Host address the field was patched against.
    pub resolved: Option<u64>,
}

impl Relocation {
    pub(crate) fn new(offset: usize, kind: RelocKind) -> Self {
        Self {
            offset,
            kind,
            guest_target: None,
            resolved: None,
        }
    }

    /// `true` once the placeholder holds its final displacement.
    #[inline]
    pub fn is_resolved(&self) -> bool {
        self.resolved.is_some()
    }

    /// Offset of the byte after the field; the CPU measures from here.
    #[inline]
    pub fn end(&self) -> usize {
        self.offset + REL32_WIDTH
    }
}

/// Displacement for a rel32 field at `offset` in code loaded at `base`.
///
/// # Errors
///
/// Returns [`DbtError::RelocationOutOfRange`] if the result does not fit in `i32`.
pub fn rel32_displacement(base: u64, offset: usize, target: u64) -> Result<i32, DbtError> {
    let next = base as i128 + offset as i128 + REL32_WIDTH as i128;
    let disp = target as i128 - next;
    i32::try_from(disp).map_err(|_| DbtError::RelocationOutOfRange {
        offset,
        displacement: disp.clamp(i64::MIN as i128, i64::MAX as i128) as i64,
    })
}

/// Read a little-endian `u32` at `offset`, or `None` if it would run past `bytes`.
pub fn read_le32(bytes: &[u8], offset: usize) -> Option<u32> {
    let end = offset.checked_add(REL32_WIDTH)?;
    let field: [u8; 4] = bytes.get(offset..end)?.try_into().ok()?;
    Some(u32::from_le_bytes(field))
}

/// Verify every relocation in `relocs` has been patched.
///
/// # Errors
///
/// Returns [`DbtError::UnresolvedRelocation`] naming the first pending entry.
pub fn check_resolved(relocs: &[Relocation]) -> Result<(), DbtError> {
    match relocs.iter().find(|r| !r.is_resolved()) {
        Some(r) => Err(DbtError::UnresolvedRelocation {
            offset: r.offset,
            target: r.guest_target,
        }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn displacement_is_measured_from_field_end() {
        assert_eq!(rel32_displacement(0, 1, 0x100), Ok(0x100 - 5));
        assert_eq!(rel32_displacement(0, 10, 0), Ok(-14));
        assert_eq!(rel32_displacement(0x40_0000, 1, 0x40_0000), Ok(-5));
    }

    #[test]
    fn displacement_out_of_range() {
        let err = rel32_displacement(0, 0, 1 << 33).unwrap_err();
        assert!(matches!(
            err,
            DbtError::RelocationOutOfRange { offset: 0, .. }
        ));
    }

    #[test]
    fn read_le32_bounds() {
        let bytes = [0x78, 0x56, 0x34, 0x12, 0xAA];
        assert_eq!(read_le32(&bytes, 0), Some(0x1234_5678));
        assert_eq!(read_le32(&bytes, 1), Some(0xAA12_3456));
        assert_eq!(read_le32(&bytes, 2), None);
        assert_eq!(read_le32(&bytes, usize::MAX), None);
    }

    #[test]
    fn check_resolved_reports_first_pending() {
        let mut a = Relocation::new(1, RelocKind::Jmp);
        let mut b = Relocation::new(7, RelocKind::Call);
        b.guest_target = Some(0x2000);
        assert!(check_resolved(&[a, b]).is_err());
        a.resolved = Some(0);
        assert_eq!(
            check_resolved(&[a, b]),
            Err(DbtError::UnresolvedRelocation {
                offset: 7,
                target: Some(0x2000)
            })
        );
        b.resolved = Some(0);
        assert_eq!(check_resolved(&[a, b]), Ok(()));
    }
}
