//! Guest→host register and condition-code mapping.
//!
//! ## Registers
//!
//! The 32 AArch64 general registers and 32 vector registers are folded onto
//! the 16 x86-64 GPRs and 16 XMM registers by keeping the low four bits of the
//! register number. Guest `X0..X15` land on `RAX..R15` in encoding order and
//! `X16..X31` alias them again. There is no spilling: two guest registers
//! whose numbers differ only in bit 4 share one host register.
//!
//! ## Conditions
//!
//! Each AArch64 condition maps to the x86 `Jcc` that tests the same predicate
//! over flags produced by a host `CMP`/`SUB`. ARM's carry after subtraction
//! is "no borrow" while x86 sets CF on borrow, so `CS`/`HS` becomes `JAE`
//! and `CC`/`LO` becomes `JB`. `AL` and `NV` have no host condition at all.

use core::fmt;

use crate::error::{DbtError, RegisterFile};

// ─── Host register numbers ──────────────────────────────────────────────────

pub const RAX: u8 = 0;
pub const RCX: u8 = 1;
pub const RDX: u8 = 2;
pub const RBX: u8 = 3;
pub const RSP: u8 = 4;
pub const RBP: u8 = 5;
pub const RSI: u8 = 6;
pub const RDI: u8 = 7;
pub const R8: u8 = 8;
pub const R9: u8 = 9;
pub const R10: u8 = 10;
pub const R11: u8 = 11;
pub const R12: u8 = 12;
pub const R13: u8 = 13;
pub const R14: u8 = 14;
pub const R15: u8 = 15;

pub const XMM0: u8 = 0;
pub const XMM1: u8 = 1;
pub const XMM15: u8 = 15;

/// AArch64 register number 31: `XZR` in data processing, `SP` as a base.
pub const GUEST_ZR: u8 = 31;
/// AArch64 link register.
pub const GUEST_LR: u8 = 30;

/// Map a guest general register (0–31) to a host GPR (0–15).
#[inline]
pub const fn map_gpr(guest: u8) -> u8 {
    guest & 0x0F
}

/// Map a guest vector register (0–31) to a host XMM register (0–15).
#[inline]
pub const fn map_xmm(guest: u8) -> u8 {
    guest & 0x0F
}

// ─── Scratch registers ──────────────────────────────────────────────────────

/// Host registers a translation may clobber for intermediate values.
///
/// The translator never picks a scratch register on its own. Every guest
/// operand of the instruction being translated is checked against this pair,
/// and a collision is reported as [`DbtError::ScratchConflict`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ScratchRegs {
    /// Scratch GPR. Default: `R11`.
    pub gpr: u8,
    /// Scratch XMM register. Default: `XMM15`.
    pub xmm: u8,
}

impl Default for ScratchRegs {
    fn default() -> Self {
        Self {
            gpr: R11,
            xmm: XMM15,
        }
    }
}

impl ScratchRegs {
    /// Fail if the guest GPR `guest` would alias the scratch GPR.
    pub fn check_gpr(&self, guest: u8, pc: u64) -> Result<u8, DbtError> {
        let host = map_gpr(guest);
        if host == self.gpr {
            return Err(DbtError::ScratchConflict {
                file: RegisterFile::Gpr,
                register: host,
                pc,
            });
        }
        Ok(host)
    }

    /// Fail if the guest vector register `guest` would alias the scratch XMM.
    pub fn check_xmm(&self, guest: u8, pc: u64) -> Result<u8, DbtError> {
        let host = map_xmm(guest);
        if host == self.xmm {
            return Err(DbtError::ScratchConflict {
                file: RegisterFile::Xmm,
                register: host,
                pc,
            });
        }
        Ok(host)
    }
}

// ─── Conditions ─────────────────────────────────────────────────────────────

/// AArch64 condition code (the 4-bit `cond` field).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum Condition {
    Eq = 0x0,
    Ne = 0x1,
    /// Carry set / unsigned higher or same (`HS`).
    Cs = 0x2,
    /// Carry clear / unsigned lower (`LO`).
    Cc = 0x3,
    Mi = 0x4,
    Pl = 0x5,
    Vs = 0x6,
    Vc = 0x7,
    Hi = 0x8,
    Ls = 0x9,
    Ge = 0xA,
    Lt = 0xB,
    Gt = 0xC,
    Le = 0xD,
    Al = 0xE,
    Nv = 0xF,
}

impl Condition {
    /// Decode the low four bits of `bits`. Total over all inputs.
    pub const fn from_bits(bits: u32) -> Self {
        match bits & 0xF {
            0x0 => Condition::Eq,
            0x1 => Condition::Ne,
            0x2 => Condition::Cs,
            0x3 => Condition::Cc,
            0x4 => Condition::Mi,
            0x5 => Condition::Pl,
            0x6 => Condition::Vs,
            0x7 => Condition::Vc,
            0x8 => Condition::Hi,
            0x9 => Condition::Ls,
            0xA => Condition::Ge,
            0xB => Condition::Lt,
            0xC => Condition::Gt,
            0xD => Condition::Le,
            0xE => Condition::Al,
            _ => Condition::Nv,
        }
    }

    /// Raw 4-bit field value.
    #[inline]
    pub const fn bits(self) -> u8 {
        self as u8
    }

    /// Logical negation. `AL` and `NV` both mean "always" and invert to each other.
    pub const fn invert(self) -> Self {
        Self::from_bits((self as u32) ^ 1)
    }

    /// `true` for `AL` and `NV`.
    pub const fn is_always(self) -> bool {
        matches!(self, Condition::Al | Condition::Nv)
    }

    /// Host condition testing the same predicate, or `None` for `AL`/`NV`.
    pub const fn to_host(self) -> Option<HostCondition> {
        Some(match self {
            Condition::Eq => HostCondition::E,
            Condition::Ne => HostCondition::Ne,
            Condition::Cs => HostCondition::Ae,
            Condition::Cc => HostCondition::B,
            Condition::Mi => HostCondition::S,
            Condition::Pl => HostCondition::Ns,
            Condition::Vs => HostCondition::O,
            Condition::Vc => HostCondition::No,
            Condition::Hi => HostCondition::A,
            Condition::Ls => HostCondition::Be,
            Condition::Ge => HostCondition::Ge,
            Condition::Lt => HostCondition::L,
            Condition::Gt => HostCondition::G,
            Condition::Le => HostCondition::Le,
            Condition::Al | Condition::Nv => return None,
        })
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Condition::Eq => "eq",
            Condition::Ne => "ne",
            Condition::Cs => "cs",
            Condition::Cc => "cc",
            Condition::Mi => "mi",
            Condition::Pl => "pl",
            Condition::Vs => "vs",
            Condition::Vc => "vc",
            Condition::Hi => "hi",
            Condition::Ls => "ls",
            Condition::Ge => "ge",
            Condition::Lt => "lt",
            Condition::Gt => "gt",
            Condition::Le => "le",
            Condition::Al => "al",
            Condition::Nv => "nv",
        };
        f.write_str(s)
    }
}

/// x86 condition code (the `tttn` nibble shared by `Jcc`, `SETcc`, `CMOVcc`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum HostCondition {
    O = 0x0,
    No = 0x1,
    B = 0x2,
    Ae = 0x3,
    E = 0x4,
    Ne = 0x5,
    Be = 0x6,
    A = 0x7,
    S = 0x8,
    Ns = 0x9,
    P = 0xA,
    Np = 0xB,
    L = 0xC,
    Ge = 0xD,
    Le = 0xE,
    G = 0xF,
}

impl HostCondition {
    /// The 4-bit condition nibble.
    #[inline]
    pub const fn cc(self) -> u8 {
        self as u8
    }

    /// Second opcode byte of the near `Jcc rel32` (`0F 80+cc`).
    #[inline]
    pub const fn jcc_opcode(self) -> u8 {
        0x80 | self as u8
    }

    /// Second opcode byte of `CMOVcc` (`0F 40+cc`).
    #[inline]
    pub const fn cmov_opcode(self) -> u8 {
        0x40 | self as u8
    }

    /// Second opcode byte of `SETcc` (`0F 90+cc`).
    #[inline]
    pub const fn setcc_opcode(self) -> u8 {
        0x90 | self as u8
    }

    /// Logical negation (flip the low bit).
    pub const fn invert(self) -> Self {
        match self {
            HostCondition::O => HostCondition::No,
            HostCondition::No => HostCondition::O,
            HostCondition::B => HostCondition::Ae,
            HostCondition::Ae => HostCondition::B,
            HostCondition::E => HostCondition::Ne,
            HostCondition::Ne => HostCondition::E,
            HostCondition::Be => HostCondition::A,
            HostCondition::A => HostCondition::Be,
            HostCondition::S => HostCondition::Ns,
            HostCondition::Ns => HostCondition::S,
            HostCondition::P => HostCondition::Np,
            HostCondition::Np => HostCondition::P,
            HostCondition::L => HostCondition::Ge,
            HostCondition::Ge => HostCondition::L,
            HostCondition::Le => HostCondition::G,
            HostCondition::G => HostCondition::Le,
        }
    }
}

/// Map an AArch64 condition to the second byte of the host `Jcc rel32`.
///
/// Returns `None` for `AL`/`NV`: no conditional branch is emitted for them.
pub const fn map_condition(cond: Condition) -> Option<u8> {
    match cond.to_host() {
        Some(host) => Some(host.jcc_opcode()),
        None => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gpr_mapping_truncates_to_low_nibble() {
        assert_eq!(map_gpr(0), RAX);
        assert_eq!(map_gpr(8), R8);
        assert_eq!(map_gpr(15), R15);
        assert_eq!(map_gpr(16), RAX);
        assert_eq!(map_gpr(30), R14);
        assert_eq!(map_gpr(31), R15);
    }

    #[test]
    fn xmm_mapping_truncates_to_low_nibble() {
        assert_eq!(map_xmm(0), XMM0);
        assert_eq!(map_xmm(17), XMM1);
        assert_eq!(map_xmm(31), XMM15);
    }

    #[test]
    fn condition_table_matches_jcc_opcodes() {
        let table = [
            (Condition::Eq, 0x84),
            (Condition::Ne, 0x85),
            (Condition::Cs, 0x83),
            (Condition::Cc, 0x82),
            (Condition::Mi, 0x88),
            (Condition::Pl, 0x89),
            (Condition::Vs, 0x80),
            (Condition::Vc, 0x81),
            (Condition::Hi, 0x87),
            (Condition::Ls, 0x86),
            (Condition::Ge, 0x8D),
            (Condition::Lt, 0x8C),
            (Condition::Gt, 0x8F),
            (Condition::Le, 0x8E),
        ];
        for (cond, op) in table {
            assert_eq!(map_condition(cond), Some(op), "{cond}");
        }
        assert_eq!(map_condition(Condition::Al), None);
        assert_eq!(map_condition(Condition::Nv), None);
    }

    #[test]
    fn inverted_guest_condition_inverts_host_condition() {
        for bits in 0..14 {
            let cond = Condition::from_bits(bits);
            let host = cond.to_host().unwrap();
            assert_eq!(cond.invert().to_host().unwrap(), host.invert(), "{cond}");
        }
    }

    #[test]
    fn from_bits_is_total() {
        for bits in 0..32u32 {
            assert_eq!(Condition::from_bits(bits).bits() as u32, bits & 0xF);
        }
    }

    #[test]
    fn scratch_conflicts_are_reported() {
        let scratch = ScratchRegs::default();
        assert_eq!(scratch.check_gpr(3, 0), Ok(RBX));
        // X27 aliases R11.
        assert!(matches!(
            scratch.check_gpr(27, 0x40),
            Err(DbtError::ScratchConflict {
                file: RegisterFile::Gpr,
                register: 11,
                pc: 0x40
            })
        ));
        assert!(scratch.check_xmm(31, 0).is_err());
        assert_eq!(scratch.check_xmm(14, 0), Ok(14));
    }
}
