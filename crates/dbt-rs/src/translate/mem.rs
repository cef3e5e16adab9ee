//! Loads and stores.
//!
//! Guest addresses are host addresses: the effective address is formed
//! directly in an x86 memory operand. Writeback goes through `LEA` so the
//! host flags survive.
//!
//! Acquire loads are plain `MOV`s under x86 ordering. Release stores are
//! followed by `MFENCE` so a later acquire load cannot pass them. A
//! translated block owns its thread, so every store-exclusive succeeds and
//! writes status 0.

use super::Translator;
use crate::buffer::CodeBuffer;
use crate::decoder::{Addressing, IndexExtend, MemAccess, OrderedAccess};
use crate::encoder::{
    emit_fload, emit_fstore, emit_lea, emit_load_imm_keep_flags, emit_mfence, emit_mov_load,
    emit_mov_rr, emit_mov_store, emit_mov_store16, emit_mov_store8, emit_mov_store_imm,
    emit_movdqu_load, emit_movdqu_store, emit_movsx16_load, emit_movsx8_load, emit_movsxd_load,
    emit_movsxd_rr, emit_movzx16_load, emit_movzx8_load, Mem, Precision, Width,
};
use crate::error::DbtError;
use crate::regmap::GUEST_ZR;

/// Resolved address of the first register of an access.
struct Address {
    mem: Mem,
    /// Base register and increment applied after the access.
    post: Option<(u8, i32)>,
}

impl Translator<'_> {
    pub(super) fn load(
        &mut self,
        buf: &mut CodeBuffer<'_>,
        access: &MemAccess,
    ) -> Result<(), DbtError> {
        let addr = self.address(buf, access)?;
        let second = match access.rt2 {
            Some(rt2) => Some((rt2, self.next_slot(addr.mem, access.size)?)),
            None => None,
        };
        if access.vector {
            self.load_vector(buf, access.size, access.rt, addr.mem)?;
            if let Some((rt2, mem)) = second {
                self.load_vector(buf, access.size, rt2, mem)?;
            }
        } else {
            let first = (access.rt, addr.mem);
            let clobbers_base = self.gpr_or_zr(access.rt)? == Some(addr.mem.base);
            match second {
                // The base is still needed for the second load.
                Some(pair) if clobbers_base => {
                    self.load_gpr(buf, access, pair.0, pair.1)?;
                    self.load_gpr(buf, access, first.0, first.1)?;
                }
                Some(pair) => {
                    self.load_gpr(buf, access, first.0, first.1)?;
                    self.load_gpr(buf, access, pair.0, pair.1)?;
                }
                None => self.load_gpr(buf, access, first.0, first.1)?,
            }
        }
        self.writeback(buf, addr.post);
        Ok(())
    }

    pub(super) fn store(
        &mut self,
        buf: &mut CodeBuffer<'_>,
        access: &MemAccess,
    ) -> Result<(), DbtError> {
        let addr = self.address(buf, access)?;
        let mut slots = [(access.rt, addr.mem), (0, addr.mem)];
        let count = match access.rt2 {
            Some(rt2) => {
                slots[1] = (rt2, self.next_slot(addr.mem, access.size)?);
                2
            }
            None => 1,
        };
        for &(rt, mem) in &slots[..count] {
            if access.vector {
                self.store_vector(buf, access.size, rt, mem)?;
            } else {
                self.store_gpr(buf, access.size, rt, mem)?;
            }
        }
        self.writeback(buf, addr.post);
        Ok(())
    }

    /// `LDAR`/`STLR` and the exclusives.
    pub(super) fn ordered(
        &mut self,
        buf: &mut CodeBuffer<'_>,
        op: &OrderedAccess,
    ) -> Result<(), DbtError> {
        if op.load {
            return self.load(buf, &op.access);
        }
        let status = match op.status {
            Some(ws) => self.gpr_or_zr(ws)?,
            None => None,
        };
        self.store(buf, &op.access)?;
        if op.ordered {
            emit_mfence(buf);
        }
        if let Some(status) = status {
            emit_load_imm_keep_flags(buf, status, 0);
        }
        Ok(())
    }

    // ── Addressing ───────────────────────────────────────────────────────

    fn address(
        &mut self,
        buf: &mut CodeBuffer<'_>,
        access: &MemAccess,
    ) -> Result<Address, DbtError> {
        let base = self.gpr(access.rn)?;
        let disp = |imm: i64| {
            i32::try_from(imm).map_err(|_| self.unsupported("offset exceeds 32 bits"))
        };
        match access.addressing {
            Addressing::Offset(imm) => Ok(Address {
                mem: Mem::new(base, disp(imm)?),
                post: None,
            }),
            Addressing::PreIndex(imm) => {
                let imm = disp(imm)?;
                emit_lea(buf, Width::W64, base, Mem::new(base, imm));
                Ok(Address {
                    mem: Mem::base(base),
                    post: None,
                })
            }
            Addressing::PostIndex(imm) => Ok(Address {
                mem: Mem::base(base),
                post: Some((base, disp(imm)?)),
            }),
            Addressing::Register { rm: GUEST_ZR, .. } => Ok(Address {
                mem: Mem::base(base),
                post: None,
            }),
            Addressing::Register { rm, extend, shift } => {
                let m = self.gpr(rm)?;
                let s = self.scratch();
                let index = match extend {
                    IndexExtend::Lsl | IndexExtend::Sxtx => m,
                    IndexExtend::Uxtw => {
                        emit_mov_rr(buf, Width::W32, s, m);
                        s
                    }
                    IndexExtend::Sxtw => {
                        emit_movsxd_rr(buf, s, m);
                        s
                    }
                };
                let mem = match Mem::indexed(base, index, shift, 0) {
                    Some(mem) => mem,
                    None => {
                        // RSP as a scaled index
                        emit_mov_rr(buf, Width::W64, s, index);
                        Mem::indexed(base, s, shift, 0)
                            .ok_or_else(|| self.unsupported("unencodable index"))?
                    }
                };
                Ok(Address { mem, post: None })
            }
        }
    }

    fn next_slot(&self, mem: Mem, size: u8) -> Result<Mem, DbtError> {
        let disp = mem
            .disp
            .checked_add(i32::from(size))
            .ok_or_else(|| self.unsupported("pair offset exceeds 32 bits"))?;
        Ok(Mem { disp, ..mem })
    }

    fn writeback(&self, buf: &mut CodeBuffer<'_>, post: Option<(u8, i32)>) {
        if let Some((base, imm)) = post {
            emit_lea(buf, Width::W64, base, Mem::new(base, imm));
        }
    }

    // ── General registers ────────────────────────────────────────────────

    fn load_gpr(
        &mut self,
        buf: &mut CodeBuffer<'_>,
        access: &MemAccess,
        rt: u8,
        mem: Mem,
    ) -> Result<(), DbtError> {
        // A load into XZR still performs the access.
        let dst = self.gpr_or_zr(rt)?.unwrap_or_else(|| self.scratch());
        let width = Width::from_sf(access.wide);
        match (access.size, access.signed) {
            (1, false) => emit_movzx8_load(buf, dst, mem),
            (2, false) => emit_movzx16_load(buf, dst, mem),
            (4, false) => emit_mov_load(buf, Width::W32, dst, mem),
            (8, _) => emit_mov_load(buf, Width::W64, dst, mem),
            (1, true) => emit_movsx8_load(buf, width, dst, mem),
            (2, true) => emit_movsx16_load(buf, width, dst, mem),
            (4, true) => emit_movsxd_load(buf, dst, mem),
            (size, _) => {
                return Err(self.unsupported(alloc::format!("{}-byte integer load", size)))
            }
        }
        Ok(())
    }

    fn store_gpr(
        &mut self,
        buf: &mut CodeBuffer<'_>,
        size: u8,
        rt: u8,
        mem: Mem,
    ) -> Result<(), DbtError> {
        let Some(src) = self.gpr_or_zr(rt)? else {
            if !matches!(size, 1 | 2 | 4 | 8) {
                return Err(self.unsupported(alloc::format!("{}-byte integer store", size)));
            }
            emit_mov_store_imm(buf, size, mem, 0);
            return Ok(());
        };
        match size {
            1 => emit_mov_store8(buf, mem, src),
            2 => emit_mov_store16(buf, mem, src),
            4 => emit_mov_store(buf, Width::W32, mem, src),
            8 => emit_mov_store(buf, Width::W64, mem, src),
            _ => return Err(self.unsupported(alloc::format!("{}-byte integer store", size))),
        }
        Ok(())
    }

    // ── SIMD&FP registers ────────────────────────────────────────────────

    fn load_vector(
        &mut self,
        buf: &mut CodeBuffer<'_>,
        size: u8,
        rt: u8,
        mem: Mem,
    ) -> Result<(), DbtError> {
        let dst = self.xmm(rt)?;
        match size {
            4 => emit_fload(buf, Precision::Single, dst, mem),
            8 => emit_fload(buf, Precision::Double, dst, mem),
            16 => emit_movdqu_load(buf, dst, mem),
            _ => return Err(self.unsupported(alloc::format!("{}-byte vector load", size))),
        }
        Ok(())
    }

    fn store_vector(
        &mut self,
        buf: &mut CodeBuffer<'_>,
        size: u8,
        rt: u8,
        mem: Mem,
    ) -> Result<(), DbtError> {
        let src = self.xmm(rt)?;
        match size {
            4 => emit_fstore(buf, Precision::Single, mem, src),
            8 => emit_fstore(buf, Precision::Double, mem, src),
            16 => emit_movdqu_store(buf, mem, src),
            _ => return Err(self.unsupported(alloc::format!("{}-byte vector store", size))),
        }
        Ok(())
    }
}
