//! Exception generation, hints, and barriers.

use super::{ExitKind, Flow, Translator};
use crate::buffer::CodeBuffer;
use crate::decoder::{Barrier, System};
use crate::encoder::{emit_lfence, emit_mfence};
use crate::error::DbtError;

impl Translator<'_> {
    /// `SVC`/`BRK`/`HLT` leave the block for the runtime; the guest target is
    /// where execution resumes afterwards (the next instruction for `SVC`,
    /// the faulting one otherwise).
    pub(super) fn system(
        &mut self,
        buf: &mut CodeBuffer<'_>,
        sys: &System,
    ) -> Result<Flow, DbtError> {
        let pc = self.pc;
        match *sys {
            System::Svc { imm } => {
                self.exit_jmp(buf, Some(pc.wrapping_add(4)), ExitKind::Syscall(imm));
                Ok(Flow::Exit)
            }
            System::Brk { imm } => {
                self.exit_jmp(buf, Some(pc), ExitKind::Breakpoint(imm));
                Ok(Flow::Exit)
            }
            System::Hlt { imm } => {
                self.exit_jmp(buf, Some(pc), ExitKind::Halt(imm));
                Ok(Flow::Exit)
            }
            System::Nop => Ok(Flow::Continue),
            System::Barrier(Barrier::Dmb | Barrier::Dsb) => {
                emit_mfence(buf);
                Ok(Flow::Continue)
            }
            System::Barrier(Barrier::Isb) => {
                emit_lfence(buf);
                Ok(Flow::Continue)
            }
        }
    }
}
