//! The step/run loop: read the word at `pc`, decode it, dispatch to the
//! owning class handler, and advance until the program halts or errors.

use super::decode::{is_op, Instruction};
use super::{Engine, HaltState};
use crate::classes;
use crate::error::EngineResult;

impl Engine {
    /// Execute exactly one instruction. A stray operand word at `pc` (one
    /// the previous instruction didn't consume, or a loader artifact) is
    /// skipped by advancing a single word, matching the reference's
    /// defensive resync behavior.
    pub fn step(&mut self) -> EngineResult<()> {
        if self.is_halted() {
            return Ok(());
        }

        let Some(&word) = self.code.get(self.pc as usize) else {
            self.halted = HaltState::Normal;
            return Ok(());
        };

        if !is_op(word) {
            self.pc += 1;
            return Ok(());
        }

        let instr = Instruction::decode(self.pc, word);

        if self.debug_mode && self.hit_breakpoint(instr.pc) {
            self.single_step = true;
        }

        let result = classes::execute(self, &instr);
        self.cycle_count += 1;

        if let Err(err) = &result {
            tracing::error!(pc = instr.pc, popcode = format!("0x{:03X}", instr.popcode), %err, "halmat step failed");
            self.halted = HaltState::Error;
        }

        result
    }

    /// True if the instruction about to execute matches a breakpoint, by
    /// address or by source statement number.
    pub fn hit_breakpoint(&self, pc: u32) -> bool {
        self.breakpoints
            .iter()
            .any(|bp| bp.enabled && (bp.addr == pc || (bp.stmt > 0 && bp.stmt == self.current_stmt)))
    }

    /// Run to completion (or error), ignoring breakpoints entirely. Used by
    /// the non-interactive CLI path.
    pub fn run(&mut self) -> EngineResult<()> {
        while !self.is_halted() {
            self.step()?;
        }
        Ok(())
    }
}
