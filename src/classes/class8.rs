//! Class 8 (INITIALIZATION): declaration-time defaults for SYT slots.
//!
//! Operand order here is reversed relative to every other class: the
//! destination operand comes first (`code[pc+1]`, read as a raw SYT index
//! via `data()`, not resolved) and the source comes second
//! (`code[pc+2]`, resolved normally).

use super::opcodes::*;
use crate::engine::decode::{data, Instruction};
use crate::engine::{Engine, MAX_SYT};
use crate::error::EngineResult;
use crate::value::Value;

pub fn execute(engine: &mut Engine, instr: &Instruction) -> EngineResult<()> {
    let pc = instr.pc;
    let numop = instr.numop;

    match instr.popcode {
        POP_IINT if numop >= 2 => {
            let dest = data(engine.code[(pc + 1) as usize]) as usize;
            let src = engine.resolve_operand(engine.code[(pc + 2) as usize]);
            let n = match src {
                Value::Scalar(s) => s as i32,
                Value::Integer(i) => i,
                _ => 0,
            };
            if dest < MAX_SYT {
                engine.syt[dest].value = Value::Integer(n);
                engine.syt[dest].allocated = true;
            }
        }

        POP_SINT if numop >= 2 => {
            let dest = data(engine.code[(pc + 1) as usize]) as usize;
            let src = engine.resolve_operand(engine.code[(pc + 2) as usize]);
            let s = match src {
                Value::Integer(i) => i as f64,
                Value::Scalar(s) => s,
                _ => 0.0,
            };
            if dest < MAX_SYT {
                engine.syt[dest].value = Value::Scalar(s);
                engine.syt[dest].allocated = true;
            }
        }

        POP_CINT if numop >= 2 => {
            let dest = data(engine.code[(pc + 1) as usize]) as usize;
            let src = engine.resolve_operand(engine.code[(pc + 2) as usize]);
            let bytes = match src {
                Value::Char(b) => b,
                _ => Vec::new(),
            };
            if dest < MAX_SYT {
                engine.syt[dest].value = Value::Char(bytes);
                engine.syt[dest].allocated = true;
            }
        }

        POP_BINT if numop >= 2 => {
            let dest = data(engine.code[(pc + 1) as usize]) as usize;
            let src = engine.resolve_operand(engine.code[(pc + 2) as usize]);
            if dest < MAX_SYT {
                engine.syt[dest].value = Value::Bit(src.to_bits());
                engine.syt[dest].allocated = true;
            }
        }

        // MINT/VINT/NINT/TINT/EINT: unimplemented in the reference, no-op.
        // STRI/SLRI/ELRI/ETRI: the reference's handler does nothing at all.
        _ => {}
    }

    engine.pc = instr.next_pc();
    Ok(())
}
