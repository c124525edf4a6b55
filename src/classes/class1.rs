//! Class 1 (BIT): assign, and/or/not, concatenate, widen-from-integer.

use super::opcodes::*;
use crate::engine::decode::{data, Instruction};
use crate::engine::{Engine, MAX_SYT};
use crate::error::EngineResult;
use crate::value::Value;

pub fn execute(engine: &mut Engine, instr: &Instruction) -> EngineResult<()> {
    let pc = instr.pc;
    let numop = instr.numop;

    match instr.popcode {
        POP_BASN if numop >= 2 => {
            let src = engine.resolve_operand(engine.code[(pc + 1) as usize]);
            let dest = data(engine.code[(pc + 2) as usize]) as usize;
            if dest < MAX_SYT {
                engine.syt[dest].value = Value::Bit(src.to_bits());
                engine.syt[dest].allocated = true;
            }
        }

        POP_BAND if numop >= 2 => {
            let a = engine.resolve_operand(engine.code[(pc + 1) as usize]).to_bits();
            let b = engine.resolve_operand(engine.code[(pc + 2) as usize]).to_bits();
            engine.store_vac(pc, Value::Bit(a & b));
        }

        POP_BOR if numop >= 2 => {
            let a = engine.resolve_operand(engine.code[(pc + 1) as usize]).to_bits();
            let b = engine.resolve_operand(engine.code[(pc + 2) as usize]).to_bits();
            engine.store_vac(pc, Value::Bit(a | b));
        }

        POP_BNOT if numop >= 1 => {
            let a = engine.resolve_operand(engine.code[(pc + 1) as usize]).to_bits();
            engine.store_vac(pc, Value::Bit(!a));
        }

        POP_BCAT if numop >= 2 => {
            let a = engine.resolve_operand(engine.code[(pc + 1) as usize]).to_bits();
            let b = engine.resolve_operand(engine.code[(pc + 2) as usize]).to_bits();
            engine.store_vac(pc, Value::Bit((a << 16) | (b & 0xFFFF)));
        }

        POP_BTOB if numop >= 1 => {
            let a = engine.resolve_operand(engine.code[(pc + 1) as usize]);
            engine.store_vac(pc, Value::Bit(a.to_bits()));
        }

        POP_ITOB if numop >= 1 => {
            let a = engine.resolve_operand(engine.code[(pc + 1) as usize]);
            engine.store_vac(pc, Value::Bit(a.to_int() as u32));
        }

        other => {
            tracing::warn!(popcode = format!("0x{:03X}", other), pc, "halmat_class1: unknown popcode");
        }
    }

    engine.pc = instr.next_pc();
    Ok(())
}
