//! Class 6 (INTEGER): assign, add/sub/mul, bounded power, negate,
//! conversions from SCALAR/BIT/CHAR.

use super::opcodes::*;
use crate::engine::decode::{data, Instruction};
use crate::engine::{Engine, MAX_SYT};
use crate::error::EngineResult;
use crate::value::Value;

/// Matches `Value::to_int` exactly; kept local because the reference's
/// class-6 handler spells the same coercion out by hand rather than calling
/// a shared helper.
fn to_int(v: &Value) -> i32 {
    v.to_int()
}

pub fn execute(engine: &mut Engine, instr: &Instruction) -> EngineResult<()> {
    let pc = instr.pc;
    let numop = instr.numop;

    match instr.popcode {
        POP_IASN if numop >= 2 => {
            let src = engine.resolve_operand(engine.code[(pc + 1) as usize]);
            let dest = data(engine.code[(pc + 2) as usize]) as usize;
            if dest < MAX_SYT {
                engine.syt[dest].value = Value::Integer(to_int(&src));
                engine.syt[dest].allocated = true;
            }
        }

        POP_IADD if numop >= 2 => {
            let a = to_int(&engine.resolve_operand(engine.code[(pc + 1) as usize]));
            let b = to_int(&engine.resolve_operand(engine.code[(pc + 2) as usize]));
            engine.store_vac(pc, Value::Integer(a.wrapping_add(b)));
        }

        POP_ISUB if numop >= 2 => {
            let a = to_int(&engine.resolve_operand(engine.code[(pc + 1) as usize]));
            let b = to_int(&engine.resolve_operand(engine.code[(pc + 2) as usize]));
            engine.store_vac(pc, Value::Integer(a.wrapping_sub(b)));
        }

        POP_IIPR if numop >= 2 => {
            let a = to_int(&engine.resolve_operand(engine.code[(pc + 1) as usize]));
            let b = to_int(&engine.resolve_operand(engine.code[(pc + 2) as usize]));
            engine.store_vac(pc, Value::Integer(a.wrapping_mul(b)));
        }

        POP_INEG if numop >= 1 => {
            let a = to_int(&engine.resolve_operand(engine.code[(pc + 1) as usize]));
            engine.store_vac(pc, Value::Integer(-a));
        }

        POP_IPEX if numop >= 2 => {
            let base = to_int(&engine.resolve_operand(engine.code[(pc + 1) as usize]));
            let exp = to_int(&engine.resolve_operand(engine.code[(pc + 2) as usize]));
            let mut result: i32 = 1;
            let mut i = 0;
            while i < exp && i < 31 {
                result = result.wrapping_mul(base);
                i += 1;
            }
            engine.store_vac(pc, Value::Integer(result));
        }

        POP_STOI | POP_BTOI | POP_ITOI if numop >= 1 => {
            let a = engine.resolve_operand(engine.code[(pc + 1) as usize]);
            engine.store_vac(pc, Value::Integer(to_int(&a)));
        }

        POP_CTOI => {
            // Permanent stub: the reference never implemented CHAR parsing.
            engine.store_vac(pc, Value::Integer(0));
        }

        other => {
            tracing::warn!(popcode = format!("0x{:03X}", other), pc, "halmat_class6: unknown popcode");
        }
    }

    engine.pc = instr.next_pc();
    Ok(())
}
