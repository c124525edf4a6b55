//! Class 5 (SCALAR, double): assign, add/sub/mul/div, power, negate,
//! conversions from INTEGER/BIT/CHAR.

use super::opcodes::*;
use crate::engine::decode::{data, Instruction};
use crate::engine::{Engine, MAX_SYT};
use crate::error::{EngineError, EngineResult};
use crate::value::Value;

pub fn execute(engine: &mut Engine, instr: &Instruction) -> EngineResult<()> {
    let pc = instr.pc;
    let numop = instr.numop;

    match instr.popcode {
        POP_SASN if numop >= 2 => {
            let src = engine.resolve_operand(engine.code[(pc + 1) as usize]);
            let dest = data(engine.code[(pc + 2) as usize]) as usize;
            if dest < MAX_SYT {
                engine.syt[dest].value = Value::Scalar(src.to_scalar());
                engine.syt[dest].allocated = true;
            }
        }

        POP_SADD if numop >= 2 => {
            let a = engine.resolve_operand(engine.code[(pc + 1) as usize]).to_scalar();
            let b = engine.resolve_operand(engine.code[(pc + 2) as usize]).to_scalar();
            engine.store_vac(pc, Value::Scalar(a + b));
        }

        POP_SSUB if numop >= 2 => {
            let a = engine.resolve_operand(engine.code[(pc + 1) as usize]).to_scalar();
            let b = engine.resolve_operand(engine.code[(pc + 2) as usize]).to_scalar();
            engine.store_vac(pc, Value::Scalar(a - b));
        }

        POP_SSPR if numop >= 2 => {
            let a = engine.resolve_operand(engine.code[(pc + 1) as usize]).to_scalar();
            let b = engine.resolve_operand(engine.code[(pc + 2) as usize]).to_scalar();
            engine.store_vac(pc, Value::Scalar(a * b));
        }

        POP_SSDV if numop >= 2 => {
            let a = engine.resolve_operand(engine.code[(pc + 1) as usize]).to_scalar();
            let b = engine.resolve_operand(engine.code[(pc + 2) as usize]).to_scalar();
            if b == 0.0 {
                engine.pc = instr.next_pc();
                return Err(EngineError::DivisionByZero { pc });
            }
            engine.store_vac(pc, Value::Scalar(a / b));
        }

        POP_SEXP | POP_SPEX if numop >= 2 => {
            let a = engine.resolve_operand(engine.code[(pc + 1) as usize]).to_scalar();
            let b = engine.resolve_operand(engine.code[(pc + 2) as usize]).to_scalar();
            engine.store_vac(pc, Value::Scalar(a.powf(b)));
        }

        POP_SIEX if numop >= 2 => {
            let base = engine.resolve_operand(engine.code[(pc + 1) as usize]).to_scalar();
            let exp = engine.resolve_operand(engine.code[(pc + 2) as usize]).to_int();
            engine.store_vac(pc, Value::Scalar(base.powf(exp as f64)));
        }

        POP_SNEG if numop >= 1 => {
            let a = engine.resolve_operand(engine.code[(pc + 1) as usize]).to_scalar();
            engine.store_vac(pc, Value::Scalar(-a));
        }

        POP_ITOS | POP_STOS if numop >= 1 => {
            let a = engine.resolve_operand(engine.code[(pc + 1) as usize]);
            engine.store_vac(pc, Value::Scalar(a.to_scalar()));
        }

        POP_BTOS if numop >= 1 => {
            let a = engine.resolve_operand(engine.code[(pc + 1) as usize]);
            engine.store_vac(pc, Value::Scalar(a.to_bits() as f64));
        }

        POP_CTOS => {
            // Stub in the reference: CHAR→SCALAR parsing was never implemented.
            engine.store_vac(pc, Value::Scalar(0.0));
        }

        other => {
            tracing::warn!(popcode = format!("0x{:03X}", other), pc, "halmat_class5: unknown popcode");
        }
    }

    engine.pc = instr.next_pc();
    Ok(())
}
