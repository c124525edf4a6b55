//! Class 7 (CONDITIONAL): every comparison/logical operator. Per the
//! reference, the boolean result always lands in two places: the VAC slot
//! at this instruction's address, and `engine.cond_true` — regardless of
//! which arm of the match ran.

use super::opcodes::*;
use crate::engine::decode::Instruction;
use crate::engine::Engine;
use crate::error::EngineResult;
use crate::value::Value;

pub fn execute(engine: &mut Engine, instr: &Instruction) -> EngineResult<()> {
    let pc = instr.pc;
    let numop = instr.numop;

    let mut result: Option<bool> = None;

    if numop >= 2 {
        let a = engine.resolve_operand(engine.code[(pc + 1) as usize]);
        let b = engine.resolve_operand(engine.code[(pc + 2) as usize]);

        result = match instr.popcode {
            POP_IEQU => Some(a.to_int() == b.to_int()),
            POP_INEQ => Some(a.to_int() != b.to_int()),
            POP_IGT => Some(a.to_int() > b.to_int()),
            POP_ILT => Some(a.to_int() < b.to_int()),
            POP_INGT => Some(a.to_int() <= b.to_int()),
            POP_INLT => Some(a.to_int() >= b.to_int()),

            POP_SEQU => Some(a.to_scalar() == b.to_scalar()),
            POP_SNEQ => Some(a.to_scalar() != b.to_scalar()),
            POP_SGT => Some(a.to_scalar() > b.to_scalar()),
            POP_SLT => Some(a.to_scalar() < b.to_scalar()),
            POP_SNGT => Some(a.to_scalar() <= b.to_scalar()),
            POP_SNLT => Some(a.to_scalar() >= b.to_scalar()),

            POP_BEQU => Some(a.to_bits() == b.to_bits()),
            POP_BNEQ => Some(a.to_bits() != b.to_bits()),

            POP_CEQU => {
                let (ab, bb) = (char_bytes(&a), char_bytes(&b));
                let n = ab.len().min(bb.len());
                Some(ab.len() == bb.len() && ab[..n] == bb[..n])
            }
            POP_CNEQ => {
                let (ab, bb) = (char_bytes(&a), char_bytes(&b));
                let n = ab.len().min(bb.len());
                Some(!(ab.len() == bb.len() && ab[..n] == bb[..n]))
            }
            POP_CGT => Some(a.char_bytes_padded() > b.char_bytes_padded()),
            POP_CLT => Some(a.char_bytes_padded() < b.char_bytes_padded()),
            POP_CNGT => Some(a.char_bytes_padded() <= b.char_bytes_padded()),
            POP_CNLT => Some(a.char_bytes_padded() >= b.char_bytes_padded()),

            POP_CAND => Some(a.to_int() != 0 && b.to_int() != 0),
            POP_COR => Some(a.to_int() != 0 || b.to_int() != 0),

            POP_MEQU => Some(matrix_eq(&a, &b)),
            POP_MNEQ => Some(!matrix_eq(&a, &b)),
            POP_VEQU => Some(vector_eq(&a, &b)),
            POP_VNEQ => Some(!vector_eq(&a, &b)),

            _ => None,
        };
    }

    if result.is_none() && numop >= 1 {
        if instr.popcode == POP_BTRU {
            let a = engine.resolve_operand(engine.code[(pc + 1) as usize]);
            result = Some(a.to_bits() != 0);
        } else if instr.popcode == POP_CNOT {
            let a = engine.resolve_operand(engine.code[(pc + 1) as usize]);
            result = Some(a.to_int() == 0);
        }
    }

    let cond = result.unwrap_or_else(|| {
        tracing::warn!(popcode = format!("0x{:03X}", instr.popcode), pc, "halmat_class7: unknown popcode");
        false
    });

    engine.store_vac(pc, Value::Integer(cond as i32));
    engine.cond_true = cond;

    engine.pc = instr.next_pc();
    Ok(())
}

fn char_bytes(v: &Value) -> Vec<u8> {
    match v {
        Value::Char(b) => b.clone(),
        _ => Vec::new(),
    }
}

/// Genuine element-wise comparison. The reference's `MEQU`/`MNEQ` handlers
/// are a known bug (constant true/false); reimplemented here as real
/// equality over the shared row/col extent.
fn matrix_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (
            Value::Matrix { rows: ar, cols: ac, data: ad },
            Value::Matrix { rows: br, cols: bc, data: bd },
        ) => {
            if ar != br || ac != bc {
                return false;
            }
            let n = (*ar as usize) * (*ac as usize);
            ad[..n] == bd[..n]
        }
        _ => false,
    }
}

fn vector_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Vector { rows: ar, data: ad }, Value::Vector { rows: br, data: bd }) => {
            if ar != br {
                return false;
            }
            let n = *ar as usize;
            ad[..n] == bd[..n]
        }
        _ => false,
    }
}
