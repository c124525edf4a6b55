//! Class 2 (CHAR): assign, concatenate (clipped at 255 bytes), conversions
//! from INTEGER/SCALAR/BIT via decimal formatting.

use super::opcodes::*;
use crate::engine::decode::{data, Instruction};
use crate::engine::{Engine, MAX_SYT};
use crate::error::EngineResult;
use crate::value::{Value, MAX_CHAR_LEN};

pub fn execute(engine: &mut Engine, instr: &Instruction) -> EngineResult<()> {
    let pc = instr.pc;
    let numop = instr.numop;

    match instr.popcode {
        POP_CASN if numop >= 2 => {
            let src = engine.resolve_operand(engine.code[(pc + 1) as usize]);
            let dest = data(engine.code[(pc + 2) as usize]) as usize;
            if dest < MAX_SYT {
                if let Value::Char(bytes) = src {
                    engine.syt[dest].value = Value::Char(bytes);
                } else {
                    engine.syt[dest].value = Value::Char(Vec::new());
                }
                engine.syt[dest].allocated = true;
            }
        }

        POP_CCAT if numop >= 2 => {
            let a = engine.resolve_operand(engine.code[(pc + 1) as usize]);
            let b = engine.resolve_operand(engine.code[(pc + 2) as usize]);
            let mut out = Vec::new();
            if let Value::Char(ab) = &a {
                out.extend_from_slice(ab);
            }
            if let Value::Char(bb) = &b {
                out.extend_from_slice(bb);
            }
            out.truncate(MAX_CHAR_LEN);
            engine.store_vac(pc, Value::Char(out));
        }

        POP_CTOC if numop >= 1 => {
            let a = engine.resolve_operand(engine.code[(pc + 1) as usize]);
            let bytes = match a {
                Value::Char(b) => b,
                _ => Vec::new(),
            };
            engine.store_vac(pc, Value::Char(bytes));
        }

        POP_ITOC if numop >= 1 => {
            let a = engine.resolve_operand(engine.code[(pc + 1) as usize]);
            let n = match a {
                Value::Integer(i) => i,
                Value::Scalar(s) => s as i32,
                _ => 0,
            };
            let mut s = n.to_string().into_bytes();
            s.truncate(MAX_CHAR_LEN);
            engine.store_vac(pc, Value::Char(s));
        }

        POP_STOC if numop >= 1 => {
            let a = engine.resolve_operand(engine.code[(pc + 1) as usize]);
            let mut s = format_scalar_g(a.to_scalar()).into_bytes();
            s.truncate(MAX_CHAR_LEN);
            engine.store_vac(pc, Value::Char(s));
        }

        POP_BTOC if numop >= 1 => {
            let a = engine.resolve_operand(engine.code[(pc + 1) as usize]);
            let mut s = a.to_bits().to_string().into_bytes();
            s.truncate(MAX_CHAR_LEN);
            engine.store_vac(pc, Value::Char(s));
        }

        other => {
            tracing::warn!(popcode = format!("0x{:03X}", other), pc, "halmat_class2: unknown popcode");
        }
    }

    engine.pc = instr.next_pc();
    Ok(())
}

/// Format a scalar the way C's `%g` does: 6 significant digits, trailing
/// zeros stripped, scientific notation (signed, zero-padded exponent) only
/// when the decimal exponent falls outside `[-4, precision)`.
fn format_scalar_g(v: f64) -> String {
    if v == 0.0 {
        return "0".to_string();
    }
    const PRECISION: i32 = 6;

    let sci = format!("{:.*e}", (PRECISION - 1) as usize, v);
    let epos = sci.find('e').expect("scientific format always has an exponent");
    let exp: i32 = sci[epos + 1..].parse().expect("exponent is always a valid integer");

    if exp < -4 || exp >= PRECISION {
        let mantissa = strip_trailing_zeros(&sci[..epos]);
        let sign = if exp < 0 { '-' } else { '+' };
        format!("{mantissa}e{sign}{:02}", exp.abs())
    } else {
        let decimals = (PRECISION - 1 - exp).max(0) as usize;
        strip_trailing_zeros(&format!("{:.*}", decimals, v))
    }
}

/// Strip trailing fractional zeros (and a bare trailing `.`) from a formatted
/// decimal string. No-op on strings with no decimal point.
fn strip_trailing_zeros(s: &str) -> String {
    if !s.contains('.') {
        return s.to_string();
    }
    s.trim_end_matches('0').trim_end_matches('.').to_string()
}
