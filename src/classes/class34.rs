//! Class 3 (MATRIX) and class 4 (VECTOR), combined as in the reference's
//! single `halmat_class34.c`. Both classes share the same coercion rule for
//! scalar operands (`Value::to_scalar`) and the same 64-element/8x8 caps.

use super::opcodes::*;
use crate::engine::decode::{data, Instruction};
use crate::engine::{Engine, MAX_SYT};
use crate::error::EngineResult;
use crate::value::{Value, MAX_ELEMENTS};

fn as_matrix(v: &Value) -> (u8, u8, [f64; MAX_ELEMENTS]) {
    match v {
        Value::Matrix { rows, cols, data } => (*rows, *cols, *data),
        _ => (0, 0, [0.0; MAX_ELEMENTS]),
    }
}

fn as_vector(v: &Value) -> (u8, [f64; MAX_ELEMENTS]) {
    match v {
        Value::Vector { rows, data } => (*rows, *data),
        _ => (0, [0.0; MAX_ELEMENTS]),
    }
}

pub fn execute_matrix(engine: &mut Engine, instr: &Instruction) -> EngineResult<()> {
    let pc = instr.pc;
    let numop = instr.numop;

    match instr.popcode {
        POP_MASN if numop >= 2 => {
            let src = engine.resolve_operand(engine.code[(pc + 1) as usize]);
            let dest = data(engine.code[(pc + 2) as usize]) as usize;
            let (rows, cols, mdata) = as_matrix(&src);
            if dest < MAX_SYT {
                engine.syt[dest].value = Value::Matrix { rows, cols, data: mdata };
                engine.syt[dest].allocated = true;
            }
        }

        POP_MADD | POP_MSUB if numop >= 2 => {
            let a = engine.resolve_operand(engine.code[(pc + 1) as usize]);
            let b = engine.resolve_operand(engine.code[(pc + 2) as usize]);
            let (ar, ac, ad) = as_matrix(&a);
            let (br, bc, bd) = as_matrix(&b);
            let rows = ar.max(br);
            let cols = ac.max(bc);
            let n = ((rows as usize) * (cols as usize)).min(MAX_ELEMENTS);
            let mut out = [0.0; MAX_ELEMENTS];
            let add = instr.popcode == POP_MADD;
            for i in 0..n {
                out[i] = if add { ad[i] + bd[i] } else { ad[i] - bd[i] };
            }
            engine.store_vac(pc, Value::Matrix { rows, cols, data: out });
        }

        POP_MSPR if numop >= 2 => {
            let a = engine.resolve_operand(engine.code[(pc + 1) as usize]);
            let b = engine.resolve_operand(engine.code[(pc + 2) as usize]).to_scalar();
            let (rows, cols, ad) = as_matrix(&a);
            let n = ((rows as usize) * (cols as usize)).min(MAX_ELEMENTS);
            let mut out = [0.0; MAX_ELEMENTS];
            for i in 0..n {
                out[i] = ad[i] * b;
            }
            engine.store_vac(pc, Value::Matrix { rows, cols, data: out });
        }

        POP_MNEG if numop >= 1 => {
            let a = engine.resolve_operand(engine.code[(pc + 1) as usize]);
            let (rows, cols, ad) = as_matrix(&a);
            let n = ((rows as usize) * (cols as usize)).min(MAX_ELEMENTS);
            let mut out = [0.0; MAX_ELEMENTS];
            for i in 0..n {
                out[i] = -ad[i];
            }
            engine.store_vac(pc, Value::Matrix { rows, cols, data: out });
        }

        POP_MTRA if numop >= 1 => {
            let a = engine.resolve_operand(engine.code[(pc + 1) as usize]);
            let (rows, cols, ad) = as_matrix(&a);
            let mut out = [0.0; MAX_ELEMENTS];
            let rcap = (rows as usize).min(8);
            let ccap = (cols as usize).min(8);
            for i in 0..rcap {
                for j in 0..ccap {
                    out[j * (rows as usize) + i] = ad[i * (cols as usize) + j];
                }
            }
            engine.store_vac(pc, Value::Matrix { rows: cols, cols: rows, data: out });
        }

        POP_MMPR if numop >= 2 => {
            let a = engine.resolve_operand(engine.code[(pc + 1) as usize]);
            let b = engine.resolve_operand(engine.code[(pc + 2) as usize]);
            let (ar, ac, ad) = as_matrix(&a);
            let (_br, bc, bd) = as_matrix(&b);
            let mut out = [0.0; MAX_ELEMENTS];
            let rcap = (ar as usize).min(8);
            let ccap = (bc as usize).min(8);
            let kcap = (ac as usize).min(8);
            for i in 0..rcap {
                for j in 0..ccap {
                    let mut sum = 0.0;
                    for k in 0..kcap {
                        sum += ad[i * (ac as usize) + k] * bd[k * (bc as usize) + j];
                    }
                    out[i * (bc as usize) + j] = sum;
                }
            }
            engine.store_vac(pc, Value::Matrix { rows: ar, cols: bc, data: out });
        }

        // MSDV/MDET/MIDN/MINV/MTOM/VVPR: unimplemented in the reference.
        _ => {}
    }

    engine.pc = instr.next_pc();
    Ok(())
}

pub fn execute_vector(engine: &mut Engine, instr: &Instruction) -> EngineResult<()> {
    let pc = instr.pc;
    let numop = instr.numop;

    match instr.popcode {
        POP_VASN if numop >= 2 => {
            let src = engine.resolve_operand(engine.code[(pc + 1) as usize]);
            let dest = data(engine.code[(pc + 2) as usize]) as usize;
            let (rows, vdata) = as_vector(&src);
            if dest < MAX_SYT {
                engine.syt[dest].value = Value::Vector { rows, data: vdata };
                engine.syt[dest].allocated = true;
            }
        }

        POP_VADD | POP_VSUB if numop >= 2 => {
            let a = engine.resolve_operand(engine.code[(pc + 1) as usize]);
            let b = engine.resolve_operand(engine.code[(pc + 2) as usize]);
            let (ar, ad) = as_vector(&a);
            let (br, bd) = as_vector(&b);
            let rows = ar.max(br);
            let n = (rows as usize).min(MAX_ELEMENTS);
            let mut out = [0.0; MAX_ELEMENTS];
            let add = instr.popcode == POP_VADD;
            for i in 0..n {
                out[i] = if add { ad[i] + bd[i] } else { ad[i] - bd[i] };
            }
            engine.store_vac(pc, Value::Vector { rows, data: out });
        }

        POP_VSPR if numop >= 2 => {
            let a = engine.resolve_operand(engine.code[(pc + 1) as usize]);
            let b = engine.resolve_operand(engine.code[(pc + 2) as usize]).to_scalar();
            let (rows, ad) = as_vector(&a);
            let n = (rows as usize).min(MAX_ELEMENTS);
            let mut out = [0.0; MAX_ELEMENTS];
            for i in 0..n {
                out[i] = ad[i] * b;
            }
            engine.store_vac(pc, Value::Vector { rows, data: out });
        }

        POP_VNEG if numop >= 1 => {
            let a = engine.resolve_operand(engine.code[(pc + 1) as usize]);
            let (rows, ad) = as_vector(&a);
            let n = (rows as usize).min(MAX_ELEMENTS);
            let mut out = [0.0; MAX_ELEMENTS];
            for i in 0..n {
                out[i] = -ad[i];
            }
            engine.store_vac(pc, Value::Vector { rows, data: out });
        }

        POP_VCRS if numop >= 2 => {
            let a = engine.resolve_operand(engine.code[(pc + 1) as usize]);
            let b = engine.resolve_operand(engine.code[(pc + 2) as usize]);
            let (_ar, ad) = as_vector(&a);
            let (_br, bd) = as_vector(&b);
            let mut out = [0.0; MAX_ELEMENTS];
            out[0] = ad[1] * bd[2] - ad[2] * bd[1];
            out[1] = ad[2] * bd[0] - ad[0] * bd[2];
            out[2] = ad[0] * bd[1] - ad[1] * bd[0];
            engine.store_vac(pc, Value::Vector { rows: 3, data: out });
        }

        POP_VDOT if numop >= 2 => {
            let a = engine.resolve_operand(engine.code[(pc + 1) as usize]);
            let b = engine.resolve_operand(engine.code[(pc + 2) as usize]);
            let (ar, ad) = as_vector(&a);
            let (br, bd) = as_vector(&b);
            let n = (ar.min(br) as usize).min(MAX_ELEMENTS);
            let mut sum = 0.0;
            for i in 0..n {
                sum += ad[i] * bd[i];
            }
            engine.store_vac(pc, Value::Scalar(sum));
        }

        // VMPR/MVPR/VTOV: unimplemented in the reference.
        _ => {}
    }

    engine.pc = instr.next_pc();
    Ok(())
}
