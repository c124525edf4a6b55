//! Per-class instruction handlers, dispatched by [`crate::engine::step`].
//!
//! Each class module owns one non-control opcode family (BIT, CHAR, MATRIX,
//! VECTOR, SCALAR, INTEGER, conditional, initialization) except
//! [`class0`], which is the control-flow interpreter — the design's core.

pub mod class0;
pub mod class1;
pub mod class2;
pub mod class34;
pub mod class5;
pub mod class6;
pub mod class7;
pub mod class8;
pub mod opcodes;

use crate::engine::decode::Instruction;
use crate::engine::Engine;
use crate::error::EngineResult;

/// Dispatch a decoded instruction to its class handler. Mirrors the
/// `DISPATCH_TABLE`-by-category pattern used for the 8088 opcode classes,
/// generalized here to HALMAT's 9 instruction classes.
pub fn execute(engine: &mut Engine, instr: &Instruction) -> EngineResult<()> {
    match instr.class {
        0 => class0::execute(engine, instr),
        1 => class1::execute(engine, instr),
        2 => class2::execute(engine, instr),
        3 => class34::execute_matrix(engine, instr),
        4 => class34::execute_vector(engine, instr),
        5 => class5::execute(engine, instr),
        6 => class6::execute(engine, instr),
        7 => class7::execute(engine, instr),
        8 => class8::execute(engine, instr),
        other => Err(crate::error::EngineError::UnknownClass {
            class: other,
            pc: instr.pc,
        }),
    }
}
