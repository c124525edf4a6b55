//! Engine error kinds.
//!
//! These correspond one-to-one with the `HALMAT_ERR_*` status codes of the
//! reference implementation. A fatal error halts the step loop; unrecognized
//! opcode *values* within a known class are logged and do not produce one of
//! these (the handler just falls through to the default PC advance).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("unknown instruction class {class} at pc={pc}")]
    UnknownClass { class: u32, pc: u32 },

    #[error("bad opcode 0x{popcode:03X} at pc={pc}")]
    BadOpcode { popcode: u32, pc: u32 },

    #[error("bad qualifier {qual} at pc={pc}")]
    BadQualifier { qual: u32, pc: u32 },

    #[error("arithmetic overflow at pc={pc}")]
    Overflow { pc: u32 },

    #[error("I/O error on unit {unit}: {source}")]
    Io {
        unit: i32,
        #[source]
        source: std::io::Error,
    },

    #[error("stack overflow ({kind}) at pc={pc}")]
    StackOverflow { kind: &'static str, pc: u32 },

    #[error("bounds violation at pc={pc}: index {index} exceeds {limit}")]
    Bounds { pc: u32, index: u32, limit: u32 },

    #[error("division by zero at pc={pc}")]
    DivisionByZero { pc: u32 },

    #[error("failed to load {path}: {source}")]
    Load {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

pub type EngineResult<T> = Result<T, EngineError>;
