//! The HALMAT execution engine: code memory, the symbol and literal tables,
//! the VAC cache, the loop/call stacks, and the step/run loop that dispatches
//! decoded instructions to the per-class handlers in [`crate::classes`].

pub mod decode;
pub mod flow;
pub mod operand;
pub mod step;
pub mod vac;

use crate::io::{IoBackend, NullIoBackend};
use crate::value::Value;

pub const BLOCK_WORDS: u32 = 1800;
pub const MAX_BLOCKS: u32 = 256;
pub const MAX_SYT: usize = 4096;
pub const MAX_LIT: usize = 4096;
pub const MAX_VAC: usize = 4096;
pub const MAX_FLOW: usize = 2048;
pub const MAX_FRAMES: usize = 256;
pub const MAX_LOOPS: usize = 64;
pub const MAX_UNITS: usize = 16;
pub const MAX_IO_ARGS: usize = 64;
pub const MAX_BREAKPOINTS: usize = 64;
pub const LIT_STR_POOL: usize = 16384;

/// Halt state of the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HaltState {
    Running,
    Normal,
    Error,
}

/// One symbol-table slot: a value plus whether it has ever been assigned.
#[derive(Debug, Clone, Default)]
pub struct SytEntry {
    pub value: Value,
    pub allocated: bool,
}

/// One literal-table entry: the type discriminant plus its raw IBM-encoded
/// payload words.
#[derive(Debug, Clone, Copy, Default)]
pub struct LitEntry {
    pub kind: u8,
    pub lit1: i32,
    pub lit2: i32,
    pub lit3: i32,
}

/// An active loop frame (WHILE/UNTIL or numeric/discrete FOR).
#[derive(Debug, Clone, Copy)]
pub struct LoopFrame {
    pub flow_num: u32,
    /// For WHILE/UNTIL: the comparison re-entry address. For FOR: the DFOR
    /// instruction's own address (so EFOR can re-read its final/incr operands).
    pub cmp_addr: u32,
    /// 0 = WHILE, 1 = UNTIL (ignored for FOR loops).
    pub tag: u32,
    pub is_discrete: bool,
    pub discrete_idx: u32,
    /// SYT slot holding the loop control variable (FOR loops only).
    pub loop_var: u32,
    /// Discrete FOR: the address right after the AFOR run, i.e. the loop
    /// body's entry point. Unused for numeric FOR/WHILE/UNTIL.
    pub body_start: u32,
}

/// An active call frame (PCAL/FCAL).
#[derive(Debug, Clone, Copy)]
pub struct CallFrame {
    pub return_pc: u32,
    pub call_addr: u32,
}

/// The staged argument list for the I/O statement currently being built by
/// XXST/XXAR/WRIT/XXND.
#[derive(Debug, Clone, Default)]
pub struct IoList {
    pub args: Vec<Value>,
    pub arg_types: Vec<u8>,
    pub active: bool,
    pub is_call: bool,
}

/// A debugger breakpoint, keyed by address or by source statement number
/// (mutually exclusive per entry, matching the reference).
#[derive(Debug, Clone, Copy)]
pub struct Breakpoint {
    pub addr: u32,
    pub stmt: u32,
    pub enabled: bool,
}

/// The engine instance: owns every table and stack for one running program.
pub struct Engine {
    pub code: Vec<u32>,
    pub num_blocks: u32,

    pub pc: u32,
    pub halted: HaltState,

    pub syt: Vec<SytEntry>,

    pub lit: Vec<LitEntry>,
    pub lit_count: usize,

    pub lit_str_pool: Vec<u8>,
    pub lit_str_off: Vec<u16>,
    pub lit_str_len: Vec<u16>,

    pub vac: Vec<Value>,
    pub cond_true: bool,

    pub frames: Vec<CallFrame>,
    pub loops: Vec<LoopFrame>,

    pub flow: Vec<u32>,
    pub io: IoList,

    pub translate_ebcdic: bool,

    pub cycle_count: u64,
    pub stmt_count: u64,
    pub current_stmt: u32,

    pub debug_mode: bool,
    pub single_step: bool,
    pub breakpoints: Vec<Breakpoint>,

    /// Where WRIT/READ dispatch to. Defaults to a backend that discards
    /// everything; the CLI swaps in a configured [`crate::io::UnitIoBackend`]
    /// once `--unit`/`--ebcdic` are parsed.
    pub io_backend: Box<dyn IoBackend>,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine {
    pub fn new() -> Self {
        Engine {
            code: Vec::new(),
            num_blocks: 0,
            pc: 2,
            halted: HaltState::Running,
            syt: vec![SytEntry::default(); MAX_SYT],
            lit: vec![LitEntry::default(); MAX_LIT],
            lit_count: 0,
            lit_str_pool: vec![0u8; LIT_STR_POOL],
            lit_str_off: vec![0u16; MAX_LIT],
            lit_str_len: vec![0u16; MAX_LIT],
            vac: vec![Value::None; MAX_VAC],
            cond_true: false,
            frames: Vec::with_capacity(MAX_FRAMES),
            loops: Vec::with_capacity(MAX_LOOPS),
            flow: vec![0u32; MAX_FLOW],
            io: IoList::default(),
            translate_ebcdic: false,
            cycle_count: 0,
            stmt_count: 0,
            current_stmt: 0,
            debug_mode: false,
            single_step: false,
            breakpoints: Vec::new(),
            io_backend: Box::new(NullIoBackend),
        }
    }

    pub fn is_halted(&self) -> bool {
        self.halted != HaltState::Running
    }

    /// VAC slot for a given code address (direct-mapped, key = addr mod 4096).
    pub fn vac_slot(addr: u32) -> usize {
        (addr as usize) & (MAX_VAC - 1)
    }

    pub fn store_vac(&mut self, addr: u32, value: Value) {
        let slot = Self::vac_slot(addr);
        self.vac[slot] = value;
    }

    pub fn read_vac(&self, addr: u32) -> Value {
        self.vac[Self::vac_slot(addr)].clone()
    }
}
