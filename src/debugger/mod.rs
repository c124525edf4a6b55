//! Interactive debugger: a stdin-driven prompt that steps, breaks, and
//! inspects engine state one instruction at a time.
//!
//! There is no remote protocol here — the reference debugger is a plain
//! `fgets`/`printf` loop against the controlling terminal, and this module
//! keeps that shape rather than inventing a wire protocol for a single local
//! process.

use std::io::{self, BufRead, Write};

use crate::disasm;
use crate::engine::{Breakpoint, Engine, MAX_BREAKPOINTS, MAX_SYT};
use crate::value::Value;

/// Drive `engine` from an interactive prompt until it halts or the user
/// quits. Mirrors the reference's print-state-then-prompt loop: each
/// iteration prints engine state and the next instruction, reads one
/// command, and either steps, runs to completion, or adjusts breakpoints.
pub fn run<R: BufRead, W: Write>(engine: &mut Engine, mut input: R, mut output: W) -> io::Result<()> {
    engine.debug_mode = true;
    engine.single_step = true;

    while !engine.is_halted() {
        if engine.single_step || engine.hit_breakpoint(engine.pc) {
            if prompt(engine, &mut input, &mut output)? {
                break;
            }
            if engine.is_halted() {
                break;
            }
        }
        if engine.step().is_err() {
            break;
        }
    }
    Ok(())
}

/// Print state, read one command, and act on it. Returns `true` if the
/// caller should stop driving the engine (the user quit).
fn prompt<R: BufRead, W: Write>(engine: &mut Engine, input: &mut R, output: &mut W) -> io::Result<bool> {
    loop {
        print_state(engine, output)?;
        write!(output, "(halmat) ")?;
        output.flush()?;

        let mut line = String::new();
        if input.read_line(&mut line)? == 0 {
            engine.halted = crate::engine::HaltState::Normal;
            return Ok(true);
        }
        let line = line.trim_end_matches(['\n', '\r']);

        match dispatch(engine, line, output)? {
            Action::Step => return Ok(false),
            Action::Continue => {
                engine.single_step = false;
                return Ok(false);
            }
            Action::Quit => {
                engine.halted = crate::engine::HaltState::Normal;
                return Ok(true);
            }
            Action::Again => {}
        }
    }
}

enum Action {
    Step,
    Continue,
    Quit,
    /// Command handled in place (breakpoint set, info, inspect, disasm); go
    /// back to the prompt without advancing the engine.
    Again,
}

fn dispatch<W: Write>(engine: &mut Engine, line: &str, out: &mut W) -> io::Result<Action> {
    if line.is_empty() || line == "s" || line == "step" {
        return Ok(Action::Step);
    }
    if line == "c" || line == "continue" {
        return Ok(Action::Continue);
    }
    if line == "q" || line == "quit" {
        return Ok(Action::Quit);
    }
    if let Some(arg) = line.strip_prefix("b ").or_else(|| line.strip_prefix("break ")) {
        let addr: u32 = arg.trim().parse().unwrap_or(0);
        add_breakpoint(engine, addr, 0, out)?;
        return Ok(Action::Again);
    }
    if let Some(arg) = line.strip_prefix("bs ") {
        let stmt: u32 = arg.trim().parse().unwrap_or(0);
        add_breakpoint(engine, 0, stmt, out)?;
        return Ok(Action::Again);
    }
    if line == "info" || line == "i" {
        writeln!(out, "Breakpoints:")?;
        for (i, bp) in engine.breakpoints.iter().enumerate() {
            writeln!(
                out,
                "  #{i}: addr={} stmt={} {}",
                bp.addr,
                bp.stmt,
                if bp.enabled { "enabled" } else { "disabled" }
            )?;
        }
        return Ok(Action::Again);
    }
    if let Some(arg) = line.strip_prefix("x ").or_else(|| line.strip_prefix("syt ")) {
        let idx: usize = arg.trim().parse().unwrap_or(0);
        print_syt(engine, idx, out)?;
        return Ok(Action::Again);
    }
    if line == "disasm" || line == "d" {
        writeln!(out, "{}", disasm::disasm_word(engine, engine.pc))?;
        return Ok(Action::Again);
    }

    writeln!(
        out,
        "Commands: s(tep) c(ontinue) q(uit) b <addr> bs <stmt> i(nfo) x <syt> d(isasm)"
    )?;
    Ok(Action::Again)
}

fn add_breakpoint<W: Write>(engine: &mut Engine, addr: u32, stmt: u32, out: &mut W) -> io::Result<()> {
    if engine.breakpoints.len() >= MAX_BREAKPOINTS {
        return Ok(());
    }
    let idx = engine.breakpoints.len();
    engine.breakpoints.push(Breakpoint { addr, stmt, enabled: true });
    if stmt == 0 {
        writeln!(out, "Breakpoint {idx} at address {addr}")?;
    } else {
        writeln!(out, "Breakpoint {idx} at statement {stmt}")?;
    }
    Ok(())
}

fn print_syt<W: Write>(engine: &Engine, idx: usize, out: &mut W) -> io::Result<()> {
    if idx >= MAX_SYT || !engine.syt[idx].allocated {
        writeln!(out, "SYT({idx}): not allocated")?;
        return Ok(());
    }
    match &engine.syt[idx].value {
        Value::Integer(v) => writeln!(out, "SYT({idx}): = {v}"),
        Value::Scalar(v) => writeln!(out, "SYT({idx}): = {v}"),
        Value::Char(bytes) => writeln!(out, "SYT({idx}): = \"{}\"", String::from_utf8_lossy(bytes)),
        Value::Bit(v) => writeln!(out, "SYT({idx}): = 0x{v:X}"),
        _ => writeln!(out, "SYT({idx}): = ?"),
    }
}

fn print_state<W: Write>(engine: &Engine, out: &mut W) -> io::Result<()> {
    writeln!(
        out,
        "PC={}  STMT={}  CYCLES={}  FRAMES={}  LOOPS={}  COND={}",
        engine.pc,
        engine.current_stmt,
        engine.cycle_count,
        engine.frames.len(),
        engine.loops.len(),
        engine.cond_true as i32,
    )?;
    let line = disasm::disasm_word(engine, engine.pc);
    if !line.is_empty() {
        writeln!(out, "  -> {}", line.trim_start())?;
    }
    Ok(())
}
