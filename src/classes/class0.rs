//! Class 0: control flow, subscripting, I/O statement staging, and
//! procedure/function call-return. This is the largest and most stateful
//! class handler; every other class only ever reads `engine.cond_true` and
//! writes a VAC slot, but this one drives the PC, the call stack, and the
//! loop stack.

use super::opcodes::*;
use crate::engine::decode::{data, is_op, numop as numop_of, popcode, tag1, Instruction};
use crate::engine::{CallFrame, Engine, HaltState, LoopFrame, BLOCK_WORDS, MAX_FRAMES, MAX_IO_ARGS, MAX_LOOPS, MAX_SYT};
use crate::error::{EngineError, EngineResult};
use crate::value::Value;

pub fn execute(engine: &mut Engine, instr: &Instruction) -> EngineResult<()> {
    let pc = instr.pc;
    let numop = instr.numop;

    match instr.popcode {
        POP_XREC => {
            if instr.tag == 1 {
                engine.halted = HaltState::Normal;
                engine.pc = instr.next_pc();
            } else {
                let block = pc / BLOCK_WORDS;
                engine.pc = (block + 1) * BLOCK_WORDS + 2;
            }
            return Ok(());
        }

        POP_SMRK if numop >= 1 => {
            engine.current_stmt = data(engine.code[(pc + 1) as usize]);
            engine.stmt_count += 1;
            engine.pc = instr.next_pc();
        }

        POP_CLOS => {
            if let Some(frame) = engine.frames.pop() {
                engine.pc = frame.return_pc;
            } else {
                engine.halted = HaltState::Normal;
                engine.pc = instr.next_pc();
            }
        }

        POP_BRA if numop >= 1 => {
            let flow_num = data(engine.code[(pc + 1) as usize]) as usize;
            let target = engine.flow.get(flow_num).copied().unwrap_or(0);
            engine.pc = if target == 0 { instr.next_pc() } else { target };
        }

        POP_FBRA if numop >= 1 => {
            let flow_num = data(engine.code[(pc + 1) as usize]) as usize;
            if !engine.cond_true {
                let target = engine.flow.get(flow_num).copied().unwrap_or(0);
                engine.pc = if target == 0 { instr.next_pc() } else { target };
            } else {
                engine.pc = instr.next_pc();
            }
        }

        POP_DTST if numop >= 1 => {
            let flow_num = data(engine.code[(pc + 1) as usize]);
            let cmp_addr = instr.next_pc();
            if (flow_num as usize) < engine.flow.len() {
                engine.flow[flow_num as usize] = cmp_addr;
            }
            if engine.loops.len() >= MAX_LOOPS {
                return Err(EngineError::StackOverflow { kind: "loop", pc });
            }
            engine.loops.push(LoopFrame {
                flow_num,
                cmp_addr,
                tag: instr.tag,
                is_discrete: false,
                discrete_idx: 0,
                loop_var: 0,
                body_start: 0,
            });
            if instr.tag == 1 {
                // UNTIL: skip the first test, enter the body directly.
                let ctst_addr = scan_plain(engine, cmp_addr, POP_CTST);
                let ctst_numop = if (ctst_addr as usize) < engine.code.len() {
                    numop_of(engine.code[ctst_addr as usize])
                } else {
                    0
                };
                engine.pc = ctst_addr + ctst_numop + 1;
            } else {
                // WHILE: fall through into the test.
                engine.pc = cmp_addr;
            }
        }

        POP_CTST => {
            let loop_tag = engine.loops.last().map(|l| l.tag).unwrap_or(0);
            let should_exit = if loop_tag == 1 {
                engine.cond_true
            } else {
                !engine.cond_true
            };
            if should_exit {
                let etst_addr = engine.scan_forward(instr.next_pc(), POP_DTST, POP_ETST);
                engine.loops.pop();
                engine.pc = etst_addr + 1;
            } else {
                engine.pc = instr.next_pc();
            }
        }

        POP_ETST => {
            let back = engine.loops.last().map(|l| l.cmp_addr).unwrap_or(instr.next_pc());
            engine.pc = back;
        }

        POP_DFOR if numop == 2 => {
            let flow_num = data(engine.code[(pc + 1) as usize]);
            let loop_var = data(engine.code[(pc + 2) as usize]);
            let afor_start = instr.next_pc();
            let (first_val, body_start) = scan_afor_run(engine, afor_start);
            if (loop_var as usize) < MAX_SYT {
                engine.syt[loop_var as usize].value = first_val;
                engine.syt[loop_var as usize].allocated = true;
            }
            if (flow_num as usize) < engine.flow.len() {
                engine.flow[flow_num as usize] = pc;
            }
            if engine.loops.len() >= MAX_LOOPS {
                return Err(EngineError::StackOverflow { kind: "loop", pc });
            }
            engine.loops.push(LoopFrame {
                flow_num,
                cmp_addr: afor_start,
                tag: 0,
                is_discrete: true,
                discrete_idx: 0,
                loop_var,
                body_start,
            });
            engine.pc = body_start;
        }

        POP_DFOR if numop >= 3 => {
            let flow_num = data(engine.code[(pc + 1) as usize]);
            let loop_var = data(engine.code[(pc + 2) as usize]);
            let init = engine.resolve_operand(engine.code[(pc + 3) as usize]).to_scalar();
            let final_val = if numop >= 4 {
                engine.resolve_operand(engine.code[(pc + 4) as usize]).to_scalar()
            } else {
                init
            };
            let incr = if numop >= 5 {
                engine.resolve_operand(engine.code[(pc + 5) as usize]).to_scalar()
            } else {
                1.0
            };

            if (loop_var as usize) < MAX_SYT {
                engine.syt[loop_var as usize].value = Value::Scalar(init);
                engine.syt[loop_var as usize].allocated = true;
            }
            if (flow_num as usize) < engine.flow.len() {
                engine.flow[flow_num as usize] = pc;
            }

            // Entry test, unlike EFOR's, does not treat a zero increment as
            // done: (inc>0 && cur>fin) || (inc<0 && cur<fin), so a zero
            // increment always falls through into the body at least once.
            let done = (incr > 0.0 && init > final_val) || (incr < 0.0 && init < final_val);
            if done {
                let efor_addr = engine.scan_forward(instr.next_pc(), POP_DFOR, POP_EFOR);
                engine.pc = efor_addr + 1;
            } else {
                if engine.loops.len() >= MAX_LOOPS {
                    return Err(EngineError::StackOverflow { kind: "loop", pc });
                }
                engine.loops.push(LoopFrame {
                    flow_num,
                    cmp_addr: pc,
                    tag: 0,
                    is_discrete: false,
                    discrete_idx: 0,
                    loop_var,
                    body_start: 0,
                });
                engine.pc = instr.next_pc();
            }
        }

        POP_EFOR => {
            let Some(mut loop_frame) = engine.loops.pop() else {
                engine.pc = instr.next_pc();
                return Ok(());
            };

            if loop_frame.is_discrete {
                loop_frame.discrete_idx += 1;
                let (val, exhausted) = nth_afor_value(engine, loop_frame.cmp_addr, loop_frame.discrete_idx);
                if exhausted {
                    engine.pc = instr.next_pc();
                } else {
                    if (loop_frame.loop_var as usize) < MAX_SYT {
                        engine.syt[loop_frame.loop_var as usize].value = val;
                        engine.syt[loop_frame.loop_var as usize].allocated = true;
                    }
                    engine.pc = loop_frame.body_start;
                    engine.loops.push(loop_frame);
                }
            } else {
                let dfor_addr = loop_frame.cmp_addr;
                let dfor_numop = numop_of(engine.code[dfor_addr as usize]);

                let final_val = if dfor_numop >= 4 {
                    engine.resolve_operand(engine.code[(dfor_addr + 4) as usize]).to_scalar()
                } else {
                    engine.resolve_operand(engine.code[(dfor_addr + 3) as usize]).to_scalar()
                };
                let incr = if dfor_numop >= 5 {
                    engine.resolve_operand(engine.code[(dfor_addr + 5) as usize]).to_scalar()
                } else {
                    1.0
                };

                let cur = engine
                    .syt
                    .get(loop_frame.loop_var as usize)
                    .map(|e| e.value.to_scalar())
                    .unwrap_or(0.0);
                let next = cur + incr;
                let done = for_loop_done(next, final_val, incr);
                if (loop_frame.loop_var as usize) < MAX_SYT {
                    engine.syt[loop_frame.loop_var as usize].value = Value::Scalar(next);
                }
                if done {
                    engine.pc = instr.next_pc();
                } else {
                    engine.pc = dfor_addr + dfor_numop + 1;
                    engine.loops.push(loop_frame);
                }
            }
        }

        POP_DCAS if numop >= 2 => {
            let sel = engine.resolve_operand(engine.code[(pc + 2) as usize]).to_int();
            match dcas_dispatch(engine, instr.next_pc(), sel) {
                Some(body_addr) => engine.pc = body_addr,
                None => {
                    let ecas_addr = engine.scan_forward(instr.next_pc(), POP_DCAS, POP_ECAS);
                    engine.pc = ecas_addr + 1;
                }
            }
        }

        POP_CLBL => {
            let ecas_addr = scan_plain(engine, instr.next_pc(), POP_ECAS);
            engine.pc = ecas_addr + 1;
        }

        POP_PCAL if numop >= 1 => {
            call_procedure(engine, instr, POP_PDEF)?;
        }

        POP_FCAL if numop >= 1 => {
            call_procedure(engine, instr, POP_FDEF)?;
        }

        POP_RTRN => {
            let val = if numop >= 1 {
                engine.resolve_operand(engine.code[(pc + 1) as usize])
            } else {
                Value::None
            };
            if let Some(frame) = engine.frames.pop() {
                engine.store_vac(frame.call_addr, val);
                engine.pc = frame.return_pc;
            } else {
                engine.halted = HaltState::Normal;
                engine.pc = instr.next_pc();
            }
        }

        POP_XXST => {
            engine.io.active = true;
            engine.io.args.clear();
            engine.io.arg_types.clear();
            engine.io.is_call = instr.tag != 0;
            engine.pc = instr.next_pc();
        }

        POP_XXAR if numop >= 1 => {
            stage_io_arg(engine, pc);
            engine.pc = instr.next_pc();
        }

        POP_WRIT => {
            let channel = if numop >= 1 {
                data(engine.code[(pc + 1) as usize]) as i32
            } else {
                6
            };
            let args = engine.io.args.clone();
            let formats = engine.io.arg_types.clone();
            engine.io_backend.write(channel, &args, &formats)?;
            engine.pc = instr.next_pc();
        }

        POP_XXND => {
            engine.io.active = false;
            engine.pc = instr.next_pc();
        }

        // Tasking, error-handling, shape-declaration, structure/template, and
        // every other marker opcode the reference treats as inert: advance
        // past it and do nothing else.
        POP_NOP | POP_EXTN | POP_IMRK | POP_PXRC | POP_IFHD | POP_LBL | POP_ECAS | POP_CFOR
        | POP_AFOR | POP_DSMP | POP_ESMP | POP_ADLP | POP_DLPE | POP_DSUB | POP_IDLP
        | POP_TSUB | POP_READ | POP_RDAL | POP_FILE | POP_TDEF | POP_MDEF | POP_FDEF
        | POP_PDEF | POP_UDEF | POP_CDEF | POP_EDCL | POP_TDCL | POP_WAIT | POP_SGNL
        | POP_CANC | POP_TERM | POP_PRIO | POP_SCHD | POP_ERON | POP_ERSE | POP_MSHP
        | POP_VSHP | POP_SSHP | POP_ISHP | POP_SFST | POP_SFND | POP_SFAR | POP_BFNC
        | POP_LFNC | POP_TNEQ | POP_TEQU | POP_TASN | POP_IDEF | POP_ICLS | POP_NNEQ
        | POP_NEQU | POP_NASN | POP_PMHD | POP_PMAR | POP_PMIN => {
            engine.pc = instr.next_pc();
        }

        other => {
            tracing::warn!(popcode = format!("0x{:03X}", other), pc, "halmat_class0: unknown popcode");
            engine.pc = instr.next_pc();
        }
    }

    Ok(())
}

/// EFOR's post-increment completion test, sign-sensitive. Unlike the DFOR
/// entry test, a zero increment is always treated as done here: it can never
/// make further progress, and without this guard the loop would run forever.
fn for_loop_done(current: f64, final_val: f64, incr: f64) -> bool {
    if incr == 0.0 {
        true
    } else if incr > 0.0 {
        current > final_val
    } else {
        current < final_val
    }
}

/// Linear, depth-blind forward scan for the next occurrence of `target_pop`.
/// Used where the reference itself does not track nesting (CLBL→ECAS,
/// DTST(UNTIL)→CTST).
fn scan_plain(engine: &Engine, start: u32, target_pop: u32) -> u32 {
    let len = engine.code.len() as u32;
    let mut i = start;
    while i < len {
        let w = engine.code[i as usize];
        if is_op(w) {
            if popcode(w) == target_pop {
                return i;
            }
            i += numop_of(w) + 1;
        } else {
            i += 1;
        }
    }
    len
}

/// Walk a contiguous run of AFOR instructions starting at `start`, each
/// supplying one discrete loop value via its first operand. Returns the
/// first value (to seed the loop variable) and the address right after the
/// run (the loop body's entry point).
fn scan_afor_run(engine: &Engine, start: u32) -> (Value, u32) {
    let len = engine.code.len() as u32;
    let mut i = start;
    let mut first = None;
    while i < len {
        let w = engine.code[i as usize];
        if !is_op(w) || popcode(w) != POP_AFOR {
            break;
        }
        let n = numop_of(w);
        if first.is_none() && n >= 1 && (i + 1) < len {
            first = Some(engine.resolve_operand(engine.code[(i + 1) as usize]));
        }
        i += n + 1;
    }
    (first.unwrap_or(Value::None), i)
}

/// Re-scan the AFOR run starting at `afor_start` for its `idx`-th entry
/// (0-based). Returns `(value, exhausted)`.
fn nth_afor_value(engine: &Engine, afor_start: u32, idx: u32) -> (Value, bool) {
    let len = engine.code.len() as u32;
    let mut i = afor_start;
    let mut count = 0u32;
    while i < len {
        let w = engine.code[i as usize];
        if !is_op(w) || popcode(w) != POP_AFOR {
            break;
        }
        let n = numop_of(w);
        if count == idx {
            let val = if n >= 1 && (i + 1) < len {
                engine.resolve_operand(engine.code[(i + 1) as usize])
            } else {
                Value::None
            };
            return (val, false);
        }
        count += 1;
        i += n + 1;
    }
    (Value::None, true)
}

/// Depth-tracked DCAS/ECAS scan counting CLBL arms at the top nesting level.
/// Returns the body-start address of the `sel`-th arm (0-based), or `None`
/// if the selector is out of range for this CASE statement.
fn dcas_dispatch(engine: &Engine, start: u32, sel: i32) -> Option<u32> {
    if sel < 0 {
        return None;
    }
    let target = sel as u32;
    let len = engine.code.len() as u32;
    let mut depth: i32 = 1;
    let mut count = 0u32;
    let mut i = start;

    while i < len && depth > 0 {
        let w = engine.code[i as usize];
        if is_op(w) {
            let pop = popcode(w);
            let n = numop_of(w);
            if pop == POP_DCAS {
                depth += 1;
            }
            if pop == POP_ECAS {
                depth -= 1;
                if depth == 0 {
                    break;
                }
            }
            if pop == POP_CLBL && depth == 1 {
                if count == target {
                    return Some(i + n + 1);
                }
                count += 1;
            }
            i += n + 1;
        } else {
            i += 1;
        }
    }
    None
}

/// Stage one I/O argument from the operand at `pc+1` into the currently
/// open IoList. `arg_type` comes from the operand word's TAG1 byte
/// (2=char, 5=floating, 6=integer); format=6 requests are truncated from
/// SCALAR to INTEGER before staging, matching the reference's WRIT path.
fn stage_io_arg(engine: &mut Engine, pc: u32) {
    let word = engine.code[(pc + 1) as usize];
    let arg_type = tag1(word);
    let mut val = engine.resolve_operand(word);
    if arg_type == 6 {
        if let Value::Scalar(s) = val {
            val = Value::Integer(s as i32);
        }
    }
    if engine.io.args.len() < MAX_IO_ARGS {
        engine.io.args.push(val);
        engine.io.arg_types.push(arg_type as u8);
    }
}

/// PCAL/FCAL: linearly scan every loaded code block for a PDEF/FDEF whose
/// first operand names `target_syt`, push a call frame, splice the staged
/// IoList into the callee's argument slots, and jump into its body.
fn call_procedure(engine: &mut Engine, instr: &Instruction, def_pop: u32) -> EngineResult<()> {
    let pc = instr.pc;
    let target_syt = data(engine.code[(pc + 1) as usize]);

    let len = engine.code.len() as u32;
    let mut i = 0;
    let mut found = None;
    while i < len {
        let w = engine.code[i as usize];
        if is_op(w) {
            let pop = popcode(w);
            let n = numop_of(w);
            if pop == def_pop && n >= 1 && (i + 1) < len && data(engine.code[(i + 1) as usize]) == target_syt {
                found = Some((i, n));
                break;
            }
            i += n + 1;
        } else {
            i += 1;
        }
    }

    match found {
        Some((def_addr, def_numop)) => {
            if engine.frames.len() >= MAX_FRAMES {
                return Err(EngineError::StackOverflow { kind: "call", pc });
            }
            engine.frames.push(CallFrame {
                return_pc: instr.next_pc(),
                call_addr: pc,
            });

            let nargs = engine.io.args.len().min(16);
            for idx in 0..nargs {
                let slot = target_syt as usize + 1 + idx;
                if slot < MAX_SYT {
                    engine.syt[slot].value = engine.io.args[idx].clone();
                    engine.syt[slot].allocated = true;
                }
            }
            engine.io.active = false;
            engine.io.args.clear();
            engine.io.arg_types.clear();

            engine.pc = def_addr + def_numop + 1;
        }
        None => {
            tracing::warn!(target_syt, pc, "halmat_class0: call target not found");
            engine.pc = instr.next_pc();
        }
    }
    Ok(())
}
