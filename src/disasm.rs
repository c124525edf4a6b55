//! Disassembler: render loaded code memory as a human-readable listing, and
//! format a single instruction for the interactive debugger's `d` command.

use std::fmt::Write as _;

use crate::classes::opcodes;
use crate::engine::decode::{
    class, copt, data, is_op, numop, popcode, qual, tag, tag1, tag2, Qual,
};
use crate::engine::{Engine, BLOCK_WORDS};
use crate::value::{ibm_double_to_double, ibm_float_to_double};

/// A short annotation describing a LIT operand's literal payload, e.g.
/// `=CHAR(5)` or `=1.5`.
fn lit_annotation(engine: &Engine, idx: usize) -> String {
    let Some(entry) = engine.lit.get(idx) else {
        return String::new();
    };
    if idx >= engine.lit_count {
        return String::new();
    }
    match entry.lit1 {
        0 => {
            let len = (((entry.lit2 as u32) >> 24) & 0xFF) + 1;
            format!("=CHAR({len})")
        }
        1 => format!("={}", ibm_float_to_double(entry.lit2 as u32)),
        2 => format!("=BIT'{:X}'", entry.lit2),
        5 => format!("={}", ibm_double_to_double(entry.lit2 as u32, entry.lit3 as u32)),
        other => format!("=?type{other}"),
    }
}

/// Disassemble the whole loaded program, block by block.
pub fn disasm(engine: &Engine) -> String {
    let mut out = String::new();
    for blk in 0..engine.num_blocks {
        let base = blk * BLOCK_WORDS;
        let w1 = engine.code[(base + 1) as usize];
        let atom_fault = (w1 >> 16) & 0xFFFF;

        let _ = writeln!(out, "=== BLOCK {blk} === ({atom_fault} atoms, words 2..{atom_fault})\n");
        let _ = writeln!(
            out,
            "  {:<5}  {:<10}  {:<6}  {:<5}  {:<6}  {}",
            "ADDR", "RAW", "TYPE", "TAG", "COPT", "DECODED"
        );
        let _ = writeln!(out, "  {}", "-".repeat(70));

        let mut i = base + 2;
        let end = base + atom_fault;

        while i <= end && (i as usize) < engine.code.len() {
            let w = engine.code[i as usize];

            if is_op(w) {
                let t = tag(w);
                let n = numop(w);
                let pop = popcode(w);
                let cls = class(w);
                let cpt = copt(w);

                let name = opcode_mnemonic(pop);
                let clsname = opcodes::class_name(cls);
                let tag_str = if t > 0 { format!("T={t}") } else { String::new() };
                let copt_str = if cpt > 0 { format!("C={cpt}") } else { String::new() };

                let _ = writeln!(
                    out,
                    "  {i:4}:  {w:08X}  {clsname:<6}  {tag_str:<5}  {copt_str:<6}  {name}  ({clsname}/{name}, {n} ops)",
                );

                for j in 1..=n {
                    let opaddr = i + j;
                    if opaddr > end || (opaddr as usize) >= engine.code.len() {
                        break;
                    }
                    let ow = engine.code[opaddr as usize];
                    if !is_op(ow) {
                        let d = data(ow);
                        let t1 = tag1(ow);
                        let q = qual(ow);
                        let t2 = tag2(ow);
                        let qname = Qual::from_u32(q).name();
                        let mut annot = String::new();
                        if matches!(Qual::from_u32(q), Qual::Lit) {
                            annot = lit_annotation(engine, d as usize);
                        }
                        let taginfo = if t1 > 0 || t2 > 0 {
                            format!(" [T1={t1} T2={t2}]")
                        } else {
                            String::new()
                        };
                        let _ = writeln!(out, "         {ow:08X}    op{j:<2}               {qname}({d}){annot}{taginfo}");
                    } else {
                        let _ = writeln!(out, "         {ow:08X}    op{j:<2}               <unexpected operator>");
                    }
                }

                i += n + 1;
            } else {
                let d = data(w);
                let t1 = tag1(w);
                let q = qual(w);
                let t2 = tag2(w);
                let _ = writeln!(
                    out,
                    "  {i:4}:  {w:08X}  STRAY               {}({d}) [T1={t1} T2={t2}]",
                    Qual::from_u32(q).name()
                );
                i += 1;
            }
        }
        let _ = writeln!(out);
    }
    out
}

/// Disassemble the single instruction at `pc`, for the debugger's `d`
/// command. Returns an empty string if `pc` is out of range or holds a
/// stray operand word.
pub fn disasm_word(engine: &Engine, pc: u32) -> String {
    let Some(&w) = engine.code.get(pc as usize) else {
        return String::new();
    };
    if !is_op(w) {
        return format!("{pc:4}: {w:08X}  STRAY");
    }
    let n = numop(w);
    let pop = popcode(w);
    let cls = class(w);
    let name = opcode_mnemonic(pop);
    format!("{pc:4}: {w:08X}  {}/{name} (numop={n})", opcodes::class_name(cls))
}

fn opcode_mnemonic(pop: u32) -> String {
    opcodes::name(pop).map(|s| s.to_string()).unwrap_or_else(|| format!("?{pop:03X}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Engine;

    #[test]
    fn disassembles_a_minimal_block() {
        let mut engine = Engine::new();
        let mut code = vec![0u32; BLOCK_WORDS as usize];
        code[1] = 3 << 16; // atom_fault = 3
        // word 2: XREC tag=1 (halt), numop=0
        code[2] = (1 << 24) | (0 << 16) | (opcodes::POP_XREC << 4);
        code[3] = 0;
        engine.code = code;
        engine.num_blocks = 1;

        let out = disasm(&engine);
        assert!(out.contains("BLOCK 0"));
        assert!(out.contains("XREC"));
    }

    #[test]
    fn disasm_word_reports_mnemonic_and_numop() {
        let mut engine = Engine::new();
        let mut code = vec![0u32; 8];
        code[2] = (0 << 24) | (1 << 16) | (opcodes::POP_BRA << 4);
        engine.code = code;
        let s = disasm_word(&engine, 2);
        assert!(s.contains("BRA"));
        assert!(s.contains("numop=1"));
    }
}
