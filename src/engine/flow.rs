//! Flow table construction and the forward scanner used to resolve
//! structured-statement nesting (DTST/ETST, DFOR/EFOR, DCAS/ECAS,
//! PDEF/FDEF/CLOS) at runtime, since HALMAT carries no precomputed branch
//! targets for these constructs.

use super::decode::{data, is_op, numop, popcode};
use super::{Engine, BLOCK_WORDS, MAX_FLOW};
use crate::classes::opcodes::POP_LBL;

impl Engine {
    /// Walk forward from `start`, tracking nesting depth via `inc_pop`
    /// (depth += 1) and `dec_pop` (depth -= 1), starting at depth 1. Returns
    /// the address of the `dec_pop` instruction that brings depth back to
    /// zero, or `code.len()` if none is found before the end of code.
    ///
    /// Non-operator (stray operand) words count as a single word step.
    pub fn scan_forward(&self, start: u32, inc_pop: u32, dec_pop: u32) -> u32 {
        let mut depth: i32 = 1;
        let mut scan = start;
        let len = self.code.len() as u32;

        while scan < len && depth > 0 {
            let w = self.code[scan as usize];
            if is_op(w) {
                let pop = popcode(w);
                let n = numop(w);
                if pop == inc_pop {
                    depth += 1;
                }
                if pop == dec_pop {
                    depth -= 1;
                }
                if depth == 0 {
                    return scan;
                }
                scan += n + 1;
            } else {
                scan += 1;
            }
        }
        len
    }

    /// Pre-scan every loaded block for LBL operators and register their flow
    /// number → address mapping. Loop-opening constructs (DTST/DFOR/DSMP)
    /// register their own flow entries as they execute.
    pub fn build_flow_table(&mut self) {
        for blk in 0..self.num_blocks {
            let base = blk * BLOCK_WORDS;
            if (base + 1) as usize >= self.code.len() {
                break;
            }
            let atom_fault = (self.code[(base + 1) as usize] >> 16) & 0xFFFF;
            let mut i = base + 2;
            let end = base + atom_fault;

            while i <= end && (i as usize) < self.code.len() {
                let w = self.code[i as usize];
                if is_op(w) {
                    let pop = popcode(w);
                    let n = numop(w);

                    if pop == POP_LBL && n >= 1 && (i + 1) < self.code.len() as u32 {
                        let operand = self.code[(i + 1) as usize];
                        let flow_num = data(operand) as usize;
                        if flow_num < MAX_FLOW {
                            self.flow[flow_num] = i;
                        }
                    }

                    i += n + 1;
                } else {
                    i += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classes::opcodes::{POP_DTST, POP_ETST};
    use crate::engine::decode::tag;

    fn op_word(popcode: u32, numop: u32, tag: u32) -> u32 {
        (tag << 24) | (numop << 16) | (popcode << 4)
    }

    #[test]
    fn scan_forward_finds_matching_close_respecting_nesting() {
        let mut e = Engine::new();
        // 0: DTST (outer), 1: operand, 2: DTST (inner), 3: operand,
        // 4: ETST (closes inner), 5: ETST (closes outer)
        e.code = vec![
            op_word(POP_DTST, 1, 0),
            1, // operand placeholder (ignored by scanner beyond stride)
            op_word(POP_DTST, 1, 0),
            1,
            op_word(POP_ETST, 0, 0),
            op_word(POP_ETST, 0, 0),
        ];
        let found = e.scan_forward(2, POP_DTST, POP_ETST);
        assert_eq!(found, 5);
        assert_eq!(tag(e.code[found as usize]), 0);
    }
}
