//! Operand resolution: turn one operand word into a [`Value`], per the
//! addressing qualifier it carries. Pure read — never mutates engine state.

use super::decode::{data, qual, Qual};
use super::Engine;
use crate::value::{ibm_double_to_double, ibm_float_to_double, Value};

impl Engine {
    /// Resolve one operand word to a value. Out-of-range indices resolve to
    /// a zeroed (`Value::None`) result rather than erroring, matching the
    /// reference's `memset`-initialized scratch value on miss.
    pub fn resolve_operand(&self, word: u32) -> Value {
        let d = data(word) as usize;

        match Qual::from_u32(qual(word)) {
            Qual::Syt => self
                .syt
                .get(d)
                .map(|e| e.value.clone())
                .unwrap_or(Value::None),

            Qual::Lit => self.resolve_literal(d),

            Qual::Vac => self.read_vac(d as u32),

            Qual::Imd | Qual::Inl => Value::Integer(d as i32),

            _ => Value::None,
        }
    }

    fn resolve_literal(&self, idx: usize) -> Value {
        let Some(entry) = self.lit.get(idx) else {
            return Value::None;
        };
        if idx >= self.lit_count {
            return Value::None;
        }

        match entry.lit1 {
            0 => {
                let (bytes, _len) = self.decode_char_lit(idx);
                Value::Char(bytes)
            }
            1 => Value::Scalar(ibm_float_to_double(entry.lit2 as u32)),
            2 => Value::Bit(entry.lit2 as u32),
            5 => Value::Scalar(ibm_double_to_double(entry.lit2 as u32, entry.lit3 as u32)),
            _ => Value::None,
        }
    }

    /// Recover a CHAR literal's bytes: prefer the source-recovered string
    /// pool; fall back to decoding packed bytes out of `lit2`/successive
    /// `lit2` words when no source-derived string is available.
    pub fn decode_char_lit(&self, idx: usize) -> (Vec<u8>, usize) {
        if idx >= self.lit_count {
            return (Vec::new(), 0);
        }

        let off = self.lit_str_off[idx];
        let len = self.lit_str_len[idx];
        if off > 0 && len > 0 {
            let start = off as usize;
            let end = start + len as usize;
            if end <= self.lit_str_pool.len() {
                return (self.lit_str_pool[start..end].to_vec(), len as usize);
            }
        }

        let lit2 = self.lit[idx].lit2 as u32;
        let slen = (((lit2 >> 24) & 0xFF) + 1) as usize;
        let mut buf = Vec::with_capacity(slen);

        let push = |buf: &mut Vec<u8>, w: u32| {
            if buf.len() < slen {
                buf.push(((w >> 16) & 0xFF) as u8);
            }
            if buf.len() < slen {
                buf.push(((w >> 8) & 0xFF) as u8);
            }
            if buf.len() < slen {
                buf.push((w & 0xFF) as u8);
            }
        };
        push(&mut buf, lit2);

        let mut ext = 1usize;
        while buf.len() < slen {
            let idx2 = idx + ext;
            if idx2 >= self.lit_count {
                break;
            }
            let w = self.lit[idx2].lit2 as u32;
            if buf.len() < slen {
                buf.push(((w >> 24) & 0xFF) as u8);
            }
            if buf.len() < slen {
                buf.push(((w >> 16) & 0xFF) as u8);
            }
            if buf.len() < slen {
                buf.push(((w >> 8) & 0xFF) as u8);
            }
            if buf.len() < slen {
                buf.push((w & 0xFF) as u8);
            }
            ext += 1;
        }

        buf.truncate(slen);
        let n = buf.len();
        (buf, n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::LitEntry;

    #[test]
    fn resolves_immediate_as_integer() {
        let e = Engine::new();
        let word = (7u32 << 16) | (0 << 8) | (6 << 4) | 1; // QUAL_IMD=6
        assert_eq!(e.resolve_operand(word), Value::Integer(7));
    }

    #[test]
    fn resolves_syt_slot() {
        let mut e = Engine::new();
        e.syt[3].value = Value::Integer(99);
        e.syt[3].allocated = true;
        let word = (3u32 << 16) | (0 << 8) | (1 << 4) | 1; // QUAL_SYT=1
        assert_eq!(e.resolve_operand(word), Value::Integer(99));
    }

    #[test]
    fn resolves_single_float_literal() {
        let mut e = Engine::new();
        e.lit[0] = LitEntry { kind: 1, lit1: 1, lit2: 0x4110_0000u32 as i32, lit3: 0 };
        e.lit_count = 1;
        let word = (0u32 << 16) | (0 << 8) | (5 << 4) | 1; // QUAL_LIT=5
        assert_eq!(e.resolve_operand(word), Value::Scalar(1.0));
    }
}
