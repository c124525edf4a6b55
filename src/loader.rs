//! Binary loaders: the HALMAT code file, the literal table file, and the
//! source-text recovery pass that backfills CHAR literal bytes the literal
//! file itself never stores.

use std::fs;
use std::path::Path;

use crate::engine::{Engine, BLOCK_WORDS, LIT_STR_POOL, MAX_BLOCKS, MAX_LIT};
use crate::error::{EngineError, EngineResult};

const LIT_PAGE_SIZE: usize = 130;

fn read_be32(bytes: &[u8], off: usize) -> u32 {
    u32::from_be_bytes([bytes[off], bytes[off + 1], bytes[off + 2], bytes[off + 3]])
}

/// Load a HALMAT binary into `engine`'s code memory, one 1800-word block at
/// a time. Trailing partial words past end-of-file read as zero.
pub fn load_code(engine: &mut Engine, path: &Path) -> EngineResult<()> {
    let bytes = fs::read(path).map_err(|source| EngineError::Load {
        path: path.display().to_string(),
        source,
    })?;

    let block_bytes = (BLOCK_WORDS as usize) * 4;
    let nblocks = bytes.len().div_ceil(block_bytes).max(1);
    if nblocks > MAX_BLOCKS as usize {
        return Err(EngineError::Load {
            path: path.display().to_string(),
            source: std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("too many blocks ({nblocks} > {MAX_BLOCKS})"),
            ),
        });
    }

    let total_words = nblocks * (BLOCK_WORDS as usize);
    let mut code = vec![0u32; total_words];
    for i in 0..total_words {
        let off = i * 4;
        if off + 4 <= bytes.len() {
            code[i] = read_be32(&bytes, off);
        }
    }

    engine.code = code;
    engine.num_blocks = nblocks as u32;
    engine.pc = 2;
    Ok(())
}

/// Load the literal table file: three parallel big-endian word arrays
/// (type/lit1, high word/lit2, low word/lit3) in 130-entry pages.
pub fn load_litfile(engine: &mut Engine, path: &Path) -> EngineResult<()> {
    let bytes = fs::read(path).map_err(|source| EngineError::Load {
        path: path.display().to_string(),
        source,
    })?;

    let page_bytes = LIT_PAGE_SIZE * 3 * 4;
    let npages = bytes.len() / page_bytes;
    let mut total = npages * LIT_PAGE_SIZE;
    if total > MAX_LIT {
        total = MAX_LIT;
    }

    for pg in 0..npages {
        let base = pg * LIT_PAGE_SIZE;
        let page_off = pg * page_bytes;

        for i in 0..LIT_PAGE_SIZE {
            let idx = base + i;
            let off = page_off + i * 4;
            if idx < MAX_LIT && off + 4 <= bytes.len() {
                engine.lit[idx].lit1 = read_be32(&bytes, off) as i32;
            }
        }
        for i in 0..LIT_PAGE_SIZE {
            let idx = base + i;
            let off = page_off + LIT_PAGE_SIZE * 4 + i * 4;
            if idx < MAX_LIT && off + 4 <= bytes.len() {
                engine.lit[idx].lit2 = read_be32(&bytes, off) as i32;
            }
        }
        for i in 0..LIT_PAGE_SIZE {
            let idx = base + i;
            let off = page_off + LIT_PAGE_SIZE * 8 + i * 4;
            if idx < MAX_LIT && off + 4 <= bytes.len() {
                engine.lit[idx].lit3 = read_be32(&bytes, off) as i32;
            }
        }
    }

    for i in 0..total.min(MAX_LIT) {
        engine.lit[i].kind = (engine.lit[i].lit1 & 0xFF) as u8;
    }
    engine.lit_count = total;
    Ok(())
}

/// Recover CHAR literal bytes from HAL/S source text: pull every
/// single-quoted string in order of appearance (honoring `''` as an escaped
/// quote) and match them against CHAR literal entries by declared length.
/// A length mismatch retries the same literal entry against the next source
/// string, mirroring the reference loader's recovery heuristic exactly.
pub fn load_strings(engine: &mut Engine, path: &Path) -> EngineResult<()> {
    let text = fs::read_to_string(path).map_err(|source| EngineError::Load {
        path: path.display().to_string(),
        source,
    })?;
    let src = text.as_bytes();

    let mut strings: Vec<&[u8]> = Vec::new();
    let mut p = 0usize;
    while p < src.len() && strings.len() < 256 {
        let Some(q_rel) = src[p..].iter().position(|&b| b == b'\'') else {
            break;
        };
        let q = p + q_rel;
        let mut end = q + 1;
        loop {
            if end >= src.len() {
                break;
            }
            if src[end] == b'\'' {
                if end + 1 < src.len() && src[end + 1] == b'\'' {
                    end += 2;
                    continue;
                }
                break;
            }
            end += 1;
        }
        if end >= src.len() || src[end] != b'\'' {
            break;
        }

        let len = end - q - 1;
        if len > 0 {
            strings.push(&src[q + 1..end]);
        }
        p = end + 1;
    }

    let mut str_idx = 0usize;
    engine.lit_str_pool.clear();
    engine.lit_str_pool.resize(LIT_STR_POOL, 0u8);
    let mut pool_used = 1usize; // offset 0 is the "not loaded" sentinel

    let lit_count = engine.lit_count;
    let mut i = 0usize;
    while i < lit_count && str_idx < strings.len() {
        if engine.lit[i].lit1 != 0 {
            i += 1;
            continue;
        }
        if engine.lit[i].lit2 == 0 {
            i += 1;
            continue;
        }

        let expected_len = (((engine.lit[i].lit2 as u32 >> 24) & 0xFF) + 1) as usize;
        let candidate = strings[str_idx];

        if candidate.len() == expected_len {
            let off = pool_used;
            if off + expected_len + 1 <= LIT_STR_POOL {
                engine.lit_str_pool[off..off + expected_len].copy_from_slice(candidate);
                engine.lit_str_off[i] = off as u16;
                engine.lit_str_len[i] = expected_len as u16;
                pool_used = off + expected_len + 1;
            }
            str_idx += 1;
            i += 1;
        } else {
            // Length mismatch: try the same literal entry against the next string.
            str_idx += 1;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Engine;

    #[test]
    fn recovers_single_char_literal_from_source() {
        let mut engine = Engine::new();
        engine.lit[0].lit1 = 0;
        engine.lit[0].lit2 = (4i32) << 24; // declared length 5 ('HELLO')
        engine.lit_count = 1;

        let dir = std::env::temp_dir().join(format!("halmat_loader_test_{}", std::process::id()));
        std::fs::write(&dir, "PRINT 'HELLO';").unwrap();
        load_strings(&mut engine, &dir).unwrap();
        std::fs::remove_file(&dir).ok();

        assert_eq!(engine.lit_str_len[0], 5);
        let off = engine.lit_str_off[0] as usize;
        let len = engine.lit_str_len[0] as usize;
        assert_eq!(&engine.lit_str_pool[off..off + len], b"HELLO");
    }

    #[test]
    fn skips_mismatched_length_and_retries_next_string() {
        let mut engine = Engine::new();
        engine.lit[0].lit1 = 0;
        engine.lit[0].lit2 = (2i32) << 24; // declared length 3 ('HI ')
        engine.lit_count = 1;

        let dir = std::env::temp_dir().join(format!("halmat_loader_test2_{}", std::process::id()));
        std::fs::write(&dir, "PRINT 'TOOLONG', 'HI ';").unwrap();
        load_strings(&mut engine, &dir).unwrap();
        std::fs::remove_file(&dir).ok();

        let off = engine.lit_str_off[0] as usize;
        let len = engine.lit_str_len[0] as usize;
        assert_eq!(&engine.lit_str_pool[off..off + len], b"HI ");
    }
}
