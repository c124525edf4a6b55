//! The I/O backend: the pluggable component that turns a staged WRIT
//! argument list into formatted output on a numbered unit.
//!
//! `spec.md` lists this as an external collaborator, specified only by the
//! interface it must honor (`write`/`read`/`init`/`shutdown`). The reference
//! implementation's own `halmat_io.c` is a minimal stub that always prints to
//! stdout regardless of channel; this module implements the fuller contract
//! `spec.md` §6 actually describes (per-unit file routing, EBCDIC
//! translation, the three numeric/character format codes). Units 5/6 get
//! the usual console defaults (stdin/stdout); any other unit WRIT/READ
//! reaches without an explicit `--unit N=PATH` mapping is a program bug
//! worth surfacing, so it errors rather than silently falling back to
//! stdout.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader, Write};

use crate::error::{EngineError, EngineResult};
use crate::value::Value;

/// Number of addressable units (`spec.md` §5 resource limits).
pub const MAX_UNITS: usize = 16;

/// Where a unit number resolves to.
#[derive(Debug, Clone)]
pub enum UnitTarget {
    Stdin,
    Stdout,
    Stderr,
    File(String),
}

impl UnitTarget {
    /// Parse a `--unit N=PATH` value's PATH half, recognizing the three
    /// special names `stdin`/`stdout`/`stderr`.
    pub fn parse(path: &str) -> UnitTarget {
        match path {
            "stdin" => UnitTarget::Stdin,
            "stdout" => UnitTarget::Stdout,
            "stderr" => UnitTarget::Stderr,
            other => UnitTarget::File(other.to_string()),
        }
    }
}

/// The pure interface an I/O backend implements, per `spec.md` §9's "I/O
/// backend plug" design note.
pub trait IoBackend {
    fn init(&mut self) -> EngineResult<()> {
        Ok(())
    }

    fn shutdown(&mut self) {}

    /// Dispatch one WRIT's staged argument list to `unit`. `formats[i]` is
    /// the TAG1 byte captured when argument `i` was staged (2=character,
    /// 5=floating, 6=integer).
    fn write(&mut self, unit: i32, args: &[Value], formats: &[u8]) -> EngineResult<()>;

    /// Read one value from `unit`. Only ever produces INTEGER values, as the
    /// reference's `halmat_io_read` does.
    fn read(&mut self, unit: i32) -> EngineResult<Value>;
}

/// Default backend: routes units explicitly mapped via `--unit N=PATH` to
/// their target; everything else falls back to stdout, matching the
/// reference stub's channel-blind behavior.
pub struct UnitIoBackend {
    mapping: HashMap<i32, UnitTarget>,
    writers: HashMap<i32, Box<dyn Write>>,
    readers: HashMap<i32, Box<dyn BufRead>>,
    pub translate_ebcdic: bool,
}

impl Default for UnitIoBackend {
    fn default() -> Self {
        let mut mapping = HashMap::new();
        mapping.insert(5, UnitTarget::Stdin);
        mapping.insert(6, UnitTarget::Stdout);
        UnitIoBackend {
            mapping,
            writers: HashMap::new(),
            readers: HashMap::new(),
            translate_ebcdic: false,
        }
    }
}

impl UnitIoBackend {
    pub fn new(translate_ebcdic: bool) -> Self {
        UnitIoBackend {
            translate_ebcdic,
            ..Default::default()
        }
    }

    /// Map `unit` to `target`, overriding the default for units 5/6 too.
    pub fn map_unit(&mut self, unit: i32, target: UnitTarget) {
        self.mapping.insert(unit, target);
    }

    fn writer_for(&mut self, unit: i32) -> EngineResult<&mut Box<dyn Write>> {
        if !self.writers.contains_key(&unit) {
            let target = self.mapping.get(&unit).cloned();
            let w: Box<dyn Write> = match target {
                Some(UnitTarget::Stdin) => {
                    return Err(EngineError::Io {
                        unit,
                        source: std::io::Error::new(
                            std::io::ErrorKind::Other,
                            "cannot write to a unit mapped to stdin",
                        ),
                    })
                }
                Some(UnitTarget::Stdout) => Box::new(std::io::stdout()),
                Some(UnitTarget::Stderr) => Box::new(std::io::stderr()),
                Some(UnitTarget::File(path)) => {
                    let f = File::create(&path).map_err(|source| EngineError::Io { unit, source })?;
                    Box::new(f)
                }
                None => {
                    return Err(EngineError::Io {
                        unit,
                        source: std::io::Error::new(
                            std::io::ErrorKind::NotFound,
                            format!("unit {unit} has no mapping; pass --unit {unit}=PATH"),
                        ),
                    })
                }
            };
            self.writers.insert(unit, w);
        }
        Ok(self.writers.get_mut(&unit).unwrap())
    }

    fn reader_for(&mut self, unit: i32) -> EngineResult<&mut Box<dyn BufRead>> {
        if !self.readers.contains_key(&unit) {
            let target = self.mapping.get(&unit).cloned();
            let r: Box<dyn BufRead> = match target {
                Some(UnitTarget::Stdout) | Some(UnitTarget::Stderr) => {
                    return Err(EngineError::Io {
                        unit,
                        source: std::io::Error::new(
                            std::io::ErrorKind::Other,
                            "cannot read from a unit mapped to stdout/stderr",
                        ),
                    })
                }
                Some(UnitTarget::Stdin) => Box::new(BufReader::new(std::io::stdin())),
                Some(UnitTarget::File(path)) => {
                    let f = File::open(&path).map_err(|source| EngineError::Io { unit, source })?;
                    Box::new(BufReader::new(f))
                }
                None => {
                    return Err(EngineError::Io {
                        unit,
                        source: std::io::Error::new(
                            std::io::ErrorKind::NotFound,
                            format!("unit {unit} has no mapping; pass --unit {unit}=PATH"),
                        ),
                    })
                }
            };
            self.readers.insert(unit, r);
        }
        Ok(self.readers.get_mut(&unit).unwrap())
    }
}

impl IoBackend for UnitIoBackend {
    fn write(&mut self, unit: i32, args: &[Value], formats: &[u8]) -> EngineResult<()> {
        let ebcdic = self.translate_ebcdic;
        let mut line = String::new();

        for (val, fmt) in args.iter().zip(formats.iter()) {
            match fmt {
                2 => {
                    if let Value::Char(bytes) = val {
                        let bytes = if ebcdic { translate_ebcdic_to_ascii(bytes) } else { bytes.clone() };
                        line.push_str(&String::from_utf8_lossy(&bytes));
                    }
                }
                5 => line.push_str(&format_scalar_record(val.to_scalar())),
                6 => line.push_str(&format_integer_record(val.to_int())),
                _ => match val {
                    Value::Integer(i) => line.push_str(&format_integer_record(*i)),
                    Value::Scalar(s) => line.push_str(&format_scalar_record(*s)),
                    Value::Char(bytes) => {
                        let bytes = if ebcdic { translate_ebcdic_to_ascii(bytes) } else { bytes.clone() };
                        line.push_str(&String::from_utf8_lossy(&bytes));
                    }
                    _ => {}
                },
            }
        }
        line.push('\n');

        let w = self.writer_for(unit)?;
        w.write_all(line.as_bytes())
            .map_err(|source| EngineError::Io { unit, source })?;
        Ok(())
    }

    fn read(&mut self, unit: i32) -> EngineResult<Value> {
        let r = self.reader_for(unit)?;
        let mut line = String::new();
        r.read_line(&mut line)
            .map_err(|source| EngineError::Io { unit, source })?;
        let n: i32 = line.trim().parse().unwrap_or(0);
        Ok(Value::Integer(n))
    }
}

/// Numeric scalar output per `spec.md` §6: `% .7E` for nonzero values
/// (C's space flag reserves a sign column), ` 0.0` for exactly zero.
pub fn format_scalar_record(v: f64) -> String {
    if v == 0.0 {
        return " 0.0".to_string();
    }
    let sign = if v.is_sign_negative() { '-' } else { ' ' };
    let mag = v.abs();
    let formatted = format!("{:.7e}", mag);
    let (mantissa, exp_str) = formatted.split_once('e').unwrap_or((formatted.as_str(), "0"));
    let exp: i32 = exp_str.parse().unwrap_or(0);
    format!("{sign}{mantissa}E{}{:02}", if exp >= 0 { "+" } else { "-" }, exp.abs())
}

/// Integer output per `spec.md` §6: right-justified fixed-width decimal.
/// Width 11 covers a sign plus the widest 32-bit magnitude.
pub fn format_integer_record(v: i32) -> String {
    format!("{v:>11}")
}

/// IBM Code Page 037 (EBCDIC) to ASCII, used when `--ebcdic` is set.
#[rustfmt::skip]
const CP037_TO_ASCII: [u8; 256] = [
    0x00,0x01,0x02,0x03,0x9C,0x09,0x86,0x7F,0x97,0x8D,0x8E,0x0B,0x0C,0x0D,0x0E,0x0F,
    0x10,0x11,0x12,0x13,0x9D,0x85,0x08,0x87,0x18,0x19,0x92,0x8F,0x1C,0x1D,0x1E,0x1F,
    0x80,0x81,0x82,0x83,0x84,0x0A,0x17,0x1B,0x88,0x89,0x8A,0x8B,0x8C,0x05,0x06,0x07,
    0x90,0x91,0x16,0x93,0x94,0x95,0x96,0x04,0x98,0x99,0x9A,0x9B,0x14,0x15,0x9E,0x1A,
    0x20,0xA0,0xA1,0xA2,0xA3,0xA4,0xA5,0xA6,0xA7,0xA8,0x5B,0x2E,0x3C,0x28,0x2B,0x21,
    0x26,0xA9,0xAA,0xAB,0xAC,0xAD,0xAE,0xAF,0xB0,0xB1,0x5D,0x24,0x2A,0x29,0x3B,0x5E,
    0x2D,0x2F,0xB2,0xB3,0xB4,0xB5,0xB6,0xB7,0xB8,0xB9,0x7C,0x2C,0x25,0x5F,0x3E,0x3F,
    0xBA,0xBB,0xBC,0xBD,0xBE,0xBF,0xC0,0xC1,0xC2,0x60,0x3A,0x23,0x40,0x27,0x3D,0x22,
    0xC3,0x61,0x62,0x63,0x64,0x65,0x66,0x67,0x68,0x69,0xC4,0xC5,0xC6,0xC7,0xC8,0xC9,
    0xCA,0x6A,0x6B,0x6C,0x6D,0x6E,0x6F,0x70,0x71,0x72,0xCB,0xCC,0xCD,0xCE,0xCF,0xD0,
    0xD1,0x7E,0x73,0x74,0x75,0x76,0x77,0x78,0x79,0x7A,0xD2,0xD3,0xD4,0xD5,0xD6,0xD7,
    0xD8,0xD9,0xDA,0xDB,0xDC,0xDD,0xDE,0xDF,0xE0,0xE1,0xE2,0xE3,0xE4,0xE5,0xE6,0xE7,
    0x7B,0x41,0x42,0x43,0x44,0x45,0x46,0x47,0x48,0x49,0xE8,0xE9,0xEA,0xEB,0xEC,0xED,
    0x7D,0x4A,0x4B,0x4C,0x4D,0x4E,0x4F,0x50,0x51,0x52,0xEE,0xEF,0xF0,0xF1,0xF2,0xF3,
    0x5C,0x9F,0x53,0x54,0x55,0x56,0x57,0x58,0x59,0x5A,0xF4,0xF5,0xF6,0xF7,0xF8,0xF9,
    0x30,0x31,0x32,0x33,0x34,0x35,0x36,0x37,0x38,0x39,0xFA,0xFB,0xFC,0xFD,0xFE,0xFF,
];

pub fn translate_ebcdic_to_ascii(bytes: &[u8]) -> Vec<u8> {
    bytes.iter().map(|&b| CP037_TO_ASCII[b as usize]).collect()
}

/// A backend that discards all output, used by `--disasm` and by tests that
/// don't care about I/O.
#[derive(Default)]
pub struct NullIoBackend;

impl IoBackend for NullIoBackend {
    fn write(&mut self, _unit: i32, _args: &[Value], _formats: &[u8]) -> EngineResult<()> {
        Ok(())
    }

    fn read(&mut self, _unit: i32) -> EngineResult<Value> {
        Ok(Value::Integer(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_zero_scalar_as_spec_example() {
        assert_eq!(format_scalar_record(0.0), " 0.0");
    }

    #[test]
    fn formats_nonzero_scalar_in_scientific_notation() {
        let s = format_scalar_record(1.5);
        assert!(s.starts_with(' '));
        assert!(s.contains('E'));
        let s2 = format_scalar_record(-1.5);
        assert!(s2.starts_with('-'));
    }

    #[test]
    fn formats_integer_right_justified() {
        assert_eq!(format_integer_record(7), "          7");
        assert_eq!(format_integer_record(-3), "         -3");
    }

    #[test]
    fn ebcdic_table_roundtrips_digits() {
        // EBCDIC '0'..'9' are 0xF0..0xF9 in CP037.
        let ebcdic_digits: Vec<u8> = (0xF0u8..=0xF9).collect();
        let ascii = translate_ebcdic_to_ascii(&ebcdic_digits);
        assert_eq!(ascii, b"0123456789".to_vec());
    }
}
