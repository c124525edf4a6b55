//! The tagged value type flowing through SYT, LIT, and VAC, plus the IBM
//! System/360 hex-float decoders used to interpret literal-table payloads.

/// Maximum number of active elements a matrix or vector backing store
/// carries (8x8 matrices, 64-element vectors share the same flat buffer).
pub const MAX_ELEMENTS: usize = 64;

/// Maximum length of a CHAR value in bytes (HAL/S CHARACTER(255) is the
/// widest declarable string).
pub const MAX_CHAR_LEN: usize = 255;

/// A HALMAT value. One variant per HTYPE; EVENT/STRUCT/BOOLEAN are carried
/// only as empty placeholder variants, matching the reference's unimplemented
/// type slots.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    None,
    Bit(u32),
    Char(Vec<u8>),
    Matrix { rows: u8, cols: u8, data: [f64; MAX_ELEMENTS] },
    Vector { rows: u8, data: [f64; MAX_ELEMENTS] },
    Scalar(f64),
    Integer(i32),
    Boolean,
    Event,
    Struct,
}

impl Default for Value {
    fn default() -> Self {
        Value::None
    }
}

impl Value {
    /// Coerce to an integer the way `to_int` in `halmat_class6.c`/`class7.c`
    /// does: read whichever payload is present, default to zero otherwise.
    pub fn to_int(&self) -> i32 {
        match self {
            Value::Integer(i) => *i,
            Value::Scalar(s) => *s as i32,
            Value::Bit(b) => *b as i32,
            _ => 0,
        }
    }

    /// Coerce to a scalar the way `to_scalar` in `halmat_class7.c` does.
    pub fn to_scalar(&self) -> f64 {
        match self {
            Value::Scalar(s) => *s,
            Value::Integer(i) => *i as f64,
            _ => 0.0,
        }
    }

    /// Coerce to raw bits, as read by the class-1/class-7 BIT handlers.
    pub fn to_bits(&self) -> u32 {
        match self {
            Value::Bit(b) => *b,
            Value::Integer(i) => *i as u32,
            _ => 0,
        }
    }

    /// Byte view of a CHAR value padded with zeros to 256 bytes, matching the
    /// reference's fixed-size `string.data` buffer semantics for ordering
    /// comparisons (`CGT`/`CLT`/`CNGT`/`CNLT` read up to 256 raw bytes).
    pub fn char_bytes_padded(&self) -> [u8; 256] {
        let mut buf = [0u8; 256];
        if let Value::Char(bytes) = self {
            let n = bytes.len().min(256);
            buf[..n].copy_from_slice(&bytes[..n]);
        }
        buf
    }

    /// Logical length of a CHAR value, or 0 for any other variant.
    pub fn char_len(&self) -> usize {
        match self {
            Value::Char(bytes) => bytes.len(),
            _ => 0,
        }
    }
}

/// Decode an IBM System/360 single-precision hex float.
///
/// Layout: sign(1) | exponent(7, excess-64, base-16) | fraction(24).
/// A zero fraction yields exactly 0.0 regardless of the exponent field.
pub fn ibm_float_to_double(w: u32) -> f64 {
    let sign = if w & 0x8000_0000 != 0 { -1.0 } else { 1.0 };
    let exp = ((w >> 24) & 0x7F) as i32;
    let frac = w & 0x00FF_FFFF;

    if frac == 0 {
        return 0.0;
    }

    let mantissa = frac as f64 / 16_777_216.0; // 2^24
    sign * mantissa * 16f64.powi(exp - 64)
}

/// Decode an IBM System/360 double-precision hex float, split across two
/// consecutive big-endian words (56-bit fraction).
pub fn ibm_double_to_double(w_hi: u32, w_lo: u32) -> f64 {
    let sign = if w_hi & 0x8000_0000 != 0 { -1.0 } else { 1.0 };
    let exp = ((w_hi >> 24) & 0x7F) as i32;
    let frac_hi = w_hi & 0x00FF_FFFF;
    let frac_lo = w_lo;

    if frac_hi == 0 && frac_lo == 0 {
        return 0.0;
    }

    let mantissa =
        (frac_hi as f64 * 4_294_967_296.0 + frac_lo as f64) / 72_057_594_037_927_936.0; // 2^56
    sign * mantissa * 16f64.powi(exp - 64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_float_round_trips() {
        assert_eq!(ibm_float_to_double(0x4110_0000), 1.0);
        assert_eq!(ibm_float_to_double(0xC110_0000), -1.0);
        assert_eq!(ibm_float_to_double(0x0000_0000), 0.0);
        // exponent is irrelevant when the fraction is zero
        assert_eq!(ibm_float_to_double(0x7F00_0000), 0.0);
    }

    #[test]
    fn double_float_round_trips() {
        assert_eq!(ibm_double_to_double(0x4110_0000, 0x0000_0000), 1.0);
    }

    #[test]
    fn to_int_reads_whichever_payload_is_present() {
        assert_eq!(Value::Integer(7).to_int(), 7);
        assert_eq!(Value::Scalar(7.9).to_int(), 7);
        assert_eq!(Value::Bit(0xFF).to_int(), 0xFF);
        assert_eq!(Value::None.to_int(), 0);
    }
}
