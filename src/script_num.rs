//! Minimally-encoded, sign-magnitude little-endian integers as pushed onto the
//! data stack (Component A). Every numeric opcode (arithmetic, CLTV/CSV,
//! OP_DEPTH-adjacent comparisons) goes through these two functions.

use txscript_errors::TxScriptError;

/// Default maximum encoded length accepted for most arithmetic opcodes.
pub const DEFAULT_SCRIPT_NUM_LEN: usize = 4;
/// CLTV/CSV operate on 5-byte encodings (up to 2^39-1) since locktimes exceed `i32`.
pub const LOCK_TIME_SCRIPT_NUM_LEN: usize = 5;

/// Decodes a stack item as a script number.
///
/// `require_minimal` rejects non-minimal encodings (BIP62 rule 4): a trailing
/// zero byte that isn't required to flip the sign bit, or an empty encoding
/// standing in for a nonzero value. `max_len` bounds the accepted byte length.
pub fn read_script_num(bytes: &[u8], require_minimal: bool, max_len: usize) -> Result<i64, TxScriptError> {
    if bytes.len() > max_len {
        return Err(TxScriptError::NumberTooBig(format!("script number overflow: {} > {}", bytes.len(), max_len)));
    }
    if bytes.is_empty() {
        return Ok(0);
    }

    if require_minimal {
        let last = bytes[bytes.len() - 1];
        // The last byte, stripped of its sign bit, must be nonzero, unless there's
        // more than one byte and the next byte's high bit is set (so the zero byte
        // is required to keep the value from being interpreted as negative).
        if last & 0x7f == 0 && (bytes.len() == 1 || bytes[bytes.len() - 2] & 0x80 == 0) {
            return Err(TxScriptError::MinimalData(format!("{:?} is not minimally encoded", bytes)));
        }
    }

    let mut result: i64 = 0;
    for (i, &byte) in bytes.iter().enumerate() {
        result |= (byte as i64) << (8 * i);
    }

    let last_index = bytes.len() - 1;
    if bytes[last_index] & 0x80 != 0 {
        result &= !(0x80i64 << (8 * last_index));
        Ok(-result)
    } else {
        Ok(result)
    }
}

/// Encodes a value into its minimal sign-magnitude little-endian byte form.
pub fn make_script_num(value: i64) -> Vec<u8> {
    if value == 0 {
        return Vec::new();
    }

    let negative = value < 0;
    let mut absolute = value.unsigned_abs();
    let mut bytes = Vec::with_capacity(9);
    while absolute > 0 {
        bytes.push((absolute & 0xff) as u8);
        absolute >>= 8;
    }

    if bytes.last().copied().unwrap_or(0) & 0x80 != 0 {
        bytes.push(if negative { 0x80 } else { 0 });
    } else if negative {
        *bytes.last_mut().unwrap() |= 0x80;
    }

    bytes
}

/// Saturating projection to the `i32` range used by opcodes that only accept
/// 4-byte-or-smaller operands (everything but CLTV/CSV).
pub fn script_num_to_i32(value: i64) -> i32 {
    value.clamp(i32::MIN as i64, i32::MAX as i64) as i32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_preserves_value() {
        for v in [0i64, 1, -1, 127, -127, 128, -128, 32767, -32767, 1 << 30, -(1 << 30), i64::from(i32::MAX), i64::from(i32::MIN)] {
            let encoded = make_script_num(v);
            let decoded = read_script_num(&encoded, true, 5).unwrap();
            assert_eq!(decoded, v, "round trip failed for {v}");
        }
    }

    #[test]
    fn rejects_non_minimal_encoding() {
        // 0x00 alone decodes to zero, but zero's minimal encoding is empty.
        assert!(read_script_num(&[0x00], true, 4).is_err());
        assert_eq!(read_script_num(&[0x00], false, 4).unwrap(), 0);
    }

    #[test]
    fn rejects_overlong_encoding() {
        assert!(read_script_num(&[1, 2, 3, 4, 5], true, 4).is_err());
        assert!(read_script_num(&[1, 2, 3, 4, 5], true, 5).is_ok());
    }

    #[test]
    fn negative_zero_padding_is_minimal_when_needed() {
        // 0xff requires a padding byte to avoid being read as negative.
        let encoded = make_script_num(0xff);
        assert_eq!(encoded, vec![0xff, 0x00]);
        assert_eq!(read_script_num(&encoded, true, 4).unwrap(), 0xff);
    }

    #[test]
    fn saturating_i32_projection() {
        assert_eq!(script_num_to_i32(i64::from(i32::MAX) + 100), i32::MAX);
        assert_eq!(script_num_to_i32(i64::from(i32::MIN) - 100), i32::MIN);
    }
}
