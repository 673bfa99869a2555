//! Four-byte encoded variables: integers and floats packed into an `i32`.
//!
//! Float layout, MSB to LSB:
//! - 1 bit: is negative
//! - 1 bit: unused
//! - 25 bits: the digits of the float without the decimal point
//! - 3 bits: number of digits minus 1
//! - 2 bits: digits right of the decimal point minus 1

const DIGITS_BITS: u32 = 25;
const DIGITS_MASK: u32 = (1 << DIGITS_BITS) - 1;
const MAX_DIGITS: usize = 8;
const MAX_DECIMAL_POS: usize = 4;

/// Decodes an integer variable into `out`.
pub fn decode_integer(encoded: i32, out: &mut Vec<u8>) {
    out.extend_from_slice(encoded.to_string().as_bytes());
}

/// Decodes a float variable into `out`. Returns `None` when the packed fields
/// are inconsistent, in which case `out` is left untouched.
pub fn decode_float(encoded: i32, out: &mut Vec<u8>) -> Option<()> {
    let v = encoded as u32;
    let is_negative = v >> 31 == 1;
    let decimal_pos = (v & 0x3) as usize + 1;
    let num_digits = ((v >> 2) & 0x7) as usize + 1;
    let mut digits = (v >> 5) & DIGITS_MASK;

    if decimal_pos > num_digits {
        return None;
    }
    let mut rendered = [b'0'; MAX_DIGITS];
    for slot in rendered[..num_digits].iter_mut().rev() {
        *slot = b'0' + (digits % 10) as u8;
        digits /= 10;
    }
    if digits > 0 {
        return None;
    }

    if is_negative {
        out.push(b'-');
    }
    let split = num_digits - decimal_pos;
    out.extend_from_slice(&rendered[..split]);
    out.push(b'.');
    out.extend_from_slice(&rendered[split..num_digits]);
    Some(())
}

/// Packs a decimal float string (e.g. `-12.50`) into its four-byte form.
/// Returns `None` for strings the encoding cannot represent exactly.
pub fn encode_float(s: &str) -> Option<i32> {
    let (is_negative, body) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s),
    };
    let (int_part, frac_part) = body.split_once('.')?;
    let decimal_pos = frac_part.len();
    let num_digits = int_part.len() + decimal_pos;
    if decimal_pos == 0 || decimal_pos > MAX_DECIMAL_POS || num_digits > MAX_DIGITS {
        return None;
    }

    let mut digits: u32 = 0;
    for b in int_part.bytes().chain(frac_part.bytes()) {
        if !b.is_ascii_digit() {
            return None;
        }
        digits = digits * 10 + u32::from(b - b'0');
    }
    if digits > DIGITS_MASK {
        return None;
    }

    let mut v = u32::from(is_negative);
    v <<= 1;
    v <<= DIGITS_BITS;
    v |= digits;
    v <<= 3;
    v |= (num_digits - 1) as u32;
    v <<= 2;
    v |= (decimal_pos - 1) as u32;
    Some(v as i32)
}
