//! Decoder for Oracle's internal `NUMBER` wire format: a biased exponent
//! byte followed by base-100 "digit" bytes, each stored with a +1/+101
//! bias so that `0x00` never appears inside a number's byte image.

/// Decode an Oracle `NUMBER` column image into a decimal string. Handles
/// the positive and negative encodings and the dedicated zero byte
/// (`0x80`); does not attempt to round-trip exotic values (NaN-like
/// sentinels) since the core only needs this for diagnostic dumps and
/// integration tests - typed decoding for downstream consumers is a
/// Builder concern driven by dictionary metadata.
pub fn decode_to_string(bytes: &[u8]) -> Option<String> {
    if bytes.is_empty() {
        return None;
    }
    if bytes[0] == 0x80 {
        return Some("0".to_string());
    }

    let negative = bytes[0] < 0x80;
    let exponent: i32 = if negative {
        62 - bytes[0] as i32
    } else {
        bytes[0] as i32 - 193
    };

    let mut digits: Vec<i32> = Vec::new();
    for &b in &bytes[1..] {
        if negative && b == 0x66 {
            break; // negative-number terminator byte
        }
        let digit = if negative { 101 - b as i32 } else { b as i32 - 1 };
        digits.push(digit);
    }

    if digits.is_empty() {
        return None;
    }

    // Each digit represents two decimal places, scaled by 100^exponent.
    let mut integer_part = String::new();
    let mut scale = exponent;
    for &d in &digits {
        integer_part.push_str(&format!("{:02}", d));
        scale -= 1;
    }

    // Strip leading zero padding introduced by the two-digit grouping,
    // then reinsert a decimal point according to the remaining scale.
    let trimmed = integer_part.trim_start_matches('0');
    let trimmed = if trimmed.is_empty() { "0" } else { trimmed };

    let mut value = if scale >= 0 {
        let mut s = trimmed.to_string();
        s.push_str(&"0".repeat((scale as usize) * 2));
        s
    } else {
        let frac_digits = (-scale) as usize * 2;
        if frac_digits >= trimmed.len() {
            format!("0.{}{}", "0".repeat(frac_digits - trimmed.len()), trimmed)
        } else {
            let split = trimmed.len() - frac_digits;
            format!("{}.{}", &trimmed[..split], &trimmed[split..])
        }
    };

    if negative {
        value = format!("-{}", value);
    }

    Some(value)
}
