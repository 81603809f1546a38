//! Variable-width integers.
//!
//! Groups of 7 bits, most significant group first. The last byte carries
//! the high bit as an end marker.

/// Encode a variable-width integer.
pub fn encint(val: u32) -> Vec<u8> {
    if val == 0 {
        return vec![0x80];
    }

    let mut result = Vec::new();
    let mut v = val;
    while v > 0 {
        result.push((v & 0x7F) as u8);
        v >>= 7;
    }

    // Set high bit on first byte (which becomes last after reverse)
    if let Some(first) = result.first_mut() {
        *first |= 0x80;
    }

    result.reverse();
    result
}

/// Decode a variable-width integer from the front of `data`.
///
/// Returns the value and the number of bytes consumed.
pub fn decint(data: &[u8]) -> (u32, usize) {
    let mut val: u32 = 0;
    let mut consumed = 0;

    for &byte in data {
        consumed += 1;
        val = (val << 7) | ((byte & 0x7F) as u32);
        if byte & 0x80 != 0 {
            break;
        }
    }

    (val, consumed)
}

/// Decode a variable-width integer that ends at the last byte of `data`,
/// reading towards the front until a byte with the high bit set.
///
/// This is how readers strip trailing entries off a text record. Values
/// below 128 are a single flagged byte in either direction.
pub fn decint_backward(data: &[u8]) -> (u32, usize) {
    let mut val: u32 = 0;
    let mut consumed = 0;

    for &byte in data.iter().rev() {
        val |= ((byte & 0x7F) as u32) << (7 * consumed);
        consumed += 1;
        if byte & 0x80 != 0 || consumed == 5 {
            break;
        }
    }

    (val, consumed)
}
