//! Inverted modulo-256 checksum used by Sphero-style framing.

/// Returns the bitwise inverse of the byte sum modulo 256.
///
/// ```rust
/// use robo_core::protocol::checksum::inverted_sum;
///
/// assert_eq!(inverted_sum(&[0x00, 0x01, 0x01]), 0xFD);
/// ```
pub fn inverted_sum(bytes: &[u8]) -> u8 {
    !bytes.iter().fold(0u8, |acc, b| acc.wrapping_add(*b))
}

/// Returns `true` when `expected` matches the inverted sum of `bytes`.
pub fn verify(bytes: &[u8], expected: u8) -> bool {
    inverted_sum(bytes) == expected
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_input_yields_all_ones() {
        assert_eq!(inverted_sum(&[]), 0xFF);
    }

    #[test]
    fn test_sum_wraps_modulo_256() {
        // 0x80 + 0x80 + 0x05 = 0x105 -> 0x05 -> !0x05 = 0xFA
        assert_eq!(inverted_sum(&[0x80, 0x80, 0x05]), 0xFA);
    }

    #[test]
    fn test_verify_rejects_off_by_one() {
        let data = [0x00, 0x11, 0x05, 0x01];
        let chk = inverted_sum(&data);
        assert!(verify(&data, chk));
        assert!(!verify(&data, chk.wrapping_add(1)));
    }
}
