//! 8-bit additive checksums, as used by every ACPI table.

#[must_use]
/// Sums all bytes with 8-bit wraparound.
pub fn sum8(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0, |sum, &byte| sum.wrapping_add(byte))
}

#[must_use]
#[inline]
/// Returns the two's complement of [`sum8`].
///
/// Appending the result to `bytes` (or storing it in a zeroed checksum field
/// inside `bytes`) makes the whole buffer sum to zero.
pub fn checksum8(bytes: &[u8]) -> u8 {
    sum8(bytes).wrapping_neg()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sum8_wraps() {
        assert_eq!(sum8(&[]), 0);
        assert_eq!(sum8(&[1, 2, 3]), 6);
        assert_eq!(sum8(&[0xFF, 0x02]), 0x01);
        assert_eq!(sum8(&[0x80; 4]), 0);
    }

    #[test]
    fn test_checksum8_zeroes_sum() {
        let samples: [&[u8]; 5] = [
            &[],
            &[0],
            &[0x12, 0x34, 0x56],
            b"NFIT",
            &[0xFF; 255],
        ];

        for bytes in samples {
            let checksum = checksum8(bytes);
            assert_eq!(sum8(bytes).wrapping_add(checksum), 0);
        }
    }

    #[test]
    fn test_checksum8_of_zero_sum() {
        assert_eq!(checksum8(&[0x80, 0x80]), 0);
        assert_eq!(checksum8(&[0x01]), 0xFF);
    }
}
