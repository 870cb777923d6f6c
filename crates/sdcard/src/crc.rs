//! CRC7 for SD command frames.
//!
//! Polynomial x^7 + x^3 + 1, initial value 0, MSB first. The card only
//! enforces it for CMD0 and CMD8 in SPI mode, but every frame carries it.

/// Compute the 7-bit CRC of `data`. The result is in the low 7 bits.
#[must_use]
// SAFETY: shifts are by the constant 1 on u8, which cannot overflow the shift amount.
#[allow(clippy::arithmetic_side_effects)]
pub fn crc7(data: &[u8]) -> u8 {
    let mut crc = 0u8;
    for &byte in data {
        let mut b = byte;
        for _ in 0..8 {
            crc <<= 1;
            if (b ^ crc) & 0x80 != 0 {
                crc ^= 0x09;
            }
            b <<= 1;
        }
    }
    crc & 0x7F
}

/// The byte transmitted after the five command bytes: CRC7 shifted up
/// with the end bit set.
#[must_use]
// SAFETY: crc7() is at most 0x7F, so the shift never drops a set bit.
#[allow(clippy::arithmetic_side_effects)]
pub fn crc7_byte(data: &[u8]) -> u8 {
    (crc7(data) << 1) | 0x01
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn known_command_checksums() {
        // Values every SPI-mode SD driver hardcodes.
        assert_eq!(crc7_byte(&[0x40, 0, 0, 0, 0]), 0x95); // CMD0
        assert_eq!(crc7_byte(&[0x48, 0, 0, 0x01, 0xAA]), 0x87); // CMD8
        assert_eq!(crc7_byte(&[0x77, 0, 0, 0, 0]), 0x65); // CMD55
        assert_eq!(crc7_byte(&[0x69, 0x40, 0, 0, 0]), 0x77); // ACMD41 HCS
        assert_eq!(crc7_byte(&[0x7A, 0, 0, 0, 0]), 0xFD); // CMD58
    }

    #[test]
    fn empty_input_is_zero() {
        assert_eq!(crc7(&[]), 0);
        assert_eq!(crc7_byte(&[]), 0x01);
    }

    proptest! {
        #[test]
        fn transmitted_byte_has_end_bit(prefix in proptest::array::uniform5(any::<u8>())) {
            prop_assert_eq!(crc7_byte(&prefix) & 0x01, 0x01);
        }

        #[test]
        fn crc_is_deterministic_and_seven_bit(prefix in proptest::array::uniform5(any::<u8>())) {
            let a = crc7(&prefix);
            let b = crc7(&prefix);
            prop_assert_eq!(a, b);
            prop_assert!(a <= 0x7F);
        }
    }
}
