//! SD driver error type.

/// Errors from [`crate::SdCard`]. `E` is the bus error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SdError<E> {
    /// The byte bus failed.
    Bus(E),
    /// CMD0 never got the idle response. Carries the last byte seen.
    IdleTimeout {
        /// Last response byte (0xFF when the card never answered).
        last: u8,
    },
    /// ACMD41 never reported the card ready.
    InitTimeout {
        /// Last response byte.
        last: u8,
    },
    /// Initialisation reached the descriptor read and it failed.
    DescriptorUnreadable,
    /// A read command was answered with a non-zero R1.
    BadResponse(u8),
    /// The data token never arrived.
    ReadTimeout,
    /// Destination buffer is shorter than one block.
    BufferTooSmall {
        /// Length of the buffer that was passed.
        len: usize,
    },
    /// `sector * 512` does not fit a 32-bit byte address.
    AddressOutOfRange {
        /// Requested sector.
        sector: u32,
    },
}

impl<E> From<E> for SdError<E> {
    fn from(e: E) -> Self {
        Self::Bus(e)
    }
}

impl<E: core::fmt::Debug> core::fmt::Display for SdError<E> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Bus(e) => write!(f, "bus error: {e:?}"),
            Self::IdleTimeout { last } => {
                write!(f, "unable to set SD card to IDLE state (last response {last:#04x})")
            }
            Self::InitTimeout { last } => {
                write!(f, "SD card failed to init (last response {last:#04x})")
            }
            Self::DescriptorUnreadable => f.write_str("unable to read CSD"),
            Self::BadResponse(r) => write!(f, "bad card response {r:#04x}"),
            Self::ReadTimeout => f.write_str("read timeout"),
            Self::BufferTooSmall { len } => write!(f, "buffer of {len} bytes is smaller than a sector"),
            Self::AddressOutOfRange { sector } => write!(f, "sector {sector} is beyond byte addressing"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_names_the_failure() {
        let e: SdError<()> = SdError::IdleTimeout { last: 0xFF };
        assert_eq!(e.to_string(), "unable to set SD card to IDLE state (last response 0xff)");
        let e: SdError<()> = SdError::BadResponse(0x20);
        assert_eq!(e.to_string(), "bad card response 0x20");
    }
}
