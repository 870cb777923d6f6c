//! Card-specific data (CSD) register.
//!
//! The 16 bytes are kept opaque: capacity and timing fields are not decoded.
//! The block is retained for diagnostics and dumped as hex on every read.

use embedded_hal::delay::DelayNs;
use platform::ByteBus;

use crate::command::Command;
use crate::driver::SdCard;
use crate::error::SdError;

/// Size of the CSD register.
pub const DESCRIPTOR_LEN: usize = 16;

/// Raw CSD register contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CardDescriptor([u8; DESCRIPTOR_LEN]);

impl CardDescriptor {
    /// Wrap raw register bytes.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; DESCRIPTOR_LEN]) -> Self {
        Self(bytes)
    }

    /// The register bytes as read from the card.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; DESCRIPTOR_LEN] {
        &self.0
    }
}

/// Space-separated two-digit hex, e.g. `00 26 00 32 ...`.
impl core::fmt::Display for CardDescriptor {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let mut bytes = self.0.iter();
        if let Some(first) = bytes.next() {
            write!(f, "{first:02x}")?;
        }
        for b in bytes {
            write!(f, " {b:02x}")?;
        }
        Ok(())
    }
}

impl<B: ByteBus, D: DelayNs> SdCard<B, D> {
    /// Read the CSD register and keep it on the driver.
    ///
    /// Uses the same token handshake as a sector read. On timeout the
    /// previously stored descriptor is left as it was.
    pub fn read_descriptor(&mut self) -> Result<&CardDescriptor, SdError<B::Error>> {
        self.send_command(Command::SendCsd, 0)?;
        if !self.await_data_token()? {
            warn!("CSD read timeout");
            return Err(SdError::ReadTimeout);
        }
        let mut raw = [0u8; DESCRIPTOR_LEN];
        self.receive_block(&mut raw)?;

        let csd = CardDescriptor(raw);
        debug!("CSD: {}", csd);
        Ok(&*self.descriptor.insert(csd))
    }

    /// The CSD from the last successful [`SdCard::read_descriptor`].
    pub fn descriptor(&self) -> Option<&CardDescriptor> {
        self.descriptor.as_ref()
    }
}
