//! Real-bus [`ByteBus`] backend over `embedded-hal` 1.0.
//!
//! Wraps a blocking [`SpiBus`] (the raw bus, *not* an `SpiDevice`: the SD
//! protocol toggles chip select between single bytes, which a device-level
//! transaction cannot express) and a GPIO [`OutputPin`] wired to the card's
//! CS line. CS is active-low.
//!
//! # Wiring
//!
//! | Signal | Direction     | Notes                         |
//! |--------|---------------|-------------------------------|
//! | SCK    | Host → Card   | SPI mode 0                    |
//! | MOSI   | Host → Card   | idles high (0xFF filler)      |
//! | MISO   | Card → Host   | pull-up recommended           |
//! | CS     | Host → Card   | GPIO, driven by this backend  |

use embedded_hal::digital::OutputPin;
use embedded_hal::spi::SpiBus;

use crate::bus::ByteBus;

/// Error from [`SpiByteBus`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SpiBusError<S, P> {
    /// The SPI peripheral reported an error during a transfer.
    Spi(S),
    /// The chip-select pin could not be driven.
    Pin(P),
}

impl<S: core::fmt::Debug, P: core::fmt::Debug> core::fmt::Display for SpiBusError<S, P> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Spi(e) => write!(f, "SPI transfer failed: {e:?}"),
            Self::Pin(e) => write!(f, "chip-select pin failed: {e:?}"),
        }
    }
}

/// [`ByteBus`] implementation over an SPI bus and a chip-select pin.
pub struct SpiByteBus<SPI, CS> {
    spi: SPI,
    cs: CS,
}

impl<SPI, CS> SpiByteBus<SPI, CS>
where
    SPI: SpiBus<u8>,
    CS: OutputPin,
{
    /// Create a new bus from an already-configured SPI bus and CS pin.
    ///
    /// The SPI bus must be in mode 0, MSB first. The pins are not touched
    /// until the first call.
    pub fn new(spi: SPI, cs: CS) -> Self {
        Self { spi, cs }
    }

    /// Give back the SPI bus and the CS pin.
    pub fn release(self) -> (SPI, CS) {
        (self.spi, self.cs)
    }
}

impl<SPI, CS> ByteBus for SpiByteBus<SPI, CS>
where
    SPI: SpiBus<u8>,
    CS: OutputPin,
{
    type Error = SpiBusError<SPI::Error, CS::Error>;

    fn exchange(&mut self, byte: u8) -> Result<u8, Self::Error> {
        let mut frame = [byte];
        self.spi
            .transfer_in_place(&mut frame)
            .map_err(SpiBusError::Spi)?;
        let [answer] = frame;
        Ok(answer)
    }

    fn select(&mut self) -> Result<(), Self::Error> {
        self.cs.set_low().map_err(SpiBusError::Pin)
    }

    fn deselect(&mut self) -> Result<(), Self::Error> {
        self.cs.set_high().map_err(SpiBusError::Pin)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use embedded_hal_mock::eh1::digital::{
        Mock as PinMock, State as PinState, Transaction as PinTransaction,
    };
    use embedded_hal_mock::eh1::spi::{Mock as SpiMock, Transaction as SpiTransaction};

    #[test]
    fn exchange_returns_byte_clocked_in() {
        let mut spi = SpiMock::new(&[SpiTransaction::transfer_in_place(vec![0x40], vec![0xFF])]);
        let mut cs = PinMock::new(&[]);
        let mut bus = SpiByteBus::new(spi.clone(), cs.clone());

        assert_eq!(bus.exchange(0x40).unwrap(), 0xFF);

        spi.done();
        cs.done();
    }

    #[test]
    fn select_drives_cs_low_and_deselect_drives_high() {
        let mut spi = SpiMock::new(&[SpiTransaction::transfer_in_place(vec![0xFF], vec![0x01])]);
        let mut cs = PinMock::new(&[
            PinTransaction::set(PinState::Low),
            PinTransaction::set(PinState::High),
        ]);
        let mut bus = SpiByteBus::new(spi.clone(), cs.clone());

        bus.select().unwrap();
        assert_eq!(bus.exchange(0xFF).unwrap(), 0x01);
        bus.deselect().unwrap();

        spi.done();
        cs.done();
    }

    #[test]
    fn release_returns_parts() {
        let spi = SpiMock::new(&[]);
        let cs = PinMock::new(&[]);
        let bus = SpiByteBus::new(spi, cs);
        let (mut spi, mut cs) = bus.release();
        spi.done();
        cs.done();
    }
}
