//! Byte-serial bus abstraction
//!
//! The SD card is driven over a slow byte-serial link. Everything the
//! command driver needs from the hardware is a blocking one-byte exchange
//! plus control of the card's chip-select line.

/// Blocking single-byte exchange with chip-select control.
///
/// Implementations are synchronous: [`exchange`](ByteBus::exchange) returns
/// only once the byte has been clocked out and the answer clocked in.
pub trait ByteBus {
    /// Error type
    type Error: core::fmt::Debug;

    /// Clock `byte` out and return the byte received at the same time.
    fn exchange(&mut self, byte: u8) -> Result<u8, Self::Error>;

    /// Assert chip select (card listens).
    fn select(&mut self) -> Result<(), Self::Error>;

    /// Release chip select.
    fn deselect(&mut self) -> Result<(), Self::Error>;
}

impl<T: ByteBus + ?Sized> ByteBus for &mut T {
    type Error = T::Error;

    fn exchange(&mut self, byte: u8) -> Result<u8, Self::Error> {
        T::exchange(self, byte)
    }

    fn select(&mut self) -> Result<(), Self::Error> {
        T::select(self)
    }

    fn deselect(&mut self) -> Result<(), Self::Error> {
        T::deselect(self)
    }
}
