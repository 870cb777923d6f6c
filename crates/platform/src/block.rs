//! Block device abstraction
//!
//! A block device serves fixed-size sectors by index. The SD driver is the
//! production implementation; the flat file layer in
//! [`storage_block`](crate::storage_block) sits on top of it.

/// Size of one addressable sector in bytes.
pub const BLOCK_SIZE: usize = 512;

/// Read-only, sector-addressed storage.
pub trait BlockDevice {
    /// Error type
    type Error: core::fmt::Debug;

    /// Read sector `index` into `buf`.
    fn read_block(&mut self, index: u32, buf: &mut [u8; BLOCK_SIZE]) -> Result<(), Self::Error>;
}

impl<T: BlockDevice + ?Sized> BlockDevice for &mut T {
    type Error = T::Error;

    fn read_block(&mut self, index: u32, buf: &mut [u8; BLOCK_SIZE]) -> Result<(), Self::Error> {
        T::read_block(self, index, buf)
    }
}
