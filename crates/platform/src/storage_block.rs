//! Flat read-only file over a contiguous sector range.
//!
//! This is the thin file layer the boot stage uses when the article index
//! lives at a known sector offset on the card: no directories, no FAT, just
//! `len` bytes starting at sector `first_block`. One sector is cached so
//! that sequential small reads do not re-fetch the same block.

use crate::block::{BlockDevice, BLOCK_SIZE};
use crate::storage::File;

/// Error type for [`BlockFile`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BlockFileError<E> {
    /// The underlying block device failed.
    Device(E),
    /// The requested position maps past the last addressable sector.
    OutOfRange,
}

impl<E: core::fmt::Debug> core::fmt::Display for BlockFileError<E> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Device(e) => write!(f, "block device error: {e:?}"),
            Self::OutOfRange => f.write_str("position outside addressable sectors"),
        }
    }
}

/// A `len`-byte file stored in consecutive sectors of a [`BlockDevice`].
pub struct BlockFile<D> {
    device: D,
    first_block: u32,
    len: u64,
    pos: u64,
    cache: [u8; BLOCK_SIZE],
    cached_block: Option<u32>,
}

impl<D: BlockDevice> BlockFile<D> {
    /// Expose `len` bytes starting at sector `first_block` of `device`.
    pub fn new(device: D, first_block: u32, len: u64) -> Self {
        Self {
            device,
            first_block,
            len,
            pos: 0,
            cache: [0; BLOCK_SIZE],
            cached_block: None,
        }
    }

    /// Give back the block device.
    pub fn release(self) -> D {
        self.device
    }

    fn load(&mut self, block: u32) -> Result<(), BlockFileError<D::Error>> {
        if self.cached_block == Some(block) {
            return Ok(());
        }
        // Invalidate first: a failed read must not leave a stale tag behind.
        self.cached_block = None;
        self.device
            .read_block(block, &mut self.cache)
            .map_err(BlockFileError::Device)?;
        self.cached_block = Some(block);
        Ok(())
    }
}

impl<D: BlockDevice> File for BlockFile<D> {
    type Error = BlockFileError<D::Error>;

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        const BLOCK: u64 = BLOCK_SIZE as u64;
        let mut done = 0usize;
        while done < buf.len() && self.pos < self.len {
            let relative = u32::try_from(self.pos / BLOCK).map_err(|_| BlockFileError::OutOfRange)?;
            let block = self
                .first_block
                .checked_add(relative)
                .ok_or(BlockFileError::OutOfRange)?;
            self.load(block)?;

            // pos % 512 < 512, always fits in usize.
            #[allow(clippy::cast_possible_truncation)]
            let within = (self.pos % BLOCK) as usize;
            let left_in_file = usize::try_from(self.len.saturating_sub(self.pos)).unwrap_or(usize::MAX);
            let n = BLOCK_SIZE
                .saturating_sub(within)
                .min(buf.len().saturating_sub(done))
                .min(left_in_file);

            let src = self
                .cache
                .get(within..within.saturating_add(n))
                .ok_or(BlockFileError::OutOfRange)?;
            let dst = buf
                .get_mut(done..done.saturating_add(n))
                .ok_or(BlockFileError::OutOfRange)?;
            dst.copy_from_slice(src);

            done = done.saturating_add(n);
            self.pos = self.pos.saturating_add(n as u64);
        }
        Ok(done)
    }

    fn seek(&mut self, pos: u64) -> Result<u64, Self::Error> {
        self.pos = pos;
        Ok(pos)
    }

    fn size(&self) -> u64 {
        self.len
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::indexing_slicing,
    clippy::cast_possible_truncation,
    clippy::arithmetic_side_effects
)]
mod tests {
    use super::*;

    /// In-memory disk that counts how often each sector is fetched.
    struct RamDisk {
        data: Vec<u8>,
        reads: usize,
    }

    impl RamDisk {
        fn patterned(blocks: usize) -> Self {
            let data = (0..blocks * BLOCK_SIZE).map(|i| (i % 251) as u8).collect();
            Self { data, reads: 0 }
        }
    }

    impl BlockDevice for RamDisk {
        type Error = ();

        fn read_block(&mut self, index: u32, buf: &mut [u8; BLOCK_SIZE]) -> Result<(), ()> {
            let start = index as usize * BLOCK_SIZE;
            let src = self.data.get(start..start + BLOCK_SIZE).ok_or(())?;
            buf.copy_from_slice(src);
            self.reads += 1;
            Ok(())
        }
    }

    #[test]
    fn read_spans_sector_boundary() {
        let mut disk = RamDisk::patterned(4);
        let expected = disk.data[BLOCK_SIZE + 500..BLOCK_SIZE + 530].to_vec();
        let mut file = BlockFile::new(&mut disk, 1, 2 * BLOCK_SIZE as u64);
        file.seek(500).unwrap();
        let mut buf = [0u8; 30];
        assert_eq!(file.read(&mut buf).unwrap(), 30);
        assert_eq!(&buf[..], &expected[..]);
    }

    #[test]
    fn read_stops_at_file_end() {
        let mut disk = RamDisk::patterned(2);
        let mut file = BlockFile::new(&mut disk, 0, 100);
        file.seek(90).unwrap();
        let mut buf = [0u8; 32];
        assert_eq!(file.read(&mut buf).unwrap(), 10);
        assert_eq!(file.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn sequential_reads_reuse_cached_sector() {
        let mut disk = RamDisk::patterned(1);
        {
            let mut file = BlockFile::new(&mut disk, 0, BLOCK_SIZE as u64);
            let mut buf = [0u8; 16];
            for _ in 0..8 {
                file.read(&mut buf).unwrap();
            }
        }
        assert_eq!(disk.reads, 1);
    }

    #[test]
    fn device_error_is_reported() {
        let mut disk = RamDisk::patterned(1);
        // Region claims two sectors but the disk only has one.
        let mut file = BlockFile::new(&mut disk, 0, 2 * BLOCK_SIZE as u64);
        file.seek(BLOCK_SIZE as u64).unwrap();
        let mut buf = [0u8; 4];
        assert_eq!(file.read(&mut buf), Err(BlockFileError::Device(())));
    }

    #[test]
    fn size_reports_region_length() {
        let disk = RamDisk::patterned(1);
        let file = BlockFile::new(disk, 0, 123);
        assert_eq!(file.size(), 123);
    }
}
