//! Property-based tests for the sector-backed file layer.
//! Any seek/read sequence must return exactly the bytes of the region.

#![allow(
    clippy::unwrap_used,
    clippy::indexing_slicing,
    clippy::arithmetic_side_effects,
    clippy::cast_possible_truncation
)]

use platform::{BlockDevice, BlockFile, File, BLOCK_SIZE};
use proptest::prelude::*;

struct Disk(Vec<u8>);

impl BlockDevice for Disk {
    type Error = ();

    fn read_block(&mut self, index: u32, buf: &mut [u8; BLOCK_SIZE]) -> Result<(), ()> {
        let start = index as usize * BLOCK_SIZE;
        buf.copy_from_slice(self.0.get(start..start + BLOCK_SIZE).ok_or(())?);
        Ok(())
    }
}

fn disk(blocks: usize) -> Disk {
    Disk((0..blocks * BLOCK_SIZE).map(|i| (i * 7 % 253) as u8).collect())
}

proptest! {
    /// A read at any position returns the region's bytes, cut at its end.
    #[test]
    fn read_matches_region(
        first in 0u32..4,
        len in 0u64..2048,
        pos in 0u64..2200,
        want in 0usize..700,
    ) {
        let mut dev = disk(8);
        let base = first as usize * BLOCK_SIZE;
        let region = dev.0[base..base + len as usize].to_vec();

        let mut file = BlockFile::new(&mut dev, first, len);
        file.seek(pos).unwrap();
        let mut buf = vec![0u8; want];
        let n = file.read(&mut buf).unwrap();

        let start = (pos as usize).min(region.len());
        let expected = &region[start..(start + want).min(region.len())];
        prop_assert_eq!(&buf[..n], expected);
    }

    /// Reading a region in chunks of any size reproduces it in full.
    #[test]
    fn chunked_reads_reassemble_region(len in 1u64..2048, chunk in 1usize..600) {
        let mut dev = disk(4);
        let region = dev.0[..len as usize].to_vec();
        let mut file = BlockFile::new(&mut dev, 0, len);

        let mut out = Vec::new();
        let mut buf = vec![0u8; chunk];
        loop {
            let n = file.read(&mut buf).unwrap();
            if n == 0 {
                break;
            }
            out.extend_from_slice(&buf[..n]);
        }
        prop_assert_eq!(out, region);
    }
}
