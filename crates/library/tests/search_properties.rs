//! Property tests: the paginated reader against a plain in-memory model.

#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::arithmetic_side_effects,
    clippy::cast_possible_truncation,
    clippy::indexing_slicing
)]

use library::{keys_match, IndexReader, IndexWriter};
use platform::{BlockDevice, BlockFile, BLOCK_SIZE};
use proptest::prelude::*;

struct Image(Vec<u8>);

impl BlockDevice for Image {
    type Error = ();

    fn read_block(&mut self, index: u32, buf: &mut [u8; BLOCK_SIZE]) -> Result<(), ()> {
        let start = index as usize * BLOCK_SIZE;
        let src = self.0.get(start..start + BLOCK_SIZE).ok_or(())?;
        buf.copy_from_slice(src);
        Ok(())
    }
}

/// One generated entry: key plus whether a page break precedes it.
fn entries() -> impl Strategy<Value = Vec<(Vec<u8>, bool)>> {
    prop::collection::vec(
        (prop::collection::vec(prop::sample::select(b"abcABC".to_vec()), 1..12), prop::bool::weighted(0.2)),
        0..80,
    )
}

fn reader_for(entries: &[(Vec<u8>, bool)]) -> IndexReader<BlockFile<Image>> {
    let mut w = IndexWriter::new();
    for (i, (key, page_break)) in entries.iter().enumerate() {
        if *page_break {
            w.end_page();
        }
        w.add_entry(key, i as u32).unwrap();
    }
    let mut bytes = w.into_bytes().unwrap();
    let len = bytes.len() as u64;
    bytes.resize(bytes.len().div_ceil(BLOCK_SIZE) * BLOCK_SIZE, 0);
    IndexReader::from_file(BlockFile::new(Image(bytes), 0, len)).unwrap()
}

proptest! {
    #[test]
    fn iteration_yields_every_entry_in_order(entries in entries()) {
        let mut reader = reader_for(&entries);
        let mut seen = Vec::new();
        while let Some(e) = reader.next_entry().unwrap() {
            seen.push((e.key().to_vec(), e.data_offset()));
        }
        let expected: Vec<_> = entries
            .iter()
            .enumerate()
            .map(|(i, (k, _))| (k.clone(), i as u32))
            .collect();
        prop_assert_eq!(seen, expected);
    }

    #[test]
    fn find_returns_first_model_match(
        entries in entries(),
        query in prop::collection::vec(prop::sample::select(b"abcABC".to_vec()), 1..6),
    ) {
        let mut reader = reader_for(&entries);
        let expected = entries.iter().position(|(k, _)| keys_match(k, &query));
        let found = reader.find(&query).unwrap().map(|e| e.data_offset() as usize);
        prop_assert_eq!(found, expected);
    }

    #[test]
    fn next_after_find_continues_with_following_entry(
        entries in entries(),
        pick in any::<prop::sample::Index>(),
    ) {
        prop_assume!(!entries.is_empty());
        let i = pick.index(entries.len());
        let query = entries[i].0.clone();
        let mut reader = reader_for(&entries);
        let hit = reader.find(&query).unwrap().map(|e| e.data_offset() as usize).unwrap();
        let following = reader.next_entry().unwrap().map(|e| e.data_offset() as usize);
        prop_assert_eq!(following, if hit + 1 < entries.len() { Some(hit + 1) } else { None });
    }
}
