//! End-to-end tests: IndexWriter → disk → IndexReader<LocalFile>.
//!
//! No mocks. Uses tempfiles, with LocalFileStorage standing in for the card.

#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::indexing_slicing,
    clippy::arithmetic_side_effects,
    clippy::cast_possible_truncation
)]

use library::{IndexReader, IndexWriter, ReaderError};
use platform::config::INDEX_FILE_NAME;
use platform::storage_local::LocalFileStorage;
use platform::{BlockDevice, BlockFile, BLOCK_SIZE};
use tempfile::TempDir;

/// Apple and Banana on the first index page, Cherry on the second.
fn write_fruit_index(root: &std::path::Path) {
    let mut w = IndexWriter::new();
    w.add_article("Apple", b"A pome fruit.").expect("add");
    w.add_article("Banana", b"A berry, botanically.").expect("add");
    w.end_page();
    w.add_article("Cherry", b"A drupe.").expect("add");
    w.finish(&root.join(INDEX_FILE_NAME)).expect("finish");
}

fn open_fruit() -> (TempDir, IndexReader<platform::storage_local::LocalFile>) {
    let tmp = TempDir::new().expect("tempdir");
    write_fruit_index(tmp.path());
    let mut storage = LocalFileStorage::new(tmp.path().to_str().expect("utf-8 path"));
    let reader = IndexReader::open(&mut storage, INDEX_FILE_NAME).expect("open");
    (tmp, reader)
}

fn key(entry: Option<library::IndexEntry<'_>>) -> Option<String> {
    entry.map(|e| e.key_str().expect("utf-8 key").to_owned())
}

#[test]
fn e2e_find_ignores_case() {
    let (_tmp, mut reader) = open_fruit();
    assert_eq!(key(reader.find(b"banana").expect("find")), Some("Banana".into()));
}

#[test]
fn e2e_missing_key_scans_every_page() {
    let (_tmp, mut reader) = open_fruit();
    assert_eq!(key(reader.find(b"Durian").expect("find")), None);
}

#[test]
fn e2e_next_after_find_walks_pages() {
    let (_tmp, mut reader) = open_fruit();
    assert_eq!(key(reader.find(b"Apple").expect("find")), Some("Apple".into()));
    assert_eq!(key(reader.next_entry().expect("next")), Some("Banana".into()));
    assert_eq!(key(reader.next_entry().expect("next")), Some("Cherry".into()));
    assert_eq!(key(reader.next_entry().expect("next")), None);
}

#[test]
fn e2e_sentinel_first_page_is_skipped() {
    let tmp = TempDir::new().expect("tempdir");
    let mut w = IndexWriter::new();
    w.add_article("Alpha", b"").expect("add");
    w.end_page();
    // Page whose first entry is the sentinel.
    w.end_page();
    w.add_article("Omega", b"").expect("add");
    w.finish(&tmp.path().join(INDEX_FILE_NAME)).expect("finish");

    let mut storage = LocalFileStorage::new(tmp.path().to_str().expect("utf-8 path"));
    let mut reader = IndexReader::open(&mut storage, INDEX_FILE_NAME).expect("open");
    assert_eq!(reader.header().index_num_pages, 3);
    assert_eq!(key(reader.next_entry().expect("next")), Some("Alpha".into()));
    assert_eq!(key(reader.next_entry().expect("next")), Some("Omega".into()));
    assert_eq!(key(reader.next_entry().expect("next")), None);
}

#[test]
fn e2e_article_body_round_trip() {
    let (_tmp, mut reader) = open_fruit();
    let offset = reader
        .find(b"cherry")
        .expect("find")
        .expect("present")
        .data_offset();
    let mut body = [0u8; 64];
    let len = reader.read_article(offset, &mut body).expect("article");
    assert_eq!(body.get(..len), Some(&b"A drupe."[..]));
}

#[test]
fn e2e_checksum_matches_after_write() {
    let (_tmp, mut reader) = open_fruit();
    assert!(reader.verify_checksum().expect("checksum"));
    assert_eq!(reader.header().entry_count, 3);
    reader.close().expect("close");
}

#[test]
fn e2e_missing_file_is_open_error() {
    let tmp = TempDir::new().expect("tempdir");
    let mut storage = LocalFileStorage::new(tmp.path().to_str().expect("utf-8 path"));
    let err = IndexReader::open(&mut storage, INDEX_FILE_NAME).err().expect("must fail");
    assert!(matches!(err, ReaderError::Open(_)));
}

#[test]
fn e2e_truncated_header_is_short_header() {
    let tmp = TempDir::new().expect("tempdir");
    std::fs::write(tmp.path().join(INDEX_FILE_NAME), b"WOM1\x01\x00").expect("write");
    let mut storage = LocalFileStorage::new(tmp.path().to_str().expect("utf-8 path"));
    let err = IndexReader::open(&mut storage, INDEX_FILE_NAME).err().expect("must fail");
    assert!(matches!(err, ReaderError::ShortHeader));
}

/// Sector-addressed image of an index file, as it sits on the card.
struct Image(Vec<u8>);

impl BlockDevice for Image {
    type Error = ();

    fn read_block(&mut self, index: u32, buf: &mut [u8; BLOCK_SIZE]) -> Result<(), ()> {
        let start = usize::try_from(index).map_err(|_| ())?.checked_mul(BLOCK_SIZE).ok_or(())?;
        let src = self.0.get(start..start.checked_add(BLOCK_SIZE).ok_or(())?).ok_or(())?;
        buf.copy_from_slice(src);
        Ok(())
    }
}

#[test]
fn e2e_reader_over_block_file() {
    let mut w = IndexWriter::new();
    w.add_article("Apple", b"x").expect("add");
    w.add_article("Banana", b"y").expect("add");
    w.end_page();
    w.add_article("Cherry", b"z").expect("add");
    let bytes = w.into_bytes().expect("bytes");
    let len = bytes.len() as u64;

    // The file starts at sector 4 of the device.
    let mut disk = vec![0u8; 4 * BLOCK_SIZE];
    disk.extend_from_slice(&bytes);
    disk.resize(disk.len().div_ceil(BLOCK_SIZE) * BLOCK_SIZE, 0);

    let file = BlockFile::new(Image(disk), 4, len);
    let mut reader = IndexReader::from_file(file).expect("open");
    assert_eq!(key(reader.find(b"CHERRY").expect("find")), Some("Cherry".into()));
    assert!(reader.verify_checksum().expect("checksum"));
}
