//! `IndexReader`: paginated reader for the WOM article index.
//!
//! Parameterised over any [`platform::File`]: a `LocalFile` in the
//! simulator and tooling, a `BlockFile` over the SD card on hardware.
//!
//! The reader owns one page buffer and a cursor (page number plus byte
//! offset of the next entry). Every search or iteration step moves the
//! cursor; entries it returns borrow the page buffer.
//!
//! # Access patterns
//!
//! | Method | Cost | Notes |
//! |--------|------|-------|
//! | `find(key)` | one page read per index page until the match | linear scan, first match wins |
//! | `next_entry()` | at most one page read per empty page crossed | continues from the cursor |
//! | `verify_checksum()` | one read per index page | leaves the cursor alone |
//!
//! Keys are not assumed to be sorted: `find` always scans from the first
//! index page.

use platform::storage::{File, Storage};

use crate::entry::{keys_match, IndexEntry};
use crate::format::{
    page_offset, EntryHeader, FileHeader, FormatError, ARTICLE_HEADER_LEN, ENTRY_HEADER_LEN,
    PAGE_SIZE,
};

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Error from `IndexReader` operations.
///
/// "Not found" and "no more entries" are `Ok(None)`, not errors.
#[derive(Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ReaderError<E: core::fmt::Debug> {
    /// The index file could not be opened.
    Open(E),
    /// The file ended before a complete header was read.
    ShortHeader,
    /// I/O error from the file layer.
    Storage(E),
    /// An index page could not be read in full.
    ShortRead {
        /// Page that came back short.
        page: u32,
    },
    /// Structural problem in the file.
    Format(FormatError),
}

impl<E: core::fmt::Debug> From<FormatError> for ReaderError<E> {
    fn from(e: FormatError) -> Self {
        Self::Format(e)
    }
}

impl<E: core::fmt::Debug> core::fmt::Display for ReaderError<E> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Open(e) => write!(f, "open error: {e:?}"),
            Self::ShortHeader => f.write_str("short header read"),
            Self::Storage(e) => write!(f, "I/O error: {e:?}"),
            Self::ShortRead { page } => write!(f, "I/O error: short read of page {page}"),
            Self::Format(e) => write!(f, "{e}"),
        }
    }
}

#[cfg(any(test, feature = "std"))]
impl<E: core::fmt::Debug> std::error::Error for ReaderError<E> {}

// ---------------------------------------------------------------------------
// Cursor
// ---------------------------------------------------------------------------

/// Position of the next entry to hand out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Cursor {
    /// Page the buffer holds (when `loaded`) or the next page to load.
    page: u32,
    /// Byte offset of the next entry within the buffered page.
    offset: usize,
    loaded: bool,
}

impl Cursor {
    const fn at(page: u32) -> Self {
        Self {
            page,
            offset: 0,
            loaded: false,
        }
    }
}

/// Location of one parsed entry inside the page buffer.
#[derive(Debug, Clone, Copy)]
struct Span {
    data_offset: u32,
    key_start: usize,
    key_end: usize,
}

// ---------------------------------------------------------------------------
// IndexReader
// ---------------------------------------------------------------------------

/// Reader over one open index file.
pub struct IndexReader<F: File> {
    file: F,
    header: FileHeader,
    page: [u8; PAGE_SIZE],
    cursor: Cursor,
}

impl<F: File> IndexReader<F> {
    /// Open `name` on `storage` and read its header.
    ///
    /// The constraint `S::File: File<Error = S::Error>` lets open and read
    /// failures share one error type, as all storage backends do.
    ///
    /// # Errors
    ///
    /// `ReaderError::Open` if the file cannot be opened, otherwise as
    /// [`IndexReader::from_file`].
    pub fn open<S>(storage: &mut S, name: &str) -> Result<Self, ReaderError<F::Error>>
    where
        S: Storage<File = F, Error = F::Error>,
    {
        let file = storage.open_file(name).map_err(ReaderError::Open)?;
        debug!("index: opened {}", name);
        Self::from_file(file)
    }

    /// Take an already open file and read its header.
    ///
    /// # Errors
    ///
    /// `ReaderError::ShortHeader` if fewer than 32 bytes could be read,
    /// `ReaderError::Format` for a bad magic, an unknown version, or index
    /// pages that lie beyond the end of the file.
    pub fn from_file(mut file: F) -> Result<Self, ReaderError<F::Error>> {
        file.seek(0).map_err(ReaderError::Storage)?;
        let mut buf = [0u8; FileHeader::SIZE];
        let n = file.read(&mut buf).map_err(ReaderError::Storage)?;
        if n != FileHeader::SIZE {
            warn!("index: header read returned {} bytes", n);
            return Err(ReaderError::ShortHeader);
        }
        let header = FileHeader::decode(&buf)?;

        let (start, len) = header.index_region().ok_or(FormatError::RegionOutsideFile)?;
        let end = start.checked_add(len).ok_or(FormatError::RegionOutsideFile)?;
        if header.index_end_page().is_none() || end > file.size() {
            return Err(FormatError::RegionOutsideFile.into());
        }
        debug!(
            "index: {} pages from page {}, {} entries",
            header.index_num_pages, header.index_first_page, header.entry_count
        );

        Ok(Self {
            file,
            header,
            page: [0; PAGE_SIZE],
            cursor: Cursor::at(header.index_first_page),
        })
    }

    /// The decoded file header.
    #[must_use]
    pub fn header(&self) -> &FileHeader {
        &self.header
    }

    /// Move the cursor back to the first index page.
    pub fn rewind(&mut self) {
        self.cursor = Cursor::at(self.header.index_first_page);
    }

    /// Find the first entry whose key matches `key`.
    ///
    /// Scans every index page in order from the first, comparing with
    /// [`keys_match`]. On a match the cursor is left just past the entry,
    /// so [`IndexReader::next_entry`] continues from there. `Ok(None)` when
    /// no entry matches; the cursor is then exhausted.
    ///
    /// # Errors
    ///
    /// `ReaderError::Storage` / `ReaderError::ShortRead` if a page cannot
    /// be read in full, `ReaderError::Format` for an entry overrunning its
    /// page.
    pub fn find(&mut self, key: &[u8]) -> Result<Option<IndexEntry<'_>>, ReaderError<F::Error>> {
        let first = self.header.index_first_page;
        let end = self.end_page();
        for page in first..end {
            self.load_page(page)?;
            while let Some(span) = self.parse_entry()? {
                self.cursor.offset = span.key_end;
                if keys_match(self.key_bytes(span), key) {
                    trace!("index: match on page {}", page);
                    return Ok(Some(self.view(span)));
                }
            }
        }
        self.cursor = Cursor::at(end);
        Ok(None)
    }

    /// The entry at the cursor, advancing past it.
    ///
    /// Crosses into following pages (skipping empty ones) as needed. On a
    /// freshly opened or rewound reader this starts at the first index
    /// page. `Ok(None)` once the last index page is exhausted.
    ///
    /// # Errors
    ///
    /// As [`IndexReader::find`].
    pub fn next_entry(&mut self) -> Result<Option<IndexEntry<'_>>, ReaderError<F::Error>> {
        let end = self.end_page();
        loop {
            if !self.cursor.loaded {
                if self.cursor.page >= end {
                    return Ok(None);
                }
                self.load_page(self.cursor.page)?;
            }
            if let Some(span) = self.parse_entry()? {
                self.cursor.offset = span.key_end;
                return Ok(Some(self.view(span)));
            }
            self.cursor = Cursor::at(self.cursor.page.saturating_add(1));
        }
    }

    /// Absolute file position of the article record at `data_offset`,
    /// as taken from [`IndexEntry::data_offset`].
    #[must_use]
    pub fn article_position(&self, data_offset: u32) -> Option<u64> {
        self.header.article_position(data_offset)
    }

    /// Copy the body of the article at `data_offset` into `buf`.
    ///
    /// Returns the full body length; only `min(length, buf.len())` bytes are
    /// copied. The cursor is not affected.
    ///
    /// # Errors
    ///
    /// `ReaderError::Format` if the position overflows,
    /// `ReaderError::Storage` on I/O failure, `ReaderError::ShortRead` (with
    /// the article page) if the record is cut off.
    pub fn read_article(&mut self, data_offset: u32, buf: &mut [u8]) -> Result<usize, ReaderError<F::Error>> {
        let pos = self
            .header
            .article_position(data_offset)
            .ok_or(FormatError::RegionOutsideFile)?;
        let page = self.header.articles_first_page;
        self.file.seek(pos).map_err(ReaderError::Storage)?;

        let mut len_bytes = [0u8; ARTICLE_HEADER_LEN];
        let n = self.file.read(&mut len_bytes).map_err(ReaderError::Storage)?;
        if n != ARTICLE_HEADER_LEN {
            return Err(ReaderError::ShortRead { page });
        }
        let len = usize::try_from(u32::from_le_bytes(len_bytes)).unwrap_or(usize::MAX);
        let take = len.min(buf.len());
        let dst = buf.get_mut(..take).ok_or(ReaderError::ShortRead { page })?;
        let n = self.file.read(dst).map_err(ReaderError::Storage)?;
        if n != take {
            return Err(ReaderError::ShortRead { page });
        }
        Ok(len)
    }

    /// Recompute the CRC32 of the index pages and compare with the header.
    ///
    /// Diagnostic only: a mismatch is reported, never repaired. Uses its own
    /// scratch buffer so the cursor and page buffer are untouched.
    ///
    /// # Errors
    ///
    /// `ReaderError::Storage` / `ReaderError::ShortRead` on read failure.
    pub fn verify_checksum(&mut self) -> Result<bool, ReaderError<F::Error>> {
        let mut hasher = crc32fast::Hasher::new();
        let mut scratch = [0u8; PAGE_SIZE];
        for page in self.header.index_first_page..self.end_page() {
            let pos = page_offset(page).ok_or(FormatError::RegionOutsideFile)?;
            self.file.seek(pos).map_err(ReaderError::Storage)?;
            let n = self.file.read(&mut scratch).map_err(ReaderError::Storage)?;
            if n != PAGE_SIZE {
                return Err(ReaderError::ShortRead { page });
            }
            hasher.update(&scratch);
        }
        let actual = hasher.finalize();
        if actual != self.header.index_checksum {
            warn!(
                "index: checksum mismatch, header {:#x} computed {:#x}",
                self.header.index_checksum, actual
            );
        }
        Ok(actual == self.header.index_checksum)
    }

    /// Release the file.
    ///
    /// # Errors
    ///
    /// `ReaderError::Storage` if the file layer reports a close failure.
    pub fn close(self) -> Result<(), ReaderError<F::Error>> {
        self.file.close().map_err(ReaderError::Storage)
    }

    // -- private helpers --

    fn end_page(&self) -> u32 {
        // Checked at open; saturate rather than trust it twice.
        self.header
            .index_first_page
            .saturating_add(self.header.index_num_pages)
    }

    /// Read `page` into the buffer and point the cursor at its start.
    fn load_page(&mut self, page: u32) -> Result<(), ReaderError<F::Error>> {
        self.cursor = Cursor::at(page);
        let pos = page_offset(page).ok_or(FormatError::RegionOutsideFile)?;
        self.file.seek(pos).map_err(ReaderError::Storage)?;
        let n = self.file.read(&mut self.page).map_err(ReaderError::Storage)?;
        if n != PAGE_SIZE {
            warn!("index: page {} read returned {} bytes", page, n);
            return Err(ReaderError::ShortRead { page });
        }
        self.cursor.loaded = true;
        Ok(())
    }

    /// Parse the entry at the cursor without moving it.
    ///
    /// `None` at the end-of-page sentinel or when fewer than six bytes are
    /// left in the page.
    fn parse_entry(&self) -> Result<Option<Span>, FormatError> {
        let at = self.cursor.offset;
        let header_end = at.saturating_add(ENTRY_HEADER_LEN);
        let Some(raw) = self.page.get(at..header_end) else {
            return Ok(None);
        };
        let mut bytes = [0u8; ENTRY_HEADER_LEN];
        bytes.copy_from_slice(raw);
        let entry = EntryHeader::decode(&bytes);
        if entry.is_end() {
            return Ok(None);
        }
        let key_end = header_end.saturating_add(usize::from(entry.key_len));
        if key_end > PAGE_SIZE {
            return Err(FormatError::EntryOverrunsPage {
                page: self.cursor.page,
                offset: u16::try_from(at).unwrap_or(u16::MAX),
            });
        }
        Ok(Some(Span {
            data_offset: entry.data_offset,
            key_start: header_end,
            key_end,
        }))
    }

    fn key_bytes(&self, span: Span) -> &[u8] {
        self.page.get(span.key_start..span.key_end).unwrap_or_default()
    }

    fn view(&self, span: Span) -> IndexEntry<'_> {
        IndexEntry::new(span.data_offset, self.key_bytes(span))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

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
    use crate::writer::IndexWriter;

    /// In-memory file that can be told to return short reads.
    struct MemFile {
        data: Vec<u8>,
        pos: usize,
        short_from: Option<usize>,
    }

    impl MemFile {
        fn new(data: Vec<u8>) -> Self {
            Self {
                data,
                pos: 0,
                short_from: None,
            }
        }
    }

    impl File for MemFile {
        type Error = ();

        fn read(&mut self, buf: &mut [u8]) -> Result<usize, ()> {
            if self.pos >= self.data.len() {
                return Ok(0);
            }
            let mut end = (self.pos + buf.len()).min(self.data.len());
            if let Some(limit) = self.short_from {
                if end > limit {
                    end = limit.max(self.pos);
                }
            }
            let n = end.saturating_sub(self.pos);
            buf[..n].copy_from_slice(&self.data[self.pos..end]);
            self.pos = end;
            Ok(n)
        }

        fn seek(&mut self, pos: u64) -> Result<u64, ()> {
            self.pos = pos as usize;
            Ok(pos)
        }

        fn size(&self) -> u64 {
            self.data.len() as u64
        }
    }

    fn fruit_file() -> Vec<u8> {
        let mut w = IndexWriter::new();
        w.add_article("Apple", b"red or green").unwrap();
        w.add_article("Banana", b"yellow").unwrap();
        w.end_page();
        w.add_article("Cherry", b"dark red").unwrap();
        w.into_bytes().unwrap()
    }

    fn fruit_reader() -> IndexReader<MemFile> {
        IndexReader::from_file(MemFile::new(fruit_file())).unwrap()
    }

    fn key_of(entry: Option<IndexEntry<'_>>) -> Option<Vec<u8>> {
        entry.map(|e| e.key().to_vec())
    }

    #[test]
    fn open_reads_header() {
        let reader = fruit_reader();
        assert_eq!(reader.header().index_first_page, 1);
        assert_eq!(reader.header().index_num_pages, 2);
        assert_eq!(reader.header().entry_count, 3);
    }

    #[test]
    fn find_is_case_insensitive() {
        let mut reader = fruit_reader();
        assert_eq!(key_of(reader.find(b"banana").unwrap()), Some(b"Banana".to_vec()));
    }

    #[test]
    fn find_on_second_page() {
        let mut reader = fruit_reader();
        assert_eq!(key_of(reader.find(b"CHERRY").unwrap()), Some(b"Cherry".to_vec()));
    }

    #[test]
    fn find_missing_is_none_then_next_is_none() {
        let mut reader = fruit_reader();
        assert!(reader.find(b"Durian").unwrap().is_none());
        assert!(reader.next_entry().unwrap().is_none());
    }

    #[test]
    fn next_continues_after_find() {
        let mut reader = fruit_reader();
        assert!(reader.find(b"Apple").unwrap().is_some());
        assert_eq!(key_of(reader.next_entry().unwrap()), Some(b"Banana".to_vec()));
        assert_eq!(key_of(reader.next_entry().unwrap()), Some(b"Cherry".to_vec()));
        assert!(reader.next_entry().unwrap().is_none());
        assert!(reader.next_entry().unwrap().is_none());
    }

    #[test]
    fn fresh_reader_iterates_from_first_page() {
        let mut reader = fruit_reader();
        let mut keys = Vec::new();
        while let Some(e) = reader.next_entry().unwrap() {
            keys.push(e.key().to_vec());
        }
        assert_eq!(keys, vec![b"Apple".to_vec(), b"Banana".to_vec(), b"Cherry".to_vec()]);
    }

    #[test]
    fn rewind_restarts_iteration() {
        let mut reader = fruit_reader();
        reader.find(b"cherry").unwrap();
        reader.rewind();
        assert_eq!(key_of(reader.next_entry().unwrap()), Some(b"Apple".to_vec()));
    }

    #[test]
    fn find_restarts_scan_from_first_page() {
        let mut reader = fruit_reader();
        reader.find(b"cherry").unwrap();
        assert_eq!(key_of(reader.find(b"apple").unwrap()), Some(b"Apple".to_vec()));
    }

    #[test]
    fn first_match_wins_over_duplicates() {
        let mut w = IndexWriter::new();
        w.add_entry(b"Same", 10).unwrap();
        w.end_page();
        w.add_entry(b"same", 20).unwrap();
        let mut reader = IndexReader::from_file(MemFile::new(w.into_bytes().unwrap())).unwrap();
        assert_eq!(reader.find(b"SAME").unwrap().unwrap().data_offset(), 10);
    }

    #[test]
    fn empty_pages_are_skipped() {
        let mut w = IndexWriter::new();
        w.add_entry(b"First", 0).unwrap();
        w.end_page();
        w.end_page();
        w.end_page();
        w.add_entry(b"Last", 4).unwrap();
        let bytes = w.into_bytes().unwrap();
        let mut reader = IndexReader::from_file(MemFile::new(bytes)).unwrap();
        assert_eq!(reader.header().index_num_pages, 4);
        assert_eq!(key_of(reader.find(b"first").unwrap()), Some(b"First".to_vec()));
        assert_eq!(key_of(reader.next_entry().unwrap()), Some(b"Last".to_vec()));
        assert!(reader.next_entry().unwrap().is_none());
    }

    #[test]
    fn short_header_is_reported() {
        let err = IndexReader::from_file(MemFile::new(vec![b'W', b'O', b'M'])).err().unwrap();
        assert!(matches!(err, ReaderError::ShortHeader));
    }

    #[test]
    fn bad_magic_is_a_format_error() {
        let mut bytes = fruit_file();
        bytes[0] = b'Z';
        let err = IndexReader::from_file(MemFile::new(bytes)).err().unwrap();
        assert!(matches!(err, ReaderError::Format(FormatError::BadMagic)));
    }

    #[test]
    fn truncated_region_is_rejected_at_open() {
        let mut bytes = fruit_file();
        bytes.truncate(2 * PAGE_SIZE);
        let err = IndexReader::from_file(MemFile::new(bytes)).err().unwrap();
        assert!(matches!(err, ReaderError::Format(FormatError::RegionOutsideFile)));
    }

    #[test]
    fn short_page_read_fails_search() {
        let mut file = MemFile::new(fruit_file());
        // Page 2 (the second index page) comes back short.
        file.short_from = Some(2 * PAGE_SIZE + 100);
        let mut reader = IndexReader::from_file(file).unwrap();
        let err = reader.find(b"durian").err().unwrap();
        assert!(matches!(err, ReaderError::ShortRead { page: 2 }));
    }

    #[test]
    fn overrunning_entry_is_reported() {
        let mut bytes = fruit_file();
        // Rewrite the first index page: a 250-byte key at 0, then an entry
        // at 256 whose 251-byte key would end one byte past the page.
        let page = &mut bytes[PAGE_SIZE..2 * PAGE_SIZE];
        page.fill(0);
        page[..6].copy_from_slice(&[0, 0, 0, 0, 250, 0]);
        page[6..256].fill(b'a');
        page[256..262].copy_from_slice(&[0, 0, 0, 0, 251, 0]);
        let mut reader = IndexReader::from_file(MemFile::new(bytes)).unwrap();
        let err = reader.find(b"zzz").err().unwrap();
        assert!(matches!(
            err,
            ReaderError::Format(FormatError::EntryOverrunsPage { page: 1, offset: 256 })
        ));
    }

    #[test]
    fn checksum_verifies_and_detects_damage() {
        let bytes = fruit_file();
        let mut reader = IndexReader::from_file(MemFile::new(bytes.clone())).unwrap();
        assert!(reader.verify_checksum().unwrap());

        let mut damaged = bytes;
        damaged[PAGE_SIZE + 7] ^= 0x20;
        let mut reader = IndexReader::from_file(MemFile::new(damaged)).unwrap();
        assert!(!reader.verify_checksum().unwrap());
    }

    #[test]
    fn checksum_does_not_move_cursor() {
        let mut reader = fruit_reader();
        reader.find(b"apple").unwrap();
        reader.verify_checksum().unwrap();
        assert_eq!(key_of(reader.next_entry().unwrap()), Some(b"Banana".to_vec()));
    }

    #[test]
    fn article_body_is_readable() {
        let mut reader = fruit_reader();
        let offset = reader.find(b"banana").unwrap().unwrap().data_offset();
        let mut body = [0u8; 32];
        let len = reader.read_article(offset, &mut body).unwrap();
        assert_eq!(&body[..len], b"yellow");
        // Cursor still continues after Banana.
        assert_eq!(key_of(reader.next_entry().unwrap()), Some(b"Cherry".to_vec()));
    }

    #[test]
    fn article_position_is_absolute() {
        let mut reader = fruit_reader();
        let articles = u64::from(reader.header().articles_first_page) * PAGE_SIZE as u64;
        let apple = reader.find(b"apple").unwrap().unwrap().data_offset();
        assert_eq!(reader.article_position(apple), Some(articles));
        let banana = reader.find(b"banana").unwrap().unwrap().data_offset();
        assert_eq!(reader.article_position(banana), Some(articles + u64::from(banana)));
        // Cursor-free lookups: the position does not depend on the last search.
        assert_eq!(reader.article_position(apple), Some(articles));
    }

    #[test]
    fn close_releases_file() {
        let reader = fruit_reader();
        assert!(reader.close().is_ok());
    }
}
