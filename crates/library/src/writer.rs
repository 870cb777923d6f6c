//! IndexWriter: build a WOM index file.
//!
//! Only compiled with the `std` feature (used by the `build-index` xtask and
//! by tests). Entries are written in the order they are added; the reader
//! does not require any particular order.

use std::fs;
use std::path::Path;

use crc32fast::Hasher;

use crate::format::{
    EntryHeader, FileHeader, END_OF_PAGE, ENTRY_HEADER_LEN, KEY_CAPACITY, MAX_KEY_LEN, PAGE_SIZE,
};

/// Error type for `IndexWriter` operations.
#[derive(Debug)]
pub enum WriterError {
    /// An I/O error from std::io.
    Io(std::io::Error),
    /// Key longer than the one-byte length field allows.
    KeyTooLong(usize),
    /// The end-of-page sentinel cannot be used as a data offset.
    ReservedOffset,
    /// The file would need more than `u32::MAX` pages, entries or article bytes.
    TooLarge,
}

impl core::fmt::Display for WriterError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "I/O error: {}", e),
            Self::KeyTooLong(len) => write!(f, "key of {} bytes exceeds {}", len, KEY_CAPACITY),
            Self::ReservedOffset => write!(f, "data offset {:#x} is reserved", END_OF_PAGE),
            Self::TooLarge => f.write_str("index exceeds 32-bit limits"),
        }
    }
}

impl std::error::Error for WriterError {}

impl From<std::io::Error> for WriterError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

/// Cut `title` to at most [`MAX_KEY_LEN`] bytes without splitting a UTF-8
/// character.
#[must_use]
pub fn abbreviate(title: &str) -> &[u8] {
    let mut end = title.len().min(MAX_KEY_LEN);
    while !title.is_char_boundary(end) {
        end = end.saturating_sub(1);
    }
    title.as_bytes().get(..end).unwrap_or_default()
}

/// Accumulates index pages and article bodies in memory.
///
/// Layout produced by [`IndexWriter::into_bytes`]: header page, index
/// pages, article records. Each page is closed with the end-of-page
/// sentinel whenever at least six bytes are left in it.
#[derive(Debug, Default)]
pub struct IndexWriter {
    pages: Vec<[u8; PAGE_SIZE]>,
    current: Vec<u8>,
    articles: Vec<u8>,
    entry_count: u32,
}

impl IndexWriter {
    /// Create an empty writer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an article and its index entry.
    ///
    /// The key is `title` cut to [`MAX_KEY_LEN`] bytes. The body is stored
    /// as a little-endian u32 length followed by the bytes.
    ///
    /// # Errors
    ///
    /// `WriterError::TooLarge` if the article region would pass 4 GiB.
    pub fn add_article(&mut self, title: &str, body: &[u8]) -> Result<(), WriterError> {
        let data_offset = u32::try_from(self.articles.len()).map_err(|_| WriterError::TooLarge)?;
        let body_len = u32::try_from(body.len()).map_err(|_| WriterError::TooLarge)?;
        if data_offset == END_OF_PAGE {
            return Err(WriterError::TooLarge);
        }
        self.articles.extend_from_slice(&body_len.to_le_bytes());
        self.articles.extend_from_slice(body);
        self.add_entry(abbreviate(title), data_offset)
    }

    /// Append a raw entry. Starts a new page if it does not fit.
    ///
    /// # Errors
    ///
    /// `WriterError::KeyTooLong` for keys over 255 bytes,
    /// `WriterError::ReservedOffset` for `data_offset == END_OF_PAGE`.
    pub fn add_entry(&mut self, key: &[u8], data_offset: u32) -> Result<(), WriterError> {
        let key_len = u8::try_from(key.len()).map_err(|_| WriterError::KeyTooLong(key.len()))?;
        if data_offset == END_OF_PAGE {
            return Err(WriterError::ReservedOffset);
        }
        let entry_count = self.entry_count.checked_add(1).ok_or(WriterError::TooLarge)?;
        let needed = ENTRY_HEADER_LEN.saturating_add(key.len());
        if self.current.len().saturating_add(needed) > PAGE_SIZE {
            self.end_page();
        }
        let header = EntryHeader { data_offset, key_len };
        self.current.extend_from_slice(&header.encode());
        self.current.extend_from_slice(key);
        self.entry_count = entry_count;
        Ok(())
    }

    /// Close the current page, even if it holds no entries.
    pub fn end_page(&mut self) {
        let mut page = [0u8; PAGE_SIZE];
        let used = self.current.len().min(PAGE_SIZE);
        if let (Some(dst), Some(src)) = (page.get_mut(..used), self.current.get(..used)) {
            dst.copy_from_slice(src);
        }
        if let Some(slot) = page.get_mut(used..used.saturating_add(ENTRY_HEADER_LEN)) {
            slot.copy_from_slice(&EntryHeader::END.encode());
        }
        self.pages.push(page);
        self.current.clear();
    }

    /// Number of entries added so far.
    #[must_use]
    pub fn entry_count(&self) -> u32 {
        self.entry_count
    }

    /// Produce the complete file image and its header.
    ///
    /// # Errors
    ///
    /// `WriterError::TooLarge` if the page count overflows u32.
    pub fn into_parts(mut self) -> Result<(FileHeader, Vec<u8>), WriterError> {
        if !self.current.is_empty() {
            self.end_page();
        }
        let index_num_pages = u32::try_from(self.pages.len()).map_err(|_| WriterError::TooLarge)?;
        let index_first_page = 1u32;
        let articles_first_page = index_first_page
            .checked_add(index_num_pages)
            .ok_or(WriterError::TooLarge)?;

        let mut hasher = Hasher::new();
        for page in &self.pages {
            hasher.update(page);
        }

        let header = FileHeader {
            index_first_page,
            index_num_pages,
            articles_first_page,
            entry_count: self.entry_count,
            index_checksum: hasher.finalize(),
        };

        let mut out = Vec::with_capacity(
            PAGE_SIZE
                .saturating_mul(self.pages.len().saturating_add(1))
                .saturating_add(self.articles.len()),
        );
        let mut header_page = [0u8; PAGE_SIZE];
        if let Some(dst) = header_page.get_mut(..FileHeader::SIZE) {
            dst.copy_from_slice(&header.encode());
        }
        out.extend_from_slice(&header_page);
        for page in &self.pages {
            out.extend_from_slice(page);
        }
        out.extend_from_slice(&self.articles);
        Ok((header, out))
    }

    /// Produce the complete file image.
    ///
    /// # Errors
    ///
    /// As [`IndexWriter::into_parts`].
    pub fn into_bytes(self) -> Result<Vec<u8>, WriterError> {
        self.into_parts().map(|(_, bytes)| bytes)
    }

    /// Write the file to `path` and return its header.
    ///
    /// # Errors
    ///
    /// `WriterError::Io` if the file cannot be written, otherwise as
    /// [`IndexWriter::into_parts`].
    pub fn finish(self, path: &Path) -> Result<FileHeader, WriterError> {
        let (header, bytes) = self.into_parts()?;
        fs::write(path, bytes)?;
        Ok(header)
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::indexing_slicing,
    clippy::arithmetic_side_effects
)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn abbreviate_cuts_long_titles() {
        let long = "x".repeat(100);
        assert_eq!(abbreviate(&long).len(), MAX_KEY_LEN);
        assert_eq!(abbreviate("Apple"), b"Apple");
    }

    #[test]
    fn abbreviate_respects_char_boundaries() {
        // 63 ASCII bytes then a two-byte character straddling the limit.
        let title = format!("{}é", "a".repeat(63));
        assert_eq!(abbreviate(&title).len(), 63);
    }

    #[test]
    fn page_is_sentinel_terminated() {
        let mut w = IndexWriter::new();
        w.add_entry(b"Apple", 0).unwrap();
        let bytes = w.into_bytes().unwrap();
        let page = &bytes[PAGE_SIZE..2 * PAGE_SIZE];
        assert_eq!(&page[..6], &[0, 0, 0, 0, 5, 0]);
        assert_eq!(&page[6..11], b"Apple");
        assert_eq!(&page[11..17], &[0xFF, 0xFF, 0xFF, 0xFF, 0, 0]);
    }

    #[test]
    fn full_page_spills_to_next() {
        let mut w = IndexWriter::new();
        let key = [b'k'; 100];
        // 106 bytes per entry: four fit in a page, the fifth does not.
        for i in 0..5 {
            w.add_entry(&key, i).unwrap();
        }
        let (header, _) = w.into_parts().unwrap();
        assert_eq!(header.index_num_pages, 2);
        assert_eq!(header.entry_count, 5);
    }

    #[test]
    fn explicit_empty_pages_are_kept() {
        let mut w = IndexWriter::new();
        w.end_page();
        w.end_page();
        let (header, bytes) = w.into_parts().unwrap();
        assert_eq!(header.index_num_pages, 2);
        assert_eq!(&bytes[PAGE_SIZE..PAGE_SIZE + 4], &[0xFF; 4]);
    }

    #[test]
    fn empty_writer_has_no_index_pages() {
        let (header, bytes) = IndexWriter::new().into_parts().unwrap();
        assert_eq!(header.index_num_pages, 0);
        assert_eq!(header.articles_first_page, 1);
        assert_eq!(bytes.len(), PAGE_SIZE);
    }

    #[test]
    fn reserved_offset_rejected() {
        let mut w = IndexWriter::new();
        assert!(matches!(w.add_entry(b"x", END_OF_PAGE), Err(WriterError::ReservedOffset)));
    }

    #[test]
    fn oversized_key_rejected() {
        let mut w = IndexWriter::new();
        let key = vec![b'a'; 256];
        assert!(matches!(w.add_entry(&key, 0), Err(WriterError::KeyTooLong(256))));
    }

    #[test]
    fn articles_follow_index() {
        let mut w = IndexWriter::new();
        w.add_article("One", b"first").unwrap();
        w.add_article("Two", b"second").unwrap();
        let (header, bytes) = w.into_parts().unwrap();
        let base = header.articles_first_page as usize * PAGE_SIZE;
        assert_eq!(&bytes[base..base + 4], &5u32.to_le_bytes());
        assert_eq!(&bytes[base + 4..base + 9], b"first");
        assert_eq!(&bytes[base + 9..base + 13], &6u32.to_le_bytes());
    }

    #[test]
    fn finish_writes_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("pedia.wom");
        let mut w = IndexWriter::new();
        w.add_article("Apple", b"fruit").unwrap();
        let header = w.finish(&path).unwrap();
        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(&bytes[..4], b"WOM1");
        assert_eq!(FileHeader::decode(bytes[..32].try_into().unwrap()).unwrap(), header);
    }
}
