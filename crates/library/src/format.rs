//! On-disk layout of the WOM article index.
//!
//! All multi-byte integers are little-endian.
//!
//! ```text
//! page 0           file header (first 32 bytes, rest of the page zero)
//! pages [index_first_page, index_first_page + index_num_pages)
//!                  index pages, PAGE_SIZE bytes each
//! page articles_first_page onwards
//!                  article records: [u32 length][length bytes]
//! ```
//!
//! An index page packs entries back to back:
//!
//! ```text
//! [0..4]  data offset  u32 (END_OF_PAGE = no further entries on this page)
//! [4]     key length   u8
//! [5]     reserved     u8 = 0
//! [6..]   key bytes    abbreviated article title
//! ```
//!
//! Entries are only parsed while at least [`ENTRY_HEADER_LEN`] bytes remain
//! in the page, so a page that is filled to within six bytes of its end
//! needs no sentinel.

/// Size of one index page.
pub const PAGE_SIZE: usize = 512;

/// Bytes preceding the key in every entry.
pub const ENTRY_HEADER_LEN: usize = 6;

/// Data-offset value that ends the entries of a page.
pub const END_OF_PAGE: u32 = 0xFFFF_FFFF;

/// Longest key the writer stores. Titles are cut to this many bytes.
pub const MAX_KEY_LEN: usize = 64;

/// Longest key the format can describe (the length field is one byte).
pub const KEY_CAPACITY: usize = u8::MAX as usize;

/// Byte length of an article record header.
pub const ARTICLE_HEADER_LEN: usize = 4;

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Structural problems found while decoding an index file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FormatError {
    /// Header magic is not `b"WOM1"`.
    BadMagic,
    /// Header version is not [`FileHeader::VERSION`].
    UnsupportedVersion(u32),
    /// An entry's key runs past the end of its page.
    EntryOverrunsPage {
        /// Page holding the entry.
        page: u32,
        /// Byte offset of the entry header within the page.
        offset: u16,
    },
    /// The header points at pages the file does not contain.
    RegionOutsideFile,
}

impl core::fmt::Display for FormatError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::BadMagic => f.write_str("not a WOM index (bad magic)"),
            Self::UnsupportedVersion(v) => write!(f, "unsupported WOM version {v}"),
            Self::EntryOverrunsPage { page, offset } => {
                write!(f, "entry at page {page} offset {offset} runs past the page end")
            }
            Self::RegionOutsideFile => f.write_str("header describes pages beyond the end of the file"),
        }
    }
}

#[cfg(any(test, feature = "std"))]
impl std::error::Error for FormatError {}

// ---------------------------------------------------------------------------
// FileHeader
// ---------------------------------------------------------------------------

/// Header stored at the start of page 0.
///
/// Layout (32 bytes):
/// ```text
/// [0..4]   magic               b"WOM1"
/// [4..8]   version             u32 = 1
/// [8..12]  index_first_page    u32
/// [12..16] index_num_pages     u32
/// [16..20] articles_first_page u32
/// [20..24] entry_count         u32
/// [24..28] index_checksum      u32 (CRC32 of the index pages)
/// [28..32] reserved            u32 = 0
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FileHeader {
    pub index_first_page: u32,
    pub index_num_pages: u32,
    pub articles_first_page: u32,
    pub entry_count: u32,
    pub index_checksum: u32,
}

impl FileHeader {
    pub const SIZE: usize = 32;
    pub const MAGIC: &'static [u8; 4] = b"WOM1";
    pub const VERSION: u32 = 1;

    /// Encode into a 32-byte buffer.
    ///
    /// # Safety (lint allow)
    /// All range indices are compile-time constants within `[0, SIZE)`.
    #[must_use]
    #[allow(clippy::indexing_slicing)]
    pub fn encode(&self) -> [u8; Self::SIZE] {
        let mut buf = [0u8; Self::SIZE];
        buf[0..4].copy_from_slice(Self::MAGIC);
        buf[4..8].copy_from_slice(&Self::VERSION.to_le_bytes());
        buf[8..12].copy_from_slice(&self.index_first_page.to_le_bytes());
        buf[12..16].copy_from_slice(&self.index_num_pages.to_le_bytes());
        buf[16..20].copy_from_slice(&self.articles_first_page.to_le_bytes());
        buf[20..24].copy_from_slice(&self.entry_count.to_le_bytes());
        buf[24..28].copy_from_slice(&self.index_checksum.to_le_bytes());
        buf
    }

    /// Decode from a 32-byte buffer.
    ///
    /// # Errors
    ///
    /// [`FormatError::BadMagic`] if bytes `[0..4]` are not `b"WOM1"`,
    /// [`FormatError::UnsupportedVersion`] for any version but 1.
    pub fn decode(buf: &[u8; Self::SIZE]) -> Result<Self, FormatError> {
        if buf.get(0..4) != Some(Self::MAGIC.as_ref()) {
            return Err(FormatError::BadMagic);
        }
        let version = le_u32(buf, 4);
        if version != Self::VERSION {
            return Err(FormatError::UnsupportedVersion(version));
        }
        Ok(Self {
            index_first_page: le_u32(buf, 8),
            index_num_pages: le_u32(buf, 12),
            articles_first_page: le_u32(buf, 16),
            entry_count: le_u32(buf, 20),
            index_checksum: le_u32(buf, 24),
        })
    }

    /// One past the last index page, or `None` if it overflows.
    #[must_use]
    pub fn index_end_page(&self) -> Option<u32> {
        self.index_first_page.checked_add(self.index_num_pages)
    }

    /// Byte range `(start, len)` of the index pages.
    #[must_use]
    pub fn index_region(&self) -> Option<(u64, u64)> {
        let start = page_offset(self.index_first_page)?;
        let len = page_offset(self.index_num_pages)?;
        Some((start, len))
    }

    /// Absolute file position of the article record at `data_offset`.
    #[must_use]
    pub fn article_position(&self, data_offset: u32) -> Option<u64> {
        page_offset(self.articles_first_page)?.checked_add(u64::from(data_offset))
    }
}

/// Byte offset of `page` from the start of the file.
#[must_use]
pub fn page_offset(page: u32) -> Option<u64> {
    u64::from(page).checked_mul(PAGE_SIZE as u64)
}

// ---------------------------------------------------------------------------
// EntryHeader
// ---------------------------------------------------------------------------

/// The fixed six bytes in front of every key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct EntryHeader {
    pub data_offset: u32,
    pub key_len: u8,
}

impl EntryHeader {
    /// Sentinel that closes a page.
    pub const END: Self = Self {
        data_offset: END_OF_PAGE,
        key_len: 0,
    };

    /// `true` for the end-of-page sentinel.
    #[must_use]
    pub const fn is_end(&self) -> bool {
        self.data_offset == END_OF_PAGE
    }

    /// Encode into six bytes.
    #[must_use]
    pub fn encode(&self) -> [u8; ENTRY_HEADER_LEN] {
        let [a, b, c, d] = self.data_offset.to_le_bytes();
        [a, b, c, d, self.key_len, 0]
    }

    /// Decode from six bytes.
    #[must_use]
    pub fn decode(buf: &[u8; ENTRY_HEADER_LEN]) -> Self {
        let [a, b, c, d, key_len, _] = *buf;
        Self {
            data_offset: u32::from_le_bytes([a, b, c, d]),
            key_len,
        }
    }
}

/// Read a little-endian u32 at `at`; bytes outside `buf` read as zero.
fn le_u32(buf: &[u8], at: usize) -> u32 {
    let mut word = [0u8; 4];
    if let Some(src) = buf.get(at..at.saturating_add(4)) {
        word.copy_from_slice(src);
    }
    u32::from_le_bytes(word)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic, clippy::indexing_slicing)]
mod tests {
    use super::*;

    fn header() -> FileHeader {
        FileHeader {
            index_first_page: 1,
            index_num_pages: 3,
            articles_first_page: 4,
            entry_count: 17,
            index_checksum: 0xDEAD_BEEF,
        }
    }

    #[test]
    fn header_bytes_are_little_endian() {
        let buf = header().encode();
        assert_eq!(&buf[0..4], b"WOM1");
        assert_eq!(&buf[4..8], &[1, 0, 0, 0]);
        assert_eq!(&buf[8..12], &[1, 0, 0, 0]);
        assert_eq!(&buf[24..28], &[0xEF, 0xBE, 0xAD, 0xDE]);
        assert_eq!(&buf[28..32], &[0, 0, 0, 0]);
        assert_eq!(FileHeader::decode(&buf).unwrap(), header());
    }

    #[test]
    fn bad_magic_rejected() {
        let mut buf = header().encode();
        buf[0] = b'X';
        assert_eq!(FileHeader::decode(&buf), Err(FormatError::BadMagic));
    }

    #[test]
    fn unknown_version_rejected() {
        let mut buf = header().encode();
        buf[4] = 9;
        assert_eq!(FileHeader::decode(&buf), Err(FormatError::UnsupportedVersion(9)));
    }

    #[test]
    fn region_and_article_positions() {
        let h = header();
        assert_eq!(h.index_end_page(), Some(4));
        assert_eq!(h.index_region(), Some((512, 1536)));
        assert_eq!(h.article_position(10), Some(4 * 512 + 10));
    }

    #[test]
    fn end_page_overflow_is_none() {
        let h = FileHeader {
            index_first_page: u32::MAX,
            index_num_pages: 2,
            ..header()
        };
        assert_eq!(h.index_end_page(), None);
    }

    #[test]
    fn sentinel_entry_bytes() {
        assert_eq!(EntryHeader::END.encode(), [0xFF, 0xFF, 0xFF, 0xFF, 0, 0]);
        assert!(EntryHeader::decode(&[0xFF, 0xFF, 0xFF, 0xFF, 7, 0]).is_end());
    }

    #[test]
    fn entry_header_layout() {
        let e = EntryHeader {
            data_offset: 0x0102_0304,
            key_len: 5,
        };
        assert_eq!(e.encode(), [0x04, 0x03, 0x02, 0x01, 5, 0]);
        assert_eq!(EntryHeader::decode(&e.encode()), e);
    }
}
