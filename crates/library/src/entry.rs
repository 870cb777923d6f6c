//! Index entries as handed out by the reader.

use crate::format::KEY_CAPACITY;

/// An entry borrowed from the reader's page buffer.
///
/// Valid until the reader moves to another page; use
/// [`IndexEntry::to_owned_entry`] to keep it longer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct IndexEntry<'a> {
    data_offset: u32,
    key: &'a [u8],
}

impl<'a> IndexEntry<'a> {
    pub(crate) fn new(data_offset: u32, key: &'a [u8]) -> Self {
        Self { data_offset, key }
    }

    /// Offset of the article record from the start of the article region.
    #[must_use]
    pub fn data_offset(&self) -> u32 {
        self.data_offset
    }

    /// Abbreviated key as stored.
    #[must_use]
    pub fn key(&self) -> &'a [u8] {
        self.key
    }

    /// The key as text, if it is valid UTF-8.
    #[must_use]
    pub fn key_str(&self) -> Option<&'a str> {
        core::str::from_utf8(self.key).ok()
    }

    /// Copy the entry out of the page buffer.
    #[must_use]
    pub fn to_owned_entry(&self) -> OwnedEntry {
        let mut key = heapless::Vec::new();
        // Stored keys are at most 255 bytes (u8 length), which is the capacity.
        let _ = key.extend_from_slice(self.key);
        OwnedEntry {
            data_offset: self.data_offset,
            key,
        }
    }
}

/// An entry that no longer borrows the reader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnedEntry {
    pub data_offset: u32,
    pub key: heapless::Vec<u8, KEY_CAPACITY>,
}

impl OwnedEntry {
    /// Borrow as an [`IndexEntry`].
    #[must_use]
    pub fn as_entry(&self) -> IndexEntry<'_> {
        IndexEntry::new(self.data_offset, &self.key)
    }
}

/// Key comparison used by the index search.
///
/// ASCII case-insensitive over the shorter of the two lengths, so a query
/// matches any stored key it is a prefix of and any stored abbreviation
/// that is a prefix of it. An empty query matches every key.
#[must_use]
pub fn keys_match(stored: &[u8], query: &[u8]) -> bool {
    let n = stored.len().min(query.len());
    match (stored.get(..n), query.get(..n)) {
        (Some(a), Some(b)) => a.eq_ignore_ascii_case(b),
        _ => false,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic, clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[test]
    fn match_ignores_ascii_case() {
        assert!(keys_match(b"Banana", b"banana"));
        assert!(keys_match(b"BANANA", b"bAnAnA"));
        assert!(!keys_match(b"Banana", b"bandana"));
    }

    #[test]
    fn match_uses_shorter_length() {
        // Query longer than the abbreviated key.
        assert!(keys_match(b"Encyclop", b"encyclopedia"));
        // Query shorter than the key.
        assert!(keys_match(b"Encyclopedia", b"ency"));
        assert!(keys_match(b"anything", b""));
    }

    #[test]
    fn owned_copy_matches_view() {
        let page = *b"..Cherry..";
        let view = IndexEntry::new(42, &page[2..8]);
        let owned = view.to_owned_entry();
        assert_eq!(owned.data_offset, 42);
        assert_eq!(owned.key.as_slice(), b"Cherry");
        assert_eq!(owned.as_entry(), view);
        assert_eq!(view.key_str(), Some("Cherry"));
    }
}
