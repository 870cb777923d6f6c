//! Article index: the paginated WOM title index and its reader.
//!
//! # Modules
//!
//! - [`format`]: header, page and entry layout, `FormatError`
//! - [`entry`]: `IndexEntry` views, owned copies and key matching
//! - [`reader`]: `IndexReader` over any `platform::File`
//! - [`writer`]: `IndexWriter` for host tooling (feature `std`)

#![cfg_attr(not(any(test, feature = "std")), no_std)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::panic)]
#![deny(clippy::expect_used)]
// Layout structs document their fields in the type-level table.
#![allow(missing_docs)]

#[macro_use]
mod fmt;

pub mod entry;
pub mod format;
pub mod reader;
#[cfg(any(test, feature = "std"))]
pub mod writer;

// Top-level re-exports for convenience
pub use entry::{keys_match, IndexEntry, OwnedEntry};
pub use format::{FileHeader, FormatError, END_OF_PAGE, MAX_KEY_LEN, PAGE_SIZE};
pub use reader::{IndexReader, ReaderError};
#[cfg(any(test, feature = "std"))]
pub use writer::{IndexWriter, WriterError};
