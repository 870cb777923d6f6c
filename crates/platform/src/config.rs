//! Storage configuration and constants
//!
//! Central values shared by the storage core and the host tooling. Paths
//! and names should reference these constants rather than hardcoding them.

/// File name of the article index on the card root.
pub const INDEX_FILE_NAME: &str = "pedia.wom";

/// Environment variable naming the desktop directory that stands in for
/// the card root (read by `LocalFileStorage::from_env`).
pub const WIKI_ROOT_ENV: &str = "WIKI_ROOT";
