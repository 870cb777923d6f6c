//! xtask sim-boot: run the boot-stage lookup against a simulated SD card.
//!
//! The index file is placed at `sector` on an in-memory card, the card is
//! brought up through the same `SdCard` driver the hardware uses, and the
//! index is read through a `BlockFile` over the card's sectors.

use std::path::Path;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use colored::Colorize;
use embedded_hal::delay::DelayNs;
use library::IndexReader;
use platform::storage_local::LocalFileStorage;
use platform::{BlockFile, File, Storage, BLOCK_SIZE};
use sdcard::sim::SimulatedCard;
use sdcard::{CardState, SdCard};
use tracing::info;

use crate::index::locate;

/// Sector the index is written to when none is given.
pub const DEFAULT_FIRST_SECTOR: u32 = 64;

/// Article bytes fetched for the printed excerpt.
const EXCERPT_LEN: usize = 160;

/// `DelayNs` backed by `std::thread::sleep`.
pub(crate) struct StdDelay;

impl DelayNs for StdDelay {
    fn delay_ns(&mut self, ns: u32) {
        std::thread::sleep(Duration::from_nanos(u64::from(ns)));
    }
}

/// Result of a successful boot: the descriptor dump and the lookup outcome.
#[derive(Debug)]
pub(crate) struct BootReport {
    pub descriptor: String,
    pub hit: Option<(String, Vec<u8>)>,
}

/// Entry point called from main.rs
pub fn run(index: Option<&Path>, key: &str, sector: u32, latency: u32) -> Result<()> {
    let bytes = load_image(index)?;
    let report = boot(&bytes, key, sector, latency)?;
    println!("  CSD  {}", report.descriptor);
    match report.hit {
        Some((title, body)) => {
            println!("{}", format!("✓ {title}").green());
            println!("  {}", String::from_utf8_lossy(&body));
        }
        None => println!("{}", format!("✗ no entry matches {key:?}").yellow()),
    }
    Ok(())
}

/// Read the whole index file, located as for the other index commands.
pub(crate) fn load_image(index: Option<&Path>) -> Result<Vec<u8>> {
    let (mut storage, name) = locate(index, LocalFileStorage::from_env())?;
    let mut file = storage.open_file(&name).with_context(|| format!("opening {name}"))?;
    let mut bytes = vec![0u8; usize::try_from(file.size())?];
    let n = file.read(&mut bytes).with_context(|| format!("reading {name}"))?;
    anyhow::ensure!(n == bytes.len(), "short read of {name}");
    Ok(bytes)
}

/// Load `image` at `sector` of a fresh simulated card, initialise it and
/// look up `key`.
pub(crate) fn boot(image: &[u8], key: &str, sector: u32, latency: u32) -> Result<BootReport> {
    let start = usize::try_from(sector)?
        .checked_mul(BLOCK_SIZE)
        .ok_or_else(|| anyhow!("sector {sector} is out of range"))?;
    let mut card_image = vec![0u8; start];
    card_image.extend_from_slice(image);
    let card = SimulatedCard::new(card_image).with_op_cond_latency(latency);

    let mut sd = SdCard::new(card, StdDelay);
    sd.initialize().map_err(|e| anyhow!("card initialisation failed: {e}"))?;
    anyhow::ensure!(sd.state() == CardState::Ready, "card not ready after init");
    let descriptor = sd
        .descriptor()
        .map(ToString::to_string)
        .ok_or_else(|| anyhow!("card descriptor missing"))?;
    info!("sim: card ready, CSD {}", descriptor);

    let len = u64::try_from(image.len())?;
    let file = BlockFile::new(sd, sector, len);
    let mut reader = IndexReader::from_file(file).map_err(|e| anyhow!("opening index: {e}"))?;
    info!(
        "sim: index has {} entries on {} pages",
        reader.header().entry_count,
        reader.header().index_num_pages
    );

    let found = reader
        .find(key.as_bytes())
        .map_err(|e| anyhow!("searching index: {e}"))?
        .map(|entry| {
            let title = String::from_utf8_lossy(entry.key()).into_owned();
            (title, entry.data_offset())
        });
    let hit = match found {
        Some((title, data_offset)) => {
            let mut body = vec![0u8; EXCERPT_LEN];
            let len = reader
                .read_article(data_offset, &mut body)
                .map_err(|e| anyhow!("reading article: {e}"))?;
            body.truncate(len.min(EXCERPT_LEN));
            Some((title, body))
        }
        None => None,
    };
    reader.close().map_err(|e| anyhow!("closing index: {e}"))?;
    Ok(BootReport { descriptor, hit })
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::indexing_slicing
)]
mod tests {
    use super::*;
    use library::IndexWriter;

    fn image() -> Vec<u8> {
        let mut w = IndexWriter::new();
        w.add_article("Apple", b"A fruit").unwrap();
        w.add_article("Banana", b"A yellow fruit").unwrap();
        w.into_bytes().unwrap()
    }

    #[test]
    fn boot_finds_article_through_card() {
        let report = boot(&image(), "banana", 8, 2).unwrap();
        let (title, body) = report.hit.unwrap();
        assert_eq!(title, "Banana");
        assert_eq!(body, b"A yellow fruit");
        assert_eq!(report.descriptor.split(' ').count(), 16);
    }

    #[test]
    fn boot_reports_miss() {
        let report = boot(&image(), "Durian", 0, 0).unwrap();
        assert!(report.hit.is_none());
    }

    #[test]
    fn image_loads_through_local_storage() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("pedia.wom");
        std::fs::write(&path, image()).unwrap();
        let bytes = load_image(Some(path.as_path())).unwrap();
        assert_eq!(bytes, image());
        assert!(boot(&bytes, "apple", 2, 0).unwrap().hit.is_some());
    }

    #[test]
    fn garbage_image_is_rejected() {
        assert!(boot(&[0u8; 1024], "Apple", 4, 0).is_err());
    }
}
