//! Boot flow against the simulated card: bring-up, CSD, sector reads and a
//! file view over the card.

#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::indexing_slicing,
    clippy::arithmetic_side_effects,
    clippy::cast_possible_truncation
)]

use embedded_hal::delay::DelayNs;
use embedded_hal_mock::eh1::delay::NoopDelay;
use platform::{BlockFile, ByteBus, File};
use sdcard::sim::{SimulatedCard, DEFAULT_DESCRIPTOR};
use sdcard::{CardState, SdCard, SdConfig, SdError, BLOCK_SIZE};

/// Delay that records how long the driver waited in total.
#[derive(Default)]
struct CountingDelay {
    total_ns: u64,
    calls: u32,
}

impl DelayNs for CountingDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.total_ns += u64::from(ns);
        self.calls += 1;
    }
}

/// Counts bus exchanges on top of another bus.
struct Counting<B> {
    inner: B,
    exchanges: usize,
}

impl<B: ByteBus> ByteBus for Counting<B> {
    type Error = B::Error;

    fn exchange(&mut self, byte: u8) -> Result<u8, Self::Error> {
        self.exchanges += 1;
        self.inner.exchange(byte)
    }

    fn select(&mut self) -> Result<(), Self::Error> {
        self.inner.select()
    }

    fn deselect(&mut self) -> Result<(), Self::Error> {
        self.inner.deselect()
    }
}

fn image(sectors: usize) -> Vec<u8> {
    (0..sectors * BLOCK_SIZE).map(|i| (i % 253) as u8).collect()
}

#[test]
fn silent_card_fails_without_hanging() {
    let bus = Counting {
        inner: SimulatedCard::new(image(1)).unresponsive(),
        exchanges: 0,
    };
    let mut card = SdCard::new(bus, NoopDelay::new());
    assert_eq!(card.initialize(), Err(SdError::IdleTimeout { last: 0xFF }));
    assert_eq!(card.state(), CardState::Failed);
    let (bus, _) = card.release();
    // Bounded: 100 CMD0 attempts of 7 frame bytes and 8 polls each.
    assert_eq!(bus.exchanges, 100 * 15);
}

#[test]
fn op_cond_backoff_uses_configured_delay() {
    let sim = SimulatedCard::new(image(1)).with_op_cond_latency(3);
    let mut card = SdCard::new(sim, CountingDelay::default());
    card.initialize().unwrap();
    let (_, delay) = card.release();
    assert_eq!(delay.calls, 3);
    assert_eq!(delay.total_ns, 3 * 10_000_000);
}

#[test]
fn boot_reads_descriptor_and_sectors() {
    let data = image(8);
    let mut card = SdCard::new(SimulatedCard::new(data.clone()), NoopDelay::new());
    card.initialize().unwrap();
    assert_eq!(card.state(), CardState::Ready);
    assert_eq!(card.descriptor().unwrap().as_bytes(), &DEFAULT_DESCRIPTOR);

    let mut buf = [0u8; BLOCK_SIZE];
    for sector in [7u32, 0, 3] {
        card.read_sector(sector, &mut buf).unwrap();
        let start = sector as usize * BLOCK_SIZE;
        assert_eq!(&buf[..], &data[start..start + BLOCK_SIZE]);
    }
}

#[test]
fn repeated_sector_reads_match() {
    let mut card = SdCard::new(SimulatedCard::new(image(2)), NoopDelay::new());
    card.initialize().unwrap();
    let mut a = [0u8; BLOCK_SIZE];
    let mut b = [0u8; BLOCK_SIZE];
    card.read_sector(0, &mut a).unwrap();
    card.read_sector(0, &mut b).unwrap();
    assert_eq!(a, b);
}

#[test]
fn block_file_over_card_spans_sectors() {
    let data = image(6);
    let config = SdConfig {
        op_cond_delay_ms: 0,
        ..SdConfig::DEFAULT
    };
    let mut card = SdCard::with_config(SimulatedCard::new(data.clone()), NoopDelay::new(), config);
    card.initialize().unwrap();

    // A 1000-byte file starting at sector 2.
    let mut file = BlockFile::new(&mut card, 2, 1000);
    file.seek(500).unwrap();
    let mut buf = [0u8; 600];
    assert_eq!(file.read(&mut buf).unwrap(), 500);
    let base = 2 * BLOCK_SIZE;
    assert_eq!(&buf[..500], &data[base + 500..base + 1000]);
}
