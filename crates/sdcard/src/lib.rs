//! SPI-mode SD card driver for the boot stage.
//!
//! Covers the card bring-up handshake, CRC7-framed commands, single-sector
//! reads and the CSD (card-specific data) block. The card is reached through
//! [`platform::ByteBus`], so the same driver runs against real SPI hardware
//! ([`platform::SpiByteBus`]) and against the in-memory card in [`sim`].
//!
//! # Modules
//!
//! - [`command`]: command set, response codes and 6-byte frame encoding
//! - [`crc`]: CRC7 used to seal command frames
//! - [`config`]: retry budgets and back-off timing
//! - [`driver`]: `SdCard`, response polling and the initialisation state machine
//! - [`sector`]: 512-byte sector reads
//! - [`descriptor`]: the 16-byte CSD block and its hex dump
//!
//! # Limitations
//!
//! Sector addresses are sent as byte addresses (`sector * 512`). This is the
//! standard-capacity scheme; high-capacity (SDHC/SDXC) cards address by
//! block and are not supported. The CRC16 trailing each data block is read
//! and discarded without verification.
//!
//! # Example
//!
//! ```no_run
//! use platform::ByteBus;
//! use embedded_hal::delay::DelayNs;
//! use sdcard::SdCard;
//!
//! fn boot<B: ByteBus, D: DelayNs>(bus: B, delay: D) -> Result<[u8; 512], sdcard::SdError<B::Error>> {
//!     let mut card = SdCard::new(bus, delay);
//!     card.initialize()?;
//!     let mut sector = [0u8; 512];
//!     card.read_sector(0, &mut sector)?;
//!     Ok(sector)
//! }
//! ```

#![cfg_attr(not(test), no_std)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::panic)]
#![deny(clippy::expect_used)]
#![warn(missing_docs)]

#[cfg(any(test, feature = "sim"))]
extern crate alloc;

#[macro_use]
mod fmt;

pub mod command;
pub mod config;
pub mod crc;
pub mod descriptor;
pub mod driver;
pub mod error;
pub mod sector;
#[cfg(any(test, feature = "sim"))]
pub mod sim;

// Top-level re-exports for convenience
pub use command::Command;
pub use config::SdConfig;
pub use descriptor::{CardDescriptor, DESCRIPTOR_LEN};
pub use driver::{CardState, SdCard};
pub use error::SdError;
pub use platform::BLOCK_SIZE;
