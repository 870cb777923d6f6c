//! Hardware Abstraction Layer (HAL) for the reader's storage stack
//!
//! This crate provides the capability traits the storage core is written
//! against, so the SD driver and the article index can run unchanged on the
//! device, in the desktop simulator and in host tests.
//!
//! # Architecture Layers
//!
//! ```text
//! Application Layer (boot stage, article browser)
//!         ↓
//! Storage Core (sdcard, library)
//!         ↓
//! Platform HAL (this crate - trait abstractions)
//!         ↓
//! Hardware Layer (embedded-hal SPI + GPIO implementation)
//! ```
//!
//! # Capabilities
//!
//! - [`ByteBus`] - one-byte exchange with chip-select control
//! - [`BlockDevice`] - fixed-size block reads by index
//! - [`Storage`] / [`File`] - open/seek/read byte-oriented files
//!
//! # Backends
//!
//! - [`SpiByteBus`] - real SPI bus plus a chip-select pin
//! - [`BlockFile`] - flat read-only file over a sector range of a [`BlockDevice`]
//! - `storage_local::LocalFileStorage` - `std::fs` (feature `std`)
//!
//! # Features
//!
//! - `std`: Enable standard library support (desktop tooling and tests)
//! - `defmt`: Enable defmt logging derives
//!
//! # Example
//!
//! ```no_run
//! use platform::ByteBus;
//!
//! fn ping<B: ByteBus>(bus: &mut B) -> Result<u8, B::Error> {
//!     bus.select()?;
//!     let answer = bus.exchange(0xFF)?;
//!     bus.deselect()?;
//!     Ok(answer)
//! }
//! ```

// ── Lint policy ─────────────────────────────────────────────────────────────
#![deny(clippy::unwrap_used)] // no .unwrap() in production code
#![deny(clippy::expect_used)] // no .expect() in production code
#![deny(clippy::panic)] // no panic!() in production code
#![deny(clippy::unreachable)] // no unreachable!() that isn't documented
#![deny(unused_must_use)]
// all Results must be handled
// ────────────────────────────────────────────────────────────────────────────
#![cfg_attr(not(any(test, feature = "std")), no_std)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(clippy::print_stdout)] // prefer tracing/defmt over println! in lib code
#![allow(clippy::doc_markdown)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]

pub mod block;
pub mod bus;
pub mod bus_spi;
pub mod config;
pub mod storage;
pub mod storage_block;
#[cfg(any(test, feature = "std"))]
pub mod storage_local;

// Re-export main capability traits
pub use block::{BlockDevice, BLOCK_SIZE};
pub use bus::ByteBus;
pub use storage::{File, Storage};

// Re-export backends
pub use bus_spi::{SpiBusError, SpiByteBus};
pub use storage_block::{BlockFile, BlockFileError};
