//! In-memory SD card speaking the SPI-mode protocol.
//!
//! `SimulatedCard` implements [`ByteBus`] directly: command frames are
//! collected byte by byte while chip select is asserted, and responses are
//! queued and handed out one byte per exchange, the way a card shifts them
//! out. It backs the desktop simulator and the driver tests.
//!
//! Behaviour knobs:
//!
//! - `with_op_cond_latency(n)`: ACMD41 answers "busy" `n` times first
//! - `with_token_latency(n)`: `n` filler bytes between R1 and a data token
//! - `with_descriptor_reads(n)`: CMD9 sends its data only `n` times
//! - `unresponsive()`: the card never drives the bus (always 0xFF)

use alloc::collections::VecDeque;
use alloc::vec::Vec;
use core::convert::Infallible;

use platform::{ByteBus, BLOCK_SIZE};

use crate::command::{
    Command, DATA_TOKEN, FILLER, FRAME_LEN, R1_ADDRESS_ERROR, R1_CRC_ERROR, R1_IDLE,
    R1_ILLEGAL_COMMAND, R1_READY,
};
use crate::crc::crc7_byte;
use crate::descriptor::DESCRIPTOR_LEN;

/// CSD served when none is configured (a 1 GB standard-capacity card).
pub const DEFAULT_DESCRIPTOR: [u8; DESCRIPTOR_LEN] = [
    0x00, 0x26, 0x00, 0x32, 0x5f, 0x59, 0x83, 0xc8, 0xbe, 0xfb, 0xcf, 0xff, 0x92, 0x40, 0x40, 0xd7,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    PowerUp,
    Idle,
    Ready,
}

/// A card whose storage is a byte vector.
pub struct SimulatedCard {
    image: Vec<u8>,
    csd: [u8; DESCRIPTOR_LEN],
    phase: Phase,
    selected: bool,
    frame: [u8; FRAME_LEN],
    frame_len: usize,
    outbox: VecDeque<u8>,
    app_command: bool,
    op_cond_latency: u32,
    token_latency: usize,
    descriptor_reads: Option<u32>,
    unresponsive: bool,
    commands: Vec<(u8, u32)>,
}

impl SimulatedCard {
    /// Card holding `image`, padded with zeros to a whole number of sectors.
    pub fn new(mut image: Vec<u8>) -> Self {
        let tail = image.len().checked_rem(BLOCK_SIZE).unwrap_or(0);
        if tail != 0 {
            image.resize(image.len().saturating_add(BLOCK_SIZE.saturating_sub(tail)), 0);
        }
        Self {
            image,
            csd: DEFAULT_DESCRIPTOR,
            phase: Phase::PowerUp,
            selected: false,
            frame: [0; FRAME_LEN],
            frame_len: 0,
            outbox: VecDeque::new(),
            app_command: false,
            op_cond_latency: 0,
            token_latency: 0,
            descriptor_reads: None,
            unresponsive: false,
            commands: Vec::new(),
        }
    }

    /// Serve `csd` for CMD9.
    #[must_use]
    pub fn with_descriptor(mut self, csd: [u8; DESCRIPTOR_LEN]) -> Self {
        self.csd = csd;
        self
    }

    /// Answer ACMD41 with "busy" `polls` times before reporting ready.
    #[must_use]
    pub fn with_op_cond_latency(mut self, polls: u32) -> Self {
        self.op_cond_latency = polls;
        self
    }

    /// Insert `bytes` fillers between R1 and each data token.
    #[must_use]
    pub fn with_token_latency(mut self, bytes: usize) -> Self {
        self.token_latency = bytes;
        self
    }

    /// Send CSD data for the first `reads` CMD9s only; later ones get R1
    /// but no token.
    #[must_use]
    pub fn with_descriptor_reads(mut self, reads: u32) -> Self {
        self.descriptor_reads = Some(reads);
        self
    }

    /// Never send a CSD data block.
    #[must_use]
    pub fn without_descriptor(self) -> Self {
        self.with_descriptor_reads(0)
    }

    /// Never drive the bus.
    #[must_use]
    pub fn unresponsive(mut self) -> Self {
        self.unresponsive = true;
        self
    }

    /// Every well-formed command received, as `(index, argument)`.
    pub fn commands(&self) -> &[(u8, u32)] {
        &self.commands
    }

    /// The backing storage.
    pub fn image(&self) -> &[u8] {
        &self.image
    }

    fn r1(&self, flags: u8) -> u8 {
        if self.phase == Phase::Ready {
            flags
        } else {
            flags | R1_IDLE
        }
    }

    fn respond(&mut self, r1: u8) {
        // One byte of command response time (NCR) before R1.
        self.outbox.push_back(FILLER);
        self.outbox.push_back(r1);
    }

    fn queue_data(&mut self, payload: Vec<u8>) {
        self.outbox.extend(core::iter::repeat_n(FILLER, self.token_latency));
        self.outbox.push_back(DATA_TOKEN);
        let crc = crc16(&payload);
        self.outbox.extend(payload);
        self.outbox.extend(crc.to_be_bytes());
    }

    fn process(&mut self) {
        let [head, a0, a1, a2, a3, crc] = self.frame;
        if crc != crc7_byte(&[head, a0, a1, a2, a3]) {
            let r1 = self.r1(R1_CRC_ERROR);
            self.respond(r1);
            return;
        }
        let index = head & 0x3F;
        let argument = u32::from_be_bytes([a0, a1, a2, a3]);
        self.commands.push((index, argument));
        let app = core::mem::take(&mut self.app_command);

        match Command::from_index(index) {
            Some(Command::GoIdleState) => {
                self.phase = Phase::Idle;
                self.respond(R1_IDLE);
            }
            Some(Command::AppCommand) if self.phase != Phase::PowerUp => {
                self.app_command = true;
                let r1 = self.r1(R1_READY);
                self.respond(r1);
            }
            Some(Command::SendOpCond) if app => {
                if self.phase == Phase::Idle {
                    if self.op_cond_latency == 0 {
                        self.phase = Phase::Ready;
                    } else {
                        self.op_cond_latency = self.op_cond_latency.saturating_sub(1);
                    }
                }
                let r1 = self.r1(R1_READY);
                self.respond(r1);
            }
            Some(Command::SendCsd) if self.phase == Phase::Ready => {
                self.respond(R1_READY);
                let serve = match self.descriptor_reads.as_mut() {
                    None => true,
                    Some(0) => false,
                    Some(left) => {
                        *left = left.saturating_sub(1);
                        true
                    }
                };
                if serve {
                    self.queue_data(self.csd.to_vec());
                }
            }
            Some(Command::ReadSingleBlock) if self.phase == Phase::Ready => {
                let block = usize::try_from(argument)
                    .ok()
                    .filter(|start| start.checked_rem(BLOCK_SIZE) == Some(0))
                    .and_then(|start| self.image.get(start..start.checked_add(BLOCK_SIZE)?))
                    .map(<[u8]>::to_vec);
                match block {
                    Some(data) => {
                        self.respond(R1_READY);
                        self.queue_data(data);
                    }
                    None => self.respond(R1_ADDRESS_ERROR),
                }
            }
            _ => {
                let r1 = self.r1(R1_ILLEGAL_COMMAND);
                self.respond(r1);
            }
        }
    }
}

impl ByteBus for SimulatedCard {
    type Error = Infallible;

    fn exchange(&mut self, byte: u8) -> Result<u8, Infallible> {
        if self.unresponsive || !self.selected {
            return Ok(FILLER);
        }
        if self.frame_len > 0 {
            if let Some(slot) = self.frame.get_mut(self.frame_len) {
                *slot = byte;
            }
            self.frame_len = self.frame_len.saturating_add(1);
            if self.frame_len == FRAME_LEN {
                self.frame_len = 0;
                self.process();
            }
            return Ok(FILLER);
        }
        if byte & 0xC0 == 0x40 {
            // A new command aborts whatever was still queued.
            self.outbox.clear();
            self.frame = [byte, 0, 0, 0, 0, 0];
            self.frame_len = 1;
            return Ok(FILLER);
        }
        Ok(self.outbox.pop_front().unwrap_or(FILLER))
    }

    fn select(&mut self) -> Result<(), Infallible> {
        self.selected = true;
        Ok(())
    }

    fn deselect(&mut self) -> Result<(), Infallible> {
        self.selected = false;
        Ok(())
    }
}

/// CRC16-CCITT (XModem) as used for SD data blocks.
// SAFETY: shifts by constant 1 on u16; xor cannot overflow.
#[allow(clippy::arithmetic_side_effects)]
fn crc16(data: &[u8]) -> u16 {
    let mut crc = 0u16;
    for &byte in data {
        crc ^= u16::from(byte) << 8;
        for _ in 0..8 {
            crc = if crc & 0x8000 != 0 {
                (crc << 1) ^ 0x1021
            } else {
                crc << 1
            };
        }
    }
    crc
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
    use crate::command::encode_frame;
    use alloc::vec;

    fn send(card: &mut SimulatedCard, frame: [u8; FRAME_LEN]) -> u8 {
        card.select().unwrap();
        for b in frame {
            card.exchange(b).unwrap();
        }
        // NCR filler, then R1.
        assert_eq!(card.exchange(0xFF).unwrap(), 0xFF);
        let r1 = card.exchange(0xFF).unwrap();
        card.deselect().unwrap();
        r1
    }

    #[test]
    fn crc16_reference_vector() {
        assert_eq!(crc16(b"123456789"), 0x31C3);
    }

    #[test]
    fn go_idle_answers_idle() {
        let mut card = SimulatedCard::new(vec![0; 512]);
        assert_eq!(send(&mut card, Command::GoIdleState.frame(0)), R1_IDLE);
    }

    #[test]
    fn corrupted_frame_is_rejected() {
        let mut card = SimulatedCard::new(vec![0; 512]);
        let mut frame = Command::GoIdleState.frame(0);
        frame[5] = 0x01;
        assert_eq!(send(&mut card, frame), R1_CRC_ERROR | R1_IDLE);
        assert!(card.commands().is_empty());
    }

    #[test]
    fn op_cond_requires_app_prefix() {
        let mut card = SimulatedCard::new(vec![0; 512]);
        send(&mut card, Command::GoIdleState.frame(0));
        assert_eq!(send(&mut card, Command::SendOpCond.frame(0)), R1_ILLEGAL_COMMAND | R1_IDLE);
        send(&mut card, Command::AppCommand.frame(0));
        assert_eq!(send(&mut card, Command::SendOpCond.frame(0)), R1_READY);
    }

    #[test]
    fn deselected_card_does_not_drive_bus() {
        let mut card = SimulatedCard::new(vec![0; 512]);
        card.select().unwrap();
        for b in encode_frame(0, 0) {
            card.exchange(b).unwrap();
        }
        card.deselect().unwrap();
        assert_eq!(card.exchange(0xFF).unwrap(), 0xFF);
        assert_eq!(card.exchange(0xFF).unwrap(), 0xFF);
        card.select().unwrap();
        card.exchange(0xFF).unwrap();
        assert_eq!(card.exchange(0xFF).unwrap(), R1_IDLE);
    }

    #[test]
    fn image_is_padded_to_whole_sectors() {
        let card = SimulatedCard::new(vec![1; 700]);
        assert_eq!(card.image().len(), 1024);
    }

    #[test]
    fn unresponsive_card_stays_silent() {
        let mut card = SimulatedCard::new(vec![0; 512]).unresponsive();
        card.select().unwrap();
        for b in Command::GoIdleState.frame(0) {
            card.exchange(b).unwrap();
        }
        for _ in 0..16 {
            assert_eq!(card.exchange(0xFF).unwrap(), 0xFF);
        }
    }
}
