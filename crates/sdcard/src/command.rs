//! SD command set and frame encoding (SPI mode).
//!
//! A frame is six bytes:
//!
//! ```text
//! [0]    0b01 | command index (6 bits)
//! [1..5] argument, big-endian
//! [5]    CRC7 << 1 | 1
//! ```

use crate::crc::crc7_byte;

/// Length of an encoded command frame.
pub const FRAME_LEN: usize = 6;

/// Filler clocked out while waiting; also what an idle card returns.
pub const FILLER: u8 = 0xFF;

/// Token that precedes every data block the card sends.
pub const DATA_TOKEN: u8 = 0xFE;

/// R1 with no flags set: the command was accepted and the card is ready.
pub const R1_READY: u8 = 0x00;

/// R1 with only the in-idle-state flag set.
pub const R1_IDLE: u8 = 0x01;

/// R1 flag: illegal command.
pub const R1_ILLEGAL_COMMAND: u8 = 0x04;

/// R1 flag: command CRC check failed.
pub const R1_CRC_ERROR: u8 = 0x08;

/// R1 flag: misaligned address.
pub const R1_ADDRESS_ERROR: u8 = 0x20;

/// Commands this driver issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Command {
    /// CMD0: software reset into SPI idle state.
    GoIdleState = 0x00,
    /// CMD9: read the card-specific data register.
    SendCsd = 0x09,
    /// CMD17: read one block.
    ReadSingleBlock = 0x11,
    /// ACMD41: start initialisation. Must follow [`Command::AppCommand`].
    SendOpCond = 0x29,
    /// CMD55: the next command is application-specific.
    AppCommand = 0x37,
}

impl Command {
    /// The 6-bit command index.
    #[must_use]
    pub const fn index(self) -> u8 {
        self as u8
    }

    /// Look up a command by its index.
    #[must_use]
    pub const fn from_index(index: u8) -> Option<Self> {
        match index {
            0x00 => Some(Self::GoIdleState),
            0x09 => Some(Self::SendCsd),
            0x11 => Some(Self::ReadSingleBlock),
            0x29 => Some(Self::SendOpCond),
            0x37 => Some(Self::AppCommand),
            _ => None,
        }
    }

    /// Encode the full frame for this command.
    #[must_use]
    pub fn frame(self, argument: u32) -> [u8; FRAME_LEN] {
        encode_frame(self.index(), argument)
    }
}

/// Encode a frame for an arbitrary command index.
///
/// The top two bits of `index` are discarded; the start and transmission
/// bits are always `01`.
#[must_use]
pub fn encode_frame(index: u8, argument: u32) -> [u8; FRAME_LEN] {
    let [a0, a1, a2, a3] = argument.to_be_bytes();
    let head = [0x40 | (index & 0x3F), a0, a1, a2, a3];
    let [h0, h1, h2, h3, h4] = head;
    [h0, h1, h2, h3, h4, crc7_byte(&head)]
}
