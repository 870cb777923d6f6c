//! SD card command driver and bring-up state machine.
//!
//! # Bring-up
//!
//! ```text
//! Uninitialized ──initialize()──► IdleNegotiation ──R1 == 0x01──► OpCondNegotiation
//!                                      │                               │
//!                               budget spent                     R1 == 0x00
//!                                      ▼                               ▼
//!                                   Failed ◄──── CSD read fails ──── Ready
//! ```
//!
//! `Failed` is only left by calling [`SdCard::initialize`] again.

use embedded_hal::delay::DelayNs;
use platform::ByteBus;

use crate::command::{Command, DATA_TOKEN, FILLER, R1_IDLE, R1_READY};
use crate::config::SdConfig;
use crate::descriptor::CardDescriptor;
use crate::error::SdError;

/// Where the card is in the bring-up sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CardState {
    /// No initialisation attempted yet.
    Uninitialized,
    /// Sending CMD0 until the card reports idle.
    IdleNegotiation,
    /// Sending CMD55 + ACMD41 until the card reports ready.
    OpCondNegotiation,
    /// Initialised and the CSD has been read.
    Ready,
    /// The last initialisation attempt failed.
    Failed,
}

/// An SD card on a byte bus, driven in SPI mode.
///
/// Owns the bus, the delay source used between ACMD41 attempts, and the
/// last CSD read from the card.
pub struct SdCard<B, D> {
    bus: B,
    delay: D,
    config: SdConfig,
    state: CardState,
    pub(crate) descriptor: Option<CardDescriptor>,
}

impl<B: ByteBus, D: DelayNs> SdCard<B, D> {
    /// Driver with the default retry budgets.
    pub fn new(bus: B, delay: D) -> Self {
        Self::with_config(bus, delay, SdConfig::DEFAULT)
    }

    /// Driver with explicit retry budgets.
    pub fn with_config(bus: B, delay: D, config: SdConfig) -> Self {
        Self {
            bus,
            delay,
            config,
            state: CardState::Uninitialized,
            descriptor: None,
        }
    }

    /// Current bring-up state.
    pub fn state(&self) -> CardState {
        self.state
    }

    /// Retry budgets in use.
    pub fn config(&self) -> &SdConfig {
        &self.config
    }

    /// Give back the bus and the delay source.
    pub fn release(self) -> (B, D) {
        (self.bus, self.delay)
    }

    /// Clock out one command frame.
    ///
    /// Chip select is asserted, one filler byte precedes the frame, and chip
    /// select is released afterwards. The card's answer is collected by
    /// [`SdCard::await_response`].
    pub fn send_command(&mut self, command: Command, argument: u32) -> Result<(), SdError<B::Error>> {
        let frame = command.frame(argument);
        trace!("CMD{} arg {:#x}", command.index(), argument);
        self.bus.select()?;
        let sent = self.clock_frame(&frame);
        // Release chip select even when the frame failed half way.
        let released = self.bus.deselect();
        sent?;
        released?;
        Ok(())
    }

    fn clock_frame(&mut self, frame: &[u8]) -> Result<(), SdError<B::Error>> {
        self.bus.exchange(FILLER)?;
        for &byte in frame {
            self.bus.exchange(byte)?;
        }
        Ok(())
    }

    /// Poll for a response byte.
    ///
    /// Each attempt selects the card, clocks one filler byte and deselects.
    /// Stops at the first byte that is not 0xFF or after
    /// `response_retries` attempts. Running out is not an error: the last
    /// byte (0xFF) is returned and the caller decides what it means.
    pub fn await_response(&mut self) -> Result<u8, SdError<B::Error>> {
        let mut response = FILLER;
        for _ in 0..self.config.response_retries {
            self.bus.select()?;
            let received = self.bus.exchange(FILLER);
            let released = self.bus.deselect();
            response = received?;
            released?;
            if response != FILLER {
                break;
            }
        }
        Ok(response)
    }

    /// Bring the card from power-up to ready and read its CSD.
    ///
    /// The state ends as [`CardState::Ready`] on success and
    /// [`CardState::Failed`] on any error.
    pub fn initialize(&mut self) -> Result<(), SdError<B::Error>> {
        let result = self.negotiate();
        self.state = if result.is_ok() {
            CardState::Ready
        } else {
            CardState::Failed
        };
        result
    }

    fn negotiate(&mut self) -> Result<(), SdError<B::Error>> {
        self.state = CardState::IdleNegotiation;
        self.enter_idle()?;

        self.state = CardState::OpCondNegotiation;
        self.await_op_cond()?;
        info!("SD card initialized");

        match self.read_descriptor() {
            Ok(_) => Ok(()),
            Err(SdError::Bus(e)) => Err(SdError::Bus(e)),
            Err(_) => {
                error!("unable to read CSD");
                Err(SdError::DescriptorUnreadable)
            }
        }
    }

    fn enter_idle(&mut self) -> Result<(), SdError<B::Error>> {
        let mut last = FILLER;
        for _ in 0..self.config.idle_retries {
            self.send_command(Command::GoIdleState, 0)?;
            last = self.await_response()?;
            if last == R1_IDLE {
                debug!("card in idle state");
                return Ok(());
            }
        }
        error!("unable to set SD card to IDLE state (last {:#x})", last);
        Err(SdError::IdleTimeout { last })
    }

    fn await_op_cond(&mut self) -> Result<(), SdError<B::Error>> {
        let mut last = FILLER;
        for _ in 0..self.config.op_cond_retries {
            self.send_command(Command::AppCommand, 0)?;
            // The CMD55 answer only confirms the prefix was seen.
            self.await_response()?;
            self.send_command(Command::SendOpCond, 0)?;
            last = self.await_response()?;
            if last == R1_READY {
                return Ok(());
            }
            self.delay.delay_ms(self.config.op_cond_delay_ms);
        }
        error!("SD card failed to init (last {:#x})", last);
        Err(SdError::InitTimeout { last })
    }

    /// Poll until the data token arrives. `false` when the budget runs out.
    pub(crate) fn await_data_token(&mut self) -> Result<bool, SdError<B::Error>> {
        for _ in 0..self.config.data_token_retries {
            if self.await_response()? == DATA_TOKEN {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Clock in a data block after its token, then drop the CRC16.
    ///
    /// The block is read under one chip-select assertion. The two CRC bytes
    /// are clocked afterwards with the card deselected.
    pub(crate) fn receive_block(&mut self, buf: &mut [u8]) -> Result<(), SdError<B::Error>> {
        self.bus.select()?;
        let mut received = Ok(());
        for byte in buf.iter_mut() {
            match self.bus.exchange(FILLER) {
                Ok(b) => *byte = b,
                Err(e) => {
                    received = Err(e);
                    break;
                }
            }
        }
        let released = self.bus.deselect();
        received?;
        released?;

        self.bus.exchange(FILLER)?;
        self.bus.exchange(FILLER)?;
        Ok(())
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::indexing_slicing,
    clippy::arithmetic_side_effects
)]
mod tests {
    use super::*;
    use crate::sim::SimulatedCard;
    use alloc::vec;
    use alloc::vec::Vec;
    use core::convert::Infallible;
    use embedded_hal_mock::eh1::delay::NoopDelay;

    /// Bus that answers every exchange from a script, then 0xFF, and
    /// records the traffic.
    #[derive(Default)]
    struct ScriptBus {
        replies: Vec<u8>,
        sent: Vec<u8>,
        selects: usize,
        deselects: usize,
        selected: bool,
    }

    impl ByteBus for ScriptBus {
        type Error = Infallible;

        fn exchange(&mut self, byte: u8) -> Result<u8, Infallible> {
            self.sent.push(byte);
            if self.replies.is_empty() {
                Ok(0xFF)
            } else {
                Ok(self.replies.remove(0))
            }
        }

        fn select(&mut self) -> Result<(), Infallible> {
            self.selects += 1;
            self.selected = true;
            Ok(())
        }

        fn deselect(&mut self) -> Result<(), Infallible> {
            self.deselects += 1;
            self.selected = false;
            Ok(())
        }
    }

    #[test]
    fn send_command_clocks_filler_then_frame() {
        let mut card = SdCard::new(ScriptBus::default(), NoopDelay::new());
        card.send_command(Command::GoIdleState, 0).unwrap();
        let (bus, _) = card.release();
        assert_eq!(bus.sent, vec![0xFF, 0x40, 0, 0, 0, 0, 0x95]);
        assert_eq!(bus.selects, 1);
        assert_eq!(bus.deselects, 1);
        assert!(!bus.selected);
    }

    #[test]
    fn await_response_gives_up_after_eight_attempts() {
        let mut card = SdCard::new(ScriptBus::default(), NoopDelay::new());
        assert_eq!(card.await_response().unwrap(), 0xFF);
        let (bus, _) = card.release();
        assert_eq!(bus.sent.len(), 8);
        assert_eq!(bus.selects, 8);
        assert_eq!(bus.deselects, 8);
    }

    #[test]
    fn await_response_stops_at_first_answer() {
        let bus = ScriptBus {
            replies: vec![0xFF, 0xFF, 0x01, 0x00],
            ..ScriptBus::default()
        };
        let mut card = SdCard::new(bus, NoopDelay::new());
        assert_eq!(card.await_response().unwrap(), 0x01);
        let (bus, _) = card.release();
        assert_eq!(bus.sent.len(), 3);
    }

    #[test]
    fn silent_bus_fails_idle_negotiation() {
        let mut card = SdCard::new(ScriptBus::default(), NoopDelay::new());
        assert_eq!(card.initialize(), Err(SdError::IdleTimeout { last: 0xFF }));
        assert_eq!(card.state(), CardState::Failed);
        let (bus, _) = card.release();
        // 100 attempts of (filler + frame) + 8 polls.
        assert_eq!(bus.sent.len(), 100 * (7 + 8));
    }

    #[test]
    fn initialize_reaches_ready_on_simulated_card() {
        let sim = SimulatedCard::new(vec![0u8; 4 * 512]).with_op_cond_latency(3);
        let mut card = SdCard::new(sim, NoopDelay::new());
        assert_eq!(card.state(), CardState::Uninitialized);
        card.initialize().unwrap();
        assert_eq!(card.state(), CardState::Ready);
        assert!(card.descriptor().is_some());
    }

    #[test]
    fn busy_card_exhausts_op_cond_budget() {
        let sim = SimulatedCard::new(vec![0u8; 512]).with_op_cond_latency(50);
        let config = SdConfig {
            op_cond_retries: 5,
            ..SdConfig::DEFAULT
        };
        let mut card = SdCard::with_config(sim, NoopDelay::new(), config);
        assert_eq!(card.initialize(), Err(SdError::InitTimeout { last: 0x01 }));
        assert_eq!(card.state(), CardState::Failed);
        assert!(card.descriptor().is_none());
    }

    #[test]
    fn missing_csd_fails_initialisation() {
        let sim = SimulatedCard::new(vec![0u8; 512]).without_descriptor();
        let config = SdConfig {
            data_token_retries: 16,
            ..SdConfig::DEFAULT
        };
        let mut card = SdCard::with_config(sim, NoopDelay::new(), config);
        assert_eq!(card.initialize(), Err(SdError::DescriptorUnreadable));
        assert_eq!(card.state(), CardState::Failed);
    }

    #[test]
    fn failed_card_can_be_initialized_again() {
        let sim = SimulatedCard::new(vec![0u8; 512]).with_op_cond_latency(6);
        let config = SdConfig {
            op_cond_retries: 4,
            ..SdConfig::DEFAULT
        };
        let mut card = SdCard::with_config(sim, NoopDelay::new(), config);
        assert!(card.initialize().is_err());
        // The card keeps counting ACMD41 polls, so the second pass finishes.
        card.initialize().unwrap();
        assert_eq!(card.state(), CardState::Ready);
    }
}
