//! Single-sector reads (CMD17).

use embedded_hal::delay::DelayNs;
use platform::{BlockDevice, ByteBus, BLOCK_SIZE};

use crate::command::{Command, R1_READY};
use crate::driver::SdCard;
use crate::error::SdError;

// 512 fits in u32.
#[allow(clippy::cast_possible_truncation)]
const BLOCK_BYTES: u32 = BLOCK_SIZE as u32;

impl<B: ByteBus, D: DelayNs> SdCard<B, D> {
    /// Read sector `index` into the first [`BLOCK_SIZE`] bytes of `buf`.
    ///
    /// Those bytes are zeroed before anything is sent, and zeroed again if
    /// the transfer fails part way, so a failed read never leaves stale or
    /// partial data behind. The sector is addressed by byte
    /// (`index * 512`), which only standard-capacity cards accept. The
    /// block CRC16 is discarded.
    pub fn read_sector(&mut self, index: u32, buf: &mut [u8]) -> Result<(), SdError<B::Error>> {
        let len = buf.len();
        let block = buf
            .get_mut(..BLOCK_SIZE)
            .ok_or(SdError::BufferTooSmall { len })?;
        block.fill(0);

        let address = index
            .checked_mul(BLOCK_BYTES)
            .ok_or(SdError::AddressOutOfRange { sector: index })?;

        self.send_command(Command::ReadSingleBlock, address)?;
        let r1 = self.await_response()?;
        if r1 != R1_READY {
            error!("bad card response {:#x} for sector {}", r1, index);
            return Err(SdError::BadResponse(r1));
        }
        if !self.await_data_token()? {
            error!("read timeout on sector {}", index);
            return Err(SdError::ReadTimeout);
        }
        if let Err(e) = self.receive_block(block) {
            block.fill(0);
            return Err(e);
        }
        Ok(())
    }
}

impl<B: ByteBus, D: DelayNs> BlockDevice for SdCard<B, D> {
    type Error = SdError<B::Error>;

    fn read_block(&mut self, index: u32, buf: &mut [u8; BLOCK_SIZE]) -> Result<(), Self::Error> {
        self.read_sector(index, buf)
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::indexing_slicing,
    clippy::cast_possible_truncation,
    clippy::arithmetic_side_effects
)]
mod tests {
    use super::*;
    use crate::config::SdConfig;
    use crate::sim::SimulatedCard;
    use alloc::vec::Vec;
    use embedded_hal_mock::eh1::delay::NoopDelay;

    fn image(sectors: usize) -> Vec<u8> {
        (0..sectors * BLOCK_SIZE).map(|i| (i / BLOCK_SIZE + i % 7) as u8).collect()
    }

    fn ready_card(sim: SimulatedCard, config: SdConfig) -> SdCard<SimulatedCard, NoopDelay> {
        let mut card = SdCard::with_config(sim, NoopDelay::new(), config);
        card.initialize().unwrap();
        card
    }

    #[test]
    fn reads_requested_sector() {
        let data = image(4);
        let mut card = ready_card(SimulatedCard::new(data.clone()), SdConfig::DEFAULT);
        let mut buf = [0u8; BLOCK_SIZE];
        card.read_sector(2, &mut buf).unwrap();
        assert_eq!(&buf[..], &data[2 * BLOCK_SIZE..3 * BLOCK_SIZE]);
    }

    #[test]
    fn repeated_reads_are_identical() {
        let mut card = ready_card(SimulatedCard::new(image(2)), SdConfig::DEFAULT);
        let mut first = [0u8; BLOCK_SIZE];
        let mut second = [0xAAu8; BLOCK_SIZE];
        card.read_sector(0, &mut first).unwrap();
        card.read_sector(0, &mut second).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn bad_response_leaves_buffer_zeroed() {
        let mut card = ready_card(SimulatedCard::new(image(2)), SdConfig::DEFAULT);
        let mut buf = [0x5Au8; BLOCK_SIZE];
        // Past the end of the image: the card rejects the address.
        let err = card.read_sector(9, &mut buf).unwrap_err();
        assert!(matches!(err, SdError::BadResponse(r) if r != 0));
        assert!(buf.iter().all(|&b| b == 0));
    }

    #[test]
    fn token_timeout_leaves_buffer_zeroed() {
        let sim = SimulatedCard::new(image(1)).with_token_latency(100);
        let (sim, delay) = ready_card(sim, SdConfig::DEFAULT).release();
        let config = SdConfig {
            data_token_retries: 4,
            ..SdConfig::DEFAULT
        };
        let mut card = SdCard::with_config(sim, delay, config);
        let mut buf = [0x22u8; BLOCK_SIZE];
        assert_eq!(card.read_sector(0, &mut buf), Err(SdError::ReadTimeout));
        assert!(buf.iter().all(|&b| b == 0));
    }

    /// Bus fault raised by [`Glitching`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    struct Glitch;

    /// Simulated card whose bus fails once `trip_at` exchanges have passed.
    struct Glitching {
        inner: SimulatedCard,
        exchanges: usize,
        trip_at: Option<usize>,
    }

    impl ByteBus for Glitching {
        type Error = Glitch;

        fn exchange(&mut self, byte: u8) -> Result<u8, Glitch> {
            self.exchanges += 1;
            if self.trip_at.is_some_and(|at| self.exchanges > at) {
                return Err(Glitch);
            }
            Ok(self.inner.exchange(byte).unwrap())
        }

        fn select(&mut self) -> Result<(), Glitch> {
            self.inner.select().map_err(|_| Glitch)
        }

        fn deselect(&mut self) -> Result<(), Glitch> {
            self.inner.deselect().map_err(|_| Glitch)
        }
    }

    #[test]
    fn bus_fault_mid_block_leaves_buffer_zeroed() {
        let bus = Glitching {
            inner: SimulatedCard::new(image(1)),
            exchanges: 0,
            trip_at: None,
        };
        let mut card = SdCard::new(bus, NoopDelay::new());
        card.initialize().unwrap();
        let (mut bus, delay) = card.release();
        // Command, R1 and token take about ten exchanges; the block is 512.
        bus.trip_at = Some(bus.exchanges + 200);
        let mut card = SdCard::new(bus, delay);

        let mut buf = [0x44u8; BLOCK_SIZE];
        assert_eq!(card.read_sector(0, &mut buf), Err(SdError::Bus(Glitch)));
        assert!(buf.iter().all(|&b| b == 0));
        let (bus, _) = card.release();
        assert!(bus.exchanges > bus.trip_at.unwrap());
    }

    #[test]
    fn uninitialised_card_rejects_read() {
        let mut card = SdCard::new(SimulatedCard::new(image(1)), NoopDelay::new());
        let mut buf = [0x11u8; BLOCK_SIZE];
        assert!(matches!(card.read_sector(0, &mut buf), Err(SdError::BadResponse(_))));
        assert!(buf.iter().all(|&b| b == 0));
    }

    #[test]
    fn short_buffer_is_rejected() {
        let mut card = ready_card(SimulatedCard::new(image(1)), SdConfig::DEFAULT);
        let mut buf = [0u8; 100];
        assert_eq!(
            card.read_sector(0, &mut buf),
            Err(SdError::BufferTooSmall { len: 100 })
        );
    }

    #[test]
    fn larger_buffer_keeps_tail() {
        let data = image(1);
        let mut card = ready_card(SimulatedCard::new(data.clone()), SdConfig::DEFAULT);
        let mut buf = [0x77u8; BLOCK_SIZE + 4];
        card.read_sector(0, &mut buf).unwrap();
        assert_eq!(&buf[..BLOCK_SIZE], &data[..]);
        assert_eq!(&buf[BLOCK_SIZE..], &[0x77; 4]);
    }

    #[test]
    fn byte_address_overflow_is_reported() {
        let mut card = ready_card(SimulatedCard::new(image(1)), SdConfig::DEFAULT);
        let mut buf = [0x33u8; BLOCK_SIZE];
        let sector = u32::MAX / 512 + 1;
        assert_eq!(
            card.read_sector(sector, &mut buf),
            Err(SdError::AddressOutOfRange { sector })
        );
        assert!(buf.iter().all(|&b| b == 0));
    }

    #[test]
    fn sector_address_is_sent_in_bytes() {
        let mut card = ready_card(SimulatedCard::new(image(4)), SdConfig::DEFAULT);
        let mut buf = [0u8; BLOCK_SIZE];
        card.read_sector(3, &mut buf).unwrap();
        let (sim, _) = card.release();
        assert_eq!(sim.commands().last(), Some(&(0x11, 3 * 512)));
    }

    #[test]
    fn block_device_reads_through_driver() {
        let data = image(2);
        let mut card = ready_card(SimulatedCard::new(data.clone()), SdConfig::DEFAULT);
        let mut block = [0u8; BLOCK_SIZE];
        card.read_block(1, &mut block).unwrap();
        assert_eq!(&block[..], &data[BLOCK_SIZE..]);
    }
}
