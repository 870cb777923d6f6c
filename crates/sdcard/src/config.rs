//! Retry budgets and timing for the SD driver.

/// Polling budgets used by [`crate::SdCard`].
///
/// Every wait in the driver is a bounded loop whose bound lives here. The
/// defaults are the budgets the boot stage has always shipped with; tests
/// and the simulator shrink them to keep runs short.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SdConfig {
    /// Filler bytes clocked while waiting for any response byte.
    pub response_retries: u8,
    /// CMD0 attempts before giving up on the idle state.
    pub idle_retries: u32,
    /// CMD55 + ACMD41 attempts before giving up on initialisation.
    pub op_cond_retries: u32,
    /// Pause after each ACMD41 attempt that leaves the card busy.
    pub op_cond_delay_ms: u32,
    /// Response polls while waiting for the data token.
    pub data_token_retries: u32,
}

impl SdConfig {
    /// The shipped budgets.
    pub const DEFAULT: Self = Self {
        response_retries: 8,
        idle_retries: 100,
        op_cond_retries: 1000,
        op_cond_delay_ms: 10,
        data_token_retries: 1000,
    };
}

impl Default for SdConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_matches_shipped_budgets() {
        let c = SdConfig::default();
        assert_eq!(c.response_retries, 8);
        assert_eq!(c.idle_retries, 100);
        assert_eq!(c.op_cond_retries, 1000);
        assert_eq!(c.op_cond_delay_ms, 10);
        assert_eq!(c.data_token_retries, 1000);
    }
}
