//! Clock kept in sync by the platform (an SNTP service in the OS, an RTC set
//! by someone else). All we can do is wait until it looks right.

use core::time::Duration;

use embedded_hal::blocking::delay::DelayMs;

use super::{ClockSource, TimestampSeconds};
use crate::error::Error;

/// The platform's idea of the current time.
pub trait WallClock {
    /// Seconds since the Unix epoch; garbage until the platform has synced.
    fn now(&mut self) -> u32;
}

/// How long to wait for the platform clock.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SyncRetry {
    pub attempts: u8,
    pub spacing_ms: u32,
}

impl SyncRetry {
    pub const fn new(attempts: u8, spacing: Duration) -> Self {
        let spacing_ms = spacing.as_millis();
        Self {
            attempts,
            spacing_ms: if spacing_ms > u32::MAX as u128 {
                u32::MAX
            } else {
                spacing_ms as u32
            },
        }
    }
}

impl Default for SyncRetry {
    fn default() -> Self {
        Self::new(10, Duration::from_secs(2))
    }
}

pub struct ManagedClock<W> {
    clock: W,
    retry: SyncRetry,
}

impl<W: WallClock> ManagedClock<W> {
    pub fn new(clock: W, retry: SyncRetry) -> Self {
        Self { clock, retry }
    }

    pub fn release(self) -> W {
        self.clock
    }
}

impl<W: WallClock> ClockSource for ManagedClock<W> {
    /// Checks the clock up to `attempts` times, sleeping `spacing` between
    /// checks (not after the last one).
    fn timestamp<D: DelayMs<u32>>(&mut self, delay: &mut D) -> Result<TimestampSeconds, Error> {
        for attempt in 1..=self.retry.attempts {
            if let Some(timestamp) = TimestampSeconds::new(self.clock.now()) {
                return Ok(timestamp);
            }
            if attempt < self.retry.attempts {
                info!(
                    "Waiting for system time to be set... ({=u8}/{=u8})",
                    attempt,
                    self.retry.attempts
                );
                delay.delay_ms(self.retry.spacing_ms);
            }
        }
        error!("Failed to obtain time");
        Err(Error::ClockSyncTimeout)
    }
}
