use embedded_hal::blocking::delay::DelayMs;

use crate::error::Error;

pub mod managed;
pub mod ntp;

/// 2016-01-01T00:00:00Z. Anything earlier means the clock was never set.
pub const EARLIEST_VALID_SECS: u32 = 1_451_606_400;

/// Seconds since the Unix epoch, known to be past [`EARLIEST_VALID_SECS`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TimestampSeconds(u32);

impl TimestampSeconds {
    /// Returns `None` for times before 2016.
    pub const fn new(secs: u32) -> Option<Self> {
        if secs >= EARLIEST_VALID_SECS {
            Some(Self(secs))
        } else {
            None
        }
    }

    pub const fn as_secs(&self) -> u32 {
        self.0
    }
}

/// Something that can tell the time once per sampling cycle.
pub trait ClockSource {
    /// Produces a validated timestamp, or the reason there is none.
    ///
    /// `delay` is the only way an implementation may wait.
    fn timestamp<D: DelayMs<u32>>(&mut self, delay: &mut D) -> Result<TimestampSeconds, Error>;
}
