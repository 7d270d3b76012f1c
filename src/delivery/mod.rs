use embedded_hal::blocking::delay::DelayMs;

use crate::error::Error;
use crate::logic::record::TelemetryRecord;

pub mod attempt;
pub mod blocking;
pub mod http;

pub trait Publisher {
    /// Delivers `record` once. Failures are not retried.
    fn publish<D: DelayMs<u32>>(&mut self, record: &TelemetryRecord<'_>, delay: &mut D) -> Result<(), Error>;
}
