use embedded_hal::blocking::delay::DelayMs;

use crate::clock::ClockSource;
use crate::config::Config;
use crate::delivery::Publisher;
use crate::error::Error;
use crate::logic::compensation::Temperature;
use crate::logic::formatting::format_fixed_measurement;
use crate::logic::record::TelemetryRecord;

/// A source of compensated temperatures.
pub trait TemperatureSensor {
    fn read_temperature(&mut self) -> Result<Temperature, Error>;
}

pub struct TelemetryNode<'c, S, C, P> {
    config: &'c Config,
    sensor: S,
    clock: C,
    publisher: P,
    readings: u32,
}

impl<'c, S, C, P> TelemetryNode<'c, S, C, P>
where
    S: TemperatureSensor,
    C: ClockSource,
    P: Publisher,
{
    pub fn new(config: &'c Config, sensor: S, clock: C, publisher: P) -> Self {
        Self {
            config,
            sensor,
            clock,
            publisher,
            readings: 0,
        }
    }

    /// Number of cycles started so far.
    pub fn readings(&self) -> u32 {
        self.readings
    }

    pub fn release(self) -> (S, C, P) {
        (self.sensor, self.clock, self.publisher)
    }

    /// One reading and at most one delivery. Doesn't sleep afterwards.
    ///
    /// The clock and the publisher are only asked once there is a temperature
    /// to send.
    pub fn run_cycle<D: DelayMs<u32>>(&mut self, delay: &mut D) -> Result<(), Error> {
        self.readings = self.readings.wrapping_add(1);
        info!("Reading #{=u32}", self.readings);

        let temperature = self.sensor.read_temperature()?;
        info!(
            "Temperature: {=str}",
            format_fixed_measurement(temperature.centi_celsius(), 2, "C").as_str()
        );

        let recorded_at = self.clock.timestamp(delay)?;
        info!("Time: {=u32}", recorded_at.as_secs());

        let record = TelemetryRecord::new(recorded_at, self.config.labels, temperature);
        self.publisher.publish(&record, delay)
    }

    /// Runs a cycle, then sleeps the sampling period.
    pub fn step<D: DelayMs<u32>>(&mut self, delay: &mut D) -> Result<(), Error> {
        let result = self.run_cycle(delay);
        if let Err(e) = result {
            warn!("Cycle failed: {}", e);
        }
        delay.delay_ms(self.config.sampling_period_ms());
        result
    }

    pub fn run<D: DelayMs<u32>>(&mut self, delay: &mut D) -> ! {
        loop {
            // failures are logged by `step` and the next cycle starts regardless
            let _ = self.step(delay);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::TimestampSeconds;

    struct Fixed(Result<Temperature, Error>);

    impl TemperatureSensor for Fixed {
        fn read_temperature(&mut self) -> Result<Temperature, Error> {
            self.0
        }
    }

    struct Clock(Result<u32, Error>);

    impl ClockSource for Clock {
        fn timestamp<D: DelayMs<u32>>(&mut self, _delay: &mut D) -> Result<TimestampSeconds, Error> {
            self.0
                .and_then(|secs| TimestampSeconds::new(secs).ok_or(Error::ClockSyncInvalidResponse))
        }
    }

    #[derive(Default)]
    struct Outbox(Vec<(u32, i32)>);

    impl Publisher for Outbox {
        fn publish<D: DelayMs<u32>>(&mut self, record: &TelemetryRecord<'_>, _delay: &mut D) -> Result<(), Error> {
            self.0
                .push((record.recorded_at().as_secs(), record.value().centi_celsius()));
            Ok(())
        }
    }

    #[derive(Default)]
    struct Sleeps(Vec<u32>);

    impl DelayMs<u32> for Sleeps {
        fn delay_ms(&mut self, ms: u32) {
            self.0.push(ms);
        }
    }

    #[test]
    fn publishes_reading() {
        let config = Config::default();
        let mut node = TelemetryNode::new(
            &config,
            Fixed(Ok(Temperature::from_centi_celsius(2130))),
            Clock(Ok(1_700_000_000)),
            Outbox::default(),
        );
        let mut sleeps = Sleeps::default();
        assert_eq!(node.step(&mut sleeps), Ok(()));
        assert_eq!(sleeps.0, [60_000]);
        assert_eq!(node.readings(), 1);

        let (_, _, outbox) = node.release();
        assert_eq!(outbox.0, [(1_700_000_000, 2130)]);
    }

    #[test]
    fn clock_failure_skips_delivery() {
        let config = Config::default();
        let mut node = TelemetryNode::new(
            &config,
            Fixed(Ok(Temperature::from_centi_celsius(2130))),
            Clock(Err(Error::ClockSyncTimeout)),
            Outbox::default(),
        );
        let mut sleeps = Sleeps::default();
        assert_eq!(node.step(&mut sleeps), Err(Error::ClockSyncTimeout));
        assert_eq!(sleeps.0, [60_000]);

        let (_, _, outbox) = node.release();
        assert!(outbox.0.is_empty());
    }

    #[test]
    fn counts_every_cycle() {
        let config = Config::default();
        let mut node = TelemetryNode::new(
            &config,
            Fixed(Err(Error::SensorReadFailure)),
            Clock(Ok(1_700_000_000)),
            Outbox::default(),
        );
        let mut sleeps = Sleeps::default();
        for _ in 0..3 {
            assert_eq!(node.step(&mut sleeps), Err(Error::SensorReadFailure));
        }
        assert_eq!(node.readings(), 3);
        assert_eq!(sleeps.0, [60_000; 3]);
    }
}
