//! Bosch BMP280 (and the BME280, which shares its temperature path) over I2C.
//!
//! Only temperature is measured. Pressure oversampling is switched off so the
//! sensor never spends time on it.

use embedded_hal::blocking::delay::DelayMs;
use embedded_hal::blocking::i2c;

use crate::error::Error;
use crate::logic::compensation::{compensate, CalibrationCoefficients, RawSample, Temperature};
use crate::node::TemperatureSensor;

/// SDO tied to ground
pub const DEFAULT_ADDRESS: u8 = 0x76;
/// SDO tied to VDDIO
pub const SECONDARY_ADDRESS: u8 = 0x77;

pub const CHIP_ID_BMP280: u8 = 0x58;
pub const CHIP_ID_BME280: u8 = 0x60;

const REG_CALIBRATION: u8 = 0x88;
const REG_CHIP_ID: u8 = 0xD0;
const REG_RESET: u8 = 0xE0;
const REG_CTRL_MEAS: u8 = 0xF4;
const REG_CONFIG: u8 = 0xF5;
const REG_TEMP_MSB: u8 = 0xFA;

const RESET_COMMAND: u8 = 0xB6;
/// Standby 0.5 ms, filter off, no 3-wire SPI
const CONFIG_DEFAULT: u8 = 0x00;
/// Temperature oversampling x1, pressure skipped, normal mode
const CTRL_MEAS_TEMPERATURE_ONLY: u8 = 0x27;

const RESET_SETTLE_MS: u8 = 10;
const CONFIGURE_SETTLE_MS: u8 = 100;

pub struct BMP280<T> {
    i2c: T,
    address: u8,
    calibration: CalibrationCoefficients,
}

impl<T> BMP280<T>
where
    T: i2c::Write,
    T: i2c::WriteRead<Error = <T as i2c::Write>::Error>,
{
    /// Checks the chip, resets it, reads its calibration and starts
    /// measuring. Any error here means the node can't do its job.
    pub fn init<D: DelayMs<u8>>(i2c: T, address: u8, delay: &mut D) -> Result<Self, Error> {
        let mut sensor = BMP280 {
            i2c,
            address,
            calibration: CalibrationCoefficients { t1: 0, t2: 0, t3: 0 },
        };

        let chip_id = sensor.read_chip_id()?;
        match chip_id {
            CHIP_ID_BMP280 => info!("Found BMP280 at {=u8:#x}", address),
            CHIP_ID_BME280 => info!("Found BME280 at {=u8:#x}", address),
            other => {
                error!("Unexpected chip id {=u8:#x}", other);
                return Err(Error::UnknownChipId(other));
            }
        }

        sensor.write_register(REG_RESET, RESET_COMMAND)?;
        delay.delay_ms(RESET_SETTLE_MS);

        let mut calibration = [0; 6];
        sensor
            .i2c
            .write_read(sensor.address, &[REG_CALIBRATION], &mut calibration)
            .map_err(|_| {
                error!("Failed to read calibration data");
                Error::CalibrationUnavailable
            })?;
        sensor.calibration = CalibrationCoefficients::load(&calibration);
        debug!("Calibration: {}", sensor.calibration);

        sensor.write_register(REG_CONFIG, CONFIG_DEFAULT)?;
        sensor.write_register(REG_CTRL_MEAS, CTRL_MEAS_TEMPERATURE_ONLY)?;
        delay.delay_ms(CONFIGURE_SETTLE_MS);

        Ok(sensor)
    }

    pub fn calibration(&self) -> &CalibrationCoefficients {
        &self.calibration
    }

    pub fn read_raw(&mut self) -> Result<RawSample, Error> {
        let mut registers = [0; 3];
        self.i2c
            .write_read(self.address, &[REG_TEMP_MSB], &mut registers)
            .map_err(|_| {
                error!("Failed to read temperature registers");
                Error::SensorReadFailure
            })?;
        Ok(RawSample::from_registers(registers))
    }

    pub fn release(self) -> T {
        self.i2c
    }

    fn read_chip_id(&mut self) -> Result<u8, Error> {
        let mut chip_id = [0];
        self.i2c
            .write_read(self.address, &[REG_CHIP_ID], &mut chip_id)
            .map_err(|_| {
                error!("No sensor answering at {=u8:#x}", self.address);
                Error::SensorNotResponding
            })?;
        Ok(chip_id[0])
    }

    fn write_register(&mut self, register: u8, value: u8) -> Result<(), Error> {
        // must live in RAM for the TWIM DMA
        let command = [register, value];
        self.i2c.write(self.address, &command).map_err(|_| {
            error!("Failed to write register {=u8:#x}", register);
            Error::SensorNotResponding
        })
    }
}

impl<T> TemperatureSensor for BMP280<T>
where
    T: i2c::Write,
    T: i2c::WriteRead<Error = <T as i2c::Write>::Error>,
{
    fn read_temperature(&mut self) -> Result<Temperature, Error> {
        let sample = self.read_raw()?;
        Ok(compensate(sample, &self.calibration))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_hal_mock::delay::MockNoop;
    use embedded_hal_mock::i2c::{Mock as I2cMock, Transaction};
    use embedded_hal_mock::MockError;
    use std::io::ErrorKind;

    // T1 = 27504, T2 = 26435, T3 = -1000
    const CALIBRATION: [u8; 6] = [0x70, 0x6B, 0x43, 0x67, 0x18, 0xFC];

    fn bring_up(chip_id: u8) -> Vec<Transaction> {
        vec![
            Transaction::write_read(DEFAULT_ADDRESS, vec![REG_CHIP_ID], vec![chip_id]),
            Transaction::write(DEFAULT_ADDRESS, vec![REG_RESET, RESET_COMMAND]),
            Transaction::write_read(DEFAULT_ADDRESS, vec![REG_CALIBRATION], CALIBRATION.to_vec()),
            Transaction::write(DEFAULT_ADDRESS, vec![REG_CONFIG, 0x00]),
            Transaction::write(DEFAULT_ADDRESS, vec![REG_CTRL_MEAS, 0x27]),
        ]
    }

    #[test]
    fn init_loads_calibration() {
        let i2c = I2cMock::new(&bring_up(CHIP_ID_BMP280));
        let sensor = BMP280::init(i2c, DEFAULT_ADDRESS, &mut MockNoop::new()).unwrap();
        assert_eq!(
            *sensor.calibration(),
            CalibrationCoefficients {
                t1: 27504,
                t2: 26435,
                t3: -1000,
            }
        );
        sensor.release().done();
    }

    #[test]
    fn accepts_bme280() {
        let i2c = I2cMock::new(&bring_up(CHIP_ID_BME280));
        let sensor = BMP280::init(i2c, DEFAULT_ADDRESS, &mut MockNoop::new()).unwrap();
        sensor.release().done();
    }

    #[test]
    fn rejects_unknown_chip() {
        let mut i2c = I2cMock::new(&[Transaction::write_read(
            DEFAULT_ADDRESS,
            vec![REG_CHIP_ID],
            vec![0x55],
        )]);
        let result = BMP280::init(i2c.clone(), DEFAULT_ADDRESS, &mut MockNoop::new());
        assert_eq!(result.err(), Some(Error::UnknownChipId(0x55)));
        i2c.done();
    }

    #[test]
    fn silent_bus() {
        let mut i2c = I2cMock::new(&[Transaction::write_read(
            SECONDARY_ADDRESS,
            vec![REG_CHIP_ID],
            vec![0],
        )
        .with_error(MockError::Io(ErrorKind::Other))]);
        let result = BMP280::init(i2c.clone(), SECONDARY_ADDRESS, &mut MockNoop::new());
        assert_eq!(result.err(), Some(Error::SensorNotResponding));
        i2c.done();
    }

    #[test]
    fn calibration_read_fails() {
        let mut expectations = bring_up(CHIP_ID_BMP280);
        expectations.truncate(2);
        expectations.push(
            Transaction::write_read(DEFAULT_ADDRESS, vec![REG_CALIBRATION], vec![0; 6])
                .with_error(MockError::Io(ErrorKind::Other)),
        );
        let mut i2c = I2cMock::new(&expectations);
        let result = BMP280::init(i2c.clone(), DEFAULT_ADDRESS, &mut MockNoop::new());
        assert_eq!(result.err(), Some(Error::CalibrationUnavailable));
        i2c.done();
    }

    #[test]
    fn reads_temperature() {
        let mut expectations = bring_up(CHIP_ID_BMP280);
        expectations.push(Transaction::write_read(
            DEFAULT_ADDRESS,
            vec![REG_TEMP_MSB],
            vec![0x7E, 0xED, 0x00],
        ));
        let i2c = I2cMock::new(&expectations);
        let mut sensor = BMP280::init(i2c, DEFAULT_ADDRESS, &mut MockNoop::new()).unwrap();
        assert_eq!(sensor.read_temperature().map(|t| t.centi_celsius()), Ok(2508));
        sensor.release().done();
    }

    #[test]
    fn failed_read_is_not_a_temperature() {
        let mut expectations = bring_up(CHIP_ID_BMP280);
        expectations.push(
            Transaction::write_read(DEFAULT_ADDRESS, vec![REG_TEMP_MSB], vec![0; 3])
                .with_error(MockError::Io(ErrorKind::Other)),
        );
        let i2c = I2cMock::new(&expectations);
        let mut sensor = BMP280::init(i2c, DEFAULT_ADDRESS, &mut MockNoop::new()).unwrap();
        assert_eq!(sensor.read_temperature(), Err(Error::SensorReadFailure));
        sensor.release().done();
    }
}
