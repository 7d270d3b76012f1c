//! BMP280 temperature compensation, datasheet section 3.11.3.

/// Temperature trimming parameters `dig_T1..dig_T3`.
///
/// Read once from the sensor's calibration block at bring-up and never changed
/// afterwards.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CalibrationCoefficients {
    pub t1: u16,
    pub t2: i16,
    pub t3: i16,
}

impl CalibrationCoefficients {
    /// Parses the six bytes starting at register `0x88`.
    ///
    /// Each coefficient is stored little endian.
    pub const fn load(bytes: &[u8; 6]) -> Self {
        Self {
            t1: u16::from_le_bytes([bytes[0], bytes[1]]),
            t2: i16::from_le_bytes([bytes[2], bytes[3]]),
            t3: i16::from_le_bytes([bytes[4], bytes[5]]),
        }
    }

    /// The calibration block these coefficients were loaded from.
    pub const fn to_bytes(&self) -> [u8; 6] {
        let t1 = self.t1.to_le_bytes();
        let t2 = self.t2.to_le_bytes();
        let t3 = self.t3.to_le_bytes();
        [t1[0], t1[1], t2[0], t2[1], t3[0], t3[1]]
    }
}

/// Uncompensated 20 bit temperature reading.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RawSample {
    pub adc_t: i32,
}

impl RawSample {
    /// Assembles the sample from the `temp_msb`, `temp_lsb` and `temp_xlsb`
    /// registers, in that order. Only the upper nibble of `xlsb` is used.
    pub const fn from_registers(registers: [u8; 3]) -> Self {
        let [msb, lsb, xlsb] = registers;
        let adc_t = ((msb as i32) << 12) | ((lsb as i32) << 4) | ((xlsb as i32) >> 4);
        Self { adc_t }
    }
}

/// A compensated temperature, kept in hundredths of a degree Celsius.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Temperature {
    centi_celsius: i32,
}

impl Temperature {
    pub const fn from_centi_celsius(centi_celsius: i32) -> Self {
        Self { centi_celsius }
    }

    pub const fn centi_celsius(&self) -> i32 {
        self.centi_celsius
    }

    pub fn celsius(&self) -> f32 {
        self.centi_celsius as f32 / 100.
    }
}

/// Converts a raw sample into a temperature.
///
/// The shifts and multiplications follow the datasheet's 32 bit integer
/// reference code step by step; reordering them changes the result. Wrapping
/// arithmetic keeps garbage coefficients from panicking: they produce a
/// meaningless but deterministic value, the same as the reference code.
pub fn compensate(sample: RawSample, calibration: &CalibrationCoefficients) -> Temperature {
    let adc_t = sample.adc_t;
    let t1 = calibration.t1 as i32;
    let t2 = calibration.t2 as i32;
    let t3 = calibration.t3 as i32;

    let var1 = ((adc_t >> 3).wrapping_sub(t1 << 1)).wrapping_mul(t2) >> 11;
    let delta = (adc_t >> 4).wrapping_sub(t1);
    let var2 = ((delta.wrapping_mul(delta) >> 12).wrapping_mul(t3)) >> 14;

    let t_fine = var1.wrapping_add(var2);
    let centi_celsius = t_fine.wrapping_mul(5).wrapping_add(128) >> 8;

    Temperature::from_centi_celsius(centi_celsius)
}
