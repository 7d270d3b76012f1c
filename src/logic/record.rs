//! The telemetry record and its JSON payload.

use ufmt::uWrite;

use super::compensation::Temperature;
use super::formatting::write_fixed;
use crate::clock::TimestampSeconds;
use crate::error::Error;

pub const PAYLOAD_CAPACITY: usize = 256;

pub type Payload = heapless::String<PAYLOAD_CAPACITY>;

/// The fixed text fields of every record a node sends.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RecordLabels<'a> {
    pub location: &'a str,
    pub sensor: &'a str,
    pub measurement: &'a str,
    pub units: &'a str,
}

impl RecordLabels<'static> {
    pub const fn bmp280(location: &'static str) -> Self {
        Self {
            location,
            sensor: "bmp280",
            measurement: "temperature",
            units: "C",
        }
    }
}

/// One measurement, ready to send.
///
/// Can only be built from a [`Temperature`] and a [`TimestampSeconds`], which
/// are valid by construction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TelemetryRecord<'a> {
    recorded_at: TimestampSeconds,
    labels: RecordLabels<'a>,
    value: Temperature,
}

impl<'a> TelemetryRecord<'a> {
    pub const fn new(recorded_at: TimestampSeconds, labels: RecordLabels<'a>, value: Temperature) -> Self {
        Self {
            recorded_at,
            labels,
            value,
        }
    }

    pub const fn recorded_at(&self) -> TimestampSeconds {
        self.recorded_at
    }

    pub const fn labels(&self) -> &RecordLabels<'a> {
        &self.labels
    }

    pub const fn value(&self) -> Temperature {
        self.value
    }

    /// Writes the record as a compact JSON object.
    ///
    /// Key order is fixed: `recorded`, `location`, `sensor`, `measurement`,
    /// `units`, `value`. The value has one decimal.
    pub fn write_json<W: uWrite + ?Sized>(&self, out: &mut W) -> Result<(), W::Error> {
        out.write_str("{\"recorded\":")?;
        ufmt::uwrite!(out, "{},", self.recorded_at.as_secs())?;
        write_field(out, "location", self.labels.location)?;
        write_field(out, "sensor", self.labels.sensor)?;
        write_field(out, "measurement", self.labels.measurement)?;
        write_field(out, "units", self.labels.units)?;
        out.write_str("\"value\":")?;
        write_fixed(out, self.value.centi_celsius(), 1)?;
        out.write_char('}')
    }

    pub fn to_json(&self) -> Result<Payload, Error> {
        let mut payload = Payload::new();
        self.write_json(&mut payload)
            .map_err(|_| Error::PayloadTooLarge)?;
        Ok(payload)
    }
}

fn write_field<W: uWrite + ?Sized>(out: &mut W, key: &str, value: &str) -> Result<(), W::Error> {
    write_json_str(out, key)?;
    out.write_char(':')?;
    write_json_str(out, value)?;
    out.write_char(',')
}

fn write_json_str<W: uWrite + ?Sized>(out: &mut W, s: &str) -> Result<(), W::Error> {
    const HEX: &[u8; 16] = b"0123456789abcdef";

    out.write_char('"')?;
    for c in s.chars() {
        match c {
            '"' => out.write_str("\\\"")?,
            '\\' => out.write_str("\\\\")?,
            c if (c as u32) < 0x20 => {
                let b = c as u8;
                out.write_str("\\u00")?;
                out.write_char(HEX[usize::from(b >> 4)] as char)?;
                out.write_char(HEX[usize::from(b & 0xF)] as char)?;
            }
            c => out.write_char(c)?,
        }
    }
    out.write_char('"')
}
