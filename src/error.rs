use core::fmt;

/// Everything that can go wrong in a sampling cycle or during bring-up.
///
/// Per-cycle errors are logged and the cycle is abandoned; the node carries on
/// after the regular sleep. Only the bring-up variants ([`Error::is_fatal`])
/// should stop the firmware.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// Nothing answered on the sensor's bus address
    SensorNotResponding,
    /// A device answered, but with a chip ID we don't know
    UnknownChipId(u8),
    /// The calibration block could not be read
    CalibrationUnavailable,
    /// A temperature sample could not be read from the sensor
    SensorReadFailure,
    /// No valid wall clock time within the retry budget
    ClockSyncTimeout,
    /// The time server answered with a time that can't be right
    ClockSyncInvalidResponse,
    /// The transport could not open a connection to the peer
    TransportConnectError,
    /// The transport refused the outgoing data
    TransportWriteError,
    /// The operation did not complete within its poll budget
    TransportTimeout,
    /// The connection went away before a response was accepted
    TransportAbnormalClose,
    /// The collector answered, but not with a success status
    DeliveryRejected,
    /// A fixed-capacity buffer was too small for the record
    PayloadTooLarge,
}

impl Error {
    /// Whether the error can only happen during bring-up and leaves the node
    /// without a usable sensor.
    pub const fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::SensorNotResponding | Error::UnknownChipId(_) | Error::CalibrationUnavailable
        )
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::SensorNotResponding => f.write_str("sensor not responding"),
            Error::UnknownChipId(id) => write!(f, "unknown chip id 0x{:02X}", id),
            Error::CalibrationUnavailable => f.write_str("calibration data unavailable"),
            Error::SensorReadFailure => f.write_str("failed to read temperature"),
            Error::ClockSyncTimeout => f.write_str("time synchronization timed out"),
            Error::ClockSyncInvalidResponse => f.write_str("time server sent an invalid time"),
            Error::TransportConnectError => f.write_str("connection failed"),
            Error::TransportWriteError => f.write_str("write failed"),
            Error::TransportTimeout => f.write_str("transport timed out"),
            Error::TransportAbnormalClose => f.write_str("connection closed unexpectedly"),
            Error::DeliveryRejected => f.write_str("collector rejected the record"),
            Error::PayloadTooLarge => f.write_str("payload does not fit its buffer"),
        }
    }
}
