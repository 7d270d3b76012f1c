use core::net::{Ipv4Addr, SocketAddrV4};
use core::time::Duration;

use crate::clock::managed::SyncRetry;
use crate::clock::ntp::NTP_PORT;
use crate::logic::record::RecordLabels;
use crate::net::poll::PollBudget;
use crate::peripherals::bmp280;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Collector {
    pub addr: SocketAddrV4,
    /// Sent as the `Host` header
    pub host: &'static str,
    pub path: &'static str,
}

impl Collector {
    pub const fn new(addr: SocketAddrV4, host: &'static str, path: &'static str) -> Self {
        Self { addr, host, path }
    }
}

impl Default for Collector {
    fn default() -> Self {
        Self::new(
            SocketAddrV4::new(Ipv4Addr::new(192, 168, 1, 100), 80),
            "192.168.1.100",
            "/api/temperature",
        )
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Timing {
    /// Sleep between two dispatch calls of the poll loop
    pub poll_quantum: Duration,
    pub ntp_timeout: Duration,
    pub delivery_timeout: Duration,
    /// How often to check a platform-managed clock before giving up
    pub clock_sync_attempts: u8,
    pub clock_sync_spacing: Duration,
}

impl Timing {
    pub const DEFAULT: Timing = Timing {
        poll_quantum: Duration::from_millis(100),
        ntp_timeout: Duration::from_secs(5),
        delivery_timeout: Duration::from_secs(10),
        clock_sync_attempts: 10,
        clock_sync_spacing: Duration::from_secs(2),
    };

    pub const fn ntp_budget(&self) -> PollBudget {
        PollBudget::new(self.ntp_timeout, self.poll_quantum)
    }

    pub const fn delivery_budget(&self) -> PollBudget {
        PollBudget::new(self.delivery_timeout, self.poll_quantum)
    }

    pub const fn clock_sync_retry(&self) -> SyncRetry {
        SyncRetry::new(self.clock_sync_attempts, self.clock_sync_spacing)
    }
}

impl Default for Timing {
    fn default() -> Self {
        Self::DEFAULT
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Config {
    pub collector: Collector,
    pub ntp_server: SocketAddrV4,
    pub labels: RecordLabels<'static>,
    /// I2C address of the BMP280
    pub sensor_address: u8,
    pub sampling_period: Duration,
    pub timing: Timing,
}

impl Config {
    /// A node reporting to `collector` with the default sensor address,
    /// sampling period and timing.
    pub const fn new(collector: Collector, ntp_server: SocketAddrV4, labels: RecordLabels<'static>) -> Self {
        Self {
            collector,
            ntp_server,
            labels,
            sensor_address: bmp280::DEFAULT_ADDRESS,
            sampling_period: Duration::from_secs(60),
            timing: Timing::DEFAULT,
        }
    }

    pub fn sampling_period_ms(&self) -> u32 {
        u32::try_from(self.sampling_period.as_millis()).unwrap_or(u32::MAX)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new(
            Collector::default(),
            // one of Google's public NTP servers
            SocketAddrV4::new(Ipv4Addr::new(216, 239, 35, 0), NTP_PORT),
            RecordLabels::bmp280("den"),
        )
    }
}
