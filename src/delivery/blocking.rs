//! Delivery over blocking streams. Timeouts are the stream's own and come
//! back as [`ErrorKind::TimedOut`].

use core::net::SocketAddrV4;

use embedded_hal::blocking::delay::DelayMs;
use embedded_io::{ErrorKind, Read, Write};

use super::http::{self, RESPONSE_LOG_LIMIT};
use super::Publisher;
use crate::config::Collector;
use crate::error::Error;
use crate::logic::record::TelemetryRecord;

/// Enough for a status line and then some.
const RESPONSE_CAPACITY: usize = 256;

/// Opens blocking connections. Dropping a stream closes it.
pub trait Connector {
    type Stream: Read + Write;

    fn connect(&mut self, remote: SocketAddrV4) -> Result<Self::Stream, ErrorKind>;
}

pub struct BlockingPublisher<'c, C> {
    connector: C,
    collector: &'c Collector,
}

impl<'c, C: Connector> BlockingPublisher<'c, C> {
    pub fn new(connector: C, collector: &'c Collector) -> Self {
        Self {
            connector,
            collector,
        }
    }

    pub fn release(self) -> C {
        self.connector
    }

    fn exchange(stream: &mut C::Stream, request: &[u8]) -> Result<(), Error> {
        stream
            .write_all(request)
            .and_then(|()| stream.flush())
            .map_err(|e| {
                let kind = embedded_io::Error::kind(&e);
                error!("Write failed: {}", Kind(kind));
                match kind {
                    ErrorKind::TimedOut => Error::TransportTimeout,
                    _ => Error::TransportWriteError,
                }
            })?;

        let mut response = [0; RESPONSE_CAPACITY];
        let len = stream.read(&mut response).map_err(|e| {
            let kind = embedded_io::Error::kind(&e);
            error!("Read failed: {}", Kind(kind));
            match kind {
                ErrorKind::TimedOut => Error::TransportTimeout,
                _ => Error::TransportAbnormalClose,
            }
        })?;

        let response = &response[..len];
        if len == 0 {
            warn!("Connection closed by server before a response");
            Err(Error::TransportAbnormalClose)
        } else if http::is_success(response) {
            info!("HTTP POST successful!");
            Ok(())
        } else {
            warn!(
                "HTTP response: {=[u8]:a}",
                &response[..len.min(RESPONSE_LOG_LIMIT)]
            );
            Err(Error::DeliveryRejected)
        }
    }
}

impl<'c, C: Connector> Publisher for BlockingPublisher<'c, C> {
    fn publish<D: DelayMs<u32>>(&mut self, record: &TelemetryRecord<'_>, _delay: &mut D) -> Result<(), Error> {
        let payload = record.to_json()?;
        let request = http::post_request(self.collector.host, self.collector.path, &payload)?;
        info!("Posting data: {}", payload.as_str());

        let mut stream = self.connector.connect(self.collector.addr).map_err(|kind| {
            error!("Connect failed: {}", Kind(kind));
            match kind {
                ErrorKind::TimedOut => Error::TransportTimeout,
                _ => Error::TransportConnectError,
            }
        })?;
        // the stream is dropped, and with it closed, on every path out of here
        Self::exchange(&mut stream, request.as_bytes())
    }
}

/// Logs an [`ErrorKind`], which has no `defmt::Format` of its own.
#[cfg_attr(not(feature = "defmt"), allow(dead_code))]
struct Kind(ErrorKind);

#[cfg(feature = "defmt")]
impl defmt::Format for Kind {
    fn format(&self, f: defmt::Formatter) {
        let name = match self.0 {
            ErrorKind::TimedOut => "timed out",
            ErrorKind::ConnectionRefused => "connection refused",
            ErrorKind::ConnectionReset => "connection reset",
            ErrorKind::ConnectionAborted => "connection aborted",
            ErrorKind::NotConnected => "not connected",
            ErrorKind::BrokenPipe => "broken pipe",
            _ => "other",
        };
        defmt::write!(f, "{=str}", name)
    }
}
