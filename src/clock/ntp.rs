//! Minimal SNTP client (RFC 4330). Only the transmit seconds are used.

use core::net::SocketAddrV4;

use embedded_hal::blocking::delay::DelayMs;

use super::{ClockSource, TimestampSeconds};
use crate::error::Error;
use crate::net::poll::{self, Completion, PollBudget};
use crate::net::{DatagramHandler, DatagramSocket, UdpStack};

pub const NTP_PORT: u16 = 123;
pub const PACKET_LEN: usize = 48;

/// Seconds from 1900-01-01 (NTP era 0) to 1970-01-01.
pub const UNIX_EPOCH_OFFSET: u32 = 2_208_988_800;

const TRANSMIT_TIMESTAMP_OFFSET: usize = 40;

/// LI = 0 (no warning), VN = 3, mode = 3 (client)
const CLIENT_HEADER: u8 = 0b00_011_011;

pub const fn request_packet() -> [u8; PACKET_LEN] {
    let mut packet = [0; PACKET_LEN];
    packet[0] = CLIENT_HEADER;
    packet
}

/// Seconds part of the transmit timestamp, or `None` if `packet` is too short
/// to be a reply.
pub fn transmit_seconds(packet: &[u8]) -> Option<u32> {
    if packet.len() < PACKET_LEN {
        return None;
    }
    let field = packet.get(TRANSMIT_TIMESTAMP_OFFSET..TRANSMIT_TIMESTAMP_OFFSET + 4)?;
    Some(u32::from_be_bytes([field[0], field[1], field[2], field[3]]))
}

/// NTP seconds to Unix seconds, era 0 only (up to 2036-02-07).
///
/// `None` for anything before 1970, which includes the zero timestamp an
/// unsynchronized server sends.
pub const fn ntp_to_unix(ntp_seconds: u32) -> Option<u32> {
    ntp_seconds.checked_sub(UNIX_EPOCH_OFFSET)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum NtpState {
    Idle,
    RequestSent,
    Completed(TimestampSeconds),
    /// A reply arrived, but its time is before 2016
    Invalid,
    TimedOut,
}

/// One request/response exchange with a time server.
///
/// States only move forward: `Idle`, `RequestSent`, then one of the terminal
/// states. Replies in any other state are ignored.
#[derive(Debug)]
pub struct NtpExchange {
    state: NtpState,
}

impl NtpExchange {
    pub const fn new() -> Self {
        Self {
            state: NtpState::Idle,
        }
    }

    pub const fn state(&self) -> NtpState {
        self.state
    }

    pub fn send<S: DatagramSocket>(&mut self, socket: &mut S, server: SocketAddrV4) -> Result<(), Error> {
        if self.state != NtpState::Idle {
            return Ok(());
        }
        socket.send_to(server, &request_packet()).map_err(|e| {
            error!("Failed to send NTP request: {}", e);
            Error::TransportWriteError
        })?;
        self.state = NtpState::RequestSent;
        Ok(())
    }

    pub fn expire(&mut self) {
        if self.state == NtpState::RequestSent {
            self.state = NtpState::TimedOut;
        }
    }
}

impl Default for NtpExchange {
    fn default() -> Self {
        Self::new()
    }
}

impl DatagramHandler for NtpExchange {
    fn on_datagram(&mut self, _from: SocketAddrV4, payload: &[u8]) {
        if self.state != NtpState::RequestSent {
            return;
        }
        let Some(ntp_seconds) = transmit_seconds(payload) else {
            debug!("Ignoring {=usize} byte datagram", payload.len());
            return;
        };
        self.state = match ntp_to_unix(ntp_seconds).and_then(TimestampSeconds::new) {
            Some(timestamp) => {
                info!("NTP time received: {=u32}", timestamp.as_secs());
                NtpState::Completed(timestamp)
            }
            None => {
                warn!("NTP reply with implausible time {=u32}", ntp_seconds);
                NtpState::Invalid
            }
        };
    }
}

impl Completion for NtpExchange {
    type Output = TimestampSeconds;
    type Error = Error;

    fn poll(&self) -> nb::Result<TimestampSeconds, Error> {
        match self.state {
            NtpState::Completed(timestamp) => Ok(timestamp),
            NtpState::Invalid => Err(nb::Error::Other(Error::ClockSyncInvalidResponse)),
            NtpState::TimedOut => Err(nb::Error::Other(Error::ClockSyncTimeout)),
            NtpState::Idle | NtpState::RequestSent => Err(nb::Error::WouldBlock),
        }
    }
}

/// Clock source that runs one [`NtpExchange`] per call.
pub struct NtpClock<U> {
    stack: U,
    server: SocketAddrV4,
    budget: PollBudget,
}

impl<U: UdpStack> NtpClock<U> {
    pub fn new(stack: U, server: SocketAddrV4, budget: PollBudget) -> Self {
        Self {
            stack,
            server,
            budget,
        }
    }

    pub fn release(self) -> U {
        self.stack
    }
}

impl<U: UdpStack> ClockSource for NtpClock<U> {
    fn timestamp<D: DelayMs<u32>>(&mut self, delay: &mut D) -> Result<TimestampSeconds, Error> {
        info!("Getting NTP time...");
        let mut socket = self.stack.bind().map_err(|e| {
            error!("Failed to create UDP socket: {}", e);
            Error::TransportConnectError
        })?;

        let mut exchange = NtpExchange::new();
        if let Err(e) = exchange.send(&mut socket, self.server) {
            socket.close();
            return Err(e);
        }

        let result = poll::drive(&mut exchange, self.budget, delay, |exchange| {
            socket.dispatch(exchange)
        });
        socket.close();

        match result {
            Ok(timestamp) => Ok(timestamp),
            Err(nb::Error::Other(e)) => Err(e),
            Err(nb::Error::WouldBlock) => {
                exchange.expire();
                warn!("NTP timeout - no response");
                Err(Error::ClockSyncTimeout)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::net::Ipv4Addr;

    const SERVER: SocketAddrV4 = SocketAddrV4::new(Ipv4Addr::new(216, 239, 35, 0), NTP_PORT);

    fn reply(transmit_seconds: u32) -> [u8; PACKET_LEN] {
        let mut packet = [0; PACKET_LEN];
        packet[0] = 0b00_011_100;
        packet[40..44].copy_from_slice(&transmit_seconds.to_be_bytes());
        packet
    }

    #[test]
    fn request_is_client_mode_v3() {
        let packet = request_packet();
        assert_eq!(packet[0], 0x1B);
        assert!(packet[1..].iter().all(|&b| b == 0));
    }

    #[test]
    fn converts_to_unix_time() {
        assert_eq!(ntp_to_unix(3_910_000_000), Some(1_701_011_200));
        assert_eq!(ntp_to_unix(UNIX_EPOCH_OFFSET), Some(0));
        assert_eq!(ntp_to_unix(0), None);
        assert_eq!(ntp_to_unix(UNIX_EPOCH_OFFSET - 1), None);
        assert_eq!(transmit_seconds(&reply(3_910_000_000)), Some(3_910_000_000));
    }

    #[test]
    fn short_packets_are_not_replies() {
        assert_eq!(transmit_seconds(&[0; 47]), None);
    }

    #[test]
    fn reply_completes_exchange() {
        let mut exchange = NtpExchange {
            state: NtpState::RequestSent,
        };
        exchange.on_datagram(SERVER, &[0; 12]);
        assert_eq!(exchange.state(), NtpState::RequestSent);

        exchange.on_datagram(SERVER, &reply(3_910_000_000));
        let expected = TimestampSeconds::new(1_701_011_200).unwrap();
        assert_eq!(exchange.state(), NtpState::Completed(expected));
        assert_eq!(exchange.poll(), Ok(expected));

        // a second reply doesn't move it again
        exchange.on_datagram(SERVER, &reply(3_920_000_000));
        assert_eq!(exchange.state(), NtpState::Completed(expected));
    }

    #[test]
    fn zero_time_is_invalid_not_epoch() {
        let mut exchange = NtpExchange {
            state: NtpState::RequestSent,
        };
        exchange.on_datagram(SERVER, &reply(0));
        assert_eq!(exchange.state(), NtpState::Invalid);
        assert_eq!(
            exchange.poll(),
            Err(nb::Error::Other(Error::ClockSyncInvalidResponse))
        );
    }

    #[test]
    fn pre_1970_time_is_invalid() {
        let mut exchange = NtpExchange {
            state: NtpState::RequestSent,
        };
        exchange.on_datagram(SERVER, &reply(1_000_000_000));
        assert_eq!(exchange.state(), NtpState::Invalid);
    }

    #[test]
    fn replies_before_the_request_are_ignored() {
        let mut exchange = NtpExchange::new();
        exchange.on_datagram(SERVER, &reply(3_910_000_000));
        assert_eq!(exchange.state(), NtpState::Idle);
        exchange.expire();
        assert_eq!(exchange.state(), NtpState::Idle);
    }
}
