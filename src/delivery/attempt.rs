//! One-shot HTTP delivery over a callback-driven stream socket.

use embedded_hal::blocking::delay::DelayMs;

use super::http::{self, Request, RESPONSE_LOG_LIMIT};
use super::Publisher;
use crate::config::Collector;
use crate::error::Error;
use crate::logic::record::TelemetryRecord;
use crate::net::poll::{self, Completion, PollBudget};
use crate::net::{StreamEvent, StreamHandler, StreamSocket, StreamWriter, TcpStack};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Outcome {
    Success,
    Failure(Error),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DeliveryState {
    Connecting,
    Sending,
    AwaitingResponse,
    Completed(Outcome),
    /// The socket has been released; carries the final outcome.
    Closed(Outcome),
}

/// State of a single POST, fed by stream events.
///
/// Transitions only move forward through `Connecting`, `Sending`,
/// `AwaitingResponse`, `Completed` and `Closed`; a step may be skipped (a
/// failed connect goes straight to `Completed`), but never undone. Once
/// completed, later events are ignored: a server closing the connection after
/// a success is normal.
#[derive(Debug)]
pub struct DeliveryAttempt {
    request: Request,
    sent: usize,
    state: DeliveryState,
}

impl DeliveryAttempt {
    pub fn new(request: Request) -> Self {
        Self {
            request,
            sent: 0,
            state: DeliveryState::Connecting,
        }
    }

    pub fn state(&self) -> DeliveryState {
        self.state
    }

    pub fn request(&self) -> &str {
        &self.request
    }

    pub fn sent(&self) -> usize {
        self.sent
    }

    fn complete(&mut self, outcome: Outcome) {
        if self.is_in_flight() {
            self.state = DeliveryState::Completed(outcome);
        }
    }

    fn is_in_flight(&self) -> bool {
        matches!(
            self.state,
            DeliveryState::Connecting | DeliveryState::Sending | DeliveryState::AwaitingResponse
        )
    }

    /// Releases `socket` and records the final outcome.
    ///
    /// A completed attempt closes the socket; one that is still waiting (the
    /// poll budget ran out) aborts it and ends as [`Error::TransportTimeout`].
    pub fn finish<S: StreamSocket>(&mut self, socket: S) -> Outcome {
        let outcome = match self.state {
            DeliveryState::Completed(outcome) => {
                socket.close();
                outcome
            }
            DeliveryState::Closed(outcome) => return outcome,
            DeliveryState::Connecting | DeliveryState::Sending | DeliveryState::AwaitingResponse => {
                warn!("HTTP POST timeout");
                socket.abort();
                Outcome::Failure(Error::TransportTimeout)
            }
        };
        self.state = DeliveryState::Closed(outcome);
        outcome
    }
}

impl StreamHandler for DeliveryAttempt {
    fn on_event<W: StreamWriter>(&mut self, event: StreamEvent<'_>, socket: &mut W) {
        match (self.state, event) {
            (DeliveryState::Connecting, StreamEvent::Connected(Ok(()))) => {
                info!("TCP connected, sending request...");
                match socket.write(self.request.as_bytes()) {
                    Ok(()) => self.state = DeliveryState::Sending,
                    Err(e) => {
                        error!("TCP write failed: {}", e);
                        self.complete(Outcome::Failure(Error::TransportWriteError));
                    }
                }
            }
            (DeliveryState::Connecting, StreamEvent::Connected(Err(e)))
            | (DeliveryState::Connecting, StreamEvent::Failed(e)) => {
                error!("TCP connection failed: {}", e);
                self.complete(Outcome::Failure(Error::TransportConnectError));
            }
            (DeliveryState::Sending, StreamEvent::Sent(len)) => {
                self.sent += len;
                if self.sent >= self.request.len() {
                    debug!("Request sent completely");
                    self.state = DeliveryState::AwaitingResponse;
                }
            }
            (DeliveryState::Sending | DeliveryState::AwaitingResponse, StreamEvent::Received(response)) => {
                if http::is_success(response) {
                    info!("HTTP POST successful!");
                    self.complete(Outcome::Success);
                } else {
                    let shown = &response[..response.len().min(RESPONSE_LOG_LIMIT)];
                    warn!("HTTP response: {=[u8]:a}", shown);
                    self.complete(Outcome::Failure(Error::DeliveryRejected));
                }
            }
            (DeliveryState::Sending | DeliveryState::AwaitingResponse, StreamEvent::PeerClosed) => {
                warn!("Connection closed by server before a response");
                self.complete(Outcome::Failure(Error::TransportAbnormalClose));
            }
            (DeliveryState::Sending | DeliveryState::AwaitingResponse, StreamEvent::Failed(e)) => {
                error!("TCP error: {}", e);
                self.complete(Outcome::Failure(Error::TransportAbnormalClose));
            }
            (DeliveryState::Completed(_) | DeliveryState::Closed(_), _) => {
                trace!("Ignoring event after completion");
            }
            _ => {
                trace!("Ignoring unexpected event");
            }
        }
    }
}

impl Completion for DeliveryAttempt {
    type Output = ();
    type Error = Error;

    fn poll(&self) -> nb::Result<(), Error> {
        match self.state {
            DeliveryState::Completed(Outcome::Success) | DeliveryState::Closed(Outcome::Success) => Ok(()),
            DeliveryState::Completed(Outcome::Failure(e)) | DeliveryState::Closed(Outcome::Failure(e)) => {
                Err(nb::Error::Other(e))
            }
            DeliveryState::Connecting | DeliveryState::Sending | DeliveryState::AwaitingResponse => {
                Err(nb::Error::WouldBlock)
            }
        }
    }
}

/// Publishes records by POSTing them to the collector, one attempt per
/// record, driven by the poll loop.
pub struct HttpPublisher<'c, T> {
    stack: T,
    collector: &'c Collector,
    budget: PollBudget,
}

impl<'c, T: TcpStack> HttpPublisher<'c, T> {
    pub fn new(stack: T, collector: &'c Collector, budget: PollBudget) -> Self {
        Self {
            stack,
            collector,
            budget,
        }
    }

    pub fn release(self) -> T {
        self.stack
    }

    /// Runs one attempt to completion and returns it in its `Closed` state.
    pub fn deliver<D: DelayMs<u32>>(&mut self, request: Request, delay: &mut D) -> DeliveryAttempt {
        let mut attempt = DeliveryAttempt::new(request);
        let mut socket = match self.stack.open() {
            Ok(socket) => socket,
            Err(e) => {
                error!("Failed to create TCP socket: {}", e);
                attempt.state = DeliveryState::Closed(Outcome::Failure(Error::TransportConnectError));
                return attempt;
            }
        };

        if let Err(e) = socket.connect(self.collector.addr) {
            error!("TCP connect failed: {}", e);
            attempt.complete(Outcome::Failure(Error::TransportConnectError));
            attempt.finish(socket);
            return attempt;
        }

        // the outcome is read back from the attempt's state by `finish`
        let _ = poll::drive(&mut attempt, self.budget, delay, |attempt| socket.dispatch(attempt));
        attempt.finish(socket);
        attempt
    }
}

impl<'c, T: TcpStack> Publisher for HttpPublisher<'c, T> {
    fn publish<D: DelayMs<u32>>(&mut self, record: &TelemetryRecord<'_>, delay: &mut D) -> Result<(), Error> {
        let payload = record.to_json()?;
        let request = http::post_request(self.collector.host, self.collector.path, &payload)?;
        info!("Posting to {}{}", self.collector.host, self.collector.path);
        info!("JSON: {}", payload.as_str());

        match self.deliver(request, delay).state() {
            DeliveryState::Closed(Outcome::Success) => Ok(()),
            DeliveryState::Closed(Outcome::Failure(e)) => Err(e),
            // `deliver` always returns a closed attempt
            _ => Err(Error::TransportAbnormalClose),
        }
    }
}
