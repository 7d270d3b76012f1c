//! Ports for a callback-driven IP stack. Results only arrive as events while
//! the owner calls `dispatch`.

use core::net::SocketAddrV4;

pub mod poll;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SocketError {
    /// The stack ran out of sockets or buffers
    NoResources,
    /// No route to the peer
    Unreachable,
    /// The peer refused the connection
    Refused,
    /// The peer reset the connection
    Reset,
    /// The stack dropped the connection
    Aborted,
    /// Anything the stack doesn't break down further
    Other,
}

pub trait DatagramHandler {
    fn on_datagram(&mut self, from: SocketAddrV4, payload: &[u8]);
}

/// A bound, connectionless socket.
pub trait DatagramSocket {
    /// Queues one datagram. Sending doesn't produce an event.
    fn send_to(&mut self, remote: SocketAddrV4, payload: &[u8]) -> Result<(), SocketError>;

    /// Delivers every datagram received since the last call to `handler`.
    fn dispatch<H: DatagramHandler>(&mut self, handler: &mut H);

    /// Releases the socket.
    fn close(self);
}

pub trait UdpStack {
    type Socket: DatagramSocket;

    fn bind(&mut self) -> Result<Self::Socket, SocketError>;
}

/// What happened on a stream socket.
#[derive(Debug, PartialEq, Eq)]
pub enum StreamEvent<'a> {
    /// Outcome of a [`StreamSocket::connect`]
    Connected(Result<(), SocketError>),
    /// The peer acknowledged this many more bytes
    Sent(usize),
    /// Bytes from the peer. Only valid during the callback.
    Received(&'a [u8]),
    /// The peer closed its side of the connection
    PeerClosed,
    /// The connection broke
    Failed(SocketError),
}

/// The part of a stream socket a handler may use from inside a callback.
pub trait StreamWriter {
    /// Queues `data` for sending. Progress is reported with
    /// [`StreamEvent::Sent`].
    fn write(&mut self, data: &[u8]) -> Result<(), SocketError>;
}

pub trait StreamHandler {
    fn on_event<W: StreamWriter>(&mut self, event: StreamEvent<'_>, socket: &mut W);
}

/// A connection-oriented socket.
pub trait StreamSocket: StreamWriter {
    /// Starts connecting. The outcome arrives as [`StreamEvent::Connected`],
    /// an `Err` here means the attempt never started.
    fn connect(&mut self, remote: SocketAddrV4) -> Result<(), SocketError>;

    /// Delivers every pending event to `handler`, in order.
    fn dispatch<H: StreamHandler>(&mut self, handler: &mut H);

    /// Graceful release: pending data is still sent.
    ///
    /// Also called after a [`StreamEvent::Failed`], when the stack may already
    /// have freed the connection. Then this only releases the handle.
    fn close(self);

    /// Immediate release: pending data is dropped and the peer gets a reset.
    fn abort(self);
}

pub trait TcpStack {
    type Socket: StreamSocket;

    fn open(&mut self) -> Result<Self::Socket, SocketError>;
}
