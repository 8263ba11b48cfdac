//! The transport seam module.

use std::{
    io,
    net::{Ipv4Addr, SocketAddr, SocketAddrV4, UdpSocket},
    os::unix::io::{AsRawFd, RawFd},
};

use dhcp4_protocol::{Message, DHCP_PORT_CLIENT};

/// Must be enough to decode all the options.
const BUFFER_READ_CAPACITY: usize = 8192;
/// Must be enough to encode all the options.
const BUFFER_WRITE_CAPACITY: usize = 8192;

/// One DHCP conversation endpoint the client multiplexes on.
///
/// `dispatch` never blocks. Transient conditions (nothing to read, an
/// unparseable or invalid datagram) yield `Ok(None)`; an error means the
/// conversation is broken beyond recovery and resets the client.
pub trait Transport: AsRawFd {
    /// Takes at most one parsed inbound message.
    fn dispatch(&mut self) -> io::Result<Option<Message>>;

    /// Sends one message to `destination`.
    fn send(&mut self, destination: SocketAddrV4, message: &Message) -> io::Result<()>;
}

/// The standard UDP transport on the DHCP client port.
pub struct UdpTransport {
    socket: UdpSocket,
    /// Stores received data and is used for deserialization.
    buf_read: Vec<u8>,
    /// Stores pending data and is used for serialization.
    buf_write: Vec<u8>,
}

impl UdpTransport {
    /// Binds the client port on `address` and enables broadcasting.
    pub fn new(address: Ipv4Addr) -> io::Result<Self> {
        Self::from_socket(UdpSocket::bind(SocketAddrV4::new(address, DHCP_PORT_CLIENT))?)
    }

    /// Wraps an already bound socket.
    pub fn from_socket(socket: UdpSocket) -> io::Result<Self> {
        socket.set_nonblocking(true)?;
        socket.set_broadcast(true)?;
        Ok(UdpTransport {
            socket,
            buf_read: vec![0u8; BUFFER_READ_CAPACITY],
            buf_write: vec![0u8; BUFFER_WRITE_CAPACITY],
        })
    }
}

impl AsRawFd for UdpTransport {
    fn as_raw_fd(&self) -> RawFd {
        self.socket.as_raw_fd()
    }
}

impl Transport for UdpTransport {
    fn dispatch(&mut self) -> io::Result<Option<Message>> {
        let (amount, source) = match self.socket.recv_from(&mut self.buf_read) {
            Ok(received) => received,
            Err(ref error) if error.kind() == io::ErrorKind::WouldBlock => return Ok(None),
            Err(error) => return Err(error),
        };

        let message = match Message::from_bytes(&self.buf_read[..amount]) {
            Ok(message) => message,
            Err(error) => {
                warn!("Received an invalid packet from {}: {}", source, error);
                return Ok(None);
            }
        };
        if let Err(error) = message.validate() {
            warn!("The response from {} is invalid: {}", source, error);
            return Ok(None);
        }

        Ok(Some(message))
    }

    fn send(&mut self, destination: SocketAddrV4, message: &Message) -> io::Result<()> {
        let amount = message.to_bytes(&mut self.buf_write)?;
        let sent = self
            .socket
            .send_to(&self.buf_write[..amount], SocketAddr::V4(destination))?;
        if sent != amount {
            return Err(io::Error::new(
                io::ErrorKind::WriteZero,
                "Failed to write entire datagram to socket",
            ));
        }
        Ok(())
    }
}
