//! TCP socket specializations, decomposed into client, listener and
//! connection roles.

use std::marker::PhantomData;

use crate::error::Result;
use crate::fd::FileDescriptor;
use crate::net::ip_family::{Inet4, Inet6, IpFamily};
use crate::net::message_header::{ReceiveMessageHeader, SendMessageHeader};
use crate::net::options::{SocketOptions, TcpOptions};
use crate::net::{
    Direction, MessageFlags, Socket, SocketFlags, SocketProtocol, SocketType,
};
use crate::types::AddressFilledIn;

/// A not-yet-connected TCP socket used to establish an outgoing
/// connection.
///
/// Connecting consumes the client socket and yields a
/// [`TcpConnection`]; the descriptor moves over to the connection object.
#[derive(Debug)]
pub struct TcpClientSocket<F: IpFamily> {
    socket: Socket,
    _family: PhantomData<F>,
}

impl<F: IpFamily> TcpClientSocket<F> {
    pub fn new(flags: SocketFlags) -> Result<Self> {
        let socket = Socket::new(F::FAMILY, SocketType::Stream, flags, SocketProtocol::Tcp)?;
        Ok(TcpClientSocket {
            socket,
            _family: PhantomData,
        })
    }

    pub fn fd(&self) -> FileDescriptor {
        self.socket.fd()
    }

    /// Binds an explicit local address before connecting.
    pub fn bind(&self, addr: &F::Address) -> Result<()> {
        self.socket.bind(addr)
    }

    /// Connects to `addr`, transferring the descriptor into the returned
    /// connection.
    pub fn connect(mut self, addr: &F::Address) -> Result<TcpConnection<F>> {
        self.socket.connect(addr)?;
        let fd = self.socket.disown();
        Ok(TcpConnection {
            socket: Socket::from_fd(fd),
            _family: PhantomData,
        })
    }

    pub fn sock_options(&self) -> SocketOptions<'_> {
        SocketOptions::new(self.socket.fd())
    }

    pub fn ip_options(&self) -> F::Options<'_> {
        F::ip_options(self.socket.fd())
    }

    pub fn tcp_options(&self) -> TcpOptions<'_> {
        TcpOptions::new(self.socket.fd())
    }
}

/// A passive TCP socket accepting incoming connections.
#[derive(Debug)]
pub struct TcpListenSocket<F: IpFamily> {
    socket: Socket,
    _family: PhantomData<F>,
}

impl<F: IpFamily> TcpListenSocket<F> {
    pub fn new(flags: SocketFlags) -> Result<Self> {
        let socket = Socket::new(F::FAMILY, SocketType::Stream, flags, SocketProtocol::Tcp)?;
        Ok(TcpListenSocket {
            socket,
            _family: PhantomData,
        })
    }

    pub fn fd(&self) -> FileDescriptor {
        self.socket.fd()
    }

    pub fn bind(&self, addr: &F::Address) -> Result<()> {
        self.socket.bind(addr)
    }

    pub fn listen(&self, backlog: usize) -> Result<()> {
        self.socket.listen(backlog)
    }

    /// Accepts the next pending connection; the peer address is stored in
    /// `addr` when given.
    pub fn accept(
        &self,
        addr: Option<&mut F::Address>,
        flags: SocketFlags,
    ) -> Result<TcpConnection<F>> {
        let fd = self
            .socket
            .accept(addr.map(|a| a as &mut dyn crate::net::SocketAddress), flags)?;
        Ok(TcpConnection {
            socket: Socket::from_fd(fd),
            _family: PhantomData,
        })
    }

    pub fn local_address(&self) -> Result<F::Address> {
        let mut addr = F::Address::default();
        self.socket.get_sock_name(&mut addr)?;
        Ok(addr)
    }

    pub fn sock_options(&self) -> SocketOptions<'_> {
        SocketOptions::new(self.socket.fd())
    }

    pub fn ip_options(&self) -> F::Options<'_> {
        F::ip_options(self.socket.fd())
    }

    pub fn tcp_options(&self) -> TcpOptions<'_> {
        TcpOptions::new(self.socket.fd())
    }
}

/// An established TCP connection.
#[derive(Debug)]
pub struct TcpConnection<F: IpFamily> {
    socket: Socket,
    _family: PhantomData<F>,
}

impl<F: IpFamily> TcpConnection<F> {
    /// Takes ownership of an already connected descriptor.
    pub fn from_fd(fd: FileDescriptor) -> Self {
        TcpConnection {
            socket: Socket::from_fd(fd),
            _family: PhantomData,
        }
    }

    pub fn fd(&self) -> FileDescriptor {
        self.socket.fd()
    }

    pub fn read(&self, buf: &mut [u8]) -> Result<usize> {
        self.socket.read(buf)
    }

    pub fn write(&self, buf: &[u8]) -> Result<usize> {
        self.socket.write(buf)
    }

    pub fn send(&self, buf: &[u8], flags: MessageFlags) -> Result<usize> {
        self.socket.send(buf, flags)
    }

    pub fn receive(&self, buf: &mut [u8], flags: MessageFlags) -> Result<usize> {
        self.socket.receive(buf, flags)
    }

    pub fn send_message(&self, header: &mut SendMessageHeader<'_>) -> Result<usize> {
        self.socket.send_message(header, None)
    }

    pub fn receive_message(
        &self,
        header: &mut ReceiveMessageHeader<'_>,
    ) -> Result<(usize, AddressFilledIn)> {
        self.socket.receive_message(header, None)
    }

    pub fn shutdown(&self, direction: Direction) -> Result<()> {
        self.socket.shutdown(direction)
    }

    pub fn local_address(&self) -> Result<F::Address> {
        let mut addr = F::Address::default();
        self.socket.get_sock_name(&mut addr)?;
        Ok(addr)
    }

    pub fn sock_options(&self) -> SocketOptions<'_> {
        SocketOptions::new(self.socket.fd())
    }

    pub fn ip_options(&self) -> F::Options<'_> {
        F::ip_options(self.socket.fd())
    }

    pub fn tcp_options(&self) -> TcpOptions<'_> {
        TcpOptions::new(self.socket.fd())
    }
}

/// IPv4 TCP client socket.
pub type Tcp4ClientSocket = TcpClientSocket<Inet4>;
/// IPv6 TCP client socket.
pub type Tcp6ClientSocket = TcpClientSocket<Inet6>;
/// IPv4 TCP listener.
pub type Tcp4ListenSocket = TcpListenSocket<Inet4>;
/// IPv6 TCP listener.
pub type Tcp6ListenSocket = TcpListenSocket<Inet6>;
/// IPv4 TCP connection.
pub type Tcp4Connection = TcpConnection<Inet4>;
/// IPv6 TCP connection.
pub type Tcp6Connection = TcpConnection<Inet6>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::Ip4Address;

    #[test]
    fn loopback_connection() {
        let listener = Tcp4ListenSocket::new(SocketFlags::CLOEXEC).unwrap();
        listener.sock_options().set_reuse_address(true).unwrap();
        listener
            .bind(&Ip4Address::from_string("127.0.0.1", 0).unwrap())
            .unwrap();
        listener.listen(10).unwrap();
        let addr = listener.local_address().unwrap();

        let client = Tcp4ClientSocket::new(SocketFlags::CLOEXEC).unwrap();
        let client_conn = client.connect(&addr).unwrap();

        let mut peer = Ip4Address::new();
        let server_conn = listener
            .accept(Some(&mut peer), SocketFlags::CLOEXEC)
            .unwrap();
        assert_eq!(peer.ip_as_string().unwrap(), "127.0.0.1");

        client_conn.write(b"across loopback").unwrap();
        let mut buf = [0u8; 32];
        let len = server_conn.read(&mut buf).unwrap();
        assert_eq!(&buf[..len], b"across loopback");

        client_conn.shutdown(Direction::Write).unwrap();
        assert_eq!(server_conn.read(&mut buf).unwrap(), 0);
    }
}
