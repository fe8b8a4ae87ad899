//! UNIX domain socket specializations.

use crate::error::Result;
use crate::fd::FileDescriptor;
use crate::net::message_header::{ReceiveMessageHeader, SendMessageHeader};
use crate::net::options::{SocketOptions, UnixOptions};
use crate::net::{
    Direction, MessageFlags, Socket, SocketFlags, SocketProtocol, SocketType, UnixAddress,
};
use crate::types::AddressFilledIn;

macro_rules! common_unix_api {
    () => {
        pub fn fd(&self) -> FileDescriptor {
            self.socket.fd()
        }

        pub fn bind(&self, addr: &UnixAddress) -> Result<()> {
            self.socket.bind(addr)
        }

        pub fn local_address(&self) -> Result<UnixAddress> {
            let mut addr = UnixAddress::new();
            self.socket.get_sock_name(&mut addr)?;
            Ok(addr)
        }

        pub fn sock_options(&self) -> SocketOptions<'_> {
            SocketOptions::new(self.socket.fd())
        }

        pub fn unix_options(&self) -> UnixOptions<'_> {
            UnixOptions::new(self.socket.fd())
        }
    };
}

/// An established connection on a UNIX domain stream or seqpacket socket.
#[derive(Debug)]
pub struct UnixConnection {
    socket: Socket,
}

impl UnixConnection {
    /// Takes ownership of an already connected descriptor.
    pub fn from_fd(fd: FileDescriptor) -> UnixConnection {
        UnixConnection {
            socket: Socket::from_fd(fd),
        }
    }

    common_unix_api!();

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
}

macro_rules! unix_listen_socket {
    ($(#[$doc:meta])* $name:ident, $sock_type:expr) => {
        $(#[$doc])*
        #[derive(Debug)]
        pub struct $name {
            socket: Socket,
        }

        impl $name {
            pub fn new(flags: SocketFlags) -> Result<Self> {
                let socket = Socket::new(
                    crate::net::SocketFamily::Unix,
                    $sock_type,
                    flags,
                    SocketProtocol::Default,
                )?;
                Ok(Self { socket })
            }

            common_unix_api!();

            pub fn listen(&self, backlog: usize) -> Result<()> {
                self.socket.listen(backlog)
            }

            /// Accepts the next pending connection; the peer address is
            /// stored in `addr` when given.
            pub fn accept(
                &self,
                addr: Option<&mut UnixAddress>,
                flags: SocketFlags,
            ) -> Result<UnixConnection> {
                let fd = self.socket.accept(
                    addr.map(|a| a as &mut dyn crate::net::SocketAddress),
                    flags,
                )?;
                Ok(UnixConnection::from_fd(fd))
            }
        }
    };
}

unix_listen_socket!(
    /// A listening UNIX domain socket with stream semantics.
    UnixStreamListenSocket, SocketType::Stream);
unix_listen_socket!(
    /// A listening UNIX domain socket with seqpacket semantics
    /// (connection-oriented, reliable, message boundaries preserved).
    UnixSeqPacketListenSocket, SocketType::SeqPacket);

macro_rules! unix_client_socket {
    ($(#[$doc:meta])* $name:ident, $sock_type:expr) => {
        $(#[$doc])*
        #[derive(Debug)]
        pub struct $name {
            socket: Socket,
        }

        impl $name {
            pub fn new(flags: SocketFlags) -> Result<Self> {
                let socket = Socket::new(
                    crate::net::SocketFamily::Unix,
                    $sock_type,
                    flags,
                    SocketProtocol::Default,
                )?;
                Ok(Self { socket })
            }

            common_unix_api!();

            /// Connects to `addr`, transferring the descriptor into the
            /// returned connection.
            pub fn connect(mut self, addr: &UnixAddress) -> Result<UnixConnection> {
                self.socket.connect(addr)?;
                let fd = self.socket.disown();
                Ok(UnixConnection::from_fd(fd))
            }
        }
    };
}

unix_client_socket!(
    /// A connecting UNIX domain socket with stream semantics.
    UnixStreamClientSocket, SocketType::Stream);
unix_client_socket!(
    /// A connecting UNIX domain socket with seqpacket semantics.
    UnixSeqPacketClientSocket, SocketType::SeqPacket);

/// A UNIX domain datagram socket.
#[derive(Debug)]
pub struct UnixDatagramSocket {
    socket: Socket,
}

impl UnixDatagramSocket {
    pub fn new(flags: SocketFlags) -> Result<UnixDatagramSocket> {
        let socket = Socket::new(
            crate::net::SocketFamily::Unix,
            SocketType::Dgram,
            flags,
            SocketProtocol::Default,
        )?;
        Ok(UnixDatagramSocket { socket })
    }

    pub(crate) fn from_socket(socket: Socket) -> UnixDatagramSocket {
        UnixDatagramSocket { socket }
    }

    common_unix_api!();

    /// Sets the default peer address.
    pub fn connect(&self, addr: &UnixAddress) -> Result<()> {
        self.socket.connect(addr)
    }

    pub fn send(&self, buf: &[u8], flags: MessageFlags) -> Result<usize> {
        self.socket.send(buf, flags)
    }

    pub fn send_to(&self, buf: &[u8], addr: &UnixAddress, flags: MessageFlags) -> Result<usize> {
        self.socket.send_to(buf, addr, flags)
    }

    pub fn receive(&self, buf: &mut [u8], flags: MessageFlags) -> Result<usize> {
        self.socket.receive(buf, flags)
    }

    /// Receives a datagram, reporting the sender address when the kernel
    /// provided one (unbound senders yield none).
    pub fn receive_from(
        &self,
        buf: &mut [u8],
        flags: MessageFlags,
    ) -> Result<(usize, Option<UnixAddress>)> {
        let mut addr = UnixAddress::new();
        let (len, filled_in) = self.socket.receive_from(buf, &mut addr, flags)?;
        Ok((len, filled_in.get().then_some(addr)))
    }

    pub fn send_message(
        &self,
        header: &mut SendMessageHeader<'_>,
        addr: Option<&UnixAddress>,
    ) -> Result<usize> {
        self.socket
            .send_message(header, addr.map(|a| a as &dyn crate::net::SocketAddress))
    }

    pub fn receive_message(
        &self,
        header: &mut ReceiveMessageHeader<'_>,
        addr: Option<&mut UnixAddress>,
    ) -> Result<(usize, AddressFilledIn)> {
        self.socket.receive_message(
            header,
            addr.map(|a| a as &mut dyn crate::net::SocketAddress),
        )
    }
}

/// Creates a connected pair of anonymous UNIX stream sockets.
pub fn create_stream_socket_pair() -> Result<(UnixConnection, UnixConnection)> {
    let (a, b) = Socket::new_pair(
        crate::net::SocketFamily::Unix,
        SocketType::Stream,
        SocketFlags::CLOEXEC,
        SocketProtocol::Default,
    )?;
    Ok((
        UnixConnection { socket: a },
        UnixConnection { socket: b },
    ))
}

/// Creates a connected pair of anonymous UNIX seqpacket sockets.
pub fn create_seqpacket_socket_pair() -> Result<(UnixConnection, UnixConnection)> {
    let (a, b) = Socket::new_pair(
        crate::net::SocketFamily::Unix,
        SocketType::SeqPacket,
        SocketFlags::CLOEXEC,
        SocketProtocol::Default,
    )?;
    Ok((
        UnixConnection { socket: a },
        UnixConnection { socket: b },
    ))
}

/// Creates a connected pair of anonymous UNIX datagram sockets.
pub fn create_dgram_socket_pair() -> Result<(UnixDatagramSocket, UnixDatagramSocket)> {
    let (a, b) = Socket::new_pair(
        crate::net::SocketFamily::Unix,
        SocketType::Dgram,
        SocketFlags::CLOEXEC,
        SocketProtocol::Default,
    )?;
    Ok((
        UnixDatagramSocket::from_socket(a),
        UnixDatagramSocket::from_socket(b),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Abstract;

    #[test]
    fn abstract_stream_connection() {
        let addr =
            UnixAddress::from_path(b"syscore-test-stream", Abstract::new(true)).unwrap();
        let listener = UnixStreamListenSocket::new(SocketFlags::CLOEXEC).unwrap();
        listener.bind(&addr).unwrap();
        listener.listen(5).unwrap();

        let bound = listener.local_address().unwrap();
        assert!(bound.is_abstract());
        assert_eq!(bound.get_path(), b"syscore-test-stream");
        assert_eq!(bound, addr);

        let client = UnixStreamClientSocket::new(SocketFlags::CLOEXEC).unwrap();
        let client_conn = client.connect(&addr).unwrap();
        let server_conn = listener.accept(None, SocketFlags::CLOEXEC).unwrap();

        client_conn.write(b"over the abstract socket").unwrap();
        let mut buf = [0u8; 32];
        let len = server_conn.read(&mut buf).unwrap();
        assert_eq!(&buf[..len], b"over the abstract socket");
    }

    #[test]
    fn seqpacket_preserves_boundaries() {
        let (a, b) = create_seqpacket_socket_pair().unwrap();
        a.send(b"first", MessageFlags::empty()).unwrap();
        a.send(b"second", MessageFlags::empty()).unwrap();
        let mut buf = [0u8; 64];
        assert_eq!(b.receive(&mut buf, MessageFlags::empty()).unwrap(), 5);
        assert_eq!(&buf[..5], b"first");
        assert_eq!(b.receive(&mut buf, MessageFlags::empty()).unwrap(), 6);
        assert_eq!(&buf[..6], b"second");
    }

    #[test]
    fn socket_pair_addresses_are_unnamed() {
        let (a, _b) = create_stream_socket_pair().unwrap();
        let addr = a.local_address().unwrap();
        assert!(addr.is_unnamed());
        assert_eq!(addr.label(), "<unnamed>");
    }
}
