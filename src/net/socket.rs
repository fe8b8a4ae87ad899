//! The plain socket type all specializations build on.

use crate::error::{Error, Result};
use crate::fd::{FileDescriptor, FileNum};
use crate::fs::FdFile;
use crate::net::address::SocketAddress;
use crate::net::message_header::{ReceiveMessageHeader, SendMessageHeader};
use crate::net::{
    Direction, MessageFlags, SocketFamily, SocketFlags, SocketProtocol, SocketType,
};
use crate::types::AddressFilledIn;

/// A socket owning its file descriptor.
///
/// This offers the full family-independent operation set; the typed
/// specializations (`TcpListenSocket`, `UdpSocket`, the UNIX variants, …)
/// wrap this and re-expose the subset that makes sense for them.
#[derive(Debug)]
pub struct Socket {
    file: FdFile,
}

impl Socket {
    /// Creates a new socket.
    pub fn new(
        family: SocketFamily,
        socket_type: SocketType,
        flags: SocketFlags,
        protocol: SocketProtocol,
    ) -> Result<Socket> {
        let res = unsafe {
            libc::socket(
                family as i32,
                socket_type as i32 | flags.bits(),
                protocol as i32,
            )
        };
        if res == -1 {
            return Err(Error::api("socket"));
        }
        Ok(Socket::from_fd(FileDescriptor::new(FileNum::new(res))))
    }

    /// Takes ownership of an existing socket descriptor.
    pub fn from_fd(fd: FileDescriptor) -> Socket {
        Socket {
            file: FdFile::new(fd),
        }
    }

    /// Creates a connected pair of anonymous sockets.
    pub fn new_pair(
        family: SocketFamily,
        socket_type: SocketType,
        flags: SocketFlags,
        protocol: SocketProtocol,
    ) -> Result<(Socket, Socket)> {
        let mut fds = [0 as libc::c_int; 2];
        let res = unsafe {
            libc::socketpair(
                family as i32,
                socket_type as i32 | flags.bits(),
                protocol as i32,
                fds.as_mut_ptr(),
            )
        };
        if res == -1 {
            return Err(Error::api("socketpair"));
        }
        Ok((
            Socket::from_fd(FileDescriptor::new(FileNum::new(fds[0]))),
            Socket::from_fd(FileDescriptor::new(FileNum::new(fds[1]))),
        ))
    }

    pub fn fd(&self) -> FileDescriptor {
        self.file.fd()
    }

    pub fn is_open(&self) -> bool {
        self.file.is_open()
    }

    pub fn close(&mut self) -> Result<()> {
        self.file.close()
    }

    /// Releases ownership of the descriptor, e.g. for moving it into a
    /// connection object.
    pub(crate) fn disown(&mut self) -> FileDescriptor {
        self.file.disown()
    }

    /// Plain stream read, equivalent to `receive()` without flags.
    pub fn read(&self, buf: &mut [u8]) -> Result<usize> {
        self.file.fd().read(buf)
    }

    /// Plain stream write, equivalent to `send()` without flags.
    pub fn write(&self, buf: &[u8]) -> Result<usize> {
        self.file.fd().write(buf)
    }

    /// Assigns the local address of the socket.
    pub fn bind(&self, addr: &dyn SocketAddress) -> Result<()> {
        let res = unsafe {
            libc::bind(
                self.fd().raw().raw(),
                addr.raw_addr(),
                addr.size() as libc::socklen_t,
            )
        };
        if res == -1 {
            return Err(Error::api("bind"));
        }
        Ok(())
    }

    /// Connects the socket to a peer address.
    pub fn connect(&self, addr: &dyn SocketAddress) -> Result<()> {
        let res = crate::init::retry_int(|| unsafe {
            libc::connect(
                self.fd().raw().raw(),
                addr.raw_addr(),
                addr.size() as libc::socklen_t,
            )
        });
        if res == -1 {
            return Err(Error::api("connect"));
        }
        Ok(())
    }

    /// Marks the socket as accepting connections.
    pub fn listen(&self, backlog: usize) -> Result<()> {
        if unsafe { libc::listen(self.fd().raw().raw(), backlog as libc::c_int) } == -1 {
            return Err(Error::api("listen"));
        }
        Ok(())
    }

    /// Accepts the next pending connection, returning its owning
    /// descriptor. The peer address is stored in `addr` when given.
    pub fn accept(
        &self,
        addr: Option<&mut dyn SocketAddress>,
        flags: SocketFlags,
    ) -> Result<FileDescriptor> {
        let res = match addr {
            Some(addr) => {
                addr.clear();
                let mut addrlen = addr.max_size() as libc::socklen_t;
                let addr_ptr = addr.raw_addr_mut();
                let res = crate::init::retry_int(|| unsafe {
                    libc::accept4(self.fd().raw().raw(), addr_ptr, &mut addrlen, flags.bits())
                });
                if res != -1 {
                    addr.update(addrlen as usize);
                }
                res
            }
            None => crate::init::retry_int(|| unsafe {
                libc::accept4(
                    self.fd().raw().raw(),
                    std::ptr::null_mut(),
                    std::ptr::null_mut(),
                    flags.bits(),
                )
            }),
        };
        if res == -1 {
            return Err(Error::api("accept4"));
        }
        Ok(FileDescriptor::new(FileNum::new(res)))
    }

    /// Shuts down reception and/or transmission on the socket.
    ///
    /// Unlike `close()` this affects the open file description shared with
    /// any duplicated descriptors.
    pub fn shutdown(&self, direction: Direction) -> Result<()> {
        if unsafe { libc::shutdown(self.fd().raw().raw(), direction as i32) } == -1 {
            return Err(Error::api("shutdown"));
        }
        Ok(())
    }

    /// Sends data over a connected socket.
    pub fn send(&self, buf: &[u8], flags: MessageFlags) -> Result<usize> {
        let res = crate::init::retry_ssize(|| unsafe {
            libc::send(
                self.fd().raw().raw(),
                buf.as_ptr().cast(),
                buf.len(),
                flags.bits(),
            )
        });
        if res == -1 {
            return Err(Error::api("send"));
        }
        Ok(res as usize)
    }

    /// Sends data to the explicit address `addr`.
    pub fn send_to(
        &self,
        buf: &[u8],
        addr: &dyn SocketAddress,
        flags: MessageFlags,
    ) -> Result<usize> {
        let res = crate::init::retry_ssize(|| unsafe {
            libc::sendto(
                self.fd().raw().raw(),
                buf.as_ptr().cast(),
                buf.len(),
                flags.bits(),
                addr.raw_addr(),
                addr.size() as libc::socklen_t,
            )
        });
        if res == -1 {
            return Err(Error::api("sendto"));
        }
        Ok(res as usize)
    }

    /// Receives data from a connected socket.
    pub fn receive(&self, buf: &mut [u8], flags: MessageFlags) -> Result<usize> {
        let res = crate::init::retry_ssize(|| unsafe {
            libc::recv(
                self.fd().raw().raw(),
                buf.as_mut_ptr().cast(),
                buf.len(),
                flags.bits(),
            )
        });
        if res == -1 {
            return Err(Error::api("recv"));
        }
        Ok(res as usize)
    }

    /// Receives data, storing the sender address in `addr`.
    ///
    /// The returned flag reports whether the kernel actually filled in an
    /// address (connection-mode sockets don't).
    pub fn receive_from(
        &self,
        buf: &mut [u8],
        addr: &mut dyn SocketAddress,
        flags: MessageFlags,
    ) -> Result<(usize, AddressFilledIn)> {
        addr.clear();
        let mut addrlen = addr.max_size() as libc::socklen_t;
        let addr_ptr = addr.raw_addr_mut();
        let res = crate::init::retry_ssize(|| unsafe {
            libc::recvfrom(
                self.fd().raw().raw(),
                buf.as_mut_ptr().cast(),
                buf.len(),
                flags.bits(),
                addr_ptr,
                &mut addrlen,
            )
        });
        if res == -1 {
            return Err(Error::api("recvfrom"));
        }
        let filled_in = AddressFilledIn::new(addrlen != 0);
        if filled_in.get() {
            addr.update(addrlen as usize);
        }
        Ok((res as usize, filled_in))
    }

    /// Sends a message assembled in `header`, optionally to the explicit
    /// address `addr`.
    ///
    /// On success (including a partial send) any attached control message
    /// has been transmitted exactly once and is dropped from `header`;
    /// retries for remaining payload must not re-attach it.
    pub fn send_message(
        &self,
        header: &mut SendMessageHeader<'_>,
        addr: Option<&dyn SocketAddress>,
    ) -> Result<usize> {
        let io_flags = header.io_flags();
        let raw = header.prepare_send(addr);
        let res = crate::init::retry_ssize(|| unsafe {
            libc::sendmsg(self.fd().raw().raw(), &raw, io_flags.bits())
        });
        if res == -1 {
            return Err(Error::api("sendmsg"));
        }
        header.post_send(res as usize);
        Ok(res as usize)
    }

    /// Receives a message into `header`, storing the sender address in
    /// `addr` when given.
    pub fn receive_message(
        &self,
        header: &mut ReceiveMessageHeader<'_>,
        mut addr: Option<&mut dyn SocketAddress>,
    ) -> Result<(usize, AddressFilledIn)> {
        let io_flags = header.io_flags();
        let reborrowed = addr.as_mut().map(|a| &mut **a as &mut dyn SocketAddress);
        let mut raw = header.prepare_receive(reborrowed);
        let res = crate::init::retry_ssize(|| unsafe {
            libc::recvmsg(self.fd().raw().raw(), &mut raw, io_flags.bits())
        });
        if res == -1 {
            return Err(Error::api("recvmsg"));
        }
        header.post_receive(res as usize, &raw);
        let filled_in = AddressFilledIn::new(raw.msg_namelen != 0);
        if let Some(addr) = addr {
            if filled_in.get() {
                addr.update(raw.msg_namelen as usize);
            }
        }
        Ok((res as usize, filled_in))
    }

    /// Retrieves the local address the socket is bound to.
    ///
    /// `addr` must be the variant matching the socket's family; if the
    /// kernel reports a different family the address is cleared and a
    /// runtime error raised.
    pub fn get_sock_name(&self, addr: &mut dyn SocketAddress) -> Result<()> {
        addr.clear();
        let mut addrlen = addr.max_size() as libc::socklen_t;
        let res = unsafe {
            libc::getsockname(self.fd().raw().raw(), addr.raw_addr_mut(), &mut addrlen)
        };
        if res == -1 {
            return Err(Error::api("getsockname"));
        }
        let reported = unsafe { (*addr.raw_addr()).sa_family };
        if reported != addr.family().raw() {
            addr.clear();
            return Err(Error::Runtime(
                "getsockname returned an address of mismatching family",
            ));
        }
        addr.update(addrlen as usize);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::Ip4Address;

    #[test]
    fn bind_and_sock_name_round_trip() {
        let socket = Socket::new(
            SocketFamily::Inet,
            SocketType::Dgram,
            SocketFlags::CLOEXEC,
            SocketProtocol::Default,
        )
        .unwrap();
        let addr = Ip4Address::from_string("127.0.0.1", 0).unwrap();
        socket.bind(&addr).unwrap();

        let mut bound = Ip4Address::new();
        socket.get_sock_name(&mut bound).unwrap();
        assert_eq!(bound.ip_as_string().unwrap(), "127.0.0.1");
        // the kernel picked an ephemeral port
        assert_ne!(bound.port().to_host(), 0);
    }

    #[test]
    fn sock_name_family_mismatch() {
        let socket = Socket::new(
            SocketFamily::Inet,
            SocketType::Dgram,
            SocketFlags::CLOEXEC,
            SocketProtocol::Default,
        )
        .unwrap();
        socket
            .bind(&Ip4Address::from_string("127.0.0.1", 0).unwrap())
            .unwrap();
        let mut wrong = crate::net::UnixAddress::new();
        let err = socket.get_sock_name(&mut wrong).unwrap_err();
        assert!(matches!(err, Error::Runtime(_)));
        assert!(wrong.is_unnamed());
    }

    #[test]
    fn stream_pair_exchange() {
        let (a, b) = Socket::new_pair(
            SocketFamily::Unix,
            SocketType::Stream,
            SocketFlags::CLOEXEC,
            SocketProtocol::Default,
        )
        .unwrap();
        a.send(b"ping", MessageFlags::empty()).unwrap();
        let mut buf = [0u8; 8];
        let len = b.receive(&mut buf, MessageFlags::empty()).unwrap();
        assert_eq!(&buf[..len], b"ping");

        b.shutdown(Direction::Write).unwrap();
        assert_eq!(a.receive(&mut buf, MessageFlags::empty()).unwrap(), 0);
    }
}
