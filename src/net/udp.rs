//! UDP socket specializations.

use std::marker::PhantomData;

use crate::error::Result;
use crate::fd::FileDescriptor;
use crate::net::ip_family::{Inet4, Inet6, IpFamily};
use crate::net::message_header::{ReceiveMessageHeader, SendMessageHeader};
use crate::net::options::{SocketOptions, UdpOptions};
use crate::net::{MessageFlags, Socket, SocketFlags, SocketProtocol, SocketType};
use crate::types::AddressFilledIn;

/// A UDP socket for the IP family `F`.
#[derive(Debug)]
pub struct UdpSocket<F: IpFamily> {
    socket: Socket,
    _family: PhantomData<F>,
}

impl<F: IpFamily> UdpSocket<F> {
    pub fn new(flags: SocketFlags) -> Result<Self> {
        let socket = Socket::new(F::FAMILY, SocketType::Dgram, flags, SocketProtocol::Udp)?;
        Ok(UdpSocket {
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

    /// Sets the default peer address, enabling plain [`send`](Self::send)
    /// and [`receive`](Self::receive).
    pub fn connect(&self, addr: &F::Address) -> Result<()> {
        self.socket.connect(addr)
    }

    pub fn local_address(&self) -> Result<F::Address> {
        let mut addr = F::Address::default();
        self.socket.get_sock_name(&mut addr)?;
        Ok(addr)
    }

    pub fn send(&self, buf: &[u8], flags: MessageFlags) -> Result<usize> {
        self.socket.send(buf, flags)
    }

    pub fn send_to(&self, buf: &[u8], addr: &F::Address, flags: MessageFlags) -> Result<usize> {
        self.socket.send_to(buf, addr, flags)
    }

    pub fn receive(&self, buf: &mut [u8], flags: MessageFlags) -> Result<usize> {
        self.socket.receive(buf, flags)
    }

    /// Receives a datagram, reporting the sender address when the kernel
    /// provided one.
    pub fn receive_from(
        &self,
        buf: &mut [u8],
        flags: MessageFlags,
    ) -> Result<(usize, Option<F::Address>)> {
        let mut addr = F::Address::default();
        let (len, filled_in) = self.socket.receive_from(buf, &mut addr, flags)?;
        Ok((len, filled_in.get().then_some(addr)))
    }

    pub fn send_message(
        &self,
        header: &mut SendMessageHeader<'_>,
        addr: Option<&F::Address>,
    ) -> Result<usize> {
        self.socket
            .send_message(header, addr.map(|a| a as &dyn crate::net::SocketAddress))
    }

    pub fn receive_message(
        &self,
        header: &mut ReceiveMessageHeader<'_>,
        addr: Option<&mut F::Address>,
    ) -> Result<(usize, AddressFilledIn)> {
        self.socket.receive_message(
            header,
            addr.map(|a| a as &mut dyn crate::net::SocketAddress),
        )
    }

    pub fn sock_options(&self) -> SocketOptions<'_> {
        SocketOptions::new(self.socket.fd())
    }

    pub fn ip_options(&self) -> F::Options<'_> {
        F::ip_options(self.socket.fd())
    }

    pub fn udp_options(&self) -> UdpOptions<'_> {
        UdpOptions::new(self.socket.fd())
    }
}

/// IPv4 UDP socket.
pub type Udp4Socket = UdpSocket<Inet4>;
/// IPv6 UDP socket.
pub type Udp6Socket = UdpSocket<Inet6>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::Ip4Address;

    #[test]
    fn datagram_exchange() {
        let receiver = Udp4Socket::new(SocketFlags::CLOEXEC).unwrap();
        receiver
            .bind(&Ip4Address::from_string("127.0.0.1", 0).unwrap())
            .unwrap();
        let receiver_addr = receiver.local_address().unwrap();

        let sender = Udp4Socket::new(SocketFlags::CLOEXEC).unwrap();
        sender
            .bind(&Ip4Address::from_string("127.0.0.1", 0).unwrap())
            .unwrap();
        let sender_addr = sender.local_address().unwrap();

        sender
            .send_to(b"datagram payload", &receiver_addr, MessageFlags::empty())
            .unwrap();

        let mut buf = [0u8; 64];
        let (len, from) = receiver
            .receive_from(&mut buf, MessageFlags::empty())
            .unwrap();
        assert_eq!(&buf[..len], b"datagram payload");
        assert_eq!(from, Some(sender_addr));
    }

    #[test]
    fn connected_send_receive() {
        let receiver = Udp4Socket::new(SocketFlags::CLOEXEC).unwrap();
        receiver
            .bind(&Ip4Address::from_string("127.0.0.1", 0).unwrap())
            .unwrap();
        let addr = receiver.local_address().unwrap();

        let sender = Udp4Socket::new(SocketFlags::CLOEXEC).unwrap();
        sender.connect(&addr).unwrap();
        sender.send(b"connected", MessageFlags::empty()).unwrap();

        let mut buf = [0u8; 16];
        let len = receiver.receive(&mut buf, MessageFlags::empty()).unwrap();
        assert_eq!(&buf[..len], b"connected");
    }
}
