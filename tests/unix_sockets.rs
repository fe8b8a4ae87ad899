//! UNIX domain socket scenarios: datagram exchange over bound paths and
//! abstract address round trips through the kernel.

use syscore::fs::TempDir;
use syscore::net::{MessageFlags, SocketFlags, UnixAddress, UnixDatagramSocket};
use syscore::types::Abstract;

fn path_address(dir: &TempDir, name: &str) -> UnixAddress {
    let path = dir.path().unwrap().join(name);
    UnixAddress::from_path(path.to_str().unwrap().as_bytes(), Abstract::new(false)).unwrap()
}

#[test]
fn datagram_pair_exchange_over_paths() {
    let dir = TempDir::new(c"/tmp/syscore-dgram-{}").unwrap();

    let first = UnixDatagramSocket::new(SocketFlags::CLOEXEC).unwrap();
    let first_addr = path_address(&dir, "first.sock");
    first.bind(&first_addr).unwrap();

    let second = UnixDatagramSocket::new(SocketFlags::CLOEXEC).unwrap();
    second
        .send_to(b"message-from-second", &first_addr, MessageFlags::empty())
        .unwrap();

    let mut buf = [0u8; 64];
    let len = first.receive(&mut buf, MessageFlags::empty()).unwrap();
    assert_eq!(&buf[..len], b"message-from-second");

    // now bind the second socket as well, so replies carry a sender
    let second_addr = path_address(&dir, "second.sock");
    second.bind(&second_addr).unwrap();
    first
        .send_to(b"message-from-first", &second_addr, MessageFlags::empty())
        .unwrap();

    let (len, from) = second.receive_from(&mut buf, MessageFlags::empty()).unwrap();
    assert_eq!(&buf[..len], b"message-from-first");
    assert_eq!(from.unwrap(), first_addr);
}

#[test]
fn unbound_sender_yields_no_address() {
    let dir = TempDir::new(c"/tmp/syscore-dgram-{}").unwrap();
    let receiver = UnixDatagramSocket::new(SocketFlags::CLOEXEC).unwrap();
    receiver.bind(&path_address(&dir, "recv.sock")).unwrap();

    let sender = UnixDatagramSocket::new(SocketFlags::CLOEXEC).unwrap();
    sender
        .send_to(b"anonymous", &receiver.local_address().unwrap(), MessageFlags::empty())
        .unwrap();

    let mut buf = [0u8; 16];
    let (len, from) = receiver.receive_from(&mut buf, MessageFlags::empty()).unwrap();
    assert_eq!(&buf[..len], b"anonymous");
    assert!(from.is_none());
}

#[test]
fn abstract_address_kernel_round_trip() {
    let addr = UnixAddress::from_path(b"somepath", Abstract::new(true)).unwrap();
    let socket = UnixDatagramSocket::new(SocketFlags::CLOEXEC).unwrap();
    socket.bind(&addr).unwrap();

    let bound = socket.local_address().unwrap();
    assert_eq!(bound, addr);
    assert!(bound.is_abstract());
    // the leading NUL marker is not part of the reported path
    assert_eq!(bound.get_path(), b"somepath");
    assert_eq!(bound.label(), "@somepath");
}
