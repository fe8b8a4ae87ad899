//! Vectored TCP exchange with partial-receive accounting.

use std::thread;

use syscore::net::{
    Ip4Address, ReceiveMessageHeader, SendMessageHeader, SocketFlags, Tcp4ClientSocket,
    Tcp4ListenSocket,
};

#[test]
fn scattered_send_gathered_receive() {
    let listener = Tcp4ListenSocket::new(SocketFlags::CLOEXEC).unwrap();
    listener.sock_options().set_reuse_address(true).unwrap();
    listener
        .bind(&Ip4Address::from_string("127.0.0.1", 0).unwrap())
        .unwrap();
    listener.listen(10).unwrap();
    let addr = listener.local_address().unwrap();

    let client = thread::spawn(move || {
        let client = Tcp4ClientSocket::new(SocketFlags::CLOEXEC).unwrap();
        let conn = client.connect(&addr).unwrap();

        let mut region1 = [0u8; 6];
        let mut region2 = [0u8; 6];
        let mut header = ReceiveMessageHeader::new();
        header.iovec.push(&mut region1);
        header.iovec.push(&mut region2);

        // a stream may deliver the payload in arbitrary pieces; keep
        // receiving until both regions are filled
        while header.iovec.left_bytes() > 0 {
            let (len, _) = conn.receive_message(&mut header).unwrap();
            assert!(len > 0, "premature end of stream");
        }
        drop(header);
        (region1, region2)
    });

    let server_conn = listener.accept(None, SocketFlags::CLOEXEC).unwrap();
    let mut header = SendMessageHeader::new();
    header.iovec.push(b"part1\0");
    header.iovec.push(b"part2\0");
    while header.iovec.left_bytes() > 0 {
        server_conn.send_message(&mut header).unwrap();
    }

    let (region1, region2) = client.join().unwrap();
    assert_eq!(&region1, b"part1\0");
    assert_eq!(&region2, b"part2\0");
}
