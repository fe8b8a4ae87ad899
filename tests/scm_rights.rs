//! File descriptor passing over UNIX domain sockets.

use syscore::fs::{self, FileStatus, OpenFlags, OpenMode};
use syscore::net::{
    OptLevel, ReceiveMessageHeader, SendMessageHeader, UnixRightsMessage, create_dgram_socket_pair,
};
use syscore::proc::{self, ExitStatus, WaitFlags, WaitTarget};
use syscore::types::FollowSymlinks;

#[test]
fn transfer_fd_to_forked_child() {
    let (parent_sock, child_sock) = create_dgram_socket_pair().unwrap();

    match proc::fork().unwrap() {
        None => {
            // child: receive one descriptor and compare it against a fresh
            // open of the same file
            let ok = (|| -> Option<bool> {
                let mut header = ReceiveMessageHeader::new();
                header.set_control_buffer_size(1024);
                let mut payload = [0u8; 16];
                header.iovec.push(&mut payload);
                child_sock.receive_message(&mut header, None).ok()?;

                let mut rights = UnixRightsMessage::new();
                let mut found = false;
                for msg in header.messages() {
                    if msg.level() == Some(OptLevel::Socket)
                        && msg.as_unix_message() == Some(syscore::net::UnixMessage::Rights)
                    {
                        rights.deserialize(msg).ok()?;
                        found = true;
                    }
                }
                if !found {
                    return Some(false);
                }

                let fds = rights.take_fds();
                if fds.len() != 1 {
                    return Some(false);
                }

                let received = FileStatus::of_fd(fds[0]).ok()?;
                let by_path =
                    FileStatus::of_path(c"/etc/hosts", FollowSymlinks::new(true)).ok()?;
                Some(received.is_same_file(&by_path))
            })()
            .unwrap_or(false);
            proc::exit(if ok {
                ExitStatus::SUCCESS
            } else {
                ExitStatus::FAILURE
            });
        }
        Some(pid) => {
            let hosts =
                fs::File::open(c"/etc/hosts", OpenMode::ReadOnly, OpenFlags::CLOEXEC, None)
                    .unwrap();

            let mut rights = UnixRightsMessage::new();
            rights.add_fd(hosts.fd());

            let mut header = SendMessageHeader::new();
            header.iovec.push(b"take this");
            header.control_msg = Some(rights.serialize().unwrap());
            parent_sock.send_message(&mut header, None).unwrap();
            // the ancillary data went out with the first send
            assert!(header.control_msg.is_none());

            let state = proc::wait(WaitTarget::Process(pid), WaitFlags::WAIT_FOR_EXITED)
                .unwrap()
                .unwrap();
            assert!(state.exited());
            assert_eq!(state.status, Some(ExitStatus::SUCCESS));
        }
    }
}

#[test]
fn unclaimed_rights_do_not_leak() {
    let (sender, receiver) = create_dgram_socket_pair().unwrap();

    let file = fs::File::open(c"/etc/hosts", OpenMode::ReadOnly, OpenFlags::CLOEXEC, None).unwrap();
    let mut rights = UnixRightsMessage::new();
    rights.add_fd(file.fd());
    let mut header = SendMessageHeader::new();
    header.iovec.push(b"x");
    header.control_msg = Some(rights.serialize().unwrap());
    sender.send_message(&mut header, None).unwrap();

    let received_fd;
    {
        let mut header = ReceiveMessageHeader::new();
        header.set_control_buffer_size(256);
        let mut payload = [0u8; 4];
        header.iovec.push(&mut payload);
        receiver.receive_message(&mut header, None).unwrap();

        let mut incoming = UnixRightsMessage::new();
        let msg = header.messages().next().unwrap();
        incoming.deserialize(msg).unwrap();
        assert_eq!(incoming.num_fds(), 1);

        // peek at the raw number, then drop without take_fds()
        received_fd = syscore::FileDescriptor::new(syscore::FileNum::new(i32::from_ne_bytes(
            msg.data()[..4].try_into().unwrap(),
        )));
        assert!(received_fd.get_flags().is_ok());
    }

    // the drop of UnixRightsMessage closed the unclaimed descriptor
    assert_eq!(
        received_fd.get_flags().unwrap_err().errno(),
        Some(syscore::Errno::BadFd)
    );
}
