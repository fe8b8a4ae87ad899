//! Descriptor ownership behavior observable through the kernel.

use syscore::fs::{self, CloseRangeFlags, OpenFlags, OpenMode};
use syscore::proc::{self, ExitStatus, WaitTarget, WaitFlags};
use syscore::{Errno, FileNum};

/// Runs `body` in a forked child and asserts it exited cleanly, so that
/// destructive descriptor manipulation cannot disturb the test harness.
fn in_child(body: impl FnOnce() -> bool) {
    match proc::fork().unwrap() {
        None => {
            let ok = body();
            proc::exit(if ok {
                ExitStatus::SUCCESS
            } else {
                ExitStatus::FAILURE
            });
        }
        Some(pid) => {
            let state = proc::wait(WaitTarget::Process(pid), WaitFlags::WAIT_FOR_EXITED)
                .unwrap()
                .unwrap();
            assert!(state.exited());
            assert_eq!(state.status, Some(ExitStatus::SUCCESS));
        }
    }
}

#[test]
fn close_range_invalidates_following_descriptors() {
    in_child(|| {
        let fd1 = fs::open(c"/etc/fstab", OpenMode::ReadOnly, OpenFlags::empty(), None).unwrap();
        let fd2 = fs::open(c"/etc/fstab", OpenMode::ReadOnly, OpenFlags::empty(), None).unwrap();
        if fd1.raw() == fd2.raw() {
            return false;
        }

        fs::close_range(fd1.raw(), FileNum::MAX_FD, CloseRangeFlags::empty()).unwrap();

        // the range covered both descriptors
        let first_gone = fd1.get_flags().unwrap_err().errno() == Some(Errno::BadFd);
        let second_gone = fd2.get_flags().unwrap_err().errno() == Some(Errno::BadFd);
        first_gone && second_gone
    });
}

#[test]
fn cloexec_only_close_range_keeps_descriptors_open() {
    in_child(|| {
        let fd = fs::open(c"/etc/fstab", OpenMode::ReadOnly, OpenFlags::empty(), None).unwrap();
        fs::close_range(fd.raw(), FileNum::MAX_FD, CloseRangeFlags::CLOEXEC).unwrap();
        // still open, but now marked close-on-exec
        let flags = fd.get_flags().unwrap();
        flags.contains(syscore::fd::DescFlags::CLOEXEC)
    });
}

#[test]
fn every_acquisition_closes_exactly_once() {
    // dropping the owner must release the descriptor number for reuse
    let first_raw;
    {
        let file =
            fs::File::open(c"/etc/fstab", OpenMode::ReadOnly, OpenFlags::CLOEXEC, None).unwrap();
        first_raw = file.fd().raw();
    }
    let file = fs::File::open(c"/etc/fstab", OpenMode::ReadOnly, OpenFlags::CLOEXEC, None).unwrap();
    assert_eq!(file.fd().raw(), first_raw);

    // a disowned descriptor survives its wrapper and needs a manual close
    let mut wrapper =
        fs::File::open(c"/etc/fstab", OpenMode::ReadOnly, OpenFlags::CLOEXEC, None).unwrap();
    let mut raw = wrapper.disown();
    drop(wrapper);
    assert!(raw.get_flags().is_ok());
    raw.close().unwrap();
}
