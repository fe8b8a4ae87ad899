//! End-to-end child process orchestration.

use std::ffi::CString;
use std::io::Read;

use syscore::fs::FdFile;
use syscore::io::Pipe;
use syscore::proc::{ChildCloner, ExitStatus, Signal};

#[test]
fn environment_override_reaches_the_child() {
    let mut pipe = Pipe::new().unwrap();
    let mut cloner = ChildCloner::new();
    cloner.set_args(vec![
        CString::from(c"sh"),
        CString::from(c"-c"),
        CString::from(c"echo \"$SYSCORE_MARKER\""),
    ]);
    cloner.set_env(vec![
        CString::from(c"PATH=/usr/bin:/bin"),
        CString::from(c"SYSCORE_MARKER=through-the-env"),
    ]);
    cloner.set_stdout(pipe.write_end());

    let mut child = cloner.run().unwrap();
    pipe.close_write_end().unwrap();
    let mut out = String::new();
    FdFile::new(pipe.take_read_end())
        .read_to_string(&mut out)
        .unwrap();
    assert_eq!(out.trim_end(), "through-the-env");
    assert!(child.wait().unwrap().exited());
}

#[test]
fn extra_descriptor_inheritance() {
    let mut pipe = Pipe::new().unwrap();
    let write_raw = pipe.write_end().raw().raw();

    let mut cloner = ChildCloner::new();
    let script = format!("echo inherited >&{write_raw}");
    cloner.set_args(vec![
        CString::from(c"sh"),
        CString::from(c"-c"),
        CString::new(script).unwrap(),
    ]);
    cloner.add_inherit_fd(pipe.write_end()).unwrap();

    let mut child = cloner.run().unwrap();
    pipe.close_write_end().unwrap();
    let mut out = String::new();
    FdFile::new(pipe.take_read_end())
        .read_to_string(&mut out)
        .unwrap();
    assert_eq!(out.trim_end(), "inherited");
    assert!(child.wait().unwrap().exited());
}

#[test]
fn signal_terminates_child() {
    let mut cloner = ChildCloner::new();
    cloner.set_args(vec![CString::from(c"sleep"), CString::from(c"30")]);
    let mut child = cloner.run().unwrap();

    child.kill(Signal::TERM).unwrap();
    let state = child.wait().unwrap();
    assert!(state.killed());
    assert_eq!(state.signal, Some(Signal::TERM));
}

#[test]
fn sentinel_status_for_non_executable() {
    let mut cloner = ChildCloner::new();
    // /etc/fstab exists but has no execute permission
    cloner.set_exe(c"/etc/fstab");
    let mut child = cloner.run().unwrap();
    let state = child.wait().unwrap();
    assert!(state.exited());
    assert_eq!(state.status, Some(ExitStatus::PROG_NOT_EXECUTABLE));
}
