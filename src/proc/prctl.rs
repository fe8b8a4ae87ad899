//! Process control settings (`prctl()`).

use crate::error::{Error, Result};
use crate::proc::signal::Signal;

fn prctl_set(op: libc::c_int, arg: libc::c_ulong) -> Result<()> {
    if unsafe { libc::prctl(op, arg, 0, 0, 0) } == -1 {
        return Err(Error::api("prctl"));
    }
    Ok(())
}

fn prctl_get(op: libc::c_int) -> Result<libc::c_int> {
    let res = unsafe { libc::prctl(op, 0, 0, 0, 0) };
    if res == -1 {
        return Err(Error::api("prctl"));
    }
    Ok(res)
}

/// Controls whether the process may produce core dumps and may be attached
/// to via ptrace by unprivileged processes.
pub fn set_dumpable(dumpable: bool) -> Result<()> {
    prctl_set(libc::PR_SET_DUMPABLE, dumpable as libc::c_ulong)
}

pub fn get_dumpable() -> Result<bool> {
    Ok(prctl_get(libc::PR_GET_DUMPABLE)? != 0)
}

/// Controls whether permitted capabilities are kept when all UIDs change
/// away from zero.
pub fn set_keep_capabilities(keep: bool) -> Result<()> {
    prctl_set(libc::PR_SET_KEEPCAPS, keep as libc::c_ulong)
}

pub fn get_keep_capabilities() -> Result<bool> {
    Ok(prctl_get(libc::PR_GET_KEEPCAPS)? != 0)
}

/// Arranges for `signal` to be delivered to the caller when its parent
/// dies; `None` clears the setting.
pub fn set_parent_death_signal(signal: Option<Signal>) -> Result<()> {
    prctl_set(
        libc::PR_SET_PDEATHSIG,
        signal.map(|s| s.raw()).unwrap_or(0) as libc::c_ulong,
    )
}

pub fn get_parent_death_signal() -> Result<Option<Signal>> {
    let mut raw: libc::c_int = 0;
    let res = unsafe { libc::prctl(libc::PR_GET_PDEATHSIG, &mut raw as *mut libc::c_int) };
    if res == -1 {
        return Err(Error::api("prctl"));
    }
    Ok((raw != 0).then(|| Signal::from_raw(raw)))
}

/// Sets the irreversible no-new-privs attribute: execve() will no longer
/// grant privileges (setuid bits, file capabilities).
pub fn set_no_new_privs() -> Result<()> {
    prctl_set(libc::PR_SET_NO_NEW_PRIVS, 1)
}

pub fn get_no_new_privs() -> Result<bool> {
    Ok(prctl_get(libc::PR_GET_NO_NEW_PRIVS)? != 0)
}

/// Sets the name of the calling thread (at most 15 bytes are kept).
pub fn set_process_name(name: &std::ffi::CStr) -> Result<()> {
    prctl_set(libc::PR_SET_NAME, name.as_ptr() as libc::c_ulong)
}

pub fn get_process_name() -> Result<std::ffi::CString> {
    let mut buf = [0 as libc::c_char; 16];
    if unsafe { libc::prctl(libc::PR_GET_NAME, buf.as_mut_ptr()) } == -1 {
        return Err(Error::api("prctl"));
    }
    Ok(unsafe { std::ffi::CStr::from_ptr(buf.as_ptr()) }.to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[serial_test::serial]
    fn dumpable_round_trip() {
        let initial = get_dumpable().unwrap();
        set_dumpable(false).unwrap();
        assert!(!get_dumpable().unwrap());
        set_dumpable(initial).unwrap();
    }

    #[test]
    fn pdeathsig_round_trip() {
        assert_eq!(get_parent_death_signal().unwrap(), None);
        set_parent_death_signal(Some(Signal::HUP)).unwrap();
        assert_eq!(get_parent_death_signal().unwrap(), Some(Signal::HUP));
        set_parent_death_signal(None).unwrap();
    }

    #[test]
    fn thread_name_round_trip() {
        std::thread::spawn(|| {
            set_process_name(c"syscore-test").unwrap();
            assert_eq!(get_process_name().unwrap().as_c_str(), c"syscore-test");
        })
        .join()
        .unwrap();
    }
}
