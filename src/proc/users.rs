//! Password and group database lookups.

use std::ffi::{CStr, CString};
use std::mem::MaybeUninit;

use crate::error::{Errno, Error, Result};
use crate::proc::{GroupId, UserId};
use crate::types::SysString;

const MAX_BUF_SIZE: usize = 64 * 1024;

fn start_buf_size(sysconf_name: libc::c_int) -> usize {
    match unsafe { libc::sysconf(sysconf_name) } {
        -1 => 1024,
        n => n as usize,
    }
}

/// One entry of the password database (`/etc/passwd` and its backends).
#[derive(Debug)]
pub struct PasswdInfo {
    name: CString,
    uid: UserId,
    gid: GroupId,
    gecos: CString,
    home_dir: CString,
    shell: CString,
}

impl PasswdInfo {
    /// Looks up the passwd entry for the user `name`.
    ///
    /// Returns `None` when no matching entry exists.
    pub fn of_name<'a>(name: impl Into<SysString<'a>>) -> Result<Option<PasswdInfo>> {
        let name = name.into();
        Self::lookup("getpwnam_r", |pwd, buf, len, res| unsafe {
            libc::getpwnam_r(name.raw(), pwd, buf, len, res)
        })
    }

    /// Looks up the passwd entry for the user id `uid`.
    pub fn of_uid(uid: UserId) -> Result<Option<PasswdInfo>> {
        Self::lookup("getpwuid_r", |pwd, buf, len, res| unsafe {
            libc::getpwuid_r(uid.raw(), pwd, buf, len, res)
        })
    }

    fn lookup(
        op: &'static str,
        mut call: impl FnMut(
            *mut libc::passwd,
            *mut libc::c_char,
            usize,
            *mut *mut libc::passwd,
        ) -> libc::c_int,
    ) -> Result<Option<PasswdInfo>> {
        let mut buf = vec![0 as libc::c_char; start_buf_size(libc::_SC_GETPW_R_SIZE_MAX)];
        loop {
            let mut pwd = MaybeUninit::<libc::passwd>::zeroed();
            let mut found: *mut libc::passwd = std::ptr::null_mut();
            let res = call(pwd.as_mut_ptr(), buf.as_mut_ptr(), buf.len(), &mut found);
            match Errno::from(res) {
                Errno::NoError => {
                    if found.is_null() {
                        return Ok(None);
                    }
                    let pwd = unsafe { pwd.assume_init() };
                    return Ok(Some(PasswdInfo {
                        name: own_string(pwd.pw_name),
                        uid: UserId::new(pwd.pw_uid),
                        gid: GroupId::new(pwd.pw_gid),
                        gecos: own_string(pwd.pw_gecos),
                        home_dir: own_string(pwd.pw_dir),
                        shell: own_string(pwd.pw_shell),
                    }));
                }
                Errno::Range if buf.len() < MAX_BUF_SIZE => {
                    buf.resize((buf.len() * 2).min(MAX_BUF_SIZE), 0);
                }
                errno => return Err(Error::api_errno(op, errno)),
            }
        }
    }

    pub fn name(&self) -> &CStr {
        &self.name
    }

    pub fn uid(&self) -> UserId {
        self.uid
    }

    pub fn gid(&self) -> GroupId {
        self.gid
    }

    /// The comment field, classically holding the full user name.
    pub fn gecos(&self) -> &CStr {
        &self.gecos
    }

    pub fn home_dir(&self) -> &CStr {
        &self.home_dir
    }

    pub fn shell(&self) -> &CStr {
        &self.shell
    }
}

/// One entry of the group database.
#[derive(Debug)]
pub struct GroupInfo {
    name: CString,
    gid: GroupId,
    members: Vec<CString>,
}

impl GroupInfo {
    /// Looks up the group entry for the group `name`.
    pub fn of_name<'a>(name: impl Into<SysString<'a>>) -> Result<Option<GroupInfo>> {
        let name = name.into();
        Self::lookup("getgrnam_r", |grp, buf, len, res| unsafe {
            libc::getgrnam_r(name.raw(), grp, buf, len, res)
        })
    }

    /// Looks up the group entry for the group id `gid`.
    pub fn of_gid(gid: GroupId) -> Result<Option<GroupInfo>> {
        Self::lookup("getgrgid_r", |grp, buf, len, res| unsafe {
            libc::getgrgid_r(gid.raw(), grp, buf, len, res)
        })
    }

    fn lookup(
        op: &'static str,
        mut call: impl FnMut(
            *mut libc::group,
            *mut libc::c_char,
            usize,
            *mut *mut libc::group,
        ) -> libc::c_int,
    ) -> Result<Option<GroupInfo>> {
        let mut buf = vec![0 as libc::c_char; start_buf_size(libc::_SC_GETGR_R_SIZE_MAX)];
        loop {
            let mut grp = MaybeUninit::<libc::group>::zeroed();
            let mut found: *mut libc::group = std::ptr::null_mut();
            let res = call(grp.as_mut_ptr(), buf.as_mut_ptr(), buf.len(), &mut found);
            match Errno::from(res) {
                Errno::NoError => {
                    if found.is_null() {
                        return Ok(None);
                    }
                    let grp = unsafe { grp.assume_init() };
                    let mut members = Vec::new();
                    let mut cursor = grp.gr_mem;
                    while !cursor.is_null() && !unsafe { *cursor }.is_null() {
                        members.push(own_string(unsafe { *cursor }));
                        cursor = unsafe { cursor.add(1) };
                    }
                    return Ok(Some(GroupInfo {
                        name: own_string(grp.gr_name),
                        gid: GroupId::new(grp.gr_gid),
                        members,
                    }));
                }
                Errno::Range if buf.len() < MAX_BUF_SIZE => {
                    buf.resize((buf.len() * 2).min(MAX_BUF_SIZE), 0);
                }
                errno => return Err(Error::api_errno(op, errno)),
            }
        }
    }

    pub fn name(&self) -> &CStr {
        &self.name
    }

    pub fn gid(&self) -> GroupId {
        self.gid
    }

    /// The login names of the group members.
    pub fn members(&self) -> &[CString] {
        &self.members
    }
}

fn own_string(ptr: *const libc::c_char) -> CString {
    if ptr.is_null() {
        return CString::default();
    }
    unsafe { CStr::from_ptr(ptr) }.to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_lookup() {
        let root = PasswdInfo::of_name(c"root").unwrap().unwrap();
        assert_eq!(root.uid(), UserId::ROOT);
        assert_eq!(root.name(), c"root");
        let by_uid = PasswdInfo::of_uid(UserId::ROOT).unwrap().unwrap();
        assert_eq!(by_uid.name(), c"root");
        assert!(!by_uid.home_dir().is_empty());
    }

    #[test]
    fn missing_entries_are_none() {
        assert!(
            PasswdInfo::of_name(c"no-such-user-3141")
                .unwrap()
                .is_none()
        );
        assert!(GroupInfo::of_name(c"no-such-group-3141").unwrap().is_none());
    }

    #[test]
    fn root_group() {
        let grp = GroupInfo::of_gid(GroupId::ROOT).unwrap().unwrap();
        assert_eq!(grp.gid(), GroupId::ROOT);
        assert!(!grp.name().is_empty());
    }
}
