//! Network interface enumeration and name/index translation.

use std::ffi::{CStr, CString};

use crate::error::{Error, Result};
use crate::net::InterfaceIndex;

/// Name and index of one network interface.
#[derive(Debug, Clone)]
pub struct InterfaceInfo {
    index: InterfaceIndex,
    name: CString,
}

impl InterfaceInfo {
    pub fn index(&self) -> InterfaceIndex {
        self.index
    }

    pub fn name(&self) -> &CStr {
        &self.name
    }
}

/// A snapshot of the network interfaces present on the system
/// (`if_nameindex()`).
#[derive(Debug)]
pub struct InterfaceEnumerator {
    interfaces: Vec<InterfaceInfo>,
}

impl InterfaceEnumerator {
    /// Takes a fresh snapshot of the interface list.
    pub fn fetch() -> Result<InterfaceEnumerator> {
        let head = unsafe { libc::if_nameindex() };
        if head.is_null() {
            return Err(Error::api("if_nameindex"));
        }
        let mut interfaces = Vec::new();
        let mut cursor = head;
        unsafe {
            while (*cursor).if_index != 0 && !(*cursor).if_name.is_null() {
                interfaces.push(InterfaceInfo {
                    index: InterfaceIndex((*cursor).if_index),
                    name: CStr::from_ptr((*cursor).if_name).to_owned(),
                });
                cursor = cursor.add(1);
            }
            libc::if_freenameindex(head);
        }
        Ok(InterfaceEnumerator { interfaces })
    }

    pub fn interfaces(&self) -> &[InterfaceInfo] {
        &self.interfaces
    }

    pub fn iter(&self) -> std::slice::Iter<'_, InterfaceInfo> {
        self.interfaces.iter()
    }
}

impl<'a> IntoIterator for &'a InterfaceEnumerator {
    type Item = &'a InterfaceInfo;
    type IntoIter = std::slice::Iter<'a, InterfaceInfo>;

    fn into_iter(self) -> Self::IntoIter {
        self.interfaces.iter()
    }
}

/// Translates an interface name like `lo` into its index.
pub fn name_to_index(name: &CStr) -> Result<InterfaceIndex> {
    let res = unsafe { libc::if_nametoindex(name.as_ptr()) };
    if res == 0 {
        return Err(Error::api("if_nametoindex"));
    }
    Ok(InterfaceIndex(res))
}

/// Translates an interface index back into its name.
pub fn index_to_name(index: InterfaceIndex) -> Result<CString> {
    let mut buf = [0 as libc::c_char; libc::IF_NAMESIZE];
    let res = unsafe { libc::if_indextoname(index.raw(), buf.as_mut_ptr()) };
    if res.is_null() {
        return Err(Error::api("if_indextoname"));
    }
    Ok(unsafe { CStr::from_ptr(buf.as_ptr()) }.to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loopback_is_enumerated() {
        let interfaces = InterfaceEnumerator::fetch().unwrap();
        let lo = interfaces
            .iter()
            .find(|info| info.name() == c"lo")
            .expect("loopback interface should exist");
        assert_ne!(lo.index(), InterfaceIndex::ANY);
    }

    #[test]
    fn name_index_round_trip() {
        let index = name_to_index(c"lo").unwrap();
        assert_eq!(index_to_name(index).unwrap().as_c_str(), c"lo");
        assert!(name_to_index(c"no-such-if-3141").is_err());
    }
}
