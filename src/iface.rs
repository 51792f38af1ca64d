//! Generic link-layer ioctls shared by both control planes: MAC address,
//! up/down flags, and ifindex lookup.
//!
//! `neli::rtnl`'s `Ifinfomsg` was considered (it is the teacher's own
//! generic-link API) but the retrieved `neli` release mixes an old
//! flat-constructor `Ifinfomsg` (`src/rtnl.rs`) with references to a
//! builder-based one (`IfinfomsgBuilderError` in `src/err.rs`), so which
//! shape the pinned version actually exports is unverifiable from the pack.
//! Raw ioctl via `libc` sidesteps that ambiguity entirely and is the same
//! "hand-define what the dependency doesn't reliably expose" approach used
//! in `wext.rs`.

use std::ffi::CString;
use std::io;
use std::os::unix::io::RawFd;

use crate::error::{CaptureError, Result};

const IFNAMSIZ: usize = 16;

#[repr(C)]
struct IfreqFlags {
    ifr_name: [libc::c_char; IFNAMSIZ],
    ifr_flags: libc::c_short,
}

#[repr(C)]
struct IfreqHwaddr {
    ifr_name: [libc::c_char; IFNAMSIZ],
    ifr_hwaddr: libc::sockaddr,
}

fn name_buf(name: &str) -> Result<[libc::c_char; IFNAMSIZ]> {
    if name.len() >= IFNAMSIZ {
        return Err(CaptureError::Configuration(format!(
            "interface name {name:?} too long for IFNAMSIZ"
        )));
    }
    let c = CString::new(name).map_err(|e| CaptureError::Configuration(e.to_string()))?;
    let mut buf = [0 as libc::c_char; IFNAMSIZ];
    for (i, b) in c.as_bytes().iter().enumerate() {
        buf[i] = *b as libc::c_char;
    }
    Ok(buf)
}

fn open_ioctl_socket() -> Result<RawFd> {
    let fd = unsafe { libc::socket(libc::AF_INET, libc::SOCK_DGRAM, 0) };
    if fd < 0 {
        return Err(CaptureError::Io(io::Error::last_os_error()));
    }
    Ok(fd)
}

/// Resolve an interface name to its kernel ifindex.
pub fn if_nametoindex(name: &str) -> Result<i32> {
    let c = CString::new(name).map_err(|e| CaptureError::Configuration(e.to_string()))?;
    let idx = unsafe { libc::if_nametoindex(c.as_ptr()) };
    if idx == 0 {
        return Err(CaptureError::Configuration(format!("no such interface: {name}")));
    }
    Ok(idx as i32)
}

/// Read `IFF_*` flags for `name`.
pub fn get_flags(name: &str) -> Result<i16> {
    let fd = open_ioctl_socket()?;
    let mut req = IfreqFlags { ifr_name: name_buf(name)?, ifr_flags: 0 };
    let ret = unsafe { libc::ioctl(fd, libc::SIOCGIFFLAGS, &mut req as *mut _) };
    let saved_errno = io::Error::last_os_error();
    unsafe { libc::close(fd) };
    if ret < 0 {
        return Err(CaptureError::Privilege(format!("SIOCGIFFLAGS on {name} failed: {saved_errno}")));
    }
    Ok(req.ifr_flags)
}

fn set_flags(name: &str, flags: i16) -> Result<()> {
    let fd = open_ioctl_socket()?;
    let mut req = IfreqFlags { ifr_name: name_buf(name)?, ifr_flags: flags };
    let ret = unsafe { libc::ioctl(fd, libc::SIOCSIFFLAGS, &mut req as *mut _) };
    let saved_errno = io::Error::last_os_error();
    unsafe { libc::close(fd) };
    if ret < 0 {
        return Err(CaptureError::Privilege(format!("SIOCSIFFLAGS on {name} failed: {saved_errno}")));
    }
    Ok(())
}

/// Is `name` currently administratively up?
pub fn is_up(name: &str) -> Result<bool> {
    Ok(get_flags(name)? as i32 & libc::IFF_UP as i32 != 0)
}

/// Bring `name` up (`IFF_UP`), preserving other existing flags.
pub fn bring_up(name: &str) -> Result<()> {
    let flags = get_flags(name)?;
    set_flags(name, flags | libc::IFF_UP as i16)
}

/// Bring `name` down, preserving other existing flags.
pub fn bring_down(name: &str) -> Result<()> {
    let flags = get_flags(name)?;
    set_flags(name, flags & !(libc::IFF_UP as i16))
}

/// Read the interface hardware (MAC) address as 6 raw bytes.
pub fn get_hwaddr(name: &str) -> Result<[u8; 6]> {
    let fd = open_ioctl_socket()?;
    let mut req = IfreqHwaddr {
        ifr_name: name_buf(name)?,
        ifr_hwaddr: unsafe { std::mem::zeroed() },
    };
    let ret = unsafe { libc::ioctl(fd, libc::SIOCGIFHWADDR, &mut req as *mut _) };
    let saved_errno = io::Error::last_os_error();
    unsafe { libc::close(fd) };
    if ret < 0 {
        return Err(CaptureError::Privilege(format!("SIOCGIFHWADDR on {name} failed: {saved_errno}")));
    }
    let mut mac = [0u8; 6];
    mac.copy_from_slice(&req.ifr_hwaddr.sa_data[0..6].iter().map(|b| *b as u8).collect::<Vec<u8>>());
    Ok(mac)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_buf_rejects_overlong() {
        let name = "x".repeat(IFNAMSIZ);
        assert!(name_buf(&name).is_err());
    }

    #[test]
    fn name_buf_accepts_typical_name() {
        let buf = name_buf("wlan0mon").unwrap();
        assert_eq!(buf[0] as u8 as char, 'w');
    }
}
