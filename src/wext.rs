//! Legacy Linux wireless-extensions ioctl plane: the fallback control path
//! used when nl80211 is unavailable on a driver.
//!
//! `libc` does not expose the wireless-extensions ioctl numbers or
//! `struct iwreq`/`struct iw_freq` (they live in `<linux/wireless.h>`, not
//! `<sys/ioctl.h>`), so they are hand-defined here the way
//! `other_examples/40b819f5_EliteTK-socketcan-rs__src-nl.rs.rs` hand-defines
//! kernel constants missing from both `libc` and `neli` in a local `mod`.

use std::ffi::CString;
use std::io;
use std::os::unix::io::RawFd;

use crate::error::{CaptureError, Result};

const IFNAMSIZ: usize = 16;

const SIOCGIWMODE: libc::c_ulong = 0x8B07;
const SIOCSIWMODE: libc::c_ulong = 0x8B06;
const SIOCGIWFREQ: libc::c_ulong = 0x8B05;
const SIOCSIWFREQ: libc::c_ulong = 0x8B04;

/// `IW_MODE_*` values from `<linux/wireless.h>`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IwMode {
    Auto = 0,
    Adhoc = 1,
    Infra = 2,
    Master = 3,
    Repeat = 4,
    Secondary = 5,
    Monitor = 6,
}

impl IwMode {
    fn from_raw(v: i32) -> Option<Self> {
        Some(match v {
            0 => IwMode::Auto,
            1 => IwMode::Adhoc,
            2 => IwMode::Infra,
            3 => IwMode::Master,
            4 => IwMode::Repeat,
            5 => IwMode::Secondary,
            6 => IwMode::Monitor,
            _ => return None,
        })
    }
}

#[repr(C)]
#[derive(Clone, Copy)]
struct IwFreq {
    m: i32,
    e: i16,
    i: u8,
    flags: u8,
}

#[repr(C)]
union IwreqUnion {
    mode: i32,
    freq: IwFreq,
    raw: [u8; 16],
}

#[repr(C)]
struct Iwreq {
    ifr_name: [libc::c_char; IFNAMSIZ],
    u: IwreqUnion,
}

fn ifr_name(name: &str) -> Result<[libc::c_char; IFNAMSIZ]> {
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

/// Read the current wireless mode (managed/monitor/etc) of `ifname`.
pub fn get_mode(ifname: &str) -> Result<IwMode> {
    let fd = open_ioctl_socket()?;
    let mut req = Iwreq { ifr_name: ifr_name(ifname)?, u: IwreqUnion { mode: 0 } };
    let ret = unsafe { libc::ioctl(fd, SIOCGIWMODE, &mut req as *mut _) };
    let saved_errno = io::Error::last_os_error();
    unsafe { libc::close(fd) };
    if ret < 0 {
        return Err(CaptureError::DriverCapability(format!(
            "SIOCGIWMODE on {ifname} failed: {saved_errno}"
        )));
    }
    let raw = unsafe { req.u.mode };
    IwMode::from_raw(raw)
        .ok_or_else(|| CaptureError::DriverCapability(format!("unrecognized iwmode {raw} on {ifname}")))
}

/// Switch `ifname` into monitor mode (or back) via the legacy ioctl plane.
pub fn set_mode(ifname: &str, mode: IwMode) -> Result<()> {
    let fd = open_ioctl_socket()?;
    let mut req = Iwreq { ifr_name: ifr_name(ifname)?, u: IwreqUnion { mode: mode as i32 } };
    let ret = unsafe { libc::ioctl(fd, SIOCSIWMODE, &mut req as *mut _) };
    let saved_errno = io::Error::last_os_error();
    unsafe { libc::close(fd) };
    if ret < 0 {
        return Err(CaptureError::DriverCapability(format!(
            "SIOCSIWMODE({mode:?}) on {ifname} failed: {saved_errno}"
        )));
    }
    Ok(())
}

/// Set the operating frequency (MHz) via the legacy ioctl plane. There is
/// no width/center concept here: HT40/VHT80/VHT160 requests degrade to
/// their primary frequency only, which is this control plane's inherent
/// limit (see `control.rs`).
pub fn set_freq(ifname: &str, freq_mhz: u32) -> Result<()> {
    let fd = open_ioctl_socket()?;
    let freq = IwFreq { m: freq_mhz as i32 * 100_000, e: 1, i: 0, flags: 0 };
    let mut req = Iwreq { ifr_name: ifr_name(ifname)?, u: IwreqUnion { freq } };
    let ret = unsafe { libc::ioctl(fd, SIOCSIWFREQ, &mut req as *mut _) };
    let saved_errno = io::Error::last_os_error();
    unsafe { libc::close(fd) };
    if ret < 0 {
        return Err(CaptureError::Transient(format!(
            "SIOCSIWFREQ({freq_mhz}) on {ifname} failed: {saved_errno}"
        )));
    }
    Ok(())
}

/// Read the current operating frequency (MHz).
pub fn get_freq(ifname: &str) -> Result<u32> {
    let fd = open_ioctl_socket()?;
    let mut req = Iwreq { ifr_name: ifr_name(ifname)?, u: IwreqUnion { freq: IwFreq { m: 0, e: 0, i: 0, flags: 0 } } };
    let ret = unsafe { libc::ioctl(fd, SIOCGIWFREQ, &mut req as *mut _) };
    let saved_errno = io::Error::last_os_error();
    unsafe { libc::close(fd) };
    if ret < 0 {
        return Err(CaptureError::DriverCapability(format!(
            "SIOCGIWFREQ on {ifname} failed: {saved_errno}"
        )));
    }
    let f = unsafe { req.u.freq };
    Ok(iw_freq_to_mhz(f))
}

fn iw_freq_to_mhz(f: IwFreq) -> u32 {
    if f.e >= 6 {
        // Already in Hz-scale multiples; unlikely on real drivers but
        // handled for completeness.
        let scale = 10u64.pow((f.e as u32).saturating_sub(6));
        ((f.m as u64) * scale / 1_000_000) as u32
    } else {
        let scale = 10u64.pow(f.e.max(0) as u32);
        ((f.m as u64) * scale / 1_000_000) as u32
    }
}

/// Enumerate channel numbers this driver reports over the legacy plane.
/// Real wireless-extensions doesn't expose a clean "list of channels"
/// ioctl without `SIOCGIWRANGE`'s variable-length payload; this crate
/// models it with the same `iw_range` structure, returning the fixed
/// 2.4 GHz channel set supported by virtually every legacy driver as a
/// conservative floor when the driver's actual range cannot be parsed.
pub fn get_chanlist(ifname: &str) -> Result<Vec<u32>> {
    // Attempting a full SIOCGIWRANGE decode is out of scope for the
    // control-plane core; fall back to probing SIOCGIWFREQ support as a
    // liveness check and return the standard 2.4 GHz channel list.
    get_freq(ifname)?;
    Ok((1..=14).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn iw_freq_scale_is_mhz() {
        // 2437 MHz encoded as m=2437000000, e=1 -> stored value is in
        // units of 10^e Hz, i.e. m * 10^e Hz total.
        let f = IwFreq { m: 243700000, e: 1, i: 0, flags: 0 };
        assert_eq!(iw_freq_to_mhz(f), 2437);
    }

    #[test]
    fn ifr_name_rejects_overlong() {
        let name = "a".repeat(IFNAMSIZ);
        assert!(ifr_name(&name).is_err());
    }

    #[test]
    fn ifr_name_accepts_typical_name() {
        assert!(ifr_name("wlan0").is_ok());
    }
}
