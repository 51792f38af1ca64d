//! `/dev/rfkill` handling: detect hard/soft block and clear a soft block.
//!
//! `struct rfkill_event` is not exposed by `libc`; hand-defined here the
//! same way the wireless-extensions structs are in `wext.rs`.

use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::os::unix::io::AsRawFd;

use crate::error::{CaptureError, Result};

const RFKILL_DEV: &str = "/dev/rfkill";

const RFKILL_TYPE_WLAN: u8 = 1;
const RFKILL_OP_CHANGE: u8 = 2;

#[repr(C)]
#[derive(Clone, Copy, Debug)]
struct RfkillEvent {
    idx: u32,
    rf_type: u8,
    op: u8,
    soft: u8,
    hard: u8,
}

const EVENT_SIZE: usize = std::mem::size_of::<RfkillEvent>();

fn read_event(buf: &[u8]) -> RfkillEvent {
    RfkillEvent {
        idx: u32::from_ne_bytes([buf[0], buf[1], buf[2], buf[3]]),
        rf_type: buf[4],
        op: buf[5],
        soft: buf[6],
        hard: buf[7],
    }
}

fn write_event(ev: &RfkillEvent) -> [u8; EVENT_SIZE] {
    let mut buf = [0u8; EVENT_SIZE];
    buf[0..4].copy_from_slice(&ev.idx.to_ne_bytes());
    buf[4] = ev.rf_type;
    buf[5] = ev.op;
    buf[6] = ev.soft;
    buf[7] = ev.hard;
    buf
}

/// Current rfkill state for the WLAN class.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct RfkillState {
    pub hard_blocked: bool,
    pub soft_blocked: bool,
}

/// Scan all current rfkill events for any WLAN-class entry; returns the
/// OR of every matching event's soft/hard bits (any blocked switch blocks
/// the radio).
pub fn query_wlan_state() -> Result<RfkillState> {
    let mut file = OpenOptions::new()
        .read(true)
        .open(RFKILL_DEV)
        .map_err(|e| CaptureError::Privilege(format!("cannot open {RFKILL_DEV}: {e}")))?;
    set_nonblocking(&file)?;

    let mut state = RfkillState::default();
    let mut buf = [0u8; EVENT_SIZE];
    loop {
        match file.read(&mut buf) {
            Ok(n) if n == EVENT_SIZE => {
                let ev = read_event(&buf);
                if ev.rf_type == RFKILL_TYPE_WLAN {
                    state.hard_blocked |= ev.hard != 0;
                    state.soft_blocked |= ev.soft != 0;
                }
            }
            Ok(_) => break,
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => break,
            Err(e) => return Err(CaptureError::Privilege(format!("reading {RFKILL_DEV}: {e}"))),
        }
    }
    Ok(state)
}

/// Attempt to clear a soft rfkill block across all WLAN-class switches.
/// Does nothing for hard blocks, which cannot be cleared in software.
pub fn clear_soft_block() -> Result<()> {
    let mut file = OpenOptions::new()
        .write(true)
        .open(RFKILL_DEV)
        .map_err(|e| CaptureError::Privilege(format!("cannot open {RFKILL_DEV} for writing: {e}")))?;
    let ev = RfkillEvent { idx: 0, rf_type: RFKILL_TYPE_WLAN, op: RFKILL_OP_CHANGE, soft: 0, hard: 0 };
    file.write_all(&write_event(&ev))
        .map_err(|e| CaptureError::Privilege(format!("writing {RFKILL_DEV}: {e}")))
}

fn set_nonblocking(file: &File) -> Result<()> {
    let fd = file.as_raw_fd();
    let flags = unsafe { libc::fcntl(fd, libc::F_GETFL, 0) };
    if flags < 0 {
        return Err(CaptureError::Io(std::io::Error::last_os_error()));
    }
    let ret = unsafe { libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK) };
    if ret < 0 {
        return Err(CaptureError::Io(std::io::Error::last_os_error()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_round_trips_through_byte_encoding() {
        let ev = RfkillEvent { idx: 7, rf_type: RFKILL_TYPE_WLAN, op: RFKILL_OP_CHANGE, soft: 1, hard: 0 };
        let bytes = write_event(&ev);
        let back = read_event(&bytes);
        assert_eq!(back.idx, 7);
        assert_eq!(back.rf_type, RFKILL_TYPE_WLAN);
        assert_eq!(back.soft, 1);
        assert_eq!(back.hard, 0);
    }

    #[test]
    fn default_state_is_unblocked() {
        let state = RfkillState::default();
        assert!(!state.hard_blocked);
        assert!(!state.soft_blocked);
    }
}
