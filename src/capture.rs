//! C5 — Capture Loop: drive the pcap handle and forward frames with
//! backpressure-aware retry.
//!
//! Grounded on `other_examples/75f89bd8_Diskyver-pcap__src-lib.rs.rs`:
//! the safe `pcap` API exposes `Capture<Active>::next_packet` (no raw
//! `pcap_loop`/`breakloop`), so termination here is modeled with a shared
//! `AtomicBool` checked each iteration, bounded by the capture handle's own
//! read timeout (`SPEC_FULL.md` §4.3 step 10 sets this to 1000 ms).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use log::{error, info};
use pcap::{Active, Capture};

use crate::error::{CaptureError, Result};
use crate::framework::ringbuffer::{RingBuffer, SendOutcome};

const SNAPLEN: i32 = 8192;
const TIMEOUT_MS: i32 = 1000;
const SPACE_WAIT: Duration = Duration::from_millis(200);

/// Open a capture handle on `ifname` the way `monitor.rs` step 10 requires:
/// 8192-byte snaplen, promiscuous, 1000 ms timeout.
pub fn open(ifname: &str) -> Result<Capture<Active>> {
    let device = pcap::Device::list()
        .map_err(CaptureError::from)?
        .into_iter()
        .find(|d| d.name == ifname)
        .ok_or_else(|| CaptureError::DriverCapability(format!("no such capture device: {ifname}")))?;

    let cap = Capture::from_device(device)
        .map_err(CaptureError::from)?
        .snaplen(SNAPLEN)
        .promisc(true)
        .timeout(TIMEOUT_MS)
        .open()
        .map_err(CaptureError::from)?;
    Ok(cap)
}

/// Shared shutdown flag: set by the control thread to stop the capture
/// loop, checked by the loop itself on every iteration.
pub fn new_shutdown_flag() -> Arc<AtomicBool> {
    Arc::new(AtomicBool::new(false))
}

/// Run the blocking capture loop until the handle errors, terminates, or
/// `shutdown` is set. `ifname` is used only for the teardown hint (was the
/// interface unplugged?).
pub fn run(
    mut cap: Capture<Active>,
    ifname: &str,
    dlt: i32,
    ring: &RingBuffer<(u64, i32, u32, Vec<u8>)>,
    shutdown: &AtomicBool,
) -> Result<()> {
    loop {
        if shutdown.load(Ordering::Relaxed) {
            info!("capture loop on {ifname}: shutdown requested");
            return Ok(());
        }

        match cap.next_packet() {
            Ok(packet) => {
                let ts = packet.header.ts;
                let timestamp_us = (ts.tv_sec as u64) * 1_000_000 + ts.tv_usec as u64;
                let caplen = packet.header.caplen;
                let bytes = packet.data.to_vec();
                dispatch(ring, shutdown, timestamp_us, dlt, caplen, bytes)?;
            }
            Err(pcap::Error::TimeoutExpired) => continue,
            Err(e) => {
                let hint = teardown_hint(ifname);
                error!("capture loop on {ifname} ended: {e}{hint}");
                return Err(CaptureError::CaptureTerminated(format!("{e}{hint}")));
            }
        }
    }
}

/// Deliver one frame with bounded retry-with-suspension: a `WouldBlock`
/// parks on "ring buffer has space" and retries; a `Closed` terminates the
/// loop.
fn dispatch(
    ring: &RingBuffer<(u64, i32, u32, Vec<u8>)>,
    shutdown: &AtomicBool,
    timestamp_us: u64,
    dlt: i32,
    caplen: u32,
    bytes: Vec<u8>,
) -> Result<()> {
    let mut item = (timestamp_us, dlt, caplen, bytes);
    loop {
        match ring.send_data(item) {
            SendOutcome::Sent => return Ok(()),
            SendOutcome::Closed(_) => {
                return Err(CaptureError::CaptureTerminated(
                    "ring buffer closed by consumer".to_string(),
                ))
            }
            SendOutcome::WouldBlock(returned) => {
                if shutdown.load(Ordering::Relaxed) {
                    return Ok(());
                }
                ring.wait_for_space(SPACE_WAIT);
                item = returned;
            }
        }
    }
}

fn teardown_hint(ifname: &str) -> String {
    match crate::iface::is_up(ifname) {
        Ok(true) => String::new(),
        Ok(false) => format!(" (interface {ifname} is no longer up; unplugged or reclaimed by NetworkManager/DHCP)"),
        Err(_) => format!(" (interface {ifname} state could not be determined)"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::framework::ringbuffer::RingBuffer;

    #[test]
    fn backpressure_retries_then_delivers_exactly_once() {
        let ring = RingBuffer::new(1);
        // Fill the buffer so the next send would block.
        assert_eq!(ring.send_data((0, 0, 0, vec![])), SendOutcome::Sent);

        let sender = std::thread::spawn({
            let ring = ring.clone();
            move || dispatch(&ring, &AtomicBool::new(false), 1, 127, 3, vec![1, 2, 3])
        });

        // Drain the first item so space frees up; the queued dispatch call
        // above should then succeed exactly once.
        std::thread::sleep(Duration::from_millis(50));
        assert_eq!(ring.recv(), Some((0, 0, 0, vec![])));

        sender.join().unwrap().unwrap();
        assert_eq!(ring.recv(), Some((1, 127, 3, vec![1, 2, 3])));
    }
}
