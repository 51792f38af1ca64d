//! C4 — Channel Control: apply a parsed channel through whichever control
//! plane is active, with the asymmetric seqno-based failure-tolerance
//! policy described in `SPEC_FULL.md` §4.4.

use std::sync::atomic::{AtomicU32, Ordering};

use log::error;

use crate::channel::{ChanType, ChanWidth, ParsedChannel};
use crate::error::{CaptureError, Result};
use crate::netlink::{ChanWidthKind, ChannelRequest, HtType, Nl80211Handle};
use crate::wext;

/// Maximum number of consecutive hopper-driven (`seqno == 0`) failures
/// tolerated before escalating to fatal.
pub const MAX_CONSECUTIVE_HOP_FAILURES: u32 = 10;

/// Either control plane, selected once at open time (see `monitor.rs`).
pub enum ControlPlane {
    Netlink { handle: Nl80211Handle, ifindex: i32 },
    Ioctl { ifname: String },
}

/// Channel-control state: the active plane plus the rolling failure
/// counter used only by hopper-driven requests.
pub struct ChannelController {
    plane: ControlPlane,
    consecutive_failures: AtomicU32,
}

impl ChannelController {
    pub fn new(plane: ControlPlane) -> Self {
        ChannelController { plane, consecutive_failures: AtomicU32::new(0) }
    }

    /// Current consecutive-failure count (exposed for tests).
    pub fn failure_count(&self) -> u32 {
        self.consecutive_failures.load(Ordering::Relaxed)
    }

    /// Apply `parsed` to the active control plane.
    ///
    /// `seqno == 0` is the internal channel hopper: failures are counted
    /// and tolerated up to [`MAX_CONSECUTIVE_HOP_FAILURES`], escalating to
    /// a fatal [`CaptureError::Transient`] only once that count is
    /// exceeded; a success resets the counter. Any other `seqno` is an
    /// explicit request from the parent: any failure is immediately fatal,
    /// and success returns `Ok(())` so the caller can send a
    /// configure-response.
    pub fn set_channel(&self, parsed: &ParsedChannel, seqno: u32) -> Result<()> {
        let outcome = self.apply(parsed);

        if seqno != 0 {
            return outcome;
        }

        match outcome {
            Ok(()) => {
                self.consecutive_failures.store(0, Ordering::Relaxed);
                Ok(())
            }
            Err(e) => {
                let prev = self.consecutive_failures.fetch_add(1, Ordering::Relaxed);
                let count = prev + 1;
                if count > MAX_CONSECUTIVE_HOP_FAILURES {
                    error!("channel hop failed {count} times consecutively; escalating to fatal");
                    Err(CaptureError::Transient(format!(
                        "{count} consecutive channel-hop failures, last error: {e}"
                    )))
                } else {
                    error!("channel hop failure {count}/{MAX_CONSECUTIVE_HOP_FAILURES}: {e}");
                    Ok(())
                }
            }
        }
    }

    fn apply(&self, parsed: &ParsedChannel) -> Result<()> {
        match &self.plane {
            ControlPlane::Ioctl { ifname } => wext::set_freq(ifname, parsed.control_freq),
            ControlPlane::Netlink { handle, ifindex } => {
                let req = to_netlink_request(parsed);
                handle.set_channel(*ifindex, req)
            }
        }
    }
}

fn to_netlink_request(parsed: &ParsedChannel) -> ChannelRequest {
    let width = match parsed.chan_width {
        ChanWidth::Vht80 => Some(ChanWidthKind::Vht80),
        ChanWidth::Vht160 => Some(ChanWidthKind::Vht160),
        ChanWidth::W5 => Some(ChanWidthKind::W5),
        ChanWidth::W10 => Some(ChanWidthKind::W10),
        ChanWidth::Default20 => None,
    };
    let ht_type = match parsed.chan_type {
        ChanType::NoHt => HtType::NoHt,
        ChanType::Ht40Minus => HtType::Ht40Minus,
        ChanType::Ht40Plus => HtType::Ht40Plus,
    };
    ChannelRequest {
        freq: parsed.control_freq,
        ht_type,
        width,
        center_freq1: parsed.center_freq1,
        center_freq2: parsed.center_freq2,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::{ChanType, ChanWidth, ParsedChannel};
    use std::sync::atomic::{AtomicU32, Ordering as Ord};

    /// A stub control plane used only by tests: fails the first `fail_for`
    /// calls, then succeeds.
    struct StubController {
        calls: AtomicU32,
        fail_for: u32,
        consecutive_failures: AtomicU32,
    }

    impl StubController {
        fn new(fail_for: u32) -> Self {
            StubController { calls: AtomicU32::new(0), fail_for, consecutive_failures: AtomicU32::new(0) }
        }

        fn set_channel(&self, seqno: u32) -> Result<()> {
            let call = self.calls.fetch_add(1, Ord::Relaxed);
            let outcome: Result<()> = if call < self.fail_for {
                Err(CaptureError::Transient("stub failure".into()))
            } else {
                Ok(())
            };

            if seqno != 0 {
                return outcome;
            }

            match outcome {
                Ok(()) => {
                    self.consecutive_failures.store(0, Ord::Relaxed);
                    Ok(())
                }
                Err(e) => {
                    let count = self.consecutive_failures.fetch_add(1, Ord::Relaxed) + 1;
                    if count > MAX_CONSECUTIVE_HOP_FAILURES {
                        Err(CaptureError::Transient(format!("{count} failures: {e}")))
                    } else {
                        Ok(())
                    }
                }
            }
        }
    }

    fn dummy_channel() -> ParsedChannel {
        ParsedChannel {
            control_freq: 2437,
            chan_type: ChanType::NoHt,
            chan_width: ChanWidth::Default20,
            center_freq1: 0,
            center_freq2: 0,
            unusual_center1: false,
        }
    }

    #[test]
    fn hopping_tolerates_ten_failures_then_resets() {
        let stub = StubController::new(10);
        for _ in 0..10 {
            assert!(stub.set_channel(0).is_ok());
        }
        assert!(stub.set_channel(0).is_ok());
        assert_eq!(stub.consecutive_failures.load(Ord::Relaxed), 0);
    }

    #[test]
    fn hopping_escalates_on_eleventh_consecutive_failure() {
        let stub = StubController::new(11);
        for _ in 0..10 {
            assert!(stub.set_channel(0).is_ok());
        }
        assert!(stub.set_channel(0).is_err());
    }

    #[test]
    fn explicit_set_is_strict() {
        let stub = StubController::new(1);
        assert!(stub.set_channel(42).is_err());
    }

    #[test]
    fn explicit_set_success_returns_ok() {
        let stub = StubController::new(0);
        assert!(stub.set_channel(42).is_ok());
    }

    #[test]
    fn real_controller_ioctl_plane_rejects_without_device() {
        let ctrl = ChannelController::new(ControlPlane::Ioctl { ifname: "kismon_test_missing0".into() });
        let chan = dummy_channel();
        // No such device exists in the test sandbox; the ioctl must fail,
        // and with seqno=0 that failure must be tolerated (Ok) rather than
        // propagated, since it is a single failure under the threshold.
        assert!(ctrl.set_channel(&chan, 0).is_ok());
        assert_eq!(ctrl.failure_count(), 1);
    }
}
