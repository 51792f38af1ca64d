//! Privileged monitor-mode capture helper for Linux Wi-Fi interfaces.
//!
//! See `SPEC_FULL.md` for the full design; `DESIGN.md` for the grounding
//! ledger tying each module back to the retrieved corpus.

pub mod capture;
pub mod channel;
pub mod control;
pub mod error;
pub mod framework;
pub mod iface;
pub mod monitor;
#[cfg(feature = "networkmanager")]
pub mod nm;
pub mod netlink;
pub mod phy_table;
pub mod probe;
pub mod rfkill;
pub mod wext;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::Arc;

use parking_lot::Mutex;
use pcap::{Active, Capture};

use crate::control::ChannelController;
use crate::error::{CaptureError, Result};
use crate::framework::datasource::{Datasource, OpenResult, ProbeResult};
use crate::framework::ringbuffer::RingBuffer;
use crate::framework::wire::Severity;

type Frame = (u64, i32, u32, Vec<u8>);

struct OpenedState {
    cap_interface: String,
    reset_nm_on_exit: bool,
    controller: ChannelController,
    cap: Mutex<Option<Capture<Active>>>,
    dlt: i32,
}

/// The concrete [`Datasource`] implementation wiring C1-C5 together behind
/// the framework's callback contract.
///
/// Informational/error transitions surfaced deep inside the core (parse
/// warnings from C1, bring-up transitions from C3, capture termination from
/// C5) don't have a direct line to the parent's wire protocol — that's
/// `framework::host::Host`'s job. They're forwarded here over an mpsc
/// channel whose receiving half `main.rs` hands to `Host::spawn_message_drain`,
/// the same "producer doesn't know about the wire, consumer owns the fd"
/// split as the frame ring buffer.
pub struct WifiDatasource {
    state: Mutex<Option<OpenedState>>,
    ring: Arc<RingBuffer<Frame>>,
    shutdown: Arc<AtomicBool>,
    messages: mpsc::Sender<(Severity, String)>,
}

impl WifiDatasource {
    pub fn new(
        ring_capacity: usize,
        shutdown: Arc<AtomicBool>,
    ) -> (Arc<Self>, mpsc::Receiver<(Severity, String)>) {
        let (tx, rx) = mpsc::channel();
        let datasource = Arc::new(WifiDatasource {
            state: Mutex::new(None),
            ring: RingBuffer::new(ring_capacity),
            shutdown,
            messages: tx,
        });
        (datasource, rx)
    }

    /// Shared ring buffer the event loop's write side drains frames from.
    pub fn ring(&self) -> Arc<RingBuffer<Frame>> {
        self.ring.clone()
    }

    /// If an interface was disowned from NetworkManager during open,
    /// restore it; called once at process exit (C6 step 5).
    pub fn restore_network_manager(&self) {
        let guard = self.state.lock();
        if let Some(state) = guard.as_ref() {
            if state.reset_nm_on_exit {
                #[cfg(feature = "networkmanager")]
                crate::nm::try_reown(&state.cap_interface);
            }
        }
    }

    fn notify(&self, severity: Severity, text: impl Into<String>) {
        let _ = self.messages.send((severity, text.into()));
    }
}

impl Datasource for WifiDatasource {
    fn probe(&self, definition: &str) -> Result<ProbeResult> {
        let result = crate::probe::probe(definition)?;
        Ok(ProbeResult { channels: result.channel_list })
    }

    fn open(&self, definition: &str) -> Result<OpenResult> {
        let brought_up = crate::monitor::bring_up(definition)?;
        for (severity, text) in &brought_up.messages {
            self.notify(*severity, text.clone());
        }
        let cap = crate::capture::open(&brought_up.cap_interface)?;
        let dlt = cap.get_datalink().0;

        let opened = OpenedState {
            cap_interface: brought_up.cap_interface.clone(),
            reset_nm_on_exit: brought_up.reset_nm_on_exit,
            controller: ChannelController::new(brought_up.control_plane),
            cap: Mutex::new(Some(cap)),
            dlt,
        };
        *self.state.lock() = Some(opened);

        Ok(OpenResult { channels: brought_up.channel_list, datalink: dlt })
    }

    fn chancontrol(&self, channel: &str, seqno: u32) -> Result<String> {
        let (parsed, warnings) = crate::channel::parse(channel);
        for w in warnings {
            self.notify(Severity::Info, w.0);
        }
        let parsed = match parsed {
            crate::channel::ParseOutcome::Channel(c) => c,
            crate::channel::ParseOutcome::Rejected(msg) => {
                return Err(CaptureError::Configuration(msg));
            }
        };

        let guard = self.state.lock();
        let state = guard
            .as_ref()
            .ok_or_else(|| CaptureError::Configuration("chancontrol called before open".to_string()))?;
        state.controller.set_channel(&parsed, seqno)?;
        Ok(crate::channel::render(&parsed))
    }

    fn capture(&self) -> Result<()> {
        let cap = {
            let guard = self.state.lock();
            let state = guard
                .as_ref()
                .ok_or_else(|| CaptureError::Configuration("capture called before open".to_string()))?;
            let cap = state
                .cap
                .lock()
                .take()
                .ok_or_else(|| CaptureError::Configuration("capture already running".to_string()))?;
            (state.cap_interface.clone(), state.dlt, cap)
        };
        let (cap_interface, dlt, cap) = cap;

        let result = crate::capture::run(cap, &cap_interface, dlt, &self.ring, &self.shutdown);
        self.ring.close();
        if let Err(ref e) = result {
            self.notify(Severity::Fatal, e.to_string());
        }
        result
    }
}
