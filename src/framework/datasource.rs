//! The callback-registration contract (F5) between the framework's event
//! loop and this crate's actual Wi-Fi implementation (C1-C5).
//!
//! Mirrors the shape of a capture source in the host system this was
//! distilled from: `probe` (can we use this source?), `open` (bring it up),
//! `chantranslate`/`chancontrol` (channel string <-> tuned state), and
//! `capture` (start the blocking read loop). Implemented once, by
//! `WifiDatasource` in `lib.rs`.

use crate::error::Result;

/// One probed/opened channel-capable source.
pub struct ProbeResult {
    pub channels: Vec<String>,
}

/// Result of a successful open.
pub struct OpenResult {
    pub channels: Vec<String>,
    pub datalink: i32,
}

pub trait Datasource: Send + Sync {
    /// Can `definition` be captured from, and if so what channels does it
    /// expose? Does not mutate interface state.
    fn probe(&self, definition: &str) -> Result<ProbeResult>;

    /// Bring the source up: rfkill/NM coordination, monitor-mode vif
    /// creation or in-place switch, pcap open.
    fn open(&self, definition: &str) -> Result<OpenResult>;

    /// Apply `channel` (a channel spec string). `seqno == 0` means the
    /// internal hop scheduler; any other value is an explicit parent
    /// request and is held to the strict failure policy. On success,
    /// returns the channel string reconstituted via C1's renderer so an
    /// explicit configure can echo back exactly which channel landed,
    /// rather than the parent's original (possibly degraded) request text.
    fn chancontrol(&self, channel: &str, seqno: u32) -> Result<String>;

    /// Run the blocking capture loop on the calling thread. Returns once
    /// the capture handle errors or a shutdown is requested.
    fn capture(&self) -> Result<()>;
}
