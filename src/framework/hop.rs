//! Channel-hop scheduler (F3).
//!
//! Owns only a shuffle index and a spacing parameter; the mechanism is in
//! scope, the *policy* of which channel to prefer next is explicitly not
//! (`SPEC_FULL.md` §1). It walks the probed channel list in a fixed shuffle
//! order and invokes [`Datasource::chancontrol`] with `seqno == 0` on a
//! timer, so the asymmetric failure-tolerance policy in `control.rs` kicks
//! in automatically.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::{debug, error};

use crate::framework::datasource::Datasource;

/// Computes a visit order over `channels` such that no channel within
/// `spacing` positions of the last `spacing` visited repeats before the
/// rest of the list has been covered once. A simple stride-based shuffle:
/// visiting index `(i * stride) % n` for a stride coprime with `n` spreads
/// consecutive visits apart without needing per-call state beyond a
/// counter.
pub fn shuffle_order(channels_len: usize, spacing: usize) -> Vec<usize> {
    if channels_len == 0 {
        return Vec::new();
    }
    let stride = pick_stride(channels_len, spacing.max(1));
    let mut order = Vec::with_capacity(channels_len);
    let mut idx = 0usize;
    for _ in 0..channels_len {
        order.push(idx);
        idx = (idx + stride) % channels_len;
    }
    order
}

fn pick_stride(n: usize, spacing: usize) -> usize {
    let mut candidate = spacing.max(1) + 1;
    while candidate < n {
        if gcd(candidate, n) == 1 {
            return candidate;
        }
        candidate += 1;
    }
    1
}

fn gcd(a: usize, b: usize) -> usize {
    if b == 0 {
        a
    } else {
        gcd(b, a % b)
    }
}

/// Handle to a running hop-scheduler thread.
pub struct HopScheduler {
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl HopScheduler {
    /// Spawn the hop thread. `dwell` is how long to stay on each channel.
    ///
    /// `capture_shutdown` is the same flag the capture loop and event loop
    /// read: the 11th consecutive hopper-driven channel-control failure is
    /// fatal (`SPEC_FULL.md` §4.4/§7 item 4), and that fatal must not just
    /// stop hopping quietly — it has to unwind the whole process the same
    /// way a capture-loop termination does. `on_fatal` forwards the error
    /// text to the parent as a `MESSAGE` frame; it's a closure rather than
    /// a direct `Host` reference so this module doesn't need to depend on
    /// `host.rs`.
    pub fn spawn(
        datasource: Arc<dyn Datasource>,
        channels: Vec<String>,
        spacing: usize,
        dwell: Duration,
        capture_shutdown: Arc<AtomicBool>,
        on_fatal: impl Fn(String) + Send + 'static,
    ) -> Self {
        let running = Arc::new(AtomicBool::new(true));
        let running_thread = running.clone();
        let order = shuffle_order(channels.len(), spacing);

        let handle = thread::Builder::new()
            .name("chanhop".into())
            .spawn(move || {
                if channels.is_empty() {
                    return;
                }
                let mut pos = 0usize;
                while running_thread.load(Ordering::Relaxed) {
                    let chan = &channels[order[pos % order.len()]];
                    debug!("hop: tuning to {chan}");
                    if let Err(e) = datasource.chancontrol(chan, 0) {
                        let msg = format!("hop scheduler stopping after fatal channel-control error: {e}");
                        error!("{msg}");
                        on_fatal(msg);
                        capture_shutdown.store(true, Ordering::Relaxed);
                        break;
                    }
                    pos += 1;
                    thread::sleep(dwell);
                }
            })
            .expect("failed to spawn chanhop thread");

        HopScheduler { running, handle: Some(handle) }
    }

    pub fn stop(&mut self) {
        self.running.store(false, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for HopScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shuffle_never_repeats_within_spacing_before_full_cycle() {
        let order = shuffle_order(8, 4);
        assert_eq!(order.len(), 8);
        let mut seen = std::collections::HashSet::new();
        for (i, &chan) in order.iter().enumerate() {
            for back in 1..=3.min(i) {
                assert_ne!(order[i - back], chan, "channel revisited within spacing window");
            }
            seen.insert(chan);
        }
        assert_eq!(seen.len(), 8, "full cycle should cover every channel once");
    }

    #[test]
    fn empty_channel_list_yields_empty_order() {
        assert!(shuffle_order(0, 4).is_empty());
    }
}
