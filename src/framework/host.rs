//! The event loop / callback registry (F4): reads inbound frames from the
//! parent, dispatches to the registered [`Datasource`], writes responses,
//! and spawns the capture thread once `open` succeeds.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::os::unix::io::{FromRawFd, RawFd};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use log::{error, info, warn};
use parking_lot::Mutex;

use crate::framework::datasource::Datasource;
use crate::framework::hop::HopScheduler;
use crate::framework::ringbuffer::RingBuffer;
use crate::framework::wire::{read_frame, write_frame, Frame, Severity};

/// The item type the capture thread enqueues and the drain thread below
/// forwards to the parent as `Frame::Data` (timestamp, dlt, caplen, bytes).
type FrameItem = (u64, i32, u32, Vec<u8>);

/// Owns the two control fds and the registered datasource; runs the
/// cooperative single-threaded event loop.
pub struct Host {
    reader: Mutex<BufReader<File>>,
    writer: Mutex<BufWriter<File>>,
    datasource: Arc<dyn Datasource>,
    capture_shutdown: Arc<AtomicBool>,
    hop: Mutex<Option<HopScheduler>>,
    capture_thread: Mutex<Option<std::thread::JoinHandle<()>>>,
    drain_thread: Mutex<Option<JoinHandle<()>>>,
    message_drain_thread: Mutex<Option<JoinHandle<()>>>,
}

impl Host {
    /// # Safety-adjacent note
    /// `in_fd`/`out_fd` are inherited from the parent process per the
    /// invocation contract (`SPEC_FULL.md` §6); they are valid open fds for
    /// the lifetime of this process.
    ///
    /// `capture_shutdown` must be the same `Arc` the capture loop itself
    /// reads (`WifiDatasource`'s flag): the capture thread never traverses
    /// `Host`, so a private flag here would never reach it, and
    /// `Host::shutdown`'s join of the capture thread would hang forever on
    /// a clean event-loop exit.
    pub fn new(
        in_fd: RawFd,
        out_fd: RawFd,
        datasource: Arc<dyn Datasource>,
        capture_shutdown: Arc<AtomicBool>,
    ) -> Self {
        let in_file = unsafe { File::from_raw_fd(in_fd) };
        let out_file = unsafe { File::from_raw_fd(out_fd) };
        Host {
            reader: Mutex::new(BufReader::new(in_file)),
            writer: Mutex::new(BufWriter::new(out_file)),
            datasource,
            capture_shutdown,
            hop: Mutex::new(None),
            capture_thread: Mutex::new(None),
            drain_thread: Mutex::new(None),
            message_drain_thread: Mutex::new(None),
        }
    }

    /// Spawn the thread that drains `ring` and forwards each item to the
    /// parent as a `Frame::Data`, preserving the order the capture thread
    /// enqueued them in (`SPEC_FULL.md` §5 ordering guarantee). Must be
    /// called on an `Arc<Host>` since the thread outlives this call.
    pub fn spawn_frame_drain(self: &Arc<Host>, ring: Arc<RingBuffer<FrameItem>>) {
        let host = self.clone();
        let handle = std::thread::Builder::new()
            .name("framedrain".into())
            .spawn(move || {
                while let Some((timestamp_us, dlt, caplen, bytes)) = ring.recv() {
                    host.send(&Frame::Data { timestamp_us, dlt, caplen, bytes });
                }
            })
            .expect("failed to spawn frame-drain thread");
        *self.drain_thread.lock() = Some(handle);
    }

    /// Spawn the thread that drains the [`WifiDatasource`]'s informational/
    /// error/fatal channel and forwards each as a `Frame::Message`. Like
    /// [`Self::spawn_frame_drain`], must be called on an `Arc<Host>`.
    ///
    /// [`WifiDatasource`]: crate::WifiDatasource
    ///
    /// Polls with a short timeout rather than blocking on `recv()` forever:
    /// the `Sender` half lives inside the datasource `Host` itself owns, so
    /// a plain blocking `recv()` would never observe disconnection until
    /// after `Host` (and this thread's own join in [`Self::shutdown`]) had
    /// already dropped — a self-deadlock. Polling against
    /// `capture_shutdown` sidesteps that.
    pub fn spawn_message_drain(self: &Arc<Host>, messages: mpsc::Receiver<(Severity, String)>) {
        let host = self.clone();
        let shutdown = self.capture_shutdown.clone();
        let handle = std::thread::Builder::new()
            .name("msgdrain".into())
            .spawn(move || loop {
                match messages.recv_timeout(Duration::from_millis(200)) {
                    Ok((severity, text)) => host.message(severity, text),
                    Err(mpsc::RecvTimeoutError::Timeout) => {
                        if shutdown.load(Ordering::Relaxed) {
                            break;
                        }
                    }
                    Err(mpsc::RecvTimeoutError::Disconnected) => break,
                }
            })
            .expect("failed to spawn message-drain thread");
        *self.message_drain_thread.lock() = Some(handle);
    }

    fn send(&self, frame: &Frame) {
        use std::io::Write;
        let mut w = self.writer.lock();
        if let Err(e) = write_frame(&mut *w, frame) {
            warn!("failed writing frame to parent: {e}");
            return;
        }
        if let Err(e) = w.flush() {
            warn!("failed flushing frame to parent: {e}");
        }
    }

    fn message(&self, severity: Severity, text: impl Into<String>) {
        self.send(&Frame::Message { severity, text: text.into() });
    }

    /// Run the event loop until the parent closes `in-fd` or a fatal error
    /// occurs. Takes `self: &Arc<Host>` (rather than `&self`) because
    /// [`Self::spawn_hop`] needs to clone the `Host` itself into the hop
    /// thread so a fatal hop-escalation error can be forwarded to the
    /// parent as a `MESSAGE` frame.
    pub fn run(self: &Arc<Host>, spacing: usize, dwell: Duration) {
        loop {
            let frame = {
                let mut r = self.reader.lock();
                match read_frame(&mut *r) {
                    Ok(Some(f)) => f,
                    Ok(None) => {
                        info!("parent closed the control channel");
                        break;
                    }
                    Err(e) => {
                        error!("error reading control frame: {e}");
                        break;
                    }
                }
            };

            match frame {
                Frame::ProbeReq { definition } => match self.datasource.probe(&definition) {
                    Ok(result) => self.send(&Frame::ProbeResp { channels: result.channels }),
                    Err(e) => {
                        self.message(Severity::Error, e.to_string());
                        self.send(&Frame::ProbeResp { channels: Vec::new() });
                    }
                },
                Frame::OpenReq { definition } => match self.datasource.open(&definition) {
                    Ok(result) => {
                        self.send(&Frame::OpenResp {
                            success: true,
                            dlt: result.datalink,
                            message: String::new(),
                        });
                        self.spawn_capture();
                        self.spawn_hop(result.channels, spacing, dwell);
                    }
                    Err(e) => {
                        self.send(&Frame::OpenResp { success: false, dlt: 0, message: e.to_string() });
                        self.message(Severity::Fatal, e.to_string());
                        break;
                    }
                },
                Frame::ConfigureReq { seqno, channel } => {
                    match self.datasource.chancontrol(&channel, seqno) {
                        Ok(rendered) => self.send(&Frame::ConfigureResp { seqno, channel: rendered }),
                        Err(e) => {
                            let severity = if seqno == 0 { Severity::Error } else { Severity::Fatal };
                            self.message(severity, e.to_string());
                            if seqno != 0 {
                                break;
                            }
                        }
                    }
                }
                other => {
                    warn!("unexpected inbound frame on control channel: {other:?}");
                }
            }
        }

        self.shutdown();
    }

    fn spawn_capture(&self) {
        let datasource = self.datasource.clone();
        let shutdown = self.capture_shutdown.clone();
        let handle = std::thread::Builder::new()
            .name("capture".into())
            .spawn(move || {
                if let Err(e) = datasource.capture() {
                    error!("capture loop ended: {e}");
                }
                shutdown.store(true, Ordering::Relaxed);
            })
            .expect("failed to spawn capture thread");
        *self.capture_thread.lock() = Some(handle);
    }

    /// Spawn the hop scheduler. A fatal hop-escalation error (11th
    /// consecutive channel-control failure, `SPEC_FULL.md` §4.4/§7 item 4)
    /// is forwarded to the parent as a fatal `MESSAGE` frame and trips the
    /// shared `capture_shutdown` flag so the capture thread and event loop
    /// unwind together rather than the hop thread silently going quiet.
    fn spawn_hop(self: &Arc<Host>, channels: Vec<String>, spacing: usize, dwell: Duration) {
        if channels.is_empty() {
            return;
        }
        let host = self.clone();
        let shutdown = self.capture_shutdown.clone();
        let scheduler = HopScheduler::spawn(
            self.datasource.clone(),
            channels,
            spacing,
            dwell,
            shutdown,
            move |err| host.message(Severity::Fatal, err),
        );
        *self.hop.lock() = Some(scheduler);
    }

    fn shutdown(&self) {
        self.capture_shutdown.store(true, Ordering::Relaxed);
        if let Some(mut hop) = self.hop.lock().take() {
            hop.stop();
        }
        if let Some(handle) = self.capture_thread.lock().take() {
            let _ = handle.join();
        }
        if let Some(handle) = self.drain_thread.lock().take() {
            let _ = handle.join();
        }
        if let Some(handle) = self.message_drain_thread.lock().take() {
            let _ = handle.join();
        }
    }
}
