//! Error types surfaced by this crate.
//!
//! Mirrors the manual `Display`/[`std::error::Error`] style used by `neli`
//! and `pcap` rather than pulling in an error-derive crate: each variant
//! wraps the lower-level error it came from, and [`CaptureError`] adds the
//! classification the framework needs to route a failure to the right
//! channel (informational, error, or fatal).

use std::fmt::{self, Display};
use std::io;

/// Errors produced anywhere in this crate.
///
/// The variants correspond to the error classes named in the design: most
/// are fatal wherever they are returned, except [`CaptureError::Transient`]
/// which the channel-hop caller is expected to count and tolerate, and
/// [`CaptureError::NetworkManager`] which is never treated as fatal and is
/// only ever logged/messaged.
#[derive(Debug)]
pub enum CaptureError {
    /// Malformed or incomplete source definition.
    Configuration(String),
    /// Rfkill or link-state operations the process lacks privilege or
    /// ability to perform.
    Privilege(String),
    /// Neither control plane can perform the requested operation.
    DriverCapability(String),
    /// A channel-set attempt failed; caller decides tolerance.
    Transient(String),
    /// The capture loop ended.
    CaptureTerminated(String),
    /// NetworkManager coordination failed; always non-fatal.
    NetworkManager(String),
    /// Wrapped I/O error.
    Io(io::Error),
    /// Wrapped netlink router error.
    Netlink(String),
    /// Wrapped pcap error.
    Pcap(String),
}

impl CaptureError {
    /// Construct a configuration error from anything [`Display`].
    pub fn config<D: Display>(d: D) -> Self {
        CaptureError::Configuration(d.to_string())
    }

    /// True if this error class should never be escalated to fatal by the
    /// caller (currently only NetworkManager coordination failures).
    pub fn is_advisory(&self) -> bool {
        matches!(self, CaptureError::NetworkManager(_))
    }
}

impl Display for CaptureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaptureError::Configuration(msg) => write!(f, "configuration error: {msg}"),
            CaptureError::Privilege(msg) => write!(f, "privilege/environment error: {msg}"),
            CaptureError::DriverCapability(msg) => write!(f, "driver capability error: {msg}"),
            CaptureError::Transient(msg) => write!(f, "transient tuning error: {msg}"),
            CaptureError::CaptureTerminated(msg) => write!(f, "capture terminated: {msg}"),
            CaptureError::NetworkManager(msg) => write!(f, "NetworkManager: {msg}"),
            CaptureError::Io(err) => write!(f, "I/O error: {err}"),
            CaptureError::Netlink(msg) => write!(f, "netlink error: {msg}"),
            CaptureError::Pcap(msg) => write!(f, "pcap error: {msg}"),
        }
    }
}

impl std::error::Error for CaptureError {}

impl From<io::Error> for CaptureError {
    fn from(err: io::Error) -> Self {
        CaptureError::Io(err)
    }
}

impl From<pcap::Error> for CaptureError {
    fn from(err: pcap::Error) -> Self {
        CaptureError::Pcap(err.to_string())
    }
}

impl<T, P> From<neli::err::RouterError<T, P>> for CaptureError
where
    T: std::fmt::Debug,
    P: std::fmt::Debug,
{
    fn from(err: neli::err::RouterError<T, P>) -> Self {
        CaptureError::Netlink(err.to_string())
    }
}

/// Result alias used throughout this crate.
pub type Result<T> = std::result::Result<T, CaptureError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advisory_only_for_networkmanager() {
        assert!(CaptureError::NetworkManager("x".into()).is_advisory());
        assert!(!CaptureError::Transient("x".into()).is_advisory());
        assert!(!CaptureError::CaptureTerminated("x".into()).is_advisory());
    }

    #[test]
    fn display_includes_message() {
        let err = CaptureError::config("missing interface=");
        assert!(err.to_string().contains("missing interface="));
    }
}
