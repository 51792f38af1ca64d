//! NetworkManager coordination (feature `networkmanager`, on by default):
//! temporarily disown an interface so it stops reconfiguring it out from
//! under us, and re-own it on exit.
//!
//! `zbus` was chosen over raw libnm GObject FFI (the approach shown in
//! `other_examples/6a96150a_Brooooooklyn-network-change__src-linux.rs.rs`)
//! because it is a pure-Rust D-Bus client with no native GLib linkage,
//! consistent with this crate's otherwise dependency-light, no-FFI-beyond-
//! `libc` posture. Every NM error is advisory only, per
//! `SPEC_FULL.md` §7 class 6: failures here are logged and messaged, never
//! returned as a fatal error to the caller.

use log::warn;
use zbus::blocking::Connection;
use zbus::zvariant::ObjectPath;

use crate::error::{CaptureError, Result};

const NM_BUS: &str = "org.freedesktop.NetworkManager";
const NM_OBJ: &str = "/org/freedesktop/NetworkManager";
const NM_IFACE: &str = "org.freedesktop.NetworkManager";
const DEVICE_IFACE: &str = "org.freedesktop.NetworkManager.Device";

/// A short-lived connection used once to disown, and again to re-own.
/// Dropped immediately after use by the caller (`monitor.rs`/`lib.rs`) so
/// it does not accumulate signal subscriptions across the life of the
/// process, per the scoped-resource design note in `DESIGN.md`.
pub struct NmClient {
    conn: Connection,
}

impl NmClient {
    pub fn connect() -> Result<Self> {
        let conn = Connection::system()
            .map_err(|e| CaptureError::NetworkManager(format!("D-Bus system bus connect failed: {e}")))?;
        Ok(NmClient { conn })
    }

    fn find_device_path(&self, ifname: &str) -> Result<ObjectPath<'static>> {
        let reply = self
            .conn
            .call_method(Some(NM_BUS), NM_OBJ, Some(NM_IFACE), "GetDeviceByIpIface", &(ifname,))
            .map_err(|e| CaptureError::NetworkManager(format!("GetDeviceByIpIface({ifname}): {e}")))?;
        let path: ObjectPath = reply
            .body()
            .deserialize()
            .map_err(|e| CaptureError::NetworkManager(format!("decoding device path: {e}")))?;
        Ok(path.into_owned())
    }

    fn is_managed(&self, path: &ObjectPath) -> Result<bool> {
        let reply = self
            .conn
            .call_method(
                Some(NM_BUS),
                path.as_str(),
                Some("org.freedesktop.DBus.Properties"),
                "Get",
                &(DEVICE_IFACE, "Managed"),
            )
            .map_err(|e| CaptureError::NetworkManager(format!("Properties.Get(Managed): {e}")))?;
        let managed: zbus::zvariant::Value = reply
            .body()
            .deserialize()
            .map_err(|e| CaptureError::NetworkManager(format!("decoding Managed: {e}")))?;
        Ok(bool::try_from(managed).unwrap_or(false))
    }

    fn set_managed(&self, path: &ObjectPath, managed: bool) -> Result<()> {
        self.conn
            .call_method(
                Some(NM_BUS),
                path.as_str(),
                Some("org.freedesktop.DBus.Properties"),
                "Set",
                &(DEVICE_IFACE, "Managed", zbus::zvariant::Value::from(managed)),
            )
            .map_err(|e| CaptureError::NetworkManager(format!("Properties.Set(Managed, {managed}): {e}")))?;
        Ok(())
    }

    /// If `ifname` is currently NM-managed, disown it. Returns whether a
    /// disown was actually performed (and so should be undone on exit).
    pub fn disown_if_managed(&self, ifname: &str) -> Result<bool> {
        let path = self.find_device_path(ifname)?;
        if self.is_managed(&path)? {
            self.set_managed(&path, false)?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// Re-own a previously disowned interface.
    pub fn reown(&self, ifname: &str) -> Result<()> {
        let path = self.find_device_path(ifname)?;
        self.set_managed(&path, true)
    }
}

/// Best-effort disown: logs and returns `(false, None)` on any D-Bus
/// failure rather than treating NetworkManager's absence as fatal (it is
/// entirely optional infrastructure many systems don't run).
pub fn try_disown(ifname: &str) -> bool {
    match NmClient::connect().and_then(|c| c.disown_if_managed(ifname)) {
        Ok(disowned) => disowned,
        Err(e) => {
            warn!("NetworkManager coordination skipped for {ifname}: {e}");
            false
        }
    }
}

/// Best-effort re-own, mirroring [`try_disown`].
pub fn try_reown(ifname: &str) {
    if let Err(e) = NmClient::connect().and_then(|c| c.reown(ifname)) {
        warn!("failed to restore NetworkManager management of {ifname}: {e}");
    }
}
