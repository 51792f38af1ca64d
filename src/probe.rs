//! C2 — Interface Probe: device enumeration and channel-list discovery.

use std::fs;
use std::path::Path;

use log::debug;

use crate::error::{CaptureError, Result};
use crate::netlink::Nl80211Handle;
use crate::wext;

/// One wireless-capable device found under `/sys/class/net`.
#[derive(Clone, Debug)]
pub struct DeviceListEntry {
    pub name: String,
    pub flags: u32,
}

/// Outcome of [`probe`].
pub struct ProbeResult {
    pub channel_list: Vec<String>,
}

/// Parse `interface=` out of a colon-separated source definition string.
pub fn extract_definition_value(definition: &str, key: &str) -> Option<String> {
    let prefix = format!("{key}=");
    definition
        .split(':')
        .find_map(|part| part.strip_prefix(prefix.as_str()))
        .map(|v| v.to_string())
}

/// Enumerate `/sys/class/net` entries that expose wireless capability
/// (a `wireless/` or `phy80211` subdirectory), per §4.2.
pub fn list_wireless_devices() -> Result<Vec<DeviceListEntry>> {
    let mut out = Vec::new();
    let net_dir = Path::new("/sys/class/net");
    let entries = match fs::read_dir(net_dir) {
        Ok(e) => e,
        Err(e) => return Err(CaptureError::Io(e)),
    };
    for entry in entries {
        let entry = entry.map_err(CaptureError::Io)?;
        let name = entry.file_name().to_string_lossy().to_string();
        let path = entry.path();
        let is_wireless = path.join("wireless").is_dir() || path.join("phy80211").is_dir();
        if !is_wireless {
            continue;
        }
        let flags = crate::iface::get_flags(&name).map(|f| f as u32).unwrap_or(0);
        out.push(DeviceListEntry { name, flags });
    }
    Ok(out)
}

/// C2 `probe`: resolve `interface=` from `definition`, then populate the
/// channel list preferring nl80211, falling back to the legacy ioctl
/// plane.
pub fn probe(definition: &str) -> Result<ProbeResult> {
    let interface = extract_definition_value(definition, "interface")
        .ok_or_else(|| CaptureError::config("missing interface= in source definition"))?;

    let channel_list = get_chanlist(&interface)?;
    if channel_list.is_empty() {
        return Err(CaptureError::DriverCapability(format!(
            "{interface} reports no usable channels"
        )));
    }
    debug!("probe: {interface} reports {} channels", channel_list.len());
    Ok(ProbeResult { channel_list })
}

/// Populate a channel-string list for `interface`, trying netlink first.
pub fn get_chanlist(interface: &str) -> Result<Vec<String>> {
    if let Ok(handle) = Nl80211Handle::connect() {
        if let Ok(ifindex) = Nl80211Handle::ifindex(interface) {
            if let Ok(freqs) = handle.get_chanlist(ifindex) {
                if !freqs.is_empty() {
                    return Ok(freqs
                        .into_iter()
                        .filter_map(|f| crate::phy_table::lookup_by_freq(f))
                        .map(|e| e.chan.to_string())
                        .collect());
                }
            }
        }
    }
    let chans = wext::get_chanlist(interface)?;
    Ok(chans.into_iter().map(|c| c.to_string()).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_interface_value() {
        let def = "source:interface=wlan0:vif=wlan0mon";
        assert_eq!(extract_definition_value(def, "interface"), Some("wlan0".to_string()));
        assert_eq!(extract_definition_value(def, "vif"), Some("wlan0mon".to_string()));
        assert_eq!(extract_definition_value(def, "missing"), None);
    }

    #[test]
    fn probe_rejects_missing_interface() {
        let result = probe("source:vif=foo");
        assert!(matches!(result, Err(CaptureError::Configuration(_))));
    }
}
