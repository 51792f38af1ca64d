//! Thin nl80211 (generic netlink) wrapper: family resolution, interface
//! index lookup, monitor-vif creation/deletion, and channel/frequency
//! control.
//!
//! Grounded on the synchronous analogue of
//! `other_examples/c6321a7d_acheronfail-i3stat__.../nl80211/mod.rs`: the
//! `NlRouter::connect` + `resolve_genl_family` + `NlattrBuilder`/
//! `GenlmsghdrBuilder` + `get_attr_handle` pattern, here driven through
//! `neli::router::synchronous::NlRouter` instead of the async router that
//! file uses, since this crate's control thread is synchronous throughout.

use neli::consts::nl::NlmF;
use neli::consts::socket::NlFamily;
use neli::err::RouterError;
use neli::genl::{AttrTypeBuilder, Genlmsghdr, GenlmsghdrBuilder, NlattrBuilder, NoUserHeader};
use neli::nl::NlPayload;
use neli::router::synchronous::NlRouter;
use neli::types::GenlBuffer;
use neli::utils::Groups;

use crate::error::{CaptureError, Result};

mod consts {
    //! nl80211 command/attribute/type values not exposed by the retrieved
    //! `neli` release's `consts::nl80211` module for this crate's
    //! purposes (the monitor-flag enum in particular is absent there), so
    //! they are hand-defined the same way `other_examples/40b819f5_...`
    //! defines kernel constants missing from its dependencies.
    pub const NL80211_CMD_GET_WIPHY: u8 = 1;
    pub const NL80211_CMD_NEW_INTERFACE: u8 = 6;
    pub const NL80211_CMD_DEL_INTERFACE: u8 = 7;
    pub const NL80211_CMD_GET_INTERFACE: u8 = 5;
    pub const NL80211_CMD_SET_CHANNEL: u8 = 65;

    pub const NL80211_ATTR_WIPHY: u16 = 1;
    pub const NL80211_ATTR_IFINDEX: u16 = 3;
    pub const NL80211_ATTR_IFNAME: u16 = 4;
    pub const NL80211_ATTR_IFTYPE: u16 = 5;
    pub const NL80211_ATTR_MNTR_FLAGS: u16 = 243;
    pub const NL80211_ATTR_WIPHY_FREQ: u16 = 38;
    pub const NL80211_ATTR_WIPHY_CHANNEL_TYPE: u16 = 39;
    pub const NL80211_ATTR_CHANNEL_WIDTH: u16 = 159;
    pub const NL80211_ATTR_CENTER_FREQ1: u16 = 160;
    pub const NL80211_ATTR_CENTER_FREQ2: u16 = 161;

    pub const NL80211_IFTYPE_MONITOR: u32 = 6;

    pub const NL80211_MNTR_FLAG_FCSFAIL: u32 = 1;
    pub const NL80211_MNTR_FLAG_PLCPFAIL: u32 = 2;
    pub const NL80211_MNTR_FLAG_CONTROL: u32 = 3;
    pub const NL80211_MNTR_FLAG_OTHER_BSS: u32 = 4;

    pub const NL80211_CHAN_NO_HT: u32 = 0;
    pub const NL80211_CHAN_HT20: u32 = 1;
    pub const NL80211_CHAN_HT40MINUS: u32 = 2;
    pub const NL80211_CHAN_HT40PLUS: u32 = 3;

    pub const NL80211_CHAN_WIDTH_20_NOHT: u32 = 0;
    pub const NL80211_CHAN_WIDTH_20: u32 = 1;
    pub const NL80211_CHAN_WIDTH_40: u32 = 2;
    pub const NL80211_CHAN_WIDTH_80: u32 = 3;
    pub const NL80211_CHAN_WIDTH_160: u32 = 5;
    pub const NL80211_CHAN_WIDTH_5: u32 = 6;
    pub const NL80211_CHAN_WIDTH_10: u32 = 7;
}

use consts::*;

/// Monitor-mode flags requested for a new vif.
#[derive(Clone, Copy, Debug, Default)]
pub struct MonitorFlags {
    pub fcsfail: bool,
    pub plcpfail: bool,
}

impl MonitorFlags {
    fn bits(self) -> u32 {
        let mut b = NL80211_MNTR_FLAG_CONTROL | NL80211_MNTR_FLAG_OTHER_BSS;
        if self.fcsfail {
            b |= NL80211_MNTR_FLAG_FCSFAIL;
        }
        if self.plcpfail {
            b |= NL80211_MNTR_FLAG_PLCPFAIL;
        }
        b
    }
}

/// The width/type fields needed for a `SetChannel`/`SetWiphy` request.
#[derive(Clone, Copy, Debug)]
pub struct ChannelRequest {
    pub freq: u32,
    pub ht_type: HtType,
    pub width: Option<ChanWidthKind>,
    pub center_freq1: u32,
    pub center_freq2: u32,
}

#[derive(Clone, Copy, Debug)]
pub enum HtType {
    NoHt,
    Ht20,
    Ht40Minus,
    Ht40Plus,
}

#[derive(Clone, Copy, Debug)]
pub enum ChanWidthKind {
    Vht80,
    Vht160,
    W5,
    W10,
}

/// An open, family-resolved nl80211 connection. Dropping this releases the
/// router's processing thread and socket together (single resource, single
/// teardown point, per the design note in `DESIGN.md`).
pub struct Nl80211Handle {
    router: NlRouter,
    family_id: u16,
}

impl Nl80211Handle {
    /// Connect to generic netlink and resolve the nl80211 family id.
    /// Returns `Err(DriverCapability)` if nl80211 is unavailable
    /// (`family` not registered), which is the caller's signal to fall
    /// back to the legacy wireless-extensions plane.
    pub fn connect() -> Result<Self> {
        let (router, _recv) = NlRouter::connect(NlFamily::Generic, None, Groups::empty())
            .map_err(route_err)?;
        let family_id = router
            .resolve_genl_family("nl80211")
            .map_err(route_err)?;
        Ok(Nl80211Handle { router, family_id })
    }

    /// Resolve an interface name to its kernel ifindex via `SIOCGIFINDEX`
    /// equivalent exposed by nl80211's `GetInterface`/dump, falling back to
    /// the caller providing the ifindex directly is not needed here: we use
    /// `libc::if_nametoindex` instead, since that's a simpler and
    /// universally available primitive regardless of control plane.
    pub fn ifindex(name: &str) -> Result<i32> {
        crate::iface::if_nametoindex(name)
    }

    /// Create a new monitor-mode vif named `vif_name` on the phy that owns
    /// `parent_ifindex`. Returns the new interface's ifindex on success.
    pub fn new_monitor_vif(
        &self,
        parent_ifindex: i32,
        vif_name: &str,
        flags: MonitorFlags,
    ) -> Result<i32> {
        let mut attrs = GenlBuffer::new();
        push_u32(&mut attrs, NL80211_ATTR_IFINDEX, parent_ifindex as u32)?;
        push_str(&mut attrs, NL80211_ATTR_IFNAME, vif_name)?;
        push_u32(&mut attrs, NL80211_ATTR_IFTYPE, NL80211_IFTYPE_MONITOR)?;
        push_u32(&mut attrs, NL80211_ATTR_MNTR_FLAGS, flags.bits())?;

        let genlmsg: Genlmsghdr<u8, u16, NoUserHeader> = GenlmsghdrBuilder::default()
            .cmd(NL80211_CMD_NEW_INTERFACE)
            .version(0)
            .attrs(attrs)
            .build()
            .map_err(|e| CaptureError::Netlink(e.to_string()))?;

        let mut recv = self
            .router
            .send::<_, _, u16, Genlmsghdr<u8, u16>>(
                self.family_id,
                NlmF::ACK | NlmF::REQUEST,
                NlPayload::Payload(genlmsg),
            )
            .map_err(route_err)?;

        while let Some(result) = recv.next() {
            let msg = result.map_err(route_err)?;
            if let NlPayload::Payload(gen_msg) = msg.nl_payload() {
                let handle = gen_msg.attrs().get_attr_handle();
                if let Ok(ifindex) = handle.get_attr_payload_as::<u32>(NL80211_ATTR_IFINDEX) {
                    return Ok(ifindex as i32);
                }
            }
        }
        Err(CaptureError::DriverCapability(format!(
            "nl80211 NEW_INTERFACE for {vif_name} returned no ifindex"
        )))
    }

    /// Delete a vif by ifindex (used when tearing down a vif we created).
    pub fn del_interface(&self, ifindex: i32) -> Result<()> {
        let mut attrs = GenlBuffer::new();
        push_u32(&mut attrs, NL80211_ATTR_IFINDEX, ifindex as u32)?;
        let genlmsg: Genlmsghdr<u8, u16, NoUserHeader> = GenlmsghdrBuilder::default()
            .cmd(NL80211_CMD_DEL_INTERFACE)
            .version(0)
            .attrs(attrs)
            .build()
            .map_err(|e| CaptureError::Netlink(e.to_string()))?;
        let mut recv = self
            .router
            .send::<_, _, u16, Genlmsghdr<u8, u16>>(
                self.family_id,
                NlmF::ACK | NlmF::REQUEST,
                NlPayload::Payload(genlmsg),
            )
            .map_err(route_err)?;
        while let Some(result) = recv.next() {
            result.map_err(route_err)?;
        }
        Ok(())
    }

    /// Apply a channel to `ifindex` via `SetChannel` (for `NO_HT`/HT40) or
    /// `SetWiphy` with explicit width/center attributes (for VHT80/160).
    pub fn set_channel(&self, ifindex: i32, req: ChannelRequest) -> Result<()> {
        let mut attrs = GenlBuffer::new();
        push_u32(&mut attrs, NL80211_ATTR_IFINDEX, ifindex as u32)?;
        push_u32(&mut attrs, NL80211_ATTR_WIPHY_FREQ, req.freq)?;

        match req.width {
            Some(width) => {
                let width_val = match width {
                    ChanWidthKind::Vht80 => NL80211_CHAN_WIDTH_80,
                    ChanWidthKind::Vht160 => NL80211_CHAN_WIDTH_160,
                    ChanWidthKind::W5 => NL80211_CHAN_WIDTH_5,
                    ChanWidthKind::W10 => NL80211_CHAN_WIDTH_10,
                };
                push_u32(&mut attrs, NL80211_ATTR_CHANNEL_WIDTH, width_val)?;
                if req.center_freq1 != 0 {
                    push_u32(&mut attrs, NL80211_ATTR_CENTER_FREQ1, req.center_freq1)?;
                }
                if req.center_freq2 != 0 {
                    push_u32(&mut attrs, NL80211_ATTR_CENTER_FREQ2, req.center_freq2)?;
                }
            }
            None => {
                let chan_type = match req.ht_type {
                    HtType::NoHt => NL80211_CHAN_NO_HT,
                    HtType::Ht20 => NL80211_CHAN_HT20,
                    HtType::Ht40Minus => NL80211_CHAN_HT40MINUS,
                    HtType::Ht40Plus => NL80211_CHAN_HT40PLUS,
                };
                push_u32(&mut attrs, NL80211_ATTR_WIPHY_CHANNEL_TYPE, chan_type)?;
            }
        }

        let genlmsg: Genlmsghdr<u8, u16, NoUserHeader> = GenlmsghdrBuilder::default()
            .cmd(NL80211_CMD_SET_CHANNEL)
            .version(0)
            .attrs(attrs)
            .build()
            .map_err(|e| CaptureError::Netlink(e.to_string()))?;

        let mut recv = self
            .router
            .send::<_, _, u16, Genlmsghdr<u8, u16>>(
                self.family_id,
                NlmF::ACK | NlmF::REQUEST,
                NlPayload::Payload(genlmsg),
            )
            .map_err(route_err)?;

        while let Some(result) = recv.next() {
            result.map_err(route_err)?;
        }
        Ok(())
    }

    /// List the channel frequencies the wiphy owning `ifindex` supports.
    pub fn get_chanlist(&self, ifindex: i32) -> Result<Vec<u32>> {
        let mut attrs = GenlBuffer::new();
        push_u32(&mut attrs, NL80211_ATTR_IFINDEX, ifindex as u32)?;
        let genlmsg: Genlmsghdr<u8, u16, NoUserHeader> = GenlmsghdrBuilder::default()
            .cmd(NL80211_CMD_GET_WIPHY)
            .version(0)
            .attrs(attrs)
            .build()
            .map_err(|e| CaptureError::Netlink(e.to_string()))?;

        let mut recv = self
            .router
            .send::<_, _, u16, Genlmsghdr<u8, u16>>(
                self.family_id,
                NlmF::ACK | NlmF::REQUEST | NlmF::DUMP,
                NlPayload::Payload(genlmsg),
            )
            .map_err(route_err)?;

        let mut freqs = Vec::new();
        while let Some(result) = recv.next() {
            let msg = result.map_err(route_err)?;
            if let NlPayload::Payload(gen_msg) = msg.nl_payload() {
                let handle = gen_msg.attrs().get_attr_handle();
                if let Ok(freq) = handle.get_attr_payload_as::<u32>(NL80211_ATTR_WIPHY_FREQ) {
                    freqs.push(freq);
                }
            }
        }
        Ok(freqs)
    }
}

fn push_u32(attrs: &mut GenlBuffer<u16, neli::types::Buffer>, nla_type: u16, value: u32) -> Result<()> {
    attrs.push(
        NlattrBuilder::default()
            .nla_type(
                AttrTypeBuilder::default()
                    .nla_type(nla_type)
                    .build()
                    .map_err(|e| CaptureError::Netlink(e.to_string()))?,
            )
            .nla_payload(value)
            .build()
            .map_err(|e| CaptureError::Netlink(e.to_string()))?,
    );
    Ok(())
}

fn push_str(attrs: &mut GenlBuffer<u16, neli::types::Buffer>, nla_type: u16, value: &str) -> Result<()> {
    attrs.push(
        NlattrBuilder::default()
            .nla_type(
                AttrTypeBuilder::default()
                    .nla_type(nla_type)
                    .build()
                    .map_err(|e| CaptureError::Netlink(e.to_string()))?,
            )
            .nla_payload(value.to_string())
            .build()
            .map_err(|e| CaptureError::Netlink(e.to_string()))?,
    );
    Ok(())
}

fn route_err<T: std::fmt::Debug, P: std::fmt::Debug>(e: RouterError<T, P>) -> CaptureError {
    CaptureError::Netlink(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn monitor_flags_always_include_control_and_other_bss() {
        let bits = MonitorFlags::default().bits();
        assert_eq!(bits & NL80211_MNTR_FLAG_CONTROL, NL80211_MNTR_FLAG_CONTROL);
        assert_eq!(bits & NL80211_MNTR_FLAG_OTHER_BSS, NL80211_MNTR_FLAG_OTHER_BSS);
    }

    #[test]
    fn monitor_flags_fcsfail_plcpfail_are_additive() {
        let flags = MonitorFlags { fcsfail: true, plcpfail: true };
        let bits = flags.bits();
        assert_eq!(bits & NL80211_MNTR_FLAG_FCSFAIL, NL80211_MNTR_FLAG_FCSFAIL);
        assert_eq!(bits & NL80211_MNTR_FLAG_PLCPFAIL, NL80211_MNTR_FLAG_PLCPFAIL);
    }
}
