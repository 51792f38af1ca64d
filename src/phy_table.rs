//! Static 802.11 channelization table.
//!
//! Keeps hardware knowledge (which channels exist, at which frequency, and
//! which wide-channel widths are legal there) separate from the string
//! grammar in [`crate::channel`]. The table is plain data; nothing here
//! allocates or depends on runtime state.

use bitflags::bitflags;

bitflags! {
    /// Widths a given channel entry supports beyond plain 20 MHz.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct PhyWidthFlags: u32 {
        const HT40_PLUS  = 0b0000_0001;
        const HT40_MINUS = 0b0000_0010;
        const VHT80      = 0b0000_0100;
        const VHT160     = 0b0000_1000;
        const W5         = 0b0001_0000;
        const W10        = 0b0010_0000;
    }
}

/// One row of the channelization table.
#[derive(Clone, Copy, Debug)]
pub struct PhyEntry {
    /// Channel number as used in 802.11 (e.g. 1..14, 36, 149, ...).
    pub chan: u32,
    /// Center frequency of the primary 20 MHz channel, in MHz.
    pub freq: u32,
    /// Widths legal at this channel.
    pub flags: PhyWidthFlags,
    /// VHT80 segment center frequency, if `flags` includes `VHT80`.
    pub freq80: u32,
    /// VHT160 segment center frequency, if `flags` includes `VHT160`.
    pub freq160: u32,
}

/// The full table, 2.4 GHz channels 1-14 and a representative slice of the
/// 5 GHz UNII bands used for VHT80/VHT160 validation.
pub static PHY_TABLE: &[PhyEntry] = &[
    PhyEntry { chan: 1, freq: 2412, flags: PhyWidthFlags::HT40_PLUS, freq80: 0, freq160: 0 },
    PhyEntry { chan: 2, freq: 2417, flags: PhyWidthFlags::HT40_PLUS, freq80: 0, freq160: 0 },
    PhyEntry { chan: 3, freq: 2422, flags: PhyWidthFlags::HT40_PLUS, freq80: 0, freq160: 0 },
    PhyEntry { chan: 4, freq: 2427, flags: PhyWidthFlags::HT40_PLUS, freq80: 0, freq160: 0 },
    PhyEntry {
        chan: 5,
        freq: 2432,
        flags: PhyWidthFlags::from_bits_truncate(
            PhyWidthFlags::HT40_PLUS.bits() | PhyWidthFlags::HT40_MINUS.bits(),
        ),
        freq80: 0,
        freq160: 0,
    },
    PhyEntry {
        chan: 6,
        freq: 2437,
        flags: PhyWidthFlags::from_bits_truncate(
            PhyWidthFlags::HT40_PLUS.bits() | PhyWidthFlags::HT40_MINUS.bits(),
        ),
        freq80: 0,
        freq160: 0,
    },
    PhyEntry {
        chan: 7,
        freq: 2442,
        flags: PhyWidthFlags::from_bits_truncate(
            PhyWidthFlags::HT40_PLUS.bits() | PhyWidthFlags::HT40_MINUS.bits(),
        ),
        freq80: 0,
        freq160: 0,
    },
    PhyEntry { chan: 8, freq: 2447, flags: PhyWidthFlags::HT40_MINUS, freq80: 0, freq160: 0 },
    PhyEntry { chan: 9, freq: 2452, flags: PhyWidthFlags::HT40_MINUS, freq80: 0, freq160: 0 },
    PhyEntry { chan: 10, freq: 2457, flags: PhyWidthFlags::HT40_MINUS, freq80: 0, freq160: 0 },
    PhyEntry { chan: 11, freq: 2462, flags: PhyWidthFlags::HT40_MINUS, freq80: 0, freq160: 0 },
    PhyEntry { chan: 12, freq: 2467, flags: PhyWidthFlags::W5, freq80: 0, freq160: 0 },
    PhyEntry { chan: 13, freq: 2472, flags: PhyWidthFlags::W5, freq80: 0, freq160: 0 },
    PhyEntry { chan: 14, freq: 2484, flags: PhyWidthFlags::W10, freq80: 0, freq160: 0 },
    PhyEntry { chan: 36, freq: 5180, flags: PhyWidthFlags::VHT80, freq80: 5210, freq160: 0 },
    PhyEntry { chan: 40, freq: 5200, flags: PhyWidthFlags::VHT80, freq80: 5210, freq160: 0 },
    PhyEntry { chan: 44, freq: 5220, flags: PhyWidthFlags::VHT80, freq80: 5210, freq160: 0 },
    PhyEntry { chan: 48, freq: 5240, flags: PhyWidthFlags::VHT80, freq80: 5210, freq160: 0 },
    PhyEntry {
        chan: 52,
        freq: 5260,
        flags: PhyWidthFlags::from_bits_truncate(
            PhyWidthFlags::VHT80.bits() | PhyWidthFlags::VHT160.bits(),
        ),
        freq80: 5290,
        freq160: 5250,
    },
    PhyEntry {
        chan: 56,
        freq: 5280,
        flags: PhyWidthFlags::from_bits_truncate(
            PhyWidthFlags::VHT80.bits() | PhyWidthFlags::VHT160.bits(),
        ),
        freq80: 5290,
        freq160: 5250,
    },
    PhyEntry {
        chan: 60,
        freq: 5300,
        flags: PhyWidthFlags::from_bits_truncate(
            PhyWidthFlags::VHT80.bits() | PhyWidthFlags::VHT160.bits(),
        ),
        freq80: 5290,
        freq160: 5250,
    },
    PhyEntry {
        chan: 64,
        freq: 5320,
        flags: PhyWidthFlags::from_bits_truncate(
            PhyWidthFlags::VHT80.bits() | PhyWidthFlags::VHT160.bits(),
        ),
        freq80: 5290,
        freq160: 5250,
    },
    PhyEntry { chan: 100, freq: 5500, flags: PhyWidthFlags::VHT80, freq80: 5530, freq160: 0 },
    PhyEntry { chan: 104, freq: 5520, flags: PhyWidthFlags::VHT80, freq80: 5530, freq160: 0 },
    PhyEntry { chan: 108, freq: 5540, flags: PhyWidthFlags::VHT80, freq80: 5530, freq160: 0 },
    PhyEntry { chan: 112, freq: 5560, flags: PhyWidthFlags::VHT80, freq80: 5530, freq160: 0 },
    PhyEntry { chan: 149, freq: 5745, flags: PhyWidthFlags::VHT80, freq80: 5775, freq160: 0 },
    PhyEntry { chan: 153, freq: 5765, flags: PhyWidthFlags::VHT80, freq80: 5775, freq160: 0 },
    PhyEntry { chan: 157, freq: 5785, flags: PhyWidthFlags::VHT80, freq80: 5775, freq160: 0 },
    PhyEntry { chan: 161, freq: 5805, flags: PhyWidthFlags::VHT80, freq80: 5775, freq160: 0 },
    PhyEntry { chan: 165, freq: 5825, flags: PhyWidthFlags::from_bits_truncate(0), freq80: 0, freq160: 0 },
];

/// Look up a table entry by channel number.
///
/// Bounds and iteration always go through `PHY_TABLE.len()` (never a
/// separate sentinel constant), so there is exactly one notion of "how many
/// channels we know about" in the whole crate.
pub fn lookup_by_chan(chan: u32) -> Option<&'static PhyEntry> {
    PHY_TABLE[..PHY_TABLE.len()].iter().find(|e| e.chan == chan)
}

/// Look up a table entry by primary frequency.
pub fn lookup_by_freq(freq: u32) -> Option<&'static PhyEntry> {
    PHY_TABLE[..PHY_TABLE.len()].iter().find(|e| e.freq == freq)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chan36_has_vht80_not_vht160() {
        let e = lookup_by_chan(36).expect("channel 36 present");
        assert!(e.flags.contains(PhyWidthFlags::VHT80));
        assert!(!e.flags.contains(PhyWidthFlags::VHT160));
        assert_eq!(e.freq80, 5210);
    }

    #[test]
    fn chan52_has_both_wide_widths() {
        let e = lookup_by_chan(52).expect("channel 52 present");
        assert!(e.flags.contains(PhyWidthFlags::VHT80));
        assert!(e.flags.contains(PhyWidthFlags::VHT160));
    }

    #[test]
    fn unknown_channel_is_none() {
        assert!(lookup_by_chan(9999).is_none());
    }

    #[test]
    fn lookup_by_freq_matches_chan1() {
        let e = lookup_by_freq(2412).expect("2412 MHz present");
        assert_eq!(e.chan, 1);
    }
}
