//! Channel string grammar: parse and render the on-wire channel spec, and
//! validate composite (HT40/VHT) requests against the PHY table.
//!
//! ```text
//! channel := number suffix?
//! suffix  := "HT40+" | "HT40-"
//!          | "W5" | "W10"
//!          | "VHT80"  ("-" number)?
//!          | "VHT160" ("-" number)?
//! ```

use crate::phy_table::{self, PhyWidthFlags};

/// 40 MHz secondary-channel placement relative to the primary channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChanType {
    NoHt,
    Ht40Minus,
    Ht40Plus,
}

/// Channel width.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChanWidth {
    Default20,
    W5,
    W10,
    Vht80,
    Vht160,
}

/// A fully parsed channel specification.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ParsedChannel {
    pub control_freq: u32,
    pub chan_type: ChanType,
    pub chan_width: ChanWidth,
    pub center_freq1: u32,
    pub center_freq2: u32,
    /// True iff `center_freq1` came from an explicit `-<freq>` suffix
    /// rather than being derived from the PHY table.
    pub unusual_center1: bool,
}

/// Outcome of [`parse`]: either a channel, or a rejection with a
/// human-readable reason suitable for the framework's informational or
/// error message channel.
pub enum ParseOutcome {
    Channel(ParsedChannel),
    Rejected(String),
}

/// A non-fatal observation made while parsing (sent to the framework's
/// informational channel, never changes the parse result).
pub struct ParseWarning(pub String);

/// Parse a channel spec string against the default table.
pub fn parse(s: &str) -> (ParseOutcome, Vec<ParseWarning>) {
    parse_against(s, phy_table::PHY_TABLE)
}

/// Parse a channel spec string against an explicit table (used by tests to
/// exercise PHY-dependent branches deterministically).
pub fn parse_against(
    s: &str,
    table: &'static [phy_table::PhyEntry],
) -> (ParseOutcome, Vec<ParseWarning>) {
    let mut warnings = Vec::new();

    let (num_part, suffix) = split_number_prefix(s);
    let chan_num: u32 = match num_part.parse() {
        Ok(n) => n,
        Err(_) => return (ParseOutcome::Rejected(format!("not a channel: {s:?}")), warnings),
    };

    let entry = table.iter().find(|e| e.chan == chan_num || e.freq == chan_num);
    let control_freq = entry.map(|e| e.freq).unwrap_or(chan_num);

    if suffix.is_empty() {
        return (
            ParseOutcome::Channel(ParsedChannel {
                control_freq,
                chan_type: ChanType::NoHt,
                chan_width: ChanWidth::Default20,
                center_freq1: 0,
                center_freq2: 0,
                unusual_center1: false,
            }),
            warnings,
        );
    }

    if let Some(rest) = suffix.strip_prefix("HT40+") {
        if !rest.is_empty() {
            return (ParseOutcome::Rejected(format!("trailing garbage after HT40+: {rest:?}")), warnings);
        }
        if !entry.map(|e| e.flags.contains(PhyWidthFlags::HT40_PLUS)).unwrap_or(false) {
            warnings.push(ParseWarning(format!(
                "channel {chan_num} does not list HT40+ support in the PHY table; proceeding anyway"
            )));
        }
        return (
            ParseOutcome::Channel(ParsedChannel {
                control_freq,
                chan_type: ChanType::Ht40Plus,
                chan_width: ChanWidth::Default20,
                center_freq1: 0,
                center_freq2: 0,
                unusual_center1: false,
            }),
            warnings,
        );
    }

    if let Some(rest) = suffix.strip_prefix("HT40-") {
        if !rest.is_empty() {
            return (ParseOutcome::Rejected(format!("trailing garbage after HT40-: {rest:?}")), warnings);
        }
        if !entry.map(|e| e.flags.contains(PhyWidthFlags::HT40_MINUS)).unwrap_or(false) {
            warnings.push(ParseWarning(format!(
                "channel {chan_num} does not list HT40- support in the PHY table; proceeding anyway"
            )));
        }
        return (
            ParseOutcome::Channel(ParsedChannel {
                control_freq,
                chan_type: ChanType::Ht40Minus,
                chan_width: ChanWidth::Default20,
                center_freq1: 0,
                center_freq2: 0,
                unusual_center1: false,
            }),
            warnings,
        );
    }

    if suffix == "W5" {
        return (
            ParseOutcome::Channel(ParsedChannel {
                control_freq,
                chan_type: ChanType::NoHt,
                chan_width: ChanWidth::W5,
                center_freq1: 0,
                center_freq2: 0,
                unusual_center1: false,
            }),
            warnings,
        );
    }

    if suffix == "W10" {
        return (
            ParseOutcome::Channel(ParsedChannel {
                control_freq,
                chan_type: ChanType::NoHt,
                chan_width: ChanWidth::W10,
                center_freq1: 0,
                center_freq2: 0,
                unusual_center1: false,
            }),
            warnings,
        );
    }

    if let Some(rest) = suffix.strip_prefix("VHT80") {
        return parse_wide(chan_num, control_freq, entry, ChanWidth::Vht80, rest, warnings);
    }

    if let Some(rest) = suffix.strip_prefix("VHT160") {
        return parse_wide(chan_num, control_freq, entry, ChanWidth::Vht160, rest, warnings);
    }

    warnings.push(ParseWarning(format!("unrecognized channel suffix {suffix:?}; degrading to basic channel")));
    (
        ParseOutcome::Channel(ParsedChannel {
            control_freq,
            chan_type: ChanType::NoHt,
            chan_width: ChanWidth::Default20,
            center_freq1: 0,
            center_freq2: 0,
            unusual_center1: false,
        }),
        warnings,
    )
}

fn parse_wide(
    chan_num: u32,
    control_freq: u32,
    entry: Option<&phy_table::PhyEntry>,
    width: ChanWidth,
    rest: &str,
    warnings: Vec<ParseWarning>,
) -> (ParseOutcome, Vec<ParseWarning>) {
    let required_flag = match width {
        ChanWidth::Vht80 => PhyWidthFlags::VHT80,
        ChanWidth::Vht160 => PhyWidthFlags::VHT160,
        _ => unreachable!("parse_wide only called for VHT80/VHT160"),
    };

    let supported = entry.map(|e| e.flags.contains(required_flag)).unwrap_or(false);
    if !supported {
        return (
            ParseOutcome::Rejected(format!(
                "channel {chan_num} does not support {width:?} per the PHY table"
            )),
            warnings,
        );
    }
    let e = entry.expect("supported implies entry is Some");

    if let Some(explicit) = rest.strip_prefix('-') {
        let center: u32 = match explicit.parse() {
            Ok(n) => n,
            Err(_) => return (ParseOutcome::Rejected(format!("bad explicit center {explicit:?}")), warnings),
        };
        return (
            ParseOutcome::Channel(ParsedChannel {
                control_freq,
                chan_type: ChanType::NoHt,
                chan_width: width,
                center_freq1: center,
                center_freq2: 0,
                unusual_center1: true,
            }),
            warnings,
        );
    }

    if !rest.is_empty() {
        return (ParseOutcome::Rejected(format!("trailing garbage after width suffix: {rest:?}")), warnings);
    }

    let derived = match width {
        ChanWidth::Vht80 => e.freq80,
        ChanWidth::Vht160 => e.freq160,
        _ => 0,
    };
    (
        ParseOutcome::Channel(ParsedChannel {
            control_freq,
            chan_type: ChanType::NoHt,
            chan_width: width,
            center_freq1: derived,
            center_freq2: 0,
            unusual_center1: false,
        }),
        warnings,
    )
}

/// Render a parsed channel back to its on-wire string form.
///
/// `parse(render(c)) == c` for any `c` this parser can produce, modulo the
/// VHT80/VHT160-without-explicit-center canonicalization: a channel whose
/// `center_freq1` equals the table-derived value and whose
/// `unusual_center1` is false renders without a `-<freq>` suffix.
pub fn render(c: &ParsedChannel) -> String {
    let chan_num = phy_table::lookup_by_freq(c.control_freq)
        .map(|e| e.chan)
        .unwrap_or(c.control_freq);

    match (c.chan_type, c.chan_width) {
        (ChanType::Ht40Plus, ChanWidth::Default20) => format!("{chan_num}HT40+"),
        (ChanType::Ht40Minus, ChanWidth::Default20) => format!("{chan_num}HT40-"),
        (_, ChanWidth::W5) => format!("{chan_num}W5"),
        (_, ChanWidth::W10) => format!("{chan_num}W10"),
        (_, ChanWidth::Vht80) => render_wide(chan_num, "VHT80", c),
        (_, ChanWidth::Vht160) => render_wide(chan_num, "VHT160", c),
        (ChanType::NoHt, ChanWidth::Default20) => format!("{chan_num}"),
    }
}

fn render_wide(chan_num: u32, label: &str, c: &ParsedChannel) -> String {
    if c.unusual_center1 {
        format!("{chan_num}{label}-{}", c.center_freq1)
    } else {
        format!("{chan_num}{label}")
    }
}

/// Split a leading decimal-digit run from the rest of the string.
fn split_number_prefix(s: &str) -> (&str, &str) {
    let end = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
    s.split_at(end)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::phy_table::{PhyEntry, PhyWidthFlags};

    static TEST_TABLE: &[PhyEntry] = &[
        PhyEntry { chan: 1, freq: 2412, flags: PhyWidthFlags::from_bits_truncate(0), freq80: 0, freq160: 0 },
        PhyEntry { chan: 6, freq: 2437, flags: PhyWidthFlags::from_bits_truncate(0), freq80: 0, freq160: 0 },
        PhyEntry { chan: 36, freq: 5180, flags: PhyWidthFlags::VHT80, freq80: 5210, freq160: 0 },
    ];

    fn parsed_channel(outcome: ParseOutcome) -> ParsedChannel {
        match outcome {
            ParseOutcome::Channel(c) => c,
            ParseOutcome::Rejected(msg) => panic!("expected a channel, got rejection: {msg}"),
        }
    }

    #[test]
    fn vht80_with_support_derives_center() {
        let (outcome, warnings) = parse_against("36VHT80", TEST_TABLE);
        let c = parsed_channel(outcome);
        assert_eq!(c.chan_width, ChanWidth::Vht80);
        assert_eq!(c.center_freq1, 5210);
        assert!(!c.unusual_center1);
        assert!(warnings.is_empty());
    }

    #[test]
    fn vht160_without_support_is_rejected() {
        let (outcome, _warnings) = parse_against("36VHT160", TEST_TABLE);
        match outcome {
            ParseOutcome::Rejected(_) => {}
            ParseOutcome::Channel(_) => panic!("expected rejection for unsupported VHT160"),
        }
    }

    #[test]
    fn vht80_with_explicit_center_marks_unusual() {
        let (outcome, _) = parse_against("36VHT80-5250", TEST_TABLE);
        let c = parsed_channel(outcome);
        assert_eq!(c.center_freq1, 5250);
        assert!(c.unusual_center1);
        assert_eq!(render(&c), "36VHT80-5250");
    }

    #[test]
    fn ht40_plus_without_support_warns_not_fails() {
        let (outcome, warnings) = parse_against("1HT40+", TEST_TABLE);
        let c = parsed_channel(outcome);
        assert_eq!(c.chan_type, ChanType::Ht40Plus);
        assert_eq!(warnings.len(), 1);
        assert_eq!(render(&c), "1HT40+");
    }

    #[test]
    fn unknown_suffix_degrades_to_basic_with_warning() {
        let (outcome, warnings) = parse_against("6FOO", TEST_TABLE);
        let c = parsed_channel(outcome);
        assert_eq!(c.chan_type, ChanType::NoHt);
        assert_eq!(c.chan_width, ChanWidth::Default20);
        assert_eq!(warnings.len(), 1);
    }

    #[test]
    fn round_trip_basic_channel() {
        let (outcome, _) = parse_against("6", TEST_TABLE);
        let c = parsed_channel(outcome);
        assert_eq!(render(&c), "6");
    }

    #[test]
    fn round_trip_vht80_no_explicit_center() {
        let (outcome, _) = parse_against("36VHT80", TEST_TABLE);
        let c = parsed_channel(outcome);
        assert_eq!(render(&c), "36VHT80");
    }
}
