//! Parser for neighbor-discovery (LLDP) tables.
//!
//! Expected shape:
//!
//! ```text
//! Capability codes: (R) Router, (B) Bridge, (T) Telephone
//! Device ID            Local Intf   Hold-time  Capability  Port ID
//! sw-leaf2             Eth1/1       120        B,R         Eth2/1
//! sw-spine-rack12-a    Eth1/7       120        B,R         Eth4/12
//! Total entries displayed: 2
//! ```
//!
//! Device IDs in this table are whatever the peer advertised and are
//! commonly truncated to the column width; correlation against managed
//! device names happens in the topology builder, not here.

use once_cell::sync::Lazy;
use regex::Regex;

use lacplab_types::{LabResult, PortName};

use crate::records::{NeighborRecord, ParsedRecord};
use crate::{is_noise_line, parse_error, CommandFamily};

static ROW_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(?P<device>\S+)\s+(?P<local>\S+)\s+(?P<hold>\d+)\s+(?P<cap>\S+)\s+(?P<remote>\S+)\s*$",
    )
    .expect("invalid neighbor pattern")
});

/// Header, legend, and footer rows.
fn is_table_noise(line: &str) -> bool {
    let t = line.trim_start();
    t.starts_with("Device ID")
        || t.starts_with("Capability codes:")
        || t.starts_with("Total entries")
}

pub(crate) fn parse(raw_text: &str) -> LabResult<Vec<ParsedRecord>> {
    let mut records = Vec::new();

    for line in raw_text.lines() {
        if is_noise_line(line) || is_table_noise(line) {
            continue;
        }
        let caps = ROW_RE
            .captures(line)
            .ok_or_else(|| parse_error(CommandFamily::NeighborTable, line))?;

        records.push(ParsedRecord::Neighbor(NeighborRecord {
            local_port: PortName::new(&caps["local"]),
            remote_device: caps["device"].to_string(),
            remote_port: PortName::new(&caps["remote"]),
        }));
    }

    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const SAMPLE: &str = "\
Capability codes: (R) Router, (B) Bridge, (T) Telephone
Device ID            Local Intf   Hold-time  Capability  Port ID
sw-leaf2             Eth1/1       120        B,R         Eth2/1
sw-spine-rack12-a    Eth1/7       120        B,R         Eth4/12
Total entries displayed: 2
";

    #[test]
    fn test_parses_neighbor_rows() {
        let records = parse(SAMPLE).unwrap();
        assert_eq!(records.len(), 2);
        match &records[0] {
            ParsedRecord::Neighbor(n) => {
                assert_eq!(n.local_port, PortName::new("Eth1/1"));
                assert_eq!(n.remote_device, "sw-leaf2");
                assert_eq!(n.remote_port, PortName::new("Eth2/1"));
            }
            other => panic!("expected neighbor record, got {other:?}"),
        }
    }

    #[test]
    fn test_empty_table() {
        let records = parse(
            "Device ID  Local Intf  Hold-time  Capability  Port ID\nTotal entries displayed: 0\n",
        )
        .unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn test_malformed_row_is_error() {
        let err = parse("sw-leaf2 Eth1/1 soon B,R Eth2/1\n").unwrap_err();
        assert!(err.is_parse());
    }
}
