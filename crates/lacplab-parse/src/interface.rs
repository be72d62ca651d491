//! Parser for interface-status tables.
//!
//! Expected shape (column widths vary by platform):
//!
//! ```text
//! Port       Name          Status       Vlan   Duplex  Speed   Type
//! Eth1/1     to-leaf2      connected    1      a-full  a-10G   10GBaseSR
//! Eth1/2                   notconnect   1      auto    auto    10GBaseSR
//! Po1        uplink        connected    trunk  a-full  a-20G   N/A
//! ```

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::trace;

use lacplab_types::{AdminState, Bandwidth, LabResult, OperState, PortName};

use crate::records::{InterfaceRecord, ParsedRecord};
use crate::{is_noise_line, parse_error, CommandFamily};

/// Status keywords devices print in the Status column.
const STATUSES: &str = "connected|notconnect|disabled|err-disabled|suspended|sfpAbsent|noOperMem";

static ROW_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"^(?P<port>\S+)\s+(?P<name>.*?)\s*\b(?P<status>{STATUSES})\s+(?P<vlan>\S+)\s+(?P<duplex>\S+)\s+(?P<speed>\S+)"
    ))
    .expect("invalid interface-status pattern")
});

/// Returns true for the column-header row.
fn is_header(line: &str) -> bool {
    let t = line.trim_start();
    t.starts_with("Port ") || t.starts_with("Port\t")
}

pub(crate) fn parse(raw_text: &str) -> LabResult<Vec<ParsedRecord>> {
    let mut records = Vec::new();

    for line in raw_text.lines() {
        if is_noise_line(line) || is_header(line) {
            continue;
        }
        let caps = ROW_RE
            .captures(line)
            .ok_or_else(|| parse_error(CommandFamily::InterfaceStatus, line))?;

        let status = &caps["status"];
        let admin = if status == "disabled" {
            AdminState::Down
        } else {
            AdminState::Up
        };
        let oper = match status {
            "connected" => OperState::Up,
            "suspended" => OperState::Suspended,
            _ => OperState::Down,
        };

        // Speed columns print "auto" or "--" when nothing negotiated;
        // that is absence of a figure, not a malformed row.
        let speed_token = &caps["speed"];
        let speed = Bandwidth::parse_cli(speed_token).ok();
        if speed.is_none() {
            trace!(token = speed_token, "no speed figure for row");
        }

        records.push(ParsedRecord::Interface(InterfaceRecord {
            port: PortName::new(&caps["port"]),
            admin,
            oper,
            speed,
        }));
    }

    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const SAMPLE: &str = "\
Port       Name          Status       Vlan   Duplex  Speed   Type
---------  ------------  -----------  -----  ------  ------  ---------
Eth1/1     to-leaf2      connected    1      a-full  a-10G   10GBaseSR
Eth1/2                   notconnect   1      auto    auto    10GBaseSR
Eth1/3     oob           disabled     1      auto    auto    1000BaseT
Po1        uplink        connected    trunk  a-full  a-20G   N/A
sw-leaf1#
";

    fn unwrap_iface(r: &ParsedRecord) -> &InterfaceRecord {
        match r {
            ParsedRecord::Interface(i) => i,
            other => panic!("expected interface record, got {other:?}"),
        }
    }

    #[test]
    fn test_parses_rows_and_skips_noise() {
        let records = parse(SAMPLE).unwrap();
        assert_eq!(records.len(), 4);

        let first = unwrap_iface(&records[0]);
        assert_eq!(first.port, PortName::new("Eth1/1"));
        assert_eq!(first.admin, AdminState::Up);
        assert_eq!(first.oper, OperState::Up);
        assert_eq!(first.speed, Some(Bandwidth::from_gbps(10)));
    }

    #[test]
    fn test_disabled_is_admin_down() {
        let records = parse(SAMPLE).unwrap();
        let oob = unwrap_iface(&records[2]);
        assert_eq!(oob.admin, AdminState::Down);
        assert_eq!(oob.oper, OperState::Down);
    }

    #[test]
    fn test_unnegotiated_speed_is_none() {
        let records = parse(SAMPLE).unwrap();
        let down = unwrap_iface(&records[1]);
        assert_eq!(down.speed, None);
    }

    #[test]
    fn test_empty_name_column_tolerated() {
        let records = parse("Eth9/9    notconnect  1  auto  auto  unknown\n").unwrap();
        let r = unwrap_iface(&records[0]);
        assert_eq!(r.port, PortName::new("Eth9/9"));
    }

    #[test]
    fn test_malformed_row_reports_offending_line() {
        let err = parse("Eth1/1 is looking great today\n").unwrap_err();
        assert!(err.to_string().contains("Eth1/1 is looking great"));
    }
}
