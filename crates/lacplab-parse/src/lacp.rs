//! Parsers for LACP aggregate output: port-channel summary and
//! per-member detail.
//!
//! Summary shape:
//!
//! ```text
//! Flags:  D - Down        P - Up in port-channel (members)
//!         I - Individual  s - Suspended
//!         S - Switched    U - Up (port-channel)
//! Group  Port-channel  Protocol  Ports
//! ------ ------------- --------- -----------------------------
//! 1      Po1(SU)       LACP      Eth1/1(P) Eth1/2(P)
//! 2      Po2(SD)       LACP      Eth1/3(D)
//! ```
//!
//! Member detail shape:
//!
//! ```text
//! Bundle  Port     Flags  State      Sys-ID                    Speed
//! Po1     Eth1/1   SA     bundled    32768,00:1c:73:aa:bb:01   10 Gbps
//! Po2     Eth1/3   SA     suspended  32768,00:1c:73:aa:bb:01   -
//! ```

use once_cell::sync::Lazy;
use regex::Regex;

use lacplab_types::{Bandwidth, LabResult, PortName, SystemId};

use crate::records::{BundleRecord, MemberFlag, MemberRecord, MemberStatus, ParsedRecord};
use crate::{is_noise_line, parse_error, CommandFamily};

static SUMMARY_ROW_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(?P<group>\d+)\s+(?P<name>\S+?)\((?P<flags>[A-Za-z]+)\)\s+(?P<proto>\S+)\s*(?P<members>.*)$",
    )
    .expect("invalid summary pattern")
});

static SUMMARY_MEMBER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?P<port>\S+?)\((?P<flag>[A-Za-z])\)").expect("invalid member pattern"));

static DETAIL_ROW_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(?P<bundle>\S+)\s+(?P<port>\S+)\s+(?P<flags>\S+)\s+(?P<state>bundled|suspended|standby|down|individual)\s+(?P<sysid>\S+)\s+(?P<speed>.+?)\s*$",
    )
    .expect("invalid detail pattern")
});

/// Legend and header rows of the summary output.
fn is_summary_noise(line: &str) -> bool {
    let t = line.trim_start();
    t.starts_with("Flags:") || t.starts_with("Group") || (t.len() > 2 && t[1..].starts_with(" - "))
}

pub(crate) fn parse_bundle_summary(raw_text: &str) -> LabResult<Vec<ParsedRecord>> {
    let mut records = Vec::new();

    for line in raw_text.lines() {
        if is_noise_line(line) || is_summary_noise(line) {
            continue;
        }
        let caps = SUMMARY_ROW_RE
            .captures(line)
            .ok_or_else(|| parse_error(CommandFamily::LacpBundleStatus, line))?;

        let bundle = caps["name"]
            .parse()
            .map_err(|_| parse_error(CommandFamily::LacpBundleStatus, line))?;
        let aggregate_up = caps["flags"].contains('U');

        let mut members = Vec::new();
        for m in SUMMARY_MEMBER_RE.captures_iter(&caps["members"]) {
            let flag = m["flag"].chars().next().unwrap_or('D');
            let status = MemberStatus::from_flag(flag)
                .ok_or_else(|| parse_error(CommandFamily::LacpBundleStatus, line))?;
            members.push(MemberFlag {
                port: PortName::new(&m["port"]),
                status,
            });
        }

        records.push(ParsedRecord::Bundle(BundleRecord {
            bundle,
            aggregate_up,
            members,
        }));
    }

    Ok(records)
}

/// Header row of the member detail output.
fn is_detail_header(line: &str) -> bool {
    line.trim_start().starts_with("Bundle")
}

pub(crate) fn parse_member_detail(raw_text: &str) -> LabResult<Vec<ParsedRecord>> {
    let mut records = Vec::new();

    for line in raw_text.lines() {
        if is_noise_line(line) || is_detail_header(line) {
            continue;
        }
        let caps = DETAIL_ROW_RE
            .captures(line)
            .ok_or_else(|| parse_error(CommandFamily::LacpMemberStatus, line))?;

        let bundle = caps["bundle"]
            .parse()
            .map_err(|_| parse_error(CommandFamily::LacpMemberStatus, line))?;
        let speed_token = caps["speed"].trim();
        let speed = if speed_token == "-" {
            None
        } else {
            Bandwidth::parse_cli(speed_token).ok()
        };

        records.push(ParsedRecord::Member(MemberRecord {
            bundle,
            port: PortName::new(&caps["port"]),
            bundled: &caps["state"] == "bundled",
            system_id: SystemId::new(&caps["sysid"]),
            speed,
        }));
    }

    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lacplab_types::BundleId;
    use pretty_assertions::assert_eq;

    const SUMMARY: &str = "\
Flags:  D - Down        P - Up in port-channel (members)
        I - Individual  s - Suspended
        S - Switched    U - Up (port-channel)
Group  Port-channel  Protocol  Ports
------ ------------- --------- -----------------------------
1      Po1(SU)       LACP      Eth1/1(P) Eth1/2(P)
2      Po2(SD)       LACP      Eth1/3(D)
3      Po3(SU)       LACP      Eth1/4(P) Eth1/5(s)
";

    const DETAIL: &str = "\
Bundle  Port     Flags  State      Sys-ID                    Speed
------  -------  -----  ---------  ------------------------  -------
Po1     Eth1/1   SA     bundled    32768,00:1c:73:aa:bb:01   10 Gbps
Po1     Eth1/2   SA     bundled    32768,00:1c:73:aa:bb:01   10000 Mbps
Po2     Eth1/3   SA     suspended  32768,00:1c:73:aa:bb:01   -
";

    fn bundles(text: &str) -> Vec<BundleRecord> {
        parse_bundle_summary(text)
            .unwrap()
            .into_iter()
            .map(|r| match r {
                ParsedRecord::Bundle(b) => b,
                other => panic!("expected bundle record, got {other:?}"),
            })
            .collect()
    }

    #[test]
    fn test_summary_rows() {
        let b = bundles(SUMMARY);
        assert_eq!(b.len(), 3);
        assert_eq!(b[0].bundle, BundleId(1));
        assert!(b[0].aggregate_up);
        assert_eq!(b[0].members.len(), 2);
        assert_eq!(b[0].members[0].status, MemberStatus::Bundled);
    }

    #[test]
    fn test_summary_down_bundle() {
        let b = bundles(SUMMARY);
        assert!(!b[1].aggregate_up);
        assert_eq!(b[1].members[0].status, MemberStatus::Down);
    }

    #[test]
    fn test_summary_suspended_member() {
        let b = bundles(SUMMARY);
        assert_eq!(b[2].members[1].status, MemberStatus::Suspended);
        assert_eq!(b[2].members[1].port, PortName::new("Eth1/5"));
    }

    #[test]
    fn test_summary_empty_member_list() {
        let b = bundles("4      Po4(SD)       LACP\n");
        assert_eq!(b[0].bundle, BundleId(4));
        assert!(b[0].members.is_empty());
    }

    #[test]
    fn test_detail_rows_normalize_speed() {
        let records = parse_member_detail(DETAIL).unwrap();
        let (first, second) = match (&records[0], &records[1]) {
            (ParsedRecord::Member(a), ParsedRecord::Member(b)) => (a, b),
            other => panic!("expected member records, got {other:?}"),
        };
        // "10 Gbps" and "10000 Mbps" are the same figure.
        assert_eq!(first.speed, second.speed);
        assert_eq!(first.speed, Some(Bandwidth::from_gbps(10)));
        assert_eq!(first.system_id, SystemId::new("32768,00:1C:73:AA:BB:01"));
        assert!(first.bundled);
    }

    #[test]
    fn test_detail_suspended_member() {
        let records = parse_member_detail(DETAIL).unwrap();
        match &records[2] {
            ParsedRecord::Member(m) => {
                assert!(!m.bundled);
                assert_eq!(m.speed, None);
            }
            other => panic!("expected member record, got {other:?}"),
        }
    }

    #[test]
    fn test_garbage_line_fails_with_line() {
        let err = parse_member_detail("Po1 Eth1/1 exploded\n").unwrap_err();
        assert!(err.to_string().contains("exploded"));
    }
}
