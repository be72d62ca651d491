//! CLI output parsers for lacp-lab.
//!
//! Device CLIs return semi-structured text: column tables with variable
//! widths, truncated names, and platform-specific unit notation. This
//! crate converts raw response text for a known command family into
//! structured records the topology builder can ingest.
//!
//! The set of command families is closed: each variant of
//! [`CommandFamily`] has exactly one parser, a pure function from text
//! to records. New device dialects are supported by adding a variant
//! and its parser, never by branching inside an existing one.
//!
//! Unrecognized lines produce [`LabError::Parse`] carrying the
//! offending raw line; whether that is fatal is the caller's decision
//! (an optional informational command degrades to a warning).

use serde::{Deserialize, Serialize};
use std::fmt;

use lacplab_types::{LabError, LabResult};

mod interface;
mod lacp;
mod neighbor;
mod records;

pub use records::{
    BundleRecord, InterfaceRecord, MemberFlag, MemberRecord, MemberStatus, NeighborRecord,
    ParsedRecord,
};

/// The closed set of command families the parser understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CommandFamily {
    /// Per-interface admin/oper status and speed table.
    InterfaceStatus,
    /// Port-channel summary: aggregate state and member flags.
    LacpBundleStatus,
    /// Per-member LACP detail: partner system ID, port speed.
    LacpMemberStatus,
    /// Neighbor-discovery (LLDP) table.
    NeighborTable,
}

impl CommandFamily {
    /// Returns the family name used in errors and audit records.
    pub fn as_str(&self) -> &'static str {
        match self {
            CommandFamily::InterfaceStatus => "interface-status",
            CommandFamily::LacpBundleStatus => "lacp-bundle-status",
            CommandFamily::LacpMemberStatus => "lacp-member-status",
            CommandFamily::NeighborTable => "neighbor-table",
        }
    }

    /// Returns the CLI command issued to produce this family's output.
    pub fn command(&self) -> &'static str {
        match self {
            CommandFamily::InterfaceStatus => "show interfaces status",
            CommandFamily::LacpBundleStatus => "show port-channel summary",
            CommandFamily::LacpMemberStatus => "show lacp interfaces",
            CommandFamily::NeighborTable => "show lldp neighbors",
        }
    }

    /// Returns all command families in discovery order.
    ///
    /// Interface status first so ports exist before bundle membership
    /// references them.
    pub fn all() -> [CommandFamily; 4] {
        [
            CommandFamily::InterfaceStatus,
            CommandFamily::LacpBundleStatus,
            CommandFamily::LacpMemberStatus,
            CommandFamily::NeighborTable,
        ]
    }
}

impl fmt::Display for CommandFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parses raw CLI response text for the given command family.
///
/// Header rows, separator rows, and blank lines are skipped; every
/// remaining line must match the family's record pattern or the whole
/// parse fails with [`LabError::Parse`] carrying that line.
pub fn parse(family: CommandFamily, raw_text: &str) -> LabResult<Vec<ParsedRecord>> {
    match family {
        CommandFamily::InterfaceStatus => interface::parse(raw_text),
        CommandFamily::LacpBundleStatus => lacp::parse_bundle_summary(raw_text),
        CommandFamily::LacpMemberStatus => lacp::parse_member_detail(raw_text),
        CommandFamily::NeighborTable => neighbor::parse(raw_text),
    }
}

/// Returns true for lines that carry no record: blank lines, column
/// headers, separator rules, and trailing prompt echoes.
pub(crate) fn is_noise_line(line: &str) -> bool {
    let trimmed = line.trim();
    trimmed.is_empty()
        || trimmed.chars().all(|c| matches!(c, '-' | '=' | '+' | ' '))
        || trimmed.ends_with('#')
        || trimmed.ends_with('>')
}

/// Builds the parse error for a line no pattern matched.
pub(crate) fn parse_error(family: CommandFamily, line: &str) -> LabError {
    LabError::parse(family.as_str(), line.trim())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_family_names() {
        assert_eq!(CommandFamily::LacpBundleStatus.as_str(), "lacp-bundle-status");
        assert_eq!(
            CommandFamily::NeighborTable.command(),
            "show lldp neighbors"
        );
    }

    #[test]
    fn test_noise_lines() {
        assert!(is_noise_line(""));
        assert!(is_noise_line("   "));
        assert!(is_noise_line("------ ------- -----"));
        assert!(is_noise_line("sw-leaf1#"));
        assert!(!is_noise_line("Po1(SU)      LACP      Eth1/1(P)"));
    }

    #[test]
    fn test_unknown_shape_is_parse_error_not_panic() {
        let err = parse(CommandFamily::LacpBundleStatus, "kernel panic, lol").unwrap_err();
        assert!(err.is_parse());
        assert!(err.to_string().contains("kernel panic"));
    }
}
