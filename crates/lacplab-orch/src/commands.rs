//! CLI configuration command builders.
//!
//! Each builder is a pure function from intent to the exact command
//! sequence sent to a device. Keeping them in one place makes the
//! device dialect a single point of change and lets tests assert on
//! the precise lines a scenario issues.

use lacplab_types::{Bandwidth, BundleId, PortName, SystemId};

/// Creates an LACP aggregate interface and brings it up.
pub fn create_bundle(bundle: BundleId) -> Vec<String> {
    vec![
        "configure terminal".to_string(),
        format!("interface {}", bundle.interface_name()),
        "no shutdown".to_string(),
        "end".to_string(),
    ]
}

/// Removes an aggregate interface. Members fall back to individual
/// ports.
pub fn delete_bundle(bundle: BundleId) -> Vec<String> {
    vec![
        "configure terminal".to_string(),
        format!("no interface {}", bundle.interface_name()),
        "end".to_string(),
    ]
}

/// Attaches a physical port to an aggregate in active LACP mode.
pub fn add_member(port: &PortName, bundle: BundleId) -> Vec<String> {
    vec![
        "configure terminal".to_string(),
        format!("interface {}", port.as_str()),
        format!("channel-group {} mode active", bundle.0),
        "no shutdown".to_string(),
        "end".to_string(),
    ]
}

/// Detaches a physical port from its aggregate.
pub fn remove_member(port: &PortName) -> Vec<String> {
    vec![
        "configure terminal".to_string(),
        format!("interface {}", port.as_str()),
        "no channel-group".to_string(),
        "end".to_string(),
    ]
}

/// Sets the device's LACP system ID (priority and MAC).
///
/// A system ID whose notation lacks the `priority,mac` shape is sent
/// priority-less; the device will reject it with an error banner,
/// which surfaces as a command error the same way a typo would.
pub fn set_system_id(system_id: &SystemId) -> Vec<String> {
    let mut lines = vec!["configure terminal".to_string()];
    match system_id.as_str().split_once(',') {
        Some((priority, mac)) => {
            lines.push(format!("lacp system-priority {}", priority.trim()));
            lines.push(format!("lacp system-mac {}", mac.trim()));
        }
        None => lines.push(format!("lacp system-mac {}", system_id.as_str())),
    }
    lines.push("end".to_string());
    lines
}

/// Sets the minimum-links floor on an aggregate.
pub fn set_min_links(bundle: BundleId, min_links: usize) -> Vec<String> {
    vec![
        "configure terminal".to_string(),
        format!("interface {}", bundle.interface_name()),
        format!("port-channel min-links {min_links}"),
        "end".to_string(),
    ]
}

/// Pins a physical port to a fixed speed.
pub fn set_port_speed(port: &PortName, speed: Bandwidth) -> Vec<String> {
    vec![
        "configure terminal".to_string(),
        format!("interface {}", port.as_str()),
        format!("speed {}", speed.bps() / Bandwidth::MBPS),
        "end".to_string(),
    ]
}

/// Administratively disables a port (fault injection).
pub fn shutdown_port(port: &PortName) -> Vec<String> {
    vec![
        "configure terminal".to_string(),
        format!("interface {}", port.as_str()),
        "shutdown".to_string(),
        "end".to_string(),
    ]
}

/// Re-enables an administratively disabled port.
pub fn enable_port(port: &PortName) -> Vec<String> {
    vec![
        "configure terminal".to_string(),
        format!("interface {}", port.as_str()),
        "no shutdown".to_string(),
        "end".to_string(),
    ]
}
