//! Serial port discovery by device name.
//!
//! Windows lists a load cell as e.g. `"USB-SERIAL CH340 (COM5)"`. The
//! resolver matches the configured substring against that name and pulls
//! the `(COMn)` token out of it; on platforms without such a token the OS
//! port name of the matching device is used instead.

use crate::hardware::{PortDescriptor, PortEnumerator};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, info, warn};

#[allow(clippy::expect_used)]
static COM_PORT_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\((COM\d+)\)").expect("COM port pattern is valid"));

/// Pull a `(COMn)` token out of a descriptive device name.
pub fn extract_port_identifier(name: &str) -> Option<String> {
    COM_PORT_TOKEN
        .captures(name)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Port identifier to open for `descriptor`.
pub fn normalized_port(descriptor: &PortDescriptor) -> String {
    extract_port_identifier(&descriptor.name).unwrap_or_else(|| descriptor.port_name.clone())
}

/// All serial devices currently present.
///
/// Enumeration failure is logged and reported as an empty list.
pub fn list_ports(enumerator: &dyn PortEnumerator) -> Vec<PortDescriptor> {
    match enumerator.enumerate() {
        Ok(ports) => ports,
        Err(e) => {
            warn!(error = %e, "Serial port enumeration failed");
            Vec::new()
        }
    }
}

/// First port whose device name contains `name_substring`.
///
/// Enumeration order decides between several candidates.
pub fn find_port(enumerator: &dyn PortEnumerator, name_substring: &str) -> Option<String> {
    let ports = list_ports(enumerator);
    let found = ports
        .iter()
        .find(|p| p.name.contains(name_substring))
        .map(|p| (p.name.as_str(), normalized_port(p)));

    match found {
        Some((name, port)) => {
            info!(device = name, port = %port, "Found serial device");
            Some(port)
        }
        None => {
            debug!(
                pattern = name_substring,
                candidates = ports.len(),
                "No serial device matches"
            );
            None
        }
    }
}
