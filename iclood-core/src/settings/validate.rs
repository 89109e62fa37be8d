//! Format checks applied where a user enters the server endpoint.

use crate::{IcloodError, Result};
use std::net::Ipv4Addr;

/// Validate a dotted-quad IPv4 address such as `192.168.1.10`.
pub fn validate_server_address(address: &str) -> Result<()> {
    let address = address.trim();
    if address.is_empty() {
        return Err(IcloodError::Validation(
            "Please enter a server IP address".to_string(),
        ));
    }

    if address.parse::<Ipv4Addr>().is_err() {
        return Err(IcloodError::Validation(format!(
            "'{}' is not a valid IP address (e.g., 192.168.1.10)",
            address
        )));
    }
    Ok(())
}

/// Validate a port number in the range 1-65535, returning it parsed.
pub fn validate_port(port: &str) -> Result<u16> {
    match port.trim().parse::<u16>() {
        Ok(n) if n >= 1 => Ok(n),
        _ => Err(IcloodError::Validation(format!(
            "'{}' is not a valid port number (1-65535)",
            port
        ))),
    }
}
