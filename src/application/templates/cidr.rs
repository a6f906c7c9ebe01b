//! CIDR parsing for the `address` and `netmask` template helpers

use ipnetwork::IpNetwork;

use crate::support::errors::CidrError;

/// Parses `10.0.0.5/24` or `fd00::1/64`. The prefix length is required.
fn parse(cidr: &str) -> Result<IpNetwork, CidrError> {
    let fail = |reason: String| CidrError {
        cidr: cidr.to_string(),
        reason,
    };

    // IpNetwork reads a bare address as a host route
    if !cidr.contains('/') {
        return Err(fail("missing prefix length".to_string()));
    }

    cidr.parse::<IpNetwork>().map_err(|e| fail(e.to_string()))
}

/// `address(cidr)`: the address part of a CIDR string, host bits included.
pub fn cidr_address(cidr: &str) -> Result<String, CidrError> {
    Ok(parse(cidr)?.ip().to_string())
}

/// `netmask(cidr)`: the network mask of a CIDR string in dotted form.
pub fn cidr_netmask(cidr: &str) -> Result<String, CidrError> {
    Ok(parse(cidr)?.mask().to_string())
}
