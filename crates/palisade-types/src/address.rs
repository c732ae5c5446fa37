//! Subnet membership for IPv4 and IPv6

use std::net::IpAddr;

/// Number of bits in an address of this family (32 or 128)
pub fn family_width(addr: &IpAddr) -> u8 {
	match addr {
		IpAddr::V4(_) => 32,
		IpAddr::V6(_) => 128,
	}
}

/// A stored prefix length of 0 means "this address only".
pub fn normalize_prefix(net: &IpAddr, prefix: u8) -> u8 {
	if prefix == 0 { family_width(net) } else { prefix }
}

/// Check whether `addr` lies within `net/prefix`.
///
/// The prefix is normalized first (0 becomes the full family width). IPv4-mapped
/// IPv6 addresses are compared as IPv4. Addresses of different families never
/// match, and a prefix wider than the family never matches.
pub fn is_in_subnet(addr: &IpAddr, net: &IpAddr, prefix: u8) -> bool {
	let addr = addr.to_canonical();
	let net = net.to_canonical();
	let prefix = normalize_prefix(&net, prefix);

	match (addr, net) {
		(IpAddr::V4(a), IpAddr::V4(n)) => {
			if prefix > 32 {
				return false;
			}
			let mask = u32::MAX.checked_shl(32 - u32::from(prefix)).unwrap_or(0);
			(u32::from(a) & mask) == (u32::from(n) & mask)
		}
		(IpAddr::V6(a), IpAddr::V6(n)) => {
			if prefix > 128 {
				return false;
			}
			let mask = u128::MAX.checked_shl(128 - u32::from(prefix)).unwrap_or(0);
			(u128::from(a) & mask) == (u128::from(n) & mask)
		}
		_ => false,
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::net::{Ipv4Addr, Ipv6Addr};

	fn ip(s: &str) -> IpAddr {
		s.parse().unwrap()
	}

	#[test]
	fn test_ipv4_subnet() {
		let net = ip("203.0.113.5");
		assert!(is_in_subnet(&ip("203.0.113.9"), &net, 24));
		assert!(is_in_subnet(&ip("203.0.113.255"), &net, 24));
		assert!(!is_in_subnet(&ip("203.0.114.1"), &net, 24));
	}

	#[test]
	fn test_zero_prefix_is_exact_match() {
		let net = ip("192.0.2.10");
		assert!(is_in_subnet(&ip("192.0.2.10"), &net, 0));
		assert!(!is_in_subnet(&ip("192.0.2.11"), &net, 0));

		let net6 = ip("2001:db8::1");
		assert!(is_in_subnet(&ip("2001:db8::1"), &net6, 0));
		assert!(!is_in_subnet(&ip("2001:db8::2"), &net6, 0));
	}

	#[test]
	fn test_ipv6_subnet() {
		let net = ip("2001:db8:abcd::");
		assert!(is_in_subnet(&ip("2001:db8:abcd:12::1"), &net, 48));
		assert!(!is_in_subnet(&ip("2001:db8:abce::1"), &net, 48));
	}

	#[test]
	fn test_mixed_families_never_match() {
		assert!(!is_in_subnet(&ip("10.0.0.1"), &ip("::"), 1));
		assert!(!is_in_subnet(&ip("2001:db8::1"), &ip("0.0.0.0"), 1));
	}

	#[test]
	fn test_ipv4_mapped_address() {
		let mapped = IpAddr::V6(Ipv4Addr::new(198, 51, 100, 7).to_ipv6_mapped());
		assert!(is_in_subnet(&mapped, &ip("198.51.100.0"), 24));
	}

	#[test]
	fn test_oversized_prefix() {
		assert!(!is_in_subnet(&ip("10.0.0.1"), &ip("10.0.0.1"), 33));
		assert!(is_in_subnet(
			&IpAddr::V6(Ipv6Addr::LOCALHOST),
			&IpAddr::V6(Ipv6Addr::LOCALHOST),
			128
		));
	}
}

// vim: ts=4
