// IP address normalization and range classification
// Session records and policy checks always operate on the expanded form

use std::net::{IpAddr, Ipv6Addr};

/// Whether an address belongs to a private/internal range or the public internet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IpScope {
    Private,
    Public,
}

/// Normalize an IP address to its expanded canonical form.
///
/// IPv4 addresses are returned in dotted-quad form. IPv6 addresses are
/// expanded to all eight zero-padded groups so that two spellings of the
/// same address always compare equal. Unparseable input is returned
/// unchanged so it still forms a stable (if meaningless) key.
pub fn normalize_ip(raw: &str) -> String {
    match raw.trim().parse::<IpAddr>() {
        Ok(IpAddr::V4(v4)) => v4.to_string(),
        Ok(IpAddr::V6(v6)) => expand_ipv6(&v6),
        Err(_) => raw.trim().to_string(),
    }
}

/// Classify an address as private or public.
///
/// Loopback, RFC 1918, link-local, carrier-grade NAT and IPv6 unique-local
/// ranges all count as private. Anything unparseable is treated as public,
/// which errs on the side of the stricter `allow-private-only` rule.
pub fn classify_ip(raw: &str) -> IpScope {
    let Ok(addr) = raw.trim().parse::<IpAddr>() else {
        return IpScope::Public;
    };

    let private = match addr {
        IpAddr::V4(v4) => {
            v4.is_private()
                || v4.is_loopback()
                || v4.is_link_local()
                || v4.is_unspecified()
                // 100.64.0.0/10 (RFC 6598 shared address space)
                || (v4.octets()[0] == 100 && (v4.octets()[1] & 0xc0) == 64)
        }
        IpAddr::V6(v6) => {
            v6.is_loopback()
                || v6.is_unspecified()
                // fc00::/7 unique-local
                || (v6.segments()[0] & 0xfe00) == 0xfc00
                // fe80::/10 link-local
                || (v6.segments()[0] & 0xffc0) == 0xfe80
                || v6.to_ipv4_mapped().is_some_and(|v4| {
                    v4.is_private() || v4.is_loopback() || v4.is_link_local()
                })
        }
    };

    if private { IpScope::Private } else { IpScope::Public }
}

fn expand_ipv6(addr: &Ipv6Addr) -> String {
    let s = addr.segments();
    format!(
        "{:04x}:{:04x}:{:04x}:{:04x}:{:04x}:{:04x}:{:04x}:{:04x}",
        s[0], s[1], s[2], s[3], s[4], s[5], s[6], s[7]
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_ipv4_passthrough() {
        assert_eq!(normalize_ip("192.168.1.1"), "192.168.1.1");
        assert_eq!(normalize_ip(" 10.0.0.1 "), "10.0.0.1");
    }

    #[test]
    fn test_normalize_ipv6_expansion() {
        assert_eq!(
            normalize_ip("2001:db8::1"),
            "2001:0db8:0000:0000:0000:0000:0000:0001"
        );
        assert_eq!(
            normalize_ip("::1"),
            "0000:0000:0000:0000:0000:0000:0000:0001"
        );
    }

    #[test]
    fn test_equivalent_ipv6_spellings_normalize_identically() {
        assert_eq!(
            normalize_ip("2001:DB8:0:0:0:0:0:1"),
            normalize_ip("2001:db8::1")
        );
    }

    #[test]
    fn test_unparseable_input_is_kept() {
        assert_eq!(normalize_ip("not-an-ip"), "not-an-ip");
    }

    #[test]
    fn test_private_ranges() {
        assert_eq!(classify_ip("10.0.0.1"), IpScope::Private);
        assert_eq!(classify_ip("172.16.5.4"), IpScope::Private);
        assert_eq!(classify_ip("192.168.0.10"), IpScope::Private);
        assert_eq!(classify_ip("127.0.0.1"), IpScope::Private);
        assert_eq!(classify_ip("100.64.0.1"), IpScope::Private);
        assert_eq!(classify_ip("fc00::1"), IpScope::Private);
        assert_eq!(classify_ip("fe80::1"), IpScope::Private);
        assert_eq!(classify_ip("::1"), IpScope::Private);
    }

    #[test]
    fn test_public_ranges() {
        assert_eq!(classify_ip("8.8.8.8"), IpScope::Public);
        assert_eq!(classify_ip("203.0.113.5"), IpScope::Public);
        assert_eq!(classify_ip("2001:db8::1"), IpScope::Public);
    }

    #[test]
    fn test_unparseable_is_public() {
        assert_eq!(classify_ip("garbage"), IpScope::Public);
    }
}
