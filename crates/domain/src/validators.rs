//! Byte-level validation predicates used by the resolvers and the policy
//! parser. All of them run on untrusted wire data, so they avoid allocation.

use std::net::IpAddr;

fn is_hex_byte(b: u8) -> bool {
    b.is_ascii_digit() || matches!(b | 0x20, b'a'..=b'f')
}

pub fn is_hex(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(is_hex_byte)
}

pub fn is_sha256(s: &str) -> bool {
    s.len() == 64 && is_hex(s)
}

pub fn is_sha512(s: &str) -> bool {
    s.len() == 128 && is_hex(s)
}

/// RFC 1035 host name check: at most 253 octets after stripping one trailing
/// dot, labels of 1..=63 `[A-Za-z0-9-]` octets without leading or trailing
/// hyphens. Anything that parses as an IP address is not a DNS name.
pub fn is_dns_name(s: &str) -> bool {
    if s.is_empty() || s.len() > 253 {
        return false;
    }
    let s = s.strip_suffix('.').unwrap_or(s);
    if s.is_empty() || s.parse::<IpAddr>().is_ok() {
        return false;
    }
    for label in s.split('.') {
        if label.is_empty() || label.len() > 63 {
            return false;
        }
        if label.starts_with('-') || label.ends_with('-') {
            return false;
        }
        if !label
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-')
        {
            return false;
        }
    }
    true
}

pub fn is_printable_ascii(s: &[u8]) -> bool {
    s.iter().all(|&b| (0x20..=0x7e).contains(&b))
}

pub fn is_utf8(s: &[u8]) -> bool {
    std::str::from_utf8(s).is_ok()
}

pub fn is_ip4(s: &str) -> bool {
    matches!(s.parse::<IpAddr>(), Ok(IpAddr::V4(_)))
}

pub fn is_ip6(s: &str) -> bool {
    matches!(s.parse::<IpAddr>(), Ok(IpAddr::V6(_)))
}

pub fn is_ip(s: &str) -> bool {
    s.parse::<IpAddr>().is_ok()
}
