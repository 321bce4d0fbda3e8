//! Expands raw target tokens (IP literals, CIDR blocks, hostnames) into a
//! deduplicated, ordered list of host strings (§4.2).
//!
//! CIDR enumeration is implemented directly over the network address's
//! integer representation (carry-propagating increment) so the exact host
//! count is known *before* expanding: a block that exceeds
//! `cidr_host_limit` fails without any partial expansion (§4.2, §8
//! boundary behavior).

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use crate::error::TargetError;

/// Options controlling target expansion.
#[derive(Debug, Clone, Copy)]
pub struct ResolverOptions {
    /// Maximum number of hosts a single CIDR block may expand to.
    pub cidr_host_limit: u64,
}

impl Default for ResolverOptions {
    fn default() -> Self {
        Self { cidr_host_limit: 65_536 }
    }
}

/// Expands `tokens` into an ordered, deduplicated list of host strings.
///
/// - IP literals pass through unchanged.
/// - Tokens containing `/` are parsed as CIDR and fully enumerated.
/// - Anything else is validated as a DNS hostname (§3) and passed through —
///   resolution to IP addresses is deferred to the probe layer.
pub fn resolve_targets(tokens: &[String], options: ResolverOptions) -> Result<Vec<String>, TargetError> {
    let mut hosts = Vec::new();
    let mut seen = std::collections::HashSet::new();

    for token in tokens {
        let token = token.trim();
        if token.is_empty() {
            continue;
        }

        if let Ok(ip) = token.parse::<IpAddr>() {
            push_unique(&mut hosts, &mut seen, ip.to_string());
            continue;
        }

        if token.contains('/') {
            for host in expand_cidr(token, options.cidr_host_limit)? {
                push_unique(&mut hosts, &mut seen, host);
            }
            continue;
        }

        validate_hostname(token).map_err(|_| TargetError::InvalidHost(token.to_string()))?;
        push_unique(&mut hosts, &mut seen, token.to_string());
    }

    if hosts.is_empty() {
        return Err(TargetError::NoValidTargets);
    }

    Ok(hosts)
}

fn push_unique(hosts: &mut Vec<String>, seen: &mut std::collections::HashSet<String>, host: String) {
    if seen.insert(host.clone()) {
        hosts.push(host);
    }
}

fn expand_cidr(token: &str, limit: u64) -> Result<Vec<String>, TargetError> {
    let (base, prefix_str) = token
        .split_once('/')
        .ok_or_else(|| TargetError::InvalidHost(token.to_string()))?;
    let prefix: u32 = prefix_str
        .parse()
        .map_err(|_| TargetError::InvalidHost(token.to_string()))?;

    match base.parse::<IpAddr>() {
        Ok(IpAddr::V4(addr)) => expand_v4(token, addr, prefix, limit),
        Ok(IpAddr::V6(addr)) => expand_v6(token, addr, prefix, limit),
        Err(_) => Err(TargetError::InvalidHost(token.to_string())),
    }
}

fn expand_v4(token: &str, addr: Ipv4Addr, prefix: u32, limit: u64) -> Result<Vec<String>, TargetError> {
    if prefix > 32 {
        return Err(TargetError::InvalidHost(token.to_string()));
    }
    let host_bits = 32 - prefix;
    let count: u64 = 1u64 << host_bits;
    if count > limit {
        return Err(TargetError::CIDRTooLarge {
            cidr: token.to_string(),
            host_count: count,
            limit,
        });
    }

    let network_mask = if prefix == 0 { 0u32 } else { u32::MAX << host_bits };
    let network_base = u32::from(addr) & network_mask;

    Ok((0..count)
        .map(|offset| Ipv4Addr::from(network_base.wrapping_add(offset as u32)).to_string())
        .collect())
}

fn expand_v6(token: &str, addr: Ipv6Addr, prefix: u32, limit: u64) -> Result<Vec<String>, TargetError> {
    if prefix > 128 {
        return Err(TargetError::InvalidHost(token.to_string()));
    }
    let host_bits = 128 - prefix;
    // A /0 - /64 IPv6 block legitimately has more hosts than any sane
    // cidr_host_limit; the limit check below rejects it long before we'd
    // try to materialize a count that doesn't fit in u64.
    let count: u128 = if host_bits >= 64 {
        return Err(TargetError::CIDRTooLarge {
            cidr: token.to_string(),
            host_count: u64::MAX,
            limit,
        });
    } else {
        1u128 << host_bits
    };
    if count > u128::from(limit) {
        return Err(TargetError::CIDRTooLarge {
            cidr: token.to_string(),
            host_count: count as u64,
            limit,
        });
    }

    let network_mask = if prefix == 0 { 0u128 } else { u128::MAX << host_bits };
    let network_base = u128::from(addr) & network_mask;

    Ok((0..count)
        .map(|offset| Ipv6Addr::from(network_base.wrapping_add(offset)).to_string())
        .collect())
}

/// Validates a DNS hostname per §3: labels 1-63 chars, total length ≤ 253,
/// no leading/trailing `.` or `-`, no `..`.
pub fn validate_hostname(name: &str) -> Result<(), TargetError> {
    let invalid = || TargetError::InvalidHost(name.to_string());

    if name.is_empty() || name.len() > 253 {
        return Err(invalid());
    }
    if name.starts_with('.') || name.ends_with('.') || name.starts_with('-') || name.ends_with('-') {
        return Err(invalid());
    }
    if name.contains("..") {
        return Err(invalid());
    }

    for label in name.split('.') {
        if label.is_empty() || label.len() > 63 {
            return Err(invalid());
        }
        if !label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            return Err(invalid());
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn expands_small_cidr_in_order() {
        let hosts = resolve_targets(&tokens(&["192.168.1.0/30"]), ResolverOptions { cidr_host_limit: 16 }).unwrap();
        assert_eq!(
            hosts,
            vec!["192.168.1.0", "192.168.1.1", "192.168.1.2", "192.168.1.3"]
        );
    }

    #[test]
    fn dedups_mixed_tokens_preserving_order() {
        let hosts = resolve_targets(
            &tokens(&["example.com", "192.168.1.1", "example.com"]),
            ResolverOptions::default(),
        )
        .unwrap();
        assert_eq!(hosts, vec!["example.com", "192.168.1.1"]);
    }

    #[test]
    fn cidr_exceeding_limit_is_rejected_without_partial_expansion() {
        let err = resolve_targets(&tokens(&["10.0.0.0/16"]), ResolverOptions { cidr_host_limit: 100 }).unwrap_err();
        assert!(matches!(err, TargetError::CIDRTooLarge { .. }));
    }

    #[test]
    fn cidr_host_count_equal_to_limit_is_accepted() {
        // /30 = 4 hosts
        let hosts = resolve_targets(&tokens(&["10.0.0.0/30"]), ResolverOptions { cidr_host_limit: 4 }).unwrap();
        assert_eq!(hosts.len(), 4);
    }

    #[test]
    fn one_more_host_than_limit_is_rejected() {
        let err = resolve_targets(&tokens(&["10.0.0.0/30"]), ResolverOptions { cidr_host_limit: 3 }).unwrap_err();
        assert!(matches!(err, TargetError::CIDRTooLarge { .. }));
    }

    #[test]
    fn empty_input_fails_with_no_valid_targets() {
        let err = resolve_targets(&[], ResolverOptions::default()).unwrap_err();
        assert_eq!(err, TargetError::NoValidTargets);
    }

    #[test]
    fn idempotent_under_deduplication() {
        let with_dupes = tokens(&["a.example.com", "10.0.0.1", "a.example.com", "10.0.0.1"]);
        let deduped = tokens(&["a.example.com", "10.0.0.1"]);
        assert_eq!(
            resolve_targets(&with_dupes, ResolverOptions::default()).unwrap(),
            resolve_targets(&deduped, ResolverOptions::default()).unwrap()
        );
    }

    #[test]
    fn hostname_boundary_lengths() {
        let label_63 = "a".repeat(63);
        assert!(validate_hostname(&label_63).is_ok());
        let label_64 = "a".repeat(64);
        assert!(validate_hostname(&label_64).is_err());

        // Four labels of 63/63/63/61 chars plus 3 dots = 253 total, every
        // label within the 63-char limit, so only the total-length rule is
        // exercised.
        let total_253 = format!("{}.{}.{}.{}", "a".repeat(63), "b".repeat(63), "c".repeat(63), "d".repeat(61));
        assert_eq!(total_253.len(), 253);
        assert!(validate_hostname(&total_253).is_ok());

        let total_254 = format!("{}.{}.{}.{}", "a".repeat(63), "b".repeat(63), "c".repeat(63), "d".repeat(62));
        assert_eq!(total_254.len(), 254);
        assert!(validate_hostname(&total_254).is_err());

        assert!(validate_hostname("").is_err());
    }

    #[test]
    fn hostname_rejects_leading_trailing_dot_or_dash_and_double_dot() {
        assert!(validate_hostname(".example.com").is_err());
        assert!(validate_hostname("example.com.").is_err());
        assert!(validate_hostname("-example.com").is_err());
        assert!(validate_hostname("example.com-").is_err());
        assert!(validate_hostname("example..com").is_err());
    }

    #[test]
    fn ipv6_cidr_expands_correctly() {
        let hosts = resolve_targets(&tokens(&["fe80::/126"]), ResolverOptions { cidr_host_limit: 16 }).unwrap();
        assert_eq!(hosts.len(), 4);
        assert_eq!(hosts[0], "fe80::");
    }
}
