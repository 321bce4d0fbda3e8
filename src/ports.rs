//! Parses a textual port specification into a deduplicated, ordered list of ports.
//!
//! Deduplication here preserves first-seen order instead of sorting: the
//! output must satisfy `parse(format(parse(spec))) == parse(spec)` as a set
//! while still preserving first-seen order across ranges and singletons.

use std::collections::HashSet;

use crate::error::InvalidPortSpec;

const LOWEST_PORT: u32 = 1;
const HIGHEST_PORT: u32 = 65_535;

/// A validated, deduplicated, first-seen-ordered list of ports.
pub type Ports = Vec<u16>;

/// Parses a comma-separated port specification (`"22,80,443,1000-2000"`)
/// into an ordered, deduplicated `Vec<u16>`.
///
/// Tokens are trimmed; empty tokens are skipped. Each token is either a
/// single port or an inclusive `start-end` range with `start <= end`. Fails
/// with [`InvalidPortSpec`] when any number falls outside `[1, 65535]`, a
/// range is inverted, a token is malformed, or the result would be empty.
pub fn parse_port_spec(input: &str) -> Result<Ports, InvalidPortSpec> {
    let mut ports = Vec::new();
    let mut seen = HashSet::new();

    for token in input.split(',') {
        let token = token.trim();
        if token.is_empty() {
            continue;
        }

        if let Some((start, end)) = token.split_once('-') {
            for port in parse_range(token, start, end)? {
                push_unique(&mut ports, &mut seen, port);
            }
        } else {
            push_unique(&mut ports, &mut seen, parse_single(token)?);
        }
    }

    if ports.is_empty() {
        return Err(InvalidPortSpec("no valid ports or ranges provided".into()));
    }

    Ok(ports)
}

fn push_unique(ports: &mut Vec<u16>, seen: &mut HashSet<u16>, port: u16) {
    if seen.insert(port) {
        ports.push(port);
    }
}

fn parse_range(token: &str, start: &str, end: &str) -> Result<std::ops::RangeInclusive<u16>, InvalidPortSpec> {
    let start = parse_bound(start)
        .ok_or_else(|| InvalidPortSpec(format!("invalid start port '{start}' in range '{token}'")))?;
    let end = parse_bound(end)
        .ok_or_else(|| InvalidPortSpec(format!("invalid end port '{end}' in range '{token}'")))?;

    if start > end {
        return Err(InvalidPortSpec(format!(
            "start port {start} is greater than end port {end} in range '{token}'"
        )));
    }

    Ok(start..=end)
}

fn parse_single(token: &str) -> Result<u16, InvalidPortSpec> {
    parse_bound(token).ok_or_else(|| InvalidPortSpec(format!("invalid port number '{token}'")))
}

/// Parses a single decimal port number, rejecting anything outside `[1, 65535]`.
fn parse_bound(text: &str) -> Option<u16> {
    let value: u32 = text.parse().ok()?;
    if (LOWEST_PORT..=HIGHEST_PORT).contains(&value) {
        Some(value as u16)
    } else {
        None
    }
}

/// Formats a parsed port list back into a canonical comma-separated spec,
/// collapsing consecutive runs into ranges. Used by the idempotence test
/// (§8 invariant #4) and available to consumers that want to echo back a
/// normalized spec.
pub fn format_port_spec(ports: &[u16]) -> String {
    let mut sorted = ports.to_vec();
    sorted.sort_unstable();
    sorted.dedup();

    let mut parts = Vec::new();
    let mut iter = sorted.iter().copied().peekable();
    while let Some(start) = iter.next() {
        let mut end = start;
        while iter.peek() == Some(&(end + 1)) {
            end = iter.next().unwrap();
        }
        if start == end {
            parts.push(start.to_string());
        } else {
            parts.push(format!("{start}-{end}"));
        }
    }
    parts.join(",")
}

#[cfg(test)]
mod tests {
    use parameterized::parameterized;

    use super::*;

    #[test]
    fn parses_singletons_and_ranges() {
        assert_eq!(parse_port_spec("80,443,8000-8002").unwrap(), vec![80, 443, 8000, 8001, 8002]);
    }

    #[parameterized(spec = {
        "0", "65536", "-1", "80,0", "5-1", "1-2-3", "abc", "",
    })]
    fn rejects_malformed_specs(spec: &str) {
        assert!(parse_port_spec(spec).is_err(), "expected '{spec}' to be rejected");
    }

    #[test]
    fn dedups_preserving_first_seen_order() {
        assert_eq!(parse_port_spec("1-3,2,3").unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn trims_whitespace_and_skips_empty_tokens() {
        assert_eq!(parse_port_spec(" 80, , 443 ").unwrap(), vec![80, 443]);
    }

    #[test]
    fn rejects_port_zero() {
        let err = parse_port_spec("0").unwrap_err();
        assert!(err.0.contains("invalid port number '0'"));
    }

    #[test]
    fn rejects_port_above_65535() {
        assert!(parse_port_spec("65536").is_err());
    }

    #[test]
    fn boundary_ports_are_accepted() {
        assert_eq!(parse_port_spec("1,65535").unwrap(), vec![1, 65535]);
    }

    #[test]
    fn rejects_inverted_range() {
        let err = parse_port_spec("80,5-1,443").unwrap_err();
        assert!(err.0.contains("greater than"));
    }

    #[test]
    fn rejects_malformed_range() {
        let err = parse_port_spec("1-2-3").unwrap_err();
        assert!(err.0.contains("invalid end port"));
    }

    #[test]
    fn rejects_empty_input() {
        assert!(parse_port_spec("").is_err());
        assert!(parse_port_spec("   ").is_err());
    }

    #[test]
    fn idempotent_round_trip_as_a_set() {
        let spec = "80,443,8000-8002,1-3,2";
        let first = parse_port_spec(spec).unwrap();
        let reformatted = format_port_spec(&first);
        let second = parse_port_spec(&reformatted).unwrap();

        let mut first_set: Vec<u16> = first.clone();
        first_set.sort_unstable();
        let mut second_set: Vec<u16> = second.clone();
        second_set.sort_unstable();
        assert_eq!(first_set, second_set);
    }

    #[test]
    fn format_collapses_consecutive_runs() {
        assert_eq!(format_port_spec(&[1, 2, 3, 80, 443, 8080]), "1-3,80,443,8080");
    }
}
