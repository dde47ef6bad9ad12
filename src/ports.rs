use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Errors from parsing a textual port specification
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PortSpecError {
    #[error("expected a port number, found '{0}'")]
    Expected(String),

    #[error("port {0} is out of range (0-65535)")]
    OutOfRange(u64),

    #[error("range {0}-{1} is reversed")]
    Reversed(u16, u16),
}

/// Inclusive range of UDP ports
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortRange {
    pub begin: u16,
    pub end: u16,
}

impl PortRange {
    pub fn count(&self) -> u32 {
        self.end as u32 - self.begin as u32 + 1
    }
}

impl fmt::Display for PortRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.begin == self.end {
            write!(f, "{}", self.begin)
        } else {
            write!(f, "{}-{}", self.begin, self.end)
        }
    }
}

/// Ordered set of ports kept as sorted, non-overlapping ranges.
///
/// Used both for the ports a template record applies to and for the
/// final target set handed to [`PayloadRegistry::trim`](crate::PayloadRegistry::trim).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PortSet {
    ranges: Vec<PortRange>,
}

impl PortSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set holding exactly one port
    pub fn single(port: u16) -> Self {
        Self {
            ranges: vec![PortRange { begin: port, end: port }],
        }
    }

    /// Add `begin..=end`, merging with any overlapping or adjacent range
    pub fn add_range(&mut self, begin: u16, end: u16) {
        let (begin, end) = if begin <= end { (begin, end) } else { (end, begin) };

        let mut merged = PortRange { begin, end };
        let mut kept = Vec::with_capacity(self.ranges.len() + 1);
        let mut placed = false;

        for range in self.ranges.drain(..) {
            if (range.end as u32) + 1 < merged.begin as u32 {
                kept.push(range);
            } else if (merged.end as u32) + 1 < range.begin as u32 {
                if !placed {
                    kept.push(merged);
                    placed = true;
                }
                kept.push(range);
            } else {
                merged.begin = merged.begin.min(range.begin);
                merged.end = merged.end.max(range.end);
            }
        }
        if !placed {
            kept.push(merged);
        }

        self.ranges = kept;
    }

    pub fn contains(&self, port: u16) -> bool {
        self.ranges
            .binary_search_by(|range| {
                if range.end < port {
                    std::cmp::Ordering::Less
                } else if range.begin > port {
                    std::cmp::Ordering::Greater
                } else {
                    std::cmp::Ordering::Equal
                }
            })
            .is_ok()
    }

    /// Number of ports in the set
    pub fn count(&self) -> u32 {
        self.ranges.iter().map(PortRange::count).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    pub fn ranges(&self) -> &[PortRange] {
        &self.ranges
    }

    /// Ports in ascending order
    pub fn iter(&self) -> impl Iterator<Item = u16> + '_ {
        self.ranges.iter().flat_map(|range| range.begin..=range.end)
    }

    /// Parse a port specification from the start of `input`.
    ///
    /// Accepts `item (',' item)*` where an item is `N` or `N-M`, optionally
    /// prefixed with `U:`. Parsing stops at the first byte that cannot
    /// continue the specification; the unconsumed remainder is returned.
    pub fn parse_prefix(input: &[u8]) -> Result<(PortSet, &[u8]), PortSpecError> {
        let mut set = PortSet::new();
        let mut rest = input;

        loop {
            if let [b'U' | b'u', b':', tail @ ..] = rest {
                rest = tail;
            }

            let (begin, tail) = parse_port(rest)?;
            rest = tail;

            let end = match rest {
                [b'-', tail @ ..] => {
                    let (end, tail) = parse_port(tail)?;
                    rest = tail;
                    end
                }
                _ => begin,
            };
            if end < begin {
                return Err(PortSpecError::Reversed(begin, end));
            }
            set.add_range(begin, end);

            match rest {
                [b',', tail @ ..] => rest = tail.trim_ascii_start(),
                _ => break,
            }
        }

        Ok((set, rest))
    }
}

fn parse_port(input: &[u8]) -> Result<(u16, &[u8]), PortSpecError> {
    let digits = input.iter().take_while(|b| b.is_ascii_digit()).count();
    if digits == 0 {
        let shown: String = String::from_utf8_lossy(input).chars().take(16).collect();
        return Err(PortSpecError::Expected(shown));
    }

    let mut value: u64 = 0;
    for &digit in &input[..digits] {
        value = value.saturating_mul(10).saturating_add((digit - b'0') as u64);
    }
    let port = u16::try_from(value).map_err(|_| PortSpecError::OutOfRange(value))?;

    Ok((port, &input[digits..]))
}

impl FromStr for PortSet {
    type Err = PortSpecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (set, rest) = PortSet::parse_prefix(s.trim().as_bytes())?;
        if !rest.is_empty() {
            return Err(PortSpecError::Expected(
                String::from_utf8_lossy(rest).into_owned(),
            ));
        }
        Ok(set)
    }
}

impl fmt::Display for PortSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, range) in self.ranges.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{}", range)?;
        }
        Ok(())
    }
}
