// src/version/mod.rs

//! Version comparison and constraint satisfaction
//!
//! This is the universe's version comparator. Versions have the form
//! `[epoch:]version[-release]`. Comparison goes epoch first, then the version
//! (through `semver` when both sides are valid semver, segment-wise
//! otherwise), then the release.
//!
//! Segment-wise comparison splits a string into runs of digits and runs of
//! letters, ignoring any other characters. Digit runs compare numerically,
//! letter runs lexically, a digit run outranks a letter run, and when every
//! shared segment is equal the string with more segments is newer.

use crate::error::{Error, Result};
use semver::Version as SemVer;
use std::cmp::Ordering;
use std::fmt;

/// A parsed package version with epoch, version, and release components
#[derive(Debug, Clone)]
pub struct Version {
    pub epoch: u64,
    pub version: String,
    pub release: Option<String>,
}

impl Version {
    /// Parse a version string
    ///
    /// Format: [epoch:]version[-release]
    /// Examples:
    /// - "1.2.3" → epoch=0, version="1.2.3", release=None
    /// - "2:1.2.3" → epoch=2, version="1.2.3", release=None
    /// - "3.0.13-1" → epoch=0, version="3.0.13", release=Some("1")
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        let (epoch_str, rest) = match s.split_once(':') {
            Some((e, r)) => (e, r),
            None => ("0", s),
        };

        let epoch = if epoch_str.is_empty() {
            0
        } else {
            epoch_str.parse::<u64>().map_err(|e| {
                Error::invalid_input(format!("Invalid epoch in version '{}': {}", s, e))
            })?
        };

        let (version, release) = match rest.split_once('-') {
            Some((v, r)) => (v.to_string(), Some(r.to_string())),
            None => (rest.to_string(), None),
        };

        if version.is_empty() {
            return Err(Error::invalid_input(format!(
                "Empty version component in '{}'",
                s
            )));
        }

        Ok(Self {
            epoch,
            version,
            release,
        })
    }

    /// Compare two versions
    pub fn compare(&self, other: &Version) -> Ordering {
        match self.epoch.cmp(&other.epoch) {
            Ordering::Equal => {}
            ord => return ord,
        }

        let by_version = match (SemVer::parse(&self.version), SemVer::parse(&other.version)) {
            (Ok(v1), Ok(v2)) => v1.cmp(&v2),
            _ => compare_segments(&self.version, &other.version),
        };
        if by_version != Ordering::Equal {
            return by_version;
        }

        match (&self.release, &other.release) {
            (Some(r1), Some(r2)) => compare_segments(r1, r2),
            (r1, r2) => r1.is_some().cmp(&r2.is_some()),
        }
    }

    /// Whether the version string equals `prefix` or continues it with a dot
    pub fn has_prefix(&self, prefix: &str) -> bool {
        self.version == prefix
            || self
                .version
                .strip_prefix(prefix)
                .is_some_and(|rest| rest.starts_with('.'))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Segment<'a> {
    Digits(&'a str),
    Letters(&'a str),
}

fn segments(s: &str) -> Vec<Segment<'_>> {
    let mut out = Vec::new();
    let bytes = s.as_bytes();
    let mut i = 0;

    while i < bytes.len() {
        let start = i;
        if bytes[i].is_ascii_digit() {
            while i < bytes.len() && bytes[i].is_ascii_digit() {
                i += 1;
            }
            out.push(Segment::Digits(&s[start..i]));
        } else if bytes[i].is_ascii_alphabetic() {
            while i < bytes.len() && bytes[i].is_ascii_alphabetic() {
                i += 1;
            }
            out.push(Segment::Letters(&s[start..i]));
        } else {
            i += 1;
        }
    }

    out
}

fn compare_digits(a: &str, b: &str) -> Ordering {
    let a = a.trim_start_matches('0');
    let b = b.trim_start_matches('0');
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

/// Segment-wise comparison used when semver does not apply
///
/// The shorter side is padded with zero segments, so "1.0" equals "1.0.0"
/// and a trailing letter segment ("1.0a") sorts before the bare release.
pub fn compare_segments(a: &str, b: &str) -> Ordering {
    const ZERO: Segment<'static> = Segment::Digits("0");
    let left = segments(a);
    let right = segments(b);
    let len = left.len().max(right.len());

    for i in 0..len {
        let l = left.get(i).copied().unwrap_or(ZERO);
        let r = right.get(i).copied().unwrap_or(ZERO);
        let ord = match (l, r) {
            (Segment::Digits(x), Segment::Digits(y)) => compare_digits(x, y),
            (Segment::Letters(x), Segment::Letters(y)) => x.cmp(y),
            (Segment::Digits(_), Segment::Letters(_)) => Ordering::Greater,
            (Segment::Letters(_), Segment::Digits(_)) => Ordering::Less,
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }

    Ordering::Equal
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.epoch > 0 {
            write!(f, "{}:", self.epoch)?;
        }
        write!(f, "{}", self.version)?;
        if let Some(ref release) = self.release {
            write!(f, "-{}", release)?;
        }
        Ok(())
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.compare(other) == Ordering::Equal
    }
}

impl Eq for Version {}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        self.compare(other)
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Version constraint operators
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionConstraint {
    /// Any version is acceptable
    Any,
    Exact(Version),
    GreaterThan(Version),
    GreaterOrEqual(Version),
    LessThan(Version),
    LessOrEqual(Version),
    NotEqual(Version),
    /// Version string equal to the prefix or continuing it after a dot ("1.2.*")
    Prefix(String),
    /// Every constraint must be satisfied (for ranges like ">=1.0,<2.0")
    All(Vec<VersionConstraint>),
}

impl VersionConstraint {
    /// Parse a version constraint string
    ///
    /// Examples:
    /// - ">= 1.2.3" → GreaterOrEqual(1.2.3)
    /// - "<2" → LessThan(2)
    /// - "==1.5.0" or "1.5.0" → Exact(1.5.0)
    /// - "3.8.*" → Prefix("3.8")
    /// - ">=3.0,<4" → All([>=3.0, <4])
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();

        if s.is_empty() || s == "*" {
            return Ok(VersionConstraint::Any);
        }

        if s.contains(',') {
            let parts = s
                .split(',')
                .map(Self::parse)
                .collect::<Result<Vec<_>>>()?;
            return Ok(VersionConstraint::All(parts));
        }

        if let Some(rest) = s.strip_prefix(">=") {
            Ok(VersionConstraint::GreaterOrEqual(Version::parse(rest)?))
        } else if let Some(rest) = s.strip_prefix("<=") {
            Ok(VersionConstraint::LessOrEqual(Version::parse(rest)?))
        } else if let Some(rest) = s.strip_prefix("!=") {
            Ok(VersionConstraint::NotEqual(Version::parse(rest)?))
        } else if let Some(rest) = s.strip_prefix("==") {
            Self::parse_exact(rest)
        } else if let Some(rest) = s.strip_prefix('>') {
            Ok(VersionConstraint::GreaterThan(Version::parse(rest)?))
        } else if let Some(rest) = s.strip_prefix('<') {
            Ok(VersionConstraint::LessThan(Version::parse(rest)?))
        } else if let Some(rest) = s.strip_prefix('=') {
            Self::parse_exact(rest)
        } else {
            Self::parse_exact(s)
        }
    }

    fn parse_exact(s: &str) -> Result<Self> {
        let s = s.trim();
        match s.strip_suffix(".*").or_else(|| s.strip_suffix('*')) {
            Some("") => Ok(VersionConstraint::Any),
            Some(prefix) => Ok(VersionConstraint::Prefix(prefix.to_string())),
            None => Ok(VersionConstraint::Exact(Version::parse(s)?)),
        }
    }

    /// Check if a version satisfies this constraint
    pub fn satisfies(&self, version: &Version) -> bool {
        match self {
            VersionConstraint::Any => true,
            VersionConstraint::Exact(v) => version == v,
            VersionConstraint::GreaterThan(v) => version > v,
            VersionConstraint::GreaterOrEqual(v) => version >= v,
            VersionConstraint::LessThan(v) => version < v,
            VersionConstraint::LessOrEqual(v) => version <= v,
            VersionConstraint::NotEqual(v) => version != v,
            VersionConstraint::Prefix(prefix) => version.has_prefix(prefix),
            VersionConstraint::All(parts) => parts.iter().all(|c| c.satisfies(version)),
        }
    }
}

impl fmt::Display for VersionConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VersionConstraint::Any => write!(f, "*"),
            VersionConstraint::Exact(v) => write!(f, "= {}", v),
            VersionConstraint::GreaterThan(v) => write!(f, "> {}", v),
            VersionConstraint::GreaterOrEqual(v) => write!(f, ">= {}", v),
            VersionConstraint::LessThan(v) => write!(f, "< {}", v),
            VersionConstraint::LessOrEqual(v) => write!(f, "<= {}", v),
            VersionConstraint::NotEqual(v) => write!(f, "!= {}", v),
            VersionConstraint::Prefix(prefix) => write!(f, "{}.*", prefix),
            VersionConstraint::All(parts) => {
                for (i, part) in parts.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", part)?;
                }
                Ok(())
            }
        }
    }
}
