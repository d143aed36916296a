// src/version.rs

//! Version strings and comparison
//!
//! Versions are dotted identifiers like "1.2.3" or "2.5.A". A leading "v"
//! or "V" designator is permitted and ignored during comparison, as is a
//! single trailing dot. Comparison is segment-wise: segments that both
//! parse as unsigned 64-bit integers compare numerically, otherwise the
//! shorter segment orders first and equal-length segments compare
//! lexicographically. The resulting order is total.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// A version number or identifier in dotted form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Version(String);

impl Version {
    /// Creates a version from the given string.
    pub fn new(v: impl Into<String>) -> Self {
        Version(v.into())
    }

    /// Returns the version as entered, including any leading designator.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true if the version is an empty string.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the segments of the version.
    ///
    /// A leading "v" or "V" is skipped, and a trailing dot does not produce
    /// an empty final segment. Interior empty segments are preserved.
    pub fn segments(&self) -> Vec<&str> {
        let mut v = self.0.as_str();
        if v.len() > 1 && (v.starts_with('v') || v.starts_with('V')) {
            v = &v[1..];
        }

        let mut segments = Vec::new();
        loop {
            match v.find('.') {
                Some(cut) => {
                    segments.push(&v[..cut]);
                    if cut + 1 >= v.len() {
                        return segments;
                    }
                    v = &v[cut + 1..];
                }
                None => {
                    if !v.is_empty() {
                        segments.push(v);
                    }
                    return segments;
                }
            }
        }
    }

    /// Returns the version in canonical form, dropping any leading
    /// designator and trailing dot.
    pub fn canonical(&self) -> String {
        self.segments().join(".")
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Version {
    fn from(v: &str) -> Self {
        Version(v.to_string())
    }
}

impl From<String> for Version {
    fn from(v: String) -> Self {
        Version(v)
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        let a = self.segments();
        let b = other.segments();
        let mut i = 0;
        loop {
            match (a.get(i), b.get(i)) {
                (None, None) => return Ordering::Equal,
                (None, Some(_)) => return Ordering::Less,
                (Some(_), None) => return Ordering::Greater,
                (Some(s1), Some(s2)) => match compare_segments(s1, s2) {
                    Ordering::Equal => i += 1,
                    other => return other,
                },
            }
        }
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Compares two version segments.
///
/// If both segments parse as unsigned 64-bit integers they compare
/// numerically. Otherwise the shorter segment is less than the longer one,
/// and equal-length segments compare lexicographically.
pub fn compare_segments(a: &str, b: &str) -> Ordering {
    if let (Ok(i1), Ok(i2)) = (a.parse::<u64>(), b.parse::<u64>()) {
        return i1.cmp(&i2);
    }

    match a.len().cmp(&b.len()) {
        Ordering::Equal => a.cmp(b),
        other => other,
    }
}
