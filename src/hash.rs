// src/hash.rs

//! File hash types and values
//!
//! Package verification describes expected file content as a set of
//! cryptographic hashes keyed by hash type. Recognized hash types carry a
//! priority; the highest-priority hash present in a set is the *primary*
//! hash, which also keys content-addressed staging directories. The only
//! recognized type at present is SHA3-256.
//!
//! Hash values are validated lowercase hexadecimal strings, which is also
//! their wire format.

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::fmt::Write as _;

/// The type of cryptographic hash used for file verification.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HashType(String);

impl HashType {
    /// SHA3-256, the current primary hash type.
    pub const SHA3_256: &'static str = "sha3-256";

    pub fn sha3_256() -> Self {
        HashType(Self::SHA3_256.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns a priority for recognized hash types. Higher values are
    /// higher priority. Unrecognized hash types have a priority of zero.
    pub fn priority(&self) -> u32 {
        match self.0.as_str() {
            Self::SHA3_256 => 1,
            _ => 0,
        }
    }

    /// Returns true if the hash type is recognized.
    pub fn is_recognized(&self) -> bool {
        self.priority() > 0
    }
}

impl fmt::Display for HashType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for HashType {
    fn from(s: &str) -> Self {
        HashType(s.to_string())
    }
}

impl Ord for HashType {
    fn cmp(&self, other: &Self) -> Ordering {
        // Higher-priority types order first so that iteration over a hash
        // set yields the primary hash first.
        other
            .priority()
            .cmp(&self.priority())
            .then_with(|| self.0.cmp(&other.0))
    }
}

impl PartialOrd for HashType {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// A hash value held as a validated lowercase hexadecimal string.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct HashValue(String);

impl HashValue {
    /// Creates a hash value from a hexadecimal string.
    ///
    /// The string must have an even length and contain only hexadecimal
    /// digits. It is normalized to lowercase.
    pub fn parse(s: &str) -> Result<Self, HashValueError> {
        if s.len() % 2 != 0 {
            return Err(HashValueError::UnevenLength(s.len()));
        }
        if !s.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(HashValueError::InvalidHex(s.to_string()));
        }
        Ok(HashValue(s.to_ascii_lowercase()))
    }

    /// Creates a hash value from raw digest bytes.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let mut out = String::with_capacity(bytes.len() * 2);
        for b in bytes {
            let _ = write!(out, "{b:02x}");
        }
        HashValue(out)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for HashValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for HashValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        HashValue::parse(&s).map_err(de::Error::custom)
    }
}

/// Errors produced when parsing a hash value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HashValueError {
    UnevenLength(usize),
    InvalidHex(String),
}

impl fmt::Display for HashValueError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnevenLength(len) => {
                write!(f, "hash value has an uneven length of {len} characters")
            }
            Self::InvalidHex(s) => write!(f, "hash value contains invalid hex: {s}"),
        }
    }
}

impl std::error::Error for HashValueError {}

/// A hash type paired with its value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HashEntry {
    pub hash_type: Option<HashType>,
    pub value: HashValue,
}

impl HashEntry {
    /// Returns up to the first 16 hexadecimal characters of the value,
    /// used to key content-addressed directory names.
    pub fn short_value(&self) -> &str {
        let v = self.value.as_str();
        &v[..v.len().min(16)]
    }
}

/// A set of hash values keyed by hash type.
///
/// Iteration order follows hash type priority, so the first entry is the
/// primary hash.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Hashes(BTreeMap<HashType, HashValue>);

impl Hashes {
    pub fn new() -> Self {
        Hashes(BTreeMap::new())
    }

    pub fn insert(&mut self, hash_type: HashType, value: HashValue) {
        self.0.insert(hash_type, value);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns the hash types present in the set, in priority order.
    pub fn types(&self) -> Vec<HashType> {
        self.0.keys().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&HashType, &HashValue)> {
        self.0.iter()
    }

    /// Returns the primary hash entry, which is the highest-priority hash
    /// present. An empty set yields a zeroed entry.
    pub fn primary(&self) -> HashEntry {
        match self.0.iter().next() {
            Some((hash_type, value)) => HashEntry {
                hash_type: Some(hash_type.clone()),
                value: value.clone(),
            },
            None => HashEntry::default(),
        }
    }
}

impl FromIterator<(HashType, HashValue)> for Hashes {
    fn from_iter<T: IntoIterator<Item = (HashType, HashValue)>>(iter: T) -> Self {
        Hashes(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_value_parse_normalizes_case() {
        let value = HashValue::parse("ABCDEF01").unwrap();
        assert_eq!(value.as_str(), "abcdef01");
    }

    #[test]
    fn test_hash_value_parse_rejects_bad_input() {
        assert!(matches!(
            HashValue::parse("abc"),
            Err(HashValueError::UnevenLength(3))
        ));
        assert!(matches!(
            HashValue::parse("zzzz"),
            Err(HashValueError::InvalidHex(_))
        ));
    }

    #[test]
    fn test_hash_value_from_bytes() {
        let value = HashValue::from_bytes(&[0x00, 0xff, 0x10]);
        assert_eq!(value.as_str(), "00ff10");
    }

    #[test]
    fn test_recognized_types_order_before_unrecognized() {
        let mut hashes = Hashes::new();
        hashes.insert(HashType::from("aaaa"), HashValue::parse("00").unwrap());
        hashes.insert(HashType::sha3_256(), HashValue::parse("ff").unwrap());

        let types = hashes.types();
        assert_eq!(types[0], HashType::sha3_256());
        assert_eq!(types[1], HashType::from("aaaa"));
    }

    #[test]
    fn test_primary_hash() {
        let mut hashes = Hashes::new();
        hashes.insert(
            HashType::sha3_256(),
            HashValue::parse("0123456789abcdef0123456789abcdef").unwrap(),
        );
        let primary = hashes.primary();
        assert_eq!(primary.hash_type, Some(HashType::sha3_256()));
        assert_eq!(primary.short_value(), "0123456789abcdef");
    }

    #[test]
    fn test_primary_of_empty_set_is_zeroed() {
        let primary = Hashes::new().primary();
        assert!(primary.hash_type.is_none());
        assert_eq!(primary.short_value(), "");
    }

    #[test]
    fn test_hashes_serde_round_trip() {
        let json = "{\"sha3-256\":\"00ff\"}";
        let hashes: Hashes = serde_json::from_str(json).unwrap();
        assert_eq!(hashes.len(), 1);
        assert_eq!(serde_json::to_string(&hashes).unwrap(), json);
    }

    #[test]
    fn test_hashes_deserialize_rejects_invalid_hex() {
        let result: Result<Hashes, _> = serde_json::from_str("{\"sha3-256\":\"xyz\"}");
        assert!(result.is_err());
    }
}
