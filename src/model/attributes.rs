// src/model/attributes.rs

//! Expected file attributes for package verification.

use serde::{Deserialize, Serialize};

use crate::hash::Hashes;

/// The size and cryptographic hashes expected of a file.
///
/// Two attribute sets are equal when their sizes match and their hash
/// maps are element-wise equal.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileAttributes {
    pub size: u64,
    #[serde(skip_serializing_if = "Hashes::is_empty")]
    pub hashes: Hashes,
}

impl FileAttributes {
    /// Returns the features present in the attributes, used in
    /// verification event messages.
    pub fn features(&self) -> Vec<String> {
        let mut features = Vec::new();
        if self.size > 0 {
            features.push("file size".to_string());
        }
        for (hash_type, _) in self.hashes.iter() {
            features.push(hash_type.to_string());
        }
        features
    }

    /// Returns an error if the attributes reference unrecognized hash
    /// types or empty hash values.
    pub fn validate(&self) -> Result<(), String> {
        for (hash_type, value) in self.hashes.iter() {
            if !hash_type.is_recognized() {
                return Err(format!(
                    "the file hash type \"{hash_type}\" is not recognized"
                ));
            }
            if value.is_empty() {
                return Err(format!("the file hash value for \"{hash_type}\" is missing"));
            }
        }
        Ok(())
    }
}
