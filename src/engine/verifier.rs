// src/engine/verifier.rs

//! Streaming multi-hash file verification
//!
//! A [`FileVerifier`] absorbs file content as it is read or downloaded
//! and can report the observed attributes (size plus hashes) at any
//! point. Resetting the verifier discards all absorbed content, which
//! happens whenever a download is restarted.

use sha3::{Digest, Sha3_256};
use std::io::Read;

use crate::error::{Error, Result};
use crate::hash::{HashType, HashValue, Hashes};
use crate::model::FileAttributes;

/// The chunk size used when pulling data from a reader (256 KiB).
pub(crate) const CHUNK_SIZE: usize = 256 * 1024;

#[derive(Debug)]
enum HashState {
    Sha3_256(Sha3_256),
}

impl HashState {
    fn update(&mut self, data: &[u8]) {
        match self {
            HashState::Sha3_256(digest) => digest.update(data),
        }
    }

    fn reset(&mut self) {
        match self {
            HashState::Sha3_256(digest) => digest.reset(),
        }
    }

    fn value(&self) -> HashValue {
        match self {
            HashState::Sha3_256(digest) => HashValue::from_bytes(&digest.clone().finalize()),
        }
    }
}

/// Absorbs file content and produces file attributes for verification.
#[derive(Debug)]
pub struct FileVerifier {
    size: u64,
    hashes: Vec<(HashType, HashState)>,
}

impl FileVerifier {
    /// Creates a verifier producing the provided hash types.
    ///
    /// Returns an error if any of the hash types is not recognized.
    pub fn new(hash_types: &[HashType]) -> Result<Self> {
        let mut hashes = Vec::with_capacity(hash_types.len());
        for hash_type in hash_types {
            if hashes.iter().any(|(t, _)| t == hash_type) {
                continue;
            }
            match hash_type.as_str() {
                HashType::SHA3_256 => {
                    hashes.push((hash_type.clone(), HashState::Sha3_256(Sha3_256::new())));
                }
                other => {
                    return Err(Error::InvalidConfiguration(format!(
                        "unrecognized file hash type \"{other}\""
                    )))
                }
            }
        }
        Ok(FileVerifier { size: 0, hashes })
    }

    /// The number of bytes absorbed so far.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// The hash types the verifier is producing, in priority order.
    pub fn hash_types(&self) -> Vec<HashType> {
        let mut types: Vec<HashType> = self.hashes.iter().map(|(t, _)| t.clone()).collect();
        types.sort();
        types
    }

    /// Absorbs more file content.
    pub fn write(&mut self, data: &[u8]) {
        self.size += data.len() as u64;
        for (_, state) in &mut self.hashes {
            state.update(data);
        }
    }

    /// Reads from `reader` until end of stream, absorbing everything.
    ///
    /// Returns the number of bytes read.
    pub fn read_from(&mut self, reader: &mut dyn Read) -> Result<u64> {
        let mut buf = vec![0u8; CHUNK_SIZE];
        let mut total = 0u64;
        loop {
            let n = reader.read(&mut buf)?;
            if n == 0 {
                return Ok(total);
            }
            total += n as u64;
            self.write(&buf[..n]);
        }
    }

    /// Resets the verifier to its initial state.
    pub fn reset(&mut self) {
        self.size = 0;
        for (_, state) in &mut self.hashes {
            state.reset();
        }
    }

    /// Returns the attributes of the content absorbed so far.
    pub fn state(&self) -> FileAttributes {
        let hashes: Hashes = self
            .hashes
            .iter()
            .map(|(hash_type, state)| (hash_type.clone(), state.value()))
            .collect();
        FileAttributes {
            size: self.size,
            hashes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sha3_hex(data: &[u8]) -> String {
        HashValue::from_bytes(&Sha3_256::digest(data)).to_string()
    }

    #[test]
    fn test_unrecognized_hash_type_is_rejected() {
        let err = FileVerifier::new(&[HashType::from("md5")]).unwrap_err();
        assert!(err.to_string().contains("unrecognized file hash type"));
    }

    #[test]
    fn test_duplicate_types_collapse() {
        let verifier =
            FileVerifier::new(&[HashType::sha3_256(), HashType::sha3_256()]).unwrap();
        assert_eq!(verifier.hash_types(), vec![HashType::sha3_256()]);
    }

    #[test]
    fn test_incremental_writes_match_one_shot() {
        let mut verifier = FileVerifier::new(&[HashType::sha3_256()]).unwrap();
        verifier.write(b"hello, ");
        verifier.write(b"world");

        let state = verifier.state();
        assert_eq!(state.size, 12);
        let (_, value) = state.hashes.iter().next().unwrap();
        assert_eq!(value.to_string(), sha3_hex(b"hello, world"));
    }

    #[test]
    fn test_read_from_absorbs_everything() {
        let data = vec![7u8; CHUNK_SIZE + 123];
        let mut verifier = FileVerifier::new(&[HashType::sha3_256()]).unwrap();
        let read = verifier
            .read_from(&mut std::io::Cursor::new(data.clone()))
            .unwrap();
        assert_eq!(read, data.len() as u64);
        assert_eq!(verifier.size(), data.len() as u64);
    }

    #[test]
    fn test_reset_discards_state() {
        let mut verifier = FileVerifier::new(&[HashType::sha3_256()]).unwrap();
        verifier.write(b"discarded");
        verifier.reset();
        verifier.write(b"kept");

        let state = verifier.state();
        assert_eq!(state.size, 4);
        let (_, value) = state.hashes.iter().next().unwrap();
        assert_eq!(value.to_string(), sha3_hex(b"kept"));
    }

    #[test]
    fn test_state_can_be_taken_mid_stream() {
        let mut verifier = FileVerifier::new(&[HashType::sha3_256()]).unwrap();
        verifier.write(b"first");
        let first = verifier.state();
        verifier.write(b"second");
        let second = verifier.state();
        assert_eq!(first.size, 5);
        assert_eq!(second.size, 11);
        assert_ne!(first.hashes, second.hashes);
    }
}
