// src/model/lock.rs

//! Lockable resources
//!
//! A lock pairs a mutex resource with guidance for what to tell the
//! operator when the lock cannot be acquired.

use serde::{Deserialize, Serialize};

use super::identifier;
use super::mutex::MutexId;

identifier! {
    /// A unique identifier for a lockable resource.
    LockId
}

/// A lockable resource used to prevent invocations from competing or
/// interfering with each other.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LockResource {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(skip_serializing_if = "MutexId::is_empty")]
    pub mutex: MutexId,
    #[serde(skip_serializing_if = "LockConflictRules::is_empty")]
    pub conflict: LockConflictRules,
}

/// Guidance for what to do when a conflict is encountered on a lockable
/// resource.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LockConflictRules {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub message: String,
}

impl LockConflictRules {
    pub fn is_empty(&self) -> bool {
        self.message.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lock_round_trip() {
        let lock: LockResource = serde_json::from_str(
            r#"{"mutex": "setup", "conflict": {"message": "already deploying"}}"#,
        )
        .unwrap();
        assert_eq!(lock.mutex.as_str(), "setup");
        assert_eq!(lock.conflict.message, "already deploying");
    }
}
