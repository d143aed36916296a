// src/model/mutex.rs

//! System-wide mutex resources
//!
//! Mutexes are named OS objects that conditions can probe for existence
//! and that locks take exclusive ownership of. The namespace controls how
//! the configured name maps onto an OS object name.

use serde::{Deserialize, Serialize};

use super::identifier;
use crate::error::{Error, Result};

identifier! {
    /// A unique identifier for a mutex resource.
    MutexId
}

/// The namespace within which a mutex exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MutexNamespace {
    /// The deployment system's own prefix within the global namespace.
    #[serde(rename = "leafbridge")]
    LeafBridge,
    /// The machine-wide global namespace.
    #[serde(rename = "global")]
    Global,
    /// The current logon session's namespace.
    #[serde(rename = "session")]
    Session,
}

/// A system-wide mutex that can be evaluated by conditions or used by
/// locks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MutexResource {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    pub name: String,
    pub namespace: MutexNamespace,
}

impl MutexResource {
    /// Composes the OS object name for the mutex from its configured name
    /// and namespace.
    pub fn object_name(&self) -> Result<String> {
        if self.name.is_empty() {
            return Err(Error::InvalidConfiguration(
                "the mutex does not have a name".to_string(),
            ));
        }
        Ok(match self.namespace {
            MutexNamespace::LeafBridge => {
                format!("Global\\LeafBridge-Deployment-{}", self.name)
            }
            MutexNamespace::Global => format!("Global\\{}", self.name),
            MutexNamespace::Session => format!("Session\\{}", self.name),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mutex(name: &str, namespace: MutexNamespace) -> MutexResource {
        MutexResource {
            description: String::new(),
            name: name.to_string(),
            namespace,
        }
    }

    #[test]
    fn test_object_name_by_namespace() {
        assert_eq!(
            mutex("Setup", MutexNamespace::LeafBridge)
                .object_name()
                .unwrap(),
            "Global\\LeafBridge-Deployment-Setup"
        );
        assert_eq!(
            mutex("Setup", MutexNamespace::Global).object_name().unwrap(),
            "Global\\Setup"
        );
        assert_eq!(
            mutex("Setup", MutexNamespace::Session)
                .object_name()
                .unwrap(),
            "Session\\Setup"
        );
    }

    #[test]
    fn test_object_name_requires_name() {
        assert!(mutex("", MutexNamespace::Global).object_name().is_err());
    }

    #[test]
    fn test_namespace_wire_names() {
        let m: MutexResource =
            serde_json::from_str(r#"{"name": "X", "namespace": "leafbridge"}"#).unwrap();
        assert_eq!(m.namespace, MutexNamespace::LeafBridge);
    }
}
