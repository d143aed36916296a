// src/lib.rs

//! LeafBridge Deploy
//!
//! A declarative software-deployment executor. A single deployment
//! document describes apps, conditions, resources, packages, commands
//! and named flows; invoking a flow evaluates its preconditions,
//! acquires named system-wide locks, then executes an ordered sequence
//! of actions: downloading and verifying packages, extracting archives,
//! running installer and uninstaller commands, copying and deleting
//! files, and starting nested flows.
//!
//! # Architecture
//!
//! - Model-first: the deployment document is parsed into typed maps of
//!   apps, conditions, commands, resources and flows, validated up front
//! - Engines: one engine per concern (flow, action, condition, app,
//!   package, download, extraction, command, file, lock)
//! - Events: every significant step emits a strongly-typed event through
//!   a multi-sink recorder
//! - Content-addressed staging: downloads land in directories keyed by
//!   package ID and primary hash, so interrupted work resumes safely
//! - Platform boundary: OS mutexes, the registry, process enumeration
//!   and known folders sit behind traits with a scriptable mock

pub mod engine;
pub mod error;
pub mod events;
pub mod fs;
pub mod hash;
pub mod http;
pub mod model;
pub mod msi;
pub mod platform;
pub mod util;
pub mod value;
pub mod version;

pub use engine::{AppEngine, ConditionEngine, DeploymentEngine, FileVerifier, Options};
pub use error::{ConditionError, Error, LockError, Result};
pub use events::{BasicHandler, Event, EventLevel, MultiHandler, Recorder, TracingHandler};
pub use hash::{HashType, HashValue, Hashes};
pub use model::Deployment;
pub use util::CancellationToken;
pub use value::{Comparison, Kind, Value};
pub use version::Version;

/// Loads and parses a deployment document from disk.
///
/// The file name must end in `deploy.json`.
pub fn load_deployment(path: &std::path::Path) -> Result<Deployment> {
    let display = path.display().to_string();
    if display.is_empty() {
        return Err(Error::InvalidConfiguration(
            "missing deployment configuration file path".to_string(),
        ));
    }
    if !display.ends_with("deploy.json") {
        return Err(Error::InvalidConfiguration(
            "the provided deployment file path must end in deploy.json".to_string(),
        ));
    }

    let data = std::fs::read(path)?;
    serde_json::from_slice(&data)
        .map_err(|err| Error::InvalidConfiguration(format!("failed to parse {display}: {err}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_deployment_requires_expected_file_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{}").unwrap();
        assert!(load_deployment(&path).is_err());
    }

    #[test]
    fn test_load_deployment_parses_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("deploy.json");
        std::fs::write(&path, r#"{"id": "contoso", "name": "Contoso"}"#).unwrap();

        let deployment = load_deployment(&path).unwrap();
        assert_eq!(deployment.id.as_str(), "contoso");
        assert!(deployment.validate().is_ok());
    }

    #[test]
    fn test_load_deployment_reports_parse_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("deploy.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(matches!(
            load_deployment(&path),
            Err(Error::InvalidConfiguration(_))
        ));
    }
}
