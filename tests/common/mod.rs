// tests/common/mod.rs

//! Shared fixtures for integration tests: a simulated host, an event
//! collector, and builders for deployments, package content and zip
//! archives.

#![allow(dead_code)]

use std::io::Write;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use tempfile::TempDir;

use leafbridge_deploy::engine::{DeploymentEngine, FileVerifier, Options};
use leafbridge_deploy::error::Result;
use leafbridge_deploy::events::{DeployEvent, Handler, Record, Recorder};
use leafbridge_deploy::hash::HashType;
use leafbridge_deploy::http::MockHttpClient;
use leafbridge_deploy::model::{
    Deployment, DeploymentId, FileAttributes, KnownFolder, Package, PackageFormat, PackageId,
    PackageSource, PackageSourceType, PackageType,
};
use leafbridge_deploy::platform::MockPlatform;
use leafbridge_deploy::util::CancellationToken;

/// An event handler that retains every record for later assertions.
#[derive(Clone, Default)]
pub struct EventLog {
    records: Arc<Mutex<Vec<Record>>>,
}

impl Handler for EventLog {
    fn name(&self) -> &'static str {
        "collecting"
    }

    fn handle(&self, record: &Record) -> Result<()> {
        self.records.lock().unwrap().push(record.clone());
        Ok(())
    }
}

impl EventLog {
    pub fn recorder(&self) -> Recorder {
        Recorder::new(self.clone())
    }

    pub fn events(&self) -> Vec<DeployEvent> {
        self.records
            .lock()
            .unwrap()
            .iter()
            .map(|record| record.event.clone())
            .collect()
    }

    pub fn count<F: Fn(&DeployEvent) -> bool>(&self, predicate: F) -> usize {
        self.events().iter().filter(|event| predicate(event)).count()
    }
}

/// A simulated host: mock platform, mock HTTP, collected events and a
/// temporary program-data folder wired up as the staging root.
pub struct TestHost {
    pub platform: MockPlatform,
    pub http: MockHttpClient,
    pub log: EventLog,
    pub cancel: CancellationToken,
    pub program_data: TempDir,
}

impl TestHost {
    pub fn new() -> Self {
        let program_data = tempfile::tempdir().unwrap();
        let platform = MockPlatform::new();
        platform.set_known_folder(KnownFolder::ProgramData, program_data.path());
        TestHost {
            platform,
            http: MockHttpClient::new(),
            log: EventLog::default(),
            cancel: CancellationToken::new(),
            program_data,
        }
    }

    pub fn engine(&self, deployment: Deployment) -> DeploymentEngine {
        self.engine_with_force(deployment, false)
    }

    pub fn engine_with_force(&self, deployment: Deployment, force: bool) -> DeploymentEngine {
        DeploymentEngine::new(
            deployment,
            Options {
                events: self.log.recorder(),
                force,
                platform: Arc::new(self.platform.clone()),
                http: Arc::new(self.http.clone()),
                cancel: self.cancel.clone(),
            },
        )
    }

    /// The staging path for a package file, mirroring the
    /// content-addressed layout.
    pub fn staging_file_path(
        &self,
        deployment: &DeploymentId,
        package_id: &PackageId,
        package: &Package,
    ) -> PathBuf {
        self.program_data
            .path()
            .join("LeafBridge")
            .join("Deploy")
            .join(deployment.as_str())
            .join(package.content(package_id).dir_name())
            .join(package.file_name())
    }

    /// Pre-populates the staging file for a package with the given bytes.
    pub fn stage_package_bytes(
        &self,
        deployment: &DeploymentId,
        package_id: &PackageId,
        package: &Package,
        bytes: &[u8],
    ) {
        let path = self.staging_file_path(deployment, package_id, package);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, bytes).unwrap();
    }
}

/// Computes the attributes (size and SHA3-256 hash) of the given bytes.
pub fn attributes_of(data: &[u8]) -> FileAttributes {
    let mut verifier = FileVerifier::new(&[HashType::sha3_256()]).unwrap();
    verifier.write(data);
    verifier.state()
}

/// Builds an archive package definition with a single HTTP source.
pub fn archive_package(name: &str, url: &str, content: &[u8]) -> Package {
    Package {
        name: name.to_string(),
        package_type: PackageType::archive(),
        format: PackageFormat::zip(),
        sources: vec![PackageSource {
            source_type: PackageSourceType::http(),
            url: url.to_string(),
        }],
        attributes: attributes_of(content),
        ..Package::default()
    }
}

/// Builds an in-memory zip archive from (path, content) pairs. Paths
/// ending in a slash become directory entries.
pub fn build_zip(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
    let options =
        zip::write::FileOptions::default().compression_method(zip::CompressionMethod::Deflated);
    for (path, content) in entries {
        if path.ends_with('/') {
            writer.add_directory(path.trim_end_matches('/'), options).unwrap();
        } else {
            writer.start_file(*path, options).unwrap();
            writer.write_all(content).unwrap();
        }
    }
    writer.finish().unwrap().into_inner()
}
