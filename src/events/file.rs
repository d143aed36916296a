// src/events/file.rs

//! Events emitted by the file engine and the download verifier.

use chrono::{DateTime, Duration, Local};

use super::{attr, Attr, Event, EventLevel, MessageBuilder};
use crate::model::{ActionType, DeploymentId, FileAttributes, FileId, FlowId, PackageSource};
use crate::util::format::{bitrate_mbps, format_duration};

/// The result of verifying a staged file against its expected attributes.
#[derive(Debug, Clone)]
pub struct FileVerification {
    pub deployment: DeploymentId,
    pub flow: FlowId,
    pub action_index: usize,
    pub action_type: ActionType,
    pub source: PackageSource,
    pub file_name: String,
    pub path: String,
    pub expected: FileAttributes,
    pub actual: FileAttributes,
}

impl Event for FileVerification {
    fn component(&self) -> &'static str {
        "verification"
    }

    fn level(&self) -> EventLevel {
        if self.expected.features().is_empty() {
            return EventLevel::Warn;
        }
        if self.expected != self.actual {
            return EventLevel::Error;
        }
        if self.expected.hashes.is_empty() {
            return EventLevel::Warn;
        }
        EventLevel::Info
    }

    fn message(&self) -> String {
        let mut builder = MessageBuilder::new();
        builder
            .primary(&self.deployment)
            .primary(&self.flow)
            .primary(self.action_index + 1)
            .primary("verify-file");
        if self.expected.features().is_empty() {
            builder.standard(format!(
                "The \"{}\" file could not be verified because file verification data was not provided.",
                self.file_name
            ));
        } else if self.expected != self.actual {
            builder.standard(format!(
                "The \"{}\" file does not have the expected file attributes and has failed verification.",
                self.file_name
            ));
        } else if self.expected.hashes.is_empty() {
            builder.standard(format!(
                "The \"{}\" file has the expected file size, but no file hashes were provided for verification.",
                self.file_name
            ));
        } else {
            builder.standard(format!(
                "The \"{}\" file was verified with the following features: {}.",
                self.file_name,
                self.actual.features().join(", ")
            ));
        }
        builder.build()
    }

    fn attrs(&self) -> Vec<Attr> {
        let mut attrs = vec![
            attr("deployment", &self.deployment),
            attr("flow", &self.flow),
            attr("action.index", self.action_index),
            attr("action.type", self.action_type),
        ];
        if !self.source.url.is_empty() {
            attrs.push(attr("source.type", self.source.source_type.as_str()));
            attrs.push(attr("source.url", &self.source.url));
        }
        if !self.path.is_empty() {
            attrs.push(attr("path", &self.path));
        }
        attrs.push(attr("expected.size", self.expected.size));
        attrs.push(attr(
            "expected.hashes",
            serde_json::to_string(&self.expected.hashes).unwrap_or_default(),
        ));
        attrs.push(attr("actual.size", self.actual.size));
        attrs.push(attr(
            "actual.hashes",
            serde_json::to_string(&self.actual.hashes).unwrap_or_default(),
        ));
        attrs
    }
}

/// A file copy has finished, successfully or otherwise.
#[derive(Debug, Clone)]
pub struct FileCopy {
    pub deployment: DeploymentId,
    pub flow: FlowId,
    pub action_index: usize,
    pub action_type: ActionType,
    pub source_id: FileId,
    pub source_path: String,
    pub destination_id: FileId,
    pub destination_path: String,
    pub destination_existed: bool,
    pub file_size: u64,
    pub started: DateTime<Local>,
    pub stopped: DateTime<Local>,
    pub error: Option<String>,
}

impl FileCopy {
    pub fn duration(&self) -> Duration {
        self.stopped.signed_duration_since(self.started)
    }
}

impl Event for FileCopy {
    fn component(&self) -> &'static str {
        "file"
    }

    fn level(&self) -> EventLevel {
        if self.error.is_some() {
            EventLevel::Error
        } else {
            EventLevel::Info
        }
    }

    fn message(&self) -> String {
        let mut builder = MessageBuilder::new();
        builder
            .primary(&self.deployment)
            .primary(&self.flow)
            .primary(self.action_index + 1)
            .primary(self.action_type);

        let from = if self.source_path.is_empty() {
            self.source_id.to_string()
        } else {
            format!("{} ({})", self.source_id, self.source_path)
        };
        let to = if self.destination_path.is_empty() {
            self.destination_id.to_string()
        } else {
            format!("{} ({})", self.destination_id, self.destination_path)
        };

        if let Some(err) = &self.error {
            builder.standard(format!(
                "The file copy from {from} to {to} failed due to an error: {err}."
            ));
        } else if self.destination_existed {
            builder.standard(format!(
                "The file copy from {from} to {to} was skipped because the destination already exists."
            ));
        } else {
            builder.standard(format!(
                "The file copy from {from} to {to} was completed in {} ({} mbps).",
                format_duration(self.duration()),
                bitrate_mbps(self.file_size, self.duration())
            ));
        }
        builder.build()
    }

    fn attrs(&self) -> Vec<Attr> {
        let mut attrs = vec![
            attr("deployment", &self.deployment),
            attr("flow", &self.flow),
            attr("action.index", self.action_index),
            attr("action.type", self.action_type),
            attr("source.path", &self.source_path),
            attr("destination.path", &self.destination_path),
            attr("destination.existed", self.destination_existed),
            attr("file-size", self.file_size),
        ];
        if let Some(err) = &self.error {
            attrs.push(attr("error", err));
        }
        attrs
    }
}

/// A file deletion has finished, successfully or otherwise.
#[derive(Debug, Clone)]
pub struct FileDelete {
    pub deployment: DeploymentId,
    pub flow: FlowId,
    pub action_index: usize,
    pub action_type: ActionType,
    pub file_id: FileId,
    pub file_path: String,
    pub file_size: u64,
    pub file_existed: bool,
    pub started: DateTime<Local>,
    pub stopped: DateTime<Local>,
    pub error: Option<String>,
}

impl Event for FileDelete {
    fn component(&self) -> &'static str {
        "file"
    }

    fn level(&self) -> EventLevel {
        if self.error.is_some() {
            EventLevel::Error
        } else {
            EventLevel::Info
        }
    }

    fn message(&self) -> String {
        let mut builder = MessageBuilder::new();
        builder
            .primary(&self.deployment)
            .primary(&self.flow)
            .primary(self.action_index + 1)
            .primary(self.action_type);

        let target = if self.file_path.is_empty() {
            self.file_id.to_string()
        } else {
            format!("{} ({})", self.file_id, self.file_path)
        };

        if let Some(err) = &self.error {
            builder.standard(format!(
                "The deletion of {target} failed due to an error: {err}."
            ));
        } else if self.file_existed {
            builder.standard(format!("The file {target} was deleted."));
        } else {
            builder.standard(format!(
                "The file {target} does not exist, so it was not deleted."
            ));
        }
        builder.build()
    }

    fn attrs(&self) -> Vec<Attr> {
        let mut attrs = vec![
            attr("deployment", &self.deployment),
            attr("flow", &self.flow),
            attr("action.index", self.action_index),
            attr("action.type", self.action_type),
            attr("file.path", &self.file_path),
            attr("file.size", self.file_size),
            attr("file.existed", self.file_existed),
        ];
        if let Some(err) = &self.error {
            attrs.push(attr("error", err));
        }
        attrs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::{HashType, HashValue, Hashes};

    fn attributes(size: u64, hash: Option<&str>) -> FileAttributes {
        let mut hashes = Hashes::new();
        if let Some(hash) = hash {
            hashes.insert(HashType::sha3_256(), HashValue::parse(hash).unwrap());
        }
        FileAttributes { size, hashes }
    }

    fn verification(expected: FileAttributes, actual: FileAttributes) -> FileVerification {
        FileVerification {
            deployment: "dep".into(),
            flow: "install".into(),
            action_index: 0,
            action_type: ActionType::PreparePackage,
            source: PackageSource::default(),
            file_name: "agent.zip".to_string(),
            path: String::new(),
            expected,
            actual,
        }
    }

    #[test]
    fn test_verification_levels() {
        // No verification data at all.
        let event = verification(attributes(0, None), attributes(0, None));
        assert_eq!(event.level(), EventLevel::Warn);

        // Mismatched attributes.
        let event = verification(attributes(10, Some("aabb")), attributes(10, Some("ccdd")));
        assert_eq!(event.level(), EventLevel::Error);

        // Size matches but no hashes were provided.
        let event = verification(attributes(10, None), attributes(10, None));
        assert_eq!(event.level(), EventLevel::Warn);

        // Full match.
        let event = verification(attributes(10, Some("aabb")), attributes(10, Some("aabb")));
        assert_eq!(event.level(), EventLevel::Info);
        assert!(event.message().contains("verified with the following features"));
    }

    #[test]
    fn test_file_delete_messages() {
        let now = Local::now();
        let mut event = FileDelete {
            deployment: "dep".into(),
            flow: "cleanup".into(),
            action_index: 1,
            action_type: ActionType::DeleteFile,
            file_id: "old-shortcut".into(),
            file_path: String::new(),
            file_size: 0,
            file_existed: false,
            started: now,
            stopped: now,
            error: None,
        };
        assert!(event.message().contains("does not exist"));
        event.file_existed = true;
        assert!(event.message().contains("was deleted"));
    }
}
