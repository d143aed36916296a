// src/events/extraction.rs

//! Events emitted by the archive extraction engine.

use chrono::{DateTime, Duration, Local};

use super::{attr, Attr, Event, EventLevel, MessageBuilder};
use crate::model::{ActionType, DeploymentId, FlowId};
use crate::util::format::{format_duration, plural};

/// Aggregate statistics for an archive or an extracted file set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExtractionStats {
    pub files: u64,
    pub directories: u64,
    pub total_bytes: u64,
}

impl ExtractionStats {
    fn summary(&self) -> String {
        format!(
            "{} {} and {} {} totaling {} {}",
            self.files,
            plural(self.files as i64, "file", "files"),
            self.directories,
            plural(self.directories as i64, "directory", "directories"),
            self.total_bytes,
            plural(self.total_bytes as i64, "byte", "bytes"),
        )
    }
}

/// An archive extraction has started.
#[derive(Debug, Clone)]
pub struct ExtractionStarted {
    pub deployment: DeploymentId,
    pub flow: FlowId,
    pub action_index: usize,
    pub action_type: ActionType,
    pub source_path: String,
    pub destination_path: String,
    pub source_stats: ExtractionStats,
}

impl Event for ExtractionStarted {
    fn component(&self) -> &'static str {
        "extraction"
    }

    fn level(&self) -> EventLevel {
        EventLevel::Info
    }

    fn message(&self) -> String {
        let mut builder = MessageBuilder::new();
        builder
            .primary(&self.deployment)
            .primary(&self.flow)
            .primary(self.action_index + 1)
            .primary("extract-package")
            .standard(format!(
                "Extracting {} from \"{}\" to \"{}\".",
                self.source_stats.summary(),
                self.source_path,
                self.destination_path
            ));
        builder.build()
    }

    fn attrs(&self) -> Vec<Attr> {
        vec![
            attr("deployment", &self.deployment),
            attr("flow", &self.flow),
            attr("action.index", self.action_index),
            attr("action.type", self.action_type),
            attr("source.path", &self.source_path),
            attr("destination.path", &self.destination_path),
            attr("source.files", self.source_stats.files),
            attr("source.directories", self.source_stats.directories),
            attr("source.bytes", self.source_stats.total_bytes),
        ]
    }
}

/// A single archive entry has been extracted.
#[derive(Debug, Clone)]
pub struct ExtractedFile {
    pub deployment: DeploymentId,
    pub flow: FlowId,
    pub action_index: usize,
    pub action_type: ActionType,
    pub file_number: usize,
    pub path: String,
    pub file_size: u64,
    pub started: DateTime<Local>,
    pub stopped: DateTime<Local>,
    pub error: Option<String>,
}

impl Event for ExtractedFile {
    fn component(&self) -> &'static str {
        "extraction"
    }

    fn level(&self) -> EventLevel {
        if self.error.is_some() {
            EventLevel::Error
        } else {
            EventLevel::Debug
        }
    }

    fn message(&self) -> String {
        let mut builder = MessageBuilder::new();
        builder
            .primary(&self.deployment)
            .primary(&self.flow)
            .primary(self.action_index + 1)
            .primary("extract-package");
        match &self.error {
            Some(err) => builder.standard(format!(
                "Extraction of \"{}\" failed: {err}.",
                self.path
            )),
            None => builder.standard(format!("Extracted \"{}\".", self.path)),
        };
        builder.build()
    }

    fn attrs(&self) -> Vec<Attr> {
        let mut attrs = vec![
            attr("deployment", &self.deployment),
            attr("flow", &self.flow),
            attr("action.index", self.action_index),
            attr("action.type", self.action_type),
            attr("file.number", self.file_number),
            attr("file.path", &self.path),
            attr("file.size", self.file_size),
        ];
        if let Some(err) = &self.error {
            attrs.push(attr("error", err));
        }
        attrs
    }
}

/// An archive extraction has stopped.
#[derive(Debug, Clone)]
pub struct ExtractionStopped {
    pub deployment: DeploymentId,
    pub flow: FlowId,
    pub action_index: usize,
    pub action_type: ActionType,
    pub source_path: String,
    pub destination_path: String,
    pub source_stats: ExtractionStats,
    pub destination_stats: ExtractionStats,
    pub started: DateTime<Local>,
    pub stopped: DateTime<Local>,
    pub error: Option<String>,
}

impl ExtractionStopped {
    pub fn duration(&self) -> Duration {
        self.stopped.signed_duration_since(self.started)
    }
}

impl Event for ExtractionStopped {
    fn component(&self) -> &'static str {
        "extraction"
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
            .primary("extract-package");
        match &self.error {
            Some(err) => builder.standard(format!(
                "The extraction to \"{}\" failed after writing {}: {err}.",
                self.destination_path,
                self.destination_stats.summary()
            )),
            None => builder.standard(format!(
                "Extracted {} to \"{}\".",
                self.destination_stats.summary(),
                self.destination_path
            )),
        };
        builder.note(format_duration(self.duration()));
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
            attr("destination.files", self.destination_stats.files),
            attr("destination.directories", self.destination_stats.directories),
            attr("destination.bytes", self.destination_stats.total_bytes),
            attr("started", self.started.to_rfc3339()),
            attr("stopped", self.stopped.to_rfc3339()),
        ];
        if let Some(err) = &self.error {
            attrs.push(attr("error", err));
        }
        attrs
    }
}
