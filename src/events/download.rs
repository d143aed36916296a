// src/events/download.rs

//! Events emitted by the download pipeline.

use chrono::{DateTime, Duration, Local};
use std::fmt;

use super::{attr, Attr, Event, EventLevel, MessageBuilder};
use crate::model::{ActionType, DeploymentId, FlowId, PackageSource};
use crate::util::format::{bitrate_mbps, format_duration, plural};

/// A file download has started or resumed.
#[derive(Debug, Clone)]
pub struct DownloadStarted {
    pub deployment: DeploymentId,
    pub flow: FlowId,
    pub action_index: usize,
    pub action_type: ActionType,
    pub source: PackageSource,
    pub file_name: String,
    pub path: String,
    pub offset: u64,
}

impl Event for DownloadStarted {
    fn component(&self) -> &'static str {
        "download"
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
            .primary("download-package");
        if self.offset > 0 {
            builder.standard(format!(
                "Resuming download of \"{}\" from \"{}\" at offset {}.",
                self.file_name, self.source.url, self.offset
            ));
        } else {
            builder.standard(format!(
                "Starting download of \"{}\" from \"{}\".",
                self.file_name, self.source.url
            ));
        }
        builder.build()
    }

    fn attrs(&self) -> Vec<Attr> {
        vec![
            attr("deployment", &self.deployment),
            attr("flow", &self.flow),
            attr("action.index", self.action_index),
            attr("action.type", self.action_type),
            attr("source.type", self.source.source_type.as_str()),
            attr("source.url", &self.source.url),
            attr("path", &self.path),
            attr("offset", self.offset),
        ]
    }
}

/// A file download has stopped.
#[derive(Debug, Clone)]
pub struct DownloadStopped {
    pub deployment: DeploymentId,
    pub flow: FlowId,
    pub action_index: usize,
    pub action_type: ActionType,
    pub source: PackageSource,
    pub file_name: String,
    pub path: String,
    pub downloaded: u64,
    pub file_size: u64,
    pub started: DateTime<Local>,
    pub stopped: DateTime<Local>,
    pub error: Option<String>,
}

impl DownloadStopped {
    pub fn duration(&self) -> Duration {
        self.stopped.signed_duration_since(self.started)
    }

    pub fn bitrate_mbps(&self) -> String {
        bitrate_mbps(self.downloaded, self.duration())
    }
}

impl Event for DownloadStopped {
    fn component(&self) -> &'static str {
        "download"
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
            .primary("download-package");
        let duration = format_duration(self.duration());
        match &self.error {
            Some(err) if self.downloaded > 0 => {
                builder.standard(format!(
                    "The download of \"{}\" from \"{}\" failed after receiving {} {} over {} ({} mbps) due to an error: {}.",
                    self.file_name,
                    self.source.url,
                    self.downloaded,
                    plural(self.downloaded as i64, "byte", "bytes"),
                    duration,
                    self.bitrate_mbps(),
                    err
                ));
            }
            Some(err) => {
                builder.standard(format!(
                    "The download of \"{}\" from \"{}\" failed due to an error: {}.",
                    self.file_name, self.source.url, err
                ));
            }
            None => {
                builder.standard(format!(
                    "The download of \"{}\" from \"{}\" was completed in {} ({} mbps).",
                    self.file_name, self.source.url, duration, self.bitrate_mbps()
                ));
            }
        }
        builder.build()
    }

    fn attrs(&self) -> Vec<Attr> {
        let mut attrs = vec![
            attr("deployment", &self.deployment),
            attr("flow", &self.flow),
            attr("action.index", self.action_index),
            attr("action.type", self.action_type),
            attr("source.type", self.source.source_type.as_str()),
            attr("source.url", &self.source.url),
            attr("path", &self.path),
            attr("downloaded", self.downloaded),
            attr("file-size", self.file_size),
            attr("bitrate", self.bitrate_mbps()),
            attr("started", self.started.to_rfc3339()),
            attr("stopped", self.stopped.to_rfc3339()),
        ];
        if let Some(err) = &self.error {
            attrs.push(attr("error", err));
        }
        attrs
    }
}

/// The reason that a download was reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadResetReason {
    ExistingFileTooLarge,
    ExistingFileVerificationFailed,
    HttpServerDoesNotSupportResume,
    DownloadedFileVerificationFailed,
}

impl DownloadResetReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ExistingFileTooLarge => "existing-file-too-large",
            Self::ExistingFileVerificationFailed => "existing-file-verification-failed",
            Self::HttpServerDoesNotSupportResume => "http-server-does-not-support-resume",
            Self::DownloadedFileVerificationFailed => "downloaded-file-verification-failed",
        }
    }

    /// A prose description used in event messages.
    pub fn description(&self) -> &'static str {
        match self {
            Self::ExistingFileTooLarge => "the existing file is larger than expected",
            Self::ExistingFileVerificationFailed => {
                "the existing file did not pass verification"
            }
            Self::HttpServerDoesNotSupportResume => {
                "the HTTP server does not support resuming downloads"
            }
            Self::DownloadedFileVerificationFailed => {
                "the downloaded file did not pass verification"
            }
        }
    }
}

impl fmt::Display for DownloadResetReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Previously downloaded content was discarded, forcing the download to
/// start again from the beginning.
#[derive(Debug, Clone)]
pub struct DownloadReset {
    pub deployment: DeploymentId,
    pub flow: FlowId,
    pub action_index: usize,
    pub action_type: ActionType,
    pub source: PackageSource,
    pub file_name: String,
    pub path: String,
    pub reason: DownloadResetReason,
}

impl Event for DownloadReset {
    fn component(&self) -> &'static str {
        "download"
    }

    fn level(&self) -> EventLevel {
        if self.reason == DownloadResetReason::HttpServerDoesNotSupportResume {
            EventLevel::Warn
        } else {
            EventLevel::Error
        }
    }

    fn message(&self) -> String {
        let mut builder = MessageBuilder::new();
        builder
            .primary(&self.deployment)
            .primary(&self.flow)
            .primary(self.action_index + 1)
            .primary(self.action_type);
        if self.source.url.is_empty() {
            builder.standard(format!(
                "The downloaded content of \"{}\" was discarded because {}. The file will be redownloaded.",
                self.file_name,
                self.reason.description()
            ));
        } else {
            builder.standard(format!(
                "The downloaded content of \"{}\" from \"{}\" was discarded because {}. The file will be redownloaded.",
                self.file_name,
                self.source.url,
                self.reason.description()
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
            attr("path", &self.path),
            attr("reason", self.reason),
        ];
        if !self.source.url.is_empty() {
            attrs.push(attr("source.type", self.source.source_type.as_str()));
            attrs.push(attr("source.url", &self.source.url));
        }
        attrs
    }
}
