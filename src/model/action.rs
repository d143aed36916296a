// src/model/action.rs

//! Actions: the discriminated steps of a flow.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::command::CommandId;
use super::filesystem::FileId;
use super::flow::FlowId;
use super::package::PackageId;

/// An action to be taken as part of a flow.
///
/// The wire representation carries the discriminant in an `action` field.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action")]
pub enum Action {
    /// Starts another flow within the same deployment.
    #[serde(rename = "start-flow")]
    StartFlow { flow: FlowId },

    /// Downloads and verifies a package into the staging area.
    #[serde(rename = "prepare-package")]
    PreparePackage { package: PackageId },

    /// Invokes a command, scoped to a package when one is named and to the
    /// deployment otherwise.
    #[serde(rename = "invoke-command")]
    InvokeCommand {
        command: CommandId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        package: Option<PackageId>,
        /// Runs the command even when its declared app changes are already
        /// in effect.
        #[serde(default, skip_serializing_if = "std::ops::Not::not")]
        force: bool,
    },

    /// Copies a file resource to a destination file resource.
    #[serde(rename = "copy-file")]
    CopyFile {
        #[serde(rename = "source-file")]
        source_file: FileId,
        #[serde(rename = "destination-file")]
        destination_file: FileId,
    },

    /// Deletes a destination file resource.
    #[serde(rename = "delete-file")]
    DeleteFile {
        #[serde(rename = "destination-file")]
        destination_file: FileId,
    },
}

impl Action {
    pub fn action_type(&self) -> ActionType {
        match self {
            Action::StartFlow { .. } => ActionType::StartFlow,
            Action::PreparePackage { .. } => ActionType::PreparePackage,
            Action::InvokeCommand { .. } => ActionType::InvokeCommand,
            Action::CopyFile { .. } => ActionType::CopyFile,
            Action::DeleteFile { .. } => ActionType::DeleteFile,
        }
    }
}

/// The type of an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionType {
    #[serde(rename = "start-flow")]
    StartFlow,
    #[serde(rename = "prepare-package")]
    PreparePackage,
    #[serde(rename = "invoke-command")]
    InvokeCommand,
    #[serde(rename = "copy-file")]
    CopyFile,
    #[serde(rename = "delete-file")]
    DeleteFile,
}

impl ActionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionType::StartFlow => "start-flow",
            ActionType::PreparePackage => "prepare-package",
            ActionType::InvokeCommand => "invoke-command",
            ActionType::CopyFile => "copy-file",
            ActionType::DeleteFile => "delete-file",
        }
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
