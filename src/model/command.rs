// src/model/command.rs

//! Commands: installer and uninstaller invocations
//!
//! A command names an executable to run (a file resource for standalone
//! commands, or a file within an archive package), the applications it is
//! expected to install or uninstall, and a map interpreting the exit
//! codes it may return.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use super::app::AppList;
use super::filesystem::DirectoryId;
use super::identifier;

identifier! {
    /// A unique identifier for a command.
    CommandId
}

/// The type of a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommandType {
    /// Run the executable directly.
    #[serde(rename = "exe")]
    Exe,
    #[serde(rename = "msi-install")]
    MsiInstall,
    #[serde(rename = "msi-update")]
    MsiUpdate,
    #[serde(rename = "msi-uninstall")]
    MsiUninstall,
    /// Uninstall via the product code of the targeted application, without
    /// requiring any package file.
    #[serde(rename = "msi-uninstall-product-code")]
    MsiUninstallProductCode,
}

impl CommandType {
    /// Returns true for command types that run through the OS installer
    /// utility.
    pub fn is_msi(&self) -> bool {
        matches!(
            self,
            CommandType::MsiInstall
                | CommandType::MsiUpdate
                | CommandType::MsiUninstall
                | CommandType::MsiUninstallProductCode
        )
    }

    /// Returns true for command types that operate on an application
    /// rather than a package file.
    pub fn is_app_based(&self) -> bool {
        matches!(self, CommandType::MsiUninstallProductCode)
    }

    /// Returns true for uninstall variants, which tolerate the installer
    /// reporting an unknown product.
    pub fn is_msi_uninstall(&self) -> bool {
        matches!(
            self,
            CommandType::MsiUninstall | CommandType::MsiUninstallProductCode
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CommandType::Exe => "exe",
            CommandType::MsiInstall => "msi-install",
            CommandType::MsiUpdate => "msi-update",
            CommandType::MsiUninstall => "msi-uninstall",
            CommandType::MsiUninstallProductCode => "msi-uninstall-product-code",
        }
    }
}

impl fmt::Display for CommandType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A command that can be invoked for a deployment or package.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Command {
    /// Applications this command installs.
    #[serde(skip_serializing_if = "AppList::is_empty")]
    pub installs: AppList,
    /// Applications this command uninstalls.
    #[serde(skip_serializing_if = "AppList::is_empty")]
    pub uninstalls: AppList,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub command_type: Option<CommandType>,
    #[serde(rename = "working-directory", skip_serializing_if = "Option::is_none")]
    pub working_directory: Option<DirectoryId>,
    /// A file resource ID for standalone commands, or a package file ID
    /// for commands on archive packages.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub executable: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,
    #[serde(rename = "exit-codes", skip_serializing_if = "BTreeMap::is_empty")]
    pub exit_codes: BTreeMap<i32, ExitCodeInfo>,
}

impl Command {
    /// Returns true for commands that run through the OS installer
    /// utility.
    pub fn is_msi(&self) -> bool {
        self.command_type.map(|t| t.is_msi()).unwrap_or(false)
    }
}

/// Information interpreting one exit code of a command.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExitCodeInfo {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,
    /// When true, the exit code is treated as success.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub ok: bool,
}

/// The interpreted result of a completed command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandResult {
    pub exit_code: i32,
    pub info: Option<ExitCodeInfo>,
}

impl fmt::Display for CommandResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.info {
            Some(info) if !info.name.is_empty() => {
                write!(f, "exit status {} ({})", self.exit_code, info.name)
            }
            _ => write!(f, "exit status {}", self.exit_code),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_type_classification() {
        assert!(!CommandType::Exe.is_msi());
        assert!(CommandType::MsiInstall.is_msi());
        assert!(CommandType::MsiUninstallProductCode.is_app_based());
        assert!(!CommandType::MsiUninstall.is_app_based());
        assert!(CommandType::MsiUninstall.is_msi_uninstall());
        assert!(!CommandType::MsiInstall.is_msi_uninstall());
    }

    #[test]
    fn test_command_round_trip() {
        let command: Command = serde_json::from_str(
            r#"{
                "installs": ["agent"],
                "type": "msi-install",
                "working-directory": "agent-dir",
                "executable": "agent-msi",
                "args": ["REBOOT=ReallySuppress"],
                "exit-codes": {
                    "8": {"name": "partial", "description": "partial install", "ok": true}
                }
            }"#,
        )
        .unwrap();
        assert_eq!(command.command_type, Some(CommandType::MsiInstall));
        assert_eq!(command.installs.len(), 1);
        assert!(command.exit_codes.get(&8).unwrap().ok);

        let encoded = serde_json::to_string(&command).unwrap();
        let decoded: Command = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded.exit_codes, command.exit_codes);
    }

    #[test]
    fn test_command_result_display() {
        let result = CommandResult {
            exit_code: 1603,
            info: Some(ExitCodeInfo {
                name: "ERROR_INSTALL_FAILURE".to_string(),
                description: String::new(),
                ok: false,
            }),
        };
        assert_eq!(result.to_string(), "exit status 1603 (ERROR_INSTALL_FAILURE)");
        assert_eq!(CommandResult::default().to_string(), "exit status 0");
    }
}
