// src/events/command.rs

//! Events emitted by the command engine.

use chrono::{DateTime, Duration, Local};

use super::{attr, Attr, Event, EventLevel, MessageBuilder};
use crate::model::{
    ActionType, AppEvaluation, AppSummary, CommandId, CommandResult, DeploymentId, DirectoryId,
    FlowId, PackageId,
};
use crate::util::format::format_duration;

fn command_scope(package: &Option<PackageId>, command: &CommandId) -> String {
    match package {
        Some(package) => format!("{package}.{command}"),
        None => command.to_string(),
    }
}

/// A command was skipped because its declared application changes are
/// already in effect.
#[derive(Debug, Clone)]
pub struct CommandSkipped {
    pub deployment: DeploymentId,
    pub flow: FlowId,
    pub action_index: usize,
    pub action_type: ActionType,
    pub package: Option<PackageId>,
    pub command: CommandId,
    pub apps: AppEvaluation,
}

impl Event for CommandSkipped {
    fn component(&self) -> &'static str {
        "command"
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
            .primary(self.action_type)
            .primary(command_scope(&self.package, &self.command))
            .standard("Skipped command");
        if !self.apps.already_installed.is_empty() {
            builder.labeled_note(
                "already installed",
                format!("[{}]", self.apps.already_installed),
            );
        }
        if !self.apps.already_uninstalled.is_empty() {
            builder.labeled_note(
                "already uninstalled",
                format!("[{}]", self.apps.already_uninstalled),
            );
        }
        builder.build()
    }

    fn attrs(&self) -> Vec<Attr> {
        let mut attrs = vec![
            attr("deployment", &self.deployment),
            attr("flow", &self.flow),
            attr("action.index", self.action_index),
            attr("action.type", self.action_type),
            attr("command", &self.command),
        ];
        if let Some(package) = &self.package {
            attrs.push(attr("package", package));
        }
        if !self.apps.is_zero() {
            attrs.push(attr(
                "affected-apps.already-installed",
                &self.apps.already_installed,
            ));
            attrs.push(attr(
                "affected-apps.already-uninstalled",
                &self.apps.already_uninstalled,
            ));
            attrs.push(attr("affected-apps.to-install", &self.apps.to_install));
            attrs.push(attr("affected-apps.to-uninstall", &self.apps.to_uninstall));
        }
        attrs
    }
}

/// A command has started.
#[derive(Debug, Clone)]
pub struct CommandStarted {
    pub deployment: DeploymentId,
    pub flow: FlowId,
    pub action_index: usize,
    pub action_type: ActionType,
    pub package: Option<PackageId>,
    pub command: CommandId,
    pub command_line: String,
    pub working_directory: Option<DirectoryId>,
    pub working_directory_path: String,
    pub apps: AppEvaluation,
}

impl Event for CommandStarted {
    fn component(&self) -> &'static str {
        "command"
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
            .primary(self.action_type)
            .primary(command_scope(&self.package, &self.command));
        let installs = self.apps.to_install.len();
        let uninstalls = self.apps.to_uninstall.len();
        match (installs > 0, uninstalls > 0) {
            (true, true) => builder.primary(format!(
                "Starting command to install {} and uninstall {}",
                self.apps.to_install, self.apps.to_uninstall
            )),
            (true, false) => builder.primary(format!(
                "Starting command to install {}",
                self.apps.to_install
            )),
            (false, true) => builder.primary(format!(
                "Starting command to uninstall {}",
                self.apps.to_uninstall
            )),
            (false, false) => builder.primary("Starting command"),
        };
        builder.standard(&self.command_line);
        builder.build()
    }

    fn attrs(&self) -> Vec<Attr> {
        let mut attrs = vec![
            attr("deployment", &self.deployment),
            attr("flow", &self.flow),
            attr("action.index", self.action_index),
            attr("action.type", self.action_type),
            attr("command", &self.command),
            attr("command-line", &self.command_line),
        ];
        if let Some(package) = &self.package {
            attrs.push(attr("package", package));
        }
        if let Some(dir) = &self.working_directory {
            attrs.push(attr("working-directory.id", dir));
        }
        if !self.working_directory_path.is_empty() {
            attrs.push(attr("working-directory.path", &self.working_directory_path));
        }
        attrs
    }
}

/// A command has stopped.
#[derive(Debug, Clone)]
pub struct CommandStopped {
    pub deployment: DeploymentId,
    pub flow: FlowId,
    pub action_index: usize,
    pub action_type: ActionType,
    pub package: Option<PackageId>,
    pub command: CommandId,
    pub command_line: String,
    pub result: CommandResult,
    pub output: String,
    pub working_directory: Option<DirectoryId>,
    pub working_directory_path: String,
    pub apps_before: AppEvaluation,
    pub apps_after: AppSummary,
    pub started: DateTime<Local>,
    pub stopped: DateTime<Local>,
    pub error: Option<String>,
}

impl CommandStopped {
    pub fn duration(&self) -> Duration {
        self.stopped.signed_duration_since(self.started)
    }
}

impl Event for CommandStopped {
    fn component(&self) -> &'static str {
        "command"
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
            .primary(self.action_type)
            .primary(command_scope(&self.package, &self.command));
        match &self.error {
            Some(err) => builder.standard(format!("The command failed: {err}.")),
            None => builder.standard(format!("The command completed: {}.", self.result)),
        };
        if !self.apps_after.installed.is_empty() {
            builder.labeled_note("installed", format!("[{}]", self.apps_after.installed));
        }
        if !self.apps_after.uninstalled.is_empty() {
            builder.labeled_note("uninstalled", format!("[{}]", self.apps_after.uninstalled));
        }
        builder.note(format_duration(self.duration()));
        builder.build()
    }

    fn details(&self) -> String {
        self.output.clone()
    }

    fn attrs(&self) -> Vec<Attr> {
        let mut attrs = vec![
            attr("deployment", &self.deployment),
            attr("flow", &self.flow),
            attr("action.index", self.action_index),
            attr("action.type", self.action_type),
            attr("command", &self.command),
            attr("command-line", &self.command_line),
            attr("exit-code", self.result.exit_code),
            attr("started", self.started.to_rfc3339()),
            attr("stopped", self.stopped.to_rfc3339()),
        ];
        if let Some(package) = &self.package {
            attrs.push(attr("package", package));
        }
        if !self.working_directory_path.is_empty() {
            attrs.push(attr("working-directory.path", &self.working_directory_path));
        }
        if !self.apps_after.is_zero() {
            attrs.push(attr("apps.installed", &self.apps_after.installed));
            attrs.push(attr("apps.uninstalled", &self.apps_after.uninstalled));
            attrs.push(attr(
                "apps.still-not-installed",
                &self.apps_after.still_not_installed,
            ));
            attrs.push(attr(
                "apps.still-not-uninstalled",
                &self.apps_after.still_not_uninstalled,
            ));
        }
        if let Some(err) = &self.error {
            attrs.push(attr("error", err));
        }
        attrs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::AppId;

    #[test]
    fn test_skipped_message_lists_installed_apps() {
        let event = CommandSkipped {
            deployment: "dep".into(),
            flow: "install".into(),
            action_index: 2,
            action_type: ActionType::InvokeCommand,
            package: Some("agent".into()),
            command: "install".into(),
            apps: AppEvaluation {
                already_installed: vec![AppId::from("agent-app")].into(),
                ..AppEvaluation::default()
            },
        };
        let message = event.message();
        assert!(message.contains("agent.install"));
        assert!(message.contains("Skipped command"));
        assert!(message.contains("already installed: [agent-app]"));
    }

    #[test]
    fn test_stopped_level_follows_error() {
        let started = Local::now();
        let mut event = CommandStopped {
            deployment: "dep".into(),
            flow: "install".into(),
            action_index: 0,
            action_type: ActionType::InvokeCommand,
            package: None,
            command: "install".into(),
            command_line: "setup.exe /quiet".to_string(),
            result: CommandResult::default(),
            output: String::new(),
            working_directory: None,
            working_directory_path: String::new(),
            apps_before: AppEvaluation::default(),
            apps_after: AppSummary::default(),
            started,
            stopped: started + Duration::seconds(1),
            error: None,
        };
        assert_eq!(event.level(), EventLevel::Info);
        event.error = Some("exit status 1603".to_string());
        assert_eq!(event.level(), EventLevel::Error);
    }

    #[test]
    fn test_stopped_details_carry_output() {
        let started = Local::now();
        let event = CommandStopped {
            deployment: "dep".into(),
            flow: "install".into(),
            action_index: 0,
            action_type: ActionType::InvokeCommand,
            package: None,
            command: "install".into(),
            command_line: String::new(),
            result: CommandResult::default(),
            output: "line one\nline two".to_string(),
            working_directory: None,
            working_directory_path: String::new(),
            apps_before: AppEvaluation::default(),
            apps_after: AppSummary::default(),
            started,
            stopped: started,
            error: None,
        };
        assert_eq!(event.details(), "line one\nline two");
    }
}
