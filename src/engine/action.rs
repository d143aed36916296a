// src/engine/action.rs

//! The action dispatcher
//!
//! Brackets every action with started/stopped events and dispatches by
//! action type: nested flows recurse into the flow orchestrator,
//! package actions go to the package pipeline, command invocations are
//! gated on the app-change evaluation, and file actions go to the file
//! engine.

use super::app::AppEngine;
use super::command::CommandEngine;
use super::file::FileEngine;
use super::flow::FlowEngine;
use super::package::PackageEngine;
use super::state::EngineState;
use super::EngineContext;
use crate::error::{Error, Result};
use crate::events::{ActionStarted, ActionStopped, CommandSkipped};
use crate::model::{Action, Command, CommandId, FlowId, PackageId};

/// Executes a single action within a flow.
pub(crate) struct ActionEngine<'a, 'ctx> {
    pub ctx: &'a EngineContext<'ctx>,
    pub flow: &'a FlowId,
    pub index: usize,
    pub action: &'a Action,
}

impl ActionEngine<'_, '_> {
    pub fn invoke(&self, state: &mut EngineState) -> Result<()> {
        self.ctx.events.emit(ActionStarted {
            deployment: self.ctx.deployment.id.clone(),
            flow: self.flow.clone(),
            action_index: self.index,
            action_type: self.action.action_type(),
        });

        let started = chrono::Local::now();
        let result = self.dispatch(state);
        let stopped = chrono::Local::now();

        self.ctx.events.emit(ActionStopped {
            deployment: self.ctx.deployment.id.clone(),
            flow: self.flow.clone(),
            action_index: self.index,
            action_type: self.action.action_type(),
            started,
            stopped,
            error: result.as_ref().err().map(|err| err.to_string()),
        });

        result
    }

    fn dispatch(&self, state: &mut EngineState) -> Result<()> {
        match self.action {
            Action::StartFlow { flow } => self.start_flow(state, flow),
            Action::PreparePackage { package } => self.prepare_package(package),
            Action::InvokeCommand {
                command,
                package,
                force,
            } => self.invoke_command(state, command, package.as_ref(), *force),
            Action::CopyFile {
                source_file,
                destination_file,
            } => self.file_engine().copy_file(source_file, destination_file),
            Action::DeleteFile { destination_file } => {
                self.file_engine().delete_file(destination_file)
            }
        }
    }

    /// Starts another flow within the same deployment.
    fn start_flow(&self, state: &mut EngineState, flow: &FlowId) -> Result<()> {
        FlowEngine::new(self.ctx, flow)?.invoke(state)
    }

    /// Prepares a package by downloading and verifying it.
    fn prepare_package(&self, package: &PackageId) -> Result<()> {
        let definition = self.lookup_package(package)?;
        PackageEngine {
            ctx: self.ctx,
            flow: self.flow,
            action_index: self.index,
            action_type: self.action.action_type(),
            package_id: package,
            package: definition,
        }
        .prepare()
    }

    /// Invokes a command, scoped to a package when one is named and to
    /// the deployment otherwise.
    fn invoke_command(
        &self,
        state: &mut EngineState,
        command_id: &CommandId,
        package: Option<&PackageId>,
        force: bool,
    ) -> Result<()> {
        let (package_data, command) = self.lookup_command(command_id, package)?;

        // Determine whether any app changes are anticipated.
        let apps = AppEngine::new(self.ctx)
            .evaluate_app_changes(&command.installs, &command.uninstalls)
            .map_err(|err| {
                Error::AppChanges(format!(
                    "the evaluation of potential application changes did not succeed: {err}"
                ))
            })?;

        // A command whose declared installs and uninstalls are already in
        // effect is skipped, unless forced at the deployment or action
        // level.
        let declares_changes = !command.installs.is_empty() || !command.uninstalls.is_empty();
        if declares_changes && !apps.actions_needed() && !self.ctx.force && !force {
            self.ctx.events.emit(CommandSkipped {
                deployment: self.ctx.deployment.id.clone(),
                flow: self.flow.clone(),
                action_index: self.index,
                action_type: self.action.action_type(),
                package: package.cloned(),
                command: command_id.clone(),
                apps,
            });
            return Ok(());
        }

        match package_data {
            Some((package_id, definition)) => PackageEngine {
                ctx: self.ctx,
                flow: self.flow,
                action_index: self.index,
                action_type: self.action.action_type(),
                package_id,
                package: definition,
            }
            .invoke_command(state, command_id, command, apps),
            None => CommandEngine {
                ctx: self.ctx,
                flow: self.flow,
                action_index: self.index,
                action_type: self.action.action_type(),
                package: None,
                command_id,
                command,
                apps,
            }
            .invoke_standard(),
        }
    }

    fn lookup_package(&self, package: &PackageId) -> Result<&crate::model::Package> {
        self.ctx
            .deployment
            .resources
            .packages
            .get(package)
            .ok_or_else(|| {
                Error::Resolution(format!(
                    "the package \"{package}\" does not exist within the \"{}\" deployment",
                    self.ctx.deployment.id
                ))
            })
    }

    /// Resolves a command reference: package-scoped when a package is
    /// named, deployment-scoped otherwise.
    #[allow(clippy::type_complexity)]
    fn lookup_command(
        &self,
        command_id: &CommandId,
        package: Option<&PackageId>,
    ) -> Result<(
        Option<(&PackageId, &crate::model::Package)>,
        &Command,
    )> {
        match package {
            Some(package_id) => {
                let package_key = self
                    .ctx
                    .deployment
                    .resources
                    .packages
                    .get_key_value(package_id)
                    .ok_or_else(|| {
                        Error::Resolution(format!(
                            "the package \"{package_id}\" does not exist within the \"{}\" deployment",
                            self.ctx.deployment.id
                        ))
                    })?;
                let (package_id, definition) = package_key;
                let command = definition.commands.get(command_id).ok_or_else(|| {
                    Error::Resolution(format!(
                        "the command \"{command_id}\" does not exist within the \"{package_id}\" package"
                    ))
                })?;
                Ok((Some((package_id, definition)), command))
            }
            None => {
                let command = self.ctx.deployment.commands.get(command_id).ok_or_else(|| {
                    Error::Resolution(format!(
                        "the command \"{command_id}\" does not exist within the \"{}\" deployment",
                        self.ctx.deployment.id
                    ))
                })?;
                Ok((None, command))
            }
        }
    }

    fn file_engine(&self) -> FileEngine<'_, '_> {
        FileEngine {
            ctx: self.ctx,
            flow: self.flow,
            action_index: self.index,
            action_type: self.action.action_type(),
        }
    }
}
