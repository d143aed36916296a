// src/engine/package.rs

//! The package pipeline
//!
//! Prepares packages in the content-addressed staging area and routes
//! command invocations to the appropriate variant: app-based commands
//! never touch the package file, archive packages download and extract
//! once per invocation, and standalone packages download and verify once
//! per invocation. Verified and extracted content is cached in the
//! engine state so later flows reuse it.

use super::command::CommandEngine;
use super::download::DownloadEngine;
use super::extraction::ExtractionEngine;
use super::state::EngineState;
use super::EngineContext;
use crate::error::{Error, Result};
use crate::fs::staging::{self, PackageDir, PackageFile};
use crate::fs::temp;
use crate::model::{
    ActionType, AppEvaluation, Command, CommandId, CommandType, FlowId, Package, PackageId,
};

/// Manages package-related actions.
pub(crate) struct PackageEngine<'a, 'ctx> {
    pub ctx: &'a EngineContext<'ctx>,
    pub flow: &'a FlowId,
    pub action_index: usize,
    pub action_type: ActionType,
    pub package_id: &'a PackageId,
    pub package: &'a Package,
}

impl<'a, 'ctx> PackageEngine<'a, 'ctx> {
    /// Downloads and verifies the package file.
    ///
    /// A file that already holds the expected content is not downloaded
    /// again; a partial file resumes from where it stopped.
    pub fn prepare(&self) -> Result<()> {
        let mut file = self.open_package_file()?;
        self.download_engine()
            .download_and_verify(self.package_id, self.package, &mut file)
    }

    /// Invokes a package-scoped command, classifying it by command and
    /// package type.
    pub fn invoke_command(
        &self,
        state: &mut EngineState,
        command_id: &CommandId,
        command: &Command,
        apps: AppEvaluation,
    ) -> Result<()> {
        // App-based commands do not require the package file at all.
        if command
            .command_type
            .map(|t| t.is_app_based())
            .unwrap_or(false)
        {
            return self.invoke_app_command(command_id, command, apps);
        }

        if self.package.package_type.is_archive() {
            return self.invoke_archive_command(state, command_id, command, apps);
        }

        self.invoke_package_command(state, command_id, command, apps)
    }

    /// Runs an app-based command for each application it uninstalls.
    fn invoke_app_command(
        &self,
        command_id: &CommandId,
        command: &Command,
        apps: AppEvaluation,
    ) -> Result<()> {
        match command.command_type {
            Some(CommandType::MsiUninstallProductCode) => {
                let targets = apps.to_uninstall.clone();
                let engine = self.command_engine(command_id, command, apps);
                for app in &targets {
                    engine.invoke_app(app)?;
                }
                Ok(())
            }
            _ => Err(Error::Command(format!(
                "the \"{command_id}\" command type is not recognized or is not suitable for app-based invocation"
            ))),
        }
    }

    /// Runs a command on an archive package, downloading and extracting
    /// it first unless this invocation already has.
    fn invoke_archive_command(
        &self,
        state: &mut EngineState,
        command_id: &CommandId,
        command: &Command,
        apps: AppEvaluation,
    ) -> Result<()> {
        if !state.extracted_packages.contains_key(self.package_id) {
            let mut file = self
                .open_package_file()
                .map_err(|err| Error::Download(format!("failed to prepare package file: {err}")))?;
            self.download_engine()
                .download_and_verify(self.package_id, self.package, &mut file)?;

            let extracted = temp::open_extraction_dir(
                &self.package.content(self.package_id),
                temp::Options {
                    delete_on_close: true,
                },
            )
            .map_err(|err| {
                Error::Extraction(format!(
                    "failed to prepare a directory for file extraction: {err}"
                ))
            })?;

            let extraction = ExtractionEngine {
                ctx: self.ctx,
                flow: self.flow,
                action_index: self.action_index,
                action_type: self.action_type,
            };
            extraction
                .extract_package(&mut file, &extracted)
                .map_err(|err| Error::Extraction(format!("extraction failed: {err}")))?;

            // Cache the extracted files so other flows in this
            // invocation can reuse them. The deployment engine deletes
            // them at teardown.
            state
                .extracted_packages
                .insert(self.package_id.clone(), extracted);
        }

        let extracted = state
            .extracted_packages
            .get(self.package_id)
            .expect("extraction directory was just cached");
        self.command_engine(command_id, command, apps)
            .invoke_archive(extracted)
    }

    /// Runs a command on a standalone package, downloading and verifying
    /// it first unless this invocation already has.
    fn invoke_package_command(
        &self,
        state: &mut EngineState,
        command_id: &CommandId,
        command: &Command,
        apps: AppEvaluation,
    ) -> Result<()> {
        if !state.verified_packages.contains_key(self.package_id) {
            let dir = self
                .open_package_dir()
                .map_err(|err| Error::Download(format!("failed to prepare package file: {err}")))?;

            let result = (|| -> Result<()> {
                let mut file = dir.open_file(self.package)?;
                self.download_engine()
                    .download_and_verify(self.package_id, self.package, &mut file)
            })();

            // Only verified package directories are cached; failures
            // leave no state behind.
            match result {
                Ok(()) => {
                    state.verified_packages.insert(self.package_id.clone(), dir);
                }
                Err(err) => return Err(err),
            }
        }

        let dir = state
            .verified_packages
            .get(self.package_id)
            .expect("package directory was just cached");
        self.command_engine(command_id, command, apps)
            .invoke_package(dir)
    }

    fn command_engine<'b>(
        &'b self,
        command_id: &'b CommandId,
        command: &'b Command,
        apps: AppEvaluation,
    ) -> CommandEngine<'b, 'ctx> {
        CommandEngine {
            ctx: self.ctx,
            flow: self.flow,
            action_index: self.action_index,
            action_type: self.action_type,
            package: Some((self.package_id, self.package)),
            command_id,
            command,
            apps,
        }
    }

    fn download_engine(&self) -> DownloadEngine<'_, '_> {
        DownloadEngine {
            ctx: self.ctx,
            flow: self.flow,
            action_index: self.action_index,
            action_type: self.action_type,
        }
    }

    fn open_package_dir(&self) -> Result<PackageDir> {
        let deployment_dir = staging::open_deployment(self.ctx.platform, &self.ctx.deployment.id)?;
        deployment_dir.open_package(&self.package.content(self.package_id))
    }

    fn open_package_file(&self) -> Result<PackageFile> {
        self.open_package_dir()?.open_file(self.package)
    }
}
