// src/engine/command.rs

//! The command engine
//!
//! Resolves a command's executable (standalone file resource, staged
//! package file, extracted archive file, or an application product
//! code), rewrites MSI-typed commands onto the OS installer utility,
//! runs the child process with merged output capture, interprets its
//! exit code and re-evaluates the expected application changes.

use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, Command as ProcessCommand, Stdio};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use wait_timeout::ChildExt;

use super::app::AppEngine;
use super::EngineContext;
use crate::error::{Error, Result};
use crate::events::{CommandStarted, CommandStopped};
use crate::fs::local;
use crate::fs::staging::PackageDir;
use crate::fs::temp::ExtractionDir;
use crate::model::{
    ActionType, AppEvaluation, AppId, AppSummary, Command, CommandId, CommandResult, CommandType,
    FileId, FlowId, Package, PackageFileId, PackageId,
};
use crate::msi;
use crate::util::decode_output;

/// The executable name of the OS installer utility.
const MSIEXEC: &str = "msiexec.exe";

/// Wall-clock cap on captured command output (4 MiB).
const MAX_CAPTURED_OUTPUT: usize = 4 * 1024 * 1024;

/// How long a child may keep running after cancellation before it is
/// forcibly terminated.
const CANCEL_GRACE: Duration = Duration::from_secs(60);

/// How long the engine sleeps after a command completes, letting file
/// locks and file system state settle before later actions run.
const QUIESCENCE: Duration = Duration::from_secs(5);

/// Invokes a single command.
pub(crate) struct CommandEngine<'a, 'ctx> {
    pub ctx: &'a EngineContext<'ctx>,
    pub flow: &'a FlowId,
    pub action_index: usize,
    pub action_type: ActionType,
    pub package: Option<(&'a PackageId, &'a Package)>,
    pub command_id: &'a CommandId,
    pub command: &'a Command,
    pub apps: AppEvaluation,
}

impl CommandEngine<'_, '_> {
    /// Runs the command without a package affiliation, resolving its
    /// executable as a file resource.
    pub fn invoke_standard(&self) -> Result<()> {
        let file_id = FileId::from(self.command.executable.as_str());
        let file_ref = self
            .ctx
            .deployment
            .resources
            .file_system
            .resolve_file(&file_id)
            .map_err(|err| {
                Error::Command(format!(
                    "{} refers to an executable file \"{file_id}\" that could not be resolved: {err}",
                    self.description()
                ))
            })?;

        let dir = local::open_dir(self.ctx.platform, &file_ref.dir())?.ok_or_else(|| {
            Error::Command(
                "verification of the command executable failed: the executable's directory does not exist"
                    .to_string(),
            )
        })?;
        let metadata = dir.stat(&file_ref.file_path)?.ok_or_else(|| {
            Error::Command(
                "verification of the command executable failed: the executable file does not exist"
                    .to_string(),
            )
        })?;
        if !metadata.is_file() {
            return Err(Error::Command(
                "verification of the command executable failed: the executable file path is not a regular file"
                    .to_string(),
            ));
        }

        let exec_path = dir.join(&file_ref.file_path)?;
        self.invoke_path(&exec_path)
    }

    /// Runs the command on a staged package file.
    pub fn invoke_package(&self, dir: &PackageDir) -> Result<()> {
        let (_, package) = self.package_data()?;
        let metadata = dir.stat(package)?.ok_or_else(|| {
            Error::Command(
                "verification of the command executable failed: the package file does not exist"
                    .to_string(),
            )
        })?;
        if !metadata.is_file() {
            return Err(Error::Command(
                "verification of the command executable failed: the executable file path is not a regular file"
                    .to_string(),
            ));
        }

        let exec_path = dir.file_path(package)?;
        self.invoke_path(&exec_path)
    }

    /// Runs the command on a set of extracted archive package files.
    pub fn invoke_archive(&self, files: &ExtractionDir) -> Result<()> {
        let (package_id, package) = self.package_data()?;
        let file_id = PackageFileId::from(self.command.executable.as_str());
        let file_data = package.files.get(&file_id).ok_or_else(|| {
            Error::Command(format!(
                "{} refers to an executable file \"{file_id}\" that is not defined in the \"{package_id}\" package",
                self.description()
            ))
        })?;

        let metadata = files.stat(&file_data.path)?.ok_or_else(|| {
            Error::Command(
                "verification of the command executable failed: the extracted file does not exist"
                    .to_string(),
            )
        })?;
        if !metadata.is_file() {
            return Err(Error::Command(
                "verification of the command executable failed: the executable file path is not a regular file"
                    .to_string(),
            ));
        }

        let exec_path = files.file_path(&file_data.path)?;
        self.invoke_path(&exec_path)
    }

    /// Runs the command against an application's product code through the
    /// OS installer utility.
    pub fn invoke_app(&self, app: &AppId) -> Result<()> {
        match self.command.command_type {
            Some(CommandType::MsiUninstallProductCode) => {}
            _ => {
                return Err(Error::Command(format!(
                    "{} uses a command type that is not suitable for app-based invocation",
                    self.description()
                )))
            }
        }

        let app_data = self.ctx.deployment.apps.get(app).ok_or_else(|| {
            Error::Command(format!(
                "{} refers to an application \"{app}\" that is not defined in the \"{}\" deployment",
                self.description(),
                self.ctx.deployment.id
            ))
        })?;
        if app_data.product_code.is_empty() {
            return Err(Error::Command(format!(
                "{} refers to an application \"{app}\" that does not have a product code",
                self.description()
            )));
        }

        let mut args = vec![
            "/x".to_string(),
            app_data.product_code.clone(),
            "/quiet".to_string(),
            "/norestart".to_string(),
        ];
        args.extend(self.command.args.iter().cloned());

        let working_dir = self.working_directory().map_err(|err| {
            Error::Command(format!(
                "a working directory could not be determined for {}: {err}",
                self.description()
            ))
        })?;

        let exec_path = find_in_path(MSIEXEC)?;
        self.invoke(&working_dir, &exec_path, &args)
    }

    fn invoke_path(&self, exec_path: &Path) -> Result<()> {
        let working_dir = self
            .working_directory_for_executable(exec_path)
            .map_err(|err| {
                Error::Command(format!(
                    "a working directory could not be determined for {}: {err}",
                    self.description()
                ))
            })?;

        let args = self.command.args.clone();

        // MSI-typed commands run through the installer utility with the
        // staged file as an argument.
        let (exec_path, args) = match self.command.command_type {
            None | Some(CommandType::Exe) => (exec_path.to_path_buf(), args),
            Some(CommandType::MsiInstall) => {
                (find_in_path(MSIEXEC)?, msi_args("/i", exec_path, args))
            }
            Some(CommandType::MsiUpdate) => {
                (find_in_path(MSIEXEC)?, msi_args("/update", exec_path, args))
            }
            Some(CommandType::MsiUninstall) => {
                (find_in_path(MSIEXEC)?, msi_args("/x", exec_path, args))
            }
            Some(CommandType::MsiUninstallProductCode) => {
                return Err(Error::Command(format!(
                    "{} uses an app-based command type and cannot run against a file path",
                    self.description()
                )))
            }
        };

        self.invoke(&working_dir, &exec_path, &args)
    }

    fn invoke(&self, working_dir: &str, exec_path: &Path, args: &[String]) -> Result<()> {
        self.ctx.cancel.check()?;

        let command_line = render_command_line(exec_path, args);

        self.ctx.events.emit(CommandStarted {
            deployment: self.ctx.deployment.id.clone(),
            flow: self.flow.clone(),
            action_index: self.action_index,
            action_type: self.action_type,
            package: self.package.map(|(id, _)| id.clone()),
            command: self.command_id.clone(),
            command_line: command_line.clone(),
            working_directory: self.command.working_directory.clone(),
            working_directory_path: working_dir.to_string(),
            apps: self.apps.clone(),
        });

        let started = chrono::Local::now();

        let mut process = ProcessCommand::new(exec_path);
        process
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if !working_dir.is_empty() {
            process.current_dir(working_dir);
        }

        let (mut command_error, output) = match process.spawn() {
            Err(err) => (
                Some(Error::Command(format!("failed to start the command: {err}"))),
                Vec::new(),
            ),
            Ok(child) => self.supervise(child),
        };

        let stopped = chrono::Local::now();

        // Interpret the exit code unless the command failed to run at
        // all.
        let mut result = CommandResult::default();
        if let Some(Error::CommandExit { code, .. }) = &command_error {
            let code = *code;
            result.exit_code = code;
            let (info, interpreted) = interpret_exit_code(self.command, code);
            result.info = info;
            command_error = interpreted;
        }

        // The installer reporting an unknown product on an uninstall
        // means the application is already gone.
        if let Some(Error::CommandExit { code, .. }) = &command_error {
            if is_tolerated_uninstall_code(self.command, *code) {
                command_error = None;
            }
        }

        // Determine whether the anticipated application changes took
        // effect.
        let app_engine = AppEngine::new(self.ctx);
        let summary = match app_engine.summarize_app_changes(&self.apps) {
            Ok(summary) => summary,
            Err(err) => {
                if command_error.is_none() {
                    command_error = Some(Error::AppChanges(format!(
                        "failed to determine the state of installed applications after the command was invoked: {err}"
                    )));
                }
                AppSummary::default()
            }
        };

        self.ctx.events.emit(CommandStopped {
            deployment: self.ctx.deployment.id.clone(),
            flow: self.flow.clone(),
            action_index: self.action_index,
            action_type: self.action_type,
            package: self.package.map(|(id, _)| id.clone()),
            command: self.command_id.clone(),
            command_line,
            result,
            output: decode_output(&output),
            working_directory: self.command.working_directory.clone(),
            working_directory_path: working_dir.to_string(),
            apps_before: self.apps.clone(),
            apps_after: summary.clone(),
            started,
            stopped,
            error: command_error.as_ref().map(|err| err.to_string()),
        });

        // Let file locks and file system state quiesce before later
        // actions run.
        self.ctx.cancel.sleep(QUIESCENCE);

        if let Some(err) = command_error {
            return Err(err);
        }
        match summary.to_error() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Waits for the child, draining its merged output, and escalates to
    /// forced termination when cancellation outlasts the grace period.
    fn supervise(&self, mut child: Child) -> (Option<Error>, Vec<u8>) {
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        let buffer: Arc<Mutex<Vec<u8>>> = Arc::new(Mutex::new(Vec::new()));
        let reader = {
            let buffer = buffer.clone();
            let mut sources: Vec<Box<dyn Read + Send>> = Vec::new();
            if let Some(stdout) = stdout {
                sources.push(Box::new(TeeReader {
                    inner: stdout,
                    writer: std::io::stdout(),
                }));
            }
            if let Some(stderr) = stderr {
                sources.push(Box::new(TeeReader {
                    inner: stderr,
                    writer: std::io::stderr(),
                }));
            }
            std::thread::spawn(move || {
                let mut merged = crate::util::MergeReader::new(sources);
                let mut chunk = [0u8; 4096];
                loop {
                    match merged.read(&mut chunk) {
                        Ok(0) | Err(_) => break,
                        Ok(n) => {
                            let mut buffer = buffer.lock().unwrap();
                            let room = MAX_CAPTURED_OUTPUT.saturating_sub(buffer.len());
                            buffer.extend_from_slice(&chunk[..n.min(room)]);
                        }
                    }
                }
            })
        };

        let mut deadline: Option<std::time::Instant> = None;
        let mut killed = false;
        let status = loop {
            match child.wait_timeout(Duration::from_millis(200)) {
                Ok(Some(status)) => break Ok(status),
                Ok(None) => {
                    if self.ctx.cancel.is_cancelled() {
                        let deadline =
                            *deadline.get_or_insert_with(|| std::time::Instant::now() + CANCEL_GRACE);
                        if std::time::Instant::now() >= deadline && !killed {
                            let _ = child.kill();
                            killed = true;
                        }
                    }
                }
                Err(err) => break Err(err),
            }
        };

        let _ = reader.join();
        let output = Arc::try_unwrap(buffer)
            .map(|m| m.into_inner().unwrap())
            .unwrap_or_default();

        let error = match status {
            Err(err) => Some(Error::Command(format!(
                "failed to wait for the command: {err}"
            ))),
            Ok(status) if killed => {
                let _ = status;
                Some(Error::Cancelled)
            }
            Ok(status) => match status.code() {
                Some(code) => Some(Error::CommandExit {
                    code,
                    name: None,
                    description: None,
                }),
                None => Some(Error::Command(
                    "the command was terminated by a signal".to_string(),
                )),
            },
        };

        (error, output)
    }

    /// Resolves the command's working directory, or falls back to the
    /// executable's directory.
    fn working_directory_for_executable(&self, exec_path: &Path) -> Result<String> {
        let configured = self.working_directory()?;
        if !configured.is_empty() {
            return Ok(configured);
        }
        match exec_path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => {
                Ok(parent.display().to_string())
            }
            _ => Err(Error::Command(format!(
                "a directory could not be determined for the executable's path: {}",
                exec_path.display()
            ))),
        }
    }

    /// Resolves the command's configured working directory, returning an
    /// empty string when none is configured.
    fn working_directory(&self) -> Result<String> {
        let Some(dir_id) = &self.command.working_directory else {
            return Ok(String::new());
        };

        let dir_ref = self
            .ctx
            .deployment
            .resources
            .file_system
            .resolve_directory(dir_id)?;
        let dir = local::open_dir(self.ctx.platform, &dir_ref)?.ok_or_else(|| {
            Error::Resolution(format!(
                "the \"{dir_id}\" working directory does not exist"
            ))
        })?;
        Ok(dir.path().display().to_string())
    }

    fn package_data(&self) -> Result<(&PackageId, &Package)> {
        self.package.ok_or_else(|| {
            Error::Command(format!(
                "{} requires a package but none was provided",
                self.description()
            ))
        })
    }

    /// A short description of the command for error messages.
    fn description(&self) -> String {
        match self.package {
            Some((package_id, _)) => format!(
                "the \"{}\" command in the \"{package_id}\" package",
                self.command_id
            ),
            None => format!("the \"{}\" command", self.command_id),
        }
    }
}

/// Interprets an exit code: the command's own exit-code map takes
/// precedence, MSI-typed commands fall back to the installer catalog, and
/// otherwise any non-zero code is a failure.
fn interpret_exit_code(
    command: &Command,
    code: i32,
) -> (Option<crate::model::ExitCodeInfo>, Option<Error>) {
    let exit_error = |info: &crate::model::ExitCodeInfo| {
        if info.ok {
            None
        } else {
            Some(Error::CommandExit {
                code,
                name: some_nonempty(&info.name),
                description: some_nonempty(&info.description),
            })
        }
    };

    if let Some(info) = command.exit_codes.get(&code) {
        return (Some(info.clone()), exit_error(info));
    }

    if command.is_msi() {
        if let Some(info) = msi::info(code) {
            let error = exit_error(&info);
            return (Some(info), error);
        }
    }

    let error = if code != 0 {
        Some(Error::CommandExit {
            code,
            name: None,
            description: None,
        })
    } else {
        None
    };
    (None, error)
}

/// Returns true when an uninstall command's failure code actually means
/// the application was already gone.
fn is_tolerated_uninstall_code(command: &Command, code: i32) -> bool {
    let uninstall = command
        .command_type
        .map(|t| t.is_msi_uninstall())
        .unwrap_or(false);
    uninstall && code == msi::UNKNOWN_PRODUCT
}

fn some_nonempty(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

fn msi_args(verb: &str, target: &Path, args: Vec<String>) -> Vec<String> {
    let mut out = vec![
        verb.to_string(),
        target.display().to_string(),
        "/quiet".to_string(),
        "/norestart".to_string(),
    ];
    out.extend(args);
    out
}

/// Renders a command line for event reporting, quoting arguments that
/// contain whitespace.
fn render_command_line(exec_path: &Path, args: &[String]) -> String {
    let mut out = quote_argument(&exec_path.display().to_string());
    for arg in args {
        out.push(' ');
        out.push_str(&quote_argument(arg));
    }
    out
}

fn quote_argument(arg: &str) -> String {
    if arg.is_empty() || arg.chars().any(char::is_whitespace) {
        format!("\"{arg}\"")
    } else {
        arg.to_string()
    }
}

/// Locates an executable by searching the PATH environment variable.
fn find_in_path(name: &str) -> Result<PathBuf> {
    let path = std::env::var_os("PATH").unwrap_or_default();
    for dir in std::env::split_paths(&path) {
        if dir.as_os_str().is_empty() {
            continue;
        }
        let candidate = dir.join(name);
        if candidate.is_file() {
            return Ok(candidate);
        }
    }
    Err(Error::Command(format!(
        "failed to locate the \"{name}\" executable on the search path"
    )))
}

/// Copies everything it reads to a secondary writer, so captured child
/// output remains visible on the parent's console.
struct TeeReader<R, W> {
    inner: R,
    writer: W,
}

impl<R: Read, W: Write> Read for TeeReader<R, W> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let n = self.inner.read(buf)?;
        if n > 0 {
            let _ = self.writer.write_all(&buf[..n]);
        }
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ExitCodeInfo;

    fn msi_uninstall_command() -> Command {
        Command {
            command_type: Some(CommandType::MsiUninstall),
            ..Command::default()
        }
    }

    #[test]
    fn test_interpret_prefers_command_exit_code_map() {
        let mut command = msi_uninstall_command();
        command.exit_codes.insert(
            1603,
            ExitCodeInfo {
                name: "tolerated".to_string(),
                description: String::new(),
                ok: true,
            },
        );

        // The command's own map marks 1603 as ok, overriding the catalog.
        let (info, error) = interpret_exit_code(&command, 1603);
        assert_eq!(info.unwrap().name, "tolerated");
        assert!(error.is_none());
    }

    #[test]
    fn test_interpret_falls_back_to_msi_catalog() {
        let command = msi_uninstall_command();
        let (info, error) = interpret_exit_code(&command, 1603);
        assert_eq!(info.unwrap().name, "ERROR_INSTALL_FAILURE");
        assert!(matches!(error, Some(Error::CommandExit { code: 1603, .. })));

        // Success codes from the catalog clear the error.
        let (info, error) = interpret_exit_code(&command, 3010);
        assert!(info.unwrap().ok);
        assert!(error.is_none());
    }

    #[test]
    fn test_interpret_non_msi_commands_treat_nonzero_as_error() {
        let command = Command {
            command_type: Some(CommandType::Exe),
            ..Command::default()
        };
        let (info, error) = interpret_exit_code(&command, 0);
        assert!(info.is_none());
        assert!(error.is_none());

        let (info, error) = interpret_exit_code(&command, 2);
        assert!(info.is_none());
        assert!(matches!(error, Some(Error::CommandExit { code: 2, .. })));
    }

    #[test]
    fn test_unknown_product_is_tolerated_on_uninstalls_only() {
        assert!(is_tolerated_uninstall_code(
            &msi_uninstall_command(),
            msi::UNKNOWN_PRODUCT
        ));
        assert!(is_tolerated_uninstall_code(
            &Command {
                command_type: Some(CommandType::MsiUninstallProductCode),
                ..Command::default()
            },
            msi::UNKNOWN_PRODUCT
        ));
        assert!(!is_tolerated_uninstall_code(
            &msi_uninstall_command(),
            1603
        ));
        assert!(!is_tolerated_uninstall_code(
            &Command {
                command_type: Some(CommandType::MsiInstall),
                ..Command::default()
            },
            msi::UNKNOWN_PRODUCT
        ));
    }

    #[test]
    fn test_render_command_line_quotes_whitespace() {
        let rendered = render_command_line(
            Path::new("C:\\Program Files\\Tool\\setup.exe"),
            &["/quiet".to_string(), "a b".to_string()],
        );
        assert_eq!(rendered, "\"C:\\Program Files\\Tool\\setup.exe\" /quiet \"a b\"");
    }

    #[test]
    fn test_msi_args_prepend_verb_and_flags() {
        let args = msi_args(
            "/i",
            Path::new("agent.msi"),
            vec!["REBOOT=ReallySuppress".to_string()],
        );
        assert_eq!(
            args,
            ["/i", "agent.msi", "/quiet", "/norestart", "REBOOT=ReallySuppress"]
        );
    }

    #[test]
    fn test_find_in_path() {
        let temp = tempfile::tempdir().unwrap();
        std::fs::write(temp.path().join("tool-under-test"), b"").unwrap();

        let original = std::env::var_os("PATH").unwrap_or_default();
        let mut paths: Vec<PathBuf> = std::env::split_paths(&original).collect();
        paths.insert(0, temp.path().to_path_buf());
        std::env::set_var("PATH", std::env::join_paths(paths).unwrap());

        let found = find_in_path("tool-under-test").unwrap();
        assert_eq!(found, temp.path().join("tool-under-test"));
        assert!(find_in_path("definitely-not-present-anywhere").is_err());

        std::env::set_var("PATH", original);
    }
}
