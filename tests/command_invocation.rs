// tests/command_invocation.rs

//! Integration tests for the command engine, driving real child
//! processes through deployment-scoped commands.

#![cfg(unix)]

mod common;

use common::TestHost;

use leafbridge_deploy::error::Error;
use leafbridge_deploy::events::DeployEvent;
use leafbridge_deploy::model::{
    Action, AppId, Application, Command, CommandType, Deployment, DeploymentId, Detection,
    DirectoryResource, ExitCodeInfo, FileResource, Flow,
};

/// Builds a deployment with a `tools/run.sh` script beneath the simulated
/// program-data folder, exposed as the `run-script` file resource.
fn deployment_with_script(host: &TestHost, script: &str) -> Deployment {
    use std::os::unix::fs::PermissionsExt;

    let tools = host.program_data.path().join("tools");
    std::fs::create_dir_all(&tools).unwrap();
    let path = tools.join("run.sh");
    std::fs::write(&path, script).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();

    let mut dep = Deployment {
        id: DeploymentId::from("command-test"),
        name: "Command Test".to_string(),
        ..Deployment::default()
    };
    dep.resources.file_system.directories.insert(
        "tools".into(),
        DirectoryResource {
            location: "program-data".into(),
            path: "tools".to_string(),
        },
    );
    dep.resources.file_system.files.insert(
        "run-script".into(),
        FileResource {
            location: "tools".into(),
            path: "run.sh".to_string(),
        },
    );
    dep
}

fn invoke_flow(dep: &mut Deployment, command: Command) {
    dep.commands.insert("run".into(), command);
    dep.flows.insert(
        "invoke".into(),
        Flow {
            actions: vec![Action::InvokeCommand {
                command: "run".into(),
                package: None,
                force: false,
            }],
            ..Flow::default()
        },
    );
}

#[test]
fn test_standalone_command_captures_output() {
    let host = TestHost::new();
    let mut dep = deployment_with_script(&host, "#!/bin/sh\necho hello-from-script\nexit 0\n");
    invoke_flow(
        &mut dep,
        Command {
            command_type: Some(CommandType::Exe),
            executable: "run-script".to_string(),
            ..Command::default()
        },
    );

    host.engine(dep).invoke(&"invoke".into()).unwrap();

    let stopped: Vec<_> = host
        .log
        .events()
        .into_iter()
        .filter_map(|event| match event {
            DeployEvent::CommandStopped(e) => Some(e),
            _ => None,
        })
        .collect();
    assert_eq!(stopped.len(), 1);
    let stopped = &stopped[0];
    assert!(stopped.error.is_none());
    assert_eq!(stopped.result.exit_code, 0);
    assert!(stopped.output.contains("hello-from-script"));
    // Without a configured working directory, the executable's directory
    // is used.
    assert!(stopped.working_directory_path.ends_with("tools"));
}

#[test]
fn test_unmapped_nonzero_exit_code_fails() {
    let host = TestHost::new();
    let mut dep = deployment_with_script(&host, "#!/bin/sh\nexit 3\n");
    invoke_flow(
        &mut dep,
        Command {
            command_type: Some(CommandType::Exe),
            executable: "run-script".to_string(),
            ..Command::default()
        },
    );

    let err = host.engine(dep).invoke(&"invoke".into()).unwrap_err();
    assert!(matches!(err, Error::CommandExit { code: 3, .. }));
    assert_eq!(
        host.log.count(|event| {
            matches!(event, DeployEvent::CommandStopped(e) if e.error.is_some())
        }),
        1
    );
}

#[test]
fn test_exit_code_map_can_bless_nonzero_codes() {
    let host = TestHost::new();
    let mut dep = deployment_with_script(&host, "#!/bin/sh\nexit 3\n");
    let mut command = Command {
        command_type: Some(CommandType::Exe),
        executable: "run-script".to_string(),
        ..Command::default()
    };
    command.exit_codes.insert(
        3,
        ExitCodeInfo {
            name: "partial-success".to_string(),
            description: "completed with warnings".to_string(),
            ok: true,
        },
    );
    invoke_flow(&mut dep, command);

    host.engine(dep).invoke(&"invoke".into()).unwrap();

    assert_eq!(
        host.log.count(|event| {
            matches!(
                event,
                DeployEvent::CommandStopped(e)
                    if e.error.is_none()
                        && e.result.exit_code == 3
                        && e.result.info.as_ref().map(|i| i.name.as_str())
                            == Some("partial-success")
            )
        }),
        1
    );
}

#[test]
fn test_ineffective_install_is_reported() {
    let host = TestHost::new();
    let mut dep = deployment_with_script(&host, "#!/bin/sh\nexit 0\n");
    dep.apps.insert(
        "agent-app".into(),
        Application {
            name: "Agent".to_string(),
            architecture: "x64".to_string(),
            scope: "machine".to_string(),
            product_code: "{AGENT}".to_string(),
            detection: Detection::default(),
        },
    );
    invoke_flow(
        &mut dep,
        Command {
            installs: vec![AppId::from("agent-app")].into(),
            command_type: Some(CommandType::Exe),
            executable: "run-script".to_string(),
            ..Command::default()
        },
    );

    // The command succeeds but never registers the app, so the summary
    // reports the install as still outstanding.
    let err = host.engine(dep).invoke(&"invoke".into()).unwrap_err();
    assert!(matches!(err, Error::AppChanges(_)));
    assert!(err.to_string().contains("agent-app"));

    // The command itself completed, so its stop event is not an error.
    assert_eq!(
        host.log.count(|event| {
            matches!(
                event,
                DeployEvent::CommandStopped(e)
                    if e.error.is_none()
                        && e.apps_after.still_not_installed.contains(&AppId::from("agent-app"))
            )
        }),
        1
    );
}
