// tests/flow_orchestration.rs

//! Integration tests for the flow orchestrator: cycle detection,
//! preconditions, lock groups, on-error behavior and cancellation.

mod common;

use common::TestHost;

use leafbridge_deploy::error::Error;
use leafbridge_deploy::events::DeployEvent;
use leafbridge_deploy::model::{
    Action, Behavior, Condition, ConditionType, Deployment, DeploymentId, Flow, FlowId,
    LockConflictRules, LockResource, MutexNamespace, MutexResource, OnError,
};

fn deployment() -> Deployment {
    Deployment {
        id: DeploymentId::from("orchestration-test"),
        name: "Orchestration Test".to_string(),
        ..Deployment::default()
    }
}

#[test]
fn test_unknown_flow_fails() {
    let host = TestHost::new();
    let engine = host.engine(deployment());
    let err = engine.invoke(&FlowId::from("missing")).unwrap_err();
    assert!(err.to_string().contains("does not exist"));
}

#[test]
fn test_empty_flow_emits_lifecycle_events() {
    let host = TestHost::new();
    let mut dep = deployment();
    dep.flows.insert("noop".into(), Flow::default());

    host.engine(dep).invoke(&"noop".into()).unwrap();

    assert_eq!(
        host.log
            .count(|event| matches!(event, DeployEvent::FlowStarted(_))),
        1
    );
    assert_eq!(
        host.log.count(|event| {
            matches!(event, DeployEvent::FlowStopped(e) if e.error.is_none())
        }),
        1
    );
}

#[test]
fn test_reentrant_flow_guard() {
    let host = TestHost::new();
    let mut dep = deployment();
    // outer starts inner, which starts outer again.
    dep.flows.insert(
        "outer".into(),
        Flow {
            actions: vec![Action::StartFlow {
                flow: "inner".into(),
            }],
            ..Flow::default()
        },
    );
    dep.flows.insert(
        "inner".into(),
        Flow {
            actions: vec![Action::StartFlow {
                flow: "outer".into(),
            }],
            ..Flow::default()
        },
    );

    let err = host.engine(dep).invoke(&"outer".into()).unwrap_err();
    assert!(err.to_string().contains("already running"));
    assert_eq!(
        host.log.count(|event| {
            matches!(event, DeployEvent::FlowAlreadyRunning(e) if e.flow.as_str() == "outer")
        }),
        1
    );
}

#[test]
fn test_direct_self_reentry_is_detected() {
    let host = TestHost::new();
    let mut dep = deployment();
    dep.flows.insert(
        "loop".into(),
        Flow {
            actions: vec![Action::StartFlow {
                flow: "loop".into(),
            }],
            ..Flow::default()
        },
    );

    let err = host.engine(dep).invoke(&"loop".into()).unwrap_err();
    assert!(err.to_string().contains("already running"));
}

#[test]
fn test_failed_precondition_stops_flow() {
    let host = TestHost::new();
    let mut dep = deployment();
    dep.resources.mutexes.insert(
        "ready-mutex".into(),
        MutexResource {
            description: String::new(),
            name: "Ready".to_string(),
            namespace: MutexNamespace::Global,
        },
    );
    dep.conditions.insert(
        "ready".into(),
        Condition {
            condition_type: Some(ConditionType::MutexExists),
            subject: "ready-mutex".to_string(),
            ..Condition::default()
        },
    );
    dep.flows.insert(
        "install".into(),
        Flow {
            preconditions: vec!["ready".into()].into(),
            actions: vec![Action::StartFlow {
                flow: "install".into(),
            }],
            ..Flow::default()
        },
    );

    // The mutex is missing, so the precondition fails and no action
    // (including the self-referencing one) ever runs.
    let err = host.engine(dep.clone()).invoke(&"install".into()).unwrap_err();
    assert!(err.to_string().contains("preconditions failed"));
    assert_eq!(
        host.log.count(|event| {
            matches!(event, DeployEvent::FlowCondition(e) if !e.failed.is_empty())
        }),
        1
    );
    assert_eq!(
        host.log
            .count(|event| matches!(event, DeployEvent::FlowStarted(_))),
        0
    );

    // Once the mutex exists the precondition passes; the flow then trips
    // over its own cycle, proving the actions ran.
    host.platform.add_mutex("Global\\Ready");
    let err = host.engine(dep).invoke(&"install".into()).unwrap_err();
    assert!(err.to_string().contains("already running"));
}

#[test]
fn test_lock_conflict_fails_flow_with_message() {
    let host = TestHost::new();
    let mut dep = deployment();
    dep.resources.mutexes.insert(
        "setup-mutex".into(),
        MutexResource {
            description: String::new(),
            name: "Setup".to_string(),
            namespace: MutexNamespace::LeafBridge,
        },
    );
    dep.resources.locks.insert(
        "setup".into(),
        LockResource {
            description: String::new(),
            mutex: "setup-mutex".into(),
            conflict: LockConflictRules {
                message: "another deployment is in progress".to_string(),
            },
        },
    );
    dep.flows.insert(
        "install".into(),
        Flow {
            locks: vec!["setup".into()],
            ..Flow::default()
        },
    );

    host.platform
        .hold_mutex_externally("Global\\LeafBridge-Deployment-Setup");

    let err = host.engine(dep).invoke(&"install".into()).unwrap_err();
    assert!(err.to_string().contains("another deployment is in progress"));
    assert_eq!(
        host.log.count(|event| {
            matches!(event, DeployEvent::FlowLockNotAcquired(e) if e.lock.as_str() == "setup")
        }),
        1
    );
    // The flow never started.
    assert_eq!(
        host.log
            .count(|event| matches!(event, DeployEvent::FlowStarted(_))),
        0
    );
}

#[test]
fn test_locks_are_released_after_flow() {
    let host = TestHost::new();
    let mut dep = deployment();
    dep.resources.mutexes.insert(
        "setup-mutex".into(),
        MutexResource {
            description: String::new(),
            name: "Setup".to_string(),
            namespace: MutexNamespace::Global,
        },
    );
    dep.resources.locks.insert(
        "setup".into(),
        LockResource {
            description: String::new(),
            mutex: "setup-mutex".into(),
            conflict: LockConflictRules::default(),
        },
    );
    dep.flows.insert(
        "install".into(),
        Flow {
            locks: vec!["setup".into()],
            ..Flow::default()
        },
    );

    host.engine(dep).invoke(&"install".into()).unwrap();
    assert!(!host.platform.mutex_is_held("Global\\Setup"));
}

#[test]
fn test_nested_flow_may_redeclare_parent_lock() {
    let host = TestHost::new();
    let mut dep = deployment();
    dep.resources.mutexes.insert(
        "setup-mutex".into(),
        MutexResource {
            description: String::new(),
            name: "Setup".to_string(),
            namespace: MutexNamespace::Global,
        },
    );
    dep.resources.locks.insert(
        "setup".into(),
        LockResource {
            description: String::new(),
            mutex: "setup-mutex".into(),
            conflict: LockConflictRules::default(),
        },
    );
    dep.flows.insert(
        "outer".into(),
        Flow {
            locks: vec!["setup".into()],
            actions: vec![Action::StartFlow {
                flow: "inner".into(),
            }],
            ..Flow::default()
        },
    );
    dep.flows.insert(
        "inner".into(),
        Flow {
            locks: vec!["setup".into()],
            ..Flow::default()
        },
    );

    // The reentrant lock lets the nested flow acquire the same lock
    // without deadlocking, and everything is released at the end.
    host.engine(dep).invoke(&"outer".into()).unwrap();
    assert!(!host.platform.mutex_is_held("Global\\Setup"));
}

#[test]
fn test_on_error_stop_halts_at_first_failure() {
    let host = TestHost::new();
    let mut dep = deployment();
    dep.flows.insert(
        "run".into(),
        Flow {
            actions: vec![
                Action::StartFlow {
                    flow: "missing".into(),
                },
                Action::StartFlow {
                    flow: "also-missing".into(),
                },
            ],
            ..Flow::default()
        },
    );

    let err = host.engine(dep).invoke(&"run".into()).unwrap_err();
    assert!(err.to_string().contains("missing"));
    // Only the first action ran.
    assert_eq!(
        host.log
            .count(|event| matches!(event, DeployEvent::ActionStarted(_))),
        1
    );
}

#[test]
fn test_on_error_continue_collects_errors() {
    let host = TestHost::new();
    let mut dep = deployment();
    dep.behavior = Behavior {
        on_error: OnError::Continue,
    };
    dep.flows.insert(
        "run".into(),
        Flow {
            actions: vec![
                Action::StartFlow {
                    flow: "missing".into(),
                },
                Action::StartFlow {
                    flow: "also-missing".into(),
                },
            ],
            ..Flow::default()
        },
    );

    let err = host.engine(dep).invoke(&"run".into()).unwrap_err();
    let message = err.to_string();
    assert!(message.contains("missing"));
    assert!(message.contains("also-missing"));
    // Both actions ran despite the first failure.
    assert_eq!(
        host.log
            .count(|event| matches!(event, DeployEvent::ActionStarted(_))),
        2
    );
}

#[test]
fn test_flow_level_behavior_overrides_deployment() {
    let host = TestHost::new();
    let mut dep = deployment();
    dep.behavior = Behavior {
        on_error: OnError::Continue,
    };
    dep.flows.insert(
        "run".into(),
        Flow {
            behavior: Behavior {
                on_error: OnError::Stop,
            },
            actions: vec![
                Action::StartFlow {
                    flow: "missing".into(),
                },
                Action::StartFlow {
                    flow: "also-missing".into(),
                },
            ],
            ..Flow::default()
        },
    );

    host.engine(dep).invoke(&"run".into()).unwrap_err();
    assert_eq!(
        host.log
            .count(|event| matches!(event, DeployEvent::ActionStarted(_))),
        1
    );
}

#[test]
fn test_cancellation_stops_before_any_action() {
    let host = TestHost::new();
    let mut dep = deployment();
    dep.flows.insert(
        "run".into(),
        Flow {
            actions: vec![Action::StartFlow {
                flow: "missing".into(),
            }],
            ..Flow::default()
        },
    );

    host.cancel.cancel();
    let err = host.engine(dep).invoke(&"run".into()).unwrap_err();
    assert!(matches!(err, Error::Cancelled));
    assert_eq!(
        host.log
            .count(|event| matches!(event, DeployEvent::ActionStarted(_))),
        0
    );
}
