// src/events/flow.rs

//! Events emitted by the flow orchestrator.

use chrono::{DateTime, Duration, Local};

use super::{attr, Attr, Event, EventLevel, MessageBuilder};
use crate::model::{ConditionList, DeploymentId, FlowId, LockId};
use crate::util::format::format_duration;

/// A deployment flow has started.
#[derive(Debug, Clone)]
pub struct FlowStarted {
    pub deployment: DeploymentId,
    pub flow: FlowId,
}

impl Event for FlowStarted {
    fn component(&self) -> &'static str {
        "flow"
    }

    fn level(&self) -> EventLevel {
        EventLevel::Info
    }

    fn message(&self) -> String {
        let mut builder = MessageBuilder::new();
        builder
            .primary(&self.deployment)
            .primary(&self.flow)
            .standard("Starting invocation");
        builder.build()
    }

    fn attrs(&self) -> Vec<Attr> {
        vec![
            attr("deployment", &self.deployment),
            attr("flow", &self.flow),
        ]
    }
}

/// A deployment flow has stopped.
#[derive(Debug, Clone)]
pub struct FlowStopped {
    pub deployment: DeploymentId,
    pub flow: FlowId,
    pub started: DateTime<Local>,
    pub stopped: DateTime<Local>,
    pub error: Option<String>,
}

impl FlowStopped {
    pub fn duration(&self) -> Duration {
        self.stopped.signed_duration_since(self.started)
    }
}

impl Event for FlowStopped {
    fn component(&self) -> &'static str {
        "flow"
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
        builder.primary(&self.deployment).primary(&self.flow);
        match &self.error {
            Some(err) => {
                builder.standard(format!("Stopped invocation due to an error: {err}."))
            }
            None => builder.standard("Completed invocation."),
        };
        builder.note(format_duration(self.duration()));
        builder.build()
    }

    fn attrs(&self) -> Vec<Attr> {
        let mut attrs = vec![
            attr("deployment", &self.deployment),
            attr("flow", &self.flow),
            attr("started", self.started.to_rfc3339()),
            attr("stopped", self.stopped.to_rfc3339()),
        ];
        if let Some(err) = &self.error {
            attrs.push(attr("error", err));
        }
        attrs
    }
}

/// A deployment flow has evaluated its preconditions.
#[derive(Debug, Clone)]
pub struct FlowCondition {
    pub deployment: DeploymentId,
    pub flow: FlowId,
    pub passed: ConditionList,
    pub failed: ConditionList,
    pub error: Option<String>,
}

impl Event for FlowCondition {
    fn component(&self) -> &'static str {
        "flow"
    }

    fn level(&self) -> EventLevel {
        if self.error.is_some() || !self.failed.is_empty() {
            EventLevel::Error
        } else {
            EventLevel::Debug
        }
    }

    fn message(&self) -> String {
        let mut builder = MessageBuilder::new();
        builder.primary(&self.deployment).primary(&self.flow);
        if let Some(err) = &self.error {
            builder.standard(format!("Unable to evaluate preconditions: {err}"));
        } else if !self.failed.is_empty() {
            builder.standard(format!(
                "One or more preconditions failed: {}.",
                self.failed
            ));
        } else {
            builder.standard(format!("All preconditions passed: {}.", self.passed));
        }
        builder.build()
    }

    fn attrs(&self) -> Vec<Attr> {
        let mut attrs = vec![
            attr("deployment", &self.deployment),
            attr("flow", &self.flow),
            attr("conditions.passed", &self.passed),
            attr("conditions.failed", &self.failed),
        ];
        if let Some(err) = &self.error {
            attrs.push(attr("error", err));
        }
        attrs
    }
}

/// A deployment flow could not start because one of its locks could not be
/// acquired.
#[derive(Debug, Clone)]
pub struct FlowLockNotAcquired {
    pub deployment: DeploymentId,
    pub flow: FlowId,
    pub lock: LockId,
    pub error: Option<String>,
}

impl Event for FlowLockNotAcquired {
    fn component(&self) -> &'static str {
        "flow"
    }

    fn level(&self) -> EventLevel {
        EventLevel::Error
    }

    fn message(&self) -> String {
        let mut builder = MessageBuilder::new();
        builder.primary(&self.deployment).primary(&self.flow);
        match &self.error {
            Some(err) => builder.standard(format!("Unable to start the flow: {err}")),
            None => builder.standard(format!(
                "Unable to start the flow: The {} lock could not be acquired.",
                self.lock
            )),
        };
        builder.build()
    }

    fn attrs(&self) -> Vec<Attr> {
        let mut attrs = vec![
            attr("deployment", &self.deployment),
            attr("flow", &self.flow),
        ];
        if !self.lock.is_empty() {
            attrs.push(attr("lock", &self.lock));
        }
        if let Some(err) = &self.error {
            attrs.push(attr("error", err));
        }
        attrs
    }
}

/// A deployment flow could not start because it is already running, which
/// indicates a cycle in the flow logic.
#[derive(Debug, Clone)]
pub struct FlowAlreadyRunning {
    pub deployment: DeploymentId,
    pub flow: FlowId,
}

impl Event for FlowAlreadyRunning {
    fn component(&self) -> &'static str {
        "flow"
    }

    fn level(&self) -> EventLevel {
        EventLevel::Error
    }

    fn message(&self) -> String {
        let mut builder = MessageBuilder::new();
        builder
            .primary(&self.deployment)
            .primary(&self.flow)
            .standard(
                "Unable to start the flow. Another instance is already running. Is there a cycle in the flow logic?",
            );
        builder.build()
    }

    fn attrs(&self) -> Vec<Attr> {
        vec![
            attr("deployment", &self.deployment),
            attr("flow", &self.flow),
        ]
    }
}
