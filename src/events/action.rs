// src/events/action.rs

//! Events bracketing individual actions.

use chrono::{DateTime, Duration, Local};

use super::{attr, Attr, Event, EventLevel, MessageBuilder};
use crate::model::{ActionType, DeploymentId, FlowId};
use crate::util::format::format_duration;

/// A deployment action has started.
#[derive(Debug, Clone)]
pub struct ActionStarted {
    pub deployment: DeploymentId,
    pub flow: FlowId,
    pub action_index: usize,
    pub action_type: ActionType,
}

impl Event for ActionStarted {
    fn component(&self) -> &'static str {
        "action"
    }

    fn level(&self) -> EventLevel {
        EventLevel::Debug
    }

    fn message(&self) -> String {
        let mut builder = MessageBuilder::new();
        builder
            .primary(&self.deployment)
            .primary(&self.flow)
            .primary(self.action_index + 1)
            .primary(self.action_type)
            .standard("Starting action");
        builder.build()
    }

    fn attrs(&self) -> Vec<Attr> {
        vec![
            attr("deployment", &self.deployment),
            attr("flow", &self.flow),
            attr("action.index", self.action_index),
            attr("action.type", self.action_type),
        ]
    }
}

/// A deployment action has stopped.
#[derive(Debug, Clone)]
pub struct ActionStopped {
    pub deployment: DeploymentId,
    pub flow: FlowId,
    pub action_index: usize,
    pub action_type: ActionType,
    pub started: DateTime<Local>,
    pub stopped: DateTime<Local>,
    pub error: Option<String>,
}

impl ActionStopped {
    pub fn duration(&self) -> Duration {
        self.stopped.signed_duration_since(self.started)
    }
}

impl Event for ActionStopped {
    fn component(&self) -> &'static str {
        "action"
    }

    fn level(&self) -> EventLevel {
        if self.error.is_some() {
            return EventLevel::Error;
        }
        if self.duration() < Duration::seconds(5) {
            return EventLevel::Debug;
        }
        EventLevel::Info
    }

    fn message(&self) -> String {
        let mut builder = MessageBuilder::new();
        builder
            .primary(&self.deployment)
            .primary(&self.flow)
            .primary(self.action_index + 1)
            .primary(self.action_type);
        match &self.error {
            Some(err) => builder.standard(format!("Stopped action due to an error: {err}")),
            None => builder.standard("Completed action"),
        };
        builder.note(format_duration(self.duration()));
        builder.build()
    }

    fn attrs(&self) -> Vec<Attr> {
        let mut attrs = vec![
            attr("deployment", &self.deployment),
            attr("flow", &self.flow),
            attr("action.index", self.action_index),
            attr("action.type", self.action_type),
            attr("started", self.started.to_rfc3339()),
            attr("stopped", self.stopped.to_rfc3339()),
        ];
        if let Some(err) = &self.error {
            attrs.push(attr("error", err));
        }
        attrs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stopped(duration: Duration, error: Option<String>) -> ActionStopped {
        let started = Local::now();
        ActionStopped {
            deployment: "dep".into(),
            flow: "install".into(),
            action_index: 0,
            action_type: ActionType::InvokeCommand,
            started,
            stopped: started + duration,
            error,
        }
    }

    #[test]
    fn test_action_stopped_level_depends_on_duration() {
        assert_eq!(stopped(Duration::seconds(1), None).level(), EventLevel::Debug);
        assert_eq!(stopped(Duration::seconds(6), None).level(), EventLevel::Info);
        assert_eq!(
            stopped(Duration::seconds(1), Some("boom".to_string())).level(),
            EventLevel::Error
        );
    }

    #[test]
    fn test_action_index_is_one_based_in_messages() {
        let event = stopped(Duration::seconds(1), None);
        assert!(event.message().contains("dep - install - 1 - invoke-command"));
    }
}
