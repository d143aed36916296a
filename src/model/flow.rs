// src/model/flow.rs

//! Flows: named, ordered sequences of actions.

use serde::{Deserialize, Serialize};

use super::action::Action;
use super::behavior::Behavior;
use super::condition::ConditionList;
use super::identifier;
use super::lock::LockId;

identifier! {
    /// A unique identifier for a flow within a deployment.
    FlowId
}

/// A flow of actions within a deployment.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Flow {
    /// Conditions that must all hold before the flow runs.
    #[serde(skip_serializing_if = "ConditionList::is_empty")]
    pub preconditions: ConditionList,
    /// Locks acquired, in declaration order, for the duration of the flow.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub locks: Vec<LockId>,
    /// Behavior overrides layered over the deployment's behavior.
    #[serde(skip_serializing_if = "Behavior::is_unspecified")]
    pub behavior: Behavior,
    pub actions: Vec<Action>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flow_round_trip() {
        let flow: Flow = serde_json::from_str(
            r#"{
                "preconditions": ["ready"],
                "locks": ["setup"],
                "behavior": {"on-error": "stop"},
                "actions": [
                    {"action": "prepare-package", "package": "agent"},
                    {"action": "invoke-command", "package": "agent", "command": "install"}
                ]
            }"#,
        )
        .unwrap();
        assert_eq!(flow.preconditions.len(), 1);
        assert_eq!(flow.locks.len(), 1);
        assert_eq!(flow.actions.len(), 2);
    }
}
