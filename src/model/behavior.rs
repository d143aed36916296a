// src/model/behavior.rs

//! Behavior modifications for deployments and flows.

use serde::{Deserialize, Serialize};

/// The response to take when an action fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum OnError {
    /// No behavior specified; inherits from the surrounding scope.
    #[default]
    #[serde(rename = "")]
    Unspecified,
    /// Stop the flow at the first failing action.
    #[serde(rename = "stop")]
    Stop,
    /// Continue with later actions and join the collected errors.
    #[serde(rename = "continue")]
    Continue,
}

/// Behavior modifications for a deployment or flow.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Behavior {
    #[serde(rename = "on-error", skip_serializing_if = "is_unspecified")]
    pub on_error: OnError,
}

impl Behavior {
    pub fn is_unspecified(&self) -> bool {
        self.on_error == OnError::Unspecified
    }
}

fn is_unspecified(on_error: &OnError) -> bool {
    *on_error == OnError::Unspecified
}

/// Overlays the given behaviors, giving priority to later members.
///
/// Each field keeps the last non-empty value.
pub fn overlay_behavior(behaviors: &[Behavior]) -> Behavior {
    let mut out = Behavior::default();
    for next in behaviors {
        if next.on_error != OnError::Unspecified {
            out.on_error = next.on_error;
        }
    }
    out
}
