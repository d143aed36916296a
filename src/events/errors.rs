// src/events/errors.rs

//! Handler failures expressed as events
//!
//! When a handler cannot process an event, the recorder wraps the failure
//! in a [`HandlerFailure`] and tries to record it through the same
//! handler, so that partially working sinks still capture the problem.

use super::{attr, Attr, Event, EventLevel};

/// An event handler failed to record an event.
#[derive(Debug, Clone)]
pub struct HandlerFailure {
    /// The name of the failing handler.
    pub handler: &'static str,
    /// The component of the event that could not be recorded.
    pub component: &'static str,
    /// The rendered failure.
    pub message: String,
}

impl Event for HandlerFailure {
    fn component(&self) -> &'static str {
        "event-handler"
    }

    fn level(&self) -> EventLevel {
        EventLevel::Error
    }

    fn message(&self) -> String {
        format!(
            "the \"{}\" event handler failed to record a \"{}\" event: {}",
            self.handler, self.component, self.message
        )
    }

    fn attrs(&self) -> Vec<Attr> {
        vec![
            attr("handler", self.handler),
            attr("error", &self.message),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handler_failure_message() {
        let failure = HandlerFailure {
            handler: "event-log",
            component: "flow",
            message: "access denied".to_string(),
        };
        let message = failure.message();
        assert!(message.contains("event-log"));
        assert!(message.contains("flow"));
        assert!(message.contains("access denied"));
        assert_eq!(failure.level(), EventLevel::Error);
    }
}
