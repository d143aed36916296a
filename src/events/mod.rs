// src/events/mod.rs

//! The event pipeline
//!
//! Every significant step of a deployment emits a strongly-typed event.
//! Events are tagged variants of [`DeployEvent`]; each variant exposes the
//! same capability set (component, level, message, details, structured
//! attributes) through the [`Event`] trait. A [`Record`] wraps an event
//! with a timestamp and the caller's source location, and a [`Recorder`]
//! forwards records to a single [`Handler`]. A recorder without a handler
//! drops all events silently.

use chrono::{DateTime, Local};
use std::fmt;
use std::panic::Location;
use std::sync::Arc;

use crate::error::{Error, Result};

mod action;
mod command;
mod download;
mod errors;
mod extraction;
mod file;
mod flow;
mod handlers;

pub use action::{ActionStarted, ActionStopped};
pub use command::{CommandSkipped, CommandStarted, CommandStopped};
pub use download::{DownloadReset, DownloadResetReason, DownloadStarted, DownloadStopped};
pub use errors::HandlerFailure;
pub use extraction::{ExtractedFile, ExtractionStarted, ExtractionStats, ExtractionStopped};
pub use file::{FileCopy, FileDelete, FileVerification};
pub use flow::{
    FlowAlreadyRunning, FlowCondition, FlowLockNotAcquired, FlowStarted, FlowStopped,
};
pub use handlers::{BasicHandler, EventLogHandler, MultiHandler, PlatformLog, TracingHandler};

/// The severity of an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum EventLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl EventLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventLevel::Debug => "DEBUG",
            EventLevel::Info => "INFO",
            EventLevel::Warn => "WARN",
            EventLevel::Error => "ERROR",
        }
    }
}

impl fmt::Display for EventLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A structured logging attribute attached to an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attr {
    pub key: String,
    pub value: String,
}

/// Builds an attribute from any displayable value. Nested groups use
/// dotted keys, e.g. `action.index`.
pub fn attr(key: impl Into<String>, value: impl fmt::Display) -> Attr {
    Attr {
        key: key.into(),
        value: value.to_string(),
    }
}

/// The capability set common to all deployment events.
pub trait Event {
    /// The component that generated the event.
    fn component(&self) -> &'static str;

    /// The severity of the event.
    fn level(&self) -> EventLevel;

    /// A single-line description of the event.
    fn message(&self) -> String;

    /// Additional details, possibly spanning multiple lines. Empty when no
    /// details are available.
    fn details(&self) -> String {
        String::new()
    }

    /// Structured logging attributes for the event.
    fn attrs(&self) -> Vec<Attr>;
}

macro_rules! deploy_events {
    ($($variant:ident),+ $(,)?) => {
        /// A deployment event, one variant per event type.
        #[derive(Debug, Clone)]
        pub enum DeployEvent {
            $($variant($variant)),+
        }

        impl Event for DeployEvent {
            fn component(&self) -> &'static str {
                match self {
                    $(DeployEvent::$variant(event) => event.component()),+
                }
            }

            fn level(&self) -> EventLevel {
                match self {
                    $(DeployEvent::$variant(event) => event.level()),+
                }
            }

            fn message(&self) -> String {
                match self {
                    $(DeployEvent::$variant(event) => event.message()),+
                }
            }

            fn details(&self) -> String {
                match self {
                    $(DeployEvent::$variant(event) => event.details()),+
                }
            }

            fn attrs(&self) -> Vec<Attr> {
                match self {
                    $(DeployEvent::$variant(event) => event.attrs()),+
                }
            }
        }

        $(
            impl From<$variant> for DeployEvent {
                fn from(event: $variant) -> Self {
                    DeployEvent::$variant(event)
                }
            }
        )+
    };
}

deploy_events! {
    FlowStarted,
    FlowStopped,
    FlowCondition,
    FlowLockNotAcquired,
    FlowAlreadyRunning,
    ActionStarted,
    ActionStopped,
    CommandSkipped,
    CommandStarted,
    CommandStopped,
    DownloadStarted,
    DownloadStopped,
    DownloadReset,
    FileVerification,
    ExtractionStarted,
    ExtractedFile,
    ExtractionStopped,
    FileCopy,
    FileDelete,
    HandlerFailure,
}

/// A record of an event: the event itself plus a timestamp and the source
/// location of the caller that recorded it.
#[derive(Debug, Clone)]
pub struct Record {
    pub time: DateTime<Local>,
    pub location: &'static Location<'static>,
    pub event: DeployEvent,
}

impl Record {
    /// Creates a record for the given event, stamped with the current time
    /// and the caller's source location.
    #[track_caller]
    pub fn new(event: DeployEvent) -> Self {
        Record {
            time: Local::now(),
            location: Location::caller(),
            event,
        }
    }

    pub fn component(&self) -> &'static str {
        self.event.component()
    }

    pub fn level(&self) -> EventLevel {
        self.event.level()
    }

    pub fn message(&self) -> String {
        self.event.message()
    }

    pub fn details(&self) -> String {
        self.event.details()
    }

    pub fn attrs(&self) -> Vec<Attr> {
        self.event.attrs()
    }
}

/// An event handler capable of processing event records.
pub trait Handler: Send + Sync {
    /// A short name identifying the handler in failure reports.
    fn name(&self) -> &'static str;

    /// Processes the given record.
    fn handle(&self, record: &Record) -> Result<()>;
}

/// Collects events and passes them to a handler.
///
/// Recorders are cheap to clone; clones share the same handler.
#[derive(Clone, Default)]
pub struct Recorder {
    handler: Option<Arc<dyn Handler>>,
}

impl Recorder {
    /// Creates a recorder that forwards events to the given handler.
    pub fn new(handler: impl Handler + 'static) -> Self {
        Recorder {
            handler: Some(Arc::new(handler)),
        }
    }

    /// Creates a recorder that silently discards all events.
    pub fn disabled() -> Self {
        Recorder::default()
    }

    /// Records the given event and passes it to the handler.
    ///
    /// When the handler fails, the failure itself is recorded as an event
    /// on a best-effort basis and then returned.
    #[track_caller]
    pub fn record(&self, event: impl Into<DeployEvent>) -> Result<()> {
        let Some(handler) = &self.handler else {
            return Ok(());
        };

        let record = Record::new(event.into());
        match handler.handle(&record) {
            Ok(()) => Ok(()),
            Err(err) => {
                let failure = HandlerFailure {
                    handler: handler.name(),
                    component: record.component(),
                    message: err.to_string(),
                };
                let _ = handler.handle(&Record::new(failure.clone().into()));
                Err(Error::Handler(failure.message()))
            }
        }
    }

    /// Records the given event, logging handler failures instead of
    /// returning them. Handler failures never abort the engine.
    #[track_caller]
    pub fn emit(&self, event: impl Into<DeployEvent>) {
        if let Err(err) = self.record(event) {
            tracing::warn!("failed to record deployment event: {err}");
        }
    }
}

impl fmt::Debug for Recorder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Recorder")
            .field("handler", &self.handler.as_ref().map(|h| h.name()))
            .finish()
    }
}

/// Assembles event messages from a context path, a description and
/// trailing notes, e.g. `dep - flow - 3 - invoke-command: Completed
/// action (1.25s)`.
#[derive(Debug, Default)]
pub(crate) struct MessageBuilder {
    primary: Vec<String>,
    standard: Vec<String>,
    notes: Vec<String>,
}

impl MessageBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a segment of the context path.
    pub fn primary(&mut self, part: impl fmt::Display) -> &mut Self {
        let part = part.to_string();
        if !part.is_empty() {
            self.primary.push(part);
        }
        self
    }

    /// Appends descriptive text.
    pub fn standard(&mut self, text: impl fmt::Display) -> &mut Self {
        let text = text.to_string();
        if !text.is_empty() {
            self.standard.push(text);
        }
        self
    }

    /// Appends a trailing note.
    pub fn note(&mut self, note: impl fmt::Display) -> &mut Self {
        let note = note.to_string();
        if !note.is_empty() {
            self.notes.push(note);
        }
        self
    }

    /// Appends a labeled trailing note.
    pub fn labeled_note(&mut self, label: &str, note: impl fmt::Display) -> &mut Self {
        self.notes.push(format!("{label}: {note}"));
        self
    }

    pub fn build(&self) -> String {
        let mut out = self.primary.join(" - ");
        if !self.standard.is_empty() {
            if !out.is_empty() {
                out.push_str(": ");
            }
            out.push_str(&self.standard.join(" "));
        }
        for note in &self.notes {
            out.push_str(&format!(" ({note})"));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DeploymentId, FlowId};
    use std::sync::Mutex;

    struct CollectingHandler {
        records: Arc<Mutex<Vec<(EventLevel, String)>>>,
    }

    impl Handler for CollectingHandler {
        fn name(&self) -> &'static str {
            "collecting"
        }

        fn handle(&self, record: &Record) -> Result<()> {
            self.records
                .lock()
                .unwrap()
                .push((record.level(), record.message()));
            Ok(())
        }
    }

    struct FailingHandler;

    impl Handler for FailingHandler {
        fn name(&self) -> &'static str {
            "failing"
        }

        fn handle(&self, record: &Record) -> Result<()> {
            if record.component() == "event-handler" {
                return Ok(());
            }
            Err(Error::Handler("sink unavailable".to_string()))
        }
    }

    fn flow_started() -> FlowStarted {
        FlowStarted {
            deployment: DeploymentId::from("dep"),
            flow: FlowId::from("install"),
        }
    }

    #[test]
    fn test_recorder_without_handler_drops_events() {
        let recorder = Recorder::disabled();
        assert!(recorder.record(flow_started()).is_ok());
    }

    #[test]
    fn test_recorder_forwards_events() {
        let records = Arc::new(Mutex::new(Vec::new()));
        let recorder = Recorder::new(CollectingHandler {
            records: records.clone(),
        });
        recorder.record(flow_started()).unwrap();

        let captured = records.lock().unwrap();
        assert_eq!(captured.len(), 1);
        assert_eq!(captured[0].0, EventLevel::Info);
        assert!(captured[0].1.contains("install"));
    }

    #[test]
    fn test_recorder_reports_handler_failures() {
        let recorder = Recorder::new(FailingHandler);
        let err = recorder.record(flow_started()).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("failing"));
        assert!(message.contains("flow"));
        assert!(message.contains("sink unavailable"));
    }

    #[test]
    fn test_event_levels_order() {
        assert!(EventLevel::Debug < EventLevel::Info);
        assert!(EventLevel::Info < EventLevel::Warn);
        assert!(EventLevel::Warn < EventLevel::Error);
    }

    #[test]
    fn test_message_builder() {
        let mut builder = MessageBuilder::new();
        builder
            .primary("dep")
            .primary("")
            .primary("flow")
            .standard("Completed action")
            .note("1.25s");
        assert_eq!(builder.build(), "dep - flow: Completed action (1.25s)");
    }

    #[test]
    fn test_record_captures_location() {
        let record = Record::new(flow_started().into());
        assert!(record.location.file().ends_with("mod.rs"));
    }
}
