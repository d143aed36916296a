// src/events/handlers.rs

//! Event handlers
//!
//! - [`BasicHandler`] prints timestamped single-line messages to a stream
//!   with a minimum-level filter.
//! - [`MultiHandler`] fans out to several handlers, collecting per-handler
//!   failures into a single composite error.
//! - [`TracingHandler`] bridges event records into `tracing` for
//!   embedders.
//! - [`EventLogHandler`] adapts records onto a platform log facility,
//!   mapping levels to platform severities and dropping debug events.

use std::io::Write;
use std::sync::Mutex;

use super::{EventLevel, Handler, Record};
use crate::error::{Error, Result};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Prints timestamped event messages to a stream.
pub struct BasicHandler {
    writer: Mutex<Box<dyn Write + Send>>,
    min: EventLevel,
}

impl BasicHandler {
    /// Creates a handler writing to the given stream. Events below the
    /// minimum level are ignored.
    pub fn new(writer: impl Write + Send + 'static, min: EventLevel) -> Self {
        BasicHandler {
            writer: Mutex::new(Box::new(writer)),
            min,
        }
    }

    /// Creates a handler writing to standard output.
    pub fn stdout(min: EventLevel) -> Self {
        Self::new(std::io::stdout(), min)
    }
}

impl Handler for BasicHandler {
    fn name(&self) -> &'static str {
        "basic"
    }

    fn handle(&self, record: &Record) -> Result<()> {
        if record.level() < self.min {
            return Ok(());
        }
        let mut writer = self.writer.lock().unwrap();
        writeln!(
            writer,
            "{}: {:<6} {}",
            record.time.format(TIMESTAMP_FORMAT),
            format!("{}:", record.level()),
            record.message()
        )?;
        Ok(())
    }
}

/// Sends events to multiple underlying handlers.
///
/// Every handler sees every record; failures are collected and reported
/// as a single error naming the affected members.
pub struct MultiHandler {
    handlers: Vec<Box<dyn Handler>>,
}

impl MultiHandler {
    pub fn new(handlers: Vec<Box<dyn Handler>>) -> Self {
        MultiHandler { handlers }
    }
}

impl Handler for MultiHandler {
    fn name(&self) -> &'static str {
        "multi-handler"
    }

    fn handle(&self, record: &Record) -> Result<()> {
        let mut failures = Vec::new();
        for handler in &self.handlers {
            if let Err(err) = handler.handle(record) {
                failures.push(format!("{}: {err}", handler.name()));
            }
        }

        match failures.len() {
            0 => Ok(()),
            n => {
                let members = if n == 1 {
                    "1 member".to_string()
                } else {
                    format!("{n} members")
                };
                Err(Error::Handler(format!(
                    "{members} of the \"{}\" event handler failed to record a \"{}\" event: {}",
                    self.name(),
                    record.component(),
                    failures.join("; ")
                )))
            }
        }
    }
}

/// Bridges event records into the `tracing` ecosystem.
#[derive(Debug, Default)]
pub struct TracingHandler;

impl Handler for TracingHandler {
    fn name(&self) -> &'static str {
        "tracing"
    }

    fn handle(&self, record: &Record) -> Result<()> {
        let component = record.component();
        let message = record.message();
        match record.level() {
            EventLevel::Debug => tracing::debug!(component, "{message}"),
            EventLevel::Info => tracing::info!(component, "{message}"),
            EventLevel::Warn => tracing::warn!(component, "{message}"),
            EventLevel::Error => tracing::error!(component, "{message}"),
        }
        Ok(())
    }
}

/// The platform log facility consumed by [`EventLogHandler`].
///
/// The concrete OS event-log implementation lives outside the engine; it
/// only needs to write a message at one of three severities.
pub trait PlatformLog: Send + Sync {
    fn error(&self, message: &str) -> Result<()>;
    fn warning(&self, message: &str) -> Result<()>;
    fn info(&self, message: &str) -> Result<()>;
}

/// Maps event records onto a platform log facility.
///
/// Debug events are dropped. When writing fails and the record carried a
/// details section, the write is retried once without the details.
pub struct EventLogHandler<L: PlatformLog> {
    log: L,
}

impl<L: PlatformLog> EventLogHandler<L> {
    pub fn new(log: L) -> Self {
        EventLogHandler { log }
    }

    fn write(&self, level: EventLevel, message: &str) -> Result<()> {
        match level {
            EventLevel::Error => self.log.error(message),
            EventLevel::Warn => self.log.warning(message),
            _ => self.log.info(message),
        }
    }
}

impl<L: PlatformLog> Handler for EventLogHandler<L> {
    fn name(&self) -> &'static str {
        "event-log"
    }

    fn handle(&self, record: &Record) -> Result<()> {
        let level = record.level();
        if level < EventLevel::Info {
            return Ok(());
        }

        let message = record.message();
        let details = record.details();
        if details.is_empty() {
            return self.write(level, &message);
        }

        let full = format!("{message}\n\n{details}");
        match self.write(level, &full) {
            Ok(()) => Ok(()),
            Err(_) => self.write(level, &message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{FlowAlreadyRunning, FlowStarted, Recorder};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[derive(Clone, Default)]
    struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuffer {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl SharedBuffer {
        fn contents(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    fn started() -> FlowStarted {
        FlowStarted {
            deployment: "dep".into(),
            flow: "install".into(),
        }
    }

    #[test]
    fn test_basic_handler_filters_by_level() {
        let buffer = SharedBuffer::default();
        let recorder = Recorder::new(BasicHandler::new(buffer.clone(), EventLevel::Error));
        recorder.record(started()).unwrap();
        assert!(buffer.contents().is_empty());

        let recorder = Recorder::new(BasicHandler::new(buffer.clone(), EventLevel::Info));
        recorder.record(started()).unwrap();
        let contents = buffer.contents();
        assert!(contents.contains("INFO:"));
        assert!(contents.contains("Starting invocation"));
    }

    #[test]
    fn test_multi_handler_aggregates_failures() {
        struct Failing;
        impl Handler for Failing {
            fn name(&self) -> &'static str {
                "failing"
            }
            fn handle(&self, _record: &Record) -> Result<()> {
                Err(Error::Handler("sink offline".to_string()))
            }
        }

        let buffer = SharedBuffer::default();
        let multi = MultiHandler::new(vec![
            Box::new(BasicHandler::new(buffer.clone(), EventLevel::Debug)),
            Box::new(Failing),
        ]);
        let err = multi.handle(&Record::new(started().into())).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("1 member"));
        assert!(message.contains("sink offline"));
        // The working member still wrote its line.
        assert!(buffer.contents().contains("Starting invocation"));
    }

    struct CountingLog {
        errors: AtomicUsize,
        infos: AtomicUsize,
        fail_long_messages: bool,
    }

    impl CountingLog {
        fn new(fail_long_messages: bool) -> Self {
            CountingLog {
                errors: AtomicUsize::new(0),
                infos: AtomicUsize::new(0),
                fail_long_messages,
            }
        }
    }

    impl PlatformLog for &CountingLog {
        fn error(&self, message: &str) -> Result<()> {
            if self.fail_long_messages && message.contains('\n') {
                return Err(Error::Handler("message too long".to_string()));
            }
            self.errors.fetch_add(1, Ordering::Relaxed);
            Ok(())
        }

        fn warning(&self, _message: &str) -> Result<()> {
            Ok(())
        }

        fn info(&self, message: &str) -> Result<()> {
            if self.fail_long_messages && message.contains('\n') {
                return Err(Error::Handler("message too long".to_string()));
            }
            self.infos.fetch_add(1, Ordering::Relaxed);
            Ok(())
        }
    }

    #[test]
    fn test_event_log_handler_maps_levels() {
        let log = CountingLog::new(false);
        let handler = EventLogHandler::new(&log);

        handler.handle(&Record::new(started().into())).unwrap();
        assert_eq!(log.infos.load(Ordering::Relaxed), 1);

        let error_event = FlowAlreadyRunning {
            deployment: "dep".into(),
            flow: "install".into(),
        };
        handler.handle(&Record::new(error_event.into())).unwrap();
        assert_eq!(log.errors.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_event_log_handler_drops_debug() {
        use crate::events::ActionStarted;
        use crate::model::ActionType;

        let log = CountingLog::new(false);
        let handler = EventLogHandler::new(&log);
        let debug_event = ActionStarted {
            deployment: "dep".into(),
            flow: "install".into(),
            action_index: 0,
            action_type: ActionType::CopyFile,
        };
        handler.handle(&Record::new(debug_event.into())).unwrap();
        assert_eq!(log.infos.load(Ordering::Relaxed), 0);
        assert_eq!(log.errors.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn test_event_log_handler_retries_without_details() {
        use crate::events::CommandStopped;
        use crate::model::{ActionType, AppEvaluation, AppSummary, CommandResult};
        use chrono::Local;

        let log = CountingLog::new(true);
        let handler = EventLogHandler::new(&log);
        let now = Local::now();
        let event = CommandStopped {
            deployment: "dep".into(),
            flow: "install".into(),
            action_index: 0,
            action_type: ActionType::InvokeCommand,
            package: None,
            command: "install".into(),
            command_line: String::new(),
            result: CommandResult::default(),
            output: "captured output".to_string(),
            working_directory: None,
            working_directory_path: String::new(),
            apps_before: AppEvaluation::default(),
            apps_after: AppSummary::default(),
            started: now,
            stopped: now,
            error: None,
        };
        // The first write includes details and fails; the retry without
        // details succeeds.
        handler.handle(&Record::new(event.into())).unwrap();
        assert_eq!(log.infos.load(Ordering::Relaxed), 1);
    }
}
