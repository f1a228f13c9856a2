use std::{fmt, path::PathBuf, sync::Arc};

use anyhow::Result;
use picker_event_bus::{EventPublisher, EventRecord, SessionEvent};
use picker_logging::{JsonLogger, LogLevel, LogRecord, LogSink};
use serde_json::Value;

/// Builder for [`PickerTelemetry`].
pub struct PickerTelemetryBuilder {
    module: String,
    log_path: Option<PathBuf>,
    log_sink: Option<Arc<dyn LogSink>>,
    min_level: LogLevel,
    event_publisher: Option<Arc<dyn EventPublisher>>,
}

impl PickerTelemetryBuilder {
    /// Creates a builder scoped to a module label.
    #[must_use]
    pub fn new(module: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            log_path: None,
            log_sink: None,
            min_level: LogLevel::Debug,
            event_publisher: None,
        }
    }

    /// Writes JSON lines to `path`. Ignored when an explicit sink is set.
    #[must_use]
    pub fn log_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.log_path = Some(path.into());
        self
    }

    /// Uses an existing sink instead of a file.
    #[must_use]
    pub fn log_sink(mut self, sink: Arc<dyn LogSink>) -> Self {
        self.log_sink = Some(sink);
        self
    }

    /// Minimum level for the file logger.
    #[must_use]
    pub fn min_level(mut self, level: LogLevel) -> Self {
        self.min_level = level;
        self
    }

    /// Sets the event publisher.
    #[must_use]
    pub fn event_publisher(mut self, publisher: Arc<dyn EventPublisher>) -> Self {
        self.event_publisher = Some(publisher);
        self
    }

    /// Builds telemetry, opening the log file if one was requested.
    pub fn build(self) -> Result<PickerTelemetry> {
        let sink = match (self.log_sink, self.log_path) {
            (Some(sink), _) => Some(sink),
            (None, Some(path)) => {
                let logger = JsonLogger::with_min_level(path, self.min_level)?;
                Some(Arc::new(logger) as Arc<dyn LogSink>)
            }
            (None, None) => None,
        };
        Ok(PickerTelemetry {
            module: self.module,
            inner: Arc::new(TelemetryInner {
                sink,
                publisher: self.event_publisher,
            }),
        })
    }
}

/// Log and event handle shared by the session components.
#[derive(Clone)]
pub struct PickerTelemetry {
    module: String,
    inner: Arc<TelemetryInner>,
}

struct TelemetryInner {
    sink: Option<Arc<dyn LogSink>>,
    publisher: Option<Arc<dyn EventPublisher>>,
}

impl fmt::Debug for PickerTelemetry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PickerTelemetry")
            .field("module", &self.module)
            .field("logs", &self.inner.sink.is_some())
            .field("events", &self.inner.publisher.is_some())
            .finish()
    }
}

impl PickerTelemetry {
    /// Returns a builder.
    #[must_use]
    pub fn builder(module: impl Into<String>) -> PickerTelemetryBuilder {
        PickerTelemetryBuilder::new(module)
    }

    /// Same sinks, different module label.
    #[must_use]
    pub fn scoped(&self, module: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            inner: Arc::clone(&self.inner),
        }
    }

    /// Module label attached to records.
    #[must_use]
    pub fn module(&self) -> &str {
        &self.module
    }

    /// Logs a message with JSON metadata.
    pub fn log(&self, level: LogLevel, message: &str, metadata: &Value) -> Result<()> {
        if let Some(sink) = &self.inner.sink {
            sink.log(&LogRecord::new(&self.module, level, message).with_metadata(metadata))?;
        }
        Ok(())
    }

    /// Publishes a session event.
    pub fn event(&self, event: SessionEvent) -> Result<()> {
        if let Some(publisher) = &self.inner.publisher {
            publisher.publish(EventRecord::new(&self.module, event))?;
        }
        Ok(())
    }
}

/// Best-effort logging for components holding `Option<PickerTelemetry>`.
///
/// Telemetry failures never change the outcome of a core operation.
pub(crate) fn log(
    telemetry: Option<&PickerTelemetry>,
    level: LogLevel,
    message: &str,
    metadata: &Value,
) {
    if let Some(tel) = telemetry {
        let _ = tel.log(level, message, metadata);
    }
}

/// Best-effort event publishing, see [`log`].
pub(crate) fn emit(telemetry: Option<&PickerTelemetry>, event: SessionEvent) {
    if let Some(tel) = telemetry {
        let _ = tel.event(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use picker_event_bus::MemoryEventBus;
    use picker_logging::MemoryLogSink;
    use serde_json::json;
    use tempfile::tempdir;

    #[test]
    fn telemetry_writes_log_and_event() {
        let tmp = tempdir().unwrap();
        let bus = Arc::new(MemoryEventBus::new(4));
        let log_path = tmp.path().join("picker.log");
        let telemetry = PickerTelemetry::builder("session")
            .log_path(&log_path)
            .event_publisher(bus.clone())
            .build()
            .unwrap();
        telemetry
            .log(LogLevel::Info, "names.changed", &json!({ "size": 2 }))
            .unwrap();
        telemetry
            .event(SessionEvent::WheelReset { cancelled: false })
            .unwrap();
        assert!(std::fs::read_to_string(&log_path)
            .unwrap()
            .contains("names.changed"));
        assert_eq!(bus.event_types(), vec!["wheel.reset"]);
    }

    #[test]
    fn scoped_handles_share_sinks() {
        let sink = Arc::new(MemoryLogSink::default());
        let telemetry = PickerTelemetry::builder("session")
            .log_sink(sink.clone())
            .build()
            .unwrap();
        let wheel = telemetry.scoped("wheel");
        wheel
            .log(LogLevel::Debug, "wheel.spin.ignored", &Value::Null)
            .unwrap();
        let records = sink.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].module, "wheel");
        assert_eq!(telemetry.module(), "session");
    }

    #[test]
    fn missing_sinks_are_silent() {
        let telemetry = PickerTelemetry::builder("quiet").build().unwrap();
        assert!(telemetry
            .log(LogLevel::Error, "nothing", &Value::Null)
            .is_ok());
        assert!(telemetry
            .event(SessionEvent::GroupsReset { discarded: 0 })
            .is_ok());
    }
}
