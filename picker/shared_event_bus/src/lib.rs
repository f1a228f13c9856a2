#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    missing_docs,
    rust_2018_idioms
)]

//! Session events published by the picker core for renderers and audit logs.

use std::{
    collections::VecDeque,
    fs::{self, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::Result;
use chrono::Utc;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// State change observed in a picker session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event_type", content = "payload")]
pub enum SessionEvent {
    /// The registry gained or lost names.
    #[serde(rename = "names.changed")]
    NamesChanged {
        /// Registry size after the change.
        size: usize,
        /// Names appended by the change.
        added: usize,
        /// Names dropped by the change.
        removed: usize,
    },
    /// An import produced no usable names.
    #[serde(rename = "names.import.empty")]
    ImportEmpty {
        /// Raw entries offered by the caller.
        offered: usize,
    },
    /// A spin was accepted and the settle timer armed.
    #[serde(rename = "wheel.spin.started")]
    SpinStarted {
        /// Accumulated rotation the wheel is animating towards.
        rotation: f64,
        /// Delay before the winner becomes available.
        settle_ms: u64,
    },
    /// A pending spin settled on a winner.
    #[serde(rename = "wheel.spin.settled")]
    SpinSettled {
        /// Index of the winning section.
        winner_index: usize,
        /// Winning name.
        winner_name: String,
        /// Rotation the wheel rests at.
        rotation: f64,
    },
    /// The wheel went back to rest at zero.
    #[serde(rename = "wheel.reset")]
    WheelReset {
        /// Whether a pending spin was cancelled.
        cancelled: bool,
    },
    /// A group size was chosen for the next partition.
    #[serde(rename = "groups.size.selected")]
    GroupSizeSelected {
        /// Chosen size.
        size: usize,
    },
    /// A partition was generated.
    #[serde(rename = "groups.generated")]
    GroupsGenerated {
        /// Group size the partition was cut with.
        group_size: usize,
        /// Member count of every group, in order.
        group_sizes: Vec<usize>,
    },
    /// The displayed partition was discarded.
    #[serde(rename = "groups.reset")]
    GroupsReset {
        /// Number of groups discarded.
        discarded: usize,
    },
}

impl SessionEvent {
    /// Dotted event type, identical to the serialized tag.
    #[must_use]
    pub const fn event_type(&self) -> &'static str {
        match self {
            Self::NamesChanged { .. } => "names.changed",
            Self::ImportEmpty { .. } => "names.import.empty",
            Self::SpinStarted { .. } => "wheel.spin.started",
            Self::SpinSettled { .. } => "wheel.spin.settled",
            Self::WheelReset { .. } => "wheel.reset",
            Self::GroupSizeSelected { .. } => "groups.size.selected",
            Self::GroupsGenerated { .. } => "groups.generated",
            Self::GroupsReset { .. } => "groups.reset",
        }
    }
}

/// Envelope around a [`SessionEvent`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventRecord {
    /// Unique identifier.
    pub id: String,
    /// Component producing the event.
    pub source: String,
    /// RFC3339 timestamp.
    pub timestamp: String,
    /// The event itself.
    pub event: SessionEvent,
}

impl EventRecord {
    /// Wraps an event with a fresh id and timestamp.
    #[must_use]
    pub fn new(source: impl Into<String>, event: SessionEvent) -> Self {
        Self {
            id: format!("evt-{}", Uuid::new_v4()),
            source: source.into(),
            timestamp: Utc::now().to_rfc3339(),
            event,
        }
    }
}

/// Event publisher interface.
pub trait EventPublisher: Send + Sync {
    /// Publishes an event.
    fn publish(&self, record: EventRecord) -> Result<()>;
}

/// In-memory broadcast bus with a bounded backlog of recent events.
#[derive(Debug, Clone)]
pub struct MemoryEventBus {
    sender: broadcast::Sender<EventRecord>,
    capacity: usize,
    backlog: Arc<Mutex<VecDeque<EventRecord>>>,
}

impl MemoryEventBus {
    /// Creates a bus retaining at most `capacity` events.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            capacity,
            backlog: Arc::new(Mutex::new(VecDeque::with_capacity(capacity))),
        }
    }

    /// Subscribes to events published from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<EventRecord> {
        self.sender.subscribe()
    }

    /// Snapshot of recent events retained in memory.
    #[must_use]
    pub fn snapshot(&self) -> Vec<EventRecord> {
        self.backlog.lock().iter().cloned().collect()
    }

    /// Event types of the retained events, oldest first.
    #[must_use]
    pub fn event_types(&self) -> Vec<&'static str> {
        self.backlog
            .lock()
            .iter()
            .map(|record| record.event.event_type())
            .collect()
    }
}

impl EventPublisher for MemoryEventBus {
    fn publish(&self, record: EventRecord) -> Result<()> {
        {
            let mut backlog = self.backlog.lock();
            backlog.push_back(record.clone());
            while backlog.len() > self.capacity {
                backlog.pop_front();
            }
        }
        // No subscribers is not an error.
        let _ = self.sender.send(record);
        Ok(())
    }
}

/// File-backed publisher appending JSON lines.
#[derive(Debug, Clone)]
pub struct FileEventPublisher {
    path: PathBuf,
}

impl FileEventPublisher {
    /// Creates a publisher that appends to the given path.
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        Ok(Self { path })
    }

    /// Target file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl EventPublisher for FileEventPublisher {
    fn publish(&self, record: EventRecord) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let data = serde_json::to_vec(&record)?;
        file.write_all(&data)?;
        file.write_all(b"\n")?;
        file.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sample_event() -> EventRecord {
        EventRecord::new(
            "registry",
            SessionEvent::NamesChanged {
                size: 3,
                added: 3,
                removed: 0,
            },
        )
    }

    #[test]
    fn publishes_and_receives() {
        let bus = MemoryEventBus::new(16);
        let mut rx = bus.subscribe();
        bus.publish(sample_event()).unwrap();
        let record = rx.try_recv().unwrap();
        assert_eq!(record.event.event_type(), "names.changed");
        assert!(record.id.starts_with("evt-"));
    }

    #[test]
    fn backlog_is_bounded() {
        let bus = MemoryEventBus::new(2);
        for discarded in 0..3 {
            bus.publish(EventRecord::new(
                "groups",
                SessionEvent::GroupsReset { discarded },
            ))
            .unwrap();
        }
        let snapshot = bus.snapshot();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(
            snapshot[0].event,
            SessionEvent::GroupsReset { discarded: 1 }
        );
    }

    #[test]
    fn serializes_dotted_tag() {
        let value = serde_json::to_value(SessionEvent::WheelReset { cancelled: true }).unwrap();
        assert_eq!(value["event_type"], "wheel.reset");
        assert_eq!(value["payload"]["cancelled"], true);
    }

    #[test]
    fn file_publisher_writes_events() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("events/session.jsonl");
        let publisher = FileEventPublisher::new(&path).unwrap();
        publisher.publish(sample_event()).unwrap();
        publisher.publish(sample_event()).unwrap();
        let content = std::fs::read_to_string(path).unwrap();
        assert_eq!(content.lines().count(), 2);
        let first: EventRecord = serde_json::from_str(content.lines().next().unwrap()).unwrap();
        assert_eq!(first.event.event_type(), "names.changed");
    }
}
