//! Session facade driven by a presentation layer or the CLI.

use std::{sync::Arc, time::Duration};

use anyhow::{Context, Result};
use picker_event_bus::{EventPublisher, FileEventPublisher, SessionEvent};
use picker_logging::LogLevel;
use serde_json::json;
use tokio::runtime::Handle;
use uuid::Uuid;

use crate::{
    config::PickerConfig,
    outcome::{NoopKind, Outcome},
    partition::{GroupPartitioner, Partition},
    random::source_for,
    recommend::{
        advice, max_selectable_size, recommend, GroupPreview, GroupSizeRecommendation,
        MIN_GROUP_SIZE,
    },
    registry::{ImportOutcome, NameRegistry},
    source::{flatten_rows, NameSource, SourceError},
    telemetry::{self, PickerTelemetry},
    wheel::{SelectionEngine, SelectionResult, SETTLE_DELAY},
};

/// One user's picker state: names, recommendations, groups and the wheel.
///
/// Every registry mutation recomputes the recommendations before returning.
#[derive(Debug)]
pub struct PickerSession {
    id: Uuid,
    registry: NameRegistry,
    recommendations: Vec<GroupSizeRecommendation>,
    group_size: usize,
    groups: Partition,
    partitioner: GroupPartitioner,
    wheel: SelectionEngine,
    telemetry: Option<PickerTelemetry>,
}

impl PickerSession {
    /// Returns a builder.
    #[must_use]
    pub fn builder() -> PickerSessionBuilder {
        PickerSessionBuilder::default()
    }

    /// Session identifier used in telemetry.
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Current names.
    #[must_use]
    pub fn names(&self) -> &NameRegistry {
        &self.registry
    }

    /// Adds one name. Returns the new registry size.
    pub fn add_name(&mut self, raw: &str) -> Outcome<usize> {
        if self.registry.add(raw) {
            self.names_changed(1, 0);
            Outcome::Applied(self.registry.len())
        } else {
            self.ignored("names.add.ignored", NoopKind::ValidationNoop)
        }
    }

    /// Removes one name. Returns the new registry size.
    pub fn remove_name(&mut self, name: &str) -> Outcome<usize> {
        if self.registry.remove(name) {
            self.names_changed(0, 1);
            Outcome::Applied(self.registry.len())
        } else {
            self.ignored("names.remove.ignored", NoopKind::ValidationNoop)
        }
    }

    /// Merges a batch of raw names.
    ///
    /// Ignored with [`NoopKind::ImportEmpty`] when nothing usable was offered and
    /// with [`NoopKind::ValidationNoop`] when every name was already present.
    pub fn import_names<I, S>(&mut self, names: I) -> Outcome<ImportOutcome>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let outcome = self.registry.import_many(names);
        if outcome.is_empty() {
            telemetry::log(
                self.telemetry.as_ref(),
                LogLevel::Warn,
                "names.import.empty",
                &json!({ "offered": outcome.offered }),
            );
            telemetry::emit(
                self.telemetry.as_ref(),
                SessionEvent::ImportEmpty {
                    offered: outcome.offered,
                },
            );
            return Outcome::Ignored(NoopKind::ImportEmpty);
        }
        if outcome.added == 0 {
            return self.ignored("names.import.ignored", NoopKind::ValidationNoop);
        }
        self.names_changed(outcome.added, 0);
        Outcome::Applied(outcome)
    }

    /// Merges rows of cells as delivered by a file importer.
    pub fn import_rows<R, C>(&mut self, rows: R) -> Outcome<ImportOutcome>
    where
        R: IntoIterator<Item = C>,
        C: IntoIterator,
        C::Item: AsRef<str>,
    {
        self.import_names(flatten_rows(rows))
    }

    /// Reads a source and merges its rows.
    pub async fn import_from(
        &mut self,
        source: &dyn NameSource,
    ) -> Result<Outcome<ImportOutcome>, SourceError> {
        let rows = source.rows().await?;
        Ok(self.import_rows(rows))
    }

    /// Removes every name. Returns how many were dropped.
    pub fn clear_names(&mut self) -> Outcome<usize> {
        let removed = self.registry.clear();
        if removed == 0 {
            return self.ignored("names.clear.ignored", NoopKind::ValidationNoop);
        }
        self.names_changed(0, removed);
        Outcome::Applied(removed)
    }

    /// Ranked group sizes for the current names.
    #[must_use]
    pub fn recommendations(&self) -> &[GroupSizeRecommendation] {
        &self.recommendations
    }

    /// Sizing advice for the current headcount.
    #[must_use]
    pub fn advice(&self) -> &'static str {
        advice(self.registry.len())
    }

    /// Upper bound for a size selector.
    #[must_use]
    pub fn max_selectable_size(&self) -> usize {
        max_selectable_size(self.registry.len())
    }

    /// Size used by the next [`Self::generate_groups`].
    #[must_use]
    pub fn group_size(&self) -> usize {
        self.group_size
    }

    /// Chooses the size for the next partition and discards the shown groups.
    pub fn select_group_size(&mut self, size: usize) -> Outcome<usize> {
        if size < MIN_GROUP_SIZE {
            return self.ignored("groups.size.ignored", NoopKind::ValidationNoop);
        }
        self.group_size = size;
        self.groups = Partition::default();
        telemetry::log(
            self.telemetry.as_ref(),
            LogLevel::Info,
            "groups.size.selected",
            &json!({ "size": size }),
        );
        telemetry::emit(
            self.telemetry.as_ref(),
            SessionEvent::GroupSizeSelected { size },
        );
        Outcome::Applied(size)
    }

    /// Preview of the split with the chosen size.
    #[must_use]
    pub fn preview(&self) -> GroupPreview {
        GroupPreview::new(self.registry.len(), self.group_size)
    }

    /// Shuffles the names into groups of the chosen size.
    pub fn generate_groups(&mut self) -> Outcome<Partition> {
        let partition = self.partitioner.partition(&self.registry, self.group_size);
        if partition.is_empty() {
            return self.ignored("groups.generate.ignored", NoopKind::ValidationNoop);
        }
        telemetry::log(
            self.telemetry.as_ref(),
            LogLevel::Info,
            "groups.generated",
            &json!({
                "group_size": partition.group_size,
                "groups": partition.len(),
                "names": self.registry.len(),
            }),
        );
        telemetry::emit(
            self.telemetry.as_ref(),
            SessionEvent::GroupsGenerated {
                group_size: partition.group_size,
                group_sizes: partition.group_sizes(),
            },
        );
        self.groups = partition.clone();
        Outcome::Applied(partition)
    }

    /// Groups from the last generation, empty after a reset.
    #[must_use]
    pub fn groups(&self) -> &Partition {
        &self.groups
    }

    /// Discards the shown groups. Returns how many were dropped.
    pub fn reset_groups(&mut self) -> usize {
        let discarded = std::mem::take(&mut self.groups).len();
        telemetry::emit(
            self.telemetry.as_ref(),
            SessionEvent::GroupsReset { discarded },
        );
        discarded
    }

    /// Spins the wheel over the current names.
    pub fn spin(&mut self) -> Outcome<f64> {
        self.wheel.spin(&self.registry)
    }

    /// Resets the wheel, cancelling a pending spin.
    pub fn reset_wheel(&mut self) -> bool {
        self.wheel.reset()
    }

    /// Waits for a pending spin and returns the winner, if any.
    pub async fn settled(&mut self) -> Option<SelectionResult> {
        self.wheel.settled().await
    }

    /// Read access for renderers.
    #[must_use]
    pub fn wheel(&self) -> &SelectionEngine {
        &self.wheel
    }

    fn names_changed(&mut self, added: usize, removed: usize) {
        self.recommendations = recommend(self.registry.len());
        let size = self.registry.len();
        telemetry::log(
            self.telemetry.as_ref(),
            LogLevel::Info,
            "names.changed",
            &json!({
                "size": size,
                "added": added,
                "removed": removed,
                "recommendations": self.recommendations.len(),
            }),
        );
        telemetry::emit(
            self.telemetry.as_ref(),
            SessionEvent::NamesChanged {
                size,
                added,
                removed,
            },
        );
    }

    fn ignored<T>(&self, message: &str, kind: NoopKind) -> Outcome<T> {
        telemetry::log(
            self.telemetry.as_ref(),
            LogLevel::Debug,
            message,
            &json!({ "reason": kind.label(), "size": self.registry.len() }),
        );
        Outcome::Ignored(kind)
    }
}

/// Builder for [`PickerSession`].
pub struct PickerSessionBuilder {
    telemetry: Option<PickerTelemetry>,
    seed: Option<u64>,
    settle_delay: Duration,
    group_size: usize,
    runtime: Option<Handle>,
}

impl Default for PickerSessionBuilder {
    fn default() -> Self {
        Self {
            telemetry: None,
            seed: None,
            settle_delay: SETTLE_DELAY,
            group_size: MIN_GROUP_SIZE,
            runtime: None,
        }
    }
}

impl PickerSessionBuilder {
    /// Applies a loaded config, opening its log and event files.
    pub fn config(mut self, config: &PickerConfig) -> Result<Self> {
        self.seed = config.seed.or(self.seed);
        self.settle_delay = config.wheel.settle_delay();
        self.group_size = config.groups.default_size;
        let settings = &config.telemetry;
        if settings.log_path.is_some() || settings.event_log.is_some() {
            let mut builder = PickerTelemetry::builder("session").min_level(settings.min_level);
            if let Some(path) = &settings.log_path {
                builder = builder.log_path(path);
            }
            if let Some(path) = &settings.event_log {
                let publisher = FileEventPublisher::new(path)
                    .with_context(|| format!("opening event log {}", path.display()))?;
                builder = builder.event_publisher(Arc::new(publisher) as Arc<dyn EventPublisher>);
            }
            self.telemetry = Some(builder.build().context("opening session log")?);
        }
        Ok(self)
    }

    /// Sets telemetry.
    #[must_use]
    pub fn telemetry(mut self, telemetry: PickerTelemetry) -> Self {
        self.telemetry = Some(telemetry);
        self
    }

    /// Seeds spins and shuffles.
    #[must_use]
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Overrides the wheel settle delay.
    #[must_use]
    pub fn settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    /// Initial group size; values below two fall back to two.
    #[must_use]
    pub fn group_size(mut self, size: usize) -> Self {
        self.group_size = size.max(MIN_GROUP_SIZE);
        self
    }

    /// Runtime for the wheel's settle timer. Defaults to the current one.
    #[must_use]
    pub fn runtime(mut self, handle: Handle) -> Self {
        self.runtime = Some(handle);
        self
    }

    /// Builds an empty session.
    pub fn build(self) -> Result<PickerSession> {
        let id = Uuid::new_v4();
        let telemetry = self.telemetry;
        let mut wheel = SelectionEngine::builder()
            .settle_delay(self.settle_delay)
            .random(source_for(self.seed));
        if let Some(handle) = self.runtime {
            wheel = wheel.runtime(handle);
        }
        if let Some(tel) = &telemetry {
            wheel = wheel.telemetry(tel.scoped("wheel"));
        }
        let wheel = wheel.build()?;
        let partitioner = GroupPartitioner::new(
            source_for(self.seed.map(|seed| seed.wrapping_add(1))),
            telemetry.as_ref().map(|tel| tel.scoped("groups")),
        );
        telemetry::log(
            telemetry.as_ref(),
            LogLevel::Info,
            "session.started",
            &json!({
                "session": id.to_string(),
                "seeded": self.seed.is_some(),
                "settle_ms": u64::try_from(self.settle_delay.as_millis()).unwrap_or(u64::MAX),
            }),
        );
        Ok(PickerSession {
            id,
            registry: NameRegistry::new(),
            recommendations: Vec::new(),
            group_size: self.group_size,
            groups: Partition::default(),
            partitioner,
            wheel,
            telemetry,
        })
    }
}
