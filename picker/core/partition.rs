use serde::{Deserialize, Serialize};
use serde_json::json;

use picker_logging::LogLevel;

use crate::{
    random::{shuffle, RandomSource},
    recommend::MIN_GROUP_SIZE,
    registry::NameRegistry,
    telemetry::{self, PickerTelemetry},
};

/// One group of names.
pub type Group = Vec<String>;

/// Groups produced by one partition run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Partition {
    /// Size the groups were cut with, after clamping.
    pub group_size: usize,
    /// Groups in order; only the last one may be short.
    pub groups: Vec<Group>,
}

impl Partition {
    /// True when no groups were produced.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Number of groups.
    #[must_use]
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    /// Member count of every group.
    #[must_use]
    pub fn group_sizes(&self) -> Vec<usize> {
        self.groups.iter().map(Vec::len).collect()
    }

    /// All names in group order.
    pub fn members(&self) -> impl Iterator<Item = &str> + '_ {
        self.groups.iter().flatten().map(String::as_str)
    }
}

/// Clamps a requested size into `[2, total]`.
#[must_use]
pub fn effective_group_size(requested: usize, total: usize) -> usize {
    requested.clamp(MIN_GROUP_SIZE, total.max(MIN_GROUP_SIZE))
}

/// Shuffles the registry and cuts it into consecutive groups.
pub struct GroupPartitioner {
    random: Box<dyn RandomSource>,
    telemetry: Option<PickerTelemetry>,
}

impl std::fmt::Debug for GroupPartitioner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GroupPartitioner")
            .field("telemetry", &self.telemetry)
            .finish_non_exhaustive()
    }
}

impl GroupPartitioner {
    /// Creates a partitioner drawing from `random`.
    #[must_use]
    pub fn new(random: Box<dyn RandomSource>, telemetry: Option<PickerTelemetry>) -> Self {
        Self { random, telemetry }
    }

    /// Partitions the registry into groups of `group_size`.
    ///
    /// Fewer than two names yields an empty partition. The size is clamped into
    /// `[2, len]`; the remainder forms a shorter trailing group.
    pub fn partition(&mut self, registry: &NameRegistry, group_size: usize) -> Partition {
        if registry.len() < MIN_GROUP_SIZE {
            telemetry::log(
                self.telemetry.as_ref(),
                LogLevel::Debug,
                "groups.generate.ignored",
                &json!({ "size": registry.len() }),
            );
            return Partition::default();
        }
        let size = effective_group_size(group_size, registry.len());
        if size != group_size {
            telemetry::log(
                self.telemetry.as_ref(),
                LogLevel::Warn,
                "groups.size.clamped",
                &json!({ "requested": group_size, "used": size }),
            );
        }
        let mut names = registry.snapshot();
        shuffle(&mut names, self.random.as_mut());
        let groups: Vec<Group> = names.chunks(size).map(<[String]>::to_vec).collect();
        Partition {
            group_size: size,
            groups,
        }
    }
}
