#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    missing_docs,
    rust_2018_idioms
)]

//! Name picker core: a registry of unique names, a spin-the-wheel selection
//! engine, group-size recommendations and random group partitioning.

/// Session configuration loaded from TOML.
#[path = "../config.rs"]
pub mod config;

/// Applied/ignored request outcomes.
#[path = "../outcome.rs"]
pub mod outcome;

/// Group partitioning.
#[path = "../partition.rs"]
pub mod partition;

/// Injectable randomness and the unbiased shuffle.
#[path = "../random.rs"]
pub mod random;

/// Group-size recommendations.
#[path = "../recommend.rs"]
pub mod recommend;

/// Ordered set of unique names.
#[path = "../registry.rs"]
pub mod registry;

/// Session facade tying names, wheel and groups together.
#[path = "../session.rs"]
pub mod session;

/// External name providers.
#[path = "../source.rs"]
pub mod source;

/// Log and event handles.
#[path = "../telemetry.rs"]
pub mod telemetry;

/// Spin-the-wheel selection engine.
#[path = "../wheel.rs"]
pub mod wheel;

pub use config::{ConfigError, PickerConfig};
pub use outcome::{NoopKind, Outcome};
pub use partition::{GroupPartitioner, Partition};
pub use random::{RandomSource, ScriptedRandom, SeededRandom, ThreadRandom};
pub use recommend::{recommend, GroupPreview, GroupSizeRecommendation};
pub use registry::{ImportOutcome, NameRegistry};
pub use session::{PickerSession, PickerSessionBuilder};
pub use source::{NameSource, RowsSource, SourceError, TextFileSource};
pub use telemetry::{PickerTelemetry, PickerTelemetryBuilder};
pub use wheel::{EngineError, SelectionEngine, SelectionResult, WheelPhase};
