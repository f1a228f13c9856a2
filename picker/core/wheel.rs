use std::{sync::Arc, time::Duration};

use parking_lot::Mutex;
use picker_event_bus::SessionEvent;
use picker_logging::LogLevel;
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;
use tokio::{runtime::Handle, task::JoinHandle};

use crate::{
    outcome::{NoopKind, Outcome},
    random::{RandomSource, ThreadRandom},
    recommend::MIN_GROUP_SIZE,
    registry::NameRegistry,
    telemetry::{self, PickerTelemetry},
};

/// Time between a spin and the winner becoming available.
pub const SETTLE_DELAY: Duration = Duration::from_millis(3000);
/// Four full turns, added to every spin.
pub const MIN_SPIN_DEGREES: f64 = 1440.0;
const FULL_TURN: f64 = 360.0;

/// Maps an accumulated rotation onto the section under the fixed top pointer.
///
/// Sections start at 0° and run clockwise in registry order. The wheel turns
/// clockwise, so the pointer sees the counter-rotated angle. Returns `None` for
/// fewer than two sections or a non-finite rotation.
#[must_use]
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
pub fn winner_index(rotation: f64, count: usize) -> Option<usize> {
    if count < MIN_GROUP_SIZE || !rotation.is_finite() {
        return None;
    }
    let section = FULL_TURN / count as f64;
    let normalized = (FULL_TURN - rotation.rem_euclid(FULL_TURN)).rem_euclid(FULL_TURN);
    let index = (normalized / section).floor() as usize;
    Some(index.min(count - 1))
}

/// Winner of a settled spin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionResult {
    /// Index into the names as they were when the spin started.
    pub winner_index: usize,
    /// The winning name.
    pub winner_name: String,
}

/// Where the wheel is in its spin cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum WheelPhase {
    /// At rest, ready to spin.
    Idle,
    /// Spinning; the winner is pending.
    Spinning,
    /// Stopped on a winner.
    Settled(SelectionResult),
}

/// Errors raised while assembling a [`SelectionEngine`].
#[derive(Debug, Error)]
pub enum EngineError {
    /// The settle timer is scheduled on tokio and none was reachable.
    #[error("selection engine requires a tokio runtime for its settle timer")]
    NoRuntime,
}

#[derive(Debug)]
struct WheelState {
    rotation: f64,
    phase: WheelPhase,
    // Bumped by every spin and reset; a settle task only applies its own generation.
    generation: u64,
}

/// Spin-the-wheel state machine with a cancelable settle timer.
pub struct SelectionEngine {
    state: Arc<Mutex<WheelState>>,
    pending: Option<JoinHandle<()>>,
    settle_delay: Duration,
    random: Box<dyn RandomSource>,
    runtime: Handle,
    telemetry: Option<PickerTelemetry>,
}

impl std::fmt::Debug for SelectionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SelectionEngine")
            .field("state", &*self.state.lock())
            .field("settle_delay", &self.settle_delay)
            .finish_non_exhaustive()
    }
}

impl SelectionEngine {
    /// Returns a builder.
    #[must_use]
    pub fn builder() -> SelectionEngineBuilder {
        SelectionEngineBuilder::default()
    }

    /// Starts a spin over the current names.
    ///
    /// Ignored with fewer than two names or while a spin is pending. Spinning
    /// from a settled wheel clears the previous winner and keeps adding to the
    /// rotation. The winner is computed after the settle delay from the names
    /// captured here.
    pub fn spin(&mut self, registry: &NameRegistry) -> Outcome<f64> {
        if registry.len() < MIN_GROUP_SIZE {
            return self.ignore(NoopKind::ValidationNoop, registry.len());
        }
        let (rotation, generation) = {
            let mut state = self.state.lock();
            if state.phase == WheelPhase::Spinning {
                drop(state);
                return self.ignore(NoopKind::PendingConflict, registry.len());
            }
            let magnitude = self.random.unit() * FULL_TURN;
            state.rotation += magnitude + MIN_SPIN_DEGREES;
            state.phase = WheelPhase::Spinning;
            state.generation += 1;
            (state.rotation, state.generation)
        };

        let names = registry.snapshot();
        let shared = Arc::clone(&self.state);
        let delay = self.settle_delay;
        let telemetry = self.telemetry.clone();
        self.pending = Some(self.runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            settle(&shared, generation, &names, telemetry.as_ref());
        }));

        let settle_ms = u64::try_from(self.settle_delay.as_millis()).unwrap_or(u64::MAX);
        telemetry::log(
            self.telemetry.as_ref(),
            LogLevel::Info,
            "wheel.spin.started",
            &json!({ "rotation": rotation, "names": registry.len(), "settle_ms": settle_ms }),
        );
        telemetry::emit(
            self.telemetry.as_ref(),
            SessionEvent::SpinStarted {
                rotation,
                settle_ms,
            },
        );
        Outcome::Applied(rotation)
    }

    /// Back to rest at zero: cancels a pending spin and clears the result.
    ///
    /// Returns whether a pending spin was cancelled. Calling it twice is the same
    /// as calling it once.
    pub fn reset(&mut self) -> bool {
        if let Some(handle) = self.pending.take() {
            handle.abort();
        }
        let cancelled = {
            let mut state = self.state.lock();
            let cancelled = state.phase == WheelPhase::Spinning;
            state.generation += 1;
            state.rotation = 0.0;
            state.phase = WheelPhase::Idle;
            cancelled
        };
        telemetry::log(
            self.telemetry.as_ref(),
            LogLevel::Info,
            "wheel.reset",
            &json!({ "cancelled": cancelled }),
        );
        telemetry::emit(
            self.telemetry.as_ref(),
            SessionEvent::WheelReset { cancelled },
        );
        cancelled
    }

    /// Waits for a pending spin to settle and returns the current result.
    pub async fn settled(&mut self) -> Option<SelectionResult> {
        if let Some(handle) = self.pending.take() {
            // A cancelled task resolves with a JoinError; the state already says Idle.
            let _ = handle.await;
        }
        self.result()
    }

    /// Accumulated rotation in degrees, as the renderer should draw it.
    #[must_use]
    pub fn rotation(&self) -> f64 {
        self.state.lock().rotation
    }

    /// Current phase.
    #[must_use]
    pub fn phase(&self) -> WheelPhase {
        self.state.lock().phase.clone()
    }

    /// True while a winner is pending.
    #[must_use]
    pub fn is_spinning(&self) -> bool {
        self.state.lock().phase == WheelPhase::Spinning
    }

    /// Winner of the last settled spin.
    #[must_use]
    pub fn result(&self) -> Option<SelectionResult> {
        match &self.state.lock().phase {
            WheelPhase::Settled(result) => Some(result.clone()),
            _ => None,
        }
    }

    /// Configured settle delay.
    #[must_use]
    pub fn settle_delay(&self) -> Duration {
        self.settle_delay
    }

    fn ignore(&self, kind: NoopKind, names: usize) -> Outcome<f64> {
        telemetry::log(
            self.telemetry.as_ref(),
            LogLevel::Debug,
            "wheel.spin.ignored",
            &json!({ "reason": kind.label(), "names": names }),
        );
        Outcome::Ignored(kind)
    }
}

impl Drop for SelectionEngine {
    fn drop(&mut self) {
        if let Some(handle) = self.pending.take() {
            handle.abort();
        }
    }
}

fn settle(
    shared: &Mutex<WheelState>,
    generation: u64,
    names: &[String],
    telemetry: Option<&PickerTelemetry>,
) {
    let settled = {
        let mut state = shared.lock();
        if state.generation != generation || state.phase != WheelPhase::Spinning {
            return;
        }
        let Some(index) = winner_index(state.rotation, names.len()) else {
            state.phase = WheelPhase::Idle;
            return;
        };
        let result = SelectionResult {
            winner_index: index,
            winner_name: names[index].clone(),
        };
        state.phase = WheelPhase::Settled(result.clone());
        (result, state.rotation)
    };
    let (result, rotation) = settled;
    telemetry::log(
        telemetry,
        LogLevel::Info,
        "wheel.spin.settled",
        &json!({
            "winner_index": result.winner_index,
            "winner_name": result.winner_name,
            "rotation": rotation,
        }),
    );
    telemetry::emit(
        telemetry,
        SessionEvent::SpinSettled {
            winner_index: result.winner_index,
            winner_name: result.winner_name,
            rotation,
        },
    );
}

/// Builder for [`SelectionEngine`].
pub struct SelectionEngineBuilder {
    settle_delay: Duration,
    random: Option<Box<dyn RandomSource>>,
    runtime: Option<Handle>,
    telemetry: Option<PickerTelemetry>,
}

impl Default for SelectionEngineBuilder {
    fn default() -> Self {
        Self {
            settle_delay: SETTLE_DELAY,
            random: None,
            runtime: None,
            telemetry: None,
        }
    }
}

impl SelectionEngineBuilder {
    /// Overrides the settle delay.
    #[must_use]
    pub fn settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    /// Sets the random source for spin magnitudes.
    #[must_use]
    pub fn random(mut self, random: Box<dyn RandomSource>) -> Self {
        self.random = Some(random);
        self
    }

    /// Runtime the settle timer is scheduled on. Defaults to the current one.
    #[must_use]
    pub fn runtime(mut self, handle: Handle) -> Self {
        self.runtime = Some(handle);
        self
    }

    /// Sets telemetry.
    #[must_use]
    pub fn telemetry(mut self, telemetry: PickerTelemetry) -> Self {
        self.telemetry = Some(telemetry);
        self
    }

    /// Builds the engine in the idle state.
    pub fn build(self) -> Result<SelectionEngine, EngineError> {
        let runtime = match self.runtime {
            Some(handle) => handle,
            None => Handle::try_current().map_err(|_| EngineError::NoRuntime)?,
        };
        Ok(SelectionEngine {
            state: Arc::new(Mutex::new(WheelState {
                rotation: 0.0,
                phase: WheelPhase::Idle,
                generation: 0,
            })),
            pending: None,
            settle_delay: self.settle_delay,
            random: self.random.unwrap_or_else(|| Box::new(ThreadRandom)),
            runtime,
            telemetry: self.telemetry,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::random::{ScriptedRandom, SeededRandom};
    use picker_event_bus::MemoryEventBus;
    use tokio::time::Instant;

    fn four() -> NameRegistry {
        NameRegistry::from_names(["north", "east", "south", "west"])
    }

    fn scripted(value: f64) -> SelectionEngine {
        SelectionEngine::builder()
            .random(Box::new(ScriptedRandom::new([value])))
            .build()
            .unwrap()
    }

    #[test]
    fn quarter_turn_past_full_lands_on_last_of_four() {
        assert_eq!(winner_index(450.0, 4), Some(3));
    }

    #[test]
    fn zero_rotation_is_first_section() {
        assert_eq!(winner_index(0.0, 4), Some(0));
        assert_eq!(winner_index(720.0, 3), Some(0));
    }

    #[test]
    fn index_always_in_range() {
        let mut source = SeededRandom::new(9);
        for count in 2..40 {
            for _ in 0..50 {
                let rotation = (source.unit() - 0.5) * 1.0e6;
                let index = winner_index(rotation, count).unwrap();
                assert!(index < count);
            }
            assert!(winner_index(-f64::MIN_POSITIVE, count).unwrap() < count);
            assert!(winner_index(359.999_999_999_9, count).unwrap() < count);
        }
    }

    #[test]
    fn degenerate_inputs_have_no_winner() {
        assert_eq!(winner_index(90.0, 1), None);
        assert_eq!(winner_index(f64::NAN, 4), None);
    }

    #[test]
    fn build_without_runtime_fails() {
        assert!(matches!(
            SelectionEngine::builder().build(),
            Err(EngineError::NoRuntime)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn spin_settles_after_delay() {
        let mut engine = scripted(0.25);
        let started = Instant::now();
        // 0.25 of a turn plus four full turns: 1530 degrees, 90 past a full turn.
        assert_eq!(engine.spin(&four()), Outcome::Applied(1530.0));
        assert!(engine.is_spinning());
        assert_eq!(engine.result(), None);

        let result = engine.settled().await.unwrap();
        assert!(started.elapsed() >= SETTLE_DELAY);
        assert_eq!(result.winner_index, 3);
        assert_eq!(result.winner_name, "west");
        assert_eq!(engine.phase(), WheelPhase::Settled(result));
        assert!((engine.rotation() - 1530.0).abs() < f64::EPSILON);
    }

    #[tokio::test(start_paused = true)]
    async fn result_not_available_before_delay() {
        let mut engine = scripted(0.5);
        engine.spin(&four());
        tokio::time::advance(SETTLE_DELAY - Duration::from_millis(1)).await;
        tokio::task::yield_now().await;
        assert!(engine.is_spinning());
        assert!(engine.settled().await.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn second_spin_while_pending_is_ignored() {
        let mut engine = scripted(0.1);
        let first = engine.spin(&four()).applied().unwrap();
        assert_eq!(
            engine.spin(&four()),
            Outcome::Ignored(NoopKind::PendingConflict)
        );
        assert!((engine.rotation() - first).abs() < f64::EPSILON);
        engine.settled().await;
        assert!(engine.spin(&four()).is_applied());
        assert!(engine.is_spinning());
    }

    #[tokio::test(start_paused = true)]
    async fn rotation_accumulates_across_spins() {
        let mut engine = SelectionEngine::builder()
            .random(Box::new(ScriptedRandom::new([0.25, 0.5])))
            .build()
            .unwrap();
        let first = engine.spin(&four()).applied().unwrap();
        let winner = engine.settled().await.unwrap();
        assert_eq!(winner.winner_name, "west");

        let second = engine.spin(&four()).applied().unwrap();
        assert!(second > first + MIN_SPIN_DEGREES);
        assert!((second - (1530.0 + 1620.0)).abs() < f64::EPSILON);
        assert_eq!(engine.result(), None);

        let again = engine.settled().await.unwrap();
        // 3150 degrees is 270 past a full turn: the pointer sees 90, section 1.
        assert_eq!(again.winner_index, 1);
        assert!((engine.rotation() - second).abs() < f64::EPSILON);
    }

    #[tokio::test(start_paused = true)]
    async fn too_few_names_is_ignored() {
        let mut engine = scripted(0.1);
        let single = NameRegistry::from_names(["solo"]);
        assert_eq!(
            engine.spin(&single),
            Outcome::Ignored(NoopKind::ValidationNoop)
        );
        assert_eq!(engine.phase(), WheelPhase::Idle);
        assert!(engine.rotation().abs() < f64::EPSILON);
    }

    #[tokio::test(start_paused = true)]
    async fn reset_cancels_pending_spin() {
        let bus = Arc::new(MemoryEventBus::new(8));
        let telemetry = PickerTelemetry::builder("wheel")
            .event_publisher(bus.clone())
            .build()
            .unwrap();
        let mut engine = SelectionEngine::builder()
            .random(Box::new(ScriptedRandom::new([0.3])))
            .telemetry(telemetry)
            .build()
            .unwrap();
        engine.spin(&four());
        tokio::time::advance(Duration::from_millis(1000)).await;
        assert!(engine.reset());
        tokio::time::sleep(SETTLE_DELAY * 2).await;
        assert_eq!(engine.phase(), WheelPhase::Idle);
        assert_eq!(engine.result(), None);
        assert!(engine.rotation().abs() < f64::EPSILON);
        assert_eq!(bus.event_types(), vec!["wheel.spin.started", "wheel.reset"]);
    }

    #[tokio::test(start_paused = true)]
    async fn reset_twice_matches_reset_once() {
        let mut engine = scripted(0.7);
        engine.spin(&four());
        engine.settled().await;
        assert!(!engine.reset());
        let once = (engine.phase(), engine.rotation(), engine.result());
        assert!(!engine.reset());
        let twice = (engine.phase(), engine.rotation(), engine.result());
        assert_eq!(once, twice);
        assert_eq!(once.0, WheelPhase::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn rotation_accumulates_from_reset_point() {
        let mut engine = scripted(0.0);
        engine.spin(&four());
        engine.settled().await;
        engine.reset();
        assert_eq!(engine.spin(&four()), Outcome::Applied(MIN_SPIN_DEGREES));
        let result = engine.settled().await.unwrap();
        assert_eq!(result.winner_index, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn winner_uses_names_captured_at_spin() {
        let mut engine = scripted(0.25);
        let mut registry = four();
        engine.spin(&registry);
        registry.remove("west");
        let result = engine.settled().await.unwrap();
        assert_eq!(result.winner_name, "west");
    }

    #[tokio::test(start_paused = true)]
    async fn custom_delay_is_honoured() {
        let mut engine = SelectionEngine::builder()
            .settle_delay(Duration::from_millis(250))
            .random(Box::new(SeededRandom::new(4)))
            .build()
            .unwrap();
        let started = Instant::now();
        engine.spin(&four());
        engine.settled().await.unwrap();
        assert!(started.elapsed() >= Duration::from_millis(250));
        assert!(started.elapsed() < SETTLE_DELAY);
    }
}
