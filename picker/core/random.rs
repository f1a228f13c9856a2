use std::fmt;

use rand::{rngs::SmallRng, Rng, SeedableRng};

/// Source of randomness for spins and shuffles.
///
/// Engines take a boxed source so tests can pin outcomes with a seed or a script.
pub trait RandomSource: Send {
    /// Uniform value in `[0, 1)`.
    fn unit(&mut self) -> f64;

    /// Uniform index in `[0, upper)`. `upper` must be non-zero.
    fn below(&mut self, upper: usize) -> usize;
}

/// Reproducible source backed by `SmallRng`.
pub struct SeededRandom {
    seed: u64,
    rng: SmallRng,
}

impl SeededRandom {
    /// Creates a source from a seed.
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            rng: SmallRng::seed_from_u64(seed),
        }
    }

    /// Seed the source was created with.
    #[must_use]
    pub fn seed(&self) -> u64 {
        self.seed
    }
}

impl fmt::Debug for SeededRandom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SeededRandom")
            .field("seed", &self.seed)
            .finish_non_exhaustive()
    }
}

impl RandomSource for SeededRandom {
    fn unit(&mut self) -> f64 {
        self.rng.gen::<f64>()
    }

    fn below(&mut self, upper: usize) -> usize {
        self.rng.gen_range(0..upper)
    }
}

/// Non-reproducible source drawing from the thread-local generator.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadRandom;

impl RandomSource for ThreadRandom {
    fn unit(&mut self) -> f64 {
        rand::thread_rng().gen::<f64>()
    }

    fn below(&mut self, upper: usize) -> usize {
        rand::thread_rng().gen_range(0..upper)
    }
}

/// Replays a fixed list of unit values, cycling when exhausted.
///
/// `below(upper)` maps the next value onto `[0, upper)`, so a script of zeros
/// always picks the first candidate.
#[derive(Debug, Clone)]
pub struct ScriptedRandom {
    values: Vec<f64>,
    cursor: usize,
}

impl ScriptedRandom {
    /// Creates a script; values are clamped into `[0, 1)`.
    #[must_use]
    pub fn new(values: impl IntoIterator<Item = f64>) -> Self {
        let values: Vec<f64> = values
            .into_iter()
            .map(|value| value.clamp(0.0, 1.0 - f64::EPSILON))
            .collect();
        Self {
            values: if values.is_empty() { vec![0.0] } else { values },
            cursor: 0,
        }
    }

    fn next_value(&mut self) -> f64 {
        let value = self.values[self.cursor % self.values.len()];
        self.cursor += 1;
        value
    }
}

impl RandomSource for ScriptedRandom {
    fn unit(&mut self) -> f64 {
        self.next_value()
    }

    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    fn below(&mut self, upper: usize) -> usize {
        ((self.next_value() * upper as f64) as usize).min(upper.saturating_sub(1))
    }
}

/// Fresh seed for sessions that did not ask for one.
#[must_use]
pub fn random_seed() -> u64 {
    rand::thread_rng().gen()
}

/// Boxed source: seeded when a seed is given, thread-local otherwise.
#[must_use]
pub fn source_for(seed: Option<u64>) -> Box<dyn RandomSource> {
    match seed {
        Some(seed) => Box::new(SeededRandom::new(seed)),
        None => Box::new(ThreadRandom),
    }
}

/// In-place Fisher–Yates shuffle driven by `source`.
pub fn shuffle<T>(items: &mut [T], source: &mut dyn RandomSource) {
    for i in (1..items.len()).rev() {
        let j = source.below(i + 1);
        items.swap(i, j);
    }
}
