use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Source of uniformly distributed values in `[0, 1)`.
pub trait RandomSource: Send {
    fn next_unit(&mut self) -> f64;
}

/// Backed by the thread-local generator; used by the running app.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadRandom;

impl RandomSource for ThreadRandom {
    fn next_unit(&mut self) -> f64 {
        rand::random::<f64>()
    }
}

/// Reproducible sequence for tests and replays.
#[derive(Debug, Clone)]
pub struct SeededRandom {
    rng: StdRng,
}

impl SeededRandom {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl RandomSource for SeededRandom {
    fn next_unit(&mut self) -> f64 {
        self.rng.random::<f64>()
    }
}

impl<F> RandomSource for F
where
    F: FnMut() -> f64 + Send,
{
    fn next_unit(&mut self) -> f64 {
        self()
    }
}
