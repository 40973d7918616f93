//! Outcome oracle: decides whether a single execution attempt passes.
//!
//! The engine asks for a draw in `[0, 100)` and compares it against the
//! configured failure threshold. Draws strictly above the threshold pass,
//! so threshold 0 always passes and threshold 100 always fails.

use std::collections::VecDeque;
use std::sync::Mutex;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::model::TaskId;

/// Verdict for one attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Pass,
    Fail,
}

impl Verdict {
    pub fn as_str(self) -> &'static str {
        match self {
            Verdict::Pass => "pass",
            Verdict::Fail => "fail",
        }
    }
}

/// Source of attempt draws. Implementations must be cheap and must not block.
pub trait OutcomeOracle: Send + Sync {
    /// A value in `[0, 100)` for attempt `retry` of task `id`.
    fn draw(&self, id: TaskId, retry: u32) -> f64;

    fn verdict(&self, id: TaskId, retry: u32, failure_threshold: u8) -> Verdict {
        if self.draw(id, retry) > f64::from(failure_threshold) {
            Verdict::Pass
        } else {
            Verdict::Fail
        }
    }
}

/// Uniform random draws from a seedable generator.
pub struct RandomOracle {
    rng: Mutex<StdRng>,
}

impl RandomOracle {
    /// Seeded from OS entropy.
    pub fn new() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_os_rng()),
        }
    }

    /// Reproducible sequence of draws.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl Default for RandomOracle {
    fn default() -> Self {
        Self::new()
    }
}

impl OutcomeOracle for RandomOracle {
    fn draw(&self, _id: TaskId, _retry: u32) -> f64 {
        let mut rng = match self.rng.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        rng.random_range(0.0..100.0)
    }
}

/// Replays a fixed list of draws, then a fallback forever. Records every
/// `(id, retry)` it was asked about.
pub struct ScriptedOracle {
    script: Mutex<VecDeque<f64>>,
    fallback: f64,
    seen: Mutex<Vec<(TaskId, u32)>>,
}

impl ScriptedOracle {
    pub fn new(script: impl IntoIterator<Item = f64>, fallback: f64) -> Self {
        Self {
            script: Mutex::new(script.into_iter().collect()),
            fallback,
            seen: Mutex::new(Vec::new()),
        }
    }

    /// Every attempt passes for any threshold below 100.
    pub fn always_pass() -> Self {
        Self::new([], 99.999)
    }

    /// Every attempt fails for any threshold.
    pub fn always_fail() -> Self {
        Self::new([], 0.0)
    }

    /// Attempts observed so far, in call order.
    pub fn attempts(&self) -> Vec<(TaskId, u32)> {
        match self.seen.lock() {
            Ok(seen) => seen.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Attempts observed for one task.
    pub fn attempts_for(&self, id: TaskId) -> Vec<u32> {
        self.attempts()
            .into_iter()
            .filter(|(seen, _)| *seen == id)
            .map(|(_, retry)| retry)
            .collect()
    }
}

impl OutcomeOracle for ScriptedOracle {
    fn draw(&self, id: TaskId, retry: u32) -> f64 {
        if let Ok(mut seen) = self.seen.lock() {
            seen.push((id, retry));
        }
        self.script
            .lock()
            .ok()
            .and_then(|mut script| script.pop_front())
            .unwrap_or(self.fallback)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn threshold_zero_passes_any_positive_draw() {
        let scripted = ScriptedOracle::new([0.001, 50.0, 99.9], 1.0);
        assert_eq!(scripted.verdict(TaskId(1), 0, 0), Verdict::Pass);
        assert_eq!(scripted.verdict(TaskId(1), 1, 0), Verdict::Pass);
        assert_eq!(scripted.verdict(TaskId(1), 2, 0), Verdict::Pass);
    }

    #[test]
    fn threshold_hundred_always_fails() {
        let oracle = RandomOracle::seeded(11);
        for retry in 0..1_000 {
            assert_eq!(oracle.verdict(TaskId(1), retry, 100), Verdict::Fail);
        }
    }

    #[test]
    fn draw_equal_to_threshold_fails() {
        let oracle = ScriptedOracle::new([50.0], 0.0);
        assert_eq!(oracle.verdict(TaskId(1), 0, 50), Verdict::Fail);
    }

    #[test]
    fn random_draws_stay_in_range() {
        let oracle = RandomOracle::seeded(3);
        for retry in 0..10_000 {
            let d = oracle.draw(TaskId(9), retry);
            assert!((0.0..100.0).contains(&d), "draw {d} out of range");
        }
    }

    #[test]
    fn seeded_oracles_repeat() {
        let a = RandomOracle::seeded(42);
        let b = RandomOracle::seeded(42);
        for retry in 0..32 {
            assert_eq!(a.draw(TaskId(1), retry), b.draw(TaskId(1), retry));
        }
    }

    #[test]
    fn scripted_oracle_records_attempts() {
        let oracle = ScriptedOracle::new([1.0, 80.0], 0.0);
        assert_eq!(oracle.verdict(TaskId(3), 0, 50), Verdict::Fail);
        assert_eq!(oracle.verdict(TaskId(3), 1, 50), Verdict::Pass);
        assert_eq!(oracle.verdict(TaskId(4), 0, 50), Verdict::Fail);
        assert_eq!(oracle.attempts_for(TaskId(3)), vec![0, 1]);
        assert_eq!(oracle.attempts().len(), 3);
    }
}
