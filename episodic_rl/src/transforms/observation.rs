//! Observation transforms: clipping and running normalization.

use crate::core::{Action, RunningStatistic};
use crate::environment::{Environment, HookOutcome, Info, Space, StepOutcome};
use crate::error::Result;

/// Clamp every observation element to `[low, high]`.
pub struct ClipObservations {
    inner: Box<dyn Environment>,
    low: f32,
    high: f32,
}

impl ClipObservations {
    pub fn new(inner: Box<dyn Environment>, low: f32, high: f32) -> Self {
        Self { inner, low, high }
    }

    fn clip(&self, mut obs: Vec<f32>) -> Vec<f32> {
        for x in obs.iter_mut() {
            *x = x.clamp(self.low, self.high);
        }
        obs
    }
}

impl Environment for ClipObservations {
    fn name(&self) -> &str {
        "clip_observations"
    }

    fn reset(&mut self) -> Result<(Vec<f32>, Info)> {
        let (obs, info) = self.inner.reset()?;
        Ok((self.clip(obs), info))
    }

    fn step(&mut self, action: &Action) -> Result<StepOutcome> {
        let mut out = self.inner.step(action)?;
        out.observation = self.clip(out.observation);
        Ok(out)
    }

    fn observation_space(&self) -> Space {
        match self.inner.observation_space() {
            Space::Box { shape, low, high } => Space::Box {
                shape,
                low: low.iter().map(|l| l.max(self.low)).collect(),
                high: high.iter().map(|h| h.min(self.high)).collect(),
            },
            discrete => discrete,
        }
    }

    fn action_space(&self) -> Space {
        self.inner.action_space()
    }

    fn inner(&self) -> Option<&dyn Environment> {
        Some(self.inner.as_ref())
    }

    fn inner_mut(&mut self) -> Option<&mut dyn Environment> {
        Some(self.inner.as_mut())
    }
}

/// Normalize observations with a [`RunningStatistic`].
///
/// Statistics are updated on `step` only while in training mode; every
/// observation (including the one returned by `reset`) is normalized in both
/// modes.
pub struct NormalizeObservations {
    inner: Box<dyn Environment>,
    stats: RunningStatistic,
    reset_stats_on_episode: bool,
}

impl NormalizeObservations {
    pub fn new(
        inner: Box<dyn Environment>,
        momentum: f64,
        epsilon: f64,
        reset_stats_on_episode: bool,
    ) -> Self {
        let dim = inner.observation_space().flat_dim();
        Self {
            inner,
            stats: RunningStatistic::with_config(dim, momentum, epsilon),
            reset_stats_on_episode,
        }
    }

    pub fn stats(&self) -> &RunningStatistic {
        &self.stats
    }

    /// Replace the running statistic (e.g. from a checkpoint).
    pub fn restore_stats(&mut self, stats: &RunningStatistic) -> Result<()> {
        self.stats.restore_from(stats)
    }

    pub fn is_training(&self) -> bool {
        !self.stats.is_frozen()
    }
}

impl Environment for NormalizeObservations {
    fn name(&self) -> &str {
        "normalize_observations"
    }

    fn reset(&mut self) -> Result<(Vec<f32>, Info)> {
        let (obs, info) = self.inner.reset()?;
        if self.is_training() && self.reset_stats_on_episode {
            self.stats.reset();
        }
        Ok((self.stats.normalize(&obs)?, info))
    }

    fn step(&mut self, action: &Action) -> Result<StepOutcome> {
        let mut out = self.inner.step(action)?;
        self.stats.update(&out.observation)?;
        out.observation = self.stats.normalize(&out.observation)?;
        Ok(out)
    }

    fn observation_space(&self) -> Space {
        let inner = self.inner.observation_space();
        let shape = inner
            .shape()
            .map(<[usize]>::to_vec)
            .unwrap_or_else(|| vec![inner.flat_dim()]);
        Space::unbounded(shape)
    }

    fn action_space(&self) -> Space {
        self.inner.action_space()
    }

    fn set_training(&mut self, training: bool) -> HookOutcome {
        self.stats.set_training(training);
        HookOutcome::Ok
    }

    fn running_statistic(&self) -> Option<&RunningStatistic> {
        Some(&self.stats)
    }

    fn running_statistic_mut(&mut self) -> Option<&mut RunningStatistic> {
        Some(&mut self.stats)
    }

    fn inner(&self) -> Option<&dyn Environment> {
        Some(self.inner.as_ref())
    }

    fn inner_mut(&mut self) -> Option<&mut dyn Environment> {
        Some(self.inner.as_mut())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transforms::tests::ScriptedEnv;

    #[test]
    fn test_clip_bounds_observation_and_space() {
        let base = ScriptedEnv::new(vec![vec![5.0, -5.0], vec![0.5, 20.0]]);
        let mut env = ClipObservations::new(Box::new(base), -1.0, 1.0);

        let (obs, _) = env.reset().unwrap();
        assert_eq!(obs, vec![1.0, -1.0]);
        let out = env.step(&Action::Discrete(0)).unwrap();
        assert_eq!(out.observation, vec![0.5, 1.0]);

        let Space::Box { low, high, .. } = env.observation_space() else {
            panic!("expected box space");
        };
        assert!(low.iter().all(|&l| l == -1.0));
        assert!(high.iter().all(|&h| h == 1.0));
    }

    #[test]
    fn test_normalize_updates_only_in_training() {
        let base = ScriptedEnv::new(vec![vec![1.0, 2.0], vec![3.0, 4.0], vec![5.0, 6.0]]);
        let mut env = NormalizeObservations::new(Box::new(base), 0.5, 1e-8, false);

        env.reset().unwrap();
        assert_eq!(env.stats().count(), 0, "reset does not update stats");

        env.step(&Action::Discrete(0)).unwrap();
        assert_eq!(env.stats().count(), 1);
        let snapshot = env.stats().clone();

        assert_eq!(env.set_training(false), HookOutcome::Ok);
        let out = env.step(&Action::Discrete(0)).unwrap();
        assert_eq!(env.stats().mean(), snapshot.mean());
        assert_eq!(env.stats().variance(), snapshot.variance());
        assert_eq!(out.observation, snapshot.normalize(&[5.0, 6.0]).unwrap());
    }

    #[test]
    fn test_reset_stats_on_episode_only_in_training() {
        let base = ScriptedEnv::new(vec![vec![1.0], vec![9.0]]);
        let mut env = NormalizeObservations::new(Box::new(base), 0.5, 1e-8, true);
        env.reset().unwrap();
        env.step(&Action::Discrete(0)).unwrap();
        assert_ne!(env.stats().mean(), &[0.0]);

        env.set_training(false);
        env.reset().unwrap();
        assert_ne!(env.stats().mean(), &[0.0], "evaluation reset keeps stats");

        env.set_training(true);
        env.reset().unwrap();
        assert_eq!(env.stats().mean(), &[0.0]);
    }

    #[test]
    fn test_restore_stats() {
        let base = ScriptedEnv::new(vec![vec![1.0, 1.0]]);
        let mut env = NormalizeObservations::new(Box::new(base), 0.99, 1e-8, false);
        let mut saved = RunningStatistic::new(2);
        saved.update(&[4.0, -4.0]).unwrap();
        env.restore_stats(&saved).unwrap();
        assert_eq!(env.stats().mean(), saved.mean());

        let wrong = RunningStatistic::new(3);
        assert!(env.restore_stats(&wrong).is_err());
    }
}
