//! Reward normalization.

use crate::core::{Action, RunningStatistic};
use crate::environment::{Environment, HookOutcome, Info, Space, StepOutcome};
use crate::error::Result;

/// Normalize rewards with a scalar [`RunningStatistic`].
///
/// Updated only in training mode; applied in both modes.
pub struct NormalizeRewards {
    inner: Box<dyn Environment>,
    stats: RunningStatistic,
}

impl NormalizeRewards {
    pub fn new(inner: Box<dyn Environment>, momentum: f64, epsilon: f64) -> Self {
        Self {
            inner,
            stats: RunningStatistic::with_config(1, momentum, epsilon),
        }
    }

    pub fn stats(&self) -> &RunningStatistic {
        &self.stats
    }

    pub fn restore_stats(&mut self, stats: &RunningStatistic) -> Result<()> {
        self.stats.restore_from(stats)
    }
}

impl Environment for NormalizeRewards {
    fn name(&self) -> &str {
        "normalize_rewards"
    }

    fn reset(&mut self) -> Result<(Vec<f32>, Info)> {
        self.inner.reset()
    }

    fn step(&mut self, action: &Action) -> Result<StepOutcome> {
        let mut out = self.inner.step(action)?;
        self.stats.update_scalar(out.reward)?;
        out.reward = self.stats.normalize_scalar(out.reward)?;
        Ok(out)
    }

    fn observation_space(&self) -> Space {
        self.inner.observation_space()
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
