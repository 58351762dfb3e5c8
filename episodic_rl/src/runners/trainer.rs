//! Single-process episodic training loop.
//!
//! ```text
//!          train()                   eval_every hit
//!  Idle ───────────► Training ──────────────────────► Evaluating
//!   ▲                 │   ▲                               │
//!   │    loop done    │   └───────────────────────────────┘
//!   └─────────────────┤
//!                     │ checkpoint_every hit
//!                     ▼
//!               Checkpointing ──► Training
//! ```
//!
//! Episode numbers are global: a trainer restored from a checkpoint keeps
//! counting from the checkpoint's episode index, so schedules and checkpoint
//! names continue where the previous run stopped.

use std::path::{Path, PathBuf};

use crate::agents::{Agent, AgentKind};
use crate::checkpoint::{Checkpoint, Checkpointer, Metadata, TrainingState};
use crate::environment::{Environment, HookOutcome};
use crate::error::{Result, RlError};
use crate::metrics::{MetricsLogger, MetricsWindow, NullLogger, TrainingSnapshot, DEFAULT_WINDOW_SIZE};
use crate::transforms::TransformChain;

use super::strategies::{EpisodeOutcome, TrainingStrategy};

/// Trainer phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Idle,
    Training,
    Evaluating,
    Checkpointing,
}

/// When to evaluate and checkpoint during [`Trainer::train`].
#[derive(Debug, Clone, PartialEq)]
pub struct TrainSchedule {
    pub eval_every: Option<usize>,
    pub eval_episodes: usize,
    pub checkpoint_every: Option<usize>,
    pub checkpoint_on_final: bool,
}

impl Default for TrainSchedule {
    fn default() -> Self {
        Self {
            eval_every: None,
            eval_episodes: 5,
            checkpoint_every: None,
            checkpoint_on_final: false,
        }
    }
}

impl TrainSchedule {
    pub fn with_eval_every(mut self, every: usize, episodes: usize) -> Self {
        self.eval_every = Some(every);
        self.eval_episodes = episodes;
        self
    }

    pub fn with_checkpoint_every(mut self, every: usize) -> Self {
        self.checkpoint_every = Some(every);
        self
    }

    pub fn with_checkpoint_on_final(mut self, on_final: bool) -> Self {
        self.checkpoint_on_final = on_final;
        self
    }

    fn wants_checkpoints(&self) -> bool {
        self.checkpoint_every.is_some() || self.checkpoint_on_final
    }
}

/// Aggregate of greedy evaluation episodes.
#[derive(Debug, Clone, PartialEq)]
pub struct EvalResult {
    pub episodes: usize,
    pub reward_mean: f32,
    pub length_mean: f32,
}

/// Outcome of a [`Trainer::train`] call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrainReport {
    /// Episodes run by this call.
    pub episodes: usize,
    pub env_steps: u64,
    pub rewards: Vec<f32>,
    /// Windowed mean reward after the last episode.
    pub final_avg_reward: f32,
    /// `(episode, result)` for each evaluation, in order.
    pub evaluations: Vec<(u64, EvalResult)>,
    pub checkpoints: Vec<PathBuf>,
}

/// Drives an agent through training and evaluation episodes.
pub struct Trainer<S: TrainingStrategy> {
    env: TransformChain,
    agent: Box<dyn Agent>,
    strategy: S,
    metrics: MetricsWindow,
    logger: Box<dyn MetricsLogger>,
    checkpointer: Option<Checkpointer>,
    config_yaml: String,
    state: LoopState,
    episode_index: u64,
    env_steps: u64,
    closed: bool,
}

impl<S: TrainingStrategy> Trainer<S> {
    pub fn new(env: TransformChain, agent: Box<dyn Agent>, strategy: S) -> Self {
        Self {
            env,
            agent,
            strategy,
            metrics: MetricsWindow::new(DEFAULT_WINDOW_SIZE),
            logger: Box::new(NullLogger),
            checkpointer: None,
            config_yaml: String::new(),
            state: LoopState::Idle,
            episode_index: 0,
            env_steps: 0,
            closed: false,
        }
    }

    pub fn with_logger<L: MetricsLogger + 'static>(mut self, logger: L) -> Self {
        self.logger = Box::new(logger);
        self
    }

    /// Directory writer for scheduled checkpoints.
    pub fn with_checkpointer(mut self, checkpointer: Checkpointer) -> Self {
        self.checkpointer = Some(checkpointer);
        self
    }

    /// Resolved configuration embedded into every checkpoint.
    pub fn with_config_yaml(mut self, config_yaml: String) -> Self {
        self.config_yaml = config_yaml;
        self
    }

    pub fn with_metrics_window(mut self, window_size: usize) -> Self {
        self.metrics = MetricsWindow::new(window_size);
        self
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    /// Episodes completed, including those restored from a checkpoint.
    pub fn episode_index(&self) -> u64 {
        self.episode_index
    }

    pub fn metrics(&self) -> &MetricsWindow {
        &self.metrics
    }

    pub fn agent(&self) -> &dyn Agent {
        self.agent.as_ref()
    }

    pub fn env(&self) -> &TransformChain {
        &self.env
    }

    pub fn strategy(&self) -> &S {
        &self.strategy
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Run `num_episodes` training episodes under `schedule`.
    ///
    /// The trainer is back in [`LoopState::Idle`] when this returns, also on error.
    pub fn train(&mut self, num_episodes: usize, schedule: &TrainSchedule) -> Result<TrainReport> {
        if schedule.wants_checkpoints() && self.checkpointer.is_none() {
            return Err(RlError::config(
                "checkpoint schedule set but the trainer has no checkpoint directory",
            ));
        }
        log::info!(
            "training {} episodes with {} strategy ({} agent), starting after episode {}",
            num_episodes,
            self.strategy.name(),
            self.agent.kind().name(),
            self.episode_index
        );

        let result = self.training_loop(num_episodes, schedule);
        self.state = LoopState::Idle;
        self.logger.flush();
        result
    }

    fn training_loop(&mut self, num_episodes: usize, schedule: &TrainSchedule) -> Result<TrainReport> {
        self.state = LoopState::Training;
        self.set_mode(true);
        let mut report = TrainReport::default();

        for i in 0..num_episodes {
            let outcome = self
                .strategy
                .train_episode(&mut self.env, self.agent.as_mut())?;
            self.record_episode(&outcome);
            let episode = self.episode_index;
            report.episodes += 1;
            report.rewards.push(outcome.reward);

            let mut snapshot = TrainingSnapshot::new(
                episode as usize,
                self.env_steps,
                outcome.reward,
                outcome.length,
            )
            .with_avg_reward(self.metrics.get_episode_stats().reward.mean)
            .with_loss(outcome.loss);

            if matches!(schedule.eval_every, Some(every) if every > 0 && episode % every as u64 == 0) {
                let result = self.evaluate(schedule.eval_episodes)?;
                log::info!(
                    "episode {}: eval reward {:.2} over {} episodes",
                    episode,
                    result.reward_mean,
                    result.episodes
                );
                snapshot = snapshot.with_eval_reward(result.reward_mean);
                report.evaluations.push((episode, result));
            }
            self.logger.log(&snapshot);

            let is_final = i + 1 == num_episodes;
            if Checkpointer::should_save(
                episode,
                schedule.checkpoint_every,
                is_final,
                schedule.checkpoint_on_final,
            ) {
                report.checkpoints.push(self.save_scheduled_checkpoint()?);
            }
        }

        report.env_steps = self.env_steps;
        report.final_avg_reward = self.metrics.get_episode_stats().reward.mean;
        Ok(report)
    }

    fn record_episode(&mut self, outcome: &EpisodeOutcome) {
        self.episode_index += 1;
        self.env_steps += outcome.length as u64;
        self.metrics
            .update(outcome.reward, outcome.length, outcome.loss);
        self.agent
            .metrics_mut()
            .update(outcome.reward, outcome.length, outcome.loss);
    }

    /// Run `n` greedy episodes.
    ///
    /// Experience stores, normalization statistics and metrics are left as
    /// they were; the previous training mode is restored afterwards.
    pub fn evaluate(&mut self, n: usize) -> Result<EvalResult> {
        if n == 0 {
            return Err(RlError::config("evaluation needs at least one episode"));
        }
        let previous_state = self.state;
        let was_training = self.env.is_training();
        self.state = LoopState::Evaluating;
        self.set_mode(false);

        let mut results = Vec::with_capacity(n);
        let mut failure = None;
        for _ in 0..n {
            match self.eval_episode() {
                Ok(r) => results.push(r),
                Err(e) => {
                    failure = Some(e);
                    break;
                }
            }
        }

        self.set_mode(was_training);
        self.state = previous_state;
        if let Some(e) = failure {
            return Err(e);
        }

        let count = results.len() as f32;
        Ok(EvalResult {
            episodes: results.len(),
            reward_mean: results.iter().map(|(r, _)| r).sum::<f32>() / count,
            length_mean: results.iter().map(|(_, l)| *l as f32).sum::<f32>() / count,
        })
    }

    fn eval_episode(&mut self) -> Result<(f32, usize)> {
        let (mut observation, _) = self.env.reset()?;
        let mut reward = 0.0;
        let mut length = 0;
        loop {
            let (action, _) = self.agent.select_action(&observation, false)?;
            let outcome = self.env.step(&action)?;
            reward += outcome.reward;
            length += 1;
            if outcome.done() {
                return Ok((reward, length));
            }
            observation = outcome.observation;
        }
    }

    fn set_mode(&mut self, training: bool) {
        let report = self.env.set_training_mode(training);
        log::debug!("training mode {} applied to {:?}", training, report.applied());
        if let HookOutcome::Failed(reason) = self.agent.set_training(training) {
            log::warn!("agent set_training({}) failed: {}", training, reason);
        }
    }

    fn build_checkpoint(&self) -> Result<Checkpoint> {
        Ok(Checkpoint::new(
            self.agent.snapshot()?,
            self.config_yaml.clone(),
            TrainingState {
                episode_index: self.episode_index,
                metrics_snapshot: self.metrics.snapshot(),
                transform_stats: self.env.stats_snapshot(),
            },
        ))
    }

    fn default_metadata(&self) -> Metadata {
        let stats = self.metrics.get_episode_stats();
        let mut metadata = Metadata::new();
        metadata.insert("episode".to_string(), self.episode_index.into());
        metadata.insert("env_steps".to_string(), self.env_steps.into());
        metadata.insert("avg_reward".to_string(), stats.reward.mean.into());
        metadata.insert("agent".to_string(), self.agent.kind().name().into());
        metadata
    }

    fn save_scheduled_checkpoint(&mut self) -> Result<PathBuf> {
        let previous_state = self.state;
        self.state = LoopState::Checkpointing;
        let result = self.build_checkpoint().and_then(|checkpoint| {
            let metadata = self.default_metadata();
            match &self.checkpointer {
                Some(checkpointer) => checkpointer.save(&checkpoint, Some(metadata)),
                None => Err(RlError::config("no checkpoint directory configured")),
            }
        });
        self.state = previous_state;
        let path = result?;
        log::info!("episode {}: saved {}", self.episode_index, path.display());
        Ok(path)
    }

    /// Write a checkpoint to `path`; a sidecar is written when `metadata` is given.
    pub fn save_checkpoint(&mut self, path: &Path, metadata: Option<Metadata>) -> Result<()> {
        let previous_state = self.state;
        self.state = LoopState::Checkpointing;
        let result = self
            .build_checkpoint()
            .and_then(|checkpoint| checkpoint.save(path, metadata));
        self.state = previous_state;
        result
    }

    /// Restore agent, metrics, normalization statistics and the episode
    /// counter from `path`. Returns the restored episode index.
    ///
    /// The random baseline has nothing to learn, so an unreadable checkpoint
    /// leaves it untouched and the current index is returned.
    pub fn load_checkpoint(&mut self, path: &Path) -> Result<u64> {
        let checkpoint = match Checkpoint::load(path) {
            Ok(checkpoint) => checkpoint,
            Err(e) if self.agent.kind() == AgentKind::Random => {
                log::debug!("random agent ignoring {}: {}", path.display(), e);
                return Ok(self.episode_index);
            }
            Err(e) => return Err(e),
        };
        self.agent.restore(checkpoint.agent)?;
        let state = checkpoint.training_state;
        self.metrics.restore(&state.metrics_snapshot);
        self.env.restore_stats(&state.transform_stats)?;
        self.episode_index = state.episode_index;
        self.env_steps = self.metrics.get_training_stats().total_steps;
        log::info!(
            "loaded {} (episode {})",
            path.display(),
            self.episode_index
        );
        Ok(self.episode_index)
    }

    /// Release environment and agent resources. Safe to call repeatedly.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.logger.flush();
        self.agent.close();
        self.env.close();
        log::debug!("trainer closed after {} episodes", self.episode_index);
    }
}

impl<S: TrainingStrategy> Drop for Trainer<S> {
    fn drop(&mut self) {
        self.close();
    }
}
