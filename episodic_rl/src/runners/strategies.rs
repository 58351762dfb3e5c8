//! Experience-collection strategies for the training loop.
//!
//! The strategy owns the experience store and decides when the agent learns:
//!
//! ```text
//! Trainer<S>
//!     where S: TrainingStrategy
//!
//! OffPolicyStrategy → ReplayBuffer   (update every `train_frequency` steps)
//! OnPolicyStrategy  → EpisodeBuffer  (update every `rollouts_per_update` episodes)
//! ```

use crate::agents::{Agent, Batch};
use crate::buffers::{EpisodeBuffer, ReplayBuffer};
use crate::config::AlgorithmConfig;
use crate::core::Transition;
use crate::environment::Environment;
use crate::error::Result;

/// Summary of one training episode.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EpisodeOutcome {
    pub reward: f32,
    pub length: usize,
    /// Mean loss over the updates that ran during the episode.
    pub loss: Option<f32>,
}

/// Collects one episode of experience and drives agent updates.
pub trait TrainingStrategy {
    fn name(&self) -> &'static str;

    /// Play one training episode with `agent` in `env`.
    fn train_episode(&mut self, env: &mut dyn Environment, agent: &mut dyn Agent) -> Result<EpisodeOutcome>;

    /// Experience items currently held (transitions or completed episodes).
    fn buffered(&self) -> usize;
}

fn mean(values: &[f32]) -> Option<f32> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f32>() / values.len() as f32)
    }
}

// ============================================================================
// Off-policy
// ============================================================================

/// Replay-buffer strategy for value-based and baseline agents.
pub struct OffPolicyStrategy {
    buffer: ReplayBuffer,
    batch_size: usize,
    train_frequency: usize,
    steps: u64,
}

impl OffPolicyStrategy {
    /// Buffer readiness is `max(learning_starts, batch_size)` so a ready
    /// buffer can always serve a full batch.
    pub fn new(config: &AlgorithmConfig, seed: u64) -> Self {
        let min_ready = config.learning_starts.max(config.batch_size);
        Self {
            buffer: ReplayBuffer::with_seed(config.buffer_capacity, min_ready, seed),
            batch_size: config.batch_size,
            train_frequency: config.train_frequency.max(1),
            steps: 0,
        }
    }

    pub fn buffer(&self) -> &ReplayBuffer {
        &self.buffer
    }
}

impl TrainingStrategy for OffPolicyStrategy {
    fn name(&self) -> &'static str {
        "off_policy"
    }

    fn train_episode(&mut self, env: &mut dyn Environment, agent: &mut dyn Agent) -> Result<EpisodeOutcome> {
        let (mut observation, _) = env.reset()?;
        let mut reward = 0.0;
        let mut length = 0;
        let mut losses = Vec::new();

        loop {
            let (action, _) = agent.select_action(&observation, true)?;
            let outcome = env.step(&action)?;
            reward += outcome.reward;
            length += 1;
            self.steps += 1;

            let done = outcome.done();
            self.buffer.add(Transition::new(
                observation,
                action,
                outcome.reward,
                outcome.observation.clone(),
                outcome.terminated,
                outcome.truncated,
            ));

            if self.buffer.ready() && self.steps % self.train_frequency as u64 == 0 {
                let batch = self.buffer.sample(self.batch_size)?;
                if let Some(loss) = agent.update(Batch::Transitions(batch))? {
                    losses.push(loss);
                }
            }

            if done {
                break;
            }
            observation = outcome.observation;
        }

        Ok(EpisodeOutcome {
            reward,
            length,
            loss: mean(&losses),
        })
    }

    fn buffered(&self) -> usize {
        self.buffer.len()
    }
}

// ============================================================================
// On-policy
// ============================================================================

/// Whole-episode strategy for policy-gradient agents.
pub struct OnPolicyStrategy {
    buffer: EpisodeBuffer,
    rollouts_per_update: usize,
}

impl OnPolicyStrategy {
    pub fn new(config: &AlgorithmConfig) -> Self {
        Self {
            buffer: EpisodeBuffer::new(),
            rollouts_per_update: config.rollouts_per_update.max(1),
        }
    }

    pub fn buffer(&self) -> &EpisodeBuffer {
        &self.buffer
    }
}

impl TrainingStrategy for OnPolicyStrategy {
    fn name(&self) -> &'static str {
        "on_policy"
    }

    fn train_episode(&mut self, env: &mut dyn Environment, agent: &mut dyn Agent) -> Result<EpisodeOutcome> {
        let (mut observation, _) = env.reset()?;
        let mut reward = 0.0;
        let mut length = 0;

        loop {
            let (action, _) = agent.select_action(&observation, true)?;
            let outcome = env.step(&action)?;
            reward += outcome.reward;
            length += 1;

            let done = outcome.done();
            self.buffer
                .add_step(observation, action, outcome.reward, outcome.terminated);
            if done {
                // Truncated episodes are closed explicitly
                self.buffer.end_episode();
                break;
            }
            observation = outcome.observation;
        }

        let mut loss = None;
        if self.buffer.num_completed() >= self.rollouts_per_update {
            let episodes = self.buffer.drain_completed();
            loss = agent.update(Batch::Episodes(episodes))?;
        }

        Ok(EpisodeOutcome {
            reward,
            length,
            loss,
        })
    }

    fn buffered(&self) -> usize {
        self.buffer.num_completed()
    }
}
