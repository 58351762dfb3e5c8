//! Learning agents.
//!
//! Every agent implements [`Agent`]: action selection, learning from a
//! [`Batch`], and persistence through an [`AgentSnapshot`]. The variant set is
//! closed ([`AgentKind`]) and [`build_agent`] maps a validated configuration
//! onto a boxed agent.
//!
//! | Kind | Protocol | Batch |
//! |------|----------|-------|
//! | `Random` | off-policy | ignored |
//! | `Dqn` | off-policy | `Transitions` |
//! | `Reinforce` | on-policy | `Episodes` |

pub mod dqn;
pub mod networks;
pub mod random;
pub mod reinforce;

#[cfg(test)]
mod tests;

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use burn::backend::{Autodiff, NdArray};
use serde::{Deserialize, Serialize};

use crate::checkpoint::atomic_write;
use crate::config::AlgorithmConfig;
use crate::core::{Action, Episode, Transition};
use crate::environment::{HookOutcome, Space};
use crate::error::{Result, RlError};
use crate::metrics::MetricsWindow;

pub use dqn::{DqnAgent, DqnConfig};
pub use random::RandomAgent;
pub use reinforce::{ReinforceAgent, ReinforceConfig};

/// Backend used by the bundled learning agents.
pub type TrainBackend = Autodiff<NdArray<f32>>;

/// Diagnostics attached to a selected action.
pub type ActionInfo = BTreeMap<String, serde_json::Value>;

/// Closed set of agent variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AgentKind {
    Random,
    Dqn,
    Reinforce,
}

impl AgentKind {
    /// Map a configured algorithm name (case-insensitive) to a variant.
    pub fn from_algorithm_name(name: &str) -> Result<Self> {
        match name.to_ascii_uppercase().as_str() {
            "RANDOM" => Ok(AgentKind::Random),
            "DQN" => Ok(AgentKind::Dqn),
            "REINFORCE" | "PPO" | "GRPO" => Ok(AgentKind::Reinforce),
            "SARSA" => Err(RlError::config(
                "algorithm.type 'SARSA' is not supported".to_string(),
            )),
            other => Err(RlError::config(format!(
                "algorithm.type '{}' is unknown (expected RANDOM, DQN, REINFORCE, PPO or GRPO)",
                other
            ))),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            AgentKind::Random => "random",
            AgentKind::Dqn => "dqn",
            AgentKind::Reinforce => "reinforce",
        }
    }

    /// On-policy agents learn from whole fresh episodes.
    pub fn on_policy(&self) -> bool {
        matches!(self, AgentKind::Reinforce)
    }
}

/// Experience handed to [`Agent::update`].
#[derive(Debug, Clone)]
pub enum Batch {
    Transitions(Vec<Transition>),
    Episodes(Vec<Episode>),
}

impl Batch {
    pub fn len(&self) -> usize {
        match self {
            Batch::Transitions(t) => t.len(),
            Batch::Episodes(e) => e.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Serialized agent state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentSnapshot {
    pub kind: AgentKind,
    pub agent_state: Vec<u8>,
    pub optimizer_state: Vec<u8>,
}

impl AgentSnapshot {
    /// Fail with `CheckpointIncompatible` unless the snapshot was taken from `expected`.
    pub fn check_kind(&self, expected: AgentKind) -> Result<()> {
        if self.kind == expected {
            Ok(())
        } else {
            Err(RlError::CheckpointIncompatible(format!(
                "snapshot of a {} agent cannot be loaded into a {} agent",
                self.kind.name(),
                expected.name()
            )))
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(bincode::serde::encode_to_vec(self, bincode::config::standard())?)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let (snapshot, _) = bincode::serde::decode_from_slice(bytes, bincode::config::standard())?;
        Ok(snapshot)
    }
}

/// Agent contract used by the training loop.
pub trait Agent {
    fn kind(&self) -> AgentKind;

    fn on_policy(&self) -> bool {
        self.kind().on_policy()
    }

    /// Choose an action. Only the exploration RNG may advance; learned
    /// parameters are never touched.
    fn select_action(&mut self, observation: &[f32], training: bool) -> Result<(Action, ActionInfo)>;

    /// Learn from `batch`; returns the loss when an optimizer step ran.
    fn update(&mut self, batch: Batch) -> Result<Option<f32>>;

    fn snapshot(&self) -> Result<AgentSnapshot>;

    /// Restore state captured by [`snapshot`](Self::snapshot).
    fn restore(&mut self, snapshot: AgentSnapshot) -> Result<()>;

    fn save(&self, path: &Path) -> Result<()> {
        atomic_write(path, &self.snapshot()?.encode()?)
    }

    fn load(&mut self, path: &Path) -> Result<()> {
        let bytes = fs::read(path)?;
        self.restore(AgentSnapshot::decode(&bytes)?)
    }

    /// Clear episodic bookkeeping; parameters are kept.
    fn reset(&mut self) {
        self.metrics_mut().reset();
    }

    fn set_training(&mut self, _training: bool) -> HookOutcome {
        HookOutcome::Skipped
    }

    fn close(&mut self) {}

    fn metrics(&self) -> &MetricsWindow;

    fn metrics_mut(&mut self) -> &mut MetricsWindow;
}

/// Validate the spaces a network agent needs: box observations, discrete actions.
///
/// Returns `(observation_dim, n_actions)`.
pub fn network_dims(kind: AgentKind, observation: &Space, action: &Space) -> Result<(usize, usize)> {
    let obs_dim = match observation {
        Space::Box { .. } if observation.flat_dim() > 0 => observation.flat_dim(),
        other => {
            return Err(RlError::UnsupportedSpace(format!(
                "{} agent needs a non-empty box observation space, got {:?}",
                kind.name(),
                other
            )))
        }
    };
    let n_actions = match action {
        Space::Discrete { n } if *n > 0 => *n,
        other => {
            return Err(RlError::UnsupportedSpace(format!(
                "{} agent needs a discrete action space, got {:?}",
                kind.name(),
                other
            )))
        }
    };
    Ok((obs_dim, n_actions))
}

/// Build the agent selected by `config` for the given spaces.
pub fn build_agent(
    config: &AlgorithmConfig,
    observation_space: &Space,
    action_space: &Space,
    seed: u64,
) -> Result<Box<dyn Agent>> {
    let kind = config.agent_kind()?;
    let agent: Box<dyn Agent> = match kind {
        AgentKind::Random => Box::new(RandomAgent::new(config.clone(), action_space.clone(), seed)?),
        AgentKind::Dqn => Box::new(DqnAgent::<TrainBackend>::new(
            DqnConfig::from_algorithm(config, seed),
            observation_space,
            action_space,
            Default::default(),
        )?),
        AgentKind::Reinforce => Box::new(ReinforceAgent::<TrainBackend>::new(
            ReinforceConfig::from_algorithm(config, seed),
            observation_space,
            action_space,
            Default::default(),
        )?),
    };
    log::info!(
        "built {} agent (configured as {}, {})",
        kind.name(),
        config.kind,
        if kind.on_policy() { "on-policy" } else { "off-policy" }
    );
    Ok(agent)
}
