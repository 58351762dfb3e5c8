//! Deep Q-learning with a hard-synced target network.
//!
//! - **Exploration**: epsilon-greedy; epsilon decays multiplicatively after
//!   every optimizer update down to `epsilon_end`
//! - **TD target**: `r + γ (1 - terminal) max_a Q_target(s', a)`; truncated
//!   transitions still bootstrap
//! - **Target network**: hard copy of the online network every
//!   `target_update_every` updates

use burn::module::AutodiffModule;
use burn::nn::loss::{MseLoss, Reduction};
use burn::optim::adaptor::OptimizerAdaptor;
use burn::optim::{Adam, AdamConfig, GradientsParams, Optimizer};
use burn::tensor::backend::AutodiffBackend;
use serde::{Deserialize, Serialize};

use crate::config::AlgorithmConfig;
use crate::core::{hard_copy, Action, TargetSync, Transition};
use crate::environment::{HookOutcome, Space};
use crate::error::{Result, RlError};
use crate::metrics::{MetricsSnapshot, MetricsWindow};

use super::networks::{
    argmax, indices_to_tensor, module_from_bytes, module_to_bytes, record_from_bytes,
    record_to_bytes, rows_to_tensor, tensor_to_scalar, tensor_to_vec, vec_to_tensor, Mlp,
};
use super::{network_dims, ActionInfo, Agent, AgentKind, AgentSnapshot, Batch};

/// DQN hyperparameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DqnConfig {
    pub gamma: f32,
    pub learning_rate: f64,
    pub hidden_size: usize,
    pub target_update_every: usize,
    pub epsilon_start: f32,
    pub epsilon_end: f32,
    pub epsilon_decay: f32,
    pub seed: u64,
}

impl Default for DqnConfig {
    fn default() -> Self {
        Self::from_algorithm(&AlgorithmConfig::default(), 41)
    }
}

impl DqnConfig {
    pub fn from_algorithm(config: &AlgorithmConfig, seed: u64) -> Self {
        Self {
            gamma: config.gamma,
            learning_rate: config.learning_rate,
            hidden_size: config.hidden_size,
            target_update_every: config.target_update_every,
            epsilon_start: config.epsilon_start,
            epsilon_end: config.epsilon_end,
            epsilon_decay: config.epsilon_decay,
            seed,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct DqnState {
    obs_dim: usize,
    n_actions: usize,
    hidden_size: usize,
    q_net: Vec<u8>,
    target_net: Vec<u8>,
    epsilon: f32,
    rng_state: u64,
    target_sync: TargetSync,
    metrics: MetricsSnapshot,
}

/// Value-based agent over a discrete action space.
pub struct DqnAgent<B: AutodiffBackend> {
    config: DqnConfig,
    obs_dim: usize,
    n_actions: usize,
    q_net: Mlp<B>,
    target_net: Mlp<B>,
    optimizer: OptimizerAdaptor<Adam, Mlp<B>, B>,
    target_sync: TargetSync,
    epsilon: f32,
    rng: fastrand::Rng,
    training: bool,
    metrics: MetricsWindow,
    device: B::Device,
}

impl<B: AutodiffBackend> DqnAgent<B> {
    pub fn new(
        config: DqnConfig,
        observation_space: &Space,
        action_space: &Space,
        device: B::Device,
    ) -> Result<Self> {
        let (obs_dim, n_actions) = network_dims(AgentKind::Dqn, observation_space, action_space)?;
        let q_net = Mlp::new(obs_dim, config.hidden_size, n_actions, &device);
        let target_net = hard_copy::<B, _>(&q_net);

        Ok(Self {
            obs_dim,
            n_actions,
            q_net,
            target_net,
            optimizer: AdamConfig::new().init(),
            target_sync: TargetSync::new(config.target_update_every),
            epsilon: config.epsilon_start,
            rng: fastrand::Rng::with_seed(config.seed),
            training: true,
            metrics: MetricsWindow::default(),
            device,
            config,
        })
    }

    pub fn epsilon(&self) -> f32 {
        self.epsilon
    }

    pub fn config(&self) -> &DqnConfig {
        &self.config
    }

    pub fn is_training(&self) -> bool {
        self.training
    }

    pub fn target_sync(&self) -> &TargetSync {
        &self.target_sync
    }

    /// Q-values of one observation, computed without autodiff tracking.
    pub fn q_values(&self, observation: &[f32]) -> Result<Vec<f32>> {
        self.infer(&self.q_net, observation)
    }

    /// Q-values of the target network.
    pub fn target_q_values(&self, observation: &[f32]) -> Result<Vec<f32>> {
        self.infer(&self.target_net, observation)
    }

    fn infer(&self, net: &Mlp<B>, observation: &[f32]) -> Result<Vec<f32>> {
        if observation.len() != self.obs_dim {
            return Err(RlError::ShapeMismatch {
                expected: self.obs_dim,
                actual: observation.len(),
            });
        }
        let x = rows_to_tensor(&[observation], self.obs_dim, &self.device);
        tensor_to_vec(net.valid().forward(x))
    }

    fn td_update(&mut self, transitions: &[Transition]) -> Result<f32> {
        let n = transitions.len();
        let mut states = Vec::with_capacity(n);
        let mut next_states = Vec::with_capacity(n);
        let mut actions = Vec::with_capacity(n);
        let mut rewards = Vec::with_capacity(n);
        let mut not_terminal = Vec::with_capacity(n);

        for t in transitions {
            let action = t.action.discrete().ok_or_else(|| {
                RlError::InvalidBatch("dqn agent needs discrete actions".to_string())
            })?;
            if action as usize >= self.n_actions {
                return Err(RlError::InvalidBatch(format!(
                    "action {} outside 0..{}",
                    action, self.n_actions
                )));
            }
            for obs in [&t.state, &t.next_state] {
                if obs.len() != self.obs_dim {
                    return Err(RlError::ShapeMismatch {
                        expected: self.obs_dim,
                        actual: obs.len(),
                    });
                }
            }
            states.push(t.state.as_slice());
            next_states.push(t.next_state.as_slice());
            actions.push(action);
            rewards.push(t.reward);
            not_terminal.push(if t.episode_state().bootstraps() { 1.0 } else { 0.0 });
        }

        let device = &self.device;
        let states = rows_to_tensor::<B>(&states, self.obs_dim, device);
        let next_states = rows_to_tensor::<B>(&next_states, self.obs_dim, device);
        let actions = indices_to_tensor::<B>(&actions, device);
        let rewards = vec_to_tensor::<B>(rewards, device);
        let not_terminal = vec_to_tensor::<B>(not_terminal, device);

        // max_a Q_target(s', a), no gradient
        let next_q = self
            .target_net
            .forward(next_states)
            .max_dim(1)
            .flatten::<1>(0, 1)
            .detach();
        let targets = rewards + not_terminal * next_q.mul_scalar(self.config.gamma);

        let q_taken = self
            .q_net
            .forward(states)
            .gather(1, actions)
            .flatten::<1>(0, 1);
        let loss = MseLoss::new().forward(q_taken, targets.detach(), Reduction::Mean);
        let loss_value = tensor_to_scalar(loss.clone().detach())?;

        let grads = GradientsParams::from_grads(loss.backward(), &self.q_net);
        self.q_net = self
            .optimizer
            .step(self.config.learning_rate, self.q_net.clone(), grads);

        if self
            .target_sync
            .maybe_sync::<B, _>(&self.q_net, &mut self.target_net)
        {
            log::debug!("dqn target network synced after {} updates", self.target_sync.updates());
        }
        self.epsilon = (self.epsilon * self.config.epsilon_decay).max(self.config.epsilon_end);

        Ok(loss_value)
    }
}

impl<B: AutodiffBackend> Agent for DqnAgent<B> {
    fn kind(&self) -> AgentKind {
        AgentKind::Dqn
    }

    fn select_action(&mut self, observation: &[f32], training: bool) -> Result<(Action, ActionInfo)> {
        let mut info = ActionInfo::new();
        info.insert("epsilon".to_string(), self.epsilon.into());

        if training && self.rng.f32() < self.epsilon {
            let action = self.rng.u32(0..self.n_actions as u32);
            info.insert("greedy".to_string(), false.into());
            return Ok((Action::Discrete(action), info));
        }

        let q = self.q_values(observation)?;
        let action = argmax(&q) as u32;
        info.insert("greedy".to_string(), true.into());
        info.insert("q_values".to_string(), q.into());
        Ok((Action::Discrete(action), info))
    }

    fn update(&mut self, batch: Batch) -> Result<Option<f32>> {
        match batch {
            Batch::Transitions(transitions) if transitions.is_empty() => Ok(None),
            Batch::Transitions(transitions) => self.td_update(&transitions).map(Some),
            Batch::Episodes(_) => Err(RlError::InvalidBatch(
                "dqn agent learns from transitions, not episodes".to_string(),
            )),
        }
    }

    fn snapshot(&self) -> Result<AgentSnapshot> {
        let state = DqnState {
            obs_dim: self.obs_dim,
            n_actions: self.n_actions,
            hidden_size: self.config.hidden_size,
            q_net: module_to_bytes::<B, _>(&self.q_net)?,
            target_net: module_to_bytes::<B, _>(&self.target_net)?,
            epsilon: self.epsilon,
            rng_state: self.rng.get_seed(),
            target_sync: self.target_sync.clone(),
            metrics: self.metrics.snapshot(),
        };
        Ok(AgentSnapshot {
            kind: AgentKind::Dqn,
            agent_state: bincode::serde::encode_to_vec(&state, bincode::config::standard())?,
            optimizer_state: record_to_bytes::<B, _>(self.optimizer.to_record())?,
        })
    }

    fn restore(&mut self, snapshot: AgentSnapshot) -> Result<()> {
        snapshot.check_kind(AgentKind::Dqn)?;
        let (state, _): (DqnState, usize) =
            bincode::serde::decode_from_slice(&snapshot.agent_state, bincode::config::standard())?;
        if (state.obs_dim, state.n_actions, state.hidden_size)
            != (self.obs_dim, self.n_actions, self.config.hidden_size)
        {
            return Err(RlError::CheckpointIncompatible(format!(
                "dqn network {}x{}x{} does not match {}x{}x{}",
                state.obs_dim,
                state.hidden_size,
                state.n_actions,
                self.obs_dim,
                self.config.hidden_size,
                self.n_actions
            )));
        }

        self.q_net = module_from_bytes(self.q_net.clone(), state.q_net, &self.device)?;
        self.target_net = module_from_bytes(self.target_net.clone(), state.target_net, &self.device)?;
        let record = record_from_bytes::<B, _>(snapshot.optimizer_state, &self.device)?;
        self.optimizer = std::mem::replace(&mut self.optimizer, AdamConfig::new().init())
            .load_record(record);
        self.epsilon = state.epsilon;
        self.rng.seed(state.rng_state);
        self.target_sync = state.target_sync;
        self.metrics.restore(&state.metrics);
        Ok(())
    }

    fn set_training(&mut self, training: bool) -> HookOutcome {
        self.training = training;
        HookOutcome::Ok
    }

    fn metrics(&self) -> &MetricsWindow {
        &self.metrics
    }

    fn metrics_mut(&mut self) -> &mut MetricsWindow {
        &mut self.metrics
    }
}
