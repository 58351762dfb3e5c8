//! Monte-Carlo policy gradient with a learned value baseline.
//!
//! For every step of every episode in the batch:
//!
//! ```text
//! G_t = r_t + γ G_{t+1}
//! A_t = G_t - V(s_t)                     (baseline detached)
//! L_policy = -mean(log π(a_t | s_t) · A_t)
//! L_value  = mean((V(s_t) - G_t)²)
//! ```
//!
//! Policy and value networks have separate Adam optimizers.

use burn::module::AutodiffModule;
use burn::nn::loss::{MseLoss, Reduction};
use burn::optim::adaptor::OptimizerAdaptor;
use burn::optim::{Adam, AdamConfig, GradientsParams, Optimizer};
use burn::tensor::activation::{log_softmax, softmax};
use burn::tensor::backend::AutodiffBackend;
use serde::{Deserialize, Serialize};

use crate::config::AlgorithmConfig;
use crate::core::{Action, Episode};
use crate::environment::{HookOutcome, Space};
use crate::error::{Result, RlError};
use crate::metrics::{MetricsSnapshot, MetricsWindow};

use super::networks::{
    argmax, indices_to_tensor, module_from_bytes, module_to_bytes, record_from_bytes,
    record_to_bytes, rows_to_tensor, tensor_to_scalar, tensor_to_vec, vec_to_tensor, Mlp,
};
use super::{network_dims, ActionInfo, Agent, AgentKind, AgentSnapshot, Batch};

/// Policy-gradient hyperparameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReinforceConfig {
    pub gamma: f32,
    pub learning_rate: f64,
    pub value_learning_rate: f64,
    pub hidden_size: usize,
    pub normalize_advantages: bool,
    pub seed: u64,
}

impl Default for ReinforceConfig {
    fn default() -> Self {
        Self::from_algorithm(&AlgorithmConfig::default(), 41)
    }
}

impl ReinforceConfig {
    pub fn from_algorithm(config: &AlgorithmConfig, seed: u64) -> Self {
        Self {
            gamma: config.gamma,
            learning_rate: config.learning_rate,
            value_learning_rate: config.value_learning_rate,
            hidden_size: config.hidden_size,
            normalize_advantages: config.normalize_advantages,
            seed,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct ReinforceState {
    obs_dim: usize,
    n_actions: usize,
    hidden_size: usize,
    policy: Vec<u8>,
    value: Vec<u8>,
    rng_state: u64,
    updates: u64,
    metrics: MetricsSnapshot,
}

#[derive(Debug, Serialize, Deserialize)]
struct ReinforceOptimizers {
    policy: Vec<u8>,
    value: Vec<u8>,
}

/// On-policy agent with separate policy and value networks.
pub struct ReinforceAgent<B: AutodiffBackend> {
    config: ReinforceConfig,
    obs_dim: usize,
    n_actions: usize,
    policy: Mlp<B>,
    value: Mlp<B>,
    policy_optimizer: OptimizerAdaptor<Adam, Mlp<B>, B>,
    value_optimizer: OptimizerAdaptor<Adam, Mlp<B>, B>,
    rng: fastrand::Rng,
    updates: u64,
    metrics: MetricsWindow,
    device: B::Device,
}

impl<B: AutodiffBackend> ReinforceAgent<B> {
    pub fn new(
        config: ReinforceConfig,
        observation_space: &Space,
        action_space: &Space,
        device: B::Device,
    ) -> Result<Self> {
        let (obs_dim, n_actions) =
            network_dims(AgentKind::Reinforce, observation_space, action_space)?;
        Ok(Self {
            obs_dim,
            n_actions,
            policy: Mlp::new(obs_dim, config.hidden_size, n_actions, &device),
            value: Mlp::new(obs_dim, config.hidden_size, 1, &device),
            policy_optimizer: AdamConfig::new().init(),
            value_optimizer: AdamConfig::new().init(),
            rng: fastrand::Rng::with_seed(config.seed),
            updates: 0,
            metrics: MetricsWindow::default(),
            device,
            config,
        })
    }

    pub fn config(&self) -> &ReinforceConfig {
        &self.config
    }

    /// Optimizer updates applied so far.
    pub fn updates(&self) -> u64 {
        self.updates
    }

    /// Action probabilities for one observation.
    pub fn action_probs(&self, observation: &[f32]) -> Result<Vec<f32>> {
        if observation.len() != self.obs_dim {
            return Err(RlError::ShapeMismatch {
                expected: self.obs_dim,
                actual: observation.len(),
            });
        }
        let policy = self.policy.valid();
        let x = rows_to_tensor(&[observation], self.obs_dim, &self.device);
        tensor_to_vec(softmax(policy.forward(x), 1))
    }

    /// Draw an index from `probs` by inverse CDF.
    fn sample_index(&mut self, probs: &[f32]) -> usize {
        let u = self.rng.f32();
        let mut cumulative = 0.0;
        for (i, p) in probs.iter().enumerate() {
            cumulative += p;
            if u < cumulative {
                return i;
            }
        }
        probs.len().saturating_sub(1)
    }

    fn policy_update(&mut self, episodes: &[Episode]) -> Result<f32> {
        let mut states = Vec::new();
        let mut actions = Vec::new();
        let mut returns = Vec::new();

        for episode in episodes {
            returns.extend(episode.discounted_returns(self.config.gamma));
            for step in episode.iter() {
                if step.observation.len() != self.obs_dim {
                    return Err(RlError::ShapeMismatch {
                        expected: self.obs_dim,
                        actual: step.observation.len(),
                    });
                }
                let action = step.action.discrete().ok_or_else(|| {
                    RlError::InvalidBatch("reinforce agent needs discrete actions".to_string())
                })?;
                if action as usize >= self.n_actions {
                    return Err(RlError::InvalidBatch(format!(
                        "action {} outside 0..{}",
                        action, self.n_actions
                    )));
                }
                states.push(step.observation.as_slice());
                actions.push(action);
            }
        }

        let device = &self.device;
        let states = rows_to_tensor::<B>(&states, self.obs_dim, device);
        let actions = indices_to_tensor::<B>(&actions, device);
        let returns_vec = returns;
        let returns = vec_to_tensor::<B>(returns_vec.clone(), device);

        // Value baseline
        let values = self.value.forward(states.clone()).flatten::<1>(0, 1);
        let baseline = tensor_to_vec(values.clone().detach())?;
        let mut advantages: Vec<f32> = returns_vec
            .iter()
            .zip(baseline.iter())
            .map(|(g, v)| g - v)
            .collect();
        if self.config.normalize_advantages && advantages.len() > 1 {
            normalize_in_place(&mut advantages);
        }
        let advantages = vec_to_tensor::<B>(advantages, device);

        // Policy loss
        let log_probs = log_softmax(self.policy.forward(states), 1)
            .gather(1, actions)
            .flatten::<1>(0, 1);
        let policy_loss = (log_probs * advantages).mean().neg();
        let value_loss = MseLoss::new().forward(values, returns, Reduction::Mean);

        let policy_loss_value = tensor_to_scalar(policy_loss.clone().detach())?;
        let value_loss_value = tensor_to_scalar(value_loss.clone().detach())?;

        let grads = GradientsParams::from_grads(policy_loss.backward(), &self.policy);
        self.policy = self
            .policy_optimizer
            .step(self.config.learning_rate, self.policy.clone(), grads);

        let grads = GradientsParams::from_grads(value_loss.backward(), &self.value);
        self.value = self
            .value_optimizer
            .step(self.config.value_learning_rate, self.value.clone(), grads);

        self.updates += 1;
        log::debug!(
            "reinforce update {}: policy loss {:.4}, value loss {:.4}",
            self.updates,
            policy_loss_value,
            value_loss_value
        );
        Ok(policy_loss_value + value_loss_value)
    }
}

fn normalize_in_place(values: &mut [f32]) {
    let n = values.len() as f32;
    let mean = values.iter().sum::<f32>() / n;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f32>() / n;
    let std = var.sqrt() + 1e-8;
    for v in values.iter_mut() {
        *v = (*v - mean) / std;
    }
}

impl<B: AutodiffBackend> Agent for ReinforceAgent<B> {
    fn kind(&self) -> AgentKind {
        AgentKind::Reinforce
    }

    fn select_action(&mut self, observation: &[f32], training: bool) -> Result<(Action, ActionInfo)> {
        let probs = self.action_probs(observation)?;
        let action = if training {
            self.sample_index(&probs)
        } else {
            argmax(&probs)
        };

        let mut info = ActionInfo::new();
        info.insert("log_prob".to_string(), probs[action].max(f32::MIN_POSITIVE).ln().into());
        info.insert("probs".to_string(), probs.into());
        Ok((Action::Discrete(action as u32), info))
    }

    fn update(&mut self, batch: Batch) -> Result<Option<f32>> {
        match batch {
            Batch::Episodes(episodes) => {
                let episodes: Vec<Episode> = episodes.into_iter().filter(|e| !e.is_empty()).collect();
                if episodes.is_empty() {
                    return Ok(None);
                }
                self.policy_update(&episodes).map(Some)
            }
            Batch::Transitions(_) => Err(RlError::InvalidBatch(
                "reinforce agent learns from whole episodes, not transitions".to_string(),
            )),
        }
    }

    fn snapshot(&self) -> Result<AgentSnapshot> {
        let state = ReinforceState {
            obs_dim: self.obs_dim,
            n_actions: self.n_actions,
            hidden_size: self.config.hidden_size,
            policy: module_to_bytes::<B, _>(&self.policy)?,
            value: module_to_bytes::<B, _>(&self.value)?,
            rng_state: self.rng.get_seed(),
            updates: self.updates,
            metrics: self.metrics.snapshot(),
        };
        let optimizers = ReinforceOptimizers {
            policy: record_to_bytes::<B, _>(self.policy_optimizer.to_record())?,
            value: record_to_bytes::<B, _>(self.value_optimizer.to_record())?,
        };
        let config = bincode::config::standard();
        Ok(AgentSnapshot {
            kind: AgentKind::Reinforce,
            agent_state: bincode::serde::encode_to_vec(&state, config)?,
            optimizer_state: bincode::serde::encode_to_vec(&optimizers, config)?,
        })
    }

    fn restore(&mut self, snapshot: AgentSnapshot) -> Result<()> {
        snapshot.check_kind(AgentKind::Reinforce)?;
        let config = bincode::config::standard();
        let (state, _): (ReinforceState, usize) =
            bincode::serde::decode_from_slice(&snapshot.agent_state, config)?;
        let (optimizers, _): (ReinforceOptimizers, usize) =
            bincode::serde::decode_from_slice(&snapshot.optimizer_state, config)?;
        if (state.obs_dim, state.n_actions, state.hidden_size)
            != (self.obs_dim, self.n_actions, self.config.hidden_size)
        {
            return Err(RlError::CheckpointIncompatible(format!(
                "reinforce networks {}x{}x{} do not match {}x{}x{}",
                state.obs_dim,
                state.hidden_size,
                state.n_actions,
                self.obs_dim,
                self.config.hidden_size,
                self.n_actions
            )));
        }

        self.policy = module_from_bytes(self.policy.clone(), state.policy, &self.device)?;
        self.value = module_from_bytes(self.value.clone(), state.value, &self.device)?;
        let record = record_from_bytes::<B, _>(optimizers.policy, &self.device)?;
        self.policy_optimizer =
            std::mem::replace(&mut self.policy_optimizer, AdamConfig::new().init()).load_record(record);
        let record = record_from_bytes::<B, _>(optimizers.value, &self.device)?;
        self.value_optimizer =
            std::mem::replace(&mut self.value_optimizer, AdamConfig::new().init()).load_record(record);
        self.rng.seed(state.rng_state);
        self.updates = state.updates;
        self.metrics.restore(&state.metrics);
        Ok(())
    }

    fn set_training(&mut self, _training: bool) -> HookOutcome {
        HookOutcome::Ok
    }

    fn metrics(&self) -> &MetricsWindow {
        &self.metrics
    }

    fn metrics_mut(&mut self) -> &mut MetricsWindow {
        &mut self.metrics
    }
}
