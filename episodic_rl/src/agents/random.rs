//! Non-learning baseline.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::config::AlgorithmConfig;
use crate::core::Action;
use crate::environment::Space;
use crate::error::{Result, RlError};
use crate::metrics::MetricsWindow;

use super::{ActionInfo, Agent, AgentKind, AgentSnapshot, Batch};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RandomState {
    agent_type: String,
    config: AlgorithmConfig,
    rng_state: u64,
}

/// Samples actions uniformly from the action space and never learns.
pub struct RandomAgent {
    config: AlgorithmConfig,
    action_space: Space,
    rng: fastrand::Rng,
    metrics: MetricsWindow,
}

impl RandomAgent {
    pub fn new(config: AlgorithmConfig, action_space: Space, seed: u64) -> Result<Self> {
        match &action_space {
            Space::Discrete { n } if *n == 0 => {
                return Err(RlError::UnsupportedSpace(
                    "random agent needs at least one discrete action".to_string(),
                ))
            }
            Space::Box { shape, .. } if shape.iter().product::<usize>() == 0 => {
                return Err(RlError::UnsupportedSpace(
                    "random agent needs a non-empty box action space".to_string(),
                ))
            }
            _ => {}
        }
        Ok(Self {
            config,
            action_space,
            rng: fastrand::Rng::with_seed(seed),
            metrics: MetricsWindow::default(),
        })
    }

    pub fn config(&self) -> &AlgorithmConfig {
        &self.config
    }

    fn sample(&mut self) -> Action {
        match &self.action_space {
            Space::Discrete { n } => Action::Discrete(self.rng.u32(0..*n as u32)),
            Space::Box { low, high, .. } => {
                let rng = &mut self.rng;
                let values = low
                    .iter()
                    .zip(high.iter())
                    .map(|(&lo, &hi)| {
                        let (lo, hi) = if lo.is_finite() && hi.is_finite() {
                            (lo, hi)
                        } else {
                            (-1.0, 1.0)
                        };
                        lo + rng.f32() * (hi - lo)
                    })
                    .collect();
                Action::Continuous(values)
            }
        }
    }

    fn try_restore(&mut self, snapshot: AgentSnapshot) -> Result<()> {
        snapshot.check_kind(AgentKind::Random)?;
        let (state, _): (RandomState, usize) =
            bincode::serde::decode_from_slice(&snapshot.agent_state, bincode::config::standard())?;
        self.config = state.config;
        self.rng.seed(state.rng_state);
        Ok(())
    }
}

impl Agent for RandomAgent {
    fn kind(&self) -> AgentKind {
        AgentKind::Random
    }

    fn select_action(&mut self, _observation: &[f32], training: bool) -> Result<(Action, ActionInfo)> {
        let action = self.sample();
        let mut info = ActionInfo::new();
        info.insert("policy".to_string(), "random".into());
        info.insert(
            "mode".to_string(),
            if training { "train" } else { "eval" }.into(),
        );
        Ok((action, info))
    }

    fn update(&mut self, _batch: Batch) -> Result<Option<f32>> {
        Ok(None)
    }

    fn snapshot(&self) -> Result<AgentSnapshot> {
        let state = RandomState {
            agent_type: "RandomAgent".to_string(),
            config: self.config.clone(),
            rng_state: self.rng.get_seed(),
        };
        Ok(AgentSnapshot {
            kind: AgentKind::Random,
            agent_state: bincode::serde::encode_to_vec(&state, bincode::config::standard())?,
            optimizer_state: Vec::new(),
        })
    }

    /// Incompatible snapshots are ignored; the baseline has nothing to lose.
    fn restore(&mut self, snapshot: AgentSnapshot) -> Result<()> {
        if let Err(e) = self.try_restore(snapshot) {
            log::debug!("random agent ignoring snapshot: {}", e);
        }
        Ok(())
    }

    fn load(&mut self, path: &Path) -> Result<()> {
        let loaded = std::fs::read(path)
            .map_err(RlError::from)
            .and_then(|bytes| AgentSnapshot::decode(&bytes));
        match loaded {
            Ok(snapshot) => self.restore(snapshot),
            Err(e) => {
                log::debug!("random agent ignoring {}: {}", path.display(), e);
                Ok(())
            }
        }
    }

    fn metrics(&self) -> &MetricsWindow {
        &self.metrics
    }

    fn metrics_mut(&mut self) -> &mut MetricsWindow {
        &mut self.metrics
    }
}
