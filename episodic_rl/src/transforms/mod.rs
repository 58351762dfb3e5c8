//! Environment transform pipeline.
//!
//! A [`TransformChain`] wraps a base environment in an ordered stack of
//! stateful transforms. The first transform in the resolved order is the
//! innermost layer, so it sees raw environment output first.
//!
//! ## Order resolution
//!
//! 1. The explicit `order` list, filtered to enabled transforms, or the
//!    canonical default order when no list is given:
//!    `clip_observations → normalize_observations → frame_stack → time_limit → normalize_rewards`
//! 2. Enabled transforms missing from the list, in lexicographic order.
//!
//! Disabled transforms are not inserted at all.
//!
//! ## Training mode
//!
//! [`TransformChain::set_training_mode`] walks every layer outermost first.
//! Normalization layers freeze their statistics in evaluation mode; a layer
//! whose hook fails is logged and skipped.
//!
//! ```ignore
//! let wrappers = WrapperConfig::from_value(&config.environment.wrappers)?;
//! let mut env = TransformChain::build(Box::new(CartPole::new(cfg)), &wrappers)?;
//! env.set_training_mode(false);
//! ```

pub mod observation;
pub mod reward;
pub mod temporal;
pub mod wrapper_config;


use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::core::{Action, RunningStatistic};
use crate::environment::{self, Environment, HookReport, Info, Space, StepOutcome};
use crate::error::{Result, RlError};

pub use observation::{ClipObservations, NormalizeObservations};
pub use reward::NormalizeRewards;
pub use temporal::{FrameStack, TimeLimit};
pub use wrapper_config::{
    TransformKind, TransformParams, TransformSpec, TransformStage, WrapperConfig,
};

/// Running statistics of every normalization layer, keyed by layer name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransformStats {
    pub stats: BTreeMap<String, RunningStatistic>,
}

impl TransformStats {
    pub fn is_empty(&self) -> bool {
        self.stats.is_empty()
    }

    pub fn get(&self, layer: &str) -> Option<&RunningStatistic> {
        self.stats.get(layer)
    }
}

/// A base environment wrapped in its configured transforms.
pub struct TransformChain {
    env: Box<dyn Environment>,
    applied: Vec<String>,
    training: bool,
}

impl TransformChain {
    /// Wrap `base` according to `config`.
    ///
    /// Fails with `ConfigValidation` listing every transform whose input
    /// space it cannot handle.
    pub fn build(base: Box<dyn Environment>, config: &WrapperConfig) -> Result<Self> {
        let violations = space_violations(config, &base.observation_space());
        if !violations.is_empty() {
            return Err(RlError::ConfigValidation(violations));
        }

        let mut env = base;
        let mut applied = Vec::new();
        for spec in config.resolved() {
            env = wrap(env, &spec.typed);
            applied.push(spec.name.clone());
        }

        log::debug!("transform chain (innermost first): {:?}", applied);
        Ok(Self {
            env,
            applied,
            training: true,
        })
    }

    /// Chain without transforms.
    pub fn bare(base: Box<dyn Environment>) -> Self {
        Self {
            env: base,
            applied: Vec::new(),
            training: true,
        }
    }

    /// Applied transform names, innermost first.
    pub fn applied(&self) -> &[String] {
        &self.applied
    }

    pub fn is_training(&self) -> bool {
        self.training
    }

    /// Propagate a training-mode switch to every layer.
    pub fn set_training_mode(&mut self, training: bool) -> HookReport {
        self.training = training;
        environment::set_training_mode(self.env.as_mut(), training)
    }

    /// Copy the running statistics of every normalization layer.
    pub fn stats_snapshot(&self) -> TransformStats {
        let mut snapshot = TransformStats::default();
        let mut current: Option<&dyn Environment> = Some(self.env.as_ref());
        while let Some(layer) = current {
            if let Some(stats) = layer.running_statistic() {
                snapshot.stats.insert(layer.name().to_string(), stats.clone());
            }
            current = layer.inner();
        }
        snapshot
    }

    /// Restore statistics saved by [`stats_snapshot`](Self::stats_snapshot).
    ///
    /// Layers absent from `saved` keep their current statistics.
    pub fn restore_stats(&mut self, saved: &TransformStats) -> Result<()> {
        let mut restored = 0;
        let mut current: Option<&mut dyn Environment> = Some(self.env.as_mut());
        while let Some(layer) = current {
            let name = layer.name().to_string();
            if let (Some(entry), Some(stats)) = (saved.get(&name), layer.running_statistic_mut()) {
                stats.restore_from(entry)?;
                restored += 1;
            }
            current = layer.inner_mut();
        }
        if restored < saved.stats.len() {
            log::warn!(
                "restored {} of {} saved transform statistics; chain is {:?}",
                restored,
                saved.stats.len(),
                self.applied
            );
        }
        Ok(())
    }
}

impl Environment for TransformChain {
    fn name(&self) -> &str {
        "transform_chain"
    }

    fn reset(&mut self) -> Result<(Vec<f32>, Info)> {
        self.env.reset()
    }

    fn step(&mut self, action: &Action) -> Result<StepOutcome> {
        self.env.step(action)
    }

    /// Observation space of the outermost layer.
    fn observation_space(&self) -> Space {
        self.env.observation_space()
    }

    fn action_space(&self) -> Space {
        self.env.action_space()
    }

    fn inner(&self) -> Option<&dyn Environment> {
        Some(self.env.as_ref())
    }

    fn inner_mut(&mut self) -> Option<&mut dyn Environment> {
        Some(self.env.as_mut())
    }
}

/// Transforms in `config` that cannot accept an environment observing
/// `observation`. Compatible transforms keep a box a box and a discrete space
/// discrete, so checking each against the base space is enough.
pub fn space_violations(config: &WrapperConfig, observation: &Space) -> Vec<String> {
    config
        .resolved()
        .into_iter()
        .filter_map(|spec| {
            incompatibility(&spec.typed, observation)
                .map(|problem| format!("{}: {}", spec.name, problem))
        })
        .collect()
}

fn incompatibility(params: &TransformParams, space: &Space) -> Option<String> {
    let needs_box = matches!(
        params,
        TransformParams::ClipObservations { .. }
            | TransformParams::NormalizeObservations { .. }
            | TransformParams::FrameStack { .. }
    );
    if needs_box && space.is_discrete() {
        Some(format!("requires a box observation space, got {:?}", space))
    } else {
        None
    }
}

fn wrap(env: Box<dyn Environment>, params: &TransformParams) -> Box<dyn Environment> {
    match *params {
        TransformParams::ClipObservations { low, high } => {
            Box::new(ClipObservations::new(env, low, high))
        }
        TransformParams::NormalizeObservations {
            momentum,
            epsilon,
            reset_stats_on_episode,
        } => Box::new(NormalizeObservations::new(
            env,
            momentum,
            epsilon,
            reset_stats_on_episode,
        )),
        TransformParams::FrameStack { num_frames } => Box::new(FrameStack::new(env, num_frames)),
        TransformParams::TimeLimit { max_steps } => Box::new(TimeLimit::new(env, max_steps)),
        TransformParams::NormalizeRewards { momentum, epsilon } => {
            Box::new(NormalizeRewards::new(env, momentum, epsilon))
        }
    }
}
