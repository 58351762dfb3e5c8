//! Environment abstraction for episodic training.
//!
//! An [`Environment`] is either a base simulator or a transform layer that
//! wraps another environment. Layers expose their wrapped environment through
//! [`Environment::inner_mut`], which lets [`set_training_mode`] walk the whole
//! stack without knowing the concrete layer types.
//!
//! Optional hooks (`set_training`, `close`, running-statistic access) have
//! no-op defaults, so a layer opts in by overriding them and the walker gets
//! a defined [`HookOutcome::Skipped`] otherwise.

pub mod cartpole;
pub mod factory;

use std::collections::BTreeMap;

use crate::core::{Action, RunningStatistic};
use crate::error::Result;

pub use cartpole::{CartPole, CartPoleConfig};
pub use factory::EnvironmentFactory;

/// Free-form per-step diagnostics.
pub type Info = BTreeMap<String, serde_json::Value>;

// ============================================================================
// Spaces
// ============================================================================

/// Observation or action space description.
#[derive(Debug, Clone, PartialEq)]
pub enum Space {
    /// Continuous box with per-element bounds (flattened, row-major).
    Box {
        shape: Vec<usize>,
        low: Vec<f32>,
        high: Vec<f32>,
    },
    /// `n` discrete choices `0..n`.
    Discrete { n: usize },
}

impl Space {
    /// Box with the same bound on every element.
    pub fn uniform_box(shape: Vec<usize>, low: f32, high: f32) -> Self {
        let len = shape.iter().product();
        Space::Box {
            shape,
            low: vec![low; len],
            high: vec![high; len],
        }
    }

    /// Unbounded box of the given shape.
    pub fn unbounded(shape: Vec<usize>) -> Self {
        Self::uniform_box(shape, f32::NEG_INFINITY, f32::INFINITY)
    }

    /// Shape of a box space, `None` for discrete.
    pub fn shape(&self) -> Option<&[usize]> {
        match self {
            Space::Box { shape, .. } => Some(shape),
            Space::Discrete { .. } => None,
        }
    }

    /// Cardinality of a discrete space, `None` for a box.
    pub fn n(&self) -> Option<usize> {
        match self {
            Space::Discrete { n } => Some(*n),
            Space::Box { .. } => None,
        }
    }

    /// Number of scalars in one flattened sample.
    pub fn flat_dim(&self) -> usize {
        match self {
            Space::Box { shape, .. } => shape.iter().product(),
            Space::Discrete { .. } => 1,
        }
    }

    pub fn is_discrete(&self) -> bool {
        matches!(self, Space::Discrete { .. })
    }
}

// ============================================================================
// Step results and hook outcomes
// ============================================================================

/// Result of one environment step.
#[derive(Debug, Clone)]
pub struct StepOutcome {
    pub observation: Vec<f32>,
    pub reward: f32,
    /// Episode reached an absorbing state
    pub terminated: bool,
    /// Episode stopped by an external limit
    pub truncated: bool,
    pub info: Info,
}

impl StepOutcome {
    pub fn new(observation: Vec<f32>, reward: f32, terminated: bool, truncated: bool) -> Self {
        Self {
            observation,
            reward,
            terminated,
            truncated,
            info: Info::new(),
        }
    }

    /// Get done flag (terminal OR truncated).
    pub fn done(&self) -> bool {
        self.terminated || self.truncated
    }
}

/// Result of invoking an optional hook on one layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HookOutcome {
    /// Hook ran.
    Ok,
    /// Layer does not implement the hook.
    Skipped,
    /// Hook ran and failed; the caller logs and continues.
    Failed(String),
}

impl HookOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, HookOutcome::Failed(_))
    }
}

/// Per-layer outcomes of a hook walk, outermost layer first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HookReport {
    pub outcomes: Vec<(String, HookOutcome)>,
}

impl HookReport {
    pub fn failures(&self) -> impl Iterator<Item = &(String, HookOutcome)> {
        self.outcomes.iter().filter(|(_, o)| o.is_failed())
    }

    /// Names of layers whose hook ran successfully.
    pub fn applied(&self) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter(|(_, o)| *o == HookOutcome::Ok)
            .map(|(name, _)| name.as_str())
            .collect()
    }
}

// ============================================================================
// Environment trait
// ============================================================================

/// Single (non-vectorized) episodic environment.
pub trait Environment {
    /// Short identifier used in logs and hook reports.
    fn name(&self) -> &str;

    /// Start a new episode.
    fn reset(&mut self) -> Result<(Vec<f32>, Info)>;

    /// Advance one step.
    fn step(&mut self, action: &Action) -> Result<StepOutcome>;

    fn observation_space(&self) -> Space;

    fn action_space(&self) -> Space;

    /// Switch between training and evaluation behaviour.
    fn set_training(&mut self, _training: bool) -> HookOutcome {
        HookOutcome::Skipped
    }

    /// Running statistic owned by this layer, if any.
    fn running_statistic(&self) -> Option<&RunningStatistic> {
        None
    }

    fn running_statistic_mut(&mut self) -> Option<&mut RunningStatistic> {
        None
    }

    /// Wrapped environment for transform layers.
    fn inner(&self) -> Option<&dyn Environment> {
        None
    }

    fn inner_mut(&mut self) -> Option<&mut dyn Environment> {
        None
    }

    /// Release resources. Layers forward to their inner environment.
    fn close(&mut self) {
        if let Some(inner) = self.inner_mut() {
            inner.close();
        }
    }
}

impl<E: Environment + ?Sized> Environment for Box<E> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn reset(&mut self) -> Result<(Vec<f32>, Info)> {
        (**self).reset()
    }

    fn step(&mut self, action: &Action) -> Result<StepOutcome> {
        (**self).step(action)
    }

    fn observation_space(&self) -> Space {
        (**self).observation_space()
    }

    fn action_space(&self) -> Space {
        (**self).action_space()
    }

    fn set_training(&mut self, training: bool) -> HookOutcome {
        (**self).set_training(training)
    }

    fn running_statistic(&self) -> Option<&RunningStatistic> {
        (**self).running_statistic()
    }

    fn running_statistic_mut(&mut self) -> Option<&mut RunningStatistic> {
        (**self).running_statistic_mut()
    }

    fn inner(&self) -> Option<&dyn Environment> {
        (**self).inner()
    }

    fn inner_mut(&mut self) -> Option<&mut dyn Environment> {
        (**self).inner_mut()
    }

    fn close(&mut self) {
        (**self).close()
    }
}

/// Set training mode on every layer of a wrapped environment, outermost first.
///
/// A failing layer is logged and recorded in the report; the walk continues
/// with the remaining layers.
pub fn set_training_mode(env: &mut dyn Environment, training: bool) -> HookReport {
    let mut report = HookReport::default();
    let mut current: Option<&mut dyn Environment> = Some(env);

    while let Some(layer) = current {
        let outcome = layer.set_training(training);
        if let HookOutcome::Failed(reason) = &outcome {
            log::warn!(
                "set_training({}) failed on layer '{}': {}",
                training,
                layer.name(),
                reason
            );
        }
        report.outcomes.push((layer.name().to_string(), outcome));
        current = layer.inner_mut();
    }

    report
}

/// Names of every layer, outermost first.
pub fn layer_names(env: &dyn Environment) -> Vec<String> {
    let mut names = Vec::new();
    let mut current: Option<&dyn Environment> = Some(env);
    while let Some(layer) = current {
        names.push(layer.name().to_string());
        current = layer.inner();
    }
    names
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Base environment whose training hook always fails.
    struct Faulty;

    impl Environment for Faulty {
        fn name(&self) -> &str {
            "faulty"
        }
        fn reset(&mut self) -> Result<(Vec<f32>, Info)> {
            Ok((vec![0.0], Info::new()))
        }
        fn step(&mut self, _action: &Action) -> Result<StepOutcome> {
            Ok(StepOutcome::new(vec![0.0], 0.0, true, false))
        }
        fn observation_space(&self) -> Space {
            Space::unbounded(vec![1])
        }
        fn action_space(&self) -> Space {
            Space::Discrete { n: 1 }
        }
        fn set_training(&mut self, _training: bool) -> HookOutcome {
            HookOutcome::Failed("stats not initialised".to_string())
        }
    }

    /// Pass-through layer that records the last training flag.
    struct Recorder {
        inner: Box<dyn Environment>,
        training: Option<bool>,
    }

    impl Environment for Recorder {
        fn name(&self) -> &str {
            "recorder"
        }
        fn reset(&mut self) -> Result<(Vec<f32>, Info)> {
            self.inner.reset()
        }
        fn step(&mut self, action: &Action) -> Result<StepOutcome> {
            self.inner.step(action)
        }
        fn observation_space(&self) -> Space {
            self.inner.observation_space()
        }
        fn action_space(&self) -> Space {
            self.inner.action_space()
        }
        fn set_training(&mut self, training: bool) -> HookOutcome {
            self.training = Some(training);
            HookOutcome::Ok
        }
        fn inner(&self) -> Option<&dyn Environment> {
            Some(self.inner.as_ref())
        }
        fn inner_mut(&mut self) -> Option<&mut dyn Environment> {
            Some(self.inner.as_mut())
        }
    }

    #[test]
    fn test_space_helpers() {
        let space = Space::uniform_box(vec![2, 3], -1.0, 1.0);
        assert_eq!(space.flat_dim(), 6);
        assert_eq!(space.shape(), Some(&[2, 3][..]));
        assert_eq!(space.n(), None);

        let space = Space::Discrete { n: 4 };
        assert_eq!(space.n(), Some(4));
        assert!(space.is_discrete());
    }

    #[test]
    fn test_set_training_mode_isolates_failures() {
        let mut env = Recorder {
            inner: Box::new(Recorder {
                inner: Box::new(Faulty),
                training: None,
            }),
            training: None,
        };

        let report = set_training_mode(&mut env, false);

        assert_eq!(report.outcomes.len(), 3);
        assert_eq!(report.applied(), vec!["recorder", "recorder"]);
        assert_eq!(report.failures().count(), 1);
        assert_eq!(env.training, Some(false));
        let inner = env.inner().unwrap();
        assert_eq!(inner.name(), "recorder");
    }

    #[test]
    fn test_layer_names_outermost_first() {
        let env = Recorder {
            inner: Box::new(Faulty),
            training: None,
        };
        assert_eq!(layer_names(&env), vec!["recorder", "faulty"]);
    }
}
