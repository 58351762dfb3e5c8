//! Layered experiment configuration.
//!
//! Configuration is assembled from YAML layers merged in a fixed precedence:
//!
//! ```text
//! built-in defaults → algorithm preset → algorithm layers
//!                   → environment preset → environment layers
//!                   → wrapper layers → override layers
//! ```
//!
//! Mappings merge recursively; scalars and sequences replace. The merged tree
//! is deserialized and validated once by [`ConfigLayers::resolve`]; the
//! resulting [`ExperimentConfig`] is immutable and handed to every component.
//!
//! ```ignore
//! let config = ConfigLayers::new()
//!     .with_yaml(LayerKind::Override, &std::fs::read_to_string("dqn_cartpole.yaml")?)?
//!     .resolve()?;
//! ```

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};

use crate::agents::AgentKind;
use crate::environment::EnvironmentFactory;
use crate::error::{Result, RlError};
use crate::transforms::{space_violations, WrapperConfig};

// ============================================================================
// Sections
// ============================================================================

/// Fully resolved experiment configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperimentConfig {
    pub seed: u64,
    pub environment: EnvironmentConfig,
    pub algorithm: AlgorithmConfig,
    pub training: TrainingConfig,
    pub evaluation: EvaluationConfig,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            seed: 41,
            environment: EnvironmentConfig::default(),
            algorithm: AlgorithmConfig::default(),
            training: TrainingConfig::default(),
            evaluation: EvaluationConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvironmentConfig {
    pub env_name: String,
    /// Base environment episode cap (the simulator's own truncation).
    pub max_steps: u32,
    /// Raw `wrappers` mapping; validated into a [`WrapperConfig`].
    pub wrappers: Value,
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        Self {
            env_name: "CartPole-v1".to_string(),
            max_steps: 500,
            wrappers: Value::Null,
        }
    }
}

/// Algorithm selection and hyperparameters.
///
/// One flat section serves every variant; each agent reads the fields it needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlgorithmConfig {
    /// `RANDOM`, `DQN`, `REINFORCE`, `PPO` or `GRPO` (case-insensitive)
    #[serde(rename = "type")]
    pub kind: String,
    pub gamma: f32,
    pub learning_rate: f64,
    pub hidden_size: usize,
    // value-based
    pub batch_size: usize,
    pub buffer_capacity: usize,
    pub learning_starts: usize,
    pub train_frequency: usize,
    pub target_update_every: usize,
    pub epsilon_start: f32,
    pub epsilon_end: f32,
    pub epsilon_decay: f32,
    // policy-gradient
    pub value_learning_rate: f64,
    pub rollouts_per_update: usize,
    pub normalize_advantages: bool,
}

impl Default for AlgorithmConfig {
    fn default() -> Self {
        Self {
            kind: "RANDOM".to_string(),
            gamma: 0.99,
            learning_rate: 1e-3,
            hidden_size: 64,
            batch_size: 32,
            buffer_capacity: 10_000,
            learning_starts: 500,
            train_frequency: 1,
            target_update_every: 100,
            epsilon_start: 1.0,
            epsilon_end: 0.05,
            epsilon_decay: 0.995,
            value_learning_rate: 1e-3,
            rollouts_per_update: 1,
            normalize_advantages: true,
        }
    }
}

impl AlgorithmConfig {
    /// Parse the configured algorithm kind.
    pub fn agent_kind(&self) -> Result<AgentKind> {
        AgentKind::from_algorithm_name(&self.kind)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    pub episodes: usize,
    pub eval_every: Option<usize>,
    pub checkpoint_every: Option<usize>,
    /// Also checkpoint after the last episode when it is not a multiple of
    /// `checkpoint_every`.
    pub checkpoint_on_final: bool,
    pub checkpoint_dir: PathBuf,
    /// Periodic checkpoints to keep (0 = all).
    pub keep_last_n: usize,
    pub resume_from: Option<PathBuf>,
    pub metrics_window: usize,
    /// Episodes between console log lines.
    pub log_every: usize,
    /// Also write every episode to this CSV file.
    pub metrics_csv: Option<PathBuf>,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            episodes: 100,
            eval_every: None,
            checkpoint_every: None,
            checkpoint_on_final: false,
            checkpoint_dir: PathBuf::from("./checkpoints"),
            keep_last_n: 0,
            resume_from: None,
            metrics_window: 100,
            log_every: 10,
            metrics_csv: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluationConfig {
    pub episodes: usize,
    pub eval_only: bool,
    /// Checkpoint to evaluate; takes precedence over `training.resume_from`.
    pub checkpoint: Option<PathBuf>,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            episodes: 5,
            eval_only: false,
            checkpoint: None,
        }
    }
}

impl ExperimentConfig {
    /// Parse a single YAML document on top of the built-in defaults and validate it.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        ConfigLayers::new()
            .with_yaml(LayerKind::Override, yaml)?
            .resolve()
    }

    /// Validated transform configuration.
    pub fn wrapper_config(&self) -> Result<WrapperConfig> {
        WrapperConfig::from_value(&self.environment.wrappers)
    }

    /// Checkpoint to load at start-up, if any.
    pub fn checkpoint_to_load(&self) -> Option<&PathBuf> {
        self.evaluation
            .checkpoint
            .as_ref()
            .or(self.training.resume_from.as_ref())
    }

    pub fn to_yaml_string(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Check every field and report all violations at once.
    pub fn validate(&self) -> Result<()> {
        let mut violations = Vec::new();
        let algo = &self.algorithm;

        if let Err(RlError::ConfigValidation(v)) = algo.agent_kind() {
            violations.extend(v);
        }
        if !EnvironmentFactory::is_known(&self.environment.env_name) {
            violations.push(format!(
                "environment.env_name '{}' is not registered (known: {})",
                self.environment.env_name,
                EnvironmentFactory::known().join(", ")
            ));
        }
        if self.environment.max_steps == 0 {
            violations.push("environment.max_steps must be >= 1".to_string());
        }
        match self.wrapper_config() {
            Ok(wrappers) => {
                if let Some(space) = EnvironmentFactory::observation_space(&self.environment.env_name) {
                    violations.extend(space_violations(&wrappers, &space));
                }
            }
            Err(RlError::ConfigValidation(v)) => violations.extend(v),
            Err(_) => {}
        }

        if !(0.0..=1.0).contains(&algo.gamma) {
            violations.push(format!("algorithm.gamma must lie in [0, 1], got {}", algo.gamma));
        }
        if !(algo.learning_rate > 0.0) {
            violations.push("algorithm.learning_rate must be > 0".to_string());
        }
        if !(algo.value_learning_rate > 0.0) {
            violations.push("algorithm.value_learning_rate must be > 0".to_string());
        }
        for (name, value) in [
            ("hidden_size", algo.hidden_size),
            ("batch_size", algo.batch_size),
            ("train_frequency", algo.train_frequency),
            ("target_update_every", algo.target_update_every),
            ("rollouts_per_update", algo.rollouts_per_update),
        ] {
            if value == 0 {
                violations.push(format!("algorithm.{} must be >= 1", name));
            }
        }
        if algo.buffer_capacity < algo.batch_size {
            violations.push(format!(
                "algorithm.buffer_capacity ({}) must be >= batch_size ({})",
                algo.buffer_capacity, algo.batch_size
            ));
        }
        if !(0.0..=1.0).contains(&algo.epsilon_start) || !(0.0..=1.0).contains(&algo.epsilon_end) {
            violations.push("algorithm.epsilon_start/epsilon_end must lie in [0, 1]".to_string());
        }
        if !(algo.epsilon_decay > 0.0 && algo.epsilon_decay <= 1.0) {
            violations.push(format!(
                "algorithm.epsilon_decay must lie in (0, 1], got {}",
                algo.epsilon_decay
            ));
        }

        let training = &self.training;
        if training.eval_every == Some(0) {
            violations.push("training.eval_every must be >= 1 when set".to_string());
        }
        if training.checkpoint_every == Some(0) {
            violations.push("training.checkpoint_every must be >= 1 when set".to_string());
        }
        if training.metrics_window == 0 {
            violations.push("training.metrics_window must be >= 1".to_string());
        }
        if self.evaluation.episodes == 0 {
            violations.push("evaluation.episodes must be >= 1".to_string());
        }

        if violations.is_empty() {
            Ok(())
        } else {
            Err(RlError::ConfigValidation(violations))
        }
    }
}

// ============================================================================
// Layers
// ============================================================================

/// Precedence class of a configuration layer (lowest first).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LayerKind {
    /// Merged under `algorithm`
    Algorithm,
    /// Merged under `environment`
    Environment,
    /// Merged under `environment.wrappers`
    Wrappers,
    /// Full document merged at the root
    Override,
}

/// Ordered collection of configuration layers.
#[derive(Debug, Clone, Default)]
pub struct ConfigLayers {
    layers: Vec<(LayerKind, Value)>,
}

impl ConfigLayers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a layer. Layers of the same kind apply in insertion order.
    pub fn with_layer(mut self, kind: LayerKind, value: Value) -> Self {
        self.layers.push((kind, value));
        self
    }

    pub fn with_yaml(self, kind: LayerKind, yaml: &str) -> Result<Self> {
        let value: Value = serde_yaml::from_str(yaml)?;
        // An empty document adds nothing
        if value.is_null() {
            return Ok(self);
        }
        Ok(self.with_layer(kind, value))
    }

    /// Merge every layer over the defaults, deserialize and validate.
    pub fn resolve(&self) -> Result<ExperimentConfig> {
        let merged = self.merged()?;
        let config: ExperimentConfig = serde_yaml::from_value(merged)?;
        config.validate()?;
        log::debug!(
            "resolved config: algorithm={} env={} episodes={}",
            config.algorithm.kind,
            config.environment.env_name,
            config.training.episodes
        );
        Ok(config)
    }

    /// Merged YAML tree before deserialization.
    pub fn merged(&self) -> Result<Value> {
        let mut tree = serde_yaml::to_value(ExperimentConfig::default())?;

        // Presets depend on the selections made by the user layers.
        let mut selections = tree.clone();
        for (kind, layer) in self.sorted() {
            deep_merge(&mut selections, nest(kind, layer.clone()));
        }
        let algorithm = lookup_str(&selections, &["algorithm", "type"]);
        let env_name = lookup_str(&selections, &["environment", "env_name"]);

        if let Some(preset) = algorithm.as_deref().and_then(algorithm_preset) {
            deep_merge(&mut tree, nest(LayerKind::Algorithm, preset));
        }
        let sorted = self.sorted();
        let (algorithm_layers, rest): (Vec<_>, Vec<_>) = sorted
            .into_iter()
            .partition(|(kind, _)| *kind == LayerKind::Algorithm);
        for (kind, layer) in algorithm_layers {
            deep_merge(&mut tree, nest(kind, layer.clone()));
        }
        if let Some(preset) = env_name.as_deref().and_then(environment_preset) {
            deep_merge(&mut tree, nest(LayerKind::Environment, preset));
        }
        for (kind, layer) in rest {
            deep_merge(&mut tree, nest(kind, layer.clone()));
        }

        Ok(tree)
    }

    fn sorted(&self) -> Vec<(LayerKind, &Value)> {
        let mut sorted: Vec<(LayerKind, &Value)> =
            self.layers.iter().map(|(k, v)| (*k, v)).collect();
        // Stable sort keeps insertion order within a kind.
        sorted.sort_by_key(|(k, _)| *k);
        sorted
    }
}

/// Recursively merge `overlay` into `base`: mappings merge, everything else replaces.
pub fn deep_merge(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Mapping(base), Value::Mapping(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(&key) {
                    Some(existing) => deep_merge(existing, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}

fn nest(kind: LayerKind, value: Value) -> Value {
    let path: &[&str] = match kind {
        LayerKind::Algorithm => &["algorithm"],
        LayerKind::Environment => &["environment"],
        LayerKind::Wrappers => &["environment", "wrappers"],
        LayerKind::Override => &[],
    };
    path.iter().rev().fold(value, |inner, key| {
        let mut m = Mapping::new();
        m.insert(Value::String((*key).to_string()), inner);
        Value::Mapping(m)
    })
}

fn lookup_str(tree: &Value, path: &[&str]) -> Option<String> {
    let mut current = tree;
    for key in path {
        current = current.get(*key)?;
    }
    current.as_str().map(str::to_string)
}

/// Built-in per-algorithm defaults.
fn algorithm_preset(name: &str) -> Option<Value> {
    let yaml = match name.to_ascii_uppercase().as_str() {
        "DQN" => "learning_rate: 0.0005\nbatch_size: 64\nlearning_starts: 1000\ntarget_update_every: 250\n",
        "REINFORCE" | "PPO" | "GRPO" => "learning_rate: 0.005\nvalue_learning_rate: 0.01\nhidden_size: 128\n",
        _ => return None,
    };
    serde_yaml::from_str(yaml).ok()
}

/// Built-in per-environment defaults.
fn environment_preset(name: &str) -> Option<Value> {
    match name {
        "CartPole-v1" => serde_yaml::from_str("max_steps: 500\n").ok(),
        _ => None,
    }
}
