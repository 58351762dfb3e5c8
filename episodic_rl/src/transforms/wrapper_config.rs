//! Parsing and validation of the `environment.wrappers` mapping.
//!
//! ```yaml
//! environment:
//!   wrappers:
//!     order: [normalize_observations, frame_stack]
//!     normalize_observations: { enabled: true, momentum: 0.99 }
//!     frame_stack: { enabled: true, num_frames: 4 }
//!     normalize_rewards: { enabled: true }
//! ```
//!
//! Every problem found is collected and reported together as a single
//! `ConfigValidation` error.

use serde_yaml::{Mapping, Value};

use crate::error::{Result, RlError};

/// Key holding the explicit application order.
pub const ORDER_KEY: &str = "order";

// ============================================================================
// Transform kinds
// ============================================================================

/// Processing stage of a transform, used for the canonical default order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum TransformStage {
    Observation,
    Temporal,
    Reward,
}

/// Known transforms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransformKind {
    ClipObservations,
    NormalizeObservations,
    FrameStack,
    TimeLimit,
    NormalizeRewards,
}

impl TransformKind {
    /// Canonical default order: observation, then temporal, then reward stages.
    pub const DEFAULT_ORDER: [TransformKind; 5] = [
        TransformKind::ClipObservations,
        TransformKind::NormalizeObservations,
        TransformKind::FrameStack,
        TransformKind::TimeLimit,
        TransformKind::NormalizeRewards,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            TransformKind::ClipObservations => "clip_observations",
            TransformKind::NormalizeObservations => "normalize_observations",
            TransformKind::FrameStack => "frame_stack",
            TransformKind::TimeLimit => "time_limit",
            TransformKind::NormalizeRewards => "normalize_rewards",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::DEFAULT_ORDER.iter().copied().find(|k| k.name() == name)
    }

    pub fn stage(&self) -> TransformStage {
        match self {
            TransformKind::ClipObservations | TransformKind::NormalizeObservations => {
                TransformStage::Observation
            }
            TransformKind::FrameStack | TransformKind::TimeLimit => TransformStage::Temporal,
            TransformKind::NormalizeRewards => TransformStage::Reward,
        }
    }

    fn known_names() -> String {
        Self::DEFAULT_ORDER
            .iter()
            .map(|k| k.name())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

// ============================================================================
// Typed parameters
// ============================================================================

/// Validated parameters for one transform.
#[derive(Debug, Clone, PartialEq)]
pub enum TransformParams {
    ClipObservations {
        low: f32,
        high: f32,
    },
    NormalizeObservations {
        momentum: f64,
        epsilon: f64,
        reset_stats_on_episode: bool,
    },
    FrameStack {
        num_frames: usize,
    },
    TimeLimit {
        max_steps: usize,
    },
    NormalizeRewards {
        momentum: f64,
        epsilon: f64,
    },
}

/// Reads typed values out of a transform's mapping and records every
/// violation under the transform's name.
struct ParamReader<'a> {
    transform: &'a str,
    params: &'a Mapping,
    consumed: Vec<&'static str>,
    violations: &'a mut Vec<String>,
}

impl<'a> ParamReader<'a> {
    fn new(transform: &'a str, params: &'a Mapping, violations: &'a mut Vec<String>) -> Self {
        Self {
            transform,
            params,
            consumed: vec!["enabled"],
            violations,
        }
    }

    fn raw(&mut self, key: &'static str) -> Option<&'a Value> {
        self.consumed.push(key);
        self.params.get(key)
    }

    fn f64_or(&mut self, key: &'static str, default: f64) -> f64 {
        match self.raw(key) {
            None => default,
            Some(v) => match v.as_f64() {
                Some(x) => x,
                None => {
                    self.violations
                        .push(format!("{}.{} must be a number, got {:?}", self.transform, key, v));
                    default
                }
            },
        }
    }

    fn usize_or(&mut self, key: &'static str, default: usize) -> Option<usize> {
        match self.raw(key) {
            None => Some(default),
            Some(v) => match v.as_i64() {
                Some(x) if x >= 0 => Some(x as usize),
                Some(x) => {
                    self.violations
                        .push(format!("{}.{} must be >= 1, got {}", self.transform, key, x));
                    None
                }
                None => {
                    self.violations
                        .push(format!("{}.{} must be an integer, got {:?}", self.transform, key, v));
                    None
                }
            },
        }
    }

    fn bool_or(&mut self, key: &'static str, default: bool) -> bool {
        match self.raw(key) {
            None => default,
            Some(v) => match v.as_bool() {
                Some(b) => b,
                None => {
                    self.violations
                        .push(format!("{}.{} must be a boolean, got {:?}", self.transform, key, v));
                    default
                }
            },
        }
    }

    fn check_momentum(&mut self, momentum: f64) {
        if !(momentum > 0.0 && momentum < 1.0) {
            self.violations.push(format!(
                "{}.momentum must lie in (0, 1), got {}",
                self.transform, momentum
            ));
        }
    }

    fn check_epsilon(&mut self, epsilon: f64) {
        if !(epsilon > 0.0) {
            self.violations
                .push(format!("{}.epsilon must be > 0, got {}", self.transform, epsilon));
        }
    }

    fn check_at_least_one(&mut self, key: &str, value: Option<usize>) {
        if value == Some(0) {
            self.violations
                .push(format!("{}.{} must be >= 1, got 0", self.transform, key));
        }
    }

    /// Report keys that no parameter consumed.
    fn finish(self) {
        for key in self.params.keys() {
            let known = key
                .as_str()
                .map(|k| self.consumed.contains(&k))
                .unwrap_or(false);
            if !known {
                self.violations
                    .push(format!("{}: unknown parameter {:?}", self.transform, key));
            }
        }
    }
}

fn parse_params(kind: TransformKind, params: &Mapping, violations: &mut Vec<String>) -> TransformParams {
    let mut reader = ParamReader::new(kind.name(), params, violations);
    let parsed = match kind {
        TransformKind::ClipObservations => {
            let low = reader.f64_or("low", -10.0) as f32;
            let high = reader.f64_or("high", 10.0) as f32;
            if !(low < high) {
                reader.violations.push(format!(
                    "clip_observations.low must be < high, got low={} high={}",
                    low, high
                ));
            }
            TransformParams::ClipObservations { low, high }
        }
        TransformKind::NormalizeObservations => {
            let momentum = reader.f64_or("momentum", crate::core::DEFAULT_MOMENTUM);
            let epsilon = reader.f64_or("epsilon", crate::core::DEFAULT_EPSILON);
            let reset_stats_on_episode = reader.bool_or("reset_stats_on_episode", false);
            reader.check_momentum(momentum);
            reader.check_epsilon(epsilon);
            TransformParams::NormalizeObservations {
                momentum,
                epsilon,
                reset_stats_on_episode,
            }
        }
        TransformKind::FrameStack => {
            let num_frames = reader.usize_or("num_frames", 4);
            reader.check_at_least_one("num_frames", num_frames);
            TransformParams::FrameStack {
                num_frames: num_frames.unwrap_or(1).max(1),
            }
        }
        TransformKind::TimeLimit => {
            let max_steps = reader.usize_or("max_steps", 500);
            reader.check_at_least_one("max_steps", max_steps);
            TransformParams::TimeLimit {
                max_steps: max_steps.unwrap_or(1).max(1),
            }
        }
        TransformKind::NormalizeRewards => {
            let momentum = reader.f64_or("momentum", crate::core::DEFAULT_MOMENTUM);
            let epsilon = reader.f64_or("epsilon", crate::core::DEFAULT_EPSILON);
            reader.check_momentum(momentum);
            reader.check_epsilon(epsilon);
            TransformParams::NormalizeRewards { momentum, epsilon }
        }
    };
    reader.finish();
    parsed
}

// ============================================================================
// TransformSpec / WrapperConfig
// ============================================================================

/// One configured transform.
#[derive(Debug, Clone, PartialEq)]
pub struct TransformSpec {
    pub name: String,
    pub kind: TransformKind,
    pub enabled: bool,
    /// Raw parameter mapping as configured (including `enabled`)
    pub params: Mapping,
    pub typed: TransformParams,
    /// Position in the resolved application order; `None` when disabled
    pub order_index: Option<usize>,
}

/// Validated wrapper configuration with a resolved application order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WrapperConfig {
    specs: Vec<TransformSpec>,
    explicit_order: Option<Vec<String>>,
}

impl WrapperConfig {
    /// No transforms.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Parse from a YAML document holding the `environment.wrappers` mapping.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let value: Value = serde_yaml::from_str(yaml)?;
        Self::from_value(&value)
    }

    /// Parse and validate the `environment.wrappers` value.
    ///
    /// `Null` yields an empty configuration.
    pub fn from_value(value: &Value) -> Result<Self> {
        let mapping = match value {
            Value::Null => return Ok(Self::empty()),
            Value::Mapping(m) => m,
            other => {
                return Err(RlError::config(format!(
                    "environment.wrappers must be a mapping, got {:?}",
                    other
                )))
            }
        };

        let mut violations = Vec::new();
        let mut specs = Vec::new();
        let mut explicit_order = None;

        for (key, entry) in mapping {
            let Some(name) = key.as_str() else {
                violations.push(format!("wrapper key must be a string, got {:?}", key));
                continue;
            };

            if name == ORDER_KEY {
                explicit_order = parse_order(entry, &mut violations);
                continue;
            }

            let Some(kind) = TransformKind::from_name(name) else {
                violations.push(format!(
                    "unknown transform '{}' (known: {})",
                    name,
                    TransformKind::known_names()
                ));
                continue;
            };

            let params = match entry {
                Value::Mapping(m) => m.clone(),
                Value::Null => Mapping::new(),
                other => {
                    violations.push(format!("{} must be a mapping, got {:?}", name, other));
                    continue;
                }
            };

            let enabled = match params.get("enabled") {
                None => false,
                Some(v) => v.as_bool().unwrap_or_else(|| {
                    violations.push(format!("{}.enabled must be a boolean, got {:?}", name, v));
                    false
                }),
            };

            let typed = parse_params(kind, &params, &mut violations);
            specs.push(TransformSpec {
                name: name.to_string(),
                kind,
                enabled,
                params,
                typed,
                order_index: None,
            });
        }

        if let Some(order) = &explicit_order {
            for name in order {
                if TransformKind::from_name(name).is_none() {
                    violations.push(format!(
                        "order lists unknown transform '{}' (known: {})",
                        name,
                        TransformKind::known_names()
                    ));
                }
            }
        }

        if !violations.is_empty() {
            return Err(RlError::ConfigValidation(violations));
        }

        let mut config = Self {
            specs,
            explicit_order,
        };
        config.assign_order_indices();
        Ok(config)
    }

    /// Enabled transform specs in application order (innermost first).
    pub fn resolved(&self) -> Vec<&TransformSpec> {
        let mut enabled: Vec<&TransformSpec> = self
            .specs
            .iter()
            .filter(|s| s.order_index.is_some())
            .collect();
        enabled.sort_by_key(|s| s.order_index);
        enabled
    }

    /// Names of enabled transforms in application order.
    pub fn resolved_names(&self) -> Vec<String> {
        self.resolved().into_iter().map(|s| s.name.clone()).collect()
    }

    /// All configured specs in declaration order, enabled or not.
    pub fn specs(&self) -> &[TransformSpec] {
        &self.specs
    }

    pub fn explicit_order(&self) -> Option<&[String]> {
        self.explicit_order.as_deref()
    }

    fn assign_order_indices(&mut self) {
        let enabled: Vec<&str> = self
            .specs
            .iter()
            .filter(|s| s.enabled)
            .map(|s| s.name.as_str())
            .collect();

        // Explicit order filtered to enabled transforms, else the canonical order.
        let mut ordered: Vec<String> = match &self.explicit_order {
            Some(order) => order
                .iter()
                .filter(|n| enabled.contains(&n.as_str()))
                .cloned()
                .collect(),
            None => TransformKind::DEFAULT_ORDER
                .iter()
                .map(|k| k.name())
                .filter(|n| enabled.contains(n))
                .map(str::to_string)
                .collect(),
        };

        let mut unlisted: Vec<String> = enabled
            .iter()
            .filter(|n| !ordered.iter().any(|o| o == *n))
            .map(|n| n.to_string())
            .collect();
        unlisted.sort();
        ordered.extend(unlisted);

        for spec in &mut self.specs {
            spec.order_index = ordered.iter().position(|n| *n == spec.name);
        }
    }
}

fn parse_order(value: &Value, violations: &mut Vec<String>) -> Option<Vec<String>> {
    let Value::Sequence(entries) = value else {
        violations.push(format!("order must be a list of transform names, got {:?}", value));
        return None;
    };

    let mut names: Vec<String> = Vec::with_capacity(entries.len());
    for entry in entries {
        match entry.as_str() {
            Some(name) if names.iter().any(|n| n == name) => {
                violations.push(format!("order lists '{}' more than once", name));
            }
            Some(name) => names.push(name.to_string()),
            None => violations.push(format!("order entries must be strings, got {:?}", entry)),
        }
    }
    Some(names)
}
