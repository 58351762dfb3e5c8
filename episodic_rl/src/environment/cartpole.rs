//! Classic CartPole balancing task (`CartPole-v1` dynamics).
//!
//! Observation: `[x, x_dot, theta, theta_dot]`. Actions: `0` pushes left,
//! `1` pushes right. Reward is `1.0` per surviving step and `0.0` on the
//! failing step. Episodes are truncated after `max_steps` ticks.

use crate::core::Action;
use crate::error::{Result, RlError};

use super::{Environment, Info, Space, StepOutcome};

const GRAVITY: f32 = 9.8;
const CART_MASS: f32 = 1.0;
const POLE_MASS: f32 = 0.1;
const POLE_LENGTH: f32 = 0.5;
const FORCE_MAG: f32 = 10.0;
const DT: f32 = 0.02;
const X_THRESHOLD: f32 = 2.4;
const THETA_THRESHOLD: f32 = 12.0 * std::f32::consts::PI / 180.0;

/// CartPole parameters.
#[derive(Debug, Clone)]
pub struct CartPoleConfig {
    /// Ticks before truncation.
    pub max_steps: u32,
    /// Initial state is drawn uniformly from `[-init_range, init_range]`.
    pub init_range: f32,
    pub seed: u64,
}

impl Default for CartPoleConfig {
    fn default() -> Self {
        Self {
            max_steps: 500,
            init_range: 0.05,
            seed: 41,
        }
    }
}

impl CartPoleConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_steps(mut self, max_steps: u32) -> Self {
        self.max_steps = max_steps;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
}

/// Single CartPole instance.
pub struct CartPole {
    config: CartPoleConfig,
    rng: fastrand::Rng,
    state: [f32; 4],
    ticks: u32,
    closed: bool,
}

impl CartPole {
    /// `[x, x_dot, theta, theta_dot]` with bounds at twice the failure thresholds.
    pub fn declared_observation_space() -> Space {
        let high = vec![X_THRESHOLD * 2.0, f32::INFINITY, THETA_THRESHOLD * 2.0, f32::INFINITY];
        Space::Box {
            shape: vec![4],
            low: high.iter().map(|h| -h).collect(),
            high,
        }
    }

    pub fn new(config: CartPoleConfig) -> Self {
        let rng = fastrand::Rng::with_seed(config.seed);
        Self {
            config,
            rng,
            state: [0.0; 4],
            ticks: 0,
            closed: false,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    fn uniform(&mut self) -> f32 {
        let r = self.config.init_range;
        self.rng.f32() * 2.0 * r - r
    }
}

impl Environment for CartPole {
    fn name(&self) -> &str {
        "CartPole-v1"
    }

    fn reset(&mut self) -> Result<(Vec<f32>, Info)> {
        for i in 0..4 {
            self.state[i] = self.uniform();
        }
        self.ticks = 0;
        Ok((self.state.to_vec(), Info::new()))
    }

    fn step(&mut self, action: &Action) -> Result<StepOutcome> {
        let force = match action {
            Action::Discrete(0) => -FORCE_MAG,
            Action::Discrete(1) => FORCE_MAG,
            other => {
                return Err(RlError::InvalidAction(format!(
                    "CartPole expects Discrete(0|1), got {:?}",
                    other
                )))
            }
        };

        let [x, x_dot, theta, theta_dot] = self.state;
        let cos_theta = theta.cos();
        let sin_theta = theta.sin();

        let total_mass = CART_MASS + POLE_MASS;
        let pole_mass_length = POLE_MASS * POLE_LENGTH;

        let temp = (force + pole_mass_length * theta_dot * theta_dot * sin_theta) / total_mass;
        let denom = POLE_LENGTH * (4.0 / 3.0 - POLE_MASS * cos_theta * cos_theta / total_mass);
        let theta_acc = (GRAVITY * sin_theta - cos_theta * temp) / denom.max(1e-6);
        let x_acc = temp - pole_mass_length * theta_acc * cos_theta / total_mass;

        self.state = [
            x + DT * x_dot,
            x_dot + DT * x_acc,
            theta + DT * theta_dot,
            theta_dot + DT * theta_acc,
        ];
        self.ticks += 1;

        let terminated = self.state[0].abs() > X_THRESHOLD || self.state[2].abs() > THETA_THRESHOLD;
        let truncated = !terminated && self.ticks >= self.config.max_steps;
        let reward = if terminated { 0.0 } else { 1.0 };

        Ok(StepOutcome::new(self.state.to_vec(), reward, terminated, truncated))
    }

    fn observation_space(&self) -> Space {
        Self::declared_observation_space()
    }

    fn action_space(&self) -> Space {
        Space::Discrete { n: 2 }
    }

    fn close(&mut self) {
        self.closed = true;
    }
}
