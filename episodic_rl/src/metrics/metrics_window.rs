//! Rolling-window episode metrics.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

pub const DEFAULT_WINDOW_SIZE: usize = 100;

/// Summary statistics of one window.
///
/// All fields are zero for an empty window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct WindowStats {
    pub mean: f32,
    pub std: f32,
    pub min: f32,
    pub max: f32,
    pub count: usize,
}

impl WindowStats {
    fn from_values<'a>(values: impl Iterator<Item = &'a f32> + Clone) -> Self {
        let count = values.clone().count();
        if count == 0 {
            return Self::default();
        }
        let n = count as f64;
        let mean = values.clone().map(|&v| v as f64).sum::<f64>() / n;
        let var = values
            .clone()
            .map(|&v| {
                let d = v as f64 - mean;
                d * d
            })
            .sum::<f64>()
            / n;
        let min = values.clone().copied().fold(f32::INFINITY, f32::min);
        let max = values.copied().fold(f32::NEG_INFINITY, f32::max);
        Self {
            mean: mean as f32,
            std: var.sqrt() as f32,
            min,
            max,
            count,
        }
    }
}

/// Windowed statistics for the most recent episodes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct EpisodeStats {
    pub reward: WindowStats,
    pub length: WindowStats,
    pub loss: WindowStats,
}

/// Lifetime totals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainingStats {
    pub total_episodes: u64,
    pub total_steps: u64,
    pub total_reward: f64,
    pub mean_reward_lifetime: f64,
}

/// Serializable copy of a [`MetricsWindow`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub window_size: usize,
    pub rewards: Vec<f32>,
    pub lengths: Vec<f32>,
    pub losses: Vec<f32>,
    pub total_episodes: u64,
    pub total_steps: u64,
    pub total_reward: f64,
}

/// Bounded windows of recent episode rewards, lengths and losses plus
/// monotonically increasing totals.
///
/// Totals only go back to zero through [`reset`](Self::reset).
#[derive(Debug, Clone)]
pub struct MetricsWindow {
    window_size: usize,
    rewards: VecDeque<f32>,
    lengths: VecDeque<f32>,
    losses: VecDeque<f32>,
    total_episodes: u64,
    total_steps: u64,
    total_reward: f64,
}

impl Default for MetricsWindow {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW_SIZE)
    }
}

impl MetricsWindow {
    pub fn new(window_size: usize) -> Self {
        let window_size = window_size.max(1);
        Self {
            window_size,
            rewards: VecDeque::with_capacity(window_size),
            lengths: VecDeque::with_capacity(window_size),
            losses: VecDeque::with_capacity(window_size),
            total_episodes: 0,
            total_steps: 0,
            total_reward: 0.0,
        }
    }

    /// Record one finished episode. `loss` is only pushed when present.
    pub fn update(&mut self, reward: f32, length: usize, loss: Option<f32>) {
        push_bounded(&mut self.rewards, reward, self.window_size);
        push_bounded(&mut self.lengths, length as f32, self.window_size);
        if let Some(loss) = loss {
            push_bounded(&mut self.losses, loss, self.window_size);
        }
        self.total_episodes += 1;
        self.total_steps += length as u64;
        self.total_reward += reward as f64;
    }

    pub fn get_episode_stats(&self) -> EpisodeStats {
        EpisodeStats {
            reward: WindowStats::from_values(self.rewards.iter()),
            length: WindowStats::from_values(self.lengths.iter()),
            loss: WindowStats::from_values(self.losses.iter()),
        }
    }

    pub fn get_training_stats(&self) -> TrainingStats {
        let mean_reward_lifetime = if self.total_episodes == 0 {
            0.0
        } else {
            self.total_reward / self.total_episodes as f64
        };
        TrainingStats {
            total_episodes: self.total_episodes,
            total_steps: self.total_steps,
            total_reward: self.total_reward,
            mean_reward_lifetime,
        }
    }

    pub fn reward_window(&self) -> &VecDeque<f32> {
        &self.rewards
    }

    pub fn length_window(&self) -> &VecDeque<f32> {
        &self.lengths
    }

    pub fn loss_window(&self) -> &VecDeque<f32> {
        &self.losses
    }

    pub fn window_size(&self) -> usize {
        self.window_size
    }

    pub fn total_episodes(&self) -> u64 {
        self.total_episodes
    }

    /// Clear windows and totals together.
    pub fn reset(&mut self) {
        self.rewards.clear();
        self.lengths.clear();
        self.losses.clear();
        self.total_episodes = 0;
        self.total_steps = 0;
        self.total_reward = 0.0;
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            window_size: self.window_size,
            rewards: self.rewards.iter().copied().collect(),
            lengths: self.lengths.iter().copied().collect(),
            losses: self.losses.iter().copied().collect(),
            total_episodes: self.total_episodes,
            total_steps: self.total_steps,
            total_reward: self.total_reward,
        }
    }

    /// Replace all state with `snapshot`, keeping this window's size.
    pub fn restore(&mut self, snapshot: &MetricsSnapshot) {
        let size = self.window_size;
        let keep = |values: &[f32]| -> VecDeque<f32> {
            let skip = values.len().saturating_sub(size);
            values[skip..].iter().copied().collect()
        };
        self.rewards = keep(&snapshot.rewards);
        self.lengths = keep(&snapshot.lengths);
        self.losses = keep(&snapshot.losses);
        self.total_episodes = snapshot.total_episodes;
        self.total_steps = snapshot.total_steps;
        self.total_reward = snapshot.total_reward;
    }
}

fn push_bounded(window: &mut VecDeque<f32>, value: f32, size: usize) {
    if window.len() == size {
        window.pop_front();
    }
    window.push_back(value);
}
