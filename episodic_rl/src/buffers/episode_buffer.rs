//! Per-episode segmentation for on-policy learning.

use std::collections::VecDeque;

use crate::core::{Action, Episode, EpisodeStep};
use crate::error::{Result, RlError};

/// Splits a step stream into episodes.
///
/// Steps accumulate in the current episode until a terminal step or an
/// explicit [`end_episode`](Self::end_episode) moves it to the completed
/// queue. With `max_episodes` set, the oldest completed episode is dropped
/// when the queue is full.
#[derive(Debug, Clone, Default)]
pub struct EpisodeBuffer {
    current: Episode,
    completed: VecDeque<Episode>,
    max_episodes: Option<usize>,
}

impl EpisodeBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_episodes(max_episodes: usize) -> Self {
        Self {
            max_episodes: Some(max_episodes.max(1)),
            ..Self::default()
        }
    }

    /// Record one step; a terminal step closes the current episode.
    pub fn add_step(&mut self, observation: Vec<f32>, action: Action, reward: f32, terminal: bool) {
        self.current.push(EpisodeStep {
            observation,
            action,
            reward,
            terminal,
        });
        if terminal {
            self.close_current();
        }
    }

    /// Close the current episode without a terminal step (truncation).
    pub fn end_episode(&mut self) {
        if !self.current.is_empty() {
            self.close_current();
        }
    }

    fn close_current(&mut self) {
        let episode = std::mem::take(&mut self.current);
        if let Some(max) = self.max_episodes {
            while self.completed.len() >= max {
                self.completed.pop_front();
            }
        }
        self.completed.push_back(episode);
    }

    /// Most recently completed episode.
    pub fn get_latest_episode(&self) -> Result<&Episode> {
        self.completed.back().ok_or(RlError::EmptyBuffer)
    }

    /// Remove and return every completed episode, oldest first.
    pub fn drain_completed(&mut self) -> Vec<Episode> {
        self.completed.drain(..).collect()
    }

    pub fn episode_rewards(&self) -> Vec<f32> {
        self.completed.iter().map(Episode::total_reward).collect()
    }

    pub fn episode_lengths(&self) -> Vec<usize> {
        self.completed.iter().map(Episode::len).collect()
    }

    /// Steps in the episode still in progress.
    pub fn current_len(&self) -> usize {
        self.current.len()
    }

    pub fn num_completed(&self) -> usize {
        self.completed.len()
    }

    pub fn clear(&mut self) {
        self.current = Episode::new();
        self.completed.clear();
    }
}
