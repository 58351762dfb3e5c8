//! Experience record types.
//!
//! - `Transition`: one `(state, action, reward, next_state, terminal)` tuple,
//!   stored by the replay buffer for off-policy learning
//! - `EpisodeStep` / `Episode`: the per-step records an on-policy learner
//!   consumes as a whole trajectory

use serde::{Deserialize, Serialize};

use crate::core::episode_state::EpisodeState;

/// Action representation (discrete or continuous).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Action {
    /// Discrete action index
    Discrete(u32),
    /// Continuous action vector
    Continuous(Vec<f32>),
}

impl Action {
    /// Discrete index, or `None` for a continuous action.
    pub fn discrete(&self) -> Option<u32> {
        match self {
            Action::Discrete(a) => Some(*a),
            Action::Continuous(_) => None,
        }
    }

    /// Continuous vector, or `None` for a discrete action.
    pub fn continuous(&self) -> Option<&[f32]> {
        match self {
            Action::Discrete(_) => None,
            Action::Continuous(a) => Some(a),
        }
    }
}

/// Base transition for off-policy learning.
///
/// Immutable once pushed into a [`ReplayBuffer`](crate::buffers::ReplayBuffer).
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    /// Current state observation
    pub state: Vec<f32>,
    /// Action taken
    pub action: Action,
    /// Reward received
    pub reward: f32,
    /// Next state observation
    pub next_state: Vec<f32>,
    /// Episode terminated (absorbing state)
    pub terminal: bool,
    /// Episode truncated (time limit)
    pub truncated: bool,
}

impl Transition {
    pub fn new(
        state: Vec<f32>,
        action: Action,
        reward: f32,
        next_state: Vec<f32>,
        terminal: bool,
        truncated: bool,
    ) -> Self {
        Self {
            state,
            action,
            reward,
            next_state,
            terminal,
            truncated,
        }
    }

    /// Create a new transition with discrete action.
    pub fn new_discrete(
        state: Vec<f32>,
        action: u32,
        reward: f32,
        next_state: Vec<f32>,
        terminal: bool,
        truncated: bool,
    ) -> Self {
        Self::new(state, Action::Discrete(action), reward, next_state, terminal, truncated)
    }

    /// Check if episode ended (terminal or truncated).
    pub fn done(&self) -> bool {
        self.terminal || self.truncated
    }

    pub fn episode_state(&self) -> EpisodeState {
        EpisodeState::from_flags(self.terminal, self.truncated)
    }
}

/// One step of an episode as seen by the agent.
#[derive(Debug, Clone, PartialEq)]
pub struct EpisodeStep {
    pub observation: Vec<f32>,
    pub action: Action,
    pub reward: f32,
    pub terminal: bool,
}

/// Ordered steps from reset to terminal or truncation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Episode {
    pub steps: Vec<EpisodeStep>,
}

impl Episode {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, step: EpisodeStep) {
        self.steps.push(step);
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Undiscounted return.
    pub fn total_reward(&self) -> f32 {
        self.steps.iter().map(|s| s.reward).sum()
    }

    /// Whether the last step was an absorbing state (as opposed to truncation).
    pub fn ended_terminal(&self) -> bool {
        self.steps.last().map(|s| s.terminal).unwrap_or(false)
    }

    pub fn rewards(&self) -> Vec<f32> {
        self.steps.iter().map(|s| s.reward).collect()
    }

    /// Discounted returns `G_t = r_t + γ G_{t+1}`, computed backwards.
    pub fn discounted_returns(&self, gamma: f32) -> Vec<f32> {
        let mut returns = vec![0.0; self.steps.len()];
        let mut running = 0.0;
        for (i, step) in self.steps.iter().enumerate().rev() {
            running = step.reward + gamma * running;
            returns[i] = running;
        }
        returns
    }

    pub fn iter(&self) -> impl Iterator<Item = &EpisodeStep> {
        self.steps.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step(reward: f32, terminal: bool) -> EpisodeStep {
        EpisodeStep {
            observation: vec![0.0],
            action: Action::Discrete(0),
            reward,
            terminal,
        }
    }

    #[test]
    fn test_transition_done_flags() {
        let t = Transition::new_discrete(vec![1.0, 2.0], 1, 0.5, vec![2.0, 3.0], false, false);
        assert_eq!(t.action.discrete(), Some(1));
        assert!(!t.done());
        assert!(t.episode_state().is_running());

        let t = Transition::new_discrete(vec![1.0], 0, 0.0, vec![2.0], true, false);
        assert!(t.done());
        assert!(t.episode_state().is_terminal());

        let t = Transition::new_discrete(vec![1.0], 0, 0.0, vec![2.0], false, true);
        assert!(t.done());
        assert!(t.episode_state().is_truncated());
    }

    #[test]
    fn test_action_accessors() {
        assert_eq!(Action::Discrete(3).continuous(), None);
        let a = Action::Continuous(vec![0.5, -0.5]);
        assert_eq!(a.discrete(), None);
        assert_eq!(a.continuous(), Some(&[0.5, -0.5][..]));
    }

    #[test]
    fn test_episode_returns() {
        let mut ep = Episode::new();
        ep.push(step(1.0, false));
        ep.push(step(1.0, false));
        ep.push(step(1.0, true));

        assert_eq!(ep.len(), 3);
        assert_eq!(ep.total_reward(), 3.0);
        assert!(ep.ended_terminal());

        let returns = ep.discounted_returns(0.5);
        assert!((returns[2] - 1.0).abs() < 1e-6);
        assert!((returns[1] - 1.5).abs() < 1e-6);
        assert!((returns[0] - 1.75).abs() < 1e-6);
    }
}
