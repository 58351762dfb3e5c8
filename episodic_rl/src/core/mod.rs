//! Core types shared by every component of the harness.

pub mod episode_state;
pub mod running_stats;
pub mod target_network;
pub mod transition;

pub use episode_state::EpisodeState;
pub use running_stats::{RunningStatistic, DEFAULT_EPSILON, DEFAULT_MOMENTUM};
pub use target_network::{hard_copy, TargetSync};
pub use transition::{Action, Episode, EpisodeStep, Transition};
