//! Experience storage.
//!
//! Different training protocols need different buffer semantics:
//! - `ReplayBuffer`: off-policy, bounded ring of transitions sampled uniformly
//! - `EpisodeBuffer`: on-policy, whole episodes consumed after each update

pub mod episode_buffer;
pub mod replay_buffer;

pub use episode_buffer::EpisodeBuffer;
pub use replay_buffer::ReplayBuffer;

#[cfg(test)]
mod tests;
