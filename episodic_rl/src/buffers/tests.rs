//! Behavioral tests for the buffers submodule.
//!
//! - ReplayBuffer: FIFO retention, readiness, sampling without replacement
//! - EpisodeBuffer: terminal/truncation segmentation, bounded queue, views

use std::collections::HashSet;

use proptest::prelude::*;

use super::*;
use crate::core::{Action, Transition};
use crate::error::RlError;

// =============================================================================
// HELPER FUNCTIONS
// =============================================================================

/// Transition whose state encodes its insertion index.
fn tagged(i: usize) -> Transition {
    Transition::new_discrete(
        vec![i as f32],
        (i % 2) as u32,
        i as f32 * 0.1,
        vec![(i + 1) as f32],
        false,
        false,
    )
}

fn tags<'a>(it: impl Iterator<Item = &'a Transition>) -> Vec<usize> {
    it.map(|t| t.state[0] as usize).collect()
}

// =============================================================================
// REPLAY BUFFER
// =============================================================================

#[test]
fn test_replay_evicts_oldest_first() {
    let mut buffer = ReplayBuffer::with_seed(5, 1, 0);
    for i in 1..=7 {
        buffer.add(tagged(i));
    }
    assert_eq!(buffer.len(), 5);
    assert_eq!(tags(buffer.iter()), vec![3, 4, 5, 6, 7]);
}

#[test]
fn test_replay_ready_threshold() {
    let mut buffer = ReplayBuffer::with_seed(10, 3, 0);
    assert!(buffer.is_empty());
    buffer.add(tagged(0));
    buffer.add(tagged(1));
    assert!(!buffer.ready());
    buffer.add(tagged(2));
    assert!(buffer.ready());
    assert_eq!(buffer.min_ready(), 3);
}

#[test]
fn test_replay_sample_distinct() {
    let mut buffer = ReplayBuffer::with_seed(100, 1, 42);
    for i in 0..50 {
        buffer.add(tagged(i));
    }
    let batch = buffer.sample(50).unwrap();
    let unique: HashSet<usize> = tags(batch.iter()).into_iter().collect();
    assert_eq!(unique.len(), 50);
}

#[test]
fn test_replay_sample_more_than_stored_fails() {
    let mut buffer = ReplayBuffer::with_seed(10, 1, 0);
    for i in 0..4 {
        buffer.add(tagged(i));
    }
    match buffer.sample(5) {
        Err(RlError::InsufficientData {
            requested,
            available,
            min_ready,
        }) => {
            assert_eq!((requested, available, min_ready), (5, 4, 1));
        }
        other => panic!("expected InsufficientData, got {:?}", other),
    }
}

#[test]
fn test_replay_sample_below_min_ready_fails() {
    let mut buffer = ReplayBuffer::with_seed(10, 8, 0);
    for i in 0..4 {
        buffer.add(tagged(i));
    }
    assert!(matches!(
        buffer.sample(2),
        Err(RlError::InsufficientData { .. })
    ));
}

#[test]
fn test_replay_seeded_sampling_is_reproducible() {
    let fill = |seed| {
        let mut buffer = ReplayBuffer::with_seed(32, 1, seed);
        for i in 0..32 {
            buffer.add(tagged(i));
        }
        buffer
    };
    let mut a = fill(9);
    let mut b = fill(9);
    assert_eq!(a.sample(8).unwrap(), b.sample(8).unwrap());
}

#[test]
fn test_replay_repeated_sampling_while_growing() {
    let mut buffer = ReplayBuffer::with_seed(16, 1, 5);
    for i in 0..40 {
        buffer.add(tagged(i));
        let k = buffer.len().min(4);
        let stored: HashSet<usize> = tags(buffer.iter()).into_iter().collect();
        let drawn = tags(buffer.sample(k).unwrap().iter());
        let unique: HashSet<usize> = drawn.iter().copied().collect();
        assert_eq!(unique.len(), k);
        assert!(unique.is_subset(&stored));
    }

    buffer.clear();
    for i in 100..103 {
        buffer.add(tagged(i));
    }
    let mut drawn = tags(buffer.sample(3).unwrap().iter());
    drawn.sort_unstable();
    assert_eq!(drawn, vec![100, 101, 102]);
}

#[test]
fn test_replay_clear() {
    let mut buffer = ReplayBuffer::with_seed(3, 1, 0);
    for i in 0..5 {
        buffer.add(tagged(i));
    }
    buffer.clear();
    assert!(buffer.is_empty());
    buffer.add(tagged(9));
    assert_eq!(tags(buffer.iter()), vec![9]);
    assert_eq!(buffer.capacity(), 3);
}

proptest! {
    /// After N inserts into capacity C the buffer holds exactly the
    /// min(N, C) most recent transitions, oldest first.
    #[test]
    fn prop_replay_retains_most_recent(capacity in 1usize..40, inserts in 0usize..120) {
        let mut buffer = ReplayBuffer::with_seed(capacity, 1, 1);
        for i in 0..inserts {
            buffer.add(tagged(i));
            prop_assert!(buffer.len() <= capacity);
        }
        let expected: Vec<usize> = (inserts.saturating_sub(capacity)..inserts).collect();
        prop_assert_eq!(tags(buffer.iter()), expected);
    }

    /// Samples never repeat an index.
    #[test]
    fn prop_replay_sample_without_replacement(
        stored in 1usize..60,
        seed in any::<u64>(),
        frac in 0.0f64..1.0,
    ) {
        let mut buffer = ReplayBuffer::with_seed(64, 1, seed);
        for i in 0..stored {
            buffer.add(tagged(i));
        }
        let k = ((stored as f64) * frac).round() as usize;
        let batch = buffer.sample(k).unwrap();
        let unique: HashSet<usize> = tags(batch.iter()).into_iter().collect();
        prop_assert_eq!(unique.len(), k);
    }
}

// =============================================================================
// EPISODE BUFFER
// =============================================================================

fn step(buffer: &mut EpisodeBuffer, reward: f32, terminal: bool) {
    buffer.add_step(vec![reward], Action::Discrete(0), reward, terminal);
}

#[test]
fn test_episode_terminal_closes_episode() {
    let mut buffer = EpisodeBuffer::new();
    step(&mut buffer, 1.0, false);
    step(&mut buffer, 2.0, false);
    assert_eq!(buffer.current_len(), 2);
    assert_eq!(buffer.num_completed(), 0);

    step(&mut buffer, 3.0, true);
    assert_eq!(buffer.current_len(), 0);
    assert_eq!(buffer.num_completed(), 1);

    let latest = buffer.get_latest_episode().unwrap();
    assert_eq!(latest.len(), 3);
    assert_eq!(latest.total_reward(), 6.0);
    assert!(latest.ended_terminal());
}

#[test]
fn test_episode_latest_on_empty_fails() {
    let buffer = EpisodeBuffer::new();
    assert!(matches!(
        buffer.get_latest_episode(),
        Err(RlError::EmptyBuffer)
    ));
}

#[test]
fn test_episode_end_episode_closes_truncated() {
    let mut buffer = EpisodeBuffer::new();
    buffer.end_episode();
    assert_eq!(buffer.num_completed(), 0);

    step(&mut buffer, 1.0, false);
    buffer.end_episode();
    assert_eq!(buffer.num_completed(), 1);
    assert!(!buffer.get_latest_episode().unwrap().ended_terminal());
}

#[test]
fn test_episode_views_and_drain() {
    let mut buffer = EpisodeBuffer::new();
    step(&mut buffer, 1.0, true);
    step(&mut buffer, 2.0, false);
    step(&mut buffer, 2.0, true);

    assert_eq!(buffer.episode_rewards(), vec![1.0, 4.0]);
    assert_eq!(buffer.episode_lengths(), vec![1, 2]);

    let drained = buffer.drain_completed();
    assert_eq!(drained.len(), 2);
    assert_eq!(drained[0].total_reward(), 1.0);
    assert_eq!(buffer.num_completed(), 0);
    assert!(buffer.episode_rewards().is_empty());
}

#[test]
fn test_episode_bounded_queue_drops_oldest() {
    let mut buffer = EpisodeBuffer::with_max_episodes(2);
    for r in [1.0, 2.0, 3.0] {
        step(&mut buffer, r, true);
    }
    assert_eq!(buffer.episode_rewards(), vec![2.0, 3.0]);
}

#[test]
fn test_episode_clear() {
    let mut buffer = EpisodeBuffer::new();
    step(&mut buffer, 1.0, true);
    step(&mut buffer, 1.0, false);
    buffer.clear();
    assert_eq!(buffer.current_len(), 0);
    assert_eq!(buffer.num_completed(), 0);
}
