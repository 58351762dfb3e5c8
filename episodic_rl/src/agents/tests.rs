//! Agent contract tests.
//!
//! - Variant mapping and space validation
//! - DQN: epsilon schedule, target sync, persistence round trip
//! - REINFORCE: episode updates, batch protocol, eval determinism
//! - Cross-variant snapshot rejection

use super::*;
use crate::core::EpisodeStep;

type B = TrainBackend;

// =============================================================================
// HELPER FUNCTIONS
// =============================================================================

fn obs_space() -> Space {
    Space::unbounded(vec![4])
}

fn actions() -> Space {
    Space::Discrete { n: 2 }
}

fn algorithm(kind: &str) -> AlgorithmConfig {
    AlgorithmConfig {
        kind: kind.to_string(),
        hidden_size: 16,
        ..AlgorithmConfig::default()
    }
}

fn transitions(n: usize) -> Vec<Transition> {
    (0..n)
        .map(|i| {
            let x = i as f32 * 0.1;
            Transition::new_discrete(
                vec![x, -x, 0.5 * x, 1.0],
                (i % 2) as u32,
                1.0,
                vec![x + 0.1, -x, 0.5 * x, 1.0],
                i == n - 1,
                false,
            )
        })
        .collect()
}

fn episode(len: usize) -> Episode {
    let mut ep = Episode::new();
    for i in 0..len {
        let x = i as f32 * 0.05;
        ep.push(EpisodeStep {
            observation: vec![x, 0.0, -x, 0.2],
            action: Action::Discrete((i % 2) as u32),
            reward: 1.0,
            terminal: i == len - 1,
        });
    }
    ep
}

fn dqn(config: DqnConfig) -> DqnAgent<B> {
    DqnAgent::<B>::new(config, &obs_space(), &actions(), Default::default()).unwrap()
}

fn reinforce(seed: u64) -> ReinforceAgent<B> {
    let config = ReinforceConfig {
        hidden_size: 16,
        seed,
        ..ReinforceConfig::default()
    };
    ReinforceAgent::<B>::new(config, &obs_space(), &actions(), Default::default()).unwrap()
}

// =============================================================================
// VARIANT MAPPING
// =============================================================================

#[test]
fn test_algorithm_names_map_to_variants() {
    assert_eq!(AgentKind::from_algorithm_name("random").unwrap(), AgentKind::Random);
    assert_eq!(AgentKind::from_algorithm_name("DQN").unwrap(), AgentKind::Dqn);
    for name in ["REINFORCE", "PPO", "grpo"] {
        assert_eq!(AgentKind::from_algorithm_name(name).unwrap(), AgentKind::Reinforce);
    }
    assert!(AgentKind::Reinforce.on_policy());
    assert!(!AgentKind::Dqn.on_policy());
}

#[test]
fn test_sarsa_is_rejected() {
    let err = AgentKind::from_algorithm_name("SARSA").unwrap_err();
    assert!(matches!(err, RlError::ConfigValidation(_)));
    assert!(err.to_string().contains("SARSA"));

    let err = AgentKind::from_algorithm_name("A3C").unwrap_err();
    assert!(err.to_string().contains("unknown"));
}

#[test]
fn test_network_dims_requires_box_and_discrete() {
    assert_eq!(
        network_dims(AgentKind::Dqn, &obs_space(), &actions()).unwrap(),
        (4, 2)
    );
    let err = network_dims(AgentKind::Dqn, &Space::Discrete { n: 3 }, &actions()).unwrap_err();
    assert!(matches!(err, RlError::UnsupportedSpace(_)));
    let err = network_dims(
        AgentKind::Reinforce,
        &obs_space(),
        &Space::uniform_box(vec![1], -1.0, 1.0),
    )
    .unwrap_err();
    assert!(matches!(err, RlError::UnsupportedSpace(_)));
}

#[test]
fn test_build_agent_for_each_kind() {
    for (name, kind) in [
        ("RANDOM", AgentKind::Random),
        ("DQN", AgentKind::Dqn),
        ("PPO", AgentKind::Reinforce),
    ] {
        let agent = build_agent(&algorithm(name), &obs_space(), &actions(), 7).unwrap();
        assert_eq!(agent.kind(), kind);
        assert_eq!(agent.on_policy(), kind.on_policy());
    }
}

#[test]
fn test_build_agent_rejects_continuous_actions_for_dqn() {
    let result = build_agent(
        &algorithm("DQN"),
        &obs_space(),
        &Space::uniform_box(vec![2], -1.0, 1.0),
        0,
    );
    assert!(matches!(result, Err(RlError::UnsupportedSpace(_))));
}

// =============================================================================
// DQN
// =============================================================================

#[test]
fn test_dqn_epsilon_decays_to_floor() {
    let mut agent = dqn(DqnConfig {
        hidden_size: 16,
        epsilon_start: 1.0,
        epsilon_end: 0.1,
        epsilon_decay: 0.5,
        ..DqnConfig::default()
    });
    assert_eq!(agent.epsilon(), 1.0);

    let loss = agent.update(Batch::Transitions(transitions(8))).unwrap();
    assert!(loss.unwrap().is_finite());
    assert!((agent.epsilon() - 0.5).abs() < 1e-6);

    for _ in 0..4 {
        agent.update(Batch::Transitions(transitions(8))).unwrap();
    }
    assert!((agent.epsilon() - 0.1).abs() < 1e-6);
}

#[test]
fn test_dqn_target_is_hard_copy_after_sync() {
    let mut agent = dqn(DqnConfig {
        hidden_size: 16,
        target_update_every: 2,
        ..DqnConfig::default()
    });
    let probe = [0.3, -0.2, 0.1, 1.0];

    agent.update(Batch::Transitions(transitions(8))).unwrap();
    agent.update(Batch::Transitions(transitions(8))).unwrap();
    assert_eq!(agent.target_sync().updates(), 2);
    assert_eq!(
        agent.q_values(&probe).unwrap(),
        agent.target_q_values(&probe).unwrap()
    );
}

#[test]
fn test_dqn_empty_and_wrong_batches() {
    let mut agent = dqn(DqnConfig {
        hidden_size: 16,
        ..DqnConfig::default()
    });
    assert_eq!(agent.update(Batch::Transitions(Vec::new())).unwrap(), None);
    let err = agent.update(Batch::Episodes(vec![episode(3)])).unwrap_err();
    assert!(matches!(err, RlError::InvalidBatch(_)));
    assert!(matches!(
        agent.q_values(&[0.0; 3]),
        Err(RlError::ShapeMismatch { expected: 4, actual: 3 })
    ));
}

#[test]
fn test_dqn_eval_actions_are_greedy() {
    let mut agent = dqn(DqnConfig {
        hidden_size: 16,
        epsilon_start: 1.0,
        ..DqnConfig::default()
    });
    let obs = [0.1, 0.2, 0.3, 0.4];
    let q = agent.q_values(&obs).unwrap();
    for _ in 0..10 {
        let (action, info) = agent.select_action(&obs, false).unwrap();
        assert_eq!(action.discrete().unwrap() as usize, networks::argmax(&q));
        assert_eq!(info["greedy"], true);
    }
}

#[test]
fn test_dqn_save_load_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("dqn.agent");
    let config = DqnConfig {
        hidden_size: 16,
        epsilon_decay: 0.9,
        ..DqnConfig::default()
    };

    let mut agent = dqn(config.clone());
    agent.update(Batch::Transitions(transitions(8))).unwrap();
    agent.metrics_mut().update(12.0, 12, Some(0.5));
    agent.save(&path).unwrap();

    let mut restored = dqn(DqnConfig {
        seed: 1234,
        ..config
    });
    restored.load(&path).unwrap();

    let obs = [0.5, -0.5, 0.25, 1.0];
    assert_eq!(restored.epsilon(), agent.epsilon());
    assert_eq!(restored.q_values(&obs).unwrap(), agent.q_values(&obs).unwrap());
    assert_eq!(
        restored.select_action(&obs, true).unwrap().0,
        agent.select_action(&obs, true).unwrap().0
    );
    assert_eq!(restored.metrics().total_episodes(), 1);

    let a = agent.update(Batch::Transitions(transitions(8))).unwrap().unwrap();
    let b = restored.update(Batch::Transitions(transitions(8))).unwrap().unwrap();
    assert!((a - b).abs() < 1e-6);
    assert_eq!(restored.q_values(&obs).unwrap(), agent.q_values(&obs).unwrap());
}

#[test]
fn test_dqn_rejects_snapshot_with_other_dims() {
    let agent = dqn(DqnConfig {
        hidden_size: 16,
        ..DqnConfig::default()
    });
    let snapshot = agent.snapshot().unwrap();

    let mut wider = DqnAgent::<B>::new(
        DqnConfig {
            hidden_size: 16,
            ..DqnConfig::default()
        },
        &Space::unbounded(vec![6]),
        &actions(),
        Default::default(),
    )
    .unwrap();
    let err = wider.restore(snapshot).unwrap_err();
    assert!(matches!(err, RlError::CheckpointIncompatible(_)));
}

// =============================================================================
// REINFORCE
// =============================================================================

#[test]
fn test_reinforce_learns_from_episodes() {
    let mut agent = reinforce(3);
    let loss = agent
        .update(Batch::Episodes(vec![episode(5), episode(8)]))
        .unwrap();
    assert!(loss.unwrap().is_finite());
    assert_eq!(agent.updates(), 1);
}

#[test]
fn test_reinforce_batch_protocol() {
    let mut agent = reinforce(3);
    assert_eq!(agent.update(Batch::Episodes(Vec::new())).unwrap(), None);
    assert_eq!(agent.update(Batch::Episodes(vec![Episode::new()])).unwrap(), None);
    let err = agent.update(Batch::Transitions(transitions(4))).unwrap_err();
    assert!(matches!(err, RlError::InvalidBatch(_)));
    assert_eq!(agent.updates(), 0);
}

#[test]
fn test_reinforce_probs_and_eval_argmax() {
    let mut agent = reinforce(9);
    let obs = [0.0, 0.1, 0.2, 0.3];
    let probs = agent.action_probs(&obs).unwrap();
    assert_eq!(probs.len(), 2);
    assert!((probs.iter().sum::<f32>() - 1.0).abs() < 1e-5);

    let expected = networks::argmax(&probs) as u32;
    for _ in 0..10 {
        let (action, info) = agent.select_action(&obs, false).unwrap();
        assert_eq!(action, Action::Discrete(expected));
        assert!(info.contains_key("probs"));
    }
    for _ in 0..20 {
        let (action, _) = agent.select_action(&obs, true).unwrap();
        assert!(action.discrete().unwrap() < 2);
    }
}

#[test]
fn test_reinforce_snapshot_roundtrip() {
    let mut agent = reinforce(5);
    agent.update(Batch::Episodes(vec![episode(6)])).unwrap();
    let snapshot = agent.snapshot().unwrap();

    let mut restored = reinforce(77);
    restored.restore(snapshot).unwrap();
    let obs = [0.2, 0.2, -0.1, 0.0];
    assert_eq!(
        restored.action_probs(&obs).unwrap(),
        agent.action_probs(&obs).unwrap()
    );
    assert_eq!(restored.updates(), 1);
    assert_eq!(
        restored.select_action(&obs, true).unwrap().0,
        agent.select_action(&obs, true).unwrap().0
    );

    let a = agent.update(Batch::Episodes(vec![episode(4)])).unwrap().unwrap();
    let b = restored.update(Batch::Episodes(vec![episode(4)])).unwrap().unwrap();
    assert!((a - b).abs() < 1e-6, "{} vs {}", a, b);
    assert_eq!(restored.updates(), 2);
}

// =============================================================================
// CROSS-VARIANT
// =============================================================================

#[test]
fn test_snapshot_of_other_kind_is_incompatible() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("dqn.agent");
    dqn(DqnConfig {
        hidden_size: 16,
        ..DqnConfig::default()
    })
    .save(&path)
    .unwrap();

    let mut agent = reinforce(0);
    let err = agent.load(&path).unwrap_err();
    assert!(matches!(err, RlError::CheckpointIncompatible(_)));
}

#[test]
fn test_reset_clears_metrics_only() {
    let mut agent = reinforce(1);
    agent.metrics_mut().update(3.0, 3, None);
    let obs = [0.0; 4];
    let before = agent.action_probs(&obs).unwrap();
    agent.reset();
    assert_eq!(agent.metrics().total_episodes(), 0);
    assert_eq!(agent.action_probs(&obs).unwrap(), before);
}
