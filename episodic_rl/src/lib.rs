//! # Episodic RL: single-process experiment harness
//!
//! Runs reinforcement-learning experiments on episodic environments:
//! configurable observation/reward transforms, replay and episode stores,
//! a training loop with scheduled evaluation, and resumable checkpoints.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                        ExperimentRunner                          │
//! │   ConfigLayers ──► ExperimentConfig (validated once, immutable)  │
//! ├──────────────────────────────────────────────────────────────────┤
//! │                                                                  │
//! │  ┌──────────────────┐  obs/reward   ┌──────────────────────────┐ │
//! │  │ TransformChain   │──────────────►│ Trainer<S>               │ │
//! │  │  TimeLimit       │               │  Idle/Training/          │ │
//! │  │  FrameStack      │◄──────────────│  Evaluating/Checkpointing│ │
//! │  │  Normalize*      │    action     │                          │ │
//! │  │  CartPole        │               │  S = OffPolicyStrategy   │ │
//! │  └──────────────────┘               │      (ReplayBuffer)      │ │
//! │                                     │  S = OnPolicyStrategy    │ │
//! │  ┌──────────────────┐   Batch       │      (EpisodeBuffer)     │ │
//! │  │ Box<dyn Agent>   │◄──────────────│                          │ │
//! │  │ Random/DQN/      │               └────────────┬─────────────┘ │
//! │  │ REINFORCE        │                            ▼               │
//! │  └──────────────────┘               Checkpointer (.ckpt + .meta) │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Everything runs on one thread: no step, action selection or update
//! overlaps another.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use episodic_rl::{ConfigLayers, ExperimentRunner, LayerKind};
//!
//! let config = ConfigLayers::new()
//!     .with_yaml(LayerKind::Algorithm, "type: DQN\nlearning_rate: 0.0005\n")?
//!     .with_yaml(LayerKind::Wrappers, "normalize_observations: { enabled: true }\n")?
//!     .resolve()?;
//!
//! let summary = ExperimentRunner::new(config)?.run()?;
//! println!("{:?}", summary.training.map(|r| r.final_avg_reward));
//! ```

pub mod agents;
pub mod buffers;
pub mod checkpoint;
pub mod config;
pub mod core;
pub mod environment;
pub mod error;
pub mod experiment;
pub mod metrics;
pub mod runners;
pub mod transforms;

// Core types
pub use core::{Action, Episode, EpisodeStep, EpisodeState, RunningStatistic, Transition};
pub use error::{Result, RlError};

// Configuration
pub use config::{ConfigLayers, ExperimentConfig, LayerKind};

// Environments and transforms
pub use environment::{Environment, EnvironmentFactory, HookOutcome, HookReport, Space, StepOutcome};
pub use transforms::{TransformChain, TransformStats, WrapperConfig};

// Experience stores
pub use buffers::{EpisodeBuffer, ReplayBuffer};

// Agents
pub use agents::{build_agent, Agent, AgentKind, AgentSnapshot, Batch};

// Training
pub use runners::{EvalResult, LoopState, TrainReport, TrainSchedule, Trainer};
pub use experiment::{ExperimentRunner, ExperimentSummary};

// Metrics and checkpoints
pub use metrics::{MetricsLogger, MetricsWindow};
pub use checkpoint::{Checkpoint, Checkpointer, CheckpointerConfig};
