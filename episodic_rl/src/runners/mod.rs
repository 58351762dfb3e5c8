//! Training loop and experience-collection strategies.
//!
//! - [`Trainer`]: episode loop with scheduled evaluation and checkpointing
//! - [`OffPolicyStrategy`]: replay buffer, updates every `train_frequency` steps
//! - [`OnPolicyStrategy`]: whole episodes, one update per `rollouts_per_update`
//!
//! Everything runs on the calling thread; an environment step, an action
//! selection and an agent update never overlap.

pub mod strategies;
pub mod trainer;


pub use strategies::{EpisodeOutcome, OffPolicyStrategy, OnPolicyStrategy, TrainingStrategy};
pub use trainer::{EvalResult, LoopState, TrainReport, TrainSchedule, Trainer};
