//! Checkpointing for resumable training.
//!
//! ## Features
//!
//! - Periodic checkpoints named `checkpoint_{episode:08}.ckpt`
//! - Atomic writes (temp file + rename) for checkpoint and sidecar
//! - Optional JSON metadata sidecar (`<path>.meta`)
//! - Cleanup of old checkpoints (`keep_last_n`)
//!
//! ## Example
//!
//! ```rust,ignore
//! use episodic_rl::checkpoint::{Checkpointer, CheckpointerConfig};
//!
//! let checkpointer = Checkpointer::new(CheckpointerConfig::new("./checkpoints").with_keep_last_n(5))?;
//! let path = checkpointer.save(&checkpoint, Some(metadata))?;
//! let latest = checkpointer.find_latest_checkpoint()?;
//! ```

pub mod checkpointer;

pub use checkpointer::{
    atomic_write, meta_path, Checkpoint, CheckpointInfo, CheckpointMeta, Checkpointer,
    CheckpointerConfig, Metadata, TrainingState, CHECKPOINT_VERSION,
};
