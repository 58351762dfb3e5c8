//! Checkpoint persistence.
//!
//! A checkpoint is a bincode-encoded [`Checkpoint`] plus an optional JSON
//! sidecar (`<path>.meta`) holding [`CheckpointMeta`]. Both files are written
//! atomically, so an interrupted save never leaves a truncated checkpoint.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::agents::{AgentKind, AgentSnapshot};
use crate::error::{Result, RlError};
use crate::metrics::MetricsSnapshot;
use crate::transforms::TransformStats;

/// Format version written into every checkpoint.
pub const CHECKPOINT_VERSION: u32 = 1;

const PREFIX: &str = "checkpoint_";
const EXTENSION: &str = "ckpt";

/// User-supplied metadata stored in the sidecar.
pub type Metadata = BTreeMap<String, serde_json::Value>;

/// Loop state needed to resume training.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainingState {
    /// Episodes completed when the checkpoint was taken.
    pub episode_index: u64,
    pub metrics_snapshot: MetricsSnapshot,
    pub transform_stats: TransformStats,
}

/// Primary checkpoint artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub version: u32,
    pub agent: AgentSnapshot,
    /// Resolved experiment configuration (YAML).
    pub config: String,
    pub training_state: TrainingState,
}

impl Checkpoint {
    pub fn new(agent: AgentSnapshot, config: String, training_state: TrainingState) -> Self {
        Self {
            version: CHECKPOINT_VERSION,
            agent,
            config,
            training_state,
        }
    }

    pub fn episode_index(&self) -> u64 {
        self.training_state.episode_index
    }

    /// Encode and write atomically, with a sidecar when `metadata` is given.
    pub fn save(&self, path: &Path, metadata: Option<Metadata>) -> Result<()> {
        let bytes = bincode::serde::encode_to_vec(self, bincode::config::standard())?;
        atomic_write(path, &bytes)?;

        if let Some(metadata) = metadata {
            let meta = CheckpointMeta {
                version: self.version,
                episode_index: self.training_state.episode_index,
                agent_kind: self.agent.kind,
                created_unix_secs: SystemTime::now()
                    .duration_since(UNIX_EPOCH)
                    .map(|d| d.as_secs())
                    .unwrap_or(0),
                metadata,
            };
            atomic_write(&meta_path(path), serde_json::to_string_pretty(&meta)?.as_bytes())?;
        }
        log::debug!("wrote checkpoint {} ({} bytes)", path.display(), bytes.len());
        Ok(())
    }

    /// Read a checkpoint; the sidecar is not needed.
    pub fn load(path: &Path) -> Result<Self> {
        let bytes = fs::read(path)?;
        let (checkpoint, _): (Self, usize) =
            bincode::serde::decode_from_slice(&bytes, bincode::config::standard())?;
        if checkpoint.version != CHECKPOINT_VERSION {
            return Err(RlError::CheckpointIncompatible(format!(
                "{} has format version {}, expected {}",
                path.display(),
                checkpoint.version,
                CHECKPOINT_VERSION
            )));
        }
        Ok(checkpoint)
    }
}

/// JSON sidecar contents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointMeta {
    pub version: u32,
    pub episode_index: u64,
    pub agent_kind: AgentKind,
    pub created_unix_secs: u64,
    pub metadata: Metadata,
}

impl CheckpointMeta {
    /// Read the sidecar of `checkpoint_path`, if present.
    pub fn load(checkpoint_path: &Path) -> Result<Option<Self>> {
        let path = meta_path(checkpoint_path);
        if !path.exists() {
            return Ok(None);
        }
        let text = fs::read_to_string(path)?;
        Ok(Some(serde_json::from_str(&text)?))
    }
}

/// Sidecar path for a checkpoint: `<path>.meta`.
pub fn meta_path(checkpoint_path: &Path) -> PathBuf {
    let mut name = checkpoint_path.as_os_str().to_owned();
    name.push(".meta");
    PathBuf::from(name)
}

/// Write data to a file atomically (write to temp, then rename).
///
/// The temp file lives in the destination directory so the rename stays on
/// one filesystem.
pub fn atomic_write(path: &Path, data: &[u8]) -> Result<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&parent)?;

    let temp_name = format!(
        ".tmp_{}_{}",
        std::process::id(),
        path.file_name()
            .map(|s| s.to_string_lossy())
            .unwrap_or_default()
    );
    let temp_path = parent.join(temp_name);

    let mut file = File::create(&temp_path)?;
    file.write_all(data)?;
    file.sync_all()?;
    drop(file);

    if let Err(e) = fs::rename(&temp_path, path) {
        let _ = fs::remove_file(&temp_path);
        return Err(e.into());
    }
    Ok(())
}

/// Configuration for the checkpointer.
#[derive(Debug, Clone)]
pub struct CheckpointerConfig {
    /// Directory to store checkpoints.
    pub checkpoint_dir: PathBuf,
    /// Number of recent checkpoints to keep (0 = keep all).
    pub keep_last_n: usize,
}

impl Default for CheckpointerConfig {
    fn default() -> Self {
        Self {
            checkpoint_dir: PathBuf::from("./checkpoints"),
            keep_last_n: 0,
        }
    }
}

impl CheckpointerConfig {
    pub fn new(checkpoint_dir: impl Into<PathBuf>) -> Self {
        Self {
            checkpoint_dir: checkpoint_dir.into(),
            ..Default::default()
        }
    }

    pub fn with_keep_last_n(mut self, n: usize) -> Self {
        self.keep_last_n = n;
        self
    }
}

/// A checkpoint found on disk.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckpointInfo {
    pub path: PathBuf,
    pub episode: u64,
}

/// Periodic checkpoint writer for a training run.
///
/// Names files `checkpoint_{episode:08}.ckpt` inside `checkpoint_dir` and
/// prunes all but the newest `keep_last_n`.
pub struct Checkpointer {
    config: CheckpointerConfig,
}

impl Checkpointer {
    /// Create a checkpointer; the directory is created if missing.
    pub fn new(config: CheckpointerConfig) -> Result<Self> {
        fs::create_dir_all(&config.checkpoint_dir)?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &CheckpointerConfig {
        &self.config
    }

    /// Whether episode `episode` (1-based) is due for a checkpoint.
    pub fn should_save(
        episode: u64,
        checkpoint_every: Option<usize>,
        is_final: bool,
        on_final: bool,
    ) -> bool {
        let periodic = matches!(checkpoint_every, Some(every) if every > 0 && episode % every as u64 == 0);
        periodic || (is_final && on_final)
    }

    pub fn checkpoint_path(&self, episode: u64) -> PathBuf {
        self.config
            .checkpoint_dir
            .join(format!("{}{:08}.{}", PREFIX, episode, EXTENSION))
    }

    /// Save `checkpoint` under its episode index and prune old files.
    pub fn save(&self, checkpoint: &Checkpoint, metadata: Option<Metadata>) -> Result<PathBuf> {
        let path = self.checkpoint_path(checkpoint.episode_index());
        checkpoint.save(&path, metadata)?;
        self.cleanup_old_checkpoints()?;
        Ok(path)
    }

    pub fn load(&self, path: &Path) -> Result<Checkpoint> {
        Checkpoint::load(path)
    }

    /// All checkpoints in the directory, oldest episode first.
    pub fn list_checkpoints(&self) -> Result<Vec<CheckpointInfo>> {
        let mut checkpoints: Vec<CheckpointInfo> = fs::read_dir(&self.config.checkpoint_dir)?
            .filter_map(|e| e.ok())
            .filter_map(|e| {
                let path = e.path();
                let episode = path
                    .file_name()?
                    .to_str()?
                    .strip_prefix(PREFIX)?
                    .strip_suffix(&format!(".{}", EXTENSION))?
                    .parse()
                    .ok()?;
                Some(CheckpointInfo { path, episode })
            })
            .collect();

        checkpoints.sort_by_key(|c| c.episode);
        Ok(checkpoints)
    }

    pub fn find_latest_checkpoint(&self) -> Result<Option<CheckpointInfo>> {
        Ok(self.list_checkpoints()?.pop())
    }

    fn cleanup_old_checkpoints(&self) -> Result<()> {
        if self.config.keep_last_n == 0 {
            return Ok(());
        }

        let checkpoints = self.list_checkpoints()?;
        let excess = checkpoints.len().saturating_sub(self.config.keep_last_n);
        for old in &checkpoints[..excess] {
            log::debug!("removing old checkpoint {}", old.path.display());
            fs::remove_file(&old.path)?;
            let sidecar = meta_path(&old.path);
            if sidecar.exists() {
                fs::remove_file(sidecar)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn checkpoint(episode: u64) -> Checkpoint {
        let agent = AgentSnapshot {
            kind: AgentKind::Random,
            agent_state: vec![1, 2, 3],
            optimizer_state: Vec::new(),
        };
        let training_state = TrainingState {
            episode_index: episode,
            ..TrainingState::default()
        };
        Checkpoint::new(agent, "seed: 41\n".to_string(), training_state)
    }

    #[test]
    fn test_checkpoint_roundtrip_with_sidecar() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("run.ckpt");
        let mut metadata = Metadata::new();
        metadata.insert("note".to_string(), serde_json::json!("best so far"));

        checkpoint(7).save(&path, Some(metadata.clone())).unwrap();
        assert_eq!(Checkpoint::load(&path).unwrap(), checkpoint(7));

        let meta = CheckpointMeta::load(&path).unwrap().unwrap();
        assert_eq!(meta.episode_index, 7);
        assert_eq!(meta.agent_kind, AgentKind::Random);
        assert_eq!(meta.metadata, metadata);
    }

    #[test]
    fn test_load_without_sidecar() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("plain.ckpt");
        checkpoint(3).save(&path, None).unwrap();
        assert!(CheckpointMeta::load(&path).unwrap().is_none());
        assert_eq!(Checkpoint::load(&path).unwrap().episode_index(), 3);
    }

    #[test]
    fn test_version_mismatch_is_incompatible() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("old.ckpt");
        let mut old = checkpoint(1);
        old.version = CHECKPOINT_VERSION + 1;
        old.save(&path, None).unwrap();
        assert!(matches!(
            Checkpoint::load(&path),
            Err(RlError::CheckpointIncompatible(_))
        ));
    }

    #[test]
    fn test_atomic_write_leaves_no_temp_files() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data.bin");
        atomic_write(&path, b"first").unwrap();
        atomic_write(&path, b"second").unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"second");
        let entries: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn test_should_save() {
        assert!(!Checkpointer::should_save(5, None, false, false));
        assert!(Checkpointer::should_save(10, Some(5), false, false));
        assert!(!Checkpointer::should_save(7, Some(5), false, false));
        assert!(!Checkpointer::should_save(7, Some(5), true, false));
        assert!(Checkpointer::should_save(7, Some(5), true, true));
    }

    #[test]
    fn test_naming_list_and_latest() {
        let dir = tempdir().unwrap();
        let checkpointer = Checkpointer::new(CheckpointerConfig::new(dir.path())).unwrap();
        assert!(checkpointer.find_latest_checkpoint().unwrap().is_none());

        let path = checkpointer.save(&checkpoint(20), None).unwrap();
        assert_eq!(path.file_name().unwrap(), "checkpoint_00000020.ckpt");
        checkpointer.save(&checkpoint(5), Some(Metadata::new())).unwrap();

        let episodes: Vec<u64> = checkpointer
            .list_checkpoints()
            .unwrap()
            .iter()
            .map(|c| c.episode)
            .collect();
        assert_eq!(episodes, vec![5, 20]);
        assert_eq!(checkpointer.find_latest_checkpoint().unwrap().unwrap().episode, 20);
    }

    #[test]
    fn test_keep_last_n() {
        let dir = tempdir().unwrap();
        let config = CheckpointerConfig::new(dir.path()).with_keep_last_n(2);
        let checkpointer = Checkpointer::new(config).unwrap();
        for episode in [10, 20, 30] {
            checkpointer.save(&checkpoint(episode), Some(Metadata::new())).unwrap();
        }
        let kept: Vec<u64> = checkpointer
            .list_checkpoints()
            .unwrap()
            .iter()
            .map(|c| c.episode)
            .collect();
        assert_eq!(kept, vec![20, 30]);
        assert!(!meta_path(&checkpointer.checkpoint_path(10)).exists());
    }

    #[test]
    fn test_checkpoint_dir_creation() {
        let dir = tempdir().unwrap();
        let subdir = dir.path().join("nested/checkpoints");
        let _checkpointer = Checkpointer::new(CheckpointerConfig::new(&subdir)).unwrap();
        assert!(subdir.exists());
    }
}
