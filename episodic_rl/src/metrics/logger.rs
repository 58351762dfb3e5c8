//! Training loggers.
//!
//! Provides different output backends for per-episode training metrics.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::time::Instant;

/// Per-episode training snapshot for logging.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingSnapshot {
    /// Episode index (1-based, including resumed episodes).
    pub episode: usize,
    /// Total environment steps.
    pub env_steps: u64,
    /// Reward of this episode.
    pub reward: f32,
    /// Windowed mean reward.
    pub avg_reward: f32,
    /// Length of this episode.
    pub length: usize,
    /// Mean update loss of this episode (if any update ran).
    pub loss: Option<f32>,
    /// Mean reward of the latest evaluation (if one just ran).
    pub eval_reward: Option<f32>,
}

impl TrainingSnapshot {
    pub fn new(episode: usize, env_steps: u64, reward: f32, length: usize) -> Self {
        Self {
            episode,
            env_steps,
            reward,
            avg_reward: reward,
            length,
            loss: None,
            eval_reward: None,
        }
    }

    pub fn with_avg_reward(mut self, avg_reward: f32) -> Self {
        self.avg_reward = avg_reward;
        self
    }

    pub fn with_loss(mut self, loss: Option<f32>) -> Self {
        self.loss = loss;
        self
    }

    pub fn with_eval_reward(mut self, eval_reward: f32) -> Self {
        self.eval_reward = Some(eval_reward);
        self
    }
}

/// Logger trait for different logging backends.
pub trait MetricsLogger {
    /// Log a training snapshot.
    fn log(&mut self, snapshot: &TrainingSnapshot);

    /// Flush any buffered output.
    fn flush(&mut self);
}

fn fmt_opt(value: Option<f32>, precision: usize) -> String {
    value
        .map(|v| format!("{:.*}", precision, v))
        .unwrap_or_else(|| "-".to_string())
}

/// Console table logger.
pub struct ConsoleLogger {
    log_interval: usize,
    last_logged: Option<usize>,
    start_time: Instant,
    show_header: bool,
}

impl ConsoleLogger {
    /// Create a console logger printing every `log_interval` episodes.
    ///
    /// Episodes carrying an evaluation result are always printed.
    pub fn new(log_interval: usize) -> Self {
        Self {
            log_interval: log_interval.max(1),
            last_logged: None,
            start_time: Instant::now(),
            show_header: true,
        }
    }

    pub fn reset_timer(&mut self) {
        self.start_time = Instant::now();
    }

    fn should_log(&self, snapshot: &TrainingSnapshot) -> bool {
        if snapshot.eval_reward.is_some() {
            return true;
        }
        match self.last_logged {
            None => true,
            Some(last) => snapshot.episode >= last + self.log_interval,
        }
    }

    fn print_header(&self) {
        println!(
            "{:>8} {:>10} {:>10} {:>10} {:>8} {:>10} {:>10} {:>8}",
            "Episode", "EnvSteps", "Reward", "AvgReward", "Length", "Loss", "Eval", "SPS"
        );
        println!("{}", "-".repeat(82));
    }
}

impl MetricsLogger for ConsoleLogger {
    fn log(&mut self, snapshot: &TrainingSnapshot) {
        if !self.should_log(snapshot) {
            return;
        }

        if self.show_header {
            self.print_header();
            self.show_header = false;
        }

        let elapsed = self.start_time.elapsed().as_secs_f32();
        let sps = if elapsed > 0.0 {
            snapshot.env_steps as f32 / elapsed
        } else {
            0.0
        };

        println!(
            "{:>8} {:>10} {:>10.2} {:>10.2} {:>8} {:>10} {:>10} {:>8.0}",
            snapshot.episode,
            snapshot.env_steps,
            snapshot.reward,
            snapshot.avg_reward,
            snapshot.length,
            fmt_opt(snapshot.loss, 4),
            fmt_opt(snapshot.eval_reward, 2),
            sps
        );

        self.last_logged = Some(snapshot.episode);
    }

    fn flush(&mut self) {
        // stdout is line-buffered
    }
}

/// CSV file logger for analysis.
pub struct CsvLogger {
    writer: BufWriter<File>,
    start_time: Instant,
}

impl CsvLogger {
    pub fn new(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);

        writeln!(
            writer,
            "episode,env_steps,reward,avg_reward,length,loss,eval_reward,elapsed_secs"
        )?;

        Ok(Self {
            writer,
            start_time: Instant::now(),
        })
    }
}

impl MetricsLogger for CsvLogger {
    fn log(&mut self, snapshot: &TrainingSnapshot) {
        let elapsed = self.start_time.elapsed().as_secs_f32();
        let opt = |v: Option<f32>| v.map(|x| x.to_string()).unwrap_or_default();

        if let Err(e) = writeln!(
            self.writer,
            "{},{},{:.4},{:.4},{},{},{},{:.2}",
            snapshot.episode,
            snapshot.env_steps,
            snapshot.reward,
            snapshot.avg_reward,
            snapshot.length,
            opt(snapshot.loss),
            opt(snapshot.eval_reward),
            elapsed
        ) {
            log::warn!("csv logger write failed: {}", e);
        }
    }

    fn flush(&mut self) {
        if let Err(e) = self.writer.flush() {
            log::warn!("csv logger flush failed: {}", e);
        }
    }
}

impl Drop for CsvLogger {
    fn drop(&mut self) {
        self.flush();
    }
}

/// Logger that discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullLogger;

impl MetricsLogger for NullLogger {
    fn log(&mut self, _snapshot: &TrainingSnapshot) {}

    fn flush(&mut self) {}
}

/// Multi-logger that writes to multiple backends.
#[derive(Default)]
pub struct MultiLogger {
    loggers: Vec<Box<dyn MetricsLogger>>,
}

impl MultiLogger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add<L: MetricsLogger + 'static>(mut self, logger: L) -> Self {
        self.loggers.push(Box::new(logger));
        self
    }

    pub fn len(&self) -> usize {
        self.loggers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.loggers.is_empty()
    }
}

impl MetricsLogger for MultiLogger {
    fn log(&mut self, snapshot: &TrainingSnapshot) {
        for logger in &mut self.loggers {
            logger.log(snapshot);
        }
    }

    fn flush(&mut self) {
        for logger in &mut self.loggers {
            logger.flush();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_training_snapshot() {
        let snapshot = TrainingSnapshot::new(12, 1000, 150.0, 150)
            .with_avg_reward(120.0)
            .with_loss(Some(0.25));

        assert_eq!(snapshot.episode, 12);
        assert_eq!(snapshot.env_steps, 1000);
        assert!((snapshot.avg_reward - 120.0).abs() < 0.01);
        assert_eq!(snapshot.loss, Some(0.25));
        assert_eq!(snapshot.eval_reward, None);
    }

    #[test]
    fn test_console_logger_interval() {
        let mut logger = ConsoleLogger::new(10);
        let first = TrainingSnapshot::new(1, 20, 20.0, 20);
        assert!(logger.should_log(&first));
        logger.log(&first);

        let early = TrainingSnapshot::new(5, 100, 20.0, 20);
        assert!(!logger.should_log(&early));
        assert!(logger.should_log(&early.clone().with_eval_reward(30.0)));

        let due = TrainingSnapshot::new(11, 220, 20.0, 20);
        assert!(logger.should_log(&due));
    }

    #[test]
    fn test_csv_logger_writes_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("metrics.csv");
        {
            let mut logger = CsvLogger::new(&path).unwrap();
            logger.log(&TrainingSnapshot::new(1, 10, 10.0, 10).with_loss(Some(0.5)));
            logger.log(&TrainingSnapshot::new(2, 25, 15.0, 15));
        }
        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("episode,"));
        assert!(lines[1].starts_with("1,10,10.0000"));
        assert!(lines[2].contains(",,"));
    }

    #[test]
    fn test_multi_logger() {
        let mut multi = MultiLogger::new().add(ConsoleLogger::new(10)).add(NullLogger);
        assert_eq!(multi.len(), 2);
        multi.log(&TrainingSnapshot::new(10, 1000, 100.0, 100));
        multi.flush();
    }
}
