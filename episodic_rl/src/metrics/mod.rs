//! Episode metrics and training loggers.
//!
//! ## Metrics
//!
//! - [`MetricsWindow`]: Rolling windows of reward, length and loss plus totals
//!
//! ## Loggers
//!
//! - [`ConsoleLogger`]: Interval-based console table
//! - [`CsvLogger`]: CSV file logging for analysis
//! - [`MultiLogger`]: Combine multiple loggers

pub mod logger;
pub mod metrics_window;

pub use logger::{ConsoleLogger, CsvLogger, MetricsLogger, MultiLogger, NullLogger, TrainingSnapshot};
pub use metrics_window::{
    EpisodeStats, MetricsSnapshot, MetricsWindow, TrainingStats, WindowStats, DEFAULT_WINDOW_SIZE,
};
