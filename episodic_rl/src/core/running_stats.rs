//! Running statistics using an exponential moving average.
//!
//! Provides the mean/variance estimator that backs observation and reward
//! normalization in the transform chain.
//!
//! # Update rule
//!
//! ```text
//! mean' = m * mean + (1 - m) * x
//! var'  = m * var  + (1 - m) * (x - mean)^2     // against the pre-update mean
//! ```
//!
//! This is a single-pass EMA, not Welford's algorithm: the variance is biased
//! and callers must not treat it as an unbiased estimate.
//!
//! # Freezing
//!
//! A frozen statistic ignores `update` calls but still normalizes, which is how
//! evaluation runs read the training statistics without disturbing them.
//!
//! # Example
//! ```ignore
//! use episodic_rl::core::RunningStatistic;
//!
//! let mut stats = RunningStatistic::new(4);
//! stats.update(&[1.0, 2.0, 3.0, 4.0])?;
//!
//! stats.freeze();
//! let normalized = stats.normalize(&[1.5, 2.5, 3.5, 4.5])?;
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{Result, RlError};

/// Default EMA momentum.
pub const DEFAULT_MOMENTUM: f64 = 0.99;
/// Default epsilon added to the standard deviation.
pub const DEFAULT_EPSILON: f64 = 1e-8;

/// Exponentially weighted per-dimension mean and variance.
///
/// Starts at mean 0 and variance 1 so that an untouched statistic is the
/// identity transform up to `epsilon`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunningStatistic {
    mean: Vec<f64>,
    variance: Vec<f64>,
    epsilon: f64,
    momentum: f64,
    frozen: bool,
    /// Accepted (non-frozen) updates since creation or reset
    count: u64,
}

impl RunningStatistic {
    /// Create a statistic tracking `dim` dimensions with default momentum and epsilon.
    pub fn new(dim: usize) -> Self {
        Self::with_config(dim, DEFAULT_MOMENTUM, DEFAULT_EPSILON)
    }

    /// Create a one-dimensional statistic (used for rewards).
    pub fn scalar() -> Self {
        Self::new(1)
    }

    /// Create with explicit momentum and epsilon.
    ///
    /// # Arguments
    /// * `dim` - Number of dimensions to track
    /// * `momentum` - EMA weight on the previous estimate, in (0, 1)
    /// * `epsilon` - Added to the standard deviation before dividing
    pub fn with_config(dim: usize, momentum: f64, epsilon: f64) -> Self {
        Self {
            mean: vec![0.0; dim],
            variance: vec![1.0; dim],
            epsilon,
            momentum,
            frozen: false,
            count: 0,
        }
    }

    /// Fold a sample into the running estimate.
    ///
    /// Has no effect while frozen. Fails with `ShapeMismatch` if the sample
    /// length differs from the tracked dimensionality.
    pub fn update(&mut self, sample: &[f32]) -> Result<()> {
        self.check_len(sample.len())?;
        if self.frozen {
            return Ok(());
        }

        let m = self.momentum;
        for (i, &x) in sample.iter().enumerate() {
            let x = x as f64;
            let old_mean = self.mean[i];
            let delta = x - old_mean;
            self.mean[i] = m * old_mean + (1.0 - m) * x;
            self.variance[i] = m * self.variance[i] + (1.0 - m) * delta * delta;
        }
        self.count += 1;
        Ok(())
    }

    /// Scalar form of [`update`](Self::update).
    pub fn update_scalar(&mut self, x: f32) -> Result<()> {
        self.update(&[x])
    }

    /// Normalize a sample: `(x - mean) / (sqrt(var) + epsilon)`.
    ///
    /// Pure, and applied regardless of the frozen flag.
    pub fn normalize(&self, sample: &[f32]) -> Result<Vec<f32>> {
        self.check_len(sample.len())?;
        Ok(sample
            .iter()
            .enumerate()
            .map(|(i, &x)| ((x as f64 - self.mean[i]) / self.denominator(i)) as f32)
            .collect())
    }

    /// Scalar form of [`normalize`](Self::normalize).
    pub fn normalize_scalar(&self, x: f32) -> Result<f32> {
        self.check_len(1)?;
        Ok(((x as f64 - self.mean[0]) / self.denominator(0)) as f32)
    }

    /// Stop accepting updates.
    pub fn freeze(&mut self) {
        self.frozen = true;
    }

    /// Resume accepting updates.
    pub fn unfreeze(&mut self) {
        self.frozen = false;
    }

    /// Set the frozen flag from a training-mode flag (`training == !frozen`).
    pub fn set_training(&mut self, training: bool) {
        self.frozen = !training;
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    /// Restore the initial mean 0 / variance 1 state. The frozen flag is kept.
    pub fn reset(&mut self) {
        self.mean.fill(0.0);
        self.variance.fill(1.0);
        self.count = 0;
    }

    /// Replace the estimate with another statistic's values.
    ///
    /// Keeps this statistic's frozen flag so that restoring during evaluation
    /// does not silently re-enable updates.
    pub fn restore_from(&mut self, other: &RunningStatistic) -> Result<()> {
        self.check_len(other.dim())?;
        self.mean.copy_from_slice(&other.mean);
        self.variance.copy_from_slice(&other.variance);
        self.epsilon = other.epsilon;
        self.momentum = other.momentum;
        self.count = other.count;
        Ok(())
    }

    pub fn mean(&self) -> &[f64] {
        &self.mean
    }

    pub fn variance(&self) -> &[f64] {
        &self.variance
    }

    /// Standard deviation per dimension (without epsilon).
    pub fn std(&self) -> Vec<f64> {
        self.variance.iter().map(|v| v.sqrt()).collect()
    }

    pub fn momentum(&self) -> f64 {
        self.momentum
    }

    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }

    /// Number of accepted updates.
    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn dim(&self) -> usize {
        self.mean.len()
    }

    #[inline]
    fn denominator(&self, i: usize) -> f64 {
        // variance stays >= 0 under the update rule; max guards float noise
        self.variance[i].max(0.0).sqrt() + self.epsilon
    }

    #[inline]
    fn check_len(&self, actual: usize) -> Result<()> {
        if actual != self.mean.len() {
            return Err(RlError::ShapeMismatch {
                expected: self.mean.len(),
                actual,
            });
        }
        Ok(())
    }
}
