//! Temporal transforms: frame stacking and time limits.

use std::collections::VecDeque;

use crate::core::Action;
use crate::environment::{Environment, Info, Space, StepOutcome};
use crate::error::Result;

/// Stack the last `K` observations into one observation.
///
/// The output is the flattened `[K, *inner_shape]` array, oldest frame first.
/// `reset` fills every slot with the first observation rather than zeros.
pub struct FrameStack {
    inner: Box<dyn Environment>,
    num_frames: usize,
    frames: VecDeque<Vec<f32>>,
}

impl FrameStack {
    pub fn new(inner: Box<dyn Environment>, num_frames: usize) -> Self {
        let num_frames = num_frames.max(1);
        Self {
            inner,
            num_frames,
            frames: VecDeque::with_capacity(num_frames),
        }
    }

    pub fn num_frames(&self) -> usize {
        self.num_frames
    }

    /// Frames currently held, oldest first.
    pub fn frames(&self) -> impl Iterator<Item = &Vec<f32>> {
        self.frames.iter()
    }

    fn prime(&mut self, obs: &[f32]) {
        self.frames.clear();
        for _ in 0..self.num_frames {
            self.frames.push_back(obs.to_vec());
        }
    }

    fn push(&mut self, obs: &[f32]) {
        if self.frames.is_empty() {
            self.prime(obs);
            return;
        }
        if self.frames.len() == self.num_frames {
            self.frames.pop_front();
        }
        self.frames.push_back(obs.to_vec());
    }

    fn stacked(&self) -> Vec<f32> {
        self.frames.iter().flat_map(|f| f.iter().copied()).collect()
    }
}

impl Environment for FrameStack {
    fn name(&self) -> &str {
        "frame_stack"
    }

    fn reset(&mut self) -> Result<(Vec<f32>, Info)> {
        let (obs, info) = self.inner.reset()?;
        self.prime(&obs);
        Ok((self.stacked(), info))
    }

    fn step(&mut self, action: &Action) -> Result<StepOutcome> {
        let mut out = self.inner.step(action)?;
        self.push(&out.observation);
        out.observation = self.stacked();
        Ok(out)
    }

    fn observation_space(&self) -> Space {
        let inner = self.inner.observation_space();
        if self.num_frames == 1 {
            return inner;
        }
        match inner {
            Space::Box { shape, low, high } => {
                let mut stacked_shape = Vec::with_capacity(shape.len() + 1);
                stacked_shape.push(self.num_frames);
                stacked_shape.extend(shape);
                Space::Box {
                    shape: stacked_shape,
                    low: low.repeat(self.num_frames),
                    high: high.repeat(self.num_frames),
                }
            }
            Space::Discrete { .. } => Space::unbounded(vec![self.num_frames, 1]),
        }
    }

    fn action_space(&self) -> Space {
        self.inner.action_space()
    }

    fn inner(&self) -> Option<&dyn Environment> {
        Some(self.inner.as_ref())
    }

    fn inner_mut(&mut self) -> Option<&mut dyn Environment> {
        Some(self.inner.as_mut())
    }
}

/// Truncate episodes after `max_steps` steps.
pub struct TimeLimit {
    inner: Box<dyn Environment>,
    max_steps: usize,
    elapsed: usize,
}

impl TimeLimit {
    pub fn new(inner: Box<dyn Environment>, max_steps: usize) -> Self {
        Self {
            inner,
            max_steps: max_steps.max(1),
            elapsed: 0,
        }
    }

    pub fn elapsed(&self) -> usize {
        self.elapsed
    }
}

impl Environment for TimeLimit {
    fn name(&self) -> &str {
        "time_limit"
    }

    fn reset(&mut self) -> Result<(Vec<f32>, Info)> {
        self.elapsed = 0;
        self.inner.reset()
    }

    fn step(&mut self, action: &Action) -> Result<StepOutcome> {
        let mut out = self.inner.step(action)?;
        self.elapsed += 1;
        if self.elapsed >= self.max_steps && !out.terminated && !out.truncated {
            out.truncated = true;
            out.info
                .insert("TimeLimit.truncated".to_string(), serde_json::Value::Bool(true));
        }
        Ok(out)
    }

    fn observation_space(&self) -> Space {
        self.inner.observation_space()
    }

    fn action_space(&self) -> Space {
        self.inner.action_space()
    }

    fn inner(&self) -> Option<&dyn Environment> {
        Some(self.inner.as_ref())
    }

    fn inner_mut(&mut self) -> Option<&mut dyn Environment> {
        Some(self.inner.as_mut())
    }
}
