//! Target network synchronisation for value-based agents.
//!
//! The bootstrap target `r + γ max_a Q_target(s', a)` is computed from a
//! frozen copy of the online network that is refreshed every
//! `sync_every` updates (hard copy).

use burn::module::Module;
use burn::tensor::backend::Backend;
use serde::{Deserialize, Serialize};

/// Perform a hard copy of model weights.
///
/// Tensors are immutable in burn, so the clone keeps the current weights even
/// after the optimizer produces a new online module.
pub fn hard_copy<B, M>(online: &M) -> M
where
    B: Backend,
    M: Module<B> + Clone,
{
    online.clone()
}

/// Counts updates and decides when the target copy is refreshed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetSync {
    sync_every: usize,
    updates: usize,
}

impl TargetSync {
    /// `sync_every` of 0 is treated as 1 (sync after every update).
    pub fn new(sync_every: usize) -> Self {
        Self {
            sync_every: sync_every.max(1),
            updates: 0,
        }
    }

    /// Register one optimizer update; returns `true` when the target should
    /// be refreshed.
    pub fn step(&mut self) -> bool {
        self.updates += 1;
        self.updates % self.sync_every == 0
    }

    /// Register one update and refresh `target` from `online` if due.
    /// Returns whether a copy happened.
    pub fn maybe_sync<B, M>(&mut self, online: &M, target: &mut M) -> bool
    where
        B: Backend,
        M: Module<B> + Clone,
    {
        let due = self.step();
        if due {
            *target = hard_copy::<B, M>(online);
        }
        due
    }

    pub fn updates(&self) -> usize {
        self.updates
    }

    pub fn sync_every(&self) -> usize {
        self.sync_every
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sync_cadence() {
        let mut sync = TargetSync::new(3);
        let due: Vec<bool> = (0..7).map(|_| sync.step()).collect();
        assert_eq!(due, vec![false, false, true, false, false, true, false]);
        assert_eq!(sync.updates(), 7);
    }

    #[test]
    fn test_maybe_sync_copies_weights_when_due() {
        use burn::backend::NdArray;
        use burn::nn::{Linear, LinearConfig};

        type B = NdArray<f32>;
        let device = Default::default();
        let weights = |layer: &Linear<B>| layer.weight.val().into_data().to_vec::<f32>().unwrap();
        let online: Linear<B> = LinearConfig::new(3, 2).init(&device);
        let mut target: Linear<B> = LinearConfig::new(3, 2).init(&device);
        let mut sync = TargetSync::new(2);

        assert!(!sync.maybe_sync::<B, _>(&online, &mut target));
        assert_ne!(weights(&target), weights(&online));
        assert!(sync.maybe_sync::<B, _>(&online, &mut target));
        assert_eq!(weights(&target), weights(&online));
    }

    #[test]
    fn test_zero_interval_syncs_every_update() {
        let mut sync = TargetSync::new(0);
        assert_eq!(sync.sync_every(), 1);
        assert!(sync.step());
        assert!(sync.step());
    }
}
