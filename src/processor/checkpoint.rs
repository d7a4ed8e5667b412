//! # Checkpoint Sampling Policy
//!
//! Decide quali passate committano stato visibile. Scrivere uno snapshot
//! dopo ogni singola passata è troppo costoso; la policy campiona:
//! - sempre per le prime passate (`pass < early`)
//! - una passata su due fino a `mid`
//! - ogni `stride` passate in seguito
//! - sempre sull'ultima passata, così lo stato finale è garantito

use serde::{Deserialize, Serialize};

/// Which 0-based pass indices commit visible state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointPolicy {
    pub early: u32,
    pub mid: u32,
    pub stride: u32,
}

impl Default for CheckpointPolicy {
    fn default() -> Self {
        Self {
            early: 5,
            mid: 20,
            stride: 10,
        }
    }
}

impl CheckpointPolicy {
    /// Commit everything; useful when every frame matters.
    pub fn every_pass() -> Self {
        Self {
            early: u32::MAX,
            mid: u32::MAX,
            stride: 1,
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.stride == 0 {
            return Err(anyhow::anyhow!("Checkpoint stride must be greater than 0"));
        }
        if self.early > self.mid {
            return Err(anyhow::anyhow!("Checkpoint early window must not exceed mid threshold"));
        }
        Ok(())
    }

    pub fn should_commit(&self, pass: u32, target_iterations: u32) -> bool {
        pass + 1 >= target_iterations
            || pass < self.early
            || (pass < self.mid && pass % 2 == 0)
            || pass % self.stride.max(1) == 0
    }
}
