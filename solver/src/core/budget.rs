//! Attempt budget for the optimal stage.

use anyhow::{Result, anyhow};

/// Bounded counter of generation attempts.
///
/// Invariant: `used <= max`. Once exhausted, [`AttemptBudget::consume`] fails
/// instead of wrapping or growing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttemptBudget {
    used: u32,
    max: u32,
}

impl AttemptBudget {
    pub fn new(max: u32) -> Self {
        Self { used: 0, max }
    }

    pub fn used(&self) -> u32 {
        self.used
    }

    pub fn is_exhausted(&self) -> bool {
        self.used >= self.max
    }

    /// Spend one attempt and return its 1-indexed number.
    pub fn consume(&mut self) -> Result<u32> {
        if self.is_exhausted() {
            return Err(anyhow!(
                "attempt budget exhausted ({}/{})",
                self.used,
                self.max
            ));
        }
        self.used += 1;
        Ok(self.used)
    }
}
