//! Block-kind-aware PoW thresholds.
//!
//! - Receive/Open blocks need HIGHER difficulty (they cost the sender nothing)
//! - Send and change blocks need BASE difficulty
//! - Epoch blocks require the highest difficulty

/// Simplified block kind for PoW threshold selection.
///
/// Avoids a dependency on `lattice-ledger`'s block type. Call sites map their
/// block variant to this enum.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WorkBlockKind {
    /// Send, change and legacy blocks.
    Base,
    /// Receive or Open.
    ReceiveOrOpen,
    /// Epoch upgrade.
    Epoch,
}

const LIVE_BASE: u64 = 0xffff_ffc0_0000_0000;
const DEV_BASE: u64 = 0xfe00_0000_0000_0000;
const RECEIVE_MULTIPLIER: f64 = 8.0;
const EPOCH_MULTIPLIER: f64 = 64.0;

/// Per-kind PoW thresholds.
///
/// The `multiply` helper scales difficulty by shrinking the "inverse gap"
/// (`u64::MAX - threshold`).
#[derive(Clone, Debug, PartialEq)]
pub struct WorkThresholds {
    pub base: u64,
    pub receive_multiplier: f64,
    pub epoch_multiplier: f64,
}

impl WorkThresholds {
    pub fn live() -> Self {
        Self::with_base(LIVE_BASE)
    }

    /// Low thresholds that a test can satisfy in milliseconds.
    pub fn dev() -> Self {
        Self::with_base(DEV_BASE)
    }

    /// Thresholds of zero accept any nonce.
    pub fn disabled() -> Self {
        Self::with_base(0)
    }

    pub fn with_base(base: u64) -> Self {
        Self {
            base,
            receive_multiplier: RECEIVE_MULTIPLIER,
            epoch_multiplier: EPOCH_MULTIPLIER,
        }
    }

    /// Get the required work threshold for a specific block kind.
    pub fn threshold_for(&self, kind: WorkBlockKind) -> u64 {
        match kind {
            WorkBlockKind::Base => self.base,
            WorkBlockKind::ReceiveOrOpen => multiply(self.base, self.receive_multiplier),
            WorkBlockKind::Epoch => multiply(self.base, self.epoch_multiplier),
        }
    }
}

/// When `base` is 0 (PoW disabled), all derived thresholds are also 0.
fn multiply(base: u64, multiplier: f64) -> u64 {
    if base == 0 {
        return 0;
    }
    let difficulty_inv = u64::MAX - base;
    let scaled_inv = (difficulty_inv as f64 / multiplier) as u64;
    u64::MAX - scaled_inv
}

impl Default for WorkThresholds {
    fn default() -> Self {
        Self::live()
    }
}
