//! Per-block classification results.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The result of classifying one block against the ledger.
///
/// Exactly one outcome is produced per processed block and it depends only on
/// the block and the ledger state at the start of the write transaction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessOutcome {
    /// Newly accepted.
    Progress,
    /// Already in the ledger.
    Old,
    BadSignature,
    /// A legacy send that increases the balance.
    NegativeSpend,
    /// Another block already occupies this position in the chain.
    Fork,
    /// The source is known but has no receivable entry for this account.
    Unreceivable,
    /// `previous` is not in the ledger yet.
    GapPrevious,
    /// The send being received is not in the ledger yet.
    GapSource,
    BalanceMismatch,
    RepresentativeMismatch,
    /// Format or epoch not allowed at this point of the chain.
    BlockPosition,
    InsufficientWork,
    OpenedBurnAccount,
}

impl ProcessOutcome {
    pub const ALL: [ProcessOutcome; 13] = [
        Self::Progress,
        Self::Old,
        Self::BadSignature,
        Self::NegativeSpend,
        Self::Fork,
        Self::Unreceivable,
        Self::GapPrevious,
        Self::GapSource,
        Self::BalanceMismatch,
        Self::RepresentativeMismatch,
        Self::BlockPosition,
        Self::InsufficientWork,
        Self::OpenedBurnAccount,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Progress => "progress",
            Self::Old => "old",
            Self::BadSignature => "bad_signature",
            Self::NegativeSpend => "negative_spend",
            Self::Fork => "fork",
            Self::Unreceivable => "unreceivable",
            Self::GapPrevious => "gap_previous",
            Self::GapSource => "gap_source",
            Self::BalanceMismatch => "balance_mismatch",
            Self::RepresentativeMismatch => "representative_mismatch",
            Self::BlockPosition => "block_position",
            Self::InsufficientWork => "insufficient_work",
            Self::OpenedBurnAccount => "opened_burn_account",
        }
    }

    /// A missing dependency: the block should wait in the unchecked set.
    pub fn is_gap(&self) -> bool {
        matches!(self, Self::GapPrevious | Self::GapSource)
    }
}

impl fmt::Display for ProcessOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the caller already knows about a block's signature.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SignatureVerification {
    /// Not checked yet; the classifier verifies it inline.
    #[default]
    Unknown,
    Valid,
    Invalid,
}
