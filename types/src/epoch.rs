//! Account epoch (ledger version) markers.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The ledger version an account chain has been upgraded to.
///
/// Epochs only ever increase along a chain. Legacy block formats are only
/// valid while an account is still at [`Epoch::Epoch0`].
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[repr(u8)]
pub enum Epoch {
    #[default]
    Epoch0 = 0,
    Epoch1 = 1,
    Epoch2 = 2,
}

impl Epoch {
    pub const MAX: Self = Self::Epoch2;

    pub fn next(self) -> Option<Self> {
        match self {
            Self::Epoch0 => Some(Self::Epoch1),
            Self::Epoch1 => Some(Self::Epoch2),
            Self::Epoch2 => None,
        }
    }
}

impl fmt::Display for Epoch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "epoch_{}", *self as u8)
    }
}
