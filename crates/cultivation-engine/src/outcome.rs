//! Tagged results shared by every entry point.

use serde::{Deserialize, Serialize};

/// Why an action was refused. A declined action never mutates state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "code", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeclineReason {
    /// Qi is below the fraction of `max_qi` an attempt requires.
    InsufficientProgress { qi: u64, required: u64 },
    InsufficientCurrency { required: u64, available: u64 },
    AlreadyMaxRank,
    BuildingLocked { required_cave_level: u8 },
    AlreadyBuilt,
    InvalidPosition { position: u8, slots: u8 },
    PositionOccupied { position: u8 },
    /// Only a completed building can be upgraded.
    NotActive,
    MaxLevel { level: u32 },
    MaxCaveLevel,
    NothingToCleanse,
}

impl DeclineReason {
    /// Stable reason code for consumers that render their own text.
    pub fn code(&self) -> &'static str {
        match self {
            DeclineReason::InsufficientProgress { .. } => "INSUFFICIENT_PROGRESS",
            DeclineReason::InsufficientCurrency { .. } => "INSUFFICIENT_CURRENCY",
            DeclineReason::AlreadyMaxRank => "ALREADY_MAX_RANK",
            DeclineReason::BuildingLocked { .. } => "BUILDING_LOCKED",
            DeclineReason::AlreadyBuilt => "ALREADY_BUILT",
            DeclineReason::InvalidPosition { .. } => "INVALID_POSITION",
            DeclineReason::PositionOccupied { .. } => "POSITION_OCCUPIED",
            DeclineReason::NotActive => "NOT_ACTIVE",
            DeclineReason::MaxLevel { .. } => "MAX_LEVEL",
            DeclineReason::MaxCaveLevel => "MAX_CAVE_LEVEL",
            DeclineReason::NothingToCleanse => "NOTHING_TO_CLEANSE",
        }
    }
}

/// Either a decline with a reason code, or a resolved payload.
///
/// Probabilistic failures are `Resolved`; the payload carries the
/// success flag.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "payload", rename_all = "snake_case")]
pub enum Outcome<T> {
    Declined(DeclineReason),
    Resolved(T),
}

impl<T> Outcome<T> {
    pub fn is_declined(&self) -> bool {
        matches!(self, Outcome::Declined(_))
    }

    pub fn decline_reason(&self) -> Option<DeclineReason> {
        match self {
            Outcome::Declined(reason) => Some(*reason),
            Outcome::Resolved(_) => None,
        }
    }

    pub fn resolved(self) -> Option<T> {
        match self {
            Outcome::Resolved(value) => Some(value),
            Outcome::Declined(_) => None,
        }
    }

    pub fn as_resolved(&self) -> Option<&T> {
        match self {
            Outcome::Resolved(value) => Some(value),
            Outcome::Declined(_) => None,
        }
    }

    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> Outcome<U> {
        match self {
            Outcome::Resolved(value) => Outcome::Resolved(f(value)),
            Outcome::Declined(reason) => Outcome::Declined(reason),
        }
    }
}

/// Decline unless `available` covers `required`.
pub(crate) fn require_funds(required: u64, available: u64) -> Result<(), DeclineReason> {
    if available < required {
        return Err(DeclineReason::InsufficientCurrency {
            required,
            available,
        });
    }
    Ok(())
}
