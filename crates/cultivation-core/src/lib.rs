#![deny(warnings)]

//! Core domain models and invariants for the cultivation engine.
//!
//! This crate defines the serializable types shared by the formulas, the
//! resolvers and the persistence boundary, plus validation helpers that guard
//! the invariants the engine assumes on every entry point.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use thiserror::Error;

/// Wall-clock timestamp in milliseconds since the Unix epoch.
pub type EpochMillis = i64;

/// Milliseconds in one minute.
pub const MILLIS_PER_MINUTE: i64 = 60_000;

/// Upper bound of the inner demon meter.
pub const MAX_INNER_DEMON: u8 = 100;

/// Highest cave level a player can reach.
pub const MAX_CAVE_LEVEL: u8 = 10;

/// Qi threshold of a freshly created character.
pub const STARTING_MAX_QI: u64 = 100;

/// Spirit stones granted at character creation.
pub const STARTING_SPIRIT_STONES: u64 = 100;

/// Ordinal cultivation tier. Ordering follows advancement order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Rank {
    QiRefining,
    FoundationEstablishment,
    CoreFormation,
    NascentSoul,
    SpiritSevering,
    VoidRefining,
    BodyIntegration,
    Mahayana,
    /// Terminal rank; nothing follows it.
    TribulationTranscendence,
}

impl Rank {
    /// All ranks in advancement order.
    pub const ALL: [Rank; 9] = [
        Rank::QiRefining,
        Rank::FoundationEstablishment,
        Rank::CoreFormation,
        Rank::NascentSoul,
        Rank::SpiritSevering,
        Rank::VoidRefining,
        Rank::BodyIntegration,
        Rank::Mahayana,
        Rank::TribulationTranscendence,
    ];

    /// 1-based level used by every rank-indexed formula.
    pub fn level(self) -> u32 {
        match self {
            Rank::QiRefining => 1,
            Rank::FoundationEstablishment => 2,
            Rank::CoreFormation => 3,
            Rank::NascentSoul => 4,
            Rank::SpiritSevering => 5,
            Rank::VoidRefining => 6,
            Rank::BodyIntegration => 7,
            Rank::Mahayana => 8,
            Rank::TribulationTranscendence => 9,
        }
    }

    /// Inverse of [`Rank::level`].
    pub fn from_level(level: u32) -> Option<Rank> {
        let idx = usize::try_from(level.checked_sub(1)?).ok()?;
        Rank::ALL.get(idx).copied()
    }

    /// The rank a successful breakthrough or tribulation leads to.
    pub fn next(self) -> Option<Rank> {
        Rank::from_level(self.level() + 1)
    }

    /// Whether no rank follows this one.
    pub fn is_terminal(self) -> bool {
        self.next().is_none()
    }
}

/// Spirit root quality, fixed at character creation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SpiritRootTier {
    Inferior,
    Ordinary,
    Superior,
    Heavenly,
}

impl SpiritRootTier {
    /// All tiers from worst to best.
    pub const ALL: [SpiritRootTier; 4] = [
        SpiritRootTier::Inferior,
        SpiritRootTier::Ordinary,
        SpiritRootTier::Superior,
        SpiritRootTier::Heavenly,
    ];
}

/// The subset of a player's record the engine reads and mutates.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerProgress {
    /// Current cultivation rank.
    pub rank: Rank,
    /// Progress toward the next rank (>= 0).
    pub qi: u64,
    /// Threshold for the next rank (> 0).
    pub max_qi: u64,
    /// Inner demon meter in [0, 100].
    pub inner_demon: u8,
    /// Primary currency.
    pub spirit_stones: u64,
    /// Cave level in [1, 10].
    pub cave_level: u8,
    /// Quality tier fixed for the account's lifetime.
    pub spirit_root: SpiritRootTier,
    /// Last instant accrual was applied (ms since epoch).
    pub last_settled_at: EpochMillis,
    /// Lifetime cultivation experience credited by tribulation rewards.
    #[serde(default)]
    pub experience: u64,
}

impl PlayerProgress {
    /// A fresh character created at `now`.
    pub fn new(spirit_root: SpiritRootTier, now: EpochMillis) -> Self {
        Self {
            rank: Rank::QiRefining,
            qi: 0,
            max_qi: STARTING_MAX_QI,
            inner_demon: 0,
            spirit_stones: STARTING_SPIRIT_STONES,
            cave_level: 1,
            spirit_root,
            last_settled_at: now,
            experience: 0,
        }
    }

    /// `qi / max_qi`, clamped to [0, 1].
    pub fn progress_ratio(&self) -> f64 {
        if self.max_qi == 0 {
            return 0.0;
        }
        (self.qi as f64 / self.max_qi as f64).clamp(0.0, 1.0)
    }
}

/// Kinds of effect a building contributes to its cave.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum EffectKind {
    /// Percent bonus applied to qi accrual.
    ProductionRate,
    Defense,
    StorageCapacity,
    /// Percent bonus to pill refining.
    AlchemySuccess,
    /// Percent bonus to artifact forging.
    ForgingSuccess,
    /// Percent bonus to technique comprehension.
    Comprehension,
}

/// Static definition of a building type.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BuildingSpec {
    /// Currency cost at level 1.
    pub base_currency: u64,
    /// Material cost at level 1.
    pub base_materials: u64,
    /// Construction time at level 1, in minutes.
    pub base_minutes: u64,
    /// Minimum cave level required to build.
    pub unlock_cave_level: u8,
    /// Highest reachable level.
    pub max_level: u32,
    /// Magnitude contributed per level, per effect kind.
    pub effects_per_level: &'static [(EffectKind, u32)],
}

/// The seven buildable structures of a cave.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum BuildingType {
    SpiritGatheringArray,
    MeditationChamber,
    SpiritStoneVault,
    ProtectiveFormation,
    AlchemyRoom,
    ArtifactForge,
    ScriptureLibrary,
}

impl BuildingType {
    /// All building types in catalog order.
    pub const ALL: [BuildingType; 7] = [
        BuildingType::SpiritGatheringArray,
        BuildingType::MeditationChamber,
        BuildingType::SpiritStoneVault,
        BuildingType::ProtectiveFormation,
        BuildingType::AlchemyRoom,
        BuildingType::ArtifactForge,
        BuildingType::ScriptureLibrary,
    ];

    /// Static cost, unlock and effect table for this type.
    pub fn spec(self) -> &'static BuildingSpec {
        match self {
            BuildingType::SpiritGatheringArray => &BuildingSpec {
                base_currency: 100,
                base_materials: 10,
                base_minutes: 5,
                unlock_cave_level: 1,
                max_level: 10,
                effects_per_level: &[(EffectKind::ProductionRate, 10)],
            },
            BuildingType::MeditationChamber => &BuildingSpec {
                base_currency: 120,
                base_materials: 15,
                base_minutes: 8,
                unlock_cave_level: 1,
                max_level: 10,
                effects_per_level: &[
                    (EffectKind::ProductionRate, 5),
                    (EffectKind::Comprehension, 2),
                ],
            },
            BuildingType::SpiritStoneVault => &BuildingSpec {
                base_currency: 80,
                base_materials: 25,
                base_minutes: 5,
                unlock_cave_level: 1,
                max_level: 10,
                effects_per_level: &[(EffectKind::StorageCapacity, 1000)],
            },
            BuildingType::ProtectiveFormation => &BuildingSpec {
                base_currency: 200,
                base_materials: 40,
                base_minutes: 15,
                unlock_cave_level: 2,
                max_level: 10,
                effects_per_level: &[(EffectKind::Defense, 50)],
            },
            BuildingType::AlchemyRoom => &BuildingSpec {
                base_currency: 300,
                base_materials: 60,
                base_minutes: 30,
                unlock_cave_level: 3,
                max_level: 8,
                effects_per_level: &[(EffectKind::AlchemySuccess, 3)],
            },
            BuildingType::ArtifactForge => &BuildingSpec {
                base_currency: 400,
                base_materials: 80,
                base_minutes: 45,
                unlock_cave_level: 4,
                max_level: 8,
                effects_per_level: &[(EffectKind::ForgingSuccess, 3)],
            },
            BuildingType::ScriptureLibrary => &BuildingSpec {
                base_currency: 500,
                base_materials: 100,
                base_minutes: 60,
                unlock_cave_level: 5,
                max_level: 5,
                effects_per_level: &[(EffectKind::Comprehension, 5)],
            },
        }
    }

    /// Level cap of this type.
    pub fn max_level(self) -> u32 {
        self.spec().max_level
    }
}

/// Lifecycle state of a building slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BuildingStatus {
    /// Cave level too low to build this type.
    Locked,
    /// Buildable, but no record exists yet.
    Available,
    Building,
    Upgrading,
    Active,
}

impl BuildingStatus {
    /// Statuses a persisted record may carry.
    pub fn is_persistable(self) -> bool {
        matches!(
            self,
            BuildingStatus::Building | BuildingStatus::Upgrading | BuildingStatus::Active
        )
    }
}

/// Opaque store-assigned identifier of a building record.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BuildingId(pub u64);

/// A structure in a player's cave.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Building {
    pub id: BuildingId,
    pub kind: BuildingType,
    /// Current level, or the target level while upgrading.
    pub level: u32,
    /// Cave slot index.
    pub position: u8,
    /// Status as last written; see [`Building::status_at`] for the live view.
    pub status: BuildingStatus,
    pub build_start_at: EpochMillis,
    pub build_end_at: EpochMillis,
}

impl Building {
    /// Whether the construction clock has run out at `now`.
    pub fn is_complete_at(&self, now: EpochMillis) -> bool {
        now >= self.build_end_at
    }

    /// Status derived from the wall clock rather than the stored field.
    pub fn status_at(&self, now: EpochMillis) -> BuildingStatus {
        match self.status {
            BuildingStatus::Building | BuildingStatus::Upgrading if self.is_complete_at(now) => {
                BuildingStatus::Active
            }
            other => other,
        }
    }

    /// Copy of this record with its stored status brought up to date.
    pub fn reconciled(&self, now: EpochMillis) -> Building {
        Building {
            status: self.status_at(now),
            ..self.clone()
        }
    }
}

/// Number of building slots available at a cave level.
pub fn cave_slots(cave_level: u8) -> u8 {
    2u8.saturating_add(cave_level.saturating_mul(2))
}

/// Validation errors for domain invariants.
#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    /// Qi threshold must be strictly positive.
    #[error("max_qi must be > 0")]
    ZeroMaxQi,
    /// Inner demon must be within [0, 100].
    #[error("inner demon {0} exceeds 100")]
    InnerDemonOutOfRange(u8),
    /// Cave level must be within [1, 10].
    #[error("cave level {0} is out of supported range [1, 10]")]
    CaveLevelOutOfRange(u8),
    /// Building level must be within [1, cap].
    #[error("level {level} is invalid for {kind:?} (cap {cap})")]
    BuildingLevelOutOfRange {
        kind: BuildingType,
        level: u32,
        cap: u32,
    },
    /// Completion must not precede the start.
    #[error("build ends at {end} before it starts at {start}")]
    InvertedBuildWindow { start: EpochMillis, end: EpochMillis },
    /// Only in-progress or active records may be stored.
    #[error("status {0:?} cannot be persisted on a building record")]
    TransientStatus(BuildingStatus),
    /// Two records for the same type in one cave.
    #[error("duplicate building type {0:?}")]
    DuplicateBuilding(BuildingType),
    /// Two records in the same slot.
    #[error("cave slot {0} is occupied twice")]
    DuplicatePosition(u8),
}

/// Validate a player record.
pub fn validate_player(p: &PlayerProgress) -> Result<(), ValidationError> {
    if p.max_qi == 0 {
        return Err(ValidationError::ZeroMaxQi);
    }
    if p.inner_demon > MAX_INNER_DEMON {
        return Err(ValidationError::InnerDemonOutOfRange(p.inner_demon));
    }
    if !(1..=MAX_CAVE_LEVEL).contains(&p.cave_level) {
        return Err(ValidationError::CaveLevelOutOfRange(p.cave_level));
    }
    Ok(())
}

/// Validate a single building record.
pub fn validate_building(b: &Building) -> Result<(), ValidationError> {
    let cap = b.kind.max_level();
    if b.level == 0 || b.level > cap {
        return Err(ValidationError::BuildingLevelOutOfRange {
            kind: b.kind,
            level: b.level,
            cap,
        });
    }
    if b.build_end_at < b.build_start_at {
        return Err(ValidationError::InvertedBuildWindow {
            start: b.build_start_at,
            end: b.build_end_at,
        });
    }
    if !b.status.is_persistable() {
        return Err(ValidationError::TransientStatus(b.status));
    }
    Ok(())
}

/// Validate a whole cave: every record plus cross-record uniqueness.
pub fn validate_cave(buildings: &[Building]) -> Result<(), ValidationError> {
    let mut kinds = BTreeSet::new();
    let mut positions = BTreeSet::new();
    for b in buildings {
        validate_building(b)?;
        if !kinds.insert(b.kind) {
            return Err(ValidationError::DuplicateBuilding(b.kind));
        }
        if !positions.insert(b.position) {
            return Err(ValidationError::DuplicatePosition(b.position));
        }
    }
    Ok(())
}
