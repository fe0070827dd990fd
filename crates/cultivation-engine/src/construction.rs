//! Cave construction: unlock gates, cost curves, wall-clock timers and the
//! pay-to-skip economy.
//!
//! Building status is never advanced by a timer. Every read reconciles the
//! stored record against the caller's `now`, and cave-wide stats are a fresh
//! fold over the reconciled records.

use cultivation_core::{
    cave_slots, Building, BuildingId, BuildingStatus, BuildingType, EffectKind, EpochMillis,
    PlayerProgress, MAX_CAVE_LEVEL, MILLIS_PER_MINUTE,
};
use cultivation_econ::{
    building_effects, cave_expansion_cost, construction_cost, production_multiplier,
    remaining_minutes, speed_up_charge, BuildCost, EconError,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::ConstructionConfig;
use crate::outcome::{require_funds, DeclineReason, Outcome};

/// Whether a cave at `cave_level` may build `kind`.
pub fn can_unlock(cave_level: u8, kind: BuildingType) -> bool {
    cave_level >= kind.spec().unlock_cave_level
}

/// Cost of bringing `kind` to `target_level`.
pub fn cost(kind: BuildingType, target_level: u32) -> Result<BuildCost, EconError> {
    construction_cost(kind, target_level)
}

pub fn is_complete(building: &Building, now: EpochMillis) -> bool {
    building.is_complete_at(now)
}

/// The record with its status brought in line with `now`.
pub fn reconcile(building: &Building, now: EpochMillis) -> Building {
    building.reconciled(now)
}

/// A build or upgrade that has been paid for and started.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstructionStarted {
    pub player: PlayerProgress,
    pub building: Building,
    pub cost: BuildCost,
}

fn finish_at(now: EpochMillis, minutes: u64) -> EpochMillis {
    let ms = i64::try_from(minutes)
        .unwrap_or(i64::MAX)
        .saturating_mul(MILLIS_PER_MINUTE);
    now.saturating_add(ms)
}

/// Starts a level-1 building in a free slot.
///
/// Declines, in order: type locked at this cave level, type already built,
/// slot out of range, slot occupied, insufficient currency. The returned
/// building carries id 0 until the store assigns one.
pub fn start_build(
    player: &PlayerProgress,
    existing: &[Building],
    kind: BuildingType,
    position: u8,
    now: EpochMillis,
) -> Outcome<ConstructionStarted> {
    match plan_build(player, existing, kind, position) {
        Ok(cost) => {
            let mut updated = player.clone();
            updated.spirit_stones -= cost.currency;
            let building = Building {
                id: BuildingId::default(),
                kind,
                level: 1,
                position,
                status: BuildingStatus::Building,
                build_start_at: now,
                build_end_at: finish_at(now, cost.minutes),
            };
            info!(?kind, position, currency = cost.currency, minutes = cost.minutes, "construction started");
            Outcome::Resolved(ConstructionStarted {
                player: updated,
                building,
                cost,
            })
        }
        Err(reason) => {
            debug!(code = reason.code(), ?kind, position, "construction declined");
            Outcome::Declined(reason)
        }
    }
}

fn plan_build(
    player: &PlayerProgress,
    existing: &[Building],
    kind: BuildingType,
    position: u8,
) -> Result<BuildCost, DeclineReason> {
    if !can_unlock(player.cave_level, kind) {
        return Err(DeclineReason::BuildingLocked {
            required_cave_level: kind.spec().unlock_cave_level,
        });
    }
    if existing.iter().any(|b| b.kind == kind) {
        return Err(DeclineReason::AlreadyBuilt);
    }
    let slots = cave_slots(player.cave_level);
    if position >= slots {
        return Err(DeclineReason::InvalidPosition { position, slots });
    }
    if existing.iter().any(|b| b.position == position) {
        return Err(DeclineReason::PositionOccupied { position });
    }
    let cost = construction_cost(kind, 1).map_err(|_| DeclineReason::MaxLevel { level: 0 })?;
    require_funds(cost.currency, player.spirit_stones)?;
    Ok(cost)
}

/// Starts upgrading a completed building to the next level.
///
/// The level is raised immediately and the building re-enters the
/// `Upgrading` state; it contributes no effects until the timer runs out.
pub fn start_upgrade(
    player: &PlayerProgress,
    building: &Building,
    now: EpochMillis,
) -> Outcome<ConstructionStarted> {
    let planned = if building.status_at(now) != BuildingStatus::Active {
        Err(DeclineReason::NotActive)
    } else {
        construction_cost(building.kind, building.level + 1)
            .map_err(|_| DeclineReason::MaxLevel {
                level: building.level,
            })
            .and_then(|cost| require_funds(cost.currency, player.spirit_stones).map(|()| cost))
    };
    let cost = match planned {
        Ok(cost) => cost,
        Err(reason) => {
            debug!(code = reason.code(), kind = ?building.kind, "upgrade declined");
            return Outcome::Declined(reason);
        }
    };

    let mut updated = player.clone();
    updated.spirit_stones -= cost.currency;
    let upgraded = Building {
        level: building.level + 1,
        status: BuildingStatus::Upgrading,
        build_start_at: now,
        build_end_at: finish_at(now, cost.minutes),
        ..building.clone()
    };
    info!(kind = ?building.kind, level = upgraded.level, currency = cost.currency, "upgrade started");
    Outcome::Resolved(ConstructionStarted {
        player: updated,
        building: upgraded,
        cost,
    })
}

/// A paid skip of the remaining construction time.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpeedUp {
    pub player: PlayerProgress,
    pub building: Building,
    pub remaining_minutes: u64,
    pub currency_charged: u64,
}

/// Finishes a construction now for `ceil(remaining minutes) * rate` currency.
///
/// A building that is already complete is returned reconciled at no charge.
pub fn speed_up(
    cfg: &ConstructionConfig,
    player: &PlayerProgress,
    building: &Building,
    now: EpochMillis,
) -> Outcome<SpeedUp> {
    let remaining = remaining_minutes(building.build_end_at, now);
    let charge = speed_up_charge(remaining, cfg.speed_up_cost_per_minute);
    if let Err(reason) = require_funds(charge, player.spirit_stones) {
        debug!(code = reason.code(), remaining, "speed-up declined");
        return Outcome::Declined(reason);
    }

    let mut updated = player.clone();
    updated.spirit_stones -= charge;
    let mut finished = building.clone();
    if remaining > 0 {
        finished.build_end_at = now;
        info!(kind = ?building.kind, remaining, charge, "construction sped up");
    }
    Outcome::Resolved(SpeedUp {
        player: updated,
        building: finished.reconciled(now),
        remaining_minutes: remaining,
        currency_charged: charge,
    })
}

/// Cave-wide totals over every active building.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaveStats {
    /// Percent bonus to qi accrual.
    pub production_rate: u64,
    pub defense: u64,
    pub storage_capacity: u64,
    pub alchemy_success: u64,
    pub forging_success: u64,
    pub comprehension: u64,
}

impl CaveStats {
    fn add(&mut self, effect: EffectKind, magnitude: u64) {
        let slot = match effect {
            EffectKind::ProductionRate => &mut self.production_rate,
            EffectKind::Defense => &mut self.defense,
            EffectKind::StorageCapacity => &mut self.storage_capacity,
            EffectKind::AlchemySuccess => &mut self.alchemy_success,
            EffectKind::ForgingSuccess => &mut self.forging_success,
            EffectKind::Comprehension => &mut self.comprehension,
        };
        *slot = slot.saturating_add(magnitude);
    }

    /// Accrual multiplier derived from the production rate.
    pub fn production_multiplier(&self) -> f64 {
        production_multiplier(self.production_rate)
    }
}

/// Folds the effects of buildings that are active at `now`.
pub fn cave_stats(buildings: &[Building], now: EpochMillis) -> CaveStats {
    buildings
        .iter()
        .filter(|b| b.status_at(now) == BuildingStatus::Active)
        .flat_map(|b| building_effects(b.kind, b.level))
        .fold(CaveStats::default(), |mut stats, (effect, magnitude)| {
            stats.add(effect, magnitude);
            stats
        })
}

/// One row of the construction menu.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub kind: BuildingType,
    pub status: BuildingStatus,
    pub building_id: Option<BuildingId>,
    pub level: Option<u32>,
    /// Cost of the next build or upgrade; `None` at the level cap.
    pub next_cost: Option<BuildCost>,
}

/// Status of every building type for this player, reconciled at `now`.
pub fn catalog(player: &PlayerProgress, buildings: &[Building], now: EpochMillis) -> Vec<CatalogEntry> {
    BuildingType::ALL
        .iter()
        .map(|&kind| match buildings.iter().find(|b| b.kind == kind) {
            Some(b) => CatalogEntry {
                kind,
                status: b.status_at(now),
                building_id: Some(b.id),
                level: Some(b.level),
                next_cost: construction_cost(kind, b.level + 1).ok(),
            },
            None => CatalogEntry {
                kind,
                status: if can_unlock(player.cave_level, kind) {
                    BuildingStatus::Available
                } else {
                    BuildingStatus::Locked
                },
                building_id: None,
                level: None,
                next_cost: construction_cost(kind, 1).ok(),
            },
        })
        .collect()
}

/// A completed cave expansion.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaveExpansion {
    pub player: PlayerProgress,
    pub cost: u64,
    pub cave_level_before: u8,
    pub cave_level_after: u8,
}

/// Raises the cave one level, unlocking slots and building types.
pub fn expand_cave(player: &PlayerProgress) -> Outcome<CaveExpansion> {
    let Some(cost) = cave_expansion_cost(player.cave_level) else {
        return Outcome::Declined(DeclineReason::MaxCaveLevel);
    };
    if let Err(reason) = require_funds(cost, player.spirit_stones) {
        return Outcome::Declined(reason);
    }
    let mut updated = player.clone();
    updated.spirit_stones -= cost;
    updated.cave_level = (updated.cave_level + 1).min(MAX_CAVE_LEVEL);
    info!(cave_level = updated.cave_level, cost, "cave expanded");
    Outcome::Resolved(CaveExpansion {
        cave_level_before: player.cave_level,
        cave_level_after: updated.cave_level,
        player: updated,
        cost,
    })
}
