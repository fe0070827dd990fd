#![deny(warnings)]

//! Progression economics: rate, cost and reward curves for the cultivation engine.
//!
//! Every function here is pure. The module provides validated utilities for:
//! - Qi accrual rates (spirit root quality, cave bonus, inner demon penalty)
//! - Rank-indexed breakthrough costs and tribulation wave/reward/penalty curves
//! - Building cost curves, speed-up pricing and per-level building effects

use cultivation_core::{BuildingType, EffectKind, Rank, SpiritRootTier, MAX_CAVE_LEVEL};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Inner demon values strictly above this halve accrual.
pub const DEMON_PENALTY_THRESHOLD: u8 = 50;

/// Growth factor shared by the breakthrough and construction cost curves.
pub const COST_GROWTH: f64 = 1.5;

/// Spirit stone cost of a breakthrough at level 0 of the curve.
pub const BREAKTHROUGH_BASE_COST: f64 = 50.0;

/// Wave power growth per wave index.
pub const WAVE_POWER_STEP: f64 = 0.2;

/// Wave damage relative to its power.
pub const WAVE_DAMAGE_FACTOR: f64 = 1.5;

/// Base tribulation power at the lowest rank.
pub const TRIBULATION_BASE_POWER: f64 = 100.0;

/// Experience credited per rank level per cleared wave.
pub const REWARD_EXPERIENCE_PER_WAVE: u64 = 100;
/// Spirit stones credited per rank level per cleared wave.
pub const REWARD_STONES_PER_WAVE: u64 = 20;
/// Qi lost per rank level per wave short of a full clear.
pub const PENALTY_QI_PER_WAVE: u64 = 50;
/// Inner demon gained per rank level per wave short of a full clear.
pub const PENALTY_DEMON_PER_WAVE: u64 = 2;

/// Spirit stone cost of expanding a level-1 cave.
pub const CAVE_EXPANSION_BASE_COST: f64 = 1000.0;

/// Errors produced by economic helpers.
#[derive(Debug, Error, PartialEq)]
pub enum EconError {
    /// Building levels are 1-based and bounded by the type's cap.
    #[error("level {level} is out of range for {kind:?} (1..={cap})")]
    LevelOutOfRange {
        kind: BuildingType,
        level: u32,
        cap: u32,
    },
}

/// Floors a non-negative float into `u64`, saturating; NaN and negatives give 0.
pub fn floor_u64(x: f64) -> u64 {
    if !x.is_finite() {
        return if x == f64::INFINITY { u64::MAX } else { 0 };
    }
    if x <= 0.0 {
        return 0;
    }
    x.floor().min(u64::MAX as f64) as u64
}

/// Multiplier of a spirit root tier. Strictly increasing with tier.
pub fn quality_multiplier(tier: SpiritRootTier) -> f64 {
    match tier {
        SpiritRootTier::Inferior => 1.0,
        SpiritRootTier::Ordinary => 1.2,
        SpiritRootTier::Superior => 1.5,
        SpiritRootTier::Heavenly => 2.0,
    }
}

/// Experience from cultivating for `duration_minutes`.
///
/// `floor(minutes * (1 + (quality - 1) * 0.5) * boost)`; non-positive
/// durations yield 0. No upper bound: callers clamp the duration.
pub fn cultivation_exp(duration_minutes: i64, quality_multiplier: f64, boost: f64) -> u64 {
    if duration_minutes <= 0 {
        return 0;
    }
    let quality_factor = 1.0 + (quality_multiplier - 1.0) * 0.5;
    floor_u64(duration_minutes as f64 * quality_factor * boost)
}

/// Accrual bonus of the player's cave.
pub fn cave_bonus(cave_level: u8) -> f64 {
    1.0 + (f64::from(cave_level) - 1.0) * 0.1
}

/// Step penalty on accrual: 0.5 above the threshold, 1.0 otherwise.
///
/// The cliff at 50 is intentional game balance and is exclusive.
pub fn demon_penalty(inner_demon: u8) -> f64 {
    if inner_demon > DEMON_PENALTY_THRESHOLD {
        0.5
    } else {
        1.0
    }
}

/// Converts an aggregate production rate (percent) into an accrual multiplier.
pub fn production_multiplier(production_rate_percent: u64) -> f64 {
    1.0 + production_rate_percent as f64 / 100.0
}

/// Spirit stones consumed by a breakthrough attempt at `rank`.
pub fn breakthrough_cost(rank: Rank) -> u64 {
    floor_u64(BREAKTHROUGH_BASE_COST * COST_GROWTH.powi(rank.level() as i32))
}

/// Number of tribulation waves for a rank: a lookup, not a curve.
pub fn waves_for_rank(rank: Rank) -> u32 {
    match rank.level() {
        1 | 2 => 3,
        3 => 6,
        _ => 9,
    }
}

/// Power of the first tribulation wave at a rank.
pub fn rank_base_power(rank: Rank) -> u64 {
    floor_u64(TRIBULATION_BASE_POWER * COST_GROWTH.powi(rank.level() as i32 - 1))
}

/// Power and damage of a single tribulation wave.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaveSpec {
    /// 1-based wave index.
    pub index: u32,
    pub power: u64,
    pub damage: u64,
}

/// Generates the ordered wave sequence for a tribulation at `rank`.
pub fn generate_waves(rank: Rank) -> Vec<WaveSpec> {
    let base = rank_base_power(rank) as f64;
    (1..=waves_for_rank(rank))
        .map(|index| {
            let power = floor_u64(base * (1.0 + f64::from(index - 1) * WAVE_POWER_STEP));
            let damage = floor_u64(power as f64 * WAVE_DAMAGE_FACTOR);
            WaveSpec {
                index,
                power,
                damage,
            }
        })
        .collect()
}

/// Rewards credited on a fully cleared tribulation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TribulationReward {
    pub experience: u64,
    pub spirit_stones: u64,
}

/// `100 * level * waves` experience and `20 * level * waves` spirit stones.
pub fn tribulation_reward(rank: Rank, waves_completed: u32) -> TribulationReward {
    let scale = u64::from(rank.level()) * u64::from(waves_completed);
    TribulationReward {
        experience: REWARD_EXPERIENCE_PER_WAVE.saturating_mul(scale),
        spirit_stones: REWARD_STONES_PER_WAVE.saturating_mul(scale),
    }
}

/// Penalty of a failed tribulation, proportional to how far short it fell.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TribulationPenalty {
    pub exp_lost: u64,
    pub inner_demon_gained: u64,
}

/// `50 * level * shortfall` qi and `2 * level * shortfall` inner demon, where
/// the shortfall is the number of waves left uncleared. Callers clamp both.
pub fn tribulation_penalty(rank: Rank, total_waves: u32, waves_completed: u32) -> TribulationPenalty {
    let shortfall = total_waves.saturating_sub(waves_completed);
    let scale = u64::from(rank.level()) * u64::from(shortfall);
    TribulationPenalty {
        exp_lost: PENALTY_QI_PER_WAVE.saturating_mul(scale),
        inner_demon_gained: PENALTY_DEMON_PER_WAVE.saturating_mul(scale),
    }
}

/// Cost of constructing or upgrading a building to a level.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildCost {
    /// Spirit stones charged.
    pub currency: u64,
    /// Materials required (tracked by the inventory owner).
    pub materials: u64,
    /// Construction time in minutes.
    pub minutes: u64,
}

/// `base(kind) * 1.5^(target_level - 1)`, each dimension floored independently.
pub fn construction_cost(kind: BuildingType, target_level: u32) -> Result<BuildCost, EconError> {
    let spec = kind.spec();
    if target_level == 0 || target_level > spec.max_level {
        return Err(EconError::LevelOutOfRange {
            kind,
            level: target_level,
            cap: spec.max_level,
        });
    }
    let scale = COST_GROWTH.powi(target_level as i32 - 1);
    Ok(BuildCost {
        currency: floor_u64(spec.base_currency as f64 * scale),
        materials: floor_u64(spec.base_materials as f64 * scale),
        minutes: floor_u64(spec.base_minutes as f64 * scale),
    })
}

/// Whole minutes left on a construction clock, rounded up; 0 once complete.
pub fn remaining_minutes(build_end_at: i64, now: i64) -> u64 {
    let remaining_ms = build_end_at.saturating_sub(now);
    if remaining_ms <= 0 {
        return 0;
    }
    let per_minute = cultivation_core::MILLIS_PER_MINUTE as u64;
    (remaining_ms as u64).div_ceil(per_minute)
}

/// Currency charged to finish `remaining` minutes immediately.
pub fn speed_up_charge(remaining: u64, cost_per_minute: u64) -> u64 {
    remaining.saturating_mul(cost_per_minute)
}

/// Effects contributed by a building at a level, in the type's declared order.
pub fn building_effects(kind: BuildingType, level: u32) -> Vec<(EffectKind, u64)> {
    kind.spec()
        .effects_per_level
        .iter()
        .map(|&(effect, per_level)| (effect, u64::from(per_level) * u64::from(level)))
        .collect()
}

/// Spirit stones to raise the cave from `cave_level` to the next level.
/// `None` at the maximum cave level.
pub fn cave_expansion_cost(cave_level: u8) -> Option<u64> {
    if cave_level >= MAX_CAVE_LEVEL {
        return None;
    }
    Some(floor_u64(
        CAVE_EXPANSION_BASE_COST * 2f64.powi(i32::from(cave_level) - 1),
    ))
}
