//! Multi-wave tribulations: the high-stakes path to the next rank.
//!
//! One success chance is computed per attempt; every wave then draws once
//! against it. Resolution stops at the first lethal wave, and the ordered
//! trace is the record consumers replay.

use cultivation_core::{PlayerProgress, Rank, MAX_INNER_DEMON};
use cultivation_econ::{
    floor_u64, generate_waves, tribulation_penalty, tribulation_reward, TribulationPenalty,
    TribulationReward, WaveSpec,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::breakthrough::{advance_rank, rank_gate};
use crate::config::TribulationConfig;
use crate::outcome::Outcome;
use crate::random::{bernoulli, RandomSource};

/// One resolved wave.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct WaveRecord {
    /// 1-based wave index.
    pub index: u32,
    pub power: u64,
    pub damage: u64,
    pub passed: bool,
    pub roll: f64,
    /// Health actually removed. On a cleared wave this is the chip
    /// (`floor(damage * chip_fraction)`) capped at `health - 1`, so it can be
    /// lower than `chip_damage`.
    pub damage_taken: u64,
    /// Uncapped chip a cleared wave would deal; 0 on a failed wave.
    pub chip_damage: u64,
    /// Health after this wave, floored at 0. A cleared wave leaves at least 1.
    pub health_after: i64,
}

/// Aggregate result of the wave sequence.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TribulationAttempt {
    pub total_waves: u32,
    pub waves_completed: u32,
    pub survived: bool,
    /// True iff every wave was cleared; implies `survived`.
    pub success: bool,
    pub success_chance: f64,
    pub final_health: i64,
    pub trace: Vec<WaveRecord>,
}

/// A resolved tribulation together with its settlement.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TribulationResolution {
    pub player: PlayerProgress,
    pub attempt: TribulationAttempt,
    pub rank_before: Rank,
    pub rank_after: Rank,
    /// Present on success.
    pub reward: Option<TribulationReward>,
    /// Present on failure, whether or not the player survived.
    pub penalty: Option<TribulationPenalty>,
    pub qi_lost: u64,
    pub inner_demon_gained: u8,
}

/// `clamp(progress*0.7 - inner_demon/1000, min, max)`, once per attempt.
pub fn success_chance(cfg: &TribulationConfig, progress: f64, inner_demon: u8) -> f64 {
    let progress = if progress.is_nan() { 0.0 } else { progress.clamp(0.0, 1.0) };
    (progress * 0.7 - f64::from(inner_demon) / 1000.0).clamp(cfg.min_chance, cfg.max_chance)
}

/// Runs the wave sequence against a fixed chance.
///
/// A cleared wave still chips health but never takes the last point; a
/// failed wave deals full damage and ends the sequence if health drops to 0.
pub fn resolve_waves<R: RandomSource + ?Sized>(
    cfg: &TribulationConfig,
    waves: &[WaveSpec],
    chance: f64,
    rng: &mut R,
) -> TribulationAttempt {
    let mut health = cfg.starting_health;
    let mut waves_completed = 0;
    let mut survived = true;
    let mut trace = Vec::with_capacity(waves.len());

    for wave in waves {
        let (passed, roll) = bernoulli(rng, chance);
        let damage = i64::try_from(wave.damage).unwrap_or(i64::MAX);
        let chip_damage = if passed {
            floor_u64(wave.damage as f64 * cfg.chip_fraction)
        } else {
            0
        };
        let taken = if passed {
            waves_completed += 1;
            i64::try_from(chip_damage)
                .unwrap_or(i64::MAX)
                .min(health - 1)
        } else {
            damage
        };
        health = health.saturating_sub(taken);
        trace.push(WaveRecord {
            index: wave.index,
            power: wave.power,
            damage: wave.damage,
            passed,
            roll,
            damage_taken: taken.max(0) as u64,
            chip_damage,
            health_after: health.max(0),
        });
        debug!(wave = wave.index, passed, roll, health, "tribulation wave");
        if health <= 0 {
            survived = false;
            break;
        }
    }

    let total_waves = u32::try_from(waves.len()).unwrap_or(u32::MAX);
    TribulationAttempt {
        total_waves,
        waves_completed,
        survived,
        success: waves_completed == total_waves,
        success_chance: chance,
        final_health: health.max(0),
        trace,
    }
}

/// Attempts a tribulation at the player's current rank.
///
/// Declines at the terminal rank and below the progress gate. Success
/// advances the rank and credits rewards; any other result applies a penalty
/// proportional to the waves left uncleared.
pub fn attempt<R: RandomSource + ?Sized>(
    cfg: &TribulationConfig,
    player: &PlayerProgress,
    rng: &mut R,
) -> Outcome<TribulationResolution> {
    if let Err(reason) = rank_gate(player, cfg.progress_gate) {
        debug!(code = reason.code(), rank = ?player.rank, "tribulation declined");
        return Outcome::Declined(reason);
    }

    let waves = generate_waves(player.rank);
    let chance = success_chance(cfg, player.progress_ratio(), player.inner_demon);
    let result = resolve_waves(cfg, &waves, chance, rng);

    let mut updated = player.clone();
    let mut reward = None;
    let mut penalty = None;
    let mut qi_lost = 0;
    let mut inner_demon_gained = 0;
    if result.success {
        let r = tribulation_reward(player.rank, result.waves_completed);
        advance_rank(&mut updated);
        updated.experience = updated.experience.saturating_add(r.experience);
        updated.spirit_stones = updated.spirit_stones.saturating_add(r.spirit_stones);
        reward = Some(r);
    } else {
        let p = tribulation_penalty(player.rank, result.total_waves, result.waves_completed);
        qi_lost = updated.qi.min(p.exp_lost);
        updated.qi -= qi_lost;
        let headroom = u64::from(MAX_INNER_DEMON - updated.inner_demon.min(MAX_INNER_DEMON));
        inner_demon_gained = p.inner_demon_gained.min(headroom) as u8;
        updated.inner_demon += inner_demon_gained;
        penalty = Some(p);
    }

    info!(
        rank = ?player.rank,
        total_waves = result.total_waves,
        waves_completed = result.waves_completed,
        survived = result.survived,
        success = result.success,
        "tribulation resolved"
    );
    Outcome::Resolved(TribulationResolution {
        rank_before: player.rank,
        rank_after: updated.rank,
        player: updated,
        attempt: result,
        reward,
        penalty,
        qi_lost,
        inner_demon_gained,
    })
}
