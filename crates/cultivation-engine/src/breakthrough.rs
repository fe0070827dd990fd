//! Single-trial rank breakthroughs.

use cultivation_core::{PlayerProgress, Rank, MAX_INNER_DEMON};
use cultivation_econ::{breakthrough_cost, floor_u64};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::BreakthroughConfig;
use crate::outcome::{require_funds, DeclineReason, Outcome};
use crate::random::{bernoulli, RandomSource};

/// A resolved attempt, successful or not.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BreakthroughResolution {
    pub player: PlayerProgress,
    pub success: bool,
    pub success_chance: f64,
    /// The uniform draw the trial used.
    pub roll: f64,
    /// Spirit stones consumed, charged regardless of the result.
    pub cost: u64,
    pub rank_before: Rank,
    pub rank_after: Rank,
    pub qi_lost: u64,
    pub inner_demon_gained: u8,
}

/// `clamp(progress*0.7 + (luck-50)/500 + boost, min, max)`.
pub fn success_chance(cfg: &BreakthroughConfig, progress: f64, used_boost_item: bool) -> f64 {
    let progress = if progress.is_nan() { 0.0 } else { progress.clamp(0.0, 1.0) };
    let boost = if used_boost_item { cfg.boost_bonus } else { 0.0 };
    (progress * 0.7 + (cfg.luck - 50.0) / 500.0 + boost).clamp(cfg.min_chance, cfg.max_chance)
}

/// Qi a player needs before an attempt at `gate` is allowed.
pub(crate) fn required_qi(max_qi: u64, gate: f64) -> u64 {
    (max_qi as f64 * gate).ceil() as u64
}

/// Whether `qi / max_qi` reaches `gate`.
pub(crate) fn meets_gate(player: &PlayerProgress, gate: f64) -> bool {
    player.max_qi > 0 && (player.qi as f64) >= player.max_qi as f64 * gate
}

/// Moves the player to the next rank: qi resets and the threshold doubles.
/// Returns `false` at the terminal rank without touching the player.
pub(crate) fn advance_rank(player: &mut PlayerProgress) -> bool {
    let Some(next) = player.rank.next() else {
        return false;
    };
    player.rank = next;
    player.qi = 0;
    player.max_qi = player.max_qi.saturating_mul(2);
    true
}

/// Checks shared with the tribulation path.
pub(crate) fn rank_gate(player: &PlayerProgress, gate: f64) -> Result<(), DeclineReason> {
    if player.rank.is_terminal() {
        return Err(DeclineReason::AlreadyMaxRank);
    }
    if !meets_gate(player, gate) {
        return Err(DeclineReason::InsufficientProgress {
            qi: player.qi,
            required: required_qi(player.max_qi, gate),
        });
    }
    Ok(())
}

/// Attempts a breakthrough.
///
/// Declines, in order: terminal rank, progress below the gate, spirit stones
/// below the rank's cost. A resolved attempt always consumes the cost.
pub fn attempt<R: RandomSource + ?Sized>(
    cfg: &BreakthroughConfig,
    player: &PlayerProgress,
    used_boost_item: bool,
    rng: &mut R,
) -> Outcome<BreakthroughResolution> {
    let cost = breakthrough_cost(player.rank);
    let gate = rank_gate(player, cfg.progress_gate)
        .and_then(|()| require_funds(cost, player.spirit_stones));
    if let Err(reason) = gate {
        debug!(code = reason.code(), rank = ?player.rank, "breakthrough declined");
        return Outcome::Declined(reason);
    }

    let chance = success_chance(cfg, player.progress_ratio(), used_boost_item);
    let (success, roll) = bernoulli(rng, chance);

    let mut updated = player.clone();
    updated.spirit_stones -= cost;
    let mut qi_lost = 0;
    let mut inner_demon_gained = 0;
    if success {
        advance_rank(&mut updated);
    } else {
        qi_lost = floor_u64(updated.qi as f64 * cfg.failure_qi_loss);
        updated.qi -= qi_lost;
        let demon = updated
            .inner_demon
            .saturating_add(cfg.failure_inner_demon)
            .min(MAX_INNER_DEMON);
        inner_demon_gained = demon - updated.inner_demon;
        updated.inner_demon = demon;
    }

    info!(
        rank_before = ?player.rank,
        rank_after = ?updated.rank,
        success,
        chance,
        roll,
        cost,
        "breakthrough resolved"
    );
    Outcome::Resolved(BreakthroughResolution {
        rank_before: player.rank,
        rank_after: updated.rank,
        player: updated,
        success,
        success_chance: chance,
        roll,
        cost,
        qi_lost,
        inner_demon_gained,
    })
}
