//! Qi accrual while online and offline.
//!
//! Settlement is a pure function of the player snapshot and the caller's
//! `now`. The store must apply at most one settlement per window: two
//! concurrent settles from the same snapshot would both credit the gap.

use cultivation_core::{EpochMillis, PlayerProgress, MILLIS_PER_MINUTE};
use cultivation_econ::{cave_bonus, cultivation_exp, demon_penalty, floor_u64, quality_multiplier};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::AccrualConfig;
use crate::EngineError;

/// Whether the settle is a live-session tick or a cold catch-up.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccrualMode {
    Online,
    Offline,
}

impl AccrualMode {
    fn threshold_minutes(self, cfg: &AccrualConfig) -> i64 {
        match self {
            AccrualMode::Online => cfg.online_threshold_minutes,
            AccrualMode::Offline => cfg.offline_threshold_minutes,
        }
    }

    fn rate(self, cfg: &AccrualConfig) -> f64 {
        match self {
            AccrualMode::Online => cfg.online_rate,
            AccrualMode::Offline => cfg.offline_rate,
        }
    }
}

/// Result of a settle call.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Settlement {
    pub player: PlayerProgress,
    pub granted_qi: u64,
    /// Whole minutes credited after capping; 0 when the gap was too short.
    pub elapsed_minutes_applied: i64,
    /// Whether elapsed time beyond the cap was dropped.
    pub capped: bool,
}

/// Whole minutes between the last settlement and `now`, floored.
pub fn elapsed_minutes(last_settled_at: EpochMillis, now: EpochMillis) -> i64 {
    now.saturating_sub(last_settled_at).div_euclid(MILLIS_PER_MINUTE)
}

/// Qi earned over `minutes` by this player, before the mode rate.
fn base_gain(player: &PlayerProgress, minutes: i64, production_multiplier: f64) -> f64 {
    let exp = cultivation_exp(
        minutes,
        quality_multiplier(player.spirit_root),
        production_multiplier,
    );
    exp as f64 * cave_bonus(player.cave_level) * demon_penalty(player.inner_demon)
}

/// Applies accrual for the time since `last_settled_at`.
///
/// Gaps shorter than the mode's threshold leave the player untouched,
/// `last_settled_at` included, so the gap keeps counting toward the next call.
pub fn settle(
    cfg: &AccrualConfig,
    player: &PlayerProgress,
    now: EpochMillis,
    mode: AccrualMode,
    production_multiplier: f64,
) -> Settlement {
    let elapsed = elapsed_minutes(player.last_settled_at, now);
    if elapsed < mode.threshold_minutes(cfg) {
        debug!(elapsed, ?mode, "settle skipped: gap below threshold");
        return Settlement {
            player: player.clone(),
            granted_qi: 0,
            elapsed_minutes_applied: 0,
            capped: false,
        };
    }

    let effective = elapsed.min(cfg.max_elapsed_minutes);
    let granted_qi = floor_u64(base_gain(player, effective, production_multiplier) * mode.rate(cfg));

    let mut updated = player.clone();
    updated.qi = updated.qi.saturating_add(granted_qi);
    updated.last_settled_at = now;
    debug!(
        elapsed,
        effective,
        granted_qi,
        ?mode,
        "settled accrual"
    );
    Settlement {
        player: updated,
        granted_qi,
        elapsed_minutes_applied: effective,
        capped: elapsed > effective,
    }
}

/// Qi gained from an explicit meditation session.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Meditation {
    pub player: PlayerProgress,
    pub granted_qi: u64,
}

/// A timed cultivation session, optionally boosted by pills.
///
/// Does not touch `last_settled_at`; passive accrual is owned by [`settle`].
pub fn meditate(
    player: &PlayerProgress,
    duration_minutes: i64,
    boost: f64,
) -> Result<Meditation, EngineError> {
    if duration_minutes < 0 {
        return Err(EngineError::NegativeDuration(duration_minutes));
    }
    if !boost.is_finite() || boost < 0.0 {
        return Err(EngineError::InvalidBoost(boost));
    }
    let granted_qi = floor_u64(base_gain(player, duration_minutes, boost));
    let mut updated = player.clone();
    updated.qi = updated.qi.saturating_add(granted_qi);
    Ok(Meditation {
        player: updated,
        granted_qi,
    })
}
