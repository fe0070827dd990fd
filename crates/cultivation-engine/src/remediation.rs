//! Lowering the inner demon meter.

use cultivation_core::PlayerProgress;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::RemediationConfig;
use crate::outcome::{require_funds, DeclineReason, Outcome};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cleansing {
    pub player: PlayerProgress,
    pub cost: u64,
    pub inner_demon_removed: u8,
}

/// Spends spirit stones to calm the inner demon by a fixed amount.
pub fn cleanse_inner_demon(cfg: &RemediationConfig, player: &PlayerProgress) -> Outcome<Cleansing> {
    if player.inner_demon == 0 {
        return Outcome::Declined(DeclineReason::NothingToCleanse);
    }
    if let Err(reason) = require_funds(cfg.cleanse_cost, player.spirit_stones) {
        return Outcome::Declined(reason);
    }
    let mut updated = player.clone();
    let removed = updated.inner_demon.min(cfg.cleanse_amount);
    updated.inner_demon -= removed;
    updated.spirit_stones -= cfg.cleanse_cost;
    info!(removed, inner_demon = updated.inner_demon, "inner demon cleansed");
    Outcome::Resolved(Cleansing {
        player: updated,
        cost: cfg.cleanse_cost,
        inner_demon_removed: removed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use cultivation_core::SpiritRootTier;

    #[test]
    fn cleansing_lowers_demon_and_charges() {
        let cfg = RemediationConfig::default();
        let mut p = PlayerProgress::new(SpiritRootTier::Inferior, 0);
        p.inner_demon = 14;
        p.spirit_stones = 250;
        let c = cleanse_inner_demon(&cfg, &p).resolved().unwrap();
        assert_eq!(c.player.inner_demon, 4);
        assert_eq!(c.player.spirit_stones, 150);
        let c2 = cleanse_inner_demon(&cfg, &c.player).resolved().unwrap();
        assert_eq!(c2.inner_demon_removed, 4);
        assert_eq!(c2.player.inner_demon, 0);
        assert_eq!(
            cleanse_inner_demon(&cfg, &c2.player).decline_reason(),
            Some(DeclineReason::NothingToCleanse)
        );
    }

    #[test]
    fn cleansing_needs_funds() {
        let cfg = RemediationConfig::default();
        let mut p = PlayerProgress::new(SpiritRootTier::Inferior, 0);
        p.inner_demon = 60;
        p.spirit_stones = 99;
        assert_eq!(
            cleanse_inner_demon(&cfg, &p).decline_reason(),
            Some(DeclineReason::InsufficientCurrency {
                required: 100,
                available: 99
            })
        );
    }
}
