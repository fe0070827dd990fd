#![deny(warnings)]

//! Progression and temporal simulation engine for the cultivation game.
//!
//! Every entry point takes a snapshot of player or building state plus the
//! caller's `now` and returns a new snapshot inside a tagged [`Outcome`].
//! Nothing here blocks, performs I/O or reads a global clock or RNG:
//! randomness arrives through a [`RandomSource`], time through `now`.

pub mod accrual;
pub mod breakthrough;
pub mod config;
pub mod construction;
pub mod outcome;
pub mod random;
pub mod remediation;
pub mod tribulation;

use cultivation_core::{Building, BuildingType, EpochMillis, PlayerProgress};
use thiserror::Error;

pub use accrual::{AccrualMode, Meditation, Settlement};
pub use breakthrough::BreakthroughResolution;
pub use config::{ConfigError, EngineConfig};
pub use construction::{CatalogEntry, CaveExpansion, CaveStats, ConstructionStarted, SpeedUp};
pub use outcome::{DeclineReason, Outcome};
pub use random::{seeded, RandomSource, RngSource, ScriptedRandom};
pub use remediation::Cleansing;
pub use tribulation::{TribulationAttempt, TribulationResolution, WaveRecord};

/// Inputs rejected before any engine logic runs.
#[derive(Debug, Error, PartialEq)]
pub enum EngineError {
    #[error("duration must be >= 0 minutes, got {0}")]
    NegativeDuration(i64),
    #[error("boost must be finite and >= 0, got {0}")]
    InvalidBoost(f64),
}

/// Owns the tunables and the injected random source.
#[derive(Clone, Debug)]
pub struct Engine<R> {
    config: EngineConfig,
    rng: R,
}

impl<R: RandomSource> Engine<R> {
    pub fn new(config: EngineConfig, rng: R) -> Self {
        Self { config, rng }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Settles accrual with an explicit production multiplier.
    pub fn settle(
        &self,
        player: &PlayerProgress,
        now: EpochMillis,
        mode: AccrualMode,
        production_multiplier: f64,
    ) -> Settlement {
        accrual::settle(&self.config.accrual, player, now, mode, production_multiplier)
    }

    /// Settles accrual using the production rate of the player's active buildings.
    pub fn settle_with_cave(
        &self,
        player: &PlayerProgress,
        buildings: &[Building],
        now: EpochMillis,
        mode: AccrualMode,
    ) -> Settlement {
        let multiplier = construction::cave_stats(buildings, now).production_multiplier();
        self.settle(player, now, mode, multiplier)
    }

    pub fn meditate(
        &self,
        player: &PlayerProgress,
        duration_minutes: i64,
        boost: f64,
    ) -> Result<Meditation, EngineError> {
        accrual::meditate(player, duration_minutes, boost)
    }

    pub fn attempt_breakthrough(
        &mut self,
        player: &PlayerProgress,
        used_boost_item: bool,
    ) -> Outcome<BreakthroughResolution> {
        breakthrough::attempt(
            &self.config.breakthrough,
            player,
            used_boost_item,
            &mut self.rng,
        )
    }

    pub fn attempt_tribulation(&mut self, player: &PlayerProgress) -> Outcome<TribulationResolution> {
        tribulation::attempt(&self.config.tribulation, player, &mut self.rng)
    }

    pub fn start_build(
        &self,
        player: &PlayerProgress,
        existing: &[Building],
        kind: BuildingType,
        position: u8,
        now: EpochMillis,
    ) -> Outcome<ConstructionStarted> {
        construction::start_build(player, existing, kind, position, now)
    }

    pub fn start_upgrade(
        &self,
        player: &PlayerProgress,
        building: &Building,
        now: EpochMillis,
    ) -> Outcome<ConstructionStarted> {
        construction::start_upgrade(player, building, now)
    }

    pub fn speed_up(
        &self,
        player: &PlayerProgress,
        building: &Building,
        now: EpochMillis,
    ) -> Outcome<SpeedUp> {
        construction::speed_up(&self.config.construction, player, building, now)
    }

    pub fn cave_stats(&self, buildings: &[Building], now: EpochMillis) -> CaveStats {
        construction::cave_stats(buildings, now)
    }

    pub fn catalog(
        &self,
        player: &PlayerProgress,
        buildings: &[Building],
        now: EpochMillis,
    ) -> Vec<CatalogEntry> {
        construction::catalog(player, buildings, now)
    }

    pub fn expand_cave(&self, player: &PlayerProgress) -> Outcome<CaveExpansion> {
        construction::expand_cave(player)
    }

    pub fn cleanse_inner_demon(&self, player: &PlayerProgress) -> Outcome<Cleansing> {
        remediation::cleanse_inner_demon(&self.config.remediation, player)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cultivation_core::{BuildingId, BuildingStatus, SpiritRootTier, MILLIS_PER_MINUTE};

    #[test]
    fn seeded_engines_agree() {
        let mut p = PlayerProgress::new(SpiritRootTier::Ordinary, 0);
        p.qi = 85;
        p.spirit_stones = 10_000;
        let mut a = Engine::new(EngineConfig::default(), seeded(7));
        let mut b = Engine::new(EngineConfig::default(), seeded(7));
        for _ in 0..20 {
            assert_eq!(a.attempt_tribulation(&p), b.attempt_tribulation(&p));
            assert_eq!(
                a.attempt_breakthrough(&p, true),
                b.attempt_breakthrough(&p, true)
            );
        }
    }

    #[test]
    fn meditation_rejects_negative_duration() {
        let engine = Engine::new(EngineConfig::default(), ScriptedRandom::always_pass());
        let p = PlayerProgress::new(SpiritRootTier::Inferior, 0);
        assert_eq!(
            engine.meditate(&p, -5, 1.0),
            Err(EngineError::NegativeDuration(-5))
        );
    }

    #[test]
    fn cave_production_feeds_accrual() {
        let engine = Engine::new(EngineConfig::default(), ScriptedRandom::always_pass());
        let p = PlayerProgress::new(SpiritRootTier::Inferior, 0);
        let array = Building {
            id: BuildingId(1),
            kind: BuildingType::SpiritGatheringArray,
            level: 5,
            position: 0,
            status: BuildingStatus::Active,
            build_start_at: 0,
            build_end_at: 0,
        };
        let now = 120 * MILLIS_PER_MINUTE;
        let bare = engine.settle_with_cave(&p, &[], now, AccrualMode::Offline);
        let boosted = engine.settle_with_cave(&p, &[array], now, AccrualMode::Offline);
        assert_eq!(bare.granted_qi, 60);
        // +50% production: floor(120 * 1.5) * 0.5
        assert_eq!(boosted.granted_qi, 90);
    }
}
