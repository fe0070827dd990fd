//! End-to-end progression scenarios.
//!
//! These drive the engine facade through whole play sessions with forced or
//! seeded randomness and check the numbers a player would actually see.

use cultivation_core::{
    BuildingId, BuildingStatus, BuildingType, PlayerProgress, Rank, SpiritRootTier,
    MILLIS_PER_MINUTE,
};
use cultivation_engine::breakthrough::success_chance;
use cultivation_engine::config::BreakthroughConfig;
use cultivation_engine::*;

const HOUR: i64 = 60 * MILLIS_PER_MINUTE;

fn fresh() -> PlayerProgress {
    PlayerProgress::new(SpiritRootTier::Inferior, 0)
}

#[test]
fn offline_two_hours_at_baseline() {
    let engine = Engine::new(EngineConfig::default(), ScriptedRandom::always_pass());
    let s = engine.settle(&fresh(), 120 * MILLIS_PER_MINUTE, AccrualMode::Offline, 1.0);
    assert_eq!(s.granted_qi, 60);
    assert_eq!(s.elapsed_minutes_applied, 120);
}

#[test]
fn ninety_percent_breakthrough_chance() {
    let cfg = BreakthroughConfig::default();
    let mut p = fresh();
    p.qi = 90;
    p.max_qi = 100;
    let chance = success_chance(&cfg, p.progress_ratio(), false);
    assert!((chance - 0.63).abs() < 1e-12);
}

#[test]
fn forced_lowest_rank_tribulation() {
    let mut engine = Engine::new(EngineConfig::default(), ScriptedRandom::always_pass());
    let mut p = fresh();
    p.qi = 80;
    let r = engine.attempt_tribulation(&p).resolved().unwrap();
    assert_eq!(r.attempt.total_waves, 3);
    assert_eq!(r.attempt.waves_completed, 3);
    assert!(r.attempt.success);
    assert_eq!(r.rank_before, Rank::QiRefining);
    assert_eq!(r.rank_after, Rank::FoundationEstablishment);
    assert_eq!(r.player.qi, 0);
}

#[test]
fn accrual_settles_before_breakthrough() {
    // 80% progress only exists after the offline gain has been applied.
    let mut engine = Engine::new(EngineConfig::default(), ScriptedRandom::always_pass());
    let mut p = fresh();
    p.qi = 30;
    assert_eq!(
        engine.attempt_breakthrough(&p, false).decline_reason(),
        Some(DeclineReason::InsufficientProgress { qi: 30, required: 80 })
    );
    let settled = engine.settle(&p, 2 * HOUR, AccrualMode::Offline, 1.0);
    assert_eq!(settled.player.qi, 90);
    let r = engine
        .attempt_breakthrough(&settled.player, false)
        .resolved()
        .unwrap();
    assert!(r.success);
    assert_eq!(r.player.rank, Rank::FoundationEstablishment);
    assert_eq!(r.player.spirit_stones, 25);
    assert_eq!(r.player.last_settled_at, 2 * HOUR);
}

#[test]
fn build_wait_and_collect_production() {
    let engine = Engine::new(EngineConfig::default(), ScriptedRandom::always_pass());
    let mut p = fresh();
    p.spirit_stones = 500;

    let started = engine
        .start_build(&p, &[], BuildingType::SpiritGatheringArray, 0, 0)
        .resolved()
        .unwrap();
    let mut building = started.building;
    building.id = BuildingId(1);
    let p = started.player;
    assert_eq!(p.spirit_stones, 400);

    let catalog = engine.catalog(&p, std::slice::from_ref(&building), MILLIS_PER_MINUTE);
    assert_eq!(catalog[0].status, BuildingStatus::Building);
    assert_eq!(engine.cave_stats(&[building.clone()], MILLIS_PER_MINUTE).production_rate, 0);

    let sped = engine
        .speed_up(&p, &building, MILLIS_PER_MINUTE)
        .resolved()
        .unwrap();
    assert_eq!(sped.remaining_minutes, 4);
    assert_eq!(sped.currency_charged, 40);
    let building = sped.building;
    let p = sped.player;
    assert_eq!(p.spirit_stones, 360);
    assert_eq!(building.status, BuildingStatus::Active);

    // A second speed-up on the finished building is free.
    let again = engine.speed_up(&p, &building, 2 * MILLIS_PER_MINUTE).resolved().unwrap();
    assert_eq!(again.currency_charged, 0);

    let gained = engine.settle_with_cave(&p, &[building], 2 * HOUR, AccrualMode::Offline);
    // +10% production: floor(floor(120 * 1.1) * 0.5)
    assert_eq!(gained.granted_qi, 66);
}

#[test]
fn failed_breakthroughs_feed_the_demon_until_accrual_halves() {
    let mut engine = Engine::new(EngineConfig::default(), ScriptedRandom::always_fail());
    let mut p = fresh();
    p.spirit_stones = 10_000;
    let mut now = 0;
    for _ in 0..6 {
        p.qi = p.max_qi;
        let r = engine.attempt_breakthrough(&p, false).resolved().unwrap();
        assert!(!r.success);
        p = r.player;
    }
    assert_eq!(p.inner_demon, 60);
    p.qi = 0;
    now += 2 * HOUR;
    let s = engine.settle(&p, now, AccrualMode::Offline, 1.0);
    assert_eq!(s.granted_qi, 30);

    let cleansed = engine.cleanse_inner_demon(&s.player).resolved().unwrap();
    assert_eq!(cleansed.player.inner_demon, 50);
    let s = engine.settle(&cleansed.player, now + 2 * HOUR, AccrualMode::Offline, 1.0);
    assert_eq!(s.granted_qi, 60);
}

#[test]
fn seeded_climb_never_lowers_rank() {
    let mut engine = Engine::new(EngineConfig::default(), seeded(2024));
    let mut p = fresh();
    p.spirit_stones = 1_000_000;
    let mut now = 0;
    for round in 0..200 {
        now += 24 * HOUR;
        p = engine.settle(&p, now, AccrualMode::Offline, 1.0).player;
        let before = p.rank;
        let next = if round % 2 == 0 {
            engine.attempt_breakthrough(&p, round % 4 == 0).resolved().map(|r| r.player)
        } else {
            engine.attempt_tribulation(&p).resolved().map(|r| r.player)
        };
        if let Some(next) = next {
            assert!(next.rank >= before);
            assert!(next.inner_demon <= 100);
            p = next;
        }
    }
    assert!(p.rank > Rank::QiRefining);
}
