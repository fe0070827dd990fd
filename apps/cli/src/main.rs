#![deny(warnings)]

//! Headless CLI that plays one cultivation session against the in-memory
//! store and prints every engine outcome as a JSON line.

use anyhow::{bail, Context, Result};
use cultivation_core::{
    Building, BuildingType, EpochMillis, PlayerProgress, SpiritRootTier, MILLIS_PER_MINUTE,
};
use cultivation_engine::{
    seeded, AccrualMode, ConstructionStarted, Engine, EngineConfig, RandomSource, SpeedUp,
};
use persistence::{BuildingRepository, MemoryStore, PlayerId, PlayerRepository, PlayerSnapshot};
use serde::Serialize;
use tracing::{info, Level};
use tracing_subscriber::EnvFilter;

const PLAYER: PlayerId = PlayerId(1);

struct Args {
    config: Option<String>,
    seed: u64,
    offline_minutes: i64,
    spirit_root: SpiritRootTier,
}

fn parse_tier(name: &str) -> Result<SpiritRootTier> {
    Ok(match name {
        "inferior" => SpiritRootTier::Inferior,
        "ordinary" => SpiritRootTier::Ordinary,
        "superior" => SpiritRootTier::Superior,
        "heavenly" => SpiritRootTier::Heavenly,
        other => bail!("unknown spirit root {other:?}"),
    })
}

fn parse_args() -> Result<Args> {
    let mut args = Args {
        config: None,
        seed: 42,
        offline_minutes: 120,
        spirit_root: SpiritRootTier::Inferior,
    };
    let mut it = std::env::args().skip(1);
    while let Some(arg) = it.next() {
        let mut value = || it.next().with_context(|| format!("{arg} needs a value"));
        match arg.as_str() {
            "--config" => args.config = Some(value()?),
            "--seed" => args.seed = value()?.parse().context("--seed")?,
            "--offline-minutes" => {
                args.offline_minutes = value()?.parse().context("--offline-minutes")?
            }
            "--spirit-root" => args.spirit_root = parse_tier(&value()?)?,
            _ => {}
        }
    }
    if args.offline_minutes < 0 {
        bail!("--offline-minutes must be >= 0");
    }
    Ok(args)
}

fn emit<T: Serialize>(step: &str, value: &T) -> Result<()> {
    let line = serde_json::json!({ "step": step, "result": value });
    println!("{}", serde_json::to_string(&line)?);
    Ok(())
}

/// Writes `next` back if the record is still at the version `loaded` was read at.
fn commit(store: &mut MemoryStore, loaded: &PlayerSnapshot, next: &PlayerProgress) -> Result<u64> {
    store
        .save_player_if(PLAYER, loaded.version, next)
        .context("saving player")
}

/// Charges the player, then stores the paid-for building. A failed insert
/// puts the charge back.
fn persist_build(
    store: &mut MemoryStore,
    loaded: &PlayerSnapshot,
    started: &ConstructionStarted,
) -> Result<Building> {
    let version = commit(store, loaded, &started.player)?;
    match store.insert_building(PLAYER, &started.building) {
        Ok(building) => Ok(building),
        Err(err) => {
            store
                .save_player_if(PLAYER, version, &loaded.player)
                .context("refunding build")?;
            Err(err).context("storing building")
        }
    }
}

/// Same ordering as [`persist_build`] for a paid skip.
fn persist_speed_up(store: &mut MemoryStore, loaded: &PlayerSnapshot, sped: &SpeedUp) -> Result<()> {
    let version = commit(store, loaded, &sped.player)?;
    if let Err(err) = store.update_building(PLAYER, &sped.building) {
        store
            .save_player_if(PLAYER, version, &loaded.player)
            .context("refunding speed-up")?;
        return Err(err).context("finishing building");
    }
    Ok(())
}

fn session<R: RandomSource>(
    engine: &mut Engine<R>,
    store: &mut MemoryStore,
    now: EpochMillis,
) -> Result<()> {
    let loaded = store.load_player(PLAYER)?;
    let buildings = store.list_buildings(PLAYER, now)?;
    let settled = engine.settle_with_cave(&loaded.player, &buildings, now, AccrualMode::Offline);
    emit("settle", &settled)?;
    commit(store, &loaded, &settled.player)?;

    let loaded = store.load_player(PLAYER)?;
    let started = engine.start_build(
        &loaded.player,
        &buildings,
        BuildingType::SpiritGatheringArray,
        0,
        now,
    );
    emit("build", &started)?;
    if let Some(started) = started.resolved() {
        let building = persist_build(store, &loaded, &started)?;

        let loaded = store.load_player(PLAYER)?;
        let sped = engine.speed_up(&loaded.player, &building, now);
        emit("speed_up", &sped)?;
        if let Some(sped) = sped.resolved() {
            persist_speed_up(store, &loaded, &sped)?;
        }
    }

    let buildings = store.list_buildings(PLAYER, now)?;
    emit("cave_stats", &engine.cave_stats(&buildings, now))?;
    let loaded = store.load_player(PLAYER)?;
    emit("catalog", &engine.catalog(&loaded.player, &buildings, now))?;

    let breakthrough = engine.attempt_breakthrough(&loaded.player, false);
    emit("breakthrough", &breakthrough)?;
    if let Some(resolved) = breakthrough.resolved() {
        commit(store, &loaded, &resolved.player)?;
    }

    let loaded = store.load_player(PLAYER)?;
    let tribulation = engine.attempt_tribulation(&loaded.player);
    emit("tribulation", &tribulation)?;
    if let Some(resolved) = tribulation.resolved() {
        commit(store, &loaded, &resolved.player)?;
    }

    emit("player", &store.load_player(PLAYER)?)?;
    Ok(())
}

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_max_level(Level::INFO)
        .with_writer(std::io::stderr)
        .init();

    let args = parse_args()?;
    info!(
        config = ?args.config,
        seed = args.seed,
        offline_minutes = args.offline_minutes,
        build = env!("GIT_SHA"),
        "starting session"
    );

    let config = match &args.config {
        Some(path) => EngineConfig::from_file(path).with_context(|| format!("loading {path}"))?,
        None => EngineConfig::default(),
    };

    let now = chrono::Utc::now().timestamp_millis();
    let created_at = now - args.offline_minutes * MILLIS_PER_MINUTE;
    let mut store = MemoryStore::new();
    store.insert_player(PLAYER, &PlayerProgress::new(args.spirit_root, created_at))?;

    let mut engine = Engine::new(config, seeded(args.seed));
    session(&mut engine, &mut store, now)
}
