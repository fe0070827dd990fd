#![deny(warnings)]

//! Persistence layer: repository interfaces for player progress and cave
//! buildings, the JSON cave blob codec and an in-memory reference store.
//!
//! The engine never calls into this crate. Callers load a snapshot, run an
//! engine operation, then write the result back with
//! [`PlayerRepository::save_player_if`] keyed on the version they loaded.
//! Every successful write bumps the version, so any write computed from a
//! stale snapshot (a second settle of the same window, a settle racing a
//! breakthrough) is rejected instead of overwriting committed progress.

pub mod blob;
pub mod memory;

use cultivation_core::{Building, BuildingId, EpochMillis, PlayerProgress, ValidationError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use blob::{decode_cave, encode_cave, CaveBlob, CAVE_SCHEMA_VERSION};
pub use memory::MemoryStore;

/// Store-side key of a player.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PlayerId(pub u64);

/// A player record as loaded, with the write counter it was read at.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerSnapshot {
    pub player: PlayerProgress,
    /// Bumped by the store on every successful write.
    pub version: u64,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("player {0:?} not found")]
    PlayerNotFound(PlayerId),
    #[error("player {0:?} already exists")]
    PlayerExists(PlayerId),
    #[error("building {building:?} not found for player {player:?}")]
    BuildingNotFound { player: PlayerId, building: BuildingId },
    /// The stored record was written since the snapshot was loaded.
    #[error("player {player:?} is at version {actual}, expected {expected}")]
    Conflict {
        player: PlayerId,
        expected: u64,
        actual: u64,
    },
    #[error("invalid record: {0}")]
    Invalid(#[from] ValidationError),
    #[error("cave blob schema {found} is not supported (expected {expected})")]
    UnsupportedSchema { found: u32, expected: u32 },
    #[error("cave blob codec: {0}")]
    Codec(#[from] serde_json::Error),
}

pub trait PlayerRepository {
    fn load_player(&self, id: PlayerId) -> Result<PlayerSnapshot, StoreError>;

    /// Stores a new player and returns its first version.
    fn insert_player(&mut self, id: PlayerId, player: &PlayerProgress) -> Result<u64, StoreError>;

    /// Writes `player` only if the stored record is still at
    /// `expected_version`; returns the new version.
    fn save_player_if(
        &mut self,
        id: PlayerId,
        expected_version: u64,
        player: &PlayerProgress,
    ) -> Result<u64, StoreError>;
}

pub trait BuildingRepository {
    /// Every building in the player's cave with status reconciled against `now`.
    fn list_buildings(&self, player: PlayerId, now: EpochMillis)
        -> Result<Vec<Building>, StoreError>;

    fn get_building(&self, player: PlayerId, id: BuildingId) -> Result<Building, StoreError>;

    /// Stores a new record and returns it with its assigned id.
    fn insert_building(&mut self, player: PlayerId, building: &Building)
        -> Result<Building, StoreError>;

    fn update_building(&mut self, player: PlayerId, building: &Building) -> Result<(), StoreError>;
}
