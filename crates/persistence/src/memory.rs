//! In-memory store keeping caves as encoded blobs, the way a row-per-player
//! database would.

use std::collections::BTreeMap;

use cultivation_core::{validate_player, Building, BuildingId, EpochMillis, PlayerProgress};
use tracing::{debug, warn};

use crate::blob::{decode_cave, encode_cave};
use crate::{BuildingRepository, PlayerId, PlayerRepository, PlayerSnapshot, StoreError};

#[derive(Debug, Default)]
pub struct MemoryStore {
    players: BTreeMap<PlayerId, PlayerSnapshot>,
    caves: BTreeMap<PlayerId, String>,
    next_building_id: u64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn cave(&self, player: PlayerId) -> Result<Vec<Building>, StoreError> {
        if !self.players.contains_key(&player) {
            return Err(StoreError::PlayerNotFound(player));
        }
        match self.caves.get(&player) {
            Some(json) => decode_cave(json),
            None => Ok(Vec::new()),
        }
    }

    fn write_cave(&mut self, player: PlayerId, buildings: &[Building]) -> Result<(), StoreError> {
        let json = encode_cave(buildings)?;
        self.caves.insert(player, json);
        Ok(())
    }
}

impl PlayerRepository for MemoryStore {
    fn load_player(&self, id: PlayerId) -> Result<PlayerSnapshot, StoreError> {
        self.players
            .get(&id)
            .cloned()
            .ok_or(StoreError::PlayerNotFound(id))
    }

    fn insert_player(&mut self, id: PlayerId, player: &PlayerProgress) -> Result<u64, StoreError> {
        validate_player(player)?;
        if self.players.contains_key(&id) {
            return Err(StoreError::PlayerExists(id));
        }
        let snapshot = PlayerSnapshot {
            player: player.clone(),
            version: 1,
        };
        self.players.insert(id, snapshot);
        debug!(?id, "player inserted");
        Ok(1)
    }

    fn save_player_if(
        &mut self,
        id: PlayerId,
        expected_version: u64,
        player: &PlayerProgress,
    ) -> Result<u64, StoreError> {
        validate_player(player)?;
        let stored = self
            .players
            .get_mut(&id)
            .ok_or(StoreError::PlayerNotFound(id))?;
        if stored.version != expected_version {
            warn!(
                ?id,
                expected = expected_version,
                actual = stored.version,
                "stale player snapshot rejected"
            );
            return Err(StoreError::Conflict {
                player: id,
                expected: expected_version,
                actual: stored.version,
            });
        }
        stored.player = player.clone();
        stored.version += 1;
        Ok(stored.version)
    }
}

impl BuildingRepository for MemoryStore {
    fn list_buildings(
        &self,
        player: PlayerId,
        now: EpochMillis,
    ) -> Result<Vec<Building>, StoreError> {
        Ok(self
            .cave(player)?
            .iter()
            .map(|b| b.reconciled(now))
            .collect())
    }

    fn get_building(&self, player: PlayerId, id: BuildingId) -> Result<Building, StoreError> {
        self.cave(player)?
            .into_iter()
            .find(|b| b.id == id)
            .ok_or(StoreError::BuildingNotFound {
                player,
                building: id,
            })
    }

    fn insert_building(
        &mut self,
        player: PlayerId,
        building: &Building,
    ) -> Result<Building, StoreError> {
        let mut cave = self.cave(player)?;
        let mut stored = building.clone();
        stored.id = BuildingId(self.next_building_id + 1);
        cave.push(stored.clone());
        self.write_cave(player, &cave)?;
        self.next_building_id += 1;
        debug!(?player, id = ?stored.id, kind = ?stored.kind, "building inserted");
        Ok(stored)
    }

    fn update_building(&mut self, player: PlayerId, building: &Building) -> Result<(), StoreError> {
        let mut cave = self.cave(player)?;
        let slot = cave
            .iter_mut()
            .find(|b| b.id == building.id)
            .ok_or(StoreError::BuildingNotFound {
                player,
                building: building.id,
            })?;
        *slot = building.clone();
        self.write_cave(player, &cave)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cultivation_core::{
        BuildingStatus, BuildingType, Rank, SpiritRootTier, ValidationError, MILLIS_PER_MINUTE,
    };
    use proptest::prelude::*;

    const ALICE: PlayerId = PlayerId(1);

    fn store_with_player() -> MemoryStore {
        let mut store = MemoryStore::new();
        store
            .insert_player(ALICE, &PlayerProgress::new(SpiritRootTier::Ordinary, 0))
            .unwrap();
        store
    }

    fn under_construction(kind: BuildingType, position: u8) -> Building {
        Building {
            id: BuildingId::default(),
            kind,
            level: 1,
            position,
            status: BuildingStatus::Building,
            build_start_at: 0,
            build_end_at: 5 * MILLIS_PER_MINUTE,
        }
    }

    #[test]
    fn player_roundtrip_and_duplicate_insert() {
        let mut store = store_with_player();
        let snap = store.load_player(ALICE).unwrap();
        assert_eq!(snap.version, 1);
        let p = snap.player;
        assert_eq!(p.spirit_stones, 100);
        assert!(matches!(
            store.insert_player(ALICE, &p),
            Err(StoreError::PlayerExists(ALICE))
        ));
        assert!(matches!(
            store.load_player(PlayerId(9)),
            Err(StoreError::PlayerNotFound(PlayerId(9)))
        ));
    }

    #[test]
    fn second_settle_of_same_window_conflicts() {
        let mut store = store_with_player();
        let loaded = store.load_player(ALICE).unwrap();

        let mut first = loaded.player.clone();
        first.qi = 60;
        first.last_settled_at = 120 * MILLIS_PER_MINUTE;
        let mut second = loaded.player.clone();
        second.qi = 60;
        second.last_settled_at = 121 * MILLIS_PER_MINUTE;

        assert_eq!(store.save_player_if(ALICE, loaded.version, &first).unwrap(), 2);
        let err = store
            .save_player_if(ALICE, loaded.version, &second)
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::Conflict {
                expected: 1,
                actual: 2,
                ..
            }
        ));
        assert_eq!(store.load_player(ALICE).unwrap().player, first);
    }

    #[test]
    fn stale_settle_cannot_undo_a_committed_breakthrough() {
        let mut store = MemoryStore::new();
        let mut start = PlayerProgress::new(SpiritRootTier::Ordinary, 0);
        start.qi = 90;
        store.insert_player(ALICE, &start).unwrap();

        let for_breakthrough = store.load_player(ALICE).unwrap();
        let for_settle = store.load_player(ALICE).unwrap();

        // The breakthrough leaves last_settled_at alone.
        let mut advanced = for_breakthrough.player.clone();
        advanced.rank = Rank::FoundationEstablishment;
        advanced.qi = 0;
        advanced.max_qi = 200;
        advanced.spirit_stones = 25;
        store
            .save_player_if(ALICE, for_breakthrough.version, &advanced)
            .unwrap();

        let mut settled = for_settle.player.clone();
        settled.qi = 150;
        settled.last_settled_at = 120 * MILLIS_PER_MINUTE;
        assert!(matches!(
            store.save_player_if(ALICE, for_settle.version, &settled),
            Err(StoreError::Conflict { .. })
        ));

        let stored = store.load_player(ALICE).unwrap().player;
        assert_eq!(stored.rank, Rank::FoundationEstablishment);
        assert_eq!(stored.spirit_stones, 25);
        assert_eq!(stored.qi, 0);
    }

    #[test]
    fn invalid_player_is_refused() {
        let mut store = store_with_player();
        let mut p = store.load_player(ALICE).unwrap().player;
        p.max_qi = 0;
        assert!(matches!(
            store.save_player_if(ALICE, 1, &p),
            Err(StoreError::Invalid(ValidationError::ZeroMaxQi))
        ));
        assert_eq!(store.load_player(ALICE).unwrap().version, 1);
    }

    #[test]
    fn buildings_get_ids_and_reconcile_on_read() {
        let mut store = store_with_player();
        let a = store
            .insert_building(ALICE, &under_construction(BuildingType::SpiritGatheringArray, 0))
            .unwrap();
        let b = store
            .insert_building(ALICE, &under_construction(BuildingType::SpiritStoneVault, 1))
            .unwrap();
        assert_eq!(a.id, BuildingId(1));
        assert_eq!(b.id, BuildingId(2));

        let early = store.list_buildings(ALICE, MILLIS_PER_MINUTE).unwrap();
        assert!(early.iter().all(|b| b.status == BuildingStatus::Building));
        let late = store.list_buildings(ALICE, 5 * MILLIS_PER_MINUTE).unwrap();
        assert!(late.iter().all(|b| b.status == BuildingStatus::Active));

        // The stored record is untouched by reads.
        assert_eq!(
            store.get_building(ALICE, a.id).unwrap().status,
            BuildingStatus::Building
        );
    }

    #[test]
    fn duplicate_type_is_rejected_and_ids_not_consumed() {
        let mut store = store_with_player();
        store
            .insert_building(ALICE, &under_construction(BuildingType::SpiritGatheringArray, 0))
            .unwrap();
        let dup = store.insert_building(ALICE, &under_construction(BuildingType::SpiritGatheringArray, 1));
        assert!(matches!(
            dup,
            Err(StoreError::Invalid(ValidationError::DuplicateBuilding(_)))
        ));
        let next = store
            .insert_building(ALICE, &under_construction(BuildingType::MeditationChamber, 1))
            .unwrap();
        assert_eq!(next.id, BuildingId(2));
    }

    #[test]
    fn update_replaces_by_id() {
        let mut store = store_with_player();
        let mut a = store
            .insert_building(ALICE, &under_construction(BuildingType::SpiritGatheringArray, 0))
            .unwrap();
        a.level = 2;
        a.status = BuildingStatus::Upgrading;
        store.update_building(ALICE, &a).unwrap();
        assert_eq!(store.get_building(ALICE, a.id).unwrap().level, 2);

        let ghost = Building {
            id: BuildingId(77),
            ..a
        };
        assert!(matches!(
            store.update_building(ALICE, &ghost),
            Err(StoreError::BuildingNotFound { .. })
        ));
    }

    #[test]
    fn buildings_need_a_player() {
        let store = MemoryStore::new();
        assert!(matches!(
            store.list_buildings(ALICE, 0),
            Err(StoreError::PlayerNotFound(ALICE))
        ));
    }

    proptest! {
        #[test]
        fn only_the_current_version_wins(expected in proptest::collection::vec(0u64..12, 1..20)) {
            let mut store = store_with_player();
            for version in expected {
                let current = store.load_player(ALICE).unwrap();
                let mut next = current.player.clone();
                next.qi += 1;
                let result = store.save_player_if(ALICE, version, &next);
                prop_assert_eq!(result.is_ok(), version == current.version);
                let after = store.load_player(ALICE).unwrap();
                if version == current.version {
                    prop_assert_eq!(after.version, current.version + 1);
                    prop_assert_eq!(after.player, next);
                } else {
                    prop_assert_eq!(after, current);
                }
            }
        }
    }
}
