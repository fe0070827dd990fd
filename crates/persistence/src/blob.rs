//! JSON encoding of a cave's buildings.
//!
//! The external store keeps all of a player's buildings in one text column.
//! Decoding validates the whole cave so malformed rows never reach the engine.

use cultivation_core::{validate_cave, Building};
use serde::{Deserialize, Serialize};

use crate::StoreError;

pub const CAVE_SCHEMA_VERSION: u32 = 1;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaveBlob {
    pub schema_version: u32,
    pub buildings: Vec<Building>,
}

pub fn encode_cave(buildings: &[Building]) -> Result<String, StoreError> {
    validate_cave(buildings)?;
    let blob = CaveBlob {
        schema_version: CAVE_SCHEMA_VERSION,
        buildings: buildings.to_vec(),
    };
    Ok(serde_json::to_string(&blob)?)
}

pub fn decode_cave(json: &str) -> Result<Vec<Building>, StoreError> {
    let blob: CaveBlob = serde_json::from_str(json)?;
    if blob.schema_version != CAVE_SCHEMA_VERSION {
        return Err(StoreError::UnsupportedSchema {
            found: blob.schema_version,
            expected: CAVE_SCHEMA_VERSION,
        });
    }
    validate_cave(&blob.buildings)?;
    Ok(blob.buildings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cultivation_core::{BuildingId, BuildingStatus, BuildingType, ValidationError};

    fn array(position: u8) -> Building {
        Building {
            id: BuildingId(1),
            kind: BuildingType::SpiritGatheringArray,
            level: 2,
            position,
            status: BuildingStatus::Active,
            build_start_at: 0,
            build_end_at: 60_000,
        }
    }

    #[test]
    fn cave_survives_the_codec() {
        let json = encode_cave(&[array(0)]).unwrap();
        assert!(json.contains("\"schema_version\":1"));
        assert!(json.contains("\"ACTIVE\""));
        assert_eq!(decode_cave(&json).unwrap(), vec![array(0)]);
    }

    #[test]
    fn empty_cave_is_valid() {
        let json = encode_cave(&[]).unwrap();
        assert!(decode_cave(&json).unwrap().is_empty());
    }

    #[test]
    fn garbage_is_a_codec_error() {
        assert!(matches!(decode_cave("{not json"), Err(StoreError::Codec(_))));
    }

    #[test]
    fn future_schema_is_rejected() {
        let json = r#"{"schema_version":2,"buildings":[]}"#;
        assert!(matches!(
            decode_cave(json),
            Err(StoreError::UnsupportedSchema { found: 2, expected: 1 })
        ));
    }

    #[test]
    fn transient_status_is_rejected_on_decode() {
        let mut b = array(0);
        b.status = BuildingStatus::Available;
        let json = serde_json::to_string(&CaveBlob {
            schema_version: CAVE_SCHEMA_VERSION,
            buildings: vec![b],
        })
        .unwrap();
        assert!(matches!(
            decode_cave(&json),
            Err(StoreError::Invalid(ValidationError::TransientStatus(
                BuildingStatus::Available
            )))
        ));
    }

    #[test]
    fn inverted_window_is_rejected_on_encode() {
        let mut b = array(0);
        b.build_start_at = 10;
        b.build_end_at = 5;
        assert!(matches!(
            encode_cave(&[b]),
            Err(StoreError::Invalid(ValidationError::InvertedBuildWindow { .. }))
        ));
    }
}
