// src/worldmap.rs
//! Метаданные страниц карты мира
//!
//! Индекс карты мира содержит два под-архива с общими id файлов:
//! - `details` — название страницы и её якорная позиция
//! - `compositemap` — из каких квадратов и зон страница собрана
//!
//! Для каждого id из `details` обе записи склеиваются в одну [`WorldMapEntry`].
//! Запись `details` без пары в `compositemap` — нарушение целостности
//! исходных данных и фатальная ошибка.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::debug;

use crate::cache::{
    COMPOSITE_ARCHIVE, CacheSource, DETAILS_ARCHIVE, MapSquareDefinition, Position,
    WORLDMAP_INDEX, ZoneDefinition,
};
use crate::error::{ExportError, Result};

/// Элемент `wikiWorldMapDefinitions.json`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorldMapEntry {
    pub id: u32,
    pub name: String,
    pub position: Position,
    pub map_square_definitions: Vec<MapSquareDefinition>,
    pub zone_definitions: Vec<ZoneDefinition>,
}

/// Собирает страницы карты мира по возрастанию id
pub fn assemble<S: CacheSource + ?Sized>(source: &S) -> Result<Vec<WorldMapEntry>> {
    let details = source.load_archive_files(WORLDMAP_INDEX, DETAILS_ARCHIVE)?;
    let composites: BTreeMap<u32, Vec<u8>> = source
        .load_archive_files(WORLDMAP_INDEX, COMPOSITE_ARCHIVE)?
        .into_iter()
        .collect();

    let mut entries = Vec::with_capacity(details.len());
    for (map_id, bytes) in details {
        let detail = source.decode_world_map_detail(&bytes, map_id)?;
        let composite_bytes = composites
            .get(&map_id)
            .ok_or(ExportError::MissingComposite { map_id })?;
        let composite = source.decode_world_map_composite(composite_bytes)?;

        debug!(
            map_id,
            name = %detail.name,
            squares = composite.map_square_definitions.len(),
            zones = composite.zone_definitions.len(),
            "страница карты мира"
        );
        entries.push(WorldMapEntry {
            id: map_id,
            name: detail.name,
            position: detail.position,
            map_square_definitions: composite.map_square_definitions,
            zone_definitions: composite.zone_definitions,
        });
    }

    entries.sort_by_key(|e| e.id);
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryStore;

    const SQUARE: &str = r#"{"minLevel": 0, "levels": 4, "sourceSquareX": 50, "sourceSquareZ": 50,
        "displaySquareX": 50, "displaySquareZ": 50, "groupId": 0, "fileId": -1}"#;
    const ZONE: &str = r#"{"minLevel": 1, "levels": 1, "sourceSquareX": 50, "sourceSquareZ": 51,
        "displaySquareX": 40, "displaySquareZ": 41, "sourceZoneX": 2, "sourceZoneZ": 3,
        "displayZoneX": 4, "displayZoneZ": 5, "groupId": 1, "fileId": -1}"#;

    fn detail(name: &str) -> Vec<u8> {
        format!(r#"{{"name": "{name}", "position": {{"x": 3200, "y": 3200, "plane": 0}}}}"#)
            .into_bytes()
    }

    fn store() -> MemoryStore {
        let mut store = MemoryStore::new();
        for (id, name) in [(3, "Ancient Cavern"), (0, "Gielinor Surface")] {
            store.insert_archive_file(WORLDMAP_INDEX, DETAILS_ARCHIVE, id, detail(name));
        }
        store.insert_archive_file(
            WORLDMAP_INDEX,
            COMPOSITE_ARCHIVE,
            0,
            format!(r#"{{"mapSquareDefinitions": [{SQUARE}], "zoneDefinitions": [{ZONE}]}}"#)
                .into_bytes(),
        );
        store.insert_archive_file(
            WORLDMAP_INDEX,
            COMPOSITE_ARCHIVE,
            3,
            format!(r#"{{"mapSquareDefinitions": [{SQUARE}, {SQUARE}]}}"#).into_bytes(),
        );
        store
    }

    #[test]
    fn joins_details_with_composites_by_id() {
        let entries = assemble(&store()).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].id, 0);
        assert_eq!(entries[0].name, "Gielinor Surface");
        assert_eq!(entries[0].map_square_definitions.len(), 1);
        assert_eq!(entries[0].zone_definitions[0].source_zone_z, 3);
        assert_eq!(entries[1].id, 3);
        assert_eq!(entries[1].map_square_definitions.len(), 2);
        assert!(entries[1].zone_definitions.is_empty());
    }

    #[test]
    fn detail_without_composite_is_fatal() {
        let mut store = store();
        store.insert_archive_file(WORLDMAP_INDEX, DETAILS_ARCHIVE, 9, detail("Orphan"));
        assert!(matches!(
            assemble(&store),
            Err(ExportError::MissingComposite { map_id: 9 })
        ));
    }

    #[test]
    fn entry_shape() {
        let entries = assemble(&store()).unwrap();
        let json = serde_json::to_value(&entries[1]).unwrap();
        let keys: Vec<_> = json.as_object().unwrap().keys().cloned().collect();
        assert_eq!(keys.len(), 5);
        assert_eq!(json["id"], 3);
        assert_eq!(json["position"]["plane"], 0);
        assert_eq!(json["mapSquareDefinitions"][0]["sourceSquareZ"], 50);
        assert_eq!(json["zoneDefinitions"], serde_json::json!([]));
    }
}
