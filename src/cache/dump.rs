// src/cache/dump.rs
//! Загрузка декодированного дампа кэша с диска
//!
//! Ожидаемая структура каталога:
//! ```text
//! cache/
//!   objects.json              [{"id": 1, "mapAreaId": -1}, ...]
//!   areas.json                [{"id": 7, "spriteId": 1452}, ...]
//!   regions/50_50.json        {"regionX": 50, "regionY": 50, "key": [..], "tiles": [[null, 4473890, ...]], "locations": [...]}
//!   sprites/1452.png          кадр 0; прочие кадры — 1452_3.png
//!   worldmap/details/0.json   остальные каталоги: {индекс}/{архив}/{file_id}.json
//! ```
//!
//! Координаты региона должны лежать в `0..=255`: иначе id двух регионов
//! совпадут и один молча заменит другой.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info};

use crate::cache::{
    AreaDefinition, MemoryStore, ObjectDefinition, Region, RegionId, SpriteDefinition, XteaKey,
};
use crate::error::{ExportError, Result};

const REGIONS_DIR: &str = "regions";
const SPRITES_DIR: &str = "sprites";

#[derive(Deserialize)]
struct RegionRecord {
    #[serde(flatten)]
    region: Region,
    #[serde(default)]
    key: Option<XteaKey>,
}

struct DumpReader<'a> {
    root: &'a Path,
}

impl DumpReader<'_> {
    fn error(&self, reason: String) -> ExportError {
        ExportError::StoreAccess {
            path: self.root.to_path_buf(),
            reason,
        }
    }

    fn read(&self, path: &Path) -> Result<Vec<u8>> {
        fs::read(path).map_err(|e| self.error(format!("{}: {e}", path.display())))
    }

    fn read_json<T: DeserializeOwned>(&self, path: &Path) -> Result<T> {
        let bytes = self.read(path)?;
        serde_json::from_slice(&bytes).map_err(|e| self.error(format!("{}: {e}", path.display())))
    }

    /// Содержимое каталога, отсортированное по имени
    fn list(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        let entries = fs::read_dir(dir).map_err(|e| self.error(format!("{}: {e}", dir.display())))?;
        let mut paths = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| self.error(format!("{}: {e}", dir.display())))?;
            paths.push(entry.path());
        }
        paths.sort();
        Ok(paths)
    }
}

fn file_stem(path: &Path) -> Option<&str> {
    path.file_stem().and_then(|s| s.to_str())
}

/// Разбирает имя спрайта: `1452` → (1452, 0), `1452_3` → (1452, 3)
fn parse_sprite_name(stem: &str) -> Option<(u32, u32)> {
    match stem.split_once('_') {
        Some((id, frame)) => Some((id.parse().ok()?, frame.parse().ok()?)),
        None => Some((stem.parse().ok()?, 0)),
    }
}

/// Открывает дамп кэша и загружает его целиком в память
pub fn open_store(path: impl AsRef<Path>) -> Result<MemoryStore> {
    let root = path.as_ref();
    let reader = DumpReader { root };
    if !root.is_dir() {
        return Err(reader.error("not a directory".to_string()));
    }

    let mut store = MemoryStore::with_root(root);

    let objects: Vec<ObjectDefinition> = reader.read_json(&root.join("objects.json"))?;
    let areas: Vec<AreaDefinition> = reader.read_json(&root.join("areas.json"))?;
    debug!(objects = objects.len(), areas = areas.len(), "определения загружены");
    for object in objects {
        store.insert_object(object);
    }
    for area in areas {
        store.insert_area(area);
    }

    let mut seen = BTreeSet::new();
    for path in reader.list(&root.join(REGIONS_DIR))? {
        if path.extension().is_none_or(|ext| ext != "json") {
            continue;
        }
        let record: RegionRecord = reader.read_json(&path)?;
        let (x, y) = (record.region.region_x, record.region.region_y);
        let Some(id) = RegionId::checked_from_grid(x, y) else {
            return Err(reader.error(format!(
                "{}: region ({x}, {y}) is outside the 0..=255 grid",
                path.display()
            )));
        };
        if !seen.insert(id) {
            return Err(reader.error(format!("{}: duplicate region {id}", path.display())));
        }
        store.insert_region(record.region, record.key);
    }
    let region_count = seen.len();

    let sprites_dir = root.join(SPRITES_DIR);
    if sprites_dir.is_dir() {
        for path in reader.list(&sprites_dir)? {
            let Some((id, frame)) = file_stem(&path).and_then(parse_sprite_name) else {
                continue;
            };
            let image = image::open(&path)
                .map_err(|e| reader.error(format!("{}: {e}", path.display())))?
                .to_rgba8();
            store.insert_sprite(SpriteDefinition { id, frame, image });
        }
    }

    // Всё остальное — архивы вида {индекс}/{архив}/{file_id}.json
    for index_dir in reader.list(root)? {
        let Some(index) = index_dir.file_name().and_then(|s| s.to_str()) else {
            continue;
        };
        if !index_dir.is_dir() || index == REGIONS_DIR || index == SPRITES_DIR {
            continue;
        }
        for archive_dir in reader.list(&index_dir)? {
            let Some(archive) = archive_dir.file_name().and_then(|s| s.to_str()) else {
                continue;
            };
            if !archive_dir.is_dir() {
                continue;
            }
            for file in reader.list(&archive_dir)? {
                let Some(file_id) = file_stem(&file).and_then(|s| s.parse::<u32>().ok()) else {
                    continue;
                };
                let bytes = reader.read(&file)?;
                store.insert_archive_file(index, archive, file_id, bytes);
            }
        }
    }

    info!(path = %root.display(), regions = region_count, "дамп кэша загружен");
    Ok(store)
}
