// src/cache/mod.rs
//! Слой доступа к кэшу игры
//!
//! Конвейер экспорта не знает ничего о бинарном формате архива: он работает
//! только через трейт [`CacheSource`]. Здесь же описаны декодированные записи,
//! которые этот слой отдаёт наружу:
//! - регионы 64×64 тайла с цветами по плоскостям и списком размещений объектов
//! - определения объектов, областей и спрайтов
//! - файлы архивов карты мира (details / compositemap)
//!
//! Реализация по умолчанию — [`MemoryStore`], загружаемый из каталога
//! с декодированным дампом через [`open_store`].

pub mod dump;
pub mod memory;
mod paint;

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::Path;

use image::RgbaImage;
use serde::{Deserialize, Deserializer, Serialize};

use crate::config::RenderOptions;
use crate::error::{ExportError, Result};

pub use dump::open_store;
pub use memory::MemoryStore;

/// Сторона региона в тайлах
pub const REGION_SIZE: i32 = 64;

/// Количество плоскостей (уровней высоты)
pub const PLANE_COUNT: u8 = 4;

/// Имя индекса карты мира и его под-архивов
pub const WORLDMAP_INDEX: &str = "worldmap";
pub const DETAILS_ARCHIVE: &str = "details";
pub const COMPOSITE_ARCHIVE: &str = "compositemap";

/// 128-битный ключ региона (четыре слова XTEA)
pub type XteaKey = [i32; 4];

/// Идентификатор региона: `(x << 8) | y`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RegionId(pub u32);

impl RegionId {
    #[must_use]
    pub fn from_grid(region_x: i32, region_y: i32) -> Self {
        Self(((region_x as u32) << 8) | (region_y as u32 & 0xFF))
    }

    /// `None`, если какая-то из координат не помещается в байт
    #[must_use]
    pub fn checked_from_grid(region_x: i32, region_y: i32) -> Option<Self> {
        let x = u8::try_from(region_x).ok()?;
        let y = u8::try_from(region_y).ok()?;
        Some(Self((u32::from(x) << 8) | u32::from(y)))
    }

    #[must_use]
    pub fn region_x(self) -> i32 {
        (self.0 >> 8) as i32
    }

    #[must_use]
    pub fn region_y(self) -> i32 {
        (self.0 & 0xFF) as i32
    }
}

impl fmt::Display for RegionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.region_x(), self.region_y())
    }
}

/// Мировая позиция в тайлах
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position {
    pub x: i32,
    pub y: i32,
    #[serde(alias = "z")]
    pub plane: u8,
}

impl Position {
    #[must_use]
    pub fn new(x: i32, y: i32, plane: u8) -> Self {
        Self { x, y, plane }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.plane)
    }
}

/// Размещение объекта в регионе
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    /// Ссылка на определение объекта
    pub id: u32,
    #[serde(rename = "type", default)]
    pub kind: u8,
    #[serde(default)]
    pub orientation: u8,
    pub position: Position,
}

/// Декодированный регион
///
/// `tiles[plane]` — 64×64 RGB-цвета (`0xRRGGBB`), индекс `y * 64 + x`,
/// `y = 0` — южный край. `None` (`null` в дампе) — тайла нет.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Region {
    pub region_x: i32,
    pub region_y: i32,
    #[serde(default)]
    pub tiles: Vec<Vec<Option<u32>>>,
    #[serde(default)]
    pub locations: Vec<Location>,
}

impl Region {
    #[must_use]
    pub fn new(region_x: i32, region_y: i32) -> Self {
        let mut region = Self {
            region_x,
            region_y,
            tiles: Vec::new(),
            locations: Vec::new(),
        };
        region.normalize();
        region
    }

    /// Доводит сетку тайлов до 4 плоскостей по 4096 значений
    pub fn normalize(&mut self) {
        let cells = (REGION_SIZE * REGION_SIZE) as usize;
        self.tiles.resize_with(PLANE_COUNT as usize, Vec::new);
        for plane in &mut self.tiles {
            plane.resize(cells, None);
        }
    }

    #[must_use]
    pub fn id(&self) -> RegionId {
        RegionId::from_grid(self.region_x, self.region_y)
    }

    /// Мировая координата X юго-западного тайла
    #[must_use]
    pub fn base_x(&self) -> i32 {
        self.region_x * REGION_SIZE
    }

    #[must_use]
    pub fn base_y(&self) -> i32 {
        self.region_y * REGION_SIZE
    }

    #[must_use]
    pub fn tile_color(&self, plane: u8, x: i32, y: i32) -> Option<u32> {
        self.tiles
            .get(plane as usize)
            .and_then(|tiles| tiles.get((y * REGION_SIZE + x) as usize))
            .copied()
            .flatten()
    }

    pub fn set_tile_color(&mut self, plane: u8, x: i32, y: i32, color: u32) {
        self.normalize();
        self.tiles[plane as usize][(y * REGION_SIZE + x) as usize] = Some(color);
    }

    /// Регион виден на плоскости, если на ней есть хотя бы один тайл
    #[must_use]
    pub fn is_visible(&self, plane: u8) -> bool {
        self.tiles
            .get(plane as usize)
            .is_some_and(|tiles| tiles.iter().any(Option::is_some))
    }
}

/// Определение объекта
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectDefinition {
    pub id: u32,
    #[serde(default)]
    pub name: String,
    /// Область карты, к которой привязан объект; `None` — объект без иконки
    #[serde(default, deserialize_with = "area_reference")]
    pub map_area_id: Option<u32>,
}

/// В сыром кэше отсутствие области кодируется как `-1`
fn area_reference<'de, D>(deserializer: D) -> std::result::Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<i64>::deserialize(deserializer)?;
    Ok(raw.and_then(|id| u32::try_from(id).ok()))
}

/// Определение области карты
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AreaDefinition {
    pub id: u32,
    pub sprite_id: u32,
    #[serde(default)]
    pub name: Option<String>,
}

/// Кадр спрайта
#[derive(Debug, Clone)]
pub struct SpriteDefinition {
    pub id: u32,
    pub frame: u32,
    pub image: RgbaImage,
}

/// Спрайты, сгруппированные по id
#[derive(Debug, Clone, Default)]
pub struct SpriteIndex {
    sprites: HashMap<u32, Vec<SpriteDefinition>>,
}

impl SpriteIndex {
    pub fn insert(&mut self, sprite: SpriteDefinition) {
        let frames = self.sprites.entry(sprite.id).or_default();
        frames.retain(|f| f.frame != sprite.frame);
        frames.push(sprite);
    }

    #[must_use]
    pub fn find(&self, id: u32, frame: u32) -> Option<&SpriteDefinition> {
        self.sprites
            .get(&id)
            .and_then(|frames| frames.iter().find(|f| f.frame == frame))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.sprites.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sprites.is_empty()
    }
}

/// Запись "details" карты мира
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorldMapDetail {
    #[serde(skip)]
    pub file_id: u32,
    pub name: String,
    #[serde(default)]
    pub internal_name: Option<String>,
    pub position: Position,
}

/// Квадрат (регион), перенесённый на страницу карты мира
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MapSquareDefinition {
    pub min_level: u8,
    pub levels: u8,
    pub source_square_x: i32,
    pub source_square_z: i32,
    pub display_square_x: i32,
    pub display_square_z: i32,
    pub group_id: i32,
    pub file_id: i32,
}

/// Зона 8×8 тайлов, перенесённая на страницу карты мира
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ZoneDefinition {
    pub min_level: u8,
    pub levels: u8,
    pub source_square_x: i32,
    pub source_square_z: i32,
    pub display_square_x: i32,
    pub display_square_z: i32,
    pub source_zone_x: i32,
    pub source_zone_z: i32,
    pub display_zone_x: i32,
    pub display_zone_z: i32,
    pub group_id: i32,
    pub file_id: i32,
}

/// Запись "compositemap" карты мира
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorldMapComposite {
    #[serde(default)]
    pub map_square_definitions: Vec<MapSquareDefinition>,
    #[serde(default)]
    pub zone_definitions: Vec<ZoneDefinition>,
}

/// Таблица ключей регионов
#[derive(Debug, Clone, Default)]
pub struct KeyTable {
    keys: HashMap<RegionId, XteaKey>,
}

#[derive(Deserialize)]
struct KeyEntry {
    #[serde(alias = "region")]
    mapsquare: u32,
    #[serde(alias = "keys")]
    key: XteaKey,
}

impl KeyTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Загружает ключи из JSON-файла вида `[{"mapsquare": 12850, "key": [..4]}]`
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let key_file_error = |reason: String| ExportError::KeyFile {
            path: path.to_path_buf(),
            reason,
        };
        let contents = fs::read(path).map_err(|e| key_file_error(e.to_string()))?;
        let entries: Vec<KeyEntry> =
            serde_json::from_slice(&contents).map_err(|e| key_file_error(e.to_string()))?;

        let mut table = Self::new();
        for entry in entries {
            table.insert(RegionId(entry.mapsquare), entry.key);
        }
        Ok(table)
    }

    pub fn insert(&mut self, region: RegionId, key: XteaKey) {
        self.keys.insert(region, key);
    }

    #[must_use]
    pub fn get(&self, region: RegionId) -> Option<&XteaKey> {
        self.keys.get(&region)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

/// Узкий интерфейс к хранилищу кэша, которым пользуется конвейер
///
/// Хранилище после загрузки только читается, поэтому трейт требует `Sync`:
/// тайлы разных регионов могут рендериться параллельно.
pub trait CacheSource: Sync {
    /// Все регионы хранилища в порядке возрастания id
    fn list_regions(&self) -> Vec<RegionId>;

    /// Расшифровывает и декодирует регион.
    /// Неподходящий ключ — [`ExportError::Decryption`].
    fn load_region(&self, id: RegionId, key: &XteaKey) -> Result<Region>;

    fn object_definitions(&self) -> Result<HashMap<u32, ObjectDefinition>>;

    fn area_definitions(&self) -> Result<HashMap<u32, AreaDefinition>>;

    fn sprite_definitions(&self) -> Result<SpriteIndex>;

    /// Рисует один регион на плоскости: 4 пикселя на тайл, 256×256
    fn render_region_tile(
        &self,
        region: &Region,
        plane: u8,
        options: &RenderOptions,
    ) -> Result<RgbaImage>;

    /// Файлы под-архива `archive` индекса `index` как пары `(file_id, bytes)`
    fn load_archive_files(&self, index: &str, archive: &str) -> Result<Vec<(u32, Vec<u8>)>>;

    fn decode_world_map_detail(&self, bytes: &[u8], file_id: u32) -> Result<WorldMapDetail>;

    fn decode_world_map_composite(&self, bytes: &[u8]) -> Result<WorldMapComposite>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn region_id_packs_grid_coordinates() {
        let id = RegionId::from_grid(50, 51);
        assert_eq!(id.0, 12851);
        assert_eq!(id.region_x(), 50);
        assert_eq!(id.region_y(), 51);
        assert_eq!(id.to_string(), "50_51");
    }

    #[test]
    fn negative_area_id_becomes_absent() {
        let defs: Vec<ObjectDefinition> = serde_json::from_str(
            r#"[{"id": 1, "mapAreaId": -1}, {"id": 2, "mapAreaId": 7}, {"id": 3}]"#,
        )
        .unwrap();
        assert_eq!(defs[0].map_area_id, None);
        assert_eq!(defs[1].map_area_id, Some(7));
        assert_eq!(defs[2].map_area_id, None);
    }

    #[test]
    fn region_is_visible_only_on_painted_planes() {
        let mut region = Region::new(50, 50);
        region.set_tile_color(1, 3, 4, 0x00FF_0000);
        assert!(!region.is_visible(0));
        assert!(region.is_visible(1));
        assert_eq!(region.tile_color(1, 3, 4), Some(0x00FF_0000));
        assert_eq!(region.tile_color(1, 4, 4), None);
    }

    #[test]
    fn black_tile_is_still_a_tile() {
        let mut region = Region::new(50, 50);
        region.set_tile_color(2, 0, 0, 0);
        assert!(region.is_visible(2));
        assert_eq!(region.tile_color(2, 0, 0), Some(0));
    }

    #[test]
    fn empty_tiles_are_null_in_region_records() {
        let region: Region = serde_json::from_str(
            r#"{"regionX": 50, "regionY": 50, "tiles": [[null, 0, 1193046]]}"#,
        )
        .unwrap();
        assert_eq!(region.tiles[0][0], None);
        assert_eq!(region.tiles[0][1], Some(0));
        assert_eq!(region.tiles[0][2], Some(0x0012_3456));
    }

    #[test]
    fn checked_region_id_rejects_coordinates_outside_a_byte() {
        assert_eq!(RegionId::checked_from_grid(50, 51), Some(RegionId::from_grid(50, 51)));
        assert_eq!(RegionId::checked_from_grid(255, 0), Some(RegionId(0xFF00)));
        assert_eq!(RegionId::checked_from_grid(50, 256), None);
        assert_eq!(RegionId::checked_from_grid(-1, 50), None);
        assert_eq!(RegionId::checked_from_grid(256, 50), None);
    }

    #[test]
    fn key_table_accepts_both_field_spellings() {
        let dir = std::env::temp_dir().join(format!("mapexport-keys-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("xteas.json");
        fs::write(
            &path,
            r#"[{"mapsquare": 12850, "key": [1, 2, 3, 4]}, {"region": 12851, "keys": [5, 6, 7, 8]}]"#,
        )
        .unwrap();

        let table = KeyTable::load(&path).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.get(RegionId(12851)), Some(&[5, 6, 7, 8]));

        fs::write(&path, "{not json").unwrap();
        assert!(matches!(
            KeyTable::load(&path),
            Err(ExportError::KeyFile { .. })
        ));
        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn missing_key_file_is_a_key_file_error() {
        let result = KeyTable::load("/nonexistent/mapexport/xteas.json");
        assert!(matches!(result, Err(ExportError::KeyFile { .. })));
    }
}
