// src/cache/memory.rs
//! Хранилище кэша в памяти
//!
//! Все записи декодируются один раз при загрузке и дальше только читаются.
//! Данные региона "запечатаны" ключом: [`MemoryStore::load_region`] отдаёт
//! регион только при совпадении ключа, иначе возвращает `Decryption`.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use image::RgbaImage;

use crate::cache::paint::paint_region;
use crate::cache::{
    AreaDefinition, CacheSource, ObjectDefinition, Region, RegionId, SpriteDefinition,
    SpriteIndex, WorldMapComposite, WorldMapDetail, XteaKey,
};
use crate::config::RenderOptions;
use crate::error::{ExportError, Result};

#[derive(Debug, Clone)]
struct SealedRegion {
    region: Region,
    key: Option<XteaKey>,
}

#[derive(Debug, Clone)]
pub struct MemoryStore {
    root: PathBuf,
    regions: BTreeMap<RegionId, SealedRegion>,
    objects: HashMap<u32, ObjectDefinition>,
    areas: HashMap<u32, AreaDefinition>,
    sprites: SpriteIndex,
    archives: BTreeMap<(String, String), BTreeMap<u32, Vec<u8>>>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::with_root("<memory>")
    }

    /// Пустое хранилище, привязанное к каталогу (для сообщений об ошибках)
    #[must_use]
    pub fn with_root(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            regions: BTreeMap::new(),
            objects: HashMap::new(),
            areas: HashMap::new(),
            sprites: SpriteIndex::default(),
            archives: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Добавляет регион. `key = None` — данные не зашифрованы, подойдёт любой ключ.
    pub fn insert_region(&mut self, mut region: Region, key: Option<XteaKey>) {
        region.normalize();
        self.regions
            .insert(region.id(), SealedRegion { region, key });
    }

    pub fn insert_object(&mut self, definition: ObjectDefinition) {
        self.objects.insert(definition.id, definition);
    }

    pub fn insert_area(&mut self, definition: AreaDefinition) {
        self.areas.insert(definition.id, definition);
    }

    pub fn insert_sprite(&mut self, sprite: SpriteDefinition) {
        self.sprites.insert(sprite);
    }

    pub fn insert_archive_file(&mut self, index: &str, archive: &str, file_id: u32, bytes: Vec<u8>) {
        self.archives
            .entry((index.to_string(), archive.to_string()))
            .or_default()
            .insert(file_id, bytes);
    }

    fn store_error(&self, reason: String) -> ExportError {
        ExportError::StoreAccess {
            path: self.root.clone(),
            reason,
        }
    }

    /// Спрайт иконки для размещения: объект → область → кадр 0
    fn icon_sprite(&self, object_id: u32) -> Option<&RgbaImage> {
        let area_id = self.objects.get(&object_id)?.map_area_id?;
        let sprite_id = self.areas.get(&area_id)?.sprite_id;
        self.sprites.find(sprite_id, 0).map(|s| &s.image)
    }
}

impl CacheSource for MemoryStore {
    fn list_regions(&self) -> Vec<RegionId> {
        self.regions.keys().copied().collect()
    }

    fn load_region(&self, id: RegionId, key: &XteaKey) -> Result<Region> {
        let sealed = self
            .regions
            .get(&id)
            .ok_or_else(|| self.store_error(format!("region {id} is not in the store")))?;

        match sealed.key {
            Some(expected) if expected != *key => Err(ExportError::Decryption {
                region_x: id.region_x(),
                region_y: id.region_y(),
            }),
            _ => Ok(sealed.region.clone()),
        }
    }

    fn object_definitions(&self) -> Result<HashMap<u32, ObjectDefinition>> {
        Ok(self.objects.clone())
    }

    fn area_definitions(&self) -> Result<HashMap<u32, AreaDefinition>> {
        Ok(self.areas.clone())
    }

    fn sprite_definitions(&self) -> Result<SpriteIndex> {
        Ok(self.sprites.clone())
    }

    fn render_region_tile(
        &self,
        region: &Region,
        plane: u8,
        options: &RenderOptions,
    ) -> Result<RgbaImage> {
        Ok(paint_region(region, plane, options, |location| {
            self.icon_sprite(location.id)
        }))
    }

    fn load_archive_files(&self, index: &str, archive: &str) -> Result<Vec<(u32, Vec<u8>)>> {
        let files = self
            .archives
            .get(&(index.to_string(), archive.to_string()))
            .ok_or_else(|| self.store_error(format!("archive {index}/{archive} not found")))?;
        Ok(files
            .iter()
            .map(|(&file_id, bytes)| (file_id, bytes.clone()))
            .collect())
    }

    fn decode_world_map_detail(&self, bytes: &[u8], file_id: u32) -> Result<WorldMapDetail> {
        let mut detail: WorldMapDetail = serde_json::from_slice(bytes)
            .map_err(|e| self.store_error(format!("world map detail {file_id}: {e}")))?;
        detail.file_id = file_id;
        Ok(detail)
    }

    fn decode_world_map_composite(&self, bytes: &[u8]) -> Result<WorldMapComposite> {
        serde_json::from_slice(bytes)
            .map_err(|e| self.store_error(format!("world map composite: {e}")))
    }
}
