// src/export.rs
//! Раскладка и запись артефактов
//!
//! Имена файлов и структура каталогов — контракт с инструментами вики,
//! менять их нельзя:
//! ```text
//! {out}/{V}/tiles/base/{plane}_{x}_{y}.png
//! {out}/{V}/fullplanes/base/plane_{plane}.png
//! {out}/{V}/fullplanes/composites/plane_{plane}.png
//! {out}/{V}/icons/{spriteId}.png
//! {out}/{V}/minimapIcons.json
//! {out}/{V}/wikiWorldMapDefinitions.json
//! {out}/{V}/coordinateData.json
//! {out}/{V}/worldMapCompositeDefinitions/mapSquareDefinitions_{id}.json
//! {out}/{V}/worldMapCompositeDefinitions/zoneDefinitions_{id}.json
//! ```
//!
//! Запись не транзакционна: при ошибке уже записанные файлы остаются,
//! повторный прогон просто перезаписывает их.

use std::fs;
use std::path::{Path, PathBuf};

use image::codecs::png::PngEncoder;
use image::{ColorType, ImageEncoder, RgbaImage};
use serde::Serialize;
use tracing::debug;

use crate::error::{ExportError, Result};

#[derive(Debug, Clone)]
pub struct ExportLayout {
    root: PathBuf,
}

impl ExportLayout {
    /// `out_dir/version` — корень снимка
    pub fn new(out_dir: impl AsRef<Path>, version: &str) -> Self {
        Self {
            root: out_dir.as_ref().join(version),
        }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn tile(&self, plane: u8, region_x: i32, region_y: i32) -> PathBuf {
        self.root
            .join("tiles")
            .join("base")
            .join(format!("{plane}_{region_x}_{region_y}.png"))
    }

    #[must_use]
    pub fn full_plane(&self, plane: u8) -> PathBuf {
        self.root
            .join("fullplanes")
            .join("base")
            .join(format!("plane_{plane}.png"))
    }

    #[must_use]
    pub fn composite_plane(&self, plane: u8) -> PathBuf {
        self.root
            .join("fullplanes")
            .join("composites")
            .join(format!("plane_{plane}.png"))
    }

    #[must_use]
    pub fn icon(&self, sprite_id: u32) -> PathBuf {
        self.root.join("icons").join(format!("{sprite_id}.png"))
    }

    #[must_use]
    pub fn minimap_icons(&self) -> PathBuf {
        self.root.join("minimapIcons.json")
    }

    #[must_use]
    pub fn world_map_definitions(&self) -> PathBuf {
        self.root.join("wikiWorldMapDefinitions.json")
    }

    #[must_use]
    pub fn coordinate_data(&self) -> PathBuf {
        self.root.join("coordinateData.json")
    }

    #[must_use]
    pub fn map_square_definitions(&self, map_id: u32) -> PathBuf {
        self.root
            .join("worldMapCompositeDefinitions")
            .join(format!("mapSquareDefinitions_{map_id}.json"))
    }

    #[must_use]
    pub fn zone_definitions(&self, map_id: u32) -> PathBuf {
        self.root
            .join("worldMapCompositeDefinitions")
            .join(format!("zoneDefinitions_{map_id}.json"))
    }
}

/// Пишет файлы, создавая недостающие каталоги
#[derive(Debug, Clone, Copy, Default)]
pub struct ExportWriter;

impl ExportWriter {
    pub fn write(&self, path: &Path, bytes: &[u8]) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| ExportError::io(parent, e))?;
        }
        fs::write(path, bytes).map_err(|e| ExportError::io(path, e))?;
        debug!(path = %path.display(), bytes = bytes.len(), "файл записан");
        Ok(())
    }

    pub fn write_png(&self, path: &Path, image: &RgbaImage) -> Result<()> {
        let mut bytes = Vec::new();
        PngEncoder::new(&mut bytes).write_image(
            image.as_raw(),
            image.width(),
            image.height(),
            ColorType::Rgba8,
        )?;
        self.write(path, &bytes)
    }

    pub fn write_json<T: Serialize + ?Sized>(&self, path: &Path, value: &T) -> Result<()> {
        let bytes = serde_json::to_vec(value)?;
        self.write(path, &bytes)
    }
}
