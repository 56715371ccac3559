// src/config.rs
//! Конфигурация экспорта
//!
//! Один конвейер вместо набора почти одинаковых вариантов: всё, чем варианты
//! отличались, вынесено сюда.
//! - Версия снимка (подставляется во все пути вывода)
//! - Пути к дампу кэша, файлу ключей и корню вывода
//! - Параметры рендера тайлов (иконки, рамки, экономия памяти)
//! - Наложение плоскостей: прозрачный цвет и стиль подложки
//! - Включение отдельных стадий
//!
//! Все структуры читаются из TOML; отсутствующие поля получают значения по умолчанию.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{ExportError, Result};

/// Версия снимка по умолчанию
pub const DEFAULT_VERSION: &str = "2024-04-10_a";

/// Параметры рендера тайлов
///
/// Иконки и подписи в слое тайлов по умолчанию выключены: иконки
/// экспортируются отдельно (`icons/` и `minimapIcons.json`).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct RenderOptions {
    /// Впечатывать спрайты иконок областей в тайлы
    #[serde(default)]
    pub icons: bool,

    /// Обводить рамкой границу каждого региона
    #[serde(default)]
    pub labels: bool,

    /// Рендерить тайлы по одному, не держа пакет изображений в памяти
    #[serde(default)]
    pub low_memory: bool,
}

/// Наложение плоскостей друг на друга
///
/// Пиксель верхней плоскости считается прозрачным, если каждый его канал
/// (включая альфу) отличается от `transparency_color` не больше чем на
/// `transparency_tolerance`. Параметры стиля применяются только к подложке
/// в выходном изображении. Значения по умолчанию её не меняют.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct CompositeOptions {
    #[serde(default)]
    pub transparency_color: u8,

    #[serde(default)]
    pub transparency_tolerance: u8,

    /// Яркость подложки, `0.0..=2.0`; 1.0 — без изменений
    #[serde(default = "unit")]
    pub brightness: f32,

    /// Контраст подложки, `0.0..=2.0`; 1.0 — без изменений
    #[serde(default = "unit")]
    pub contrast: f32,

    /// Обесцвечивание подложки, `0.0..=1.0`
    #[serde(default)]
    pub grayscale: f32,

    /// Радиус гауссова размытия подложки в пикселях; 0 — без размытия
    #[serde(default)]
    pub blur_radius: u32,
}

fn unit() -> f32 {
    1.0
}

impl Default for CompositeOptions {
    fn default() -> Self {
        Self {
            transparency_color: 0,
            transparency_tolerance: 0,
            brightness: 1.0,
            contrast: 1.0,
            grayscale: 0.0,
            blur_radius: 0,
        }
    }
}

/// Какие стадии конвейера выполнять
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct StageSettings {
    /// `tiles/base/{plane}_{x}_{y}.png`
    #[serde(default = "enabled")]
    pub tiles: bool,

    /// `fullplanes/base/plane_{plane}.png`
    #[serde(default = "enabled")]
    pub full_planes: bool,

    /// `fullplanes/composites/plane_{plane}.png`
    #[serde(default = "enabled")]
    pub composite_planes: bool,

    /// `icons/{spriteId}.png` и `minimapIcons.json`
    #[serde(default = "enabled")]
    pub icons: bool,

    /// `wikiWorldMapDefinitions.json`
    #[serde(default = "enabled")]
    pub world_map: bool,

    /// `worldMapCompositeDefinitions/*_{id}.json`
    #[serde(default = "enabled")]
    pub composite_definitions: bool,

    /// `coordinateData.json`
    #[serde(default = "enabled")]
    pub coordinates: bool,
}

fn enabled() -> bool {
    true
}

impl Default for StageSettings {
    fn default() -> Self {
        Self {
            tiles: true,
            full_planes: true,
            composite_planes: true,
            icons: true,
            world_map: true,
            composite_definitions: true,
            coordinates: true,
        }
    }
}

/// Полная конфигурация одного прогона экспорта
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    /// Строка версии снимка, например `2024-04-10_a`
    #[serde(default = "default_version")]
    pub version: String,

    /// Каталог с декодированным дампом кэша
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,

    /// JSON-файл с ключами регионов
    #[serde(default = "default_keys_path")]
    pub keys_path: PathBuf,

    /// Корень вывода; снимок пишется в `out_dir/{version}`
    #[serde(default = "default_out_dir")]
    pub out_dir: PathBuf,

    #[serde(default)]
    pub render: RenderOptions,

    #[serde(default)]
    pub composite: CompositeOptions,

    #[serde(default)]
    pub stages: StageSettings,
}

fn default_version() -> String {
    DEFAULT_VERSION.to_string()
}
fn default_cache_dir() -> PathBuf {
    PathBuf::from("./data/cache")
}
fn default_keys_path() -> PathBuf {
    PathBuf::from("./data/xteas.json")
}
fn default_out_dir() -> PathBuf {
    PathBuf::from("./out/mapgen/versions")
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            version: default_version(),
            cache_dir: default_cache_dir(),
            keys_path: default_keys_path(),
            out_dir: default_out_dir(),
            render: RenderOptions::default(),
            composite: CompositeOptions::default(),
            stages: StageSettings::default(),
        }
    }
}

impl ExportConfig {
    /// Загружает конфигурацию из TOML-файла
    ///
    /// # Пример
    /// ```toml
    /// # export.toml
    /// version = "2024-05-01_a"
    /// cache_dir = "./data/cache"
    ///
    /// [render]
    /// low_memory = true
    ///
    /// [composite]
    /// grayscale = 0.5
    ///
    /// [stages]
    /// full_planes = false
    /// ```
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|e| ExportError::io(path, e))?;
        Self::from_toml_str(&contents)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }
}
