// src/error.rs
//! Ошибки экспорта
//!
//! Единая таксономия ошибок конвейера. Все ошибки, кроме `Decryption`,
//! фатальны: прогон прерывается, уже записанные файлы не удаляются.
//! `Decryption` перехватывается каталогом регионов — регион пропускается.

use std::path::PathBuf;

use thiserror::Error;

use crate::cache::Position;

#[derive(Debug, Error)]
pub enum ExportError {
    /// Хранилище кэша не читается или повреждено
    #[error("cannot read cache store at {path}: {reason}")]
    StoreAccess { path: PathBuf, reason: String },

    /// Файл ключей отсутствует или имеет неверный формат
    #[error("malformed key file {path}: {reason}")]
    KeyFile { path: PathBuf, reason: String },

    /// Ключ региона не подходит к его данным
    #[error("region {region_x}_{region_y} could not be decrypted with the supplied key")]
    Decryption { region_x: i32, region_y: i32 },

    #[error("placement at {position} references unknown object {object_id}")]
    UnresolvedObject { object_id: u32, position: Position },

    #[error("object {object_id} references unknown area {area_id}")]
    UnresolvedArea { object_id: u32, area_id: u32 },

    #[error("sprite {sprite_id} has no frame 0 in the sprite index")]
    UnresolvedSprite { sprite_id: u32 },

    #[error("world map {map_id} has a details record but no composite record")]
    MissingComposite { map_id: u32 },

    #[error("no regions were loaded, coordinate bounds are undefined")]
    EmptyDataset,

    #[error("plane {plane} is outside the range 0..=3")]
    PlaneOutOfRange { plane: u8 },

    #[error("renderer produced a {width}x{height} tile, expected 256x256")]
    TileSize { width: u32, height: u32 },

    #[error("plane {plane} mosaic is {width}x{height}, it does not match plane 0")]
    LayerSize { plane: usize, width: u32, height: u32 },

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("configuration error: {0}")]
    Config(#[from] toml::de::Error),
}

impl ExportError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, ExportError>;
