// src/bounds.rs
//! Глобальные границы координат и константы масштаба
//!
//! Клиентские инструменты вики переводят пиксели в тайлы и регионы по
//! `coordinateData.json`. Файл содержит:
//! - минимумы и максимумы базовых тайлов по всем загруженным регионам
//! - соответствующие координаты регионов ("квадратов")
//! - фиксированные константы масштаба, не зависящие от версии кэша

use serde::{Deserialize, Serialize};

use crate::cache::{Position, REGION_SIZE, Region};
use crate::error::{ExportError, Result};

/// Пикселей на тайл
pub const TILE_PIXEL_LENGTH: u32 = 4;
/// Тайлов на сторону квадрата (региона)
pub const SQUARE_TILE_LENGTH: u32 = REGION_SIZE as u32;
/// Пикселей на сторону квадрата
pub const SQUARE_PIXEL_LENGTH: u32 = SQUARE_TILE_LENGTH * TILE_PIXEL_LENGTH;
/// Тайлов на сторону зоны
pub const ZONE_TILE_LENGTH: u32 = 8;
/// Зон на сторону квадрата
pub const SQUARE_ZONE_LENGTH: u32 = SQUARE_TILE_LENGTH / ZONE_TILE_LENGTH;
/// Пикселей на сторону зоны
pub const ZONE_PIXEL_LENGTH: u32 = ZONE_TILE_LENGTH * TILE_PIXEL_LENGTH;

/// Экстремумы координат по всем регионам
///
/// # Гарантии
/// - `min_tile_* <= max_tile_*`
/// - `*_square_* * 64 == *_tile_*` на каждой оси
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoordinateBounds {
    pub min_tile_x: i32,
    pub min_square_x: i32,
    pub min_tile_y: i32,
    pub min_square_y: i32,
    pub max_tile_x: i32,
    pub max_square_x: i32,
    pub max_tile_y: i32,
    pub max_square_y: i32,
}

impl CoordinateBounds {
    /// Ширина полной плоскости в квадратах
    #[must_use]
    pub fn width_in_squares(&self) -> u32 {
        (self.max_square_x - self.min_square_x + 1) as u32
    }

    #[must_use]
    pub fn height_in_squares(&self) -> u32 {
        (self.max_square_y - self.min_square_y + 1) as u32
    }

    /// Левый верхний пиксель квадрата на полной плоскости (север сверху)
    #[must_use]
    pub fn square_pixel_offset(&self, square_x: i32, square_y: i32) -> (u32, u32) {
        let x = (square_x - self.min_square_x) as u32 * SQUARE_PIXEL_LENGTH;
        let y = (self.max_square_y - square_y) as u32 * SQUARE_PIXEL_LENGTH;
        (x, y)
    }
}

/// Вычисляет границы независимыми свёртками min/max по базовым тайлам регионов
///
/// Рядом с каждым экстремумом сохраняется координата региона, который его
/// достигает. Пустой набор — [`ExportError::EmptyDataset`].
pub fn compute_bounds(regions: &[Region]) -> Result<CoordinateBounds> {
    let first = regions.first().ok_or(ExportError::EmptyDataset)?;
    let mut bounds = CoordinateBounds {
        min_tile_x: first.base_x(),
        min_square_x: first.region_x,
        min_tile_y: first.base_y(),
        min_square_y: first.region_y,
        max_tile_x: first.base_x(),
        max_square_x: first.region_x,
        max_tile_y: first.base_y(),
        max_square_y: first.region_y,
    };

    for region in &regions[1..] {
        if region.base_x() < bounds.min_tile_x {
            bounds.min_tile_x = region.base_x();
            bounds.min_square_x = region.region_x;
        }
        if region.base_x() > bounds.max_tile_x {
            bounds.max_tile_x = region.base_x();
            bounds.max_square_x = region.region_x;
        }
        if region.base_y() < bounds.min_tile_y {
            bounds.min_tile_y = region.base_y();
            bounds.min_square_y = region.region_y;
        }
        if region.base_y() > bounds.max_tile_y {
            bounds.max_tile_y = region.base_y();
            bounds.max_square_y = region.region_y;
        }
    }

    Ok(bounds)
}

/// Содержимое `coordinateData.json`; порядок полей — контракт формата
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoordinateData {
    pub min_tile_x: i32,
    pub min_square_x: i32,
    pub min_tile_y: i32,
    pub min_square_y: i32,
    pub max_tile_x: i32,
    pub max_square_x: i32,
    pub max_tile_y: i32,
    pub max_square_y: i32,
    pub tile_pixel_length: u32,
    pub square_tile_length: u32,
    pub square_pixel_length: u32,
    pub square_zone_length: u32,
    pub zone_pixel_length: u32,
    pub zone_tile_length: u32,
}

impl From<CoordinateBounds> for CoordinateData {
    fn from(b: CoordinateBounds) -> Self {
        Self {
            min_tile_x: b.min_tile_x,
            min_square_x: b.min_square_x,
            min_tile_y: b.min_tile_y,
            min_square_y: b.min_square_y,
            max_tile_x: b.max_tile_x,
            max_square_x: b.max_square_x,
            max_tile_y: b.max_tile_y,
            max_square_y: b.max_square_y,
            tile_pixel_length: TILE_PIXEL_LENGTH,
            square_tile_length: SQUARE_TILE_LENGTH,
            square_pixel_length: SQUARE_PIXEL_LENGTH,
            square_zone_length: SQUARE_ZONE_LENGTH,
            zone_pixel_length: ZONE_PIXEL_LENGTH,
            zone_tile_length: ZONE_TILE_LENGTH,
        }
    }
}

impl Position {
    /// Квадрат (регион), которому принадлежит тайл
    #[must_use]
    pub fn owner_square(&self) -> (i32, i32) {
        let len = SQUARE_TILE_LENGTH as i32;
        (self.x.div_euclid(len), self.y.div_euclid(len))
    }

    /// Тайл относительно юго-западного угла своего квадрата
    #[must_use]
    pub fn tile_in_square(&self) -> (i32, i32) {
        let len = SQUARE_TILE_LENGTH as i32;
        (self.x.rem_euclid(len), self.y.rem_euclid(len))
    }
}
