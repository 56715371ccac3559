// src/render.rs
//! Адаптер рендера тайлов
//!
//! Сам рисунок тайла делает слой кэша ([`CacheSource::render_region_tile`]).
//! Здесь только:
//! - проверка плоскости и размера результата
//! - выбор регионов, видимых на плоскости
//! - сборка полной плоскости из тайлов со смещением от глобального минимума
//!   (в том числе из уже отрисованного пакета, [`assemble_full_plane`])
//!
//! Ничего не пишет на диск — это делает вызывающая сторона.

use image::{RgbaImage, imageops};
#[cfg(feature = "parallel")]
use rayon::prelude::*;
use tracing::debug;

use crate::bounds::{CoordinateBounds, SQUARE_PIXEL_LENGTH};
use crate::cache::{CacheSource, PLANE_COUNT, Region};
use crate::catalog::RegionCatalog;
use crate::config::RenderOptions;
use crate::error::{ExportError, Result};

pub struct TileRenderer<'a, S: CacheSource + ?Sized> {
    source: &'a S,
    options: RenderOptions,
}

fn check_plane(plane: u8) -> Result<()> {
    if plane < PLANE_COUNT {
        Ok(())
    } else {
        Err(ExportError::PlaneOutOfRange { plane })
    }
}

fn blank_mosaic(bounds: &CoordinateBounds) -> RgbaImage {
    RgbaImage::new(
        bounds.width_in_squares() * SQUARE_PIXEL_LENGTH,
        bounds.height_in_squares() * SQUARE_PIXEL_LENGTH,
    )
}

fn place(mosaic: &mut RgbaImage, bounds: &CoordinateBounds, region: &Region, tile: &RgbaImage) {
    let (x, y) = bounds.square_pixel_offset(region.region_x, region.region_y);
    imageops::replace(mosaic, tile, i64::from(x), i64::from(y));
}

/// Полная плоскость из готовых тайлов этой плоскости
///
/// Тайлы регионов, невидимых на плоскости, пропускаются, как и в
/// [`TileRenderer::render_full_plane`].
#[must_use]
pub fn assemble_full_plane(
    bounds: &CoordinateBounds,
    plane: u8,
    tiles: &[(&Region, RgbaImage)],
) -> RgbaImage {
    let mut mosaic = blank_mosaic(bounds);
    for (region, tile) in tiles.iter().filter(|(r, _)| r.is_visible(plane)) {
        place(&mut mosaic, bounds, region, tile);
    }
    mosaic
}

impl<'a, S: CacheSource + ?Sized> TileRenderer<'a, S> {
    pub fn new(source: &'a S, options: RenderOptions) -> Self {
        Self { source, options }
    }

    #[must_use]
    pub fn options(&self) -> &RenderOptions {
        &self.options
    }

    /// Тайл региона на плоскости — всегда 256×256
    pub fn render_tile(&self, region: &Region, plane: u8) -> Result<RgbaImage> {
        check_plane(plane)?;
        let tile = self
            .source
            .render_region_tile(region, plane, &self.options)?;
        let (width, height) = tile.dimensions();
        if width != SQUARE_PIXEL_LENGTH || height != SQUARE_PIXEL_LENGTH {
            return Err(ExportError::TileSize { width, height });
        }
        Ok(tile)
    }

    /// Тайлы всех регионов каталога на плоскости, в порядке каталога
    pub fn render_all_tiles<'c>(
        &self,
        catalog: &'c RegionCatalog,
        plane: u8,
    ) -> Result<Vec<(&'c Region, RgbaImage)>> {
        let regions: Vec<&Region> = catalog.regions().iter().collect();
        self.render_batch(&regions, plane)
    }

    /// С фичей `parallel` регионы рендерятся параллельно; порядок результата
    /// от этого не меняется.
    fn render_batch<'c>(
        &self,
        regions: &[&'c Region],
        plane: u8,
    ) -> Result<Vec<(&'c Region, RgbaImage)>> {
        check_plane(plane)?;

        #[cfg(feature = "parallel")]
        let regions = regions.par_iter();
        #[cfg(not(feature = "parallel"))]
        let regions = regions.iter();

        regions
            .map(|&region| self.render_tile(region, plane).map(|tile| (region, tile)))
            .collect()
    }

    /// Полная плоскость мира: все видимые регионы на одном холсте
    ///
    /// Размер — `(max - min + 1) × 256` по каждой оси; регион `(x, y)` ложится
    /// в `((x - minX) × 256, (maxY - y) × 256)`.
    pub fn render_full_plane(&self, catalog: &RegionCatalog, plane: u8) -> Result<RgbaImage> {
        check_plane(plane)?;
        let bounds = catalog.bounds()?;
        let mut mosaic = blank_mosaic(&bounds);

        let visible: Vec<&Region> = catalog
            .regions()
            .iter()
            .filter(|r| r.is_visible(plane))
            .collect();
        debug!(plane, visible = visible.len(), "сборка полной плоскости");

        if self.options.low_memory {
            for region in visible {
                let tile = self.render_tile(region, plane)?;
                place(&mut mosaic, &bounds, region, &tile);
            }
        } else {
            for (region, tile) in self.render_batch(&visible, plane)? {
                place(&mut mosaic, &bounds, region, &tile);
            }
        }

        Ok(mosaic)
    }
}
