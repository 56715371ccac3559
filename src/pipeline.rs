// src/pipeline.rs
//! Конвейер экспорта снимка карты
//!
//! Последовательность стадий фиксирована:
//! 1. Загрузка каталога регионов
//! 2. Тайлы регионов по плоскостям
//! 3. Полные плоскости
//! 4. Наложение плоскостей
//! 5. Иконки миникарты и их изображения
//! 6. Страницы карты мира
//! 7. Данные координат
//!
//! Любая ошибка прерывает прогон; записанные ранее файлы не откатываются.

use image::RgbaImage;
use tracing::info;

use crate::bounds::CoordinateData;
use crate::cache::{CacheSource, KeyTable, PLANE_COUNT, Region};
use crate::catalog::RegionCatalog;
use crate::composite::composite_planes;
use crate::config::ExportConfig;
use crate::error::Result;
use crate::export::{ExportLayout, ExportWriter};
use crate::icons::extract_icons;
use crate::render::{TileRenderer, assemble_full_plane};
use crate::worldmap::assemble;

/// Сколько файлов записала каждая стадия
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExportSummary {
    pub regions: usize,
    pub tiles: usize,
    pub full_planes: usize,
    pub composite_planes: usize,
    pub icons: usize,
    pub icon_images: usize,
    pub world_maps: usize,
    pub composite_files: usize,
    pub coordinate_data: bool,
}

pub struct ExportPipeline<'a, S: CacheSource + ?Sized> {
    source: &'a S,
    config: ExportConfig,
    layout: ExportLayout,
    writer: ExportWriter,
}

impl<'a, S: CacheSource + ?Sized> ExportPipeline<'a, S> {
    pub fn new(source: &'a S, config: ExportConfig) -> Self {
        let layout = ExportLayout::new(&config.out_dir, &config.version);
        Self {
            source,
            config,
            layout,
            writer: ExportWriter,
        }
    }

    #[must_use]
    pub fn layout(&self) -> &ExportLayout {
        &self.layout
    }

    pub fn run(&self, keys: &KeyTable) -> Result<ExportSummary> {
        info!(version = %self.config.version, root = %self.layout.root().display(), "экспорт начат");
        let catalog = RegionCatalog::load_all(self.source, keys)?;
        let renderer = TileRenderer::new(self.source, self.config.render);
        let stages = self.config.stages;

        let mut summary = ExportSummary {
            regions: catalog.len(),
            ..ExportSummary::default()
        };

        let mosaics = self.export_planes(&renderer, &catalog, &mut summary)?;
        if stages.composite_planes {
            summary.composite_planes = self.export_composites(&mosaics)?;
        }
        if stages.icons {
            (summary.icons, summary.icon_images) = self.export_icons(&catalog)?;
        }
        if stages.world_map || stages.composite_definitions {
            (summary.world_maps, summary.composite_files) = self.export_world_map()?;
        }
        if stages.coordinates {
            let data = CoordinateData::from(catalog.bounds()?);
            self.writer.write_json(&self.layout.coordinate_data(), &data)?;
            summary.coordinate_data = true;
        }

        info!(?summary, "экспорт завершён");
        Ok(summary)
    }

    /// Тайлы и полные плоскости
    ///
    /// Вне режима экономии памяти тайлы плоскости рендерятся одним пакетом,
    /// который идёт и в файлы тайлов, и в мозаику. Возвращает мозаики,
    /// если они нужны полным плоскостям или наложению.
    fn export_planes(
        &self,
        renderer: &TileRenderer<'_, S>,
        catalog: &RegionCatalog,
        summary: &mut ExportSummary,
    ) -> Result<Vec<RgbaImage>> {
        let stages = self.config.stages;
        let need_mosaics = stages.full_planes || stages.composite_planes;
        let mut mosaics = Vec::new();

        if stages.tiles && !renderer.options().low_memory {
            let bounds = if need_mosaics {
                Some(catalog.bounds()?)
            } else {
                None
            };
            for plane in 0..PLANE_COUNT {
                let tiles = renderer.render_all_tiles(catalog, plane)?;
                summary.tiles += self.write_tiles(plane, &tiles)?;
                if let Some(bounds) = &bounds {
                    mosaics.push(assemble_full_plane(bounds, plane, &tiles));
                }
            }
        } else {
            if stages.tiles {
                for region in catalog.regions() {
                    for plane in 0..PLANE_COUNT {
                        let tile = renderer.render_tile(region, plane)?;
                        summary.tiles += self.write_tiles(plane, &[(region, tile)])?;
                    }
                }
            }
            if need_mosaics {
                for plane in 0..PLANE_COUNT {
                    mosaics.push(renderer.render_full_plane(catalog, plane)?);
                }
            }
        }

        if stages.tiles {
            info!(tiles = summary.tiles, "тайлы регионов записаны");
        }
        if stages.full_planes {
            for (plane, mosaic) in (0..PLANE_COUNT).zip(&mosaics) {
                self.writer.write_png(&self.layout.full_plane(plane), mosaic)?;
            }
            summary.full_planes = mosaics.len();
            info!(planes = mosaics.len(), "полные плоскости записаны");
        }
        Ok(mosaics)
    }

    fn write_tiles(&self, plane: u8, tiles: &[(&Region, RgbaImage)]) -> Result<usize> {
        for (region, tile) in tiles {
            let path = self.layout.tile(plane, region.region_x, region.region_y);
            self.writer.write_png(&path, tile)?;
        }
        Ok(tiles.len())
    }

    fn export_composites(&self, mosaics: &[RgbaImage]) -> Result<usize> {
        let composites = composite_planes(mosaics, &self.config.composite)?;
        for (plane, composite) in (0..PLANE_COUNT).zip(&composites) {
            self.writer
                .write_png(&self.layout.composite_plane(plane), composite)?;
        }
        info!(planes = composites.len(), "наложенные плоскости записаны");
        Ok(composites.len())
    }

    fn export_icons(&self, catalog: &RegionCatalog) -> Result<(usize, usize)> {
        let objects = self.source.object_definitions()?;
        let areas = self.source.area_definitions()?;
        let sprites = self.source.sprite_definitions()?;
        let extraction = extract_icons(catalog.regions(), &objects, &areas, &sprites)?;

        for (&sprite_id, image) in &extraction.images {
            self.writer.write_png(&self.layout.icon(sprite_id), image)?;
        }
        self.writer
            .write_json(&self.layout.minimap_icons(), &extraction.icons)?;

        info!(
            icons = extraction.icons.len(),
            sprites = extraction.images.len(),
            "иконки миникарты записаны"
        );
        Ok((extraction.icons.len(), extraction.images.len()))
    }

    /// Сборка целиком до записи: при `MissingComposite` ни один файл не пишется
    fn export_world_map(&self) -> Result<(usize, usize)> {
        let entries = assemble(self.source)?;
        let stages = self.config.stages;
        let mut composite_files = 0;

        if stages.world_map {
            self.writer
                .write_json(&self.layout.world_map_definitions(), &entries)?;
        }
        if stages.composite_definitions {
            for entry in &entries {
                self.writer.write_json(
                    &self.layout.map_square_definitions(entry.id),
                    &entry.map_square_definitions,
                )?;
                self.writer.write_json(
                    &self.layout.zone_definitions(entry.id),
                    &entry.zone_definitions,
                )?;
                composite_files += 2;
            }
        }

        info!(maps = entries.len(), "страницы карты мира записаны");
        Ok((entries.len(), composite_files))
    }
}
