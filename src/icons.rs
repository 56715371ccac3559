// src/icons.rs
//! Извлечение иконок миникарты
//!
//! Каждое размещение объекта проверяется по цепочке объект → область → спрайт.
//! Размещение даёт иконку, только если у объекта есть область.
//!
//! ## Инварианты
//! - Иконки идут в порядке обхода: регионы в порядке каталога, внутри
//!   региона — в порядке хранения размещений
//! - Иконки не дедуплицируются, спрайты — дедуплицируются: на каждый
//!   уникальный id спрайта ровно одно изображение (кадр 0)

use std::collections::{BTreeMap, BTreeSet, HashMap};

use image::RgbaImage;
use serde::Serialize;
use tracing::debug;

use crate::cache::{AreaDefinition, ObjectDefinition, Position, Region, SpriteIndex};
use crate::error::{ExportError, Result};

/// Иконка миникарты: `{"position": {"x", "y", "plane"}, "spriteId"}`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MinimapIcon {
    pub position: Position,
    pub sprite_id: u32,
}

#[derive(Debug, Clone, Default)]
pub struct IconExtraction {
    /// Манифест `minimapIcons.json`
    pub icons: Vec<MinimapIcon>,
    /// Изображение на каждый уникальный спрайт, по возрастанию id
    pub images: BTreeMap<u32, RgbaImage>,
}

pub fn extract_icons(
    regions: &[Region],
    objects: &HashMap<u32, ObjectDefinition>,
    areas: &HashMap<u32, AreaDefinition>,
    sprites: &SpriteIndex,
) -> Result<IconExtraction> {
    let mut icons = Vec::new();
    let mut sprite_ids = BTreeSet::new();

    for region in regions {
        for location in &region.locations {
            let object = objects
                .get(&location.id)
                .ok_or(ExportError::UnresolvedObject {
                    object_id: location.id,
                    position: location.position,
                })?;

            let Some(area_id) = object.map_area_id else {
                continue;
            };
            let area = areas.get(&area_id).ok_or(ExportError::UnresolvedArea {
                object_id: object.id,
                area_id,
            })?;

            icons.push(MinimapIcon {
                position: location.position,
                sprite_id: area.sprite_id,
            });
            sprite_ids.insert(area.sprite_id);
        }
    }

    let mut images = BTreeMap::new();
    for sprite_id in sprite_ids {
        let sprite = sprites
            .find(sprite_id, 0)
            .ok_or(ExportError::UnresolvedSprite { sprite_id })?;
        images.insert(sprite_id, sprite.image.clone());
    }

    debug!(icons = icons.len(), sprites = images.len(), "иконки извлечены");
    Ok(IconExtraction { icons, images })
}
