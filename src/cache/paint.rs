// src/cache/paint.rs
//! Плоский рендер региона: каждый тайл — квадрат 4×4 пикселя своего цвета.
//! Север сверху, поэтому строка тайла `y` попадает в строку пикселей `63 - y`.

use image::{Rgba, RgbaImage, imageops};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut};
use imageproc::rect::Rect;

use crate::bounds::{SQUARE_PIXEL_LENGTH, TILE_PIXEL_LENGTH};
use crate::cache::{Location, REGION_SIZE, Region};
use crate::config::RenderOptions;

const LABEL_FRAME_COLOR: Rgba<u8> = Rgba([255, 255, 0, 255]);

fn to_rgba(color: u32) -> Rgba<u8> {
    let [_, r, g, b] = color.to_be_bytes();
    Rgba([r, g, b, 255])
}

/// Левый верхний пиксель тайла внутри изображения региона
fn tile_origin(local_x: i32, local_y: i32) -> (i32, i32) {
    let px = TILE_PIXEL_LENGTH as i32;
    (local_x * px, (REGION_SIZE - 1 - local_y) * px)
}

pub(crate) fn paint_region<'a, F>(
    region: &Region,
    plane: u8,
    options: &RenderOptions,
    icon_for: F,
) -> RgbaImage
where
    F: Fn(&Location) -> Option<&'a RgbaImage>,
{
    let mut image = RgbaImage::new(SQUARE_PIXEL_LENGTH, SQUARE_PIXEL_LENGTH);

    for y in 0..REGION_SIZE {
        for x in 0..REGION_SIZE {
            let Some(color) = region.tile_color(plane, x, y) else {
                continue;
            };
            let (px, py) = tile_origin(x, y);
            draw_filled_rect_mut(
                &mut image,
                Rect::at(px, py).of_size(TILE_PIXEL_LENGTH, TILE_PIXEL_LENGTH),
                to_rgba(color),
            );
        }
    }

    if options.icons {
        let square = (region.region_x, region.region_y);
        for location in region
            .locations
            .iter()
            .filter(|l| l.position.plane == plane && l.position.owner_square() == square)
        {
            let Some(sprite) = icon_for(location) else {
                continue;
            };
            let (local_x, local_y) = location.position.tile_in_square();
            let (px, py) = tile_origin(local_x, local_y);
            let half_tile = (TILE_PIXEL_LENGTH / 2) as i32;
            let x = px + half_tile - (sprite.width() / 2) as i32;
            let y = py + half_tile - (sprite.height() / 2) as i32;
            imageops::overlay(&mut image, sprite, i64::from(x), i64::from(y));
        }
    }

    if options.labels {
        draw_hollow_rect_mut(
            &mut image,
            Rect::at(0, 0).of_size(SQUARE_PIXEL_LENGTH, SQUARE_PIXEL_LENGTH),
            LABEL_FRAME_COLOR,
        );
    }

    image
}
