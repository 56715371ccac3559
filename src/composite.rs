// src/composite.rs
//! Наложение плоскостей
//!
//! Плоскость `n` кладётся поверх уже собранных плоскостей `0..n`:
//! её непрозрачные пиксели закрывают нижние, прозрачные открывают их.
//! Подложка в выходном изображении может быть приглушена
//! (яркость, контраст, обесцвечивание, размытие), но основа для следующей
//! плоскости накапливается без стилизации.

use image::{Rgba, RgbaImage};
use imageproc::filter::gaussian_blur_f32;

use crate::config::CompositeOptions;
use crate::error::{ExportError, Result};

/// Сигма размытия подложки; радиус из настроек только включает его
const BLUR_SIGMA: f32 = 1.0;

impl CompositeOptions {
    fn leaves_underlay_unchanged(&self) -> bool {
        (self.brightness - 1.0).abs() < f32::EPSILON
            && (self.contrast - 1.0).abs() < f32::EPSILON
            && self.grayscale <= 0.0
            && self.blur_radius == 0
    }

    /// Пиксель верхней плоскости закрывает подложку
    fn covers(&self, pixel: &Rgba<u8>) -> bool {
        pixel
            .0
            .iter()
            .any(|&c| c.abs_diff(self.transparency_color) > self.transparency_tolerance)
    }
}

fn style_underlay(base: &RgbaImage, options: &CompositeOptions) -> RgbaImage {
    if options.leaves_underlay_unchanged() {
        return base.clone();
    }

    let shift = (options.brightness * 255.0 - 255.0) / 2.0;
    let saturation = 1.0 - options.grayscale.clamp(0.0, 1.0);
    let mut styled = base.clone();

    for pixel in styled.pixels_mut() {
        let [r, g, b, a] = pixel.0;
        let mut rgb = [r, g, b].map(|c| options.contrast * (f32::from(c) - 127.0) + 127.0 + shift);
        if saturation < 1.0 {
            // HSV: яркость — максимум каналов, насыщенность масштабируется
            let value = rgb.iter().copied().fold(f32::MIN, f32::max);
            rgb = rgb.map(|c| value - (value - c) * saturation);
        }
        let [r, g, b] = rgb.map(|c| c.round().clamp(0.0, 255.0) as u8);
        *pixel = Rgba([r, g, b, a]);
    }

    if options.blur_radius > 0 {
        styled = gaussian_blur_f32(&styled, BLUR_SIGMA);
    }
    styled
}

/// Накладывает полные плоскости снизу вверх
///
/// Элемент `n` результата — плоскость `n` поверх плоскостей `0..n`;
/// элемент 0 — сама плоскость 0. Все плоскости должны быть одного размера.
pub fn composite_planes(planes: &[RgbaImage], options: &CompositeOptions) -> Result<Vec<RgbaImage>> {
    let Some(first) = planes.first() else {
        return Ok(Vec::new());
    };
    let mut base = first.clone();
    let mut composites = vec![base.clone()];

    for (plane, overlay) in planes.iter().enumerate().skip(1) {
        if overlay.dimensions() != base.dimensions() {
            let (width, height) = overlay.dimensions();
            return Err(ExportError::LayerSize { plane, width, height });
        }

        let mut composite = style_underlay(&base, options);
        for ((out, under), over) in composite
            .pixels_mut()
            .zip(base.pixels_mut())
            .zip(overlay.pixels())
        {
            if options.covers(over) {
                *out = *over;
                *under = *over;
            }
        }
        composites.push(composite);
    }

    Ok(composites)
}
