use crate::swatch::Swatch;
use image::{Rgb, RgbImage};

/// Rebuilds a `width` x `height` image where every pixel takes the color of its cluster.
///
/// `labels` holds one cluster index per pixel in row-major order and must have exactly
/// `width * height` entries, each a valid index into `swatches`. Returns `None` otherwise.
pub fn reconstruct(labels: &[usize], swatches: &[Swatch], width: u32, height: u32) -> Option<RgbImage> {
    if labels.len() != width as usize * height as usize {
        return None;
    }

    let colors = swatches
        .iter()
        .map(|swatch| {
            let (r, g, b) = swatch.rgb();
            [r, g, b]
        })
        .collect::<Vec<_>>();

    let mut raw = Vec::with_capacity(labels.len() * 3);
    for &label in labels {
        raw.extend_from_slice(colors.get(label)?);
    }

    RgbImage::from_raw(width, height, raw)
}

/// Returns whether every pixel of `image` is one of the swatch colors.
pub fn uses_only(image: &RgbImage, swatches: &[Swatch]) -> bool {
    image.pixels().all(|Rgb([r, g, b])| swatches.iter().any(|swatch| swatch.rgb() == (*r, *g, *b)))
}
