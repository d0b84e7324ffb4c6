use crate::swatch::Swatch;
use image::{Rgb, RgbImage};

/// The width and height in pixels of a single color band in a rendered palette.
pub const PALETTE_BAND_SIZE: u32 = 100;

/// Renders the swatches as a strip of square bands, left to right in swatch order.
///
/// The strip is [`PALETTE_BAND_SIZE`] pixels high and `swatches.len()` bands wide.
pub fn render_palette(swatches: &[Swatch]) -> RgbImage {
    let width = PALETTE_BAND_SIZE * swatches.len() as u32;

    RgbImage::from_fn(width, PALETTE_BAND_SIZE, |x, _| {
        let (r, g, b) = swatches[(x / PALETTE_BAND_SIZE) as usize].rgb();
        Rgb([r, g, b])
    })
}

/// Formats the swatches for reading, e.g. `Extracted 2 colors: [[255, 0, 0], [0, 0, 255]]`.
pub fn format_report(swatches: &[Swatch]) -> String {
    let colors = swatches
        .iter()
        .map(|swatch| {
            let (r, g, b) = swatch.rgb();
            format!("[{r}, {g}, {b}]")
        })
        .collect::<Vec<_>>()
        .join(", ");

    format!("Extracted {} colors: [{}]", swatches.len(), colors)
}
