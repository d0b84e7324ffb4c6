// Copyright 2022 Spanfile
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! A library to extract the dominant colors from an image.
//!
//! The pixels of an image are clustered in RGB space with seeded, multi-restart k-means. The
//! result is a segmented copy of the image where every pixel is replaced by its cluster's color, a
//! palette strip with one band per color, and a short textual report of the colors.
//!
//! ```no_run
//! let img = prominence_kmeans::image::open("cat.jpg").unwrap();
//! let extraction = prominence_kmeans::extract_colors(Some(&img), 4).unwrap();
//!
//! println!("{}", extraction.report());
//! ```

mod error;
pub mod kmeans;
pub mod pixels;
pub mod reconstruct;
pub mod render;
mod swatch;

pub use crate::{
    error::{Error, InvalidConfiguration},
    kmeans::{KmeansOptions, MAX_CLUSTERS, MIN_CLUSTERS},
    pixels::PixelCollection,
    render::PALETTE_BAND_SIZE,
    swatch::Swatch,
};
pub use image;
pub use palette;

use image::{DynamicImage, RgbImage};
use log::debug;
use palette::IntoColor;
use std::path::Path;

/// The report given in place of a result when there is no image to work on.
pub const MISSING_IMAGE_REPORT: &str = "Please upload an image.";

/// The outputs of a single color extraction.
#[derive(Debug, Clone, PartialEq)]
pub struct Extraction {
    segmented: Option<RgbImage>,
    palette: Option<RgbImage>,
    report: String,
    swatches: Vec<Swatch>,
    inertia: f64,
}

/// Configures and runs a color extraction.
///
/// The extractor holds no state between runs; every call to [`ColorClusterer::extract`] works on
/// its own copy of the pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColorClusterer {
    k: usize,
    options: KmeansOptions,
}

/// Extracts `k` dominant colors from `image` with the default options.
///
/// If `image` is `None`, no work is done and the result carries no images and
/// [`MISSING_IMAGE_REPORT`] as its report.
///
/// # Errors
///
/// Returns [`Error::InvalidConfiguration`] if `k` is not in `2..=6` or is larger than the number
/// of pixels in the image.
pub fn extract_colors(image: Option<&DynamicImage>, k: usize) -> Result<Extraction, Error> {
    ColorClusterer::new(k).extract(image)
}

impl Extraction {
    fn missing() -> Self {
        Self {
            segmented: None,
            palette: None,
            report: MISSING_IMAGE_REPORT.to_string(),
            swatches: Vec::new(),
            inertia: 0.0,
        }
    }

    /// The input image with every pixel replaced by its cluster's color.
    pub fn segmented(&self) -> Option<&RgbImage> {
        self.segmented.as_ref()
    }

    /// A strip with one [`PALETTE_BAND_SIZE`] pixel wide band per extracted color.
    pub fn palette(&self) -> Option<&RgbImage> {
        self.palette.as_ref()
    }

    /// The extracted colors as text, or [`MISSING_IMAGE_REPORT`] if there was no image.
    pub fn report(&self) -> &str {
        &self.report
    }

    /// The extracted colors in cluster order. Empty if there was no image.
    pub fn swatches(&self) -> &[Swatch] {
        &self.swatches
    }

    /// The total squared distance of every pixel to its cluster's unrounded centroid.
    pub fn inertia(&self) -> f64 {
        self.inertia
    }

    /// The color of the cluster with the most pixels.
    pub fn most_prominent_color(&self) -> Option<(u8, u8, u8)> {
        self.swatches
            .iter()
            .max_by_key(|swatch| swatch.population())
            .map(|swatch| swatch.rgb())
    }

    /// Splits into the segmented image, the palette and the report.
    pub fn into_parts(self) -> (Option<RgbImage>, Option<RgbImage>, String) {
        (self.segmented, self.palette, self.report)
    }
}

impl ColorClusterer {
    pub fn new(k: usize) -> Self {
        Self {
            k,
            options: KmeansOptions::new(),
        }
    }

    pub fn restarts(self, restarts: usize) -> Self {
        Self {
            options: self.options.restarts(restarts),
            ..self
        }
    }

    pub fn max_iterations(self, max_iterations: usize) -> Self {
        Self {
            options: self.options.max_iterations(max_iterations),
            ..self
        }
    }

    pub fn seed(self, seed: u64) -> Self {
        Self {
            options: self.options.seed(seed),
            ..self
        }
    }

    pub fn options(self, options: KmeansOptions) -> Self {
        Self { options, ..self }
    }

    pub fn k(&self) -> usize {
        self.k
    }

    pub fn get_options(&self) -> KmeansOptions {
        self.options
    }

    pub fn extract(&self, image: Option<&DynamicImage>) -> Result<Extraction, Error> {
        let Some(image) = image else {
            debug!("no image given, skipping extraction");
            return Ok(Extraction::missing());
        };

        let pixels = PixelCollection::from_image(image);
        let clustering = kmeans::cluster(&pixels, self.k, self.options)?;
        let swatches = clustering.swatches();

        let segmented = segment(clustering.labels(), &swatches, pixels.width(), pixels.height())?;
        let palette = render::render_palette(&swatches);
        let report = render::format_report(&swatches);

        Ok(Extraction {
            segmented: Some(segmented),
            palette: Some(palette),
            report,
            swatches,
            inertia: clustering.inertia(),
        })
    }

    /// Decodes the image at `path` and extracts its colors.
    pub fn extract_path<P>(&self, path: P) -> Result<Extraction, Error>
    where
        P: AsRef<Path>,
    {
        let image = image::open(path)?;
        self.extract(Some(&image))
    }
}

fn segment(labels: &[usize], swatches: &[Swatch], width: u32, height: u32) -> Result<RgbImage, Error> {
    reconstruct::reconstruct(labels, swatches, width, height).ok_or(Error::ShapeMismatch {
        labels: labels.len(),
        width,
        height,
    })
}

fn rgb_to_hsl(rgb: (u8, u8, u8)) -> (f32, f32, f32) {
    let raw = palette::Srgb::from_components(rgb);
    let raw_float: palette::Srgb<f32> = raw.into_format();
    let hsl: palette::Hsl = raw_float.into_color();
    let (h, s, l) = hsl.into_components();

    (h.into_positive_degrees(), s, l)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn missing_image_short_circuits() {
        for k in [2, 4, 6, 42] {
            let extraction = extract_colors(None, k).unwrap();
            assert_eq!(extraction.into_parts(), (None, None, MISSING_IMAGE_REPORT.to_string()));
        }
    }

    #[test]
    fn builder_options_reach_the_clustering() {
        let clusterer = ColorClusterer::new(3).restarts(2).max_iterations(5).seed(9);

        assert_eq!(clusterer.k(), 3);
        assert_eq!(
            clusterer.get_options(),
            KmeansOptions::new().restarts(2).max_iterations(5).seed(9)
        );
    }

    #[test]
    fn zero_restarts_is_invalid() {
        let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(4, 4, Rgb([1, 2, 3])));
        let result = ColorClusterer::new(2).restarts(0).extract(Some(&image));

        assert!(matches!(
            result,
            Err(Error::InvalidConfiguration(InvalidConfiguration::NoRestarts))
        ));
    }

    #[test]
    fn most_prominent_color_has_largest_population() {
        let image = RgbImage::from_fn(10, 1, |x, _| if x < 7 { Rgb([250, 250, 0]) } else { Rgb([0, 0, 10]) });
        let extraction = extract_colors(Some(&DynamicImage::ImageRgb8(image)), 2).unwrap();

        assert_eq!(extraction.most_prominent_color(), Some((250, 250, 0)));
    }

    #[test]
    fn mismatched_labels_are_an_error() {
        let swatches = [Swatch::new((0, 0, 0), 2), Swatch::new((255, 255, 255), 1)];

        assert!(matches!(
            segment(&[0, 1, 0], &swatches, 2, 2),
            Err(Error::ShapeMismatch { labels: 3, width: 2, height: 2 })
        ));
        assert!(segment(&[0, 1, 0, 0], &swatches, 2, 2).is_ok());
    }

    #[test]
    fn hsl_of_white_is_fully_light() {
        let (_, s, l) = rgb_to_hsl((255, 255, 255));
        assert!(s.abs() < 1e-3);
        assert!((l - 1.0).abs() < 1e-3);
    }
}
