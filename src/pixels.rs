use image::{DynamicImage, RgbImage};
use std::collections::HashMap;

/// An image flattened into row-major RGB color vectors, along with the shape needed to rebuild it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelCollection {
    pixels: Vec<[u8; 3]>,
    width: u32,
    height: u32,
}

/// The distinct colors of a [`PixelCollection`] with how often each occurs.
///
/// Colors are ordered by combining their channels into a single integer where red is the most
/// significant and blue the least, so the histogram is identical between runs regardless of hashing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColorHistogram {
    colors: Vec<[u8; 3]>,
    counts: Vec<u32>,
    // for every pixel, the index of its color in `colors`
    indices: Vec<usize>,
}

impl PixelCollection {
    /// Flattens any image into 8-bit RGB. An alpha channel is discarded, grayscale is expanded to
    /// three equal channels and wider sample types are narrowed to 8 bits.
    pub fn from_image(image: &DynamicImage) -> Self {
        match image {
            DynamicImage::ImageRgb8(buf) => Self::from_rgb(buf),
            other => Self::from_rgb(&other.to_rgb8()),
        }
    }

    pub fn from_rgb(image: &RgbImage) -> Self {
        let (width, height) = image.dimensions();

        Self {
            pixels: image.pixels().map(|pixel| pixel.0).collect(),
            width,
            height,
        }
    }

    pub fn pixels(&self) -> &[[u8; 3]] {
        &self.pixels
    }

    pub fn len(&self) -> usize {
        self.pixels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pixels.is_empty()
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn histogram(&self) -> ColorHistogram {
        let mut hist: HashMap<[u8; 3], u32> = HashMap::new();
        for pixel in &self.pixels {
            *hist.entry(*pixel).or_insert(0) += 1;
        }

        let mut entries = hist.into_iter().collect::<Vec<_>>();
        entries.sort_by_key(|(color, _)| packed_key(*color));

        let lookup = entries
            .iter()
            .enumerate()
            .map(|(i, (color, _))| (*color, i))
            .collect::<HashMap<_, _>>();
        let indices = self.pixels.iter().map(|pixel| lookup[pixel]).collect();
        let (colors, counts) = entries.into_iter().unzip();

        ColorHistogram {
            colors,
            counts,
            indices,
        }
    }
}

impl ColorHistogram {
    pub fn colors(&self) -> &[[u8; 3]] {
        &self.colors
    }

    pub fn counts(&self) -> &[u32] {
        &self.counts
    }

    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    /// The number of distinct colors.
    pub fn len(&self) -> usize {
        self.colors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }
}

fn packed_key([r, g, b]: [u8; 3]) -> u32 {
    ((r as u32) << 16) | ((g as u32) << 8) | b as u32
}
