use thiserror::Error;

/// The ways a clustering request can be rejected before any work is done.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum InvalidConfiguration {
    #[error("cluster count {k} is outside the supported range {min}..={max}")]
    ClusterCountOutOfRange { k: usize, min: usize, max: usize },
    #[error("cannot split {pixels} pixels into {k} clusters")]
    TooFewPixels { k: usize, pixels: usize },
    #[error("at least one restart is required")]
    NoRestarts,
    #[error("at least one iteration per restart is required")]
    NoIterations,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(#[from] InvalidConfiguration),
    #[error("{labels} cluster labels do not fit a {width}x{height} image")]
    ShapeMismatch { labels: usize, width: u32, height: u32 },
    #[error(transparent)]
    Image(#[from] image::ImageError),
}
