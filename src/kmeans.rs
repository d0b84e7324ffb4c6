//! Color clustering by k-means.
//!
//! This is batch k-means (a.k.a. Lloyd's algorithm) in RGB space with Euclidean distance. Each run
//! is seeded with k-means++ and the whole procedure is repeated several times, keeping the run
//! with the lowest inertia (the total squared distance of every pixel to its centroid).
//!
//! Identical pixels always end up in the same cluster, so the iteration runs over the distinct
//! colors of the image weighted by how often they occur. The result is the same as clustering
//! every pixel individually, only faster for images with large flat areas.
//!
//! All randomness comes from a single [`StdRng`] seeded from [`KmeansOptions::seed`], so the same
//! input and options always give the same result.

use crate::{error::InvalidConfiguration, pixels::PixelCollection, swatch::Swatch};
use log::{debug, info, trace};
use rand::{rngs::StdRng, Rng, SeedableRng};

/// The smallest supported number of clusters.
pub const MIN_CLUSTERS: usize = 2;
/// The largest supported number of clusters.
pub const MAX_CLUSTERS: usize = 6;

pub const DEFAULT_RESTARTS: usize = 10;
pub const DEFAULT_MAX_ITERATIONS: usize = 300;
pub const DEFAULT_SEED: u64 = 42;

/// The options for k-means clustering.
///
/// # Examples
///
/// ```
/// # use prominence_kmeans::kmeans::KmeansOptions;
/// KmeansOptions::new()
///     .restarts(4)
///     .max_iterations(50)
///     .seed(7);
/// ```
#[must_use]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct KmeansOptions {
    /// The number of independently initialized runs.
    restarts: usize,
    /// The maximum number of assign/update rounds per run.
    max_iterations: usize,
    /// The seed for the random number generator.
    seed: u64,
}

impl KmeansOptions {
    /// Create a new [`KmeansOptions`] with 10 restarts, 300 iterations and seed 42.
    pub const fn new() -> Self {
        Self {
            restarts: DEFAULT_RESTARTS,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            seed: DEFAULT_SEED,
        }
    }

    /// Sets how many times clustering is run from a fresh initialization. The run with the lowest
    /// inertia is kept.
    pub const fn restarts(self, restarts: usize) -> Self {
        Self { restarts, ..self }
    }

    /// Sets the iteration cap of a single run. A run stops earlier once no pixel changes cluster.
    pub const fn max_iterations(self, max_iterations: usize) -> Self {
        Self { max_iterations, ..self }
    }

    pub const fn seed(self, seed: u64) -> Self {
        Self { seed, ..self }
    }

    pub const fn get_restarts(&self) -> usize {
        self.restarts
    }

    pub const fn get_max_iterations(&self) -> usize {
        self.max_iterations
    }

    pub const fn get_seed(&self) -> u64 {
        self.seed
    }
}

impl Default for KmeansOptions {
    fn default() -> Self {
        Self::new()
    }
}

/// The outcome of clustering a [`PixelCollection`].
#[derive(Debug, Clone, PartialEq)]
pub struct Clustering {
    centroids: Vec<[f64; 3]>,
    labels: Vec<usize>,
    populations: Vec<u32>,
    inertia: f64,
    iterations: usize,
}

impl Clustering {
    /// The unrounded mean color of every cluster, indexed by cluster.
    pub fn centroids(&self) -> &[[f64; 3]] {
        &self.centroids
    }

    /// The cluster of every pixel, in the same row-major order as the input.
    pub fn labels(&self) -> &[usize] {
        &self.labels
    }

    /// The number of pixels in every cluster.
    pub fn populations(&self) -> &[u32] {
        &self.populations
    }

    pub fn inertia(&self) -> f64 {
        self.inertia
    }

    /// The number of iterations the winning run needed.
    pub fn iterations(&self) -> usize {
        self.iterations
    }

    pub fn k(&self) -> usize {
        self.centroids.len()
    }

    /// The rounded centroid colors in cluster order.
    pub fn swatches(&self) -> Vec<Swatch> {
        self.centroids
            .iter()
            .zip(&self.populations)
            .map(|(centroid, population)| Swatch::from_centroid(*centroid, *population))
            .collect()
    }
}

/// A single k-means run over the distinct colors.
struct Run {
    centroids: Vec<[f64; 3]>,
    // indexed by distinct color, not by pixel
    labels: Vec<usize>,
    inertia: f64,
    iterations: usize,
}

/// Checks the cluster count and options against the number of pixels to be clustered.
pub fn validate(k: usize, pixels: usize, options: KmeansOptions) -> Result<(), InvalidConfiguration> {
    if !(MIN_CLUSTERS..=MAX_CLUSTERS).contains(&k) {
        return Err(InvalidConfiguration::ClusterCountOutOfRange {
            k,
            min: MIN_CLUSTERS,
            max: MAX_CLUSTERS,
        });
    }

    if options.restarts == 0 {
        return Err(InvalidConfiguration::NoRestarts);
    }

    if options.max_iterations == 0 {
        return Err(InvalidConfiguration::NoIterations);
    }

    if k > pixels {
        return Err(InvalidConfiguration::TooFewPixels { k, pixels });
    }

    Ok(())
}

/// Partitions the pixels into `k` clusters.
///
/// # Errors
///
/// Returns an [`InvalidConfiguration`] if `k` is not in `2..=6`, if there are fewer pixels than
/// clusters, or if the options ask for zero restarts or zero iterations.
pub fn cluster(
    pixels: &PixelCollection,
    k: usize,
    options: KmeansOptions,
) -> Result<Clustering, InvalidConfiguration> {
    validate(k, pixels.len(), options)?;

    let hist = pixels.histogram();
    let colors = hist
        .colors()
        .iter()
        .map(|color| color.map(f64::from))
        .collect::<Vec<_>>();
    let weights = hist.counts().iter().map(|&count| f64::from(count)).collect::<Vec<_>>();

    let mut rng = StdRng::seed_from_u64(options.seed);
    let mut best: Option<(usize, Run)> = None;

    for restart in 0..options.restarts {
        let run = run_once(&colors, &weights, k, options.max_iterations, &mut rng);
        debug!(
            "restart {} finished after {} iterations with inertia {}",
            restart, run.iterations, run.inertia
        );

        // strictly lower, so ties keep the earliest run
        if best.as_ref().map_or(true, |(_, current)| run.inertia < current.inertia) {
            best = Some((restart, run));
        }
    }

    let Some((restart, best)) = best else {
        return Err(InvalidConfiguration::NoRestarts);
    };
    info!(
        "kept restart {} of {} with inertia {} ({} distinct colors, k = {})",
        restart,
        options.restarts,
        best.inertia,
        colors.len(),
        k
    );

    let labels = hist
        .indices()
        .iter()
        .map(|&color| best.labels[color])
        .collect::<Vec<_>>();

    let mut populations = vec![0; k];
    for (&label, &count) in best.labels.iter().zip(hist.counts()) {
        populations[label] += count;
    }

    Ok(Clustering {
        centroids: best.centroids,
        labels,
        populations,
        inertia: best.inertia,
        iterations: best.iterations,
    })
}

fn run_once(colors: &[[f64; 3]], weights: &[f64], k: usize, max_iterations: usize, rng: &mut StdRng) -> Run {
    let mut centroids = init_centroids(colors, weights, k, rng);
    let mut labels = Vec::new();
    let mut iterations = 0;

    while iterations < max_iterations {
        iterations += 1;

        let next = assign(colors, &centroids);
        if next == labels {
            break;
        }

        labels = next;
        centroids = update(colors, weights, &mut labels, &centroids);
    }

    // the labels always describe the nearest of the final centroids
    let labels = assign(colors, &centroids);
    let inertia = colors
        .iter()
        .zip(weights)
        .zip(&labels)
        .map(|((color, weight), &label)| weight * squared_distance(color, &centroids[label]))
        .sum();

    Run {
        centroids,
        labels,
        inertia,
        iterations,
    }
}

/// Picks the initial centroids with weighted k-means++: every next centroid is a distinct color
/// drawn with probability proportional to its count times its squared distance to the nearest
/// centroid chosen so far.
fn init_centroids(colors: &[[f64; 3]], weights: &[f64], k: usize, rng: &mut StdRng) -> Vec<[f64; 3]> {
    let mut centroids = Vec::with_capacity(k);
    let first = colors[pick_weighted(weights, rng)];
    centroids.push(first);

    let mut nearest = colors
        .iter()
        .map(|color| squared_distance(color, &first))
        .collect::<Vec<_>>();

    while centroids.len() < k {
        let scores = nearest
            .iter()
            .zip(weights)
            .map(|(distance, weight)| distance * weight)
            .collect::<Vec<_>>();

        // every color already is a centroid, so duplicates are unavoidable
        let index = if scores.iter().sum::<f64>() > 0.0 {
            pick_weighted(&scores, rng)
        } else {
            pick_weighted(weights, rng)
        };

        let chosen = colors[index];
        centroids.push(chosen);

        for (distance, color) in nearest.iter_mut().zip(colors) {
            *distance = distance.min(squared_distance(color, &chosen));
        }
    }

    centroids
}

fn pick_weighted(weights: &[f64], rng: &mut StdRng) -> usize {
    let total = weights.iter().sum::<f64>();
    let mut threshold = rng.gen::<f64>() * total;

    for (i, &weight) in weights.iter().enumerate() {
        if weight > 0.0 && threshold < weight {
            return i;
        }

        threshold -= weight;
    }

    // rounding can leave a sliver past the last entry
    weights.iter().rposition(|&weight| weight > 0.0).unwrap_or(0)
}

/// Returns the index of the nearest centroid for every color. Ties go to the lowest index.
fn assign(colors: &[[f64; 3]], centroids: &[[f64; 3]]) -> Vec<usize> {
    colors.iter().map(|color| nearest_centroid(color, centroids)).collect()
}

fn nearest_centroid(color: &[f64; 3], centroids: &[[f64; 3]]) -> usize {
    let mut best = 0;
    let mut best_distance = f64::INFINITY;

    for (i, centroid) in centroids.iter().enumerate() {
        let distance = squared_distance(color, centroid);
        if distance < best_distance {
            best = i;
            best_distance = distance;
        }
    }

    best
}

/// Recomputes every centroid as the weighted mean of its colors.
///
/// A cluster left without colors takes over the color farthest from its current centroid, as long
/// as the cluster giving it up keeps at least one other pixel. `labels` is updated for any color
/// moved this way. If nothing can be moved, the empty cluster keeps its previous centroid.
fn update(colors: &[[f64; 3]], weights: &[f64], labels: &mut [usize], previous: &[[f64; 3]]) -> Vec<[f64; 3]> {
    let k = previous.len();
    let mut sums = vec![[0.0; 3]; k];
    let mut totals = vec![0.0; k];

    for ((color, &weight), &label) in colors.iter().zip(weights).zip(labels.iter()) {
        for (sum, channel) in sums[label].iter_mut().zip(color) {
            *sum += channel * weight;
        }
        totals[label] += weight;
    }

    if totals.iter().any(|&total| total == 0.0) {
        reseed_empty_clusters(colors, weights, labels, previous, &mut sums, &mut totals);
    }

    sums.iter()
        .zip(&totals)
        .zip(previous)
        .map(|((sum, &total), previous)| {
            if total > 0.0 {
                sum.map(|channel| channel / total)
            } else {
                *previous
            }
        })
        .collect()
}

fn reseed_empty_clusters(
    colors: &[[f64; 3]],
    weights: &[f64],
    labels: &mut [usize],
    previous: &[[f64; 3]],
    sums: &mut [[f64; 3]],
    totals: &mut [f64],
) {
    let distances = colors
        .iter()
        .zip(labels.iter())
        .map(|(color, &label)| squared_distance(color, &previous[label]))
        .collect::<Vec<_>>();

    // farthest first; the sort is stable so equal distances keep the color order
    let mut candidates = (0..colors.len()).collect::<Vec<_>>();
    candidates.sort_by(|&a, &b| distances[b].total_cmp(&distances[a]));
    let mut candidates = candidates.into_iter().filter(|&i| distances[i] > 0.0);

    for empty in 0..totals.len() {
        if totals[empty] > 0.0 {
            continue;
        }

        let Some(moved) = candidates.find(|&i| totals[labels[i]] > weights[i]) else {
            trace!("cluster {} stays empty, no color left to move", empty);
            continue;
        };

        let source = labels[moved];
        let weight = weights[moved];
        for channel in 0..3 {
            sums[source][channel] -= colors[moved][channel] * weight;
            sums[empty][channel] = colors[moved][channel] * weight;
        }
        totals[source] -= weight;
        totals[empty] = weight;
        labels[moved] = empty;

        trace!(
            "reseeded empty cluster {} with color {:?} taken from cluster {}",
            empty,
            colors[moved],
            source
        );
    }
}

fn squared_distance(a: &[f64; 3], b: &[f64; 3]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn checkerboard(width: u32, height: u32, a: [u8; 3], b: [u8; 3]) -> PixelCollection {
        PixelCollection::from_rgb(&RgbImage::from_fn(width, height, |x, y| {
            if (x + y) % 2 == 0 {
                Rgb(a)
            } else {
                Rgb(b)
            }
        }))
    }

    fn gradient(width: u32, height: u32) -> PixelCollection {
        PixelCollection::from_rgb(&RgbImage::from_fn(width, height, |x, y| {
            Rgb([(x * 17 % 256) as u8, (y * 29 % 256) as u8, ((x * y) % 256) as u8])
        }))
    }

    #[test]
    fn rejects_cluster_counts_outside_range() {
        let pixels = gradient(4, 4);

        for k in [0, 1, 7] {
            assert_eq!(
                cluster(&pixels, k, KmeansOptions::new()),
                Err(InvalidConfiguration::ClusterCountOutOfRange { k, min: 2, max: 6 })
            );
        }
    }

    #[test]
    fn rejects_more_clusters_than_pixels() {
        let pixels = gradient(2, 1);

        assert_eq!(
            cluster(&pixels, 3, KmeansOptions::new()),
            Err(InvalidConfiguration::TooFewPixels { k: 3, pixels: 2 })
        );
    }

    #[test]
    fn rejects_zero_restarts_and_iterations() {
        let pixels = gradient(4, 4);

        assert_eq!(
            cluster(&pixels, 2, KmeansOptions::new().restarts(0)),
            Err(InvalidConfiguration::NoRestarts)
        );
        assert_eq!(
            cluster(&pixels, 2, KmeansOptions::new().max_iterations(0)),
            Err(InvalidConfiguration::NoIterations)
        );
    }

    #[test]
    fn checkerboard_recovers_both_colors() {
        let pixels = checkerboard(6, 6, [200, 30, 10], [5, 90, 250]);
        let clustering = cluster(&pixels, 2, KmeansOptions::new()).unwrap();

        let mut centroids = clustering.centroids().to_vec();
        centroids.sort_by(|a, b| a[0].total_cmp(&b[0]));
        assert_eq!(centroids, vec![[5.0, 90.0, 250.0], [200.0, 30.0, 10.0]]);
        assert_eq!(clustering.inertia(), 0.0);
        assert_eq!(clustering.populations(), &[18, 18]);
    }

    #[test]
    fn labels_point_at_nearest_centroid() {
        let pixels = gradient(12, 9);
        let clustering = cluster(&pixels, 4, KmeansOptions::new()).unwrap();

        assert_eq!(clustering.labels().len(), pixels.len());
        for (pixel, &label) in pixels.pixels().iter().zip(clustering.labels()) {
            assert_eq!(nearest_centroid(&pixel.map(f64::from), clustering.centroids()), label);
        }
        assert_eq!(clustering.populations().iter().sum::<u32>(), pixels.len() as u32);
    }

    #[test]
    fn run_stops_at_iteration_cap() {
        let pixels = gradient(40, 40);
        let clustering = cluster(&pixels, 6, KmeansOptions::new().restarts(1).max_iterations(1)).unwrap();

        assert_eq!(clustering.iterations(), 1);
        for (pixel, &label) in pixels.pixels().iter().zip(clustering.labels()) {
            assert_eq!(nearest_centroid(&pixel.map(f64::from), clustering.centroids()), label);
        }
    }

    #[test]
    fn run_stops_once_labels_settle() {
        let clustering = cluster(&gradient(40, 40), 6, KmeansOptions::new()).unwrap();
        assert!(clustering.iterations() < DEFAULT_MAX_ITERATIONS);

        // both colors are centroids right after init, so the second pass changes nothing
        let pixels = checkerboard(4, 4, [0, 0, 0], [255, 255, 255]);
        let clustering = cluster(&pixels, 2, KmeansOptions::new()).unwrap();
        assert_eq!(clustering.iterations(), 2);
    }

    #[test]
    fn same_seed_gives_same_clustering() {
        let pixels = gradient(16, 16);
        let options = KmeansOptions::new().seed(1234);

        assert_eq!(cluster(&pixels, 5, options), cluster(&pixels, 5, options));
    }

    #[test]
    fn more_restarts_never_increase_inertia() {
        let pixels = gradient(20, 20);
        let single = cluster(&pixels, 6, KmeansOptions::new().restarts(1)).unwrap();
        let several = cluster(&pixels, 6, KmeansOptions::new().restarts(10)).unwrap();

        assert!(several.inertia() <= single.inertia());
    }

    #[test]
    fn solid_image_gives_duplicate_centroids() {
        let pixels = PixelCollection::from_rgb(&RgbImage::from_pixel(10, 10, Rgb([40, 80, 120])));
        let clustering = cluster(&pixels, 2, KmeansOptions::new()).unwrap();

        assert_eq!(clustering.centroids(), &[[40.0, 80.0, 120.0]; 2]);
        assert!(clustering.labels().iter().all(|&label| label == 0));
        assert_eq!(clustering.populations(), &[100, 0]);
    }

    #[test]
    fn empty_cluster_takes_farthest_color() {
        let colors = [[0.0; 3], [10.0; 3], [100.0; 3]];
        let weights = [1.0, 1.0, 1.0];
        let mut labels = vec![0, 0, 0];
        let previous = [[0.0; 3], [500.0; 3]];

        let centroids = update(&colors, &weights, &mut labels, &previous);

        assert_eq!(centroids, vec![[5.0; 3], [100.0; 3]]);
        assert_eq!(labels, vec![0, 0, 1]);
    }

    #[test]
    fn empty_cluster_never_empties_another() {
        let colors = [[30.0; 3]];
        let weights = [4.0];
        let mut labels = vec![0];
        let previous = [[0.0; 3], [9.0; 3]];

        let centroids = update(&colors, &weights, &mut labels, &previous);

        assert_eq!(centroids, vec![[30.0; 3], [9.0; 3]]);
        assert_eq!(labels, vec![0]);
    }

    #[test]
    fn pick_weighted_skips_zero_weights() {
        let mut rng = StdRng::seed_from_u64(0);

        for _ in 0..100 {
            assert_eq!(pick_weighted(&[0.0, 3.0, 0.0], &mut rng), 1);
        }
    }
}
