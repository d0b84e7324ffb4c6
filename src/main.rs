use anyhow::{Context, Result};
use clap::Parser;
use log::warn;
use prominence_kmeans::{ColorClusterer, MAX_CLUSTERS, MIN_CLUSTERS};
use std::{fs, path::PathBuf};

/// Extract the dominant colors of an image with k-means.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Input image path
    input: PathBuf,

    /// Number of colors to extract
    #[arg(short, default_value_t = 4, value_parser = clap::value_parser!(u8).range(MIN_CLUSTERS as i64..=MAX_CLUSTERS as i64))]
    k: u8,

    /// Seed for the centroid initialization
    #[arg(short, long, default_value_t = prominence_kmeans::kmeans::DEFAULT_SEED)]
    seed: u64,

    /// Number of independent k-means runs, the best one is kept
    #[arg(short, long, default_value_t = prominence_kmeans::kmeans::DEFAULT_RESTARTS)]
    restarts: usize,

    /// Iteration cap for a single run
    #[arg(short, long, default_value_t = prominence_kmeans::kmeans::DEFAULT_MAX_ITERATIONS)]
    max_iterations: usize,

    /// Output directory for the segmented image and the palette
    #[arg(short = 'd', long, default_value = ".")]
    out_dir: PathBuf,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let extraction = ColorClusterer::new(args.k as usize)
        .seed(args.seed)
        .restarts(args.restarts)
        .max_iterations(args.max_iterations)
        .extract_path(&args.input)
        .with_context(|| format!("failed to extract colors from {}", args.input.display()))?;

    let stem = args
        .input
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string());
    fs::create_dir_all(&args.out_dir)?;

    if let Some(segmented) = extraction.segmented() {
        let path = args.out_dir.join(format!("{stem}_segmented.png"));
        segmented.save(&path).with_context(|| format!("failed to write {}", path.display()))?;
        println!("Saved → {}", path.display());
    }

    if let Some(palette) = extraction.palette() {
        let path = args.out_dir.join(format!("{stem}_palette.png"));
        palette.save(&path).with_context(|| format!("failed to write {}", path.display()))?;
        println!("Saved → {}", path.display());
    }

    let distinct = extraction
        .swatches()
        .iter()
        .map(|swatch| swatch.rgb())
        .collect::<std::collections::HashSet<_>>()
        .len();
    if distinct < extraction.swatches().len() {
        warn!(
            "only {} distinct colors among {} clusters, the image has few colors",
            distinct,
            extraction.swatches().len()
        );
    }

    println!("{}", extraction.report());
    for swatch in extraction.swatches() {
        println!("  {} ({} pixels)", swatch.hex(), swatch.population());
    }

    Ok(())
}
