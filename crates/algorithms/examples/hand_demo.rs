//! HAND on a synthetic valley.
//!
//! Usage: cargo run --example hand_demo -- [params.json] [--verbose]
//!
//! The optional JSON file holds `HandParams` fields, e.g.
//! `{"tile_size": 64, "max_search_radius": 900.0, "out_of_range": "no_data"}`.

use riverscape_algorithms::hydrology::{hand_with_distance, HandParams};
use riverscape_core::{GeoTransform, Raster};
use std::time::Instant;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

fn setup_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");
}

fn synthetic_valley(size: usize) -> (Raster<f64>, Raster<bool>) {
    let mut dem = Raster::filled(size, size, 0.0);
    dem.set_nodata(Some(-9999.0));
    dem.set_transform(GeoTransform::new(0.0, size as f64 * 30.0, 30.0, -30.0));
    let mut mask = Raster::filled(size, size, false);
    mask.set_transform(*dem.transform());

    for row in 0..size {
        let channel = size / 2 + ((row as f64 / 15.0).sin() * 20.0) as usize % (size / 4).max(1);
        for col in 0..size {
            let across = (col as f64 - channel as f64).abs();
            dem.set(row, col, 300.0 + across * 0.8 + (size - row) as f64 * 0.1).unwrap();
        }
        mask.set(row, channel, true).unwrap();
    }
    (dem, mask)
}

fn main() {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let verbose = args.iter().any(|a| a == "--verbose" || a == "-v");
    setup_logging(verbose);

    let params = match args.iter().find(|a| !a.starts_with('-')) {
        Some(path) => {
            let text = std::fs::read_to_string(path).expect("failed to read params file");
            serde_json::from_str::<HandParams>(&text).expect("invalid params")
        }
        None => HandParams::default(),
    };
    info!("Params: {:?}", params);

    let (dem, mask) = synthetic_valley(512);
    info!("Input: {} x {}", dem.cols(), dem.rows());

    let start = Instant::now();
    let out = hand_with_distance(&dem, &mask, params).expect("HAND failed");
    info!("HAND computed in {:.2?}", start.elapsed());

    let stats = out.hand.statistics();
    info!(
        "HAND: min {:?}, max {:?}, mean {:?}, {} valid cells",
        stats.min, stats.max, stats.mean, stats.valid_count
    );
    let distance = out.distance.statistics();
    info!("Farthest cell from a channel: {:?} m", distance.max);
}
