//! Tile inspector - streams a dataset from disk and prints per-node stats.
//!
//! Usage: cargo run --release --bin inspect_tiles -- [OPTIONS]
//!
//! Options:
//!   --dir <PATH>        Dataset root directory (default: ".")
//!   --manifest <NAME>   Manifest path inside the root (default: "ept.json")
//!   --config <FILE>     Loader config JSON; flags below override it
//!   --depth <N>         Maximum hierarchy depth (default: 8)
//!   --skip <N>          Keep every Nth point (default: 1)
//!   --jobs <N>          Max concurrent node fetches (default: 4)
//!   --ordered           Deliver tiles in schedule order
//!   --lz4               Decompress entropy-coded payloads as LZ4

use std::path::{Path, PathBuf};
use std::time::Instant;

use tilestream::core::logging;
use tilestream::{DeliveryOrder, FsSource, LoaderConfig, Manifest, TileLoader};

fn main() {
    logging::init();

    let args: Vec<String> = std::env::args().collect();
    let dir = parse_str_arg(&args, "--dir").map(PathBuf::from).unwrap_or_else(|| PathBuf::from("."));
    let manifest = parse_str_arg(&args, "--manifest").unwrap_or_else(|| "ept.json".to_string());

    let mut config = match parse_str_arg(&args, "--config") {
        Some(path) => match LoaderConfig::load(Path::new(&path)) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Failed to read config {}: {}", path, e);
                std::process::exit(2);
            }
        },
        None => LoaderConfig::default(),
    };
    if let Some(depth) = parse_u32_arg(&args, "--depth") {
        config = config.with_max_depth(depth);
    }
    if let Some(skip) = parse_u32_arg(&args, "--skip") {
        config = config.with_density_skip(skip);
    }
    if let Some(jobs) = parse_usize_arg(&args, "--jobs") {
        config = config.with_concurrency(jobs);
    }
    if args.iter().any(|a| a == "--ordered") {
        config = config.with_delivery_order(DeliveryOrder::Dispatch);
    }

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to create tokio runtime: {}", e);
            std::process::exit(1);
        }
    };

    let mut loader = TileLoader::new(FsSource::new(&dir), config);
    if args.iter().any(|a| a == "--lz4") {
        loader = loader.with_decompressor(tilestream::decode::Lz4Decompressor);
    }

    // Read once up front for key names and cell bounds
    let info = match runtime.block_on(Manifest::load(loader.source(), &manifest)) {
        Ok(info) => info,
        Err(e) => {
            eprintln!("Failed to read manifest: {}", e);
            std::process::exit(1);
        }
    };

    let config = loader.config();
    println!("=== Tile Inspector ===");
    println!("Root:    {}", loader.source().root().display());
    println!("Dataset: {}", manifest);
    println!(
        "Schema:  {} attributes, {}-byte records, {:?} payloads, {:?} keys",
        info.schema.len(),
        info.stride(),
        info.compression,
        info.dialect
    );
    println!(
        "Depth:   {}, skip: {}, jobs: {}",
        config.max_depth, config.density_skip, config.concurrency
    );
    println!();

    let start = Instant::now();
    let mut total_points = 0usize;
    let result = runtime.block_on(loader.load(&manifest, |event| {
        total_points += event.tile.len();
        let [min_x, min_y, min_z, max_x, max_y, max_z] = event.key.bounds(info.bounds);
        println!(
            "  [{:>4}/{:<4}] {:<16} {:>8} pts  cell=({:.1},{:.1},{:.1})..({:.1},{:.1},{:.1})  color={} intensity={} class={}",
            event.index + 1,
            event.total,
            info.key_name(event.key),
            event.tile.len(),
            min_x,
            min_y,
            min_z,
            max_x,
            max_y,
            max_z,
            event.tile.colors.is_some(),
            event.tile.intensity.is_some(),
            event.tile.classification.is_some(),
        );
    }));

    match result {
        Ok(report) => {
            let batch = &report.batch;
            println!();
            println!(
                "Nodes:      {} discovered, {} fragments fetched",
                report.nodes_discovered, report.fragments_fetched
            );
            println!(
                "Tiles:      {} delivered, {} empty, {} failed, {} placeholders of {}",
                batch.delivered,
                batch.empty,
                batch.failed.len(),
                batch.placeholders.len(),
                batch.scheduled
            );
            println!("Points:     {}", total_points);
            println!("Z range:    {:.3} .. {:.3}", report.z_range.0, report.z_range.1);
            println!("Elapsed:    {:.2?}", start.elapsed());
        }
        Err(e) => {
            eprintln!("Load failed: {}", e);
            std::process::exit(1);
        }
    }
}

fn parse_u32_arg(args: &[String], flag: &str) -> Option<u32> {
    args.iter().position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .and_then(|s| s.parse().ok())
}

fn parse_usize_arg(args: &[String], flag: &str) -> Option<usize> {
    args.iter().position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .and_then(|s| s.parse().ok())
}

fn parse_str_arg(args: &[String], flag: &str) -> Option<String> {
    args.iter().position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .cloned()
}
